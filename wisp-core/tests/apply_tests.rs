//! End-to-end apply-engine scenarios (§8).

use wisp_core::Interpreter;

#[test]
fn funcall_plus_sums_arguments() {
    let mut interp = Interpreter::new();
    let plus = interp.intern("+");
    let plus = interp.function_of(plus).expect("+ is bound");
    let args = [
        wisp_core::Value::Int(1),
        wisp_core::Value::Int(2),
        wisp_core::Value::Int(3),
    ];
    let result = interp.apply(plus, &args, false).expect("apply succeeds");
    assert_eq!(result, wisp_core::Value::Int(6));
}

#[test]
fn self_recursion_past_max_depth_signals_exact_message() {
    let mut interp = Interpreter::new();
    // (define (loop n) (loop n))
    let loop_sym = interp.intern("loop");
    let n_sym = interp.intern("n");
    let params = interp.cons(n_sym, interp.nil);
    let call = interp.cons(n_sym, interp.nil);
    let call = interp.cons(loop_sym, call);
    let body = interp.cons(call, interp.nil);
    let lambda_sym = interp.intern("lambda");
    let lambda_form = interp.cons(params, body);
    let lambda_form = interp.cons(lambda_sym, lambda_form);
    let closure = interp.eval(lambda_form, &mut Vec::new(), false).unwrap();
    interp.set_function(loop_sym, closure);

    let err = interp.apply(closure, &[wisp_core::Value::Int(0)], false).unwrap_err();
    assert_eq!(
        err.to_string(),
        "max-lisp-depth exceeded, possible infinite recursion?"
    );
}

#[test]
fn mutual_recursion_backtrace_respects_small_depth_limit() {
    let mut interp = Interpreter::with_config(10, wisp_core::interpreter::DEFAULT_GC_THRESHOLD_BYTES);

    // (define (ping n) (pong n))
    // (define (pong n) (ping n))
    let define_fn = |interp: &mut Interpreter, name: &str, call_name: &str| {
        let name_sym = interp.intern(name);
        let call_sym = interp.intern(call_name);
        let n_sym = interp.intern("n");
        let params = interp.cons(n_sym, interp.nil);
        let call_args = interp.cons(n_sym, interp.nil);
        let call = interp.cons(call_sym, call_args);
        let body = interp.cons(call, interp.nil);
        let lambda_sym = interp.intern("lambda");
        let lambda_form = interp.cons(params, body);
        let lambda_form = interp.cons(lambda_sym, lambda_form);
        let closure = interp.eval(lambda_form, &mut Vec::new(), false).unwrap();
        interp.set_function(name_sym, closure);
        closure
    };
    let ping = define_fn(&mut interp, "ping", "pong");
    define_fn(&mut interp, "pong", "ping");

    let err = interp.apply(ping, &[wisp_core::Value::Int(0)], false).unwrap_err();
    assert_eq!(
        err.to_string(),
        "max-lisp-depth exceeded, possible infinite recursion?"
    );
    // the call stack has already unwound by the time apply returns the
    // error to the top level, matching §4.3's "pop on every exit path"
    assert_eq!(interp.call_stack.depth(), 0);
}

#[test]
fn catch_throw_unwinds_to_matching_tag() {
    let mut interp = Interpreter::new();
    let tag = interp.intern("done");
    let value = wisp_core::Value::Int(42);

    // (catch 'done (throw 'done 42))
    let quote_sym = interp.intern("quote");
    let quoted_tag = interp.cons(tag, interp.nil);
    let quoted_tag = interp.cons(quote_sym, quoted_tag);
    let throw_sym = interp.intern("throw");
    let throw_args = interp.cons(value, interp.nil);
    let throw_args = interp.cons(quoted_tag, throw_args);
    let throw_form = interp.cons(throw_sym, throw_args);
    let throw_body = interp.cons(throw_form, interp.nil);
    let catch_sym = interp.intern("catch");
    let catch_form = interp.cons(quoted_tag, throw_body);
    let catch_form = interp.cons(catch_sym, catch_form);

    let result = interp.eval(catch_form, &mut Vec::new(), false).unwrap();
    assert_eq!(result, value);
}

#[test]
fn catch_clears_pending_exception_left_by_an_applied_throw() {
    let mut interp = Interpreter::new();
    let tag_sym = interp.intern("done");
    let quote_sym = interp.intern("quote");
    let quoted_tag = interp.cons(quote_sym, interp.cons(tag_sym, interp.nil));

    // (lambda () (throw 'done 42))
    let throw_sym = interp.intern("throw");
    let throw_form = interp.cons(
        throw_sym,
        interp.cons(quoted_tag, interp.cons(wisp_core::Value::Int(42), interp.nil)),
    );
    let lambda_sym = interp.intern("lambda");
    let lambda_form = interp.cons(lambda_sym, interp.cons(interp.nil, interp.cons(throw_form, interp.nil)));

    // (catch 'done ((lambda () (throw 'done 42))))
    let call_form = interp.cons(lambda_form, interp.nil);
    let catch_sym = interp.intern("catch");
    let catch_form = interp.cons(catch_sym, interp.cons(quoted_tag, interp.cons(call_form, interp.nil)));

    let result = interp.eval(catch_form, &mut Vec::new(), false).unwrap();
    assert_eq!(result, wisp_core::Value::Int(42));
    // the throw passed through `apply` (calling the lambda) on its way
    // out, which records it as pending; `catch` absorbing it must clear
    // that, restoring the value/pending-exception invariant.
    assert!(interp.pending.is_none());
}

#[test]
fn value_compare_orders_ints_and_rejects_mismatched_types() {
    let mut interp = Interpreter::new();
    let compare = interp.intern("value-compare");
    let compare = interp.function_of(compare).expect("value-compare is bound");

    let lt = interp
        .apply(compare, &[wisp_core::Value::Int(1), wisp_core::Value::Int(2)], false)
        .unwrap();
    assert_eq!(lt, wisp_core::Value::Int(-1));

    let eq = interp
        .apply(compare, &[wisp_core::Value::Int(5), wisp_core::Value::Int(5)], false)
        .unwrap();
    assert_eq!(eq, wisp_core::Value::Int(0));

    let gt = interp
        .apply(compare, &[wisp_core::Value::Int(9), wisp_core::Value::Int(1)], false)
        .unwrap();
    assert_eq!(gt, wisp_core::Value::Int(1));

    // An int against a cons cell: mismatched primary types, incomparable.
    let cell = interp.cons(wisp_core::Value::Int(0), interp.nil);
    let incomparable = interp.apply(compare, &[wisp_core::Value::Int(0), cell], false).unwrap();
    assert_eq!(incomparable, interp.nil);
}

#[test]
fn requested_interrupt_is_raised_on_next_apply() {
    let mut interp = Interpreter::new();
    let plus = interp.intern("+");
    let plus = interp.function_of(plus).expect("+ is bound");

    interp.request_interrupt();
    let err = interp.apply(plus, &[wisp_core::Value::Int(1)], false).unwrap_err();
    assert_eq!(err.to_string(), "interrupt");

    // Consumed, not sticky: the next apply runs normally.
    let result = interp.apply(plus, &[wisp_core::Value::Int(1), wisp_core::Value::Int(2)], false).unwrap();
    assert_eq!(result, wisp_core::Value::Int(3));
}
