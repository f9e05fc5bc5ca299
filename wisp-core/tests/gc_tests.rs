//! GC reclaim stress scenario (§8).

use wisp_core::Interpreter;

#[test]
fn unrooted_cons_cells_are_reclaimed() {
    let mut interp = Interpreter::new();
    interp.collect_garbage();
    let baseline_bytes = interp.heap.live_bytes();
    let baseline_count = interp.heap.live_count();

    for i in 0..10_000 {
        // Each cons is built and immediately dropped on the Rust side —
        // nothing roots it, so after collection none should survive.
        let _ = interp.cons(wisp_core::Value::Int(i), interp.nil);
    }
    assert!(interp.heap.live_count() > baseline_count);

    let stats = interp.collect_garbage();
    assert_eq!(stats.cells_after, baseline_count);
    assert!(interp.heap.live_bytes() as f64 <= baseline_bytes as f64 * 1.5 + 1.0);
}

#[test]
fn rooted_value_survives_collection() {
    let mut interp = Interpreter::new();
    let cell = interp.cons(wisp_core::Value::Int(7), interp.nil);
    let guard = interp.root_scope(&[cell]);
    interp.collect_garbage();
    assert!(interp.heap.is_live(cell.as_cell_id().unwrap()));
    drop(guard);
    interp.collect_garbage();
    assert!(!interp.heap.is_live(cell.as_cell_id().unwrap()));
}

#[test]
fn static_symbols_survive_collection_unrooted() {
    let mut interp = Interpreter::new();
    let sym = interp.intern("survivor");
    interp.collect_garbage();
    assert!(interp.heap.is_live(sym.as_cell_id().unwrap()));
}

/// A symbol cell surviving sweep (it's `STATIC`) is not the same as its
/// `value`/`function` slots being traced: those are ordinary heap
/// references that only survive if the mark phase walks the obarray.
#[test]
fn top_level_define_survives_collection_with_no_explicit_root() {
    let mut interp = Interpreter::new();
    let mut env = Vec::new();
    let lambda = interp.intern("lambda");
    let body = interp.cons(wisp_core::Value::Int(42), interp.nil);
    let lambda_form = interp.cons(lambda, interp.cons(interp.nil, body));
    let name = interp.intern("answer");
    let define = interp.intern("define");
    let define_form = interp.cons(define, interp.cons(name, interp.cons(lambda_form, interp.nil)));

    interp.eval(define_form, &mut env, false).unwrap();
    interp.collect_garbage();

    let closure = interp.value_of(name).expect("define installs a value binding");
    assert!(interp.heap.is_live(closure.as_cell_id().unwrap()));
    assert_eq!(interp.apply(closure, &[], false).unwrap(), wisp_core::Value::Int(42));
}
