//! Core primitives (§1 Non-goals: "a standard library beyond what the core
//! needs to be testable" — this is exactly that floor, not a real prelude).
//!
//! Arithmetic here only needs to exercise `apply`'s fixed/`L`/`V` dispatch
//! paths and give the test scenarios in §8 something to call; it is not
//! the arithmetic module §9's Open Question 2 asks about (that one is left
//! to whichever extension wants real numeric towers).

use crate::callable::Arity;
use crate::cons::{list_to_vec, Cons};
use crate::datum::Datum;
use crate::interpreter::Interpreter;
use crate::throw::{LispError, Signal};
use crate::types::Cell;
use crate::value::Value;

pub fn install(interp: &mut Interpreter) {
    interp.define_subr("+", Arity::V, prim_add);
    interp.define_subr("-", Arity::V, prim_sub);
    interp.define_subr("*", Arity::V, prim_mul);
    interp.define_subr("/", Arity::V, prim_div);
    interp.define_subr("=", Arity::V, prim_num_eq);
    interp.define_subr("<", Arity::V, prim_num_lt);

    interp.define_subr("cons", Arity::Fixed(2), prim_cons);
    interp.define_subr("car", Arity::Fixed(1), prim_car);
    interp.define_subr("cdr", Arity::Fixed(1), prim_cdr);
    interp.define_subr("list", Arity::V, prim_list);
    interp.define_subr("length", Arity::Fixed(1), prim_length);

    interp.define_subr("not", Arity::Fixed(1), prim_not);
    interp.define_subr("eq", Arity::Fixed(2), prim_eq);
    interp.define_subr("eql", Arity::Fixed(2), prim_eq);
    interp.define_subr("value-compare", Arity::Fixed(2), prim_value_compare);

    interp.define_subr("funcall", Arity::V, prim_funcall);
    interp.define_subr("apply", Arity::Fixed(2), prim_apply);

    interp.define_subr("error", Arity::V, prim_error);
    interp.define_subr("signal", Arity::Fixed(2), prim_signal);

    interp.define_subr("make-datum", Arity::Fixed(2), prim_make_datum);
    interp.define_subr("datum?", Arity::Fixed(2), prim_datum_p);
    interp.define_subr("datum-ref", Arity::Fixed(2), prim_datum_ref);
    interp.define_subr("datum-set!", Arity::Fixed(3), prim_datum_set);
    interp.define_subr("define-datum-printer", Arity::Fixed(2), prim_define_datum_printer);
}

fn as_ints(args: &[Value]) -> Result<Vec<i64>, Signal> {
    args.iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_int()
                .ok_or_else(|| Signal::bad_arg(i + 1, *v))
        })
        .collect()
}

fn prim_add(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    Ok(Value::Int(as_ints(args)?.into_iter().sum()))
}

fn prim_sub(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let ints = as_ints(args)?;
    match ints.split_first() {
        None => Ok(Value::Int(0)),
        Some((first, rest)) if rest.is_empty() => Ok(Value::Int(-first)),
        Some((first, rest)) => Ok(Value::Int(rest.iter().fold(*first, |a, b| a - b))),
    }
}

fn prim_mul(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    Ok(Value::Int(as_ints(args)?.into_iter().product()))
}

fn prim_div(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let ints = as_ints(args)?;
    let (first, rest) = ints.split_first().ok_or(Signal::error(LispError::MissingArg { index: 1 }))?;
    let mut acc = *first;
    for divisor in rest {
        if *divisor == 0 {
            return Err(Signal::error(LispError::Error {
                message: "division by zero".to_string(),
                irritants: vec![Value::Int(*divisor)],
            }));
        }
        acc /= divisor;
    }
    Ok(Value::Int(acc))
}

fn prim_num_eq(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let ints = as_ints(args)?;
    let ok = ints.windows(2).all(|pair| pair[0] == pair[1]);
    Ok(if ok { interp.t } else { interp.nil })
}

fn prim_num_lt(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let ints = as_ints(args)?;
    let ok = ints.windows(2).all(|pair| pair[0] < pair[1]);
    Ok(if ok { interp.t } else { interp.nil })
}

fn prim_cons(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    Ok(interp.cons(args[0], args[1]))
}

fn cons_of<'a>(interp: &'a Interpreter, value: Value, arg_index: usize) -> Result<&'a Cons, Signal> {
    let id = value
        .as_cell_id()
        .filter(|id| interp.heap.is_live(*id) && interp.heap.type_code(*id) == interp.cons_type)
        .ok_or_else(|| Signal::bad_arg(arg_index, value))?;
    Ok(interp.heap.cell(id).as_any().downcast_ref::<Cons>().expect("cons cell"))
}

fn prim_car(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    Ok(cons_of(interp, args[0], 1)?.car)
}

fn prim_cdr(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    Ok(cons_of(interp, args[0], 1)?.cdr)
}

fn prim_list(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    Ok(crate::cons::vec_to_list(&mut interp.heap, interp.cons_type, interp.nil, args))
}

fn prim_length(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let len = crate::cons::list_length(&interp.heap, interp.cons_type, interp.nil, args[0])
        .ok_or_else(|| Signal::bad_arg(1, args[0]))?;
    Ok(Value::Int(len as i64))
}

fn prim_not(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    Ok(if interp.is_true(args[0]) { interp.nil } else { interp.t })
}

fn prim_eq(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    Ok(if args[0] == args[1] { interp.t } else { interp.nil })
}

/// Generic ordering: `-1`/`0`/`1` for comparable values, `nil` when
/// [`Interpreter::value_compare`] reports the pair incomparable (mismatched
/// primary types, or either side lacking a `compare` hook) rather than
/// signaling — callers that need a hard failure can check for `nil`
/// themselves, same as `assq`-style lookups elsewhere in the family.
fn prim_value_compare(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    use crate::types::CompareResult;
    Ok(match interp.value_compare(args[0], args[1]) {
        CompareResult::Order(ordering) => Value::Int(match ordering {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }),
        CompareResult::Incomparable => interp.nil,
    })
}

fn prim_funcall(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let (fun, rest) = args.split_first().ok_or(Signal::error(LispError::MissingArg { index: 1 }))?;
    interp.apply(*fun, rest, false)
}

fn prim_apply(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let fun = args[0];
    let arglist = list_to_vec(&interp.heap, interp.cons_type, interp.nil, args[1])
        .ok_or_else(|| Signal::bad_arg(2, args[1]))?;
    interp.apply(fun, &arglist, false)
}

fn prim_error(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let message = args
        .first()
        .and_then(|v| interp.symbol_name(*v))
        .unwrap_or("error")
        .to_string();
    Err(Signal::error(LispError::Error {
        message,
        irritants: args.iter().skip(1).copied().collect(),
    }))
}

fn prim_signal(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let data = list_to_vec(&interp.heap, interp.cons_type, interp.nil, args[1])
        .ok_or_else(|| Signal::bad_arg(2, args[1]))?;
    Err(Signal::error(LispError::UserError {
        symbol: args[0],
        data,
    }))
}

fn datum_of<'a>(interp: &'a Interpreter, value: Value, arg_index: usize) -> Result<&'a Datum, Signal> {
    let id = value
        .as_cell_id()
        .filter(|id| interp.heap.is_live(*id) && interp.heap.type_code(*id) == interp.datum_type)
        .ok_or_else(|| Signal::bad_arg(arg_index, value))?;
    Ok(interp.heap.cell(id).as_any().downcast_ref::<Datum>().expect("datum cell"))
}

fn prim_make_datum(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let payload = args[0];
    let identity = args[1];
    let id = interp
        .heap
        .alloc(interp.datum_type, Box::new(Datum::new(identity, payload, interp.datum_type)));
    Ok(Value::Ref(id))
}

fn prim_datum_p(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let matches = datum_of(interp, args[0], 1)
        .map(|datum| datum.identity == args[1])
        .unwrap_or(false);
    Ok(if matches { interp.t } else { interp.nil })
}

/// `datum-ref` signals `bad-arg` at index 1 on any failure — either the
/// first argument isn't a live datum, or its identity doesn't match the
/// second argument — matching `original_source`'s `signal_arg_error`
/// convention (§8 scenario 4; see `../DESIGN.md`).
fn prim_datum_ref(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let datum = datum_of(interp, args[0], 1)?;
    if datum.identity == args[1] {
        Ok(datum.payload)
    } else {
        Err(Signal::bad_arg(1, args[1]))
    }
}

fn prim_datum_set(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let identity = datum_of(interp, args[0], 1)?.identity;
    if identity != args[1] {
        return Err(Signal::bad_arg(1, args[1]));
    }
    let id = args[0].as_cell_id().expect("checked by datum_of");
    interp
        .heap
        .cell_mut(id)
        .as_any_mut()
        .downcast_mut::<Datum>()
        .expect("datum cell")
        .payload = args[2];
    Ok(args[2])
}

fn prim_define_datum_printer(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let identity = args[0];
    let printer = args[1];
    interp
        .registry
        .get(interp.datum_type)
        .register_datum_printer(identity, printer);
    Ok(interp.nil)
}
