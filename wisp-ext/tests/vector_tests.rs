//! Vector end-to-end scenario (§8 scenario 3).

use wisp_core::header::CellFlags;
use wisp_core::{Interpreter, LispError, Signal, Value};

fn call(interp: &mut Interpreter, name: &str, args: &[Value]) -> Result<Value, Signal> {
    let sym = interp.intern(name);
    let fun = interp.function_of(sym).expect("builtin installed");
    interp.apply(fun, args, false)
}

fn list_to_vec(interp: &Interpreter, list: Value) -> Vec<Value> {
    wisp_core::cons::list_to_vec(&interp.heap, interp.cons_type, interp.nil, list).expect("proper list")
}

#[test]
fn make_vector_set_then_freeze_rejects_further_mutation() {
    let mut interp = Interpreter::new();
    wisp_ext::vector::install(&mut interp);

    let x = interp.intern("x");
    let y = interp.intern("y");

    let v = call(&mut interp, "make-vector", &[Value::Int(3), x]).unwrap();
    assert_eq!(call(&mut interp, "vector-length", &[v]).unwrap(), Value::Int(3));

    call(&mut interp, "vector-set!", &[v, Value::Int(1), y]).unwrap();
    let as_list = call(&mut interp, "vector->list", &[v]).unwrap();
    assert_eq!(list_to_vec(&interp, as_list), vec![x, y, x]);

    call(&mut interp, "make-vector-immutable!", &[v]).unwrap();
    let id = v.as_cell_id().unwrap();
    assert!(interp.heap.flags(id).contains(CellFlags::IMMUTABLE));

    let err = call(&mut interp, "vector-set!", &[v, Value::Int(0), x]).unwrap_err();
    match err {
        Signal::Error(LispError::SettingConstant { value }) => assert_eq!(value, v),
        other => panic!("expected setting-constant, got {other:?}"),
    }
    // Unchanged by the rejected mutation.
    let as_list = call(&mut interp, "vector->list", &[v]).unwrap();
    assert_eq!(list_to_vec(&interp, as_list), vec![x, y, x]);
}

#[test]
fn list_to_vector_to_list_round_trips_structurally() {
    let mut interp = Interpreter::new();
    wisp_ext::vector::install(&mut interp);

    let items = vec![Value::Int(1), Value::Int(2), Value::Int(3)];
    let list = wisp_core::cons::vec_to_list(&mut interp.heap, interp.cons_type, interp.nil, &items);

    let vector = call(&mut interp, "list->vector", &[list]).unwrap();
    let back = call(&mut interp, "vector->list", &[vector]).unwrap();
    assert_eq!(list_to_vec(&interp, back), items);
}

#[test]
fn vector_map_stops_at_the_shortest_input() {
    let mut interp = Interpreter::new();
    wisp_ext::vector::install(&mut interp);

    let plus = interp.intern("+");
    let plus_fn = interp.function_of(plus).unwrap();

    let short = call(&mut interp, "vector", &[Value::Int(1), Value::Int(2)]).unwrap();
    let long = call(&mut interp, "vector", &[Value::Int(10), Value::Int(20), Value::Int(30)]).unwrap();

    let mapped = call(&mut interp, "vector-map", &[plus_fn, short, long]).unwrap();
    let as_list = call(&mut interp, "vector->list", &[mapped]).unwrap();
    assert_eq!(list_to_vec(&interp, as_list), vec![Value::Int(11), Value::Int(22)]);
}

#[test]
fn vector_map_results_survive_gc_triggered_mid_loop() {
    let mut interp = Interpreter::with_config(wisp_core::interpreter::DEFAULT_MAX_LISP_DEPTH, 1);
    wisp_ext::vector::install(&mut interp);

    let plus = interp.intern("+");
    let plus_fn = interp.function_of(plus).unwrap();
    let input = call(&mut interp, "vector", &[Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]).unwrap();

    // A 1-byte GC threshold means every `interp.apply` call inside
    // `vector-map`'s loop is over threshold and triggers a collection;
    // earlier results must still be rooted when that happens.
    let mapped = call(&mut interp, "vector-map", &[plus_fn, input]).unwrap();
    let as_list = call(&mut interp, "vector->list", &[mapped]).unwrap();
    assert_eq!(
        list_to_vec(&interp, as_list),
        vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]
    );
}

#[test]
fn vector_compare_orders_equal_and_unequal_vectors() {
    let mut interp = Interpreter::new();
    wisp_ext::vector::install(&mut interp);

    let a = call(&mut interp, "vector", &[Value::Int(1), Value::Int(2)]).unwrap();
    let b = call(&mut interp, "vector", &[Value::Int(1), Value::Int(2)]).unwrap();
    let c = call(&mut interp, "vector", &[Value::Int(9), Value::Int(9)]).unwrap();

    assert_eq!(call(&mut interp, "vector-compare", &[a, b]).unwrap(), Value::Int(0));
    assert_eq!(call(&mut interp, "vector-compare", &[a, c]).unwrap(), interp.nil);

    // Not a vector at all is a bad-arg, same convention as the other
    // vector primitives — `vector-compare` is typed, unlike the generic
    // `value-compare` that accepts any pair of values.
    let err = call(&mut interp, "vector-compare", &[a, Value::Int(1)]).unwrap_err();
    assert!(matches!(err, Signal::Error(LispError::BadArg { index: 2, .. })));
}
