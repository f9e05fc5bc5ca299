//! Datum identity-check scenario (§8 scenario 4).

use wisp_core::types::Cell;
use wisp_core::{Interpreter, LispError, Signal, Value};

fn make_datum(interp: &mut Interpreter, identity: Value, payload: Value) -> Value {
    let cell = Box::new(wisp_core::datum::Datum::new(identity, payload, interp.datum_type));
    let id = interp.heap.alloc(interp.datum_type, cell);
    Value::Ref(id)
}

fn datum_ref(interp: &Interpreter, datum: Value, expected_identity: Value) -> Result<Value, Signal> {
    let id = datum
        .as_cell_id()
        .filter(|id| interp.heap.is_live(*id) && interp.heap.type_code(*id) == interp.datum_type)
        .ok_or_else(|| Signal::bad_arg(1, datum))?;
    let cell = interp
        .heap
        .cell(id)
        .as_any()
        .downcast_ref::<wisp_core::datum::Datum>()
        .expect("datum cell");
    if cell.identity == expected_identity {
        Ok(cell.payload)
    } else {
        // 1-based position among the identity-check's own arguments (the
        // identity being checked, not the datum itself) — matching
        // original_source's `signal_arg_error` convention (§8 scenario 4).
        Err(Signal::bad_arg(1, expected_identity))
    }
}

#[test]
fn datum_ref_with_matching_identity_returns_payload() {
    let mut interp = Interpreter::new();
    let my_id = interp.intern("my-id");
    let datum = make_datum(&mut interp, my_id, Value::Int(42));
    let value = datum_ref(&interp, datum, my_id).expect("matching identity");
    assert_eq!(value, Value::Int(42));
}

#[test]
fn datum_ref_with_wrong_identity_signals_bad_arg_at_index_1() {
    let mut interp = Interpreter::new();
    let my_id = interp.intern("my-id");
    let other_id = interp.intern("other");
    let datum = make_datum(&mut interp, my_id, Value::Int(42));

    let err = datum_ref(&interp, datum, other_id).unwrap_err();
    match err {
        Signal::Error(LispError::BadArg { index, .. }) => assert_eq!(index, 1),
        other => panic!("expected bad-arg, got {other:?}"),
    }
}

#[test]
fn datum_survives_collection_only_while_reachable() {
    let mut interp = Interpreter::new();
    let id = interp.intern("tag");
    let datum = make_datum(&mut interp, id, Value::Int(1));
    let guard = interp.root_scope(&[datum]);
    interp.collect_garbage();
    assert!(interp.heap.is_live(datum.as_cell_id().unwrap()));
    drop(guard);
    interp.collect_garbage();
    assert!(!interp.heap.is_live(datum.as_cell_id().unwrap()));
}
