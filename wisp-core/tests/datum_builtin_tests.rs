//! The datum primitives wired up as ordinary Lisp-callable subrs, exercised
//! through `apply` rather than by touching `wisp_core::datum` directly
//! (`datum_tests.rs` covers the lower-level identity-check invariant).

use wisp_core::types::Cell;
use wisp_core::{Interpreter, LispError, Signal, Value};

fn call(interp: &mut Interpreter, name: &str, args: &[Value]) -> Result<Value, Signal> {
    let sym = interp.intern(name);
    let fun = interp.function_of(sym).expect("builtin installed");
    interp.apply(fun, args, false)
}

#[test]
fn make_datum_ref_and_set_round_trip_through_apply() {
    let mut interp = Interpreter::new();
    let my_id = interp.intern("my-id");
    let other_id = interp.intern("other");

    let datum = call(&mut interp, "make-datum", &[Value::Int(42), my_id]).unwrap();
    assert_eq!(call(&mut interp, "datum?", &[datum, my_id]).unwrap(), interp.t);
    assert_eq!(call(&mut interp, "datum?", &[datum, other_id]).unwrap(), interp.nil);
    assert_eq!(call(&mut interp, "datum-ref", &[datum, my_id]).unwrap(), Value::Int(42));

    let err = call(&mut interp, "datum-ref", &[datum, other_id]).unwrap_err();
    match err {
        Signal::Error(LispError::BadArg { index, value }) => {
            assert_eq!(index, 1);
            assert_eq!(value, other_id);
        }
        other => panic!("expected bad-arg, got {other:?}"),
    }

    call(&mut interp, "datum-set!", &[datum, my_id, Value::Int(99)]).unwrap();
    assert_eq!(call(&mut interp, "datum-ref", &[datum, my_id]).unwrap(), Value::Int(99));
}

#[test]
fn define_datum_printer_is_consulted_by_print_value() {
    let mut interp = Interpreter::new();
    let tag = interp.intern("point");
    let datum = call(&mut interp, "make-datum", &[Value::Int(7), tag]).unwrap();

    // Without a printer: `#<datum NAME>` using the identity symbol's name.
    let default_rendering = interp.print_value(datum).unwrap();
    assert_eq!(default_rendering, "#<datum point>");

    // A printer that just hands back the payload, so printing the datum
    // prints the payload's own representation instead.
    fn return_payload(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
        let id = args[0].as_cell_id().expect("datum value");
        let payload = interp
            .heap
            .cell(id)
            .as_any()
            .downcast_ref::<wisp_core::datum::Datum>()
            .expect("datum cell")
            .payload;
        Ok(payload)
    }
    interp.define_subr("point-printer", wisp_core::callable::Arity::Fixed(1), return_payload);
    let printer = interp.function_of(interp.intern("point-printer")).unwrap();
    call(&mut interp, "define-datum-printer", &[tag, printer]).unwrap();

    assert_eq!(interp.print_value(datum).unwrap(), "7");
}
