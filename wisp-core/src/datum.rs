//! Datums: opaque, identity-tagged user values (§4.5).
//!
//! A datum pairs an identity symbol with an arbitrary payload value. The
//! identity is what a datum-aware client checks before trusting the
//! payload's shape (§8 scenario 4: `datum-ref` against the wrong identity
//! is a `bad-arg`, not a panic) — it is not a primary type of its own, it
//! is *the* mechanism for safely carrying a user-defined value through code
//! that only knows `Value`.
//!
//! Per-identity printers are plain Lisp functions invoked with the datum
//! itself and expected to return a value to print in its place — that
//! needs evaluator access the generic [`TypeDescriptor::print`] hook
//! doesn't have, so `Interpreter::print_value` special-cases datums with a
//! registered printer before falling back to the generic hook.

use crate::types::{Cell, TypeDescriptor};
use crate::value::{CellId, TypeCode, Value};
use smallvec::{smallvec, SmallVec};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy)]
pub struct Datum {
    pub identity: Value,
    pub payload: Value,
    type_code: TypeCode,
}

impl Datum {
    pub fn new(identity: Value, payload: Value, type_code: TypeCode) -> Self {
        Self {
            identity,
            payload,
            type_code,
        }
    }
}

impl Cell for Datum {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn type_code(&self) -> TypeCode {
        self.type_code
    }
}

/// Descriptor for the datum type. Owns the identity-to-printer table that
/// `define-datum-printer` populates — this is state belonging to the type,
/// not to any one cell, so it lives here rather than duplicated per datum.
#[derive(Default)]
pub struct DatumDescriptor {
    printers: RefCell<HashMap<Value, Value>>,
}

impl DatumDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_printer(&self, identity: Value, printer: Value) {
        self.printers.borrow_mut().insert(identity, printer);
    }

    pub fn printer_for(&self, identity: Value) -> Option<Value> {
        self.printers.borrow().get(&identity).copied()
    }
}

impl TypeDescriptor for DatumDescriptor {
    fn name(&self) -> &str {
        "datum"
    }

    fn print(&self, cell: &dyn Cell, out: &mut dyn fmt::Write) -> fmt::Result {
        let datum = cell.as_any().downcast_ref::<Datum>().expect("datum cell");
        write!(out, "#<datum {} {}>", datum.identity, datum.payload)
    }

    fn children(&self, cell: &dyn Cell) -> SmallVec<[Value; 4]> {
        let datum = cell.as_any().downcast_ref::<Datum>().expect("datum cell");
        smallvec![datum.identity, datum.payload]
    }

    /// Printer closures are reachable only from this table, not from any
    /// value graph a datum instance points into — keep them alive.
    fn extra_roots(&self, _instances: &[(CellId, crate::header::CellFlags)]) -> SmallVec<[CellId; 4]> {
        self.printers
            .borrow()
            .values()
            .filter_map(|v| v.as_cell_id())
            .collect()
    }

    fn datum_printer_for(&self, identity: Value) -> Option<Value> {
        self.printer_for(identity)
    }

    fn register_datum_printer(&self, identity: Value, printer: Value) {
        self.register_printer(identity, printer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printer_table_round_trips() {
        let descriptor = DatumDescriptor::new();
        let identity = Value::Ref(CellId(1));
        let printer = Value::Ref(CellId(2));
        assert!(descriptor.printer_for(identity).is_none());
        descriptor.register_printer(identity, printer);
        assert_eq!(descriptor.printer_for(identity), Some(printer));
    }
}
