//! Cons cells and list helpers (§3 "Cons/list").
//!
//! There is no dedicated empty-list value: `nil` is the interned symbol of
//! that name, self-evaluating, doubling as the false value — the usual
//! Lisp convention, and the simplest reading of §3's "lists are nil
//! terminated chains of cons cells" once symbols are themselves heap cells
//! with stable identity.

use crate::types::{Cell, CompareResult, TypeDescriptor};
use crate::value::{TypeCode, Value};
use smallvec::{smallvec, SmallVec};
use std::any::Any;
use std::fmt;

#[derive(Debug, Clone, Copy)]
pub struct Cons {
    pub car: Value,
    pub cdr: Value,
    type_code: TypeCode,
}

impl Cons {
    pub fn new(car: Value, cdr: Value, type_code: TypeCode) -> Self {
        Self { car, cdr, type_code }
    }
}

impl Cell for Cons {
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

pub struct ConsDescriptor;

impl TypeDescriptor for ConsDescriptor {
    fn name(&self) -> &str {
        "cons"
    }

    fn compare(&self, a: &dyn Cell, b: &dyn Cell) -> CompareResult {
        let a = a.as_any().downcast_ref::<Cons>().expect("cons cell");
        let b = b.as_any().downcast_ref::<Cons>().expect("cons cell");
        if a.car == b.car && a.cdr == b.cdr {
            CompareResult::Order(std::cmp::Ordering::Equal)
        } else {
            CompareResult::Incomparable
        }
    }

    fn print(&self, cell: &dyn Cell, out: &mut dyn fmt::Write) -> fmt::Result {
        let cons = cell.as_any().downcast_ref::<Cons>().expect("cons cell");
        write!(out, "({} . {})", cons.car, cons.cdr)
    }

    fn children(&self, cell: &dyn Cell) -> SmallVec<[Value; 4]> {
        let cons = cell.as_any().downcast_ref::<Cons>().expect("cons cell");
        smallvec![cons.car, cons.cdr]
    }
}

/// `value` is `nil` or a chain of cons cells ending in `nil`.
pub fn is_list(heap: &crate::heap::Heap, cons_type: TypeCode, nil: Value, mut value: Value) -> bool {
    loop {
        if value == nil {
            return true;
        }
        match value {
            Value::Ref(id) if heap.is_live(id) && heap.type_code(id) == cons_type => {
                let cons = heap
                    .cell(id)
                    .as_any()
                    .downcast_ref::<Cons>()
                    .expect("cons cell");
                value = cons.cdr;
            }
            _ => return false,
        }
    }
}

/// Length of a proper list, or `None` if `value` is not one (§3 invariant:
/// `length` only defined on proper lists).
pub fn list_length(
    heap: &crate::heap::Heap,
    cons_type: TypeCode,
    nil: Value,
    mut value: Value,
) -> Option<usize> {
    let mut len = 0;
    loop {
        if value == nil {
            return Some(len);
        }
        match value {
            Value::Ref(id) if heap.is_live(id) && heap.type_code(id) == cons_type => {
                let cons = heap
                    .cell(id)
                    .as_any()
                    .downcast_ref::<Cons>()
                    .expect("cons cell");
                len += 1;
                value = cons.cdr;
            }
            _ => return None,
        }
    }
}

/// Collect a proper list into a `Vec`, or `None` if it is improper.
pub fn list_to_vec(
    heap: &crate::heap::Heap,
    cons_type: TypeCode,
    nil: Value,
    mut value: Value,
) -> Option<Vec<Value>> {
    let mut out = Vec::new();
    loop {
        if value == nil {
            return Some(out);
        }
        match value {
            Value::Ref(id) if heap.is_live(id) && heap.type_code(id) == cons_type => {
                let cons = heap
                    .cell(id)
                    .as_any()
                    .downcast_ref::<Cons>()
                    .expect("cons cell");
                out.push(cons.car);
                value = cons.cdr;
            }
            _ => return None,
        }
    }
}

/// Build a proper list from a slice, rightmost cons allocated first so
/// each intermediate list is immediately a valid root for the next `cons`.
pub fn vec_to_list(
    heap: &mut crate::heap::Heap,
    cons_type: TypeCode,
    nil: Value,
    items: &[Value],
) -> Value {
    let mut list = nil;
    for item in items.iter().rev() {
        let id = heap.alloc(cons_type, Box::new(Cons::new(*item, list, cons_type)));
        list = Value::Ref(id);
    }
    list
}
