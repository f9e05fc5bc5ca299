//! Value: what the interpreter talks about
//!
//! A uniform value with two encodings, per the tagged-union design note:
//! an immediate small integer, or a reference into the heap. Unlike the
//! original word-and-low-bit-tag trick, this is a plain Rust sum type —
//! the heap reference is an index into [`crate::heap::Heap`], not a raw
//! pointer, so there is nothing here for the borrow checker to fight.

use std::fmt;

/// Dense, append-only index of a registered primary type.
///
/// Core types are assigned low codes at startup (see
/// [`crate::types::CORE_TYPE_COUNT`]); extension crates receive codes from
/// [`crate::types::TypeRegistry::register`] starting where the core left
/// off, matching the two-range split in §3 ("Primary types").
pub type TypeCode = u16;

/// An index into the heap's cell slab. Stable for the lifetime of the cell;
/// recycled (with no generation check — single-threaded, GC-governed
/// liveness makes use-after-free of a stale `CellId` a programming error,
/// not a data race) once the cell is swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub(crate) u32);

impl CellId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<cell {}>", self.0)
    }
}

/// The uniform value.
///
/// `Int` is the immediate encoding (no allocation, no GC involvement).
/// `Ref` is the heap-cell encoding; its referent's primary type is found by
/// looking up the cell's [`TypeCode`] in the process-wide type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Ref(CellId),
}

impl Value {
    pub fn is_int(self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_ref(self) -> bool {
        matches!(self, Value::Ref(_))
    }

    pub fn as_int(self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(n),
            Value::Ref(_) => None,
        }
    }

    pub fn as_cell_id(self) -> Option<CellId> {
        match self {
            Value::Ref(id) => Some(id),
            Value::Int(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Ref(id) => write!(f, "{id}"),
        }
    }
}
