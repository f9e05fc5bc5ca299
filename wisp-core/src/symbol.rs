//! Symbols and the obarray (§3 "Primary types", §6).
//!
//! A symbol is a heap cell like any other — it participates in GC, compares
//! by identity once interned, and carries the two global slots (`value`,
//! `function`) that `eval.rs` consults for unqualified name lookup.

use crate::types::{Cell, CompareResult, TypeDescriptor};
use crate::value::{TypeCode, Value};
use smallvec::SmallVec;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug)]
pub struct Symbol {
    pub name: String,
    pub value: Option<Value>,
    pub function: Option<Value>,
    pub plist: Value,
    type_code: TypeCode,
}

impl Symbol {
    fn new(name: String, type_code: TypeCode) -> Self {
        Self {
            name,
            value: None,
            function: None,
            plist: Value::Int(0),
            type_code,
        }
    }
}

impl Cell for Symbol {
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

pub struct SymbolDescriptor;

impl TypeDescriptor for SymbolDescriptor {
    fn name(&self) -> &str {
        "symbol"
    }

    fn compare(&self, a: &dyn Cell, b: &dyn Cell) -> CompareResult {
        let a = a.as_any().downcast_ref::<Symbol>().expect("symbol cell");
        let b = b.as_any().downcast_ref::<Symbol>().expect("symbol cell");
        if a.name == b.name {
            CompareResult::Order(std::cmp::Ordering::Equal)
        } else {
            CompareResult::Incomparable
        }
    }

    fn print(&self, cell: &dyn Cell, out: &mut dyn fmt::Write) -> fmt::Result {
        let symbol = cell.as_any().downcast_ref::<Symbol>().expect("symbol cell");
        write!(out, "{}", symbol.name)
    }

    fn children(&self, cell: &dyn Cell) -> SmallVec<[Value; 4]> {
        let symbol = cell.as_any().downcast_ref::<Symbol>().expect("symbol cell");
        let mut out = SmallVec::new();
        if let Some(v) = symbol.value {
            out.push(v);
        }
        if let Some(f) = symbol.function {
            out.push(f);
        }
        out.push(symbol.plist);
        out
    }
}

/// The obarray: interns symbol names to a single canonical heap cell so
/// that `eq` on symbols is pointer/id equality (§3 invariants).
pub struct SymbolTable {
    type_code: TypeCode,
    interned: HashMap<String, Value>,
}

impl SymbolTable {
    pub fn new(type_code: TypeCode) -> Self {
        Self {
            type_code,
            interned: HashMap::new(),
        }
    }

    pub fn type_code(&self) -> TypeCode {
        self.type_code
    }

    /// Look up an already-interned symbol without allocating.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.interned.get(name).copied()
    }

    /// Intern `name`, allocating a fresh symbol cell on first use.
    pub fn intern(&mut self, heap: &mut crate::heap::Heap, name: &str) -> Value {
        if let Some(existing) = self.interned.get(name) {
            return *existing;
        }
        let cell = Box::new(Symbol::new(name.to_string(), self.type_code));
        let id = heap.alloc_with_flags(self.type_code, cell, crate::header::CellFlags::STATIC);
        let value = Value::Ref(id);
        self.interned.insert(name.to_string(), value);
        value
    }

    pub fn all(&self) -> impl Iterator<Item = &Value> {
        self.interned.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;

    #[test]
    fn interning_is_idempotent() {
        let mut heap = Heap::new(1 << 20);
        let mut table = SymbolTable::new(0);
        let a = table.intern(&mut heap, "foo");
        let b = table.intern(&mut heap, "foo");
        assert_eq!(a, b);
        let c = table.intern(&mut heap, "bar");
        assert_ne!(a, c);
    }
}
