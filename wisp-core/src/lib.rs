//! Core substrate for a Lisp-family interpreter.
//!
//! This crate is the load-bearing middle of a language runtime: a uniform
//! [`Value`](value::Value), a process-wide [`TypeRegistry`](types::TypeRegistry)
//! that lets new primary types plug in without touching this crate, a
//! mark-and-sweep [`Heap`](heap::Heap), the universal
//! [`Interpreter::apply`](interpreter::Interpreter::apply) engine, and the
//! [`Datum`](datum::Datum) facility for carrying opaque user values safely.
//!
//! `wisp-ext` builds the two illustrative extension types (a vector
//! container and a socket stream) on top of the contract defined here; this
//! crate itself has no I/O and no extension types baked in.

pub mod builtins;
pub mod callable;
pub mod cons;
pub mod datum;
pub mod diagnostics;
pub mod eval;
pub mod gc;
pub mod header;
pub mod heap;
pub mod interpreter;
pub mod roots;
pub mod stack;
pub mod symbol;
pub mod throw;
pub mod types;
pub mod value;

pub use interpreter::Interpreter;
pub use throw::{LispError, Signal};
pub use types::{Cell, TypeDescriptor, TypeRegistry};
pub use value::{CellId, TypeCode, Value};
