//! Callable cell types (§3 "Closure", "Subr"; §4.3 steps 4–5).
//!
//! `apply`'s dispatch (see `eval.rs`) special-cases these four core
//! callable shapes directly by type code before falling back to a type's
//! own `HAS_APPLY` hook for anything else. Bytecode objects and autoload
//! stubs are carried as real cell types so the dispatch table in `eval.rs`
//! has somewhere to land for both, even though neither a bytecode compiler
//! nor a library loader is in scope here (§1 Non-goals) — the slot exists
//! structurally, the same way the original always has a case for them even
//! on builds that never produce one.

use crate::throw::{LispError, Signal};
use crate::types::{Cell, TypeDescriptor};
use crate::value::{TypeCode, Value};
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;

/// Primitive arity shapes (§3 "Subr"). `Fixed` covers the 0–5 fixed-arity
/// forms; `L` collects every argument into one list value; `V` passes the
/// raw evaluated argument slice straight through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(u8),
    L,
    V,
}

impl Arity {
    pub fn accepts(self, argc: usize) -> bool {
        match self {
            Arity::Fixed(n) => argc == n as usize,
            Arity::L | Arity::V => true,
        }
    }
}

pub type SubrFn = fn(&mut crate::interpreter::Interpreter, &[Value]) -> Result<Value, Signal>;

pub struct Subr {
    pub name: &'static str,
    pub arity: Arity,
    pub func: SubrFn,
    type_code: TypeCode,
}

impl fmt::Debug for Subr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subr")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl Subr {
    pub fn new(name: &'static str, arity: Arity, func: SubrFn, type_code: TypeCode) -> Self {
        Self {
            name,
            arity,
            func,
            type_code,
        }
    }
}

impl Cell for Subr {
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

pub struct SubrDescriptor;

impl TypeDescriptor for SubrDescriptor {
    fn name(&self) -> &str {
        "subr"
    }

    fn print(&self, cell: &dyn Cell, out: &mut dyn fmt::Write) -> fmt::Result {
        let subr = cell.as_any().downcast_ref::<Subr>().expect("subr cell");
        write!(out, "#<subr {}>", subr.name)
    }
}

/// A user-defined function: parameter symbols, an optional rest parameter,
/// a body (sequence of forms evaluated as an implicit `progn`), and the
/// lexical environment captured at `lambda`-time.
#[derive(Debug, Clone)]
pub struct Closure {
    pub params: Vec<Value>,
    pub rest: Option<Value>,
    pub body: Vec<Value>,
    pub captured: Vec<(Value, Value)>,
    pub name: Option<Value>,
    type_code: TypeCode,
}

impl Closure {
    pub fn new(
        params: Vec<Value>,
        rest: Option<Value>,
        body: Vec<Value>,
        captured: Vec<(Value, Value)>,
        type_code: TypeCode,
    ) -> Self {
        Self {
            params,
            rest,
            body,
            captured,
            name: None,
            type_code,
        }
    }
}

impl Cell for Closure {
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

pub struct ClosureDescriptor;

impl TypeDescriptor for ClosureDescriptor {
    fn name(&self) -> &str {
        "closure"
    }

    fn print(&self, cell: &dyn Cell, out: &mut dyn fmt::Write) -> fmt::Result {
        let closure = cell.as_any().downcast_ref::<Closure>().expect("closure cell");
        match closure.name {
            Some(name) => write!(out, "#<closure {name}>"),
            None => write!(out, "#<closure anonymous>"),
        }
    }

    fn children(&self, cell: &dyn Cell) -> SmallVec<[Value; 4]> {
        let closure = cell.as_any().downcast_ref::<Closure>().expect("closure cell");
        let mut out = SmallVec::new();
        out.extend(closure.params.iter().copied());
        if let Some(rest) = closure.rest {
            out.push(rest);
        }
        out.extend(closure.body.iter().copied());
        for (k, v) in &closure.captured {
            out.push(*k);
            out.push(*v);
        }
        if let Some(name) = closure.name {
            out.push(name);
        }
        out
    }
}

/// Unrealized autoload placeholder (§4.3 step 5). Forcing one always fails:
/// there is no module loader in this runtime's scope.
#[derive(Debug, Clone)]
pub struct Autoload {
    pub symbol: Value,
    pub library: Value,
    type_code: TypeCode,
}

impl Autoload {
    pub fn new(symbol: Value, library: Value, type_code: TypeCode) -> Self {
        Self {
            symbol,
            library,
            type_code,
        }
    }

    pub fn force_error(&self) -> Signal {
        Signal::error(LispError::Error {
            message: "autoload is not supported in this runtime".to_string(),
            irritants: vec![self.symbol, self.library],
        })
    }
}

impl Cell for Autoload {
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

pub struct AutoloadDescriptor;

impl TypeDescriptor for AutoloadDescriptor {
    fn name(&self) -> &str {
        "autoload"
    }

    fn children(&self, cell: &dyn Cell) -> SmallVec<[Value; 4]> {
        let autoload = cell.as_any().downcast_ref::<Autoload>().expect("autoload cell");
        SmallVec::from_slice(&[autoload.symbol, autoload.library])
    }
}

/// Bytecode object placeholder. No compiler in this runtime ever produces
/// one; the type and dispatch slot exist so `eval.rs`'s apply switch is
/// total over §3's primary-type enumeration.
#[derive(Debug, Clone)]
pub struct BytecodeVector {
    pub code: Vec<u8>,
    pub constants: Vec<Value>,
    type_code: TypeCode,
}

impl BytecodeVector {
    pub fn new(code: Vec<u8>, constants: Vec<Value>, type_code: TypeCode) -> Self {
        Self {
            code,
            constants,
            type_code,
        }
    }
}

impl Cell for BytecodeVector {
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

pub struct BytecodeDescriptor;

impl TypeDescriptor for BytecodeDescriptor {
    fn name(&self) -> &str {
        "bytecode"
    }

    fn children(&self, cell: &dyn Cell) -> SmallVec<[Value; 4]> {
        let bc = cell
            .as_any()
            .downcast_ref::<BytecodeVector>()
            .expect("bytecode cell");
        SmallVec::from_slice(&bc.constants)
    }
}
