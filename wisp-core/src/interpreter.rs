//! The interpreter context (§9 Design Note 4).
//!
//! One `Interpreter` owns everything a running evaluation needs: the heap,
//! the type registry, the obarray, the call stack, the pending-exception
//! slot, and the two tunable knobs (§4.2, §4.3). Extension crates register
//! their types against an `Interpreter` at startup and get back the
//! `TypeCode`s they need to allocate and recognize their own cells.

use crate::callable::{
    Arity, Autoload, AutoloadDescriptor, BytecodeDescriptor, Closure, ClosureDescriptor, Subr,
    SubrDescriptor, SubrFn,
};
use crate::cons::{Cons, ConsDescriptor};
use crate::datum::DatumDescriptor;
use crate::gc::{self, GcStats};
use crate::heap::Heap;
use crate::roots::{RootGuard, Roots};
use crate::stack::{CallStack, Frame};
use crate::symbol::{Symbol, SymbolDescriptor, SymbolTable};
use crate::throw::{LispError, Signal};
use crate::types::{Cell, TypeCode, TypeRegistry};
use crate::value::Value;
use smallvec::{smallvec, SmallVec};

/// Default recursion limit (§3 Invariants, §8 scenario 2).
pub const DEFAULT_MAX_LISP_DEPTH: usize = 250;
/// Default GC trigger threshold (§4.2), approximately 200 KiB.
pub const DEFAULT_GC_THRESHOLD_BYTES: usize = 200 * 1024;

pub struct Interpreter {
    pub heap: Heap,
    pub registry: TypeRegistry,
    pub symbols: SymbolTable,
    pub call_stack: CallStack,
    pub roots: Roots,
    pub pending: Option<Signal>,

    pub cons_type: TypeCode,
    pub symbol_type: TypeCode,
    pub subr_type: TypeCode,
    pub closure_type: TypeCode,
    pub autoload_type: TypeCode,
    pub bytecode_type: TypeCode,
    pub datum_type: TypeCode,

    pub nil: Value,
    pub t: Value,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_LISP_DEPTH, DEFAULT_GC_THRESHOLD_BYTES)
    }

    pub fn with_config(max_lisp_depth: usize, gc_threshold_bytes: usize) -> Self {
        let mut heap = Heap::new(gc_threshold_bytes);
        let mut registry = TypeRegistry::new();

        let symbol_type = registry.register(Box::new(SymbolDescriptor));
        let cons_type = registry.register(Box::new(ConsDescriptor));
        let subr_type = registry.register(Box::new(SubrDescriptor));
        let closure_type = registry.register(Box::new(ClosureDescriptor));
        let autoload_type = registry.register(Box::new(AutoloadDescriptor));
        let bytecode_type = registry.register(Box::new(BytecodeDescriptor));
        let datum_type = registry.register(Box::new(DatumDescriptor::new()));

        let mut symbols = SymbolTable::new(symbol_type);
        let nil = symbols.intern(&mut heap, "nil");
        let t = symbols.intern(&mut heap, "t");

        let mut interp = Self {
            heap,
            registry,
            symbols,
            call_stack: CallStack::new(max_lisp_depth),
            roots: Roots::new(),
            pending: None,
            cons_type,
            symbol_type,
            subr_type,
            closure_type,
            autoload_type,
            bytecode_type,
            datum_type,
            nil,
            t,
        };
        crate::builtins::install(&mut interp);
        interp
    }

    pub fn max_lisp_depth(&self) -> usize {
        self.call_stack.max_depth()
    }

    pub fn set_max_lisp_depth(&mut self, depth: usize) {
        self.call_stack.set_max_depth(depth);
    }

    pub fn gc_threshold_bytes(&self) -> usize {
        self.heap.gc_threshold_bytes()
    }

    pub fn set_gc_threshold_bytes(&mut self, bytes: usize) {
        self.heap.set_gc_threshold_bytes(bytes);
    }

    /// Force a collection regardless of the current heap size (§4.2).
    ///
    /// `statics` is the whole obarray, not just `nil`/`t`: every interned
    /// symbol cell is `STATIC`-flagged and so always survives sweep, but
    /// sweep surviving a cell is not the same as the mark phase tracing its
    /// children. A symbol's `value`/`function`/`plist` slots are ordinary
    /// heap references reachable only by walking `children()` from a marked
    /// root — without seeding the obarray here, a top-level `(define f
    /// (lambda ...))` with no other reference to `f`'s closure would have
    /// that closure collected out from under the still-live symbol.
    pub fn collect_garbage(&mut self) -> GcStats {
        let statics: Vec<Value> = self.symbols.all().copied().collect();
        gc::collect(
            &mut self.heap,
            &self.registry,
            &self.call_stack,
            &self.roots,
            &statics,
        )
    }

    fn maybe_collect(&mut self) {
        if self.heap.over_threshold() {
            self.collect_garbage();
        }
    }

    pub fn register_type(&mut self, descriptor: Box<dyn crate::types::TypeDescriptor>) -> TypeCode {
        self.registry.register(descriptor)
    }

    pub fn intern(&mut self, name: &str) -> Value {
        self.symbols.intern(&mut self.heap, name)
    }

    pub fn root_scope(&self, values: &[Value]) -> RootGuard {
        self.roots.scope(values)
    }

    pub fn cons(&mut self, car: Value, cdr: Value) -> Value {
        self.maybe_collect();
        let id = self
            .heap
            .alloc(self.cons_type, Box::new(Cons::new(car, cdr, self.cons_type)));
        Value::Ref(id)
    }

    pub fn is_true(&self, value: Value) -> bool {
        value != self.nil
    }

    pub fn define_subr(&mut self, name: &'static str, arity: Arity, func: SubrFn) {
        let id = self
            .heap
            .alloc_with_flags(
                self.subr_type,
                Box::new(Subr::new(name, arity, func, self.subr_type)),
                crate::header::CellFlags::STATIC,
            );
        let symbol = self.intern(name);
        self.set_function(symbol, Value::Ref(id));
    }

    fn symbol_mut(&mut self, symbol: Value) -> &mut Symbol {
        let id = symbol.as_cell_id().expect("symbol value");
        self.heap
            .cell_mut(id)
            .as_any_mut()
            .downcast_mut::<Symbol>()
            .expect("symbol cell")
    }

    fn symbol_ref(&self, symbol: Value) -> &Symbol {
        let id = symbol.as_cell_id().expect("symbol value");
        self.heap
            .cell(id)
            .as_any()
            .downcast_ref::<Symbol>()
            .expect("symbol cell")
    }

    pub fn set_function(&mut self, symbol: Value, function: Value) {
        self.symbol_mut(symbol).function = Some(function);
    }

    pub fn function_of(&self, symbol: Value) -> Option<Value> {
        self.symbol_ref(symbol).function
    }

    pub fn set_value(&mut self, symbol: Value, value: Value) {
        self.symbol_mut(symbol).value = Some(value);
    }

    pub fn value_of(&self, symbol: Value) -> Option<Value> {
        self.symbol_ref(symbol).value
    }

    pub fn symbol_name(&self, symbol: Value) -> Option<&str> {
        match symbol {
            Value::Ref(id) if self.heap.is_live(id) && self.heap.type_code(id) == self.symbol_type => {
                Some(&self.symbol_ref(symbol).name)
            }
            _ => None,
        }
    }

    /// Render `value` to its printed representation (§4.1, §4.5). Datums
    /// with a registered printer call back into the evaluator for their
    /// replacement value; datums with none print as `#<datum NAME>` using
    /// the identity symbol's own name. Both cases need `Interpreter` access
    /// (evaluator re-entry for the first, the obarray for the second) that
    /// `DatumDescriptor::print`'s generic hook doesn't have, so datums are
    /// handled here rather than falling through to the registry.
    pub fn print_value(&mut self, value: Value) -> Result<String, Signal> {
        if let Value::Ref(id) = value {
            if self.heap.is_live(id) && self.heap.type_code(id) == self.datum_type {
                let identity = self
                    .heap
                    .cell(id)
                    .as_any()
                    .downcast_ref::<crate::datum::Datum>()
                    .expect("datum cell")
                    .identity;
                if let Some(printer) = self.registry.get(self.datum_type).datum_printer_for(identity) {
                    let rendered = self.apply(printer, &[value], false)?;
                    return self.print_value(rendered);
                }
                let name = self.symbol_name(identity).unwrap_or("?");
                return Ok(format!("#<datum {name}>"));
            }
        }
        let mut out = String::new();
        match value {
            Value::Int(_) => {
                use std::fmt::Write;
                write!(out, "{value}").expect("String write is infallible");
            }
            Value::Ref(id) => {
                let type_code = self.heap.type_code(id);
                self.registry
                    .get(type_code)
                    .print(self.heap.cell(id), &mut out)
                    .expect("String write is infallible");
            }
        }
        Ok(out)
    }

    /// Compare two values for `value-compare`/`vector-compare` (§4.1).
    /// `Int`/`Int` compares numerically; a `Ref`/`Ref` pair compares only
    /// when both share a primary type, deferring to that type's
    /// [`TypeDescriptor::compare`]; every other pairing — mismatched
    /// primary types, or an `Int` against a `Ref` — is `Incomparable`.
    pub fn value_compare(&self, a: Value, b: Value) -> crate::types::CompareResult {
        use crate::types::CompareResult;
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => CompareResult::Order(x.cmp(&y)),
            (Value::Ref(id_a), Value::Ref(id_b)) => {
                if !self.heap.is_live(id_a) || !self.heap.is_live(id_b) {
                    return CompareResult::Incomparable;
                }
                let type_a = self.heap.type_code(id_a);
                let type_b = self.heap.type_code(id_b);
                if type_a != type_b {
                    return CompareResult::Incomparable;
                }
                self.registry.get(type_a).compare(self.heap.cell(id_a), self.heap.cell(id_b))
            }
            _ => CompareResult::Incomparable,
        }
    }

    /// Schedules an asynchronous interrupt: the next call to [`apply`]
    /// raises it instead of dispatching. The hook a host's signal handler
    /// or reactor timeout uses to unwind a runaway evaluation without
    /// having a `Result` to return through (§7 `LispError::Interrupt`).
    ///
    /// [`apply`]: Interpreter::apply
    pub fn request_interrupt(&mut self) {
        self.pending = Some(Signal::error(LispError::Interrupt));
    }

    /// The universal apply engine (§4.3). Step 1 checks the
    /// pending-exception slot before dispatching, so an interrupt
    /// scheduled by [`request_interrupt`] between evaluation steps is
    /// raised here instead of silently dropped. Step 6's "exactly one of
    /// (value, pending-exception)" is enforced on every return: success
    /// clears the slot — coercing the one case it's still somehow set into
    /// a logged [`diagnostics::invariant_violation`] rather than leaving
    /// the two fall out of sync — and failure fills it with the
    /// propagating signal so `catch` and backtrace formatting can observe
    /// an unwind in flight without the `Result` itself in hand.
    ///
    /// [`request_interrupt`]: Interpreter::request_interrupt
    pub fn apply(&mut self, fun: Value, args: &[Value], tail: bool) -> Result<Value, Signal> {
        if let Some(signal) = self.pending.take() {
            return Err(signal);
        }
        let result = self.apply_dispatch(fun, args, tail);
        match &result {
            Ok(_) => {
                if self.pending.take().is_some() {
                    crate::diagnostics::invariant_violation(
                        "apply returned a value with a pending exception still set",
                        "clearing the stale pending exception to restore the value/pending-exception invariant",
                    );
                }
            }
            Err(signal) => self.pending = Some(signal.clone()),
        }
        result
    }

    fn apply_dispatch(&mut self, fun: Value, args: &[Value], tail: bool) -> Result<Value, Signal> {
        self.maybe_collect();

        let id = match fun {
            Value::Int(_) => return Err(Signal::error(LispError::InvalidFunction { callee: fun })),
            Value::Ref(id) if self.heap.is_live(id) => id,
            Value::Ref(_) => return Err(Signal::error(LispError::InvalidFunction { callee: fun })),
        };
        let type_code = self.heap.type_code(id);

        if type_code == self.subr_type {
            return self.apply_subr(id, fun, args, tail);
        }
        if type_code == self.closure_type {
            return self.apply_closure(id, fun, args, tail);
        }
        if type_code == self.autoload_type {
            let autoload = self
                .heap
                .cell(id)
                .as_any()
                .downcast_ref::<Autoload>()
                .expect("autoload cell");
            return Err(autoload.force_error());
        }
        if type_code == self.bytecode_type {
            return Err(Signal::error(LispError::Error {
                message: "bytecode execution is not implemented".to_string(),
                irritants: Vec::new(),
            }));
        }

        // Last branch of §4.3 step 5: an extension-registered applicable
        // type. Check the cell out of the heap so the descriptor can hold
        // `&mut Interpreter` (needed to recurse into `apply`/`eval`) at the
        // same time as the cell's own data.
        let cell = self.heap.checkout(id);
        let outcome = self.registry.get(type_code).apply(cell.as_ref(), args, self, tail);
        self.heap.checkin(id, cell);
        match outcome {
            Some(result) => result,
            None => Err(Signal::error(LispError::InvalidFunction { callee: fun })),
        }
    }

    fn apply_subr(&mut self, id: crate::value::CellId, fun: Value, args: &[Value], tail: bool) -> Result<Value, Signal> {
        let (name, arity, func) = {
            let subr = self
                .heap
                .cell(id)
                .as_any()
                .downcast_ref::<Subr>()
                .expect("subr cell");
            (subr.name, subr.arity, subr.func)
        };
        if !arity.accepts(args.len()) {
            return Err(Signal::error(LispError::MissingArg { index: args.len() + 1 }));
        }
        let frame = Frame::new(fun, SmallVec::from_slice(args), tail).named(name);
        self.call_stack.try_push(frame)?;
        let call_args: SmallVec<[Value; 4]> = match arity {
            Arity::Fixed(_) | Arity::V => SmallVec::from_slice(args),
            Arity::L => smallvec![crate::cons::vec_to_list(&mut self.heap, self.cons_type, self.nil, args)],
        };
        let result = func(self, &call_args);
        self.call_stack.pop();
        result
    }

    fn apply_closure(&mut self, id: crate::value::CellId, fun: Value, args: &[Value], tail: bool) -> Result<Value, Signal> {
        let closure = self
            .heap
            .cell(id)
            .as_any()
            .downcast_ref::<Closure>()
            .expect("closure cell")
            .clone();

        if args.len() < closure.params.len() || (closure.rest.is_none() && args.len() > closure.params.len()) {
            return Err(Signal::error(LispError::MissingArg {
                index: closure.params.len(),
            }));
        }

        let name = closure
            .name
            .and_then(|n| self.symbol_name(n).map(str::to_string));
        let mut frame = Frame::new(fun, SmallVec::from_slice(args), tail);
        if let Some(name) = name {
            frame = frame.named(name);
        }
        self.call_stack.try_push(frame)?;

        let mut env = closure.captured.clone();
        for (param, value) in closure.params.iter().zip(args.iter()) {
            env.push((*param, *value));
        }
        if let Some(rest) = closure.rest {
            let rest_args = &args[closure.params.len()..];
            let rest_list = crate::cons::vec_to_list(&mut self.heap, self.cons_type, self.nil, rest_args);
            env.push((rest, rest_list));
        }

        let mut result = Ok(self.nil);
        for (index, form) in closure.body.iter().enumerate() {
            let is_last = index + 1 == closure.body.len();
            result = self.eval(*form, &mut env, is_last && tail);
            if result.is_err() {
                break;
            }
        }
        self.call_stack.pop();
        result
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
