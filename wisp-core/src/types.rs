//! Value representation and type registry (§4.1).
//!
//! Every heap cell carries a [`TypeCode`] that indexes into a process-wide,
//! append-only [`TypeRegistry`]. A type's behavior lives entirely in its
//! [`TypeDescriptor`]; per the trait-object-registry design note (§9),
//! missing capabilities are an explicit default, never a null pointer.
//!
//! The GC's "mark" and "mark-type" hooks (§4.2) are expressed here as
//! [`TypeDescriptor::children`] and [`TypeDescriptor::extra_roots`]: both
//! return owned data rather than calling back into a live marker, so the
//! collector can walk an explicit worklist (see `gc.rs`) without fighting
//! the borrow checker over a cell that is simultaneously being read and
//! having its mark bit flipped.

use crate::header::CellFlags;
use crate::interpreter::Interpreter;
use crate::throw::Signal;
use crate::value::{CellId, TypeCode, Value};
use smallvec::SmallVec;
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::io;

/// A heap-resident object. Concrete cell types (cons, symbol, vector, ...)
/// implement this so the heap can store them behind `Box<dyn Cell>` while
/// the type registry downcasts back to the concrete type when a hook needs
/// it.
pub trait Cell: fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn type_code(&self) -> TypeCode;
}

/// Result of [`TypeDescriptor::compare`]. Unequal primary types are always
/// `Incomparable`, per §4.1; comparison never panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Order(Ordering),
    Incomparable,
}

/// Opaque token returned by [`TypeDescriptor::bind`] and handed back to
/// [`TypeDescriptor::unbind`] on every exit path from
/// `call_with_object` (§4.3).
pub struct BindHandle(pub Box<dyn Any>);

bitflags::bitflags! {
    /// Capability flags advertised by a descriptor, mirroring §4.1's
    /// "flag set including HAS_APPLY". These are a documentation/fast-path
    /// convenience; the authoritative answer to "can I call this hook" is
    /// always whether the corresponding method returned `Some`/non-default.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorFlags: u32 {
        const HAS_APPLY   = 0b0000_0001;
        const HAS_STREAM  = 0b0000_0010;
        const HAS_COMPARE = 0b0000_0100;
        const HAS_PRINT   = 0b0000_1000;
    }
}

/// Per-type behavior. One instance per registered primary type, looked up
/// by [`TypeCode`] — not per object. Single-threaded by design (§5: no
/// thread-parallel evaluation), so descriptors are free to use interior
/// mutability (`RefCell`) for bookkeeping that outlives any one cell, the
/// way [`crate::datum::DatumDescriptor`] tracks per-identity printers.
pub trait TypeDescriptor {
    fn name(&self) -> &str;

    fn flags(&self) -> DescriptorFlags {
        DescriptorFlags::empty()
    }

    /// Compare two cells of this type. Called only when both cells share
    /// this descriptor's type code; the registry handles the
    /// unequal-primary-type case itself.
    fn compare(&self, _a: &dyn Cell, _b: &dyn Cell) -> CompareResult {
        CompareResult::Incomparable
    }

    /// Print hook. Default yields `#<opaque NAME>` per §4.1.
    fn print(&self, _cell: &dyn Cell, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(out, "#<opaque {}>", self.name())
    }

    /// Values this cell directly references (the GC "mark" hook, §4.2a).
    /// The collector marks each returned value and continues the walk from
    /// there; this method itself must not recurse.
    fn children(&self, _cell: &dyn Cell) -> SmallVec<[Value; 4]> {
        SmallVec::new()
    }

    /// Additional roots owned by the type itself rather than reachable
    /// through the value graph (the GC "mark-type" hook, §4.2a(d)). Given
    /// the full instance list for this type (id plus current flags so the
    /// hook can filter, e.g. sockets keeping only `ACTIVE` ones live).
    fn extra_roots(&self, _instances: &[(CellId, CellFlags)]) -> SmallVec<[CellId; 4]> {
        SmallVec::new()
    }

    /// Called immediately before an unmarked instance of this type is
    /// reclaimed during sweep, so the type can release external resources
    /// (e.g. a socket closing its fd).
    fn on_reclaim(&self, _cell: &mut dyn Cell) {}

    /// Apply hook for user-defined callable types (§4.3 step 5, last
    /// branch). `None` means this type does not support `HAS_APPLY`.
    fn apply(
        &self,
        _cell: &dyn Cell,
        _args: &[Value],
        _interp: &mut Interpreter,
        _tail: bool,
    ) -> Option<Result<Value, Signal>> {
        None
    }

    /// Sink-stream putc hook (§6 stream protocol). `None` means this type
    /// is not a writable character stream.
    fn putc(&self, _cell: &mut dyn Cell, _ch: char) -> Option<io::Result<()>> {
        None
    }

    /// Sink-stream puts hook. `None` means this type is not a writable
    /// byte/string stream.
    fn puts(&self, _cell: &mut dyn Cell, _bytes: &[u8], _is_interned: bool) -> Option<io::Result<usize>> {
        None
    }

    /// Per-identity printer lookup (§4.5). Only meaningful for the datum
    /// type; every other descriptor takes the default `None`. Kept as a
    /// capability hook rather than a downcast so `Interpreter::print_value`
    /// doesn't need `TypeDescriptor: Any`.
    fn datum_printer_for(&self, _identity: Value) -> Option<Value> {
        None
    }

    /// Register a printer for `identity` (§4.5 `define-datum-printer`).
    /// Default is a no-op; only the datum descriptor overrides it.
    fn register_datum_printer(&self, _identity: Value, _printer: Value) {}

    /// Scoped-activation bind hook (§4.1, used by `call_with_object`).
    fn bind(&self, _cell: &mut dyn Cell) -> Option<BindHandle> {
        None
    }

    /// Undo a prior `bind`. Called on every exit path, value or exception.
    fn unbind(&self, _cell: &mut dyn Cell, _handle: BindHandle) {}
}

/// The process-wide, append-only type table (§4.1).
///
/// Core types occupy the low, reserved range; `register` hands out the
/// next free code for extension types (vectors, sockets, and anything a
/// future plugin defines), exactly the "second 16-bit type-code range"
/// described in §3.
pub struct TypeRegistry {
    descriptors: Vec<Box<dyn TypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    /// Register a new primary type, returning its dense `TypeCode`.
    pub fn register(&mut self, descriptor: Box<dyn TypeDescriptor>) -> TypeCode {
        let code = self.descriptors.len() as TypeCode;
        tracing::debug!(type_code = code, name = descriptor.name(), "register-type");
        self.descriptors.push(descriptor);
        code
    }

    pub fn get(&self, code: TypeCode) -> &dyn TypeDescriptor {
        self.descriptors[code as usize].as_ref()
    }

    pub fn name_of(&self, code: TypeCode) -> &str {
        self.get(code).name()
    }

    /// Reverse lookup by name. Extension crates use this to recover the
    /// `TypeCode` they were assigned at registration time from inside a
    /// `fn`-pointer subr body, which cannot itself capture the code as a
    /// closure (subrs are plain function pointers, §3 "Subr").
    pub fn find_by_name(&self, name: &str) -> Option<TypeCode> {
        self.descriptors
            .iter()
            .position(|d| d.name() == name)
            .map(|i| i as TypeCode)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("count", &self.descriptors.len())
            .finish()
    }
}
