//! Per-cell header flags.
//!
//! The C original packs these into spare bits of the cell's first word
//! (§3 "Cell header"). Here they live alongside the cell in the heap slot
//! (see [`crate::heap::Slot`]) rather than inside the boxed cell itself —
//! the registry's hooks never need to see them, only the heap does.

use bitflags::bitflags;

bitflags! {
    /// Status bits tracked per heap cell.
    ///
    /// `MARKED` and `STATIC` are core invariants (§3). The remaining bits
    /// are free for extension types to stash type-specific status (the
    /// spec's examples are socket `ACTIVE`/`REGISTERED`); core never reads
    /// them, it only preserves them across GC.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CellFlags: u16 {
        /// Set during mark, cleared during sweep. Zero between collections.
        const MARKED = 0b0000_0001;
        /// Statically allocated; excluded from sweep, never reclaimed.
        const STATIC = 0b0000_0010;
        /// Vector-specific: rejects all further element mutation.
        const IMMUTABLE = 0b0000_0100;
        /// Socket-specific: fd >= 0 and the socket participates in GC roots.
        const ACTIVE = 0b0000_1000;
        /// Socket-specific: fd is installed in the reactor.
        const REGISTERED = 0b0001_0000;
    }
}

impl Default for CellFlags {
    fn default() -> Self {
        CellFlags::empty()
    }
}
