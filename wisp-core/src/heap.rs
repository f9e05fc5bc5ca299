//! The cell slab (§4.2).
//!
//! A plain `Vec` of slots plus a free list of recycled indices — the same
//! shape as the socket free-list registry this workspace's teacher code
//! used for live connection handles, generalized from "socket handles" to
//! "every heap cell". Bump allocation was considered (see `DESIGN.md`) and
//! dropped: a bump arena never reclaims an individual cell, which conflicts
//! directly with per-cell sweep.

use crate::header::CellFlags;
use crate::types::Cell;
use crate::value::{CellId, TypeCode};
use std::mem;

struct Slot {
    cell: Box<dyn Cell>,
    type_code: TypeCode,
    flags: CellFlags,
}

/// Owns every heap cell in the interpreter. Indices (`CellId`) are stable
/// for a cell's lifetime and are recycled, with no generation counter, once
/// swept — see the note on [`CellId`](crate::value::CellId).
pub struct Heap {
    slots: Vec<Option<Slot>>,
    free: Vec<u32>,
    live_count: usize,
    live_bytes: usize,
    gc_threshold_bytes: usize,
}

impl Heap {
    pub fn new(gc_threshold_bytes: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live_count: 0,
            live_bytes: 0,
            gc_threshold_bytes,
        }
    }

    pub fn gc_threshold_bytes(&self) -> usize {
        self.gc_threshold_bytes
    }

    pub fn set_gc_threshold_bytes(&mut self, bytes: usize) {
        self.gc_threshold_bytes = bytes;
    }

    /// True once live bytes have grown enough to warrant a collection
    /// (§4.2: "tunable at runtime", checked by the caller before each
    /// allocation that would grow the heap).
    pub fn over_threshold(&self) -> bool {
        self.live_bytes >= self.gc_threshold_bytes
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    /// Allocate a new cell, returning its stable id. Never triggers GC
    /// itself — callers check [`Heap::over_threshold`] and collect first.
    pub fn alloc(&mut self, type_code: TypeCode, cell: Box<dyn Cell>) -> CellId {
        let size = mem::size_of_val(&*cell);
        let slot = Slot {
            cell,
            type_code,
            flags: CellFlags::empty(),
        };
        self.live_count += 1;
        self.live_bytes += size;
        let index = if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(slot);
            index
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Some(slot));
            index
        };
        CellId(index)
    }

    /// Allocate a cell with a flag set already applied (e.g. a socket cell
    /// that starts life `ACTIVE`).
    pub fn alloc_with_flags(
        &mut self,
        type_code: TypeCode,
        cell: Box<dyn Cell>,
        flags: CellFlags,
    ) -> CellId {
        let id = self.alloc(type_code, cell);
        self.set_flags(id, flags);
        id
    }

    fn slot(&self, id: CellId) -> &Slot {
        self.slots[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("use of reclaimed {id}"))
    }

    fn slot_mut(&mut self, id: CellId) -> &mut Slot {
        self.slots[id.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("use of reclaimed {id}"))
    }

    pub fn cell(&self, id: CellId) -> &dyn Cell {
        self.slot(id).cell.as_ref()
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut dyn Cell {
        self.slot_mut(id).cell.as_mut()
    }

    pub fn type_code(&self, id: CellId) -> TypeCode {
        self.slot(id).type_code
    }

    pub fn flags(&self, id: CellId) -> CellFlags {
        self.slot(id).flags
    }

    pub fn set_flags(&mut self, id: CellId, flags: CellFlags) {
        self.slot_mut(id).flags.insert(flags);
    }

    pub fn clear_flags(&mut self, id: CellId, flags: CellFlags) {
        self.slot_mut(id).flags.remove(flags);
    }

    pub fn is_live(&self, id: CellId) -> bool {
        self.slots
            .get(id.index())
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Every currently-live cell id, for the GC's instance-listing pass
    /// (`extra_roots`) and sweep. Order is slot order, not allocation order.
    pub fn live_ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref().map(|_| CellId(index as u32))
        })
    }

    /// Reclaim a dead cell. Caller (the sweep phase) is responsible for
    /// having already run the type's `on_reclaim` hook.
    pub(crate) fn reclaim(&mut self, id: CellId) {
        if let Some(slot) = self.slots[id.index()].take() {
            let size = mem::size_of_val(&*slot.cell);
            self.live_count -= 1;
            self.live_bytes = self.live_bytes.saturating_sub(size);
        }
        self.free.push(id.0);
    }

    /// Temporarily remove a cell's contents, leaving its id's type code and
    /// flags intact, so a caller can hold the cell by value across a call
    /// that also needs a live `&mut` to the rest of the interpreter (the
    /// generic apply-hook dispatch in `eval.rs` is the one place this is
    /// needed: a descriptor's `apply` takes both the callee cell and
    /// `&mut Interpreter`, and the callee cell lives inside that same
    /// interpreter's heap). Must be paired with [`Heap::checkin`].
    pub fn checkout(&mut self, id: CellId) -> Box<dyn Cell> {
        mem::replace(&mut self.slot_mut(id).cell, Box::new(Tombstone))
    }

    pub fn checkin(&mut self, id: CellId, cell: Box<dyn Cell>) {
        self.slot_mut(id).cell = cell;
    }
}

/// Placeholder occupying a slot mid-[`Heap::checkout`]. Never observed by
/// anything outside this module.
#[derive(Debug)]
struct Tombstone;

impl Cell for Tombstone {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn type_code(&self) -> TypeCode {
        TypeCode::MAX
    }
}
