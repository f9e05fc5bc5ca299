//! Mark-and-sweep collection (§4.2).
//!
//! Roots come from three places, matching §4.2a's enumeration: the scoped
//! [`Roots`] table, every live [`CallStack`] frame, and statically pinned
//! values. A fourth source, the "mark-type" hook, lets a type claim extra
//! roots the value graph alone would never reach (an active socket cell
//! that nothing currently references but that is still doing I/O).
//!
//! The walk is iterative over an explicit worklist rather than recursive
//! through [`TypeDescriptor::children`] calling back into the marker — see
//! the module comment on `types.rs` for why.

use crate::heap::Heap;
use crate::roots::Roots;
use crate::stack::CallStack;
use crate::types::TypeRegistry;
use crate::value::{CellId, Value};
use std::collections::HashMap;

/// Per-cycle accounting, logged at `debug` level by the interpreter.
#[derive(Debug, Clone)]
pub struct GcStats {
    pub bytes_before: usize,
    pub bytes_after: usize,
    pub cells_before: usize,
    pub cells_after: usize,
    pub reclaimed_by_type: Vec<(String, usize)>,
}

/// Run one full mark-and-sweep cycle. `statics` are process-pinned values
/// (e.g. the symbol table's own backing cells) that are always roots
/// regardless of the call stack or root-guard state.
pub fn collect(
    heap: &mut Heap,
    registry: &TypeRegistry,
    call_stack: &CallStack,
    roots: &Roots,
    statics: &[Value],
) -> GcStats {
    let bytes_before = heap.live_bytes();
    let cells_before = heap.live_count();

    let mut instances_by_type: HashMap<u16, Vec<(CellId, crate::header::CellFlags)>> =
        HashMap::new();
    for id in heap.live_ids() {
        instances_by_type
            .entry(heap.type_code(id))
            .or_default()
            .push((id, heap.flags(id)));
    }

    let mut worklist: Vec<CellId> = Vec::new();
    let mut mark_value = |heap: &mut Heap, worklist: &mut Vec<CellId>, value: Value| {
        if let Value::Ref(id) = value {
            if heap.is_live(id) {
                let flags = heap.flags(id);
                if !flags.contains(crate::header::CellFlags::MARKED) {
                    heap.set_flags(id, crate::header::CellFlags::MARKED);
                    worklist.push(id);
                }
            }
        }
    };

    for value in roots.snapshot() {
        mark_value(heap, &mut worklist, value);
    }
    for value in call_stack.root_values() {
        mark_value(heap, &mut worklist, value);
    }
    for value in statics {
        mark_value(heap, &mut worklist, *value);
    }
    for code in 0..registry.len() as u16 {
        let descriptor = registry.get(code);
        let instances = instances_by_type.get(&code).map(Vec::as_slice).unwrap_or(&[]);
        for id in descriptor.extra_roots(instances) {
            mark_value(heap, &mut worklist, Value::Ref(id));
        }
    }

    while let Some(id) = worklist.pop() {
        let type_code = heap.type_code(id);
        let descriptor = registry.get(type_code);
        let children = descriptor.children(heap.cell(id));
        for child in children {
            mark_value(heap, &mut worklist, child);
        }
    }

    let mut reclaimed_by_type: HashMap<u16, usize> = HashMap::new();
    let live_ids: Vec<CellId> = heap.live_ids().collect();
    for id in live_ids {
        let flags = heap.flags(id);
        if flags.contains(crate::header::CellFlags::STATIC) {
            heap.clear_flags(id, crate::header::CellFlags::MARKED);
            continue;
        }
        if flags.contains(crate::header::CellFlags::MARKED) {
            heap.clear_flags(id, crate::header::CellFlags::MARKED);
            continue;
        }
        let type_code = heap.type_code(id);
        registry.get(type_code).on_reclaim(heap.cell_mut(id));
        heap.reclaim(id);
        *reclaimed_by_type.entry(type_code).or_default() += 1;
    }

    let reclaimed_by_type = reclaimed_by_type
        .into_iter()
        .map(|(code, count)| (registry.name_of(code).to_string(), count))
        .collect();

    let stats = GcStats {
        bytes_before,
        bytes_after: heap.live_bytes(),
        cells_before,
        cells_after: heap.live_count(),
        reclaimed_by_type,
    };

    tracing::debug!(
        bytes_before = stats.bytes_before,
        bytes_after = stats.bytes_after,
        cells_before = stats.cells_before,
        cells_after = stats.cells_after,
        "gc-cycle"
    );

    stats
}
