//! Precise mark/sweep over explicit roots, plus a compacting copy used
//! only on the shrink path.
//!
//! This replaces the reference implementation's conservative native-stack
//! scan (`examples/original_source/src/gc.c`'s `ctx_mark_stk`) per
//! `spec.md` §9: every root is explicit here (the six registers plus the
//! symbol table's root-marked slots), so no stack scanning is needed.
//! Cells below `mem_low` (definition/tenured space) are never inspected
//! by mark or sweep — they are unconditionally alive for the remaining
//! life of the context, which is a stronger guarantee than reachability
//! and satisfies "Definition immunity" (`spec.md` §8) by construction.

use tracing::trace;

use crate::heap::Heap;
use crate::node::{Index, Payload, Tag, NULL};

/// Walk every root, following `next` chains iteratively and recursing
/// only into `LIST`/`DICT` subnodes (bounded by actual nesting depth,
/// per `spec.md` §4.4's deep-copy discipline, reused here for marking).
fn mark_chain(heap: &Heap, start: Index, marked: &mut [bool], mem_low: usize) {
    let mut cur = start;
    while cur != NULL {
        let i = cur as usize;
        if i < mem_low {
            // Tenured: always alive, and by construction never points
            // back into ephemeral space (a definition body is fully
            // built, with all its own nodes tenured, before mem_low
            // advances past it).
            break;
        }
        if marked[i] {
            // Already visited; the remainder of this chain (and any
            // subnodes) were already marked when we first reached it.
            break;
        }
        marked[i] = true;
        let node = heap.node(cur);
        match &node.payload {
            Payload::List(head) => mark_chain(heap, *head, marked, mem_low),
            Payload::Dict(id) => {
                for (_, value) in heap.dict(*id) {
                    mark_chain(heap, *value, marked, mem_low);
                }
            }
            _ => {}
        }
        cur = node.next;
    }
}

/// Mark from every root then free unreached ephemeral cells to the free
/// list. Returns the number of cells freed.
pub fn collect(heap: &mut Heap, roots: &[Index]) -> usize {
    let len = heap.len();
    let mem_low = heap.mem_low() as usize;
    let mut marked = vec![false; len];
    for &root in roots {
        mark_chain(heap, root, &mut marked, mem_low);
    }

    let mut freed = 0usize;
    for idx in mem_low..len {
        if !marked[idx] && heap.node(idx as Index).tag != Tag::Illegal {
            heap.free_cell(idx as Index);
            freed += 1;
        }
    }
    heap.note_collection();
    trace!(freed, capacity = len, "gc sweep complete");
    freed
}

/// Remap an index through a compaction table: tenured and null indices
/// pass through unchanged, ephemeral indices are looked up.
pub(crate) fn remap(idx: Index, mem_low: Index, table: &[Index]) -> Index {
    if idx == NULL || idx < mem_low {
        idx
    } else {
        table[(idx - mem_low) as usize]
    }
}

/// Copy one ephemeral chain (and everything it reaches) into `compacted`,
/// leaving a forwarding pointer behind at each source cell so shared
/// substructure is copied exactly once: the first visit to a cell
/// allocates its new slot and retags the source `Tag::Copied` with
/// `Payload::Forward(new_idx)`; every later reference to that same cell,
/// from any root, just follows the forwarding pointer instead of
/// recopying.
fn copy_chain(heap: &mut Heap, mem_low: Index, compacted: &mut Vec<crate::node::Node>, start: Index) -> Index {
    if start == NULL || start < mem_low {
        return start;
    }
    if heap.node(start).tag == Tag::Copied {
        return match heap.node(start).payload {
            Payload::Forward(new_idx) => new_idx,
            _ => unreachable!("a Copied node always carries a Forward payload"),
        };
    }

    let original = heap.node(start).clone();
    let new_idx = mem_low + compacted.len() as Index;
    compacted.push(crate::node::Node::new(original.tag, Payload::None, NULL));
    heap.node_mut(start).tag = Tag::Copied;
    heap.node_mut(start).payload = Payload::Forward(new_idx);

    let new_payload = match original.payload {
        Payload::List(head) => Payload::List(copy_chain(heap, mem_low, compacted, head)),
        other => other,
    };
    let new_next = copy_chain(heap, mem_low, compacted, original.next);
    let slot = &mut compacted[(new_idx - mem_low) as usize];
    slot.payload = new_payload;
    slot.next = new_next;
    new_idx
}

/// Compact the ephemeral region into a smaller, contiguous image and
/// rewrite every root plus every copied node's internal indices.
/// Tenured cells (`< mem_low`) are copied verbatim at the same indices
/// and never need remapping, since that region is never fragmented (it
/// is never freed into, only grown by `Heap::advance_mem_low`).
///
/// Uses the COPIED-tag forwarding trick: each reachable ephemeral cell is
/// copied to its new slot on first visit and left tagged `Tag::Copied`
/// with a `Payload::Forward` pointer at its old location, so a shared
/// sublist reached from two roots is copied once and the second walk
/// just follows the forwarding pointer. This is restricted to the
/// ephemeral region — tenured cells are never retagged.
///
/// `extra_roots` covers roots the caller cannot hand over as `&mut Index`
/// (the symbol table's user-variable bodies, owned by `SymbolTable`, not
/// `Context`'s own register fields). On success, returns the tenured
/// boundary and the old-ephemeral-index → new-index table (read back off
/// the forwarding pointers before the old image is discarded) so the
/// caller can remap those extra roots, and any other index it still
/// holds onto, itself.
pub fn compact_shrink(
    heap: &mut Heap,
    roots: &mut [&mut Index],
    extra_roots: &[Index],
) -> Option<(Index, Vec<Index>)> {
    let mem_low = heap.mem_low();
    let old_len = heap.len();
    let capacity = heap.memory_max().max(old_len);
    let live_estimate = old_len - mem_low as usize;
    if !heap.should_shrink(live_estimate, capacity) {
        return None;
    }

    let mut compacted = Vec::new();
    for root in roots.iter_mut() {
        **root = copy_chain(heap, mem_low, &mut compacted, **root);
    }
    for &root in extra_roots {
        copy_chain(heap, mem_low, &mut compacted, root);
    }
    // Dict values are indices into the node heap but live in a side
    // table the chain walk above never visits on its own; copy/forward
    // them the same way so they keep pointing at the right cells.
    let dict_count = heap.dicts().len();
    for dict_id in 0..dict_count {
        let id = crate::node::DictId(dict_id as u32);
        let values: Vec<Index> = heap.dict(id).iter().map(|(_, v)| *v).collect();
        let new_values: Vec<Index> = values
            .into_iter()
            .map(|v| copy_chain(heap, mem_low, &mut compacted, v))
            .collect();
        for (slot, new_value) in heap.dict_mut(id).iter_mut().zip(new_values) {
            slot.1 = new_value;
        }
    }

    // Read the old-index -> new-index table back off the forwarding
    // pointers left behind, before the old ephemeral image is replaced.
    let mut table = vec![NULL; old_len - mem_low as usize];
    for old_idx in mem_low..old_len as Index {
        if let Payload::Forward(new_idx) = heap.node(old_idx).payload {
            table[(old_idx - mem_low) as usize] = new_idx;
        }
    }

    let nodes = heap.nodes_mut();
    nodes.truncate(mem_low as usize);
    nodes.extend(compacted);
    heap.free_list_mut().clear();
    heap.set_mem_low(mem_low);

    trace!(
        before = old_len,
        after = heap.len(),
        "compacted ephemeral heap"
    );
    Some((mem_low, table))
}
