//! Cross-context value transfer and OS-thread fork-join execution
//! backing the parallel combinators (`pmap pfilter pfork preduce`).
//! Grounded in the task lifecycle of
//! `examples/original_source/src/builtin/parallel.c`.
//!
//! Each task clones a child context per the lifecycle: fresh heap and
//! GC instance, a cloned (read-only) symbol table, disabled I/O, and a
//! back-pointer to the parent's heap so the child's evaluator can
//! lazily copy a definition body the first time it resolves a
//! user-defined symbol (see `crate::eval::resolve_body`). The
//! reference pack's `may`-based green-thread scheduler is grounded in
//! a CSP runtime this workspace has no use for; fork-join execution
//! here uses `std::thread::scope` instead, and the parent blocks until
//! every worker finishes.

use std::sync::atomic::{AtomicUsize, Ordering};

use joy_core::{Context, DictId, Heap, Index, JoyError, JoyResult, Node, Payload, Tag, NULL};

use crate::dispatch::PrimTable;
use crate::eval::exec_term;

/// Below this many elements a parallel combinator runs sequentially in
/// the calling context instead of spawning worker threads —
/// coordination cost dominates at this scale.
pub const SEQUENTIAL_THRESHOLD: usize = 64;

const CHILD_NODE_BUDGET: usize = 4096;

/// Count of worker tasks currently running, across every context in the
/// process. Read by `crate::diagnostics` on SIGQUIT; not otherwise used
/// for scheduling decisions.
pub(crate) static ACTIVE_TASKS: AtomicUsize = AtomicUsize::new(0);

/// Copy the chain rooted at `head` from `source` into `ctx`'s own
/// heap. Next-chains are walked iteratively; only `LIST`/`DICT`
/// subchains recurse, bounded by actual nesting depth, matching
/// `Context::deep_copy`'s within-context counterpart but reading from
/// a foreign heap (the parent's, when called from a task's child).
///
/// The destination's `dump4`/`dump5` registers are pinned to the
/// chain built so far after every allocation, so a collection
/// triggered mid-copy cannot reclaim the partially built result before
/// it is reachable from any other root.
pub fn deep_copy_across(ctx: &mut Context, source: &Heap, head: Index) -> JoyResult<Index> {
    let mut originals = Vec::new();
    let mut cur = head;
    while cur != NULL {
        let node = source.node(cur).clone();
        cur = node.next;
        originals.push(node);
    }
    let saved_dump4 = ctx.dumps[3];
    let saved_dump5 = ctx.dumps[4];
    let mut next = NULL;
    for node in originals.into_iter().rev() {
        let payload = match node.payload {
            Payload::List(inner) => Payload::List(deep_copy_across(ctx, source, inner)?),
            Payload::Dict(id) => Payload::Dict(deep_copy_dict_across(ctx, source, id)?),
            other => other,
        };
        next = ctx.new_node(node.tag, payload, next)?;
        ctx.dumps[3] = next;
        ctx.dumps[4] = next;
    }
    ctx.dumps[3] = saved_dump4;
    ctx.dumps[4] = saved_dump5;
    Ok(next)
}

fn deep_copy_dict_across(ctx: &mut Context, source: &Heap, id: DictId) -> JoyResult<DictId> {
    let entries: Vec<_> = source.dict(id).to_vec();
    let new_id = ctx.heap.new_dict();
    for (key, value) in entries {
        let copied = deep_copy_across(ctx, source, value)?;
        ctx.heap.dict_mut(new_id).push((key, copied));
    }
    Ok(new_id)
}

type TaskOutcome = JoyResult<(Context, Index)>;

/// Spawn one scoped OS thread per task index, each driving a freshly
/// cloned child context through `task`, and block until all of them
/// finish. `task` is handed the parent's heap (for deep-copying
/// quotation bodies and resolving definitions mid-execution) and its
/// own child context, and must return the index of a single-node
/// result chain within that child's heap.
fn fan_out<F>(ctx: &mut Context, count: usize, task: F) -> Vec<TaskOutcome>
where
    F: Fn(&Heap, &mut Context, usize) -> JoyResult<Index> + Sync,
{
    let children: Vec<Context> = (0..count).map(|_| ctx.spawn_child(CHILD_NODE_BUDGET)).collect();
    let parent_heap: &Heap = &ctx.heap;
    let task = &task;
    ACTIVE_TASKS.fetch_add(count, Ordering::Relaxed);
    let outcomes = std::thread::scope(|scope| {
        let handles: Vec<_> = children
            .into_iter()
            .enumerate()
            .map(|(i, mut child)| {
                scope.spawn(move || {
                    let outcome = task(parent_heap, &mut child, i);
                    outcome.map(|idx| (child, idx))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(JoyError::runtime("parallel task panicked")))
            })
            .collect()
    });
    ACTIVE_TASKS.fetch_sub(count, Ordering::Relaxed);
    outcomes
}

fn run_one_sequential(
    ctx: &mut Context,
    parent: Option<&Heap>,
    prims: &PrimTable,
    quotation_head: Index,
    elem: &Node,
    below: Index,
    who: &str,
) -> JoyResult<Node> {
    ctx.stack = ctx.new_node(elem.tag, elem.payload.clone(), below)?;
    exec_term(ctx, parent, prims, quotation_head)?;
    ctx.pop_for(who)
}

/// `[e1 .. en] [P] pmap => [P(e1) .. P(en)]`. Results appear at the
/// index corresponding to their input; workers may finish out of
/// order, the caller reassembles by construction (`fan_out` preserves
/// the `0..count` index it was called with).
///
/// `parent` is the enclosing task's own cross-context back-pointer
/// (`None` unless this call itself runs inside another task's child
/// context); only the sequential fallback needs it; the threaded path
/// always hands each worker the calling context's own heap.
pub fn parallel_map(
    ctx: &mut Context,
    parent: Option<&Heap>,
    prims: &PrimTable,
    quotation_head: Index,
    elements: Vec<Node>,
) -> JoyResult<Vec<Node>> {
    if elements.len() < SEQUENTIAL_THRESHOLD {
        let below = ctx.stack;
        let mut results = Vec::with_capacity(elements.len());
        for elem in &elements {
            results.push(run_one_sequential(ctx, parent, prims, quotation_head, elem, below, "pmap")?);
        }
        ctx.stack = below;
        return Ok(results);
    }
    let outcomes = fan_out(ctx, elements.len(), |parent_heap, child, i| {
        let body = deep_copy_across(child, parent_heap, quotation_head)?;
        let elem = &elements[i];
        let idx = child.new_node(elem.tag, elem.payload.clone(), NULL)?;
        child.stack = idx;
        exec_term(child, Some(parent_heap), prims, body)?;
        let result = child.pop_for("pmap")?;
        child.new_node(result.tag, result.payload, NULL)
    });
    let mut results = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let (child, idx) = outcome?;
        let copied = deep_copy_across(ctx, &child.heap, idx)?;
        results.push(ctx.heap.node(copied).clone());
    }
    Ok(results)
}

/// `[e1 .. en] [P] pfilter => [kept in input order]`.
pub fn parallel_filter(
    ctx: &mut Context,
    parent: Option<&Heap>,
    prims: &PrimTable,
    quotation_head: Index,
    elements: Vec<Node>,
) -> JoyResult<Vec<Node>> {
    if elements.len() < SEQUENTIAL_THRESHOLD {
        let below = ctx.stack;
        let mut kept = Vec::new();
        for elem in &elements {
            let verdict = run_one_sequential(ctx, parent, prims, quotation_head, elem, below, "pfilter")?;
            ctx.stack = below;
            if matches!(verdict.payload, Payload::Bool(true)) {
                kept.push(elem.clone());
            }
        }
        return Ok(kept);
    }
    let outcomes = fan_out(ctx, elements.len(), |parent_heap, child, i| {
        let body = deep_copy_across(child, parent_heap, quotation_head)?;
        let elem = &elements[i];
        let idx = child.new_node(elem.tag, elem.payload.clone(), NULL)?;
        child.stack = idx;
        exec_term(child, Some(parent_heap), prims, body)?;
        let verdict = child.pop_for("pfilter")?;
        match verdict.payload {
            Payload::Bool(b) => child.new_node(Tag::Boolean, Payload::Bool(b), NULL),
            _ => Err(JoyError::type_error("pfilter: predicate must leave a boolean")),
        }
    });
    let mut kept = Vec::new();
    for (i, outcome) in outcomes.into_iter().enumerate() {
        let (child, idx) = outcome?;
        if let Payload::Bool(true) = child.heap.node(idx).payload {
            kept.push(elements[i].clone());
        }
    }
    Ok(kept)
}

/// `x [P] [Q] pfork => P(x) Q(x)`, second quotation's result on top.
/// Both quotations always run as separate tasks: there is no
/// input-size dimension to a two-way fork for a sequential fallback to
/// apply to.
pub fn parallel_fork(
    ctx: &mut Context,
    prims: &PrimTable,
    heads: [Index; 2],
    input: &Node,
) -> JoyResult<[Node; 2]> {
    let outcomes = fan_out(ctx, 2, |parent_heap, child, i| {
        let body = deep_copy_across(child, parent_heap, heads[i])?;
        let idx = child.new_node(input.tag, input.payload.clone(), NULL)?;
        child.stack = idx;
        exec_term(child, Some(parent_heap), prims, body)?;
        let result = child.pop_for("pfork")?;
        child.new_node(result.tag, result.payload, NULL)
    });
    let mut iter = outcomes.into_iter();
    let (left_child, left_idx) = iter.next().expect("fan_out returns one outcome per task")?;
    let (right_child, right_idx) = iter.next().expect("fan_out returns one outcome per task")?;
    let left_copied = deep_copy_across(ctx, &left_child.heap, left_idx)?;
    let left = ctx.heap.node(left_copied).clone();
    let right_copied = deep_copy_across(ctx, &right_child.heap, right_idx)?;
    let right = ctx.heap.node(right_copied).clone();
    Ok([left, right])
}

/// `[e1 .. en] [Q] preduce => e1 Q e2 Q .. Q en`, combined pairwise in
/// a binary tree rather than strictly left-to-right: `Q` must be
/// associative. Adjacent elements are paired left-to-right at each
/// level; an odd element out carries over to the next level untouched.
pub fn parallel_reduce(
    ctx: &mut Context,
    parent: Option<&Heap>,
    prims: &PrimTable,
    combiner_head: Index,
    elements: Vec<Node>,
) -> JoyResult<Node> {
    if elements.is_empty() {
        return Err(JoyError::runtime("preduce: empty aggregate"));
    }
    let mut level = elements;
    while level.len() > 1 {
        let pairs: Vec<(Node, Option<Node>)> = level
            .chunks(2)
            .map(|chunk| (chunk[0].clone(), chunk.get(1).cloned()))
            .collect();
        if pairs.len() < SEQUENTIAL_THRESHOLD {
            let below = ctx.stack;
            let mut next_level = Vec::with_capacity(pairs.len());
            for (left, right) in &pairs {
                match right {
                    None => next_level.push(left.clone()),
                    Some(right) => {
                        ctx.stack = ctx.new_node(left.tag, left.payload.clone(), below)?;
                        let idx = ctx.new_node(right.tag, right.payload.clone(), ctx.stack)?;
                        ctx.stack = idx;
                        exec_term(ctx, parent, prims, combiner_head)?;
                        next_level.push(ctx.pop_for("preduce")?);
                        ctx.stack = below;
                    }
                }
            }
            level = next_level;
            continue;
        }
        let outcomes = fan_out(ctx, pairs.len(), |parent_heap, child, i| {
            let (left, right) = &pairs[i];
            match right {
                None => child.new_node(left.tag, left.payload.clone(), NULL),
                Some(right) => {
                    let body = deep_copy_across(child, parent_heap, combiner_head)?;
                    let l_idx = child.new_node(left.tag, left.payload.clone(), NULL)?;
                    let idx = child.new_node(right.tag, right.payload.clone(), l_idx)?;
                    child.stack = idx;
                    exec_term(child, Some(parent_heap), prims, body)?;
                    let result = child.pop_for("preduce")?;
                    child.new_node(result.tag, result.payload, NULL)
                }
            }
        });
        let mut next_level = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let (child, idx) = outcome?;
            let copied = deep_copy_across(ctx, &child.heap, idx)?;
            next_level.push(ctx.heap.node(copied).clone());
        }
        level = next_level;
    }
    Ok(level.into_iter().next().expect("non-empty input guaranteed above"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::PrimTable;
    use joy_core::{JoyConfig, Payload, Tag};

    fn ctx_with_table() -> (Context, PrimTable) {
        let mut ctx = Context::new(JoyConfig::default());
        let table = PrimTable::new(&mut ctx.symtab);
        (ctx, table)
    }

    fn dup_mul_quotation(ctx: &mut Context, table: &PrimTable) -> Index {
        let dup_id = table.id_by_name(&ctx.symtab, "dup").unwrap();
        let mul_id = table.id_by_name(&ctx.symtab, "*").unwrap();
        let mul_call = ctx.new_node(Tag::AnonymousFunction, Payload::Prim(mul_id), NULL).unwrap();
        ctx.new_node(Tag::AnonymousFunction, Payload::Prim(dup_id), mul_call).unwrap()
    }

    #[test]
    fn sequential_and_parallel_map_agree_on_ordering() {
        let (mut ctx, table) = ctx_with_table();
        let square = dup_mul_quotation(&mut ctx, &table);
        let small: Vec<Node> = (1..=5)
            .map(|v| Node::new(Tag::Integer, Payload::Int(v), NULL))
            .collect();
        let results = parallel_map(&mut ctx, None, &table, square, small).unwrap();
        let values: Vec<i64> = results
            .iter()
            .map(|n| match n.payload {
                Payload::Int(v) => v,
                _ => panic!("expected integer"),
            })
            .collect();
        assert_eq!(values, vec![1, 4, 9, 16, 25]);
    }

    #[test]
    fn large_input_takes_the_threaded_path_and_preserves_order() {
        let (mut ctx, table) = ctx_with_table();
        let square = dup_mul_quotation(&mut ctx, &table);
        let many: Vec<Node> = (1..=200)
            .map(|v| Node::new(Tag::Integer, Payload::Int(v), NULL))
            .collect();
        let results = parallel_map(&mut ctx, None, &table, square, many).unwrap();
        assert_eq!(results.len(), 200);
        for (i, node) in results.iter().enumerate() {
            let expected = (i as i64 + 1) * (i as i64 + 1);
            match node.payload {
                Payload::Int(v) => assert_eq!(v, expected),
                _ => panic!("expected integer"),
            }
        }
    }

    #[test]
    fn reduce_combines_every_element_with_an_associative_op() {
        let (mut ctx, table) = ctx_with_table();
        let add_id = table.id_by_name(&ctx.symtab, "+").unwrap();
        let add_head = ctx.new_node(Tag::AnonymousFunction, Payload::Prim(add_id), NULL).unwrap();
        let elements: Vec<Node> = (1..=10)
            .map(|v| Node::new(Tag::Integer, Payload::Int(v), NULL))
            .collect();
        let total = parallel_reduce(&mut ctx, None, &table, add_head, elements).unwrap();
        match total.payload {
            Payload::Int(v) => assert_eq!(v, 55),
            _ => panic!("expected integer"),
        }
    }

    #[test]
    fn fork_runs_both_quotations_against_the_same_input() {
        let (mut ctx, table) = ctx_with_table();
        let dup_id = table.id_by_name(&ctx.symtab, "dup").unwrap();
        let mul_id = table.id_by_name(&ctx.symtab, "*").unwrap();
        let square = {
            let mul_call = ctx.new_node(Tag::AnonymousFunction, Payload::Prim(mul_id), NULL).unwrap();
            ctx.new_node(Tag::AnonymousFunction, Payload::Prim(dup_id), mul_call).unwrap()
        };
        let id_id = table.id_by_name(&ctx.symtab, "id").unwrap();
        let identity = ctx.new_node(Tag::AnonymousFunction, Payload::Prim(id_id), NULL).unwrap();
        let input = Node::new(Tag::Integer, Payload::Int(4), NULL);
        let [left, right] = parallel_fork(&mut ctx, &table, [square, identity], &input).unwrap();
        match left.payload {
            Payload::Int(v) => assert_eq!(v, 16),
            _ => panic!("expected integer"),
        }
        match right.payload {
            Payload::Int(v) => assert_eq!(v, 4),
            _ => panic!("expected integer"),
        }
    }
}
