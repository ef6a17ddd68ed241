//! Parallel combinators: `pmap pfilter pfork preduce`. Stack plumbing
//! only — the OS-thread fork-join machinery lives in `crate::parallel`.
//! Grounded in `examples/original_source/src/builtin/parallel.c`'s
//! four-combinator surface.

use joy_core::{Context, Heap, Index, JoyError, JoyResult, Node, Payload, SymbolTable, Tag, NULL};

use crate::dispatch::PrimTable;
use crate::parallel::{parallel_filter, parallel_fork, parallel_map, parallel_reduce};
use crate::primitives::combinators::collect_elements;

pub(crate) fn register(table: &mut PrimTable, symtab: &mut SymbolTable) {
    table.register(symtab, "pmap", pmap);
    table.register(symtab, "pfilter", pfilter);
    table.register(symtab, "pfork", pfork);
    table.register(symtab, "preduce", preduce);
}

fn quotation_head(node: &Node, who: &str) -> JoyResult<Index> {
    match node.payload {
        Payload::List(head) => Ok(head),
        _ => Err(JoyError::type_error(format!("{who}: expected a quotation"))),
    }
}

/// `[e1 .. en] [P] pmap => [P(e1) .. P(en)]`.
fn pmap(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let q = ctx.pop_for("pmap")?;
    let head = quotation_head(&q, "pmap")?;
    let aggregate = ctx.pop_for("pmap")?;
    let elements = collect_elements(ctx, &aggregate.payload)?;
    let results = parallel_map(ctx, parent, prims, head, elements)?;
    let mut result_head = NULL;
    for result in results.into_iter().rev() {
        result_head = ctx.new_node(result.tag, result.payload, result_head)?;
    }
    ctx.push(Tag::List, Payload::List(result_head))
}

/// `[e1 .. en] [P] pfilter => [kept in input order]`.
fn pfilter(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let q = ctx.pop_for("pfilter")?;
    let head = quotation_head(&q, "pfilter")?;
    let aggregate = ctx.pop_for("pfilter")?;
    let elements = collect_elements(ctx, &aggregate.payload)?;
    let kept = parallel_filter(ctx, parent, prims, head, elements)?;
    let mut result_head = NULL;
    for elem in kept.into_iter().rev() {
        result_head = ctx.new_node(elem.tag, elem.payload, result_head)?;
    }
    ctx.push(Tag::List, Payload::List(result_head))
}

/// `x [P] [Q] pfork => P(x) Q(x)`, second quotation's result on top.
fn pfork(ctx: &mut Context, _parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let q = ctx.pop_for("pfork")?;
    let p = ctx.pop_for("pfork")?;
    let x = ctx.pop_for("pfork")?;
    let q_head = quotation_head(&q, "pfork")?;
    let p_head = quotation_head(&p, "pfork")?;
    let [left, right] = parallel_fork(ctx, prims, [p_head, q_head], &x)?;
    let idx = ctx.new_node(left.tag, left.payload, ctx.stack)?;
    ctx.stack = idx;
    let idx = ctx.new_node(right.tag, right.payload, ctx.stack)?;
    ctx.stack = idx;
    Ok(())
}

/// `[e1 .. en] [Q] preduce => e1 Q e2 Q .. Q en`. `Q` must be
/// associative; elements are combined pairwise in a binary tree.
fn preduce(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let q = ctx.pop_for("preduce")?;
    let head = quotation_head(&q, "preduce")?;
    let aggregate = ctx.pop_for("preduce")?;
    let elements = collect_elements(ctx, &aggregate.payload)?;
    let result = parallel_reduce(ctx, parent, prims, head, elements)?;
    ctx.push(result.tag, result.payload)
}
