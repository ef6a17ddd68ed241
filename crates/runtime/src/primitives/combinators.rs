//! Combinators: `i dip app1 app2 app3 unary2 unary3 branch ifte while
//! times step map filter fold`. Grounded in
//! `examples/original_source/src/builtin/combinators.c` and
//! `n_ary.c`.
//!
//! Each combinator pops its quotation argument(s), extracts the
//! element-chain head, and calls back into [`crate::eval::exec_term`] —
//! the same evaluator the top-level REPL loop uses, so a combinator
//! body sees exactly the same tail-call and GC-root discipline as any
//! other program.

use joy_core::{Context, Heap, Index, JoyError, JoyResult, Node, Payload, SymbolTable, Tag, NULL};

use crate::dispatch::PrimTable;
use crate::eval::exec_term;

pub(crate) fn register(table: &mut PrimTable, symtab: &mut SymbolTable) {
    table.register(symtab, "i", i);
    table.register(symtab, "dip", dip);
    table.register(symtab, "app1", app1);
    table.register(symtab, "app2", app2);
    table.register(symtab, "app3", app3);
    // `unary2`/`unary3` apply the same unary quotation independently to
    // two or three operands, same as `app2`/`app3` — the reference
    // implementation's distinction (stack-frame bookkeeping) does not
    // apply to this evaluator's GC-rooted register model.
    table.register(symtab, "unary2", app2);
    table.register(symtab, "unary3", app3);
    table.register(symtab, "branch", branch);
    table.register(symtab, "ifte", ifte);
    table.register(symtab, "while", while_);
    table.register(symtab, "times", times);
    table.register(symtab, "step", step);
    table.register(symtab, "map", map);
    table.register(symtab, "filter", filter);
    table.register(symtab, "fold", fold);
}

fn quotation_head(node: &Node, who: &str) -> JoyResult<Index> {
    match node.payload {
        Payload::List(head) => Ok(head),
        _ => Err(JoyError::type_error(format!("{who}: expected a quotation"))),
    }
}

fn i(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let q = ctx.pop_for("i")?;
    let head = quotation_head(&q, "i")?;
    exec_term(ctx, parent, prims, head)
}

fn dip(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let q = ctx.pop_for("dip")?;
    let head = quotation_head(&q, "dip")?;
    let saved = ctx.pop_for("dip")?;
    exec_term(ctx, parent, prims, head)?;
    let idx = ctx.new_node(saved.tag, saved.payload, ctx.stack)?;
    ctx.stack = idx;
    Ok(())
}

fn app1(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    i(ctx, parent, prims)
}

/// Apply the same unary quotation to `x` and `y` independently,
/// preserving order: `x y [P] app2 == P(x) P(y)`.
fn app2(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let q = ctx.pop_for("app2")?;
    let head = quotation_head(&q, "app2")?;
    let y = ctx.pop_for("app2")?;
    let x = ctx.pop_for("app2")?;
    let below = ctx.stack;

    ctx.stack = ctx.new_node(x.tag, x.payload, below)?;
    exec_term(ctx, parent, prims, head)?;
    let x_prime = ctx.pop_for("app2")?;

    ctx.stack = ctx.new_node(y.tag, y.payload, below)?;
    exec_term(ctx, parent, prims, head)?;
    let y_prime = ctx.pop_for("app2")?;

    ctx.stack = below;
    let idx = ctx.new_node(x_prime.tag, x_prime.payload, ctx.stack)?;
    ctx.stack = idx;
    let idx = ctx.new_node(y_prime.tag, y_prime.payload, ctx.stack)?;
    ctx.stack = idx;
    Ok(())
}

fn app3(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let q = ctx.pop_for("app3")?;
    let head = quotation_head(&q, "app3")?;
    let z = ctx.pop_for("app3")?;
    let y = ctx.pop_for("app3")?;
    let x = ctx.pop_for("app3")?;
    let below = ctx.stack;

    let mut results = Vec::with_capacity(3);
    for value in [x, y, z] {
        ctx.stack = ctx.new_node(value.tag, value.payload, below)?;
        exec_term(ctx, parent, prims, head)?;
        results.push(ctx.pop_for("app3")?);
    }

    ctx.stack = below;
    for result in results {
        let idx = ctx.new_node(result.tag, result.payload, ctx.stack)?;
        ctx.stack = idx;
    }
    Ok(())
}

fn as_bool(node: &Node, who: &str) -> JoyResult<bool> {
    match node.payload {
        Payload::Bool(b) => Ok(b),
        _ => Err(JoyError::type_error(format!("{who}: expected a boolean"))),
    }
}

fn branch(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let f = ctx.pop_for("branch")?;
    let t = ctx.pop_for("branch")?;
    let cond = ctx.pop_for("branch")?;
    let taken = if as_bool(&cond, "branch")? { &t } else { &f };
    let head = quotation_head(taken, "branch")?;
    exec_term(ctx, parent, prims, head)
}

fn ifte(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let f = ctx.pop_for("ifte")?;
    let t = ctx.pop_for("ifte")?;
    let b = ctx.pop_for("ifte")?;
    let b_head = quotation_head(&b, "ifte")?;
    let below = ctx.stack;
    exec_term(ctx, parent, prims, b_head)?;
    let cond = ctx.pop_for("ifte")?;
    ctx.stack = below;
    let taken = if as_bool(&cond, "ifte")? { &t } else { &f };
    let head = quotation_head(taken, "ifte")?;
    exec_term(ctx, parent, prims, head)
}

fn while_(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let body = ctx.pop_for("while")?;
    let cond = ctx.pop_for("while")?;
    let body_head = quotation_head(&body, "while")?;
    let cond_head = quotation_head(&cond, "while")?;
    loop {
        exec_term(ctx, parent, prims, cond_head)?;
        let keep_going = as_bool(&ctx.pop_for("while")?, "while")?;
        if !keep_going {
            return Ok(());
        }
        exec_term(ctx, parent, prims, body_head)?;
    }
}

fn times(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let q = ctx.pop_for("times")?;
    let head = quotation_head(&q, "times")?;
    let n = ctx.pop_for("times")?;
    let count = match n.payload {
        Payload::Int(v) => v,
        _ => return Err(JoyError::type_error("times: expected an integer count")),
    };
    for _ in 0..count {
        exec_term(ctx, parent, prims, head)?;
    }
    Ok(())
}

/// Shared with `primitives::parallel`: both the sequential and the
/// OS-thread combinators need the same list/string-to-element-vector
/// conversion.
pub(crate) fn collect_elements(ctx: &Context, payload: &Payload) -> JoyResult<Vec<Node>> {
    match payload {
        Payload::List(head) => {
            let mut elems = Vec::new();
            let mut cur = *head;
            while cur != NULL {
                let node = ctx.heap.node(cur).clone();
                cur = node.next;
                elems.push(node);
            }
            Ok(elems)
        }
        Payload::Str(s) => Ok(s
            .chars()
            .map(|c| Node::new(Tag::Character, Payload::Char(c), NULL))
            .collect()),
        _ => Err(JoyError::type_error("expected a list or string aggregate")),
    }
}

fn step(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let q = ctx.pop_for("step")?;
    let head = quotation_head(&q, "step")?;
    let aggregate = ctx.pop_for("step")?;
    let elements = collect_elements(ctx, &aggregate.payload)?;
    for elem in elements {
        let idx = ctx.new_node(elem.tag, elem.payload, ctx.stack)?;
        ctx.stack = idx;
        exec_term(ctx, parent, prims, head)?;
    }
    Ok(())
}

fn map(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let q = ctx.pop_for("map")?;
    let head = quotation_head(&q, "map")?;
    let aggregate = ctx.pop_for("map")?;
    let elements = collect_elements(ctx, &aggregate.payload)?;
    let below = ctx.stack;
    let mut results = Vec::with_capacity(elements.len());
    for elem in elements {
        ctx.stack = ctx.new_node(elem.tag, elem.payload, below)?;
        exec_term(ctx, parent, prims, head)?;
        results.push(ctx.pop_for("map")?);
    }
    ctx.stack = below;
    let mut result_head = NULL;
    for result in results.into_iter().rev() {
        result_head = ctx.new_node(result.tag, result.payload, result_head)?;
    }
    ctx.push(Tag::List, Payload::List(result_head))
}

fn filter(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let q = ctx.pop_for("filter")?;
    let head = quotation_head(&q, "filter")?;
    let aggregate = ctx.pop_for("filter")?;
    let elements = collect_elements(ctx, &aggregate.payload)?;
    let below = ctx.stack;
    let mut kept = Vec::new();
    for elem in elements {
        ctx.stack = ctx.new_node(elem.tag, elem.payload, below)?;
        exec_term(ctx, parent, prims, head)?;
        let keep = as_bool(&ctx.pop_for("filter")?, "filter")?;
        ctx.stack = below;
        if keep {
            kept.push(elem);
        }
    }
    let mut result_head = NULL;
    for elem in kept.into_iter().rev() {
        result_head = ctx.new_node(elem.tag, elem.payload, result_head)?;
    }
    ctx.push(Tag::List, Payload::List(result_head))
}

fn fold(ctx: &mut Context, parent: Option<&Heap>, prims: &PrimTable) -> JoyResult<()> {
    let q = ctx.pop_for("fold")?;
    let head = quotation_head(&q, "fold")?;
    let init = ctx.pop_for("fold")?;
    let aggregate = ctx.pop_for("fold")?;
    let elements = collect_elements(ctx, &aggregate.payload)?;
    let below = ctx.stack;
    let mut acc = init;
    for elem in elements {
        ctx.stack = ctx.new_node(acc.tag, acc.payload, below)?;
        let idx = ctx.new_node(elem.tag, elem.payload, ctx.stack)?;
        ctx.stack = idx;
        exec_term(ctx, parent, prims, head)?;
        acc = ctx.pop_for("fold")?;
        ctx.stack = below;
    }
    let idx = ctx.new_node(acc.tag, acc.payload, below)?;
    ctx.stack = idx;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use joy_core::JoyConfig;

    fn ctx_with_table() -> (Context, PrimTable) {
        let mut ctx = Context::new(JoyConfig::default());
        let table = PrimTable::new(&mut ctx.symtab);
        (ctx, table)
    }

    fn run(ctx: &mut Context, table: &PrimTable, name: &str) {
        let id = table.id_by_name(&ctx.symtab, name).unwrap();
        table.invoke(ctx, None, id).unwrap();
    }

    fn build_list(ctx: &mut Context, values: &[i64]) -> Index {
        let mut next = NULL;
        for v in values.iter().rev() {
            next = ctx.new_node(Tag::Integer, Payload::Int(*v), next).unwrap();
        }
        next
    }

    fn quotation_calling(ctx: &mut Context, table: &PrimTable, name: &str) -> Index {
        let id = table.id_by_name(&ctx.symtab, name).unwrap();
        ctx.new_node(Tag::AnonymousFunction, Payload::Prim(id), NULL).unwrap()
    }

    #[test]
    fn map_dup_mul_squares_each_element_into_a_fresh_list() {
        let (mut ctx, table) = ctx_with_table();
        let head = build_list(&mut ctx, &[1, 2, 3]);
        let dup_id = table.id_by_name(&ctx.symtab, "dup").unwrap();
        let mul_id = table.id_by_name(&ctx.symtab, "*").unwrap();
        let mul_call = ctx.new_node(Tag::AnonymousFunction, Payload::Prim(mul_id), NULL).unwrap();
        let dup_call = ctx
            .new_node(Tag::AnonymousFunction, Payload::Prim(dup_id), mul_call)
            .unwrap();
        ctx.push(Tag::List, Payload::List(head)).unwrap();
        ctx.push(Tag::List, Payload::List(dup_call)).unwrap();
        run(&mut ctx, &table, "map");
        match ctx.pop().unwrap().payload {
            Payload::List(result_head) => {
                assert_ne!(result_head, head);
                let first = ctx.heap.node(result_head);
                match first.payload {
                    Payload::Int(v) => assert_eq!(v, 1),
                    _ => panic!(),
                }
                let second = ctx.heap.node(first.next);
                match second.payload {
                    Payload::Int(v) => assert_eq!(v, 4),
                    _ => panic!(),
                }
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn ifte_chooses_true_or_false_branch() {
        let (mut ctx, table) = ctx_with_table();
        let eq_id = table.id_by_name(&ctx.symtab, "=").unwrap();
        let b_head = ctx.new_node(Tag::AnonymousFunction, Payload::Prim(eq_id), NULL).unwrap();
        let t_head = ctx.new_node(Tag::Integer, Payload::Int(1), NULL).unwrap();
        let f_head = ctx.new_node(Tag::Integer, Payload::Int(0), NULL).unwrap();

        ctx.push(Tag::Integer, Payload::Int(5)).unwrap();
        ctx.push(Tag::Integer, Payload::Int(5)).unwrap();
        ctx.push(Tag::List, Payload::List(b_head)).unwrap();
        ctx.push(Tag::List, Payload::List(t_head)).unwrap();
        ctx.push(Tag::List, Payload::List(f_head)).unwrap();
        run(&mut ctx, &table, "ifte");
        match ctx.pop().unwrap().payload {
            Payload::Int(v) => assert_eq!(v, 1),
            _ => panic!("expected integer"),
        }
    }

    #[test]
    fn dip_restores_the_saved_value_on_top() {
        let (mut ctx, table) = ctx_with_table();
        let q = quotation_calling(&mut ctx, &table, "dup");
        ctx.push(Tag::Integer, Payload::Int(1)).unwrap();
        ctx.push(Tag::Integer, Payload::Int(2)).unwrap();
        ctx.push(Tag::List, Payload::List(q)).unwrap();
        run(&mut ctx, &table, "dip");
        // stack should now be: 2 1 1 (dup applied under the saved 2)
        let top = ctx.pop().unwrap();
        match top.payload {
            Payload::Int(v) => assert_eq!(v, 2),
            _ => panic!(),
        }
        let second = ctx.pop().unwrap();
        match second.payload {
            Payload::Int(v) => assert_eq!(v, 1),
            _ => panic!(),
        }
    }
}
