//! Sequence operations over lists and strings: `size first rest at of
//! concat reverse`. Grounded in
//! `examples/original_source/src/builtin/aggregate.c`.

use joy_core::{Context, Heap, JoyError, JoyResult, Payload, SymbolTable, Tag, NULL};

use crate::dispatch::PrimTable;

pub(crate) fn register(table: &mut PrimTable, symtab: &mut SymbolTable) {
    table.register(symtab, "size", size);
    table.register(symtab, "first", first);
    table.register(symtab, "rest", rest);
    table.register(symtab, "at", at);
    table.register(symtab, "of", of);
    table.register(symtab, "concat", concat);
    table.register(symtab, "reverse", reverse);
}

fn size(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let top = ctx.pop_for("size")?;
    let n = match top.payload {
        Payload::List(head) => chain_len(ctx, head),
        Payload::Str(s) => s.chars().count(),
        Payload::Set(bits) => bits.count_ones() as usize,
        _ => return Err(JoyError::type_error("size: expected an aggregate")),
    };
    ctx.push(Tag::Integer, Payload::Int(n as i64))
}

fn chain_len(ctx: &Context, mut head: joy_core::Index) -> usize {
    let mut n = 0;
    while head != NULL {
        n += 1;
        head = ctx.heap.node(head).next;
    }
    n
}

fn first(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let top = ctx.pop_for("first")?;
    match top.payload {
        Payload::List(head) => {
            if head == NULL {
                return Err(JoyError::runtime("first: empty list"));
            }
            let node = ctx.heap.node(head).clone();
            let idx = ctx.new_node(node.tag, node.payload, NULL)?;
            // Pushed as a single-cell value, not wrapped in a list: the
            // node's own tag/payload IS the element.
            ctx.stack = idx;
            Ok(())
        }
        Payload::Str(s) => {
            let c = s.chars().next().ok_or_else(|| JoyError::runtime("first: empty string"))?;
            ctx.push(Tag::Character, Payload::Char(c))
        }
        _ => Err(JoyError::type_error("first: expected a list or string")),
    }
}

fn rest(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let top = ctx.pop_for("rest")?;
    match top.payload {
        Payload::List(head) => {
            if head == NULL {
                return Err(JoyError::runtime("rest: empty list"));
            }
            let tail = ctx.heap.node(head).next;
            let copy = ctx.deep_copy(tail)?;
            ctx.push(Tag::List, Payload::List(copy))
        }
        Payload::Str(s) => {
            let rest: String = s.chars().skip(1).collect();
            ctx.push(Tag::String, Payload::Str(rest.into()))
        }
        _ => Err(JoyError::type_error("rest: expected a list or string")),
    }
}

fn at(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let index = ctx.pop_for("at")?;
    let n = match index.payload {
        Payload::Int(v) => v,
        _ => return Err(JoyError::type_error("at: expected an integer index")),
    };
    let top = ctx.pop_for("at")?;
    match top.payload {
        Payload::List(head) => {
            let mut cur = head;
            for _ in 0..n {
                if cur == NULL {
                    return Err(JoyError::runtime("at: index out of range"));
                }
                cur = ctx.heap.node(cur).next;
            }
            if cur == NULL {
                return Err(JoyError::runtime("at: index out of range"));
            }
            let node = ctx.heap.node(cur).clone();
            let idx = ctx.new_node(node.tag, node.payload, ctx.stack)?;
            ctx.stack = idx;
            Ok(())
        }
        Payload::Str(s) => {
            let c = s
                .chars()
                .nth(n as usize)
                .ok_or_else(|| JoyError::runtime("at: index out of range"))?;
            ctx.push(Tag::Character, Payload::Char(c))
        }
        _ => Err(JoyError::type_error("at: expected a list or string")),
    }
}

/// `of == swap at`: index first, aggregate second.
fn of(ctx: &mut Context, p: Option<&Heap>, t: &PrimTable) -> JoyResult<()> {
    let aggregate = ctx.pop_for("of")?;
    let index = ctx.pop_for("of")?;
    let index_idx = ctx.new_node(index.tag, index.payload, ctx.stack)?;
    ctx.stack = index_idx;
    let agg_idx = ctx.new_node(aggregate.tag, aggregate.payload, ctx.stack)?;
    ctx.stack = agg_idx;
    at(ctx, p, t)
}

fn concat(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let b = ctx.pop_for("concat")?;
    let a = ctx.pop_for("concat")?;
    match (a.payload, b.payload) {
        (Payload::List(head_a), Payload::List(head_b)) => {
            let tail = ctx.deep_copy(head_b)?;
            let mut elems = Vec::new();
            let mut cur = head_a;
            while cur != NULL {
                elems.push(ctx.heap.node(cur).clone());
                cur = ctx.heap.node(cur).next;
            }
            let mut next = tail;
            for node in elems.into_iter().rev() {
                next = ctx.new_node(node.tag, node.payload, next)?;
            }
            ctx.push(Tag::List, Payload::List(next))
        }
        (Payload::Str(sa), Payload::Str(sb)) => {
            let joined = format!("{sa}{sb}");
            ctx.push(Tag::String, Payload::Str(joined.into()))
        }
        _ => Err(JoyError::type_error("concat: expected two lists or two strings")),
    }
}

fn reverse(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let top = ctx.pop_for("reverse")?;
    match top.payload {
        Payload::List(head) => {
            let mut next = NULL;
            let mut cur = head;
            while cur != NULL {
                let node = ctx.heap.node(cur).clone();
                next = ctx.new_node(node.tag, node.payload, next)?;
                cur = node.next;
            }
            ctx.push(Tag::List, Payload::List(next))
        }
        Payload::Str(s) => {
            let reversed: String = s.chars().rev().collect();
            ctx.push(Tag::String, Payload::Str(reversed.into()))
        }
        _ => Err(JoyError::type_error("reverse: expected a list or string")),
    }
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

    fn build_list(ctx: &mut Context, values: &[i64]) -> joy_core::Index {
        let mut next = NULL;
        for v in values.iter().rev() {
            next = ctx.new_node(Tag::Integer, Payload::Int(*v), next).unwrap();
        }
        next
    }

    #[test]
    fn size_counts_list_elements() {
        let (mut ctx, table) = ctx_with_table();
        let head = build_list(&mut ctx, &[1, 2, 3]);
        ctx.push(Tag::List, Payload::List(head)).unwrap();
        let id = table.id_by_name(&ctx.symtab, "size").unwrap();
        table.invoke(&mut ctx, None, id).unwrap();
        match ctx.pop().unwrap().payload {
            Payload::Int(v) => assert_eq!(v, 3),
            _ => panic!("expected integer"),
        }
    }

    #[test]
    fn first_and_rest_split_a_list() {
        let (mut ctx, table) = ctx_with_table();
        let head = build_list(&mut ctx, &[10, 20, 30]);
        ctx.push(Tag::List, Payload::List(head)).unwrap();
        let first_id = table.id_by_name(&ctx.symtab, "first").unwrap();
        let dup_id = table.id_by_name(&ctx.symtab, "dup").unwrap();
        table.invoke(&mut ctx, None, dup_id).unwrap();
        table.invoke(&mut ctx, None, first_id).unwrap();
        match ctx.pop().unwrap().payload {
            Payload::Int(v) => assert_eq!(v, 10),
            _ => panic!("expected integer"),
        }
        let rest_id = table.id_by_name(&ctx.symtab, "rest").unwrap();
        table.invoke(&mut ctx, None, rest_id).unwrap();
        match ctx.pop().unwrap().payload {
            Payload::List(rest_head) => {
                assert_eq!(chain_len(&ctx, rest_head), 2);
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn reverse_produces_a_fresh_list() {
        let (mut ctx, table) = ctx_with_table();
        let head = build_list(&mut ctx, &[1, 2, 3]);
        ctx.push(Tag::List, Payload::List(head)).unwrap();
        let id = table.id_by_name(&ctx.symtab, "reverse").unwrap();
        table.invoke(&mut ctx, None, id).unwrap();
        match ctx.pop().unwrap().payload {
            Payload::List(new_head) => {
                assert_ne!(new_head, head);
                match ctx.heap.node(new_head).payload {
                    Payload::Int(v) => assert_eq!(v, 3),
                    _ => panic!("expected integer"),
                }
            }
            _ => panic!("expected list"),
        }
    }
}
