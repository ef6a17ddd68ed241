//! Stack shuffling: `dup pop swap stack unstack cons swons uncons`.
//! Grounded in `examples/original_source/src/builtin/stacks.c`.

use joy_core::{JoyError, Payload, SymbolTable, Tag, NULL};

use crate::dispatch::PrimTable;

pub(crate) fn register(table: &mut PrimTable, symtab: &mut SymbolTable) {
    table.register(symtab, "dup", dup);
    table.register(symtab, "pop", pop);
    table.register(symtab, "swap", swap);
    table.register(symtab, "stack", stack);
    table.register(symtab, "unstack", unstack);
    table.register(symtab, "cons", cons);
    table.register(symtab, "swons", swons);
    table.register(symtab, "uncons", uncons);
}

fn dup(ctx: &mut joy_core::Context, _parent: Option<&joy_core::Heap>, _prims: &PrimTable) -> joy_core::JoyResult<()> {
    if ctx.stack == NULL {
        return Err(JoyError::stack_underflow("dup"));
    }
    let copy = ctx.new_node_from(ctx.stack, ctx.stack)?;
    ctx.stack = copy;
    Ok(())
}

fn pop(ctx: &mut joy_core::Context, _parent: Option<&joy_core::Heap>, _prims: &PrimTable) -> joy_core::JoyResult<()> {
    ctx.pop_for("pop")?;
    Ok(())
}

fn swap(ctx: &mut joy_core::Context, _parent: Option<&joy_core::Heap>, _prims: &PrimTable) -> joy_core::JoyResult<()> {
    let top = ctx.pop_for("swap")?;
    let second = ctx.pop_for("swap")?;
    let new_second = ctx.new_node(top.tag, top.payload, ctx.stack)?;
    ctx.stack = new_second;
    let new_top = ctx.new_node(second.tag, second.payload, ctx.stack)?;
    ctx.stack = new_top;
    Ok(())
}

/// Pushes a fresh list value whose elements are the current stack, top
/// first — a snapshot, not an alias (`stacks.c`'s `stack`).
fn stack(ctx: &mut joy_core::Context, _parent: Option<&joy_core::Heap>, _prims: &PrimTable) -> joy_core::JoyResult<()> {
    let copy = ctx.deep_copy(ctx.stack)?;
    ctx.push(Tag::List, Payload::List(copy))
}

/// Replaces the whole stack with the top list's elements (`stacks.c`'s
/// `unstack`).
fn unstack(ctx: &mut joy_core::Context, _parent: Option<&joy_core::Heap>, _prims: &PrimTable) -> joy_core::JoyResult<()> {
    let top = ctx.pop_for("unstack")?;
    let head = match top.payload {
        Payload::List(head) => head,
        _ => return Err(JoyError::type_error("unstack: expected a list")),
    };
    ctx.stack = ctx.deep_copy(head)?;
    Ok(())
}

/// `X L cons => [X ..L]`: prepend X onto list L.
fn cons(ctx: &mut joy_core::Context, _parent: Option<&joy_core::Heap>, _prims: &PrimTable) -> joy_core::JoyResult<()> {
    let list = ctx.pop_for("cons")?;
    let head = match list.payload {
        Payload::List(head) => head,
        _ => return Err(JoyError::type_error("cons: expected a list")),
    };
    let value = ctx.pop_for("cons")?;
    let value_copy = ctx.new_node(value.tag, value.payload, head)?;
    ctx.push(Tag::List, Payload::List(value_copy))
}

/// `L X swons => [X ..L]`: `cons` with the arguments swapped
/// (`stacks.c`'s `swons`).
fn swons(ctx: &mut joy_core::Context, _parent: Option<&joy_core::Heap>, _prims: &PrimTable) -> joy_core::JoyResult<()> {
    let value = ctx.pop_for("swons")?;
    let list = ctx.pop_for("swons")?;
    let head = match list.payload {
        Payload::List(head) => head,
        _ => return Err(JoyError::type_error("swons: expected a list")),
    };
    let value_copy = ctx.new_node(value.tag, value.payload, head)?;
    ctx.push(Tag::List, Payload::List(value_copy))
}

/// `[X ..L] uncons => X [..L]`.
fn uncons(ctx: &mut joy_core::Context, _parent: Option<&joy_core::Heap>, _prims: &PrimTable) -> joy_core::JoyResult<()> {
    let list = ctx.pop_for("uncons")?;
    let head = match list.payload {
        Payload::List(head) => head,
        _ => return Err(JoyError::type_error("uncons: expected a list")),
    };
    if head == NULL {
        return Err(JoyError::runtime("uncons: empty list"));
    }
    let first = ctx.heap.node(head).clone();
    let rest = first.next;
    ctx.push(Tag::List, Payload::List(rest))?;
    let value_copy = ctx.new_node(first.tag, first.payload, ctx.stack)?;
    ctx.stack = value_copy;
    Ok(())
}
