//! Identity, GC control, and termination: `id gc gcstats quit abort`.
//! Grounded in `examples/original_source/src/builtin/internal.c` and
//! `gc.c`.

use joy_core::{Context, Heap, JoyError, JoyResult, Payload, SymbolTable, Tag, NULL};

use crate::dispatch::PrimTable;

pub(crate) fn register(table: &mut PrimTable, symtab: &mut SymbolTable) {
    table.register(symtab, "id", id);
    table.register(symtab, "gc", gc);
    table.register(symtab, "gcstats", gcstats);
    table.register(symtab, "quit", quit);
    table.register(symtab, "abort", abort);
}

fn id(_ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    Ok(())
}

fn gc(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    ctx.collect_garbage();
    Ok(())
}

/// Pushes `[used max collections]`.
fn gcstats(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let stats = ctx.memory_stats();
    let mut head = NULL;
    for v in [stats.collections as i64, stats.nodes_max as i64, stats.nodes_live as i64] {
        head = ctx.new_node(Tag::Integer, Payload::Int(v), head)?;
    }
    ctx.push(Tag::List, Payload::List(head))
}

fn quit(_ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    Err(JoyError::quit())
}

fn abort(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let top = ctx.pop_for("abort")?;
    let message = match top.payload {
        Payload::Str(s) => s.to_string(),
        _ => "abort".to_string(),
    };
    Err(JoyError::abort(message))
}
