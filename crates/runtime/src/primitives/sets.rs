//! Set operations beyond the shared boolean/bitwise `and`/`or`/`not`
//! (see `arithmetic.rs`): `xor diff in`. Grounded in
//! `examples/original_source/src/builtin/sets.c`.

use joy_core::{Context, Heap, JoyError, JoyResult, Payload, SymbolTable, Tag};

use crate::dispatch::PrimTable;

pub(crate) fn register(table: &mut PrimTable, symtab: &mut SymbolTable) {
    table.register(symtab, "xor", xor);
    table.register(symtab, "diff", diff);
    table.register(symtab, "in", in_);
}

fn as_set(payload: &Payload, who: &str) -> JoyResult<u64> {
    match payload {
        Payload::Set(bits) => Ok(*bits),
        _ => Err(JoyError::type_error(format!("{who}: expected a set"))),
    }
}

fn xor(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let b = ctx.pop_for("xor")?;
    let a = ctx.pop_for("xor")?;
    let result = as_set(&a.payload, "xor")? ^ as_set(&b.payload, "xor")?;
    ctx.push(Tag::Set, Payload::Set(result))
}

/// `diff == S1 S2 -> S1 \ S2` (members of S1 not in S2).
fn diff(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let b = ctx.pop_for("diff")?;
    let a = ctx.pop_for("diff")?;
    let result = as_set(&a.payload, "diff")? & !as_set(&b.payload, "diff")?;
    ctx.push(Tag::Set, Payload::Set(result))
}

/// `N S in => boolean`: is bit position N a member of S.
fn in_(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let set = ctx.pop_for("in")?;
    let member = ctx.pop_for("in")?;
    let bits = as_set(&set.payload, "in")?;
    let n = match member.payload {
        Payload::Int(v) => v,
        _ => return Err(JoyError::type_error("in: expected an integer member")),
    };
    if !(0..64).contains(&n) {
        return Err(JoyError::runtime("in: member out of range 0..63"));
    }
    let present = bits & (1u64 << n) != 0;
    ctx.push(Tag::Boolean, Payload::Bool(present))
}
