//! Dictionary operations over the heap's side table of association
//! lists (`joy_core::Heap::dicts`). Grounded in
//! `examples/original_source/src/builtin/dict.c`.
//!
//! Dicts are value types like everything else: `dput`/`ddel` clone the
//! backing association list rather than mutating it in place, so an
//! older reference to the same dict (still reachable elsewhere on the
//! stack) is unaffected. Names are `d`-prefixed (`dget`/`dput`/...) to
//! keep them distinct from the `io` module's stack-printing `get`/`put`.

use joy_core::{Context, DictId, Heap, JoyError, JoyResult, Payload, SymbolTable, Tag};

use crate::dispatch::PrimTable;

pub(crate) fn register(table: &mut PrimTable, symtab: &mut SymbolTable) {
    table.register(symtab, "newdict", newdict);
    table.register(symtab, "dget", get);
    table.register(symtab, "dput", put);
    table.register(symtab, "ddel", delete);
    table.register(symtab, "dhas", has);
    table.register(symtab, "dsize", dictsize);
    table.register(symtab, "dkeys", keys);
}

fn as_dict(payload: &Payload, who: &str) -> JoyResult<DictId> {
    match payload {
        Payload::Dict(id) => Ok(*id),
        _ => Err(JoyError::type_error(format!("{who}: expected a dict"))),
    }
}

fn as_key(payload: &Payload, who: &str) -> JoyResult<std::sync::Arc<str>> {
    match payload {
        Payload::Str(s) => Ok(std::sync::Arc::clone(s)),
        _ => Err(JoyError::type_error(format!("{who}: expected a string key"))),
    }
}

fn newdict(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let id = ctx.heap.new_dict();
    ctx.push(Tag::Dict, Payload::Dict(id))
}

/// `dict key dget => dict value` — leaves the dict on the stack
/// alongside the retrieved value, matching the aggregate-access
/// convention (`at`/`of`).
fn get(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let key_node = ctx.pop_for("dget")?;
    let dict_node = ctx.pop_for("dget")?;
    let id = as_dict(&dict_node.payload, "dget")?;
    let key = as_key(&key_node.payload, "dget")?;
    let value_idx = ctx
        .heap
        .dict(id)
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .ok_or_else(|| JoyError::runtime("dget: key not found"))?;
    let copied = ctx.deep_copy(value_idx)?;
    ctx.push(Tag::Dict, Payload::Dict(id))?;
    let node = ctx.heap.node(copied).clone();
    let idx = ctx.new_node(node.tag, node.payload, ctx.stack)?;
    ctx.stack = idx;
    Ok(())
}

/// `dict key value dput => dict'`.
fn put(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let value_node = ctx.pop_for("dput")?;
    let key_node = ctx.pop_for("dput")?;
    let dict_node = ctx.pop_for("dput")?;
    let id = as_dict(&dict_node.payload, "dput")?;
    let key = as_key(&key_node.payload, "dput")?;
    let value_idx = ctx.new_node(value_node.tag, value_node.payload, joy_core::NULL)?;
    let new_id = ctx.heap.clone_dict(id);
    let entries = ctx.heap.dict_mut(new_id);
    if let Some(entry) = entries.iter_mut().find(|(k, _)| *k == key) {
        entry.1 = value_idx;
    } else {
        entries.push((key, value_idx));
    }
    ctx.push(Tag::Dict, Payload::Dict(new_id))
}

fn delete(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let key_node = ctx.pop_for("ddel")?;
    let dict_node = ctx.pop_for("ddel")?;
    let id = as_dict(&dict_node.payload, "ddel")?;
    let key = as_key(&key_node.payload, "ddel")?;
    let new_id = ctx.heap.clone_dict(id);
    ctx.heap.dict_mut(new_id).retain(|(k, _)| *k != key);
    ctx.push(Tag::Dict, Payload::Dict(new_id))
}

fn has(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let key_node = ctx.pop_for("dhas")?;
    let dict_node = ctx.pop_for("dhas")?;
    let id = as_dict(&dict_node.payload, "dhas")?;
    let key = as_key(&key_node.payload, "dhas")?;
    let present = ctx.heap.dict(id).iter().any(|(k, _)| *k == key);
    ctx.push(Tag::Boolean, Payload::Bool(present))
}

fn dictsize(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let dict_node = ctx.pop_for("dsize")?;
    let id = as_dict(&dict_node.payload, "dsize")?;
    let len = ctx.heap.dict(id).len();
    ctx.push(Tag::Integer, Payload::Int(len as i64))
}

fn keys(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let dict_node = ctx.pop_for("dkeys")?;
    let id = as_dict(&dict_node.payload, "dkeys")?;
    let names: Vec<_> = ctx.heap.dict(id).iter().map(|(k, _)| std::sync::Arc::clone(k)).collect();
    let mut head = joy_core::NULL;
    for name in names.into_iter().rev() {
        head = ctx.new_node(Tag::String, Payload::Str(name), head)?;
    }
    ctx.push(Tag::List, Payload::List(head))
}

#[cfg(test)]
mod tests {
    use super::*;
    use joy_core::JoyConfig;

    fn run(ctx: &mut Context, table: &PrimTable, name: &str) {
        let id = table.id_by_name(&ctx.symtab, name).unwrap();
        table.invoke(ctx, None, id).unwrap();
    }

    #[test]
    fn put_then_get_round_trips_a_value() {
        let mut ctx = Context::new(JoyConfig::default());
        let table = PrimTable::new(&mut ctx.symtab);
        run(&mut ctx, &table, "newdict");
        ctx.push(Tag::String, Payload::Str("answer".into())).unwrap();
        ctx.push(Tag::Integer, Payload::Int(42)).unwrap();
        run(&mut ctx, &table, "dput");
        ctx.push(Tag::String, Payload::Str("answer".into())).unwrap();
        run(&mut ctx, &table, "dget");
        match ctx.pop().unwrap().payload {
            Payload::Int(v) => assert_eq!(v, 42),
            _ => panic!("expected integer"),
        }
    }

    #[test]
    fn put_does_not_mutate_an_older_clone() {
        let mut ctx = Context::new(JoyConfig::default());
        let table = PrimTable::new(&mut ctx.symtab);
        run(&mut ctx, &table, "newdict");
        let original = match ctx.heap.node(ctx.stack).payload {
            Payload::Dict(id) => id,
            _ => panic!(),
        };
        ctx.push(Tag::String, Payload::Str("k".into())).unwrap();
        ctx.push(Tag::Integer, Payload::Int(1)).unwrap();
        run(&mut ctx, &table, "dput");
        assert_eq!(ctx.heap.dict(original).len(), 0);
    }
}
