//! Type and shape predicates. Grounded in
//! `examples/original_source/src/builtin/type.c`.

use joy_core::{Context, Heap, JoyResult, Payload, SymbolTable, Tag, NULL};

use crate::dispatch::PrimTable;

pub(crate) fn register(table: &mut PrimTable, symtab: &mut SymbolTable) {
    table.register(symtab, "null", is_null);
    table.register(symtab, "small", is_small);
    table.register(symtab, "integer", is_integer);
    table.register(symtab, "char", is_char);
    table.register(symtab, "logical", is_logical);
    table.register(symtab, "string", is_string);
    table.register(symtab, "list", is_list);
    table.register(symtab, "set", is_set);
    table.register(symtab, "user", is_user);
    table.register(symtab, "float", is_float);
    table.register(symtab, "file", is_file);
    table.register(symtab, "leaf", is_leaf);
}

fn predicate(ctx: &mut Context, who: &str, f: impl FnOnce(&Payload, joy_core::Tag) -> bool) -> JoyResult<()> {
    let top = ctx.pop_for(who)?;
    let result = f(&top.payload, top.tag);
    ctx.push(Tag::Boolean, Payload::Bool(result))
}

fn is_null(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    predicate(ctx, "null", |payload, _tag| match payload {
        Payload::List(head) => *head == NULL,
        Payload::Str(s) => s.is_empty(),
        Payload::Set(bits) => *bits == 0,
        _ => false,
    })
}

/// "small": an integer whose value fits the reference implementation's
/// 30-bit tagged-fixnum range, or a boolean/char (`type.c`'s `small`).
fn is_small(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    predicate(ctx, "small", |payload, _tag| match payload {
        Payload::Int(v) => (-(1 << 29)..(1 << 29)).contains(v),
        Payload::Bool(_) | Payload::Char(_) => true,
        _ => false,
    })
}

fn is_integer(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    predicate(ctx, "integer", |_payload, tag| tag == Tag::Integer)
}

fn is_char(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    predicate(ctx, "char", |_payload, tag| tag == Tag::Character)
}

fn is_logical(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    predicate(ctx, "logical", |_payload, tag| tag == Tag::Boolean)
}

fn is_string(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    predicate(ctx, "string", |_payload, tag| tag == Tag::String)
}

fn is_list(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    predicate(ctx, "list", |_payload, tag| tag == Tag::List)
}

fn is_set(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    predicate(ctx, "set", |_payload, tag| tag == Tag::Set)
}

fn is_user(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    predicate(ctx, "user", |_payload, tag| {
        tag == Tag::UserDefined || tag == Tag::AnonymousFunction
    })
}

fn is_float(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    predicate(ctx, "float", |_payload, tag| tag == Tag::Float)
}

fn is_file(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    predicate(ctx, "file", |_payload, tag| tag == Tag::File)
}

/// "leaf": not a list, set or dict — the atomic value kinds.
fn is_leaf(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    predicate(ctx, "leaf", |_payload, tag| {
        !matches!(tag, Tag::List | Tag::Set | Tag::Dict)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use joy_core::JoyConfig;

    fn run_predicate(name: &str, tag: Tag, payload: Payload) -> bool {
        let mut ctx = Context::new(JoyConfig::default());
        let table = PrimTable::new(&mut ctx.symtab);
        ctx.push(tag, payload).unwrap();
        let id = table.id_by_name(&ctx.symtab, name).unwrap();
        table.invoke(&mut ctx, None, id).unwrap();
        match ctx.pop().unwrap().payload {
            Payload::Bool(b) => b,
            _ => panic!("expected boolean result"),
        }
    }

    #[test]
    fn null_is_true_only_for_empty_aggregates() {
        assert!(run_predicate("null", Tag::List, Payload::List(NULL)));
        assert!(!run_predicate("null", Tag::Integer, Payload::Int(0)));
    }

    #[test]
    fn integer_predicate_checks_tag_not_value() {
        assert!(run_predicate("integer", Tag::Integer, Payload::Int(-5)));
        assert!(!run_predicate("integer", Tag::Float, Payload::Float(1.0)));
    }

    #[test]
    fn leaf_excludes_aggregates() {
        assert!(run_predicate("leaf", Tag::Integer, Payload::Int(1)));
        assert!(!run_predicate("leaf", Tag::List, Payload::List(NULL)));
    }
}
