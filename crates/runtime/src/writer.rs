//! Value-to-text rendering: `write`/`write-to-string`, and the textual
//! form `putchars`/autoput prints. Grounded in
//! `examples/original_source/src/write.c`'s `writefactor`.

use joy_core::{strings, Body, Context, Index, Payload, Tag, NULL};

/// Render the value rooted at `idx` the way the reference writer would:
/// aggregates space-separated and bracketed, strings double-quoted and
/// escaped, user symbols and primitives by name.
pub fn format_value(ctx: &Context, idx: Index) -> String {
    if idx == NULL {
        return String::new();
    }
    let node = ctx.heap.node(idx);
    match node.tag {
        Tag::Boolean => match node.payload {
            Payload::Bool(true) => "true".to_string(),
            Payload::Bool(false) => "false".to_string(),
            _ => unreachable!(),
        },
        Tag::Character => match node.payload {
            Payload::Char(c) => format!("'{c}"),
            _ => unreachable!(),
        },
        Tag::Integer => match node.payload {
            Payload::Int(v) => v.to_string(),
            _ => unreachable!(),
        },
        Tag::Float => match node.payload {
            Payload::Float(v) => format_float(v),
            _ => unreachable!(),
        },
        Tag::Set => match node.payload {
            Payload::Set(bits) => format_set(bits),
            _ => unreachable!(),
        },
        Tag::String => match &node.payload {
            Payload::Str(s) => format!("\"{}\"", strings::escape(s)),
            _ => unreachable!(),
        },
        Tag::Bignum => match &node.payload {
            Payload::Bignum(s) => s.to_string(),
            _ => unreachable!(),
        },
        Tag::List => match node.payload {
            Payload::List(head) => format_list(ctx, head),
            _ => unreachable!(),
        },
        Tag::Dict => match node.payload {
            Payload::Dict(id) => format_dict(ctx, id),
            _ => unreachable!(),
        },
        Tag::AnonymousFunction => match node.payload {
            Payload::Prim(id) => ctx
                .symtab
                .lookup_primitive(id)
                .map(|sym| ctx.symtab.entry(sym).name.to_string())
                .unwrap_or_else(|| "<primitive>".to_string()),
            _ => unreachable!(),
        },
        Tag::UserDefined => match node.payload {
            Payload::Symbol(sym) => ctx.symtab.entry(sym).name.to_string(),
            _ => unreachable!(),
        },
        Tag::File => "<file>".to_string(),
        Tag::Illegal | Tag::Copied => "<invalid>".to_string(),
    }
}

fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

fn format_set(bits: u64) -> String {
    let members: Vec<String> = (0..64u32).filter(|n| bits & (1 << n) != 0).map(|n| n.to_string()).collect();
    format!("{{{}}}", members.join(" "))
}

fn format_list(ctx: &Context, head: Index) -> String {
    let mut parts = Vec::new();
    let mut cur = head;
    while cur != NULL {
        parts.push(format_value(ctx, cur));
        cur = ctx.heap.node(cur).next;
    }
    format!("[{}]", parts.join(" "))
}

fn format_dict(ctx: &Context, id: joy_core::DictId) -> String {
    let parts: Vec<String> = ctx
        .heap
        .dict(id)
        .iter()
        .map(|(k, v)| format!("\"{}\":{}", strings::escape(k), format_value(ctx, *v)))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

/// Render a user definition's body the way `write` prints a quoted
/// program, used by the REPL's `manual`/listing support and tests.
pub fn format_body(ctx: &Context, body: &Body) -> String {
    match body {
        Body::Primitive(id) => ctx
            .symtab
            .lookup_primitive(*id)
            .map(|sym| ctx.symtab.entry(sym).name.to_string())
            .unwrap_or_else(|| "<primitive>".to_string()),
        Body::User(head) => format_list(ctx, *head),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joy_core::JoyConfig;

    #[test]
    fn formats_nested_list_with_brackets_and_spaces() {
        let mut ctx = Context::new(JoyConfig::default());
        let inner = ctx.new_node(Tag::Integer, Payload::Int(2), NULL).unwrap();
        let one = ctx.new_node(Tag::Integer, Payload::Int(1), inner).unwrap();
        let list = ctx.new_node(Tag::List, Payload::List(one), NULL).unwrap();
        assert_eq!(format_value(&ctx, list), "[1 2]");
    }

    #[test]
    fn formats_string_with_quotes_and_escapes() {
        let mut ctx = Context::new(JoyConfig::default());
        let s = ctx
            .new_node(Tag::String, Payload::Str("a\nb".into()), NULL)
            .unwrap();
        assert_eq!(format_value(&ctx, s), "\"a\\nb\"");
    }

    #[test]
    fn formats_booleans_as_lowercase_words() {
        let mut ctx = Context::new(JoyConfig::default());
        let t = ctx.new_node(Tag::Boolean, Payload::Bool(true), NULL).unwrap();
        assert_eq!(format_value(&ctx, t), "true");
    }
}
