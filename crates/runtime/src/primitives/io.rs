//! I/O primitives: `put putchars get`. Every byte produced or consumed
//! routes through `ctx.io` (the `JoyIo` vtable), never touching stdio
//! directly — grounded in `examples/original_source/src/builtin/io.c`,
//! redirected per `spec.md` §4.5.

use joy_core::{Context, Heap, JoyError, JoyResult, Payload, SymbolTable, Tag};

use crate::dispatch::PrimTable;
use crate::writer::format_value;

pub(crate) fn register(table: &mut PrimTable, symtab: &mut SymbolTable) {
    table.register(symtab, "put", put);
    table.register(symtab, "putchars", putchars);
    table.register(symtab, "get", get_char);
}

/// Print the top value's textual representation, followed by a
/// newline, then pop it.
fn put(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let top = ctx.pop_for("put")?;
    let idx = ctx.new_node(top.tag, top.payload, joy_core::NULL)?;
    let text = format_value(ctx, idx);
    ctx.io.write_string(&text);
    ctx.io.write_char(b'\n');
    Ok(())
}

/// Print a string's raw characters with no quoting and no trailing
/// newline.
fn putchars(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let top = ctx.pop_for("putchars")?;
    match top.payload {
        Payload::Str(s) => {
            ctx.io.write_string(&s);
            Ok(())
        }
        _ => Err(JoyError::type_error("putchars: expected a string")),
    }
}

/// Read one character from the input callback; pushes its character
/// value, or the character with code point 0 at end of input (matching
/// the reference implementation's EOF sentinel).
fn get_char(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let c = ctx.io.read_char().unwrap_or(0) as char;
    ctx.push(Tag::Character, Payload::Char(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use joy_core::{JoyConfig, JoyErrorKind};
    use std::sync::{Arc, Mutex};

    struct CapturingIo {
        out: Arc<Mutex<String>>,
    }

    impl joy_core::JoyIo for CapturingIo {
        fn read_char(&mut self) -> Option<u8> {
            None
        }
        fn write_char(&mut self, c: u8) {
            self.out.lock().unwrap().push(c as char);
        }
        fn write_string(&mut self, s: &str) {
            self.out.lock().unwrap().push_str(s);
        }
        fn on_error(&mut self, _kind: JoyErrorKind, _message: &str, _line: u32, _column: u32) {}
    }

    #[test]
    fn putchars_writes_raw_bytes_with_no_quoting() {
        let out = Arc::new(Mutex::new(String::new()));
        let mut ctx = Context::new(JoyConfig {
            io: Some(Box::new(CapturingIo { out: Arc::clone(&out) })),
            ..JoyConfig::default()
        });
        let table = PrimTable::new(&mut ctx.symtab);
        ctx.push(Tag::String, Payload::Str("hello".into())).unwrap();
        let id = table.id_by_name(&ctx.symtab, "putchars").unwrap();
        table.invoke(&mut ctx, None, id).unwrap();
        assert_eq!(out.lock().unwrap().as_str(), "hello");
    }

    #[test]
    fn put_appends_a_trailing_newline() {
        let out = Arc::new(Mutex::new(String::new()));
        let mut ctx = Context::new(JoyConfig {
            io: Some(Box::new(CapturingIo { out: Arc::clone(&out) })),
            ..JoyConfig::default()
        });
        let table = PrimTable::new(&mut ctx.symtab);
        ctx.push(Tag::Integer, Payload::Int(3)).unwrap();
        let id = table.id_by_name(&ctx.symtab, "put").unwrap();
        table.invoke(&mut ctx, None, id).unwrap();
        assert_eq!(out.lock().unwrap().as_str(), "3\n");
    }
}
