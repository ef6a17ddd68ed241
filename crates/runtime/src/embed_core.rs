//! Safe internal API behind the embedding façade (`spec.md` §4.5):
//! context lifecycle, phrase-at-a-time evaluation with autoput applied
//! the way the REPL applies it, and introspection. `joy-embed`'s
//! `extern "C"` wrappers and `joy-repl`'s interactive loop both sit on
//! top of [`Interpreter`] rather than duplicating this logic.

use std::io::Read as _;
use std::path::Path;

use joy_core::{Autoput, Context, Echo, Index, JoyConfig, JoyError, JoyResult, MemoryStats, Recovery, NULL};

use crate::dispatch::PrimTable;
use crate::reader::Reader;
use crate::writer::format_value;

/// One embeddable interpreter: a context plus the primitive table bound
/// to it. `joy_create`/`joy_destroy` in `joy-embed` map directly onto
/// construction and drop.
pub struct Interpreter {
    ctx: Context,
    prims: PrimTable,
}

impl Interpreter {
    pub fn new(config: JoyConfig) -> Self {
        let mut ctx = Context::new(config);
        let prims = PrimTable::new(&mut ctx.symtab);
        Interpreter { ctx, prims }
    }

    /// Read and execute `source` one `.`-terminated phrase at a time,
    /// applying autoput after each, matching the REPL's own loop
    /// (`spec.md` §6). A RETRY-class error discards the rest of the
    /// offending phrase and continues with the next one; the most
    /// recent such error is returned at the end (still as `Err`, so the
    /// embedder sees a result code) once every phrase has run. A
    /// QUIT-class error (`OutOfMemory`/`Quit`/`Abort`) propagates
    /// immediately instead, matching `spec.md` §7's recovery rules.
    pub fn eval_string(&mut self, source: &str) -> JoyResult<()> {
        self.ctx.last_error = None;
        let mut reader = Reader::new(source);
        let mut pending_retry: Option<JoyError> = None;
        loop {
            match reader.next_phrase(&mut self.ctx, &self.prims) {
                Ok(None) => return pending_retry.map_or(Ok(()), Err),
                Ok(Some(outcome)) => {
                    if let Err(err) = self.run_phrase(outcome.program) {
                        if err.recovery() == Recovery::Quit {
                            return Err(err);
                        }
                        pending_retry = Some(err);
                    }
                }
                Err(err) => {
                    let err = self.ctx.raise(err);
                    reader.recover_to_next_dot();
                    if err.recovery() == Recovery::Quit {
                        return Err(err);
                    }
                    pending_retry = Some(err);
                }
            }
        }
    }

    fn run_phrase(&mut self, program: Index) -> JoyResult<()> {
        match crate::eval::exec_term(&mut self.ctx, None, &self.prims, program) {
            Ok(()) => {
                self.apply_autoput();
                Ok(())
            }
            Err(err) => Err(self.ctx.raise(err)),
        }
    }

    fn apply_autoput(&mut self) {
        match self.ctx.autoput {
            1 => {
                if self.ctx.stack != NULL {
                    let text = format_value(&self.ctx, self.ctx.stack);
                    self.ctx.io.write_string(&text);
                    self.ctx.io.write_char(b'\n');
                    let _ = self.ctx.pop();
                }
            }
            2 => {
                let mut parts = Vec::new();
                let mut cur = self.ctx.stack;
                while cur != NULL {
                    parts.push(format_value(&self.ctx, cur));
                    cur = self.ctx.heap.node(cur).next;
                }
                self.ctx.io.write_string(&parts.join(" "));
                self.ctx.io.write_char(b'\n');
            }
            _ => {}
        }
    }

    /// Read `reader` to EOF and evaluate it as one source (`spec.md`
    /// §4.5 `eval_file`).
    pub fn eval_file(&mut self, mut reader: impl std::io::Read, name: &str) -> JoyResult<()> {
        let mut source = String::new();
        reader
            .read_to_string(&mut source)
            .map_err(|e| JoyError::io(format!("{name}: {e}")))?;
        self.eval_string(&source)
    }

    /// Load a prelude file: definitions and any free top-level terms
    /// run exactly as `eval_string` would (`spec.md` §4.5 "convenience
    /// wrapper that includes a prelude file").
    pub fn load_stdlib(&mut self, path: &Path) -> JoyResult<()> {
        let source = std::fs::read_to_string(path).map_err(|e| JoyError::io(format!("{}: {e}", path.display())))?;
        self.eval_string(&source)
    }

    pub fn stack_depth(&self) -> usize {
        self.ctx.stack_depth()
    }

    pub fn stack_empty(&self) -> bool {
        self.ctx.stack_empty()
    }

    pub fn stack_clear(&mut self) {
        self.ctx.stack_clear()
    }

    pub fn last_error(&self) -> Option<&JoyError> {
        self.ctx.last_error.as_ref()
    }

    pub fn autoput(&self) -> Autoput {
        self.ctx.autoput
    }

    pub fn set_autoput(&mut self, mode: Autoput) {
        self.ctx.autoput = mode;
    }

    pub fn echo(&self) -> Echo {
        self.ctx.echo
    }

    pub fn set_echo(&mut self, mode: Echo) {
        self.ctx.echo = mode;
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.ctx.memory_stats()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    pub fn prims(&self) -> &PrimTable {
        &self.prims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joy_core::{JoyErrorKind, Payload};

    #[test]
    fn eval_string_runs_a_phrase_and_leaves_the_result_on_the_stack() {
        let mut config = JoyConfig::default();
        config.autoput = 0;
        let mut interp = Interpreter::new(config);
        interp.eval_string("1 2 + .").unwrap();
        assert_eq!(interp.stack_depth(), 1);
        match interp.context().heap.node(interp.context().stack).payload {
            Payload::Int(v) => assert_eq!(v, 3),
            _ => panic!("expected integer"),
        }
    }

    #[test]
    fn autoput_one_prints_and_pops_the_top_item() {
        let mut config = JoyConfig::default();
        config.autoput = 1;
        let mut interp = Interpreter::new(config);
        interp.eval_string("1 2 + .").unwrap();
        assert!(interp.stack_empty());
    }

    #[test]
    fn runtime_error_retries_at_the_next_phrase() {
        let mut config = JoyConfig::default();
        config.autoput = 0;
        let mut interp = Interpreter::new(config);
        let err = interp.eval_string("1 0 / . 9 .").unwrap_err();
        assert_eq!(err.kind, JoyErrorKind::Runtime);
        assert_eq!(interp.last_error().unwrap().kind, JoyErrorKind::Runtime);
        assert_eq!(interp.stack_depth(), 1);
        match interp.context().heap.node(interp.context().stack).payload {
            Payload::Int(v) => assert_eq!(v, 9),
            _ => panic!("expected integer"),
        }
    }

    #[test]
    fn syntax_error_recovers_at_the_next_dot() {
        let mut config = JoyConfig::default();
        config.autoput = 0;
        let mut interp = Interpreter::new(config);
        let err = interp.eval_string("1 2 @ garbage . 5 .").unwrap_err();
        assert_eq!(err.kind, JoyErrorKind::Syntax);
        assert_eq!(interp.last_error().unwrap().kind, JoyErrorKind::Syntax);
        assert_eq!(interp.stack_depth(), 1);
        match interp.context().heap.node(interp.context().stack).payload {
            Payload::Int(v) => assert_eq!(v, 5),
            _ => panic!("expected integer"),
        }
    }
}
