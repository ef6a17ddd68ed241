//! The context: one isolated interpreter — heap, GC, symbol table, the
//! six evaluator root registers, I/O, configuration, and the last
//! captured error. Grounded in `examples/original_source/include/globals.h`'s
//! `Env` struct.

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::error::{JoyError, JoyErrorKind, JoyResult};
use crate::gc;
use crate::heap::Heap;
use crate::node::{Index, Node, Payload, PrimId, SymIndex, Tag, NULL};
use crate::stats::MemoryStats;
use crate::symtab::SymbolTable;

/// Autoput policy (`spec.md` §6): 0 never prints, 1 prints and pops the
/// top item after each top-level line, 2 prints the whole stack intact.
pub type Autoput = u8;
/// Echo policy: 0 off, 1 line text, 2 tab-prefixed, 3 line-numbered.
pub type Echo = u8;

/// The I/O vtable (`spec.md` §4.5). Every output-producing primitive
/// routes through this trait rather than touching stdio directly.
/// Implementations must be `Send`: a parallel task's child context
/// (always wired to [`NullIo`]) is moved onto a worker thread whole.
pub trait JoyIo {
    fn read_char(&mut self) -> Option<u8>;
    fn write_char(&mut self, c: u8);
    fn write_string(&mut self, s: &str);
    fn on_error(&mut self, kind: JoyErrorKind, message: &str, line: u32, column: u32);
}

/// Default adapter: process stdio. Used whenever the embedder does not
/// install a callback vtable.
pub struct StdioIo {
    stdin: std::io::Stdin,
}

impl Default for StdioIo {
    fn default() -> Self {
        StdioIo {
            stdin: std::io::stdin(),
        }
    }
}

impl JoyIo for StdioIo {
    fn read_char(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        match self.stdin.lock().read(&mut buf) {
            Ok(1) => Some(buf[0]),
            _ => None,
        }
    }

    fn write_char(&mut self, c: u8) {
        let _ = std::io::stdout().write_all(&[c]);
    }

    fn write_string(&mut self, s: &str) {
        let _ = std::io::stdout().write_all(s.as_bytes());
    }

    fn on_error(&mut self, kind: JoyErrorKind, message: &str, line: u32, column: u32) {
        eprintln!("{}: {message} (line {line}, column {column})", kind.as_str());
    }
}

/// Configuration accepted at context creation (`spec.md` §4.5).
/// Unspecified fields default to: autoput = 1, echo = 0, gc trace off.
pub struct JoyConfig {
    pub initial_memory_size: usize,
    /// Zero means unbounded.
    pub max_memory_size: usize,
    pub enable_gc_trace: bool,
    pub autoput: Autoput,
    pub echo: Echo,
    pub undeferror: bool,
    pub io: Option<Box<dyn JoyIo + Send>>,
}

impl Default for JoyConfig {
    fn default() -> Self {
        JoyConfig {
            initial_memory_size: 4096,
            max_memory_size: 0,
            enable_gc_trace: false,
            autoput: 1,
            echo: 0,
            undeferror: true,
            io: None,
        }
    }
}

pub struct Context {
    pub heap: Heap,
    pub symtab: SymbolTable,
    pub stack: Index,
    pub program: Index,
    pub conts: Index,
    pub dumps: [Index; 5],
    pub autoput: Autoput,
    pub echo: Echo,
    pub gc_trace: bool,
    pub undeferror: bool,
    pub overwrite: bool,
    pub io: Box<dyn JoyIo + Send>,
    pub last_error: Option<JoyError>,
    /// Populated only in a parallel-task child context: caches bodies
    /// deep-copied from the parent heap the first time a user symbol is
    /// resolved during that task (`spec.md` §4.4).
    pub(crate) local_body_cache: HashMap<SymIndex, Index>,
}

impl Context {
    pub fn new(config: JoyConfig) -> Self {
        let node_budget = (config.initial_memory_size / std::mem::size_of::<Node>()).max(8);
        let max_nodes = if config.max_memory_size == 0 {
            None
        } else {
            Some((config.max_memory_size / std::mem::size_of::<Node>()).max(node_budget))
        };
        Context {
            heap: Heap::new(node_budget, max_nodes),
            symtab: SymbolTable::new(),
            stack: NULL,
            program: NULL,
            conts: NULL,
            dumps: [NULL; 5],
            autoput: config.autoput,
            echo: config.echo,
            gc_trace: config.enable_gc_trace,
            undeferror: config.undeferror,
            overwrite: false,
            io: config.io.unwrap_or_else(|| Box::new(StdioIo::default())),
            last_error: None,
            local_body_cache: HashMap::new(),
        }
    }

    /// A context spawned for a parallel task: fresh heap/GC/registers,
    /// shared (read-only) symbol table contents copied in wholesale
    /// since it is small and never mutated by a worker, disabled I/O
    /// (`spec.md` §4.4 step 1 — "callbacks in the child context are set
    /// to null at clone time", §5).
    pub fn spawn_child(&self, node_budget: usize) -> Self {
        Context {
            heap: Heap::new(node_budget, None),
            symtab: self.symtab.clone(),
            stack: NULL,
            program: NULL,
            conts: NULL,
            dumps: [NULL; 5],
            autoput: 0,
            echo: 0,
            gc_trace: self.gc_trace,
            undeferror: self.undeferror,
            overwrite: false,
            io: Box::new(NullIo),
            last_error: None,
            local_body_cache: HashMap::new(),
        }
    }

    fn root_indices(&self) -> Vec<Index> {
        let mut roots = vec![self.stack, self.program, self.conts];
        roots.extend_from_slice(&self.dumps);
        roots.extend(self.symtab.root_entries().map(|(_, idx)| idx));
        roots.extend(self.local_body_cache.values().copied());
        roots
    }

    /// Allocate one node, running GC (mark/sweep, then growth, then an
    /// opportunistic shrink-compaction) exactly per the protocol in
    /// `spec.md` §4.1/§4.2.
    pub fn new_node(&mut self, tag: Tag, payload: Payload, next: Index) -> JoyResult<Index> {
        loop {
            if let Some(idx) = self.heap.try_alloc() {
                self.heap.set(idx, tag, payload, next);
                return Ok(idx);
            }
            if self.heap.is_reading_definition() {
                if !self.heap.grow() {
                    return Err(JoyError::out_of_memory());
                }
                continue;
            }
            let roots = self.root_indices();
            let freed = gc::collect(&mut self.heap, &roots);
            if self.gc_trace {
                tracing::debug!(freed, "gc_trace: sweep reclaimed cells");
            }
            if freed == 0 && !self.heap.grow() {
                return Err(JoyError::out_of_memory());
            }
            self.try_shrink();
        }
    }

    /// Copy the header/payload of an existing node into a fresh cell,
    /// linking it with `next` — the "copying-without-cloning-next-chain"
    /// primitive operation of `spec.md` §4.1.
    pub fn new_node_from(&mut self, source: Index, next: Index) -> JoyResult<Index> {
        let node = self.heap.node(source).clone();
        self.new_node(node.tag, node.payload, next)
    }

    /// Push a fresh, independent copy of the list rooted at `head`
    /// (iterative over `next`, bounded recursion into `LIST` subchains) —
    /// used by the evaluator when pushing a self-quoting literal
    /// (`spec.md` §4.3 step 4: "Copying is necessary because the same
    /// literal node is shared by every execution of the enclosing
    /// quotation").
    pub fn deep_copy(&mut self, head: Index) -> JoyResult<Index> {
        // Walk the next-chain iteratively (bounded host-stack depth no
        // matter how long the list is); only LIST/DICT subnodes recurse,
        // bounded by actual nesting depth (`spec.md` §4.4).
        let mut originals = Vec::new();
        let mut cur = head;
        while cur != NULL {
            let node = self.heap.node(cur).clone();
            cur = node.next;
            originals.push(node);
        }
        let mut next = NULL;
        for node in originals.into_iter().rev() {
            let payload = match node.payload {
                Payload::List(inner) => Payload::List(self.deep_copy(inner)?),
                Payload::Dict(id) => Payload::Dict(self.deep_copy_dict(id)?),
                other => other,
            };
            next = self.new_node(node.tag, payload, next)?;
        }
        Ok(next)
    }

    fn deep_copy_dict(&mut self, id: crate::node::DictId) -> JoyResult<crate::node::DictId> {
        let entries: Vec<_> = self.heap.dict(id).to_vec();
        let new_id = self.heap.new_dict();
        for (key, value) in entries {
            let copied = self.deep_copy(value)?;
            self.heap.dict_mut(new_id).push((key, copied));
        }
        Ok(new_id)
    }

    fn try_shrink(&mut self) {
        let extra_roots: Vec<Index> = self.symtab.root_entries().map(|(_, idx)| idx).collect();
        let mut stack = self.stack;
        let mut program = self.program;
        let mut conts = self.conts;
        let mut dumps = self.dumps;
        let mut roots: Vec<&mut Index> = vec![&mut stack, &mut program, &mut conts];
        roots.extend(dumps.iter_mut());
        if let Some((mem_low, table)) = gc::compact_shrink(&mut self.heap, &mut roots, &extra_roots) {
            self.stack = stack;
            self.program = program;
            self.conts = conts;
            self.dumps = dumps;
            let updates: Vec<(SymIndex, Index)> = self
                .symtab
                .root_entries()
                .map(|(sym, idx)| (sym, gc::remap(idx, mem_low, &table)))
                .collect();
            for (sym, idx) in updates {
                self.symtab.rebind_body(sym, idx);
            }
            for idx in self.local_body_cache.values_mut() {
                *idx = gc::remap(*idx, mem_low, &table);
            }
        }
    }

    /// Force an immediate mark/sweep collection outside the ordinary
    /// allocation path, for the `gc` primitive and diagnostics. Returns
    /// the number of ephemeral cells reclaimed.
    pub fn collect_garbage(&mut self) -> usize {
        let roots = self.root_indices();
        let freed = gc::collect(&mut self.heap, &roots);
        self.try_shrink();
        freed
    }

    pub fn memory_stats(&self) -> MemoryStats {
        MemoryStats::from_heap(self.heap.memory_used(), self.heap.memory_max(), self.heap.stats())
    }

    pub fn stack_depth(&self) -> usize {
        let mut count = 0;
        let mut cur = self.stack;
        while cur != NULL {
            count += 1;
            cur = self.heap.node(cur).next;
        }
        count
    }

    pub fn stack_empty(&self) -> bool {
        self.stack == NULL
    }

    pub fn stack_clear(&mut self) {
        self.stack = NULL;
    }

    pub fn push(&mut self, tag: Tag, payload: Payload) -> JoyResult<()> {
        let idx = self.new_node(tag, payload, self.stack)?;
        self.stack = idx;
        Ok(())
    }

    pub fn pop(&mut self) -> JoyResult<Node> {
        self.pop_for("pop")
    }

    /// Pop the top of the stack, naming `factor` as the caller in the
    /// underflow message (`spec.md` §8: `+ .` on an empty stack must
    /// report a message referencing `+`, not the generic pop).
    pub fn pop_for(&mut self, factor: &str) -> JoyResult<Node> {
        if self.stack == NULL {
            return Err(JoyError::stack_underflow(factor));
        }
        let node = self.heap.node(self.stack).clone();
        self.stack = node.next;
        Ok(node)
    }

    pub fn raise(&mut self, error: JoyError) -> JoyError {
        self.io.on_error(error.kind, &error.message, error.line, error.column);
        self.last_error = Some(error.clone());
        error
    }

    pub fn register_primitive(&mut self, name: &str, id: PrimId) -> SymIndex {
        self.symtab.define_primitive(name, id)
    }
}

/// I/O vtable used for parallel task children: "workers do not perform
/// I/O; callbacks in the child context are set to null at clone time"
/// (`spec.md` §5).
struct NullIo;

impl JoyIo for NullIo {
    fn read_char(&mut self) -> Option<u8> {
        None
    }
    fn write_char(&mut self, _c: u8) {}
    fn write_string(&mut self, _s: &str) {}
    fn on_error(&mut self, _kind: JoyErrorKind, _message: &str, _line: u32, _column: u32) {}
}
