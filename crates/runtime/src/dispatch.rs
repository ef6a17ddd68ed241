//! The primitive dispatch table. Each built-in factor is a plain Rust
//! function; `PrimTable` is the runtime's analogue of the reference
//! implementation's static array of `{name, proc}` pairs in
//! `examples/original_source/src/initial.c`.

use joy_core::{Context, Heap, JoyResult, PrimId, SymbolTable};

/// Signature shared by every built-in. Combinators receive `prims` so
/// they can call back into [`crate::eval::exec_term`].
pub type PrimFn = fn(&mut Context, Option<&Heap>, &PrimTable) -> JoyResult<()>;

pub struct PrimTable {
    fns: Vec<PrimFn>,
    names: Vec<std::sync::Arc<str>>,
}

impl PrimTable {
    /// Build the full table: registers every built-in listed in
    /// `SPEC_FULL.md` §4.3 against `symtab`, in the same order the
    /// reference implementation's `initial.c` does (grouped by family).
    pub fn new(symtab: &mut SymbolTable) -> Self {
        let mut table = PrimTable {
            fns: Vec::new(),
            names: Vec::new(),
        };
        crate::primitives::register_all(&mut table, symtab);
        table
    }

    /// Register one built-in under `name`, returning the id the reader
    /// embeds in `ANONYMOUS_FUNCTION` factors that call it.
    pub fn register(&mut self, symtab: &mut SymbolTable, name: &str, f: PrimFn) -> PrimId {
        let id = PrimId(self.fns.len() as u16);
        self.fns.push(f);
        self.names.push(std::sync::Arc::from(name));
        symtab.define_primitive(name, id);
        id
    }

    pub fn invoke(&self, ctx: &mut Context, parent: Option<&Heap>, id: PrimId) -> JoyResult<()> {
        (self.fns[id.0 as usize])(ctx, parent, self)
    }

    pub fn name_of(&self, id: PrimId) -> &str {
        &self.names[id.0 as usize]
    }

    /// Resolve a built-in's id by name, for the reader
    /// (`examples/original_source/src/scan.c`'s symbol-lookup-on-read).
    pub fn id_by_name(&self, symtab: &SymbolTable, name: &str) -> Option<PrimId> {
        match symtab.lookup(name).map(|sym| symtab.entry(sym).body) {
            Some(joy_core::Body::Primitive(id)) => Some(id),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }
}
