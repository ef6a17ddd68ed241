//! Append-only symbol table: built-in and user-defined entries, module
//! scoping, and the name/primitive-id lookup maps.
//!
//! Grounded in `examples/original_source/include/globals.h`'s `Entry`
//! and the `hide_stack`/`module_stack` fields on `Env`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::node::{Index, PrimId, SymIndex, NULL};

/// Visibility of a symbol within its module. `spec.md` §6 names
/// MODULE/HIDE/PRIVATE/PUBLIC as reader-level forms; the table stores
/// the resulting classification per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
    /// Hidden inside a `HIDE ... IN ... END` block: visible only to
    /// sibling definitions in the same block.
    Hidden,
}

/// Where a symbol's behavior comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    /// Primitive dispatch id, resolved by `joy-runtime`.
    Primitive(PrimId),
    /// Head of a list of factors in the owning context's heap. `NULL`
    /// means "defined but empty" (and, combined with `undeferror`,
    /// raises on use).
    User(Index),
}

/// One symbol-table entry. Entries are immutable once created except
/// for `body`, which may be rebound (`spec.md` §3: "the table is
/// immutable once a definition lands, except that body can be
/// rebound").
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: Arc<str>,
    pub visibility: Visibility,
    /// The id of the `HIDE`/`PRIVATE` block this entry was declared
    /// inside, if any. `lookup` only resolves the name while that exact
    /// block is still open (`hide_stack` still carries the id) — once
    /// `IN`/`PUBLIC`/`END` closes it, the name is gone for good, even if
    /// a later block reopens at the same nesting depth.
    hide_scope: Option<u64>,
    pub body: Body,
    /// True if this entry may be used as a GC root (a user variable
    /// slot), as opposed to an ordinary definition.
    pub is_root: bool,
}

/// Append-only table: builtins occupy the low indices, user definitions
/// extend the tail. Two lookup maps mirror the reference's symbol-table
/// hash tables (name → entry, primitive id → entry).
///
/// `Clone` gives a parallel task's child context a cheap, independent
/// snapshot of names/visibility (`spec.md` §4.4: "the child shares the
/// read-only symbol table... no writes expected during the task").
/// Note that a cloned table's `Body::User` indices still point into the
/// *parent's* heap until the evaluator lazily copies a referenced body
/// into the child (`joy-runtime::eval`).
#[derive(Clone)]
pub struct SymbolTable {
    entries: Vec<Entry>,
    by_name: HashMap<Arc<str>, SymIndex>,
    by_prim: HashMap<PrimId, SymIndex>,
    /// Stack of active module name prefixes, innermost last.
    module_stack: Vec<Arc<str>>,
    /// Stack of active `HIDE`/`PRIVATE` blocks, each tagged with a
    /// unique id and the keyword that opened it. Entries declared while
    /// this is non-empty record the innermost id in `Entry::hide_scope`;
    /// `lookup` refuses the name once that id is no longer on the stack.
    hide_stack: Vec<(u64, Visibility)>,
    next_hide_id: u64,
    overwrite: bool,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            entries: Vec::new(),
            by_name: HashMap::new(),
            by_prim: HashMap::new(),
            module_stack: Vec::new(),
            hide_stack: Vec::new(),
            next_hide_id: 0,
            overwrite: false,
        }
    }

    pub fn set_overwrite(&mut self, overwrite: bool) {
        self.overwrite = overwrite;
    }

    pub fn enter_module(&mut self, name: Arc<str>) {
        self.module_stack.push(name);
    }

    pub fn exit_module(&mut self) {
        self.module_stack.pop();
    }

    /// Open a `HIDE ... IN` block: reader sibling definitions declared
    /// before the matching [`SymbolTable::exit_hide`] become
    /// `Visibility::Hidden` and stop resolving once it closes.
    pub fn enter_hide(&mut self) {
        self.next_hide_id += 1;
        self.hide_stack.push((self.next_hide_id, Visibility::Hidden));
    }

    /// Open a `PRIVATE ... PUBLIC`/`... IN` block. The reference
    /// implementation's `getsym` treats `PRIVATE` identically to `HIDE`
    /// (both call `initpriv`); the only difference kept here is the
    /// `Visibility` tag recorded on new entries.
    pub fn enter_private(&mut self) {
        self.next_hide_id += 1;
        self.hide_stack.push((self.next_hide_id, Visibility::Private));
    }

    /// Close the innermost `HIDE`/`PRIVATE` block, whether closed by
    /// `IN`, `PUBLIC`, or `END` (`getsym`'s `stoppriv`, called from both
    /// `IN__` and `PUBLIC`). Entries declared inside it keep their
    /// `SymIndex` — already-read bodies can still reference them — but
    /// `lookup` by name no longer finds them.
    pub fn exit_hide(&mut self) {
        self.hide_stack.pop();
    }

    /// Qualify a bare name with the active module prefix chain.
    pub fn qualify(&self, name: &str) -> Arc<str> {
        if self.module_stack.is_empty() {
            return Arc::from(name);
        }
        let mut qualified = String::new();
        for segment in &self.module_stack {
            qualified.push_str(segment);
            qualified.push('.');
        }
        qualified.push_str(name);
        Arc::from(qualified.as_str())
    }

    fn visibility_for_new_entry(&self) -> (Visibility, Option<u64>) {
        match self.hide_stack.last() {
            Some(&(id, kind)) => (kind, Some(id)),
            None => (Visibility::Public, None),
        }
    }

    /// Register a built-in primitive. Called once at context creation
    /// for the whole primitive table, before any user source is read.
    pub fn define_primitive(&mut self, name: &str, id: PrimId) -> SymIndex {
        let qualified = Arc::from(name);
        let idx = SymIndex(self.entries.len() as u32);
        self.entries.push(Entry {
            name: Arc::clone(&qualified),
            visibility: Visibility::Public,
            hide_scope: None,
            body: Body::Primitive(id),
            is_root: false,
        });
        self.by_name.insert(qualified, idx);
        self.by_prim.insert(id, idx);
        idx
    }

    /// Define (or rebind) a user symbol. Returns `Err` if the name
    /// already exists, `overwrite` is not enabled, and the existing
    /// entry is not itself a user definition awaiting rebind — matching
    /// "a warning is emitted unless overwrite is enabled" (`spec.md`
    /// §3), surfaced here as a boolean the caller logs.
    pub fn define_user(&mut self, name: &str, body: Index) -> (SymIndex, bool /* rebound */) {
        let qualified = self.qualify(name);
        if let Some(&existing) = self.by_name.get(&qualified) {
            let (visibility, hide_scope) = self.visibility_for_new_entry();
            let entry = &mut self.entries[existing.0 as usize];
            entry.body = Body::User(body);
            // A rebind picks up whatever scope is active right now, not
            // the scope its first definition happened to be declared in
            // — otherwise redefining inside a fresh `HIDE` block would
            // silently inherit a stale, already-closed scope id.
            entry.visibility = visibility;
            entry.hide_scope = hide_scope;
            return (existing, true);
        }
        let (visibility, hide_scope) = self.visibility_for_new_entry();
        let idx = SymIndex(self.entries.len() as u32);
        self.entries.push(Entry {
            name: Arc::clone(&qualified),
            visibility,
            hide_scope,
            body: Body::User(body),
            is_root: false,
        });
        self.by_name.insert(qualified, idx);
        (idx, false)
    }

    pub fn declare_variable(&mut self, name: &str) -> SymIndex {
        let (idx, _) = self.define_user(name, NULL);
        self.entries[idx.0 as usize].is_root = true;
        idx
    }

    /// Resolve a name to its entry, honoring `HIDE`/`PRIVATE` scoping:
    /// an entry declared inside a still-open block resolves, one whose
    /// block has since closed does not, even though its `SymIndex` and
    /// `by_name` mapping are never removed (`spec.md` §6's HIDE gives
    /// sibling definitions mutual visibility only for the block's
    /// duration).
    pub fn lookup(&self, name: &str) -> Option<SymIndex> {
        let idx = *self.by_name.get(name)?;
        let entry = &self.entries[idx.0 as usize];
        match entry.hide_scope {
            None => Some(idx),
            Some(id) => self
                .hide_stack
                .iter()
                .any(|&(active, _)| active == id)
                .then_some(idx),
        }
    }

    pub fn lookup_primitive(&self, id: PrimId) -> Option<SymIndex> {
        self.by_prim.get(&id).copied()
    }

    pub fn entry(&self, idx: SymIndex) -> &Entry {
        &self.entries[idx.0 as usize]
    }

    pub fn rebind_body(&mut self, idx: SymIndex, body: Index) {
        self.entries[idx.0 as usize].body = Body::User(body);
    }

    /// Every `(symbol, body index)` pair the GC must treat as a root
    /// (the "symbol table entries marked as roots" of `spec.md` §4.2).
    pub fn root_entries(&self) -> impl Iterator<Item = (SymIndex, Index)> + '_ {
        self.entries.iter().enumerate().filter_map(|(i, e)| match (e.is_root, e.body) {
            (true, Body::User(idx)) => Some((SymIndex(i as u32), idx)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_then_lookup() {
        let mut table = SymbolTable::new();
        let (idx, rebound) = table.define_user("square", 7);
        assert!(!rebound);
        assert_eq!(table.lookup("square"), Some(idx));
        match table.entry(idx).body {
            Body::User(body) => assert_eq!(body, 7),
            _ => panic!("expected user body"),
        }
    }

    #[test]
    fn redefine_rebinds_body_not_identity() {
        let mut table = SymbolTable::new();
        let (idx1, _) = table.define_user("square", 7);
        let (idx2, rebound) = table.define_user("square", 99);
        assert!(rebound);
        assert_eq!(idx1.0, idx2.0);
    }

    #[test]
    fn module_qualifies_names() {
        let mut table = SymbolTable::new();
        table.enter_module(Arc::from("geometry"));
        let (idx, _) = table.define_user("area", 3);
        table.exit_module();
        assert_eq!(table.lookup("geometry.area"), Some(idx));
        assert_eq!(table.lookup("area"), None);
    }

    #[test]
    fn hide_block_marks_entries_hidden() {
        let mut table = SymbolTable::new();
        table.enter_hide();
        let (idx, _) = table.define_user("helper", 1);
        table.exit_hide();
        assert_eq!(table.entry(idx).visibility, Visibility::Hidden);
    }

    #[test]
    fn hidden_entry_resolves_only_while_its_block_is_open() {
        let mut table = SymbolTable::new();
        table.enter_hide();
        let (idx, _) = table.define_user("helper", 1);
        assert_eq!(table.lookup("helper"), Some(idx), "sibling lookups inside the block must see it");
        table.exit_hide();
        assert_eq!(table.lookup("helper"), None, "name must stop resolving once the block closes");
    }

    #[test]
    fn reopening_hide_after_close_makes_a_new_unrelated_scope() {
        let mut table = SymbolTable::new();
        table.enter_hide();
        let (idx1, _) = table.define_user("helper", 1);
        table.exit_hide();
        assert_eq!(table.lookup("helper"), None, "first block's helper must not resolve once closed");

        table.enter_hide();
        let (idx2, rebound) = table.define_user("helper", 2);
        assert!(rebound, "same qualified name always rebinds the existing entry");
        assert_eq!(idx1.0, idx2.0);
        assert_eq!(
            table.lookup("helper"),
            Some(idx2),
            "rebinding inside a fresh block must pick up the new block's scope, not the stale closed one"
        );
        table.exit_hide();
        assert_eq!(table.lookup("helper"), None);
    }

    #[test]
    fn private_entry_is_visible_to_siblings_and_hidden_after_public() {
        let mut table = SymbolTable::new();
        table.enter_private();
        let (idx, _) = table.define_user("aux", 1);
        assert_eq!(table.entry(idx).visibility, Visibility::Private);
        assert_eq!(table.lookup("aux"), Some(idx));
        table.exit_hide(); // PUBLIC closes a PRIVATE block exactly like IN closes HIDE.
        assert_eq!(table.lookup("aux"), None);
    }
}
