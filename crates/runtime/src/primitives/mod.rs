//! Built-in factors, grouped the way
//! `examples/original_source/src/builtin/` splits them across files.
//! Not exhaustive — leaf primitives beyond this representative set are
//! out of scope (`spec.md` Non-goals) — but every family the evaluator
//! and combinator machinery depend on is implemented.

mod aggregate;
mod arithmetic;
mod combinators;
mod dict;
mod io;
mod misc;
mod parallel;
mod predicates;
mod sets;
mod stack_ops;

use joy_core::SymbolTable;

use crate::dispatch::PrimTable;

pub(crate) fn register_all(table: &mut PrimTable, symtab: &mut SymbolTable) {
    stack_ops::register(table, symtab);
    arithmetic::register(table, symtab);
    predicates::register(table, symtab);
    aggregate::register(table, symtab);
    combinators::register(table, symtab);
    sets::register(table, symtab);
    dict::register(table, symtab);
    io::register(table, symtab);
    parallel::register(table, symtab);
    misc::register(table, symtab);
}
