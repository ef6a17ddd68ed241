//! Term evaluator, built-in factors, the textual reader, and the
//! OS-thread parallel task machinery for the Joy interpreter. Built on
//! top of the value model and context state in `joy-core`.

pub mod diagnostics;
pub mod dispatch;
pub mod embed_core;
pub mod eval;
pub mod parallel;
mod primitives;
pub mod reader;
pub mod writer;

pub use dispatch::{PrimFn, PrimTable};
pub use embed_core::Interpreter;
pub use eval::exec_term;
pub use parallel::{deep_copy_across, parallel_filter, parallel_fork, parallel_map, parallel_reduce, SEQUENTIAL_THRESHOLD};
pub use reader::{read_program, ReadOutcome, Reader};
pub use writer::{format_body, format_value};
