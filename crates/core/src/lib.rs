//! Node heap, garbage collector, symbol table and context state for the
//! Joy interpreter. The term evaluator and primitives live one layer up,
//! in `joy-runtime`.

pub mod context;
pub mod error;
pub mod gc;
pub mod heap;
pub mod node;
pub mod stats;
pub mod strings;
pub mod symtab;

pub use context::{Autoput, Context, Echo, JoyConfig, JoyIo, StdioIo};
pub use error::{JoyError, JoyErrorKind, JoyResult, Recovery};
pub use heap::{Heap, HeapStats};
pub use node::{DictId, FileId, Index, Node, Payload, PrimId, SymIndex, Tag, NULL};
pub use stats::MemoryStats;
pub use symtab::{Body, Entry, SymbolTable, Visibility};
