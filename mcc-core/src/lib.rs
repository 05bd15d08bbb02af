//! MCC: a whole-program optimizing compiler from a small C-like language
//! to MIPS-32 assembly.
//!
//! The crate is organized as a pipeline of layers, each consuming the
//! previous one's output:
//!
//! 1. front end (`frontend`): lexer, recursive-descent parser, and the
//!    scope/type checker producing a decorated AST and symbol table;
//! 2. IR construction (`ir`): a typed SSA IR with explicit
//!    `alloca`/`load`/`store` for locals;
//! 3. analyses (`analysis`): CFG, dominance, natural loops;
//! 4. IR optimization (`opt`): a fixed-point pipeline of mem2reg,
//!    simplification, value numbering, code motion, inlining, partial
//!    evaluation, dead-code elimination, and loop transforms;
//! 5. machine lowering and optimization (`mips`): virtual-register MIPS,
//!    strength reduction and peephole rewrites, a Chaitin–Briggs register
//!    allocator, block layout, and assembly emission.
//!
//! `pipeline::CompilePipeline::compile` wires the stages together.

pub mod analysis;
pub mod config;
pub mod errors;
pub mod exprhash;
pub mod frontend;
pub mod ir;
pub mod mips;
pub mod opt;
pub mod pipeline;
pub mod source;

pub use config::{Config, ERROR_EXIT_CODE};
pub use errors::CompileError;
pub use pipeline::{CompileOutput, CompilePipeline, CompileStats, SourceDiagnostics};
