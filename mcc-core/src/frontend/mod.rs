//! Front End
//!
//! Lexer, parser, and semantic analyzer. Produces the decorated AST and the
//! symbol table consumed by IR construction; everything user-visible that
//! can go wrong in a source program is diagnosed here.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod semantics;
pub mod symbol;
pub mod token;

pub use lexer::Lexer;
pub use parser::Parser;
pub use semantics::SemanticAnalyzer;
pub use symbol::SymbolTable;
