//! # The BQL Language
//!
//! Lexer, parser, and semantic validator for BrainQuery.
//! Pure functions — no I/O, no state, no graph-service dependency.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod validate;

use crate::Result;
use ast::Query;

/// Parse a BQL query string into an AST.
pub fn parse(query: &str) -> Result<Query> {
    let tokens = lexer::tokenize(query)?;
    parser::parse_tokens(&tokens)
}
