//! Lexer interface data for the compiler.
//!
//! This module defines the immutable data handed over by the external
//! block builder (the lexer lives outside this crate). It contains:
//!
//! - Token and TokenKind definitions
//! - Block definitions (a token line plus indentation children)
//! - The marker and keyword texts the builder recognizes

pub mod blocks;
pub mod tokens;
