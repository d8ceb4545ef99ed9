//! Utility macros for the compiler.
//!
//! This module defines helper macros used throughout the compiler:
//!
//! - `MK_TOKEN!` - Creates a Token instance
//! - `MK_BLOCK!` - Creates a Block instance
//!
//! The lexer lives outside this crate, so these are the only way token
//! material gets constructed here: tests build their input blocks with
//! them, and the expression builder uses `MK_TOKEN!` for the tokens it
//! synthesizes itself (the constant-index desugar).

/// Creates a Token instance.
///
/// # Arguments
///
/// * `$kind` - The TokenKind
/// * `$value` - The token's string value
///
/// # Example
///
/// ```ignore
/// let token = MK_TOKEN!(TokenKind::Integer, "42");
/// ```
#[macro_export]
macro_rules! MK_TOKEN {
    ($kind:expr, $value:expr) => {
        Token {
            kind: $kind,
            value: String::from($value),
        }
    };
}

/// Creates a Block instance from a token list and child blocks.
///
/// The span defaults to a null position; tests that check error positions
/// can construct a Block directly instead.
#[macro_export]
macro_rules! MK_BLOCK {
    ($tokens:expr) => {
        Block {
            tokens: $tokens,
            children: vec![],
            span: $crate::Span::null(),
        }
    };
    ($tokens:expr, $children:expr) => {
        Block {
            tokens: $tokens,
            children: $children,
            span: $crate::Span::null(),
        }
    };
}
