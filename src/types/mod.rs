//! Type system definitions for the compiler.
//!
//! This module defines the closed set of type descriptors the front end
//! infers and compares. It handles:
//!
//! - Primitive, container, tuple/struct, function, alias and variadic types
//! - Exact structural equality (overload matching)
//! - Compatibility (casts and assignment, strictly weaker than equality)
//! - The primitive type name lookup table

pub mod types;
