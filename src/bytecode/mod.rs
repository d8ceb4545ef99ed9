//! Instruction definitions for the external stack VM.
//!
//! This module defines the linear instruction form the compiler emits and
//! the compiled-unit container handed to the VM loader. It handles:
//!
//! - Opcodes with 0-2 operands over a value stack
//! - Tail-call (`jump`) and isolated (`spawn`) call forms
//! - Serialization of compiled units for caching and transport

pub mod bytecode;
