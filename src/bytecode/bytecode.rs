use serde::{Deserialize, Serialize};

use crate::types::types::TypeDesc;

/// A literal value embedded in a push instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Dec(f64),
    Str(String),
    Bool(bool),
}

impl Literal {
    pub fn type_desc(&self) -> TypeDesc {
        match self {
            Literal::Int(_) => TypeDesc::Int,
            Literal::Dec(_) => TypeDesc::Dec,
            Literal::Str(_) => TypeDesc::Str,
            Literal::Bool(_) => TypeDesc::Bool,
        }
    }
}

/// One VM instruction. The VM defines the runtime semantics; the compiler
/// only guarantees operand counts and stack order.
///
/// Calls name their target symbol; the loader resolves names to addresses.
/// Arguments are pushed last-argument-first so the VM pops them in declared
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    Push(Literal),
    ReadLocal(usize),
    WriteLocal(usize),
    ReadGlobal(usize),
    WriteGlobal(usize),
    ReadField(usize),
    WriteField(usize),
    /// Generic element read for vectors and maps.
    Index,
    /// Generic keyed write for vectors and maps.
    Attach,
    /// Generic element append for vectors.
    Append,
    Call(String),
    /// Call spreading a vector as individual arguments.
    CallExpand(String),
    /// Tail-call form of `Call`: reuses the current frame.
    Jump(String),
    /// Tail-call form of `CallExpand`.
    JumpExpand(String),
    /// Isolated call: the VM forks an execution context.
    Spawn(String),
    SpawnExpand(String),
    /// Builds a tuple from the top N stack values.
    Collapse(usize),
    Return,
}

impl Instruction {
    /// Rewrites a plain call into its frame-reusing jump form. Leaves any
    /// other instruction untouched.
    pub fn into_tail_call(self) -> Instruction {
        match self {
            Instruction::Call(name) => Instruction::Jump(name),
            Instruction::CallExpand(name) => Instruction::JumpExpand(name),
            other => other,
        }
    }
}

/// A fully compiled symbol: the body the VM executes when the symbol is
/// called, plus the signature metadata the loader needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledFunction {
    pub name: String,
    pub arity: usize,
    pub variadic: bool,
    pub return_type: TypeDesc,
    pub code: Vec<Instruction>,
}

/// Everything the compiler produced for one module: the top-level statement
/// sequence plus every function body emitted on demand, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledUnit {
    pub functions: Vec<CompiledFunction>,
    pub body: Vec<Instruction>,
}

impl CompiledUnit {
    pub fn new() -> Self {
        CompiledUnit {
            functions: vec![],
            body: vec![],
        }
    }

    pub fn find_function(&self, name: &str) -> Option<&CompiledFunction> {
        self.functions.iter().find(|function| function.name == name)
    }
}
