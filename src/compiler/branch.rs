//! Branch definitions for the expression tree.
//!
//! A branch is a self-contained node of the expression tree. Every branch
//! compiles to a value; only the route, constant-index, and index-call
//! branches additionally compile as assignment targets, everything else
//! fails with a "cannot set" error through the default implementation.

use std::fmt::Debug;

use crate::bytecode::bytecode::{Instruction, Literal};
use crate::errors::errors::ErrorImpl;
use crate::resolver::resolver::resolve_call;
use crate::types::types::{TypeDesc, PRIMITIVE_LOOKUP};

use super::compiler::Compiler;
use crate::blocks::tokens::Token;
use crate::errors::errors::Error;

/// Branch Types
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum BranchType {
    Literal,
    Route,
    Tuple,
    Operator,
    Call,
    Construct,
    Index,
    ConstIndex,
    Field,
    Cast,
}

/// Branch Trait
///
/// Defines the behavior of all branch kinds in the expression tree.
pub trait Branch: Debug {
    /// Returns the kind of the branch.
    fn get_branch_type(&self) -> BranchType;
    /// Compiles the branch to a value: instructions that leave one value on
    /// the stack, plus the inferred type of that value.
    fn compile(&self, compiler: &mut Compiler) -> Result<(TypeDesc, Vec<Instruction>), Error>;
    /// Compiles the branch as an assignment target. `value_code` already
    /// produces the value being assigned; implementations weave it into the
    /// full store sequence.
    fn compile_assign(
        &self,
        compiler: &mut Compiler,
        _value_code: Vec<Instruction>,
        _value_type: &TypeDesc,
    ) -> Result<Vec<Instruction>, Error> {
        Err(compiler.error(ErrorImpl::CannotSet {
            target: self.describe(),
        }))
    }
    /// Short rendering for error messages.
    fn describe(&self) -> String;
}

/// Branch Wrapper
///
/// A wrapper that allows for any branch kind to be stored with helper methods
#[derive(Debug)]
pub struct BranchWrapper(Box<dyn Branch>);

impl BranchWrapper {
    pub fn new<T: Branch + 'static>(branch: T) -> Self {
        BranchWrapper(Box::new(branch))
    }
}

impl Branch for BranchWrapper {
    fn get_branch_type(&self) -> BranchType {
        self.0.get_branch_type()
    }
    fn compile(&self, compiler: &mut Compiler) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        self.0.compile(compiler)
    }
    fn compile_assign(
        &self,
        compiler: &mut Compiler,
        value_code: Vec<Instruction>,
        value_type: &TypeDesc,
    ) -> Result<Vec<Instruction>, Error> {
        self.0.compile_assign(compiler, value_code, value_type)
    }
    fn describe(&self) -> String {
        self.0.describe()
    }
}

/// Compiles a branch argument list into a call's operand instructions.
///
/// Arguments are emitted last-argument-first so the VM pops them in
/// declared order; the resolved call sequence goes last.
pub fn compile_call(
    compiler: &mut Compiler,
    name: &str,
    is_operator: bool,
    arguments: &[&BranchWrapper],
) -> Result<(TypeDesc, Vec<Instruction>), Error> {
    let mut argument_types = vec![];
    let mut argument_code = vec![];
    for argument in arguments {
        let (type_, code) = argument.compile(compiler)?;
        argument_types.push(type_);
        argument_code.push(code);
    }

    let (call_code, result_type) = resolve_call(compiler, name, is_operator, &argument_types)?;

    let mut code = vec![];
    for operand in argument_code.into_iter().rev() {
        code.extend(operand);
    }
    code.extend(call_code);
    Ok((result_type, code))
}

// LITERALS

/// Literal Branch
/// Represents an integer, decimal, string or boolean literal.
#[derive(Debug, Clone)]
pub struct LiteralBranch {
    pub literal: Literal,
}

impl Branch for LiteralBranch {
    fn get_branch_type(&self) -> BranchType {
        BranchType::Literal
    }
    fn compile(&self, _compiler: &mut Compiler) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        Ok((
            self.literal.type_desc(),
            vec![Instruction::Push(self.literal.clone())],
        ))
    }
    fn describe(&self) -> String {
        format!("{:?}", self.literal)
    }
}

// ROUTES

/// Route Branch
/// A pure dotted identifier chain: a variable optionally navigated through
/// struct fields.
#[derive(Debug, Clone)]
pub struct RouteBranch {
    pub segments: Vec<String>,
}

impl RouteBranch {
    /// Resolves the head identifier to a slot read, preferring function
    /// locals over module globals.
    fn head(
        &self,
        compiler: &mut Compiler,
    ) -> Result<(TypeDesc, Instruction, Instruction), Error> {
        let name = &self.segments[0];
        if let Some(variable) = compiler.scopes.lookup_variable(name) {
            if compiler.scopes.at_root() {
                return Ok((
                    variable.type_,
                    Instruction::ReadGlobal(variable.slot),
                    Instruction::WriteGlobal(variable.slot),
                ));
            }
            return Ok((
                variable.type_,
                Instruction::ReadLocal(variable.slot),
                Instruction::WriteLocal(variable.slot),
            ));
        }
        if let Some(variable) = compiler.scopes.lookup_global(name) {
            return Ok((
                variable.type_,
                Instruction::ReadGlobal(variable.slot),
                Instruction::WriteGlobal(variable.slot),
            ));
        }
        Err(compiler.error(ErrorImpl::VariableNotDeclared {
            variable: name.clone(),
        }))
    }
}

impl Branch for RouteBranch {
    fn get_branch_type(&self) -> BranchType {
        BranchType::Route
    }
    fn compile(&self, compiler: &mut Compiler) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        let (mut type_, read, _) = self.head(compiler)?;
        let mut code = vec![read];
        for segment in &self.segments[1..] {
            let index = field_index(compiler, &type_, segment)?;
            code.push(Instruction::ReadField(index));
            type_ = field_type(&type_, index);
        }
        Ok((type_, code))
    }
    fn compile_assign(
        &self,
        compiler: &mut Compiler,
        value_code: Vec<Instruction>,
        value_type: &TypeDesc,
    ) -> Result<Vec<Instruction>, Error> {
        if self.segments.len() == 1 {
            let name = &self.segments[0];
            // Assigning to a name that is not yet bound declares it; the
            // language has no separate declaration statement.
            if compiler.scopes.lookup_variable(name).is_none()
                && compiler.scopes.lookup_global(name).is_none()
            {
                let position = compiler.position();
                let slot = compiler.scopes.declare_variable(
                    name,
                    value_type.clone(),
                    position,
                )?;
                let write = if compiler.scopes.at_root() {
                    Instruction::WriteGlobal(slot)
                } else {
                    Instruction::WriteLocal(slot)
                };
                let mut code = value_code;
                code.push(write);
                return Ok(code);
            }

            let (type_, _, write) = self.head(compiler)?;
            if !type_.compatible(value_type) {
                return Err(compiler.error(ErrorImpl::TypeMatchError {
                    expected: type_.to_string(),
                    received: value_type.to_string(),
                }));
            }
            let mut code = value_code;
            code.push(write);
            return Ok(code);
        }

        // Navigate to the owning value, then store into its last field.
        let (mut type_, read, _) = self.head(compiler)?;
        let mut code = value_code;
        code.push(read);
        for segment in &self.segments[1..self.segments.len() - 1] {
            let index = field_index(compiler, &type_, segment)?;
            code.push(Instruction::ReadField(index));
            type_ = field_type(&type_, index);
        }
        let last = &self.segments[self.segments.len() - 1];
        let index = field_index(compiler, &type_, last)?;
        let field = field_type(&type_, index);
        if !field.compatible(value_type) {
            return Err(compiler.error(ErrorImpl::TypeMatchError {
                expected: field.to_string(),
                received: value_type.to_string(),
            }));
        }
        code.push(Instruction::WriteField(index));
        Ok(code)
    }
    fn describe(&self) -> String {
        self.segments.join(".")
    }
}

fn field_index(compiler: &mut Compiler, target: &TypeDesc, name: &str) -> Result<usize, Error> {
    // Field navigation is struct-only; there is no fallback for other types.
    target.unalias().field_index(name).ok_or_else(|| {
        compiler.error(ErrorImpl::UnknownField {
            field: name.to_string(),
            target: target.to_string(),
        })
    })
}

fn field_type(target: &TypeDesc, index: usize) -> TypeDesc {
    target.unalias().fields().expect("checked struct fields")[index].clone()
}

// COMPOUNDS

/// Tuple Branch
/// A tuple literal `{a, b, ...}`.
#[derive(Debug)]
pub struct TupleBranch {
    pub elements: Vec<BranchWrapper>,
}

impl Branch for TupleBranch {
    fn get_branch_type(&self) -> BranchType {
        BranchType::Tuple
    }
    fn compile(&self, compiler: &mut Compiler) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        let mut types = vec![];
        let mut code = vec![];
        for element in &self.elements {
            let (type_, element_code) = element.compile(compiler)?;
            types.push(type_);
            code.extend(element_code);
        }
        code.push(Instruction::Collapse(self.elements.len()));
        Ok((TypeDesc::Tuple(types), code))
    }
    fn describe(&self) -> String {
        String::from("tuple literal")
    }
}

/// Operator Branch
/// A unary or binary operator application, resolved through the operator
/// tables.
#[derive(Debug)]
pub struct OperatorBranch {
    pub operator: Token,
    pub left: Option<BranchWrapper>,
    pub right: BranchWrapper,
}

impl Branch for OperatorBranch {
    fn get_branch_type(&self) -> BranchType {
        BranchType::Operator
    }
    fn compile(&self, compiler: &mut Compiler) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        let mut arguments = vec![];
        if let Some(left) = &self.left {
            arguments.push(left);
        }
        arguments.push(&self.right);
        compile_call(compiler, &self.operator.value, true, &arguments)
    }
    fn describe(&self) -> String {
        format!("operator `{}`", self.operator.value)
    }
}

/// Call Branch
/// A parenthesized call `name(args)`.
#[derive(Debug)]
pub struct CallBranch {
    pub name: String,
    pub arguments: Vec<BranchWrapper>,
}

impl Branch for CallBranch {
    fn get_branch_type(&self) -> BranchType {
        BranchType::Call
    }
    fn compile(&self, compiler: &mut Compiler) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        let arguments: Vec<&BranchWrapper> = self.arguments.iter().collect();
        compile_call(compiler, &self.name, false, &arguments)
    }
    fn describe(&self) -> String {
        format!("call to `{}`", self.name)
    }
}

/// Construct Branch
/// A type construction `[name]`, resolved through the construction seam the
/// standard library registers for the name.
#[derive(Debug)]
pub struct ConstructBranch {
    pub type_name: String,
}

impl Branch for ConstructBranch {
    fn get_branch_type(&self) -> BranchType {
        BranchType::Construct
    }
    fn compile(&self, compiler: &mut Compiler) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        let (code, result_type) = resolve_call(compiler, &self.type_name, false, &[])?;
        Ok((result_type, code))
    }
    fn describe(&self) -> String {
        format!("construction of `{}`", self.type_name)
    }
}

// SUBROUTES

/// Index Branch
/// A bracket index `target[key]`, desugared into the generic `get`/`set`
/// calls.
#[derive(Debug)]
pub struct IndexBranch {
    pub target: BranchWrapper,
    pub index: BranchWrapper,
}

impl Branch for IndexBranch {
    fn get_branch_type(&self) -> BranchType {
        BranchType::Index
    }
    fn compile(&self, compiler: &mut Compiler) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        compile_call(compiler, "get", false, &[&self.target, &self.index])
    }
    fn compile_assign(
        &self,
        compiler: &mut Compiler,
        value_code: Vec<Instruction>,
        value_type: &TypeDesc,
    ) -> Result<Vec<Instruction>, Error> {
        let (target_type, target_code) = self.target.compile(compiler)?;
        let (index_type, index_code) = self.index.compile(compiler)?;
        let (call_code, _) = resolve_call(
            compiler,
            "set",
            false,
            &[target_type, index_type, value_type.clone()],
        )?;

        let mut code = value_code;
        code.extend(index_code);
        code.extend(target_code);
        code.extend(call_code);
        Ok(code)
    }
    fn describe(&self) -> String {
        format!("index into {}", self.target.describe())
    }
}

/// Constant Index Branch
/// A constant access `target.N`: a compile-time field read on tuples and
/// structs, otherwise a generic index call with the literal as the key.
#[derive(Debug)]
pub struct ConstIndexBranch {
    pub target: BranchWrapper,
    pub index: i64,
}

impl ConstIndexBranch {
    fn check_bounds(
        &self,
        compiler: &mut Compiler,
        fields: &[TypeDesc],
    ) -> Result<usize, Error> {
        if self.index < 0 || self.index as usize >= fields.len() {
            return Err(compiler.error(ErrorImpl::IndexOutOfRange {
                index: self.index,
                length: fields.len(),
            }));
        }
        Ok(self.index as usize)
    }
}

impl Branch for ConstIndexBranch {
    fn get_branch_type(&self) -> BranchType {
        BranchType::ConstIndex
    }
    fn compile(&self, compiler: &mut Compiler) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        let (target_type, target_code) = self.target.compile(compiler)?;
        if let Some(fields) = target_type.unalias().fields() {
            let fields = fields.to_vec();
            let index = self.check_bounds(compiler, &fields)?;
            let mut code = target_code;
            code.push(Instruction::ReadField(index));
            return Ok((fields[index].clone(), code));
        }

        // Not a fixed-field value: route through the resolution engine as a
        // generic index call with the literal as the second argument.
        let (call_code, result_type) =
            resolve_call(compiler, "get", false, &[target_type, TypeDesc::Int])?;
        let mut code = vec![Instruction::Push(Literal::Int(self.index))];
        code.extend(target_code);
        code.extend(call_code);
        Ok((result_type, code))
    }
    fn compile_assign(
        &self,
        compiler: &mut Compiler,
        value_code: Vec<Instruction>,
        value_type: &TypeDesc,
    ) -> Result<Vec<Instruction>, Error> {
        let (target_type, target_code) = self.target.compile(compiler)?;
        if let Some(fields) = target_type.unalias().fields() {
            let fields = fields.to_vec();
            let index = self.check_bounds(compiler, &fields)?;
            if !fields[index].compatible(value_type) {
                return Err(compiler.error(ErrorImpl::TypeMatchError {
                    expected: fields[index].to_string(),
                    received: value_type.to_string(),
                }));
            }
            let mut code = value_code;
            code.extend(target_code);
            code.push(Instruction::WriteField(index));
            return Ok(code);
        }

        let (call_code, _) = resolve_call(
            compiler,
            "set",
            false,
            &[target_type, TypeDesc::Int, value_type.clone()],
        )?;
        let mut code = value_code;
        code.push(Instruction::Push(Literal::Int(self.index)));
        code.extend(target_code);
        code.extend(call_code);
        Ok(code)
    }
    fn describe(&self) -> String {
        format!("{}.{}", self.target.describe(), self.index)
    }
}

/// Field Branch
/// A postfix `.name` on something that is not a pure route, e.g. the result
/// of a call.
#[derive(Debug)]
pub struct FieldBranch {
    pub target: BranchWrapper,
    pub name: String,
}

impl Branch for FieldBranch {
    fn get_branch_type(&self) -> BranchType {
        BranchType::Field
    }
    fn compile(&self, compiler: &mut Compiler) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        let (target_type, mut code) = self.target.compile(compiler)?;
        let index = field_index(compiler, &target_type, &self.name)?;
        code.push(Instruction::ReadField(index));
        Ok((field_type(&target_type, index), code))
    }
    fn compile_assign(
        &self,
        compiler: &mut Compiler,
        value_code: Vec<Instruction>,
        value_type: &TypeDesc,
    ) -> Result<Vec<Instruction>, Error> {
        let (target_type, target_code) = self.target.compile(compiler)?;
        let index = field_index(compiler, &target_type, &self.name)?;
        let field = field_type(&target_type, index);
        if !field.compatible(value_type) {
            return Err(compiler.error(ErrorImpl::TypeMatchError {
                expected: field.to_string(),
                received: value_type.to_string(),
            }));
        }
        let mut code = value_code;
        code.extend(target_code);
        code.push(Instruction::WriteField(index));
        Ok(code)
    }
    fn describe(&self) -> String {
        format!("{}.{}", self.target.describe(), self.name)
    }
}

/// Cast Branch
/// A trailing bare identifier reinterpreting the value's type. Casting
/// emits no instructions; it succeeds exactly when the named type accepts
/// the value's inferred type.
#[derive(Debug)]
pub struct CastBranch {
    pub target: BranchWrapper,
    pub type_name: String,
}

impl Branch for CastBranch {
    fn get_branch_type(&self) -> BranchType {
        BranchType::Cast
    }
    fn compile(&self, compiler: &mut Compiler) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        let (source_type, code) = self.target.compile(compiler)?;

        let destination = match PRIMITIVE_LOOKUP.get(self.type_name.as_str()) {
            Some(primitive) => primitive.clone(),
            None => compiler.scopes.lookup_type(&self.type_name).ok_or_else(|| {
                compiler.error(ErrorImpl::UnknownType {
                    type_: self.type_name.clone(),
                })
            })?,
        };

        if !destination.compatible(&source_type) {
            return Err(compiler.error(ErrorImpl::IncompatibleCast {
                from: source_type.to_string(),
                to: destination.to_string(),
            }));
        }
        Ok((destination, code))
    }
    fn describe(&self) -> String {
        format!("cast to `{}`", self.type_name)
    }
}
