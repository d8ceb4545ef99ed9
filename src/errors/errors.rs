use std::fmt::Display;

use thiserror::Error;

use crate::Position;

#[derive(Debug, Clone)]
pub struct Error {
    internal_error: ErrorImpl,
    position: Position,
}

impl Error {
    pub fn new(error_impl: ErrorImpl, position: Position) -> Self {
        Error {
            internal_error: error_impl,
            position,
        }
    }

    pub fn get_position(&self) -> &Position {
        &self.position
    }

    pub fn get_error_name(&self) -> &str {
        match &self.internal_error {
            ErrorImpl::UnexpectedToken { .. } => "UnexpectedToken",
            ErrorImpl::MissingToken { .. } => "MissingToken",
            ErrorImpl::MultiAssignment => "MultiAssignment",
            ErrorImpl::EmptyConstruction { .. } => "EmptyConstruction",
            ErrorImpl::UnexpectedBlock => "UnexpectedBlock",
            ErrorImpl::VariableAlreadyDeclared { .. } => "VariableAlreadyDeclared",
            ErrorImpl::VariableNotDeclared { .. } => "VariableNotDeclared",
            ErrorImpl::UnknownField { .. } => "UnknownField",
            ErrorImpl::IndexOutOfRange { .. } => "IndexOutOfRange",
            ErrorImpl::IncompatibleCast { .. } => "IncompatibleCast",
            ErrorImpl::TypeMatchError { .. } => "TypeMatchError",
            ErrorImpl::CannotSet { .. } => "CannotSet",
            ErrorImpl::NoMatchingFunction { .. } => "NoMatchingFunction",
            ErrorImpl::NoMatchingOperator { .. } => "NoMatchingOperator",
            ErrorImpl::OperatorArity { .. } => "OperatorArity",
            ErrorImpl::TemplateAlreadyDeclared { .. } => "TemplateAlreadyDeclared",
            ErrorImpl::ResolverAlreadyDeclared { .. } => "ResolverAlreadyDeclared",
            ErrorImpl::RecursiveInstantiation { .. } => "RecursiveInstantiation",
            ErrorImpl::UnknownType { .. } => "UnknownType",
            ErrorImpl::Internal { .. } => "Internal",
        }
    }

    /// Internal-compiler errors are invariant violations, not user mistakes;
    /// the external loader reports them differently.
    pub fn is_internal(&self) -> bool {
        matches!(self.internal_error, ErrorImpl::Internal { .. })
    }

    pub fn get_tip(&self) -> ErrorTip {
        match &self.internal_error {
            ErrorImpl::UnexpectedToken { token, kind } => {
                ErrorTip::Suggestion(format!("Unexpected {} token: `{}`", kind, token))
            }
            ErrorImpl::MissingToken { expected } => {
                ErrorTip::Suggestion(format!("Expected `{}` here", expected))
            }
            ErrorImpl::MultiAssignment => ErrorTip::Suggestion(String::from(
                "Multiassignment not implemented, assign one target per statement",
            )),
            ErrorImpl::EmptyConstruction { what } => {
                ErrorTip::Suggestion(format!("Empty {} construction", what))
            }
            ErrorImpl::UnexpectedBlock => ErrorTip::Suggestion(String::from(
                "Only fn/op definitions may carry an indented body",
            )),
            ErrorImpl::VariableAlreadyDeclared { variable } => {
                ErrorTip::Suggestion(format!("Variable `{}` already declared", variable))
            }
            ErrorImpl::VariableNotDeclared { variable } => {
                ErrorTip::Suggestion(format!("Variable `{}` not declared", variable))
            }
            ErrorImpl::UnknownField { field, target } => {
                ErrorTip::Suggestion(format!("No field `{}` on `{}`", field, target))
            }
            ErrorImpl::IndexOutOfRange { index, length } => ErrorTip::Suggestion(format!(
                "Index {} is out of range, the value has {} fields",
                index, length
            )),
            ErrorImpl::IncompatibleCast { from, to } => {
                ErrorTip::Suggestion(format!("Cannot cast `{}` to `{}`", from, to))
            }
            ErrorImpl::TypeMatchError { expected, received } => ErrorTip::Suggestion(format!(
                "Expected type `{}`, received `{}`",
                expected, received
            )),
            ErrorImpl::CannotSet { target } => {
                ErrorTip::Suggestion(format!("`{}` cannot be assigned to", target))
            }
            ErrorImpl::NoMatchingFunction {
                function,
                arguments,
            } => ErrorTip::Suggestion(format!(
                "No function `{}` accepts ({})",
                function, arguments
            )),
            ErrorImpl::NoMatchingOperator {
                operator,
                arguments,
            } => ErrorTip::Suggestion(format!(
                "No operator `{}` accepts ({})",
                operator, arguments
            )),
            ErrorImpl::OperatorArity { operator, arity } => ErrorTip::Suggestion(format!(
                "Operator `{}` used with {} operands, only 1 or 2 are possible",
                operator, arity
            )),
            ErrorImpl::TemplateAlreadyDeclared { template } => {
                ErrorTip::Suggestion(format!("`{}` is already defined with this arity", template))
            }
            ErrorImpl::ResolverAlreadyDeclared { name } => {
                ErrorTip::Suggestion(format!("`{}` already has a dynamic resolver", name))
            }
            ErrorImpl::RecursiveInstantiation { template } => ErrorTip::Suggestion(format!(
                "Generic `{}` instantiates itself while still being compiled",
                template
            )),
            ErrorImpl::UnknownType { type_ } => {
                ErrorTip::Suggestion(format!("Unknown type `{}` found", type_))
            }
            ErrorImpl::Internal { .. } => ErrorTip::Suggestion(String::from(
                "This is a compiler bug, not an error in the source program",
            )),
        }
    }
}

pub enum ErrorTip {
    None,
    Suggestion(String),
}

impl Display for ErrorTip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTip::None => write!(f, ""),
            ErrorTip::Suggestion(suggestion) => write!(f, "{}", suggestion),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ErrorImpl {
    #[error("unexpected {kind} token: {token:?}")]
    UnexpectedToken { token: String, kind: String },
    #[error("missing expected token: {expected:?}")]
    MissingToken { expected: String },
    #[error("multiassignment not implemented")]
    MultiAssignment,
    #[error("empty {what} construction")]
    EmptyConstruction { what: String },
    #[error("unexpected nested block")]
    UnexpectedBlock,
    #[error("variable {variable:?} already declared")]
    VariableAlreadyDeclared { variable: String },
    #[error("variable {variable:?} not declared")]
    VariableNotDeclared { variable: String },
    #[error("unknown field {field:?} on {target}")]
    UnknownField { field: String, target: String },
    #[error("index {index} out of range for {length} fields")]
    IndexOutOfRange { index: i64, length: usize },
    #[error("incompatible cast from {from} to {to}")]
    IncompatibleCast { from: String, to: String },
    #[error("types do not match: expected {expected:?}, received {received:?}")]
    TypeMatchError { expected: String, received: String },
    #[error("cannot set {target:?}")]
    CannotSet { target: String },
    #[error("no matching function {function:?} for ({arguments})")]
    NoMatchingFunction { function: String, arguments: String },
    #[error("no matching operator {operator:?} for ({arguments})")]
    NoMatchingOperator { operator: String, arguments: String },
    #[error("operator {operator:?} called with arity {arity}")]
    OperatorArity { operator: String, arity: usize },
    #[error("template {template:?} already declared")]
    TemplateAlreadyDeclared { template: String },
    #[error("dynamic resolver for {name:?} already declared")]
    ResolverAlreadyDeclared { name: String },
    #[error("recursive instantiation of template {template:?}")]
    RecursiveInstantiation { template: String },
    #[error("unknown type {type_} found")]
    UnknownType { type_: String },
    #[error("internal compiler error: {message}")]
    Internal { message: String },
}
