//! Main compiler module.
//!
//! This module contains the core Compiler structure and drives the
//! compilation of token blocks into VM instruction sequences. It owns the
//! scope chain, the output unit, and the unique-name counter template
//! instantiation draws from.
//!
//! A block compiles in one of two contexts: value context produces a pure
//! expression, statement context additionally understands assignments and
//! `::` statement calls. Function bodies get a tail-call rewrite so the
//! statement-call idiom recurses in constant stack space.

use crate::blocks::blocks::Block;
use crate::blocks::tokens::{
    Token, TokenKind, KEYWORD_FN, KEYWORD_OP, KEYWORD_RETURN, MARKER_CALL, MARKER_EXPAND,
    MARKER_ISOLATE,
};
use crate::bytecode::bytecode::{CompiledUnit, Instruction};
use crate::errors::errors::{Error, ErrorImpl};
use crate::resolver::resolver::resolve_call;
use crate::scope::scope::{FunctionTemplate, Scopes};
use crate::types::types::TypeDesc;
use crate::Position;

use super::branch::Branch;
use super::expr::{build_expression, is_pure_route, route_segments, split_commas};

/// The main compiler structure.
///
/// One instance compiles one module; the external standard-library
/// registrar populates `scopes` before the first block arrives, and the
/// external loader hands `unit` to the VM afterwards.
pub struct Compiler {
    /// The scope chain, rooted at the module's global environment
    pub scopes: Scopes,
    /// Everything emitted so far: function bodies plus the module body
    pub unit: CompiledUnit,
    /// In-progress template instantiations, for recursion rejection
    pub instantiating: Vec<(String, usize)>,
    /// Position of the block currently compiling, for error reporting
    position: Position,
    /// Counter behind the unique compiled names
    next_instance: u32,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            scopes: Scopes::new(),
            unit: CompiledUnit::new(),
            instantiating: vec![],
            position: Position::null(),
            next_instance: 0,
        }
    }

    pub fn position(&self) -> Position {
        self.position.clone()
    }

    pub fn error(&self, error_impl: ErrorImpl) -> Error {
        Error::new(error_impl, self.position.clone())
    }

    fn unexpected(&self, token: &Token) -> Error {
        self.error(ErrorImpl::UnexpectedToken {
            token: token.value.clone(),
            kind: token.kind.to_string(),
        })
    }

    /// Synthesizes a globally unique compiled name. Independent
    /// instantiations of the same template must never collide.
    pub fn fresh_symbol_name(&mut self, base: &str) -> String {
        self.next_instance += 1;
        format!("{}@{}", base, self.next_instance)
    }

    /// Compiles a whole module: definitions register templates, everything
    /// else compiles in statement context into the unit's body.
    pub fn compile_module(&mut self, blocks: &[Block]) -> Result<(), Error> {
        for block in blocks {
            self.position = block.position();
            let first = match block.tokens.first() {
                Some(token) => token,
                None => continue,
            };
            if first.is_keyword(KEYWORD_FN) || first.is_keyword(KEYWORD_OP) {
                self.register_definition(block)?;
            } else {
                let (_, code) = self.compile(&block.tokens, &block.children, false)?;
                self.unit.body.extend(code);
            }
        }
        Ok(())
    }

    /// Registers a `fn`/`op` definition as a template. Bodies stay
    /// untouched until a call site instantiates them.
    fn register_definition(&mut self, block: &Block) -> Result<(), Error> {
        let is_operator = block.tokens[0].is_keyword(KEYWORD_OP);

        let name = match block.tokens.get(1) {
            Some(token) if !is_operator && token.kind == TokenKind::Identifier => token,
            Some(token) if is_operator && token.kind == TokenKind::Operator => token,
            Some(token) => return Err(self.unexpected(token)),
            None => {
                return Err(self.error(ErrorImpl::MissingToken {
                    expected: String::from("name"),
                }))
            }
        };

        let mut params = vec![];
        let mut variadic = false;
        let param_tokens = &block.tokens[2..];
        for (index, token) in param_tokens.iter().enumerate() {
            if token.is_markup(MARKER_EXPAND) && index + 1 == param_tokens.len() && !params.is_empty()
            {
                variadic = true;
            } else if token.kind == TokenKind::Identifier {
                params.push(token.value.clone());
            } else {
                return Err(self.unexpected(token));
            }
        }

        self.scopes.register_template(
            FunctionTemplate {
                name: name.value.clone(),
                params,
                variadic,
                body: block.children.clone(),
            },
            is_operator,
            self.position(),
        )
    }

    /// Compiles one block's tokens.
    ///
    /// Value context builds a pure expression. Statement context first
    /// splits on a single top-level assignment, then recognizes `::`
    /// statement calls, and only then falls through to the expression
    /// grammar.
    pub fn compile(
        &mut self,
        tokens: &[Token],
        children: &[Block],
        value_context: bool,
    ) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        if !children.is_empty() {
            return Err(self.error(ErrorImpl::UnexpectedBlock));
        }
        if value_context {
            return self.compile_value(tokens);
        }

        let assignments = self.top_level_assignments(tokens)?;
        if assignments.len() > 1 {
            return Err(self.error(ErrorImpl::MultiAssignment));
        }
        if let Some(&split) = assignments.first() {
            return self.compile_assignment(tokens, split);
        }

        if let Some(marker) = detect_statement_call(tokens) {
            return self.compile_statement_call(tokens, marker);
        }

        self.compile_value(tokens)
    }

    fn compile_value(&mut self, tokens: &[Token]) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        let branch = build_expression(tokens, &self.position)?;
        branch.compile(self)
    }

    fn top_level_assignments(&self, tokens: &[Token]) -> Result<Vec<usize>, Error> {
        let mut indices = vec![];
        let mut depth = 0i32;
        for (index, token) in tokens.iter().enumerate() {
            if token.is_open_bracket() {
                depth += 1;
            } else if token.is_close_bracket() {
                depth -= 1;
            } else if depth == 0 && token.kind == TokenKind::Operator && token.value == "=" {
                indices.push(index);
            }
        }
        Ok(indices)
    }

    fn compile_assignment(
        &mut self,
        tokens: &[Token],
        split: usize,
    ) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        let left = &tokens[..split];
        let right = &tokens[split + 1..];
        if left.is_empty() || right.is_empty() {
            return Err(self.unexpected(&tokens[split]));
        }

        // The right side is always a value expression; the left side must
        // come out as a branch that supports assignment.
        let (value_type, value_code) = self.compile_value(right)?;
        let target = build_expression(left, &self.position)?;
        let code = target.compile_assign(self, value_code, &value_type)?;
        Ok((TypeDesc::Void, code))
    }

    /// Compiles `route :: operand, operand, ...` including the optional
    /// trailing isolation and expansion markers.
    fn compile_statement_call(
        &mut self,
        tokens: &[Token],
        marker: usize,
    ) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        let route = &tokens[..marker];
        if route.is_empty() {
            return Err(self.error(ErrorImpl::MissingToken {
                expected: String::from("name"),
            }));
        }
        if !is_pure_route(route) {
            return Err(self.unexpected(&route[0]));
        }
        let name = route_segments(route).join(".");

        let mut operands = split_commas(&tokens[marker + 1..], &self.position)?;

        let mut isolated = false;
        if let Some(&last) = operands.last() {
            if last[last.len() - 1].is_markup(MARKER_ISOLATE) {
                isolated = true;
                let shortened = &last[..last.len() - 1];
                if shortened.is_empty() {
                    operands.pop();
                } else {
                    let index = operands.len() - 1;
                    operands[index] = shortened;
                }
            }
        }

        let mut expanded = false;
        if let Some(&last) = operands.last() {
            if last[last.len() - 1].is_markup(MARKER_EXPAND) {
                expanded = true;
                let shortened = &last[..last.len() - 1];
                if shortened.is_empty() {
                    return Err(self.error(ErrorImpl::MissingToken {
                        expected: String::from("expression"),
                    }));
                }
                let index = operands.len() - 1;
                operands[index] = shortened;
            }
        }

        let mut types = vec![];
        let mut codes = vec![];
        for &operand in operands.iter() {
            let (type_, code) = self.compile_value(operand)?;
            types.push(type_);
            codes.push(code);
        }

        if expanded {
            let last = types.last_mut().expect("expansion without operand");
            let element = match last.unalias() {
                TypeDesc::Vector(element) => (**element).clone(),
                other => {
                    let received = other.to_string();
                    return Err(self.error(ErrorImpl::TypeMatchError {
                        expected: String::from("vec[...]"),
                        received,
                    }));
                }
            };
            *last = TypeDesc::Variadic(Box::new(element));
        }

        let (mut call_code, result_type) = resolve_call(self, &name, false, &types)?;

        // The resolved sequence ends in a direct call for compiled
        // functions; expansion and isolation pick its variant.
        if let Some(last) = call_code.last_mut() {
            let mut updated = last.clone();
            if expanded {
                if let Instruction::Call(target) = updated {
                    updated = Instruction::CallExpand(target);
                }
            }
            if isolated {
                updated = match updated {
                    Instruction::Call(target) => Instruction::Spawn(target),
                    Instruction::CallExpand(target) => Instruction::SpawnExpand(target),
                    other => other,
                };
            }
            *last = updated;
        }

        let mut code = vec![];
        for operand in codes.into_iter().rev() {
            code.extend(operand);
        }
        code.extend(call_code);
        Ok((result_type, code))
    }

    /// Compiles a function body: one statement per block, an implicit
    /// return, and the tail-call rewrite when the body ends in a call.
    ///
    /// The caller owns the scope for the body; the return type is whatever
    /// an explicit `return` recorded, or the last statement's type.
    pub fn compile_function_body(
        &mut self,
        blocks: &[Block],
    ) -> Result<(TypeDesc, Vec<Instruction>), Error> {
        let mut code = vec![];
        let mut last_type = TypeDesc::Void;

        for block in blocks {
            self.position = block.position();
            let first = match block.tokens.first() {
                Some(token) => token,
                None => continue,
            };

            if first.is_keyword(KEYWORD_RETURN) {
                if !block.children.is_empty() {
                    return Err(self.error(ErrorImpl::UnexpectedBlock));
                }
                let value = &block.tokens[1..];
                let type_ = if value.is_empty() {
                    TypeDesc::Void
                } else {
                    let (type_, value_code) = self.compile(value, &[], true)?;
                    code.extend(value_code);
                    type_
                };
                match self.scopes.recorded_return_type() {
                    Some(existing) if !existing.exact_equal(&type_) => {
                        return Err(self.error(ErrorImpl::TypeMatchError {
                            expected: existing.to_string(),
                            received: type_.to_string(),
                        }));
                    }
                    Some(_) => {}
                    None => self.scopes.record_return_type(type_.clone()),
                }
                code.push(Instruction::Return);
                last_type = type_;
            } else {
                let (type_, statement_code) =
                    self.compile(&block.tokens, &block.children, false)?;
                code.extend(statement_code);
                last_type = type_;
            }
        }

        // A trailing statement-position call reuses the current frame
        // instead of growing the call stack.
        if let Some(last) = code.last_mut() {
            if matches!(last, Instruction::Call(_) | Instruction::CallExpand(_)) {
                let rewritten = last.clone().into_tail_call();
                *last = rewritten;
            }
        }
        if !matches!(code.last(), Some(Instruction::Return)) {
            code.push(Instruction::Return);
        }

        let return_type = self.scopes.recorded_return_type().unwrap_or(last_type);
        Ok((return_type, code))
    }
}

/// Looks for a top-level `::` marker with no bracket pair opening before
/// it. Anything else falls through to the expression grammar.
fn detect_statement_call(tokens: &[Token]) -> Option<usize> {
    for (index, token) in tokens.iter().enumerate() {
        if token.is_open_bracket() {
            return None;
        }
        if token.is_markup(MARKER_CALL) {
            return Some(index);
        }
    }
    None
}
