use log::trace;

use crate::blocks::tokens::{closing_bracket, Token, TokenKind, KEYWORD_FALSE, KEYWORD_TRUE};
use crate::bytecode::bytecode::Literal;
use crate::errors::errors::{Error, ErrorImpl};
use crate::Position;

use super::branch::{
    BranchWrapper, CallBranch, CastBranch, ConstIndexBranch, ConstructBranch, FieldBranch,
    IndexBranch, LiteralBranch, OperatorBranch, RouteBranch, TupleBranch,
};

fn unexpected(token: &Token, position: &Position) -> Error {
    Error::new(
        ErrorImpl::UnexpectedToken {
            token: token.value.clone(),
            kind: token.kind.to_string(),
        },
        position.clone(),
    )
}

fn missing(expected: &str, position: &Position) -> Error {
    Error::new(
        ErrorImpl::MissingToken {
            expected: expected.to_string(),
        },
        position.clone(),
    )
}

/// Finds the index of the bracket closing the one at `open`.
pub fn matching_close(tokens: &[Token], open: usize, position: &Position) -> Result<usize, Error> {
    let mut stack = vec![closing_bracket(&tokens[open].value)];
    let mut index = open + 1;
    while index < tokens.len() {
        let token = &tokens[index];
        if token.is_open_bracket() {
            stack.push(closing_bracket(&token.value));
        } else if token.is_close_bracket() {
            let expected = stack.pop().unwrap_or("");
            if token.value != expected {
                return Err(unexpected(token, position));
            }
            if stack.is_empty() {
                return Ok(index);
            }
        }
        index += 1;
    }
    Err(missing(closing_bracket(&tokens[open].value), position))
}

/// Splits a token slice at top level on a predicate; brackets of all three
/// pairs must balance across the split.
fn top_level_indices(
    tokens: &[Token],
    position: &Position,
    predicate: impl Fn(&Token) -> bool,
) -> Result<Vec<usize>, Error> {
    let mut indices = vec![];
    let mut stack: Vec<&str> = vec![];
    for (index, token) in tokens.iter().enumerate() {
        if token.is_open_bracket() {
            stack.push(closing_bracket(&token.value));
        } else if token.is_close_bracket() {
            match stack.pop() {
                Some(expected) if token.value == expected => {}
                _ => return Err(unexpected(token, position)),
            }
        } else if stack.is_empty() && predicate(token) {
            indices.push(index);
        }
    }
    if !stack.is_empty() {
        return Err(missing(stack[stack.len() - 1], position));
    }
    Ok(indices)
}

/// Splits a token slice on top-level commas. Empty pieces are rejected.
pub fn split_commas<'a>(
    tokens: &'a [Token],
    position: &Position,
) -> Result<Vec<&'a [Token]>, Error> {
    if tokens.is_empty() {
        return Ok(vec![]);
    }
    let commas = top_level_indices(tokens, position, |token| token.is_markup(","))?;
    let mut pieces = vec![];
    let mut start = 0;
    for comma in commas {
        if comma == start {
            return Err(unexpected(&tokens[comma], position));
        }
        pieces.push(&tokens[start..comma]);
        start = comma + 1;
    }
    if start >= tokens.len() {
        return Err(missing("expression", position));
    }
    pieces.push(&tokens[start..]);
    Ok(pieces)
}

/// Whether the tokens form a pure dotted identifier route.
pub fn is_pure_route(tokens: &[Token]) -> bool {
    if tokens.is_empty() || tokens.len() % 2 == 0 {
        return false;
    }
    for (index, token) in tokens.iter().enumerate() {
        if index % 2 == 0 {
            if token.kind != TokenKind::Identifier {
                return false;
            }
        } else if !token.is_markup(".") {
            return false;
        }
    }
    true
}

pub fn route_segments(tokens: &[Token]) -> Vec<String> {
    tokens
        .iter()
        .step_by(2)
        .map(|token| token.value.clone())
        .collect()
}

/// Builds the expression tree for a token slice.
///
/// There is no precedence table: the tokens split on every top-level
/// operator, and the first operator whose preceding operand slice is
/// non-empty becomes the root. An operator with nothing on its left is a
/// unary prefix, except that a literal `+`/`-` directly in front of a
/// numeric literal folds into a signed literal.
pub fn build_expression(tokens: &[Token], position: &Position) -> Result<BranchWrapper, Error> {
    if tokens.is_empty() {
        return Err(missing("expression", position));
    }
    trace!("building expression tree from {} tokens", tokens.len());

    let operators = top_level_indices(tokens, position, |token| token.kind == TokenKind::Operator)?;
    if operators.is_empty() {
        return build_operand(tokens, position);
    }

    let mut root = None;
    for (nth, &index) in operators.iter().enumerate() {
        let left_start = if nth == 0 { 0 } else { operators[nth - 1] + 1 };
        if index > left_start {
            root = Some(index);
            break;
        }
    }

    match root {
        Some(index) => {
            if index + 1 >= tokens.len() {
                return Err(unexpected(&tokens[index], position));
            }
            let left = build_expression(&tokens[..index], position)?;
            let right = build_expression(&tokens[index + 1..], position)?;
            Ok(BranchWrapper::new(OperatorBranch {
                operator: tokens[index].clone(),
                left: Some(left),
                right,
            }))
        }
        None => {
            // Every operator has an empty left slice, so the first token is
            // an operator in prefix position.
            let operator = &tokens[0];
            let remainder = &tokens[1..];
            if remainder.is_empty() {
                return Err(unexpected(operator, position));
            }
            if matches!(operator.value.as_str(), "+" | "-")
                && remainder.len() == 1
                && matches!(remainder[0].kind, TokenKind::Integer | TokenKind::Decimal)
            {
                return build_signed_literal(operator, &remainder[0], position);
            }
            let right = build_expression(remainder, position)?;
            Ok(BranchWrapper::new(OperatorBranch {
                operator: operator.clone(),
                left: None,
                right,
            }))
        }
    }
}

fn build_signed_literal(
    sign: &Token,
    number: &Token,
    position: &Position,
) -> Result<BranchWrapper, Error> {
    let negative = sign.value == "-";
    let literal = match number.kind {
        TokenKind::Integer => {
            let value: i64 = number.value.parse().map_err(|_| unexpected(number, position))?;
            Literal::Int(if negative { -value } else { value })
        }
        _ => {
            let value: f64 = number.value.parse().map_err(|_| unexpected(number, position))?;
            Literal::Dec(if negative { -value } else { value })
        }
    };
    Ok(BranchWrapper::new(LiteralBranch { literal }))
}

fn build_literal(token: &Token, position: &Position) -> Result<BranchWrapper, Error> {
    let literal = match token.kind {
        TokenKind::Integer => {
            Literal::Int(token.value.parse().map_err(|_| unexpected(token, position))?)
        }
        TokenKind::Decimal => {
            Literal::Dec(token.value.parse().map_err(|_| unexpected(token, position))?)
        }
        TokenKind::String => Literal::Str(token.value.clone()),
        TokenKind::Keyword if token.value == KEYWORD_TRUE => Literal::Bool(true),
        TokenKind::Keyword if token.value == KEYWORD_FALSE => Literal::Bool(false),
        _ => return Err(unexpected(token, position)),
    };
    Ok(BranchWrapper::new(LiteralBranch { literal }))
}

/// Builds an operand: an atom possibly followed by subroutes.
fn build_operand(tokens: &[Token], position: &Position) -> Result<BranchWrapper, Error> {
    // A pure variable/field chain is a single route atom.
    if is_pure_route(tokens) {
        return Ok(BranchWrapper::new(RouteBranch {
            segments: route_segments(tokens),
        }));
    }

    let (atom, rest) = build_atom(tokens, position)?;
    apply_subroutes(atom, rest, position)
}

/// Identifies the leading atom and returns it with the unconsumed tokens.
fn build_atom<'a>(
    tokens: &'a [Token],
    position: &Position,
) -> Result<(BranchWrapper, &'a [Token]), Error> {
    let first = &tokens[0];

    match first.kind {
        TokenKind::Integer | TokenKind::Decimal | TokenKind::String => {
            Ok((build_literal(first, position)?, &tokens[1..]))
        }
        TokenKind::Keyword if first.value == KEYWORD_TRUE || first.value == KEYWORD_FALSE => {
            Ok((build_literal(first, position)?, &tokens[1..]))
        }
        TokenKind::Identifier => {
            // `name(args)` is a call; a bare identifier is a route head.
            if tokens.len() > 1 && tokens[1].is_markup("(") {
                let close = matching_close(tokens, 1, position)?;
                let mut arguments = vec![];
                for piece in split_commas(&tokens[2..close], position)? {
                    arguments.push(build_expression(piece, position)?);
                }
                let call = BranchWrapper::new(CallBranch {
                    name: first.value.clone(),
                    arguments,
                });
                return Ok((call, &tokens[close + 1..]));
            }
            Ok((
                BranchWrapper::new(RouteBranch {
                    segments: vec![first.value.clone()],
                }),
                &tokens[1..],
            ))
        }
        TokenKind::Markup if first.value == "{" => {
            let close = matching_close(tokens, 0, position)?;
            let inner = &tokens[1..close];
            if inner.is_empty() {
                return Err(Error::new(
                    ErrorImpl::EmptyConstruction {
                        what: String::from("tuple"),
                    },
                    position.clone(),
                ));
            }
            let mut elements = vec![];
            for piece in split_commas(inner, position)? {
                elements.push(build_expression(piece, position)?);
            }
            Ok((
                BranchWrapper::new(TupleBranch { elements }),
                &tokens[close + 1..],
            ))
        }
        TokenKind::Markup if first.value == "[" => {
            // Nothing to the left of the bracket: type construction.
            let close = matching_close(tokens, 0, position)?;
            let inner = &tokens[1..close];
            if inner.is_empty() {
                return Err(Error::new(
                    ErrorImpl::EmptyConstruction {
                        what: String::from("type"),
                    },
                    position.clone(),
                ));
            }
            if inner.len() != 1 || inner[0].kind != TokenKind::Identifier {
                return Err(unexpected(&inner[0], position));
            }
            Ok((
                BranchWrapper::new(ConstructBranch {
                    type_name: inner[0].value.clone(),
                }),
                &tokens[close + 1..],
            ))
        }
        TokenKind::Markup if first.value == "(" => {
            let close = matching_close(tokens, 0, position)?;
            let inner = build_expression(&tokens[1..close], position)?;
            Ok((inner, &tokens[close + 1..]))
        }
        _ => Err(unexpected(first, position)),
    }
}

/// Applies postfix subroutes to an atom, left to right: `.name` field
/// access, `.N` constant index, `[key]` indexing, or a single trailing bare
/// identifier read as a type cast.
fn apply_subroutes(
    branch: BranchWrapper,
    rest: &[Token],
    position: &Position,
) -> Result<BranchWrapper, Error> {
    if rest.is_empty() {
        return Ok(branch);
    }

    let first = &rest[0];
    if first.is_markup(".") {
        if rest.len() < 2 {
            return Err(unexpected(first, position));
        }
        let member = &rest[1];
        let next = match member.kind {
            TokenKind::Identifier => BranchWrapper::new(FieldBranch {
                target: branch,
                name: member.value.clone(),
            }),
            TokenKind::Integer => BranchWrapper::new(ConstIndexBranch {
                target: branch,
                index: member.value.parse().map_err(|_| unexpected(member, position))?,
            }),
            _ => return Err(unexpected(member, position)),
        };
        return apply_subroutes(next, &rest[2..], position);
    }

    if first.is_markup("[") {
        let close = matching_close(rest, 0, position)?;
        let inner = &rest[1..close];
        // A single integer literal is a constant access, the same dual
        // dispatch as `.N`; anything else is generic indexing.
        let next = if inner.len() == 1 && inner[0].kind == TokenKind::Integer {
            BranchWrapper::new(ConstIndexBranch {
                target: branch,
                index: inner[0]
                    .value
                    .parse()
                    .map_err(|_| unexpected(&inner[0], position))?,
            })
        } else {
            BranchWrapper::new(IndexBranch {
                target: branch,
                index: build_expression(inner, position)?,
            })
        };
        return apply_subroutes(next, &rest[close + 1..], position);
    }

    // A single trailing identifier reinterprets the type.
    if first.kind == TokenKind::Identifier && rest.len() == 1 {
        return Ok(BranchWrapper::new(CastBranch {
            target: branch,
            type_name: first.value.clone(),
        }));
    }

    Err(unexpected(first, position))
}
