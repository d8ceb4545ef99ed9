//! Unit tests for the syntax tree builder.

use crate::blocks::tokens::{Token, TokenKind};
use crate::bytecode::bytecode::{Instruction, Literal};
use crate::compiler::branch::{Branch, BranchType};
use crate::compiler::compiler::Compiler;
use crate::compiler::expr::{build_expression, is_pure_route};
use crate::scope::scope::FunctionSymbol;
use crate::types::types::TypeDesc;
use crate::{Position, MK_TOKEN};

fn id(value: &str) -> Token {
    MK_TOKEN!(TokenKind::Identifier, value)
}

fn int(value: &str) -> Token {
    MK_TOKEN!(TokenKind::Integer, value)
}

fn op(value: &str) -> Token {
    MK_TOKEN!(TokenKind::Operator, value)
}

fn mark(value: &str) -> Token {
    MK_TOKEN!(TokenKind::Markup, value)
}

fn kw(value: &str) -> Token {
    MK_TOKEN!(TokenKind::Keyword, value)
}

fn string(value: &str) -> Token {
    MK_TOKEN!(TokenKind::String, value)
}

/// A compiler with the handful of symbols the tests call into.
fn test_compiler() -> Compiler {
    let mut compiler = Compiler::new();

    compiler.scopes.register_symbol(
        FunctionSymbol {
            name: "+".to_string(),
            params: vec![TypeDesc::Int, TypeDesc::Int],
            return_type: TypeDesc::Int,
            variadic: false,
            code: vec![Instruction::Call("add".to_string())],
        },
        true,
    );
    compiler.scopes.register_symbol(
        FunctionSymbol {
            name: "-".to_string(),
            params: vec![TypeDesc::Int],
            return_type: TypeDesc::Int,
            variadic: false,
            code: vec![Instruction::Call("neg".to_string())],
        },
        true,
    );
    compiler.scopes.register_symbol(
        FunctionSymbol {
            name: "print".to_string(),
            params: vec![TypeDesc::Str],
            return_type: TypeDesc::Void,
            variadic: false,
            code: vec![Instruction::Call("print".to_string())],
        },
        false,
    );

    // Generic indexing comes in through the dynamic resolver seam, the way
    // the standard library registers it.
    compiler
        .scopes
        .register_resolver(
            "get",
            Box::new(|arguments| match arguments[0].unalias() {
                TypeDesc::Vector(element) if arguments.len() == 2 => Some(FunctionSymbol {
                    name: "get".to_string(),
                    params: arguments.to_vec(),
                    return_type: (**element).clone(),
                    variadic: false,
                    code: vec![Instruction::Index],
                }),
                _ => None,
            }),
            Position::null(),
        )
        .unwrap();

    compiler
}

#[test]
fn test_pure_route_detection() {
    assert!(is_pure_route(&[id("a")]));
    assert!(is_pure_route(&[id("a"), mark("."), id("b")]));
    assert!(!is_pure_route(&[id("a"), mark("."), int("2")]));
    assert!(!is_pure_route(&[id("a"), mark(".")]));
    assert!(!is_pure_route(&[int("1")]));
}

#[test]
fn test_literal_compiles_to_single_push() {
    let mut compiler = test_compiler();

    let cases = vec![
        (int("42"), Literal::Int(42), TypeDesc::Int),
        (
            MK_TOKEN!(TokenKind::Decimal, "2.5"),
            Literal::Dec(2.5),
            TypeDesc::Dec,
        ),
        (string("hi"), Literal::Str("hi".to_string()), TypeDesc::Str),
        (kw("true"), Literal::Bool(true), TypeDesc::Bool),
    ];

    for (token, literal, expected_type) in cases {
        let (type_, code) = compiler.compile(&[token], &[], true).unwrap();
        assert!(type_.exact_equal(&expected_type));
        assert_eq!(code, vec![Instruction::Push(literal)]);
    }
}

#[test]
fn test_literal_compilation_is_idempotent() {
    let mut compiler = test_compiler();
    let first = compiler.compile(&[int("7")], &[], true).unwrap();
    let second = compiler.compile(&[int("7")], &[], true).unwrap();
    assert_eq!(first.1, second.1);
}

#[test]
fn test_signed_literal_folds_instead_of_operator_call() {
    let mut compiler = test_compiler();
    let (type_, code) = compiler
        .compile(&[op("-"), int("3")], &[], true)
        .unwrap();

    assert!(type_.exact_equal(&TypeDesc::Int));
    assert_eq!(code, vec![Instruction::Push(Literal::Int(-3))]);
}

#[test]
fn test_unary_prefix_on_identifier_is_an_operator_call() {
    let mut compiler = test_compiler();
    compiler
        .scopes
        .declare_variable("x", TypeDesc::Int, Position::null())
        .unwrap();

    let (type_, code) = compiler.compile(&[op("-"), id("x")], &[], true).unwrap();
    assert!(type_.exact_equal(&TypeDesc::Int));
    assert_eq!(
        code,
        vec![
            Instruction::ReadGlobal(0),
            Instruction::Call("neg".to_string()),
        ]
    );
}

#[test]
fn test_first_operator_with_left_operand_roots_the_tree() {
    // `- a + b`: the `-` has an empty left slice, so `+` becomes the root
    // with `- a` as its left subtree.
    let tokens = vec![op("-"), id("a"), op("+"), id("b")];
    let branch = build_expression(&tokens, &Position::null()).unwrap();

    assert_eq!(branch.get_branch_type(), BranchType::Operator);
    assert_eq!(branch.describe(), "operator `+`");
}

#[test]
fn test_no_precedence_between_operators() {
    // `a + b * c` groups as a + (b * c): the first operator with a left
    // operand roots the tree, there is no precedence climbing.
    let tokens = vec![id("a"), op("+"), id("b"), op("*"), id("c")];
    let branch = build_expression(&tokens, &Position::null()).unwrap();

    assert_eq!(branch.describe(), "operator `+`");
}

#[test]
fn test_bracketed_split_keeps_brackets_whole() {
    // The `+` inside the parentheses is not a top-level split point.
    let tokens = vec![
        mark("("),
        id("a"),
        op("+"),
        id("b"),
        mark(")"),
        op("*"),
        id("c"),
    ];
    let branch = build_expression(&tokens, &Position::null()).unwrap();
    assert_eq!(branch.describe(), "operator `*`");
}

#[test]
fn test_operand_emission_order_is_reversed() {
    let mut compiler = test_compiler();
    compiler
        .scopes
        .declare_variable("a", TypeDesc::Int, Position::null())
        .unwrap();
    compiler
        .scopes
        .declare_variable("b", TypeDesc::Int, Position::null())
        .unwrap();

    let (_, code) = compiler
        .compile(&[id("a"), op("+"), id("b")], &[], true)
        .unwrap();

    // Last argument pushed first: b, then a, then the call.
    assert_eq!(
        code,
        vec![
            Instruction::ReadGlobal(1),
            Instruction::ReadGlobal(0),
            Instruction::Call("add".to_string()),
        ]
    );
}

#[test]
fn test_assignment_declares_and_writes() {
    let mut compiler = test_compiler();
    let (type_, code) = compiler
        .compile(&[id("x"), op("="), int("5")], &[], false)
        .unwrap();

    assert!(type_.exact_equal(&TypeDesc::Void));
    assert_eq!(
        code,
        vec![
            Instruction::Push(Literal::Int(5)),
            Instruction::WriteGlobal(0),
        ]
    );

    // The second assignment reuses the slot and type-checks.
    let (_, code) = compiler
        .compile(&[id("x"), op("="), int("6")], &[], false)
        .unwrap();
    assert_eq!(
        code,
        vec![
            Instruction::Push(Literal::Int(6)),
            Instruction::WriteGlobal(0),
        ]
    );

    let mismatch = compiler.compile(&[id("x"), op("="), string("no")], &[], false);
    assert_eq!(mismatch.unwrap_err().get_error_name(), "TypeMatchError");
}

#[test]
fn test_multi_assignment_is_rejected() {
    let mut compiler = test_compiler();
    let result = compiler.compile(
        &[id("a"), op("="), id("b"), op("="), int("1")],
        &[],
        false,
    );

    assert_eq!(result.unwrap_err().get_error_name(), "MultiAssignment");
}

#[test]
fn test_assignment_to_non_target_fails() {
    let mut compiler = test_compiler();
    let result = compiler.compile(
        &[int("1"), op("+"), int("2"), op("="), int("3")],
        &[],
        false,
    );

    assert_eq!(result.unwrap_err().get_error_name(), "CannotSet");
}

#[test]
fn test_tuple_literal_collapses() {
    let mut compiler = test_compiler();
    let (type_, code) = compiler
        .compile(
            &[mark("{"), int("1"), mark(","), int("2"), mark("}")],
            &[],
            true,
        )
        .unwrap();

    assert!(type_.exact_equal(&TypeDesc::Tuple(vec![TypeDesc::Int, TypeDesc::Int])));
    assert_eq!(
        code,
        vec![
            Instruction::Push(Literal::Int(1)),
            Instruction::Push(Literal::Int(2)),
            Instruction::Collapse(2),
        ]
    );
}

#[test]
fn test_empty_tuple_construction_fails() {
    let mut compiler = test_compiler();
    let result = compiler.compile(&[mark("{"), mark("}")], &[], true);
    assert_eq!(result.unwrap_err().get_error_name(), "EmptyConstruction");
}

#[test]
fn test_tuple_constant_access_reads_field() {
    let mut compiler = test_compiler();
    compiler
        .scopes
        .declare_variable(
            "t",
            TypeDesc::Tuple(vec![TypeDesc::Int, TypeDesc::Str, TypeDesc::Bool]),
            Position::null(),
        )
        .unwrap();

    let (type_, code) = compiler
        .compile(&[id("t"), mark("."), int("1")], &[], true)
        .unwrap();

    assert!(type_.exact_equal(&TypeDesc::Str));
    assert_eq!(
        code,
        vec![Instruction::ReadGlobal(0), Instruction::ReadField(1)]
    );
}

#[test]
fn test_tuple_constant_access_bounds_checked() {
    let mut compiler = test_compiler();
    compiler
        .scopes
        .declare_variable(
            "t",
            TypeDesc::Tuple(vec![TypeDesc::Int, TypeDesc::Int, TypeDesc::Int]),
            Position::null(),
        )
        .unwrap();

    let result = compiler.compile(&[id("t"), mark("."), int("5")], &[], true);
    assert_eq!(result.unwrap_err().get_error_name(), "IndexOutOfRange");
}

#[test]
fn test_tuple_constant_write_checks_field_type() {
    let mut compiler = test_compiler();
    compiler
        .scopes
        .declare_variable(
            "t",
            TypeDesc::Tuple(vec![TypeDesc::Int, TypeDesc::Str]),
            Position::null(),
        )
        .unwrap();

    let (_, code) = compiler
        .compile(&[id("t"), mark("."), int("0"), op("="), int("9")], &[], false)
        .unwrap();
    assert_eq!(
        code,
        vec![
            Instruction::Push(Literal::Int(9)),
            Instruction::ReadGlobal(0),
            Instruction::WriteField(0),
        ]
    );

    let mismatch = compiler.compile(
        &[id("t"), mark("."), int("0"), op("="), string("x")],
        &[],
        false,
    );
    assert_eq!(mismatch.unwrap_err().get_error_name(), "TypeMatchError");

    let out_of_range = compiler.compile(
        &[id("t"), mark("."), int("9"), op("="), int("1")],
        &[],
        false,
    );
    assert_eq!(out_of_range.unwrap_err().get_error_name(), "IndexOutOfRange");
}

#[test]
fn test_constant_access_on_vector_desugars_to_get() {
    let mut compiler = test_compiler();
    compiler
        .scopes
        .declare_variable(
            "v",
            TypeDesc::Vector(Box::new(TypeDesc::Str)),
            Position::null(),
        )
        .unwrap();

    let (type_, code) = compiler
        .compile(&[id("v"), mark("."), int("2")], &[], true)
        .unwrap();

    assert!(type_.exact_equal(&TypeDesc::Str));
    assert_eq!(
        code,
        vec![
            Instruction::Push(Literal::Int(2)),
            Instruction::ReadGlobal(0),
            Instruction::Index,
        ]
    );
}

#[test]
fn test_single_integer_bracket_index_is_constant_access() {
    let mut compiler = test_compiler();
    compiler
        .scopes
        .declare_variable(
            "t",
            TypeDesc::Tuple(vec![TypeDesc::Int, TypeDesc::Str]),
            Position::null(),
        )
        .unwrap();

    // `t[1]` with a literal index takes the compile-time field path, no
    // generic `get` involved.
    let (type_, code) = compiler
        .compile(&[id("t"), mark("["), int("1"), mark("]")], &[], true)
        .unwrap();
    assert!(type_.exact_equal(&TypeDesc::Str));
    assert_eq!(
        code,
        vec![Instruction::ReadGlobal(0), Instruction::ReadField(1)]
    );
}

#[test]
fn test_struct_field_navigation() {
    let mut compiler = test_compiler();
    let point = TypeDesc::new_struct(vec![
        ("x".to_string(), TypeDesc::Int),
        ("y".to_string(), TypeDesc::Dec),
    ]);
    compiler
        .scopes
        .declare_variable("p", point, Position::null())
        .unwrap();

    let (type_, code) = compiler
        .compile(&[id("p"), mark("."), id("y")], &[], true)
        .unwrap();
    assert!(type_.exact_equal(&TypeDesc::Dec));
    assert_eq!(
        code,
        vec![Instruction::ReadGlobal(0), Instruction::ReadField(1)]
    );

    let unknown = compiler.compile(&[id("p"), mark("."), id("z")], &[], true);
    assert_eq!(unknown.unwrap_err().get_error_name(), "UnknownField");
}

#[test]
fn test_field_access_on_non_struct_is_hard_error() {
    let mut compiler = test_compiler();
    compiler
        .scopes
        .declare_variable("n", TypeDesc::Int, Position::null())
        .unwrap();

    let result = compiler.compile(&[id("n"), mark("."), id("x")], &[], true);
    assert_eq!(result.unwrap_err().get_error_name(), "UnknownField");
}

#[test]
fn test_cast_succeeds_on_compatible_types() {
    let mut compiler = test_compiler();
    compiler
        .scopes
        .declare_variable("n", TypeDesc::Int, Position::null())
        .unwrap();

    let (type_, code) = compiler.compile(&[id("n"), id("any")], &[], true).unwrap();
    assert!(type_.exact_equal(&TypeDesc::Any));
    // Casting reinterprets the type, it emits nothing.
    assert_eq!(code, vec![Instruction::ReadGlobal(0)]);
}

#[test]
fn test_cast_fails_on_incompatible_types() {
    let mut compiler = test_compiler();
    compiler
        .scopes
        .declare_variable("n", TypeDesc::Int, Position::null())
        .unwrap();

    let result = compiler.compile(&[id("n"), id("str")], &[], true);
    assert_eq!(result.unwrap_err().get_error_name(), "IncompatibleCast");
}

#[test]
fn test_cast_to_registered_named_type() {
    let mut compiler = test_compiler();
    compiler.scopes.register_type(
        "ints",
        TypeDesc::Alias {
            name: "ints".to_string(),
            underlying: Box::new(TypeDesc::Vector(Box::new(TypeDesc::Int))),
        },
    );
    compiler
        .scopes
        .declare_variable(
            "v",
            TypeDesc::Vector(Box::new(TypeDesc::Int)),
            Position::null(),
        )
        .unwrap();

    let (type_, _) = compiler.compile(&[id("v"), id("ints")], &[], true).unwrap();
    assert!(matches!(type_, TypeDesc::Alias { .. }));

    let unknown = compiler.compile(&[id("v"), id("missing")], &[], true);
    assert_eq!(unknown.unwrap_err().get_error_name(), "UnknownType");
}

#[test]
fn test_statement_call_emits_reversed_operands() {
    let mut compiler = test_compiler();
    compiler.scopes.register_symbol(
        FunctionSymbol {
            name: "pair".to_string(),
            params: vec![TypeDesc::Int, TypeDesc::Str],
            return_type: TypeDesc::Void,
            variadic: false,
            code: vec![Instruction::Call("pair".to_string())],
        },
        false,
    );

    let tokens = vec![id("pair"), mark("::"), int("1"), mark(","), string("x")];
    let (_, code) = compiler.compile(&tokens, &[], false).unwrap();

    assert_eq!(
        code,
        vec![
            Instruction::Push(Literal::Str("x".to_string())),
            Instruction::Push(Literal::Int(1)),
            Instruction::Call("pair".to_string()),
        ]
    );
}

#[test]
fn test_isolated_statement_call_spawns() {
    let mut compiler = test_compiler();
    let tokens = vec![id("print"), mark("::"), string("bg"), mark("&")];
    let (_, code) = compiler.compile(&tokens, &[], false).unwrap();

    assert_eq!(
        code,
        vec![
            Instruction::Push(Literal::Str("bg".to_string())),
            Instruction::Spawn("print".to_string()),
        ]
    );
}

#[test]
fn test_statement_call_after_bracket_falls_through() {
    // A bracket pair opening before `::` means this is not a statement
    // call; the `::` then trips the expression grammar.
    let mut compiler = test_compiler();
    let tokens = vec![
        mark("("),
        id("f"),
        mark(")"),
        mark("::"),
        int("1"),
    ];
    let result = compiler.compile(&tokens, &[], false);
    assert_eq!(result.unwrap_err().get_error_name(), "UnexpectedToken");
}

#[test]
fn test_dotted_statement_call_route() {
    let mut compiler = test_compiler();
    compiler.scopes.register_symbol(
        FunctionSymbol {
            name: "math.abs".to_string(),
            params: vec![TypeDesc::Int],
            return_type: TypeDesc::Int,
            variadic: false,
            code: vec![Instruction::Call("math.abs".to_string())],
        },
        false,
    );

    // The signed literal fold applies inside the operand, so the call
    // resolves on (int).
    let tokens = vec![id("math"), mark("."), id("abs"), mark("::"), op("-"), int("1")];
    let (type_, code) = compiler.compile(&tokens, &[], false).unwrap();
    assert!(type_.exact_equal(&TypeDesc::Int));
    assert_eq!(
        code,
        vec![
            Instruction::Push(Literal::Int(-1)),
            Instruction::Call("math.abs".to_string()),
        ]
    );
}

#[test]
fn test_statement_with_children_is_rejected() {
    use crate::blocks::blocks::Block;
    use crate::MK_BLOCK;

    let mut compiler = test_compiler();
    let child = MK_BLOCK!(vec![int("1")]);
    let result = compiler.compile(&[id("x"), op("="), int("1")], &[child], false);
    assert_eq!(result.unwrap_err().get_error_name(), "UnexpectedBlock");
}

#[test]
fn test_call_atom_with_subroute() {
    let mut compiler = test_compiler();
    compiler.scopes.register_symbol(
        FunctionSymbol {
            name: "origin".to_string(),
            params: vec![],
            return_type: TypeDesc::new_struct(vec![
                ("x".to_string(), TypeDesc::Int),
                ("y".to_string(), TypeDesc::Int),
            ]),
            variadic: false,
            code: vec![Instruction::Call("origin".to_string())],
        },
        false,
    );

    let tokens = vec![
        id("origin"),
        mark("("),
        mark(")"),
        mark("."),
        id("x"),
    ];
    let (type_, code) = compiler.compile(&tokens, &[], true).unwrap();
    assert!(type_.exact_equal(&TypeDesc::Int));
    assert_eq!(
        code,
        vec![
            Instruction::Call("origin".to_string()),
            Instruction::ReadField(0),
        ]
    );
}

#[test]
fn test_vector_index_assignment_uses_set() {
    let mut compiler = test_compiler();
    compiler
        .scopes
        .register_resolver(
            "set",
            Box::new(|arguments| match arguments[0].unalias() {
                TypeDesc::Vector(_) if arguments.len() == 3 => Some(FunctionSymbol {
                    name: "set".to_string(),
                    params: arguments.to_vec(),
                    return_type: TypeDesc::Void,
                    variadic: false,
                    code: vec![Instruction::Attach],
                }),
                _ => None,
            }),
            Position::null(),
        )
        .unwrap();
    compiler
        .scopes
        .declare_variable(
            "v",
            TypeDesc::Vector(Box::new(TypeDesc::Int)),
            Position::null(),
        )
        .unwrap();

    let tokens = vec![
        id("v"),
        mark("["),
        int("0"),
        mark("]"),
        op("="),
        int("9"),
    ];
    let (_, code) = compiler.compile(&tokens, &[], false).unwrap();

    assert_eq!(
        code,
        vec![
            Instruction::Push(Literal::Int(9)),
            Instruction::Push(Literal::Int(0)),
            Instruction::ReadGlobal(0),
            Instruction::Attach,
        ]
    );
}
