use log::debug;

use crate::bytecode::bytecode::{CompiledFunction, Instruction};
use crate::compiler::compiler::Compiler;
use crate::errors::errors::{Error, ErrorImpl};
use crate::scope::scope::{FunctionSymbol, FunctionTemplate};
use crate::types::types::{display_types, TypeDesc};

/// Resolves a call site to the instruction sequence performing the call
/// and the type of the value it leaves on the stack.
///
/// Exact matches win over templates, templates over dynamic resolvers;
/// within one table the earliest registration wins. Operator calls must
/// have one or two operands.
pub fn resolve_call(
    compiler: &mut Compiler,
    name: &str,
    is_operator: bool,
    argument_types: &[TypeDesc],
) -> Result<(Vec<Instruction>, TypeDesc), Error> {
    let arity = argument_types.len();

    if is_operator && !(1..=2).contains(&arity) {
        return Err(compiler.error(ErrorImpl::OperatorArity {
            operator: name.to_string(),
            arity,
        }));
    }

    let exact = compiler
        .scopes
        .find_symbols(name, arity, is_operator)
        .iter()
        .find(|symbol| {
            symbol
                .params
                .iter()
                .zip(argument_types.iter())
                .all(|(param, argument)| param.exact_equal(argument))
        })
        .cloned();
    if let Some(symbol) = exact {
        debug!(
            "resolved `{}` ({}) to symbol {}",
            name,
            display_types(argument_types),
            symbol.name
        );
        return Ok((symbol.code, symbol.return_type));
    }

    if let Some(template) = compiler
        .scopes
        .find_template(name, arity, is_operator)
        .cloned()
    {
        let symbol = instantiate_template(compiler, &template, argument_types)?;
        return Ok((symbol.code, symbol.return_type));
    }

    let synthesized = compiler
        .scopes
        .find_resolver(name)
        .and_then(|resolver| resolver(argument_types));
    if let Some(symbol) = synthesized {
        debug!(
            "resolved `{}` ({}) dynamically",
            name,
            display_types(argument_types)
        );
        return Ok((symbol.code, symbol.return_type));
    }

    if is_operator {
        Err(compiler.error(ErrorImpl::NoMatchingOperator {
            operator: name.to_string(),
            arguments: display_types(argument_types),
        }))
    } else {
        Err(compiler.error(ErrorImpl::NoMatchingFunction {
            function: name.to_string(),
            arguments: display_types(argument_types),
        }))
    }
}

/// Monomorphizes a template for one call site's argument types.
///
/// Instantiation is deliberately not memoized: a second call with the same
/// argument types compiles a second body under a new unique name. The
/// concrete symbol only exists once its body compiled, so a template whose
/// body calls back into its own pending instantiation is rejected instead
/// of recursing forever.
pub fn instantiate_template(
    compiler: &mut Compiler,
    template: &FunctionTemplate,
    argument_types: &[TypeDesc],
) -> Result<FunctionSymbol, Error> {
    let key = (template.name.clone(), argument_types.len());
    if compiler.instantiating.contains(&key) {
        return Err(compiler.error(ErrorImpl::RecursiveInstantiation {
            template: template.name.clone(),
        }));
    }
    compiler.instantiating.push(key);
    let result = instantiate(compiler, template, argument_types);
    compiler.instantiating.pop();
    result
}

fn instantiate(
    compiler: &mut Compiler,
    template: &FunctionTemplate,
    argument_types: &[TypeDesc],
) -> Result<FunctionSymbol, Error> {
    let bindings = bind_parameters(compiler, template, argument_types)?;

    compiler.scopes.open_child();
    // Slots are assigned in reverse-pop order: arguments are pushed
    // last-first at the call site, so the VM pops them into declared order.
    for (name, type_) in bindings.iter().rev() {
        let position = compiler.position();
        compiler.scopes.declare_variable(name, type_.clone(), position)?;
    }

    let body = compiler.compile_function_body(&template.body);
    let position = compiler.position();
    compiler.scopes.close(position)?;
    let (return_type, code) = body?;

    let compiled_name = compiler.fresh_symbol_name(&template.name);
    debug!(
        "instantiated template `{}` ({}) as {}",
        template.name,
        display_types(argument_types),
        compiled_name
    );

    compiler.unit.functions.push(CompiledFunction {
        name: compiled_name.clone(),
        arity: argument_types.len(),
        variadic: template.variadic,
        return_type: return_type.clone(),
        code,
    });

    Ok(FunctionSymbol {
        name: compiled_name.clone(),
        params: argument_types.to_vec(),
        return_type,
        variadic: template.variadic,
        code: vec![Instruction::Call(compiled_name)],
    })
}

/// Pairs template parameter names with the call site's argument types, in
/// declared order. A variadic template's last parameter binds the packed
/// vector the VM builds from the trailing arguments on entry.
fn bind_parameters(
    compiler: &mut Compiler,
    template: &FunctionTemplate,
    argument_types: &[TypeDesc],
) -> Result<Vec<(String, TypeDesc)>, Error> {
    if !template.variadic {
        return Ok(template
            .params
            .iter()
            .cloned()
            .zip(argument_types.iter().cloned())
            .collect());
    }

    let fixed = template.fixed_count();
    let mut bindings: Vec<(String, TypeDesc)> = template.params[..fixed]
        .iter()
        .cloned()
        .zip(argument_types[..fixed].iter().cloned())
        .collect();

    let trailing = &argument_types[fixed..];
    let element = match trailing {
        [TypeDesc::Variadic(element)] => (**element).clone(),
        [] => TypeDesc::Any,
        [first, rest @ ..] => {
            for other in rest {
                if !other.exact_equal(first) {
                    return Err(compiler.error(ErrorImpl::TypeMatchError {
                        expected: first.to_string(),
                        received: other.to_string(),
                    }));
                }
            }
            first.clone()
        }
    };
    bindings.push((
        template.params[fixed].clone(),
        TypeDesc::Vector(Box::new(element)),
    ));
    Ok(bindings)
}
