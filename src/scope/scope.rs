use std::collections::HashMap;
use std::fmt;

use crate::blocks::blocks::Block;
use crate::bytecode::bytecode::Instruction;
use crate::errors::errors::{Error, ErrorImpl};
use crate::types::types::TypeDesc;
use crate::Position;

/// Synthesizes a concrete symbol from requested argument types alone, with
/// no template body. This is how the external standard library plugs in
/// parametric built-ins: indexing, casts, generic constructors.
pub type DynamicResolver = Box<dyn Fn(&[TypeDesc]) -> Option<FunctionSymbol>>;

/// A concrete, fully resolved callable.
///
/// `code` is the call sequence emitted at a call site (a direct call for
/// compiled functions, synthesized inline instructions for built-ins), not
/// the function body itself.
#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    pub name: String,
    pub params: Vec<TypeDesc>,
    pub return_type: TypeDesc,
    pub variadic: bool,
    pub code: Vec<Instruction>,
}

/// An uninstantiated generic definition: untyped parameter names plus the
/// body blocks, realized per call site's argument types.
#[derive(Debug, Clone)]
pub struct FunctionTemplate {
    pub name: String,
    pub params: Vec<String>,
    pub variadic: bool,
    pub body: Vec<Block>,
}

impl FunctionTemplate {
    /// Number of non-variadic parameters.
    pub fn fixed_count(&self) -> usize {
        if self.variadic {
            self.params.len().saturating_sub(1)
        } else {
            self.params.len()
        }
    }

    /// Whether a call with `arity` arguments can instantiate this template.
    /// A variadic template needs at least its packing parameter.
    pub fn accepts_arity(&self, arity: usize) -> bool {
        if self.variadic {
            !self.params.is_empty() && self.fixed_count() <= arity
        } else {
            self.params.len() == arity
        }
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub slot: usize,
    pub type_: TypeDesc,
}

/// One scope record in the arena.
pub struct ScopeRecord {
    parent: Option<usize>,
    variables: HashMap<String, Variable>,
    next_slot: usize,
    functions: HashMap<(String, usize), Vec<FunctionSymbol>>,
    operators: HashMap<(String, usize), Vec<FunctionSymbol>>,
    function_templates: HashMap<String, Vec<FunctionTemplate>>,
    operator_templates: HashMap<String, Vec<FunctionTemplate>>,
    resolvers: HashMap<String, DynamicResolver>,
    types: HashMap<String, TypeDesc>,
    return_type: Option<TypeDesc>,
}

impl ScopeRecord {
    fn new(parent: Option<usize>) -> Self {
        ScopeRecord {
            parent,
            variables: HashMap::new(),
            next_slot: 0,
            functions: HashMap::new(),
            operators: HashMap::new(),
            function_templates: HashMap::new(),
            operator_templates: HashMap::new(),
            resolvers: HashMap::new(),
            types: HashMap::new(),
            return_type: None,
        }
    }
}

impl fmt::Debug for ScopeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeRecord")
            .field("parent", &self.parent)
            .field("variables", &self.variables)
            .field("functions", &self.functions.keys())
            .field("operators", &self.operators.keys())
            .field("function_templates", &self.function_templates.keys())
            .field("operator_templates", &self.operator_templates.keys())
            .field("resolvers", &self.resolvers.keys())
            .field("types", &self.types.keys())
            .field("return_type", &self.return_type)
            .finish()
    }
}

/// The scope arena. Record 0 is the module root and lives for the whole
/// compilation unit; children are opened when a function body starts
/// compiling and closed when it finishes.
#[derive(Debug)]
pub struct Scopes {
    records: Vec<ScopeRecord>,
    current: usize,
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    pub fn new() -> Self {
        Scopes {
            records: vec![ScopeRecord::new(None)],
            current: 0,
        }
    }

    pub fn open_child(&mut self) -> usize {
        self.records.push(ScopeRecord::new(Some(self.current)));
        self.current = self.records.len() - 1;
        self.current
    }

    pub fn close(&mut self, position: Position) -> Result<(), Error> {
        match self.records[self.current].parent {
            Some(parent) => {
                self.current = parent;
                Ok(())
            }
            None => Err(Error::new(
                ErrorImpl::Internal {
                    message: String::from("attempted to close the module root scope"),
                },
                position,
            )),
        }
    }

    /// Whether the current scope is the module root, where declarations
    /// land in the global environment.
    pub fn at_root(&self) -> bool {
        self.current == 0
    }

    pub fn declare_variable(
        &mut self,
        name: &str,
        type_: TypeDesc,
        position: Position,
    ) -> Result<usize, Error> {
        let record = &mut self.records[self.current];
        if record.variables.contains_key(name) {
            return Err(Error::new(
                ErrorImpl::VariableAlreadyDeclared {
                    variable: name.to_string(),
                },
                position,
            ));
        }
        let slot = record.next_slot;
        record.next_slot += 1;
        record
            .variables
            .insert(name.to_string(), Variable { slot, type_ });
        Ok(slot)
    }

    /// Local-only variable lookup. Function locals never capture an
    /// enclosing function's frame, so there is no parent fallback here.
    pub fn lookup_variable(&self, name: &str) -> Option<Variable> {
        self.records[self.current].variables.get(name).cloned()
    }

    /// Module-global lookup: root-scope bindings are the only ones visible
    /// across function bodies.
    pub fn lookup_global(&self, name: &str) -> Option<Variable> {
        self.records[0].variables.get(name).cloned()
    }

    /// Appends a concrete symbol; several symbols may share a name and
    /// arity as long as their parameter types differ.
    pub fn register_symbol(&mut self, symbol: FunctionSymbol, is_operator: bool) {
        let record = &mut self.records[self.current];
        let table = if is_operator {
            &mut record.operators
        } else {
            &mut record.functions
        };
        table
            .entry((symbol.name.clone(), symbol.params.len()))
            .or_default()
            .push(symbol);
    }

    /// Nearest scope holding any symbols for (name, arity); candidates stay
    /// in registration order.
    pub fn find_symbols(&self, name: &str, arity: usize, is_operator: bool) -> &[FunctionSymbol] {
        let mut scope = Some(self.current);
        while let Some(index) = scope {
            let record = &self.records[index];
            let table = if is_operator {
                &record.operators
            } else {
                &record.functions
            };
            if let Some(symbols) = table.get(&(name.to_string(), arity)) {
                return symbols;
            }
            scope = record.parent;
        }
        &[]
    }

    pub fn register_template(
        &mut self,
        template: FunctionTemplate,
        is_operator: bool,
        position: Position,
    ) -> Result<(), Error> {
        let record = &mut self.records[self.current];
        let table = if is_operator {
            &mut record.operator_templates
        } else {
            &mut record.function_templates
        };
        let registered = table.entry(template.name.clone()).or_default();
        if registered.iter().any(|existing| {
            existing.params.len() == template.params.len()
                && existing.variadic == template.variadic
        }) {
            return Err(Error::new(
                ErrorImpl::TemplateAlreadyDeclared {
                    template: template.name,
                },
                position,
            ));
        }
        registered.push(template);
        Ok(())
    }

    /// Finds a template for (name, arity), walking parents on miss. A
    /// fixed-arity match wins over a variadic one within the same scope.
    pub fn find_template(
        &self,
        name: &str,
        arity: usize,
        is_operator: bool,
    ) -> Option<&FunctionTemplate> {
        let mut scope = Some(self.current);
        while let Some(index) = scope {
            let record = &self.records[index];
            let table = if is_operator {
                &record.operator_templates
            } else {
                &record.function_templates
            };
            if let Some(templates) = table.get(name) {
                let fixed = templates
                    .iter()
                    .find(|template| !template.variadic && template.accepts_arity(arity));
                if let Some(template) = fixed {
                    return Some(template);
                }
                let variadic = templates
                    .iter()
                    .find(|template| template.variadic && template.accepts_arity(arity));
                if let Some(template) = variadic {
                    return Some(template);
                }
            }
            scope = record.parent;
        }
        None
    }

    /// At most one dynamic resolver may exist per name anywhere on the
    /// chain.
    pub fn register_resolver(
        &mut self,
        name: &str,
        resolver: DynamicResolver,
        position: Position,
    ) -> Result<(), Error> {
        if self.find_resolver(name).is_some() {
            return Err(Error::new(
                ErrorImpl::ResolverAlreadyDeclared {
                    name: name.to_string(),
                },
                position,
            ));
        }
        self.records[self.current]
            .resolvers
            .insert(name.to_string(), resolver);
        Ok(())
    }

    pub fn find_resolver(&self, name: &str) -> Option<&DynamicResolver> {
        let mut scope = Some(self.current);
        while let Some(index) = scope {
            let record = &self.records[index];
            if let Some(resolver) = record.resolvers.get(name) {
                return Some(resolver);
            }
            scope = record.parent;
        }
        None
    }

    pub fn register_type(&mut self, name: &str, type_: TypeDesc) {
        self.records[self.current]
            .types
            .insert(name.to_string(), type_);
    }

    /// Named-type lookup with parent fallback. Returns a fresh deep clone;
    /// callers reshape result types freely.
    pub fn lookup_type(&self, name: &str) -> Option<TypeDesc> {
        let mut scope = Some(self.current);
        while let Some(index) = scope {
            let record = &self.records[index];
            if let Some(type_) = record.types.get(name) {
                return Some(type_.clone());
            }
            scope = record.parent;
        }
        None
    }

    /// Records the return type discovered while compiling the current
    /// function body. The first return fixes the type.
    pub fn record_return_type(&mut self, type_: TypeDesc) {
        let record = &mut self.records[self.current];
        if record.return_type.is_none() {
            record.return_type = Some(type_);
        }
    }

    pub fn recorded_return_type(&self) -> Option<TypeDesc> {
        self.records[self.current].return_type.clone()
    }
}
