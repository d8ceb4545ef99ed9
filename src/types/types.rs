use std::{collections::HashMap, fmt::Display};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    pub static ref PRIMITIVE_LOOKUP: HashMap<&'static str, TypeDesc> = {
        let mut map = HashMap::new();
        map.insert("void", TypeDesc::Void);
        map.insert("bool", TypeDesc::Bool);
        map.insert("int", TypeDesc::Int);
        map.insert("dec", TypeDesc::Dec);
        map.insert("str", TypeDesc::Str);
        map.insert("any", TypeDesc::Any);
        map
    };
}

/// A type descriptor.
///
/// Descriptors are plain values: `clone()` is deep, so a descriptor taken
/// out of a registry can always be handed out as a fresh result type and
/// reshaped by the caller without affecting the registered one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeDesc {
    Void,
    Bool,
    Int,
    Dec,
    Str,
    Any,
    Vector(Box<TypeDesc>),
    Map(Box<TypeDesc>),
    Tuple(Vec<TypeDesc>),
    Struct {
        fields: Vec<TypeDesc>,
        index: HashMap<String, usize>,
    },
    Function {
        params: Vec<TypeDesc>,
        ret: Box<TypeDesc>,
    },
    Alias {
        name: String,
        underlying: Box<TypeDesc>,
    },
    /// Marks a trailing expandable vector argument or parameter.
    Variadic(Box<TypeDesc>),
}

impl TypeDesc {
    /// Builds a struct descriptor from named fields, filling the
    /// name-to-index map in declaration order.
    pub fn new_struct(named_fields: Vec<(String, TypeDesc)>) -> TypeDesc {
        let mut fields = vec![];
        let mut index = HashMap::new();
        for (position, (name, ty)) in named_fields.into_iter().enumerate() {
            index.insert(name, position);
            fields.push(ty);
        }
        TypeDesc::Struct { fields, index }
    }

    pub fn element_type(&self) -> Option<&TypeDesc> {
        match self {
            TypeDesc::Vector(elem) | TypeDesc::Map(elem) | TypeDesc::Variadic(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn fields(&self) -> Option<&[TypeDesc]> {
        match self {
            TypeDesc::Tuple(fields) => Some(fields),
            TypeDesc::Struct { fields, .. } => Some(fields),
            _ => None,
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        match self {
            TypeDesc::Struct { index, .. } => index.get(name).copied(),
            _ => None,
        }
    }

    /// Follows alias indirection down to the underlying descriptor.
    pub fn unalias(&self) -> &TypeDesc {
        let mut current = self;
        while let TypeDesc::Alias { underlying, .. } = current {
            current = underlying;
        }
        current
    }

    /// Exact structural equality: same variant, equal elements and fields,
    /// position for position. This is what overload matching uses; there is
    /// no widening here, not even to `any`.
    pub fn exact_equal(&self, other: &TypeDesc) -> bool {
        match (self, other) {
            (TypeDesc::Void, TypeDesc::Void)
            | (TypeDesc::Bool, TypeDesc::Bool)
            | (TypeDesc::Int, TypeDesc::Int)
            | (TypeDesc::Dec, TypeDesc::Dec)
            | (TypeDesc::Str, TypeDesc::Str)
            | (TypeDesc::Any, TypeDesc::Any) => true,
            (TypeDesc::Vector(a), TypeDesc::Vector(b)) => a.exact_equal(b),
            (TypeDesc::Map(a), TypeDesc::Map(b)) => a.exact_equal(b),
            (TypeDesc::Variadic(a), TypeDesc::Variadic(b)) => a.exact_equal(b),
            (TypeDesc::Tuple(a), TypeDesc::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.exact_equal(y))
            }
            (
                TypeDesc::Struct {
                    fields: af,
                    index: ai,
                },
                TypeDesc::Struct {
                    fields: bf,
                    index: bi,
                },
            ) => {
                af.len() == bf.len()
                    && ai == bi
                    && af.iter().zip(bf.iter()).all(|(x, y)| x.exact_equal(y))
            }
            (
                TypeDesc::Function {
                    params: ap,
                    ret: ar,
                },
                TypeDesc::Function {
                    params: bp,
                    ret: br,
                },
            ) => {
                ap.len() == bp.len()
                    && ap.iter().zip(bp.iter()).all(|(x, y)| x.exact_equal(y))
                    && ar.exact_equal(br)
            }
            (
                TypeDesc::Alias {
                    name: an,
                    underlying: au,
                },
                TypeDesc::Alias {
                    name: bn,
                    underlying: bu,
                },
            ) => an == bn && au.exact_equal(bu),
            _ => false,
        }
    }

    /// Compatibility, with `self` as the destination. Strictly weaker than
    /// `exact_equal`: everything fits into `any`, aliases are looked
    /// through, and containers recurse on their element and field types.
    /// This is what casts and assignment checks use.
    pub fn compatible(&self, source: &TypeDesc) -> bool {
        if self.exact_equal(source) {
            return true;
        }
        let dst = self.unalias();
        let src = source.unalias();
        if let TypeDesc::Any = dst {
            return true;
        }
        match (dst, src) {
            (TypeDesc::Vector(a), TypeDesc::Vector(b)) => a.compatible(b),
            (TypeDesc::Map(a), TypeDesc::Map(b)) => a.compatible(b),
            (TypeDesc::Variadic(a), TypeDesc::Variadic(b)) => a.compatible(b),
            (TypeDesc::Tuple(a), TypeDesc::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.compatible(y))
            }
            (
                TypeDesc::Struct {
                    fields: af,
                    index: ai,
                },
                TypeDesc::Struct {
                    fields: bf,
                    index: bi,
                },
            ) => {
                af.len() == bf.len()
                    && ai == bi
                    && af.iter().zip(bf.iter()).all(|(x, y)| x.compatible(y))
            }
            (
                TypeDesc::Function {
                    params: ap,
                    ret: ar,
                },
                TypeDesc::Function {
                    params: bp,
                    ret: br,
                },
            ) => {
                ap.len() == bp.len()
                    && ap.iter().zip(bp.iter()).all(|(x, y)| x.compatible(y))
                    && ar.compatible(br)
            }
            _ => {
                // Exact equality already failed and aliases are stripped,
                // so different variants never fit.
                false
            }
        }
    }
}

impl Display for TypeDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeDesc::Void => write!(f, "void"),
            TypeDesc::Bool => write!(f, "bool"),
            TypeDesc::Int => write!(f, "int"),
            TypeDesc::Dec => write!(f, "dec"),
            TypeDesc::Str => write!(f, "str"),
            TypeDesc::Any => write!(f, "any"),
            TypeDesc::Vector(elem) => write!(f, "vec[{}]", elem),
            TypeDesc::Map(elem) => write!(f, "map[{}]", elem),
            TypeDesc::Variadic(elem) => write!(f, "{}...", elem),
            TypeDesc::Tuple(fields) => {
                let rendered = fields
                    .iter()
                    .map(|field| field.to_string())
                    .collect::<Vec<String>>()
                    .join(", ");
                write!(f, "{{{}}}", rendered)
            }
            TypeDesc::Struct { fields, index } => {
                let mut names = vec![String::new(); fields.len()];
                for (name, position) in index.iter() {
                    names[*position] = name.clone();
                }
                let rendered = names
                    .iter()
                    .zip(fields.iter())
                    .map(|(name, field)| format!("{}: {}", name, field))
                    .collect::<Vec<String>>()
                    .join(", ");
                write!(f, "struct{{{}}}", rendered)
            }
            TypeDesc::Function { params, ret } => {
                let rendered = params
                    .iter()
                    .map(|param| param.to_string())
                    .collect::<Vec<String>>()
                    .join(", ");
                write!(f, "fn({}) -> {}", rendered, ret)
            }
            TypeDesc::Alias { name, .. } => write!(f, "{}", name),
        }
    }
}

/// Renders an argument type list for error messages.
pub fn display_types(types: &[TypeDesc]) -> String {
    types
        .iter()
        .map(|ty| ty.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}
