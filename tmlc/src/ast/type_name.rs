//! The parser's surface-syntax notion of a type, as written by the user —
//! distinct from `crate::types::Type`, the checker's resolved semantic type.

use crate::source::SourceSpan;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TypeName {
    /// `Name[arg1, arg2]` with an optional module path (`std.io.Reader`).
    Named {
        path: Vec<String>,
        name: String,
        type_args: Vec<TypeName>,
        position: SourceSpan,
    },
    Reference {
        mutable: bool,
        inner: Box<TypeName>,
        position: SourceSpan,
    },
    RawPointer {
        mutable: bool,
        inner: Box<TypeName>,
        position: SourceSpan,
    },
    Array {
        inner: Box<TypeName>,
        size: u64,
        position: SourceSpan,
    },
    Slice {
        inner: Box<TypeName>,
        position: SourceSpan,
    },
    Tuple {
        elements: Vec<TypeName>,
        position: SourceSpan,
    },
    Function {
        params: Vec<TypeName>,
        ret: Box<TypeName>,
        position: SourceSpan,
    },
    Dyn {
        behavior: Box<TypeName>,
        position: SourceSpan,
    },
    ImplBehavior {
        behavior: Box<TypeName>,
        position: SourceSpan,
    },
}

impl TypeName {
    pub fn position(&self) -> SourceSpan {
        match self {
            TypeName::Named { position, .. }
            | TypeName::Reference { position, .. }
            | TypeName::RawPointer { position, .. }
            | TypeName::Array { position, .. }
            | TypeName::Slice { position, .. }
            | TypeName::Tuple { position, .. }
            | TypeName::Function { position, .. }
            | TypeName::Dyn { position, .. }
            | TypeName::ImplBehavior { position, .. } => *position,
        }
    }

    /// Convenience constructor for a plain `Name` with no path or args,
    /// used for synthesized nodes (desugared `for` loops, default `this`).
    pub fn simple(name: impl Into<String>, position: SourceSpan) -> Self {
        TypeName::Named {
            path: Vec::new(),
            name: name.into(),
            type_args: Vec::new(),
            position,
        }
    }
}

/// A `T: Behavior[Args], Other` bound list attached to a generic parameter.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GenericParam {
    pub name: String,
    pub bounds: Vec<TypeName>,
    pub position: SourceSpan,
}

/// A `where T: Behavior` clause entry, syntactically identical to a bound
/// but written separately from the generic parameter list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WhereClauseItem {
    pub subject: TypeName,
    pub bounds: Vec<TypeName>,
    pub position: SourceSpan,
}
