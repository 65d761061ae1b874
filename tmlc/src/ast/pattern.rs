use crate::source::SourceSpan;

use super::TypeName;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum LiteralPattern {
    Int { value: u128, negative: bool },
    Float(f64),
    Str(String),
    Char(char),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub enum EnumPatternElements<T> {
    Unit,
    Tuple(Vec<Pattern<T>>),
    Struct {
        fields: Vec<(String, Pattern<T>)>,
        has_rest: bool,
    },
}

/// A single match pattern. `T` carries the binder's resolved type once the
/// checker has run; `()` before that.
#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub enum Pattern<T> {
    Identifier {
        name: String,
        mutable: bool,
        info: T,
        position: SourceSpan,
    },
    Wildcard {
        info: T,
        position: SourceSpan,
    },
    Literal {
        value: LiteralPattern,
        info: T,
        position: SourceSpan,
    },
    Tuple {
        elements: Vec<Pattern<T>>,
        info: T,
        position: SourceSpan,
    },
    Array {
        elements: Vec<Pattern<T>>,
        rest: Option<Option<String>>,
        info: T,
        position: SourceSpan,
    },
    Struct {
        path: Vec<String>,
        name: String,
        type_args: Vec<TypeName>,
        fields: Vec<(String, Pattern<T>)>,
        has_rest: bool,
        info: T,
        position: SourceSpan,
    },
    EnumVariant {
        path: Vec<String>,
        enum_name: Option<String>,
        variant: String,
        elements: EnumPatternElements<T>,
        info: T,
        position: SourceSpan,
    },
    Or {
        alternatives: Vec<Pattern<T>>,
        info: T,
        position: SourceSpan,
    },
}

impl<T> Pattern<T>
where
    T: Clone,
{
    pub fn get_info(&self) -> T {
        match self {
            Pattern::Identifier { info, .. }
            | Pattern::Wildcard { info, .. }
            | Pattern::Literal { info, .. }
            | Pattern::Tuple { info, .. }
            | Pattern::Array { info, .. }
            | Pattern::Struct { info, .. }
            | Pattern::EnumVariant { info, .. }
            | Pattern::Or { info, .. } => info.clone(),
        }
    }

    pub fn position(&self) -> SourceSpan {
        match self {
            Pattern::Identifier { position, .. }
            | Pattern::Wildcard { position, .. }
            | Pattern::Literal { position, .. }
            | Pattern::Tuple { position, .. }
            | Pattern::Array { position, .. }
            | Pattern::Struct { position, .. }
            | Pattern::EnumVariant { position, .. }
            | Pattern::Or { position, .. } => *position,
        }
    }

    /// Every identifier bound by this pattern, in left-to-right order —
    /// used by the checker to populate a `when` arm's local scope.
    pub fn bound_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_bound_names(&mut names);
        names
    }

    fn collect_bound_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Pattern::Identifier { name, .. } => out.push(name),
            Pattern::Wildcard { .. } | Pattern::Literal { .. } => {}
            Pattern::Tuple { elements, .. } | Pattern::Array { elements, .. } => {
                for e in elements {
                    e.collect_bound_names(out);
                }
            }
            Pattern::Struct { fields, .. } => {
                for (_, p) in fields {
                    p.collect_bound_names(out);
                }
            }
            Pattern::EnumVariant { elements, .. } => match elements {
                EnumPatternElements::Unit => {}
                EnumPatternElements::Tuple(elems) => {
                    for e in elems {
                        e.collect_bound_names(out);
                    }
                }
                EnumPatternElements::Struct { fields, .. } => {
                    for (_, p) in fields {
                        p.collect_bound_names(out);
                    }
                }
            },
            Pattern::Or { alternatives, .. } => {
                if let Some(first) = alternatives.first() {
                    first.collect_bound_names(out);
                }
            }
        }
    }
}
