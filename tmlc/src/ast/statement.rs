use crate::source::SourceSpan;

use super::{Declaration, Expression, Pattern, TypeName};

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct LetStatement<T> {
    pub pattern: Pattern<T>,
    pub type_annotation: Option<TypeName>,
    pub value: Expression<T>,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct VarStatement<T> {
    pub pattern: Pattern<T>,
    pub type_annotation: Option<TypeName>,
    pub value: Expression<T>,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct ExpressionStatement<T> {
    pub expression: Expression<T>,
    pub info: T,
    pub position: SourceSpan,
}

/// A statement inside a [`super::Block`]. Let/var bind a name in the
/// enclosing block's scope; a trailing, semicolon-less expression is
/// represented on `Block` directly rather than as a statement variant
/// (unlike a hand-rolled two-case `Expression`/`YieldingExpression` split).
#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub enum Statement<T> {
    Let(LetStatement<T>),
    Var(VarStatement<T>),
    Expression(ExpressionStatement<T>),
    Declaration(Box<Declaration<T>>),
}

impl<T> Statement<T>
where
    T: Clone,
{
    pub fn position(&self) -> SourceSpan {
        match self {
            Statement::Let(s) => s.position,
            Statement::Var(s) => s.position,
            Statement::Expression(s) => s.position,
            Statement::Declaration(d) => d.position(),
        }
    }
}
