//! The parsed AST: four node hierarchies (expression, statement,
//! declaration, pattern), each generic over an `info: T` payload that is
//! `()` fresh from the parser and a resolved semantic type after checking.
//!
//! Every node owns its children and carries a [`crate::source::SourceSpan`].
//! The tree has no cycles; recursive types are expressed by name and
//! resolved at lookup time (see `crate::typechecker`).

mod declaration;
mod expression;
mod pattern;
mod statement;
mod type_name;

pub use declaration::*;
pub use expression::*;
pub use pattern::*;
pub use statement::*;
pub use type_name::*;
