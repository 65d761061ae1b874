//! Diagnostic codes for the `Type` kind, and small constructors so call
//! sites don't repeat `Diagnostic::ty("E_...", ...)` boilerplate everywhere.

use crate::diagnostics::Diagnostic;
use crate::source::SourceSpan;
use crate::types::Type;

pub mod code {
    pub const UNKNOWN_IDENT: &str = "E_UNKNOWN_IDENT";
    pub const UNKNOWN_TYPE: &str = "E_UNKNOWN_TYPE";
    pub const UNKNOWN_FIELD: &str = "E_UNKNOWN_FIELD";
    pub const UNKNOWN_METHOD: &str = "E_UNKNOWN_METHOD";
    pub const UNKNOWN_VARIANT: &str = "E_UNKNOWN_VARIANT";
    pub const TYPE_MISMATCH: &str = "E_TYPE_MISMATCH";
    pub const ARITY_MISMATCH: &str = "E_ARITY_MISMATCH";
    pub const NOT_CALLABLE: &str = "E_NOT_CALLABLE";
    pub const NOT_INDEXABLE: &str = "E_NOT_INDEXABLE";
    pub const MISSING_BOUND: &str = "E_MISSING_BOUND";
    pub const CYCLIC_CLASS: &str = "E_CYCLIC_CLASS";
    pub const BAD_OVERRIDE: &str = "E_BAD_OVERRIDE";
    pub const ABSTRACT_SEALED: &str = "E_ABSTRACT_SEALED";
    pub const INCOMPLETE_IMPL: &str = "E_INCOMPLETE_IMPL";
    pub const MISSING_MAIN: &str = "E_MISSING_MAIN";
    pub const BAD_MAIN_SIGNATURE: &str = "E_BAD_MAIN_SIGNATURE";
    pub const DUPLICATE_FIELD: &str = "E_DUPLICATE_FIELD";
    pub const MISSING_FIELD: &str = "E_MISSING_FIELD";
    pub const INVALID_LVALUE: &str = "E_INVALID_LVALUE";
    pub const BAD_LABEL: &str = "E_BAD_LABEL";
    pub const BREAK_OUTSIDE_LOOP: &str = "E_BREAK_OUTSIDE_LOOP";
    pub const RETURN_OUTSIDE_FN: &str = "E_RETURN_OUTSIDE_FN";
    pub const DIV_BY_ZERO: &str = "E_CONST_DIV_BY_ZERO";
    pub const NON_CONST_INITIALIZER: &str = "E_NON_CONST_INITIALIZER";
    pub const USE_AFTER_MOVE: &str = "E_USE_AFTER_MOVE";
    pub const MUTABLE_ALIAS: &str = "E_MUTABLE_ALIAS";
    pub const OUT_OF_SCOPE_BORROW: &str = "E_OUT_OF_SCOPE_BORROW";
}

pub fn mismatch(expected: &Type, found: &Type, span: SourceSpan) -> Diagnostic {
    Diagnostic::ty(
        code::TYPE_MISMATCH,
        format!("expected `{expected}`, found `{found}`"),
        span,
    )
}

pub fn unknown_ident(name: &str, span: SourceSpan) -> Diagnostic {
    Diagnostic::ty(
        code::UNKNOWN_IDENT,
        format!("cannot find `{name}` in this scope"),
        span,
    )
}

pub fn unknown_type(name: &str, span: SourceSpan) -> Diagnostic {
    Diagnostic::ty(code::UNKNOWN_TYPE, format!("unknown type `{name}`"), span)
}

pub fn arity_mismatch(expected: usize, found: usize, span: SourceSpan) -> Diagnostic {
    Diagnostic::ty(
        code::ARITY_MISMATCH,
        format!("expected {expected} argument(s), found {found}"),
        span,
    )
}
