//! The semantic checker: resolves names and types, verifies class/behavior
//! rules, and produces a fully-typed AST plus the symbol table the
//! monomorphizer and IR emitter both consume.

mod borrow;
mod context;
mod decl;
mod error;
mod expr;
mod pattern;
mod resolve;
mod stmt;

pub use context::Context;
pub use error::code;
pub use resolve::{compatible, resolve_type_name, resolve_type_name_shallow};

use crate::ast::Module;
use crate::diagnostics::{Diagnostic, DiagnosticBag};
use crate::types::{Type, TypeEnv};

/// A checked compilation unit: the fully-typed module (`None` if checking
/// never got far enough to produce one — e.g. the module itself couldn't be
/// registered), the accumulated symbol table, and every diagnostic raised.
pub struct CheckedModule {
    pub module: Option<Module<Type>>,
    pub env: TypeEnv,
    pub diagnostics: DiagnosticBag,
}

impl CheckedModule {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

pub struct TypeChecker;

impl TypeChecker {
    /// Runs the full pipeline for one module: shallow registration, deep
    /// per-declaration checking, `main`-signature validation, then the
    /// move checker. Registration and deep-check diagnostics both
    /// accumulate (per-phase errors don't stop the rest of that phase),
    /// but a later phase still runs even if an earlier one produced
    /// errors — only an invariant violation would justify a true
    /// short-circuit, and none of these phases can produce one.
    pub fn check_module(module: Module<()>) -> CheckedModule {
        let mut env = TypeEnv::new();
        let mut diagnostics = DiagnosticBag::default();

        crate::registry::register_module(&module, &mut env, &mut diagnostics);

        let mut ctx = Context::new(env);
        ctx.diagnostics.extend(diagnostics);
        let checked = decl::check_module(&mut ctx, module);
        check_main_function(&checked, &mut ctx.diagnostics);
        borrow::check_module(&checked, &mut ctx.diagnostics);

        CheckedModule {
            module: Some(checked),
            env: ctx.env,
            diagnostics: ctx.diagnostics,
        }
    }
}

/// Validates that, if `main` is declared at the module's top level, it
/// takes no parameters and returns `Unit` or an integer — the two shapes
/// a process entry point may have per the driver's literal scenario 1.
fn check_main_function(module: &Module<Type>, diagnostics: &mut DiagnosticBag) {
    let Some(main) = module.declarations.iter().find_map(|d| match d {
        crate::ast::Declaration::Function(f) if f.name == "main" => Some(f),
        _ => None,
    }) else {
        return;
    };
    if !main.params.is_empty() {
        diagnostics.push(Diagnostic::ty(
            code::BAD_MAIN_SIGNATURE,
            "`main` must take no parameters",
            main.position,
        ));
    }
    if !matches!(main.info, Type::Unit | Type::Int { .. }) {
        diagnostics.push(Diagnostic::ty(
            code::BAD_MAIN_SIGNATURE,
            "`main` must return `Unit` or an integer type",
            main.position,
        ));
    }
}
