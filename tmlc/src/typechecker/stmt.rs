use crate::ast::{ExpressionStatement, LetStatement, Statement, VarStatement};
use crate::types::Type;

use super::context::Context;
use super::expr::{check_assignable, infer_expr};
use super::pattern::check_pattern;
use super::resolve::resolve_type_name;

/// Checks one statement inside a block, binding any names it introduces
/// into the surrounding scope (the caller owns the scope push/pop; a
/// statement never opens its own).
pub fn check_statement(ctx: &mut Context, stmt: Statement<()>) -> Statement<Type> {
    match stmt {
        Statement::Let(s) => Statement::Let(check_let(ctx, s)),
        Statement::Var(s) => Statement::Var(check_var(ctx, s)),
        Statement::Expression(s) => Statement::Expression(ExpressionStatement {
            expression: infer_expr(ctx, s.expression),
            info: Type::Unit,
            position: s.position,
        }),
        Statement::Declaration(d) => {
            let checked = super::decl::check_declaration(ctx, *d);
            Statement::Declaration(Box::new(checked))
        }
    }
}

fn check_let(ctx: &mut Context, s: LetStatement<()>) -> LetStatement<Type> {
    let value = infer_expr(ctx, s.value);
    let declared = s.type_annotation.as_ref().map(|t| resolve_type_name(ctx, t));
    let value_ty = value.get_info();
    if let Some(declared) = &declared {
        check_assignable(ctx, declared, &value_ty, value.position());
    }
    let binding_ty = declared.unwrap_or(value_ty);
    let pattern = check_pattern(ctx, s.pattern, &binding_ty);
    LetStatement {
        pattern,
        type_annotation: s.type_annotation,
        value,
        info: binding_ty,
        position: s.position,
    }
}

fn check_var(ctx: &mut Context, s: VarStatement<()>) -> VarStatement<Type> {
    let value = infer_expr(ctx, s.value);
    let declared = s.type_annotation.as_ref().map(|t| resolve_type_name(ctx, t));
    let value_ty = value.get_info();
    if let Some(declared) = &declared {
        check_assignable(ctx, declared, &value_ty, value.position());
    }
    let binding_ty = declared.unwrap_or(value_ty);
    let pattern = check_pattern(ctx, s.pattern, &binding_ty);
    VarStatement {
        pattern,
        type_annotation: s.type_annotation,
        value,
        info: binding_ty,
        position: s.position,
    }
}
