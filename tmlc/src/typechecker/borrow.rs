//! A pragmatic move checker. Full non-lexical-lifetime borrow checking is
//! out of scope for this pass — we track, per function body, which local
//! bindings of a non-`Copy` type have been moved out of, and flag a second
//! use. Two further failure modes get a best-effort, structural check
//! rather than real dataflow: two conflicting `&mut` borrows of the same
//! binding reaching a single call, and a reference to a function-local
//! `let`/`var` handed back out of the function that declared it. Reference
//! counting and true scope-exit tracking are not modeled.

use std::collections::HashSet;

use crate::ast::{Declaration, Expression, Module, Statement};
use crate::diagnostics::{Diagnostic, DiagnosticBag};
use crate::source::SourceSpan;
use crate::types::Type;

use super::error::code;

struct MoveState {
    moved: HashSet<String>,
    /// Names bound by a `let`/`var` anywhere in the current function body —
    /// a reference to one of these escaping via `return` or the body's tail
    /// expression outlives the storage it points at.
    locals: HashSet<String>,
}

pub fn check_module(module: &Module<Type>, diagnostics: &mut DiagnosticBag) {
    for decl in &module.declarations {
        check_declaration(decl, diagnostics);
    }
}

fn check_function_body(body: &crate::ast::Block<Type>, diagnostics: &mut DiagnosticBag) {
    let mut state = MoveState { moved: HashSet::new(), locals: HashSet::new() };
    check_block(body, &mut state, diagnostics);
    if let Some(trailing) = &body.trailing {
        if let Some((name, span)) = local_ref_escape(trailing, &state) {
            diagnostics.push(out_of_scope_borrow(&name, span));
        }
    }
}

fn check_declaration(decl: &Declaration<Type>, diagnostics: &mut DiagnosticBag) {
    match decl {
        Declaration::Function(f) => {
            if let Some(body) = &f.body {
                check_function_body(body, diagnostics);
            }
        }
        Declaration::Class(c) => {
            for member in &c.members {
                if let crate::ast::ClassMember::Method(m) = member {
                    if let Some(body) = &m.body {
                        check_function_body(body, diagnostics);
                    }
                }
            }
        }
        Declaration::Impl(i) => {
            for item in &i.items {
                if let crate::ast::ImplItem::Method(m) = item {
                    if let Some(body) = &m.body {
                        check_function_body(body, diagnostics);
                    }
                }
            }
        }
        Declaration::Module(m) => {
            if let Some(body) = &m.body {
                for d in body {
                    check_declaration(d, diagnostics);
                }
            }
        }
        Declaration::Namespace(n) => {
            for d in &n.body {
                check_declaration(d, diagnostics);
            }
        }
        _ => {}
    }
}

fn out_of_scope_borrow(name: &str, span: SourceSpan) -> Diagnostic {
    Diagnostic::borrow(
        code::OUT_OF_SCOPE_BORROW,
        format!("borrow of local `{name}` does not live long enough to be returned"),
        span,
    )
}

/// Whether `expr` (after unwrapping parens) is `&local`/`&mut local` for a
/// `local` declared by a `let`/`var` in this function body.
fn local_ref_escape(expr: &Expression<Type>, state: &MoveState) -> Option<(String, SourceSpan)> {
    let Expression::Unary(u) = expr.unwrap_parens() else { return None };
    if !matches!(u.operator, crate::ast::UnaryOperator::Ref | crate::ast::UnaryOperator::RefMut) {
        return None;
    }
    let Expression::Identifier { name, position, .. } = u.operand.unwrap_parens() else { return None };
    state.locals.contains(name).then(|| (name.clone(), *position))
}

/// Flags two `&mut`-of-the-same-name arguments (or a `&mut` alongside a
/// plain `&`) reaching one call — the caller would otherwise end up with two
/// live references to the same binding, one of them mutable.
fn check_arg_aliasing(args: &[Expression<Type>], diagnostics: &mut DiagnosticBag) {
    let mut seen: Vec<(String, bool)> = Vec::new();
    for a in args {
        let Expression::Unary(u) = a.unwrap_parens() else { continue };
        let mutable = matches!(u.operator, crate::ast::UnaryOperator::RefMut);
        if !matches!(u.operator, crate::ast::UnaryOperator::Ref | crate::ast::UnaryOperator::RefMut) {
            continue;
        }
        let Expression::Identifier { name, position, .. } = u.operand.unwrap_parens() else { continue };
        if let Some((_, prev_mutable)) = seen.iter().find(|(n, _)| n == name) {
            if *prev_mutable || mutable {
                diagnostics.push(Diagnostic::borrow(
                    code::MUTABLE_ALIAS,
                    format!("cannot borrow `{name}` as mutable more than once in the same call"),
                    *position,
                ));
            }
        } else {
            seen.push((name.clone(), mutable));
        }
    }
}

fn is_movable(ty: &Type) -> bool {
    !matches!(
        ty,
        Type::Int { .. }
            | Type::Float(_)
            | Type::Bool
            | Type::Char
            | Type::Unit
            | Type::Reference { .. }
            | Type::RawPointer { .. }
            | Type::Function { .. }
            | Type::Unknown
    )
}

fn check_block(block: &crate::ast::Block<Type>, state: &mut MoveState, diagnostics: &mut DiagnosticBag) {
    for stmt in &block.statements {
        check_statement(stmt, state, diagnostics);
    }
    if let Some(trailing) = &block.trailing {
        check_expr(trailing, state, diagnostics);
    }
}

fn check_statement(stmt: &Statement<Type>, state: &mut MoveState, diagnostics: &mut DiagnosticBag) {
    match stmt {
        Statement::Let(s) => {
            check_expr(&s.value, state, diagnostics);
            state.locals.extend(s.pattern.bound_names().into_iter().map(String::from));
        }
        Statement::Var(s) => {
            check_expr(&s.value, state, diagnostics);
            state.locals.extend(s.pattern.bound_names().into_iter().map(String::from));
        }
        Statement::Expression(s) => check_expr(&s.expression, state, diagnostics),
        Statement::Declaration(_) => {}
    }
}

/// Walks an expression looking for a bare-identifier use of a moved, non-
/// reference binding, and records new moves (a non-`&`/`&mut` identifier
/// passed by value into a call is consumed). Every other expression shape
/// just recurses into its sub-expressions.
fn check_expr(expr: &Expression<Type>, state: &mut MoveState, diagnostics: &mut DiagnosticBag) {
    match expr {
        Expression::Identifier { name, info, position } => {
            if is_movable(info) {
                if state.moved.contains(name) {
                    diagnostics.push(Diagnostic::borrow(
                        code::USE_AFTER_MOVE,
                        format!("use of moved value `{name}`"),
                        *position,
                    ));
                } else {
                    state.moved.insert(name.clone());
                }
            }
        }
        Expression::Literal { .. } | Expression::Path { .. } | Expression::Continue { .. } | Expression::BaseAccess { .. } => {}
        Expression::Binary(b) => {
            check_expr(&b.left, state, diagnostics);
            check_expr(&b.right, state, diagnostics);
        }
        Expression::Unary(u) => {
            if matches!(u.operator, crate::ast::UnaryOperator::Ref | crate::ast::UnaryOperator::RefMut) {
                // Borrowing, not moving: skip the move-tracking identifier check.
                if let Expression::Identifier { .. } = u.operand.unwrap_parens() {
                    return;
                }
            }
            check_expr(&u.operand, state, diagnostics);
        }
        Expression::Assign(a) => {
            check_expr(&a.target, state, diagnostics);
            check_expr(&a.value, state, diagnostics);
            if let Expression::Identifier { name, .. } = a.target.unwrap_parens() {
                state.moved.remove(name);
            }
        }
        Expression::Call(c) => {
            check_expr(&c.callee, state, diagnostics);
            check_arg_aliasing(&c.args, diagnostics);
            for a in &c.args {
                check_expr(a, state, diagnostics);
            }
        }
        Expression::MethodCall(m) => {
            check_expr(&m.receiver, state, diagnostics);
            check_arg_aliasing(&m.args, diagnostics);
            for a in &m.args {
                check_expr(a, state, diagnostics);
            }
        }
        Expression::FieldAccess(f) => check_expr(&f.base, state, diagnostics),
        Expression::Index(i) => {
            check_expr(&i.base, state, diagnostics);
            check_expr(&i.index, state, diagnostics);
        }
        Expression::Tuple { elements, .. } | Expression::ArrayLiteral { elements, .. } => {
            for e in elements {
                check_expr(e, state, diagnostics);
            }
        }
        Expression::Block(b) => check_block(b, state, diagnostics),
        Expression::If(i) => {
            check_expr(&i.condition, state, diagnostics);
            check_block(&i.then_branch, state, diagnostics);
            if let Some(e) = &i.else_branch {
                check_expr(e, state, diagnostics);
            }
        }
        Expression::IfLet(i) => {
            check_expr(&i.scrutinee, state, diagnostics);
            check_block(&i.then_branch, state, diagnostics);
            if let Some(e) = &i.else_branch {
                check_expr(e, state, diagnostics);
            }
        }
        Expression::When(w) => {
            check_expr(&w.scrutinee, state, diagnostics);
            for arm in &w.arms {
                if let Some(g) = &arm.guard {
                    check_expr(g, state, diagnostics);
                }
                check_expr(&arm.body, state, diagnostics);
            }
        }
        Expression::Loop(l) => check_block(&l.body, state, diagnostics),
        Expression::While(w) => {
            check_expr(&w.condition, state, diagnostics);
            check_block(&w.body, state, diagnostics);
        }
        Expression::For(f) => {
            check_expr(&f.iterable, state, diagnostics);
            check_block(&f.body, state, diagnostics);
        }
        Expression::Return(r) => {
            if let Some(v) = &r.value {
                if let Some((name, span)) = local_ref_escape(v, state) {
                    diagnostics.push(out_of_scope_borrow(&name, span));
                }
                check_expr(v, state, diagnostics);
            }
        }
        Expression::Throw(t) => check_expr(&t.value, state, diagnostics),
        Expression::Break(b) => {
            if let Some(v) = &b.value {
                check_expr(v, state, diagnostics);
            }
        }
        Expression::Closure(c) => check_expr(&c.body, state, diagnostics),
        Expression::StructLiteral(s) => {
            for (_, v) in &s.fields {
                check_expr(v, state, diagnostics);
            }
            if let Some(sp) = &s.spread {
                check_expr(sp, state, diagnostics);
            }
        }
        Expression::LowLevelBlock(_) => {}
        Expression::InterpolatedString { fragments, .. } | Expression::TemplateLiteral { fragments, .. } => {
            for f in fragments {
                if let crate::ast::InterpolationFragment::Expr(e) = f {
                    check_expr(e, state, diagnostics);
                }
            }
        }
        Expression::Cast(c) => check_expr(&c.expr, state, diagnostics),
        Expression::Try(inner) | Expression::Await(inner) | Expression::Parens(inner) => {
            check_expr(inner, state, diagnostics)
        }
        Expression::Range(r) => {
            if let Some(s) = &r.start {
                check_expr(s, state, diagnostics);
            }
            if let Some(e) = &r.end {
                check_expr(e, state, diagnostics);
            }
        }
    }
}
