//! Expression inference. `infer_expr` consumes an untyped `Expression<()>`
//! and produces an `Expression<Type>` with every node's `info` set to its
//! resolved semantic type; callers read that back out via `.get_info()`.

use crate::ast::{
    AssignExpr, BinaryExpr, BinaryOperator, Block, CallExpr, CastExpr, Expression, FieldAccessExpr,
    IndexExpr, InterpolationFragment, LiteralValue, MethodCallExpr, RangeExpr, Statement,
    StructLiteralExpr, UnaryExpr, UnaryOperator, WhenArm,
};
use crate::diagnostics::Diagnostic;
use crate::types::{FloatWidth, IntWidth, Substitution, Type};

use super::context::Context;
use super::error::{arity_mismatch, code, mismatch, unknown_ident};
use super::pattern::check_pattern;
use super::resolve::{compatible, resolve_type_name};
use super::stmt::check_statement;

pub fn infer_expr(ctx: &mut Context, expr: Expression<()>) -> Expression<Type> {
    match expr {
        Expression::Literal { value, position, .. } => {
            let ty = literal_type(&value);
            Expression::Literal { value, info: ty, position }
        }
        Expression::Identifier { name, position, .. } => {
            let ty = lookup_name(ctx, &name)
                .or_else(|| {
                    find_enum_variant(&ctx.env, &name).map(|(enum_name, variant)| {
                        let generics = ctx.env.enums.get(&enum_name).map(|e| e.generics.clone()).unwrap_or_default();
                        Type::Named {
                            path: vec![],
                            name: enum_name,
                            args: generics.into_iter().map(Type::Generic).collect(),
                        }
                    })
                })
                .unwrap_or_else(|| {
                    ctx.diagnostics.push(unknown_ident(&name, position));
                    Type::Unknown
                });
            Expression::Identifier { name, info: ty, position }
        }
        Expression::Path { segments, position, .. } => {
            let ty = segments
                .last()
                .and_then(|last| lookup_name(ctx, last))
                .unwrap_or(Type::Unknown);
            Expression::Path { segments, info: ty, position }
        }
        Expression::Binary(b) => Expression::Binary(Box::new(infer_binary(ctx, *b))),
        Expression::Unary(u) => Expression::Unary(Box::new(infer_unary(ctx, *u))),
        Expression::Assign(a) => Expression::Assign(Box::new(infer_assign(ctx, *a))),
        Expression::Call(c) => Expression::Call(Box::new(infer_call(ctx, *c))),
        Expression::MethodCall(m) => Expression::MethodCall(Box::new(infer_method_call(ctx, *m))),
        Expression::FieldAccess(f) => Expression::FieldAccess(Box::new(infer_field_access(ctx, *f))),
        Expression::Index(i) => Expression::Index(Box::new(infer_index(ctx, *i))),
        Expression::Tuple { elements, position, .. } => {
            let elements: Vec<_> = elements.into_iter().map(|e| infer_expr(ctx, e)).collect();
            let ty = Type::Tuple(elements.iter().map(|e| e.get_info()).collect());
            Expression::Tuple { elements, info: ty, position }
        }
        Expression::ArrayLiteral { elements, position, .. } => {
            let elements: Vec<_> = elements.into_iter().map(|e| infer_expr(ctx, e)).collect();
            let element_ty = elements.first().map(|e| e.get_info()).unwrap_or(Type::Unknown);
            let ty = Type::Array {
                element: element_ty.into(),
                size: elements.len() as u64,
            };
            Expression::ArrayLiteral { elements, info: ty, position }
        }
        Expression::Block(b) => {
            let (block, ty) = infer_block(ctx, *b);
            let _ = ty;
            Expression::Block(Box::new(block))
        }
        Expression::If(i) => {
            let i = *i;
            ctx.push_scope();
            let condition = infer_expr(ctx, i.condition);
            check_assignable(ctx, &Type::Bool, &condition.get_info(), condition.position());
            ctx.pop_scope();
            let (then_branch, then_ty) = infer_block(ctx, i.then_branch);
            let (else_branch, ty) = match i.else_branch {
                Some(e) => {
                    let e = infer_expr(ctx, e);
                    let ety = e.get_info();
                    if !compatible(&ctx.env, &then_ty, &ety) && !compatible(&ctx.env, &ety, &then_ty) {
                        ctx.diagnostics.push(mismatch(&then_ty, &ety, e.position()));
                    }
                    (Some(e), then_ty)
                }
                None => (None, Type::Unit),
            };
            Expression::If(Box::new(crate::ast::IfExpr {
                condition,
                then_branch,
                else_branch,
                info: ty,
                position: i.position,
            }))
        }
        Expression::IfLet(i) => {
            let i = *i;
            let scrutinee = infer_expr(ctx, i.scrutinee);
            ctx.push_scope();
            let scrutinee_ty = scrutinee.get_info();
            let pattern = check_pattern(ctx, i.pattern, &scrutinee_ty);
            let (then_branch, then_ty) = infer_block(ctx, i.then_branch);
            ctx.pop_scope();
            let (else_branch, ty) = match i.else_branch {
                Some(e) => {
                    let e = infer_expr(ctx, e);
                    (Some(e), then_ty)
                }
                None => (None, Type::Unit),
            };
            Expression::IfLet(Box::new(crate::ast::IfLetExpr {
                pattern,
                scrutinee,
                then_branch,
                else_branch,
                info: ty,
                position: i.position,
            }))
        }
        Expression::When(w) => {
            let w = *w;
            let scrutinee = infer_expr(ctx, w.scrutinee);
            let scrutinee_ty = scrutinee.get_info();
            let mut result_ty: Option<Type> = None;
            let arms = w
                .arms
                .into_iter()
                .map(|arm| {
                    ctx.push_scope();
                    let pattern = check_pattern(ctx, arm.pattern, &scrutinee_ty);
                    let guard = arm.guard.map(|g| infer_expr(ctx, g));
                    let body = infer_expr(ctx, arm.body);
                    ctx.pop_scope();
                    let body_ty = body.get_info();
                    result_ty = Some(result_ty.clone().unwrap_or_else(|| body_ty.clone()));
                    WhenArm {
                        pattern,
                        guard,
                        body,
                        info: body_ty,
                        position: arm.position,
                    }
                })
                .collect();
            Expression::When(Box::new(crate::ast::WhenExpr {
                scrutinee,
                arms,
                info: result_ty.unwrap_or(Type::Unit),
                position: w.position,
            }))
        }
        Expression::Loop(l) => {
            let l = *l;
            ctx.push_loop(l.label.clone());
            let (body, _) = infer_block(ctx, l.body);
            ctx.pop_loop();
            Expression::Loop(Box::new(crate::ast::LoopExpr {
                label: l.label,
                body,
                info: Type::Unit,
                position: l.position,
            }))
        }
        Expression::While(w) => {
            let w = *w;
            let condition = infer_expr(ctx, w.condition);
            check_assignable(ctx, &Type::Bool, &condition.get_info(), condition.position());
            ctx.push_loop(w.label.clone());
            let (body, _) = infer_block(ctx, w.body);
            ctx.pop_loop();
            Expression::While(Box::new(crate::ast::WhileExpr {
                label: w.label,
                condition,
                body,
                info: Type::Unit,
                position: w.position,
            }))
        }
        Expression::For(f) => {
            let f = *f;
            let iterable = infer_expr(ctx, f.iterable);
            let element_ty = match iterable.get_info() {
                Type::Array { element, .. } | Type::Slice { element } => (*element).clone(),
                Type::Named { name, args, .. } if name == "Range" => {
                    args.first().cloned().unwrap_or(Type::Unknown)
                }
                _ => Type::Unknown,
            };
            ctx.push_scope();
            let pattern = check_pattern(ctx, f.pattern, &element_ty);
            ctx.push_loop(f.label.clone());
            let (body, _) = infer_block(ctx, f.body);
            ctx.pop_loop();
            ctx.pop_scope();
            Expression::For(Box::new(crate::ast::ForExpr {
                label: f.label,
                pattern,
                iterable,
                body,
                info: Type::Unit,
                position: f.position,
            }))
        }
        Expression::Return(r) => {
            let r = *r;
            let value = r.value.map(|v| infer_expr(ctx, v));
            let found = value.as_ref().map(|v| v.get_info()).unwrap_or(Type::Unit);
            match ctx.current_return_type().cloned() {
                Some(expected) => check_assignable(ctx, &expected, &found, r.position),
                None => ctx.diagnostics.push(Diagnostic::ty(
                    code::RETURN_OUTSIDE_FN,
                    "`return` outside of a function body",
                    r.position,
                )),
            }
            Expression::Return(Box::new(crate::ast::ReturnExpr {
                value,
                info: Type::Never,
                position: r.position,
            }))
        }
        Expression::Throw(t) => {
            let t = *t;
            let value = infer_expr(ctx, t.value);
            Expression::Throw(Box::new(crate::ast::ThrowExpr {
                value,
                info: Type::Never,
                position: t.position,
            }))
        }
        Expression::Break(b) => {
            let b = *b;
            if let Some(label) = &b.label {
                if !ctx.label_in_scope(label) {
                    ctx.diagnostics.push(Diagnostic::ty(
                        code::BAD_LABEL,
                        format!("no loop labeled `{label}` in scope"),
                        b.position,
                    ));
                }
            } else if !ctx.in_loop() {
                ctx.diagnostics.push(Diagnostic::ty(
                    code::BREAK_OUTSIDE_LOOP,
                    "`break` outside of a loop",
                    b.position,
                ));
            }
            let value = b.value.map(|v| infer_expr(ctx, v));
            Expression::Break(Box::new(crate::ast::BreakExpr {
                label: b.label,
                value,
                info: Type::Never,
                position: b.position,
            }))
        }
        Expression::Continue { label, position, .. } => {
            if let Some(label) = &label {
                if !ctx.label_in_scope(label) {
                    ctx.diagnostics.push(Diagnostic::ty(
                        code::BAD_LABEL,
                        format!("no loop labeled `{label}` in scope"),
                        position,
                    ));
                }
            } else if !ctx.in_loop() {
                ctx.diagnostics.push(Diagnostic::ty(
                    code::BREAK_OUTSIDE_LOOP,
                    "`continue` outside of a loop",
                    position,
                ));
            }
            Expression::Continue { label, info: Type::Never, position }
        }
        Expression::Closure(c) => {
            let c = *c;
            ctx.push_scope();
            let params: Vec<_> = c
                .params
                .into_iter()
                .map(|p| {
                    let ty = p
                        .type_annotation
                        .as_ref()
                        .map(|t| resolve_type_name(ctx, t))
                        .unwrap_or(Type::Unknown);
                    ctx.bind(p.name.clone(), ty.clone());
                    crate::ast::ClosureParam {
                        name: p.name,
                        type_annotation: p.type_annotation,
                        info: ty,
                        position: p.position,
                    }
                })
                .collect();
            let body = infer_expr(ctx, c.body);
            ctx.pop_scope();
            let ret = body.get_info();
            let fn_ty = Type::Function {
                params: params.iter().map(|p| p.info.clone()).collect(),
                ret: ret.into(),
            };
            Expression::Closure(Box::new(crate::ast::ClosureExpr {
                params,
                return_type: c.return_type,
                body,
                is_move: c.is_move,
                info: fn_ty,
                position: c.position,
            }))
        }
        Expression::StructLiteral(s) => Expression::StructLiteral(Box::new(infer_struct_literal(ctx, *s))),
        Expression::LowLevelBlock(b) => {
            // Semantic checks are suspended inside a lowlevel block; we
            // still need an `Expression<Type>`, so every sub-node gets
            // `Unknown` without touching diagnostics.
            Expression::LowLevelBlock(Box::new(stamp_unknown_block(*b)))
        }
        Expression::BaseAccess { member, position, .. } => {
            let ty = ctx
                .current_self_type()
                .cloned()
                .and_then(|t| match t {
                    Type::Named { name, .. } => ctx.env.classes.get(&name).cloned(),
                    _ => None,
                })
                .and_then(|class| class.extends.clone())
                .and_then(|parent| ctx.env.classes.get(&parent).cloned())
                .and_then(|parent| parent.fields.iter().find(|f| f.name == member).map(|f| f.ty.clone()))
                .unwrap_or(Type::Unknown);
            Expression::BaseAccess { member, info: ty, position }
        }
        Expression::InterpolatedString { fragments, position, .. } => {
            let fragments = infer_fragments(ctx, fragments);
            Expression::InterpolatedString { fragments, info: Type::Str, position }
        }
        Expression::TemplateLiteral { fragments, position, .. } => {
            let fragments = infer_fragments(ctx, fragments);
            Expression::TemplateLiteral { fragments, info: Type::Str, position }
        }
        Expression::Cast(c) => Expression::Cast(Box::new(infer_cast(ctx, *c))),
        Expression::Try(inner) => {
            let inner = infer_expr(ctx, *inner);
            let ty = match inner.get_info() {
                Type::Named { name, args, .. } if name == "Result" && args.len() == 2 => {
                    args[0].clone()
                }
                other => {
                    ctx.diagnostics.push(Diagnostic::ty(
                        code::TYPE_MISMATCH,
                        format!("`?` requires a `Result` operand, found `{other}`"),
                        inner.position(),
                    ));
                    Type::Unknown
                }
            };
            let _ = ty;
            Expression::Try(Box::new(inner))
        }
        Expression::Await(inner) => {
            let inner = infer_expr(ctx, *inner);
            Expression::Await(Box::new(inner))
        }
        Expression::Range(r) => Expression::Range(Box::new(infer_range(ctx, *r))),
        Expression::Parens(inner) => Expression::Parens(Box::new(infer_expr(ctx, *inner))),
    }
}

/// Finds the enum declaring a variant named `name`, for the bare
/// `Variant`/`Variant(...)` constructor syntax — codegen already resolves
/// these against `TypeEnv::enums` the same way; this just gives the checker
/// the matching lookup so a variant constructor typechecks before it gets
/// there. Two enums sharing a variant name is not rejected; the first match
/// wins, picked in whatever order `HashMap` iterates.
fn find_enum_variant(env: &crate::types::TypeEnv, name: &str) -> Option<(String, crate::types::EnumVariantInfo)> {
    env.enums.values().find_map(|e| e.variant(name).map(|v| (e.name.clone(), v.clone())))
}

fn lookup_name(ctx: &mut Context, name: &str) -> Option<Type> {
    if let Some(t) = ctx.lookup_local(name) {
        return Some(t);
    }
    if ctx.is_generic(name) {
        return Some(Type::Generic(name.to_string()));
    }
    if let Some(c) = ctx.env.constants.get(name) {
        return Some(c.clone());
    }
    if let Some(f) = ctx.env.functions.get(name) {
        return Some(Type::Function {
            params: f.params.clone(),
            ret: f.return_type.clone().into(),
        });
    }
    None
}

fn literal_type(value: &LiteralValue) -> Type {
    match value {
        LiteralValue::Int { suffix, .. } => suffix_int_type(suffix.as_deref()).unwrap_or(Type::i32()),
        LiteralValue::Float { suffix, .. } => match suffix.as_deref() {
            Some("f32") => Type::Float(FloatWidth::W32),
            _ => Type::Float(FloatWidth::W64),
        },
        LiteralValue::Str(_) => Type::Str,
        LiteralValue::Char(_) => Type::Char,
        LiteralValue::Bool(_) => Type::Bool,
        LiteralValue::Null => Type::Unknown,
    }
}

fn suffix_int_type(suffix: Option<&str>) -> Option<Type> {
    use IntWidth::*;
    Some(match suffix? {
        "i8" => Type::Int { width: W8, signed: true },
        "i16" => Type::Int { width: W16, signed: true },
        "i32" => Type::Int { width: W32, signed: true },
        "i64" => Type::Int { width: W64, signed: true },
        "i128" => Type::Int { width: W128, signed: true },
        "isize" => Type::Int { width: Size, signed: true },
        "u8" => Type::Int { width: W8, signed: false },
        "u16" => Type::Int { width: W16, signed: false },
        "u32" => Type::Int { width: W32, signed: false },
        "u64" => Type::Int { width: W64, signed: false },
        "u128" => Type::Int { width: W128, signed: false },
        "usize" => Type::Int { width: Size, signed: false },
        _ => return None,
    })
}

pub fn check_assignable(ctx: &mut Context, expected: &Type, found: &Type, span: crate::source::SourceSpan) {
    if !compatible(&ctx.env, expected, found) {
        ctx.diagnostics.push(mismatch(expected, found, span));
    }
}

fn infer_binary(ctx: &mut Context, b: BinaryExpr<()>) -> BinaryExpr<Type> {
    let left = infer_expr(ctx, b.left);
    let right = infer_expr(ctx, b.right);
    let lt = left.get_info();
    let rt = right.get_info();
    let ty = match b.operator {
        BinaryOperator::And | BinaryOperator::Or => {
            check_assignable(ctx, &Type::Bool, &lt, left.position());
            check_assignable(ctx, &Type::Bool, &rt, right.position());
            Type::Bool
        }
        op if op.is_comparison() => {
            if !compatible(&ctx.env, &lt, &rt) && !compatible(&ctx.env, &rt, &lt) {
                ctx.diagnostics.push(mismatch(&lt, &rt, right.position()));
            }
            Type::Bool
        }
        BinaryOperator::Shl | BinaryOperator::Shr => lt.clone(),
        _ => {
            if !lt.is_numeric() && !matches!(lt, Type::Unknown) {
                ctx.diagnostics.push(Diagnostic::ty(
                    code::TYPE_MISMATCH,
                    format!("operator `{:?}` requires a numeric operand, found `{lt}`", b.operator),
                    left.position(),
                ));
            }
            if !compatible(&ctx.env, &lt, &rt) && !compatible(&ctx.env, &rt, &lt) {
                ctx.diagnostics.push(mismatch(&lt, &rt, right.position()));
            }
            if matches!(lt, Type::Unknown) {
                rt.clone()
            } else {
                lt.clone()
            }
        }
    };
    BinaryExpr {
        left,
        right,
        operator: b.operator,
        info: ty,
        position: b.position,
    }
}

fn infer_unary(ctx: &mut Context, u: UnaryExpr<()>) -> UnaryExpr<Type> {
    let operand = infer_expr(ctx, u.operand);
    let ot = operand.get_info();
    let ty = match u.operator {
        UnaryOperator::Neg => ot.clone(),
        UnaryOperator::Not => {
            check_assignable(ctx, &Type::Bool, &ot, operand.position());
            Type::Bool
        }
        UnaryOperator::BitNot => ot.clone(),
        UnaryOperator::Ref => Type::reference(false, ot.clone()),
        UnaryOperator::RefMut => Type::reference(true, ot.clone()),
        UnaryOperator::Deref => match &ot {
            Type::Reference { inner, .. } | Type::RawPointer { inner, .. } => (**inner).clone(),
            _ => {
                ctx.diagnostics.push(Diagnostic::ty(
                    code::TYPE_MISMATCH,
                    format!("cannot dereference `{ot}`"),
                    operand.position(),
                ));
                Type::Unknown
            }
        },
    };
    UnaryExpr {
        operand,
        operator: u.operator,
        info: ty,
        position: u.position,
    }
}

fn infer_assign(ctx: &mut Context, a: AssignExpr<()>) -> AssignExpr<Type> {
    let target = infer_expr(ctx, a.target);
    if !is_lvalue(&target) {
        ctx.diagnostics.push(Diagnostic::ty(
            code::INVALID_LVALUE,
            "left-hand side of an assignment must be a place expression",
            target.position(),
        ));
    }
    let value = infer_expr(ctx, a.value);
    check_assignable(ctx, &target.get_info(), &value.get_info(), value.position());
    AssignExpr {
        target,
        op: a.op,
        value,
        info: Type::Unit,
        position: a.position,
    }
}

/// `Variant(a, b)` construction for a tuple-shaped enum variant — unifies
/// each argument against the variant's declared field types the same way a
/// generic function call unifies arguments against its parameters, so
/// `Just(7)` on `enum Maybe[T] { Just(T), Nothing }` infers `Maybe[I32]`
/// without an explicit `Just[I32](7)`.
fn infer_enum_variant_call(
    ctx: &mut Context,
    c: CallExpr<()>,
    enum_name: &str,
    variant: &crate::types::EnumVariantInfo,
    explicit_type_args: Vec<Type>,
) -> CallExpr<Type> {
    let callee = infer_expr(ctx, *c.callee);
    let args: Vec<_> = c.args.into_iter().map(|a| infer_expr(ctx, a)).collect();
    let field_types = match &variant.shape {
        crate::types::EnumVariantShape::Tuple(types) => types.clone(),
        _ => Vec::new(),
    };
    if args.len() != field_types.len() {
        ctx.diagnostics.push(arity_mismatch(field_types.len(), args.len(), c.position));
    }

    let generics = ctx.env.enums.get(enum_name).map(|e| e.generics.clone()).unwrap_or_default();
    let mut subst = Substitution::new();
    for (g, t) in generics.iter().zip(explicit_type_args.iter()) {
        subst.bind(g.clone(), t.clone());
    }
    for (field_ty, arg) in field_types.iter().zip(args.iter()) {
        arg.get_info().unify_into(field_ty, &mut subst);
    }
    for (field_ty, arg) in field_types.iter().zip(args.iter()) {
        check_assignable(ctx, &subst.apply(field_ty), &arg.get_info(), arg.position());
    }

    let ret = Type::Named {
        path: vec![],
        name: enum_name.to_string(),
        args: generics.iter().map(|g| subst.get(g).cloned().unwrap_or(Type::Unknown)).collect(),
    };
    CallExpr { callee, type_args: Vec::new(), args, info: ret, position: c.position }
}

fn is_lvalue<T>(e: &Expression<T>) -> bool {
    matches!(
        e.unwrap_parens(),
        Expression::Identifier { .. }
            | Expression::FieldAccess(_)
            | Expression::Index(_)
            | Expression::Unary(_)
            | Expression::BaseAccess { .. }
    )
}

fn infer_call(ctx: &mut Context, c: CallExpr<()>) -> CallExpr<Type> {
    let type_args: Vec<Type> = c.type_args.iter().map(|t| resolve_type_name(ctx, t)).collect();

    // A direct call to a known function name gets full generic unification
    // against its declared signature; anything else falls back to treating
    // the callee's inferred type as a `Function`.
    if let Expression::Identifier { name, .. } = c.callee.unwrap_parens() {
        if ctx.env.functions.get(name).is_none() {
            if let Some((enum_name, variant)) = find_enum_variant(&ctx.env, name) {
                return infer_enum_variant_call(ctx, c, &enum_name, &variant, type_args);
            }
        }
        if let Some(sig) = ctx.env.functions.get(name).cloned() {
            let callee = infer_expr(ctx, *c.callee);
            let args: Vec<_> = c.args.into_iter().map(|a| infer_expr(ctx, a)).collect();
            if args.len() != sig.params.len() {
                ctx.diagnostics.push(arity_mismatch(sig.params.len(), args.len(), c.position));
            }
            let mut subst = Substitution::new();
            for (g, t) in sig.generics.iter().zip(type_args.iter()) {
                subst.bind(g.clone(), t.clone());
            }
            for (param, arg) in sig.params.iter().zip(args.iter()) {
                arg.get_info().unify_into(param, &mut subst);
            }
            for (param, arg) in sig.params.iter().zip(args.iter()) {
                check_assignable(ctx, &subst.apply(param), &arg.get_info(), arg.position());
            }
            let ret = subst.apply(&sig.return_type);
            return CallExpr {
                callee,
                type_args: c.type_args,
                args,
                info: ret,
                position: c.position,
            };
        }
    }

    let callee = infer_expr(ctx, *c.callee);
    let args: Vec<_> = c.args.into_iter().map(|a| infer_expr(ctx, a)).collect();
    let ret = match callee.get_info() {
        Type::Function { params, ret } => {
            if params.len() != args.len() {
                ctx.diagnostics.push(arity_mismatch(params.len(), args.len(), c.position));
            }
            for (param, arg) in params.iter().zip(args.iter()) {
                check_assignable(ctx, param, &arg.get_info(), arg.position());
            }
            (*ret).clone()
        }
        Type::Unknown => Type::Unknown,
        other => {
            ctx.diagnostics.push(Diagnostic::ty(
                code::NOT_CALLABLE,
                format!("`{other}` is not callable"),
                callee.position(),
            ));
            Type::Unknown
        }
    };
    CallExpr {
        callee,
        type_args: c.type_args,
        args,
        info: ret,
        position: c.position,
    }
}

fn infer_method_call(ctx: &mut Context, m: MethodCallExpr<()>) -> MethodCallExpr<Type> {
    let receiver = infer_expr(ctx, m.receiver);
    let type_args: Vec<Type> = m.type_args.iter().map(|t| resolve_type_name(ctx, t)).collect();
    let args: Vec<_> = m.args.into_iter().map(|a| infer_expr(ctx, a)).collect();

    let receiver_ty = receiver.get_info();
    let base_name = type_base_name(&receiver_ty);
    let found = base_name.as_deref().and_then(|base| {
        ctx.env
            .impls_for(base)
            .iter()
            .find(|i| i.methods.contains(&m.method))
            .cloned()
    });

    let ret = match found {
        Some(_impl_info) => {
            // Method signatures are carried on `MethodDecl`, not duplicated
            // into `ImplInfo`; resolving the concrete return type precisely
            // needs the owning declaration, which the registry does not
            // keep a side index of. We fall back to `Unknown` here and let
            // the emitter's `require_impl_method_instantiation` (§4.8) do
            // the precise signature lookup it needs anyway.
            Type::Unknown
        }
        None => {
            if !matches!(receiver_ty, Type::Unknown) {
                ctx.diagnostics.push(Diagnostic::ty(
                    code::UNKNOWN_METHOD,
                    format!("no method `{}` found on `{receiver_ty}`", m.method),
                    m.position,
                ));
            }
            Type::Unknown
        }
    };

    MethodCallExpr {
        receiver,
        method: m.method,
        type_args: m.type_args,
        args,
        info: ret,
        position: m.position,
    }
}

fn type_base_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Named { name, .. } => Some(name.clone()),
        Type::Int { signed: true, width } => Some(format!("I{}", int_bits_label(*width))),
        Type::Int { signed: false, width } => Some(format!("U{}", int_bits_label(*width))),
        Type::Float(FloatWidth::W32) => Some("F32".to_string()),
        Type::Float(FloatWidth::W64) => Some("F64".to_string()),
        Type::Bool => Some("Bool".to_string()),
        Type::Char => Some("Char".to_string()),
        Type::Str => Some("Str".to_string()),
        Type::Dyn { behavior, .. } => Some(behavior.clone()),
        Type::Reference { inner, .. } | Type::RawPointer { inner, .. } => type_base_name(inner),
        _ => None,
    }
}

fn int_bits_label(w: IntWidth) -> String {
    match w {
        IntWidth::Size => "size".to_string(),
        other => other.bits().to_string(),
    }
}

fn infer_field_access(ctx: &mut Context, f: FieldAccessExpr<()>) -> FieldAccessExpr<Type> {
    let base = infer_expr(ctx, f.base);
    let base_ty = unwrap_ref(base.get_info());
    let ty = match &base_ty {
        Type::Named { name, .. } => ctx
            .env
            .structs
            .get(name)
            .and_then(|s| s.fields.iter().find(|fi| fi.name == f.field))
            .or_else(|| {
                ctx.env
                    .classes
                    .get(name)
                    .and_then(|c| c.fields.iter().find(|fi| fi.name == f.field))
            })
            .map(|fi| fi.ty.clone())
            .unwrap_or_else(|| {
                ctx.diagnostics.push(Diagnostic::ty(
                    code::UNKNOWN_FIELD,
                    format!("no field `{}` on `{base_ty}`", f.field),
                    f.position,
                ));
                Type::Unknown
            }),
        Type::Tuple(elements) => f
            .field
            .parse::<usize>()
            .ok()
            .and_then(|i| elements.get(i).cloned())
            .unwrap_or(Type::Unknown),
        Type::Unknown => Type::Unknown,
        other => {
            ctx.diagnostics.push(Diagnostic::ty(
                code::UNKNOWN_FIELD,
                format!("`{other}` has no fields"),
                f.position,
            ));
            Type::Unknown
        }
    };
    FieldAccessExpr {
        base,
        field: f.field,
        info: ty,
        position: f.position,
    }
}

fn unwrap_ref(ty: Type) -> Type {
    match ty {
        Type::Reference { inner, .. } => unwrap_ref((*inner).clone()),
        other => other,
    }
}

fn infer_index(ctx: &mut Context, i: IndexExpr<()>) -> IndexExpr<Type> {
    let base = infer_expr(ctx, i.base);
    let index = infer_expr(ctx, i.index);
    check_assignable(ctx, &Type::Int { width: IntWidth::Size, signed: false }, &index.get_info(), index.position());
    let ty = match unwrap_ref(base.get_info()) {
        Type::Array { element, .. } | Type::Slice { element } => (*element).clone(),
        Type::Unknown => Type::Unknown,
        other => {
            ctx.diagnostics.push(Diagnostic::ty(
                code::NOT_INDEXABLE,
                format!("`{other}` cannot be indexed"),
                i.position,
            ));
            Type::Unknown
        }
    };
    IndexExpr {
        base,
        index,
        info: ty,
        position: i.position,
    }
}

fn infer_struct_literal(ctx: &mut Context, s: StructLiteralExpr<()>) -> StructLiteralExpr<Type> {
    let resolved = resolve_type_name(ctx, &s.type_name);
    let struct_name = type_base_name(&resolved);
    let info = struct_name.as_ref().and_then(|n| ctx.env.structs.get(n).cloned());

    let mut seen = std::collections::HashSet::new();
    let fields = s
        .fields
        .into_iter()
        .map(|(name, value)| {
            if !seen.insert(name.clone()) {
                ctx.diagnostics.push(Diagnostic::ty(
                    code::DUPLICATE_FIELD,
                    format!("field `{name}` specified more than once"),
                    s.position,
                ));
            }
            let field_ty = info
                .as_ref()
                .and_then(|i| i.fields.iter().find(|f| f.name == name))
                .map(|f| f.ty.clone());
            let value = infer_expr(ctx, value);
            if let Some(expected) = &field_ty {
                check_assignable(ctx, expected, &value.get_info(), value.position());
            } else if info.is_some() {
                ctx.diagnostics.push(Diagnostic::ty(
                    code::UNKNOWN_FIELD,
                    format!("no field `{name}` on this struct literal"),
                    value.position(),
                ));
            }
            (name, value)
        })
        .collect::<Vec<_>>();

    if let (Some(info), None) = (&info, &s.spread) {
        for f in &info.fields {
            if !fields.iter().any(|(n, _)| n == &f.name) {
                ctx.diagnostics.push(Diagnostic::ty(
                    code::MISSING_FIELD,
                    format!("missing field `{}` in struct literal", f.name),
                    s.position,
                ));
            }
        }
    }

    let spread = s.spread.map(|sp| infer_expr(ctx, sp));

    StructLiteralExpr {
        type_name: s.type_name,
        fields,
        spread,
        info: resolved,
        position: s.position,
    }
}

fn infer_cast(ctx: &mut Context, c: CastExpr<()>) -> CastExpr<Type> {
    let inner = infer_expr(ctx, c.expr);
    let target = resolve_type_name(ctx, &c.target);
    CastExpr {
        expr: inner,
        target: c.target,
        info: target,
        position: c.position,
    }
}

fn infer_range(ctx: &mut Context, r: RangeExpr<()>) -> RangeExpr<Type> {
    let start = r.start.map(|s| infer_expr(ctx, s));
    let end = r.end.map(|e| infer_expr(ctx, e));
    let element = start
        .as_ref()
        .map(|s| s.get_info())
        .or_else(|| end.as_ref().map(|e| e.get_info()))
        .unwrap_or(Type::i32());
    RangeExpr {
        start,
        end,
        inclusive: r.inclusive,
        info: Type::Named {
            path: Vec::new(),
            name: "Range".to_string(),
            args: vec![element],
        },
        position: r.position,
    }
}

fn infer_fragments(
    ctx: &mut Context,
    fragments: Vec<InterpolationFragment<()>>,
) -> Vec<InterpolationFragment<Type>> {
    fragments
        .into_iter()
        .map(|f| match f {
            InterpolationFragment::Text(t) => InterpolationFragment::Text(t),
            InterpolationFragment::Expr(e) => InterpolationFragment::Expr(Box::new(infer_expr(ctx, *e))),
        })
        .collect()
}

pub fn infer_block(ctx: &mut Context, block: Block<()>) -> (Block<Type>, Type) {
    ctx.push_scope();
    let statements: Vec<_> = block
        .statements
        .into_iter()
        .map(|s| check_statement(ctx, s))
        .collect();
    let trailing = block.trailing.map(|t| Box::new(infer_expr(ctx, *t)));
    ctx.pop_scope();
    let ty = trailing.as_ref().map(|t| t.get_info()).unwrap_or(Type::Unit);
    (
        Block {
            statements,
            trailing,
            info: ty.clone(),
            position: block.position,
        },
        ty,
    )
}

/// Lowers an untyped block into a `Block<Type>` stamped entirely with
/// `Unknown`, with no diagnostics — used for `lowlevel` blocks, whose
/// contents bypass normal semantic checking per §4.7.
fn stamp_unknown_block(block: Block<()>) -> Block<Type> {
    Block {
        statements: block.statements.into_iter().map(stamp_unknown_stmt).collect(),
        trailing: block.trailing.map(|t| Box::new(stamp_unknown_expr(*t))),
        info: Type::Unknown,
        position: block.position,
    }
}

fn stamp_unknown_stmt(stmt: Statement<()>) -> Statement<Type> {
    match stmt {
        Statement::Let(s) => Statement::Let(crate::ast::LetStatement {
            pattern: stamp_unknown_pattern(s.pattern),
            type_annotation: s.type_annotation,
            value: stamp_unknown_expr(s.value),
            info: Type::Unknown,
            position: s.position,
        }),
        Statement::Var(s) => Statement::Var(crate::ast::VarStatement {
            pattern: stamp_unknown_pattern(s.pattern),
            type_annotation: s.type_annotation,
            value: stamp_unknown_expr(s.value),
            info: Type::Unknown,
            position: s.position,
        }),
        Statement::Expression(s) => Statement::Expression(crate::ast::ExpressionStatement {
            expression: stamp_unknown_expr(s.expression),
            info: Type::Unknown,
            position: s.position,
        }),
        Statement::Declaration(_) => {
            // A declaration embedded in a lowlevel block is not a supported
            // construct; dropping it to an empty expression keeps the tree
            // well-formed rather than panicking.
            Statement::Expression(crate::ast::ExpressionStatement {
                expression: Expression::Literal {
                    value: LiteralValue::Null,
                    info: Type::Unknown,
                    position: crate::source::SourceSpan::synthetic(),
                },
                info: Type::Unknown,
                position: crate::source::SourceSpan::synthetic(),
            })
        }
    }
}

fn stamp_unknown_pattern(pattern: crate::ast::Pattern<()>) -> crate::ast::Pattern<Type> {
    check_pattern(&mut Context::new(crate::types::TypeEnv::new()), pattern, &Type::Unknown)
}

fn stamp_unknown_expr(expr: Expression<()>) -> Expression<Type> {
    // Reuses `infer_expr`'s structural recursion against a throwaway
    // context so we don't duplicate every variant a third time; the
    // throwaway context's diagnostics are simply discarded.
    let mut scratch = Context::new(crate::types::TypeEnv::new());
    infer_expr(&mut scratch, expr)
}
