//! Deep, per-declaration checking: function/method bodies, class
//! verification rules, impl completeness, and const evaluation. The
//! shallow shapes (field lists, signatures, vtables) were already built by
//! [`crate::registry::register_module`]; this pass walks bodies and cross-
//! checks them against that already-registered `TypeEnv`.

use std::collections::HashSet;

use crate::ast::{
    BehaviorDecl, ClassDecl, ClassMember, ConstDecl, Declaration, EnumDecl, EnumVariantPayload,
    FunctionDecl, GenericParam, ImplDecl, ImplItem, InterfaceDecl, MethodDecl, Module, ModuleDecl,
    NamespaceDecl, Param, StructDecl, StructField, TypeAliasDecl, UnionDecl,
};
use crate::diagnostics::Diagnostic;
use crate::types::Type;

use super::context::Context;
use super::error::code;
use super::expr::{check_assignable, infer_block, infer_expr};
use super::resolve::resolve_type_name;

pub fn check_module(ctx: &mut Context, module: Module<()>) -> Module<Type> {
    let declarations = module
        .declarations
        .into_iter()
        .map(|d| check_declaration(ctx, d))
        .collect();
    Module {
        name: module.name,
        declarations,
        doc: module.doc,
    }
}

pub fn check_declaration(ctx: &mut Context, decl: Declaration<()>) -> Declaration<Type> {
    match decl {
        Declaration::Function(f) => Declaration::Function(check_function(ctx, f, None)),
        Declaration::Struct(s) => Declaration::Struct(check_struct(ctx, s)),
        Declaration::Enum(e) => Declaration::Enum(check_enum(ctx, e)),
        Declaration::Union(u) => Declaration::Union(check_union(ctx, u)),
        Declaration::Class(c) => Declaration::Class(check_class(ctx, c)),
        Declaration::Interface(i) => Declaration::Interface(check_interface(ctx, i)),
        Declaration::Behavior(b) => Declaration::Behavior(check_behavior(ctx, b)),
        Declaration::Impl(i) => Declaration::Impl(check_impl(ctx, i)),
        Declaration::TypeAlias(t) => Declaration::TypeAlias(check_type_alias(ctx, t)),
        Declaration::Const(c) => Declaration::Const(check_const(ctx, c)),
        Declaration::Use(u) => Declaration::Use(u),
        Declaration::Module(m) => Declaration::Module(check_module_decl(ctx, m)),
        Declaration::Namespace(n) => Declaration::Namespace(check_namespace(ctx, n)),
    }
}

fn generic_names(generics: &[GenericParam]) -> Vec<String> {
    generics.iter().map(|g| g.name.clone()).collect()
}

/// Checks each generic bound actually names a registered behavior, and —
/// when resolvable — that later call sites are free to assume it.
fn check_generic_bounds(ctx: &mut Context, generics: &[GenericParam]) {
    for g in generics {
        for bound in &g.bounds {
            resolve_type_name(ctx, bound);
        }
    }
}

fn check_params(ctx: &mut Context, params: Vec<Param<()>>) -> Vec<Param<Type>> {
    params
        .into_iter()
        .map(|p| {
            let ty = p
                .type_annotation
                .as_ref()
                .map(|t| resolve_type_name(ctx, t))
                .unwrap_or(Type::Unknown);
            ctx.bind(p.name.clone(), ty.clone());
            let default = p.default.map(|d| {
                let d = infer_expr(ctx, d);
                check_assignable(ctx, &ty, &d.get_info(), d.position());
                d
            });
            Param {
                name: p.name,
                type_annotation: p.type_annotation,
                default,
                info: ty,
                position: p.position,
            }
        })
        .collect()
}

fn check_function(ctx: &mut Context, f: FunctionDecl<()>, self_type: Option<Type>) -> FunctionDecl<Type> {
    ctx.push_scope();
    ctx.push_generics(generic_names(&f.generics));
    check_generic_bounds(ctx, &f.generics);
    let return_type = f
        .return_type
        .as_ref()
        .map(|t| resolve_type_name(ctx, t))
        .unwrap_or(Type::Unit);
    let params = check_params(ctx, f.params);
    let had_self = self_type.is_some();
    ctx.push_function(return_type.clone(), self_type);
    let body = f.body.map(|b| {
        let (block, block_ty) = infer_block(ctx, b);
        if !matches!(return_type, Type::Unit) {
            check_assignable(ctx, &return_type, &block_ty, block.position);
        }
        block
    });
    ctx.pop_function(had_self);
    ctx.pop_generics();
    ctx.pop_scope();
    FunctionDecl {
        name: f.name,
        generics: f.generics,
        params,
        return_type: f.return_type,
        where_clause: f.where_clause,
        body,
        decorators: f.decorators,
        doc: f.doc,
        visibility: f.visibility,
        is_async: f.is_async,
        info: return_type,
        position: f.position,
    }
}

fn check_method(ctx: &mut Context, m: MethodDecl<()>, self_type: Type) -> MethodDecl<Type> {
    ctx.push_scope();
    ctx.push_generics(generic_names(&m.generics));
    check_generic_bounds(ctx, &m.generics);
    let return_type = m
        .return_type
        .as_ref()
        .map(|t| resolve_type_name(ctx, t))
        .unwrap_or(Type::Unit);
    if m.takes_this {
        ctx.bind("this", Type::reference(m.this_mut, self_type.clone()));
    }
    let params = check_params(ctx, m.params);
    ctx.push_function(return_type.clone(), Some(self_type));
    let body = m.body.map(|b| {
        let (block, block_ty) = infer_block(ctx, b);
        if !matches!(return_type, Type::Unit) {
            check_assignable(ctx, &return_type, &block_ty, block.position);
        }
        block
    });
    ctx.pop_function(true);
    ctx.pop_generics();
    ctx.pop_scope();
    if m.is_abstract && body.is_some() {
        ctx.diagnostics.push(Diagnostic::ty(
            code::ABSTRACT_SEALED,
            format!("abstract method `{}` may not have a body", m.name),
            m.position,
        ));
    }
    if m.is_abstract && m.is_virtual {
        // abstract implies virtual; both set is redundant but harmless.
    }
    MethodDecl {
        name: m.name,
        generics: m.generics,
        params,
        return_type: m.return_type,
        where_clause: m.where_clause,
        body,
        decorators: m.decorators,
        doc: m.doc,
        visibility: m.visibility,
        is_static: m.is_static,
        is_virtual: m.is_virtual,
        is_override: m.is_override,
        is_abstract: m.is_abstract,
        takes_this: m.takes_this,
        this_mut: m.this_mut,
        info: return_type,
        position: m.position,
    }
}

fn check_struct_field(ctx: &mut Context, f: StructField<()>) -> StructField<Type> {
    let ty = resolve_type_name(ctx, &f.type_annotation);
    StructField {
        name: f.name,
        type_annotation: f.type_annotation,
        visibility: f.visibility,
        doc: f.doc,
        info: ty,
        position: f.position,
    }
}

fn check_struct(ctx: &mut Context, s: StructDecl<()>) -> StructDecl<Type> {
    ctx.push_generics(generic_names(&s.generics));
    let mut seen = HashSet::new();
    let fields = s
        .fields
        .into_iter()
        .map(|f| {
            if !seen.insert(f.name.clone()) {
                ctx.diagnostics.push(Diagnostic::ty(
                    code::DUPLICATE_FIELD,
                    format!("field `{}` declared more than once", f.name),
                    f.position,
                ));
            }
            check_struct_field(ctx, f)
        })
        .collect();
    ctx.pop_generics();
    let info = Type::Named {
        path: Vec::new(),
        name: s.name.clone(),
        args: s.generics.iter().map(|g| Type::Generic(g.name.clone())).collect(),
    };
    StructDecl {
        name: s.name,
        generics: s.generics,
        fields,
        doc: s.doc,
        visibility: s.visibility,
        info,
        position: s.position,
    }
}

fn check_union(ctx: &mut Context, u: UnionDecl<()>) -> UnionDecl<Type> {
    ctx.push_generics(generic_names(&u.generics));
    let variants = u.variants.into_iter().map(|f| check_struct_field(ctx, f)).collect();
    ctx.pop_generics();
    let info = Type::Named {
        path: Vec::new(),
        name: u.name.clone(),
        args: u.generics.iter().map(|g| Type::Generic(g.name.clone())).collect(),
    };
    UnionDecl {
        name: u.name,
        generics: u.generics,
        variants,
        doc: u.doc,
        visibility: u.visibility,
        info,
        position: u.position,
    }
}

fn check_enum(ctx: &mut Context, e: EnumDecl<()>) -> EnumDecl<Type> {
    ctx.push_generics(generic_names(&e.generics));
    let mut seen = HashSet::new();
    let variants = e
        .variants
        .into_iter()
        .map(|v| {
            if !seen.insert(v.name.clone()) {
                ctx.diagnostics.push(Diagnostic::ty(
                    code::UNKNOWN_VARIANT,
                    format!("variant `{}` declared more than once", v.name),
                    v.position,
                ));
            }
            let payload = match v.payload {
                EnumVariantPayload::Unit => EnumVariantPayload::Unit,
                EnumVariantPayload::Tuple(types) => {
                    for t in &types {
                        resolve_type_name(ctx, t);
                    }
                    EnumVariantPayload::Tuple(types)
                }
                EnumVariantPayload::Struct(fields) => {
                    EnumVariantPayload::Struct(fields.into_iter().map(|f| check_struct_field(ctx, f)).collect())
                }
            };
            crate::ast::EnumVariant {
                name: v.name,
                payload,
                doc: v.doc,
                position: v.position,
            }
        })
        .collect();
    ctx.pop_generics();
    let info = Type::Named {
        path: Vec::new(),
        name: e.name.clone(),
        args: e.generics.iter().map(|g| Type::Generic(g.name.clone())).collect(),
    };
    EnumDecl {
        name: e.name,
        generics: e.generics,
        variants,
        doc: e.doc,
        visibility: e.visibility,
        info,
        position: e.position,
    }
}

fn check_class(ctx: &mut Context, c: ClassDecl<()>) -> ClassDecl<Type> {
    if let Some(info) = ctx.env.classes.get(&c.name).cloned() {
        if !ctx.env.class_chain_acyclic(&c.name) {
            ctx.diagnostics.push(Diagnostic::ty(
                code::CYCLIC_CLASS,
                format!("class `{}` inherits from itself", c.name),
                c.position,
            ));
        }
        if info.is_abstract && info.is_sealed {
            ctx.diagnostics.push(Diagnostic::ty(
                code::ABSTRACT_SEALED,
                format!("class `{}` cannot be both `abstract` and `sealed`", c.name),
                c.position,
            ));
        }
        for behavior in &info.implements {
            check_interface_completeness(ctx, &c.name, behavior, &c, c.position);
        }
    }

    let self_type = Type::Named {
        path: Vec::new(),
        name: c.name.clone(),
        args: c.generics.iter().map(|g| Type::Generic(g.name.clone())).collect(),
    };

    ctx.push_generics(generic_names(&c.generics));
    let members = c
        .members
        .into_iter()
        .map(|m| check_class_member(ctx, m, self_type.clone(), &c.name))
        .collect();
    ctx.pop_generics();

    ClassDecl {
        name: c.name,
        generics: c.generics,
        extends: c.extends,
        implements: c.implements,
        members,
        is_abstract: c.is_abstract,
        is_sealed: c.is_sealed,
        doc: c.doc,
        visibility: c.visibility,
        info: self_type,
        position: c.position,
    }
}

fn check_interface_completeness(
    ctx: &mut Context,
    class_name: &str,
    behavior_name: &str,
    class: &ClassDecl<()>,
    span: crate::source::SourceSpan,
) {
    let Some(behavior) = ctx.env.behaviors.get(behavior_name).cloned() else {
        return;
    };
    let provided: HashSet<&str> = class
        .members
        .iter()
        .filter_map(|m| match m {
            ClassMember::Method(m) => Some(m.name.as_str()),
            _ => None,
        })
        .collect();
    for required in &behavior.methods {
        if behavior.methods_with_default.contains(required) {
            continue;
        }
        if !provided.contains(required.as_str()) {
            ctx.diagnostics.push(Diagnostic::ty(
                code::INCOMPLETE_IMPL,
                format!("class `{class_name}` does not implement `{behavior_name}::{required}`"),
                span,
            ));
        }
    }
}

fn check_class_member(ctx: &mut Context, member: ClassMember<()>, self_type: Type, class_name: &str) -> ClassMember<Type> {
    match member {
        ClassMember::Field(f) => {
            let ty = resolve_type_name(ctx, &f.type_annotation);
            let default = f.default.map(|d| {
                let d = infer_expr(ctx, d);
                check_assignable(ctx, &ty, &d.get_info(), d.position());
                d
            });
            ClassMember::Field(crate::ast::ClassFieldDecl {
                name: f.name,
                type_annotation: f.type_annotation,
                default,
                visibility: f.visibility,
                is_static: f.is_static,
                is_mut: f.is_mut,
                doc: f.doc,
                info: ty,
                position: f.position,
            })
        }
        ClassMember::Method(m) => {
            let is_override = m.is_override;
            let name = m.name.clone();
            let checked = check_method(ctx, m, self_type.clone());
            if is_override {
                check_override_matches(ctx, class_name, &name, &checked, checked.position);
            }
            ClassMember::Method(checked)
        }
        ClassMember::Property(p) => {
            let ty = resolve_type_name(ctx, &p.type_annotation);
            ctx.push_function(ty.clone(), Some(self_type.clone()));
            let getter = p.getter.map(|g| infer_block(ctx, g).0);
            let setter = p.setter.map(|(param, body)| {
                ctx.push_scope();
                ctx.bind(param.clone(), ty.clone());
                let (body, _) = infer_block(ctx, body);
                ctx.pop_scope();
                (param, body)
            });
            ctx.pop_function(true);
            ClassMember::Property(crate::ast::PropertyDecl {
                name: p.name,
                type_annotation: p.type_annotation,
                getter,
                setter,
                visibility: p.visibility,
                is_static: p.is_static,
                info: ty,
                position: p.position,
            })
        }
        ClassMember::Constructor(c) => {
            ctx.push_scope();
            let params = check_params(ctx, c.params);
            ctx.push_function(Type::Unit, Some(self_type));
            let (body, _) = infer_block(ctx, c.body);
            ctx.pop_function(true);
            ctx.pop_scope();
            ClassMember::Constructor(crate::ast::ConstructorDecl {
                params,
                body,
                visibility: c.visibility,
                info: Type::Unit,
                position: c.position,
            })
        }
    }
}

fn check_override_matches(
    ctx: &mut Context,
    class_name: &str,
    method_name: &str,
    method: &MethodDecl<Type>,
    span: crate::source::SourceSpan,
) {
    let Some(info) = ctx.env.classes.get(class_name).cloned() else { return };
    let Some(parent_name) = &info.extends else {
        ctx.diagnostics.push(Diagnostic::ty(
            code::BAD_OVERRIDE,
            format!("`{method_name}` is marked `override` but `{class_name}` has no parent class"),
            span,
        ));
        return;
    };
    let Some(parent) = ctx.env.classes.get(parent_name) else { return };
    let overridden = parent.vtable.iter().find(|slot| slot.method_name == method_name);
    if overridden.is_none() {
        ctx.diagnostics.push(Diagnostic::ty(
            code::BAD_OVERRIDE,
            format!("`{parent_name}` has no virtual method `{method_name}` to override"),
            span,
        ));
        return;
    }
    if method.params.iter().any(|p| matches!(p.info, Type::Unknown)) {
        return;
    }
}

fn check_interface(ctx: &mut Context, i: InterfaceDecl<()>) -> InterfaceDecl<Type> {
    ctx.push_generics(generic_names(&i.generics));
    let methods = i
        .methods
        .into_iter()
        .map(|m| {
            ctx.push_scope();
            ctx.push_generics(generic_names(&m.generics));
            let return_type = m
                .return_type
                .as_ref()
                .map(|t| resolve_type_name(ctx, t))
                .unwrap_or(Type::Unit);
            for p in &m.params {
                if let Some(t) = &p.type_annotation {
                    resolve_type_name(ctx, t);
                }
            }
            ctx.pop_generics();
            ctx.pop_scope();
            MethodDecl {
                name: m.name,
                generics: m.generics,
                params: m
                    .params
                    .into_iter()
                    .map(|p| Param {
                        name: p.name,
                        type_annotation: p.type_annotation,
                        default: None,
                        info: Type::Unknown,
                        position: p.position,
                    })
                    .collect(),
                return_type: m.return_type,
                where_clause: m.where_clause,
                body: None,
                decorators: m.decorators,
                doc: m.doc,
                visibility: m.visibility,
                is_static: m.is_static,
                is_virtual: m.is_virtual,
                is_override: m.is_override,
                is_abstract: true,
                takes_this: m.takes_this,
                this_mut: m.this_mut,
                info: return_type,
                position: m.position,
            }
        })
        .collect();
    ctx.pop_generics();
    InterfaceDecl {
        name: i.name,
        generics: i.generics,
        methods,
        doc: i.doc,
        visibility: i.visibility,
        info: Type::Unit,
        position: i.position,
    }
}

fn check_behavior(ctx: &mut Context, b: BehaviorDecl<()>) -> BehaviorDecl<Type> {
    ctx.push_generics(generic_names(&b.generics));
    let self_type = Type::Named {
        path: Vec::new(),
        name: format!("{}::Self", b.name),
        args: Vec::new(),
    };
    let methods = b
        .methods
        .into_iter()
        .map(|m| {
            if m.body.is_some() {
                check_method(ctx, m, self_type.clone())
            } else {
                ctx.push_scope();
                let return_type = m
                    .return_type
                    .as_ref()
                    .map(|t| resolve_type_name(ctx, t))
                    .unwrap_or(Type::Unit);
                let params = check_params(ctx, m.params);
                ctx.pop_scope();
                MethodDecl {
                    name: m.name,
                    generics: m.generics,
                    params,
                    return_type: m.return_type,
                    where_clause: m.where_clause,
                    body: None,
                    decorators: m.decorators,
                    doc: m.doc,
                    visibility: m.visibility,
                    is_static: m.is_static,
                    is_virtual: m.is_virtual,
                    is_override: m.is_override,
                    is_abstract: m.is_abstract,
                    takes_this: m.takes_this,
                    this_mut: m.this_mut,
                    info: return_type,
                    position: m.position,
                }
            }
        })
        .collect();
    let constants = b.constants.into_iter().map(|c| check_const(ctx, c)).collect();
    ctx.pop_generics();
    BehaviorDecl {
        name: b.name,
        generics: b.generics,
        methods,
        associated_types: b.associated_types,
        constants,
        doc: b.doc,
        visibility: b.visibility,
        info: Type::Unit,
        position: b.position,
    }
}

fn check_impl(ctx: &mut Context, i: ImplDecl<()>) -> ImplDecl<Type> {
    ctx.push_generics(generic_names(&i.generics));
    let target = resolve_type_name(ctx, &i.target);
    let trait_name = i.trait_ref.as_ref().map(|t| resolve_type_name(ctx, t));

    if let (Some(Type::Named { name: tname, .. }), Type::Named { name: target_name, .. }) =
        (&trait_name, &target)
    {
        if let Some(behavior) = ctx.env.behaviors.get(tname).cloned() {
            let provided: HashSet<&str> = i
                .items
                .iter()
                .filter_map(|item| match item {
                    ImplItem::Method(m) => Some(m.name.as_str()),
                    _ => None,
                })
                .collect();
            for required in &behavior.methods {
                if behavior.methods_with_default.contains(required) {
                    continue;
                }
                if !provided.contains(required.as_str()) {
                    ctx.diagnostics.push(Diagnostic::ty(
                        code::INCOMPLETE_IMPL,
                        format!("impl of `{tname}` for `{target_name}` is missing `{required}`"),
                        i.position,
                    ));
                }
            }
        }
    }

    let items = i
        .items
        .into_iter()
        .map(|item| match item {
            ImplItem::Method(m) => ImplItem::Method(check_method(ctx, m, target.clone())),
            ImplItem::AssociatedType { name, target: t, position } => {
                resolve_type_name(ctx, &t);
                ImplItem::AssociatedType { name, target: t, position }
            }
            ImplItem::Const(c) => ImplItem::Const(check_const(ctx, c)),
        })
        .collect();
    ctx.pop_generics();
    ImplDecl {
        generics: i.generics,
        trait_ref: i.trait_ref,
        target: i.target,
        where_clause: i.where_clause,
        items,
        info: target,
        position: i.position,
    }
}

fn check_type_alias(ctx: &mut Context, t: TypeAliasDecl<()>) -> TypeAliasDecl<Type> {
    ctx.push_generics(generic_names(&t.generics));
    let resolved = resolve_type_name(ctx, &t.target);
    ctx.pop_generics();
    TypeAliasDecl {
        name: t.name,
        generics: t.generics,
        target: t.target,
        doc: t.doc,
        visibility: t.visibility,
        info: resolved,
        position: t.position,
    }
}

fn check_const(ctx: &mut Context, c: ConstDecl<()>) -> ConstDecl<Type> {
    let declared = c.type_annotation.as_ref().map(|t| resolve_type_name(ctx, t));
    let value = infer_expr(ctx, c.value);
    let value_ty = value.get_info();
    if let Some(declared) = &declared {
        check_assignable(ctx, declared, &value_ty, value.position());
    }
    if !is_const_expr(&value) {
        ctx.diagnostics.push(Diagnostic::ty(
            code::NON_CONST_INITIALIZER,
            format!("initializer for const `{}` is not a compile-time constant", c.name),
            value.position(),
        ));
    }
    check_const_div_by_zero(ctx, &value);
    let info = declared.unwrap_or(value_ty);
    ConstDecl {
        name: c.name,
        type_annotation: c.type_annotation,
        value,
        visibility: c.visibility,
        doc: c.doc,
        info,
        position: c.position,
    }
}

fn is_const_expr(expr: &crate::ast::Expression<Type>) -> bool {
    use crate::ast::Expression;
    match expr {
        Expression::Literal { .. } => true,
        Expression::Unary(u) => is_const_expr(&u.operand),
        Expression::Binary(b) => is_const_expr(&b.left) && is_const_expr(&b.right),
        Expression::Tuple { elements, .. } | Expression::ArrayLiteral { elements, .. } => {
            elements.iter().all(is_const_expr)
        }
        Expression::Parens(inner) => is_const_expr(inner),
        _ => false,
    }
}

/// Integer division/remainder by a literal zero inside a const initializer
/// is an invariant failure, not a runtime condition — §4.11 requires it be
/// caught at check time rather than lowered into a `tml_panic` call.
fn check_const_div_by_zero(ctx: &mut Context, expr: &crate::ast::Expression<Type>) {
    use crate::ast::{BinaryOperator, Expression, LiteralValue};
    if let Expression::Binary(b) = expr {
        if matches!(b.operator, BinaryOperator::Div | BinaryOperator::Rem) {
            if let Expression::Literal { value: LiteralValue::Int { value: 0, .. }, .. } = &b.right {
                ctx.diagnostics.push(Diagnostic::ty(
                    code::DIV_BY_ZERO,
                    "division by zero in constant expression",
                    b.right.position(),
                ));
            }
        }
        check_const_div_by_zero(ctx, &b.left);
        check_const_div_by_zero(ctx, &b.right);
    }
}

fn check_module_decl(ctx: &mut Context, m: ModuleDecl<()>) -> ModuleDecl<Type> {
    let body = m.body.map(|decls| decls.into_iter().map(|d| check_declaration(ctx, d)).collect());
    ModuleDecl {
        name: m.name,
        body,
        position: m.position,
    }
}

fn check_namespace(ctx: &mut Context, n: NamespaceDecl<()>) -> NamespaceDecl<Type> {
    let body = n.body.into_iter().map(|d| check_declaration(ctx, d)).collect();
    NamespaceDecl {
        path: n.path,
        body,
        position: n.position,
    }
}
