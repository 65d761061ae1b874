//! Declaration emission (§4.6): struct/enum/class layouts, free functions,
//! impl methods, and const globals. Non-generic declarations are emitted
//! during the single declaration pass; generic ones are only emitted once
//! `monomorphize::require_*_instantiation` demands a concrete instance.

use crate::ast::{
    ClassDecl, ClassMember, Declaration, EnumDecl, EnumVariantPayload, FunctionDecl, ImplItem, Module, StructDecl,
    Visibility,
};
use crate::types::{Substitution, Type};

use super::mangle::{mangle_func_name, mangle_struct_name};
use super::monomorphize::{find_function, find_impl_method, ImplMethodRequest};
use super::types::{approx_byte_size, declare_dyn_types, llvm_type_from_semantic};
use super::Emitter;

pub fn emit_module_declarations(emitter: &mut Emitter, module: &Module<Type>) {
    emit_declarations(emitter, &module.declarations);
}

fn emit_declarations(emitter: &mut Emitter, decls: &[Declaration<Type>]) {
    for decl in decls {
        match decl {
            Declaration::Function(f) if f.generics.is_empty() && f.body.is_some() => {
                emit_function(emitter, f, &f.name, &Substitution::new());
            }
            Declaration::Struct(s) if s.generics.is_empty() => emit_struct(emitter, s, &[]),
            Declaration::Enum(e) if e.generics.is_empty() => emit_enum(emitter, e, &[]),
            Declaration::Union(u) if u.generics.is_empty() => emit_union(emitter, u),
            Declaration::Class(c) if c.generics.is_empty() => emit_class(emitter, c),
            Declaration::Impl(i) if i.generics.is_empty() => emit_impl_block(emitter, i),
            Declaration::Const(c) => emit_const(emitter, c),
            Declaration::Module(m) => {
                if let Some(body) = &m.body {
                    emit_declarations(emitter, body);
                }
            }
            Declaration::Namespace(n) => emit_declarations(emitter, &n.body),
            // Generic declarations, interfaces, behaviors (default methods
            // are specialized per concrete impl, not emitted standalone),
            // type aliases, and `use` carry no direct IR of their own.
            _ => {}
        }
    }
}

fn llvm(emitter: &Emitter, ty: &Type, for_data: bool) -> String {
    llvm_type_from_semantic(ty, emitter.env, for_data)
}

// ---------------------------------------------------------------- structs

fn emit_struct(emitter: &mut Emitter, s: &StructDecl<Type>, args: &[Type]) {
    let mangled = mangle_struct_name(&s.name, args);
    if !emitter.generated_types.insert(format!("struct.{mangled}")) {
        return;
    }
    let subst = generic_subst(&s.generics.iter().map(|g| g.name.clone()).collect::<Vec<_>>(), args);
    let field_types = s
        .fields
        .iter()
        .map(|f| {
            let ty = emitter.env.structs.get(&s.name).and_then(|info| {
                info.fields.iter().find(|fi| fi.name == f.name).map(|fi| subst.apply(&fi.ty))
            });
            let ty = ty.unwrap_or(Type::Unknown);
            llvm(emitter, &ty, true)
        })
        .collect::<Vec<_>>();
    emitter
        .type_defs
        .push_str(&format!("%struct.{mangled} = type {{ {} }}\n", field_types.join(", ")));
}

pub fn emit_struct_instantiation(emitter: &mut Emitter, base: &str, args: &[Type]) {
    let Some(decl) = find_struct(emitter.module, base) else {
        return;
    };
    emit_struct(emitter, &decl.clone(), args);
}

fn find_struct<'m>(module: &'m Module<Type>, name: &str) -> Option<&'m StructDecl<Type>> {
    find_in(&module.declarations, |d| match d {
        Declaration::Struct(s) if s.name == name => Some(s),
        _ => None,
    })
}

fn find_in<'m, F, R>(decls: &'m [Declaration<Type>], f: F) -> Option<R>
where
    F: Copy + Fn(&'m Declaration<Type>) -> Option<R>,
{
    for decl in decls {
        if let Some(found) = f(decl) {
            return Some(found);
        }
        match decl {
            Declaration::Module(m) => {
                if let Some(body) = &m.body {
                    if let Some(found) = find_in(body, f) {
                        return Some(found);
                    }
                }
            }
            Declaration::Namespace(n) => {
                if let Some(found) = find_in(&n.body, f) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

fn generic_subst(names: &[String], args: &[Type]) -> Substitution {
    let mut subst = Substitution::new();
    for (name, ty) in names.iter().zip(args.iter()) {
        subst.bind(name.clone(), ty.clone());
    }
    subst
}

// ------------------------------------------------------------------ enums

/// `{ i32 tag, [N x i8] payload }` where `N` is the widest variant's
/// approximate byte size — a uniform tagged-union layout. A `Unit`-payload
/// variant's slot is simply never read.
fn emit_enum(emitter: &mut Emitter, e: &EnumDecl<Type>, args: &[Type]) {
    let mangled = mangle_struct_name(&e.name, args);
    if !emitter.generated_types.insert(format!("struct.{mangled}")) {
        return;
    }
    let subst = generic_subst(&e.generics.iter().map(|g| g.name.clone()).collect::<Vec<_>>(), args);
    let max_payload = e
        .variants
        .iter()
        .map(|v| variant_payload_size(emitter, &e.name, &v.name, &subst))
        .max()
        .unwrap_or(0)
        .max(1);
    emitter.type_defs.push_str(&format!(
        "%struct.{mangled} = type {{ i32, [{max_payload} x i8] }}\n"
    ));
}

fn variant_payload_size(emitter: &Emitter, enum_name: &str, variant_name: &str, subst: &Substitution) -> u64 {
    let Some(info) = emitter.env.enums.get(enum_name) else {
        return 0;
    };
    let Some(variant) = info.variant(variant_name) else {
        return 0;
    };
    use crate::types::EnumVariantShape::*;
    match &variant.shape {
        Unit => 0,
        Tuple(types) => types.iter().map(|t| approx_byte_size(&subst.apply(t), emitter.env)).sum(),
        Struct(fields) => fields.iter().map(|f| approx_byte_size(&subst.apply(&f.ty), emitter.env)).sum(),
    }
}

pub fn emit_enum_instantiation(emitter: &mut Emitter, base: &str, args: &[Type]) {
    let decl = find_in(&emitter.module.declarations, |d| match d {
        Declaration::Enum(e) if e.name == base => Some(e.clone()),
        _ => None,
    });
    if let Some(decl) = decl {
        emit_enum(emitter, &decl, args);
    }
}

/// Treated as a plain struct of its variants laid out sequentially — this
/// crate has no use for C-style overlapping storage, so "union" here just
/// means "a struct whose fields are read selectively by convention".
fn emit_union(emitter: &mut Emitter, u: &crate::ast::UnionDecl<Type>) {
    let mangled = mangle_struct_name(&u.name, &[]);
    if !emitter.generated_types.insert(format!("struct.{mangled}")) {
        return;
    }
    let widths = u
        .variants
        .iter()
        .map(|f| {
            emitter
                .env
                .structs
                .get(&u.name)
                .and_then(|s| s.fields.iter().find(|fi| fi.name == f.name))
                .map(|fi| approx_byte_size(&fi.ty, emitter.env))
                .unwrap_or(8)
        })
        .max()
        .unwrap_or(8);
    emitter
        .type_defs
        .push_str(&format!("%struct.{mangled} = type {{ [{widths} x i8] }}\n"));
}

// ----------------------------------------------------------------- classes

/// Layout order is fixed: vtable pointer first (even if the class has no
/// virtual methods of its own — a subclass may add some), then the
/// embedded base class's own fields expanded inline, then this class's
/// fields.
fn emit_class(emitter: &mut Emitter, c: &ClassDecl<Type>) {
    let mangled = mangle_struct_name(&c.name, &[]);
    if !emitter.generated_types.insert(format!("class.{mangled}")) {
        return;
    }
    let Some(info) = emitter.env.classes.get(&c.name).cloned() else {
        return;
    };

    let mut field_types = vec!["ptr".to_string()];
    for ancestor in info.ancestors(&emitter.env.classes).into_iter().rev() {
        for f in &ancestor.fields {
            field_types.push(llvm(emitter, &f.ty, true));
        }
    }
    for f in &info.fields {
        field_types.push(llvm(emitter, &f.ty, true));
    }
    emitter
        .type_defs
        .push_str(&format!("%class.{mangled} = type {{ {} }}\n", field_types.join(", ")));

    for member in &c.members {
        match member {
            ClassMember::Field(f) if f.is_static => {
                let ty = llvm(emitter, &field_type_of(emitter, &c.name, &f.name), true);
                emitter
                    .globals
                    .push_str(&format!("@static.{}.{} = global {ty} zeroinitializer\n", c.name, f.name));
            }
            ClassMember::Method(m) if m.body.is_some() => {
                let fn_name = format!("tml_{}_{}", c.name, m.name);
                emit_method(emitter, m, &c.name, &fn_name, &Substitution::new());
            }
            ClassMember::Constructor(ctor) => {
                let fn_name = format!("tml_{}_new", c.name);
                emit_function_like(
                    emitter,
                    &fn_name,
                    &ctor.params,
                    &Type::reference(false, Type::Named { path: vec![], name: c.name.clone(), args: vec![] }),
                    &ctor.body,
                    Visibility::Public,
                    None,
                    &Substitution::new(),
                );
            }
            _ => {}
        }
    }
}

fn field_type_of(emitter: &Emitter, class_name: &str, field_name: &str) -> Type {
    emitter
        .env
        .classes
        .get(class_name)
        .and_then(|c| c.fields.iter().find(|f| f.name == field_name))
        .map(|f| f.ty.clone())
        .unwrap_or(Type::Unknown)
}

// --------------------------------------------------------------- functions

/// Finds an `@extern("abi", "symbol"?)` decorator, returning the ABI name
/// and the external symbol to bind to (falling back to the declared
/// function's own name when no explicit symbol argument is given).
fn extern_decorator(f: &FunctionDecl<Type>) -> Option<(&str, String)> {
    let deco = f.decorators.iter().find(|d| d.name == "extern")?;
    let abi = deco.string_arg(0).unwrap_or("C");
    let symbol = deco.string_arg(1).unwrap_or(&f.name).to_string();
    Some((abi, symbol))
}

fn calling_convention(abi: &str) -> &'static str {
    match abi {
        "stdcall" => "x86_stdcallcc ",
        "fastcall" => "x86_fastcallcc ",
        _ => "",
    }
}

fn emit_function(emitter: &mut Emitter, f: &FunctionDecl<Type>, mangled_name: &str, subst: &Substitution) {
    if !emitter.generated_functions.insert(mangled_name.to_string()) {
        return;
    }
    for link in f.decorators.iter().filter(|d| d.name == "link") {
        if let Some(lib) = link.string_arg(0) {
            if !emitter.extern_link_libs.iter().any(|l| l == lib) {
                emitter.extern_link_libs.push(lib.to_string());
            }
        }
    }
    if let Some((abi, symbol)) = extern_decorator(f) {
        if emitter.declared_externs.insert(symbol.clone()) {
            declare_dyn_types(emitter, &subst.apply(&f.info));
            let ret_llvm = llvm(emitter, &subst.apply(&f.info), false);
            let params = f
                .params
                .iter()
                .map(|p| {
                    let ty = subst.apply(&p.info);
                    declare_dyn_types(emitter, &ty);
                    llvm(emitter, &ty, true)
                })
                .collect::<Vec<_>>()
                .join(", ");
            let cconv = calling_convention(abi);
            emitter
                .functions
                .push_str(&format!("declare {cconv}{ret_llvm} @{symbol}({params})\n"));
        }
        return;
    }
    let Some(body) = &f.body else { return };
    let inline_attr = if f.decorators.iter().any(|d| d.name == "inline") { Some("alwaysinline") } else { None };
    emit_function_like(
        emitter,
        mangled_name,
        &f.params,
        &f.info,
        body,
        f.visibility,
        inline_attr,
        subst,
    );
}

fn emit_function_like(
    emitter: &mut Emitter,
    name: &str,
    params: &[crate::ast::Param<Type>],
    ret_ty: &Type,
    body: &crate::ast::Block<Type>,
    visibility: Visibility,
    inline_attr: Option<&str>,
    subst: &Substitution,
) {
    declare_dyn_types(emitter, &subst.apply(ret_ty));
    let ret_llvm = llvm(emitter, &subst.apply(ret_ty), false);
    let param_list = params
        .iter()
        .map(|p| {
            let ty = subst.apply(&p.info);
            declare_dyn_types(emitter, &ty);
            format!("{} %{}", llvm(emitter, &ty, true), p.name)
        })
        .collect::<Vec<_>>()
        .join(", ");
    let linkage = if matches!(visibility, Visibility::Private) || emitter.options.force_internal_linkage {
        "internal "
    } else {
        ""
    };
    let attr_suffix = inline_attr.map(|a| format!(" {a}")).unwrap_or_default();

    emitter
        .functions
        .push_str(&format!("define {linkage}{ret_llvm} @{name}({param_list}){attr_suffix} #0 {{\n"));
    emitter.functions.push_str("entry:\n");

    emitter.push_scope();
    for p in params {
        let slot = format!("%{}.addr", p.name);
        let ty = llvm(emitter, &subst.apply(&p.info), true);
        emitter.functions.push_str(&format!("  {slot} = alloca {ty}\n"));
        emitter.functions.push_str(&format!("  store {ty} %{}, ptr {slot}\n", p.name));
        emitter.bind_local(p.name.clone(), slot);
    }

    emitter.block_terminated = false;
    let (tail_ty, tail_val) = super::expr::gen_block(emitter, body, subst);

    if !emitter.block_terminated {
        if ret_llvm == "void" {
            emitter.functions.push_str("  ret void\n");
        } else if let Some(val) = tail_val {
            let coerced_ty = llvm(emitter, &tail_ty, true);
            if coerced_ty == ret_llvm {
                emitter.functions.push_str(&format!("  ret {ret_llvm} {val}\n"));
            } else {
                emitter.functions.push_str(&format!("  ret {ret_llvm} zeroinitializer\n"));
            }
        } else {
            emitter.functions.push_str(&format!("  ret {ret_llvm} zeroinitializer\n"));
        }
    }
    emitter.pop_scope();
    emitter.functions.push_str("}\n");
}

pub fn emit_function_instantiation(emitter: &mut Emitter, base: &str, args: &[Type]) {
    let Some(decl) = find_function(emitter.module, base).cloned() else {
        return;
    };
    let names = decl.generics.iter().map(|g| g.name.clone()).collect::<Vec<_>>();
    let subst = generic_subst(&names, args);
    let mangled = mangle_func_name(base, args);
    emit_function(emitter, &decl, &mangled, &subst);
}

fn emit_method(emitter: &mut Emitter, m: &crate::ast::MethodDecl<Type>, owner: &str, fn_name: &str, subst: &Substitution) {
    if !emitter.generated_functions.insert(fn_name.to_string()) {
        return;
    }
    let Some(body) = &m.body else { return };
    let this_ty = Type::reference(
        m.this_mut,
        Type::Named { path: vec![], name: owner.to_string(), args: vec![] },
    );
    declare_dyn_types(emitter, &subst.apply(&m.info));
    let ret_llvm = llvm(emitter, &subst.apply(&m.info), false);
    let mut params_text = Vec::new();
    if m.takes_this {
        params_text.push(format!("{} %this", llvm(emitter, &this_ty, true)));
    }
    for p in &m.params {
        let ty = subst.apply(&p.info);
        declare_dyn_types(emitter, &ty);
        params_text.push(format!("{} %{}", llvm(emitter, &ty, true), p.name));
    }
    let linkage = if matches!(m.visibility, Visibility::Private) || emitter.options.force_internal_linkage {
        "internal "
    } else {
        ""
    };
    emitter
        .functions
        .push_str(&format!("define {linkage}{ret_llvm} @{fn_name}({}) #0 {{\n", params_text.join(", ")));
    emitter.functions.push_str("entry:\n");
    emitter.push_scope();
    if m.takes_this {
        emitter.bind_local("this", "%this".to_string());
    }
    for p in &m.params {
        let slot = format!("%{}.addr", p.name);
        let ty = llvm(emitter, &subst.apply(&p.info), true);
        emitter.functions.push_str(&format!("  {slot} = alloca {ty}\n"));
        emitter.functions.push_str(&format!("  store {ty} %{}, ptr {slot}\n", p.name));
        emitter.bind_local(p.name.clone(), slot);
    }
    emitter.block_terminated = false;
    let (_, tail_val) = super::expr::gen_block(emitter, body, subst);
    if !emitter.block_terminated {
        if ret_llvm == "void" {
            emitter.functions.push_str("  ret void\n");
        } else if let Some(val) = tail_val {
            emitter.functions.push_str(&format!("  ret {ret_llvm} {val}\n"));
        } else {
            emitter.functions.push_str(&format!("  ret {ret_llvm} zeroinitializer\n"));
        }
    }
    emitter.pop_scope();
    emitter.functions.push_str("}\n");
}

fn emit_impl_block(emitter: &mut Emitter, i: &crate::ast::ImplDecl<Type>) {
    let target_name = impl_target_name(&i.target);
    for item in &i.items {
        if let ImplItem::Method(m) = item {
            if m.body.is_some() {
                let fn_name = format!("tml_{target_name}_{}", m.name);
                emit_method(emitter, m, &target_name, &fn_name, &Substitution::new());
            }
        }
    }
}

fn impl_target_name(tn: &crate::ast::TypeName) -> String {
    match tn {
        crate::ast::TypeName::Named { name, .. } => name.clone(),
        crate::ast::TypeName::Reference { inner, .. } | crate::ast::TypeName::RawPointer { inner, .. } => {
            impl_target_name(inner)
        }
        _ => String::new(),
    }
}

pub fn emit_impl_method_instantiation(emitter: &mut Emitter, req: &ImplMethodRequest) {
    let target_name = match &req.target {
        Type::Named { name, .. } => name.clone(),
        other => other.to_string(),
    };
    let Some((generics, method)) = find_impl_method(emitter.module, &target_name, &req.method).map(|(g, m)| (g.to_vec(), m.clone())) else {
        return;
    };
    let names = generics.iter().map(|g| g.name.clone()).collect::<Vec<_>>();
    let mut subst = generic_subst(&names, &req.type_args);
    if let Type::Named { args, .. } = &req.target {
        let target_generics = emitter
            .env
            .structs
            .get(&target_name)
            .map(|s| s.generics.clone())
            .or_else(|| emitter.env.classes.get(&target_name).map(|c| c.generics.clone()))
            .unwrap_or_default();
        subst = subst.merge(generic_subst(&target_generics, args));
    }
    let fn_name = format!("tml_{}_{}", mangle_struct_name(&target_name, target_args(&req.target)), req.method);
    emit_method(emitter, &method, &target_name, &fn_name, &subst);
}

fn target_args(ty: &Type) -> &[Type] {
    match ty {
        Type::Named { args, .. } => args,
        _ => &[],
    }
}

// --------------------------------------------------------------- constants

fn emit_const(emitter: &mut Emitter, c: &crate::ast::ConstDecl<Type>) {
    let ty = llvm(emitter, &c.info, true);
    let ir_value = const_literal_ir(&c.value);
    emitter
        .globals
        .push_str(&format!("@{} = internal constant {ty} {ir_value}\n", c.name));
}

/// Only literal and simple folded-constant shapes are representable as an
/// LLVM constant initializer directly; the checker's `is_const_expr` has
/// already rejected everything else before codegen ever sees this node, so
/// this only needs to cover what survives that gate.
fn const_literal_ir(expr: &crate::ast::Expression<Type>) -> String {
    use crate::ast::{Expression, LiteralValue};
    match expr.unwrap_parens() {
        Expression::Literal { value, .. } => match value {
            LiteralValue::Int { value, .. } => value.to_string(),
            LiteralValue::Float { value, .. } => format!("{value:e}"),
            LiteralValue::Bool(b) => if *b { "1".to_string() } else { "0".to_string() },
            LiteralValue::Char(c) => (*c as u32).to_string(),
            _ => "zeroinitializer".to_string(),
        },
        _ => "zeroinitializer".to_string(),
    }
}
