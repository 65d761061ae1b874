//! Lowers the parser's surface-syntax [`TypeName`] to the checker's
//! semantic [`Type`], and the handful of compatibility rules (coercions,
//! generic-friendly equality) every check function needs.

use std::collections::HashSet;

use crate::ast::TypeName;
use crate::types::{FloatWidth, IntWidth, Type, TypeEnv};

use super::context::Context;
use super::error::unknown_type;

pub fn resolve_type_name(ctx: &mut Context, tn: &TypeName) -> Type {
    let generics = ctx.current_generics().clone();
    let (ty, unknown) = resolve_inner(&ctx.env, &generics, ctx.current_self_type().cloned(), tn);
    if let Some((name, span)) = unknown {
        ctx.diagnostics.push(unknown_type(&name, span));
    }
    ty
}

/// Used by the registry, which has no `Context` (no local scope, no `Self`)
/// yet still needs to resolve field/signature types against generics
/// declared on the item being registered.
pub fn resolve_type_name_shallow(env: &TypeEnv, generics: &HashSet<String>, tn: &TypeName) -> Type {
    resolve_inner(env, generics, None, tn).0
}

fn resolve_inner(
    env: &TypeEnv,
    generics: &HashSet<String>,
    self_type: Option<Type>,
    tn: &TypeName,
) -> (Type, Option<(String, crate::source::SourceSpan)>) {
    match tn {
        TypeName::Named { path, name, type_args, position } => {
            if path.is_empty() {
                if let Some(prim) = primitive(name) {
                    return (prim, None);
                }
                if generics.contains(name) {
                    return (Type::Generic(name.clone()), None);
                }
                if name == "Self" {
                    return (self_type.unwrap_or(Type::Unknown), None);
                }
            }
            let mut unknown = None;
            let args = type_args
                .iter()
                .map(|a| {
                    let (t, u) = resolve_inner(env, generics, self_type.clone(), a);
                    unknown = unknown.or(u);
                    t
                })
                .collect::<Vec<_>>();
            if path.is_empty() && !known_name(env, name) {
                return (
                    Type::Unknown,
                    unknown.or(Some((name.clone(), *position))),
                );
            }
            if path.is_empty() && args.is_empty() {
                if let Some(alias) = env.type_aliases.get(name) {
                    return (alias.clone(), unknown);
                }
            }
            (
                Type::Named {
                    path: path.clone(),
                    name: name.clone(),
                    args,
                },
                unknown,
            )
        }
        TypeName::Reference { mutable, inner, .. } => {
            let (t, u) = resolve_inner(env, generics, self_type, inner);
            (Type::reference(*mutable, t), u)
        }
        TypeName::RawPointer { mutable, inner, .. } => {
            let (t, u) = resolve_inner(env, generics, self_type, inner);
            (
                Type::RawPointer {
                    mutable: *mutable,
                    inner: t.into(),
                },
                u,
            )
        }
        TypeName::Array { inner, size, .. } => {
            let (t, u) = resolve_inner(env, generics, self_type, inner);
            (
                Type::Array {
                    element: t.into(),
                    size: *size,
                },
                u,
            )
        }
        TypeName::Slice { inner, .. } => {
            let (t, u) = resolve_inner(env, generics, self_type, inner);
            (Type::Slice { element: t.into() }, u)
        }
        TypeName::Tuple { elements, .. } => {
            let mut unknown = None;
            let elems = elements
                .iter()
                .map(|e| {
                    let (t, u) = resolve_inner(env, generics, self_type.clone(), e);
                    unknown = unknown.or(u);
                    t
                })
                .collect();
            (Type::Tuple(elems), unknown)
        }
        TypeName::Function { params, ret, .. } => {
            let mut unknown = None;
            let params = params
                .iter()
                .map(|p| {
                    let (t, u) = resolve_inner(env, generics, self_type.clone(), p);
                    unknown = unknown.or(u);
                    t
                })
                .collect();
            let (r, u) = resolve_inner(env, generics, self_type, ret);
            unknown = unknown.or(u);
            (
                Type::Function {
                    params,
                    ret: r.into(),
                },
                unknown,
            )
        }
        TypeName::Dyn { behavior, .. } => {
            let (t, u) = resolve_inner(env, generics, self_type, behavior);
            match t {
                Type::Named { name, args, .. } => (Type::Dyn { behavior: name, args }, u),
                _ => (Type::Unknown, u),
            }
        }
        TypeName::ImplBehavior { behavior, .. } => {
            let (t, u) = resolve_inner(env, generics, self_type, behavior);
            match t {
                Type::Named { name, args, .. } => (Type::ImplBehavior { behavior: name, args }, u),
                _ => (Type::Unknown, u),
            }
        }
    }
}

fn known_name(env: &TypeEnv, name: &str) -> bool {
    env.structs.contains_key(name)
        || env.enums.contains_key(name)
        || env.classes.contains_key(name)
        || env.behaviors.contains_key(name)
        || env.type_aliases.contains_key(name)
}

fn primitive(name: &str) -> Option<Type> {
    use IntWidth::*;
    Some(match name {
        "I8" => Type::Int { width: W8, signed: true },
        "I16" => Type::Int { width: W16, signed: true },
        "I32" => Type::Int { width: W32, signed: true },
        "I64" => Type::Int { width: W64, signed: true },
        "I128" => Type::Int { width: W128, signed: true },
        "Isize" => Type::Int { width: Size, signed: true },
        "U8" => Type::Int { width: W8, signed: false },
        "U16" => Type::Int { width: W16, signed: false },
        "U32" => Type::Int { width: W32, signed: false },
        "U64" => Type::Int { width: W64, signed: false },
        "U128" => Type::Int { width: W128, signed: false },
        "Usize" => Type::Int { width: Size, signed: false },
        "F32" => Type::Float(FloatWidth::W32),
        "F64" => Type::Float(FloatWidth::W64),
        "Bool" => Type::Bool,
        "Char" => Type::Char,
        "Str" => Type::Str,
        "Unit" => Type::Unit,
        "Never" => Type::Never,
        _ => return None,
    })
}

/// Whether a value of type `found` may be used where `expected` is
/// required, allowing the coercions §4.4 names (never-to-anything,
/// narrower-to-wider integer of matching signedness) plus `Unknown` acting
/// as a wildcard so one unresolved name doesn't cascade into a pile of
/// follow-on mismatches. Also allows widening a concrete impl into a `dyn B`
/// value when `env` records an impl of `B` for the concrete type — the
/// unsizing coercion behind every boxing/dispatch call site in codegen.
pub fn compatible(env: &TypeEnv, expected: &Type, found: &Type) -> bool {
    if expected == found || matches!(expected, Type::Unknown) || matches!(found, Type::Unknown) {
        return true;
    }
    if found.is_never() {
        return true;
    }
    match (expected, found) {
        (
            Type::Int { width: ew, signed: es },
            Type::Int { width: fw, signed: fs },
        ) => es == fs && fw.bits() <= ew.bits(),
        (Type::Reference { mutable: em, inner: ei }, Type::Reference { mutable: fm, inner: fi }) => {
            (*em == *fm || *em) && compatible(env, ei, fi)
        }
        (Type::Slice { element: ee }, Type::Array { element: fe, .. }) => compatible(env, ee, fe),
        (Type::Function { params: ep, ret: er }, Type::Function { params: fp, ret: fr }) => {
            ep.len() == fp.len()
                && ep.iter().zip(fp.iter()).all(|(a, b)| compatible(env, a, b))
                && compatible(env, er, fr)
        }
        (Type::Tuple(e), Type::Tuple(f)) => {
            e.len() == f.len() && e.iter().zip(f.iter()).all(|(a, b)| compatible(env, a, b))
        }
        (Type::Named { name: en, args: ea, .. }, Type::Named { name: fn_, args: fa, .. }) => {
            en == fn_ && ea.len() == fa.len() && ea.iter().zip(fa.iter()).all(|(a, b)| compatible(env, a, b))
        }
        (Type::Dyn { behavior, args: dargs }, Type::Named { name, .. }) => env
            .impls_for(name)
            .iter()
            .any(|i| i.trait_name.as_deref() == Some(behavior.as_str()) && i.trait_args.len() == dargs.len()),
        (Type::Dyn { behavior: eb, args: ea }, Type::Dyn { behavior: fb, args: fa }) => {
            eb == fb && ea.len() == fa.len() && ea.iter().zip(fa.iter()).all(|(a, b)| compatible(env, a, b))
        }
        _ => false,
    }
}
