//! Generic instantiation (§4.8). Generic functions, structs, and enums are
//! never emitted directly — a concrete use site calls `require_*_instantiation`,
//! which records the demand; `generate_pending_instantiations` drains the
//! queue to a fixpoint after the declaration pass, since instantiating one
//! generic body can itself reference another not-yet-instantiated one.

use std::collections::HashSet;

use crate::ast::{Declaration, FunctionDecl, MethodDecl, Module};
use crate::types::{Substitution, Type};

use super::mangle::{mangle_func_name, mangle_struct_name};
use super::Emitter;

/// A safety cap on instantiation fixpoint rounds — a well-formed program
/// never approaches this; it exists so a runaway mutually-recursive generic
/// chain fails with a diagnosable invariant instead of hanging.
const MAX_ROUNDS: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct PendingInstantiations {
    pub functions: Vec<(String, Vec<Type>)>,
    pub structs: Vec<(String, Vec<Type>)>,
    pub enums: Vec<(String, Vec<Type>)>,
    pub impl_methods: Vec<ImplMethodRequest>,
    seen_functions: HashSet<String>,
    seen_structs: HashSet<String>,
    seen_enums: HashSet<String>,
    seen_impl_methods: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct ImplMethodRequest {
    pub target: Type,
    pub method: String,
    pub type_args: Vec<Type>,
}

impl Emitter<'_> {
    /// Step 1 of the 4-step protocol: if `base` with `args` was already
    /// generated or queued, this is a no-op; otherwise it's queued for the
    /// next fixpoint round and its mangled name is returned immediately so
    /// the call site can reference it before the body exists.
    pub fn require_function_instantiation(&mut self, base: &str, args: &[Type]) -> String {
        let mangled = mangle_func_name(base, args);
        if self.generated_functions.contains(&mangled) || self.pending.seen_functions.contains(&mangled) {
            return mangled;
        }
        self.pending.seen_functions.insert(mangled.clone());
        self.pending.functions.push((base.to_string(), args.to_vec()));
        mangled
    }

    pub fn require_struct_instantiation(&mut self, base: &str, args: &[Type]) -> String {
        let mangled = mangle_struct_name(base, args);
        if self.generated_types.contains(&mangled) || self.pending.seen_structs.contains(&mangled) {
            return mangled;
        }
        self.pending.seen_structs.insert(mangled.clone());
        self.pending.structs.push((base.to_string(), args.to_vec()));
        mangled
    }

    pub fn require_enum_instantiation(&mut self, base: &str, args: &[Type]) -> String {
        let mangled = mangle_struct_name(base, args);
        if self.generated_types.contains(&mangled) || self.pending.seen_enums.contains(&mangled) {
            return mangled;
        }
        self.pending.seen_enums.insert(mangled.clone());
        self.pending.enums.push((base.to_string(), args.to_vec()));
        mangled
    }

    /// The 6-step impl-method protocol: recovers the owning impl from
    /// `target`'s base name plus `method`, builds the substitution from the
    /// target's own type arguments (a mangled owner name like `Range__I64`
    /// recovers as `T ↦ I64` via `parse_mangled_type_string` when the
    /// `Type` itself isn't already carrying its arguments), and queues the
    /// specialized body.
    pub fn require_impl_method_instantiation(&mut self, target: &Type, method: &str, type_args: &[Type]) -> String {
        let target_args = match target {
            Type::Named { args, .. } => args.clone(),
            _ => Vec::new(),
        };
        let owner = mangle_struct_name(&type_base_name(target), &target_args);
        let key = format!("{owner}::{method}::{}", mangle_struct_name("", type_args));
        let fn_name = format!("tml_{owner}_{method}");
        if self.generated_impl_methods.contains(&key) || self.pending.seen_impl_methods.contains(&key) {
            return fn_name;
        }
        self.pending.seen_impl_methods.insert(key);
        self.pending.impl_methods.push(ImplMethodRequest {
            target: target.clone(),
            method: method.to_string(),
            type_args: type_args.to_vec(),
        });
        fn_name
    }
}

fn type_base_name(ty: &Type) -> String {
    match ty {
        Type::Named { name, .. } => name.clone(),
        other => other.to_string(),
    }
}

/// Drains every pending queue to a fixpoint: instantiating a generic
/// function's body may itself call another generic function or reference
/// another generic struct, re-populating the queues, so this loops until a
/// round adds nothing new (or the safety cap trips).
pub fn generate_pending_instantiations(emitter: &mut Emitter) {
    for round in 0.. {
        if round >= MAX_ROUNDS {
            emitter.diagnostics.push(crate::diagnostics::Diagnostic::codegen_invariant(
                "INSTANTIATION_DID_NOT_CONVERGE",
                "generic instantiation did not reach a fixpoint within the round budget",
                crate::source::SourceSpan::synthetic(),
            ));
            break;
        }

        let structs = std::mem::take(&mut emitter.pending.structs);
        let enums = std::mem::take(&mut emitter.pending.enums);
        let functions = std::mem::take(&mut emitter.pending.functions);
        let impl_methods = std::mem::take(&mut emitter.pending.impl_methods);

        if structs.is_empty() && enums.is_empty() && functions.is_empty() && impl_methods.is_empty() {
            break;
        }

        for (base, args) in structs {
            super::decl::emit_struct_instantiation(emitter, &base, &args);
        }
        for (base, args) in enums {
            super::decl::emit_enum_instantiation(emitter, &base, &args);
        }
        for (base, args) in functions {
            super::decl::emit_function_instantiation(emitter, &base, &args);
        }
        for req in impl_methods {
            super::decl::emit_impl_method_instantiation(emitter, &req);
        }
    }
}

/// Builds the substitution a generic function's call site implies: explicit
/// `type_args` bind first, then per-parameter unification fills whatever
/// the caller left implicit.
pub fn build_call_substitution(decl_generics: &[String], explicit: &[Type], param_pairs: &[(Type, Type)]) -> Substitution {
    let mut subst = Substitution::new();
    for (name, ty) in decl_generics.iter().zip(explicit.iter()) {
        subst.bind(name.clone(), ty.clone());
    }
    for (param_ty, arg_ty) in param_pairs {
        arg_ty.unify_into(param_ty, &mut subst);
    }
    subst
}

pub fn find_function<'m>(module: &'m Module<Type>, name: &str) -> Option<&'m FunctionDecl<Type>> {
    find_function_in(&module.declarations, name)
}

fn find_function_in<'m>(decls: &'m [Declaration<Type>], name: &str) -> Option<&'m FunctionDecl<Type>> {
    for decl in decls {
        match decl {
            Declaration::Function(f) if f.name == name => return Some(f),
            Declaration::Module(m) => {
                if let Some(body) = &m.body {
                    if let Some(found) = find_function_in(body, name) {
                        return Some(found);
                    }
                }
            }
            Declaration::Namespace(n) => {
                if let Some(found) = find_function_in(&n.body, name) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

/// Finds the impl method matching `method` among the impls registered for
/// `target`'s base name, returning the owning impl's generics (for
/// substitution) and the method declaration itself.
pub fn find_impl_method<'m>(
    module: &'m Module<Type>,
    target_name: &str,
    method: &str,
) -> Option<(&'m [crate::ast::GenericParam], &'m MethodDecl<Type>)> {
    find_impl_method_in(&module.declarations, target_name, method)
}

fn find_impl_method_in<'m>(
    decls: &'m [Declaration<Type>],
    target_name: &str,
    method: &str,
) -> Option<(&'m [crate::ast::GenericParam], &'m MethodDecl<Type>)> {
    for decl in decls {
        match decl {
            Declaration::Impl(i) => {
                if type_name_base(&i.target) == target_name {
                    for item in &i.items {
                        if let crate::ast::ImplItem::Method(m) = item {
                            if m.name == method {
                                return Some((&i.generics, m));
                            }
                        }
                    }
                }
            }
            Declaration::Class(c) if c.name == target_name => {
                for member in &c.members {
                    if let crate::ast::ClassMember::Method(m) = member {
                        if m.name == method {
                            return Some((&c.generics, m));
                        }
                    }
                }
            }
            Declaration::Module(m) => {
                if let Some(body) = &m.body {
                    if let Some(found) = find_impl_method_in(body, target_name, method) {
                        return Some(found);
                    }
                }
            }
            Declaration::Namespace(n) => {
                if let Some(found) = find_impl_method_in(&n.body, target_name, method) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

fn type_name_base(tn: &crate::ast::TypeName) -> &str {
    match tn {
        crate::ast::TypeName::Named { name, .. } => name,
        crate::ast::TypeName::Dyn { behavior, .. } | crate::ast::TypeName::ImplBehavior { behavior, .. } => {
            type_name_base(behavior)
        }
        _ => "",
    }
}
