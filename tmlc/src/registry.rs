//! The shallow, forward-reference-friendly pass that walks a parsed module
//! once before any body is deep-checked, registering every top-level name
//! into a [`TypeEnv`]. Mirrors the teacher's `ShallowCheck` phase: a struct
//! used before its declaration in source order must still resolve.

use std::collections::HashMap;

use crate::ast::{ClassMember, Declaration, Module, Visibility};
use crate::diagnostics::{Diagnostic, DiagnosticBag};
use crate::types::{
    BehaviorInfo, ClassInfo, EnumInfo, EnumVariantInfo, EnumVariantShape, FieldInfo,
    FunctionSignature, ImplInfo, StructInfo, Type, TypeEnv, VtableSlot,
};

/// A second tiny context just for resolving `TypeName`s during registration,
/// where no local scope or `Self` exists yet — only the generics declared
/// on the item currently being registered.
struct RegCtx<'a> {
    env: &'a TypeEnv,
    generics: std::collections::HashSet<String>,
}

impl<'a> RegCtx<'a> {
    fn resolve(&self, tn: &crate::ast::TypeName) -> Type {
        crate::typechecker::resolve_type_name_shallow(self.env, &self.generics, tn)
    }
}

pub fn register_module(module: &Module<()>, env: &mut TypeEnv, diagnostics: &mut DiagnosticBag) {
    // Pass 1: names only, so mutually-referencing structs/enums/classes can
    // resolve each other's field types in pass 2 regardless of source order.
    for decl in &module.declarations {
        pre_register(decl, env);
    }
    // Pass 2: field/signature bodies, now that every name above is known.
    for decl in &module.declarations {
        register_decl(decl, env, diagnostics);
    }
}

fn pre_register(decl: &Declaration<()>, env: &mut TypeEnv) {
    match decl {
        Declaration::Struct(d) => {
            env.structs.entry(d.name.clone()).or_insert_with(|| StructInfo {
                name: d.name.clone(),
                generics: d.generics.iter().map(|g| g.name.clone()).collect(),
                fields: Vec::new(),
            });
        }
        Declaration::Enum(d) => {
            env.enums.entry(d.name.clone()).or_insert_with(|| EnumInfo {
                name: d.name.clone(),
                generics: d.generics.iter().map(|g| g.name.clone()).collect(),
                variants: Vec::new(),
            });
        }
        Declaration::Class(d) => {
            env.classes.entry(d.name.clone()).or_insert_with(|| ClassInfo {
                name: d.name.clone(),
                generics: d.generics.iter().map(|g| g.name.clone()).collect(),
                extends: None,
                implements: Vec::new(),
                fields: Vec::new(),
                vtable: Vec::new(),
                is_abstract: d.is_abstract,
                is_sealed: d.is_sealed,
                is_value_class_candidate: false,
            });
        }
        Declaration::Behavior(d) => {
            env.behaviors.entry(d.name.clone()).or_insert_with(|| BehaviorInfo {
                name: d.name.clone(),
                generics: d.generics.iter().map(|g| g.name.clone()).collect(),
                methods: Vec::new(),
                methods_with_default: Vec::new(),
                associated_types: d.associated_types.clone(),
            });
        }
        Declaration::Module(d) => {
            if let Some(body) = &d.body {
                for inner in body {
                    pre_register(inner, env);
                }
            }
        }
        Declaration::Namespace(d) => {
            for inner in &d.body {
                pre_register(inner, env);
            }
        }
        _ => {}
    }
}

fn register_decl(decl: &Declaration<()>, env: &mut TypeEnv, diagnostics: &mut DiagnosticBag) {
    match decl {
        Declaration::Function(f) => {
            let generics: std::collections::HashSet<_> =
                f.generics.iter().map(|g| g.name.clone()).collect();
            let reg = RegCtx { env, generics: generics.clone() };
            let params = f.params.iter().map(|p| {
                p.type_annotation
                    .as_ref()
                    .map(|t| reg.resolve(t))
                    .unwrap_or(Type::Unknown)
            }).collect();
            let return_type = f
                .return_type
                .as_ref()
                .map(|t| reg.resolve(t))
                .unwrap_or(Type::Unit);
            env.functions.insert(
                f.name.clone(),
                FunctionSignature {
                    name: f.name.clone(),
                    generics: f.generics.iter().map(|g| g.name.clone()).collect(),
                    params,
                    return_type,
                    is_async: f.is_async,
                    visibility: f.visibility,
                },
            );
        }
        Declaration::Struct(d) => {
            let generics: std::collections::HashSet<_> =
                d.generics.iter().map(|g| g.name.clone()).collect();
            let reg = RegCtx { env, generics };
            let mut seen = HashMap::new();
            let mut fields = Vec::new();
            for f in &d.fields {
                if seen.insert(f.name.clone(), ()).is_some() {
                    diagnostics.push(Diagnostic::ty(
                        "E_DUPLICATE_FIELD",
                        format!("duplicate field `{}` in struct `{}`", f.name, d.name),
                        f.position,
                    ));
                    continue;
                }
                fields.push(FieldInfo {
                    name: f.name.clone(),
                    ty: reg.resolve(&f.type_annotation),
                    visibility: f.visibility,
                });
            }
            env.structs.insert(
                d.name.clone(),
                StructInfo {
                    name: d.name.clone(),
                    generics: d.generics.iter().map(|g| g.name.clone()).collect(),
                    fields,
                },
            );
        }
        Declaration::Enum(d) => {
            let generics: std::collections::HashSet<_> =
                d.generics.iter().map(|g| g.name.clone()).collect();
            let reg = RegCtx { env, generics };
            let mut variants = Vec::new();
            for (tag, v) in d.variants.iter().enumerate() {
                let shape = match &v.payload {
                    crate::ast::EnumVariantPayload::Unit => EnumVariantShape::Unit,
                    crate::ast::EnumVariantPayload::Tuple(types) => {
                        EnumVariantShape::Tuple(types.iter().map(|t| reg.resolve(t)).collect())
                    }
                    crate::ast::EnumVariantPayload::Struct(fields) => EnumVariantShape::Struct(
                        fields
                            .iter()
                            .map(|f| FieldInfo {
                                name: f.name.clone(),
                                ty: reg.resolve(&f.type_annotation),
                                visibility: f.visibility,
                            })
                            .collect(),
                    ),
                };
                variants.push(EnumVariantInfo {
                    name: v.name.clone(),
                    tag: tag as u32,
                    shape,
                });
            }
            env.enums.insert(
                d.name.clone(),
                EnumInfo {
                    name: d.name.clone(),
                    generics: d.generics.iter().map(|g| g.name.clone()).collect(),
                    variants,
                },
            );
        }
        Declaration::Union(d) => {
            // A union shares a struct's field-list shape but every field
            // overlays the same storage; the registry keeps it in `structs`
            // since the only thing downstream passes need is named fields.
            let generics: std::collections::HashSet<_> =
                d.generics.iter().map(|g| g.name.clone()).collect();
            let reg = RegCtx { env, generics };
            let fields = d
                .variants
                .iter()
                .map(|f| FieldInfo {
                    name: f.name.clone(),
                    ty: reg.resolve(&f.type_annotation),
                    visibility: f.visibility,
                })
                .collect();
            env.structs.insert(
                d.name.clone(),
                StructInfo {
                    name: d.name.clone(),
                    generics: d.generics.iter().map(|g| g.name.clone()).collect(),
                    fields,
                },
            );
        }
        Declaration::Class(d) => {
            let generics: std::collections::HashSet<_> =
                d.generics.iter().map(|g| g.name.clone()).collect();
            let reg = RegCtx { env, generics };
            let extends = d.extends.as_ref().map(|t| named_base(&reg.resolve(t)));
            let implements = d
                .implements
                .iter()
                .map(|t| named_base(&reg.resolve(t)))
                .collect();
            let mut fields = Vec::new();
            let mut vtable = Vec::new();
            for member in &d.members {
                match member {
                    ClassMember::Field(f) => fields.push(FieldInfo {
                        name: f.name.clone(),
                        ty: reg.resolve(&f.type_annotation),
                        visibility: f.visibility,
                    }),
                    ClassMember::Method(m) if m.is_virtual || m.is_override => {
                        vtable.push(VtableSlot {
                            method_name: m.name.clone(),
                            owner_class: d.name.clone(),
                        });
                    }
                    _ => {}
                }
            }
            let is_value_class_candidate = d.is_sealed && vtable.is_empty() && extends.is_none();
            env.classes.insert(
                d.name.clone(),
                ClassInfo {
                    name: d.name.clone(),
                    generics: d.generics.iter().map(|g| g.name.clone()).collect(),
                    extends,
                    implements,
                    fields,
                    vtable,
                    is_abstract: d.is_abstract,
                    is_sealed: d.is_sealed,
                    is_value_class_candidate,
                },
            );
        }
        Declaration::Interface(d) => {
            // Interfaces are registered as behaviors with no default bodies
            // tracked (method bodies, if any, are checked but every method
            // counts as "required" for implementors).
            env.behaviors.insert(
                d.name.clone(),
                BehaviorInfo {
                    name: d.name.clone(),
                    generics: d.generics.iter().map(|g| g.name.clone()).collect(),
                    methods: d.methods.iter().map(|m| m.name.clone()).collect(),
                    methods_with_default: Vec::new(),
                    associated_types: Vec::new(),
                },
            );
        }
        Declaration::Behavior(d) => {
            let with_default = d
                .methods
                .iter()
                .filter(|m| m.body.is_some())
                .map(|m| m.name.clone())
                .collect();
            env.behaviors.insert(
                d.name.clone(),
                BehaviorInfo {
                    name: d.name.clone(),
                    generics: d.generics.iter().map(|g| g.name.clone()).collect(),
                    methods: d.methods.iter().map(|m| m.name.clone()).collect(),
                    methods_with_default: with_default,
                    associated_types: d.associated_types.clone(),
                },
            );
        }
        Declaration::Impl(d) => {
            let generics: std::collections::HashSet<_> =
                d.generics.iter().map(|g| g.name.clone()).collect();
            let reg = RegCtx { env, generics };
            let target = reg.resolve(&d.target);
            if matches!(target, Type::Dyn { .. }) {
                diagnostics.push(Diagnostic::ty(
                    "E_IMPL_FOR_DYN",
                    "an impl target cannot be a `dyn` behavior object",
                    d.position,
                ));
                return;
            }
            let target_name = named_base(&target);
            let trait_ref = d.trait_ref.as_ref().map(|t| reg.resolve(t));
            let (trait_name, trait_args) = match &trait_ref {
                Some(Type::Named { name, args, .. }) => (Some(name.clone()), args.clone()),
                _ => (None, Vec::new()),
            };
            let mut methods = Vec::new();
            let mut type_bindings = HashMap::new();
            for item in &d.items {
                match item {
                    crate::ast::ImplItem::Method(m) => methods.push(m.name.clone()),
                    crate::ast::ImplItem::AssociatedType { name, target, .. } => {
                        type_bindings.insert(name.clone(), reg.resolve(target));
                    }
                    crate::ast::ImplItem::Const(_) => {}
                }
            }
            env.register_impl(
                &target_name,
                ImplInfo {
                    generics: d.generics.iter().map(|g| g.name.clone()).collect(),
                    trait_name,
                    trait_args,
                    target,
                    methods,
                    type_bindings,
                },
            );
        }
        Declaration::TypeAlias(d) => {
            let generics: std::collections::HashSet<_> =
                d.generics.iter().map(|g| g.name.clone()).collect();
            let reg = RegCtx { env, generics };
            let resolved = reg.resolve(&d.target);
            env.type_aliases.insert(d.name.clone(), resolved);
        }
        Declaration::Const(d) => {
            let reg = RegCtx { env, generics: Default::default() };
            let ty = d
                .type_annotation
                .as_ref()
                .map(|t| reg.resolve(t))
                .unwrap_or(Type::Unknown);
            env.constants.insert(d.name.clone(), ty);
        }
        Declaration::Use(_) => {}
        Declaration::Module(d) => {
            if let Some(body) = &d.body {
                for inner in body {
                    register_decl(inner, env, diagnostics);
                }
            }
        }
        Declaration::Namespace(d) => {
            for inner in &d.body {
                register_decl(inner, env, diagnostics);
            }
        }
    }
}

fn named_base(ty: &Type) -> String {
    match ty {
        Type::Named { name, .. } => name.clone(),
        other => other.to_string(),
    }
}

/// Visibility is carried straight through from the AST today; the registry
/// doesn't yet enforce cross-module privacy (that needs the multi-module
/// driver, not yet wired — see `DESIGN.md`).
#[allow(dead_code)]
fn is_public(v: Visibility) -> bool {
    matches!(v, Visibility::Public)
}
