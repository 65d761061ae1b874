use crate::ast::{EnumPatternElements, Pattern};
use crate::types::{EnumVariantShape, Substitution, Type};

use super::context::Context;
use super::error::code;
use super::resolve::compatible;
use crate::diagnostics::Diagnostic;

/// Checks a pattern against the type it is matched against, binding every
/// name it introduces into the current scope. Always returns a `Pattern`
/// (never fails outright) so the caller can keep checking the rest of the
/// arm/let/for — a shape mismatch is reported but degrades to `Unknown`
/// rather than aborting the whole block.
pub fn check_pattern(ctx: &mut Context, pattern: Pattern<()>, expected: &Type) -> Pattern<Type> {
    match pattern {
        Pattern::Identifier { name, mutable, position, .. } => {
            ctx.bind(name.clone(), expected.clone());
            Pattern::Identifier {
                name,
                mutable,
                info: expected.clone(),
                position,
            }
        }
        Pattern::Wildcard { position, .. } => Pattern::Wildcard {
            info: expected.clone(),
            position,
        },
        Pattern::Literal { value, position, .. } => Pattern::Literal {
            value,
            info: expected.clone(),
            position,
        },
        Pattern::Tuple { elements, position, .. } => {
            let expected_elems: Vec<Type> = match expected {
                Type::Tuple(ts) if ts.len() == elements.len() => ts.clone(),
                _ => vec![Type::Unknown; elements.len()],
            };
            let elements = elements
                .into_iter()
                .zip(expected_elems)
                .map(|(p, t)| check_pattern(ctx, p, &t))
                .collect();
            Pattern::Tuple {
                elements,
                info: expected.clone(),
                position,
            }
        }
        Pattern::Array { elements, rest, position, .. } => {
            let element_ty = match expected {
                Type::Array { element, .. } | Type::Slice { element } => (**element).clone(),
                _ => Type::Unknown,
            };
            let elements = elements
                .into_iter()
                .map(|p| check_pattern(ctx, p, &element_ty))
                .collect();
            if let Some(Some(rest_name)) = &rest {
                ctx.bind(
                    rest_name.clone(),
                    Type::Slice {
                        element: element_ty.clone().into(),
                    },
                );
            }
            Pattern::Array {
                elements,
                rest,
                info: expected.clone(),
                position,
            }
        }
        Pattern::Struct { path, name, type_args, fields, has_rest, position, .. } => {
            let struct_info = ctx.env.structs.get(&name).cloned();
            let fields = fields
                .into_iter()
                .map(|(field_name, field_pat)| {
                    let field_ty = struct_info
                        .as_ref()
                        .and_then(|s| s.fields.iter().find(|f| f.name == field_name))
                        .map(|f| f.ty.clone())
                        .unwrap_or_else(|| {
                            ctx.diagnostics.push(Diagnostic::ty(
                                code::UNKNOWN_FIELD,
                                format!("struct `{name}` has no field `{field_name}`"),
                                field_pat.position(),
                            ));
                            Type::Unknown
                        });
                    (field_name, check_pattern(ctx, field_pat, &field_ty))
                })
                .collect();
            Pattern::Struct {
                path,
                name,
                type_args,
                fields,
                has_rest,
                info: expected.clone(),
                position,
            }
        }
        Pattern::EnumVariant { path, variant, elements, position, .. } => {
            let enum_name = match expected {
                Type::Named { name, .. } if ctx.env.enums.contains_key(name) => Some(name.clone()),
                _ => None,
            };
            let variant_info = enum_name
                .as_ref()
                .and_then(|n| ctx.env.enums.get(n))
                .and_then(|e| e.variant(&variant).cloned());
            if enum_name.is_some() && variant_info.is_none() {
                ctx.diagnostics.push(Diagnostic::ty(
                    code::UNKNOWN_VARIANT,
                    format!("enum has no variant `{variant}`"),
                    position,
                ));
            }
            let subst = match (expected, &enum_name) {
                (Type::Named { args, .. }, Some(n)) => {
                    let mut s = Substitution::new();
                    if let Some(info) = ctx.env.enums.get(n) {
                        for (g, a) in info.generics.iter().zip(args.iter()) {
                            s.bind(g.clone(), a.clone());
                        }
                    }
                    s
                }
                _ => Substitution::new(),
            };
            let elements = match (elements, variant_info.map(|v| v.shape)) {
                (EnumPatternElements::Tuple(pats), Some(EnumVariantShape::Tuple(types))) => {
                    let pats = pats
                        .into_iter()
                        .zip(types)
                        .map(|(p, t)| check_pattern(ctx, p, &subst.apply(&t)))
                        .collect();
                    EnumPatternElements::Tuple(pats)
                }
                (EnumPatternElements::Struct { fields, has_rest }, Some(EnumVariantShape::Struct(infos))) => {
                    let fields = fields
                        .into_iter()
                        .map(|(fname, fpat)| {
                            let ty = infos
                                .iter()
                                .find(|f| f.name == fname)
                                .map(|f| subst.apply(&f.ty))
                                .unwrap_or(Type::Unknown);
                            (fname, check_pattern(ctx, fpat, &ty))
                        })
                        .collect();
                    EnumPatternElements::Struct { fields, has_rest }
                }
                (EnumPatternElements::Unit, _) => EnumPatternElements::Unit,
                (other, _) => {
                    // Shape didn't match the resolved variant (or the
                    // variant/enum couldn't be resolved at all) — fall back
                    // to binding every sub-pattern at `Unknown` so later
                    // arms still get checked.
                    match other {
                        EnumPatternElements::Tuple(pats) => EnumPatternElements::Tuple(
                            pats.into_iter().map(|p| check_pattern(ctx, p, &Type::Unknown)).collect(),
                        ),
                        EnumPatternElements::Struct { fields, has_rest } => EnumPatternElements::Struct {
                            fields: fields
                                .into_iter()
                                .map(|(n, p)| (n, check_pattern(ctx, p, &Type::Unknown)))
                                .collect(),
                            has_rest,
                        },
                        EnumPatternElements::Unit => EnumPatternElements::Unit,
                    }
                }
            };
            Pattern::EnumVariant {
                path,
                enum_name,
                variant,
                elements,
                info: expected.clone(),
                position,
            }
        }
        Pattern::Or { alternatives, position, .. } => {
            let mut checked = Vec::with_capacity(alternatives.len());
            for (i, alt) in alternatives.into_iter().enumerate() {
                if i == 0 {
                    checked.push(check_pattern(ctx, alt, expected));
                } else {
                    ctx.push_scope();
                    checked.push(check_pattern(ctx, alt, expected));
                    ctx.pop_scope();
                }
            }
            Pattern::Or {
                alternatives: checked,
                info: expected.clone(),
                position,
            }
        }
    }
}

/// Whether `found` may stand in for `expected` at a pattern binding site —
/// reuses the expression-level coercion rules.
pub fn pattern_type_ok(env: &crate::types::TypeEnv, expected: &Type, found: &Type) -> bool {
    compatible(env, expected, found)
}
