//! Type lowering: semantic `Type` → the LLVM IR type grammar (§4.5).

use crate::types::{FloatWidth, IntWidth, Type, TypeEnv};

use super::mangle::mangle_struct_name;
use super::Emitter;

/// Lowers `t` to its textual LLVM type. `for_data` distinguishes a type used
/// as a value slot (`Unit` → `{}`) from one used at a return position
/// (`Unit`/`Never` → `void`).
pub fn llvm_type_from_semantic(ty: &Type, env: &TypeEnv, for_data: bool) -> String {
    match ty {
        Type::Int { width, .. } => format!("i{}", int_bits(*width)),
        Type::Float(FloatWidth::W32) => "float".to_string(),
        Type::Float(FloatWidth::W64) => "double".to_string(),
        Type::Bool => "i1".to_string(),
        Type::Char => "i32".to_string(),
        Type::Str => "ptr".to_string(),
        Type::Unit => if for_data { "{}".to_string() } else { "void".to_string() },
        Type::Never => "void".to_string(),
        Type::Reference { .. } | Type::RawPointer { .. } => "ptr".to_string(),
        Type::Function { .. } => "{ptr, ptr}".to_string(),
        Type::Array { element, size } => {
            format!("[{size} x {}]", llvm_type_from_semantic(element, env, true))
        }
        Type::Slice { .. } => "{ptr, i64}".to_string(),
        Type::Tuple(elements) => {
            let parts = elements
                .iter()
                .map(|e| llvm_type_from_semantic(e, env, true))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{{parts}}}")
        }
        Type::Named { name, args, .. } => {
            let mangled = mangle_struct_name(name, args);
            if env.enums.contains_key(name) || env.structs.contains_key(name) {
                format!("%struct.{mangled}")
            } else if let Some(class) = env.classes.get(name) {
                if class.is_value_class_candidate {
                    format!("%class.{mangled}")
                } else {
                    "ptr".to_string()
                }
            } else {
                format!("%struct.{mangled}")
            }
        }
        Type::Dyn { behavior, .. } => format!("%dyn.{behavior}"),
        Type::ImplBehavior { .. } => "ptr".to_string(),
        Type::Generic(_) => "ptr".to_string(),
        Type::Unknown => "ptr".to_string(),
    }
}

/// Ensures `%dyn.{behavior} = type { ptr, ptr }` is declared before first
/// use — the fat-pointer layout (data ptr, vtable ptr) every `dyn` value and
/// vtable dispatch call site assumes.
pub fn ensure_dyn_type(emitter: &mut Emitter, behavior: &str) {
    if emitter.generated_types.insert(format!("dyn.{behavior}")) {
        emitter
            .type_defs
            .push_str(&format!("%dyn.{behavior} = type {{ ptr, ptr }}\n"));
    }
}

/// Walks `ty` for any `dyn B` it mentions — directly, behind a reference, or
/// nested in a tuple/array/function signature — and declares each one.
pub fn declare_dyn_types(emitter: &mut Emitter, ty: &Type) {
    match ty {
        Type::Dyn { behavior, .. } => ensure_dyn_type(emitter, behavior),
        Type::Reference { inner, .. } | Type::RawPointer { inner, .. } => declare_dyn_types(emitter, inner),
        Type::Array { element, .. } | Type::Slice { element } => declare_dyn_types(emitter, element),
        Type::Tuple(elements) => elements.iter().for_each(|e| declare_dyn_types(emitter, e)),
        Type::Function { params, ret } => {
            params.iter().for_each(|p| declare_dyn_types(emitter, p));
            declare_dyn_types(emitter, ret);
        }
        Type::Named { args, .. } => args.iter().for_each(|a| declare_dyn_types(emitter, a)),
        _ => {}
    }
}

fn int_bits(w: IntWidth) -> u32 {
    match w {
        IntWidth::Size => 64,
        other => other.bits(),
    }
}

/// Size in bytes of a type's LLVM lowering, used to compute an enum's
/// maximum-variant payload size (§4.6).
pub fn approx_byte_size(ty: &Type, env: &TypeEnv) -> u64 {
    match ty {
        Type::Int { width, .. } => (int_bits(*width) / 8).max(1) as u64,
        Type::Float(FloatWidth::W32) => 4,
        Type::Float(FloatWidth::W64) => 8,
        Type::Bool => 1,
        Type::Char => 4,
        Type::Unit | Type::Never => 0,
        Type::Str | Type::Reference { .. } | Type::RawPointer { .. } | Type::Function { .. } => 8,
        Type::Array { element, size } => approx_byte_size(element, env) * size,
        Type::Slice { .. } => 16,
        Type::Tuple(elements) => elements.iter().map(|e| approx_byte_size(e, env)).sum(),
        Type::Named { name, .. } => env
            .structs
            .get(name)
            .map(|s| s.fields.iter().map(|f| approx_byte_size(&f.ty, env)).sum())
            .unwrap_or(8),
        Type::Dyn { .. } => 16,
        Type::ImplBehavior { .. } | Type::Generic(_) | Type::Unknown => 8,
    }
}
