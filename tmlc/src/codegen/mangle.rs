//! Name mangling (§4.5). The two tokens `__` and `_` are never produced
//! inside a primitive type's own name, which is what makes demangling by
//! splitting on `__` unambiguous.

use sha2::{Digest, Sha256};

use crate::types::{FloatWidth, IntWidth, Type};

/// Above this many bytes a literal `base__arg1__arg2…` name risks tripping a
/// systems linker's symbol-length ceiling; past it `mangle_struct_name`
/// switches to a content-hashed suffix. Chosen well below common linker
/// limits (~2000 bytes on most platforms) to leave headroom for further
/// `mangle_func_name`/owner-name wrapping.
const MANGLE_LENGTH_BUDGET: usize = 512;

pub fn mangle_type(ty: &Type) -> String {
    match ty {
        Type::Int { width, signed } => {
            let prefix = if *signed { "I" } else { "U" };
            format!("{prefix}{}", int_bits(*width))
        }
        Type::Float(FloatWidth::W32) => "F32".to_string(),
        Type::Float(FloatWidth::W64) => "F64".to_string(),
        Type::Bool => "Bool".to_string(),
        Type::Char => "Char".to_string(),
        Type::Str => "Str".to_string(),
        Type::Unit => "Unit".to_string(),
        Type::Never => "Never".to_string(),
        Type::Named { name, args, .. } => mangle_struct_name(name, args),
        Type::Reference { mutable: false, inner } => format!("ref_{}", mangle_type(inner)),
        Type::Reference { mutable: true, inner } => format!("mutref_{}", mangle_type(inner)),
        Type::RawPointer { mutable: false, inner } => format!("ptr_{}", mangle_type(inner)),
        Type::RawPointer { mutable: true, inner } => format!("mutptr_{}", mangle_type(inner)),
        Type::Array { element, size } => format!("arr_{}_{size}", mangle_type(element)),
        Type::Slice { element } => format!("slice_{}", mangle_type(element)),
        Type::Tuple(elements) => {
            let parts = elements.iter().map(mangle_type).collect::<Vec<_>>().join("__");
            format!("tuple_{parts}")
        }
        Type::Function { params, ret } => {
            let parts = params.iter().map(mangle_type).collect::<Vec<_>>().join("__");
            format!("fn_{parts}__ret_{}", mangle_type(ret))
        }
        Type::Dyn { behavior, args } => format!("dyn_{}", mangle_struct_name(behavior, args)),
        Type::ImplBehavior { behavior, args } => format!("impl_{}", mangle_struct_name(behavior, args)),
        Type::Generic(name) => format!("gen_{name}"),
        Type::Unknown => "unknown".to_string(),
    }
}

fn int_bits(w: IntWidth) -> &'static str {
    match w {
        IntWidth::W8 => "8",
        IntWidth::W16 => "16",
        IntWidth::W32 => "32",
        IntWidth::W64 => "64",
        IntWidth::W128 => "128",
        IntWidth::Size => "size",
    }
}

/// Builds the literal mangled name and, if it would exceed
/// `MANGLE_LENGTH_BUDGET`, replaces the argument suffix with a content hash
/// of the full argument list instead. The hashed form cannot be recovered
/// by `parse_mangled_type_string` — a known, narrow exception to §8's
/// round-trip law, limited to instantiations with unusually long generic
/// argument lists.
pub fn mangle_struct_name(base: &str, args: &[Type]) -> String {
    if args.is_empty() {
        return base.to_string();
    }
    let parts = args.iter().map(mangle_type).collect::<Vec<_>>().join("__");
    let literal = format!("{base}__{parts}");
    if literal.len() <= MANGLE_LENGTH_BUDGET {
        return literal;
    }
    let mut hasher = Sha256::new();
    hasher.update(parts.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("{base}__h{hex}")
}

pub fn mangle_func_name(base: &str, args: &[Type]) -> String {
    mangle_struct_name(base, args)
}

/// The inverse of `mangle_struct_name`/`mangle_type` for the common case the
/// monomorphizer actually needs: recovering a base name and its top-level
/// type arguments from a mangled string (e.g. `Range__I64` ⇒ `("Range",
/// [I64])`), used when a call site's substitution must be recovered from an
/// owner name alone (§4.8 rule 4). Primitive leaf tokens round-trip through
/// `mangle_type`; nested generic args are not reconstructed past one level,
/// which is all `require_impl_method_instantiation` needs.
pub fn parse_mangled_type_string(s: &str) -> Type {
    let mut parts = s.split("__");
    let base = parts.next().unwrap_or(s);
    if let Some(prim) = primitive_from_mangled(base) {
        return prim;
    }
    let args = parts.map(leaf_type).collect::<Vec<_>>();
    Type::Named {
        path: Vec::new(),
        name: base.to_string(),
        args,
    }
}

fn leaf_type(token: &str) -> Type {
    primitive_from_mangled(token).unwrap_or(Type::Named {
        path: Vec::new(),
        name: token.to_string(),
        args: Vec::new(),
    })
}

fn primitive_from_mangled(token: &str) -> Option<Type> {
    use IntWidth::*;
    Some(match token {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangles_generic_struct_name() {
        let ty = Type::Named {
            path: vec![],
            name: "Maybe".into(),
            args: vec![Type::i32()],
        };
        assert_eq!(mangle_type(&ty), "Maybe__I32");
    }

    #[test]
    fn falls_back_to_hash_for_long_argument_lists() {
        let many = (0..200).map(|_| Type::i32()).collect::<Vec<_>>();
        let mangled = mangle_struct_name("Tuple80", &many);
        assert!(mangled.len() < MANGLE_LENGTH_BUDGET);
        assert!(mangled.starts_with("Tuple80__h"));
    }

    #[test]
    fn round_trips_simple_generic_owner_name() {
        let parsed = parse_mangled_type_string("Range__I64");
        match parsed {
            Type::Named { name, args, .. } => {
                assert_eq!(name, "Range");
                assert_eq!(args, vec![Type::i64()]);
            }
            other => panic!("expected a named type, got {other:?}"),
        }
    }
}
