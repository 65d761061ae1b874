//! The semantic type model produced by the checker — distinct from
//! [`crate::ast::TypeName`], the syntax the user wrote.

mod env;
mod subst;

pub use env::*;
pub use subst::*;

use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
    W128,
    Size,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
            IntWidth::W128 => 128,
            IntWidth::Size => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FloatWidth {
    W32,
    W64,
}

/// A resolved, fully-structural semantic type. Generic parameters that are
/// still unresolved at a given point (e.g. inside a behavior's default
/// method body) are represented by `Type::Generic`, not erased.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Type {
    Int {
        width: IntWidth,
        signed: bool,
    },
    Float(FloatWidth),
    Bool,
    Char,
    Str,
    Unit,
    /// The bottom type: the type of `return`, `break`, `throw`, and any
    /// expression that diverges instead of producing a value.
    Never,
    /// A concrete struct/enum/union/class, or an unresolved name awaiting
    /// monomorphization context, with its instantiated type arguments.
    Named {
        path: Vec<String>,
        name: String,
        args: Vec<Type>,
    },
    Reference {
        mutable: bool,
        inner: Rc<Type>,
    },
    RawPointer {
        mutable: bool,
        inner: Rc<Type>,
    },
    Array {
        element: Rc<Type>,
        size: u64,
    },
    Slice {
        element: Rc<Type>,
    },
    Tuple(Vec<Type>),
    Function {
        params: Vec<Type>,
        ret: Rc<Type>,
    },
    /// `dyn B[args]` — a `{data, vtable}` fat pointer.
    Dyn {
        behavior: String,
        args: Vec<Type>,
    },
    /// `impl B[args]` at a return position — an opaque existential the
    /// caller may not name, resolved to the concrete type at the single
    /// return site during checking.
    ImplBehavior {
        behavior: String,
        args: Vec<Type>,
    },
    /// An unresolved generic parameter, e.g. `T` inside `func id[T](x: T)`.
    Generic(String),
    /// Placeholder for a type the checker could not resolve; downstream
    /// passes treat it as compatible with everything to avoid cascades.
    Unknown,
}

impl Type {
    pub fn unit() -> Type {
        Type::Unit
    }

    pub fn i32() -> Type {
        Type::Int {
            width: IntWidth::W32,
            signed: true,
        }
    }

    pub fn i64() -> Type {
        Type::Int {
            width: IntWidth::W64,
            signed: true,
        }
    }

    pub fn bool() -> Type {
        Type::Bool
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Type::Never)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int { .. })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int { .. } | Type::Float(_))
    }

    pub fn reference(mutable: bool, inner: Type) -> Type {
        Type::Reference {
            mutable,
            inner: Rc::new(inner),
        }
    }

    /// Structural unification against a *pattern* (the formal parameter's
    /// type, possibly containing `Generic`s) that binds type variables.
    /// Returns the substitution implied by matching `self` in that slot.
    pub fn unify_into(&self, pattern: &Type, out: &mut Substitution) {
        match (pattern, self) {
            (Type::Generic(name), concrete) => {
                out.bind(name.clone(), concrete.clone());
            }
            (Type::Named { args: pargs, .. }, Type::Named { args: cargs, .. }) => {
                for (p, c) in pargs.iter().zip(cargs.iter()) {
                    c.unify_into(p, out);
                }
            }
            (Type::Reference { inner: p, .. }, Type::Reference { inner: c, .. })
            | (Type::RawPointer { inner: p, .. }, Type::RawPointer { inner: c, .. })
            | (Type::Array { element: p, .. }, Type::Array { element: c, .. })
            | (Type::Slice { element: p }, Type::Slice { element: c }) => {
                c.unify_into(p, out);
            }
            (Type::Tuple(p), Type::Tuple(c)) => {
                for (p, c) in p.iter().zip(c.iter()) {
                    c.unify_into(p, out);
                }
            }
            (
                Type::Function {
                    params: pp,
                    ret: pr,
                },
                Type::Function {
                    params: cp,
                    ret: cr,
                },
            ) => {
                for (p, c) in pp.iter().zip(cp.iter()) {
                    c.unify_into(p, out);
                }
                cr.unify_into(pr, out);
            }
            (Type::Dyn { args: pargs, .. }, Type::Dyn { args: cargs, .. }) => {
                for (p, c) in pargs.iter().zip(cargs.iter()) {
                    c.unify_into(p, out);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int { width, signed } => {
                let prefix = if *signed { "I" } else { "U" };
                let bits = match width {
                    IntWidth::Size => return write!(f, "{}size", if *signed { "i" } else { "u" }),
                    w => w.bits(),
                };
                write!(f, "{prefix}{bits}")
            }
            Type::Float(FloatWidth::W32) => write!(f, "F32"),
            Type::Float(FloatWidth::W64) => write!(f, "F64"),
            Type::Bool => write!(f, "Bool"),
            Type::Char => write!(f, "Char"),
            Type::Str => write!(f, "Str"),
            Type::Unit => write!(f, "Unit"),
            Type::Never => write!(f, "Never"),
            Type::Named { name, args, .. } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "[")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{a}")?;
                    }
                    write!(f, "]")?;
                }
                Ok(())
            }
            Type::Reference { mutable, inner } => {
                write!(f, "&{}{}", if *mutable { "mut " } else { "" }, inner)
            }
            Type::RawPointer { mutable, inner } => {
                write!(f, "*{}{}", if *mutable { "mut " } else { "" }, inner)
            }
            Type::Array { element, size } => write!(f, "[{element};{size}]"),
            Type::Slice { element } => write!(f, "[{element}]"),
            Type::Tuple(elements) => {
                write!(f, "(")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            Type::Function { params, ret } => {
                write!(f, "func(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::Dyn { behavior, args } => write!(f, "dyn {}", fmt_named(behavior, args)),
            Type::ImplBehavior { behavior, args } => write!(f, "impl {}", fmt_named(behavior, args)),
            Type::Generic(name) => write!(f, "{name}"),
            Type::Unknown => write!(f, "?"),
        }
    }
}

fn fmt_named(name: &str, args: &[Type]) -> String {
    if args.is_empty() {
        name.to_string()
    } else {
        let args = args
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{name}[{args}]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unify_binds_generic_parameter() {
        let pattern = Type::Generic("T".to_string());
        let concrete = Type::i32();
        let mut subst = Substitution::new();
        concrete.unify_into(&pattern, &mut subst);
        assert_eq!(subst.get("T"), Some(&Type::i32()));
    }

    #[test]
    fn unify_recurses_into_named_args() {
        let pattern = Type::Named {
            path: vec![],
            name: "Maybe".into(),
            args: vec![Type::Generic("T".into())],
        };
        let concrete = Type::Named {
            path: vec![],
            name: "Maybe".into(),
            args: vec![Type::i32()],
        };
        let mut subst = Substitution::new();
        concrete.unify_into(&pattern, &mut subst);
        assert_eq!(subst.get("T"), Some(&Type::i32()));
    }

    #[test]
    fn display_formats_generic_named_type() {
        let ty = Type::Named {
            path: vec![],
            name: "Maybe".into(),
            args: vec![Type::i32()],
        };
        assert_eq!(ty.to_string(), "Maybe[I32]");
    }
}
