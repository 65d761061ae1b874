use std::collections::HashMap;

use super::Type;

/// A generic parameter → concrete type binding, built by structural
/// unification at a call site and consumed when lowering a generic body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    bindings: HashMap<String, Type>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: String, ty: Type) {
        self.bindings.entry(name).or_insert(ty);
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.bindings.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Type)> {
        self.bindings.iter()
    }

    /// Replaces every `Type::Generic(name)` reachable in `ty` with its
    /// binding, leaving unbound generics untouched (they are resolved by an
    /// enclosing substitution instead, e.g. a method-level `[U]` inside a
    /// `impl[T]` block).
    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::Generic(name) => self.bindings.get(name).cloned().unwrap_or_else(|| ty.clone()),
            Type::Named { path, name, args } => Type::Named {
                path: path.clone(),
                name: name.clone(),
                args: args.iter().map(|a| self.apply(a)).collect(),
            },
            Type::Reference { mutable, inner } => Type::Reference {
                mutable: *mutable,
                inner: self.apply(inner).into(),
            },
            Type::RawPointer { mutable, inner } => Type::RawPointer {
                mutable: *mutable,
                inner: self.apply(inner).into(),
            },
            Type::Array { element, size } => Type::Array {
                element: self.apply(element).into(),
                size: *size,
            },
            Type::Slice { element } => Type::Slice {
                element: self.apply(element).into(),
            },
            Type::Tuple(elements) => Type::Tuple(elements.iter().map(|e| self.apply(e)).collect()),
            Type::Function { params, ret } => Type::Function {
                params: params.iter().map(|p| self.apply(p)).collect(),
                ret: self.apply(ret).into(),
            },
            Type::Dyn { behavior, args } => Type::Dyn {
                behavior: behavior.clone(),
                args: args.iter().map(|a| self.apply(a)).collect(),
            },
            Type::ImplBehavior { behavior, args } => Type::ImplBehavior {
                behavior: behavior.clone(),
                args: args.iter().map(|a| self.apply(a)).collect(),
            },
            other => other.clone(),
        }
    }

    pub fn merge(mut self, other: Substitution) -> Substitution {
        for (k, v) in other.bindings {
            self.bindings.entry(k).or_insert(v);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_substitutes_nested_generic() {
        let mut subst = Substitution::new();
        subst.bind("T".into(), Type::i32());
        let ty = Type::Reference {
            mutable: false,
            inner: Type::Generic("T".into()).into(),
        };
        assert_eq!(
            subst.apply(&ty),
            Type::Reference {
                mutable: false,
                inner: Type::i32().into(),
            }
        );
    }

    #[test]
    fn first_binding_wins_on_bind() {
        let mut subst = Substitution::new();
        subst.bind("T".into(), Type::i32());
        subst.bind("T".into(), Type::i64());
        assert_eq!(subst.get("T"), Some(&Type::i32()));
    }
}
