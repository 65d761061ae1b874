use std::collections::HashMap;

use crate::ast::Visibility;

use super::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub generics: Vec<String>,
    pub params: Vec<Type>,
    pub return_type: Type,
    pub is_async: bool,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub ty: Type,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructInfo {
    pub name: String,
    pub generics: Vec<String>,
    pub fields: Vec<FieldInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnumVariantShape {
    Unit,
    Tuple(Vec<Type>),
    Struct(Vec<FieldInfo>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariantInfo {
    pub name: String,
    pub tag: u32,
    pub shape: EnumVariantShape,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumInfo {
    pub name: String,
    pub generics: Vec<String>,
    pub variants: Vec<EnumVariantInfo>,
}

impl EnumInfo {
    pub fn variant(&self, name: &str) -> Option<&EnumVariantInfo> {
        self.variants.iter().find(|v| v.name == name)
    }
}

/// One slot in a class's virtual method table, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct VtableSlot {
    pub method_name: String,
    /// The class that currently owns this slot's implementation — the
    /// declaring class, or a descendant that overrode it.
    pub owner_class: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    pub name: String,
    pub generics: Vec<String>,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub fields: Vec<FieldInfo>,
    pub vtable: Vec<VtableSlot>,
    pub is_abstract: bool,
    pub is_sealed: bool,
    /// A sealed class with no virtual methods: a candidate to be passed by
    /// value as a struct rather than heap-allocated behind a pointer.
    pub is_value_class_candidate: bool,
}

impl ClassInfo {
    /// Ancestor chain starting with this class's immediate parent.
    pub fn ancestors<'a>(&self, classes: &'a HashMap<String, ClassInfo>) -> Vec<&'a ClassInfo> {
        let mut chain = Vec::new();
        let mut current = self.extends.as_deref();
        while let Some(name) = current {
            let Some(info) = classes.get(name) else { break };
            chain.push(info);
            current = info.extends.as_deref();
        }
        chain
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorInfo {
    pub name: String,
    pub generics: Vec<String>,
    /// Method names in declaration order — defines vtable slot ordering.
    pub methods: Vec<String>,
    pub methods_with_default: Vec<String>,
    pub associated_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImplInfo {
    pub generics: Vec<String>,
    pub trait_name: Option<String>,
    pub trait_args: Vec<Type>,
    pub target: Type,
    pub methods: Vec<String>,
    pub type_bindings: HashMap<String, Type>,
}

/// The type checker's accumulated, process-scoped knowledge of one
/// compilation: every resolved symbol, class/behavior metadata, and the
/// impl blocks available for each target type.
#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    pub functions: HashMap<String, FunctionSignature>,
    pub structs: HashMap<String, StructInfo>,
    pub enums: HashMap<String, EnumInfo>,
    pub classes: HashMap<String, ClassInfo>,
    pub behaviors: HashMap<String, BehaviorInfo>,
    pub constants: HashMap<String, Type>,
    pub type_aliases: HashMap<String, Type>,
    /// Every impl block, keyed by the target type's base name.
    pub impls_by_target: HashMap<String, Vec<ImplInfo>>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn impls_for(&self, target: &str) -> &[ImplInfo] {
        self.impls_by_target
            .get(target)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn register_impl(&mut self, target: &str, info: ImplInfo) {
        self.impls_by_target
            .entry(target.to_string())
            .or_default()
            .push(info);
    }

    /// Whether `target` has an impl of `behavior` with the given type args,
    /// used to verify a generic parameter's `where` bounds at a call site.
    pub fn implements(&self, target: &str, behavior: &str, args: &[Type]) -> bool {
        self.impls_for(target).iter().any(|i| {
            i.trait_name.as_deref() == Some(behavior)
                && (args.is_empty() || i.trait_args == args)
        })
    }

    pub fn class_chain_acyclic(&self, name: &str) -> bool {
        let mut seen = std::collections::HashSet::new();
        let mut current = Some(name.to_string());
        while let Some(n) = current {
            if !seen.insert(n.clone()) {
                return false;
            }
            current = self.classes.get(&n).and_then(|c| c.extends.clone());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implements_matches_trait_args() {
        let mut env = TypeEnv::new();
        env.register_impl(
            "I32",
            ImplInfo {
                generics: vec![],
                trait_name: Some("Speak".into()),
                trait_args: vec![],
                target: Type::i32(),
                methods: vec!["hi".into()],
                type_bindings: HashMap::new(),
            },
        );
        assert!(env.implements("I32", "Speak", &[]));
        assert!(!env.implements("I32", "Other", &[]));
    }

    #[test]
    fn class_chain_acyclic_detects_cycle() {
        let mut env = TypeEnv::new();
        env.classes.insert(
            "A".into(),
            ClassInfo {
                name: "A".into(),
                generics: vec![],
                extends: Some("B".into()),
                implements: vec![],
                fields: vec![],
                vtable: vec![],
                is_abstract: false,
                is_sealed: false,
                is_value_class_candidate: false,
            },
        );
        env.classes.insert(
            "B".into(),
            ClassInfo {
                name: "B".into(),
                generics: vec![],
                extends: Some("A".into()),
                implements: vec![],
                fields: vec![],
                vtable: vec![],
                is_abstract: false,
                is_sealed: false,
                is_value_class_candidate: false,
            },
        );
        assert!(!env.class_chain_acyclic("A"));
    }
}
