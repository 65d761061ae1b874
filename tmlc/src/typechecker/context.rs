use std::collections::{HashMap, HashSet};

use crate::diagnostics::DiagnosticBag;
use crate::types::{Type, TypeEnv};

/// Lexical scope stack plus the ambient state every check function needs:
/// the enclosing function's return type (for `return`), the `this`/`Self`
/// type inside a method body, the generic parameters currently in scope,
/// and the stack of enclosing loop labels (for labeled `break`/`continue`).
///
/// The teacher's checker threads this as two types (`TypeInformation`'s
/// mutable cell during inference, `Context` for the symbol side); ours
/// collapses both into one struct because our AST is already generic over
/// `T`, so "not yet typed" and "typed" are just `Module<()>` vs
/// `Module<Type>` rather than needing a shared mutable inference cell.
pub struct Context {
    pub env: TypeEnv,
    pub diagnostics: DiagnosticBag,
    scopes: Vec<HashMap<String, Type>>,
    return_type: Vec<Type>,
    self_type: Vec<Type>,
    generics_in_scope: Vec<HashSet<String>>,
    loop_labels: Vec<Option<String>>,
}

impl Context {
    pub fn new(env: TypeEnv) -> Self {
        Self {
            env,
            diagnostics: DiagnosticBag::default(),
            scopes: vec![HashMap::new()],
            return_type: Vec::new(),
            self_type: Vec::new(),
            generics_in_scope: vec![HashSet::new()],
            loop_labels: Vec::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn bind(&mut self, name: impl Into<String>, ty: Type) {
        self.scopes
            .last_mut()
            .expect("context always has at least one scope")
            .insert(name.into(), ty);
    }

    pub fn lookup_local(&self, name: &str) -> Option<Type> {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.get(name) {
                return Some(ty.clone());
            }
        }
        None
    }

    pub fn push_generics(&mut self, names: impl IntoIterator<Item = String>) {
        let mut set = self.generics_in_scope.last().cloned().unwrap_or_default();
        set.extend(names);
        self.generics_in_scope.push(set);
    }

    pub fn pop_generics(&mut self) {
        self.generics_in_scope.pop();
    }

    pub fn is_generic(&self, name: &str) -> bool {
        self.generics_in_scope
            .last()
            .map(|s| s.contains(name))
            .unwrap_or(false)
    }

    pub fn current_generics(&self) -> &HashSet<String> {
        self.generics_in_scope.last().expect("at least one generics frame")
    }

    pub fn push_function(&mut self, return_type: Type, self_type: Option<Type>) {
        self.return_type.push(return_type);
        if let Some(t) = self_type {
            self.self_type.push(t);
        }
    }

    pub fn pop_function(&mut self, had_self: bool) {
        self.return_type.pop();
        if had_self {
            self.self_type.pop();
        }
    }

    pub fn current_return_type(&self) -> Option<&Type> {
        self.return_type.last()
    }

    pub fn current_self_type(&self) -> Option<&Type> {
        self.self_type.last()
    }

    pub fn push_loop(&mut self, label: Option<String>) {
        self.loop_labels.push(label);
    }

    pub fn pop_loop(&mut self) {
        self.loop_labels.pop();
    }

    pub fn in_loop(&self) -> bool {
        !self.loop_labels.is_empty()
    }

    pub fn label_in_scope(&self, label: &str) -> bool {
        self.loop_labels.iter().any(|l| l.as_deref() == Some(label))
    }
}
