//! The IR emitter: lowers a checked module to textual LLVM IR in the fixed
//! order §6 specifies (preamble, runtime-declaration placeholder, type
//! definitions, string literals, function definitions, attribute groups,
//! loop metadata, module identification).

mod decl;
mod expr;
pub mod library_cache;
pub mod mangle;
mod monomorphize;
mod runtime;
pub mod types;
mod vtable;

pub use monomorphize::PendingInstantiations;

use std::collections::{HashMap, HashSet};

use crate::ast::Module;
use crate::diagnostics::DiagnosticBag;
use crate::typechecker::CheckedModule;
use crate::types::{Type, TypeEnv};

/// Options controlling one emission run — the enumerated driver options of
/// §6. `CompilerOptions` in `driver.rs` is the user-facing superset; this is
/// the subset the emitter itself consults.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub suite_test_index: Option<i64>,
    pub force_internal_linkage: bool,
    pub library_ir_only: bool,
    pub library_decls_only: bool,
    pub lazy_library_defs: bool,
    pub emit_debug_info: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            suite_test_index: None,
            force_internal_linkage: false,
            library_ir_only: false,
            library_decls_only: false,
            lazy_library_defs: false,
            emit_debug_info: false,
        }
    }
}

/// Accumulated emitter state threaded through every `gen_*` call: the type
/// and function text buffers, string-literal interning, the local-variable
/// scope stack (SSA register or alloca name per binding), and the
/// dedup sets §4.8/§4.10 name explicitly.
pub struct Emitter<'e> {
    pub env: &'e TypeEnv,
    pub module: &'e Module<Type>,
    pub options: EmitOptions,
    pub type_defs: String,
    pub functions: String,
    pub globals: String,
    pub diagnostics: DiagnosticBag,

    reg_counter: u64,
    label_counter: u64,
    string_counter: u64,

    scopes: Vec<HashMap<String, String>>,
    pub generated_types: HashSet<String>,
    pub generated_functions: HashSet<String>,
    pub generated_impl_methods: HashSet<String>,
    pub declared_externs: HashSet<String>,
    pub extern_link_libs: Vec<String>,
    pub nullable_maybe_types: HashSet<String>,
    pub string_literals: Vec<(String, String)>,
    pub value_classes: HashSet<String>,
    pub pending: PendingInstantiations,

    loop_stack: Vec<LoopLabels>,
    pub block_terminated: bool,
    pub last_semantic_type: Type,
}

struct LoopLabels {
    label: Option<String>,
    header: String,
    after: String,
}

impl<'e> Emitter<'e> {
    pub fn new(env: &'e TypeEnv, module: &'e Module<Type>, options: EmitOptions) -> Self {
        let value_classes = env
            .classes
            .iter()
            .filter(|(_, c)| c.is_value_class_candidate)
            .map(|(name, _)| name.clone())
            .collect();
        Self {
            env,
            module,
            options,
            type_defs: String::new(),
            functions: String::new(),
            globals: String::new(),
            diagnostics: DiagnosticBag::default(),
            reg_counter: 0,
            label_counter: 0,
            string_counter: 0,
            scopes: vec![HashMap::new()],
            generated_types: HashSet::new(),
            generated_functions: HashSet::new(),
            generated_impl_methods: HashSet::new(),
            declared_externs: HashSet::new(),
            extern_link_libs: Vec::new(),
            nullable_maybe_types: HashSet::new(),
            string_literals: Vec::new(),
            value_classes,
            pending: PendingInstantiations::default(),
            loop_stack: Vec::new(),
            block_terminated: false,
            last_semantic_type: Type::Unit,
        }
    }

    pub fn fresh_reg(&mut self) -> String {
        self.reg_counter += 1;
        format!("%t{}", self.reg_counter)
    }

    pub fn fresh_label(&mut self, hint: &str) -> String {
        self.label_counter += 1;
        format!("{hint}.{}", self.label_counter)
    }

    pub fn intern_string(&mut self, value: &str) -> String {
        if let Some((name, _)) = self.string_literals.iter().find(|(_, v)| v == value) {
            return name.clone();
        }
        let name = format!("@.str.{}", self.string_counter);
        self.string_counter += 1;
        self.string_literals.push((name.clone(), value.to_string()));
        name
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn bind_local(&mut self, name: impl Into<String>, slot: impl Into<String>) {
        self.scopes.last_mut().expect("at least one scope").insert(name.into(), slot.into());
    }

    pub fn lookup_local(&self, name: &str) -> Option<String> {
        self.scopes.iter().rev().find_map(|s| s.get(name).cloned())
    }

    pub fn push_loop(&mut self, label: Option<String>, header: String, after: String) {
        self.loop_stack.push(LoopLabels { label, header, after });
    }

    pub fn pop_loop(&mut self) {
        self.loop_stack.pop();
    }

    pub fn loop_target(&self, label: &Option<String>) -> Option<(&str, &str)> {
        match label {
            Some(l) => self
                .loop_stack
                .iter()
                .rev()
                .find(|f| f.label.as_deref() == Some(l.as_str()))
                .map(|f| (f.header.as_str(), f.after.as_str())),
            None => self.loop_stack.last().map(|f| (f.header.as_str(), f.after.as_str())),
        }
    }

    fn linkage(&self, visibility: crate::ast::Visibility, is_main: bool) -> &'static str {
        if is_main {
            return "";
        }
        let private = matches!(visibility, crate::ast::Visibility::Private) || self.options.force_internal_linkage;
        if private {
            "internal "
        } else {
            ""
        }
    }
}

/// Runs the full declaration pass, the monomorphization fixpoint, and
/// assembles the final module text in §6's fixed section order. Returns the
/// diagnostics list (never empty on an invariant failure) alongside any
/// partial buffers only for the caller's own error reporting — a successful
/// return always carries the complete IR text, never a partial one.
pub fn emit_module(checked: &CheckedModule, options: EmitOptions) -> Result<String, DiagnosticBag> {
    emit_module_with_cache(checked, options, None)
}

/// Same as [`emit_module`], but seeds the emitter from a prior run's
/// captured [`library_cache::LibraryState`] before the declaration pass, so
/// already-emitted library symbols are skipped rather than regenerated.
pub fn emit_module_with_cache(
    checked: &CheckedModule,
    options: EmitOptions,
    cached_state: Option<&library_cache::LibraryState>,
) -> Result<String, DiagnosticBag> {
    let Some(module) = &checked.module else {
        return Err(checked.diagnostics.clone());
    };
    if checked.has_errors() {
        return Err(checked.diagnostics.clone());
    }

    let mut emitter = Emitter::new(&checked.env, module, options);
    if let Some(state) = cached_state {
        library_cache::restore_library_state(&mut emitter, state);
    }
    decl::emit_module_declarations(&mut emitter, module);
    monomorphize::generate_pending_instantiations(&mut emitter);

    if !emitter.diagnostics.is_empty() {
        return Err(emitter.diagnostics);
    }

    let text = assemble(&emitter);
    if emitter.options.library_decls_only {
        Ok(library_cache::rewrite_as_decls_only(&text))
    } else {
        Ok(text)
    }
}

fn assemble(emitter: &Emitter) -> String {
    let mut out = String::new();
    out.push_str("target triple = \"x86_64-unknown-linux-gnu\"\n");
    out.push_str("target datalayout = \"e-m:e-p270:32:32-p271:32:32-p272:64:64-i64:64-f80:128-n8:16:32:64-S128\"\n");
    out.push_str("; {{RUNTIME_DECLS_PLACEHOLDER}}\n");
    out.push_str("; type definitions\n");
    out.push_str(&emitter.type_defs);
    out.push_str("; string literal globals\n");
    for (name, value) in &emitter.string_literals {
        out.push_str(&format!(
            "{name} = private unnamed_addr constant [{} x i8] c\"{}\\00\"\n",
            value.len() + 1,
            escape_ir_string(value)
        ));
    }
    out.push_str("; globals\n");
    out.push_str(&emitter.globals);
    out.push_str("; function definitions\n");
    out.push_str(&emitter.functions);
    out.push_str("attributes #0 = { nounwind }\n");
    out.push_str("!llvm.ident = !{!0}\n");
    out.push_str("!0 = !{!\"tmlc\"}\n");

    let runtime_decls = runtime::declare_used(&emitter.declared_externs);
    out.replace("; {{RUNTIME_DECLS_PLACEHOLDER}}\n", &runtime_decls)
}

fn escape_ir_string(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'\\' => "\\5C".to_string(),
            b'"' => "\\22".to_string(),
            0x20..=0x7e => (b as char).to_string(),
            _ => format!("\\{b:02X}"),
        })
        .collect()
}
