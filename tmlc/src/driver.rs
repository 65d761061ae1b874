//! Ties lexer → parser → type checker → IR emitter into one pipeline
//! (§6/§7): accepts any of the three input forms, enforces the
//! between-phase short-circuit policy, and never hands back a partial
//! output — a caller gets either the finished IR plus warnings, or the
//! combined diagnostic list.

use std::fs;
use std::path::Path;

use crate::codegen::library_cache::LibraryState;
use crate::codegen::{self, EmitOptions};
use crate::diagnostics::{Diagnostic, DiagnosticBag};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::source::Source;
use crate::typechecker::TypeChecker;

/// The user-facing superset of driver options; [`EmitOptions`] is the
/// subset the emitter itself consults. Fields with no emitter-side
/// counterpart yet (coverage, debug metadata, platform entry points) are
/// accepted and threaded through so callers can set them today without a
/// breaking change later — see `DESIGN.md` for which ones are no-ops.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub suite_test_index: i64,
    pub force_internal_linkage: bool,
    pub library_ir_only: bool,
    pub library_decls_only: bool,
    pub lazy_library_defs: bool,
    pub coverage_enabled: bool,
    pub coverage_output_file: Option<String>,
    pub coverage_quiet: bool,
    pub llvm_source_coverage: bool,
    pub emit_debug_info: bool,
    pub debug_level: u8,
    pub dll_export: bool,
    pub generate_dll_entry: bool,
    pub generate_fuzz_entry: bool,
    /// A previously captured library snapshot (§4.10); when set, codegen
    /// restores it before the declaration pass instead of regenerating
    /// that library's symbols.
    pub cached_library_state: Option<LibraryState>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            suite_test_index: -1,
            force_internal_linkage: false,
            library_ir_only: false,
            library_decls_only: false,
            lazy_library_defs: false,
            coverage_enabled: false,
            coverage_output_file: None,
            coverage_quiet: false,
            llvm_source_coverage: false,
            emit_debug_info: false,
            debug_level: 0,
            dll_export: false,
            generate_dll_entry: false,
            generate_fuzz_entry: false,
            cached_library_state: None,
        }
    }
}

impl CompilerOptions {
    fn to_emit_options(&self) -> EmitOptions {
        EmitOptions {
            suite_test_index: if self.suite_test_index >= 0 { Some(self.suite_test_index) } else { None },
            force_internal_linkage: self.force_internal_linkage,
            library_ir_only: self.library_ir_only,
            library_decls_only: self.library_decls_only,
            lazy_library_defs: self.lazy_library_defs,
            emit_debug_info: self.emit_debug_info,
        }
    }
}

/// One of the three accepted compilation inputs (§6).
pub enum CompilationInput {
    /// Raw source text with a path label used only for diagnostics.
    Text { path: String, source: String },
    /// A single `.tml` file read from disk.
    File(std::path::PathBuf),
    /// A directory whose `mod.tml` is the module root.
    Directory(std::path::PathBuf),
}

#[derive(Debug)]
pub struct CompileSuccess {
    pub ir: String,
    pub warnings: DiagnosticBag,
}

/// Loads `input` into one `Source`, resolving the directory form to its
/// `mod.tml` root — the multi-file module graph itself isn't implemented,
/// so a directory's other `.tml` files are not yet visited (see
/// `DESIGN.md`).
fn load_source(input: CompilationInput) -> Result<Source, DiagnosticBag> {
    match input {
        CompilationInput::Text { path, source } => Ok(Source::new(path, source)),
        CompilationInput::File(path) => read_source_file(&path),
        CompilationInput::Directory(dir) => read_source_file(&dir.join("mod.tml")),
    }
}

fn read_source_file(path: &Path) -> Result<Source, DiagnosticBag> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Source::new(path.display().to_string(), text)),
        Err(err) => {
            let mut bag = DiagnosticBag::default();
            bag.push(Diagnostic::new(
                crate::diagnostics::DiagnosticKind::Invariant,
                "E_IO",
                format!("could not read `{}`: {err}", path.display()),
                crate::source::SourceSpan::synthetic(),
            ));
            Err(bag)
        }
    }
}

/// Runs the full pipeline. Per §7: a parse failure short-circuits
/// checking, and a checking failure (or a checking-phase `module: None`)
/// short-circuits codegen — the combined diagnostics from whichever
/// phases actually ran are always returned together.
pub fn compile(input: CompilationInput, options: CompilerOptions) -> Result<CompileSuccess, DiagnosticBag> {
    let source = load_source(input)?;

    let (tokens, lex_errors) = Lexer::new(&source).tokenize();
    let mut diagnostics = DiagnosticBag::default();
    for err in lex_errors {
        diagnostics.push(Diagnostic::lex(err.message, err.span));
    }

    let module_name = Path::new(source.path())
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.path().to_string());

    let parsed = match Parser::new(tokens).parse_module(&module_name) {
        Ok(module) => module,
        Err(parse_errors) => {
            for err in parse_errors {
                diagnostics.push(Diagnostic::new(crate::diagnostics::DiagnosticKind::Parse, err.code, err.message, err.span));
            }
            return Err(diagnostics);
        }
    };
    if diagnostics.has_errors() {
        return Err(diagnostics);
    }

    let checked = TypeChecker::check_module(parsed);
    diagnostics.extend(checked.diagnostics.clone());
    if diagnostics.has_errors() {
        return Err(diagnostics);
    }

    let checked_for_emit = crate::typechecker::CheckedModule {
        module: checked.module,
        env: checked.env,
        diagnostics: DiagnosticBag::default(),
    };

    match codegen::emit_module_with_cache(&checked_for_emit, options.to_emit_options(), options.cached_library_state.as_ref()) {
        Ok(ir) => Ok(CompileSuccess { ir, warnings: diagnostics }),
        Err(emit_diagnostics) => {
            diagnostics.extend(emit_diagnostics);
            Err(diagnostics)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_main_compiles_to_ir_text() {
        let input = CompilationInput::Text {
            path: "main.tml".to_string(),
            source: "func main() -> I32 {\n  0\n}\n".to_string(),
        };
        let result = compile(input, CompilerOptions::default());
        match result {
            Ok(success) => {
                assert!(success.ir.contains("@tml_main"));
                assert!(success.ir.contains("target triple"));
            }
            Err(diags) => panic!("expected successful compile, got {:?}", diags.diagnostics),
        }
    }

    #[test]
    fn parse_failure_short_circuits_before_codegen() {
        let input = CompilationInput::Text {
            path: "broken.tml".to_string(),
            source: "func main( -> I32 {\n  0\n}\n".to_string(),
        };
        let result = compile(input, CompilerOptions::default());
        assert!(result.is_err());
    }
}
