//! Command-line front end: reads a `.tml` file (or directory module root),
//! runs the pipeline, and prints either the emitted IR or a colored
//! diagnostic listing to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use colored::Colorize;

use tmlc::diagnostics::{Diagnostic, DiagnosticKind};
use tmlc::driver::{self, CompilationInput, CompilerOptions};
use tmlc::source::Source;

#[derive(ClapParser, Debug)]
#[command(name = "tmlc", about = "Front-end and LLVM IR emitter")]
struct Cli {
    /// Source file or module directory to compile.
    input: PathBuf,

    /// Write the emitted IR to this path instead of stdout.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Give every non-main/should-panic function internal linkage.
    #[arg(long)]
    force_internal_linkage: bool,

    /// Emit only this library module's IR, skipping user code.
    #[arg(long)]
    library_ir_only: bool,

    /// Replace library function definitions with declare stubs.
    #[arg(long)]
    library_decls_only: bool,

    /// Emit DWARF debug metadata.
    #[arg(long)]
    emit_debug_info: bool,

    /// Index of this compile unit within a test suite binary, or -1.
    #[arg(long, default_value_t = -1)]
    suite_test_index: i64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let input = if cli.input.is_dir() {
        CompilationInput::Directory(cli.input.clone())
    } else {
        CompilationInput::File(cli.input.clone())
    };

    let options = CompilerOptions {
        suite_test_index: cli.suite_test_index,
        force_internal_linkage: cli.force_internal_linkage,
        library_ir_only: cli.library_ir_only,
        library_decls_only: cli.library_decls_only,
        emit_debug_info: cli.emit_debug_info,
        ..CompilerOptions::default()
    };

    match driver::compile(input, options) {
        Ok(success) => {
            if let Some(path) = &cli.output {
                if let Err(err) = std::fs::write(path, &success.ir) {
                    eprintln!("{}: could not write `{}`: {err}", "error".red().bold(), path.display());
                    return ExitCode::FAILURE;
                }
            } else {
                println!("{}", success.ir);
            }
            for diag in &success.warnings.diagnostics {
                print_diagnostic(diag, None);
            }
            ExitCode::SUCCESS
        }
        Err(bag) => {
            let source = read_for_rendering(&cli.input);
            for diag in &bag.diagnostics {
                print_diagnostic(diag, source.as_ref());
            }
            ExitCode::FAILURE
        }
    }
}

fn read_for_rendering(path: &PathBuf) -> Option<Source> {
    let path = if path.is_dir() { path.join("mod.tml") } else { path.clone() };
    std::fs::read_to_string(&path).ok().map(|text| Source::new(path.display().to_string(), text))
}

fn print_diagnostic(diag: &Diagnostic, source: Option<&Source>) {
    let label = match diag.kind {
        DiagnosticKind::Invariant => "invariant".red().bold(),
        _ => "error".red().bold(),
    };
    let located = source
        .map(|s| {
            let (line, col) = s.line_col(diag.span.start);
            format!("{}:{}:{}", s.path(), line + 1, col + 1)
        })
        .unwrap_or_else(|| diag.span.to_string());
    eprintln!("{label}[{}] {}: {}", diag.code.yellow(), located.dimmed(), diag.message);
    for note in &diag.notes {
        eprintln!("  {} {}", "note:".cyan(), note);
    }
}
