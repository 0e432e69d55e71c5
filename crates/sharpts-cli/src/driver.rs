//! Wires the four core stages together for a single script: lex, parse,
//! (optionally) check, then evaluate. The pipeline's data flow --
//! `source -> lexer -> parser -> AST + diagnostics -> type checker ->
//! TypeMap + diagnostics -> evaluator -> observable effects` -- is exactly
//! what `run_file` drives; everything else in this crate is argument
//! parsing and diagnostic rendering around it.

use std::path::Path;

use colored::Colorize;
use rustc_hash::FxHashMap;
use sharpts_checker::{Checker, CheckerOptions};
use sharpts_common::position::LineMap;
use sharpts_common::{Diagnostic, DiagnosticCategory};
use sharpts_runtime::evaluator::{EvalOptions, Evaluator};
use sharpts_runtime::loader::InMemoryLoader;

use crate::args::CliArgs;

pub struct RunOutcome {
    /// Process exit code: 0 on success, 1 on an uncaught error or a
    /// `--check-only` run that collected type errors, 2 on a parse error.
    pub exit_code: i32,
}

pub fn run_file(args: &CliArgs) -> anyhow::Result<RunOutcome> {
    let path = &args.file;
    let source = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read '{}': {e}", path.display()))?;
    let file_name = path.display().to_string();

    let (statements, parse_diagnostics) = sharpts_parser::parse_program(&source);
    let line_map = LineMap::new(&source);
    let had_parse_errors = report(&parse_diagnostics, &file_name, &line_map);
    if had_parse_errors {
        return Ok(RunOutcome { exit_code: 2 });
    }

    if !args.no_check {
        let options = CheckerOptions { strict: !args.no_strict, ..CheckerOptions::default() };
        let mut checker = Checker::new(options);
        checker.check_program(&statements);
        let check_diagnostics = checker.diagnostics.as_slice().to_vec();
        let had_check_errors = report(&check_diagnostics, &file_name, &line_map);
        if args.dump_types {
            tracing::info!(target: "sharpts::cli", "checker recorded {} node types", checker.type_map.len());
        }
        if args.check_only {
            return Ok(RunOutcome { exit_code: if had_check_errors { 1 } else { 0 } });
        }
    } else if args.check_only {
        anyhow::bail!("--check-only and --no-check are mutually exclusive");
    }

    let loader = InMemoryLoader::new(FxHashMap::default());
    let mut evaluator = Evaluator::new(loader, EvalOptions { strict: !args.no_strict, ..EvalOptions::default() });
    match evaluator.run_program(&statements) {
        Ok(_) => Ok(RunOutcome { exit_code: 0 }),
        Err(thrown) => {
            eprintln!("{} {}", "Uncaught".red().bold(), thrown.display_string());
            Ok(RunOutcome { exit_code: 1 })
        }
    }
}

/// Prints every diagnostic in source order and returns whether any of
/// them were errors (as opposed to warnings/suggestions).
fn report(diagnostics: &[Diagnostic], file: &str, line_map: &LineMap) -> bool {
    let mut has_errors = false;
    for d in diagnostics {
        let line = d.render(file, line_map);
        match d.category {
            DiagnosticCategory::Error => {
                has_errors = true;
                eprintln!("{}", line.red());
            }
            DiagnosticCategory::Warning => eprintln!("{}", line.yellow()),
            DiagnosticCategory::Suggestion => eprintln!("{}", line.cyan()),
        }
    }
    has_errors
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sharpts::console=info"));
    tracing_subscriber::fmt().without_time().with_target(false).with_env_filter(filter).init();
}

#[allow(dead_code)]
fn is_typescript_file(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("ts") | Some("tsx") | Some("mts") | Some("cts"))
}
