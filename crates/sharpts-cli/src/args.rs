use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the `sharpts` binary.
///
/// The CLI is an external collaborator: it owns argument
/// parsing and file I/O, then hands source text to the lexer/parser/
/// checker/evaluator core and reports whatever comes back. It makes no
/// semantic decisions of its own.
#[derive(Parser, Debug)]
#[command(name = "sharpts", version, about = "A TypeScript front end and tree-walking interpreter")]
pub struct CliArgs {
    /// Script to run.
    pub file: PathBuf,

    /// Type-check only; do not execute the script.
    #[arg(long)]
    pub check_only: bool,

    /// Skip type checking and run the script directly.
    #[arg(long)]
    pub no_check: bool,

    /// Print the resolved type of every checked expression to stderr.
    #[arg(long)]
    pub dump_types: bool,

    /// Treat the file as non-strict (module files are always strict;
    /// this only affects bare scripts).
    #[arg(long)]
    pub no_strict: bool,

    /// Decorator grammar to parse: "stage2" or "stage3".
    #[arg(long, default_value = "stage3")]
    pub decorators: String,
}
