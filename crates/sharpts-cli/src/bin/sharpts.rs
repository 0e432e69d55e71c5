use clap::Parser;
use sharpts_cli::args::CliArgs;
use sharpts_cli::driver;

fn main() -> anyhow::Result<()> {
    driver::init_tracing();
    let args = CliArgs::parse();
    let outcome = driver::run_file(&args)?;
    std::process::exit(outcome.exit_code);
}
