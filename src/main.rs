use std::process::ExitCode;

use clap::Parser;

use kernsat::solver::Verbosity;

/// Decide satisfiability of a DIMACS CNF instance
#[derive(Parser)]
#[command(name = "kernsat", version, about)]
struct Cli {
    /// Path to the instance (`.cnf`, `.cnf.gz`, or `.cnf.xz`)
    input: String,

    /// Print only the result line
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        Verbosity::Verbose
    };

    match kernsat::solve_path(&cli.input, verbosity) {
        // Unknown (0), sat (10), or unsat (20)
        Ok(verdict) => ExitCode::from(verdict as u8),
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
