//! kernsat: a compact CDCL SAT solver for DIMACS CNF instances.
//!
//! The library exposes the solver core and the DIMACS loader; the
//! `kernsat` binary wires them to the command line. Input may be plain
//! text or `.gz`/`.xz` compressed; the result is a `SAT` line with a
//! total model, `UNSAT`, or `UNKNOWN` for empty instances.

use std::time::Instant;

use crate::dimacs::LoadError;
use crate::solver::{Solver, Verbosity, Verdict};

pub mod dimacs;
pub mod solver;

/// Duration between `start` and `end` in seconds
#[allow(clippy::cast_precision_loss)]
fn seconds_between(start: Instant, end: Instant) -> f64 {
    (end - start).as_micros() as f64 / 1e6
}

/// Print basic statistics on the loaded instance
fn print_problem_banner(solver: &Solver, parse_seconds: f64) {
    print!(
        "
============================[ Problem Statistics ]=============================
|                                                                             |
|  Number of variables:  {:>12}                                         |
|  Number of clauses:    {:>12}                                         |
|  Parse time:           {:>12.6}                                         |
|                                                                             |",
        solver.num_variables(),
        solver.num_clauses(),
        parse_seconds
    );
}

/// Print the header of the search-statistics table
fn print_search_banner() {
    print!(
        "
============================[ Search Statistics ]==============================
| Conflicts |          ORIGINAL         |          LEARNED         | Progress |
|           |    Vars  Clauses Literals |    Limit  Clauses Lit/Cl |          |
===============================================================================
"
    );
}

/// Print counters and throughput after solving
#[allow(clippy::cast_precision_loss)]
fn print_summary_banner(solver: &Solver, total_seconds: f64) {
    let stats = solver.statistics();
    let conflicts_per_s = stats.conflicts as f64 / total_seconds;
    let propagations_per_s = stats.propagations as f64 / total_seconds;
    print!(
        "============================[      Summary      ]==============================
|                                                                             |
|  #Restarts:            {:>12}                                         |
|  #Conflicts:           {:>12} ({:>12.3}/sec)                      |
|  #Decisions:           {:>12}                                         |
|  #Propagations:        {:>12} ({:>12.3}/sec)                      |
|  Total time:           {:>12.6}                                         |
|                                                                             |
===============================================================================
",
        stats.restarts,
        stats.conflicts,
        conflicts_per_s,
        stats.decisions,
        stats.propagations,
        propagations_per_s,
        total_seconds
    );
}

/// Print the result line, with the model in DIMACS numbering on SAT
fn print_result(solver: &Solver, verdict: Verdict) {
    match verdict {
        Verdict::Unknown => println!("UNKNOWN"),
        Verdict::Unsat => println!("UNSAT"),
        Verdict::Sat => {
            print!("SAT");
            for (var, &value) in solver.model().iter().enumerate() {
                debug_assert!(!value.is_undef());
                if value.is_true() {
                    print!(" {}", var + 1);
                } else {
                    print!(" -{}", var + 1);
                }
            }
            println!();
        }
    }
}

/// Load and solve a `.cnf`, `.cnf.gz`, or `.cnf.xz` instance, printing
/// diagnostics (unless quiet) and the result line along the way.
pub fn solve_path(path: &str, verbosity: Verbosity) -> Result<Verdict, LoadError> {
    let start = Instant::now();
    let mut solver = Solver::new(verbosity);
    let loadable = dimacs::load_path(path, &mut solver)?;

    if verbosity == Verbosity::Verbose {
        print_problem_banner(&solver, seconds_between(start, Instant::now()));
        print_search_banner();
    }

    // A clause refuted during loading settles the instance by itself
    let verdict = if loadable {
        solver.solve()
    } else {
        Verdict::Unsat
    };

    if verbosity == Verbosity::Verbose {
        print_summary_banner(&solver, seconds_between(start, Instant::now()));
        println!();
    }
    print_result(&solver, verdict);

    Ok(verdict)
}
