use std::io::Write;
use std::process::Command;

use kernsat::dimacs::load_path;
use kernsat::solver::{Solver, Verbosity, Verdict};

use crate::common::{assert_model_satisfies, RecordingSink};

mod common;

fn solve_fixture(path: &str) -> (Solver, Verdict) {
    let mut solver = Solver::new(Verbosity::Quiet);
    let loadable = load_path(path, &mut solver).expect("fixture loads");
    let verdict = if loadable {
        solver.solve()
    } else {
        Verdict::Unsat
    };
    (solver, verdict)
}

fn record_fixture(path: &str) -> RecordingSink {
    let mut recorded = RecordingSink::default();
    load_path(path, &mut recorded).expect("fixture loads");
    recorded
}

#[test]
fn small_instance_is_sat_with_a_valid_model() {
    let (solver, verdict) = solve_fixture("res/small_sat.cnf");
    assert_eq!(verdict, Verdict::Sat);
    assert_model_satisfies(solver.model(), &record_fixture("res/small_sat.cnf"));
}

#[test]
fn medium_instance_is_sat_with_a_valid_model() {
    let (solver, verdict) = solve_fixture("res/medium_sat.cnf");
    assert_eq!(verdict, Verdict::Sat);
    assert_eq!(solver.num_variables(), 403);

    let recorded = record_fixture("res/medium_sat.cnf");
    assert_eq!(recorded.clauses.len(), 2029);
    assert_model_satisfies(solver.model(), &recorded);
}

#[test]
fn pigeonhole_instance_is_unsat() {
    let (_, verdict) = solve_fixture("res/php_unsat.cnf");
    assert_eq!(verdict, Verdict::Unsat);
}

// -- Scenarios through the binary

fn run_on(contents: &str) -> (Option<i32>, String) {
    let mut file = tempfile::Builder::new()
        .suffix(".cnf")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write instance");

    let exe = env!("CARGO_BIN_EXE_kernsat");
    let output = Command::new(exe)
        .arg("--quiet")
        .arg(file.path())
        .output()
        .expect("binary runs");
    (
        output.status.code(),
        String::from_utf8_lossy(&output.stdout).trim().to_owned(),
    )
}

/// Parse a `SAT 1 -2 ...` line into signed DIMACS literals
fn model_of(stdout: &str) -> Vec<i32> {
    let rest = stdout.strip_prefix("SAT").expect("SAT result");
    rest.split_whitespace()
        .map(|tok| tok.parse().expect("signed literal"))
        .collect()
}

#[test]
fn contradicting_units_exit_unsat() {
    let (code, stdout) = run_on("p cnf 1 2\n1 0\n-1 0\n");
    assert_eq!(code, Some(20));
    assert_eq!(stdout, "UNSAT");
}

#[test]
fn single_clause_exits_sat_with_a_covering_model() {
    let (code, stdout) = run_on("p cnf 2 1\n1 2 0\n");
    assert_eq!(code, Some(10));
    let model = model_of(&stdout);
    assert_eq!(model.len(), 2);
    assert_eq!(model.iter().map(|l| l.abs()).collect::<Vec<_>>(), vec![1, 2]);
    assert!(model[0] == 1 || model[1] == 2);
}

#[test]
fn unit_chain_forces_all_positive() {
    let (code, stdout) = run_on("p cnf 3 3\n1 0\n-1 2 0\n-2 3 0\n");
    assert_eq!(code, Some(10));
    assert_eq!(model_of(&stdout), vec![1, 2, 3]);
}

#[test]
fn tautology_only_instance_is_sat() {
    let (code, stdout) = run_on("p cnf 1 1\n1 -1 0\n");
    assert_eq!(code, Some(10));
    assert!(stdout.starts_with("SAT"));
}
