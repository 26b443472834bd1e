//! Randomized cross-checks of the solver against a brute-force oracle.

use proptest::prelude::*;

use kernsat::dimacs::CnfSink;
use kernsat::solver::store::Lit;
use kernsat::solver::{Solver, Verbosity, Verdict};

const VARS: usize = 8;

/// Truth-table satisfiability over at most `VARS` variables
fn brute_force_sat(clauses: &[Vec<i32>]) -> bool {
    (0u32..1 << VARS).any(|bits| {
        clauses.iter().all(|clause| {
            clause.iter().any(|&code| {
                let var = code.unsigned_abs() as usize - 1;
                (bits >> var & 1 == 1) == (code > 0)
            })
        })
    })
}

fn lit(code: i32) -> Lit {
    Lit::new(code.unsigned_abs() as usize - 1, code > 0)
}

/// Feed the clauses through the loading surface; mirrors the pipeline's
/// rule that a refuted clause settles the instance as UNSAT
fn solve_clauses(clauses: &[Vec<i32>]) -> (Solver, Verdict) {
    let mut solver = Solver::new(Verbosity::Quiet);
    solver.create_variables(VARS);
    for clause in clauses {
        let lits: Vec<Lit> = clause.iter().map(|&code| lit(code)).collect();
        if !solver.add_clause(&lits) {
            return (solver, Verdict::Unsat);
        }
    }
    let verdict = solver.solve();
    (solver, verdict)
}

fn clause_strategy() -> impl Strategy<Value = Vec<i32>> {
    let literal = (1..=VARS as i32, any::<bool>())
        .prop_map(|(var, sign)| if sign { var } else { -var });
    prop::collection::vec(literal, 1..=4)
}

fn instance_strategy() -> impl Strategy<Value = Vec<Vec<i32>>> {
    prop::collection::vec(clause_strategy(), 1..=40)
}

proptest! {
    #[test]
    fn verdict_matches_the_truth_table(clauses in instance_strategy()) {
        let (solver, verdict) = solve_clauses(&clauses);
        let expected = if brute_force_sat(&clauses) {
            Verdict::Sat
        } else {
            Verdict::Unsat
        };
        prop_assert_eq!(verdict, expected);

        // A SAT verdict must come with a model satisfying every clause
        if verdict == Verdict::Sat {
            let model = solver.model();
            for clause in &clauses {
                prop_assert!(clause.iter().any(|&code| lit(code).is_true_under(model)));
            }
        }
    }

    #[test]
    fn planted_instances_are_always_sat(
        bits in any::<u8>(),
        picks in prop::collection::vec(
            (prop::collection::vec(1..=VARS as i32, 1..=3), 0usize..3),
            1..=30,
        ),
    ) {
        // Force one literal per clause to agree with the planted model
        let clauses: Vec<Vec<i32>> = picks
            .into_iter()
            .map(|(vars, agree_at)| {
                let agree_at = agree_at % vars.len();
                vars.into_iter()
                    .enumerate()
                    .map(|(at, var)| {
                        let planted = bits >> (var - 1) & 1 == 1;
                        let positive = if at == agree_at { planted } else { !planted };
                        if positive { var } else { -var }
                    })
                    .collect()
            })
            .collect();

        let (solver, verdict) = solve_clauses(&clauses);
        prop_assert_eq!(verdict, Verdict::Sat);
        let model = solver.model();
        for clause in &clauses {
            prop_assert!(clause.iter().any(|&code| lit(code).is_true_under(model)));
        }
    }
}
