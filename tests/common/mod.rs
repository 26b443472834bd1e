use kernsat::dimacs::CnfSink;
use kernsat::solver::store::{Lit, Truth};

/// Sink that records the instance verbatim, for cross-checking what the
/// real solver was fed
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub vars: usize,
    pub clauses: Vec<Vec<Lit>>,
}

impl CnfSink for RecordingSink {
    fn create_variables(&mut self, count: usize) {
        self.vars = count;
    }

    fn add_clause(&mut self, lits: &[Lit]) -> bool {
        self.clauses.push(lits.to_vec());
        true
    }
}

/// Every recorded clause must hold under `model`
#[allow(dead_code)]
pub fn assert_model_satisfies(model: &[Truth], recorded: &RecordingSink) {
    for clause in &recorded.clauses {
        assert!(
            clause.iter().any(|lit| lit.is_true_under(model)),
            "model leaves a clause unsatisfied: {clause:?}"
        );
    }
}
