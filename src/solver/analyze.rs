use crate::solver::store::{ClauseId, Lit};
use crate::solver::Solver;

/// Per-variable bookkeeping during conflict analysis
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Mark {
    /// Not involved in the conflict
    Clear,
    /// Contributes to the conflict
    Source,
    /// Known redundant in the learnt clause
    Removable,
    /// Known non-redundant
    Stuck,
}

impl Solver {
    /// Resolve backward from `conflict` to the first unique implication
    /// point of the current level. Fills `out` with the learnt clause,
    /// asserting literal first and a deepest-level literal second, and
    /// returns the level to backtrack to.
    pub(super) fn analyze(&mut self, conflict: ClauseId, out: &mut Vec<Lit>) -> usize {
        // Slot 0 is reserved for the asserting literal
        out.push(Lit::default());
        let mut reason = conflict;
        let mut at = self.trail.len();
        let mut path: i32 = 0;
        let mut pivot = Lit::default();
        let mut first_pass = true;
        let mut marks = vec![Mark::Clear; self.stats.vars];

        while first_pass || path > 0 {
            first_pass = false;
            debug_assert!(reason.is_valid());

            // Resolvents that stay useful deserve to survive reduction
            if reason.is_learnt() {
                self.bump_clause_activity(reason);
            }

            // Slot 0 of a reason clause holds the pivot being resolved
            // away; only the very first clause is scanned in full
            let skip_head = usize::from(pivot.is_valid());
            let len = self.clause_at(reason).len();
            for slot in skip_head..len {
                let q = self.clause_at(reason)[slot];
                let var = q.var();
                if marks[var] == Mark::Clear && self.var_states[var].level > 0 {
                    marks[var] = Mark::Source;
                    if self.var_states[var].level >= self.decision_level() {
                        path += 1;
                    } else {
                        out.push(q);
                    }
                }
            }

            // The next marked trail literal becomes the pivot
            while marks[self.trail[at - 1].var()] == Mark::Clear {
                at -= 1;
            }
            at -= 1;
            pivot = self.trail[at];
            reason = self.var_states[pivot.var()].reason;
            marks[pivot.var()] = Mark::Clear;
            path -= 1;
        }
        out[0] = !pivot;

        // Minimize: a literal whose whole reason is covered is redundant
        let mut write = 1;
        for read in 1..out.len() {
            let lit = out[read];
            if !self.var_states[lit.var()].reason.is_valid() || !self.redundant(&mut marks, lit) {
                out[write] = lit;
                write += 1;
            }
        }
        out.truncate(write);

        // Backjump to the deepest level still mentioned besides slot 0
        let mut target = 0;
        if out.len() > 1 {
            let mut deepest = 1;
            for slot in 2..out.len() {
                if self.var_states[out[slot].var()].level
                    > self.var_states[out[deepest].var()].level
                {
                    deepest = slot;
                }
            }
            target = self.var_states[out[deepest].var()].level;
            out.swap(1, deepest);
        }

        target
    }

    /// Whether `lit` is implied by level-0 facts plus literals already in
    /// the learnt clause, walking its reason graph with an explicit
    /// stack. Verdicts are cached in `marks` either way, so repeated
    /// queries never re-traverse a settled subgraph.
    fn redundant(&self, marks: &mut [Mark], lit: Lit) -> bool {
        debug_assert!(matches!(marks[lit.var()], Mark::Clear | Mark::Source));
        debug_assert!(self.var_states[lit.var()].reason.is_valid());

        let mut cursor = lit;
        let mut clause = self.clause_at(self.var_states[cursor.var()].reason);
        let mut stack: Vec<(usize, Lit)> = Vec::new();
        let mut at = 0;

        loop {
            at += 1;
            if at < clause.len() {
                let parent = clause[at];
                let parent_var = parent.var();

                // Already covered: top-level fact or a known contributor
                if self.var_states[parent_var].level == 0
                    || marks[parent_var] == Mark::Source
                    || marks[parent_var] == Mark::Removable
                {
                    continue;
                }

                // Dead end: a decision literal or a failed earlier walk
                if !self.var_states[parent_var].reason.is_valid()
                    || marks[parent_var] == Mark::Stuck
                {
                    stack.push((0, cursor));
                    for &(_, blocked) in &stack {
                        if marks[blocked.var()] == Mark::Clear {
                            marks[blocked.var()] = Mark::Stuck;
                        }
                    }
                    return false;
                }

                // Descend into the parent's own reason
                stack.push((at, cursor));
                at = 0;
                cursor = parent;
                clause = self.clause_at(self.var_states[cursor.var()].reason);
            } else {
                // Every parent of `cursor` checked out
                if marks[cursor.var()] == Mark::Clear {
                    marks[cursor.var()] = Mark::Removable;
                }

                match stack.pop() {
                    Some((resume, outer)) => {
                        at = resume;
                        cursor = outer;
                        clause = self.clause_at(self.var_states[cursor.var()].reason);
                    }
                    // Nothing left to justify
                    None => return true,
                }
            }
        }
    }
}
