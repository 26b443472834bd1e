use rand::{seq::SliceRandom, Rng, SeedableRng};

use crate::dimacs::CnfSink;
use crate::solver::store::{ClauseId, ClauseStore, Lit, Truth, Var, VarState, Watcher};

mod analyze;
mod luby;
mod params;
mod propagate;
pub mod store;

/// How much diagnostic output to print while solving
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Verbosity {
    /// Only the result line
    Quiet,
    /// Banners and search-progress rows as well
    Verbose,
}

/// Solver result; the discriminants double as process exit codes
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Verdict {
    Unknown = 0,
    Sat = 10,
    Unsat = 20,
}

/// Counters reported in the diagnostic banners
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Stats {
    /// Number of variables
    pub vars: usize,
    /// Number of attached original clauses
    pub clauses: usize,
    /// Number of literals in attached original clauses
    pub clause_lits: usize,
    /// Number of attached learnt clauses
    pub learnts: usize,
    /// Number of literals in attached learnt clauses
    pub learnt_lits: usize,
    /// Number of search (re-)starts
    pub restarts: usize,
    /// Number of branching decisions
    pub decisions: usize,
    /// Number of conflicts over all restarts
    pub conflicts: usize,
    /// Number of propagated trail entries
    pub propagations: usize,
}

/// CDCL search engine over a loaded CNF instance
pub struct Solver {
    // -- Problem representation
    /// Clauses of the instance itself
    originals: ClauseStore,
    /// Clauses learnt from conflicts
    learnts: ClauseStore,

    // -- Search state
    /// Assigned literals in assignment order
    trail: Vec<Lit>,
    /// Trail offsets where each decision level begins
    level_marks: Vec<usize>,
    /// First trail entry not yet propagated
    queue_head: usize,
    /// Current assignment per variable
    assigns: Vec<Truth>,
    /// Last assigned polarity per variable (phase saving)
    saved_phases: Vec<bool>,
    /// Reason clause and decision level per variable
    var_states: Vec<VarState>,
    /// Watcher lists keyed by literal index
    watchers: Vec<Vec<Watcher>>,
    /// Pool of variables believed unassigned
    unassigned: Vec<Var>,

    // -- Policy state
    /// Diagnostic output gate
    verbosity: Verbosity,
    /// Amount added to a clause activity per bump
    cla_inc: f64,
    /// Learnt clauses tolerated before reduction (dynamically scaled)
    max_learnts: f64,
    /// Conflicts between adjust ticks (grows over time)
    adjust_interval: f64,
    /// Conflicts left until the next adjust tick
    adjust_left: usize,
    /// Clauses received through `add_clause`, attached or not
    input_clauses: usize,
    /// Branching randomness, fixed seed for reproducible runs
    rng: rand::rngs::SmallRng,
    /// Solver statistics
    stats: Stats,
}

impl Solver {
    /// Fresh solver with no variables or clauses
    #[must_use]
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            originals: ClauseStore::new(false),
            learnts: ClauseStore::new(true),
            trail: Vec::new(),
            level_marks: Vec::new(),
            queue_head: 0,
            assigns: Vec::new(),
            saved_phases: Vec::new(),
            var_states: Vec::new(),
            watchers: Vec::new(),
            unassigned: Vec::new(),
            verbosity,
            cla_inc: 1.0,
            max_learnts: 0.0,
            adjust_interval: params::ADJUST_INTERVAL_FIRST as f64,
            adjust_left: params::ADJUST_INTERVAL_FIRST,
            input_clauses: 0,
            rng: rand::rngs::SmallRng::seed_from_u64(42),
            stats: Stats::default(),
        }
    }

    /// Number of variables
    #[must_use]
    pub const fn num_variables(&self) -> usize {
        self.stats.vars
    }

    /// Number of attached original clauses
    #[must_use]
    pub const fn num_clauses(&self) -> usize {
        self.stats.clauses
    }

    /// Solver statistics
    #[must_use]
    pub const fn statistics(&self) -> &Stats {
        &self.stats
    }

    /// Per-variable assignment; total after a `Sat` verdict
    #[must_use]
    pub fn model(&self) -> &[Truth] {
        &self.assigns
    }

    /// Decide satisfiability of the loaded instance
    pub fn solve(&mut self) -> Verdict {
        // Nothing to decide on an empty problem
        if self.stats.vars == 0 || self.input_clauses == 0 {
            return Verdict::Unknown;
        }

        // Top-level propagation may already close the instance
        if !self.simplify() {
            return Verdict::Unsat;
        }

        self.max_learnts = as_f64(self.stats.clauses) * params::MAX_LEARNTS_FACTOR;

        // Luby-scheduled restarts until a round reaches a verdict
        self.stats.restarts = 0;
        let mut verdict = Verdict::Unknown;
        while verdict == Verdict::Unknown {
            let scale = luby::luby(params::RESTART_INC, self.stats.restarts);
            verdict = self.search(trunc_usize(scale * as_f64(params::RESTART_FIRST)));
            self.stats.restarts += 1;
        }

        verdict
    }

    /// One restart round: search until a verdict or `budget` conflicts
    fn search(&mut self, budget: usize) -> Verdict {
        let mut conflicts = 0;
        let mut learnt = Vec::new();

        loop {
            let conflict = self.propagate();

            if conflict.is_valid() {
                self.stats.conflicts += 1;
                conflicts += 1;

                // A conflict with nothing left to undo refutes the instance
                if self.decision_level() == 0 {
                    return Verdict::Unsat;
                }

                learnt.clear();
                let backjump = self.analyze(conflict, &mut learnt);
                self.backtrack_to(backjump);

                if learnt.len() == 1 {
                    // The asserting literal is a fresh top-level fact
                    self.enqueue(learnt[0], ClauseId::default());
                } else {
                    let id = self.attach_clause(learnt.clone(), true);
                    self.bump_clause_activity(id);
                    self.enqueue(learnt[0], id);
                }

                // Decay so newer clauses outweigh older ones
                self.cla_inc *= 1.0 / params::CLAUSE_ACTIVITY_DECAY;

                self.adjust_left -= 1;
                if self.adjust_left == 0 {
                    self.adjust_interval *= params::ADJUST_INTERVAL_GROWTH;
                    self.adjust_left = trunc_usize(self.adjust_interval);
                    self.max_learnts *= params::MAX_LEARNTS_GROWTH;

                    if self.verbosity == Verbosity::Verbose {
                        self.print_progress_row();
                    }
                }
            } else {
                if conflicts >= budget {
                    // Out of budget; hand control back to the restart loop
                    self.backtrack_to(0);
                    return Verdict::Unknown;
                }

                if self.decision_level() == 0 && !self.simplify() {
                    return Verdict::Unsat;
                }

                if as_f64(self.stats.learnts) >= self.max_learnts + as_f64(self.trail.len()) {
                    self.reduce_learnts();
                }

                self.stats.decisions += 1;
                if let Some(decision) = self.next_decision() {
                    self.level_marks.push(self.trail.len());
                    self.enqueue(decision, ClauseId::default());
                } else {
                    // Every variable assigned without conflict
                    return Verdict::Sat;
                }
            }
        }
    }

    /// Random unassigned variable with its saved phase, if any is left
    fn next_decision(&mut self) -> Option<Lit> {
        while !self.unassigned.is_empty() {
            let at = self.rng.random_range(0..self.unassigned.len());
            let var = self.unassigned.swap_remove(at);

            // The pool may lag behind the trail
            if self.assigns[var].is_undef() {
                return Some(Lit::new(var, self.saved_phases[var]));
            }
        }

        None
    }

    /// The clause behind a handle, from either store
    fn clause_at(&self, id: ClauseId) -> &Vec<Lit> {
        if id.is_learnt() {
            &self.learnts[id]
        } else {
            &self.originals[id]
        }
    }

    /// The clause behind a handle, from either store
    fn clause_at_mut(&mut self, id: ClauseId) -> &mut Vec<Lit> {
        if id.is_learnt() {
            &mut self.learnts[id]
        } else {
            &mut self.originals[id]
        }
    }

    /// Whether the clause is the recorded reason for its first literal
    fn is_locked(&self, id: ClauseId) -> bool {
        let head = self.clause_at(id)[0];
        head.is_true_under(&self.assigns) && self.var_states[head.var()].reason == id
    }

    /// Raise a learnt clause's activity, rescaling all on overflow
    fn bump_clause_activity(&mut self, id: ClauseId) {
        debug_assert!(id.is_learnt());
        let bumped = {
            let activity = self.learnts.activity_mut(id);
            *activity += self.cla_inc;
            *activity
        };
        if bumped > 1e20 {
            self.learnts.scale_activities(1e-20);
            self.cla_inc *= 1e-20;
        }
    }

    /// Current decision level
    const fn decision_level(&self) -> usize {
        self.level_marks.len()
    }

    /// Undo every assignment above `level`, saving phases on the way
    fn backtrack_to(&mut self, level: usize) {
        if self.decision_level() <= level {
            return;
        }

        let keep = self.level_marks[level];
        for at in (keep..self.trail.len()).rev() {
            let lit = self.trail[at];
            let var = lit.var();
            self.assigns[var] = Truth::Undef;
            self.saved_phases[var] = lit.sign();
            self.unassigned.push(var);
        }

        self.queue_head = keep;
        self.trail.truncate(keep);
        self.level_marks.truncate(level);
    }

    /// Record an assignment on the trail; the variable must be unassigned
    fn enqueue(&mut self, lit: Lit, reason: ClauseId) {
        let var = lit.var();
        debug_assert!(self.assigns[var].is_undef());

        self.assigns[var] = Truth::from_bool(lit.sign());
        self.var_states[var] = VarState {
            reason,
            level: self.decision_level(),
        };
        self.trail.push(lit);
    }

    /// Store a clause and watch it through its first two literals
    fn attach_clause(&mut self, lits: Vec<Lit>, learnt: bool) -> ClauseId {
        let first = lits[0];
        let second = lits[1];
        let id = if learnt {
            self.stats.learnts += 1;
            self.stats.learnt_lits += lits.len();
            self.learnts.add(lits)
        } else {
            self.stats.clauses += 1;
            self.stats.clause_lits += lits.len();
            self.originals.add(lits)
        };

        self.watchers[(!first).index()].push(Watcher {
            clause: id,
            blocker: second,
        });
        self.watchers[(!second).index()].push(Watcher {
            clause: id,
            blocker: first,
        });
        id
    }

    /// Unwatch and drop a clause, releasing its reason role if locked
    fn detach_clause(&mut self, id: ClauseId) {
        let (first, second, len) = {
            let clause = self.clause_at(id);
            (clause[0], clause[1], clause.len())
        };
        self.remove_watcher(!first, id);
        self.remove_watcher(!second, id);
        if self.is_locked(id) {
            self.var_states[first.var()].reason = ClauseId::default();
        }

        if id.is_learnt() {
            self.stats.learnts -= 1;
            self.stats.learnt_lits -= len;
            self.learnts.remove(id);
        } else {
            self.stats.clauses -= 1;
            self.stats.clause_lits -= len;
            self.originals.remove(id);
        }
    }

    /// Drop the watcher entry for `id` filed under `lit`
    fn remove_watcher(&mut self, lit: Lit, id: ClauseId) {
        let list = &mut self.watchers[lit.index()];
        let at = list.iter().position(|watcher| watcher.clause == id);
        debug_assert!(at.is_some());
        if let Some(at) = at {
            list.remove(at);
        }
    }

    /// Drop learnt clauses with below-threshold activity.
    ///
    /// The threshold is the smaller of the median live activity and
    /// `cla_inc / live_count`; binary and locked clauses always survive.
    fn reduce_learnts(&mut self) {
        let mut live: Vec<usize> = (0..self.learnts.len())
            .filter(|&slot| !self.learnts[ClauseId::new(slot, true)].is_empty())
            .collect();
        if live.is_empty() {
            return;
        }
        live.sort_by(|&a, &b| {
            let left = self.learnts.activity(ClauseId::new(a, true));
            let right = self.learnts.activity(ClauseId::new(b, true));
            left.total_cmp(&right)
        });

        let median = self
            .learnts
            .activity(ClauseId::new(live[live.len() / 2], true));
        let threshold = median.min(self.cla_inc / as_f64(live.len()));

        for &slot in &live {
            let id = ClauseId::new(slot, true);
            if self.learnts[id].len() > 2
                && self.learnts.activity(id) < threshold
                && !self.is_locked(id)
            {
                self.detach_clause(id);
            }
        }
    }

    /// Walk one store, detaching satisfied clauses and compacting the
    /// unwatched tail of the survivors
    fn sweep_satisfied(&mut self, learnt: bool) {
        let upper = if learnt {
            self.learnts.len()
        } else {
            self.originals.len()
        };

        for slot in 0..upper {
            let id = ClauseId::new(slot, learnt);
            if self.clause_at(id).is_empty() {
                continue;
            }

            let satisfied = self
                .clause_at(id)
                .iter()
                .any(|lit| lit.is_true_under(&self.assigns));
            if satisfied {
                self.detach_clause(id);
            } else {
                // The watched pair is necessarily unassigned here: a true
                // watch would have satisfied the clause, a false one is
                // ruled out at the top level by completed propagation
                debug_assert!(self.clause_at(id)[0].is_undef_under(&self.assigns));
                debug_assert!(self.clause_at(id)[1].is_undef_under(&self.assigns));
                let mut at = 2;
                while at < self.clause_at(id).len() {
                    if self.clause_at(id)[at].is_false_under(&self.assigns) {
                        self.clause_at_mut(id).swap_remove(at);
                        if learnt {
                            self.stats.learnt_lits -= 1;
                        } else {
                            self.stats.clause_lits -= 1;
                        }
                    } else {
                        at += 1;
                    }
                }
            }
        }
    }

    /// Top-level cleanup: propagate pending facts, drop satisfied
    /// clauses, rebuild and reshuffle the unassigned pool.
    /// Returns `false` if propagation refutes the instance.
    fn simplify(&mut self) -> bool {
        debug_assert_eq!(self.decision_level(), 0);

        if self.propagate().is_valid() {
            return false;
        }

        self.sweep_satisfied(true);
        self.sweep_satisfied(false);

        self.unassigned.clear();
        for var in 0..self.assigns.len() {
            if self.assigns[var].is_undef() {
                self.unassigned.push(var);
            }
        }
        self.unassigned.shuffle(&mut self.rng);

        true
    }

    /// Fraction of the search space excluded so far, discounted by level
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn progress_estimate(&self) -> f64 {
        let base = 1.0 / as_f64(self.stats.vars);
        let mut progress = 0.0;

        for level in 0..=self.decision_level() {
            let begin = if level == 0 {
                0
            } else {
                self.level_marks[level - 1]
            };
            let end = if level == self.decision_level() {
                self.trail.len()
            } else {
                self.level_marks[level]
            };
            progress += base.powi(level as i32) * as_f64(end - begin);
        }

        progress / as_f64(self.stats.vars)
    }

    /// One row of the search-statistics table
    fn print_progress_row(&self) {
        let root_assigned = self.level_marks.first().copied().unwrap_or(self.trail.len());
        let free_vars = self.stats.vars - root_assigned;
        let lits_per_learnt = as_f64(self.stats.learnt_lits) / as_f64(self.stats.learnts);
        println!(
            "| {:>9} | {:>7} {:>8} {:>8} | {:>8.0} {:>8} {:>6.0} | {:>6.3} % |",
            self.stats.conflicts,
            free_vars,
            self.stats.clauses,
            self.stats.clause_lits,
            self.max_learnts,
            self.stats.learnts,
            lits_per_learnt,
            self.progress_estimate() * 100.0
        );
    }
}

impl CnfSink for Solver {
    fn create_variables(&mut self, count: usize) {
        self.stats.vars = count;
        self.assigns.resize(count, Truth::Undef);
        self.saved_phases.resize(count, false);
        self.var_states.resize(count, VarState::default());
        self.watchers.resize(count * 2, Vec::new());
        self.trail.reserve(count + 1);
        self.unassigned.reserve(count);
    }

    fn add_clause(&mut self, lits: &[Lit]) -> bool {
        debug_assert_eq!(self.decision_level(), 0);
        debug_assert!(!lits.is_empty());
        self.input_clauses += 1;

        // Sorting makes duplicates and complementary pairs adjacent
        let mut lits = lits.to_vec();
        lits.sort_unstable();

        let mut prev = Lit::default();
        let mut kept = 0;
        for at in 0..lits.len() {
            let lit = lits[at];
            debug_assert!(lit.var() < self.stats.vars);

            // Satisfied at the top level
            if self.assigns[lit.var()] == lit.sign() {
                return true;
            }
            // `A or not A` carries no information
            if lit == !prev {
                return true;
            }
            // Contradicted at the top level; drop the literal
            if self.assigns[lit.var()] == !lit.sign() {
                continue;
            }
            if lit == prev {
                continue;
            }

            prev = lit;
            lits[kept] = lit;
            kept += 1;
        }
        lits.truncate(kept);

        match lits.len() {
            // Every literal refuted at the top level
            0 => false,
            1 => {
                self.enqueue(lits[0], ClauseId::default());
                !self.propagate().is_valid()
            }
            _ => {
                self.attach_clause(lits, false);
                true
            }
        }
    }
}

/// Cast `usize` to `f64`; precision loss is fine for heuristics
#[allow(clippy::cast_precision_loss)]
fn as_f64(x: usize) -> f64 {
    x as f64
}

/// Truncate a non-negative `f64` to `usize`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn trunc_usize(x: f64) -> usize {
    debug_assert!(x >= 0.0);
    x.trunc() as usize
}
