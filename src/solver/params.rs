/// Clause activity decay applied once per conflict
pub const CLAUSE_ACTIVITY_DECAY: f64 = 0.999;
/// Fraction of learnt clauses allowed relative to the original clauses
pub const MAX_LEARNTS_FACTOR: f64 = 1.0 / 3.0;
/// Growth of the learnt-clause limit on each adjust tick
pub const MAX_LEARNTS_GROWTH: f64 = 1.1;
/// Growth of the adjust interval itself on each tick
pub const ADJUST_INTERVAL_GROWTH: f64 = 1.5;
/// Conflicts between the first two adjust ticks
pub const ADJUST_INTERVAL_FIRST: usize = 100;
/// Base restart interval in conflicts
pub const RESTART_FIRST: usize = 100;
/// Per-restart scaling base fed to the Luby sequence
pub const RESTART_INC: f64 = 2.0;
