use crate::solver::store::{ClauseId, Watcher};
use crate::solver::Solver;

impl Solver {
    /// Propagate every trail entry from `queue_head` onward to fixpoint.
    /// Returns the falsified clause, or the sentinel when none exists.
    ///
    /// Watcher lists are rewritten in place with a read/write cursor
    /// pair; entries survive in order unless their watch relocates.
    pub(super) fn propagate(&mut self) -> ClauseId {
        let mut conflict = ClauseId::default();

        while self.queue_head < self.trail.len() {
            let prop = self.trail[self.queue_head];
            self.queue_head += 1;
            self.stats.propagations += 1;

            let total = self.watchers[prop.index()].len();
            let mut read = 0;
            let mut write = 0;
            while read < total {
                // While the blocker holds the clause stays satisfied and
                // need not be touched at all
                let (id, blocker) = {
                    let list = &mut self.watchers[prop.index()];
                    let watcher = list[read];
                    if watcher.blocker.is_true_under(&self.assigns) {
                        list[write] = watcher;
                        read += 1;
                        write += 1;
                        continue;
                    }
                    (watcher.clause, watcher.blocker)
                };

                // Normalize so the falsified watch sits in slot 1
                let falsified = !prop;
                let head = {
                    let clause = self.clause_at_mut(id);
                    if clause[0] == falsified {
                        clause.swap(0, 1);
                    }
                    debug_assert_eq!(clause[1], falsified);
                    read += 1;
                    clause[0]
                };

                // Satisfied through the other watch
                let renewed = Watcher {
                    clause: id,
                    blocker: head,
                };
                if head != blocker && head.is_true_under(&self.assigns) {
                    self.watchers[prop.index()][write] = renewed;
                    write += 1;
                    continue;
                }

                // Hunt for a non-false replacement among the tail literals
                let relocated = {
                    let clause = if id.is_learnt() {
                        &mut self.learnts[id]
                    } else {
                        &mut self.originals[id]
                    };
                    let (assigns, watchers) = (&self.assigns, &mut self.watchers);
                    let mut relocated = false;
                    for tail in 2..clause.len() {
                        if !clause[tail].is_false_under(assigns) {
                            clause.swap(1, tail);
                            watchers[(!clause[1]).index()].push(renewed);
                            relocated = true;
                            break;
                        }
                    }
                    relocated
                };
                if relocated {
                    continue;
                }

                // No replacement watch: the clause is unit or falsified
                let list = &mut self.watchers[prop.index()];
                list[write] = renewed;
                write += 1;
                if head.is_false_under(&self.assigns) {
                    conflict = id;
                    self.queue_head = self.trail.len();
                    // Keep the unvisited tail of the list intact
                    while read < list.len() {
                        list[write] = list[read];
                        read += 1;
                        write += 1;
                    }
                } else {
                    self.enqueue(head, id);
                }
            }

            self.watchers[prop.index()].truncate(write);
        }

        conflict
    }
}
