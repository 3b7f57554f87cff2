//! Choice of the next self-directed goal.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::core::types::Goal;

/// Names of goals already attempted during this process lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalLedger {
    pub completed: BTreeSet<String>,
    pub failed: BTreeSet<String>,
}

impl GoalLedger {
    pub fn mark_completed(&mut self, name: &str) {
        self.failed.remove(name);
        self.completed.insert(name.to_string());
    }

    pub fn mark_failed(&mut self, name: &str) {
        self.failed.insert(name.to_string());
    }

    fn is_untried(&self, goal: &Goal) -> bool {
        !self.completed.contains(&goal.name) && !self.failed.contains(&goal.name)
    }
}

/// Pick a goal at random, preferring untried basic goals.
///
/// Fallback order when nothing is left: forget failures and retry basic
/// goals, then untried advanced goals, then forget everything and pick from
/// the whole catalog. Returns `None` only for an empty catalog.
pub fn select_goal<R: Rng + ?Sized>(
    basic: &[Goal],
    advanced: &[Goal],
    ledger: &mut GoalLedger,
    rng: &mut R,
) -> Option<Goal> {
    let mut available: Vec<&Goal> = basic.iter().filter(|g| ledger.is_untried(g)).collect();

    if available.is_empty() {
        ledger.failed.clear();
        available = basic
            .iter()
            .filter(|g| !ledger.completed.contains(&g.name))
            .collect();
    }
    if available.is_empty() {
        available = advanced.iter().filter(|g| ledger.is_untried(g)).collect();
    }
    if available.is_empty() {
        ledger.completed.clear();
        ledger.failed.clear();
        available = basic.iter().chain(advanced).collect();
    }

    available.choose(rng).map(|goal| (*goal).clone())
}
