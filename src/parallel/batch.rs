//! Parallel resolution of independent engagements.
//!
//! Each [Engagement] owns both of its fleets, so engagements never share
//! mutable state and can be resolved on any worker.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combat::fleet::Fleet;
use crate::combat::resolution::{BattleSummary, CombatEngine, CombatRoundResult};
use crate::combat::time::Timestamp;
use crate::error::Result;
use crate::parallel::pool::WorkerPool;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub attacker: Fleet,
    pub defender: Fleet,
}

impl Engagement {
    pub fn new(attacker: Fleet, defender: Fleet) -> Self {
        Self { attacker, defender }
    }
}

/// One round per engagement at `now`. Results keep the input order.
pub fn run_rounds_parallel(
    engine: &CombatEngine,
    engagements: &mut [Engagement],
    now: Timestamp,
    pool: &WorkerPool,
) -> Result<Vec<CombatRoundResult>> {
    pool.install(|| {
        engagements
            .par_iter_mut()
            .map(|e| engine.execute_round(&mut e.attacker, &mut e.defender, now))
            .collect()
    })
}

/// Full battles per engagement, each starting at `start`.
pub fn simulate_battles_parallel(
    engine: &CombatEngine,
    engagements: &mut [Engagement],
    start: Timestamp,
    max_rounds: u32,
    pool: &WorkerPool,
) -> Result<Vec<BattleSummary>> {
    pool.install(|| {
        engagements
            .par_iter_mut()
            .map(|e| engine.simulate_battle(&mut e.attacker, &mut e.defender, start, max_rounds))
            .collect()
    })
}
