//! Boss phase controller.
//!
//! A boss moves through `Phase1 -> Phase2 -> Phase3 -> Final` as its health
//! ratio crosses the configured thresholds (default 0.7 / 0.4 / 0.2). Phases
//! only ever advance. A single large hit may skip phases; the boss lands in the
//! lowest applicable phase and every ability gated at or below it unlocks in
//! one transition.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::abilities::AbilityBook;
use crate::events::{PhaseTransitioned, TierCause, TierChanged};
use crate::psychology::{PsychTier, PsychologyState};
use crate::store::Health;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhaseId {
    Phase1,
    Phase2,
    Phase3,
    Final,
}

impl PhaseId {
    pub const ALL: [PhaseId; 4] = [
        PhaseId::Phase1,
        PhaseId::Phase2,
        PhaseId::Phase3,
        PhaseId::Final,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    /// Phase for a health ratio. `ratio <= threshold` crosses it.
    pub fn for_ratio(ratio: f32, thresholds: &[f32]) -> Self {
        let crossed = thresholds.iter().filter(|t| ratio <= **t).count();
        Self::from_index(crossed)
    }
}

#[derive(Component, Debug, Clone, PartialEq)]
pub struct BossPhase {
    pub phase: PhaseId,
    /// Descending health ratios, one per transition
    pub thresholds: Vec<f32>,
}

impl BossPhase {
    pub fn new(thresholds: &[f32]) -> Self {
        Self {
            phase: PhaseId::Phase1,
            thresholds: thresholds.to_vec(),
        }
    }

    /// Advance to the phase `ratio` calls for. Returns `(from, to)` when the
    /// phase moved; never moves backwards.
    pub fn advance(&mut self, ratio: f32) -> Option<(PhaseId, PhaseId)> {
        let target = PhaseId::for_ratio(ratio, &self.thresholds);
        if target <= self.phase {
            return None;
        }
        let from = self.phase;
        self.phase = target;
        Some((from, target))
    }
}

/// System: phase checks after this tick's damage, before the death pass
pub fn evaluate_boss_phases(
    mut bosses: Query<(
        Entity,
        &Health,
        &mut BossPhase,
        Option<&mut AbilityBook>,
        Option<&mut PsychologyState>,
    )>,
    mut transitions: EventWriter<PhaseTransitioned>,
    mut tier_changes: EventWriter<TierChanged>,
) {
    let mut order: Vec<Entity> = bosses.iter().map(|(e, ..)| e).collect();
    order.sort();

    for boss in order {
        let Ok((_, health, mut phase, book, psych)) = bosses.get_mut(boss) else {
            continue;
        };
        // A dead boss does not transition; it dies
        if !health.is_alive() {
            continue;
        }
        let Some((from, to)) = phase.advance(health.ratio()) else {
            continue;
        };

        let unlocked = book
            .map(|mut b| b.unlock_through(to))
            .unwrap_or_default();

        if let Some(mut state) = psych {
            let previous = state.tier;
            state.enrage();
            if previous != PsychTier::Empowered {
                tier_changes.send(TierChanged {
                    entity: boss,
                    from: previous,
                    to: PsychTier::Empowered,
                    cause: TierCause::BossPhase,
                });
            }
        }

        tracing::info!(
            boss = ?boss,
            from = ?from,
            to = ?to,
            unlocked = ?unlocked,
            health = health.ratio(),
            "boss phase transition"
        );
        transitions.send(PhaseTransitioned {
            boss,
            from,
            to,
            unlocked,
        });
    }
}
