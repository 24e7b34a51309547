//! Combat events.
//!
//! Systems emit these through `EventWriter`; `CombatSim::tick` gathers the
//! current tick's events into a `TickReport`.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::boss::PhaseId;
use crate::psychology::PsychTier;
use crate::store::{Archetype, Faction};

/// Fired once per death, before the entity is removed
#[derive(Event, Debug, Clone, PartialEq)]
pub struct EntityDied {
    pub entity: Entity,
    pub last_attacker: Option<Entity>,
    pub position: Option<Vec2>,
    pub faction: Option<Faction>,
    pub archetype: Option<Archetype>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitKind {
    Melee,
    Projectile,
    Area,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct DamageDealt {
    pub target: Entity,
    pub source: Entity,
    pub amount: f32,
    pub kind: HitKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Avoidance {
    Dodged,
    Parried,
    PerfectParry,
}

/// A hit that connected in range but was dodged or parried
#[derive(Event, Debug, Clone, PartialEq)]
pub struct AttackAvoided {
    pub attacker: Entity,
    pub defender: Entity,
    pub kind: HitKind,
    pub how: Avoidance,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct PhaseTransitioned {
    pub boss: Entity,
    pub from: PhaseId,
    pub to: PhaseId,
    /// Ability ids unlocked by this transition
    pub unlocked: Vec<String>,
}

/// What moved a psychological tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TierCause {
    PowerCheck,
    AllyDeath,
    Fog,
    Decay,
    BossPhase,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct TierChanged {
    pub entity: Entity,
    pub from: PsychTier,
    pub to: PsychTier,
    pub cause: TierCause,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct RallyBroadcast {
    pub alpha: Entity,
    pub receivers: Vec<Entity>,
    pub urgent: bool,
}

/// Everything that happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub hits: Vec<DamageDealt>,
    pub avoided: Vec<AttackAvoided>,
    pub deaths: Vec<EntityDied>,
    pub phase_transitions: Vec<PhaseTransitioned>,
    pub tier_changes: Vec<TierChanged>,
    pub rallies: Vec<RallyBroadcast>,
}

impl TickReport {
    pub fn died(&self, entity: Entity) -> bool {
        self.deaths.iter().any(|d| d.entity == entity)
    }

    pub fn damage_to(&self, entity: Entity) -> f32 {
        self.hits
            .iter()
            .filter(|h| h.target == entity)
            .map(|h| h.amount)
            .sum()
    }
}
