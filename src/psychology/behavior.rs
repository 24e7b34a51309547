//! Behavior selector.
//!
//! Picks what an enemy is doing from its psychology, health and the distance
//! to its target. A chosen behavior holds for a rolled duration; fear tiers
//! FEARFUL and worse override it with RETREAT every tick.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{PsychologyState, PsychologyTraits};
use crate::combat::CombatRng;
use crate::config::BehaviorConfig;
use crate::config::CombatConfig;
use crate::store::{decay_timer, Attack, CombatTarget, Health, Transform2d};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Behavior {
    #[default]
    Idle,
    Pursue,
    Attack,
    Retreat,
    Flank,
    Defend,
}

#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct BehaviorState {
    pub behavior: Behavior,
    pub remaining: f32,
}

/// What the selector sees of one enemy this tick
#[derive(Debug, Clone, Copy)]
pub struct Situation {
    pub health_ratio: f32,
    pub distance: Option<f32>,
    pub attack_ready: bool,
    pub intelligence: f32,
}

/// Chance of flanking rather than pursuing inside the pursue band
pub fn flank_weight(config: &BehaviorConfig, intelligence: f32) -> f32 {
    ((1.0 - config.pursue_weight) * intelligence).clamp(0.0, 1.0)
}

/// Selection rule outside of fear overrides. `roll` is uniform in [0, 1).
pub fn choose(config: &BehaviorConfig, situation: &Situation, roll: f32) -> Behavior {
    if situation.health_ratio < config.defend_health {
        return Behavior::Defend;
    }
    match situation.distance {
        Some(d) if d < config.attack_distance && situation.attack_ready => Behavior::Attack,
        Some(d) if d < config.pursue_distance => {
            if roll < flank_weight(config, situation.intelligence) {
                Behavior::Flank
            } else {
                Behavior::Pursue
            }
        }
        _ => Behavior::Idle,
    }
}

/// System: refresh expired behaviors and apply the fear override
#[allow(clippy::type_complexity)]
pub fn select_behavior(
    time: Res<Time>,
    config: Res<CombatConfig>,
    mut rng: ResMut<CombatRng>,
    mut actors: Query<(
        Entity,
        &mut BehaviorState,
        &PsychologyState,
        Option<&PsychologyTraits>,
        Option<&Transform2d>,
        Option<&CombatTarget>,
        Option<&Health>,
        Option<&Attack>,
    )>,
    positions: Query<&Transform2d>,
) {
    let dt = time.delta_secs();
    let cfg = &config.behavior;

    let mut order: Vec<Entity> = actors.iter().map(|(e, ..)| e).collect();
    order.sort();

    for entity in order {
        let Ok((_, mut current, psych, traits, transform, target, health, attack)) =
            actors.get_mut(entity)
        else {
            continue;
        };

        if psych.tier.forces_retreat() {
            if current.behavior != Behavior::Retreat {
                tracing::debug!(entity = ?entity, tier = ?psych.tier, "fear forces retreat");
            }
            current.behavior = Behavior::Retreat;
            current.remaining = 0.0;
            continue;
        }

        decay_timer(&mut current.remaining, dt);
        if current.remaining > 0.0 {
            continue;
        }

        let distance = match (transform, target.and_then(|t| t.0)) {
            (Some(own), Some(target)) => positions
                .get(target)
                .ok()
                .map(|t| own.position.distance(t.position)),
            _ => None,
        };
        let situation = Situation {
            health_ratio: health.map_or(1.0, Health::ratio),
            distance,
            attack_ready: attack.is_some_and(Attack::is_ready),
            intelligence: traits.map_or(1.0, |t| t.intelligence),
        };
        let roll: f32 = rng.0.gen();

        current.behavior = choose(cfg, &situation, roll);
        current.remaining = rng.0.gen_range(cfg.duration_min..=cfg.duration_max);
    }
}
