//! Psychological state machine.
//!
//! Every enemy with `PsychologyTraits` carries a `PsychologyState` whose tier
//! scales its damage, defense and speed. Four drivers move the tier, checked in
//! priority order each tick; the first one that changes the tier wins and
//! rolls a fresh state duration:
//!
//! 1. power check against the current target (`ThreatProfile` ratio)
//! 2. a same-faction death within the awareness radius
//! 3. fog empowerment above the threshold
//! 4. decay: when the duration runs out, one rung toward NORMAL
//!
//! The power check weighs two more things. Nearby same-faction allies lend
//! pack strength, which shrinks the ratio. Grudge built up from witnessed
//! ally deaths makes the target look stronger, and past a floor it also
//! raises outgoing damage.
//!
//! An active rally dampens fear by one rung and absorbs ally-death shocks.
//! A boss in phase lock (`locked`) ignores every driver.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub mod behavior;
pub mod pack;

pub use behavior::{Behavior, BehaviorState};

use crate::combat::CombatRng;
use crate::config::{CombatConfig, PackStrengthConfig, PsychologyConfig};
use crate::constants::{ALPHA_DOMINANCE, TRAIT_MAX, TRAIT_MIN};
use crate::events::{EntityDied, TierCause, TierChanged};
use crate::store::{decay_timer, CombatTarget, Faction, Health, ThreatProfile, Transform2d};
use pack::{alpha_alive, PackAlpha, RallyStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PsychTier {
    Normal,
    Hesitant,
    Fearful,
    Terrified,
    Subservient,
    Empowered,
}

impl PsychTier {
    pub const ALL: [PsychTier; 6] = [
        PsychTier::Empowered,
        PsychTier::Normal,
        PsychTier::Hesitant,
        PsychTier::Fearful,
        PsychTier::Terrified,
        PsychTier::Subservient,
    ];

    /// Position on the fear ladder; EMPOWERED sits one below NORMAL
    pub fn rung(self) -> i8 {
        match self {
            PsychTier::Empowered => -1,
            PsychTier::Normal => 0,
            PsychTier::Hesitant => 1,
            PsychTier::Fearful => 2,
            PsychTier::Terrified => 3,
            PsychTier::Subservient => 4,
        }
    }

    pub fn from_rung(rung: i8) -> Self {
        match rung {
            i8::MIN..=-1 => PsychTier::Empowered,
            0 => PsychTier::Normal,
            1 => PsychTier::Hesitant,
            2 => PsychTier::Fearful,
            3 => PsychTier::Terrified,
            _ => PsychTier::Subservient,
        }
    }

    pub fn more_fearful(self) -> Self {
        Self::from_rung(self.rung() + 1)
    }

    pub fn toward_normal(self) -> Self {
        Self::from_rung(self.rung() - self.rung().signum())
    }

    pub fn is_fear(self) -> bool {
        self.rung() > 0
    }

    /// FEARFUL and worse override behavior selection with RETREAT
    pub fn forces_retreat(self) -> bool {
        self.rung() >= PsychTier::Fearful.rung()
    }

    /// TERRIFIED and SUBSERVIENT enemies do not initiate melee
    pub fn suppresses_attacks(self) -> bool {
        self.rung() >= PsychTier::Terrified.rung()
    }
}

/// Per-enemy personality, each trait clamped to [0.5, 1.5]
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PsychologyTraits {
    /// Scales the fear thresholds: braver enemies need a larger power gap
    pub bravery: f32,
    /// Outgoing damage multiplier
    pub aggression: f32,
    /// Flanking tendency
    pub intelligence: f32,
    /// Scales how long a rally lasts on this enemy
    pub pack_mentality: f32,
    /// Alphas are enemies with high dominance
    pub dominance: f32,
}

impl Default for PsychologyTraits {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0, 1.0)
    }
}

impl PsychologyTraits {
    pub const fn new(
        bravery: f32,
        aggression: f32,
        intelligence: f32,
        pack_mentality: f32,
        dominance: f32,
    ) -> Self {
        Self {
            bravery,
            aggression,
            intelligence,
            pack_mentality,
            dominance,
        }
    }

    pub fn clamped(self) -> Self {
        let c = |v: f32| {
            if v.is_finite() {
                v.clamp(TRAIT_MIN, TRAIT_MAX)
            } else {
                1.0
            }
        };
        Self::new(
            c(self.bravery),
            c(self.aggression),
            c(self.intelligence),
            c(self.pack_mentality),
            c(self.dominance),
        )
    }

    pub fn is_alpha(&self) -> bool {
        self.dominance >= ALPHA_DOMINANCE
    }
}

#[derive(Component, Debug, Clone, PartialEq)]
pub struct PsychologyState {
    pub tier: PsychTier,
    /// Seconds until the tier decays one rung; infinite while locked
    pub state_duration: f32,
    /// External fog scalar in [0, 1]
    pub fog_empowerment: f32,
    /// Animosity from witnessed ally deaths, [0, 1]
    pub grudge: f32,
    /// Set by a boss phase transition; no driver moves a locked state
    pub locked: bool,
}

impl Default for PsychologyState {
    fn default() -> Self {
        Self {
            tier: PsychTier::Normal,
            state_duration: 0.0,
            fog_empowerment: 0.0,
            grudge: 0.0,
            locked: false,
        }
    }
}

impl PsychologyState {
    /// Boss override: EMPOWERED for good
    pub fn enrage(&mut self) {
        self.tier = PsychTier::Empowered;
        self.state_duration = f32::INFINITY;
        self.locked = true;
    }
}

/// Target power over own level, fog shrinking the gap
pub fn power_ratio(target: &ThreatProfile, own: &ThreatProfile, fog: f32) -> f32 {
    let own_level = own.level.max(1) as f32;
    target.power() / (own_level * (1.0 + fog.max(0.0)))
}

/// Bonus from `allies` same-faction neighbours, capped, plus a flat alpha bonus
pub fn pack_strength(
    allies: usize,
    alpha_nearby: bool,
    pack_mentality: f32,
    config: &PackStrengthConfig,
) -> f32 {
    if allies == 0 {
        return 0.0;
    }
    let base = (allies as f32 * config.per_ally).min(config.cap);
    let alpha = if alpha_nearby { config.alpha_bonus } else { 0.0 };
    base * pack_mentality + alpha
}

/// Power ratio after grudge inflates the target and the pack backs the enemy
pub fn morale_adjusted(ratio: f32, pack_bonus: f32, grudge: f32, config: &PsychologyConfig) -> f32 {
    ratio * (1.0 + grudge.max(0.0) * config.grudge.power_scale) / (1.0 + pack_bonus.max(0.0))
}

/// Tier the power check calls for, `None` if the fight is even.
/// A rally softens any fear verdict by one rung.
pub fn power_verdict(
    ratio: f32,
    traits: &PsychologyTraits,
    config: &PsychologyConfig,
    rallied: bool,
) -> Option<PsychTier> {
    gated_power_verdict(ratio, traits, config, rallied, true)
}

/// `power_verdict` with the subservience roll already decided: a failed roll
/// stops at TERRIFIED before any rally softening.
pub fn gated_power_verdict(
    ratio: f32,
    traits: &PsychologyTraits,
    config: &PsychologyConfig,
    rallied: bool,
    subservience_passes: bool,
) -> Option<PsychTier> {
    if !ratio.is_finite() {
        return None;
    }
    if ratio <= config.empowered_ratio {
        return Some(PsychTier::Empowered);
    }
    let tier = match config.thresholds.scaled(traits.bravery).tier_for(ratio) {
        PsychTier::Subservient if !subservience_passes => PsychTier::Terrified,
        tier => tier,
    };
    let tier = if rallied && tier.is_fear() {
        tier.toward_normal()
    } else {
        tier
    };
    tier.is_fear().then_some(tier)
}

/// System: run the tier drivers for every enemy
#[allow(clippy::type_complexity)]
pub fn update_psychology(
    time: Res<Time>,
    config: Res<CombatConfig>,
    mut rng: ResMut<CombatRng>,
    mut deaths: EventReader<EntityDied>,
    mut minds: Query<(
        Entity,
        &mut PsychologyState,
        &PsychologyTraits,
        Option<&Transform2d>,
        Option<&ThreatProfile>,
        Option<&CombatTarget>,
        Option<&Faction>,
        Option<&RallyStatus>,
    )>,
    threats: Query<&ThreatProfile>,
    alphas: Query<Option<&Health>, With<PackAlpha>>,
    mut changes: EventWriter<TierChanged>,
) {
    let dt = time.delta_secs();
    let cfg = &config.psychology;
    let deaths: Vec<EntityDied> = deaths.read().cloned().collect();

    let mut order: Vec<Entity> = minds.iter().map(|(e, ..)| e).collect();
    order.sort();

    // Dead enemies were despawned in the death pass
    let roster: Vec<(Entity, Vec2, Faction, bool)> = minds
        .iter()
        .filter_map(|(e, _, traits, transform, _, _, faction, _)| {
            Some((e, transform?.position, *faction?, traits.is_alpha()))
        })
        .collect();

    for entity in order {
        let Ok((_, mut state, traits, transform, own, target, faction, rally)) =
            minds.get_mut(entity)
        else {
            continue;
        };
        if state.locked {
            continue;
        }

        let rallied = rally
            .is_some_and(|r| r.remaining > 0.0 && alphas.get(r.alpha).is_ok_and(alpha_alive));

        let shaken = transform.is_some_and(|t| {
            deaths.iter().any(|d| {
                d.entity != entity
                    && d.faction.is_some()
                    && d.faction == faction.copied()
                    && d
                        .position
                        .is_some_and(|p| p.distance(t.position) <= cfg.awareness_radius)
            })
        });
        if shaken {
            state.grudge = (state.grudge + cfg.grudge.per_ally_death).min(1.0);
        }

        let pack_bonus = match (transform, faction) {
            (Some(t), Some(f)) => {
                let nearby = roster.iter().filter(|(other, position, other_faction, _)| {
                    *other != entity
                        && other_faction == f
                        && position.distance(t.position) <= cfg.pack.radius
                });
                let allies = nearby.clone().count();
                let alpha_nearby = nearby.clone().any(|(.., alpha)| *alpha);
                pack_strength(allies, alpha_nearby, traits.pack_mentality, &cfg.pack)
            }
            _ => 0.0,
        };

        // 1. Power check
        let verdict = match (own, target.and_then(|t| t.0)) {
            (Some(own), Some(target)) => match threats.get(target) {
                Ok(threat) => {
                    let ratio = morale_adjusted(
                        power_ratio(threat, own, state.fog_empowerment),
                        pack_bonus,
                        state.grudge,
                        cfg,
                    );
                    let passes = cfg.subservience_chance >= 1.0
                        || rng.0.gen::<f32>() < cfg.subservience_chance;
                    gated_power_verdict(ratio, traits, cfg, rallied, passes)
                }
                Err(_) => None,
            },
            _ => None,
        };
        let mut change = verdict.and_then(|v| {
            let fires = if v == PsychTier::Empowered {
                state.tier != PsychTier::Empowered
            } else {
                v.rung() > state.tier.rung()
            };
            fires.then_some((v, TierCause::PowerCheck))
        });
        let outpowered = verdict.is_some_and(PsychTier::is_fear);

        // 2. Ally death nearby
        if change.is_none() && shaken {
            if rallied {
                tracing::debug!(entity = ?entity, "ally death absorbed by rally");
            } else {
                let next = state.tier.more_fearful();
                if next != state.tier {
                    change = Some((next, TierCause::AllyDeath));
                }
            }
        }

        // 3. Fog, unless the power check says this enemy is outmatched
        if change.is_none()
            && !outpowered
            && state.fog_empowerment > cfg.fog_threshold
            && state.tier != PsychTier::Empowered
        {
            change = Some((PsychTier::Empowered, TierCause::Fog));
        }

        // 4. Decay
        if change.is_none() {
            decay_timer(&mut state.state_duration, dt);
            if state.state_duration <= 0.0 && state.tier != PsychTier::Normal {
                change = Some((state.tier.toward_normal(), TierCause::Decay));
            }
        }

        if let Some((to, cause)) = change {
            let from = state.tier;
            state.tier = to;
            state.state_duration = rng.0.gen_range(cfg.duration_min..=cfg.duration_max);
            tracing::debug!(entity = ?entity, from = ?from, to = ?to, cause = ?cause, "tier changed");
            changes.send(TierChanged {
                entity,
                from,
                to,
                cause,
            });
        }
    }
}
