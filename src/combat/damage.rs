//! Damage math.
//!
//! Two mitigation steps, each applied at its own point:
//! - armor is subtractive: `max(0, raw - armor)`
//! - psychology/boss defense is divisive: `damage / defense_multiplier`
//!
//! A hit therefore resolves as
//! `max(0, raw * outgoing - armor) / defense`.

use bevy::prelude::*;

use crate::boss::BossPhase;
use crate::config::{CombatConfig, PhaseModifiers};
use crate::psychology::{PsychologyState, PsychologyTraits};
use crate::store::Health;

/// Components that scale damage in and out of an entity
pub type DamageSources = (
    Option<&'static PsychologyState>,
    Option<&'static PsychologyTraits>,
    Option<&'static BossPhase>,
    Option<&'static Health>,
);

pub fn mitigate_armor(raw: f32, armor: f32) -> f32 {
    (raw - armor).max(0.0)
}

pub fn apply_defense(damage: f32, defense_multiplier: f32) -> f32 {
    if defense_multiplier > 0.0 {
        damage / defense_multiplier
    } else {
        damage
    }
}

pub fn resolve_hit(raw: f32, outgoing: f32, armor: f32, defense_multiplier: f32) -> f32 {
    apply_defense(mitigate_armor(raw * outgoing, armor), defense_multiplier)
}

/// Effective multipliers of one entity at this moment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageProfile {
    pub outgoing: f32,
    pub defense: f32,
    pub speed: f32,
}

impl Default for DamageProfile {
    fn default() -> Self {
        Self {
            outgoing: 1.0,
            defense: 1.0,
            speed: 1.0,
        }
    }
}

impl DamageProfile {
    pub fn from_sources(
        (psych, traits, boss, health): (
            Option<&PsychologyState>,
            Option<&PsychologyTraits>,
            Option<&BossPhase>,
            Option<&Health>,
        ),
        config: &CombatConfig,
    ) -> Self {
        let mut profile = Self::default();

        if let Some(state) = psych {
            let tier = config.tiers.get(state.tier);
            profile.outgoing *= tier.damage;
            profile.defense *= tier.defense;
            profile.speed *= tier.speed;

            let fog = state.fog_empowerment;
            if fog > config.psychology.fog_threshold {
                profile.outgoing *= 1.0 + fog * config.psychology.fog_damage_scale;
                profile.defense *= 1.0 + fog * config.psychology.fog_defense_scale;
            }

            let grudge = &config.psychology.grudge;
            if state.grudge > grudge.damage_floor {
                profile.outgoing *= 1.0 + state.grudge * grudge.damage_scale;
            }
        }

        if let Some(traits) = traits {
            profile.outgoing *= traits.aggression;

            // Cornered enemies hit harder: up to +50% at zero health
            if let Some(hp) = health {
                let floor = config.psychology.desperation_health;
                let ratio = hp.ratio();
                if ratio < floor {
                    profile.outgoing *= 1.0 + (floor - ratio) * 2.0;
                }
            }
        }

        if let Some(boss) = boss {
            let phase = phase_modifiers(config, boss);
            profile.outgoing *= phase.damage;
            profile.defense *= phase.defense;
        }

        profile
    }

    pub fn of_entity(world: &World, entity: Entity, config: &CombatConfig) -> Self {
        Self::from_sources(
            (
                world.get::<PsychologyState>(entity),
                world.get::<PsychologyTraits>(entity),
                world.get::<BossPhase>(entity),
                world.get::<Health>(entity),
            ),
            config,
        )
    }
}

fn phase_modifiers(config: &CombatConfig, boss: &BossPhase) -> PhaseModifiers {
    config
        .boss
        .phases
        .get(boss.phase.index())
        .copied()
        .unwrap_or(PhaseModifiers {
            damage: 1.0,
            defense: 1.0,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boss::PhaseId;
    use crate::psychology::PsychTier;

    #[test]
    fn test_armor_is_subtractive() {
        assert_eq!(mitigate_armor(25.0, 10.0), 15.0);
        assert_eq!(mitigate_armor(5.0, 10.0), 0.0);
    }

    #[test]
    fn test_defense_is_divisive() {
        assert!((apply_defense(15.0, 1.5) - 10.0).abs() < f32::EPSILON);
        assert_eq!(apply_defense(15.0, 0.0), 15.0);
    }

    #[test]
    fn test_resolve_hit_order() {
        // (25 * 2 - 10) / 2 = 20
        assert_eq!(resolve_hit(25.0, 2.0, 10.0, 2.0), 20.0);
    }

    #[test]
    fn test_neutral_profile_without_components() {
        let config = CombatConfig::default();
        let profile = DamageProfile::from_sources((None, None, None, None), &config);
        assert_eq!(profile, DamageProfile::default());
    }

    #[test]
    fn test_tier_and_fog_scaling() {
        let config = CombatConfig::default();
        let mut state = PsychologyState::default();
        state.tier = PsychTier::Terrified;
        let profile = DamageProfile::from_sources((Some(&state), None, None, None), &config);
        assert_eq!(profile.outgoing, 0.5);
        assert_eq!(profile.speed, 1.5);

        state.tier = PsychTier::Empowered;
        state.fog_empowerment = 0.8;
        let profile = DamageProfile::from_sources((Some(&state), None, None, None), &config);
        // 1.5 * (1 + 0.8 * 0.5)
        assert!((profile.outgoing - 2.1).abs() < 1e-5);
    }

    #[test]
    fn test_fog_below_threshold_has_no_effect() {
        let config = CombatConfig::default();
        let mut state = PsychologyState::default();
        state.fog_empowerment = 0.4;
        let profile = DamageProfile::from_sources((Some(&state), None, None, None), &config);
        assert_eq!(profile.outgoing, 1.0);
    }

    #[test]
    fn test_grudge_raises_damage_past_floor() {
        let config = CombatConfig::default();
        let mut state = PsychologyState::default();
        state.grudge = 0.15;
        let profile = DamageProfile::from_sources((Some(&state), None, None, None), &config);
        assert_eq!(profile.outgoing, 1.0);

        state.grudge = 0.6;
        let profile = DamageProfile::from_sources((Some(&state), None, None, None), &config);
        // 1 + 0.6 * 0.3
        assert!((profile.outgoing - 1.18).abs() < 1e-5);
    }

    #[test]
    fn test_desperation_bonus() {
        let config = CombatConfig::default();
        let traits = PsychologyTraits::default();
        let mut hp = Health::new(100.0);
        hp.current = 5.0;
        let profile = DamageProfile::from_sources((None, Some(&traits), None, Some(&hp)), &config);
        // 1 + (0.25 - 0.05) * 2 = 1.4
        assert!((profile.outgoing - 1.4).abs() < 1e-5);
    }

    #[test]
    fn test_boss_phase_multipliers() {
        let config = CombatConfig::default();
        let mut boss = BossPhase::new(&config.boss.thresholds);
        boss.phase = PhaseId::Final;
        let profile = DamageProfile::from_sources((None, None, Some(&boss), None), &config);
        assert_eq!(profile.outgoing, 2.0);
        assert_eq!(profile.defense, 0.8);
    }
}
