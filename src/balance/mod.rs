//! Monte-Carlo encounter sweeps.
//!
//! Runs many small headless fights (one hero against a pack of one enemy
//! archetype) in parallel with rayon and summarizes how each archetype fares.
//! Every trial gets its own sim and a seed derived from SHA3(base seed,
//! archetype, index), so a sweep is reproducible on any thread count.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use bevy::prelude::*;

use crate::config::{CombatConfig, ConfigError};
use crate::constants::DEFAULT_TICK_DT;
use crate::psychology::Behavior;
use crate::sim::CombatSim;
use crate::store::factory::SpawnError;
use crate::store::Archetype;

#[derive(Debug, thiserror::Error)]
pub enum BalanceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub trials_per_archetype: u32,
    pub base_seed: u64,
    pub pack_size: usize,
    pub max_ticks: u32,
    pub dt: f32,
    /// Host-side movement speed before the tier speed multiplier
    pub move_speed: f32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            trials_per_archetype: 64,
            base_seed: 42,
            pack_size: 3,
            max_ticks: 600,
            dt: DEFAULT_TICK_DT,
            move_speed: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub archetype: Archetype,
    pub seed: u64,
    pub hero_survived: bool,
    pub ticks: u32,
    pub hero_health_ratio: f32,
    pub enemies_killed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeSummary {
    pub archetype: Archetype,
    pub trials: usize,
    pub hero_win_rate: f32,
    pub avg_ticks: f32,
    pub avg_hero_health: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceGrade {
    /// Win rates within 20 points of each other
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub summaries: Vec<ArchetypeSummary>,
    pub grade: BalanceGrade,
}

/// Deterministic per-trial seed
pub fn trial_seed(base_seed: u64, archetype: Archetype, index: u32) -> u64 {
    let mut hasher = Sha3_256::new();
    hasher.update(base_seed.to_le_bytes());
    hasher.update((archetype as u32).to_le_bytes());
    hasher.update(index.to_le_bytes());
    let result = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&result[..8]);
    u64::from_le_bytes(bytes)
}

/// One hero against `sweep.pack_size` enemies of `archetype`
pub fn run_trial(
    config: &CombatConfig,
    archetype: Archetype,
    seed: u64,
    sweep: &SweepConfig,
) -> Result<TrialOutcome, BalanceError> {
    let mut config = config.clone();
    config.seed = seed;
    let mut sim = CombatSim::new(config)?;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let center = Vec2::new(640.0, 360.0);
    let hero = sim.spawn(Archetype::Hero, center)?;
    let mut enemies = Vec::with_capacity(sweep.pack_size);
    for _ in 0..sweep.pack_size {
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = rng.gen_range(6.0..10.0);
        let enemy = sim.spawn(archetype, center + Vec2::from_angle(angle) * distance)?;
        sim.set_target(enemy, Some(hero));
        enemies.push(enemy);
    }

    let mut ticks = 0;
    while ticks < sweep.max_ticks {
        if !sim.is_live(hero) {
            break;
        }
        let Some(hero_pos) = sim.query_state(hero).map(|s| s.position) else {
            break;
        };
        let living: Vec<(Entity, Vec2)> = enemies
            .iter()
            .filter_map(|e| sim.query_state(*e).map(|s| (*e, s.position)))
            .collect();
        if living.is_empty() {
            break;
        }

        let nearest = living
            .iter()
            .min_by(|a, b| {
                a.1.distance(hero_pos)
                    .total_cmp(&b.1.distance(hero_pos))
                    .then(a.0.cmp(&b.0))
            })
            .copied();
        if let Some((target, target_pos)) = nearest {
            sim.set_target(hero, Some(target));
            let slots = sim
                .query_state(hero)
                .map_or(0, |s| s.abilities.len());
            for slot in 0..slots {
                if sim.can_use(hero, slot) && sim.use_ability(hero, slot, target_pos).is_ok() {
                    break;
                }
            }
        }

        for (enemy, position) in &living {
            let Some(state) = sim.query_state(*enemy) else {
                continue;
            };
            let to_hero = hero_pos - *position;
            let step = sweep.move_speed * state.speed * sweep.dt;
            let heading = to_hero.normalize_or_zero();
            let next = match state.behavior {
                Some(Behavior::Pursue | Behavior::Attack | Behavior::Flank)
                    if to_hero.length() > 1.0 =>
                {
                    *position + heading * step.min(to_hero.length() - 1.0)
                }
                Some(Behavior::Retreat) => *position - heading * step,
                _ => *position,
            };
            sim.set_position(*enemy, next);
        }

        sim.tick(sweep.dt);
        ticks += 1;
    }

    let hero_state = sim.query_state(hero);
    Ok(TrialOutcome {
        archetype,
        seed,
        hero_survived: hero_state.is_some(),
        ticks,
        hero_health_ratio: hero_state
            .and_then(|s| s.health)
            .map_or(0.0, |(current, max)| current / max),
        enemies_killed: enemies.iter().filter(|e| !sim.is_live(**e)).count(),
    })
}

/// Sweep every archetype in parallel
pub fn run_sweep(
    config: &CombatConfig,
    sweep: &SweepConfig,
    archetypes: &[Archetype],
) -> Result<BalanceReport, BalanceError> {
    config.validate()?;
    let jobs: Vec<(Archetype, u64)> = archetypes
        .iter()
        .flat_map(|a| {
            (0..sweep.trials_per_archetype).map(move |i| (*a, trial_seed(sweep.base_seed, *a, i)))
        })
        .collect();

    let outcomes: Vec<TrialOutcome> = jobs
        .par_iter()
        .map(|(archetype, seed)| run_trial(config, *archetype, *seed, sweep))
        .collect::<Result<_, _>>()?;

    let summaries: Vec<ArchetypeSummary> = archetypes
        .iter()
        .map(|a| summarize(*a, &outcomes))
        .collect();
    let grade = grade(&summaries);
    tracing::info!(trials = outcomes.len(), grade = ?grade, "balance sweep finished");

    Ok(BalanceReport { summaries, grade })
}

fn summarize(archetype: Archetype, outcomes: &[TrialOutcome]) -> ArchetypeSummary {
    let mine: Vec<&TrialOutcome> = outcomes
        .iter()
        .filter(|o| o.archetype == archetype)
        .collect();
    let n = mine.len().max(1) as f32;
    ArchetypeSummary {
        archetype,
        trials: mine.len(),
        hero_win_rate: mine.iter().filter(|o| o.hero_survived).count() as f32 / n,
        avg_ticks: mine.iter().map(|o| o.ticks as f32).sum::<f32>() / n,
        avg_hero_health: mine.iter().map(|o| o.hero_health_ratio).sum::<f32>() / n,
    }
}

fn grade(summaries: &[ArchetypeSummary]) -> BalanceGrade {
    let rates = summaries.iter().map(|s| s.hero_win_rate);
    let max = rates.clone().fold(0.0_f32, f32::max);
    let min = rates.fold(1.0_f32, f32::min);
    match max - min {
        spread if spread <= 0.2 => BalanceGrade::Good,
        spread if spread <= 0.5 => BalanceGrade::Fair,
        _ => BalanceGrade::Poor,
    }
}
