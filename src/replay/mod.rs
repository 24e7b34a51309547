//! Deterministic replay.
//!
//! A `Recorder` wraps a `CombatSim` and logs every spawn and host input
//! alongside the config (seed included) and the world digest after every
//! tick. Replaying the log into a fresh sim must reproduce each digest;
//! `verify` reports the first tick where it does not.
//!
//! Entities in a log are referred to by spawn order, never by `Entity` id.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::abilities::{AbilityError, CastHandle};
use crate::combat::evasion::EvasionError;
use crate::config::{CombatConfig, ConfigError};
use crate::events::TickReport;
use crate::sim::CombatSim;
use crate::store::factory::{SpawnError, SpawnSpec};

/// Replay format version
pub const REPLAY_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayInput {
    Spawn(SpawnSpec),
    Tick(f32),
    UseAbility { caster: usize, slot: usize, target: Vec2 },
    Interrupt(usize),
    Stun { entity: usize, seconds: f32 },
    Fog { entity: usize, fog: f32 },
    SetTarget { entity: usize, target: Option<usize> },
    SetPosition { entity: usize, position: Vec2 },
    Dodge { entity: usize, direction: Vec2 },
    Parry(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayLog {
    pub version: u32,
    pub config: CombatConfig,
    pub inputs: Vec<ReplayInput>,
    pub ticks: u64,
    /// Snapshot digest after each recorded tick
    pub digests: Vec<u64>,
    /// Snapshot digest at the end of recording
    pub final_digest: u64,
}

impl ReplayLog {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Unsupported replay version {0}")]
    Version(u32),
    #[error("Replay config rejected: {0}")]
    Config(#[from] ConfigError),
    #[error("Replay spawn failed: {0}")]
    Spawn(#[from] SpawnError),
    #[error("Replay diverged at tick {tick}: expected digest {expected:016x}, got {actual:016x}")]
    Diverged { tick: u64, expected: u64, actual: u64 },
}

pub struct Recorder {
    sim: CombatSim,
    entities: Vec<Entity>,
    log: ReplayLog,
}

impl Recorder {
    pub fn new(config: CombatConfig) -> Result<Self, ConfigError> {
        let sim = CombatSim::new(config.clone())?;
        Ok(Self {
            sim,
            entities: Vec::new(),
            log: ReplayLog {
                version: REPLAY_VERSION,
                config,
                inputs: Vec::new(),
                ticks: 0,
                digests: Vec::new(),
                final_digest: 0,
            },
        })
    }

    pub fn sim(&self) -> &CombatSim {
        &self.sim
    }

    pub fn entity(&self, index: usize) -> Option<Entity> {
        self.entities.get(index).copied()
    }

    /// Spawn and return the entity's index in the log
    pub fn spawn(&mut self, spec: SpawnSpec) -> Result<usize, SpawnError> {
        let entity = self.sim.spawn_with(&spec)?;
        self.entities.push(entity);
        self.log.inputs.push(ReplayInput::Spawn(spec));
        Ok(self.entities.len() - 1)
    }

    pub fn tick(&mut self, dt: f32) -> TickReport {
        self.log.inputs.push(ReplayInput::Tick(dt));
        self.log.ticks += 1;
        let report = self.sim.tick(dt);
        self.log.digests.push(self.sim.snapshot().digest());
        report
    }

    pub fn use_ability(
        &mut self,
        caster: usize,
        slot: usize,
        target: Vec2,
    ) -> Result<CastHandle, AbilityError> {
        self.log
            .inputs
            .push(ReplayInput::UseAbility { caster, slot, target });
        let entity = self.entity(caster).ok_or(AbilityError::MissingCaster)?;
        self.sim.use_ability(entity, slot, target)
    }

    pub fn interrupt(&mut self, entity: usize) -> bool {
        self.log.inputs.push(ReplayInput::Interrupt(entity));
        self.entity(entity)
            .is_some_and(|e| self.sim.interrupt_cast(e))
    }

    pub fn stun(&mut self, entity: usize, seconds: f32) -> bool {
        self.log.inputs.push(ReplayInput::Stun { entity, seconds });
        self.entity(entity)
            .is_some_and(|e| self.sim.stun(e, seconds))
    }

    pub fn fog(&mut self, entity: usize, fog: f32) -> bool {
        self.log.inputs.push(ReplayInput::Fog { entity, fog });
        self.entity(entity)
            .is_some_and(|e| self.sim.apply_fog_empowerment(e, fog))
    }

    pub fn set_target(&mut self, entity: usize, target: Option<usize>) -> bool {
        self.log
            .inputs
            .push(ReplayInput::SetTarget { entity, target });
        let target = target.and_then(|t| self.entity(t));
        self.entity(entity)
            .is_some_and(|e| self.sim.set_target(e, target))
    }

    pub fn set_position(&mut self, entity: usize, position: Vec2) -> bool {
        self.log
            .inputs
            .push(ReplayInput::SetPosition { entity, position });
        self.entity(entity)
            .is_some_and(|e| self.sim.set_position(e, position))
    }

    pub fn dodge(&mut self, entity: usize, direction: Vec2) -> Result<Vec2, EvasionError> {
        self.log
            .inputs
            .push(ReplayInput::Dodge { entity, direction });
        let e = self.entity(entity).ok_or(EvasionError::CannotEvade)?;
        self.sim.dodge(e, direction)
    }

    pub fn parry(&mut self, entity: usize) -> Result<(), EvasionError> {
        self.log.inputs.push(ReplayInput::Parry(entity));
        let e = self.entity(entity).ok_or(EvasionError::CannotEvade)?;
        self.sim.parry(e)
    }

    pub fn finish(mut self) -> ReplayLog {
        self.log.final_digest = self.sim.snapshot().digest();
        tracing::info!(
            inputs = self.log.inputs.len(),
            ticks = self.log.ticks,
            digest = self.log.final_digest,
            "replay recorded"
        );
        self.log
    }
}

/// Re-run `log` into a fresh sim and return it at the recorded end state
pub fn replay(log: &ReplayLog) -> Result<CombatSim, ReplayError> {
    run(log, false)
}

/// Replay `log`, checking every recorded tick digest and the final one
pub fn verify(log: &ReplayLog) -> Result<u64, ReplayError> {
    let sim = run(log, true)?;
    let actual = sim.snapshot().digest();
    if actual != log.final_digest {
        return Err(ReplayError::Diverged {
            tick: sim.current_tick(),
            expected: log.final_digest,
            actual,
        });
    }
    Ok(actual)
}

fn run(log: &ReplayLog, check: bool) -> Result<CombatSim, ReplayError> {
    if log.version != REPLAY_VERSION {
        return Err(ReplayError::Version(log.version));
    }
    let mut sim = CombatSim::new(log.config.clone())?;
    let mut entities: Vec<Entity> = Vec::new();
    let lookup = |entities: &[Entity], i: usize| entities.get(i).copied();

    for input in &log.inputs {
        match input {
            ReplayInput::Spawn(spec) => entities.push(sim.spawn_with(spec)?),
            ReplayInput::Tick(dt) => {
                sim.tick(*dt);
                if !check {
                    continue;
                }
                let tick = sim.current_tick();
                let recorded = usize::try_from(tick - 1)
                    .ok()
                    .and_then(|i| log.digests.get(i));
                if let Some(&expected) = recorded {
                    let actual = sim.snapshot().digest();
                    if actual != expected {
                        tracing::warn!(tick, "replay diverged");
                        return Err(ReplayError::Diverged {
                            tick,
                            expected,
                            actual,
                        });
                    }
                }
            }
            ReplayInput::UseAbility {
                caster,
                slot,
                target,
            } => {
                if let Some(e) = lookup(&entities, *caster) {
                    // Rejections replay as rejections
                    let _ = sim.use_ability(e, *slot, *target);
                }
            }
            ReplayInput::Interrupt(i) => {
                if let Some(e) = lookup(&entities, *i) {
                    sim.interrupt_cast(e);
                }
            }
            ReplayInput::Stun { entity, seconds } => {
                if let Some(e) = lookup(&entities, *entity) {
                    sim.stun(e, *seconds);
                }
            }
            ReplayInput::Fog { entity, fog } => {
                if let Some(e) = lookup(&entities, *entity) {
                    sim.apply_fog_empowerment(e, *fog);
                }
            }
            ReplayInput::SetTarget { entity, target } => {
                let target = target.and_then(|t| lookup(&entities, t));
                if let Some(e) = lookup(&entities, *entity) {
                    sim.set_target(e, target);
                }
            }
            ReplayInput::SetPosition { entity, position } => {
                if let Some(e) = lookup(&entities, *entity) {
                    sim.set_position(e, *position);
                }
            }
            ReplayInput::Dodge { entity, direction } => {
                if let Some(e) = lookup(&entities, *entity) {
                    let _ = sim.dodge(e, *direction);
                }
            }
            ReplayInput::Parry(i) => {
                if let Some(e) = lookup(&entities, *i) {
                    let _ = sim.parry(e);
                }
            }
        }
    }
    Ok(sim)
}
