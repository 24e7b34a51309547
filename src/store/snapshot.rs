//! Read-only views of the combat world.
//!
//! Snapshots are plain serde data keyed by `Entity::to_bits`, so they can be
//! logged, diffed and hashed. Two runs with the same seed and inputs produce
//! identical digests.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use super::{Archetype, Faction, Health, Mana, ThreatProfile, Transform2d};
use crate::abilities::AbilityBook;
use crate::boss::{BossPhase, PhaseId};
use crate::combat::damage::DamageProfile;
use crate::combat::evasion::Evasion;
use crate::combat::projectile::ProjectileState;
use crate::config::CombatConfig;
use crate::psychology::pack::{PackMember, RallyStatus};
use crate::psychology::{Behavior, BehaviorState, PsychTier, PsychologyState};
use crate::trajectory::TrajectoryKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsychologySnapshot {
    pub tier: PsychTier,
    /// `None` while locked (infinite)
    pub state_duration: Option<f32>,
    pub fog_empowerment: f32,
    pub grudge: f32,
    pub locked: bool,
    pub rally_active: bool,
    pub alpha: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilitySnapshot {
    pub id: String,
    pub cooldown_remaining: f32,
    pub cast_time_remaining: f32,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub kind: TrajectoryKind,
    pub owner: u64,
    pub ability: String,
    pub velocity: Vec2,
    pub lifetime: f32,
    pub damage: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity: u64,
    pub archetype: Option<Archetype>,
    pub faction: Option<Faction>,
    pub position: Vec2,
    pub heading: f32,
    pub health: Option<(f32, f32)>,
    pub mana: Option<f32>,
    pub stamina: Option<f32>,
    /// Mid-dodge invulnerability
    pub evading: bool,
    pub level: Option<u32>,
    pub psychology: Option<PsychologySnapshot>,
    pub behavior: Option<Behavior>,
    pub boss_phase: Option<PhaseId>,
    /// Effective damage / defense / speed multipliers right now
    pub outgoing: f32,
    pub defense: f32,
    pub speed: f32,
    pub abilities: Vec<AbilitySnapshot>,
    pub projectile: Option<ProjectileSnapshot>,
}

impl EntitySnapshot {
    /// Capture one entity; `None` if it is not part of the combat world
    pub fn capture(world: &World, entity: Entity) -> Option<Self> {
        if !world.entities().contains(entity) {
            return None;
        }
        let transform = world.get::<Transform2d>(entity)?;
        let config = world.get_resource::<CombatConfig>();
        let profile = config
            .map(|c| DamageProfile::of_entity(world, entity, c))
            .unwrap_or_default();

        let psychology = world.get::<PsychologyState>(entity).map(|p| {
            let rally = world.get::<RallyStatus>(entity);
            PsychologySnapshot {
                tier: p.tier,
                state_duration: p.state_duration.is_finite().then_some(p.state_duration),
                fog_empowerment: p.fog_empowerment,
                grudge: p.grudge,
                locked: p.locked,
                rally_active: rally.is_some_and(|r| r.remaining > 0.0),
                alpha: world
                    .get::<PackMember>(entity)
                    .and_then(|m| m.alpha)
                    .map(Entity::to_bits),
            }
        });

        let abilities = world
            .get::<AbilityBook>(entity)
            .map(|book| {
                book.slots
                    .iter()
                    .map(|s| AbilitySnapshot {
                        id: s.def.id.clone(),
                        cooldown_remaining: s.cooldown_remaining,
                        cast_time_remaining: s.cast_time_remaining,
                        locked: s.locked,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let evasion = world.get::<Evasion>(entity);

        let projectile = world
            .get::<ProjectileState>(entity)
            .map(|p| ProjectileSnapshot {
                kind: p.kind,
                owner: p.owner.to_bits(),
                ability: p.ability.clone(),
                velocity: p.velocity,
                lifetime: p.lifetime,
                damage: p.damage,
            });

        Some(Self {
            entity: entity.to_bits(),
            archetype: world.get::<Archetype>(entity).copied(),
            faction: world.get::<Faction>(entity).copied(),
            position: transform.position,
            heading: transform.heading,
            health: world.get::<Health>(entity).map(|h| (h.current, h.max)),
            mana: world.get::<Mana>(entity).map(|m| m.current),
            stamina: evasion.map(|e| e.stamina),
            evading: evasion.is_some_and(Evasion::is_invulnerable),
            level: world.get::<ThreatProfile>(entity).map(|t| t.level),
            psychology,
            behavior: world.get::<BehaviorState>(entity).map(|b| b.behavior),
            boss_phase: world.get::<BossPhase>(entity).map(|b| b.phase),
            outgoing: profile.outgoing,
            defense: profile.defense,
            speed: profile.speed,
            abilities,
            projectile,
        })
    }

    pub fn id(&self) -> Option<Entity> {
        Entity::try_from_bits(self.entity).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub entities: Vec<EntitySnapshot>,
}

impl WorldSnapshot {
    pub fn capture(world: &World, tick: u64) -> Self {
        let mut ids: Vec<Entity> = world.iter_entities().map(|e| e.id()).collect();
        ids.sort();
        Self {
            tick,
            entities: ids
                .into_iter()
                .filter_map(|e| EntitySnapshot::capture(world, e))
                .collect(),
        }
    }

    pub fn get(&self, entity: Entity) -> Option<&EntitySnapshot> {
        let bits = entity.to_bits();
        self.entities.iter().find(|e| e.entity == bits)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// SHA3-256 of the JSON form, folded to 64 bits
    pub fn digest(&self) -> u64 {
        let mut hasher = Sha3_256::new();
        hasher.update(self.tick.to_le_bytes());
        // Serializing plain data cannot fail; an empty body still hashes
        hasher.update(self.to_json().unwrap_or_default().as_bytes());
        let result = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&result[..8]);
        u64::from_le_bytes(bytes)
    }
}
