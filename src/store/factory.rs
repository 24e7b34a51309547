//! Entity factory: turns an archetype (or a hand-built `SpawnSpec`) into an
//! entity with its initial component set.
//!
//! Creation is the only place the core treats bad data as fatal. A spec that
//! would break a component invariant is rejected with `SpawnError` before
//! anything is inserted into the world.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Archetype, Attack, CombatTarget, Defense, Faction, Health, Mana, ThreatProfile, Transform2d};
use crate::abilities::{AbilityBook, AbilityCatalog};
use crate::boss::BossPhase;
use crate::combat::evasion::Evasion;
use crate::config::{ArchetypeSpec, CombatConfig};
use crate::psychology::pack::{PackAlpha, PackMember};
use crate::psychology::{BehaviorState, PsychologyState, PsychologyTraits};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SpawnError {
    #[error("Invalid max health: {0}")]
    InvalidHealth(f32),
    #[error("Invalid armor: {0}")]
    InvalidArmor(f32),
    #[error("Invalid attack: damage {damage}, range {range}, attack_speed {attack_speed}")]
    InvalidAttack {
        damage: f32,
        range: f32,
        attack_speed: f32,
    },
    #[error("Invalid position: ({0}, {1})")]
    InvalidPosition(f32, f32),
    #[error("Invalid mana pool: max {max}, regen {regen}")]
    InvalidMana { max: f32, regen: f32 },
    #[error("Invalid stamina pool: max {max}, regen {regen}")]
    InvalidStamina { max: f32, regen: f32 },
    #[error("Unknown archetype: {0:?}")]
    UnknownArchetype(Archetype),
    #[error("Unknown ability: {0}")]
    UnknownAbility(String),
}

/// External collaborator contract: `create(kind, position) -> Entity`
pub trait EntityFactory {
    fn create(
        &self,
        world: &mut World,
        kind: Archetype,
        position: Vec2,
    ) -> Result<Entity, SpawnError>;
}

/// Builds entities from the archetype table in `CombatConfig`
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchetypeFactory;

impl EntityFactory for ArchetypeFactory {
    fn create(
        &self,
        world: &mut World,
        kind: Archetype,
        position: Vec2,
    ) -> Result<Entity, SpawnError> {
        let spec = world
            .resource::<CombatConfig>()
            .archetype(kind)
            .map(|a| SpawnSpec::from_archetype(a, position))
            .ok_or(SpawnError::UnknownArchetype(kind))?;
        spawn_entity(world, &spec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackSpec {
    pub damage: f32,
    pub range: f32,
    pub attack_speed: f32,
}

/// Initial component set for one entity. Every field left `None` means the
/// entity simply will not carry that component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnSpec {
    pub archetype: Option<Archetype>,
    pub position: Vec2,
    pub faction: Faction,
    pub health: Option<f32>,
    pub armor: Option<f32>,
    pub attack: Option<AttackSpec>,
    pub level: Option<u32>,
    pub damage_multiplier: f32,
    pub mana: Option<(f32, f32)>,
    /// Stamina max and regen; only entities with a pool can dodge or parry
    #[serde(default)]
    pub stamina: Option<(f32, f32)>,
    pub abilities: Vec<String>,
    pub traits: Option<PsychologyTraits>,
    pub boss: bool,
}

impl SpawnSpec {
    pub fn new(position: Vec2) -> Self {
        Self {
            archetype: None,
            position,
            faction: Faction::Neutral,
            health: None,
            armor: None,
            attack: None,
            level: None,
            damage_multiplier: 1.0,
            mana: None,
            stamina: None,
            abilities: Vec::new(),
            traits: None,
            boss: false,
        }
    }

    pub fn from_archetype(spec: &ArchetypeSpec, position: Vec2) -> Self {
        Self {
            archetype: Some(spec.kind),
            position,
            faction: spec.faction,
            health: Some(spec.health),
            armor: Some(spec.armor),
            attack: Some(AttackSpec {
                damage: spec.damage,
                range: spec.attack_range,
                attack_speed: spec.attack_speed,
            }),
            level: Some(spec.level),
            damage_multiplier: spec.damage_multiplier,
            mana: (spec.mana > 0.0).then_some((spec.mana, spec.mana_regen)),
            stamina: (spec.stamina > 0.0).then_some((spec.stamina, spec.stamina_regen)),
            abilities: spec.abilities.clone(),
            traits: spec.traits,
            boss: spec.boss,
        }
    }

    pub fn faction(mut self, faction: Faction) -> Self {
        self.faction = faction;
        self
    }

    pub fn health(mut self, max: f32) -> Self {
        self.health = Some(max);
        self
    }

    pub fn armor(mut self, armor: f32) -> Self {
        self.armor = Some(armor);
        self
    }

    pub fn attack(mut self, damage: f32, range: f32, attack_speed: f32) -> Self {
        self.attack = Some(AttackSpec {
            damage,
            range,
            attack_speed,
        });
        self
    }

    pub fn level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn mana(mut self, max: f32, regen: f32) -> Self {
        self.mana = Some((max, regen));
        self
    }

    pub fn stamina(mut self, max: f32, regen: f32) -> Self {
        self.stamina = Some((max, regen));
        self
    }

    pub fn ability(mut self, id: &str) -> Self {
        self.abilities.push(id.to_string());
        self
    }

    pub fn traits(mut self, traits: PsychologyTraits) -> Self {
        self.traits = Some(traits);
        self
    }

    pub fn boss(mut self) -> Self {
        self.boss = true;
        self
    }

    fn validate(&self) -> Result<(), SpawnError> {
        if !self.position.is_finite() {
            return Err(SpawnError::InvalidPosition(self.position.x, self.position.y));
        }
        if let Some(max) = self.health {
            if !max.is_finite() || max <= 0.0 {
                return Err(SpawnError::InvalidHealth(max));
            }
        }
        if let Some(armor) = self.armor {
            if !armor.is_finite() || armor < 0.0 {
                return Err(SpawnError::InvalidArmor(armor));
            }
        }
        if let Some(a) = self.attack {
            let ok = a.damage.is_finite()
                && a.damage >= 0.0
                && a.range.is_finite()
                && a.range >= 0.0
                && a.attack_speed.is_finite()
                && a.attack_speed > 0.0;
            if !ok {
                return Err(SpawnError::InvalidAttack {
                    damage: a.damage,
                    range: a.range,
                    attack_speed: a.attack_speed,
                });
            }
        }
        if let Some((max, regen)) = self.mana {
            if !(max.is_finite() && max >= 0.0 && regen.is_finite() && regen >= 0.0) {
                return Err(SpawnError::InvalidMana { max, regen });
            }
        }
        if let Some((max, regen)) = self.stamina {
            if !(max.is_finite() && max >= 0.0 && regen.is_finite() && regen >= 0.0) {
                return Err(SpawnError::InvalidStamina { max, regen });
            }
        }
        Ok(())
    }
}

/// Validates `spec` and inserts the entity. Nothing is spawned on error.
pub fn spawn_entity(world: &mut World, spec: &SpawnSpec) -> Result<Entity, SpawnError> {
    spec.validate()?;

    let book = {
        let catalog = world.resource::<AbilityCatalog>();
        let mut defs = Vec::with_capacity(spec.abilities.len());
        for id in &spec.abilities {
            let def = catalog
                .get(id)
                .ok_or_else(|| SpawnError::UnknownAbility(id.clone()))?;
            defs.push(def.clone());
        }
        (!defs.is_empty()).then(|| AbilityBook::new(defs))
    };

    let boss_phase = spec
        .boss
        .then(|| BossPhase::new(&world.resource::<CombatConfig>().boss.thresholds));

    let mut entity = world.spawn((
        Transform2d::at(spec.position),
        spec.faction,
        CombatTarget::default(),
    ));

    if let Some(kind) = spec.archetype {
        entity.insert(kind);
    }
    if let Some(max) = spec.health {
        entity.insert(Health::new(max));
    }
    if let Some(armor) = spec.armor {
        entity.insert(Defense { armor });
    }
    if let Some(a) = spec.attack {
        entity.insert(Attack::new(a.damage, a.range, a.attack_speed));
    }
    if let Some(level) = spec.level {
        entity.insert(ThreatProfile {
            level,
            damage_multiplier: spec.damage_multiplier,
        });
    }
    if let Some((max, regen)) = spec.mana {
        entity.insert(Mana::new(max, regen));
    }
    if let Some((max, regen)) = spec.stamina {
        entity.insert(Evasion::new(max, regen));
    }
    if let Some(mut book) = book {
        if let Some(phase) = &boss_phase {
            book.lock_above(phase.phase);
        }
        entity.insert(book);
    }
    if let Some(traits) = spec.traits {
        let traits = traits.clamped();
        entity.insert((traits, PsychologyState::default(), BehaviorState::default()));
        if traits.is_alpha() {
            // First broadcast goes out on the first tick
            entity.insert(PackAlpha::default());
        } else {
            entity.insert(PackMember::default());
        }
    }
    if let Some(phase) = boss_phase {
        entity.insert(phase);
    }

    let id = entity.id();
    tracing::debug!(entity = ?id, archetype = ?spec.archetype, "spawned");
    Ok(id)
}
