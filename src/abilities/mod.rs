//! Ability & cooldown manager.
//!
//! Each caster carries an `AbilityBook`: one `AbilityInstance` per slot with
//! its own cooldown and cast timers. Activation goes through `use_ability`,
//! which checks cooldown, then resource, then target, and on success pays the
//! mana cost up front and restarts the cooldown. Instant abilities deliver at
//! once; abilities with a cast time deliver when `advance_abilities` finishes
//! the cast during a tick.
//!
//! An interrupted cast (stun or explicit interrupt) loses its payload. The
//! mana is not refunded.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::boss::PhaseId;
use crate::combat::damage::{DamageProfile, DamageSources};
use crate::combat::projectile::{projectile_bundle, AreaStrike, PendingStrikes, ProjectileBundle};
use crate::config::CombatConfig;
use crate::store::{decay_timer, CombatTarget, Faction, Mana, Stunned, Transform2d};
use crate::trajectory::{PatternParams, TrajectoryKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AbilityError {
    #[error("Ability on cooldown: {remaining:.2}s remaining")]
    OnCooldown { remaining: f32 },
    #[error("Insufficient resource: need {needed}, have {available}")]
    InsufficientResource { needed: f32, available: f32 },
    #[error("Invalid target: distance {distance} exceeds range {range}")]
    InvalidTarget { distance: f32, range: f32 },
    #[error("No ability in slot {0}")]
    UnknownAbility(usize),
    #[error("Ability locked: {0}")]
    Locked(String),
    #[error("Already casting")]
    AlreadyCasting,
    #[error("Caster is stunned")]
    Stunned,
    #[error("Caster missing or unable to cast")]
    MissingCaster,
}

impl AbilityError {
    /// Short player-facing reason
    pub fn reason(&self) -> &'static str {
        match self {
            AbilityError::OnCooldown { .. } => "on cooldown",
            AbilityError::InsufficientResource { .. } => "not enough mana",
            AbilityError::InvalidTarget { .. } => "out of range",
            AbilityError::UnknownAbility(_) => "no such ability",
            AbilityError::Locked(_) => "locked",
            AbilityError::AlreadyCasting => "already casting",
            AbilityError::Stunned => "stunned",
            AbilityError::MissingCaster => "cannot cast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityStats {
    pub damage: f32,
    pub range: f32,
    pub mana_cost: f32,
    /// Projectile lifetime in seconds (0 = config default)
    pub duration: f32,
    /// Strike radius for area abilities
    pub area: f32,
    pub attack_speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityDelivery {
    Projectile(TrajectoryKind),
    /// Strikes every hostile inside `stats.area` around the target point
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDef {
    pub id: String,
    pub name: String,
    /// Cooldown in seconds
    pub cooldown: f32,
    /// Cast time in seconds (0 = instant)
    pub cast_time: f32,
    pub delivery: AbilityDelivery,
    pub stats: AbilityStats,
    pub projectile_speed: f32,
    pub pattern: PatternParams,
    pub piercing: bool,
    /// Boss phase that unlocks this ability, `None` = always available
    pub unlock_phase: Option<PhaseId>,
}

impl AbilityDef {
    pub fn trajectory(&self) -> Option<TrajectoryKind> {
        match self.delivery {
            AbilityDelivery::Projectile(kind) => Some(kind),
            AbilityDelivery::Area => None,
        }
    }
}

/// Cast target captured at activation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingCast {
    pub target_pos: Vec2,
    pub target_entity: Option<Entity>,
}

/// Runtime state of one ability slot
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityInstance {
    pub def: AbilityDef,
    pub cooldown_remaining: f32,
    pub cast_time_remaining: f32,
    pub pending: Option<PendingCast>,
    pub locked: bool,
}

impl AbilityInstance {
    pub fn new(def: AbilityDef) -> Self {
        Self {
            def,
            cooldown_remaining: 0.0,
            cast_time_remaining: 0.0,
            pending: None,
            locked: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.def.id
    }

    pub fn is_ready(&self) -> bool {
        self.cooldown_remaining <= 0.0
    }

    pub fn is_casting(&self) -> bool {
        self.pending.is_some()
    }
}

#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct AbilityBook {
    pub slots: Vec<AbilityInstance>,
}

impl AbilityBook {
    pub fn new(defs: Vec<AbilityDef>) -> Self {
        Self {
            slots: defs.into_iter().map(AbilityInstance::new).collect(),
        }
    }

    pub fn slot(&self, index: usize) -> Option<&AbilityInstance> {
        self.slots.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.id() == id)
    }

    pub fn casting(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_casting())
    }

    /// Decay every cooldown, whether or not the owner acted
    pub fn tick_cooldowns(&mut self, dt: f32) {
        for slot in &mut self.slots {
            decay_timer(&mut slot.cooldown_remaining, dt);
        }
    }

    /// Advance casts in progress; returns the casts that completed
    pub fn advance_casts(&mut self, dt: f32) -> Vec<(usize, PendingCast)> {
        let mut completed = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.is_casting() {
                continue;
            }
            decay_timer(&mut slot.cast_time_remaining, dt);
            if slot.cast_time_remaining <= 0.0 {
                if let Some(cast) = slot.pending.take() {
                    completed.push((index, cast));
                }
            }
        }
        completed
    }

    /// Cancel the cast in progress, if any. Returns the interrupted slot.
    pub fn interrupt(&mut self) -> Option<usize> {
        let index = self.casting()?;
        let slot = &mut self.slots[index];
        slot.cast_time_remaining = 0.0;
        slot.pending = None;
        Some(index)
    }

    /// Lock every slot whose unlock phase lies beyond `phase`
    pub fn lock_above(&mut self, phase: PhaseId) {
        for slot in &mut self.slots {
            slot.locked = slot.def.unlock_phase.is_some_and(|p| p > phase);
        }
    }

    /// Unlock everything gated at or below `phase`; returns newly unlocked ids
    pub fn unlock_through(&mut self, phase: PhaseId) -> Vec<String> {
        let mut unlocked = Vec::new();
        for slot in &mut self.slots {
            if slot.locked && slot.def.unlock_phase.is_some_and(|p| p <= phase) {
                slot.locked = false;
                unlocked.push(slot.def.id.clone());
            }
        }
        unlocked
    }
}

/// Ability definitions by id
#[derive(Resource, Debug, Clone)]
pub struct AbilityCatalog {
    defs: Vec<AbilityDef>,
}

impl Default for AbilityCatalog {
    fn default() -> Self {
        Self {
            defs: default_catalog(),
        }
    }
}

impl AbilityCatalog {
    pub fn get(&self, id: &str) -> Option<&AbilityDef> {
        self.defs.iter().find(|d| d.id == id)
    }

    /// Add or replace a definition
    pub fn insert(&mut self, def: AbilityDef) {
        match self.defs.iter_mut().find(|d| d.id == def.id) {
            Some(existing) => *existing = def,
            None => self.defs.push(def),
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.defs.iter().map(|d| d.id.as_str()).collect()
    }
}

/// What a successful activation produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CastHandle {
    Projectile(Entity),
    AreaStrike { center: Vec2, radius: f32 },
    /// Delivered when the cast completes, unless interrupted first
    Casting {
        ability_index: usize,
        completes_in: f32,
    },
}

enum Delivery {
    Projectile(ProjectileBundle),
    Area(AreaStrike),
}

#[allow(clippy::too_many_arguments)]
fn build_delivery(
    caster: Entity,
    faction: Faction,
    def: &AbilityDef,
    origin: Vec2,
    cast: PendingCast,
    outgoing: f32,
    config: &CombatConfig,
) -> Delivery {
    let damage = def.stats.damage * outgoing;
    match def.delivery {
        AbilityDelivery::Projectile(kind) => Delivery::Projectile(projectile_bundle(
            caster, faction, kind, def, origin, cast, damage, config,
        )),
        AbilityDelivery::Area => Delivery::Area(AreaStrike {
            owner: caster,
            faction,
            center: cast.target_pos,
            radius: def.stats.area,
            damage,
            ability: def.id.clone(),
        }),
    }
}

/// True iff the slot is off cooldown, unlocked and affordable
pub fn can_use(world: &World, caster: Entity, index: usize) -> bool {
    let Some(slot) = world.get::<AbilityBook>(caster).and_then(|b| b.slot(index)) else {
        return false;
    };
    let available = world.get::<Mana>(caster).map_or(0.0, |m| m.current);
    !slot.locked && slot.is_ready() && slot.def.stats.mana_cost <= available
}

/// Activate `index` on `caster`, aimed at `target_pos`
pub fn use_ability(
    world: &mut World,
    caster: Entity,
    index: usize,
    target_pos: Vec2,
) -> Result<CastHandle, AbilityError> {
    let origin = world
        .get::<Transform2d>(caster)
        .map(|t| t.position)
        .ok_or(AbilityError::MissingCaster)?;
    let book = world
        .get::<AbilityBook>(caster)
        .ok_or(AbilityError::MissingCaster)?;
    let slot = book
        .slot(index)
        .ok_or(AbilityError::UnknownAbility(index))?;

    if slot.locked {
        return Err(AbilityError::Locked(slot.def.id.clone()));
    }
    if world.get::<Stunned>(caster).is_some() {
        return Err(AbilityError::Stunned);
    }
    if book.casting().is_some() {
        return Err(AbilityError::AlreadyCasting);
    }
    if !slot.is_ready() {
        return Err(AbilityError::OnCooldown {
            remaining: slot.cooldown_remaining,
        });
    }
    let cost = slot.def.stats.mana_cost;
    let available = world.get::<Mana>(caster).map_or(0.0, |m| m.current);
    if cost > available {
        return Err(AbilityError::InsufficientResource {
            needed: cost,
            available,
        });
    }
    let distance = origin.distance(target_pos);
    if !distance.is_finite() || distance > slot.def.stats.range {
        return Err(AbilityError::InvalidTarget {
            distance,
            range: slot.def.stats.range,
        });
    }
    let def = slot.def.clone();

    if cost > 0.0 {
        if let Some(mut mana) = world.get_mut::<Mana>(caster) {
            mana.spend(cost);
        }
    }
    let cast = PendingCast {
        target_pos,
        target_entity: world.get::<CombatTarget>(caster).and_then(|t| t.0),
    };

    if let Some(mut book) = world.get_mut::<AbilityBook>(caster) {
        let slot = &mut book.slots[index];
        slot.cooldown_remaining = def.cooldown;
        if def.cast_time > 0.0 {
            slot.cast_time_remaining = def.cast_time;
            slot.pending = Some(cast);
            tracing::debug!(caster = ?caster, ability = %def.id, cast_time = def.cast_time, "cast started");
            return Ok(CastHandle::Casting {
                ability_index: index,
                completes_in: def.cast_time,
            });
        }
    }

    let delivery = {
        let config = world.resource::<CombatConfig>();
        let profile = DamageProfile::of_entity(world, caster, config);
        let faction = world
            .get::<Faction>(caster)
            .copied()
            .unwrap_or(Faction::Neutral);
        build_delivery(caster, faction, &def, origin, cast, profile.outgoing, config)
    };

    tracing::debug!(caster = ?caster, ability = %def.id, "ability used");
    Ok(match delivery {
        Delivery::Projectile(bundle) => CastHandle::Projectile(world.spawn(bundle).id()),
        Delivery::Area(strike) => {
            let handle = CastHandle::AreaStrike {
                center: strike.center,
                radius: strike.radius,
            };
            world.resource_mut::<PendingStrikes>().push(strike);
            handle
        }
    })
}

/// Cancel `caster`'s cast in progress. No refund.
pub fn interrupt_cast(world: &mut World, caster: Entity) -> bool {
    let Some(mut book) = world.get_mut::<AbilityBook>(caster) else {
        return false;
    };
    match book.interrupt() {
        Some(index) => {
            tracing::debug!(caster = ?caster, slot = index, "cast interrupted");
            true
        }
        None => false,
    }
}

/// System: decay ability cooldowns and advance casts. Completed casts spawn
/// their projectile or queue their area strike for this tick's collision pass.
pub fn advance_abilities(
    mut commands: Commands,
    time: Res<Time>,
    config: Res<CombatConfig>,
    mut strikes: ResMut<PendingStrikes>,
    mut casters: Query<(
        Entity,
        &mut AbilityBook,
        Option<&Transform2d>,
        Option<&Faction>,
        Option<&Stunned>,
    )>,
    sources: Query<DamageSources>,
) {
    let dt = time.delta_secs();

    let mut order: Vec<Entity> = casters.iter().map(|(e, ..)| e).collect();
    order.sort();

    for caster in order {
        let Ok((_, mut book, transform, faction, stunned)) = casters.get_mut(caster) else {
            continue;
        };
        book.tick_cooldowns(dt);

        if stunned.is_some() {
            if let Some(index) = book.interrupt() {
                tracing::debug!(caster = ?caster, slot = index, "cast broken by stun");
            }
            continue;
        }

        let completed = book.advance_casts(dt);
        if completed.is_empty() {
            continue;
        }
        // A caster without a position has nowhere to deliver from
        let Some(origin) = transform.map(|t| t.position) else {
            continue;
        };
        let faction = faction.copied().unwrap_or(Faction::Neutral);
        let outgoing = sources
            .get(caster)
            .map(|s| DamageProfile::from_sources(s, &config).outgoing)
            .unwrap_or(1.0);

        for (index, cast) in completed {
            let def = &book.slots[index].def;
            tracing::debug!(caster = ?caster, ability = %def.id, "cast completed");
            match build_delivery(caster, faction, def, origin, cast, outgoing, &config) {
                Delivery::Projectile(bundle) => {
                    commands.spawn(bundle);
                }
                Delivery::Area(strike) => strikes.push(strike),
            }
        }
    }
}

fn projectile_def(
    id: &str,
    name: &str,
    kind: TrajectoryKind,
    cooldown: f32,
    speed: f32,
    stats: AbilityStats,
    pattern: PatternParams,
) -> AbilityDef {
    AbilityDef {
        id: id.into(),
        name: name.into(),
        cooldown,
        cast_time: 0.0,
        delivery: AbilityDelivery::Projectile(kind),
        stats,
        projectile_speed: speed,
        pattern,
        piercing: false,
        unlock_phase: None,
    }
}

fn area_def(
    id: &str,
    name: &str,
    cooldown: f32,
    cast_time: f32,
    stats: AbilityStats,
    unlock_phase: Option<PhaseId>,
) -> AbilityDef {
    AbilityDef {
        id: id.into(),
        name: name.into(),
        cooldown,
        cast_time,
        delivery: AbilityDelivery::Area,
        stats,
        projectile_speed: 0.0,
        pattern: PatternParams::default(),
        piercing: false,
        unlock_phase,
    }
}

const fn stats(damage: f32, range: f32, mana_cost: f32, duration: f32, area: f32) -> AbilityStats {
    AbilityStats {
        damage,
        range,
        mana_cost,
        duration,
        area,
        attack_speed: 1.0,
    }
}

/// Built-in abilities: one per trajectory pattern plus the boss arsenal
pub fn default_catalog() -> Vec<AbilityDef> {
    let base = PatternParams::default();

    let mut mortar = projectile_def(
        "mortar",
        "Mortar Shell",
        TrajectoryKind::Arcing,
        6.0,
        20.0,
        stats(45.0, 25.0, 20.0, 3.0, 0.0),
        base,
    );
    mortar.cast_time = 0.5;

    let mut orbit_blade = projectile_def(
        "orbit_blade",
        "Orbit Blade",
        TrajectoryKind::Orbital,
        8.0,
        4.0,
        stats(12.0, 10.0, 12.0, 5.0, 0.0),
        PatternParams {
            radius: 3.0,
            angular_speed: 0.3,
            ..base
        },
    );
    orbit_blade.piercing = true;

    let mut vortex = projectile_def(
        "vortex",
        "Vortex",
        TrajectoryKind::Spiral,
        12.0,
        0.0,
        stats(10.0, 20.0, 25.0, 4.0, 0.0),
        PatternParams {
            radius_growth: 6.0,
            angular_speed: 6.0,
            ..base
        },
    );
    vortex.piercing = true;

    let final_judgment = area_def(
        "final_judgment",
        "Final Judgment",
        20.0,
        1.5,
        stats(200.0, 15.0, 100.0, 0.0, 10.0),
        Some(PhaseId::Final),
    );

    vec![
        projectile_def(
            "fireball",
            "Fireball",
            TrajectoryKind::Linear,
            2.0,
            40.0,
            stats(30.0, 30.0, 10.0, 2.0, 0.0),
            base,
        ),
        mortar,
        projectile_def(
            "seeker",
            "Seeker Bolt",
            TrajectoryKind::Homing,
            4.0,
            25.0,
            stats(20.0, 35.0, 15.0, 4.0, 0.0),
            base,
        ),
        orbit_blade,
        projectile_def(
            "serpent",
            "Serpent Shot",
            TrajectoryKind::Zigzag,
            3.0,
            30.0,
            stats(18.0, 30.0, 12.0, 2.0, 0.0),
            PatternParams {
                amplitude: 0.6,
                frequency: 12.0,
                ..base
            },
        ),
        projectile_def(
            "tide",
            "Tide Bolt",
            TrajectoryKind::Wave,
            3.0,
            30.0,
            stats(16.0, 30.0, 10.0, 2.0, 0.0),
            PatternParams {
                amplitude: 8.0,
                frequency: 6.0,
                ..base
            },
        ),
        vortex,
        projectile_def(
            "ricochet",
            "Ricochet",
            TrajectoryKind::Bouncing,
            5.0,
            50.0,
            stats(22.0, 40.0, 15.0, 6.0, 0.0),
            base,
        ),
        area_def(
            "ultimate_strike",
            "Ultimate Strike",
            15.0,
            0.0,
            stats(150.0, 6.0, 50.0, 0.0, 4.0),
            None,
        ),
        area_def(
            "spirit_crush",
            "Spirit Crush",
            8.0,
            0.0,
            stats(80.0, 8.0, 30.0, 0.0, 3.0),
            Some(PhaseId::Phase2),
        ),
        area_def(
            "dark_nova",
            "Dark Nova",
            10.0,
            0.5,
            stats(100.0, 12.0, 60.0, 0.0, 8.0),
            Some(PhaseId::Phase3),
        ),
        final_judgment,
    ]
}
