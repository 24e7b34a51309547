//! `CombatSim`: the host-facing handle on a headless combat world.
//!
//! The host owns the clock. Every `tick(dt)` advances `Time` by exactly `dt`
//! and runs the fixed pipeline once; nothing in the core reads wall time.

use std::time::Duration;

use bevy::prelude::*;

use crate::abilities::{self, AbilityCatalog, AbilityDef, AbilityError, CastHandle};
use crate::combat::evasion::{self, EvasionError};
use crate::combat::CombatCorePlugin;
use crate::config::{CombatConfig, ConfigError};
use crate::events::{
    AttackAvoided, DamageDealt, EntityDied, PhaseTransitioned, RallyBroadcast, TickReport,
    TierChanged,
};
use crate::logging::OperationSpan;
use crate::psychology::pack::{PackAlpha, PackMember};
use crate::psychology::PsychologyState;
use crate::store::factory::{spawn_entity, ArchetypeFactory, EntityFactory, SpawnError, SpawnSpec};
use crate::store::snapshot::{EntitySnapshot, WorldSnapshot};
use crate::store::{Archetype, CombatTarget, Stunned, Transform2d};

/// Receives every death, in tick order, after the tick completes
pub trait DeathObserver: Send {
    fn on_entity_died(&mut self, event: &EntityDied);
}

impl<F: FnMut(&EntityDied) + Send> DeathObserver for F {
    fn on_entity_died(&mut self, event: &EntityDied) {
        self(event)
    }
}

pub struct CombatSim {
    app: App,
    tick: u64,
    factory: Box<dyn EntityFactory + Send>,
    observers: Vec<Box<dyn DeathObserver>>,
}

impl CombatSim {
    pub fn new(config: CombatConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        tracing::info!(seed = config.seed, "combat sim created");

        let mut app = App::new();
        app.init_resource::<Time>()
            .insert_resource(config)
            .add_plugins(CombatCorePlugin);
        app.finish();
        app.cleanup();

        Ok(Self {
            app,
            tick: 0,
            factory: Box::new(ArchetypeFactory),
            observers: Vec::new(),
        })
    }

    pub fn with_defaults() -> Self {
        let mut app = App::new();
        app.init_resource::<Time>().add_plugins(CombatCorePlugin);
        app.finish();
        app.cleanup();
        Self {
            app,
            tick: 0,
            factory: Box::new(ArchetypeFactory),
            observers: Vec::new(),
        }
    }

    /// Swap the archetype factory
    pub fn set_factory(&mut self, factory: impl EntityFactory + Send + 'static) {
        self.factory = Box::new(factory);
    }

    pub fn world(&self) -> &World {
        self.app.world()
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    pub fn config(&self) -> &CombatConfig {
        self.app.world().resource::<CombatConfig>()
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Replace the live config. Running timers keep their values; new values
    /// apply from the next time they are read.
    pub fn reload_config(&mut self, config: CombatConfig) -> Result<(), ConfigError> {
        config.validate()?;
        tracing::info!(seed = config.seed, "combat config reloaded");
        self.app.world_mut().insert_resource(config);
        Ok(())
    }

    /// Add or replace an ability definition for future spawns
    pub fn register_ability(&mut self, def: AbilityDef) {
        self.app
            .world_mut()
            .resource_mut::<AbilityCatalog>()
            .insert(def);
    }

    pub fn spawn(&mut self, kind: Archetype, position: Vec2) -> Result<Entity, SpawnError> {
        self.factory.create(self.app.world_mut(), kind, position)
    }

    pub fn spawn_with(&mut self, spec: &SpawnSpec) -> Result<Entity, SpawnError> {
        spawn_entity(self.app.world_mut(), spec)
    }

    pub fn subscribe_deaths(&mut self, observer: impl DeathObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Advance the simulation by `dt` seconds. Negative or non-finite `dt`
    /// is treated as zero.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        let dt = if dt.is_finite() && dt >= 0.0 {
            dt
        } else {
            tracing::warn!(dt, "invalid tick delta, using 0");
            0.0
        };
        let _span = OperationSpan::new("combat_tick");

        self.app
            .world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(dt));
        self.app.update();
        self.tick += 1;

        let report = self.collect_report();
        for death in &report.deaths {
            for observer in &mut self.observers {
                observer.on_entity_died(death);
            }
        }
        report
    }

    fn collect_report(&self) -> TickReport {
        let world = self.app.world();
        fn current<E: Event + Clone>(world: &World) -> Vec<E> {
            world
                .get_resource::<Events<E>>()
                .map(|events| events.iter_current_update_events().cloned().collect())
                .unwrap_or_default()
        }
        TickReport {
            tick: self.tick,
            hits: current::<DamageDealt>(world),
            avoided: current::<AttackAvoided>(world),
            deaths: current::<EntityDied>(world),
            phase_transitions: current::<PhaseTransitioned>(world),
            tier_changes: current::<TierChanged>(world),
            rallies: current::<RallyBroadcast>(world),
        }
    }

    pub fn can_use(&self, caster: Entity, slot: usize) -> bool {
        abilities::can_use(self.app.world(), caster, slot)
    }

    pub fn use_ability(
        &mut self,
        caster: Entity,
        slot: usize,
        target: Vec2,
    ) -> Result<CastHandle, AbilityError> {
        if !self.is_live(caster) {
            return Err(AbilityError::MissingCaster);
        }
        abilities::use_ability(self.app.world_mut(), caster, slot, target)
    }

    pub fn interrupt_cast(&mut self, caster: Entity) -> bool {
        self.is_live(caster) && abilities::interrupt_cast(self.app.world_mut(), caster)
    }

    /// Stun for `seconds`; a cast in progress is lost
    pub fn stun(&mut self, entity: Entity, seconds: f32) -> bool {
        if !self.is_live(entity) || !seconds.is_finite() || seconds <= 0.0 {
            return false;
        }
        abilities::interrupt_cast(self.app.world_mut(), entity);
        self.app
            .world_mut()
            .entity_mut(entity)
            .insert(Stunned { remaining: seconds });
        true
    }

    /// Dash along `direction`; returns where the entity landed
    pub fn dodge(&mut self, entity: Entity, direction: Vec2) -> Result<Vec2, EvasionError> {
        if !self.is_live(entity) || !direction.is_finite() {
            return Err(EvasionError::CannotEvade);
        }
        evasion::dodge(self.app.world_mut(), entity, direction)
    }

    pub fn parry(&mut self, entity: Entity) -> Result<(), EvasionError> {
        if !self.is_live(entity) {
            return Err(EvasionError::CannotEvade);
        }
        evasion::parry(self.app.world_mut(), entity)
    }

    /// Set the external fog scalar, clamped to [0, 1]
    pub fn apply_fog_empowerment(&mut self, entity: Entity, fog: f32) -> bool {
        if !fog.is_finite() || !self.is_live(entity) {
            return false;
        }
        match self.app.world_mut().get_mut::<PsychologyState>(entity) {
            Some(mut state) => {
                state.fog_empowerment = fog.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }

    pub fn set_target(&mut self, entity: Entity, target: Option<Entity>) -> bool {
        if !self.is_live(entity) {
            return false;
        }
        match self.app.world_mut().get_mut::<CombatTarget>(entity) {
            Some(mut current) => {
                current.0 = target;
                true
            }
            None => false,
        }
    }

    /// Movement lives outside the core; the host reports positions here
    pub fn set_position(&mut self, entity: Entity, position: Vec2) -> bool {
        if !position.is_finite() || !self.is_live(entity) {
            return false;
        }
        match self.app.world_mut().get_mut::<Transform2d>(entity) {
            Some(mut transform) => {
                transform.position = position;
                true
            }
            None => false,
        }
    }

    /// Bind a follower to an alpha without waiting for a rally
    pub fn assign_alpha(&mut self, follower: Entity, alpha: Entity) -> bool {
        if !self.is_live(follower) || self.app.world().get::<PackAlpha>(alpha).is_none() {
            return false;
        }
        match self.app.world_mut().get_mut::<PackMember>(follower) {
            Some(mut member) => {
                member.alpha = Some(alpha);
                true
            }
            None => false,
        }
    }

    pub fn is_live(&self, entity: Entity) -> bool {
        self.app.world().entities().contains(entity)
    }

    pub fn query_state(&self, entity: Entity) -> Option<EntitySnapshot> {
        EntitySnapshot::capture(self.app.world(), entity)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(self.app.world(), self.tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Health;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = CombatConfig::default();
        config.psychology.duration_min = -1.0;
        assert!(CombatSim::new(config).is_err());
    }

    #[test]
    fn test_bad_dt_is_zero() {
        let mut sim = CombatSim::with_defaults();
        let e = sim
            .spawn_with(&SpawnSpec::new(Vec2::ZERO).mana(10.0, 5.0))
            .unwrap();
        sim.world_mut().get_mut::<crate::store::Mana>(e).unwrap().current = 0.0;
        sim.tick(f32::NAN);
        sim.tick(-1.0);
        assert_eq!(sim.world().get::<crate::store::Mana>(e).unwrap().current, 0.0);
        assert_eq!(sim.current_tick(), 2);
    }

    #[test]
    fn test_death_observer_sees_each_death_once() {
        let mut sim = CombatSim::with_defaults();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        sim.subscribe_deaths(move |e: &EntityDied| sink.lock().unwrap().push(e.entity));

        let victim = sim
            .spawn_with(&SpawnSpec::new(Vec2::ZERO).health(10.0))
            .unwrap();
        sim.world_mut()
            .get_mut::<Health>(victim)
            .unwrap()
            .take_damage(20.0, None);
        let report = sim.tick(0.1);
        sim.tick(0.1);

        assert!(report.died(victim));
        assert_eq!(*seen.lock().unwrap(), vec![victim]);
        assert!(!sim.is_live(victim));
        assert!(sim.query_state(victim).is_none());
    }

    #[test]
    fn test_operations_on_missing_entity() {
        let mut sim = CombatSim::with_defaults();
        let e = sim.spawn_with(&SpawnSpec::new(Vec2::ZERO)).unwrap();
        sim.world_mut().despawn(e);
        assert_eq!(
            sim.use_ability(e, 0, Vec2::X),
            Err(AbilityError::MissingCaster)
        );
        assert!(!sim.stun(e, 1.0));
        assert_eq!(sim.dodge(e, Vec2::X), Err(EvasionError::CannotEvade));
        assert_eq!(sim.parry(e), Err(EvasionError::CannotEvade));
        assert!(!sim.apply_fog_empowerment(e, 1.0));
        assert!(!sim.set_target(e, None));
        assert!(!sim.set_position(e, Vec2::ONE));
    }

    #[test]
    fn test_fog_is_clamped() {
        let mut sim = CombatSim::with_defaults();
        let e = sim
            .spawn_with(&SpawnSpec::new(Vec2::ZERO).traits(Default::default()))
            .unwrap();
        assert!(sim.apply_fog_empowerment(e, 4.0));
        let state = sim.query_state(e).unwrap().psychology.unwrap();
        assert_eq!(state.fog_empowerment, 1.0);
    }
}
