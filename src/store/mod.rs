//! Entity/component store.
//!
//! Entities are bevy `Entity` handles inside the simulation's `World`. Each
//! record here is plain data and every entity may lack any of them; a combat
//! pass that needs a component just never sees entities without it.
//!
//! Components owned by other modules:
//! - `AbilityBook` (abilities)
//! - `ProjectileState` (combat::projectile)
//! - `PsychologyState`, `PsychologyTraits`, `BehaviorState` (psychology)
//! - `PackAlpha`, `PackMember`, `RallyStatus` (psychology::pack)
//! - `BossPhase` (boss)

pub mod factory;
pub mod snapshot;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::TIMER_EPSILON;

/// Counts a timer down by `dt`, never below zero
pub fn decay_timer(remaining: &mut f32, dt: f32) {
    *remaining = (*remaining - dt).max(0.0);
    if *remaining <= TIMER_EPSILON {
        *remaining = 0.0;
    }
}

/// Enemy/actor template the factory knows how to build
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    Hero,
    Basic,
    Ranged,
    Alpha,
    Nimble,
    Brute,
    Boss,
}

impl Archetype {
    pub const ALL: [Archetype; 7] = [
        Archetype::Hero,
        Archetype::Basic,
        Archetype::Ranged,
        Archetype::Alpha,
        Archetype::Nimble,
        Archetype::Brute,
        Archetype::Boss,
    ];
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Player,
    Hostile,
    Neutral,
}

/// 2D placement. Positions arrive already resolved from movement/pathfinding.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2d {
    pub position: Vec2,
    /// Facing angle in radians
    pub heading: f32,
}

impl Transform2d {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            heading: 0.0,
        }
    }
}

/// Hit points. `0 <= current <= max` always holds.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Health {
    pub current: f32,
    pub max: f32,
    pub last_attacker: Option<Entity>,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            last_attacker: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn ratio(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            self.current / self.max
        }
    }

    /// Applies already-mitigated damage. Returns the amount actually removed.
    pub fn take_damage(&mut self, amount: f32, attacker: Option<Entity>) -> f32 {
        if !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }
        let actual = amount.min(self.current);
        self.current -= actual;
        if actual > 0.0 && attacker.is_some() {
            self.last_attacker = attacker;
        }
        actual
    }

    pub fn heal(&mut self, amount: f32) {
        if amount.is_finite() && amount > 0.0 {
            self.current = (self.current + amount).min(self.max);
        }
    }
}

/// Basic melee attack
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub damage: f32,
    pub range: f32,
    /// Attacks per second
    pub attack_speed: f32,
    pub cooldown: f32,
}

impl Attack {
    pub fn new(damage: f32, range: f32, attack_speed: f32) -> Self {
        Self {
            damage,
            range,
            attack_speed,
            cooldown: 0.0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.cooldown <= 0.0
    }

    pub fn reset_cooldown(&mut self) {
        self.cooldown = if self.attack_speed > 0.0 {
            1.0 / self.attack_speed
        } else {
            f32::INFINITY
        };
    }

    pub fn tick(&mut self, dt: f32) {
        decay_timer(&mut self.cooldown, dt);
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Defense {
    pub armor: f32,
}

/// Current target, resolved externally (targeting/aggro lives outside the core)
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombatTarget(pub Option<Entity>);

/// Power proxy other entities measure themselves against
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreatProfile {
    pub level: u32,
    pub damage_multiplier: f32,
}

impl ThreatProfile {
    pub fn power(&self) -> f32 {
        self.level as f32 * self.damage_multiplier
    }
}

/// Ability resource pool
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mana {
    pub current: f32,
    pub max: f32,
    pub regen: f32,
}

impl Mana {
    pub fn new(max: f32, regen: f32) -> Self {
        Self {
            current: max,
            max,
            regen,
        }
    }

    pub fn can_afford(&self, cost: f32) -> bool {
        self.current >= cost
    }

    pub fn spend(&mut self, cost: f32) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.current -= cost;
        true
    }

    pub fn regenerate(&mut self, dt: f32) {
        self.current = (self.current + self.regen * dt).min(self.max);
    }
}

/// Stun: blocks melee and casting, interrupts a cast in progress
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Stunned {
    pub remaining: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_clamps_at_zero() {
        let mut hp = Health::new(50.0);
        let dealt = hp.take_damage(80.0, None);
        assert_eq!(dealt, 50.0);
        assert_eq!(hp.current, 0.0);
        assert!(!hp.is_alive());
    }

    #[test]
    fn test_health_ignores_negative_and_nan() {
        let mut hp = Health::new(50.0);
        assert_eq!(hp.take_damage(-10.0, None), 0.0);
        assert_eq!(hp.take_damage(f32::NAN, None), 0.0);
        assert_eq!(hp.current, 50.0);
    }

    #[test]
    fn test_heal_never_exceeds_max() {
        let mut hp = Health::new(50.0);
        hp.take_damage(20.0, None);
        hp.heal(100.0);
        assert_eq!(hp.current, 50.0);
    }

    #[test]
    fn test_last_attacker_recorded() {
        let mut world = World::new();
        let attacker = world.spawn_empty().id();
        let mut hp = Health::new(50.0);
        hp.take_damage(5.0, Some(attacker));
        assert_eq!(hp.last_attacker, Some(attacker));
    }

    #[test]
    fn test_attack_cooldown_cycle() {
        let mut attack = Attack::new(25.0, 2.0, 2.0);
        assert!(attack.is_ready());
        attack.reset_cooldown();
        assert!((attack.cooldown - 0.5).abs() < f32::EPSILON);
        attack.tick(0.3);
        assert!(!attack.is_ready());
        attack.tick(0.3);
        assert!(attack.is_ready());
        assert_eq!(attack.cooldown, 0.0);
    }

    #[test]
    fn test_decay_timer_snaps_float_residue() {
        let mut t = 15.0_f32;
        for _ in 0..150 {
            decay_timer(&mut t, 0.1);
        }
        assert_eq!(t, 0.0);
    }

    #[test]
    fn test_mana_spend_and_regen() {
        let mut mana = Mana::new(50.0, 10.0);
        assert!(mana.spend(40.0));
        assert!(!mana.spend(20.0));
        mana.regenerate(1.0);
        assert_eq!(mana.current, 20.0);
        mana.regenerate(10.0);
        assert_eq!(mana.current, 50.0);
    }
}
