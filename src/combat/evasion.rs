//! Dodge and parry.
//!
//! Both are host inputs paid from a per-entity stamina pool. A dodge moves the
//! entity a fixed distance and grants a short invulnerability that every hit
//! kind passes through. A parry opens a window in which incoming melee swings
//! are negated and the attacker is staggered; a swing landing in the opening
//! sliver is a perfect parry, which refunds the stamina and clears the parry
//! cooldown.
//!
//! Timers advance in `decay_timers`, so a parry opened before a tick has aged
//! by that tick's `dt` when the melee pass reads it.

use bevy::prelude::*;

use crate::config::CombatConfig;
use crate::events::Avoidance;
use crate::store::{decay_timer, Stunned, Transform2d};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvasionError {
    #[error("Evasion on cooldown: {remaining:.2}s remaining")]
    OnCooldown { remaining: f32 },
    #[error("Not enough stamina: need {needed}, have {available}")]
    InsufficientStamina { needed: f32, available: f32 },
    #[error("Dodge direction has no length")]
    InvalidDirection,
    #[error("Cannot evade while stunned")]
    Stunned,
    #[error("Entity missing or unable to evade")]
    CannotEvade,
}

/// An open parry: seconds since it opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParryWindow {
    pub elapsed: f32,
    pub window: f32,
}

/// Stamina pool plus dodge and parry timers
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Evasion {
    pub stamina: f32,
    pub stamina_max: f32,
    pub stamina_regen: f32,
    pub dodge_cooldown: f32,
    /// Invulnerability left from the last dodge
    pub iframes: f32,
    pub parry_cooldown: f32,
    pub parry: Option<ParryWindow>,
}

impl Evasion {
    pub fn new(max: f32, regen: f32) -> Self {
        Self {
            stamina: max,
            stamina_max: max,
            stamina_regen: regen,
            dodge_cooldown: 0.0,
            iframes: 0.0,
            parry_cooldown: 0.0,
            parry: None,
        }
    }

    pub fn is_invulnerable(&self) -> bool {
        self.iframes > 0.0
    }

    pub fn tick(&mut self, dt: f32) {
        self.stamina = (self.stamina + self.stamina_regen * dt).min(self.stamina_max);
        decay_timer(&mut self.dodge_cooldown, dt);
        decay_timer(&mut self.iframes, dt);
        decay_timer(&mut self.parry_cooldown, dt);
        if let Some(parry) = &mut self.parry {
            parry.elapsed += dt;
            if parry.elapsed >= parry.window {
                self.parry = None;
            }
        }
    }

    fn pay(&mut self, cost: f32) -> Result<(), EvasionError> {
        if self.stamina < cost {
            return Err(EvasionError::InsufficientStamina {
                needed: cost,
                available: self.stamina,
            });
        }
        self.stamina -= cost;
        Ok(())
    }

    /// How an incoming melee swing is met, if the parry is up
    pub fn parry_outcome(&self, perfect_window: f32) -> Option<Avoidance> {
        self.parry.map(|p| {
            if p.elapsed <= perfect_window {
                Avoidance::PerfectParry
            } else {
                Avoidance::Parried
            }
        })
    }

    /// Perfect parries pay back their stamina and may be repeated at once
    pub fn reward_perfect_parry(&mut self, refund: f32) {
        self.stamina = (self.stamina + refund).min(self.stamina_max);
        self.parry_cooldown = 0.0;
    }
}

fn ready_evader(world: &World, entity: Entity) -> Result<(), EvasionError> {
    if world.get::<Evasion>(entity).is_none() {
        return Err(EvasionError::CannotEvade);
    }
    if world.get::<Stunned>(entity).is_some() {
        return Err(EvasionError::Stunned);
    }
    Ok(())
}

/// Dash `dodge_distance` along `direction` and start the invulnerability.
/// Returns the new position. Nothing is spent when the dodge is refused.
pub fn dodge(world: &mut World, entity: Entity, direction: Vec2) -> Result<Vec2, EvasionError> {
    ready_evader(world, entity)?;
    let config = world.resource::<CombatConfig>().evasion.clone();
    let origin = world
        .get::<Transform2d>(entity)
        .map(|t| t.position)
        .ok_or(EvasionError::CannotEvade)?;

    let Some(mut evasion) = world.get_mut::<Evasion>(entity) else {
        return Err(EvasionError::CannotEvade);
    };
    if evasion.dodge_cooldown > 0.0 {
        return Err(EvasionError::OnCooldown {
            remaining: evasion.dodge_cooldown,
        });
    }
    if evasion.stamina < config.dodge_stamina {
        return Err(EvasionError::InsufficientStamina {
            needed: config.dodge_stamina,
            available: evasion.stamina,
        });
    }
    let dir = direction
        .try_normalize()
        .ok_or(EvasionError::InvalidDirection)?;
    evasion.pay(config.dodge_stamina)?;
    evasion.dodge_cooldown = config.dodge_cooldown;
    evasion.iframes = config.dodge_iframes;

    let landing = origin + dir * config.dodge_distance;
    if let Some(mut transform) = world.get_mut::<Transform2d>(entity) {
        transform.position = landing;
        transform.heading = dir.y.atan2(dir.x);
    }
    tracing::debug!(entity = ?entity, x = landing.x, y = landing.y, "dodged");
    Ok(landing)
}

/// Open a parry window
pub fn parry(world: &mut World, entity: Entity) -> Result<(), EvasionError> {
    ready_evader(world, entity)?;
    let config = world.resource::<CombatConfig>().evasion.clone();
    let Some(mut evasion) = world.get_mut::<Evasion>(entity) else {
        return Err(EvasionError::CannotEvade);
    };
    if evasion.parry_cooldown > 0.0 {
        return Err(EvasionError::OnCooldown {
            remaining: evasion.parry_cooldown,
        });
    }
    evasion.pay(config.parry_stamina)?;
    evasion.parry_cooldown = config.parry_cooldown;
    evasion.parry = Some(ParryWindow {
        elapsed: 0.0,
        window: config.parry_window,
    });
    tracing::debug!(entity = ?entity, "parry opened");
    Ok(())
}
