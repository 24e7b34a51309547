//! Nightfall - Combat Simulation Core
//!
//! Headless, deterministic combat logic for the Nightfall action-RPG:
//! - Entity/component store with archetype spawning and snapshots
//! - Projectile trajectories (eight motion patterns)
//! - Abilities with cooldowns, mana and cast times
//! - Fixed-order combat tick (melee, projectiles, area strikes, deaths)
//! - Enemy psychology (fear tiers, behavior selection, pack rallies)
//! - Boss phase controller
//! - Deterministic replay and Monte-Carlo balance sweeps
//!
//! Rendering, input, movement and networking belong to the host. The host
//! drives everything through [`CombatSim`].

pub mod abilities;
pub mod balance;
pub mod boss;
pub mod combat;
pub mod config;
pub mod constants;
pub mod events;
pub mod hotreload;
pub mod logging;
pub mod psychology;
pub mod replay;
pub mod sim;
pub mod store;
pub mod trajectory;

pub use abilities::{AbilityDef, AbilityError, CastHandle};
pub use boss::PhaseId;
pub use combat::evasion::EvasionError;
pub use combat::CombatCorePlugin;
pub use config::{CombatConfig, ConfigError};
pub use events::{Avoidance, EntityDied, TickReport};
pub use psychology::{Behavior, PsychTier, PsychologyTraits};
pub use sim::{CombatSim, DeathObserver};
pub use store::factory::{SpawnError, SpawnSpec};
pub use store::{Archetype, Faction};
