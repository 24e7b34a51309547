use bevy::ecs::schedule::ExecutorKind;
use bevy::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

pub mod damage;
pub mod death;
pub mod evasion;
pub mod melee;
pub mod projectile;

use crate::abilities::{advance_abilities, AbilityCatalog};
use crate::boss::evaluate_boss_phases;
use crate::config::CombatConfig;
use crate::events::{
    AttackAvoided, DamageDealt, EntityDied, PhaseTransitioned, RallyBroadcast, TierChanged,
};
use crate::psychology::behavior::select_behavior;
use crate::psychology::pack::{broadcast_rallies, record_ledger, PsychologyLedger};
use crate::psychology::update_psychology;
use crate::store::{decay_timer, Attack, Mana, Stunned};

/// Headless combat core: resources, events and the fixed tick pipeline.
///
/// Every system runs in `Update` as one chain on a single-threaded executor,
/// so a tick always resolves in the same order:
/// timers, abilities, melee, projectile motion, collisions, boss phases,
/// deaths, psychology, rallies, behavior, ledger.
pub struct CombatCorePlugin;

impl Plugin for CombatCorePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CombatConfig>();
        let seed = app.world().resource::<CombatConfig>().seed;

        app.insert_resource(CombatRng::seeded(seed))
            .init_resource::<AbilityCatalog>()
            .init_resource::<projectile::PendingStrikes>()
            .init_resource::<PsychologyLedger>()
            .add_event::<DamageDealt>()
            .add_event::<AttackAvoided>()
            .add_event::<EntityDied>()
            .add_event::<PhaseTransitioned>()
            .add_event::<TierChanged>()
            .add_event::<RallyBroadcast>()
            .add_systems(
                Update,
                (
                    decay_timers,
                    advance_abilities,
                    melee::resolve_melee,
                    projectile::integrate_projectiles,
                    projectile::resolve_collisions,
                    evaluate_boss_phases,
                    death::resolve_deaths,
                    update_psychology,
                    broadcast_rallies,
                    select_behavior,
                    record_ledger,
                )
                    .chain(),
            )
            .edit_schedule(Update, |schedule| {
                schedule.set_executor_kind(ExecutorKind::SingleThreaded);
            });
    }
}

/// The one source of randomness in the simulation
#[derive(Resource, Debug, Clone)]
pub struct CombatRng(pub Xoshiro256PlusPlus);

impl CombatRng {
    pub fn seeded(seed: u64) -> Self {
        Self(Xoshiro256PlusPlus::seed_from_u64(seed))
    }
}

impl Default for CombatRng {
    fn default() -> Self {
        Self::seeded(0)
    }
}

/// System: attack cooldowns, mana and stamina regeneration, evasion windows
/// and stun expiry
pub fn decay_timers(
    mut commands: Commands,
    time: Res<Time>,
    mut attacks: Query<&mut Attack>,
    mut pools: Query<&mut Mana>,
    mut evaders: Query<&mut evasion::Evasion>,
    mut stuns: Query<(Entity, &mut Stunned)>,
) {
    let dt = time.delta_secs();

    for mut attack in &mut attacks {
        attack.tick(dt);
    }
    for mut mana in &mut pools {
        mana.regenerate(dt);
    }
    for mut evader in &mut evaders {
        evader.tick(dt);
    }
    for (entity, mut stun) in &mut stuns {
        decay_timer(&mut stun.remaining, dt);
        if stun.remaining <= 0.0 {
            commands.entity(entity).remove::<Stunned>();
        }
    }
}
