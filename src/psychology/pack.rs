//! Pack structure and alpha rallies.
//!
//! An alpha re-broadcasts a rally on a fixed interval to same-faction
//! enemies within its radius. Followers hold only the alpha's `Entity`; it is
//! resolved every tick, so an alpha that died or despawned simply stops
//! counting. An alpha that is itself FEARFUL or worse holds its rally until
//! it calms down. The `PsychologyLedger` is last tick's tier snapshot, which lets an
//! alpha notice frightened followers and rally early.

use std::collections::HashMap;

use bevy::prelude::*;

use super::{PsychTier, PsychologyState, PsychologyTraits};
use crate::config::CombatConfig;
use crate::events::RallyBroadcast;
use crate::store::{decay_timer, Faction, Health, Transform2d};

#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct PackAlpha {
    /// Seconds until the next rally; the first one goes out immediately
    pub cooldown: f32,
}

#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct PackMember {
    pub alpha: Option<Entity>,
}

/// Active rally on a follower
#[derive(Component, Debug, Clone, PartialEq)]
pub struct RallyStatus {
    pub remaining: f32,
    pub alpha: Entity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerEntry {
    pub tier: PsychTier,
    pub alpha: Option<Entity>,
}

#[derive(Resource, Debug, Default)]
pub struct PsychologyLedger {
    pub entries: HashMap<Entity, LedgerEntry>,
}

impl PsychologyLedger {
    /// Followers of `alpha` that were FEARFUL or worse last tick
    pub fn frightened_followers(&self, alpha: Entity) -> usize {
        self.entries
            .values()
            .filter(|e| e.alpha == Some(alpha) && e.tier.forces_retreat())
            .count()
    }
}

/// Liveness rule shared by rally broadcast and the psychology pass.
/// An alpha without `Health` counts as alive.
pub fn alpha_alive(health: Option<&Health>) -> bool {
    health.map_or(true, Health::is_alive)
}

/// System: broadcast due rallies, then age the rallies already running
#[allow(clippy::type_complexity)]
pub fn broadcast_rallies(
    mut commands: Commands,
    time: Res<Time>,
    config: Res<CombatConfig>,
    ledger: Res<PsychologyLedger>,
    mut alphas: Query<(
        Entity,
        &mut PackAlpha,
        &Transform2d,
        Option<&Faction>,
        Option<&Health>,
        Option<&PsychologyState>,
    )>,
    mut followers: Query<
        (
            Entity,
            &Transform2d,
            Option<&Faction>,
            &PsychologyTraits,
            &mut PackMember,
            Option<&mut RallyStatus>,
        ),
        Without<PackAlpha>,
    >,
    mut rallies: EventWriter<RallyBroadcast>,
) {
    let dt = time.delta_secs();
    let rally = &config.rally;

    let mut order: Vec<Entity> = alphas
        .iter()
        .filter(|(.., hp, _)| alpha_alive(*hp))
        .map(|(e, ..)| e)
        .collect();
    order.sort();
    let living = order.clone();
    let mut refreshed: Vec<Entity> = Vec::new();

    for alpha in order {
        let Ok((_, mut pack, transform, faction, _, mind)) = alphas.get_mut(alpha) else {
            continue;
        };

        let urgent = ledger.frightened_followers(alpha) > 0;
        let interval = if urgent {
            rally.interval * rally.urgent_factor
        } else {
            rally.interval
        };
        pack.cooldown = pack.cooldown.min(interval);
        decay_timer(&mut pack.cooldown, dt);
        if pack.cooldown > 0.0 {
            continue;
        }
        // Stays due, so the rally goes out the tick the alpha calms
        if rally.require_calm && mind.is_some_and(|m| m.tier.forces_retreat()) {
            tracing::debug!(alpha = ?alpha, "alpha too shaken to rally");
            continue;
        }
        pack.cooldown = interval;

        let center = transform.position;
        let faction = faction.copied();
        let mut receivers = Vec::new();

        for (entity, follower, follower_faction, traits, mut member, status) in &mut followers {
            if follower_faction.copied() != faction
                || follower.position.distance(center) > rally.radius
            {
                continue;
            }
            let remaining = rally.duration * traits.pack_mentality;
            match status {
                Some(mut status) => {
                    status.remaining = remaining;
                    status.alpha = alpha;
                }
                None => {
                    commands
                        .entity(entity)
                        .insert(RallyStatus { remaining, alpha });
                }
            }
            if member.alpha.map_or(true, |a| !living.contains(&a)) {
                member.alpha = Some(alpha);
            }
            refreshed.push(entity);
            receivers.push(entity);
        }

        if receivers.is_empty() {
            continue;
        }
        receivers.sort();
        tracing::info!(alpha = ?alpha, receivers = receivers.len(), urgent, "rally broadcast");
        rallies.send(RallyBroadcast {
            alpha,
            receivers,
            urgent,
        });
    }

    for (entity, _, _, _, _, status) in &mut followers {
        let Some(mut status) = status else {
            continue;
        };
        if refreshed.contains(&entity) {
            continue;
        }
        decay_timer(&mut status.remaining, dt);
        if status.remaining <= 0.0 {
            commands.entity(entity).remove::<RallyStatus>();
        }
    }
}

/// System: record every tier and pack link for next tick's rally check
pub fn record_ledger(
    mut ledger: ResMut<PsychologyLedger>,
    minds: Query<(Entity, &PsychologyState, Option<&PackMember>)>,
) {
    ledger.entries.clear();
    for (entity, state, member) in &minds {
        ledger.entries.insert(
            entity,
            LedgerEntry {
                tier: state.tier,
                alpha: member.and_then(|m| m.alpha),
            },
        );
    }
}
