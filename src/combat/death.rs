//! Death pass (tick step 6): announce, then remove.

use bevy::prelude::*;

use crate::events::EntityDied;
use crate::store::{Archetype, Faction, Health, Transform2d};

/// System: every entity at zero health is reported exactly once and despawned
pub fn resolve_deaths(
    mut commands: Commands,
    fallen: Query<(
        Entity,
        &Health,
        Option<&Transform2d>,
        Option<&Faction>,
        Option<&Archetype>,
    )>,
    mut died: EventWriter<EntityDied>,
) {
    let mut dead: Vec<EntityDied> = fallen
        .iter()
        .filter(|(_, hp, ..)| !hp.is_alive())
        .map(|(entity, hp, transform, faction, archetype)| EntityDied {
            entity,
            last_attacker: hp.last_attacker,
            position: transform.map(|t| t.position),
            faction: faction.copied(),
            archetype: archetype.copied(),
        })
        .collect();
    dead.sort_by_key(|d| d.entity);

    for event in dead {
        tracing::info!(
            entity = ?event.entity,
            killer = ?event.last_attacker,
            archetype = ?event.archetype,
            "entity died"
        );
        commands.entity(event.entity).despawn();
        died.send(event);
    }
}
