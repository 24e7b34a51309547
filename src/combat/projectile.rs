//! Projectiles and area strikes: integration (tick step 3) and the
//! collision pass (tick step 4).

use bevy::prelude::*;

use super::damage::{resolve_hit, DamageProfile, DamageSources};
use super::evasion::Evasion;
use crate::abilities::{AbilityDef, PendingCast};
use crate::config::CombatConfig;
use crate::events::{AttackAvoided, Avoidance, DamageDealt, HitKind};
use crate::store::{decay_timer, Defense, Faction, Health, Transform2d};
use crate::trajectory::{self, PatternParams, PatternState, TrajectoryKind};

/// A projectile in flight. Pattern memory persists across ticks.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct ProjectileState {
    pub owner: Entity,
    pub faction: Faction,
    pub ability: String,
    pub kind: TrajectoryKind,
    pub pattern: PatternState,
    pub velocity: Vec2,
    /// Payload already scaled by the caster's outgoing multiplier
    pub damage: f32,
    pub lifetime: f32,
    pub target_point: Vec2,
    /// Followed by homing shots; re-resolved every tick
    pub target_entity: Option<Entity>,
    pub piercing: bool,
    pub hits: Vec<Entity>,
}

pub type ProjectileBundle = (Transform2d, ProjectileState);

#[allow(clippy::too_many_arguments)]
pub fn projectile_bundle(
    owner: Entity,
    faction: Faction,
    kind: TrajectoryKind,
    def: &AbilityDef,
    origin: Vec2,
    cast: PendingCast,
    damage: f32,
    config: &CombatConfig,
) -> ProjectileBundle {
    let params = PatternParams {
        gravity: config.projectile.arc_gravity,
        bounds: config.projectile.bounds(),
        ..def.pattern
    };
    let lifetime = if def.stats.duration > 0.0 {
        def.stats.duration
    } else {
        config.projectile.default_lifetime
    };
    let aim = cast.target_pos - origin;

    (
        Transform2d {
            position: origin,
            heading: aim.y.atan2(aim.x),
        },
        ProjectileState {
            owner,
            faction,
            ability: def.id.clone(),
            kind,
            pattern: PatternState::new(def.projectile_speed, params),
            velocity: Vec2::ZERO,
            damage,
            lifetime,
            target_point: cast.target_pos,
            target_entity: cast.target_entity.filter(|_| kind.tracks_target()),
            piercing: def.piercing,
            hits: Vec::new(),
        },
    )
}

/// Area hit queued by an ability, resolved in the next collision pass
#[derive(Debug, Clone, PartialEq)]
pub struct AreaStrike {
    pub owner: Entity,
    pub faction: Faction,
    pub center: Vec2,
    pub radius: f32,
    pub damage: f32,
    pub ability: String,
}

#[derive(Resource, Debug, Default)]
pub struct PendingStrikes(Vec<AreaStrike>);

impl PendingStrikes {
    pub fn push(&mut self, strike: AreaStrike) {
        self.0.push(strike);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn take(&mut self) -> Vec<AreaStrike> {
        std::mem::take(&mut self.0)
    }
}

/// Neutral shots hit everyone; otherwise factions never hurt their own
fn is_friendly(source: Faction, target: Option<Faction>) -> bool {
    source != Faction::Neutral && target == Some(source)
}

/// System: move projectiles along their pattern and expire them
pub fn integrate_projectiles(
    mut commands: Commands,
    time: Res<Time>,
    mut projectiles: Query<(Entity, &mut Transform2d, &mut ProjectileState)>,
    anchors: Query<&Transform2d, Without<ProjectileState>>,
) {
    let dt = time.delta_secs();

    for (entity, mut transform, mut shot) in &mut projectiles {
        if let Some(target) = shot.target_entity {
            if let Ok(anchor) = anchors.get(target) {
                shot.target_point = anchor.position;
            }
        }

        let shot = &mut *shot;
        let (next, velocity) = trajectory::integrate(
            shot.kind,
            &mut shot.pattern,
            transform.position,
            shot.target_point,
            dt,
        );
        if !next.is_finite() {
            commands.entity(entity).despawn();
            continue;
        }
        transform.position = next;
        if velocity != Vec2::ZERO {
            transform.heading = velocity.y.atan2(velocity.x);
        }
        shot.velocity = velocity;

        decay_timer(&mut shot.lifetime, dt);
        if shot.lifetime <= 0.0 {
            commands.entity(entity).despawn();
        }
    }
}

struct Body {
    entity: Entity,
    position: Vec2,
    faction: Option<Faction>,
    armor: f32,
    profile: DamageProfile,
    /// Mid-dodge: shots and blasts pass through
    evading: bool,
}

/// System: projectile and area-strike hits against Health-bearing entities.
/// A dodging body lets a shot through once; that shot never hits it later.
#[allow(clippy::too_many_arguments)]
pub fn resolve_collisions(
    mut commands: Commands,
    config: Res<CombatConfig>,
    mut strikes: ResMut<PendingStrikes>,
    mut projectiles: Query<(Entity, &Transform2d, &mut ProjectileState)>,
    mut bodies: ParamSet<(
        Query<
            (
                Entity,
                &Transform2d,
                Option<&Faction>,
                Option<&Defense>,
                DamageSources,
                Option<&Evasion>,
            ),
            (With<Health>, Without<ProjectileState>),
        >,
        Query<&mut Health>,
    )>,
    mut hits: EventWriter<DamageDealt>,
    mut avoided: EventWriter<AttackAvoided>,
) {
    let hit_radius = config.projectile.hit_radius;

    let mut targets: Vec<Body> = bodies
        .p0()
        .iter()
        .map(|(entity, transform, faction, defense, sources, evasion)| Body {
            entity,
            position: transform.position,
            faction: faction.copied(),
            armor: defense.map_or(0.0, |d| d.armor),
            profile: DamageProfile::from_sources(sources, &config),
            evading: evasion.is_some_and(Evasion::is_invulnerable),
        })
        .collect();
    targets.sort_by_key(|b| b.entity);

    let mut order: Vec<Entity> = projectiles.iter().map(|(e, ..)| e).collect();
    order.sort();

    for entity in order {
        let Ok((_, transform, mut shot)) = projectiles.get_mut(entity) else {
            continue;
        };
        let position = transform.position;

        let mut in_reach: Vec<(f32, Entity, f32, f32)> = Vec::new();
        for body in &targets {
            if body.entity == shot.owner
                || is_friendly(shot.faction, body.faction)
                || shot.hits.contains(&body.entity)
            {
                continue;
            }
            let distance = position.distance(body.position);
            if distance > hit_radius {
                continue;
            }
            if body.evading {
                shot.hits.push(body.entity);
                avoided.send(AttackAvoided {
                    attacker: shot.owner,
                    defender: body.entity,
                    kind: HitKind::Projectile,
                    how: Avoidance::Dodged,
                });
                continue;
            }
            in_reach.push((distance, body.entity, body.armor, body.profile.defense));
        }
        in_reach.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut health = bodies.p1();
        for (_, target, armor, defense) in in_reach {
            let Ok(mut hp) = health.get_mut(target) else {
                continue;
            };
            if !hp.is_alive() {
                continue;
            }
            let amount = resolve_hit(shot.damage, 1.0, armor, defense);
            let dealt = hp.take_damage(amount, Some(shot.owner));
            hits.send(DamageDealt {
                target,
                source: shot.owner,
                amount: dealt,
                kind: HitKind::Projectile,
            });
            tracing::debug!(projectile = ?entity, target = ?target, dealt, ability = %shot.ability, "projectile hit");

            shot.hits.push(target);
            if !shot.piercing {
                commands.entity(entity).despawn();
                break;
            }
        }
    }

    for strike in strikes.take() {
        let mut health = bodies.p1();
        for body in &targets {
            if body.entity == strike.owner || is_friendly(strike.faction, body.faction) {
                continue;
            }
            if body.position.distance(strike.center) > strike.radius {
                continue;
            }
            if body.evading {
                avoided.send(AttackAvoided {
                    attacker: strike.owner,
                    defender: body.entity,
                    kind: HitKind::Area,
                    how: Avoidance::Dodged,
                });
                continue;
            }
            let Ok(mut hp) = health.get_mut(body.entity) else {
                continue;
            };
            if !hp.is_alive() {
                continue;
            }
            let amount = resolve_hit(strike.damage, 1.0, body.armor, body.profile.defense);
            let dealt = hp.take_damage(amount, Some(strike.owner));
            hits.send(DamageDealt {
                target: body.entity,
                source: strike.owner,
                amount: dealt,
                kind: HitKind::Area,
            });
        }
        tracing::debug!(owner = ?strike.owner, ability = %strike.ability, "area strike resolved");
    }
}
