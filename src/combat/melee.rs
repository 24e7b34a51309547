//! Melee exchange (tick step 2).

use bevy::prelude::*;

use super::damage::{resolve_hit, DamageProfile, DamageSources};
use super::evasion::Evasion;
use crate::config::CombatConfig;
use crate::events::{AttackAvoided, Avoidance, DamageDealt, HitKind};
use crate::psychology::PsychologyState;
use crate::store::{Attack, CombatTarget, Defense, Health, Stunned, Transform2d};

/// System: every ready attacker with a living target in range strikes once.
///
/// Attackers resolve in entity order so a kill earlier in the pass stops the
/// victim from swinging back in the same tick. A swing into a dodge or an open
/// parry still spends the attacker's cooldown; a parried attacker is staggered.
#[allow(clippy::too_many_arguments)]
pub fn resolve_melee(
    mut commands: Commands,
    config: Res<CombatConfig>,
    mut attackers: Query<
        (
            Entity,
            &mut Attack,
            &Transform2d,
            &CombatTarget,
            Option<&PsychologyState>,
        ),
        Without<Stunned>,
    >,
    defenders: Query<(&Transform2d, Option<&Defense>)>,
    mut bodies: ParamSet<(Query<DamageSources>, Query<&mut Health>)>,
    mut evaders: Query<&mut Evasion>,
    mut hits: EventWriter<DamageDealt>,
    mut avoided: EventWriter<AttackAvoided>,
) {
    let mut order: Vec<Entity> = attackers.iter().map(|(e, ..)| e).collect();
    order.sort();

    for attacker in order {
        let Ok((_, mut attack, transform, target, psych)) = attackers.get_mut(attacker) else {
            continue;
        };
        if !attack.is_ready() {
            continue;
        }
        if psych.is_some_and(|p| p.tier.suppresses_attacks()) {
            continue;
        }
        let Some(target) = target.0.filter(|t| *t != attacker) else {
            continue;
        };
        let Ok((target_transform, defense)) = defenders.get(target) else {
            continue;
        };
        if transform.position.distance(target_transform.position) > attack.range {
            continue;
        }

        let attacker_alive = bodies.p1().get(attacker).map_or(true, |h| h.is_alive());
        let target_alive = bodies.p1().get(target).is_ok_and(|h| h.is_alive());
        if !attacker_alive || !target_alive {
            continue;
        }

        if let Ok(mut guard) = evaders.get_mut(target) {
            let ev = &config.evasion;
            let how = if guard.is_invulnerable() {
                Some(Avoidance::Dodged)
            } else {
                guard.parry_outcome(ev.perfect_window)
            };
            if let Some(how) = how {
                attack.reset_cooldown();
                let stagger = match how {
                    Avoidance::Dodged => 0.0,
                    Avoidance::Parried => ev.stagger,
                    Avoidance::PerfectParry => {
                        guard.reward_perfect_parry(ev.parry_stamina);
                        ev.perfect_stagger
                    }
                };
                if stagger > 0.0 {
                    commands
                        .entity(attacker)
                        .insert(Stunned { remaining: stagger });
                }
                avoided.send(AttackAvoided {
                    attacker,
                    defender: target,
                    kind: HitKind::Melee,
                    how,
                });
                tracing::debug!(attacker = ?attacker, target = ?target, ?how, "melee avoided");
                continue;
            }
        }

        let (outgoing, incoming) = {
            let sources = bodies.p0();
            let profile = |e: Entity| {
                sources
                    .get(e)
                    .map(|s| DamageProfile::from_sources(s, &config))
                    .unwrap_or_default()
            };
            (profile(attacker).outgoing, profile(target).defense)
        };
        let amount = resolve_hit(
            attack.damage,
            outgoing,
            defense.map_or(0.0, |d| d.armor),
            incoming,
        );
        attack.reset_cooldown();

        let mut health = bodies.p1();
        if let Ok(mut hp) = health.get_mut(target) {
            let dealt = hp.take_damage(amount, Some(attacker));
            hits.send(DamageDealt {
                target,
                source: attacker,
                amount: dealt,
                kind: HitKind::Melee,
            });
            tracing::debug!(attacker = ?attacker, target = ?target, dealt, remaining = hp.current, "melee hit");
        }
    }
}
