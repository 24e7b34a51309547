//! Property-based tests using proptest
//!
//! Invariants that must hold for ALL inputs:
//! - Damage: any finite hit resolves to a finite, non-negative amount
//! - Timers: never negative, never increase
//! - Boss phases: only advance, whatever the health sequence
//! - Psychology: a rally never makes an enemy more afraid
//! - Trajectories: speed-bound patterns keep their speed
//! - Sim: health stays within [0, max] through any tick sequence
//! - Sim: cooldowns only rise on a successful cast or swing
//! - Sim: psychology durations count down and expire one rung at a time
//! - Sim: same seed and inputs give the same digest every tick

use bevy::prelude::*;
use proptest::prelude::*;

use nightfall_core::boss::{BossPhase, PhaseId};
use nightfall_core::abilities::AbilityCatalog;
use nightfall_core::combat::damage::resolve_hit;
use nightfall_core::config::{BehaviorConfig, PsychologyConfig};
use nightfall_core::constants::BOSS_PHASE_THRESHOLDS;
use nightfall_core::psychology::behavior::{choose, Situation};
use nightfall_core::psychology::{power_verdict, PsychologyState};
use nightfall_core::store::{decay_timer, Attack, Health};
use nightfall_core::trajectory::{compute_velocity, PatternParams, PatternState, TrajectoryKind};
use nightfall_core::{
    Archetype, Behavior, CombatConfig, CombatSim, Faction, PsychTier, PsychologyTraits, SpawnSpec,
};

fn point() -> impl Strategy<Value = Vec2> {
    (-500.0f32..500.0, -500.0f32..500.0).prop_map(|(x, y)| Vec2::new(x, y))
}

// ============================================================
// Damage & timers
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_hit_is_finite_and_non_negative(
        raw in 0.0f32..10_000.0,
        outgoing in 0.1f32..5.0,
        armor in 0.0f32..500.0,
        defense in prop_oneof![Just(0.0f32), Just(-1.0f32), 0.1f32..5.0],
    ) {
        let amount = resolve_hit(raw, outgoing, armor, defense);
        prop_assert!(amount.is_finite());
        prop_assert!(amount >= 0.0);
    }

    #[test]
    fn prop_more_armor_never_hurts_more(
        raw in 0.0f32..1_000.0,
        armor in 0.0f32..100.0,
        extra in 0.0f32..100.0,
    ) {
        prop_assert!(resolve_hit(raw, 1.0, armor + extra, 1.0) <= resolve_hit(raw, 1.0, armor, 1.0));
    }

    #[test]
    fn prop_timer_never_negative(start in 0.0f32..100.0, steps in prop::collection::vec(0.0f32..2.0, 0..50)) {
        let mut remaining = start;
        for dt in steps {
            let before = remaining;
            decay_timer(&mut remaining, dt);
            prop_assert!(remaining >= 0.0);
            prop_assert!(remaining <= before);
        }
    }

    #[test]
    fn prop_health_stays_in_bounds(max in 1.0f32..1_000.0, hits in prop::collection::vec(-50.0f32..500.0, 0..30)) {
        let mut health = Health::new(max);
        for amount in hits {
            health.take_damage(amount, None);
            prop_assert!(health.current >= 0.0 && health.current <= health.max);
        }
    }
}

// ============================================================
// Boss phases
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_phase_never_regresses(ratios in prop::collection::vec(0.0f32..=1.0, 1..40)) {
        let mut boss = BossPhase::new(&BOSS_PHASE_THRESHOLDS);
        let mut last = boss.phase;
        for ratio in ratios {
            if let Some((from, to)) = boss.advance(ratio) {
                prop_assert_eq!(from, last);
                prop_assert!(to > from);
            }
            prop_assert!(boss.phase >= last);
            last = boss.phase;
        }
    }

    #[test]
    fn prop_lower_health_never_earlier_phase(a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            PhaseId::for_ratio(low, &BOSS_PHASE_THRESHOLDS)
                >= PhaseId::for_ratio(high, &BOSS_PHASE_THRESHOLDS)
        );
    }
}

// ============================================================
// Psychology & behavior
// ============================================================

fn traits() -> impl Strategy<Value = PsychologyTraits> {
    (0.5f32..=1.5, 0.5f32..=1.5, 0.5f32..=1.5, 0.5f32..=1.5, 0.5f32..=1.5)
        .prop_map(|(b, a, i, p, d)| PsychologyTraits::new(b, a, i, p, d))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_rally_never_adds_fear(ratio in 0.0f32..20.0, traits in traits()) {
        let cfg = PsychologyConfig::default();
        let rung = |v: Option<nightfall_core::PsychTier>| v.map_or(0, |t| t.rung());
        let alone = rung(power_verdict(ratio, &traits, &cfg, false));
        let rallied = rung(power_verdict(ratio, &traits, &cfg, true));
        prop_assert!(rallied <= alone);
        if alone > 0 {
            prop_assert_eq!(rallied, alone - 1);
        }
    }

    #[test]
    fn prop_clamped_traits_in_range(
        b in -10.0f32..10.0,
        a in -10.0f32..10.0,
        i in -10.0f32..10.0,
        p in -10.0f32..10.0,
        d in -10.0f32..10.0,
    ) {
        let t = PsychologyTraits::new(b, a, i, p, d).clamped();
        for v in [t.bravery, t.aggression, t.intelligence, t.pack_mentality, t.dominance] {
            prop_assert!((0.5..=1.5).contains(&v));
        }
    }

    #[test]
    fn prop_wounded_enemy_defends(
        health in 0.0f32..0.29,
        distance in prop::option::of(0.0f32..50.0),
        roll in 0.0f32..1.0,
    ) {
        let situation = Situation {
            health_ratio: health,
            distance,
            attack_ready: true,
            intelligence: 1.0,
        };
        prop_assert_eq!(choose(&BehaviorConfig::default(), &situation, roll), Behavior::Defend);
    }

    #[test]
    fn prop_far_enemy_idles(distance in 10.0f32..1_000.0, roll in 0.0f32..1.0) {
        let situation = Situation {
            health_ratio: 1.0,
            distance: Some(distance),
            attack_ready: true,
            intelligence: 1.5,
        };
        prop_assert_eq!(choose(&BehaviorConfig::default(), &situation, roll), Behavior::Idle);
    }
}

// ============================================================
// Trajectories
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_linear_and_homing_keep_speed(
        from in point(),
        to in point(),
        speed in 1.0f32..100.0,
    ) {
        prop_assume!(from.distance(to) > 1e-2);
        for kind in [TrajectoryKind::Linear, TrajectoryKind::Homing] {
            let mut state = PatternState::new(speed, PatternParams::default());
            let v = compute_velocity(kind, &mut state, from, to, 0.1);
            prop_assert!((v.length() - speed).abs() < speed * 1e-3);
        }
    }

    #[test]
    fn prop_every_pattern_is_finite(
        from in point(),
        to in point(),
        speed in 0.0f32..100.0,
        dt in 0.0f32..0.5,
    ) {
        for kind in TrajectoryKind::ALL {
            let mut state = PatternState::new(speed, PatternParams::default());
            let mut position = from;
            for _ in 0..20 {
                let v = compute_velocity(kind, &mut state, position, to, dt);
                prop_assert!(v.is_finite(), "{:?} produced {:?}", kind, v);
                position += v * dt;
            }
        }
    }

    #[test]
    fn prop_bouncing_never_gains_speed(from in point(), to in point(), speed in 1.0f32..100.0) {
        prop_assume!(from.distance(to) > 1e-2);
        let mut state = PatternState::new(speed, PatternParams::default());
        let mut position = from;
        let mut last = f32::INFINITY;
        for _ in 0..200 {
            let v = compute_velocity(TrajectoryKind::Bouncing, &mut state, position, to, 0.1);
            prop_assert!(v.length() <= last + 1e-3);
            last = v.length();
            position += v * 0.1;
        }
    }
}

// ============================================================
// Whole simulation
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_sim_health_invariant(
        seed in any::<u64>(),
        dts in prop::collection::vec(0.0f32..0.5, 1..40),
    ) {
        let config = CombatConfig { seed, ..Default::default() };
        let mut sim = CombatSim::new(config).unwrap();
        let hero = sim
            .spawn_with(
                &SpawnSpec::new(Vec2::new(100.0, 100.0))
                    .faction(Faction::Player)
                    .health(100.0)
                    .attack(30.0, 2.0, 2.0)
                    .level(3),
            )
            .unwrap();
        let mut enemies = Vec::new();
        for x in [101.0, 99.0, 100.5] {
            let e = sim
                .spawn_with(
                    &SpawnSpec::new(Vec2::new(x, 100.0))
                        .faction(Faction::Hostile)
                        .health(40.0)
                        .attack(8.0, 2.0, 1.0)
                        .level(2)
                        .traits(PsychologyTraits::default()),
                )
                .unwrap();
            sim.set_target(e, Some(hero));
            enemies.push(e);
        }
        sim.set_target(hero, Some(enemies[0]));

        for dt in dts {
            sim.tick(dt);
            for snap in &sim.snapshot().entities {
                if let Some((current, max)) = snap.health {
                    prop_assert!(current > 0.0 && current <= max);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Input {
    Tick(f32),
    Cast(usize),
}

fn inputs() -> impl Strategy<Value = Vec<Input>> {
    prop::collection::vec(
        prop_oneof![
            3 => (0.0f32..0.5).prop_map(Input::Tick),
            1 => (0usize..3).prop_map(Input::Cast),
        ],
        1..60,
    )
}

fn duel() -> (CombatSim, Entity, Entity) {
    let mut sim = CombatSim::with_defaults();
    let hero = sim
        .spawn_with(
            &SpawnSpec::new(Vec2::new(100.0, 100.0))
                .faction(Faction::Player)
                .health(10_000.0)
                .attack(20.0, 2.0, 2.0)
                .mana(100.0, 5.0)
                .ability("fireball")
                .ability("mortar")
                .ability("seeker"),
        )
        .unwrap();
    let foe = sim
        .spawn_with(
            &SpawnSpec::new(Vec2::new(101.0, 100.0))
                .faction(Faction::Hostile)
                .health(10_000.0)
                .attack(5.0, 2.0, 1.0)
                .traits(PsychologyTraits::default()),
        )
        .unwrap();
    sim.set_target(hero, Some(foe));
    sim.set_target(foe, Some(hero));
    (sim, hero, foe)
}

fn skirmish(seed: u64) -> CombatSim {
    let mut sim = CombatSim::new(CombatConfig { seed, ..Default::default() }).unwrap();
    let hero = sim.spawn(Archetype::Hero, Vec2::new(640.0, 360.0)).unwrap();
    let mut pack = vec![sim.spawn(Archetype::Alpha, Vec2::new(646.0, 360.0)).unwrap()];
    for offset in [Vec2::new(1.0, 0.5), Vec2::new(-1.0, 0.5), Vec2::new(0.0, -8.0)] {
        pack.push(sim.spawn(Archetype::Basic, Vec2::new(640.0, 360.0) + offset).unwrap());
    }
    for e in &pack {
        sim.set_target(*e, Some(hero));
    }
    sim.set_target(hero, Some(pack[1]));
    sim
}

fn start_tier() -> impl Strategy<Value = PsychTier> {
    prop_oneof![
        Just(PsychTier::Hesitant),
        Just(PsychTier::Fearful),
        Just(PsychTier::Terrified),
        Just(PsychTier::Subservient),
        Just(PsychTier::Empowered),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_cooldowns_rise_only_on_success(inputs in inputs()) {
        let (mut sim, hero, foe) = duel();
        let swing = 1.0 / 2.0;

        for input in inputs {
            let before = sim.query_state(hero).unwrap().abilities;
            let attack_before = sim.world().get::<Attack>(hero).unwrap().cooldown;
            match input {
                Input::Tick(dt) => {
                    sim.tick(dt);
                    let after = sim.query_state(hero).unwrap().abilities;
                    for (b, a) in before.iter().zip(&after) {
                        prop_assert!(a.cooldown_remaining <= b.cooldown_remaining);
                    }
                    let attack_after = sim.world().get::<Attack>(hero).unwrap().cooldown;
                    prop_assert!(attack_after <= attack_before || attack_after == swing);
                }
                Input::Cast(slot) => {
                    let aim = sim.query_state(foe).unwrap().position;
                    let result = sim.use_ability(hero, slot, aim);
                    let after = sim.query_state(hero).unwrap().abilities;
                    for (i, (b, a)) in before.iter().zip(&after).enumerate() {
                        if i == slot && result.is_ok() {
                            let full = sim
                                .world()
                                .resource::<AbilityCatalog>()
                                .get(&a.id)
                                .unwrap()
                                .cooldown;
                            prop_assert_eq!(a.cooldown_remaining, full);
                        } else {
                            prop_assert_eq!(a.cooldown_remaining, b.cooldown_remaining);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn prop_psychology_decays_one_rung_at_a_time(
        tier in start_tier(),
        duration in 0.05f32..2.0,
        dts in prop::collection::vec(0.01f32..0.5, 1..60),
    ) {
        let mut sim = CombatSim::with_defaults();
        let e = sim
            .spawn_with(&SpawnSpec::new(Vec2::ZERO).traits(PsychologyTraits::default()))
            .unwrap();
        {
            let mut state = sim.world_mut().get_mut::<PsychologyState>(e).unwrap();
            state.tier = tier;
            state.state_duration = duration;
        }

        for dt in dts {
            let (tier, remaining) = {
                let s = sim.world().get::<PsychologyState>(e).unwrap();
                (s.tier, s.state_duration)
            };
            sim.tick(dt);
            let now = sim.world().get::<PsychologyState>(e).unwrap();
            if now.tier == tier {
                if remaining > 0.0 {
                    prop_assert!(now.state_duration < remaining);
                }
            } else {
                prop_assert_eq!(now.tier, tier.toward_normal());
                prop_assert!(remaining <= dt + 1e-3);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_same_seed_same_digests(seed in any::<u64>(), dts in prop::collection::vec(0.0f32..0.3, 1..30)) {
        let mut a = skirmish(seed);
        let mut b = skirmish(seed);
        for dt in dts {
            a.tick(dt);
            b.tick(dt);
            prop_assert_eq!(a.snapshot().digest(), b.snapshot().digest());
        }
    }
}
