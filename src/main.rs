//! Headless demo driver.
//!
//! `nightfall-sim [demo|sweep|replay] [config path]`
//!
//! - `demo`: a hero against a wolf pack and a boss, logging every tick
//! - `sweep`: Monte-Carlo balance sweep across the enemy archetypes
//! - `replay`: record a short fight, then replay it and check the digest

use std::path::Path;

use anyhow::{bail, Context, Result};
use bevy::prelude::*;

use nightfall_core::balance::{run_sweep, SweepConfig};
use nightfall_core::constants::DEFAULT_TICK_DT;
use nightfall_core::hotreload::ConfigWatcher;
use nightfall_core::logging::{init_tracing, LogLevel, TracingConfig};
use nightfall_core::replay::{verify, Recorder};
use nightfall_core::{Archetype, CombatConfig, CombatSim, SpawnSpec};

const DEFAULT_CONFIG_PATH: &str = "config/combat.ron";
const DEMO_TICKS: u32 = 300;

fn main() -> Result<()> {
    let mut tracing_config = TracingConfig::default();
    if let Some(level) = std::env::var("NIGHTFALL_LOG")
        .ok()
        .and_then(|v| LogLevel::parse(&v))
    {
        tracing_config.default_level = level;
    }
    init_tracing(&tracing_config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = args.first().map(String::as_str).unwrap_or("demo");
    let config_path = args.get(1).map(String::as_str).unwrap_or(DEFAULT_CONFIG_PATH);
    let config = load_config(config_path)?;

    match mode {
        "demo" => run_demo(config, config_path),
        "sweep" => run_balance(config),
        "replay" => run_replay(config),
        other => bail!("unknown mode '{}', expected demo, sweep or replay", other),
    }
}

fn load_config(path: &str) -> Result<CombatConfig> {
    if Path::new(path).exists() {
        CombatConfig::load(path).with_context(|| format!("loading {}", path))
    } else {
        tracing::warn!("{} not found, using built-in defaults", path);
        Ok(CombatConfig::default())
    }
}

fn run_demo(config: CombatConfig, config_path: &str) -> Result<()> {
    let mut sim = CombatSim::new(config)?;
    let mut watcher = if Path::new(config_path).exists() {
        Some(ConfigWatcher::watch(config_path)?)
    } else {
        None
    };

    sim.subscribe_deaths(|died: &nightfall_core::EntityDied| {
        tracing::info!(
            "{:?} {:?} fell at {:?}",
            died.archetype, died.entity, died.position
        );
    });

    let hero = sim.spawn(Archetype::Hero, Vec2::new(640.0, 360.0))?;
    let alpha = sim.spawn(Archetype::Alpha, Vec2::new(652.0, 360.0))?;
    let mut pack = vec![alpha];
    for offset in [Vec2::new(14.0, 2.0), Vec2::new(14.0, -2.0), Vec2::new(16.0, 0.0)] {
        pack.push(sim.spawn(Archetype::Basic, Vec2::new(640.0, 360.0) + offset)?);
    }
    let boss = sim.spawn(Archetype::Boss, Vec2::new(700.0, 360.0))?;

    for enemy in pack.iter().chain(std::iter::once(&boss)) {
        sim.set_target(*enemy, Some(hero));
    }
    sim.set_target(hero, Some(boss));

    for _ in 0..DEMO_TICKS {
        if let Some(watcher) = watcher.as_mut() {
            watcher.apply_to(&mut sim);
        }
        if !sim.is_live(hero) {
            tracing::info!("hero fell, demo over");
            break;
        }

        let slots = sim.query_state(hero).map_or(0, |s| s.abilities.len());
        if let Some(boss_pos) = sim.query_state(boss).map(|s| s.position) {
            for slot in 0..slots {
                if sim.can_use(hero, slot) && sim.use_ability(hero, slot, boss_pos).is_ok() {
                    break;
                }
            }
        }

        let report = sim.tick(DEFAULT_TICK_DT);
        if report.damage_to(hero) > 0.0 && sim.parry(hero).is_ok() {
            tracing::debug!("hero raised a parry");
        }
        for avoided in &report.avoided {
            tracing::info!(
                "{:?} avoided {:?} from {:?} ({:?})",
                avoided.defender, avoided.kind, avoided.attacker, avoided.how
            );
        }
        for change in &report.tier_changes {
            tracing::info!(
                "{:?}: {:?} -> {:?} ({:?})",
                change.entity, change.from, change.to, change.cause
            );
        }
        for phase in &report.phase_transitions {
            tracing::info!(
                "boss {:?} entered {:?}, unlocked {:?}",
                phase.boss, phase.to, phase.unlocked
            );
        }
    }

    let snapshot = sim.snapshot();
    tracing::info!(
        "demo finished after {} ticks, {} entities left, digest {:016x}",
        snapshot.tick,
        snapshot.entities.len(),
        snapshot.digest()
    );
    Ok(())
}

fn run_balance(config: CombatConfig) -> Result<()> {
    let archetypes = [
        Archetype::Basic,
        Archetype::Ranged,
        Archetype::Alpha,
        Archetype::Nimble,
        Archetype::Brute,
    ];
    let report = run_sweep(&config, &SweepConfig::default(), &archetypes)?;
    for summary in &report.summaries {
        tracing::info!(
            "{:?}: hero wins {:.0}%, {:.0} ticks, {:.0}% health left",
            summary.archetype,
            summary.hero_win_rate * 100.0,
            summary.avg_ticks,
            summary.avg_hero_health * 100.0
        );
    }
    tracing::info!("balance grade: {:?}", report.grade);
    Ok(())
}

fn run_replay(config: CombatConfig) -> Result<()> {
    let hero_spec = config
        .archetype(Archetype::Hero)
        .map(|spec| SpawnSpec::from_archetype(spec, Vec2::new(100.0, 100.0)))
        .context("config has no Hero archetype")?;
    let grunt_spec = config
        .archetype(Archetype::Basic)
        .map(|spec| SpawnSpec::from_archetype(spec, Vec2::new(101.5, 100.0)))
        .context("config has no Basic archetype")?;

    let mut recorder = Recorder::new(config)?;
    let hero = recorder.spawn(hero_spec)?;
    let grunt = recorder.spawn(grunt_spec)?;
    recorder.set_target(hero, Some(grunt));
    recorder.set_target(grunt, Some(hero));
    for _ in 0..100 {
        recorder.tick(DEFAULT_TICK_DT);
    }
    let log = recorder.finish();

    let digest = verify(&log)?;
    tracing::info!("replay verified: {} inputs, digest {:016x}", log.inputs.len(), digest);
    Ok(())
}
