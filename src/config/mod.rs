//! Combat configuration.
//!
//! Every lookup table the simulation consults (tier multipliers, thresholds,
//! spawn stats per archetype) is immutable data injected at startup as a bevy
//! resource. `config/combat.ron` mirrors `CombatConfig::default()`.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::*;
use crate::psychology::{PsychTier, PsychologyTraits};
use crate::store::{Archetype, Faction};
use crate::trajectory::Bounds;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// (damage, defense, speed) multipliers carried by a psychology tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierModifiers {
    pub damage: f32,
    pub defense: f32,
    pub speed: f32,
}

impl TierModifiers {
    pub const NEUTRAL: Self = Self {
        damage: 1.0,
        defense: 1.0,
        speed: 1.0,
    };

    pub const fn new(damage: f32, defense: f32, speed: f32) -> Self {
        Self {
            damage,
            defense,
            speed,
        }
    }

    fn is_valid(&self) -> bool {
        [self.damage, self.defense, self.speed]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }
}

impl Default for TierModifiers {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierTable {
    pub normal: TierModifiers,
    pub hesitant: TierModifiers,
    pub fearful: TierModifiers,
    pub terrified: TierModifiers,
    pub subservient: TierModifiers,
    pub empowered: TierModifiers,
}

impl TierTable {
    pub fn get(&self, tier: PsychTier) -> TierModifiers {
        match tier {
            PsychTier::Normal => self.normal,
            PsychTier::Hesitant => self.hesitant,
            PsychTier::Fearful => self.fearful,
            PsychTier::Terrified => self.terrified,
            PsychTier::Subservient => self.subservient,
            PsychTier::Empowered => self.empowered,
        }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            normal: TierModifiers::NEUTRAL,
            hesitant: TierModifiers::new(1.0, 0.95, 1.1),
            fearful: TierModifiers::new(0.8, 0.8, 1.3),
            terrified: TierModifiers::new(0.5, 0.7, 1.5),
            subservient: TierModifiers::new(0.8, 1.0, 1.0),
            empowered: TierModifiers::new(1.5, 1.2, 1.1),
        }
    }
}

/// Power-ratio thresholds for the fear rungs, before bravery scaling
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FearThresholds {
    pub hesitant: f32,
    pub fearful: f32,
    pub terrified: f32,
    pub subservient: f32,
}

impl FearThresholds {
    pub fn scaled(&self, bravery: f32) -> Self {
        Self {
            hesitant: self.hesitant * bravery,
            fearful: self.fearful * bravery,
            terrified: self.terrified * bravery,
            subservient: self.subservient * bravery,
        }
    }

    /// Most fearful tier whose threshold `ratio` reaches, NORMAL if none
    pub fn tier_for(&self, ratio: f32) -> PsychTier {
        if ratio >= self.subservient {
            PsychTier::Subservient
        } else if ratio >= self.terrified {
            PsychTier::Terrified
        } else if ratio >= self.fearful {
            PsychTier::Fearful
        } else if ratio >= self.hesitant {
            PsychTier::Hesitant
        } else {
            PsychTier::Normal
        }
    }
}

impl Default for FearThresholds {
    fn default() -> Self {
        Self {
            hesitant: HESITANT_THRESHOLD,
            fearful: FEARFUL_THRESHOLD,
            terrified: TERRIFIED_THRESHOLD,
            subservient: SUBSERVIENT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PsychologyConfig {
    pub thresholds: FearThresholds,
    pub empowered_ratio: f32,
    pub awareness_radius: f32,
    pub fog_threshold: f32,
    /// Extra damage multiplier per unit of fog while above the threshold
    pub fog_damage_scale: f32,
    /// Extra defense multiplier per unit of fog while above the threshold
    pub fog_defense_scale: f32,
    pub duration_min: f32,
    pub duration_max: f32,
    pub desperation_health: f32,
    /// 1.0 keeps the SUBSERVIENT rung deterministic
    pub subservience_chance: f32,
    pub grudge: GrudgeConfig,
    pub pack: PackStrengthConfig,
}

impl Default for PsychologyConfig {
    fn default() -> Self {
        Self {
            thresholds: FearThresholds::default(),
            empowered_ratio: EMPOWERED_RATIO,
            awareness_radius: AWARENESS_RADIUS,
            fog_threshold: FOG_THRESHOLD,
            fog_damage_scale: 0.5,
            fog_defense_scale: 0.25,
            duration_min: STATE_DURATION_MIN,
            duration_max: STATE_DURATION_MAX,
            desperation_health: DESPERATION_HEALTH,
            subservience_chance: SUBSERVIENCE_CHANCE,
            grudge: GrudgeConfig::default(),
            pack: PackStrengthConfig::default(),
        }
    }
}

/// Memory of fallen allies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrudgeConfig {
    pub per_ally_death: f32,
    pub power_scale: f32,
    pub damage_floor: f32,
    pub damage_scale: f32,
}

impl Default for GrudgeConfig {
    fn default() -> Self {
        Self {
            per_ally_death: GRUDGE_PER_ALLY_DEATH,
            power_scale: GRUDGE_POWER_SCALE,
            damage_floor: GRUDGE_DAMAGE_FLOOR,
            damage_scale: GRUDGE_DAMAGE_SCALE,
        }
    }
}

/// Courage drawn from nearby same-faction allies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackStrengthConfig {
    pub radius: f32,
    pub per_ally: f32,
    pub cap: f32,
    pub alpha_bonus: f32,
}

impl Default for PackStrengthConfig {
    fn default() -> Self {
        Self {
            radius: PACK_RADIUS,
            per_ally: PACK_BONUS_PER_ALLY,
            cap: PACK_BONUS_CAP,
            alpha_bonus: PACK_ALPHA_BONUS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub attack_distance: f32,
    pub pursue_distance: f32,
    pub pursue_weight: f32,
    pub defend_health: f32,
    pub duration_min: f32,
    pub duration_max: f32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            attack_distance: ATTACK_DISTANCE,
            pursue_distance: PURSUE_DISTANCE,
            pursue_weight: PURSUE_WEIGHT,
            defend_health: DEFEND_HEALTH,
            duration_min: BEHAVIOR_DURATION_MIN,
            duration_max: BEHAVIOR_DURATION_MAX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RallyConfig {
    pub radius: f32,
    pub duration: f32,
    pub interval: f32,
    pub urgent_factor: f32,
    /// An alpha that is FEARFUL or worse holds its rally
    pub require_calm: bool,
}

impl Default for RallyConfig {
    fn default() -> Self {
        Self {
            radius: RALLY_RADIUS,
            duration: RALLY_DURATION,
            interval: RALLY_INTERVAL,
            urgent_factor: RALLY_URGENT_FACTOR,
            require_calm: true,
        }
    }
}

/// Dodge and parry tuning. Stamina pools are per entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvasionConfig {
    pub dodge_cooldown: f32,
    pub dodge_iframes: f32,
    pub dodge_distance: f32,
    pub dodge_stamina: f32,
    pub parry_window: f32,
    pub perfect_window: f32,
    pub parry_cooldown: f32,
    pub parry_stamina: f32,
    /// Stun on an attacker whose swing was parried
    pub stagger: f32,
    pub perfect_stagger: f32,
}

impl Default for EvasionConfig {
    fn default() -> Self {
        Self {
            dodge_cooldown: DODGE_COOLDOWN,
            dodge_iframes: DODGE_IFRAMES,
            dodge_distance: DODGE_DISTANCE,
            dodge_stamina: DODGE_STAMINA,
            parry_window: PARRY_WINDOW,
            perfect_window: PERFECT_PARRY_WINDOW,
            parry_cooldown: PARRY_COOLDOWN,
            parry_stamina: PARRY_STAMINA,
            stagger: PARRY_STAGGER,
            perfect_stagger: PERFECT_PARRY_STAGGER,
        }
    }
}

/// Multipliers layered on a boss while it sits in a phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseModifiers {
    pub damage: f32,
    pub defense: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BossConfig {
    /// Health ratios entering PHASE_2, PHASE_3, FINAL (strictly decreasing)
    pub thresholds: Vec<f32>,
    /// One entry per phase, PHASE_1 first
    pub phases: Vec<PhaseModifiers>,
}

impl Default for BossConfig {
    fn default() -> Self {
        Self {
            thresholds: BOSS_PHASE_THRESHOLDS.to_vec(),
            phases: vec![
                PhaseModifiers {
                    damage: 1.0,
                    defense: 1.0,
                },
                PhaseModifiers {
                    damage: 1.2,
                    defense: 1.0,
                },
                PhaseModifiers {
                    damage: 1.5,
                    defense: 0.9,
                },
                PhaseModifiers {
                    damage: 2.0,
                    defense: 0.8,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    pub hit_radius: f32,
    pub arc_gravity: f32,
    pub default_lifetime: f32,
    pub bounds_min: (f32, f32),
    pub bounds_max: (f32, f32),
}

impl ProjectileConfig {
    pub fn bounds(&self) -> Bounds {
        Bounds {
            min: Vec2::new(self.bounds_min.0, self.bounds_min.1),
            max: Vec2::new(self.bounds_max.0, self.bounds_max.1),
        }
    }
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            hit_radius: DEFAULT_HIT_RADIUS,
            arc_gravity: DEFAULT_ARC_GRAVITY,
            default_lifetime: DEFAULT_PROJECTILE_LIFETIME,
            bounds_min: DEFAULT_BOUNDS_MIN,
            bounds_max: DEFAULT_BOUNDS_MAX,
        }
    }
}

/// Initial component values the factory stamps onto a new entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchetypeSpec {
    pub kind: Archetype,
    pub faction: Faction,
    pub health: f32,
    pub armor: f32,
    pub damage: f32,
    pub attack_range: f32,
    pub attack_speed: f32,
    pub level: u32,
    pub damage_multiplier: f32,
    pub mana: f32,
    pub mana_regen: f32,
    pub abilities: Vec<String>,
    /// `None` for entities without a psyche (the hero)
    pub traits: Option<PsychologyTraits>,
    pub boss: bool,
    /// Zero leaves the entity unable to dodge or parry
    #[serde(default)]
    pub stamina: f32,
    #[serde(default)]
    pub stamina_regen: f32,
}

impl ArchetypeSpec {
    #[allow(clippy::too_many_arguments)]
    fn melee(
        kind: Archetype,
        health: f32,
        armor: f32,
        damage: f32,
        attack_range: f32,
        attack_speed: f32,
        level: u32,
        traits: PsychologyTraits,
    ) -> Self {
        Self {
            kind,
            faction: Faction::Hostile,
            health,
            armor,
            damage,
            attack_range,
            attack_speed,
            level,
            damage_multiplier: 1.0,
            mana: 0.0,
            mana_regen: 0.0,
            abilities: Vec::new(),
            traits: Some(traits),
            boss: false,
            stamina: 0.0,
            stamina_regen: 0.0,
        }
    }
}

pub fn default_archetypes() -> Vec<ArchetypeSpec> {
    let hero = ArchetypeSpec {
        kind: Archetype::Hero,
        faction: Faction::Player,
        health: 200.0,
        armor: 5.0,
        damage: 25.0,
        attack_range: 2.0,
        attack_speed: 1.0,
        level: 5,
        damage_multiplier: 1.0,
        mana: 100.0,
        mana_regen: 5.0,
        abilities: [
            "fireball",
            "mortar",
            "seeker",
            "orbit_blade",
            "serpent",
            "tide",
            "vortex",
            "ricochet",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        traits: None,
        boss: false,
        stamina: 100.0,
        stamina_regen: 10.0,
    };

    let mut ranged = ArchetypeSpec::melee(
        Archetype::Ranged,
        40.0,
        1.0,
        15.0,
        8.0,
        0.5,
        2,
        PsychologyTraits::new(0.8, 1.0, 1.0, 1.0, 0.9),
    );
    ranged.mana = 40.0;
    ranged.mana_regen = 4.0;
    ranged.abilities = vec!["fireball".to_string()];

    let boss = ArchetypeSpec {
        kind: Archetype::Boss,
        faction: Faction::Hostile,
        health: 1000.0,
        armor: 10.0,
        damage: 30.0,
        attack_range: 3.0,
        attack_speed: 0.8,
        level: 10,
        damage_multiplier: 1.0,
        mana: 500.0,
        mana_regen: 20.0,
        abilities: ["ultimate_strike", "spirit_crush", "dark_nova", "final_judgment"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        traits: Some(PsychologyTraits::new(1.5, 1.2, 1.2, 1.0, 1.5)),
        boss: true,
        stamina: 0.0,
        stamina_regen: 0.0,
    };

    vec![
        hero,
        ArchetypeSpec::melee(
            Archetype::Basic,
            50.0,
            2.0,
            10.0,
            1.5,
            1.0,
            1,
            PsychologyTraits::default(),
        ),
        ranged,
        ArchetypeSpec::melee(
            Archetype::Alpha,
            80.0,
            4.0,
            15.0,
            1.8,
            1.0,
            3,
            PsychologyTraits::new(1.3, 1.1, 1.0, 1.2, 1.4),
        ),
        ArchetypeSpec::melee(
            Archetype::Nimble,
            35.0,
            0.0,
            8.0,
            1.5,
            2.0,
            2,
            PsychologyTraits::new(0.9, 1.1, 1.2, 1.0, 0.9),
        ),
        ArchetypeSpec::melee(
            Archetype::Brute,
            120.0,
            8.0,
            22.0,
            2.0,
            0.6,
            3,
            PsychologyTraits::new(1.2, 1.3, 0.7, 0.8, 1.1),
        ),
        boss,
    ]
}

/// Root combat configuration resource
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub seed: u64,
    pub tiers: TierTable,
    pub psychology: PsychologyConfig,
    pub behavior: BehaviorConfig,
    pub rally: RallyConfig,
    pub boss: BossConfig,
    pub projectile: ProjectileConfig,
    pub evasion: EvasionConfig,
    pub archetypes: Vec<ArchetypeSpec>,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tiers: TierTable::default(),
            psychology: PsychologyConfig::default(),
            behavior: BehaviorConfig::default(),
            rally: RallyConfig::default(),
            boss: BossConfig::default(),
            projectile: ProjectileConfig::default(),
            evasion: EvasionConfig::default(),
            archetypes: default_archetypes(),
        }
    }
}

impl CombatConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: CombatConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    pub fn to_ron(&self) -> String {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()).unwrap_or_default()
    }

    pub fn archetype(&self, kind: Archetype) -> Option<&ArchetypeSpec> {
        self.archetypes.iter().find(|a| a.kind == kind)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        let t = &self.psychology.thresholds;
        if !(0.0 < t.hesitant
            && t.hesitant < t.fearful
            && t.fearful < t.terrified
            && t.terrified < t.subservient)
        {
            return invalid(format!(
                "fear thresholds must be positive and strictly increasing: {:?}",
                t
            ));
        }
        let p = &self.psychology;
        if !(p.empowered_ratio > 0.0 && p.empowered_ratio < t.hesitant) {
            return invalid(format!(
                "empowered_ratio {} must lie in (0, hesitant)",
                p.empowered_ratio
            ));
        }
        if p.awareness_radius < 0.0 || p.desperation_health < 0.0 || p.desperation_health > 1.0 {
            return invalid("psychology radius/desperation out of range".into());
        }
        check_duration("psychology", p.duration_min, p.duration_max)?;
        if !(0.0..=1.0).contains(&p.subservience_chance) {
            return invalid(format!(
                "subservience_chance {} not in [0, 1]",
                p.subservience_chance
            ));
        }
        let g = &p.grudge;
        if g.per_ally_death < 0.0 || g.power_scale < 0.0 || g.damage_scale < 0.0 {
            return invalid("grudge scales must be non-negative".into());
        }
        let pk = &p.pack;
        if pk.radius < 0.0 || pk.per_ally < 0.0 || pk.cap < 0.0 || pk.alpha_bonus < 0.0 {
            return invalid("pack strength values must be non-negative".into());
        }

        for tier in PsychTier::ALL {
            if !self.tiers.get(tier).is_valid() {
                return invalid(format!("tier {:?} has a non-positive multiplier", tier));
            }
        }

        let b = &self.behavior;
        if !(0.0..=1.0).contains(&b.pursue_weight) {
            return invalid(format!("pursue_weight {} not in [0, 1]", b.pursue_weight));
        }
        if !(0.0 <= b.attack_distance && b.attack_distance <= b.pursue_distance) {
            return invalid("behavior distance bands overlap".into());
        }
        check_duration("behavior", b.duration_min, b.duration_max)?;

        let r = &self.rally;
        if r.radius < 0.0 || r.duration <= 0.0 || r.interval <= 0.0 || r.urgent_factor <= 0.0 {
            return invalid("rally radius/duration/interval must be positive".into());
        }

        let boss = &self.boss;
        if boss.thresholds.len() != 3 || boss.phases.len() != 4 {
            return invalid("boss needs 3 thresholds and 4 phases".into());
        }
        let decreasing = boss.thresholds.windows(2).all(|w| w[0] > w[1]);
        let in_range = boss.thresholds.iter().all(|v| *v > 0.0 && *v < 1.0);
        if !decreasing || !in_range {
            return invalid(format!(
                "boss thresholds must be strictly decreasing in (0, 1): {:?}",
                boss.thresholds
            ));
        }
        if boss
            .phases
            .iter()
            .any(|m| !(m.damage > 0.0 && m.defense > 0.0))
        {
            return invalid("boss phase multipliers must be positive".into());
        }

        let proj = &self.projectile;
        let bounds = proj.bounds();
        if proj.hit_radius <= 0.0 || proj.default_lifetime <= 0.0 {
            return invalid("projectile hit radius and lifetime must be positive".into());
        }
        if !(bounds.min.x < bounds.max.x && bounds.min.y < bounds.max.y) {
            return invalid(format!("empty arena bounds {:?}", bounds));
        }

        let ev = &self.evasion;
        let timings = [
            ev.dodge_cooldown,
            ev.dodge_iframes,
            ev.dodge_distance,
            ev.dodge_stamina,
            ev.parry_cooldown,
            ev.parry_stamina,
            ev.stagger,
            ev.perfect_stagger,
        ];
        if timings.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return invalid("evasion timings and costs must be non-negative".into());
        }
        if !(0.0 <= ev.perfect_window && ev.perfect_window <= ev.parry_window) {
            return invalid(format!(
                "perfect parry window {} must lie within the parry window {}",
                ev.perfect_window, ev.parry_window
            ));
        }

        for (i, spec) in self.archetypes.iter().enumerate() {
            if self.archetypes[..i].iter().any(|o| o.kind == spec.kind) {
                return invalid(format!("duplicate archetype {:?}", spec.kind));
            }
            if !(spec.health > 0.0
                && spec.attack_speed > 0.0
                && spec.armor >= 0.0
                && spec.stamina >= 0.0
                && spec.stamina_regen >= 0.0)
            {
                return invalid(format!("archetype {:?} has invalid stats", spec.kind));
            }
        }

        Ok(())
    }
}

fn check_duration(section: &str, min: f32, max: f32) -> Result<(), ConfigError> {
    if min > 0.0 && min <= max {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} duration range [{}, {}] is empty or non-positive",
            section, min, max
        )))
    }
}
