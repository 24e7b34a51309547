//! Centralized combat constants.
//!
//! These are the fallback values behind `CombatConfig::default()`. Anything a
//! designer may want to tune lives in the config; this file only keeps the
//! numbers in one place.

// =====================================================
// Timing
// =====================================================

/// Timers at or below this remainder snap to zero.
/// Accumulating many small `dt` steps in f32 drifts by a few ulps.
pub const TIMER_EPSILON: f32 = 1e-4;

/// Fixed step used by the demo binary and the balance sweeps (10 ticks/s)
pub const DEFAULT_TICK_DT: f32 = 0.1;

// =====================================================
// Projectiles
// =====================================================

/// Distance at which a projectile connects with a Health-bearing entity
pub const DEFAULT_HIT_RADIUS: f32 = 1.0;

/// Downward (screen-space +y) acceleration applied to arcing projectiles
pub const DEFAULT_ARC_GRAVITY: f32 = 30.0;

/// Playfield bounds used by bouncing projectiles
pub const DEFAULT_BOUNDS_MIN: (f32, f32) = (0.0, 0.0);
pub const DEFAULT_BOUNDS_MAX: (f32, f32) = (1280.0, 720.0);

/// Lifetime for projectile abilities whose stat block leaves `duration` at 0
pub const DEFAULT_PROJECTILE_LIFETIME: f32 = 3.0;

/// Fraction of speed kept after bouncing off an edge
pub const DEFAULT_BOUNCE_FACTOR: f32 = 0.8;

// =====================================================
// Psychology
// =====================================================

/// Power ratio thresholds (scaled by the bravery trait)
pub const HESITANT_THRESHOLD: f32 = 1.2;
pub const FEARFUL_THRESHOLD: f32 = 1.5;
pub const TERRIFIED_THRESHOLD: f32 = 2.0;
pub const SUBSERVIENT_THRESHOLD: f32 = 3.0;

/// At or below this power ratio the enemy feels overwhelmingly favored
pub const EMPOWERED_RATIO: f32 = 0.5;

/// Ally deaths inside this radius unsettle an enemy
pub const AWARENESS_RADIUS: f32 = 12.0;

/// Fog empowerment above this pushes the enemy to EMPOWERED
pub const FOG_THRESHOLD: f32 = 0.5;

/// Range a freshly entered tier lasts before decaying one rung
pub const STATE_DURATION_MIN: f32 = 3.0;
pub const STATE_DURATION_MAX: f32 = 6.0;

/// Below this health ratio an enemy hits harder (up to +50% at 0 hp)
pub const DESPERATION_HEALTH: f32 = 0.25;

/// Traits are clamped into this range
pub const TRAIT_MIN: f32 = 0.5;
pub const TRAIT_MAX: f32 = 1.5;

/// Dominance at or above this makes an enemy an alpha
pub const ALPHA_DOMINANCE: f32 = 1.3;

/// Chance that crossing the SUBSERVIENT threshold lands there instead of TERRIFIED
pub const SUBSERVIENCE_CHANCE: f32 = 1.0;

/// Grudge gained per witnessed ally death, capped at 1.0
pub const GRUDGE_PER_ALLY_DEATH: f32 = 0.15;
/// Perceived target power scales by `1 + grudge * this`
pub const GRUDGE_POWER_SCALE: f32 = 0.5;
/// Grudges above this add `grudge * GRUDGE_DAMAGE_SCALE` outgoing damage
pub const GRUDGE_DAMAGE_FLOOR: f32 = 0.2;
pub const GRUDGE_DAMAGE_SCALE: f32 = 0.3;

// =====================================================
// Behavior selection
// =====================================================

pub const ATTACK_DISTANCE: f32 = 2.0;
pub const PURSUE_DISTANCE: f32 = 10.0;

/// Chance to pursue rather than flank inside the pursue band
pub const PURSUE_WEIGHT: f32 = 0.7;

/// Own-health ratio under which an enemy holds ground and defends
pub const DEFEND_HEALTH: f32 = 0.3;

pub const BEHAVIOR_DURATION_MIN: f32 = 2.0;
pub const BEHAVIOR_DURATION_MAX: f32 = 4.0;

// =====================================================
// Pack / rally
// =====================================================

pub const RALLY_RADIUS: f32 = 12.0;
pub const RALLY_DURATION: f32 = 5.0;
pub const RALLY_INTERVAL: f32 = 8.0;

/// Interval scale when the alpha saw frightened followers last tick
pub const RALLY_URGENT_FACTOR: f32 = 0.5;

/// Allies inside this radius lend pack strength
pub const PACK_RADIUS: f32 = 12.0;
pub const PACK_BONUS_PER_ALLY: f32 = 0.1;
pub const PACK_BONUS_CAP: f32 = 0.5;
/// Flat bonus while an alpha stands among the nearby allies
pub const PACK_ALPHA_BONUS: f32 = 0.2;

// =====================================================
// Evasion
// =====================================================

pub const DODGE_COOLDOWN: f32 = 1.0;
/// Invulnerability after a dodge
pub const DODGE_IFRAMES: f32 = 0.3;
pub const DODGE_DISTANCE: f32 = 5.0;
pub const DODGE_STAMINA: f32 = 20.0;

/// A parry negates melee hits landing inside this window
pub const PARRY_WINDOW: f32 = 0.15;
/// Hits this soon after the parry opens are perfect
pub const PERFECT_PARRY_WINDOW: f32 = 0.05;
pub const PARRY_COOLDOWN: f32 = 0.5;
pub const PARRY_STAMINA: f32 = 15.0;
pub const PARRY_STAGGER: f32 = 0.5;
pub const PERFECT_PARRY_STAGGER: f32 = 1.0;

// =====================================================
// Boss
// =====================================================

/// Health ratios at which PHASE_2, PHASE_3 and FINAL begin
pub const BOSS_PHASE_THRESHOLDS: [f32; 3] = [0.7, 0.4, 0.2];
