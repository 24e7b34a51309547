//! Projectile trajectory patterns.
//!
//! `compute_velocity(kind, state, current, target, dt)` is the single entry
//! point. Each `TrajectoryKind` maps to its own velocity function through a
//! constant table; pattern-local memory (phase accumulators, launch and
//! bounce velocity, spiral anchor) lives in `PatternState`, which the
//! projectile carries from tick to tick.
//!
//! Two patterns read that memory differently on purpose:
//! - Zigzag returns `speed * (base + offset)`, so the weave scales with speed.
//! - Wave returns `speed * base + offset`, so the weave has a fixed width.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BOUNCE_FACTOR, DEFAULT_BOUNDS_MAX, DEFAULT_BOUNDS_MIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrajectoryKind {
    Linear,
    Arcing,
    Homing,
    Orbital,
    Zigzag,
    Wave,
    Spiral,
    Bouncing,
}

impl TrajectoryKind {
    pub const ALL: [TrajectoryKind; 8] = [
        TrajectoryKind::Linear,
        TrajectoryKind::Arcing,
        TrajectoryKind::Homing,
        TrajectoryKind::Orbital,
        TrajectoryKind::Zigzag,
        TrajectoryKind::Wave,
        TrajectoryKind::Spiral,
        TrajectoryKind::Bouncing,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    /// Homing projectiles chase their target entity instead of the aim point
    pub fn tracks_target(self) -> bool {
        matches!(self, TrajectoryKind::Homing)
    }
}

/// Axis-aligned playfield rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Vec2::new(DEFAULT_BOUNDS_MIN.0, DEFAULT_BOUNDS_MIN.1),
            max: Vec2::new(DEFAULT_BOUNDS_MAX.0, DEFAULT_BOUNDS_MAX.1),
        }
    }
}

/// Shape parameters. Each pattern reads only the fields it needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternParams {
    /// Arcing: downward (+y) acceleration
    pub gravity: f32,
    /// Orbital: circle radius
    pub radius: f32,
    /// Orbital: radians added per call. Spiral: radians per second.
    pub angular_speed: f32,
    /// Zigzag/Wave: perpendicular offset amplitude
    pub amplitude: f32,
    /// Zigzag/Wave: oscillation frequency (rad/s)
    pub frequency: f32,
    /// Spiral: radius growth per second
    pub radius_growth: f32,
    /// Bouncing: speed kept per reflection
    pub bounce_factor: f32,
    pub bounds: Bounds,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self {
            gravity: 0.0,
            radius: 1.0,
            angular_speed: 0.1,
            amplitude: 0.5,
            frequency: 10.0,
            radius_growth: 1.0,
            bounce_factor: DEFAULT_BOUNCE_FACTOR,
            bounds: Bounds::default(),
        }
    }
}

/// Per-projectile pattern memory, persisted across ticks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternState {
    pub speed: f32,
    /// Seconds the pattern has run (zigzag/wave/spiral clocks)
    pub elapsed: f32,
    /// Orbital angle accumulator
    pub phase: f32,
    /// Arcing launch velocity and Bouncing's persistent velocity
    pub velocity: Vec2,
    pub launched: bool,
    /// Spiral center, fixed on the first call
    pub origin: Option<Vec2>,
    pub params: PatternParams,
}

impl PatternState {
    pub fn new(speed: f32, params: PatternParams) -> Self {
        Self {
            speed,
            elapsed: 0.0,
            phase: 0.0,
            velocity: Vec2::ZERO,
            launched: false,
            origin: None,
            params,
        }
    }
}

type VelocityFn = fn(&mut PatternState, Vec2, Vec2, f32) -> Vec2;

/// Indexed by `TrajectoryKind as usize`
const PATTERNS: [VelocityFn; 8] = [
    linear_velocity,
    arcing_velocity,
    homing_velocity,
    orbital_velocity,
    zigzag_velocity,
    wave_velocity,
    spiral_velocity,
    bouncing_velocity,
];

/// Velocity for this tick. Updates the pattern memory in `state`.
pub fn compute_velocity(
    kind: TrajectoryKind,
    state: &mut PatternState,
    current: Vec2,
    target: Vec2,
    dt: f32,
) -> Vec2 {
    PATTERNS[kind.index()](state, current, target, dt)
}

/// Acceleration applied during integration, outside `compute_velocity`
pub fn external_acceleration(kind: TrajectoryKind, state: &PatternState) -> Vec2 {
    match kind {
        TrajectoryKind::Arcing => Vec2::new(0.0, state.params.gravity),
        _ => Vec2::ZERO,
    }
}

/// Advance one step: returns the new position and the velocity used.
///
/// External forces feed back into the stored launch velocity so the next
/// call continues the ballistic curve.
pub fn integrate(
    kind: TrajectoryKind,
    state: &mut PatternState,
    position: Vec2,
    target: Vec2,
    dt: f32,
) -> (Vec2, Vec2) {
    let velocity = compute_velocity(kind, state, position, target, dt);
    let next = position + velocity * dt;
    let accel = external_acceleration(kind, state);
    if accel != Vec2::ZERO {
        state.velocity += accel * dt;
    }
    (next, velocity)
}

fn heading(current: Vec2, target: Vec2) -> Option<Vec2> {
    (target - current).try_normalize()
}

/// Straight line to the aim point, re-measured every call. Stops dead on it.
fn linear_velocity(state: &mut PatternState, current: Vec2, target: Vec2, _dt: f32) -> Vec2 {
    heading(current, target).map_or(Vec2::ZERO, |dir| dir * state.speed)
}

/// Ballistic launch: aimed so gravity brings the shot down on the target
/// after `distance / speed` seconds.
fn arcing_velocity(state: &mut PatternState, current: Vec2, target: Vec2, _dt: f32) -> Vec2 {
    if !state.launched {
        state.launched = true;
        let offset = target - current;
        let distance = offset.length();
        if distance > 0.0 && state.speed > 0.0 {
            let dir = offset / distance;
            let flight_time = distance / state.speed;
            let gravity = Vec2::new(0.0, state.params.gravity);
            state.velocity = dir * state.speed - gravity * (flight_time * 0.5);
        }
    }
    state.velocity
}

/// Re-aims at the target every call, constant speed
fn homing_velocity(state: &mut PatternState, current: Vec2, target: Vec2, _dt: f32) -> Vec2 {
    heading(current, target).map_or(Vec2::ZERO, |dir| dir * state.speed)
}

/// Approximate orbit: a fixed angular step per call traces a point on a
/// circle and that point, scaled by speed, is used as the velocity. Not
/// physical orbital motion.
fn orbital_velocity(state: &mut PatternState, _current: Vec2, _target: Vec2, _dt: f32) -> Vec2 {
    state.phase += state.params.angular_speed;
    let radius = state.params.radius;
    state.speed * Vec2::new(radius * state.phase.cos(), radius * state.phase.sin())
}

fn weave_offset(state: &PatternState, base: Vec2) -> Vec2 {
    base.perp() * state.params.amplitude * (state.elapsed * state.params.frequency).sin()
}

fn zigzag_velocity(state: &mut PatternState, current: Vec2, target: Vec2, dt: f32) -> Vec2 {
    state.elapsed += dt;
    let Some(base) = heading(current, target) else {
        return Vec2::ZERO;
    };
    let offset = weave_offset(state, base);
    state.speed * (base + offset)
}

fn wave_velocity(state: &mut PatternState, current: Vec2, target: Vec2, dt: f32) -> Vec2 {
    state.elapsed += dt;
    let Some(base) = heading(current, target) else {
        return Vec2::ZERO;
    };
    let offset = weave_offset(state, base);
    state.speed * base + offset
}

/// Parametric spiral around the launch point. The returned velocity lands
/// the projectile exactly on `origin + r(t) * (cos wt, sin wt)` after `dt`.
/// `speed` does not apply; `radius_growth` sets the pace.
fn spiral_velocity(state: &mut PatternState, current: Vec2, _target: Vec2, dt: f32) -> Vec2 {
    let origin = *state.origin.get_or_insert(current);
    if dt <= 0.0 {
        return Vec2::ZERO;
    }
    state.elapsed += dt;
    let radius = state.params.radius_growth * state.elapsed;
    let angle = state.params.angular_speed * state.elapsed;
    let desired = origin + radius * Vec2::new(angle.cos(), angle.sin());
    (desired - current) / dt
}

fn bouncing_velocity(state: &mut PatternState, current: Vec2, target: Vec2, _dt: f32) -> Vec2 {
    if !state.launched {
        state.velocity = heading(current, target).map_or(Vec2::ZERO, |dir| dir * state.speed);
        state.launched = true;
    }

    let bounds = state.params.bounds;
    let factor = state.params.bounce_factor;
    let v = &mut state.velocity;
    // Only flip while heading outward, so a shot past the edge cannot jitter
    if (current.x <= bounds.min.x && v.x < 0.0) || (current.x >= bounds.max.x && v.x > 0.0) {
        v.x = -v.x * factor;
    }
    if (current.y <= bounds.min.y && v.y < 0.0) || (current.y >= bounds.max.y && v.y > 0.0) {
        v.y = -v.y * factor;
    }
    *v
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(speed: f32) -> PatternState {
        PatternState::new(speed, PatternParams::default())
    }

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_linear_toward_target() {
        let mut s = state(50.0);
        let v = compute_velocity(
            TrajectoryKind::Linear,
            &mut s,
            Vec2::ZERO,
            Vec2::new(100.0, 0.0),
            1.0,
        );
        assert!(approx(v, Vec2::new(50.0, 0.0)));
    }

    #[test]
    fn test_linear_zero_when_on_target() {
        let mut s = state(50.0);
        let p = Vec2::new(3.0, 4.0);
        let v = compute_velocity(TrajectoryKind::Linear, &mut s, p, p, 0.1);
        assert_eq!(v, Vec2::ZERO);
    }

    #[test]
    fn test_linear_reaims_after_launch() {
        let mut s = state(10.0);
        compute_velocity(TrajectoryKind::Linear, &mut s, Vec2::ZERO, Vec2::X * 5.0, 0.1);
        // Past the aim point the shot heads back toward it
        let v = compute_velocity(TrajectoryKind::Linear, &mut s, Vec2::X * 8.0, Vec2::X * 5.0, 0.1);
        assert!(approx(v, Vec2::new(-10.0, 0.0)));
    }

    #[test]
    fn test_linear_stops_on_target_mid_flight() {
        let mut s = state(50.0);
        let target = Vec2::new(100.0, 0.0);
        let (p, _) = integrate(TrajectoryKind::Linear, &mut s, Vec2::ZERO, target, 1.0);
        let (p, _) = integrate(TrajectoryKind::Linear, &mut s, p, target, 1.0);
        assert!(approx(p, target));
        let v = compute_velocity(TrajectoryKind::Linear, &mut s, target, target, 0.1);
        assert_eq!(v, Vec2::ZERO);
    }

    #[test]
    fn test_homing_reaims_every_call() {
        let mut s = state(10.0);
        let v1 = compute_velocity(TrajectoryKind::Homing, &mut s, Vec2::ZERO, Vec2::X, 0.1);
        let v2 = compute_velocity(TrajectoryKind::Homing, &mut s, Vec2::ZERO, Vec2::Y, 0.1);
        assert!(approx(v1, Vec2::new(10.0, 0.0)));
        assert!(approx(v2, Vec2::new(0.0, 10.0)));
        let v3 = compute_velocity(TrajectoryKind::Homing, &mut s, Vec2::ONE, Vec2::ONE, 0.1);
        assert_eq!(v3, Vec2::ZERO);
    }

    #[test]
    fn test_arcing_lands_on_target() {
        let mut params = PatternParams::default();
        params.gravity = 30.0;
        let mut s = PatternState::new(20.0, params);
        let target = Vec2::new(40.0, 0.0);
        let mut pos = Vec2::ZERO;
        let dt = 0.001;
        // flight time = 40 / 20 = 2 s
        for _ in 0..2000 {
            let (next, _) = integrate(TrajectoryKind::Arcing, &mut s, pos, target, dt);
            pos = next;
        }
        assert!((pos - target).length() < 0.1, "landed at {:?}", pos);
    }

    #[test]
    fn test_arcing_gravity_not_inside_velocity() {
        let mut params = PatternParams::default();
        params.gravity = 30.0;
        let mut s = PatternState::new(20.0, params);
        let v1 = compute_velocity(TrajectoryKind::Arcing, &mut s, Vec2::ZERO, Vec2::X * 40.0, 0.1);
        let v2 = compute_velocity(TrajectoryKind::Arcing, &mut s, Vec2::ZERO, Vec2::X * 40.0, 0.1);
        assert_eq!(v1, v2);
        // Launch leans upward (screen -y) to counter gravity
        assert!(v1.y < 0.0);
    }

    #[test]
    fn test_orbital_accumulates_phase() {
        let mut params = PatternParams::default();
        params.radius = 2.0;
        params.angular_speed = std::f32::consts::FRAC_PI_2;
        let mut s = PatternState::new(3.0, params);
        let v1 = compute_velocity(TrajectoryKind::Orbital, &mut s, Vec2::ZERO, Vec2::X, 0.1);
        assert!(approx(v1, Vec2::new(0.0, 6.0)));
        let v2 = compute_velocity(TrajectoryKind::Orbital, &mut s, Vec2::ZERO, Vec2::X, 0.1);
        assert!(approx(v2, Vec2::new(-6.0, 0.0)));
    }

    #[test]
    fn test_zigzag_and_wave_differ() {
        let mut params = PatternParams::default();
        params.amplitude = 1.0;
        params.frequency = std::f32::consts::FRAC_PI_2;
        let mut zig = PatternState::new(10.0, params);
        let mut wave = PatternState::new(10.0, params);
        // elapsed becomes 1.0 -> sin(pi/2) = 1
        let vz = compute_velocity(TrajectoryKind::Zigzag, &mut zig, Vec2::ZERO, Vec2::X, 1.0);
        let vw = compute_velocity(TrajectoryKind::Wave, &mut wave, Vec2::ZERO, Vec2::X, 1.0);
        assert!(approx(vz, Vec2::new(10.0, 10.0)));
        assert!(approx(vw, Vec2::new(10.0, 1.0)));
    }

    #[test]
    fn test_spiral_is_parametric() {
        let mut params = PatternParams::default();
        params.radius_growth = 2.0;
        params.angular_speed = 0.0;
        let mut s = PatternState::new(1.0, params);
        let mut pos = Vec2::new(10.0, 10.0);
        for _ in 0..10 {
            let (next, _) = integrate(TrajectoryKind::Spiral, &mut s, pos, Vec2::ZERO, 0.1);
            pos = next;
        }
        // r = 2 * 1.0 s along +x from the launch point
        assert!(approx(pos, Vec2::new(12.0, 10.0)));
    }

    #[test]
    fn test_spiral_zero_dt() {
        let mut s = state(1.0);
        let v = compute_velocity(TrajectoryKind::Spiral, &mut s, Vec2::ZERO, Vec2::X, 0.0);
        assert_eq!(v, Vec2::ZERO);
        assert_eq!(s.elapsed, 0.0);
    }

    #[test]
    fn test_bouncing_reflects_at_edge() {
        let mut params = PatternParams::default();
        params.bounce_factor = 0.5;
        let mut s = PatternState::new(10.0, params);
        let v = compute_velocity(
            TrajectoryKind::Bouncing,
            &mut s,
            Vec2::new(640.0, 360.0),
            Vec2::new(1000.0, 360.0),
            0.1,
        );
        assert!(approx(v, Vec2::new(10.0, 0.0)));
        let v = compute_velocity(
            TrajectoryKind::Bouncing,
            &mut s,
            Vec2::new(1281.0, 360.0),
            Vec2::new(1000.0, 360.0),
            0.1,
        );
        assert!(approx(v, Vec2::new(-5.0, 0.0)));
        // Still outside but now heading back in: no second flip
        let v = compute_velocity(
            TrajectoryKind::Bouncing,
            &mut s,
            Vec2::new(1280.5, 360.0),
            Vec2::new(1000.0, 360.0),
            0.1,
        );
        assert!(approx(v, Vec2::new(-5.0, 0.0)));
    }

    #[test]
    fn test_every_kind_is_deterministic() {
        for kind in TrajectoryKind::ALL {
            let mut a = state(12.0);
            let mut b = a;
            let va = compute_velocity(kind, &mut a, Vec2::new(1.0, 2.0), Vec2::new(9.0, -3.0), 0.05);
            let vb = compute_velocity(kind, &mut b, Vec2::new(1.0, 2.0), Vec2::new(9.0, -3.0), 0.05);
            assert_eq!(va, vb, "{:?}", kind);
            assert_eq!(a, b, "{:?}", kind);
        }
    }
}
