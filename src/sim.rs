//! Inertial pointer simulation.
//!
//! One [`Simulation`] owns every piece of derived state: capture status,
//! heading, velocity, wrapped position, the acceleration cue and the key
//! currently under the pointer. All updates are serialized through its
//! methods; each integrator reads its upstream values at call time.

pub mod heading;
pub mod lock;
pub mod position;
pub mod pulse;
pub mod velocity;

use anyhow::Result;
use glam::DVec2;
use log::{info, trace};
use serde::{Deserialize, Serialize};

use crate::actions::ActivationSink;
use crate::layout::KeyboardLayout;
use heading::HeadingIntegrator;
use lock::{LockEdge, LockTracker};
use position::PositionIntegrator;
use pulse::AccelerationPulse;
use velocity::VelocityIntegrator;

/// One raw relative-movement sample in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MovementEvent {
    #[serde(alias = "deltaX")]
    pub dx: f64,
    #[serde(alias = "deltaY")]
    pub dy: f64,
}

/// What happens to velocity when capture is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleasePolicy {
    /// Keep the last velocity; the pointer drifts on.
    #[default]
    Coast,
    /// Zero the velocity on release.
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimParams {
    pub initial_heading: f64,
    pub rotation_speed: f64,
    pub sensitivity: f64,
    pub max_speed: f64,
    pub position_scale: f64,
    pub pulse_ms: f64,
    pub field: DVec2,
    pub velocity_on_release: ReleasePolicy,
    pub reset_position_on_engage: bool,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            initial_heading: -0.4,
            rotation_speed: 0.01,
            sensitivity: 0.05,
            max_speed: 20.0,
            position_scale: 0.01,
            pulse_ms: 20.0,
            field: DVec2::new(320.0, 520.0),
            velocity_on_release: ReleasePolicy::Coast,
            reset_position_on_engage: false,
        }
    }
}

/// Render-facing view of the simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub locked: bool,
    pub heading: f64,
    pub velocity: DVec2,
    pub position: DVec2,
    pub accelerating: bool,
    pub target: Option<String>,
}

#[derive(Debug)]
pub struct Simulation {
    params: SimParams,
    lock: LockTracker,
    heading: HeadingIntegrator,
    velocity: VelocityIntegrator,
    position: PositionIntegrator,
    pulse: AccelerationPulse,
    layout: KeyboardLayout,
    target: Option<String>,
    /// Latest host time seen, from frames or movement samples.
    now: f64,
}

impl Simulation {
    pub fn new(params: SimParams, layout: KeyboardLayout) -> Self {
        let mut sim = Self {
            lock: LockTracker::new(false),
            heading: HeadingIntegrator::new(params.initial_heading, params.rotation_speed),
            velocity: VelocityIntegrator::new(params.sensitivity, params.max_speed),
            position: PositionIntegrator::new(params.field, params.position_scale),
            pulse: AccelerationPulse::new(params.pulse_ms),
            layout,
            target: None,
            now: 0.0,
            params,
        };
        sim.resolve_target();
        sim
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn heading(&self) -> f64 {
        self.heading.heading()
    }

    pub fn velocity(&self) -> DVec2 {
        self.velocity.velocity()
    }

    pub fn position(&self) -> DVec2 {
        self.position.position()
    }

    pub fn is_accelerating(&self) -> bool {
        self.pulse.is_active(self.now)
    }

    pub fn resolved_target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            locked: self.is_locked(),
            heading: self.heading(),
            velocity: self.velocity(),
            position: self.position(),
            accelerating: self.is_accelerating(),
            target: self.target.clone(),
        }
    }

    /// Listen for capture changes. The listener immediately receives the
    /// current status.
    pub fn subscribe_lock(&mut self, f: impl FnMut(bool) + 'static) {
        self.lock.subscribe(f);
    }

    /// Feed a host capture report. Engaging restarts heading and velocity
    /// from their baselines; position is kept unless the profile asks for a
    /// reset.
    pub fn set_lock_status(&mut self, locked: bool) -> LockEdge {
        let edge = self.lock.report(locked);
        match edge {
            LockEdge::Engaged => {
                self.heading.restart();
                self.velocity.restart();
                if self.params.reset_position_on_engage {
                    self.position.reset();
                    self.resolve_target();
                }
                let p = self.position();
                info!("capture engaged at ({:.1}, {:.1})", p.x, p.y);
            }
            LockEdge::Released => {
                self.pulse.clear();
                if self.params.velocity_on_release == ReleasePolicy::Stop {
                    self.velocity.restart();
                }
                info!("capture released");
            }
            LockEdge::Unchanged => {}
        }
        edge
    }

    /// Feed one movement sample stamped with the latest known time.
    pub fn report_movement(&mut self, ev: MovementEvent) -> bool {
        self.report_movement_at(ev, self.now)
    }

    /// Feed one movement sample that arrived at host time `at_ms`, on the
    /// same clock as [`Simulation::tick`]. Samples are dropped while not
    /// captured. Returns whether the sample changed velocity.
    pub fn report_movement_at(&mut self, ev: MovementEvent, at_ms: f64) -> bool {
        if !self.is_locked() {
            trace!("movement ({}, {}) dropped: not captured", ev.dx, ev.dy);
            return false;
        }
        self.now = self.now.max(at_ms);
        self.heading.on_movement(ev.dx);
        let accepted = self.velocity.on_movement(ev.dy, self.heading.heading());
        self.pulse.on_movement(ev.dy < 0.0, self.now);
        accepted
    }

    /// Advance one animation frame. `elapsed_ms` must be monotonic.
    /// Returns `false` for the very first tick, which only primes the clock.
    pub fn tick(&mut self, elapsed_ms: f64) -> bool {
        self.now = self.now.max(elapsed_ms);
        let moved = self.position.on_frame(elapsed_ms, self.velocity.velocity());
        if moved {
            self.resolve_target();
            trace!(
                "frame {elapsed_ms:.1}: pos ({:.2}, {:.2}) target {:?}",
                self.position().x,
                self.position().y,
                self.target
            );
        }
        moved
    }

    /// Activate whatever key is under the pointer right now. Exactly one
    /// sink call per resolved target; nothing when no key is resolved.
    pub fn activate<S>(&mut self, sink: &mut S) -> Result<Option<String>>
    where
        S: ActivationSink + ?Sized,
    {
        let Some(target) = self.target.clone() else {
            info!("activate: no key under pointer");
            return Ok(None);
        };
        info!("activate: {target}");
        sink.activate(&target)?;
        Ok(Some(target))
    }

    /// Replace constants and layout. Heading, velocity and position carry
    /// over (clamped or wrapped into the new limits).
    pub fn retune(&mut self, params: SimParams, layout: KeyboardLayout) {
        self.heading.retune(params.initial_heading, params.rotation_speed);
        self.velocity.retune(params.sensitivity, params.max_speed);
        self.position.retune(params.field, params.position_scale);
        self.pulse.set_duration(params.pulse_ms);
        self.layout = layout;
        self.params = params;
        self.resolve_target();
    }

    fn resolve_target(&mut self) {
        self.target = self
            .layout
            .resolve(self.position.position(), self.position.bound())
            .map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;

    const EPS: f64 = 1e-9;

    #[derive(Default)]
    struct Recorder {
        activated: Vec<String>,
    }

    impl ActivationSink for Recorder {
        fn activate(&mut self, target: &str) -> Result<()> {
            self.activated.push(target.to_string());
            Ok(())
        }
    }

    fn sim_with(params: SimParams) -> Simulation {
        let profile = Profile::bundled().unwrap();
        Simulation::new(params, profile.keyboard_layout().unwrap())
    }

    fn sim() -> Simulation {
        sim_with(SimParams::default())
    }

    fn mv(dx: f64, dy: f64) -> MovementEvent {
        MovementEvent { dx, dy }
    }

    #[test]
    fn starts_uncaptured_at_center_over_key_9() {
        let s = sim();
        assert!(!s.is_locked());
        assert_eq!(s.position(), DVec2::ZERO);
        assert_eq!(s.heading(), -0.4);
        assert_eq!(s.resolved_target(), Some("key-9"));
    }

    #[test]
    fn movement_ignored_while_uncaptured() {
        let mut s = sim();
        assert!(!s.report_movement(mv(50.0, -50.0)));
        assert_eq!(s.heading(), -0.4);
        assert_eq!(s.velocity(), DVec2::ZERO);
        assert!(!s.is_accelerating());
    }

    #[test]
    fn heading_is_initial_plus_running_sum() {
        let mut s = sim();
        s.set_lock_status(true);
        let dxs = [3.0, -12.5, 40.0, 0.0, 7.25];
        for dx in dxs {
            s.report_movement(mv(dx, 4.0));
        }
        let expected = -0.4 + dxs.iter().sum::<f64>() * 0.01;
        assert!((s.heading() - expected).abs() < EPS);
    }

    #[test]
    fn heading_frozen_while_released() {
        let mut s = sim();
        s.set_lock_status(true);
        s.report_movement(mv(100.0, 0.0));
        s.set_lock_status(false);
        let frozen = s.heading();
        s.report_movement(mv(100.0, 0.0));
        assert_eq!(s.heading(), frozen);
    }

    #[test]
    fn two_backward_samples_then_one_frame() {
        let mut s = sim();
        s.set_lock_status(true);
        s.tick(0.0);
        s.report_movement(mv(0.0, -10.0));
        s.report_movement(mv(0.0, -10.0));

        let v = s.velocity();
        assert!(v.length_squared() > 0.0);
        assert!(v.length_squared() <= 400.0);
        let facing = -0.4 + std::f64::consts::FRAC_PI_2;
        assert!((v.x - 0.05 * -20.0 * facing.cos()).abs() < EPS);
        assert!((v.y - 0.05 * -20.0 * facing.sin()).abs() < EPS);

        assert!(s.tick(16.0));
        let expected = v * 16.0 * 0.01;
        assert!((s.position() - expected).length() < EPS);
    }

    #[test]
    fn forward_movement_does_not_change_velocity() {
        let mut s = sim();
        s.set_lock_status(true);
        s.report_movement(mv(0.0, -30.0));
        let before = s.velocity();
        assert!(!s.report_movement(mv(15.0, 0.0)));
        assert!(!s.report_movement(mv(-5.0, 22.0)));
        assert_eq!(s.velocity(), before);
    }

    #[test]
    fn velocity_stays_capped() {
        let mut s = sim();
        s.set_lock_status(true);
        for i in 0..300 {
            s.report_movement(mv((i % 7) as f64 - 3.0, -25.0));
            assert!(s.velocity().length_squared() <= 400.0 + EPS);
        }
    }

    #[test]
    fn reengage_resets_heading_and_velocity_but_not_position() {
        let mut s = sim();
        s.set_lock_status(true);
        s.tick(0.0);
        s.report_movement(mv(30.0, -40.0));
        s.tick(100.0);
        let pos = s.position();
        assert_ne!(pos, DVec2::ZERO);

        s.set_lock_status(false);
        s.set_lock_status(true);
        assert_eq!(s.heading(), -0.4);
        assert_eq!(s.velocity(), DVec2::ZERO);
        assert_eq!(s.position(), pos);
    }

    #[test]
    fn coasts_after_release_by_default() {
        let mut s = sim();
        s.set_lock_status(true);
        s.tick(0.0);
        s.report_movement(mv(0.0, -40.0));
        s.set_lock_status(false);
        let v = s.velocity();
        assert_ne!(v, DVec2::ZERO);
        s.tick(16.0);
        assert!((s.position() - v * 0.16).length() < EPS);
    }

    #[test]
    fn stop_policy_zeroes_velocity_on_release() {
        let mut s = sim_with(SimParams {
            velocity_on_release: ReleasePolicy::Stop,
            ..SimParams::default()
        });
        s.set_lock_status(true);
        s.report_movement(mv(0.0, -40.0));
        s.set_lock_status(false);
        assert_eq!(s.velocity(), DVec2::ZERO);
    }

    #[test]
    fn reset_position_policy() {
        let mut s = sim_with(SimParams {
            reset_position_on_engage: true,
            ..SimParams::default()
        });
        s.set_lock_status(true);
        s.tick(0.0);
        s.report_movement(mv(0.0, -40.0));
        s.tick(500.0);
        assert_ne!(s.position(), DVec2::ZERO);
        s.set_lock_status(false);
        s.set_lock_status(true);
        assert_eq!(s.position(), DVec2::ZERO);
        assert_eq!(s.resolved_target(), Some("key-9"));
    }

    #[test]
    fn pulse_follows_backward_samples() {
        let mut s = sim();
        s.set_lock_status(true);
        s.tick(0.0);
        s.report_movement(mv(0.0, -1.0));
        assert!(s.is_accelerating());
        s.tick(25.0);
        assert!(!s.is_accelerating());
        s.report_movement(mv(0.0, -1.0));
        s.report_movement(mv(0.0, 1.0));
        assert!(!s.is_accelerating());
    }

    #[test]
    fn pulse_runs_from_sample_time_between_frames() {
        let mut s = sim();
        s.set_lock_status(true);
        s.tick(0.0);
        s.tick(15.0);
        s.report_movement_at(mv(0.0, -1.0), 30.0);
        s.tick(35.0);
        assert!(s.is_accelerating());
        s.tick(49.0);
        assert!(s.is_accelerating());
        s.tick(50.0);
        assert!(!s.is_accelerating());
    }

    #[test]
    fn pulse_before_first_frame_expires() {
        let mut s = sim();
        s.set_lock_status(true);
        s.report_movement_at(mv(0.0, -1.0), 100.0);
        assert!(s.is_accelerating());
        s.tick(110.0);
        assert!(s.is_accelerating());
        s.tick(120.0);
        assert!(!s.is_accelerating());
    }

    #[test]
    fn activation_uses_latest_target() {
        let mut s = sim();
        let mut rec = Recorder::default();
        assert_eq!(s.activate(&mut rec).unwrap(), Some("key-9".to_string()));
        assert_eq!(rec.activated, vec!["key-9"]);
    }

    #[test]
    fn activation_with_no_target_is_noop() {
        let mut s = sim();
        s.set_lock_status(true);
        s.tick(0.0);
        // heading 0 after dx = 40 -> pushes straight up toward the display
        s.report_movement(mv(40.0, -400.0));
        s.tick(1000.0);
        assert!(s.position().x.abs() < 1e-6);
        assert!((s.position().y - (-200.0)).abs() < 1e-6);
        assert_eq!(s.resolved_target(), None);

        let mut rec = Recorder::default();
        assert_eq!(s.activate(&mut rec).unwrap(), None);
        assert!(rec.activated.is_empty());
    }

    #[test]
    fn lock_subscriber_sees_replay_and_changes() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut s = sim();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        s.subscribe_lock(move |v| sink.borrow_mut().push(v));
        s.set_lock_status(true);
        s.set_lock_status(false);
        assert_eq!(*seen.borrow(), vec![false, true, false]);
    }

    #[test]
    fn retune_keeps_motion_state() {
        let mut s = sim();
        s.set_lock_status(true);
        s.report_movement(mv(10.0, -400.0));
        let heading = s.heading();
        let params = SimParams {
            max_speed: 5.0,
            ..SimParams::default()
        };
        let layout = Profile::bundled().unwrap().keyboard_layout().unwrap();
        s.retune(params, layout);
        assert_eq!(s.heading(), heading);
        assert!((s.velocity().length() - 5.0).abs() < 1e-6);
    }
}
