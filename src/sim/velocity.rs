use glam::DVec2;
use std::f64::consts::FRAC_PI_2;

/// Capped velocity driven by backward vertical movement.
///
/// Propulsion acts along `heading + π/2` so it lines up with the sprite's
/// long axis. Forward movement (`delta_y >= 0`) is ignored; there is no
/// friction, so the vector only changes when another backward sample
/// arrives or the integrator is restarted.
#[derive(Debug, Clone)]
pub struct VelocityIntegrator {
    sensitivity: f64,
    max_speed: f64,
    velocity: DVec2,
}

impl VelocityIntegrator {
    pub fn new(sensitivity: f64, max_speed: f64) -> Self {
        Self {
            sensitivity,
            max_speed,
            velocity: DVec2::ZERO,
        }
    }

    pub fn velocity(&self) -> DVec2 {
        self.velocity
    }

    pub fn restart(&mut self) {
        self.velocity = DVec2::ZERO;
    }

    /// Returns whether the sample was accepted.
    pub fn on_movement(&mut self, delta_y: f64, heading: f64) -> bool {
        if delta_y >= 0.0 {
            return false;
        }
        let facing = heading + FRAC_PI_2;
        let push = DVec2::new(facing.cos(), facing.sin()) * (self.sensitivity * delta_y);
        self.velocity = cap(self.velocity + push, self.max_speed);
        true
    }

    /// A lower limit rescales the current velocity to exactly `max_speed`;
    /// the squared-ratio cap would shrink it well below the new limit.
    pub fn retune(&mut self, sensitivity: f64, max_speed: f64) {
        self.sensitivity = sensitivity;
        self.max_speed = max_speed;
        self.velocity = self.velocity.clamp_length_max(max_speed);
    }
}

/// Scale `v` by `min(1, max² / |v|²)`. Direction is preserved; a vector
/// over the limit ends up at `max² / |v|`, so it lands below `max`.
pub fn cap(v: DVec2, max: f64) -> DVec2 {
    let len2 = v.length_squared();
    if len2 == 0.0 {
        return v;
    }
    let factor = (max * max / len2).min(1.0);
    v * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn forward_movement_is_ignored() {
        let mut v = VelocityIntegrator::new(0.05, 20.0);
        v.on_movement(-40.0, -0.4);
        let before = v.velocity();
        assert!(!v.on_movement(0.0, -0.4));
        assert!(!v.on_movement(35.0, 1.2));
        assert_eq!(v.velocity(), before);
    }

    #[test]
    fn propulsion_is_perpendicular_to_heading() {
        let mut v = VelocityIntegrator::new(0.05, 20.0);
        v.on_movement(-10.0, 0.0);
        // heading 0 -> facing +y, deltaY negative -> pushes toward -y
        assert!(v.velocity().x.abs() < EPS);
        assert!((v.velocity().y - (-0.5)).abs() < EPS);
    }

    #[test]
    fn speed_is_capped_and_direction_kept() {
        let mut v = VelocityIntegrator::new(0.05, 20.0);
        let heading = 0.7;
        for _ in 0..500 {
            v.on_movement(-30.0, heading);
            assert!(v.velocity().length_squared() <= 400.0 + EPS);
        }
        let facing = heading + FRAC_PI_2;
        let dir = v.velocity().normalize();
        assert!((dir.x - (-facing.cos())).abs() < 1e-6);
        assert!((dir.y - (-facing.sin())).abs() < 1e-6);
        let speed = v.velocity().length();
        assert!(speed > 10.0 && speed <= 20.0, "speed {speed}");
    }

    #[test]
    fn cap_keeps_ratio() {
        let raw = DVec2::new(30.0, -40.0);
        let capped = cap(raw, 20.0);
        // 20² / 50 = 8
        assert!((capped.length() - 8.0).abs() < EPS);
        assert!((capped - DVec2::new(4.8, -6.4)).length() < EPS);
        assert!((capped.x / capped.y - raw.x / raw.y).abs() < EPS);
        assert_eq!(cap(DVec2::new(1.0, 2.0), 20.0), DVec2::new(1.0, 2.0));
        assert_eq!(cap(DVec2::ZERO, 20.0), DVec2::ZERO);
    }

    #[test]
    fn retune_rescales_to_new_limit() {
        let mut v = VelocityIntegrator::new(0.05, 20.0);
        v.on_movement(-200.0, 0.0);
        assert!((v.velocity().length() - 10.0).abs() < EPS);

        v.retune(0.05, 4.0);
        assert!((v.velocity().length() - 4.0).abs() < EPS);
        assert!(v.velocity().x.abs() < EPS);
        assert!(v.velocity().y < 0.0);

        v.retune(0.05, 50.0);
        assert!((v.velocity().length() - 4.0).abs() < EPS);
    }
}
