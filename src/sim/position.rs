use glam::DVec2;

/// Advances the pointer position once per animation frame and wraps it
/// around the play-field.
#[derive(Debug, Clone)]
pub struct PositionIntegrator {
    bound: DVec2,
    position_scale: f64,
    position: DVec2,
    last_elapsed: Option<f64>,
}

impl PositionIntegrator {
    /// `field` is the full play-field size; positions are kept relative to
    /// its center.
    pub fn new(field: DVec2, position_scale: f64) -> Self {
        Self {
            bound: field / 2.0,
            position_scale,
            position: DVec2::ZERO,
            last_elapsed: None,
        }
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    pub fn bound(&self) -> DVec2 {
        self.bound
    }

    pub fn reset(&mut self) {
        self.position = DVec2::ZERO;
    }

    /// Process one frame. The first tick only records the timestamp and
    /// returns `false`; later ticks move the pointer by the velocity current
    /// at call time.
    pub fn on_frame(&mut self, elapsed: f64, velocity: DVec2) -> bool {
        let Some(prev) = self.last_elapsed.replace(elapsed) else {
            return false;
        };
        let dt = elapsed - prev;
        let next = self.position + velocity * (dt * self.position_scale);
        self.position = wrap(next, self.bound);
        true
    }

    pub fn retune(&mut self, field: DVec2, position_scale: f64) {
        self.bound = field / 2.0;
        self.position_scale = position_scale;
        self.position = wrap(self.position, self.bound);
    }
}

/// Toroidal wrap into `[-bound, +bound]` per axis. Values exactly on a
/// boundary are left alone.
pub fn wrap(mut p: DVec2, bound: DVec2) -> DVec2 {
    p.x = wrap_axis(p.x, bound.x);
    p.y = wrap_axis(p.y, bound.y);
    p
}

fn wrap_axis(mut v: f64, bound: f64) -> f64 {
    if v < -bound {
        v += 2.0 * bound;
    }
    if v > bound {
        v -= 2.0 * bound;
    }
    v
}
