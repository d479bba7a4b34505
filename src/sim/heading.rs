/// Integrates horizontal movement into an unbounded heading (radians).
///
/// The value is never reduced modulo 2π; renderers do that if they need to.
#[derive(Debug, Clone)]
pub struct HeadingIntegrator {
    initial: f64,
    rotation_speed: f64,
    heading: f64,
}

impl HeadingIntegrator {
    pub fn new(initial: f64, rotation_speed: f64) -> Self {
        Self {
            initial,
            rotation_speed,
            heading: initial,
        }
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// Start a fresh accumulation from the initial heading.
    pub fn restart(&mut self) {
        self.heading = self.initial;
    }

    pub fn on_movement(&mut self, delta_x: f64) {
        self.heading += delta_x * self.rotation_speed;
    }

    /// Swap constants; the running heading is kept.
    pub fn retune(&mut self, initial: f64, rotation_speed: f64) {
        self.initial = initial;
        self.rotation_speed = rotation_speed;
    }
}
