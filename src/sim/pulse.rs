/// Momentary "accelerating" cue for the renderer.
///
/// Timed on the host clock, starting at the moment the sample arrived. The
/// newest movement sample always wins: a forward sample cancels a pending
/// pulse.
#[derive(Debug, Clone, Default)]
pub struct AccelerationPulse {
    duration_ms: f64,
    until: Option<f64>,
}

impl AccelerationPulse {
    pub fn new(duration_ms: f64) -> Self {
        Self {
            duration_ms,
            until: None,
        }
    }

    pub fn on_movement(&mut self, backward: bool, now: f64) {
        self.until = backward.then_some(now + self.duration_ms);
    }

    pub fn clear(&mut self) {
        self.until = None;
    }

    pub fn is_active(&self, now: f64) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    pub fn set_duration(&mut self, duration_ms: f64) {
        self.duration_ms = duration_ms;
    }
}
