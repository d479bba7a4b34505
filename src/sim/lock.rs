//! Exclusive pointer capture status as reported by the host.

/// What a status report did to the tracked value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockEdge {
    Engaged,
    Released,
    Unchanged,
}

type Subscriber = Box<dyn FnMut(bool)>;

pub struct LockTracker {
    locked: bool,
    subscribers: Vec<Subscriber>,
}

impl std::fmt::Debug for LockTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockTracker")
            .field("locked", &self.locked)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Default for LockTracker {
    fn default() -> Self {
        Self::new(false)
    }
}

impl LockTracker {
    pub fn new(locked: bool) -> Self {
        Self {
            locked,
            subscribers: Vec::new(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Register a listener. It is called right away with the current status
    /// and again on every change.
    pub fn subscribe(&mut self, mut f: impl FnMut(bool) + 'static) {
        f(self.locked);
        self.subscribers.push(Box::new(f));
    }

    /// Record a host report. Repeated reports of the same status are not
    /// forwarded to subscribers.
    pub fn report(&mut self, locked: bool) -> LockEdge {
        if locked == self.locked {
            return LockEdge::Unchanged;
        }
        self.locked = locked;
        for s in self.subscribers.iter_mut() {
            s(locked);
        }
        if locked {
            LockEdge::Engaged
        } else {
            LockEdge::Released
        }
    }
}
