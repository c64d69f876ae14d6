use std::sync::atomic::{AtomicBool, Ordering};

/// Process-local reachability flag for the external store.
///
/// Flipped by the connection supervisor and by failed commands; read by the
/// accounting service before every call. Never persisted.
#[derive(Debug, Default)]
pub struct StoreHealth {
    ready: AtomicBool,
}

impl StoreHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Returns `true` if this call changed the flag.
    pub fn mark_ready(&self) -> bool {
        !self.ready.swap(true, Ordering::AcqRel)
    }

    /// Returns `true` if this call changed the flag.
    pub fn mark_unavailable(&self) -> bool {
        self.ready.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unavailable() {
        assert!(!StoreHealth::new().is_ready());
    }

    #[test]
    fn transitions_report_changes_once() {
        let health = StoreHealth::new();
        assert!(health.mark_ready());
        assert!(!health.mark_ready());
        assert!(health.is_ready());
        assert!(health.mark_unavailable());
        assert!(!health.mark_unavailable());
        assert!(!health.is_ready());
    }
}
