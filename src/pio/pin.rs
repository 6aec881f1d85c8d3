use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A GPIO output line.
/// Clones share the same level, so a state machine's side-set and the
/// controller can both drive it.
#[derive(Debug, Clone)]
pub struct Pin {
    id: u8,
    level: Arc<AtomicBool>,
}

impl Pin {
    /// Creates a pin that starts low.
    pub fn new(id: u8) -> Self {
        Self {
            id,
            level: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn value(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: bool) {
        self.level.store(value, Ordering::Relaxed);
    }

    pub fn off(&self) {
        self.set(false);
    }
}

#[cfg(test)]
mod test {
    use super::Pin;

    #[test]
    fn test_shared_level() {
        let pin = Pin::new(22);
        let side_set = pin.clone();

        assert!(!pin.value());
        side_set.set(true);
        assert!(pin.value());
        pin.off();
        assert!(!side_set.value());
        assert_eq!(side_set.id(), 22);
    }
}
