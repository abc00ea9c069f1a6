//! Event sources that wake the pending-sync queue.
//!
//! The host application owns the real signals (network reachability, app returning to the
//! foreground). It exposes each as a [`TriggerSource`]; [`Notifier`] is the in-process
//! implementation used by the CLI and the tests.

use std::sync::{Arc, Mutex};

pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// A payload-free "something happened" event stream.
pub trait TriggerSource: Send + Sync {
    fn subscribe(&self, callback: Callback);
}

#[derive(Default)]
pub struct Notifier {
    subscribers: Mutex<Vec<Callback>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke every subscriber on the calling thread. Returns how many were called.
    pub fn fire(&self) -> usize {
        // Snapshot so a callback may subscribe without deadlocking.
        let subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for callback in &subscribers {
            callback();
        }
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl TriggerSource for Notifier {
    fn subscribe(&self, callback: Callback) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fire_calls_every_subscriber() {
        let notifier = Notifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let hits = hits.clone();
            notifier.subscribe(Arc::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(notifier.fire(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fire_without_subscribers() {
        assert_eq!(Notifier::new().fire(), 0);
    }
}
