//! Change notifications published by the cache workers.
//!
//! Events are sent from background workers. Subscribers must re-dispatch
//! onto their own UI thread before touching widget state.

use lazygrid_core::Generation;
use tokio::sync::broadcast;

/// Something the grid should react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    /// A page fetch for `generation` completed (possibly with zero rows);
    /// visible cells should be re-read.
    DataChanged { generation: Generation },
    /// The total row count for `generation` is now known.
    CountChanged { generation: Generation, count: usize },
}

impl CacheEvent {
    #[must_use]
    pub fn generation(&self) -> Generation {
        match self {
            CacheEvent::DataChanged { generation } | CacheEvent::CountChanged { generation, .. } => {
                *generation
            }
        }
    }
}

/// Cloneable sending half shared by both workers.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: broadcast::Sender<CacheEvent>,
}

impl EventSender {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn send(&self, event: CacheEvent) {
        let _ = self.tx.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.tx.subscribe()
    }
}
