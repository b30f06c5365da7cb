use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Value that becomes available once, later. Waiters are woken when it is
/// set instead of polling for it.
#[derive(Clone)]
pub struct ReadySlot<T> {
    tx: Arc<watch::Sender<Option<T>>>,
}

impl<T: Clone> ReadySlot<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, value: T) {
        self.tx.send_replace(Some(value));
    }

    pub fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    /// The value, or `None` if it did not show up within `limit`.
    pub async fn wait(&self, limit: Duration) -> Option<T> {
        let mut rx = self.tx.subscribe();
        let value = match tokio::time::timeout(limit, rx.wait_for(Option::is_some)).await {
            Ok(Ok(v)) => v.clone(),
            _ => None,
        };
        value
    }
}

impl<T: Clone> Default for ReadySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
