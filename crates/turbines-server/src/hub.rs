//! Registry of connected live reload clients.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use uuid::Uuid;

/// The only payload ever sent to a reload client.
pub const RELOAD_MESSAGE: &str = "reload";

/// Handle identifying one connected reload client.
pub type ClientId = Uuid;

/// Receiving end of a client registration.
pub type ReloadReceiver = mpsc::UnboundedReceiver<&'static str>;

/// Owns the set of connected reload clients.
///
/// Sends are unbounded channel pushes, so [`broadcast`](Self::broadcast)
/// never waits on a slow client. There is no acknowledgement or retry.
#[derive(Debug, Default)]
pub struct ReloadBroadcastHub {
    clients: Mutex<HashMap<ClientId, mpsc::UnboundedSender<&'static str>>>,
}

impl ReloadBroadcastHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<ClientId, mpsc::UnboundedSender<&'static str>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a client. Reload signals arrive on the returned receiver.
    pub fn register(&self) -> (ClientId, ReloadReceiver) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients().insert(id, tx);
        tracing::debug!(client = %id, "Reload client registered");
        (id, rx)
    }

    /// Remove a client. Returns whether it was registered.
    pub fn unregister(&self, id: ClientId) -> bool {
        let removed = self.clients().remove(&id).is_some();
        if removed {
            tracing::debug!(client = %id, "Reload client unregistered");
        }
        removed
    }

    /// Send `"reload"` to every registered client.
    ///
    /// Clients whose receiver is gone are dropped from the registry; the rest
    /// are unaffected. Returns how many clients the signal reached.
    pub fn broadcast(&self) -> usize {
        let mut clients = self.clients();
        let before = clients.len();
        clients.retain(|id, tx| {
            let delivered = tx.send(RELOAD_MESSAGE).is_ok();
            if !delivered {
                tracing::debug!(client = %id, "Dropping disconnected reload client");
            }
            delivered
        });
        let delivered = clients.len();
        tracing::debug!(delivered, dropped = before - delivered, "Broadcast reload");
        delivered
    }

    /// Drop every client. Their receivers observe the channel closing.
    pub fn disconnect_all(&self) {
        self.clients().clear();
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients().len()
    }

    /// Whether no client is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_broadcast_reaches_every_registered_client() {
        let hub = ReloadBroadcastHub::new();
        let (_a, mut rx_a) = hub.register();
        let (_b, mut rx_b) = hub.register();

        assert_eq!(hub.broadcast(), 2);

        assert_eq!(rx_a.try_recv().unwrap(), "reload");
        assert_eq!(rx_b.try_recv().unwrap(), "reload");
    }

    #[test]
    fn test_unregistered_client_receives_nothing() {
        let hub = ReloadBroadcastHub::new();
        let (a, mut rx_a) = hub.register();
        let (_b, mut rx_b) = hub.register();

        assert!(hub.unregister(a));
        assert_eq!(hub.broadcast(), 1);

        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), "reload");
    }

    #[test]
    fn test_unregister_unknown_client() {
        let hub = ReloadBroadcastHub::new();
        assert!(!hub.unregister(Uuid::new_v4()));
    }

    #[test]
    fn test_failed_delivery_removes_only_that_client() {
        let hub = ReloadBroadcastHub::new();
        let (_a, rx_a) = hub.register();
        let (_b, mut rx_b) = hub.register();
        drop(rx_a);

        assert_eq!(hub.broadcast(), 1);

        assert_eq!(hub.len(), 1);
        assert_eq!(rx_b.try_recv().unwrap(), "reload");
    }

    #[test]
    fn test_broadcast_with_no_clients() {
        let hub = ReloadBroadcastHub::new();
        assert!(hub.is_empty());
        assert_eq!(hub.broadcast(), 0);
    }

    #[test]
    fn test_disconnect_all_closes_receivers() {
        let hub = ReloadBroadcastHub::new();
        let (_a, mut rx_a) = hub.register();

        hub.disconnect_all();

        assert!(hub.is_empty());
        assert!(matches!(
            rx_a.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
