//! Process-wide stop signal.

use tokio::sync::broadcast;

/// Fan-out stop signal shared by the server and its background tasks.
///
/// Each task holds its own receiver; `trigger` wakes all of them.
#[derive(Debug, Clone)]
pub struct Shutdown {
    notify: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self { notify }
    }

    /// Receiver resolved once `trigger` is called.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notify.subscribe()
    }

    /// Ask every subscriber to stop. Safe to call with nobody listening.
    pub fn trigger(&self) {
        let _ = self.notify.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_wakes_server_and_upkeep() {
        let shutdown = Shutdown::new();
        let mut server = shutdown.subscribe();
        let mut upkeep = shutdown.clone().subscribe();

        shutdown.trigger();
        assert!(server.recv().await.is_ok());
        assert!(upkeep.recv().await.is_ok());
    }

    #[test]
    fn trigger_without_subscribers_is_harmless() {
        Shutdown::default().trigger();
    }
}
