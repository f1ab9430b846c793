//! Test observer wrapping one connection's event channel.

use std::time::Duration;

use jam_controller::actors::{ObserverHandle, ObserverId};
use jam_controller::gateway::protocol::ServerEvent;
use tokio::sync::mpsc;

/// How long [`TestObserver::recv`] waits before panicking.
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// One simulated gateway connection: holds the receiving side of the
/// observer channel and hands out [`ObserverHandle`] clones to actors.
pub struct TestObserver {
    handle: ObserverHandle,
    receiver: mpsc::Receiver<ServerEvent>,
}

impl TestObserver {
    #[must_use]
    pub fn new() -> Self {
        let (handle, receiver) = ObserverHandle::channel();
        Self { handle, receiver }
    }

    /// Handle to pass into join/subscribe calls.
    #[must_use]
    pub fn observer(&self) -> ObserverHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.handle.id()
    }

    /// Receive the next event, panicking if none arrives in time.
    pub async fn recv(&mut self) -> ServerEvent {
        match tokio::time::timeout(RECV_TIMEOUT, self.receiver.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => panic!("observer channel closed"),
            Err(_) => panic!("no event within {RECV_TIMEOUT:?}"),
        }
    }

    /// Pop an already-delivered event, if any.
    pub fn try_recv(&mut self) -> Option<ServerEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Default for TestObserver {
    fn default() -> Self {
        Self::new()
    }
}
