//! Open client socket metrics.

use crate::metric::{InfoData, InfoDescription, MetricType};
use crate::provider::Provider;

/// Section name of the socket metrics.
pub const SECTION: &str = "sockets";

/// One open client socket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocketSnapshot {
    /// Transport negotiated by the client, e.g. `"websocket"`.
    pub protocol: String,
    /// Whether a livedata session is bound to the socket.
    pub has_session: bool,
}

/// Read-only view of the server's open sockets.
pub trait SocketRegistry: Send + Sync {
    fn sockets(&self) -> Vec<SocketSnapshot>;
}

impl<F> SocketRegistry for F
where
    F: Fn() -> Vec<SocketSnapshot> + Send + Sync,
{
    fn sockets(&self) -> Vec<SocketSnapshot> {
        self()
    }
}

pub struct SocketProvider<R> {
    registry: R,
}

impl<R: SocketRegistry> SocketProvider<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }
}

impl<R: SocketRegistry> Provider for SocketProvider<R> {
    fn name(&self) -> &str {
        SECTION
    }

    fn describe(&self) -> InfoDescription {
        InfoDescription::new()
            .metric("nSockets", MetricType::Integer, "Open sockets")
            .metric(
                "nSocketsWithLivedataSessions",
                MetricType::Integer,
                "Open sockets with livedata sessions",
            )
    }

    fn collect(&self) -> InfoData {
        let sockets = self.registry.sockets();
        let with_session = sockets.iter().filter(|s| s.has_session).count();
        InfoData::new()
            .with("nSockets", sockets.len())
            .with("nSocketsWithLivedataSessions", with_session)
    }
}
