//! Built-in providers.
//!
//! Each provider reads its subsystem through a narrow registry trait that
//! returns owned snapshots, so the embedding server decides how its internal
//! tables are exposed. Plain closures implement every registry trait.

pub mod observers;
pub mod process;
pub mod sessions;
pub mod sockets;

pub use observers::{
    MultiplexerSnapshot, ObserveDriver, ObserveHandle, ObserveStrategy, ObserverProvider,
    ObserverRegistry,
};
pub use process::ProcessProvider;
pub use sessions::{SessionProvider, SessionRegistry, SessionSnapshot};
pub use sockets::{SocketProvider, SocketRegistry, SocketSnapshot};
