//! Chat server internals: membership tables, endpoint hubs, heartbeat
//! emitter, and the node driver loop.

mod clients;
mod heartbeat;
mod node;
mod peers;
mod transport;

pub use node::{ChatNode, ServerConfig};

pub(crate) use clients::ClientTable;
pub(crate) use heartbeat::Heartbeater;
pub(crate) use peers::{PeerRecord, PeerTable};
pub(crate) use transport::{DiscoveryHub, DiscoverySender, ServiceHub};
