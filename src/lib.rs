//! Public interface to the RingChat core library, linked by both the server
//! executable and the client executable.

#[macro_use]
mod utils;

mod client;
mod server;
mod wire;

pub use client::{ChatClientStub, ClientConfig, ClientEvent};
pub use server::{ChatNode, ServerConfig};
pub use utils::{logger_init, udp_bind_reusable, RingChatError, ME};
pub use wire::{ClientId, Datagram, DecodeError, NodeId, DGRAM_BUF_LEN};
