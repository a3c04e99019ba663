//! Self-describing UDP datagram types shared by servers and clients.

mod datagram;
mod ids;

pub use datagram::{Datagram, DecodeError, DGRAM_BUF_LEN};
pub use ids::{ClientId, NodeId};
