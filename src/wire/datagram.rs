//! Typed wire datagrams and their JSON codec.

use crate::utils::RingChatError;
use crate::wire::{ClientId, NodeId};

use serde::{Deserialize, Serialize};

/// Receive buffer size for all UDP sockets. Oversized frames get truncated
/// by the transport and then fail decoding.
pub const DGRAM_BUF_LEN: usize = 1024;

/// All recognized `type` tags, in wire spelling.
const KNOWN_TAGS: [&str; 9] = [
    "discover",
    "heartbeat",
    "leader",
    "election",
    "join",
    "welcome",
    "message",
    "notice",
    "leave",
];

/// A self-describing datagram exchanged over UDP. Encoded as a UTF-8 JSON
/// record whose `type` field carries the variant tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Datagram {
    /// Periodic server self-announcement on the discovery port.
    Discover {
        id: NodeId,
        port: u16,
        #[serde(rename = "isLeader")]
        is_leader: bool,
    },

    /// Periodic leader beacon on the discovery port; also consumed by
    /// clients to locate the current leader.
    Heartbeat { id: NodeId, port: u16 },

    /// One-shot leader announcement broadcast by an election winner.
    Leader { id: NodeId, port: u16 },

    /// Election token, unicast to the ring successor's service port.
    Election { token: NodeId },

    /// Client join request, unicast to the leader's service port.
    Join { id: ClientId, port: u16 },

    /// Leader's reply to a join, carrying the assigned display name.
    Welcome { name: String },

    /// Chat message. `sender_name` is absent on the client-to-leader leg
    /// and injected by the leader before fanout.
    Message {
        id: ClientId,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_name: Option<String>,
    },

    /// System notice fanned out on client join/leave.
    Notice { text: String },

    /// Client leave notification, unicast to the leader's service port.
    Leave { id: ClientId },
}

/// Classification of datagram decode failures. Unknown tags are dropped
/// silently by listeners; malformed payloads are logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Well-formed record whose `type` tag is not recognized.
    UnknownType(String),
    /// Not a well-formed record of any recognized shape.
    Malformed(String),
}

impl Datagram {
    /// Encodes into a JSON byte payload.
    pub fn encode(&self) -> Result<Vec<u8>, RingChatError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a received payload, classifying failures into unknown-tag
    /// vs. malformed.
    pub fn decode(buf: &[u8]) -> Result<Datagram, DecodeError> {
        let value: serde_json::Value = serde_json::from_slice(buf)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let tag = match value.get("type").and_then(|t| t.as_str()) {
            Some(tag) => tag.to_owned(),
            None => {
                return Err(DecodeError::Malformed(
                    "record carries no `type` tag".into(),
                ));
            }
        };
        if !KNOWN_TAGS.contains(&tag.as_str()) {
            return Err(DecodeError::UnknownType(tag));
        }
        serde_json::from_value(value)
            .map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}
