//! Opaque identifier types for server nodes and chat clients.

use std::fmt;

use serde::{Deserialize, Serialize};

use uuid::Uuid;

/// Globally unique server node identifier, generated fresh at process start.
/// Total order is lexicographic on the canonical string form; this order
/// determines ring topology and election token precedence.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Generates a fresh identifier (UUID v4 canonical form).
    pub fn generate() -> Self {
        NodeId(Uuid::new_v4().to_string())
    }

    /// Short prefix of the identifier, for log line prefixes.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.into())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// Globally unique chat client identifier. Same shape as [`NodeId`] but a
/// distinct type; client ids never participate in ring ordering.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Generates a fresh identifier (UUID v4 canonical form).
    pub fn generate() -> Self {
        ClientId(Uuid::new_v4().to_string())
    }

    /// Short prefix of the identifier, for log line prefixes.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        ClientId(s.into())
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        ClientId(s)
    }
}
