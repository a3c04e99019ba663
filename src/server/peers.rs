//! Peer table: the authoritative ring membership view.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use crate::wire::NodeId;

use tokio::time::{Duration, Instant};

/// Record of a known peer server.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    /// The peer's node id.
    pub node_id: NodeId,

    /// Source IP the peer was last observed from.
    pub ip: IpAddr,

    /// The peer's per-process service port.
    pub service_port: u16,

    /// Advisory leader flag, updated on `leader`/`heartbeat` observations.
    pub is_leader: bool,

    /// Instant of the latest observation.
    pub last_seen: Instant,
}

impl PeerRecord {
    /// Address of the peer's service endpoint.
    pub fn service_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.service_port)
    }
}

/// Set of known peer servers keyed by node id. Never contains the owning
/// node's own record.
#[derive(Debug)]
pub struct PeerTable {
    /// The owning node's id, excluded from all inserts.
    me: NodeId,

    peers: HashMap<NodeId, PeerRecord>,
}

impl PeerTable {
    /// Creates an empty table owned by node `me`.
    pub fn new(me: NodeId) -> Self {
        PeerTable {
            me,
            peers: HashMap::new(),
        }
    }

    /// Updates-or-inserts a peer observation, refreshing `last_seen`.
    /// Observations of the owner's own id are ignored. Returns true if the
    /// peer was previously unknown.
    pub fn observe(
        &mut self,
        node_id: &NodeId,
        ip: IpAddr,
        service_port: u16,
        is_leader: bool,
        now: Instant,
    ) -> bool {
        if *node_id == self.me {
            return false;
        }
        match self.peers.get_mut(node_id) {
            Some(record) => {
                record.ip = ip;
                record.service_port = service_port;
                record.is_leader = is_leader;
                // last_seen only ever advances
                record.last_seen = record.last_seen.max(now);
                false
            }
            None => {
                self.peers.insert(
                    node_id.clone(),
                    PeerRecord {
                        node_id: node_id.clone(),
                        ip,
                        service_port,
                        is_leader,
                        last_seen: now,
                    },
                );
                true
            }
        }
    }

    /// Marks the given peer as leader and clears the flag on all others.
    pub fn mark_leader(&mut self, node_id: &NodeId) {
        for record in self.peers.values_mut() {
            record.is_leader = record.node_id == *node_id;
        }
    }

    /// Removes entries not observed within `t_evict`. Returns the ids of
    /// evicted peers for logging.
    pub fn evict_stale(&mut self, now: Instant, t_evict: Duration) -> Vec<NodeId> {
        let stale: Vec<NodeId> = self
            .peers
            .values()
            .filter(|r| now.saturating_duration_since(r.last_seen) > t_evict)
            .map(|r| r.node_id.clone())
            .collect();
        for id in &stale {
            self.peers.remove(id);
        }
        stale
    }

    /// Removes a peer, e.g. an unreachable ring successor.
    pub fn remove(&mut self, node_id: &NodeId) -> Option<PeerRecord> {
        self.peers.remove(node_id)
    }

    /// Immutable snapshot of all peers, ordered ascending by node id. This
    /// is the ring membership view elections operate on.
    pub fn snapshot_sorted(&self) -> Vec<PeerRecord> {
        let mut snapshot: Vec<PeerRecord> = self.peers.values().cloned().collect();
        snapshot.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        snapshot
    }

    /// Number of known peers (excluding self).
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// True if no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
