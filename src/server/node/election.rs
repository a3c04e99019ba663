//! Node logic -- ring leader election (Chang--Roberts on the sorted id
//! ring).

use std::cmp::Ordering;

use super::ChatNode;

use crate::server::PeerRecord;
use crate::utils::RingChatError;
use crate::wire::{Datagram, NodeId};
use crate::{pf_debug, pf_info, pf_warn};

// ChatNode ring election engine
impl ChatNode {
    /// Handler of an incoming election token. My own token returning means
    /// it survived the whole ring, so the win rule applies even while
    /// participated (under concurrent initiations the winner has always
    /// voted by the time its token comes back). Foreign tokens are ignored
    /// while participated; the round reopens on the next observed leader
    /// announcement.
    pub(super) async fn handle_election(
        &mut self,
        token: NodeId,
    ) -> Result<(), RingChatError> {
        match token.cmp(&self.id) {
            // my own token came all the way around: I win
            Ordering::Equal => {
                pf_info!("election token returned, I won the election");
                self.has_voted = true;
                self.become_leader().await
            }
            _ if self.has_voted => {
                pf_debug!("election token ignored, already voted this round");
                Ok(())
            }
            // a greater token passes through unchanged
            Ordering::Greater => {
                self.has_voted = true;
                self.forward_token(token).await
            }
            // a lesser token is overtaken by my own id
            Ordering::Less => {
                self.has_voted = true;
                self.forward_token(self.id.clone()).await
            }
        }
    }

    /// Starts a new election round by forwarding my own id as the token.
    pub(super) async fn initiate_election(&mut self) -> Result<(), RingChatError> {
        pf_info!("starting leader election");
        self.forward_token(self.id.clone()).await
    }

    /// Forwards a token to the first reachable ring successor, evicting
    /// unreachable peers along the way. With no reachable successor the
    /// ring degenerates to myself and I take the leader role immediately.
    pub(super) async fn forward_token(
        &mut self,
        token: NodeId,
    ) -> Result<(), RingChatError> {
        let successors =
            ring_successors(&self.peers.snapshot_sorted(), &self.id);
        for peer in successors {
            let dgram = Datagram::Election {
                token: token.clone(),
            };
            match self.serv_hub.send_to(&dgram, peer.service_addr()).await {
                Ok(()) => {
                    pf_debug!(
                        "election token forwarded to {} at {}",
                        peer.node_id.short(),
                        peer.service_addr()
                    );
                    return Ok(());
                }
                Err(e) => {
                    pf_warn!(
                        "removing unreachable server {}: {}",
                        peer.node_id.short(),
                        e
                    );
                    self.peers.remove(&peer.node_id);
                }
            }
        }

        // ring degenerated to only myself
        pf_info!("no reachable ring successor, assuming leadership");
        self.become_leader().await
    }

    /// Takes up the leader role: announce it, start heartbeating, and begin
    /// a fresh client term.
    pub(super) async fn become_leader(&mut self) -> Result<(), RingChatError> {
        self.is_leader = true;
        self.has_voted = true;
        self.clients.clear();
        self.broadcast_leader().await?;
        self.heartbeater.start(
            self.disc_hub.sender(),
            self.id.clone(),
            self.service_port,
        );
        Ok(())
    }

    /// Broadcasts the one-shot leader announcement on the discovery port.
    pub(super) async fn broadcast_leader(&self) -> Result<(), RingChatError> {
        pf_info!("announcing myself as leader");
        self.disc_hub
            .bcast(&Datagram::Leader {
                id: self.id.clone(),
                port: self.service_port,
            })
            .await
    }
}

/// Ring successor candidates for `me`: all peers in cyclic id order
/// starting just past `me`, i.e. send targets at ring offsets 1, 2, ... in
/// turn. Input must be sorted ascending by id (a `snapshot_sorted` view).
fn ring_successors(sorted_peers: &[PeerRecord], me: &NodeId) -> Vec<PeerRecord> {
    let split = sorted_peers
        .iter()
        .position(|p| p.node_id > *me)
        .unwrap_or(sorted_peers.len());
    let mut successors = Vec::with_capacity(sorted_peers.len());
    successors.extend_from_slice(&sorted_peers[split..]);
    successors.extend_from_slice(&sorted_peers[..split]);
    successors
}

#[cfg(test)]
mod election_tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};

    use tokio::time::Instant;

    fn record(id: &str) -> PeerRecord {
        PeerRecord {
            node_id: NodeId::from(id),
            ip: IpAddr::from(Ipv4Addr::LOCALHOST),
            service_port: 5000,
            is_leader: false,
            last_seen: Instant::now(),
        }
    }

    fn ids(records: &[PeerRecord]) -> Vec<&str> {
        records.iter().map(|r| r.node_id.short()).collect()
    }

    #[test]
    fn successors_wrap_around_ring() {
        let peers = vec![record("aaa"), record("ccc"), record("eee")];

        // middle of the ring: greater ids first, then wrap to lesser ones
        let succs = ring_successors(&peers, &NodeId::from("bbb"));
        assert_eq!(ids(&succs), vec!["ccc", "eee", "aaa"]);

        // greatest id wraps straight to the smallest
        let succs = ring_successors(&peers, &NodeId::from("fff"));
        assert_eq!(ids(&succs), vec!["aaa", "ccc", "eee"]);

        // smallest id walks the ring in order
        let succs = ring_successors(&peers, &NodeId::from("000"));
        assert_eq!(ids(&succs), vec!["aaa", "ccc", "eee"]);
    }

    #[test]
    fn successors_empty_ring() {
        assert!(ring_successors(&[], &NodeId::from("bbb")).is_empty());
    }
}
