//! Node logic -- discovery endpoint handling and peer maintenance.

use std::net::SocketAddr;

use super::ChatNode;

use crate::utils::RingChatError;
use crate::wire::Datagram;
use crate::{pf_debug, pf_info, pf_trace};

use tokio::time::{Duration, Instant};

// ChatNode discovery endpoint handling
impl ChatNode {
    /// Handler of datagrams arriving on the discovery endpoint. Everything
    /// here mutates local view only; no sends happen on this path.
    pub(super) fn handle_discovery(&mut self, dgram: Datagram, addr: SocketAddr) {
        match dgram {
            Datagram::Discover {
                id,
                port,
                is_leader,
            } => {
                if id == self.id {
                    return; // own announcement echoed back
                }
                if self
                    .peers
                    .observe(&id, addr.ip(), port, is_leader, Instant::now())
                {
                    pf_info!(
                        "discovered new server {} at {}:{}",
                        id.short(),
                        addr.ip(),
                        port
                    );
                }
            }

            Datagram::Heartbeat { id, port } => {
                if id == self.id {
                    return;
                }
                self.last_leader_heartbeat = Instant::now();
                self.peers
                    .observe(&id, addr.ip(), port, true, Instant::now());
                pf_trace!("heartbeat from leader {}:{}", addr.ip(), port);
                if self.is_leader {
                    // another node is beating as leader; yield the role
                    pf_info!(
                        "observed heartbeat from {}, stepping down",
                        id.short()
                    );
                    self.step_down();
                }
            }

            Datagram::Leader { id, port } => {
                // any leader announcement closes the current election round
                self.has_voted = false;
                if id == self.id {
                    pf_debug!("own leader announcement observed");
                    return;
                }
                if self.is_leader {
                    pf_info!(
                        "server {} announced itself leader, stepping down",
                        id.short()
                    );
                }
                self.step_down();
                self.peers
                    .observe(&id, addr.ip(), port, true, Instant::now());
                self.peers.mark_leader(&id);
                pf_info!("server {} has been elected as leader", id.short());
            }

            _ => {
                pf_debug!("unexpected datagram on discovery endpoint, dropped");
            }
        }
    }

    /// Broadcasts the periodic `discover` self-announcement.
    pub(super) async fn bcast_discover(&self) -> Result<(), RingChatError> {
        self.disc_hub
            .bcast(&Datagram::Discover {
                id: self.id.clone(),
                port: self.service_port,
                is_leader: self.is_leader,
            })
            .await
    }

    /// Checks leader liveness; kicks off a new election round once the
    /// heartbeat silence exceeds the timeout. Repeats on every check until
    /// some leader announces itself.
    pub(super) async fn check_leader_liveness(
        &mut self,
    ) -> Result<(), RingChatError> {
        if !self.is_leader
            && self.last_leader_heartbeat.elapsed()
                > Duration::from_millis(self.config.hb_timeout_ms)
        {
            pf_info!("leader unresponsive, initiating election");
            self.initiate_election().await?;
        }
        Ok(())
    }

    /// Evicts peers not observed within the configured timeout.
    pub(super) fn evict_stale_peers(&mut self) {
        let evicted = self.peers.evict_stale(
            Instant::now(),
            Duration::from_millis(self.config.peer_timeout_ms),
        );
        for id in evicted {
            pf_info!("evicted stale peer {}", id.short());
        }
    }

    /// Drops the leader role: stop the heartbeat emitter and discard the
    /// client session table (sessions do not survive a leader transition).
    pub(super) fn step_down(&mut self) {
        self.is_leader = false;
        self.heartbeater.stop();
        self.clients.clear();
    }
}
