//! Chat server node: local state and the central event-driving loop.

mod discovery;
mod election;
mod service;

use std::net::{IpAddr, SocketAddr};

use crate::server::{
    ClientTable, DiscoveryHub, Heartbeater, PeerTable, ServiceHub,
};
use crate::utils::{set_me, RingChatError};
use crate::wire::{Datagram, NodeId};
use crate::{logged_err, parsed_config, pf_error, pf_info, pf_warn};

use serde::Deserialize;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Duration, Instant};

/// Server node configuration parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Well-known discovery port shared by all servers and clients.
    pub discovery_port: u16,

    /// Destination IP of discovery-port broadcasts. Overridable so tests
    /// can run on the loopback broadcast address.
    pub bcast_addr: String,

    /// Interval between `discover` self-announcements.
    pub disc_interval_ms: u64,

    /// Interval between leader heartbeat beacons.
    pub hb_interval_ms: u64,

    /// Interval between leader-liveness checks.
    pub monitor_interval_ms: u64,

    /// Interval between stale-peer eviction sweeps.
    pub evict_interval_ms: u64,

    /// Heartbeat silence after which the leader is deemed lost.
    pub hb_timeout_ms: u64,

    /// Observation silence after which a peer is evicted.
    pub peer_timeout_ms: u64,

    /// Delay before the startup election, leaving time for discovery.
    pub boot_delay_ms: u64,

    /// Capacity of the endpoint event channels.
    pub chan_cap: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            discovery_port: 5010,
            bcast_addr: "255.255.255.255".into(),
            disc_interval_ms: 10_000,
            hb_interval_ms: 10_000,
            monitor_interval_ms: 10_000,
            evict_interval_ms: 5_000,
            hb_timeout_ms: 20_000,
            peer_timeout_ms: 20_000,
            boot_delay_ms: 10_000,
            chan_cap: 256,
        }
    }
}

impl ServerConfig {
    /// Parses overrides from an optional TOML string on top of defaults.
    pub fn from_toml(conf_str: Option<&str>) -> Result<Self, RingChatError> {
        parsed_config!(conf_str => ServerConfig;
                       discovery_port, bcast_addr, disc_interval_ms,
                       hb_interval_ms, monitor_interval_ms, evict_interval_ms,
                       hb_timeout_ms, peer_timeout_ms, boot_delay_ms,
                       chan_cap)
    }
}

/// Chat server node. All table and role mutation happens inside the single
/// driver loop of `run()`; the endpoint hubs' listener tasks only decode
/// and forward.
pub struct ChatNode {
    /// My node id, fresh per process.
    id: NodeId,

    /// My service endpoint port.
    service_port: u16,

    config: ServerConfig,

    /// Whether I currently hold the leader role.
    is_leader: bool,

    /// Whether I have already forwarded a token in the current election
    /// round; reset on every observed leader announcement.
    has_voted: bool,

    /// Instant a foreign leader heartbeat was last heard.
    last_leader_heartbeat: Instant,

    peers: PeerTable,
    clients: ClientTable,

    disc_hub: DiscoveryHub,
    serv_hub: ServiceHub,
    heartbeater: Heartbeater,

    disc_rx: mpsc::Receiver<(Datagram, SocketAddr)>,
    serv_rx: mpsc::Receiver<(Datagram, SocketAddr)>,
}

impl ChatNode {
    /// Creates a node: generates a fresh id, binds both endpoints, and
    /// spawns their listener tasks. A bind failure here aborts startup.
    pub async fn new_and_setup(
        service_port: u16,
        config: ServerConfig,
    ) -> Result<Self, RingChatError> {
        let id = NodeId::generate();
        set_me(format!("s-{}", id.short()));

        let bcast_ip: IpAddr = config.bcast_addr.parse()?;
        let (disc_hub, disc_rx) = DiscoveryHub::new_and_setup(
            config.discovery_port,
            bcast_ip,
            config.chan_cap,
        )?;
        let (serv_hub, serv_rx) =
            ServiceHub::new_and_setup(service_port, config.chan_cap)?;

        pf_info!(
            "server {} up, service port {}, discovery port {}",
            id,
            service_port,
            config.discovery_port
        );

        let heartbeater =
            Heartbeater::new(Duration::from_millis(config.hb_interval_ms));
        Ok(ChatNode {
            id: id.clone(),
            service_port,
            is_leader: false,
            has_voted: false,
            last_leader_heartbeat: Instant::now(),
            peers: PeerTable::new(id),
            clients: ClientTable::new(),
            disc_hub,
            serv_hub,
            heartbeater,
            disc_rx,
            serv_rx,
            config,
        })
    }

    /// My node id.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Whether I currently hold the leader role.
    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    /// Runs the node's event loop until the shutdown signal flips to true.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), RingChatError> {
        let mut disc_interval =
            time::interval(Duration::from_millis(self.config.disc_interval_ms));
        let mut monitor_interval = time::interval(Duration::from_millis(
            self.config.monitor_interval_ms,
        ));
        let mut evict_interval =
            time::interval(Duration::from_millis(self.config.evict_interval_ms));

        // one-shot timer for the startup election
        let boot = time::sleep(Duration::from_millis(self.config.boot_delay_ms));
        tokio::pin!(boot);
        let mut booted = false;

        loop {
            tokio::select! {
                // datagram from the discovery endpoint
                event = self.disc_rx.recv() => match event {
                    Some((dgram, addr)) => {
                        self.handle_discovery(dgram, addr);
                    }
                    None => {
                        return logged_err!("discovery event channel closed");
                    }
                },

                // datagram from the service endpoint
                event = self.serv_rx.recv() => match event {
                    Some((dgram, addr)) => {
                        if let Err(e) = self.handle_service(dgram, addr).await {
                            pf_error!("error handling service datagram: {}", e);
                        }
                    }
                    None => {
                        return logged_err!("service event channel closed");
                    }
                },

                // periodic self-announcement
                _ = disc_interval.tick() => {
                    if let Err(e) = self.bcast_discover().await {
                        pf_warn!("discover broadcast failed: {}", e);
                    }
                },

                // startup election once the discovery grace period is over
                _ = &mut boot, if !booted => {
                    booted = true;
                    pf_info!("initiating election at startup");
                    if let Err(e) = self.initiate_election().await {
                        pf_error!("startup election failed: {}", e);
                    }
                },

                // leader liveness check
                _ = monitor_interval.tick() => {
                    if let Err(e) = self.check_leader_liveness().await {
                        pf_error!("leader liveness check failed: {}", e);
                    }
                },

                // stale peer eviction sweep
                _ = evict_interval.tick() => {
                    self.evict_stale_peers();
                },

                // graceful shutdown; a dropped sender also ends the loop
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                },
            }
        }

        pf_info!("shutting down");
        self.heartbeater.stop();
        Ok(())
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn default_timing_parameters() {
        let config = ServerConfig::default();
        assert_eq!(config.discovery_port, 5010);
        assert_eq!(config.disc_interval_ms, 10_000);
        assert_eq!(config.hb_timeout_ms, 20_000);
        assert_eq!(config.peer_timeout_ms, 20_000);
        assert_eq!(config.evict_interval_ms, 5_000);
        assert_eq!(config.bcast_addr, "255.255.255.255");
    }

    #[test]
    fn config_from_toml_overrides() -> Result<(), RingChatError> {
        let config = ServerConfig::from_toml(Some(
            "hb_timeout_ms = 2000\ndiscovery_port = 6010",
        ))?;
        assert_eq!(config.hb_timeout_ms, 2000);
        assert_eq!(config.discovery_port, 6010);
        assert_eq!(config.boot_delay_ms, 10_000);
        Ok(())
    }

    #[test]
    fn config_rejects_unknown_field() {
        assert!(ServerConfig::from_toml(Some("heartbeat_secs = 10")).is_err());
    }
}
