//! Shared helpers for integration scenarios.

#![allow(dead_code)]

use std::net::SocketAddr;

use ringchat::{
    ChatNode, Datagram, NodeId, RingChatError, ServerConfig, DGRAM_BUF_LEN,
};

use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration, Instant};

/// Loopback broadcast address. Broadcast frames are delivered to every
/// reuse-bound discovery socket on the host, which lets whole-cluster
/// scenarios run locally without touching a real network segment.
pub const LO_BCAST: &str = "127.255.255.255";

/// Millisecond-scale timing so scenarios converge quickly.
pub fn fast_config(discovery_port: u16) -> ServerConfig {
    ServerConfig {
        discovery_port,
        bcast_addr: LO_BCAST.into(),
        disc_interval_ms: 200,
        hb_interval_ms: 150,
        monitor_interval_ms: 150,
        evict_interval_ms: 100,
        hb_timeout_ms: 400,
        peer_timeout_ms: 400,
        boot_delay_ms: 300,
        chan_cap: 64,
    }
}

/// Boots a node on its own task; returns its id, the shutdown switch, and
/// the task handle.
pub async fn spawn_node(
    service_port: u16,
    config: ServerConfig,
) -> (
    NodeId,
    watch::Sender<bool>,
    JoinHandle<Result<(), RingChatError>>,
) {
    let mut node = ChatNode::new_and_setup(service_port, config)
        .await
        .expect("node setup failed");
    let id = node.id().clone();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { node.run(shutdown_rx).await });
    (id, shutdown_tx, handle)
}

/// Receives one decodable datagram, or `None` on timeout.
pub async fn recv_dgram(
    socket: &UdpSocket,
    wait: Duration,
) -> Option<(Datagram, SocketAddr)> {
    let mut buf = [0u8; DGRAM_BUF_LEN];
    loop {
        match timeout(wait, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, addr))) => {
                if let Ok(dgram) = Datagram::decode(&buf[..len]) {
                    return Some((dgram, addr));
                }
            }
            _ => return None,
        }
    }
}

/// Receives until a datagram matches `pred`, or `None` once `wait` has
/// elapsed without a match.
pub async fn recv_matching<F>(
    socket: &UdpSocket,
    wait: Duration,
    mut pred: F,
) -> Option<Datagram>
where
    F: FnMut(&Datagram) -> bool,
{
    let deadline = Instant::now() + wait;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        if let Some((dgram, _)) = recv_dgram(socket, deadline - now).await {
            if pred(&dgram) {
                return Some(dgram);
            }
        } else {
            return None;
        }
    }
}

/// Sends an encoded datagram.
pub async fn send_dgram(
    socket: &UdpSocket,
    dgram: &Datagram,
    addr: impl ToSocketAddrs,
) {
    socket
        .send_to(&dgram.encode().expect("encode failed"), addr)
        .await
        .expect("send failed");
}

/// Drains buffered datagrams until the socket falls silent.
pub async fn drain(socket: &UdpSocket) {
    while recv_dgram(socket, Duration::from_millis(100)).await.is_some() {}
}

/// Joins the service with retries until welcomed; returns the assigned
/// display name, or `None` if never welcomed within `wait`. Joins sent
/// before the node holds the leader role are dropped without admission,
/// so the retry that lands after the takeover is a first join and gets
/// the `welcome` reply.
pub async fn join_until_welcomed(
    socket: &UdpSocket,
    client_id: &str,
    service_port: u16,
    wait: Duration,
) -> Option<String> {
    let deadline = Instant::now() + wait;
    let port = socket.local_addr().expect("no local addr").port();
    while Instant::now() < deadline {
        let join = Datagram::Join {
            id: client_id.into(),
            port,
        };
        send_dgram(socket, &join, ("127.0.0.1", service_port)).await;
        let welcomed = recv_matching(socket, Duration::from_millis(300), |d| {
            matches!(d, Datagram::Welcome { .. })
        })
        .await;
        if let Some(Datagram::Welcome { name }) = welcomed {
            return Some(name);
        }
    }
    None
}
