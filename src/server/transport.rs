//! UDP endpoint hubs: socket ownership, listener tasks, send paths.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::pf_warn;
use crate::utils::{udp_bind_reusable, RingChatError};
use crate::wire::{Datagram, DecodeError, DGRAM_BUF_LEN};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Datagram event forwarded from a hub's listener task into the node's
/// driver loop, paired with its source address.
pub type DatagramEvent = (Datagram, SocketAddr);

/// Cheap cloneable sending handle onto the discovery socket; held by the
/// driver loop and by the heartbeat emitter task.
#[derive(Clone)]
pub struct DiscoverySender {
    socket: Arc<UdpSocket>,
    bcast_addr: SocketAddr,
}

impl DiscoverySender {
    /// Broadcasts a datagram to all discovery-port listeners on the
    /// broadcast domain.
    pub async fn bcast(&self, dgram: &Datagram) -> Result<(), RingChatError> {
        self.socket.send_to(&dgram.encode()?, self.bcast_addr).await?;
        Ok(())
    }
}

/// Hub owning the shared discovery endpoint: the well-known port bound with
/// address reuse and broadcast permission. A listener task decodes incoming
/// datagrams and forwards them into a bounded channel.
pub struct DiscoveryHub {
    sender: DiscoverySender,
}

impl DiscoveryHub {
    /// Binds the discovery socket and spawns its listener task. Returns the
    /// hub and the receive half of its event channel. Must be called from
    /// within a tokio runtime.
    pub fn new_and_setup(
        discovery_port: u16,
        bcast_ip: IpAddr,
        chan_cap: usize,
    ) -> Result<(Self, mpsc::Receiver<DatagramEvent>), RingChatError> {
        let socket = Arc::new(udp_bind_reusable(discovery_port, true)?);
        let (tx, rx) = mpsc::channel(chan_cap);
        tokio::spawn(listener_loop(socket.clone(), tx, "discovery"));

        let sender = DiscoverySender {
            socket,
            bcast_addr: SocketAddr::new(bcast_ip, discovery_port),
        };
        Ok((DiscoveryHub { sender }, rx))
    }

    /// Broadcasts a datagram on the discovery port.
    pub async fn bcast(&self, dgram: &Datagram) -> Result<(), RingChatError> {
        self.sender.bcast(dgram).await
    }

    /// Hands out a sending handle for auxiliary tasks.
    pub fn sender(&self) -> DiscoverySender {
        self.sender.clone()
    }
}

/// Hub owning the per-process service endpoint (unique port, all unicast).
/// Bind failure here is fatal to startup.
pub struct ServiceHub {
    socket: Arc<UdpSocket>,
}

impl ServiceHub {
    /// Binds the service socket and spawns its listener task. Returns the
    /// hub and the receive half of its event channel. Must be called from
    /// within a tokio runtime.
    pub fn new_and_setup(
        service_port: u16,
        chan_cap: usize,
    ) -> Result<(Self, mpsc::Receiver<DatagramEvent>), RingChatError> {
        // address-reuse like every socket in the system, but no broadcast
        let socket = Arc::new(udp_bind_reusable(service_port, false)?);

        let (tx, rx) = mpsc::channel(chan_cap);
        tokio::spawn(listener_loop(socket.clone(), tx, "service"));
        Ok((ServiceHub { socket }, rx))
    }

    /// Best-effort unicast of a datagram.
    pub async fn send_to(
        &self,
        dgram: &Datagram,
        addr: SocketAddr,
    ) -> Result<(), RingChatError> {
        self.socket.send_to(&dgram.encode()?, addr).await?;
        Ok(())
    }
}

/// Listener body shared by both hubs: read, decode, classify, forward.
/// Malformed payloads are logged and dropped; unknown tags are dropped
/// silently; no failure ever ends the loop. The loop exits only when the
/// node's receive half is gone.
async fn listener_loop(
    socket: Arc<UdpSocket>,
    tx: mpsc::Sender<DatagramEvent>,
    endpoint: &'static str,
) {
    let mut buf = [0u8; DGRAM_BUF_LEN];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, addr)) => match Datagram::decode(&buf[..len]) {
                Ok(dgram) => {
                    if tx.send((dgram, addr)).await.is_err() {
                        break; // node shut down
                    }
                }
                Err(DecodeError::UnknownType(_)) => {} // silent drop
                Err(DecodeError::Malformed(e)) => {
                    pf_warn!(
                        "malformed datagram on {} endpoint from {}: {}",
                        endpoint,
                        addr,
                        e
                    );
                }
            },
            Err(e) => {
                pf_warn!("recv error on {} endpoint: {}", endpoint, e);
            }
        }
    }
}

#[cfg(test)]
mod transport_tests {
    use super::*;

    use std::net::UdpSocket as StdUdpSocket;

    use crate::wire::NodeId;

    use tokio::time::{timeout, Duration};

    #[tokio::test(flavor = "multi_thread")]
    async fn service_hub_forwards_decoded_datagrams() -> Result<(), RingChatError>
    {
        let (hub, mut rx) = ServiceHub::new_and_setup(0, 16)?;
        let port = hub.socket.local_addr()?.port();

        let probe = StdUdpSocket::bind(("127.0.0.1", 0))?;
        probe.send_to(
            br#"{"type":"election","token":"abc"}"#,
            ("127.0.0.1", port),
        )?;

        let (dgram, _) = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no event before timeout")
            .expect("channel closed");
        assert_eq!(
            dgram,
            Datagram::Election {
                token: NodeId::from("abc")
            }
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn listener_survives_junk() -> Result<(), RingChatError> {
        let (hub, mut rx) = ServiceHub::new_and_setup(0, 16)?;
        let port = hub.socket.local_addr()?.port();

        let probe = StdUdpSocket::bind(("127.0.0.1", 0))?;
        // malformed, unknown tag, then a valid datagram: only the valid one
        // may surface, and the listener must still be alive for it
        probe.send_to(b"garbage", ("127.0.0.1", port))?;
        probe.send_to(br#"{"type":"gossip"}"#, ("127.0.0.1", port))?;
        probe.send_to(br#"{"type":"leave","id":"x"}"#, ("127.0.0.1", port))?;

        let (dgram, _) = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no event before timeout")
            .expect("channel closed");
        assert_eq!(
            dgram,
            Datagram::Leave {
                id: "x".into(),
            }
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn service_socket_binds_with_address_reuse() -> Result<(), RingChatError>
    {
        // both endpoints honor the address-reuse resource policy, so two
        // processes on one host may share a service port number
        let (_hub_a, _rx_a) = ServiceHub::new_and_setup(42950, 16)?;
        let (_hub_b, _rx_b) = ServiceHub::new_and_setup(42950, 16)?;
        Ok(())
    }
}
