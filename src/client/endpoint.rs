//! Chat client protocol stub: leader discovery, session (re)binding, and
//! message exchange with the current leader.

use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::{Arc, Mutex};

use crate::utils::{set_me, udp_bind_reusable, RingChatError};
use crate::wire::{ClientId, Datagram, DecodeError, NodeId, DGRAM_BUF_LEN};
use crate::{parsed_config, pf_info, pf_warn};

use serde::Deserialize;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Client-side configuration parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Well-known discovery port leader heartbeats arrive on.
    pub discovery_port: u16,

    /// Capacity of the event channel toward the application shell.
    pub chan_cap: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            discovery_port: 5010,
            chan_cap: 256,
        }
    }
}

impl ClientConfig {
    /// Parses overrides from an optional TOML string on top of defaults.
    pub fn from_toml(conf_str: Option<&str>) -> Result<Self, RingChatError> {
        parsed_config!(conf_str => ClientConfig; discovery_port, chan_cap)
    }
}

/// Event surfaced to the client application shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A (new) leader was located; a join has been (re)sent to it.
    LeaderFound { id: NodeId, addr: SocketAddr },

    /// The leader acknowledged our join with our assigned display name.
    Welcome { name: String },

    /// A chat message relayed by the leader.
    Message { sender_name: String, text: String },

    /// A join/leave system notice.
    Notice { text: String },
}

/// Chat client protocol stub. Owns a shared-port discovery socket to hear
/// leader heartbeats and an ephemeral-port message socket for all unicast
/// traffic with the leader. Server-side sessions do not survive a leader
/// transition, so the discovery loop re-sends the join request whenever
/// the heartbeat source changes.
pub struct ChatClientStub {
    id: ClientId,

    msg_socket: Arc<UdpSocket>,

    /// Service address of the currently known leader, shared with the
    /// discovery loop that maintains it.
    leader_addr: Arc<Mutex<Option<SocketAddr>>>,

    event_rx: mpsc::Receiver<ClientEvent>,
}

impl ChatClientStub {
    /// Creates a stub: generates a fresh id, binds both sockets, and
    /// spawns the discovery and receive loops.
    pub async fn new_and_setup(
        config: ClientConfig,
    ) -> Result<Self, RingChatError> {
        let id = ClientId::generate();
        set_me(format!("c-{}", id.short()));

        let disc_socket = udp_bind_reusable(config.discovery_port, false)?;

        let std_socket = StdUdpSocket::bind(("0.0.0.0", 0))?;
        std_socket.set_nonblocking(true)?;
        let msg_socket = Arc::new(UdpSocket::from_std(std_socket)?);
        let msg_port = msg_socket.local_addr()?.port();

        let (event_tx, event_rx) = mpsc::channel(config.chan_cap);
        let leader_addr = Arc::new(Mutex::new(None));

        tokio::spawn(discovery_loop(
            disc_socket,
            id.clone(),
            msg_port,
            msg_socket.clone(),
            leader_addr.clone(),
            event_tx.clone(),
        ));
        tokio::spawn(recv_loop(msg_socket.clone(), event_tx));

        pf_info!("client {} up, message port {}", id, msg_port);
        Ok(ChatClientStub {
            id,
            msg_socket,
            leader_addr,
            event_rx,
        })
    }

    /// My client id.
    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Next event from the service; `None` once the stub is torn down.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.event_rx.recv().await
    }

    /// Sends a chat message to the current leader.
    pub async fn send_message(&self, text: &str) -> Result<(), RingChatError> {
        let dgram = Datagram::Message {
            id: self.id.clone(),
            text: text.into(),
            sender_name: None,
        };
        self.send_to_leader(&dgram).await
    }

    /// Notifies the leader that we are leaving the chat.
    pub async fn leave(&self) -> Result<(), RingChatError> {
        let dgram = Datagram::Leave {
            id: self.id.clone(),
        };
        self.send_to_leader(&dgram).await
    }

    async fn send_to_leader(&self, dgram: &Datagram) -> Result<(), RingChatError> {
        let addr = self
            .leader_addr
            .lock()
            .map_err(|_| RingChatError::msg("leader address lock poisoned"))?
            .ok_or_else(|| RingChatError::msg("no leader discovered yet"))?;
        self.msg_socket.send_to(&dgram.encode()?, addr).await?;
        Ok(())
    }
}

/// Listens for leader heartbeats on the discovery port and keeps the
/// leader address current. Every change of heartbeat source re-sends the
/// join request, establishing a fresh session with the new leader.
async fn discovery_loop(
    socket: UdpSocket,
    id: ClientId,
    msg_port: u16,
    msg_socket: Arc<UdpSocket>,
    leader_addr: Arc<Mutex<Option<SocketAddr>>>,
    event_tx: mpsc::Sender<ClientEvent>,
) {
    let mut buf = [0u8; DGRAM_BUF_LEN];
    let mut leader_id: Option<NodeId> = None;

    loop {
        let (len, addr) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                pf_warn!("recv error on discovery port: {}", e);
                continue;
            }
        };
        match Datagram::decode(&buf[..len]) {
            Ok(Datagram::Heartbeat { id: hb_id, port }) => {
                if leader_id.as_ref() == Some(&hb_id) {
                    continue; // same leader still beating
                }
                let new_addr = SocketAddr::new(addr.ip(), port);
                pf_info!("leader found: {} at {}", hb_id.short(), new_addr);
                leader_id = Some(hb_id.clone());
                if let Ok(mut guard) = leader_addr.lock() {
                    *guard = Some(new_addr);
                }

                // (re)join the new leader
                let join = Datagram::Join {
                    id: id.clone(),
                    port: msg_port,
                };
                match join.encode() {
                    Ok(payload) => {
                        if let Err(e) =
                            msg_socket.send_to(&payload, new_addr).await
                        {
                            pf_warn!("join send to {} failed: {}", new_addr, e);
                        }
                    }
                    Err(e) => pf_warn!("join encode failed: {}", e),
                }

                let event = ClientEvent::LeaderFound {
                    id: hb_id,
                    addr: new_addr,
                };
                if event_tx.send(event).await.is_err() {
                    break; // shell gone, stub torn down
                }
            }
            // discover/leader chatter among servers, not ours to handle
            Ok(_) | Err(DecodeError::UnknownType(_)) => {}
            Err(DecodeError::Malformed(e)) => {
                pf_warn!("malformed datagram on discovery port: {}", e);
            }
        }
    }
}

/// Receives `welcome`/`message`/`notice` datagrams from the leader and
/// surfaces them as events.
async fn recv_loop(socket: Arc<UdpSocket>, event_tx: mpsc::Sender<ClientEvent>) {
    let mut buf = [0u8; DGRAM_BUF_LEN];
    loop {
        let (len, addr) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                pf_warn!("recv error on message port: {}", e);
                continue;
            }
        };
        let event = match Datagram::decode(&buf[..len]) {
            Ok(Datagram::Welcome { name }) => {
                pf_info!("joined the chat as '{}'", name);
                ClientEvent::Welcome { name }
            }
            Ok(Datagram::Message {
                text, sender_name, ..
            }) => ClientEvent::Message {
                sender_name: sender_name.unwrap_or_else(|| "Unbekannt".into()),
                text,
            },
            Ok(Datagram::Notice { text }) => ClientEvent::Notice { text },
            Ok(_) => continue,
            Err(DecodeError::UnknownType(_)) => continue,
            Err(DecodeError::Malformed(e)) => {
                pf_warn!("malformed datagram from {}: {}", addr, e);
                continue;
            }
        };
        if event_tx.send(event).await.is_err() {
            break; // shell gone, stub torn down
        }
    }
}
