//! Node logic -- service endpoint handling: client sessions and message
//! fanout.

use std::net::{IpAddr, SocketAddr};

use super::ChatNode;

use crate::utils::RingChatError;
use crate::wire::{ClientId, Datagram};
use crate::{pf_debug, pf_info, pf_warn};

// ChatNode client session handling and fanout
impl ChatNode {
    /// Handler of datagrams arriving on the service endpoint. Election
    /// tokens are ring duty and processed regardless of role; client
    /// traffic is only meaningful on the leader and dropped elsewhere.
    pub(super) async fn handle_service(
        &mut self,
        dgram: Datagram,
        addr: SocketAddr,
    ) -> Result<(), RingChatError> {
        if let Datagram::Election { token } = dgram {
            return self.handle_election(token).await;
        }

        if !self.is_leader {
            pf_debug!("not leader, dropping client datagram from {}", addr);
            return Ok(());
        }

        match dgram {
            Datagram::Join { id, port } => {
                self.handle_join(id, addr.ip(), port).await
            }
            Datagram::Message { id, text, .. } => {
                self.handle_message(id, text).await
            }
            Datagram::Leave { id } => self.handle_leave(id).await,
            _ => {
                pf_debug!("unexpected datagram on service endpoint, dropped");
                Ok(())
            }
        }
    }

    /// Admits a joining client, replies `welcome` with its assigned name,
    /// and notifies the rest of the group. A join from an already-admitted
    /// id gets no response at all.
    async fn handle_join(
        &mut self,
        id: ClientId,
        ip: IpAddr,
        port: u16,
    ) -> Result<(), RingChatError> {
        let (record, is_new) = self.clients.admit(id.clone(), ip, port);
        if !is_new {
            pf_debug!("duplicate join from {}, ignored", id.short());
            return Ok(());
        }
        let name = record.display_name.clone();
        let client_addr = record.client_addr();
        pf_info!("{} connected from {}", name, client_addr);

        let welcome = Datagram::Welcome { name: name.clone() };
        if let Err(e) = self.serv_hub.send_to(&welcome, client_addr).await {
            pf_warn!("welcome send to {} failed: {}", client_addr, e);
        }

        let notice = Datagram::Notice {
            text: format!("{} ist beigetreten.", name),
        };
        self.fanout(&notice, Some(&id)).await;
        Ok(())
    }

    /// Enriches a client message with the sender's display name and fans
    /// it out to everyone else. Messages from unknown senders (e.g. sent
    /// after a leave) are dropped.
    async fn handle_message(
        &mut self,
        id: ClientId,
        text: String,
    ) -> Result<(), RingChatError> {
        let sender_name = match self.clients.get(&id) {
            Some(record) => record.display_name.clone(),
            None => {
                pf_debug!("message from unknown client {}, dropped", id.short());
                return Ok(());
            }
        };
        pf_debug!("message from {}: {}", sender_name, text);

        let enriched = Datagram::Message {
            id: id.clone(),
            text,
            sender_name: Some(sender_name),
        };
        self.fanout(&enriched, Some(&id)).await;
        Ok(())
    }

    /// Releases a leaving client and notifies the remaining group. Unknown
    /// ids are ignored.
    async fn handle_leave(&mut self, id: ClientId) -> Result<(), RingChatError> {
        if let Some(record) = self.clients.release(&id) {
            pf_info!("{} left the chat", record.display_name);
            let notice = Datagram::Notice {
                text: format!("{} hat den Chat verlassen.", record.display_name),
            };
            self.fanout(&notice, None).await;
        }
        Ok(())
    }

    /// Best-effort unicast of a datagram to every admitted client except
    /// `exclude`. Per-client send errors are logged and skipped; the
    /// fanout always runs to completion.
    async fn fanout(&self, dgram: &Datagram, exclude: Option<&ClientId>) {
        for record in self.clients.iter() {
            if exclude == Some(&record.client_id) {
                continue;
            }
            if let Err(e) =
                self.serv_hub.send_to(dgram, record.client_addr()).await
            {
                pf_warn!(
                    "fanout send to {} at {} failed: {}",
                    record.display_name,
                    record.client_addr(),
                    e
                );
            }
        }
    }
}
