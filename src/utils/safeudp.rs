//! Safe UDP socket binding helper for shared-port datagram sockets.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket as StdUdpSocket};

use crate::utils::RingChatError;

use socket2::{Domain, Protocol, Socket, Type};

use tokio::net::UdpSocket;

/// Binds a UDP socket on `0.0.0.0:port` with `SO_REUSEADDR` (and
/// `SO_REUSEPORT` where available) set before binding, so that every server
/// and client process on a host can share the well-known discovery port.
/// Broadcast permission is enabled when `broadcast` is true.
///
/// Options must be set on a raw `socket2` socket prior to binding; the bound
/// socket is then converted into a tokio `UdpSocket`.
pub fn udp_bind_reusable(
    port: u16,
    broadcast: bool,
) -> Result<UdpSocket, RingChatError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(not(target_os = "windows"))]
    socket.set_reuse_port(true)?;
    if broadcast {
        socket.set_broadcast(true)?;
    }
    socket.set_nonblocking(true)?;

    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket.bind(&addr.into())?;

    let std_socket: StdUdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}
