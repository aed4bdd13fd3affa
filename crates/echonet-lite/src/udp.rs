//! Concrete UDP transport (§4.E): multicast sender/receiver and unicast
//! receiver, built on `std::net::UdpSocket` plus `socket2` for the socket
//! options `std` doesn't expose (`IP_MULTICAST_LOOP`, `SO_REUSEADDR`).

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Socket, Type};

use crate::error::TransportError;
use crate::transport::{
    MulticastReceiver as MulticastReceiverTrait, MulticastSender as MulticastSenderTrait,
    UdpEvent, UnicastReceiver as UnicastReceiverTrait,
};
use crate::types::ECHONET_PORT;

/// Each read blocks at most this long, so cancellation stays responsive
/// (§4.E, §5 "bounded by deadline ≤ 1s").
const READ_DEADLINE: Duration = Duration::from_secs(1);

fn multicast_group() -> Ipv4Addr {
    "224.0.23.0".parse().expect("multicast group literal is valid")
}

/// Joins `224.0.23.0:3610` and yields inbound datagrams (§4.E).
pub struct UdpMulticastReceiver {
    socket: UdpSocket,
}

impl UdpMulticastReceiver {
    pub fn bind() -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
        socket.set_reuse_address(true)?;
        let bind_addr: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, ECHONET_PORT).into();
        socket.bind(&bind_addr.into())?;
        socket.join_multicast_v4(&multicast_group(), &Ipv4Addr::UNSPECIFIED)?;
        socket.set_read_timeout(Some(READ_DEADLINE))?;
        Ok(Self { socket: socket.into() })
    }
}

impl MulticastReceiverTrait for UdpMulticastReceiver {
    fn recv(&mut self) -> Option<UdpEvent> {
        recv_one(&self.socket)
    }
}

/// Binds `*:3610` for unicast replies (§4.E `UnicastReceiver`).
pub struct UdpUnicastReceiver {
    socket: UdpSocket,
}

impl UdpUnicastReceiver {
    pub fn bind() -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, ECHONET_PORT))?;
        socket.set_read_timeout(Some(READ_DEADLINE))?;
        Ok(Self { socket })
    }
}

impl UnicastReceiverTrait for UdpUnicastReceiver {
    fn recv(&mut self) -> Option<UdpEvent> {
        recv_one(&self.socket)
    }
}

/// A single blocking read with the shared short deadline. Timeouts are
/// suppressed as a `Transient` event rather than ending the stream,
/// matching §4.E's "suppress transient Timeout reads without terminating
/// the stream" — callers that want to stop simply stop polling.
fn recv_one(socket: &UdpSocket) -> Option<UdpEvent> {
    let mut buf = [0u8; 1500];
    match socket.recv_from(&mut buf) {
        Ok((len, peer)) => Some(UdpEvent::Datagram { peer, bytes: buf[..len].to_vec() }),
        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock || err.kind() == std::io::ErrorKind::TimedOut => {
            Some(UdpEvent::Transient(TransportError::Timeout))
        }
        Err(err) => Some(UdpEvent::Transient(TransportError::Io(err))),
    }
}

/// Sends to `224.0.23.0:3610` with `IP_MULTICAST_LOOP` enabled so the
/// sender also observes its own announcements (§4.E — used to bootstrap
/// discovery).
pub struct UdpMulticastSender {
    socket: UdpSocket,
    target: SocketAddrV4,
}

impl UdpMulticastSender {
    pub fn bind() -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
        socket.set_multicast_loop_v4(true)?;
        let bind_addr: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into();
        socket.bind(&bind_addr.into())?;
        Ok(Self { socket: socket.into(), target: SocketAddrV4::new(multicast_group(), ECHONET_PORT) })
    }
}

impl MulticastSenderTrait for UdpMulticastSender {
    fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        self.socket.send_to(bytes, self.target)?;
        Ok(())
    }
}
