//! Raw socket transport for the relay stream.
//!
//! The production transport is an `AF_INET`/`SOCK_RAW` socket with header
//! inclusion enabled, so the datagrams built by the encoder go out with
//! their spoofed IP header intact. Creating it requires elevated privilege;
//! failure to create one is a normal, recoverable condition reported through
//! the relay status, never a process failure.
//!
//! Both the transport and its factory are traits so the engine and the tests
//! can run without privileges or a network.

use std::io;
use std::net::SocketAddrV4;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::debug;

use super::packet::RelayEndpoint;

/// IP protocol number requesting a raw socket whose payload carries a
/// complete IP packet.
const IPPROTO_RAW: i32 = 255;

/// A transport that can send one complete, pre-built datagram.
pub trait RelayTransport: Send {
    /// Transmit `datagram` (IP header included) toward the collector.
    fn send(&self, datagram: &[u8]) -> io::Result<usize>;
}

/// Opens transports toward a collector endpoint.
///
/// The controller invokes this on every enable request; tests substitute
/// factories that count, deny or fail.
pub trait TransportFactory: Send + Sync {
    /// Open a transport toward `target`.
    fn open(&self, target: &RelayEndpoint) -> io::Result<Box<dyn RelayTransport>>;
}

/// Production factory creating raw IPv4 sockets with header inclusion.
pub struct RawSocketFactory;

impl TransportFactory for RawSocketFactory {
    fn open(&self, target: &RelayEndpoint) -> io::Result<Box<dyn RelayTransport>> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::from(IPPROTO_RAW)))?;
        socket.set_header_included_v4(true)?;
        let dest = SocketAddrV4::new(target.addr, target.port);
        debug!("raw relay socket open, target {dest}");
        Ok(Box::new(RawSocket { socket, dest: dest.into() }))
    }
}

/// Raw socket plus the resolved collector address.
struct RawSocket {
    socket: Socket,
    dest: SockAddr,
}

impl RelayTransport for RawSocket {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        self.socket.send_to(datagram, &self.dest)
    }
}
