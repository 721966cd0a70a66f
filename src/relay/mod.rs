//! Optional spoofed UDP relay of ingested telemetry records.
//!
//! When enabled, every accepted record is forwarded to a remote collector as
//! a standard IPv4+UDP datagram whose source address and port are set to the
//! configured sender identity rather than assigned by the OS stack. The
//! headers are hand-built ([`packet`]) with RFC 1071 checksums ([`checksum`])
//! and sent on a raw socket ([`socket`]). Enable/disable intent, the last
//! operation result and the socket itself are shared state ([`state`])
//! driven by the control path ([`controller`]).

pub mod checksum;
pub mod controller;
pub mod packet;
pub mod socket;
pub mod state;

pub use controller::RelayController;
pub use packet::{IPV4_HEADER_LEN, PACKET_BUFFER_SIZE, RawUdpEncoder, RelayEndpoint, UDP_HEADER_LEN, datagram_len};
pub use socket::{RawSocketFactory, RelayTransport, TransportFactory};
pub use state::{RelayError, RelayHandle, RelayStateSnapshot};
