//! Shared relay state: enable intent, last operation result, packet counter
//! and the raw socket itself.
//!
//! Everything lives under one mutex. The control path toggles the relay and
//! owns socket creation/destruction; the reader loop only *uses* the socket
//! while it transmits. Keeping the flag and the socket under the same lock
//! closes the use-after-toggle race: the socket can never be used after the
//! control path has closed it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, warn};

use super::packet::RawUdpEncoder;
use super::socket::RelayTransport;

/// Result of the last relay operation, exposed through the status variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayError {
    /// No error; the last operation succeeded.
    #[default]
    None,
    /// The raw socket could not be created, typically for lack of privilege.
    NoSocketPermission,
    /// A datagram transmission failed; the relay auto-disabled itself.
    SendFailure,
    /// A relay-enable write carried a payload that is not a boolean.
    InvalidRequest,
}

impl RelayError {
    /// Numeric code for the status variable (0 means no error).
    pub fn code(&self) -> i32 {
        match self {
            RelayError::None => 0,
            RelayError::NoSocketPermission => 1,
            RelayError::SendFailure => 2,
            RelayError::InvalidRequest => 3,
        }
    }
}

/// A consistent snapshot of the relay state, taken under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStateSnapshot {
    /// Whether relaying is currently enabled.
    pub enabled: bool,
    /// Result of the last relay operation.
    pub last_error: RelayError,
    /// Datagrams sent since the relay was last enabled. Also used as the IP
    /// identification field.
    pub packet_counter: u32,
}

pub(crate) struct RelayShared {
    pub enabled: bool,
    pub last_error: RelayError,
    pub packet_counter: u32,
    pub socket: Option<Box<dyn RelayTransport>>,
}

impl RelayShared {
    fn snapshot(&self) -> RelayStateSnapshot {
        RelayStateSnapshot {
            enabled: self.enabled,
            last_error: self.last_error,
            packet_counter: self.packet_counter,
        }
    }
}

/// Handle to the shared relay state.
///
/// Cloned into both the reader loop and the controller; all access goes
/// through the internal mutex.
#[derive(Clone)]
pub struct RelayHandle {
    inner: Arc<Mutex<RelayShared>>,
}

impl RelayHandle {
    /// Create the relay state: disabled, no error, no socket.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RelayShared {
                enabled: false,
                last_error: RelayError::None,
                packet_counter: 0,
                socket: None,
            })),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RelayShared> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a consistent snapshot of the current state.
    pub fn snapshot(&self) -> RelayStateSnapshot {
        self.lock().snapshot()
    }

    /// Relay one record if the relay is enabled and healthy.
    ///
    /// Called from the reader loop for every accepted record. Increments the
    /// packet counter, encodes the datagram and transmits it. A send failure
    /// auto-disables the relay and drops the socket; ingestion continues
    /// regardless.
    pub(crate) fn transmit(&self, encoder: &mut RawUdpEncoder, payload: &[u8]) {
        let mut shared = self.lock();
        if !shared.enabled {
            return;
        }
        let Some(socket) = shared.socket.as_ref() else {
            return;
        };

        let counter = shared.packet_counter.wrapping_add(1);
        let datagram = match encoder.encode(payload, counter) {
            Ok(datagram) => datagram,
            Err(e) => {
                // cannot happen after the startup capacity check
                error!("datagram encoding failed: {e}");
                return;
            }
        };

        match socket.send(datagram) {
            Ok(_) => {
                shared.packet_counter = counter;
            }
            Err(e) => {
                warn!("relay transmission failed, disabling stream: {e}");
                shared.enabled = false;
                shared.last_error = RelayError::SendFailure;
                shared.socket = None;
            }
        }
    }
}

impl Default for RelayHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RECORD_SIZE;
    use crate::relay::packet::RelayEndpoint;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport {
        sent: Arc<AtomicUsize>,
        fail: bool,
    }

    impl RelayTransport for CountingTransport {
        fn send(&self, datagram: &[u8]) -> std::io::Result<usize> {
            if self.fail {
                return Err(std::io::Error::other("simulated send failure"));
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(datagram.len())
        }
    }

    fn test_encoder() -> RawUdpEncoder {
        RawUdpEncoder::new(
            RelayEndpoint::new(Ipv4Addr::new(10, 0, 0, 2), 2048),
            RelayEndpoint::new(Ipv4Addr::new(10, 0, 0, 1), 2049),
            RECORD_SIZE,
        )
        .expect("record fits buffer")
    }

    #[test]
    fn new_state_is_disabled_with_no_error() {
        let handle = RelayHandle::new();
        let state = handle.snapshot();
        assert!(!state.enabled);
        assert_eq!(state.last_error, RelayError::None);
        assert_eq!(state.packet_counter, 0);
    }

    #[test]
    fn transmit_is_a_no_op_while_disabled() {
        let handle = RelayHandle::new();
        let mut encoder = test_encoder();
        handle.transmit(&mut encoder, &[0u8; RECORD_SIZE]);
        assert_eq!(handle.snapshot().packet_counter, 0);
    }

    #[test]
    fn transmit_counts_datagrams() {
        let handle = RelayHandle::new();
        let sent = Arc::new(AtomicUsize::new(0));
        {
            let mut shared = handle.lock();
            shared.enabled = true;
            shared.socket =
                Some(Box::new(CountingTransport { sent: Arc::clone(&sent), fail: false }));
        }

        let mut encoder = test_encoder();
        for _ in 0..3 {
            handle.transmit(&mut encoder, &[1u8; RECORD_SIZE]);
        }

        assert_eq!(sent.load(Ordering::SeqCst), 3);
        assert_eq!(handle.snapshot().packet_counter, 3);
    }

    #[test]
    fn send_failure_auto_disables() {
        let handle = RelayHandle::new();
        let sent = Arc::new(AtomicUsize::new(0));
        {
            let mut shared = handle.lock();
            shared.enabled = true;
            shared.socket =
                Some(Box::new(CountingTransport { sent: Arc::clone(&sent), fail: true }));
        }

        let mut encoder = test_encoder();
        handle.transmit(&mut encoder, &[0u8; RECORD_SIZE]);

        let state = handle.snapshot();
        assert!(!state.enabled);
        assert_eq!(state.last_error, RelayError::SendFailure);

        // subsequent records do not attempt transmission
        handle.transmit(&mut encoder, &[0u8; RECORD_SIZE]);
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(RelayError::None.code(), 0);
        assert_eq!(RelayError::NoSocketPermission.code(), 1);
        assert_eq!(RelayError::SendFailure.code(), 2);
        assert_eq!(RelayError::InvalidRequest.code(), 3);
    }
}
