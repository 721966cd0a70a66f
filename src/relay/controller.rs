//! Synchronous relay control entry point.
//!
//! Invoked by the variable-hosting layer's write callback for the
//! relay-enable variable. Opening and closing the raw socket is fast and
//! independent of the reader's blocking device read, so control requests
//! never stall on ingestion. Failures are recorded in the relay state and
//! surfaced through the status variables; the request itself always
//! completes.

use std::sync::Arc;

use tracing::{info, warn};

use super::packet::RelayEndpoint;
use super::socket::TransportFactory;
use super::state::{RelayError, RelayHandle, RelayStateSnapshot};
use crate::vars::VarValue;

/// Toggles the relay on and off, owning raw socket creation and teardown.
pub struct RelayController {
    state: RelayHandle,
    target: RelayEndpoint,
    factory: Arc<dyn TransportFactory>,
}

impl RelayController {
    /// Create a controller driving `state`, opening transports toward
    /// `target` through `factory`.
    pub fn new(
        state: RelayHandle,
        target: RelayEndpoint,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self { state, target, factory }
    }

    /// Enable or disable the relay. Idempotent: requesting the current
    /// state is a no-op that leaves the last error untouched.
    ///
    /// Enabling creates the raw socket and resets the packet counter; a
    /// creation failure (typically missing privilege) leaves the relay
    /// disabled with [`RelayError::NoSocketPermission`]. Disabling closes
    /// the socket and clears the last error.
    pub fn set_enabled(&self, enable: bool) -> RelayStateSnapshot {
        let mut shared = self.state.lock();
        if enable == shared.enabled {
            drop(shared);
            return self.state.snapshot();
        }

        if enable {
            match self.factory.open(&self.target) {
                Ok(socket) => {
                    info!("relay enabled, target {}", self.target);
                    shared.socket = Some(socket);
                    shared.enabled = true;
                    shared.last_error = RelayError::None;
                    shared.packet_counter = 0;
                }
                Err(e) => {
                    warn!("failed to create raw relay socket: {e}");
                    shared.socket = None;
                    shared.enabled = false;
                    shared.last_error = RelayError::NoSocketPermission;
                }
            }
        } else {
            info!("relay disabled");
            shared.socket = None;
            shared.enabled = false;
            shared.last_error = RelayError::None;
        }

        drop(shared);
        self.state.snapshot()
    }

    /// Handle a write request from the variable-hosting layer.
    ///
    /// Anything other than a well-formed boolean is rejected with
    /// [`RelayError::InvalidRequest`] and has no effect on the enable flag.
    pub fn set_from_value(&self, value: &VarValue) -> RelayStateSnapshot {
        match value {
            VarValue::Bool(enable) => self.set_enabled(*enable),
            other => {
                warn!("relay enable request with non-boolean payload: {other:?}");
                let mut shared = self.state.lock();
                shared.last_error = RelayError::InvalidRequest;
                drop(shared);
                self.state.snapshot()
            }
        }
    }

    /// Current relay state.
    pub fn state(&self) -> RelayStateSnapshot {
        self.state.snapshot()
    }

    /// The collector endpoint this controller relays toward.
    pub fn target(&self) -> RelayEndpoint {
        self.target
    }
}
