//! Device-stream ingestion and spoofed UDP relay for beam position monitors.
//!
//! Sparkstream captures the fixed-format telemetry stream of a Libera
//! Spark-class beam position monitor at device sample rate, converts each
//! record to physical units for an in-process variable store, and (when
//! enabled) forwards the raw record bytes to a remote collector as
//! source-spoofed IPv4+UDP datagrams built on a raw socket.
//!
//! # Features
//!
//! - **Continuous ingestion**: a dedicated reader thread that survives
//!   device hiccups and framing glitches
//! - **Calibrated store**: torn-read-free access to the latest charge,
//!   position and shape values
//! - **Raw UDP relay**: hand-built IP/UDP headers with RFC 1071 checksums,
//!   toggled at runtime without interrupting ingestion
//! - **Hosting seam**: `get()`/`set()` variable callbacks for an external
//!   request/response layer
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sparkstream::{Sparkstream, StreamConfig};
//!
//! fn main() -> sparkstream::Result<()> {
//!     let config = StreamConfig::from_yaml_file("/nvram/cfg/sparkstream.yaml")?;
//!     let engine = Sparkstream::start(config)?;
//!
//!     // relaying is off until a client asks for it
//!     engine.relay().set_enabled(true);
//!
//!     if let Some(sample) = engine.latest() {
//!         println!("beam at x = {} mm", sample.pos_x);
//!     }
//!
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub mod config;
mod error;
pub mod reader;
pub mod record;
pub mod relay;
pub mod sample;
pub mod vars;

pub use config::StreamConfig;
pub use error::*;
pub use reader::{DeviceStream, ReaderHandle, RecordSource, StreamReader};
pub use record::{RECORD_SIZE, TelemetryRecord};
pub use relay::{
    RawSocketFactory, RawUdpEncoder, RelayController, RelayEndpoint, RelayError, RelayHandle,
    RelayStateSnapshot, TransportFactory,
};
pub use sample::{CalibratedSample, SampleStore};
pub use vars::{ReadVar, ReadWriteVar, VarValue, Variable, VariableTree};

/// Unified entry point for starting the ingestion engine.
pub struct Sparkstream;

impl Sparkstream {
    /// Start the engine against the configured device with the production
    /// raw-socket transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened or the configured
    /// record/header sizes cannot fit the packet buffer. Missing raw-socket
    /// privilege is *not* an error here; it surfaces later through the relay
    /// status when a client enables the relay.
    pub fn start(config: StreamConfig) -> Result<StreamEngine> {
        let device = DeviceStream::open(&config.device)?;
        StreamEngine::start(device, config, Arc::new(RawSocketFactory))
    }
}

/// Running ingestion engine.
///
/// Owns the reader thread, the sample store and the relay controller.
/// Dropping the engine cancels the reader; [`shutdown`](Self::shutdown)
/// additionally waits for it to exit (which may take one more blocking
/// device read).
pub struct StreamEngine {
    store: SampleStore,
    controller: Arc<RelayController>,
    variables: VariableTree,
    cancel: CancellationToken,
    reader: Option<ReaderHandle>,
    device_name: String,
}

impl StreamEngine {
    /// Start the engine with an explicit record source and transport
    /// factory. This is the seam used by tests and replay tooling;
    /// production code goes through [`Sparkstream::start`].
    pub fn start<S: RecordSource>(
        source: S,
        config: StreamConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<Self> {
        // Capacity mismatch is a build/configuration error; fail before the
        // reader thread exists.
        let encoder = RawUdpEncoder::new(config.source, config.target, RECORD_SIZE)?;

        let store = SampleStore::new();
        let relay = RelayHandle::new();
        let controller = Arc::new(RelayController::new(relay.clone(), config.target, factory));

        let cancel = CancellationToken::new();
        let reader =
            StreamReader::spawn(source, store.clone(), relay, encoder, cancel.clone())?;

        let variables = build_variable_tree(&store, &controller, &config);

        info!(
            "engine started: device {}, relay {} -> {}",
            config.device_name, config.source, config.target
        );

        Ok(Self {
            store,
            controller,
            variables,
            cancel,
            reader: Some(reader),
            device_name: config.device_name,
        })
    }

    /// The most recently ingested sample, if any record has arrived yet.
    pub fn latest(&self) -> Option<CalibratedSample> {
        self.store.latest()
    }

    /// Async stream of sample updates (latest-value semantics).
    pub fn samples(&self) -> impl Stream<Item = CalibratedSample> + Send + 'static {
        self.store.subscribe()
    }

    /// The relay controller, for toggling and observing the relay.
    pub fn relay(&self) -> &RelayController {
        &self.controller
    }

    /// Current relay state snapshot.
    pub fn relay_state(&self) -> RelayStateSnapshot {
        self.controller.state()
    }

    /// The variable tree exposed to the hosting layer.
    pub fn variables(&self) -> &VariableTree {
        &self.variables
    }

    /// The configured device name.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Stop the reader and wait for it to exit.
    ///
    /// The reader observes cancellation once per iteration, so this may
    /// block for one in-flight device read before returning.
    pub fn shutdown(mut self) {
        info!("engine shutting down");
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            reader.join();
        }
    }
}

impl Drop for StreamEngine {
    fn drop(&mut self) {
        debug!("engine dropped, cancelling reader");
        // Cancel without joining: a silent device could otherwise block the
        // dropping thread indefinitely. shutdown() is the joining path.
        self.cancel.cancel();
    }
}

fn build_variable_tree(
    store: &SampleStore,
    controller: &Arc<RelayController>,
    config: &StreamConfig,
) -> VariableTree {
    let mut tree = VariableTree::new();

    let name = config.device_name.clone();
    tree.register("Device.DeviceName", Arc::new(ReadVar(move || VarValue::Text(name.clone()))));

    // raw channel amplitudes
    let amplitudes: [(&str, fn(&CalibratedSample) -> i32); 4] = [
        ("Signals.SP.VA", |s| s.va),
        ("Signals.SP.VB", |s| s.vb),
        ("Signals.SP.VC", |s| s.vc),
        ("Signals.SP.VD", |s| s.vd),
    ];
    for (name, field) in amplitudes {
        let store = store.clone();
        tree.register(
            name,
            Arc::new(ReadVar(move || {
                VarValue::Int32(store.latest().as_ref().map(field).unwrap_or(0))
            })),
        );
    }

    // derived physical quantities
    let derived: [(&str, fn(&CalibratedSample) -> f64); 4] = [
        ("Signals.SP.Charge", |s| s.charge),
        ("Signals.SP.PosX", |s| s.pos_x),
        ("Signals.SP.PosY", |s| s.pos_y),
        ("Signals.SP.ShapeQ", |s| s.shape_q),
    ];
    for (name, field) in derived {
        let store = store.clone();
        tree.register(
            name,
            Arc::new(ReadVar(move || {
                VarValue::Double(store.latest().as_ref().map(field).unwrap_or(0.0))
            })),
        );
    }

    // source stream status: the engine only exists once the device is open
    tree.register("Stream.Status", Arc::new(ReadVar(|| VarValue::Int32(1))));

    let ctl = Arc::clone(controller);
    tree.register(
        "Stream.Error",
        Arc::new(ReadVar(move || VarValue::Int32(ctl.state().last_error.code()))),
    );

    let source = config.source;
    let target = config.target;
    tree.register(
        "Stream.SourceIP",
        Arc::new(ReadVar(move || VarValue::Text(source.addr.to_string()))),
    );
    tree.register(
        "Stream.SourcePort",
        Arc::new(ReadVar(move || VarValue::UInt32(u32::from(source.port)))),
    );
    tree.register(
        "Stream.TargetIP",
        Arc::new(ReadVar(move || VarValue::Text(target.addr.to_string()))),
    );
    tree.register(
        "Stream.TargetPort",
        Arc::new(ReadVar(move || VarValue::UInt32(u32::from(target.port)))),
    );

    let get_ctl = Arc::clone(controller);
    let set_ctl = Arc::clone(controller);
    tree.register(
        "Stream.Transmit",
        Arc::new(ReadWriteVar::new(
            move || VarValue::Bool(get_ctl.state().enabled),
            move |value| {
                set_ctl.set_from_value(&value);
            },
        )),
    );

    tree
}
