//! Calibrated sample values and the shared latest-value store.
//!
//! Every accepted telemetry record is converted to physical units and
//! published into a [`SampleStore`]. The store always holds the most recently
//! accepted record's values, overwritten in place; there is no interpolation
//! or smoothing. The control path reads it synchronously through
//! [`SampleStore::latest`] (this is what the variable-hosting callbacks use),
//! while async observers can follow updates through [`SampleStore::subscribe`].

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::record::TelemetryRecord;

/// Scaling from the amplitude sum to bunch charge in pC.
const CHARGE_SCALE: f64 = 1e-4;
/// Scaling from position numerators to millimetres.
const POSITION_SCALE: f64 = 1e-6;
/// Scaling from the shape numerator to the dimensionless shape parameter.
const SHAPE_SCALE: f64 = 1e-6;

/// Scalar values derived from one telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibratedSample {
    /// Channel A raw amplitude (pass-through).
    pub va: i32,
    /// Channel B raw amplitude (pass-through).
    pub vb: i32,
    /// Channel C raw amplitude (pass-through).
    pub vc: i32,
    /// Channel D raw amplitude (pass-through).
    pub vd: i32,
    /// Bunch charge in pC.
    pub charge: f64,
    /// Horizontal beam position in mm.
    pub pos_x: f64,
    /// Vertical beam position in mm.
    pub pos_y: f64,
    /// Bunch shape parameter.
    pub shape_q: f64,
}

impl CalibratedSample {
    /// Derive calibrated values from a raw record.
    ///
    /// Fixed-point scaling only; no rounding beyond floating-point
    /// representation.
    pub fn from_record(record: &TelemetryRecord) -> Self {
        Self {
            va: record.va,
            vb: record.vb,
            vc: record.vc,
            vd: record.vd,
            charge: CHARGE_SCALE * record.sum as f64,
            pos_x: POSITION_SCALE * record.x as f64,
            pos_y: POSITION_SCALE * record.y as f64,
            shape_q: SHAPE_SCALE * record.q as f64,
        }
    }
}

/// Shared store holding the most recently ingested sample.
///
/// Backed by a watch channel so a concurrent read during an in-progress
/// publish never observes a torn value. Cloning the store clones a handle to
/// the same underlying channel.
#[derive(Clone)]
pub struct SampleStore {
    tx: Arc<watch::Sender<Option<CalibratedSample>>>,
}

impl SampleStore {
    /// Create an empty store. `latest()` returns `None` until the first
    /// record is accepted.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Publish the values derived from the most recently accepted record.
    pub fn publish(&self, sample: CalibratedSample) {
        // send() only errs when no receiver exists, which is the normal
        // state here; send_replace stores the value unconditionally.
        self.tx.send_replace(Some(sample));
    }

    /// Synchronously read the current sample, if any record has been
    /// accepted yet. This is the read path for the variable-hosting
    /// layer's getter callbacks.
    pub fn latest(&self) -> Option<CalibratedSample> {
        *self.tx.borrow()
    }

    /// Subscribe to sample updates as an async stream.
    ///
    /// The stream yields the current value first (once one exists), then
    /// every subsequent update. Slow consumers observe latest-value
    /// semantics: intermediate samples are overwritten, never queued.
    pub fn subscribe(&self) -> impl Stream<Item = CalibratedSample> + Send + 'static {
        WatchStream::new(self.tx.subscribe()).filter_map(|opt| async move { opt })
    }
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new()
    }
}
