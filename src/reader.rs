//! Background reader loop ingesting records from the device stream.
//!
//! The reader runs on its own thread for the process lifetime and suspends
//! only inside the blocking device read. There is no read timeout: if the
//! device produces no data the thread blocks until it does, and shutdown may
//! have to wait out one in-flight read. Cancellation is observed once per
//! iteration through a [`CancellationToken`].
//!
//! Per iteration the loop reads one block, ignores anything that is not
//! exactly one record, updates the sample store unconditionally, and hands
//! the raw record bytes to the relay. Device read errors are logged and
//! retried after a bounded backoff; they never terminate the loop.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::record::{RECORD_SIZE, TelemetryRecord};
use crate::relay::{RawUdpEncoder, RelayHandle};
use crate::sample::{CalibratedSample, SampleStore};
use crate::{Result, StreamError};

/// Read buffer size. The device delivers exactly one record per `read()`,
/// but the buffer leaves room to observe (and discard) oversized reads.
pub const READ_BUFFER_SIZE: usize = 4 * RECORD_SIZE;

/// Backoff applied after a device read error before retrying.
const READ_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A blocking source of telemetry blocks.
///
/// Each call must return either one complete block or an error/short count;
/// the production implementation is the device file, tests inject scripted
/// sources.
pub trait RecordSource: Send + 'static {
    /// Block until the source yields data, filling `buf` and returning the
    /// byte count.
    fn read_block(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// The telemetry character device (e.g. `/dev/libera.strm0`).
pub struct DeviceStream {
    file: File,
    path: PathBuf,
}

impl DeviceStream {
    /// Open the device file for blocking reads.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::open(&path).map_err(|e| StreamError::device_error(path.clone(), e))?;
        info!("device stream open: {}", path.display());
        Ok(Self { file, path })
    }

    /// The device path this stream reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for DeviceStream {
    fn read_block(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

/// Handle to the spawned reader thread.
pub struct ReaderHandle {
    thread: thread::JoinHandle<()>,
}

impl ReaderHandle {
    /// Wait for the reader thread to exit. Call after cancelling its token;
    /// the thread may still complete one in-flight blocking read first.
    pub fn join(self) {
        if self.thread.join().is_err() {
            warn!("reader thread panicked");
        }
    }
}

/// Spawns and runs the ingest loop.
pub struct StreamReader;

impl StreamReader {
    /// Spawn the reader loop on a dedicated thread.
    ///
    /// The thread owns `source` (and drops it on exit) and runs until
    /// `cancel` is triggered. The `encoder` must have been constructed for
    /// [`RECORD_SIZE`] payloads before spawning; its capacity check is the
    /// startup guard against configuration mismatches.
    pub fn spawn<S: RecordSource>(
        source: S,
        store: SampleStore,
        relay: RelayHandle,
        encoder: RawUdpEncoder,
        cancel: CancellationToken,
    ) -> Result<ReaderHandle> {
        let thread = thread::Builder::new()
            .name("stream-reader".into())
            .spawn(move || read_loop(source, store, relay, encoder, cancel))
            .map_err(|e| StreamError::config_error_with_source(
                "failed to spawn reader thread",
                Box::new(e),
            ))?;
        Ok(ReaderHandle { thread })
    }
}

fn read_loop<S: RecordSource>(
    mut source: S,
    store: SampleStore,
    relay: RelayHandle,
    mut encoder: RawUdpEncoder,
    cancel: CancellationToken,
) {
    info!("stream reader started");
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut accepted = 0u64;

    while !cancel.is_cancelled() {
        match source.read_block(&mut buf) {
            Err(e) => {
                warn!("device read failed: {e}");
                thread::sleep(READ_RETRY_DELAY);
            }
            Ok(0) => {
                // EOF never happens on the live device; pacing the retry
                // keeps replayed file sources from spinning.
                thread::sleep(READ_RETRY_DELAY);
            }
            Ok(n) if n != RECORD_SIZE => {
                // framing guard, not an error
                trace!("discarding {n}-byte read");
            }
            Ok(_) => {
                let block = &buf[..RECORD_SIZE];
                match TelemetryRecord::decode(block) {
                    Ok(record) => {
                        accepted += 1;
                        store.publish(CalibratedSample::from_record(&record));
                        relay.transmit(&mut encoder, block);
                    }
                    Err(e) => {
                        // unreachable for a size-checked block
                        warn!("record decode failed: {e}");
                    }
                }
            }
        }
    }

    info!("stream reader stopped after {accepted} records");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelayEndpoint;
    use std::collections::VecDeque;
    use std::net::Ipv4Addr;
    use std::sync::mpsc;
    use std::time::Instant;

    fn test_encoder() -> RawUdpEncoder {
        RawUdpEncoder::new(
            RelayEndpoint::new(Ipv4Addr::new(10, 0, 0, 2), 2048),
            RelayEndpoint::new(Ipv4Addr::new(10, 0, 0, 1), 2049),
            RECORD_SIZE,
        )
        .expect("record fits buffer")
    }

    /// Source that replays a script of reads, then reports EOF.
    struct ScriptedSource {
        script: VecDeque<std::io::Result<Vec<u8>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<std::io::Result<Vec<u8>>>) -> Self {
            Self { script: script.into() }
        }
    }

    impl RecordSource for ScriptedSource {
        fn read_block(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.script.pop_front() {
                Some(Ok(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    /// Source fed through a channel; blocks like the real device.
    struct ChannelSource {
        rx: mpsc::Receiver<Vec<u8>>,
    }

    impl RecordSource for ChannelSource {
        fn read_block(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.rx.recv() {
                Ok(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                // sender gone: behave like a drained file
                Err(_) => Ok(0),
            }
        }
    }

    fn wait_for<F: Fn() -> bool>(condition: F) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met within deadline");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn record_bytes(sum: i32) -> Vec<u8> {
        TelemetryRecord { sum, ..Default::default() }.encode().to_vec()
    }

    #[test]
    fn valid_records_update_the_store() {
        let store = SampleStore::new();
        let cancel = CancellationToken::new();
        let source = ScriptedSource::new(vec![Ok(record_bytes(12345))]);

        let handle = StreamReader::spawn(
            source,
            store.clone(),
            RelayHandle::new(),
            test_encoder(),
            cancel.clone(),
        )
        .expect("spawns");

        wait_for(|| store.latest().is_some());
        let sample = store.latest().expect("sample present");
        assert_eq!(sample.charge, 1e-4 * 12345.0);

        cancel.cancel();
        handle.join();
    }

    #[test]
    fn short_and_oversized_reads_never_touch_the_store() {
        let store = SampleStore::new();
        let cancel = CancellationToken::new();
        let source = ScriptedSource::new(vec![
            Ok(vec![0u8; 1]),
            Ok(vec![0u8; RECORD_SIZE - 1]),
            Ok(vec![0u8; RECORD_SIZE + 1]),
            // sentinel: a valid record proves the loop survived the garbage
            Ok(record_bytes(100)),
        ]);

        let handle = StreamReader::spawn(
            source,
            store.clone(),
            RelayHandle::new(),
            test_encoder(),
            cancel.clone(),
        )
        .expect("spawns");

        wait_for(|| store.latest().is_some());
        assert_eq!(store.latest().expect("sample").charge, 0.01);

        cancel.cancel();
        handle.join();
    }

    #[test]
    fn read_errors_are_retried_not_fatal() {
        let store = SampleStore::new();
        let cancel = CancellationToken::new();
        let source = ScriptedSource::new(vec![
            Err(std::io::Error::other("transient device fault")),
            Ok(record_bytes(7)),
        ]);

        let handle = StreamReader::spawn(
            source,
            store.clone(),
            RelayHandle::new(),
            test_encoder(),
            cancel.clone(),
        )
        .expect("spawns");

        wait_for(|| store.latest().is_some());

        cancel.cancel();
        handle.join();
    }

    #[test]
    fn cancellation_stops_the_loop() {
        let store = SampleStore::new();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel::<Vec<u8>>();

        let handle = StreamReader::spawn(
            ChannelSource { rx },
            store.clone(),
            RelayHandle::new(),
            test_encoder(),
            cancel.clone(),
        )
        .expect("spawns");

        tx.send(record_bytes(1)).expect("reader alive");
        wait_for(|| store.latest().is_some());

        cancel.cancel();
        // unblock the pending read so the loop can observe the token
        drop(tx);
        handle.join();
    }
}
