//! Stream and relay configuration.
//!
//! The configuration supplies the device path, the device's display name and
//! the two fixed relay endpoints. It is loaded once at startup and treated
//! as immutable afterwards; only the relay enable flag changes at runtime.
//!
//! ```yaml
//! device: /dev/libera.strm0
//! device_name: BPM-04
//! source: { addr: 10.66.67.20, port: 2048 }
//! target: { addr: 10.66.67.1, port: 2048 }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::relay::RelayEndpoint;
use crate::{Result, StreamError};

/// Startup configuration for the ingestion engine and relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Path of the telemetry character device.
    pub device: PathBuf,
    /// Human-readable device name, exposed read-only to the hosting layer.
    pub device_name: String,
    /// Spoofed sender identity of the relay stream (this device).
    pub source: RelayEndpoint,
    /// Collector the relay stream is sent to.
    pub target: RelayEndpoint,
}

impl StreamConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| {
            StreamError::config_error_with_source("failed to parse configuration", Box::new(e))
        })
    }

    /// Load a configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(&path)
            .map_err(|e| StreamError::device_error(path.as_ref().to_path_buf(), e))?;
        Self::from_yaml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const EXAMPLE: &str = r#"
device: /dev/libera.strm0
device_name: BPM-04
source: { addr: 10.66.67.20, port: 2048 }
target: { addr: 10.66.67.1, port: 2049 }
"#;

    #[test]
    fn parses_example_configuration() {
        let config = StreamConfig::from_yaml_str(EXAMPLE).expect("valid config");
        assert_eq!(config.device, PathBuf::from("/dev/libera.strm0"));
        assert_eq!(config.device_name, "BPM-04");
        assert_eq!(config.source, RelayEndpoint::new(Ipv4Addr::new(10, 66, 67, 20), 2048));
        assert_eq!(config.target, RelayEndpoint::new(Ipv4Addr::new(10, 66, 67, 1), 2049));
    }

    #[test]
    fn round_trips_through_yaml() {
        let config = StreamConfig::from_yaml_str(EXAMPLE).expect("valid config");
        let yaml = serde_yaml_ng::to_string(&config).expect("serializes");
        let reparsed = StreamConfig::from_yaml_str(&yaml).expect("reparses");
        assert_eq!(config, reparsed);
    }

    #[test]
    fn rejects_malformed_yaml() {
        let result = StreamConfig::from_yaml_str("device: [not, a, path");
        assert!(matches!(result, Err(StreamError::Config { .. })));
    }

    #[test]
    fn rejects_missing_endpoints() {
        let result = StreamConfig::from_yaml_str("device: /dev/x\ndevice_name: y\n");
        assert!(matches!(result, Err(StreamError::Config { .. })));
    }

    #[test]
    fn rejects_invalid_address() {
        let yaml = EXAMPLE.replace("10.66.67.20", "not-an-address");
        assert!(StreamConfig::from_yaml_str(&yaml).is_err());
    }
}
