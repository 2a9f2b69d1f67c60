//! Link configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::protocol::{LinkError, CRC_INITIAL, DEFAULT_BAUD_RATE};

/// Default timeout for a single transport read, in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 200;

/// Default timeout before an outgoing write is dropped, in milliseconds
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 500;

/// Serial link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout; bounds how long the reader waits between stop checks
    pub read_timeout_ms: u64,
    /// A write that has not completed after this long is dropped
    pub write_timeout_ms: u64,
    /// Chunks buffered between the reader and the parser
    pub queue_capacity: usize,
    /// Largest chunk handed from the reader to the parser
    pub read_chunk_size: usize,
    /// CRC seed; must match the firmware
    pub crc_initial: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            queue_capacity: 64,
            read_chunk_size: 256,
            crc_initial: CRC_INITIAL,
        }
    }
}

impl LinkConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, LinkError> {
        let config: LinkConfig =
            serde_json::from_str(json).map_err(|e| LinkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LinkError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject values the link cannot run with
    pub fn validate(&self) -> Result<(), LinkError> {
        if self.baud_rate == 0 {
            return Err(LinkError::Config("baud_rate must be non-zero".into()));
        }
        if self.queue_capacity == 0 {
            return Err(LinkError::Config("queue_capacity must be non-zero".into()));
        }
        if self.read_chunk_size == 0 {
            return Err(LinkError::Config("read_chunk_size must be non-zero".into()));
        }
        if self.read_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(LinkError::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    /// Per-read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Per-frame write timeout
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_link_config_default() {
        let config = LinkConfig::default();
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.crc_initial, 0xFFFF);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = LinkConfig::from_json_str(r#"{ "baud_rate": 57600 }"#).unwrap();
        assert_eq!(config.baud_rate, 57600);
        assert_eq!(config.read_timeout_ms, DEFAULT_READ_TIMEOUT_MS);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            LinkConfig::from_json_str(r#"{ "queue_capacity": 0 }"#),
            Err(LinkError::Config(_))
        ));
        assert!(matches!(
            LinkConfig::from_json_str("not json"),
            Err(LinkError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "write_timeout_ms": 50, "read_chunk_size": 64 }}"#).unwrap();
        let config = LinkConfig::load(file.path()).unwrap();
        assert_eq!(config.write_timeout(), Duration::from_millis(50));
        assert_eq!(config.read_chunk_size, 64);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            LinkConfig::load("/nonexistent/eeva-link.json"),
            Err(LinkError::IoError(_))
        ));
    }
}
