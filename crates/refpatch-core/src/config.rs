//! Mocker configuration
//!
//! [`MockerConfig`] can be built in code or loaded from TOML:
//!
//! ```toml
//! stop_on_drop = true
//!
//! [scan]
//! mapping_holders = true
//! slot_holders = true
//! collect_before_scan = false
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which holders a reference scan patches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Patch namespace entries (modules, instance dicts, type members)
    pub mapping_holders: bool,
    /// Patch fixed slots of slotted instances
    pub slot_holders: bool,
    /// Free unreachable objects before scanning
    pub collect_before_scan: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mapping_holders: true,
            slot_holders: true,
            collect_before_scan: false,
        }
    }
}

/// Mocker fixture configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockerConfig {
    /// Reference scan behavior
    pub scan: ScanConfig,
    /// Undo every patch when the fixture is dropped
    pub stop_on_drop: bool,
}

impl MockerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With scan configuration
    #[inline]
    #[must_use]
    pub fn with_scan(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    /// With stop-on-drop behavior
    #[inline]
    #[must_use]
    pub fn with_stop_on_drop(mut self, stop_on_drop: bool) -> Self {
        self.stop_on_drop = stop_on_drop;
        self
    }

    /// Parse from TOML text; missing keys take their defaults
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed input
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for MockerConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            stop_on_drop: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = MockerConfig::new();
        assert!(config.stop_on_drop);
        assert!(config.scan.mapping_holders);
        assert!(config.scan.slot_holders);
        assert!(!config.scan.collect_before_scan);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = MockerConfig::from_toml_str("[scan]\nslot_holders = false\n").unwrap();
        assert_eq!(
            config,
            MockerConfig::new().with_scan(ScanConfig {
                slot_holders: false,
                ..ScanConfig::default()
            })
        );
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(MockerConfig::from_toml_str("").unwrap(), MockerConfig::default());
    }

    #[test]
    fn malformed_toml_rejected() {
        let err = MockerConfig::from_toml_str("stop_on_drop = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = MockerConfig::from_file("/nonexistent/refpatch.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/refpatch.toml"));
    }
}
