//! Manager configuration. Layered: defaults, then an optional YAML/JSON file, then env.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{VoidError, VoidResult};

pub const DEFAULT_SCAN_DEPTH: usize = 3;
/// Upper bound accepted for `recursive-scan-depth`.
pub const MAX_SCAN_DEPTH: usize = 64;
pub const SCAN_DEPTH_ENV: &str = "ITEMVOID_SCAN_DEPTH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct VoidConfig {
    /// Deepest container nesting level expanded during a poll; 0 is the discovered item's
    /// own container.
    pub recursive_scan_depth: usize,
}

impl Default for VoidConfig {
    fn default() -> Self { Self { recursive_scan_depth: DEFAULT_SCAN_DEPTH } }
}

impl VoidConfig {
    pub fn with_depth(recursive_scan_depth: usize) -> Self { Self { recursive_scan_depth } }

    /// Parse a YAML document (JSON is accepted too, being a YAML subset).
    pub fn from_yaml_str(doc: &str) -> VoidResult<Self> {
        if doc.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(doc)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> VoidResult<Self> {
        let path = path.as_ref();
        let doc = std::fs::read_to_string(path)
            .map_err(|source| VoidError::Io { path: path.display().to_string(), source })?;
        Self::from_yaml_str(&doc)
    }

    /// Full layering used by binaries: file (if any), env override, validation.
    pub fn load(path: Option<&Path>) -> VoidResult<Self> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        base.apply_env()?.validate()
    }

    pub fn apply_env(self) -> VoidResult<Self> {
        self.apply_overrides(|k| std::env::var(k).ok())
    }

    pub fn apply_overrides<F>(mut self, lookup: F) -> VoidResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(SCAN_DEPTH_ENV) {
            let depth = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| VoidError::Config(format!("{SCAN_DEPTH_ENV}={raw:?} is not a non-negative integer")))?;
            debug!(depth, "scan depth overridden from env");
            self.recursive_scan_depth = depth;
        }
        Ok(self)
    }

    pub fn validate(self) -> VoidResult<Self> {
        if self.recursive_scan_depth > MAX_SCAN_DEPTH {
            return Err(VoidError::Config(format!(
                "recursive-scan-depth {} exceeds maximum {}",
                self.recursive_scan_depth, MAX_SCAN_DEPTH
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_file_key() {
        assert_eq!(VoidConfig::default().recursive_scan_depth, 3);
        assert_eq!(VoidConfig::from_yaml_str("").unwrap(), VoidConfig::default());
        let c = VoidConfig::from_yaml_str("recursive-scan-depth: 5\n").unwrap();
        assert_eq!(c.recursive_scan_depth, 5);
        let j = VoidConfig::from_yaml_str(r#"{"recursive-scan-depth": 2}"#).unwrap();
        assert_eq!(j.recursive_scan_depth, 2);
    }

    #[test]
    fn env_override_wins() {
        let c = VoidConfig::with_depth(1)
            .apply_overrides(|k| (k == SCAN_DEPTH_ENV).then(|| "7".to_string()))
            .unwrap();
        assert_eq!(c.recursive_scan_depth, 7);

        let bad = VoidConfig::default().apply_overrides(|_| Some("deep".to_string()));
        assert!(matches!(bad, Err(VoidError::Config(_))));
    }

    #[test]
    fn validate_caps_depth() {
        assert!(VoidConfig::with_depth(MAX_SCAN_DEPTH).validate().is_ok());
        assert!(matches!(VoidConfig::with_depth(MAX_SCAN_DEPTH + 1).validate(), Err(VoidError::Config(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = VoidConfig::from_file("/nonexistent/itemvoid.yaml").unwrap_err();
        assert!(matches!(err, VoidError::Io { .. }));
    }
}
