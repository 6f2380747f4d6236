//! Runtime configuration (`ferrule.toml`)

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::interp::container::DEFAULT_ORDER;

/// Default cap on nested dispatch depth
pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Restrict privileged operations. Unset leaves the flag for the host
    /// to decide at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_mode: Option<bool>,
    /// Nested calls beyond this fail with a stack overflow error
    pub max_call_depth: usize,
    /// Bucket order of fresh scopes
    pub initial_order: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            safe_mode: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            initial_order: DEFAULT_ORDER,
        }
    }
}

impl RuntimeConfig {
    /// Parse a TOML document
    pub fn from_toml(source: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Load from a file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io_error(format!("cannot read '{}': {}", path.display(), e)))?;
        Self::from_toml(&content).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Command-line flag wins over the file
    pub fn with_safe_mode_override(mut self, flag: bool) -> Self {
        if flag {
            self.safe_mode = Some(true);
        }
        self
    }
}
