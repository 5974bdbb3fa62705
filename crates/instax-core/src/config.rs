// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Emulator configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{InstaxError, Result};
use crate::types::Model;

/// File name of the configuration inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Persistent emulator settings.
///
/// Unknown fields are ignored and missing fields fall back to their defaults,
/// so older configuration files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Personality used when no persisted device state exists yet.
    pub model: Model,
    /// Address the development TCP transport listens on.
    pub listen_addr: String,
    /// Override for the data directory (database, prints).
    pub data_dir: Option<PathBuf>,
    /// Subdirectory of the data directory receiving finished prints.
    pub prints_dir_name: String,
    /// Pause before acknowledging each print data chunk, in milliseconds.
    pub data_ack_delay_ms: u64,
    /// Pause before the Wide follow-up status notification, in milliseconds.
    pub history_notify_delay_ms: u64,
    /// Upper bound on a single reassembled frame.
    pub max_frame_size: usize,
    /// Default `tracing` filter directive when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            model: Model::Mini,
            listen_addr: "127.0.0.1:7460".into(),
            data_dir: None,
            prints_dir_name: "prints".into(),
            data_ack_delay_ms: 50,
            history_notify_delay_ms: 100,
            max_frame_size: 4096,
            log_filter: "info".into(),
        }
    }
}

impl EmulatorConfig {
    /// Load the configuration from `path`.
    ///
    /// A missing file yields the defaults; a malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config: Self = serde_json::from_str(&text)?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        // Header, length, function, operation and checksum need 7 bytes.
        if self.max_frame_size < 7 || self.max_frame_size > usize::from(u16::MAX) {
            return Err(InstaxError::Config(format!(
                "max_frame_size {} outside 7..=65535",
                self.max_frame_size
            )));
        }
        if self.prints_dir_name.is_empty() {
            return Err(InstaxError::Config("prints_dir_name is empty".into()));
        }
        Ok(())
    }
}
