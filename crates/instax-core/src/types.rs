// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Instax printer emulator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InstaxError;

/// Printer personality presented to the mobile app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    /// Instax Mini Link (600x800).
    #[default]
    Mini,
    /// Instax Square Link (800x800).
    Square,
    /// Instax Link Wide (1260x840).
    Wide,
}

impl Model {
    /// All supported models in registry order.
    pub const ALL: [Model; 3] = [Model::Mini, Model::Square, Model::Wide];

    /// Lowercase name used in logs, configuration and persisted state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mini => "mini",
            Self::Square => "square",
            Self::Wide => "wide",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Model {
    type Err = InstaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mini" => Ok(Self::Mini),
            "square" => Ok(Self::Square),
            "wide" => Ok(Self::Wide),
            other => Err(InstaxError::UnknownModel(other.to_owned())),
        }
    }
}

/// Film colour rendering selected by the app through the colour-correction
/// command.
///
/// The device stores the raw byte, so values outside this set are still
/// accepted; `from_byte` simply returns `None` for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrintMode {
    Rich,
    FunMode1,
    FunMode2,
    Natural,
}

impl PrintMode {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Rich),
            0x01 => Some(Self::FunMode1),
            0x02 => Some(Self::FunMode2),
            0x03 => Some(Self::Natural),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Rich => "Rich",
            Self::FunMode1 => "Fun Mode 1",
            Self::FunMode2 => "Fun Mode 2",
            Self::Natural => "Natural",
        }
    }
}

/// Simulated accelerometer reading reported by the LED/sensor query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Accelerometer {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub orientation: u8,
}

/// Unique identifier for a received print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A committed print, as recorded in the state store after a successful
/// execute command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintRecord {
    pub id: JobId,
    /// Name of the stored image (e.g. `print_1718000000.jpg`).
    pub file_name: String,
    /// Image bytes actually received over the wire.
    pub bytes_received: u32,
    /// Image size announced by the start command.
    pub expected_size: u32,
    /// SHA-256 of the stored image, lowercase hex.
    pub sha256: String,
    /// Personality active when the print was committed.
    pub model: Model,
    pub completed_at: DateTime<Utc>,
}

impl PrintRecord {
    /// Whether the transfer delivered exactly the announced number of bytes.
    pub fn is_complete(&self) -> bool {
        self.bytes_received == self.expected_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_parses_case_insensitively() {
        assert_eq!("Mini".parse::<Model>().unwrap(), Model::Mini);
        assert_eq!(" SQUARE ".parse::<Model>().unwrap(), Model::Square);
        assert_eq!("wide".parse::<Model>().unwrap(), Model::Wide);
        assert!("polaroid".parse::<Model>().is_err());
    }

    #[test]
    fn model_serializes_lowercase() {
        let json = serde_json::to_string(&Model::Wide).unwrap();
        assert_eq!(json, "\"wide\"");
        let back: Model = serde_json::from_str("\"square\"").unwrap();
        assert_eq!(back, Model::Square);
    }

    #[test]
    fn print_mode_known_and_unknown_bytes() {
        assert_eq!(PrintMode::from_byte(0x03), Some(PrintMode::Natural));
        assert_eq!(PrintMode::from_byte(0x03).map(|m| m.label()), Some("Natural"));
        assert_eq!(PrintMode::from_byte(0x07), None);
    }

    #[test]
    fn job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn record_completeness() {
        let mut record = PrintRecord {
            id: JobId::new(),
            file_name: "print_1.jpg".into(),
            bytes_received: 1234,
            expected_size: 1234,
            sha256: String::new(),
            model: Model::Mini,
            completed_at: Utc::now(),
        };
        assert!(record.is_complete());
        record.bytes_received = 1000;
        assert!(!record.is_complete());
    }
}
