// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the Instax emulator.

use thiserror::Error;

/// Reasons an inbound byte sequence is not a decodable frame.
///
/// Decode failures are never fatal: the caller logs and drops the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short: {len} bytes")]
    TooShort { len: usize },

    #[error("bad direction marker {found:02x?}")]
    BadHeader { found: [u8; 2] },

    #[error("frame truncated: declared {declared} bytes, got {actual}")]
    Truncated { declared: usize, actual: usize },

    #[error("payload of {len} bytes exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Top-level error type for all emulator operations.
#[derive(Debug, Error)]
pub enum InstaxError {
    // -- Protocol errors --
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    // -- Device state --
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unknown printer model: {0}")]
    UnknownModel(String),

    // -- Print errors --
    #[error("print storage error: {0}")]
    Storage(String),

    // -- Transport --
    #[error("transport error: {0}")]
    Transport(String),

    #[error("event channel closed")]
    ChannelClosed,

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl InstaxError {
    /// Shorthand for a rejected setter argument.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, InstaxError>;
