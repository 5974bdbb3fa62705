// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print transfer state machine.
//
// Idle -> Receiving on a successful start, back to Idle on execute, cancel,
// precondition failure or disconnect.  At most one job exists; a second
// start while receiving replaces the first.

use tracing::{debug, info, warn};

use instax_core::JobId;

use crate::device_state::DeviceState;
use crate::protocol::STATUS_OUT_OF_MEMORY;
use crate::storage::{PrintStorage, SinkId, StoredPrint};

/// Bytes before the image data in a PRINT_DATA payload (chunk index).
pub const DATA_HEADER_LEN: usize = 4;

/// Minimum PRINT_START payload: 4-byte prefix plus 4-byte size.
pub const START_PAYLOAD_LEN: usize = 8;

/// Log progress every this many data chunks.
const PROGRESS_LOG_INTERVAL: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Receiving,
}

/// Why a start or execute was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintRejection {
    /// A device precondition failed; carries the status byte.
    Precondition(u8),
    /// The storage sink could not be opened.
    OutOfMemory,
}

impl PrintRejection {
    pub fn status(&self) -> u8 {
        match self {
            Self::Precondition(status) => *status,
            Self::OutOfMemory => STATUS_OUT_OF_MEMORY,
        }
    }
}

/// Outcome of a successful execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPrint {
    pub id: JobId,
    pub stored: StoredPrint,
    pub expected_size: u32,
    pub bytes_received: u32,
    pub chunks: u32,
}

/// The single in-flight print transfer.
pub struct PrintJob {
    state: JobState,
    id: JobId,
    expected_size: u32,
    bytes_received: u32,
    chunk_index: u32,
    sink: Option<SinkId>,
}

impl Default for PrintJob {
    fn default() -> Self {
        Self::new()
    }
}

impl PrintJob {
    pub fn new() -> Self {
        Self {
            state: JobState::Idle,
            id: JobId::new(),
            expected_size: 0,
            bytes_received: 0,
            chunk_index: 0,
            sink: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn expected_size(&self) -> u32 {
        self.expected_size
    }

    pub fn bytes_received(&self) -> u32 {
        self.bytes_received
    }

    pub fn chunk_index(&self) -> u32 {
        self.chunk_index
    }

    /// Begin a transfer of `expected_size` bytes into a sink called
    /// `sink_name`.
    pub fn start(
        &mut self,
        device: &DeviceState,
        storage: &mut dyn PrintStorage,
        expected_size: u32,
        sink_name: &str,
    ) -> Result<(), PrintRejection> {
        if let Some(status) = device.print_precondition() {
            warn!(status = format_args!("{status:#04x}"), "print start refused");
            self.abort(storage);
            return Err(PrintRejection::Precondition(status));
        }

        if self.state == JobState::Receiving {
            warn!(
                received = self.bytes_received,
                expected = self.expected_size,
                "new print start discards the transfer in progress"
            );
            self.abort(storage);
        }

        let sink = match storage.open_sink(sink_name) {
            Ok(sink) => sink,
            Err(e) => {
                warn!(error = %e, "could not open print sink");
                return Err(PrintRejection::OutOfMemory);
            }
        };

        self.state = JobState::Receiving;
        self.id = JobId::new();
        self.expected_size = expected_size;
        self.bytes_received = 0;
        self.chunk_index = 0;
        self.sink = Some(sink);
        info!(job_id = %self.id, expected_size, sink = sink_name, "print transfer started");
        Ok(())
    }

    /// Consume one data payload (`[index:4][image bytes]`).
    ///
    /// Storage errors are logged only; the sender always gets its ACK.
    pub fn data(&mut self, storage: &mut dyn PrintStorage, payload: &[u8]) {
        if payload.len() > DATA_HEADER_LEN {
            let image = &payload[DATA_HEADER_LEN..];
            match (self.state, self.sink) {
                (JobState::Receiving, Some(sink)) => {
                    if let Err(e) = storage.append(sink, image) {
                        warn!(error = %e, chunk = self.chunk_index, "print data not stored");
                    }
                    self.bytes_received = self.bytes_received.saturating_add(image.len() as u32);
                }
                _ => debug!(len = image.len(), "print data with no transfer in progress"),
            }
        }
        self.chunk_index = self.chunk_index.wrapping_add(1);

        if self.chunk_index % PROGRESS_LOG_INTERVAL == 0 {
            debug!(
                chunks = self.chunk_index,
                received = self.bytes_received,
                expected = self.expected_size,
                "print transfer progress"
            );
        }
    }

    /// Transfer closed by the sender.  Nothing is committed until execute.
    pub fn end(&self) {
        info!(
            received = self.bytes_received,
            expected = self.expected_size,
            chunks = self.chunk_index,
            "print transfer ended"
        );
        if self.state == JobState::Receiving && self.bytes_received != self.expected_size {
            warn!(
                received = self.bytes_received,
                expected = self.expected_size,
                "received size differs from announced size"
            );
        }
    }

    /// Commit the job.
    ///
    /// Returns `Ok(None)` when no transfer is active.  The caller applies the
    /// device counter changes.
    pub fn execute(
        &mut self,
        device: &DeviceState,
        storage: &mut dyn PrintStorage,
    ) -> Result<Option<CompletedPrint>, PrintRejection> {
        if let Some(status) = device.print_precondition() {
            warn!(status = format_args!("{status:#04x}"), "print execute refused");
            self.abort(storage);
            return Err(PrintRejection::Precondition(status));
        }

        let Some(sink) = self.sink.take() else {
            debug!("print execute with no transfer in progress");
            self.reset();
            return Ok(None);
        };

        let stored = match storage.finalize(sink) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "could not finalize print");
                self.reset();
                return Err(PrintRejection::OutOfMemory);
            }
        };

        let completed = CompletedPrint {
            id: self.id,
            stored,
            expected_size: self.expected_size,
            bytes_received: self.bytes_received,
            chunks: self.chunk_index,
        };
        info!(job_id = %completed.id, bytes = completed.bytes_received, "print executed");
        self.reset();
        Ok(Some(completed))
    }

    /// Drop the transfer in progress, if any.
    pub fn abort(&mut self, storage: &mut dyn PrintStorage) {
        if let Some(sink) = self.sink.take() {
            storage.discard(sink);
            info!(job_id = %self.id, received = self.bytes_received, "print transfer aborted");
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.state = JobState::Idle;
        self.sink = None;
        self.expected_size = 0;
        self.bytes_received = 0;
        self.chunk_index = 0;
    }
}

/// Announced image size from a PRINT_START payload.
pub fn parse_expected_size(payload: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = payload.get(4..START_PAYLOAD_LEN)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}
