// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reassembly of BLE write chunks into whole frames.
//
// The app splits frames larger than the negotiated MTU across several
// writes.  A chunk that starts with the to-device marker always begins a new
// frame; anything else continues the frame in progress.

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::frame::{self, Frame};
use crate::protocol::{DEFAULT_MAX_FRAME_SIZE, HEADER_TO_DEVICE};

/// Reassembly state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No frame in progress.
    Empty,
    /// Collecting chunks.  `expected` is `None` until four bytes (marker plus
    /// length) have arrived.
    Accumulating { expected: Option<usize> },
}

/// Counters describing dropped input, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    pub frames: u64,
    pub orphaned_chunks: u64,
    pub overflows: u64,
    pub decode_failures: u64,
}

/// Accumulates transport write chunks and yields complete frames.
pub struct Reassembler {
    buffer: BytesMut,
    state: State,
    max_frame_size: usize,
    stats: ReassemblyStats,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a reassembler that never buffers more than `max_frame_size` bytes.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_frame_size),
            state: State::Empty,
            max_frame_size,
            stats: ReassemblyStats::default(),
        }
    }

    /// Feed one transport chunk.
    ///
    /// Returns the decoded frame once the declared length has been reached.
    /// Malformed frames, orphaned continuations and overflowing input are
    /// dropped and logged.
    pub fn on_chunk(&mut self, chunk: &[u8]) -> Option<Frame> {
        if chunk.is_empty() {
            return None;
        }

        if chunk.starts_with(&HEADER_TO_DEVICE) {
            if self.state != State::Empty {
                debug!(
                    buffered = self.buffer.len(),
                    "new frame header discards incomplete frame"
                );
            }
            self.buffer.clear();
            self.state = State::Accumulating { expected: None };
        } else if self.state == State::Empty {
            self.stats.orphaned_chunks += 1;
            debug!(len = chunk.len(), "dropping continuation chunk with no frame in progress");
            return None;
        }

        if self.buffer.len() + chunk.len() > self.max_frame_size {
            self.stats.overflows += 1;
            warn!(
                buffered = self.buffer.len(),
                chunk = chunk.len(),
                max = self.max_frame_size,
                "reassembly buffer overflow, resetting"
            );
            self.reset();
            return None;
        }

        self.buffer.extend_from_slice(chunk);

        let expected = match self.state {
            State::Accumulating { expected: Some(n) } => n,
            _ => match frame::declared_length(&self.buffer) {
                Some(n) => {
                    if n > self.max_frame_size {
                        self.stats.overflows += 1;
                        warn!(declared = n, max = self.max_frame_size, "declared frame length too large, resetting");
                        self.reset();
                        return None;
                    }
                    self.state = State::Accumulating { expected: Some(n) };
                    n
                }
                None => return None,
            },
        };

        if self.buffer.len() < expected {
            trace!(buffered = self.buffer.len(), expected, "waiting for more chunks");
            return None;
        }

        let bytes = self.buffer.split().freeze();
        self.state = State::Empty;

        match frame::decode(&bytes) {
            Ok(frame) => {
                self.stats.frames += 1;
                Some(frame)
            }
            Err(e) => {
                self.stats.decode_failures += 1;
                warn!(error = %e, len = bytes.len(), "dropping malformed frame");
                None
            }
        }
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = State::Empty;
    }

    /// Whether a frame is currently being collected.
    pub fn is_accumulating(&self) -> bool {
        self.state != State::Empty
    }

    /// Bytes of the frame in progress.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }
}
