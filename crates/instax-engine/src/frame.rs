// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame codec for the Instax BLE protocol.
//
// Wire layout:
//
//   [marker0, marker1, len_hi, len_lo, function, operation, payload..., checksum]
//
// The length field counts the whole frame including the checksum.  The
// checksum is `255 - sum(preceding bytes)` modulo 256.  Inbound checksums are
// not verified: the app is known to send traffic the device accepts as-is.

use instax_core::error::FrameError;

use crate::protocol::{DEFAULT_MAX_FRAME_SIZE, FRAME_OVERHEAD, HEADER_FROM_DEVICE, HEADER_TO_DEVICE};

/// Which way a frame travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// App to printer (`41 62`).
    ToDevice,
    /// Printer to app (`61 42`).
    FromDevice,
}

impl Direction {
    pub fn marker(&self) -> [u8; 2] {
        match self {
            Self::ToDevice => HEADER_TO_DEVICE,
            Self::FromDevice => HEADER_FROM_DEVICE,
        }
    }
}

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub direction: Direction,
    pub function: u8,
    pub operation: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(direction: Direction, function: u8, operation: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            direction,
            function,
            operation,
            payload: payload.into(),
        }
    }

    /// Total encoded size in bytes.
    pub fn wire_len(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }

    /// Serialize this frame with its direction marker.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FrameError> {
        encode_with(self.direction, self.function, self.operation, &self.payload, DEFAULT_MAX_FRAME_SIZE)
    }
}

/// Checksum over `bytes`: `(255 - sum) & 0xFF` with a wrapping byte sum.
pub fn calculate_checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0xFFu8.wrapping_sub(sum)
}

/// Whether the trailing byte of `frame` matches the checksum of the rest.
///
/// Not used on the inbound path; provided for tooling and tests.
pub fn verify_checksum(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((last, body)) => calculate_checksum(body) == *last,
        None => false,
    }
}

/// Encode an app-to-printer frame.
pub fn encode(function: u8, operation: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    encode_with(Direction::ToDevice, function, operation, payload, DEFAULT_MAX_FRAME_SIZE)
}

/// Encode a printer-to-app frame.
pub fn encode_response(function: u8, operation: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    encode_with(Direction::FromDevice, function, operation, payload, DEFAULT_MAX_FRAME_SIZE)
}

/// Encode a frame with an explicit direction and size bound.
///
/// Fails with `PayloadTooLarge` when `payload.len() > max_frame_size - 7`.
pub fn encode_with(
    direction: Direction,
    function: u8,
    operation: u8,
    payload: &[u8],
    max_frame_size: usize,
) -> Result<Vec<u8>, FrameError> {
    // The length field is 16 bits wide whatever the configured bound.
    let limit = max_frame_size.min(usize::from(u16::MAX));
    let max_payload = limit.saturating_sub(FRAME_OVERHEAD);
    if payload.len() > max_payload {
        return Err(FrameError::PayloadTooLarge {
            len: payload.len(),
            max: max_payload,
        });
    }

    let total = payload.len() + FRAME_OVERHEAD;
    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&direction.marker());
    buf.extend_from_slice(&(total as u16).to_be_bytes());
    buf.push(function);
    buf.push(operation);
    buf.extend_from_slice(payload);
    buf.push(calculate_checksum(&buf));
    Ok(buf)
}

/// Length declared in bytes 2..4, if at least four bytes are present.
pub fn declared_length(bytes: &[u8]) -> Option<usize> {
    match bytes {
        [_, _, hi, lo, ..] => Some(usize::from(u16::from_be_bytes([*hi, *lo]))),
        _ => None,
    }
}

/// Decode an app-to-printer frame.
pub fn decode(bytes: &[u8]) -> Result<Frame, FrameError> {
    decode_with(Direction::ToDevice, bytes)
}

/// Decode a printer-to-app frame (used by client tooling and tests).
pub fn decode_response(bytes: &[u8]) -> Result<Frame, FrameError> {
    decode_with(Direction::FromDevice, bytes)
}

/// Decode a frame expecting the marker of `direction`.
///
/// Bytes beyond the declared length are ignored.
pub fn decode_with(direction: Direction, bytes: &[u8]) -> Result<Frame, FrameError> {
    if bytes.len() < FRAME_OVERHEAD {
        return Err(FrameError::TooShort { len: bytes.len() });
    }

    let found = [bytes[0], bytes[1]];
    if found != direction.marker() {
        return Err(FrameError::BadHeader { found });
    }

    let declared = usize::from(u16::from_be_bytes([bytes[2], bytes[3]]));
    if declared < FRAME_OVERHEAD {
        return Err(FrameError::TooShort { len: declared });
    }
    if bytes.len() < declared {
        return Err(FrameError::Truncated {
            declared,
            actual: bytes.len(),
        });
    }

    Ok(Frame {
        direction,
        function: bytes[4],
        operation: bytes[5],
        payload: bytes[6..declared - 1].to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Response builder
// ---------------------------------------------------------------------------

/// Builder for printer-to-app frames.
///
/// Multi-byte integers are big-endian except `i16_le`, which exists for the
/// accelerometer axes.
pub struct ResponseBuilder {
    function: u8,
    operation: u8,
    payload: Vec<u8>,
}

impl ResponseBuilder {
    pub fn new(function: u8, operation: u8) -> Self {
        Self {
            function,
            operation,
            payload: Vec::with_capacity(32),
        }
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.payload.push(value);
        self
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.payload.extend_from_slice(value);
        self
    }

    pub fn u16_be(&mut self, value: u16) -> &mut Self {
        self.payload.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn u32_be(&mut self, value: u32) -> &mut Self {
        self.payload.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i16_le(&mut self, value: i16) -> &mut Self {
        self.payload.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Length-prefixed string (one length byte, no terminator).
    pub fn short_string(&mut self, value: &str) -> &mut Self {
        let bytes = value.as_bytes();
        let len = bytes.len().min(usize::from(u8::MAX));
        self.payload.push(len as u8);
        self.payload.extend_from_slice(&bytes[..len]);
        self
    }

    pub fn build(&self) -> Result<Vec<u8>, FrameError> {
        encode_response(self.function, self.operation, &self.payload)
    }
}

/// Eight-byte acknowledgement: header, length, function, operation, status,
/// checksum.
pub fn ack(function: u8, operation: u8, status: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    buf.extend_from_slice(&HEADER_FROM_DEVICE);
    buf.extend_from_slice(&8u16.to_be_bytes());
    buf.push(function);
    buf.push(operation);
    buf.push(status);
    buf.push(calculate_checksum(&buf));
    buf
}
