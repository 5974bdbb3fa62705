// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command dispatcher: decoded frame in, response frames out.
//
// Dispatch is by (function, operation).  Model-specific bytes come from the
// profile tables so the handlers below do not branch on the model.  Pacing
// delays are returned alongside the frames and applied by the engine.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, trace, warn};

use instax_core::{FrameError, PrintRecord};

use crate::device_state::{DeviceHandle, DeviceState};
use crate::frame::{Frame, ResponseBuilder, ack};
use crate::gatt::AuxChannel;
use crate::print_job::{self, PrintJob};
use crate::protocol::*;
use crate::storage::{self, PrintStorage};

/// Additional-info type 0 payload after the type echo (byte-exact, meaning unknown).
const ADDITIONAL_INFO_TYPE0: [u8; 8] = [0xC3, 0x80, 0x00, 0xBE, 0x00, 0x00, 0x00, 0x00];

/// Unsolicited status frame sent after a Wide print-history response.
const HISTORY_FOLLOW_UP_PAYLOAD: [u8; 5] = [0x00, 0x01, 0x00, 0x00, 0x00];

/// Where an outbound frame is notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Primary,
    Aux(AuxChannel),
}

/// One frame to send, after waiting `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub delay: Duration,
    pub target: Target,
    pub bytes: Vec<u8>,
}

impl Outbound {
    pub fn now(bytes: Vec<u8>) -> Self {
        Self {
            delay: Duration::ZERO,
            target: Target::Primary,
            bytes,
        }
    }

    pub fn after(delay: Duration, bytes: Vec<u8>) -> Self {
        Self {
            delay,
            target: Target::Primary,
            bytes,
        }
    }
}

/// Result of dispatching one frame.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Frames in send order.
    pub responses: Vec<Outbound>,
    /// Set when the frame committed a print.
    pub committed: Option<PrintRecord>,
}

impl Dispatch {
    fn single(bytes: Vec<u8>) -> Self {
        Self {
            responses: vec![Outbound::now(bytes)],
            committed: None,
        }
    }

    fn silent() -> Self {
        Self::default()
    }
}

/// Pacing applied to particular responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub data_ack_delay: Duration,
    pub history_notify_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            data_ack_delay: Duration::from_millis(50),
            history_notify_delay: Duration::from_millis(100),
        }
    }
}

pub struct Dispatcher {
    device: DeviceHandle,
    job: PrintJob,
    storage: Box<dyn PrintStorage>,
    timings: Timings,
}

impl Dispatcher {
    pub fn new(device: DeviceHandle, storage: Box<dyn PrintStorage>) -> Self {
        Self {
            device,
            job: PrintJob::new(),
            storage,
            timings: Timings::default(),
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    pub fn job(&self) -> &PrintJob {
        &self.job
    }

    /// Build the responses for one decoded frame.
    pub fn dispatch(&mut self, frame: &Frame) -> Dispatch {
        trace!(
            function = %function_name(frame.function),
            operation = format_args!("{:#04x}", frame.operation),
            len = frame.payload.len(),
            "dispatching frame"
        );
        let result = match frame.function {
            FUNC_INFO => self.handle_info(frame),
            FUNC_DEVICE_CONTROL => Ok(self.handle_device_control(frame)),
            FUNC_PRINT => Ok(self.handle_print(frame)),
            FUNC_LED => self.handle_led(frame),
            other => {
                warn!(function = format_args!("{other:#04x}"), "unknown function, dropping frame");
                Ok(Dispatch::silent())
            }
        };
        result.unwrap_or_else(|e| {
            warn!(error = %e, "could not build response");
            Dispatch::silent()
        })
    }

    /// Connection lost: drop any transfer in progress.
    pub fn on_disconnect(&mut self) {
        self.job.abort(self.storage.as_mut());
    }

    // -- Info (0x00) --

    fn handle_info(&mut self, frame: &Frame) -> Result<Dispatch, FrameError> {
        let state = self.device.snapshot();
        let (f, op, payload) = (frame.function, frame.operation, frame.payload.as_slice());
        let p = state.profile();

        match op {
            OP_IDENTIFY => {
                let bytes = ResponseBuilder::new(f, op)
                    .bytes(&[0x00, 0x01, 0x00, p.identify_byte])
                    .bytes(&[0x00; 5])
                    .build()?;
                Ok(Dispatch::single(bytes))
            }
            OP_INFO_STRING => {
                let Some(&query) = payload.first() else {
                    debug!("string query without selector");
                    return Ok(Dispatch::single(ack(f, op, STATUS_OK)));
                };
                match info_string(&state, query) {
                    Some(value) => {
                        debug!(query, value, "string query");
                        let bytes = ResponseBuilder::new(f, op)
                            .u8(0x00)
                            .u8(query)
                            .short_string(value)
                            .build()?;
                        Ok(Dispatch::single(bytes))
                    }
                    None => {
                        debug!(query, "unknown string query");
                        Ok(Dispatch::single(ack(f, op, STATUS_OK)))
                    }
                }
            }
            OP_SUPPORT_FUNCTION_INFO => self.support_function_info(&state, f, op, payload),
            _ => {
                debug!(operation = format_args!("{op:#04x}"), "unhandled info operation");
                Ok(Dispatch::single(ack(f, op, STATUS_OK)))
            }
        }
    }

    fn support_function_info(
        &self,
        state: &DeviceState,
        f: u8,
        op: u8,
        payload: &[u8],
    ) -> Result<Dispatch, FrameError> {
        let p = state.profile();

        if payload.is_empty() || payload == [0x00] {
            debug!(width = state.width, height = state.height, "image dimension query");
            let bytes = ResponseBuilder::new(f, op)
                .bytes(&[0x00, 0x00])
                .u16_be(state.width)
                .u16_be(state.height)
                .bytes(p.dimension_tail)
                .build()?;
            return Ok(Dispatch::single(bytes));
        }

        let info_type = payload[0];
        let mut b = ResponseBuilder::new(f, op);
        b.u8(0x00).u8(info_type);
        match info_type {
            INFO_IMAGE_SUPPORT => {
                b.u16_be(state.width).u16_be(state.height).bytes(p.image_support_tail);
            }
            INFO_BATTERY => {
                b.u8(p.battery_state_byte)
                    .u8(state.battery_percent)
                    .bytes(&[0x00, 0x10]);
            }
            INFO_PRINTER_FUNCTION => {
                let capability = p.capability_byte(state.photos_remaining, state.charging);
                debug!(capability = format_args!("{capability:#04x}"), "printer function query");
                b.u8(capability)
                    .bytes(&[0x00, 0x00])
                    .u8(state.photos_remaining)
                    .bytes(&[0x00; 4]);
            }
            INFO_PRINT_HISTORY => {
                b.u32_be(state.lifetime_print_count).bytes(&[0x00, 0x00, 0x00, 0x07]);
                let mut dispatch = Dispatch::single(b.build()?);
                if p.history_follow_up {
                    let follow_up = ResponseBuilder::new(FUNC_INFO, OP_IDENTIFY)
                        .bytes(&HISTORY_FOLLOW_UP_PAYLOAD)
                        .build()?;
                    dispatch
                        .responses
                        .push(Outbound::after(self.timings.history_notify_delay, follow_up));
                }
                return Ok(dispatch);
            }
            other => {
                debug!(info_type = other, "unknown support info type");
                return Ok(Dispatch::single(ack(f, op, STATUS_OK)));
            }
        }
        Ok(Dispatch::single(b.build()?))
    }

    // -- Device control (0x01) --

    fn handle_device_control(&mut self, frame: &Frame) -> Dispatch {
        let (f, op) = (frame.function, frame.operation);
        match op {
            OP_AUTO_SLEEP_SETTINGS => {
                if let Some(&minutes) = frame.payload.first() {
                    self.device.set_auto_sleep(minutes);
                }
            }
            OP_BLE_CONNECT => debug!("BLE connect management"),
            OP_SHUTDOWN | OP_RESET => info!(operation = format_args!("{op:#04x}"), "power command ignored"),
            _ => debug!(operation = format_args!("{op:#04x}"), "unhandled device control operation"),
        }
        Dispatch::single(ack(f, op, STATUS_OK))
    }

    // -- Print (0x10) --

    fn handle_print(&mut self, frame: &Frame) -> Dispatch {
        let (f, op, payload) = (frame.function, frame.operation, frame.payload.as_slice());
        match op {
            OP_PRINT_START => {
                let Some(expected_size) = print_job::parse_expected_size(payload) else {
                    warn!(len = payload.len(), "print start payload too short, ignoring");
                    return Dispatch::silent();
                };
                let state = self.device.snapshot();
                let name = storage::sink_name(Utc::now().timestamp());
                let status = match self.job.start(&state, self.storage.as_mut(), expected_size, &name) {
                    Ok(()) => STATUS_OK,
                    Err(rejection) => rejection.status(),
                };
                Dispatch::single(ack(f, op, status))
            }
            OP_PRINT_DATA => {
                self.job.data(self.storage.as_mut(), payload);
                Dispatch {
                    responses: vec![Outbound::after(
                        self.timings.data_ack_delay,
                        ack(f, op, STATUS_OK),
                    )],
                    committed: None,
                }
            }
            OP_PRINT_END => {
                self.job.end();
                Dispatch::single(ack(f, op, STATUS_OK))
            }
            OP_PRINT_CANCEL => {
                info!("print cancelled by app");
                self.job.abort(self.storage.as_mut());
                Dispatch::single(ack(f, op, STATUS_OK))
            }
            OP_PRINT_EXECUTE => self.execute(f, op),
            _ => {
                debug!(operation = format_args!("{op:#04x}"), "unhandled print operation");
                Dispatch::single(ack(f, op, STATUS_OK))
            }
        }
    }

    fn execute(&mut self, f: u8, op: u8) -> Dispatch {
        let job = &mut self.job;
        let storage = self.storage.as_mut();
        match self.device.commit_print_with(|state| job.execute(state, storage)) {
            Ok(Some((done, after))) => {
                let record = PrintRecord {
                    id: done.id,
                    file_name: done.stored.name,
                    bytes_received: done.bytes_received,
                    expected_size: done.expected_size,
                    sha256: done.stored.sha256,
                    model: after.model,
                    completed_at: Utc::now(),
                };
                Dispatch {
                    responses: vec![Outbound::now(ack(f, op, STATUS_OK))],
                    committed: Some(record),
                }
            }
            Ok(None) => Dispatch::single(ack(f, op, STATUS_OK)),
            Err(rejection) => Dispatch::single(ack(f, op, rejection.status())),
        }
    }

    // -- LED / sensor (0x30) --

    fn handle_led(&mut self, frame: &Frame) -> Result<Dispatch, FrameError> {
        let (f, op, payload) = (frame.function, frame.operation, frame.payload.as_slice());
        match op {
            OP_XYZ_AXIS_INFO => {
                let a = self.device.snapshot().accelerometer;
                let bytes = ResponseBuilder::new(f, op)
                    .i16_le(a.x)
                    .i16_le(a.y)
                    .i16_le(a.z)
                    .u8(a.orientation)
                    .build()?;
                Ok(Dispatch::single(bytes))
            }
            OP_COLOR_CORRECTION => {
                if let Some(&mode) = payload.first() {
                    self.device.set_print_mode(mode);
                }
                Ok(Dispatch::single(ack(f, op, STATUS_OK)))
            }
            OP_ADDITIONAL_INFO => {
                let query = payload.first().copied().unwrap_or(0);
                let mut b = ResponseBuilder::new(f, op);
                b.u8(0x00).u8(query);
                match query {
                    0x00 => {
                        b.bytes(&ADDITIONAL_INFO_TYPE0);
                    }
                    0x01 => {
                        let block = self.device.with_state(|s| s.profile().additional_info_block);
                        b.bytes(&[0x00, 0x00, 0x00]).bytes(&block).bytes(&[0x00; 4]);
                    }
                    other => {
                        debug!(query = other, "unknown additional info query");
                        return Ok(Dispatch::single(ack(f, op, STATUS_OK)));
                    }
                }
                Ok(Dispatch::single(b.build()?))
            }
            OP_AR_LED_VIBRATION | OP_AXIS_ACTION_SETTINGS | OP_POWER_LED_SETTING => {
                debug!(operation = format_args!("{op:#04x}"), len = payload.len(), "LED setting ignored");
                Ok(Dispatch::single(ack(f, op, STATUS_OK)))
            }
            _ => {
                debug!(operation = format_args!("{op:#04x}"), "LED/sensor command acknowledged");
                Ok(Dispatch::single(ack(f, op, STATUS_OK)))
            }
        }
    }
}

/// String answered to a string query, if the selector is known.
fn info_string(state: &DeviceState, query: u8) -> Option<&str> {
    Some(match query {
        QUERY_MODEL_NUMBER => state.model_number.as_str(),
        QUERY_SERIAL_NUMBER => state.serial_number.as_str(),
        QUERY_ADDITIONAL_INFO => ADDITIONAL_INFO_STRING,
        QUERY_FIRMWARE_REVISION => state.firmware_revision.as_str(),
        QUERY_HARDWARE_REVISION => state.hardware_revision.as_str(),
        QUERY_SOFTWARE_REVISION => state.software_revision.as_str(),
        QUERY_MANUFACTURER => state.manufacturer_name.as_str(),
        QUERY_DEVICE_NAME => state.device_name.as_str(),
        QUERY_VERSION => VERSION_STRING,
        QUERY_VERSION_EXTRA => VERSION_EXTRA_STRING,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Direction, calculate_checksum, decode_response};
    use crate::storage::MemoryStorage;
    use instax_core::Model;

    fn dispatcher(model: Model) -> Dispatcher {
        Dispatcher::new(
            DeviceHandle::new(DeviceState::defaults_for(model)),
            Box::new(MemoryStorage::new()),
        )
    }

    fn send(d: &mut Dispatcher, function: u8, operation: u8, payload: &[u8]) -> Dispatch {
        d.dispatch(&Frame::new(Direction::ToDevice, function, operation, payload.to_vec()))
    }

    fn only(dispatch: &Dispatch) -> &[u8] {
        assert_eq!(dispatch.responses.len(), 1, "expected one response");
        &dispatch.responses[0].bytes
    }

    fn status(dispatch: &Dispatch) -> u8 {
        let bytes = only(dispatch);
        assert_eq!(bytes.len(), 8, "expected an ACK");
        bytes[6]
    }

    fn start_payload(size: u32) -> Vec<u8> {
        let mut p = vec![0x02, 0x00, 0x00, 0x00];
        p.extend_from_slice(&size.to_be_bytes());
        p
    }

    // -- Info --

    #[test]
    fn identify_distinguishes_wide() {
        let mut wide = dispatcher(Model::Wide);
        let bytes = only(&send(&mut wide, FUNC_INFO, OP_IDENTIFY, &[])).to_vec();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..2], &HEADER_FROM_DEVICE);
        assert_eq!(&bytes[6..15], &[0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let mut mini = dispatcher(Model::Mini);
        assert_eq!(only(&send(&mut mini, FUNC_INFO, OP_IDENTIFY, &[]))[9], 0x02);
    }

    #[test]
    fn string_query_returns_length_prefixed_value() {
        let mut d = dispatcher(Model::Square);
        let bytes = only(&send(&mut d, FUNC_INFO, OP_INFO_STRING, &[QUERY_MODEL_NUMBER])).to_vec();
        let frame = decode_response(&bytes).unwrap();
        assert_eq!(frame.payload, [&[0x00u8, 0x01, 5][..], &b"FI017"[..]].concat());

        let bytes = only(&send(&mut d, FUNC_INFO, OP_INFO_STRING, &[QUERY_VERSION])).to_vec();
        assert_eq!(&decode_response(&bytes).unwrap().payload[3..], b"00010012");
    }

    #[test]
    fn unknown_or_missing_string_query_acks() {
        let mut d = dispatcher(Model::Mini);
        assert_eq!(status(&send(&mut d, FUNC_INFO, OP_INFO_STRING, &[0x42])), STATUS_OK);
        assert_eq!(status(&send(&mut d, FUNC_INFO, OP_INFO_STRING, &[])), STATUS_OK);
    }

    #[test]
    fn dimension_query_sizes_per_model() {
        let mut wide = dispatcher(Model::Wide);
        let bytes = only(&send(&mut wide, FUNC_INFO, OP_SUPPORT_FUNCTION_INFO, &[0x00])).to_vec();
        assert_eq!(
            bytes,
            vec![
                0x61, 0x42, 0x00, 0x13, 0x00, 0x02, 0x00, 0x00, 0x04, 0xEC, 0x03, 0x48, 0x02, 0x7B, 0x00, 0x05,
                0x28, 0x00, 0x62
            ]
        );

        let mut square = dispatcher(Model::Square);
        let bytes = only(&send(&mut square, FUNC_INFO, OP_SUPPORT_FUNCTION_INFO, &[])).to_vec();
        assert_eq!(bytes.len(), 23);
        assert_eq!(&bytes[8..12], &[0x03, 0x20, 0x03, 0x20]);
        assert_eq!(bytes[22], 0x69);
    }

    #[test]
    fn image_support_type_uses_profile_tail() {
        let mut mini = dispatcher(Model::Mini);
        let bytes = only(&send(&mut mini, FUNC_INFO, OP_SUPPORT_FUNCTION_INFO, &[0x00, 0x00])).to_vec();
        let payload = decode_response(&bytes).unwrap().payload;
        assert_eq!(&payload[..6], &[0x00, 0x00, 0x02, 0x58, 0x03, 0x20]);
        assert_eq!(&payload[6..], profile_tail(Model::Mini));
    }

    fn profile_tail(model: Model) -> &'static [u8] {
        crate::profile::profile(model).image_support_tail
    }

    #[test]
    fn battery_info_matches_capture() {
        let mut d = dispatcher(Model::Mini);
        d.device().set_battery(80).unwrap();
        let bytes = only(&send(&mut d, FUNC_INFO, OP_SUPPORT_FUNCTION_INFO, &[INFO_BATTERY])).to_vec();
        assert_eq!(
            bytes,
            vec![0x61, 0x42, 0x00, 0x0D, 0x00, 0x02, 0x00, 0x01, 0x03, 0x50, 0x00, 0x10, 0xE9]
        );
    }

    #[test]
    fn printer_function_encodes_capability_and_legacy_count() {
        let mut d = dispatcher(Model::Wide);
        d.device().set_photos_remaining(5);
        let bytes = only(&send(&mut d, FUNC_INFO, OP_SUPPORT_FUNCTION_INFO, &[INFO_PRINTER_FUNCTION])).to_vec();
        assert_eq!(bytes.len(), 17);
        let payload = decode_response(&bytes).unwrap().payload;
        assert_eq!(payload, vec![0x00, 0x02, 0x15, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00]);

        d.device().set_photos_remaining(14);
        d.device().set_charging(true);
        let bytes = only(&send(&mut d, FUNC_INFO, OP_SUPPORT_FUNCTION_INFO, &[INFO_PRINTER_FUNCTION])).to_vec();
        assert_eq!(bytes[8], 0x80 | 0x10 | 10);
        assert_eq!(bytes[11], 14);
    }

    #[test]
    fn print_history_reports_lifetime_count() {
        let mut d = dispatcher(Model::Square);
        d.device().set_lifetime_print_count(0x0102_0304);
        let dispatch = send(&mut d, FUNC_INFO, OP_SUPPORT_FUNCTION_INFO, &[INFO_PRINT_HISTORY]);
        let payload = decode_response(only(&dispatch)).unwrap().payload;
        assert_eq!(payload, vec![0x00, 0x03, 0x01, 0x02, 0x03, 0x04, 0x00, 0x00, 0x00, 0x07]);
    }

    #[test]
    fn wide_history_adds_delayed_follow_up() {
        let mut d = dispatcher(Model::Wide);
        let dispatch = send(&mut d, FUNC_INFO, OP_SUPPORT_FUNCTION_INFO, &[INFO_PRINT_HISTORY]);
        assert_eq!(dispatch.responses.len(), 2);
        assert_eq!(dispatch.responses[0].delay, Duration::ZERO);
        let follow = &dispatch.responses[1];
        assert_eq!(follow.delay, Duration::from_millis(100));
        assert_eq!(follow.bytes.len(), 12);
        assert_eq!(&follow.bytes[4..11], &[0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn unknown_support_info_type_acks() {
        let mut d = dispatcher(Model::Mini);
        assert_eq!(status(&send(&mut d, FUNC_INFO, OP_SUPPORT_FUNCTION_INFO, &[0x09])), STATUS_OK);
    }

    // -- Device control --

    #[test]
    fn auto_sleep_is_stored() {
        let mut d = dispatcher(Model::Mini);
        assert_eq!(status(&send(&mut d, FUNC_DEVICE_CONTROL, OP_AUTO_SLEEP_SETTINGS, &[12])), STATUS_OK);
        assert_eq!(d.device().snapshot().auto_sleep_minutes, 12);
        assert_eq!(status(&send(&mut d, FUNC_DEVICE_CONTROL, 0x7F, &[])), STATUS_OK);
    }

    // -- Print --

    #[test]
    fn start_without_film_returns_b2() {
        let mut d = dispatcher(Model::Mini);
        d.device().set_photos_remaining(0);
        let dispatch = send(&mut d, FUNC_PRINT, OP_PRINT_START, &start_payload(1234));
        let bytes = only(&dispatch);
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes[6], STATUS_NO_FILM);
        assert_eq!(bytes[7], calculate_checksum(&bytes[..7]));
    }

    #[test]
    fn start_with_unavailable_storage_returns_b1() {
        let mut storage = MemoryStorage::new();
        storage.fail_next_open();
        let mut d = Dispatcher::new(DeviceHandle::default(), Box::new(storage));

        let dispatch = send(&mut d, FUNC_PRINT, OP_PRINT_START, &start_payload(1234));
        let bytes = only(&dispatch);
        assert_eq!(&bytes[..6], &[0x61, 0x42, 0x00, 0x08, FUNC_PRINT, OP_PRINT_START]);
        assert_eq!(bytes[6], STATUS_OUT_OF_MEMORY);
        assert_eq!(bytes[6], 0xB1);
        assert_eq!(bytes[7], calculate_checksum(&bytes[..7]));
        assert_eq!(d.job().state(), crate::print_job::JobState::Idle);

        // The failure is one-shot; the next start goes through.
        assert_eq!(status(&send(&mut d, FUNC_PRINT, OP_PRINT_START, &start_payload(1234))), STATUS_OK);
    }

    #[test]
    fn short_start_payload_gets_no_response() {
        let mut d = dispatcher(Model::Mini);
        assert!(send(&mut d, FUNC_PRINT, OP_PRINT_START, &[0x02, 0x00]).responses.is_empty());
    }

    #[test]
    fn data_ack_is_delayed() {
        let mut d = dispatcher(Model::Mini);
        let dispatch = send(&mut d, FUNC_PRINT, OP_PRINT_DATA, &[0, 0, 0, 0, 1, 2]);
        assert_eq!(dispatch.responses[0].delay, Duration::from_millis(50));
        assert_eq!(dispatch.responses[0].bytes[6], STATUS_OK);
    }

    #[test]
    fn full_print_commits_counters_and_record() {
        let mut d = dispatcher(Model::Square);
        assert_eq!(status(&send(&mut d, FUNC_PRINT, OP_PRINT_START, &start_payload(4))), STATUS_OK);
        send(&mut d, FUNC_PRINT, OP_PRINT_DATA, &[0, 0, 0, 0, 0xAA, 0xBB]);
        send(&mut d, FUNC_PRINT, OP_PRINT_DATA, &[0, 0, 0, 1, 0xCC, 0xDD]);
        assert_eq!(status(&send(&mut d, FUNC_PRINT, OP_PRINT_END, &[])), STATUS_OK);

        let dispatch = send(&mut d, FUNC_PRINT, OP_PRINT_EXECUTE, &[]);
        assert_eq!(status(&dispatch), STATUS_OK);
        let record = dispatch.committed.expect("print record");
        assert!(record.is_complete());
        assert_eq!(record.model, Model::Square);
        assert!(record.file_name.starts_with("print_"));

        let s = d.device().snapshot();
        assert_eq!((s.photos_remaining, s.lifetime_print_count), (7, 36));
    }

    #[test]
    fn execute_with_cover_open_aborts() {
        let mut d = dispatcher(Model::Mini);
        send(&mut d, FUNC_PRINT, OP_PRINT_START, &start_payload(2));
        d.device().set_cover_open(true);
        let dispatch = send(&mut d, FUNC_PRINT, OP_PRINT_EXECUTE, &[]);
        assert_eq!(status(&dispatch), STATUS_COVER_OPEN);
        assert!(dispatch.committed.is_none());
        assert_eq!(d.device().snapshot().lifetime_print_count, 35);
    }

    #[test]
    fn cancel_returns_to_idle() {
        let mut d = dispatcher(Model::Mini);
        send(&mut d, FUNC_PRINT, OP_PRINT_START, &start_payload(2));
        assert_eq!(status(&send(&mut d, FUNC_PRINT, OP_PRINT_CANCEL, &[])), STATUS_OK);
        assert_eq!(d.job().state(), print_job::JobState::Idle);
        let dispatch = send(&mut d, FUNC_PRINT, OP_PRINT_EXECUTE, &[]);
        assert!(dispatch.committed.is_none());
    }

    #[test]
    fn disconnect_aborts_transfer() {
        let mut d = dispatcher(Model::Mini);
        send(&mut d, FUNC_PRINT, OP_PRINT_START, &start_payload(2));
        d.on_disconnect();
        assert_eq!(d.job().state(), print_job::JobState::Idle);
    }

    // -- LED / sensor --

    #[test]
    fn accelerometer_axes_are_little_endian() {
        let mut d = dispatcher(Model::Mini);
        d.device().set_accelerometer(0x0102, -2, 0x0304, 7);
        let bytes = only(&send(&mut d, FUNC_LED, OP_XYZ_AXIS_INFO, &[])).to_vec();
        assert_eq!(bytes.len(), 14);
        assert_eq!(&bytes[6..13], &[0x02, 0x01, 0xFE, 0xFF, 0x04, 0x03, 0x07]);
    }

    #[test]
    fn color_correction_sets_print_mode() {
        let mut d = dispatcher(Model::Mini);
        assert_eq!(status(&send(&mut d, FUNC_LED, OP_COLOR_CORRECTION, &[0x03, 0xFF])), STATUS_OK);
        assert_eq!(d.device().snapshot().print_mode, 0x03);
    }

    #[test]
    fn additional_info_variants() {
        let mut mini = dispatcher(Model::Mini);
        let bytes = only(&send(&mut mini, FUNC_LED, OP_ADDITIONAL_INFO, &[])).to_vec();
        assert_eq!(bytes.len(), 17);
        assert_eq!(&bytes[6..16], &[0x00, 0x00, 0xC3, 0x80, 0x00, 0xBE, 0x00, 0x00, 0x00, 0x00]);

        let bytes = only(&send(&mut mini, FUNC_LED, OP_ADDITIONAL_INFO, &[0x01])).to_vec();
        assert_eq!(bytes.len(), 21);
        assert_eq!(&bytes[11..16], &[0x02, 0xFF, 0x00, 0x01, 0x02]);

        let mut wide = dispatcher(Model::Wide);
        let bytes = only(&send(&mut wide, FUNC_LED, OP_ADDITIONAL_INFO, &[0x01])).to_vec();
        assert_eq!(&bytes[11..16], &[0x1E, 0x00, 0x01, 0x01, 0x00]);

        assert_eq!(status(&send(&mut wide, FUNC_LED, OP_ADDITIONAL_INFO, &[0x05])), STATUS_OK);
    }

    #[test]
    fn other_led_operations_ack() {
        let mut d = dispatcher(Model::Square);
        assert_eq!(status(&send(&mut d, FUNC_LED, OP_LED_PATTERN_DOUBLE, &[1, 2, 3])), STATUS_OK);
    }

    // -- Unknown function --

    #[test]
    fn unknown_function_is_dropped() {
        let mut d = dispatcher(Model::Mini);
        assert!(send(&mut d, 0x55, 0x00, &[]).responses.is_empty());
    }
}
