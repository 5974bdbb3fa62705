// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Instax wire protocol constants: direction markers, function and operation
// codes, info query selectors and status bytes.
//
// Values were recovered from packet captures of real printers.  Bytes whose
// meaning is not understood are kept as-is and named after where they appear.

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Direction marker of frames written by the app to the printer.
pub const HEADER_TO_DEVICE: [u8; 2] = [0x41, 0x62];

/// Direction marker of frames notified by the printer to the app.
pub const HEADER_FROM_DEVICE: [u8; 2] = [0x61, 0x42];

/// Marker (2) + length (2) + function (1) + operation (1) + checksum (1).
pub const FRAME_OVERHEAD: usize = 7;

/// Largest frame the reassembler will hold by default.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4096;

/// Largest single BLE write the app is expected to send.
pub const MAX_BLE_PACKET_SIZE: usize = 182;

// ---------------------------------------------------------------------------
// Function codes
// ---------------------------------------------------------------------------

pub const FUNC_INFO: u8 = 0x00;
pub const FUNC_DEVICE_CONTROL: u8 = 0x01;
pub const FUNC_PRINT: u8 = 0x10;
pub const FUNC_LED: u8 = 0x30;

// ---------------------------------------------------------------------------
// Operation codes: info (0x00)
// ---------------------------------------------------------------------------

/// General identify / ping sent by the official app on connect.
pub const OP_IDENTIFY: u8 = 0x00;

/// String query; `payload[0]` selects the string.
pub const OP_INFO_STRING: u8 = 0x01;

/// Support function info; `payload[0]` selects the info type.
pub const OP_SUPPORT_FUNCTION_INFO: u8 = 0x02;

// ---------------------------------------------------------------------------
// Operation codes: device control (0x01)
// ---------------------------------------------------------------------------

pub const OP_SHUTDOWN: u8 = 0x00;
pub const OP_RESET: u8 = 0x01;
pub const OP_AUTO_SLEEP_SETTINGS: u8 = 0x02;
pub const OP_BLE_CONNECT: u8 = 0x03;

// ---------------------------------------------------------------------------
// Operation codes: print (0x10)
// ---------------------------------------------------------------------------

pub const OP_PRINT_START: u8 = 0x00;
pub const OP_PRINT_DATA: u8 = 0x01;
pub const OP_PRINT_END: u8 = 0x02;
pub const OP_PRINT_CANCEL: u8 = 0x03;
pub const OP_PRINT_EXECUTE: u8 = 0x80;

// ---------------------------------------------------------------------------
// Operation codes: LED / sensor (0x30)
// ---------------------------------------------------------------------------

pub const OP_XYZ_AXIS_INFO: u8 = 0x00;
/// Colour correction table upload; `payload[0]` carries the print mode.
pub const OP_COLOR_CORRECTION: u8 = 0x01;
pub const OP_AXIS_ACTION_SETTINGS: u8 = 0x02;
pub const OP_LED_PATTERN_DOUBLE: u8 = 0x03;
pub const OP_POWER_LED_SETTING: u8 = 0x04;
pub const OP_AR_LED_VIBRATION: u8 = 0x06;
pub const OP_ADDITIONAL_INFO: u8 = 0x10;

// ---------------------------------------------------------------------------
// Support function info types (payload[0] of OP_SUPPORT_FUNCTION_INFO)
// ---------------------------------------------------------------------------

pub const INFO_IMAGE_SUPPORT: u8 = 0x00;
pub const INFO_BATTERY: u8 = 0x01;
pub const INFO_PRINTER_FUNCTION: u8 = 0x02;
pub const INFO_PRINT_HISTORY: u8 = 0x03;

// ---------------------------------------------------------------------------
// String query selectors (payload[0] of OP_INFO_STRING)
// ---------------------------------------------------------------------------

pub const QUERY_MODEL_NUMBER: u8 = 0x01;
pub const QUERY_SERIAL_NUMBER: u8 = 0x02;
pub const QUERY_ADDITIONAL_INFO: u8 = 0x03;
pub const QUERY_FIRMWARE_REVISION: u8 = 0x04;
pub const QUERY_HARDWARE_REVISION: u8 = 0x05;
pub const QUERY_SOFTWARE_REVISION: u8 = 0x06;
pub const QUERY_MANUFACTURER: u8 = 0x07;
pub const QUERY_DEVICE_NAME: u8 = 0x08;
pub const QUERY_VERSION: u8 = 0x09;
pub const QUERY_VERSION_EXTRA: u8 = 0x0a;

/// Constant answered to `QUERY_ADDITIONAL_INFO` (byte-exact, meaning unknown).
pub const ADDITIONAL_INFO_STRING: &str = "0000";

/// Constant answered to `QUERY_VERSION` (byte-exact, meaning unknown).
pub const VERSION_STRING: &str = "00010012";

/// Constant answered to `QUERY_VERSION_EXTRA` (byte-exact, meaning unknown).
pub const VERSION_EXTRA_STRING: &str = "00000001";

// ---------------------------------------------------------------------------
// Status bytes
// ---------------------------------------------------------------------------

pub const STATUS_OK: u8 = 0x00;
/// Error 177: sink could not be allocated.
pub const STATUS_OUT_OF_MEMORY: u8 = 0xB1;
/// Error 178: no film left.
pub const STATUS_NO_FILM: u8 = 0xB2;
/// Error 179: film cover open.
pub const STATUS_COVER_OPEN: u8 = 0xB3;
/// Error 180: battery below the print threshold.
pub const STATUS_BATTERY_LOW: u8 = 0xB4;
/// Error 181: printer busy.
pub const STATUS_PRINTER_BUSY: u8 = 0xB5;

/// Printing is refused below this battery percentage.
pub const MIN_PRINT_BATTERY_PERCENT: u8 = 20;

/// Name of a function code for log output.
pub fn function_name(function: u8) -> &'static str {
    match function {
        FUNC_INFO => "info",
        FUNC_DEVICE_CONTROL => "device-control",
        FUNC_PRINT => "print",
        FUNC_LED => "led",
        _ => "unknown",
    }
}
