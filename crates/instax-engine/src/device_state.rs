// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Emulated printer state and the lock-guarded handle shared between the
// engine and configuration front ends.
//
// All mutation goes through `DeviceHandle` setters so range and length limits
// are enforced in one place.  A rejected value leaves the state untouched.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use instax_core::error::{InstaxError, Result};
use instax_core::{Accelerometer, Model, PrintMode};

use crate::gatt::{self, AdvertisingData};
use crate::profile::{ModelProfile, profile};
use crate::protocol::{
    MIN_PRINT_BATTERY_PERCENT, STATUS_BATTERY_LOW, STATUS_COVER_OPEN, STATUS_NO_FILM, STATUS_PRINTER_BUSY,
};

// Maximum lengths, exclusive (room for the terminator on the device).
const MODEL_NUMBER_LIMIT: usize = 16;
const SERIAL_NUMBER_LIMIT: usize = 32;
const REVISION_LIMIT: usize = 16;
const MANUFACTURER_LIMIT: usize = 32;
const DEVICE_NAME_LIMIT: usize = 32;

const DEFAULT_BATTERY_PERCENT: u8 = 85;
const DEFAULT_PHOTOS_REMAINING: u8 = 8;
const DEFAULT_LIFETIME_PRINTS: u32 = 35;
const DEFAULT_AUTO_SLEEP_MINUTES: u8 = 5;

/// Everything the app can observe about the emulated printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub model: Model,
    pub width: u16,
    pub height: u16,

    pub battery_percent: u8,
    pub charging: bool,
    pub photos_remaining: u8,
    pub lifetime_print_count: u32,

    pub cover_open: bool,
    pub printer_busy: bool,
    pub accelerometer: Accelerometer,
    pub auto_sleep_minutes: u8,
    pub print_mode: u8,

    pub device_name: String,
    pub model_number: String,
    pub serial_number: String,
    pub firmware_revision: String,
    pub hardware_revision: String,
    pub software_revision: String,
    pub manufacturer_name: String,

    /// When set, committed prints leave `photos_remaining` alone.
    pub suspend_decrement: bool,
    pub connected: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::defaults_for(Model::default())
    }
}

impl DeviceState {
    /// Fresh state for `model` using the profile defaults.
    pub fn defaults_for(model: Model) -> Self {
        let p = profile(model);
        let info = &p.device_info;
        Self {
            model,
            width: p.width,
            height: p.height,
            battery_percent: DEFAULT_BATTERY_PERCENT,
            charging: false,
            photos_remaining: DEFAULT_PHOTOS_REMAINING,
            lifetime_print_count: DEFAULT_LIFETIME_PRINTS,
            cover_open: false,
            printer_busy: false,
            accelerometer: Accelerometer::default(),
            auto_sleep_minutes: DEFAULT_AUTO_SLEEP_MINUTES,
            print_mode: 0,
            device_name: info.device_name.to_owned(),
            model_number: info.model_number.to_owned(),
            serial_number: info.serial_number.to_owned(),
            firmware_revision: info.firmware_revision.to_owned(),
            hardware_revision: info.hardware_revision.to_owned(),
            software_revision: info.software_revision.to_owned(),
            manufacturer_name: info.manufacturer_name.to_owned(),
            suspend_decrement: false,
            connected: false,
        }
    }

    pub fn profile(&self) -> &'static ModelProfile {
        profile(self.model)
    }

    /// Coarse battery level (0-3) derived from the percentage.
    pub fn battery_state(&self) -> u8 {
        match self.battery_percent {
            p if p > 75 => 3,
            p if p > 50 => 2,
            p if p > 25 => 1,
            _ => 0,
        }
    }

    /// First failing print precondition, in priority order, as a status byte.
    pub fn print_precondition(&self) -> Option<u8> {
        if self.photos_remaining == 0 {
            Some(STATUS_NO_FILM)
        } else if self.cover_open {
            Some(STATUS_COVER_OPEN)
        } else if self.battery_percent < MIN_PRINT_BATTERY_PERCENT {
            Some(STATUS_BATTERY_LOW)
        } else if self.printer_busy {
            Some(STATUS_PRINTER_BUSY)
        } else {
            None
        }
    }

    /// Apply the counter changes of one committed print.
    fn commit_print(&mut self) {
        self.lifetime_print_count = self.lifetime_print_count.saturating_add(1);
        if !self.suspend_decrement {
            self.photos_remaining = self.photos_remaining.saturating_sub(1);
        }
    }

    /// Subset of the state that survives a restart.
    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            model: self.model,
            battery_percent: self.battery_percent,
            photos_remaining: self.photos_remaining,
            lifetime_print_count: self.lifetime_print_count,
            charging: self.charging,
            suspend_decrement: self.suspend_decrement,
            device_name: self.device_name.clone(),
            model_number: self.model_number.clone(),
            serial_number: self.serial_number.clone(),
            firmware_revision: self.firmware_revision.clone(),
            hardware_revision: self.hardware_revision.clone(),
            software_revision: self.software_revision.clone(),
            manufacturer_name: self.manufacturer_name.clone(),
        }
    }

    /// Log the whole configuration, one event per section.
    pub fn log_summary(&self) {
        info!(
            model = %self.model,
            width = self.width,
            height = self.height,
            "printer model"
        );
        info!(
            device_name = %self.device_name,
            model_number = %self.model_number,
            serial = %self.serial_number,
            firmware = %self.firmware_revision,
            hardware = %self.hardware_revision,
            software = %self.software_revision,
            manufacturer = %self.manufacturer_name,
            "device information"
        );
        info!(
            battery = self.battery_percent,
            battery_state = self.battery_state(),
            charging = self.charging,
            photos = self.photos_remaining,
            lifetime = self.lifetime_print_count,
            cover_open = self.cover_open,
            busy = self.printer_busy,
            "status"
        );
        info!(
            x = self.accelerometer.x,
            y = self.accelerometer.y,
            z = self.accelerometer.z,
            orientation = self.accelerometer.orientation,
            "accelerometer"
        );
        info!(
            auto_sleep = self.auto_sleep_minutes,
            print_mode = PrintMode::from_byte(self.print_mode).map_or("unknown", |m| m.label()),
            suspend_decrement = self.suspend_decrement,
            "settings"
        );
        info!(connected = self.connected, "connection");
    }
}

/// Persisted subset of [`DeviceState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub model: Model,
    pub battery_percent: u8,
    pub photos_remaining: u8,
    pub lifetime_print_count: u32,
    pub charging: bool,
    pub suspend_decrement: bool,
    pub device_name: String,
    pub model_number: String,
    pub serial_number: String,
    pub firmware_revision: String,
    pub hardware_revision: String,
    pub software_revision: String,
    pub manufacturer_name: String,
}

/// Published whenever the advertised identity changes; transports restart
/// advertising with `advertising`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingRequest {
    /// Increments on every change, starting at 0 for the initial identity.
    pub revision: u64,
    pub advertising: AdvertisingData,
}

fn check_string(field: &'static str, value: &str, limit: usize) -> Result<()> {
    if value.is_empty() {
        return Err(InstaxError::invalid(field, "must not be empty"));
    }
    if value.len() >= limit {
        return Err(InstaxError::invalid(
            field,
            format!("{} bytes, must be shorter than {limit}", value.len()),
        ));
    }
    Ok(())
}

/// Cloneable, thread-safe handle to the single [`DeviceState`].
#[derive(Clone)]
pub struct DeviceHandle {
    state: Arc<Mutex<DeviceState>>,
    advertising: Arc<watch::Sender<AdvertisingRequest>>,
}

impl Default for DeviceHandle {
    fn default() -> Self {
        Self::new(DeviceState::default())
    }
}

impl DeviceHandle {
    pub fn new(state: DeviceState) -> Self {
        let initial = AdvertisingRequest {
            revision: 0,
            advertising: gatt::advertising_data(&state),
        };
        let (tx, _rx) = watch::channel(initial);
        Self {
            state: Arc::new(Mutex::new(state)),
            advertising: Arc::new(tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        // Setters never leave the state half-updated, so a poisoned lock
        // still guards consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> DeviceState {
        self.lock().clone()
    }

    /// Run `f` with the state locked.
    pub fn with_state<R>(&self, f: impl FnOnce(&DeviceState) -> R) -> R {
        f(&self.lock())
    }

    pub fn subscribe_advertising(&self) -> watch::Receiver<AdvertisingRequest> {
        self.advertising.subscribe()
    }

    fn request_advertising_restart(&self, state: &DeviceState) {
        let advertising = gatt::advertising_data(state);
        let revision = self.advertising.borrow().revision + 1;
        self.advertising.send_replace(AdvertisingRequest { revision, advertising });
        info!(revision, name = %state.device_name, "advertising restart requested");
    }

    // -- Model --

    /// Switch personality.  Dimensions, device information and device name
    /// return to the new model's defaults; counters and status are kept.
    pub fn set_model(&self, model: Model) {
        let mut state = self.lock();
        let previous = state.model;
        state.model = model;
        let p = profile(model);
        state.width = p.width;
        state.height = p.height;
        apply_device_info_defaults(&mut state);
        info!(from = %previous, to = %model, "model switched");
        self.request_advertising_restart(&state);
    }

    /// Restore device information and device name to the current model's
    /// defaults.
    pub fn reset_device_info(&self) {
        let mut state = self.lock();
        apply_device_info_defaults(&mut state);
        info!(model = %state.model, "device information reset to defaults");
        self.request_advertising_restart(&state);
    }

    // -- Status --

    pub fn set_battery(&self, percent: u8) -> Result<()> {
        if percent > 100 {
            return Err(InstaxError::invalid("battery_percent", format!("{percent} exceeds 100")));
        }
        self.lock().battery_percent = percent;
        info!(percent, "battery set");
        Ok(())
    }

    pub fn set_charging(&self, charging: bool) {
        self.lock().charging = charging;
        info!(charging, "charging set");
    }

    pub fn set_photos_remaining(&self, photos: u8) {
        self.lock().photos_remaining = photos;
        info!(photos, "photos remaining set");
    }

    pub fn set_lifetime_print_count(&self, count: u32) {
        self.lock().lifetime_print_count = count;
        info!(count, "lifetime print count set");
    }

    pub fn set_cover_open(&self, open: bool) {
        self.lock().cover_open = open;
        info!(open, "cover state set");
    }

    pub fn set_busy(&self, busy: bool) {
        self.lock().printer_busy = busy;
        info!(busy, "busy flag set");
    }

    pub fn set_suspend_decrement(&self, suspend: bool) {
        self.lock().suspend_decrement = suspend;
        info!(suspend, "film decrement suspension set");
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    // -- Settings --

    pub fn set_auto_sleep(&self, minutes: u8) {
        self.lock().auto_sleep_minutes = minutes;
        info!(minutes, "auto-sleep set");
    }

    /// Store the colour rendering byte.  Unknown values are kept as sent.
    pub fn set_print_mode(&self, mode: u8) {
        match PrintMode::from_byte(mode) {
            Some(m) => info!(mode = m.label(), "print mode set"),
            None => warn!(mode = format_args!("{mode:#04x}"), "unknown print mode stored"),
        }
        self.lock().print_mode = mode;
    }

    // -- Accelerometer --

    pub fn set_accelerometer(&self, x: i16, y: i16, z: i16, orientation: u8) {
        self.lock().accelerometer = Accelerometer { x, y, z, orientation };
        info!(x, y, z, orientation, "accelerometer set");
    }

    pub fn set_accel_x(&self, x: i16) {
        self.lock().accelerometer.x = x;
    }

    pub fn set_accel_y(&self, y: i16) {
        self.lock().accelerometer.y = y;
    }

    pub fn set_accel_z(&self, z: i16) {
        self.lock().accelerometer.z = z;
    }

    pub fn set_orientation(&self, orientation: u8) {
        self.lock().accelerometer.orientation = orientation;
    }

    // -- Device information --

    pub fn set_device_name(&self, name: &str) -> Result<()> {
        check_string("device_name", name, DEVICE_NAME_LIMIT)?;
        let mut state = self.lock();
        state.device_name = name.to_owned();
        info!(name, "device name set");
        self.request_advertising_restart(&state);
        Ok(())
    }

    pub fn set_model_number(&self, value: &str) -> Result<()> {
        check_string("model_number", value, MODEL_NUMBER_LIMIT)?;
        self.lock().model_number = value.to_owned();
        info!(value, "model number set");
        Ok(())
    }

    pub fn set_serial_number(&self, value: &str) -> Result<()> {
        check_string("serial_number", value, SERIAL_NUMBER_LIMIT)?;
        self.lock().serial_number = value.to_owned();
        info!(value, "serial number set");
        Ok(())
    }

    pub fn set_firmware_revision(&self, value: &str) -> Result<()> {
        check_string("firmware_revision", value, REVISION_LIMIT)?;
        self.lock().firmware_revision = value.to_owned();
        info!(value, "firmware revision set");
        Ok(())
    }

    pub fn set_hardware_revision(&self, value: &str) -> Result<()> {
        check_string("hardware_revision", value, REVISION_LIMIT)?;
        self.lock().hardware_revision = value.to_owned();
        info!(value, "hardware revision set");
        Ok(())
    }

    pub fn set_software_revision(&self, value: &str) -> Result<()> {
        check_string("software_revision", value, REVISION_LIMIT)?;
        self.lock().software_revision = value.to_owned();
        info!(value, "software revision set");
        Ok(())
    }

    pub fn set_manufacturer_name(&self, value: &str) -> Result<()> {
        check_string("manufacturer_name", value, MANUFACTURER_LIMIT)?;
        self.lock().manufacturer_name = value.to_owned();
        info!(value, "manufacturer name set");
        Ok(())
    }

    // -- Print bookkeeping and persistence --

    /// Count one committed print and return the updated state.
    pub fn commit_print(&self) -> DeviceState {
        let mut state = self.lock();
        state.commit_print();
        log_commit(&state);
        state.clone()
    }

    /// Run `check` and, when it yields a value, count one committed print,
    /// all while holding the lock.  No setter can land between the check and
    /// the counter update.
    pub fn commit_print_with<R, E>(
        &self,
        check: impl FnOnce(&DeviceState) -> std::result::Result<Option<R>, E>,
    ) -> std::result::Result<Option<(R, DeviceState)>, E> {
        let mut state = self.lock();
        let Some(value) = check(&state)? else {
            return Ok(None);
        };
        state.commit_print();
        log_commit(&state);
        Ok(Some((value, state.clone())))
    }

    /// Apply a persisted snapshot.  Strings that fail validation keep the
    /// model default and are reported with a warning.
    pub fn restore(&self, saved: &PersistedState) {
        let mut fresh = DeviceState::defaults_for(saved.model);
        fresh.lifetime_print_count = saved.lifetime_print_count;
        fresh.photos_remaining = saved.photos_remaining;
        fresh.charging = saved.charging;
        fresh.suspend_decrement = saved.suspend_decrement;
        if saved.battery_percent <= 100 {
            fresh.battery_percent = saved.battery_percent;
        } else {
            warn!(value = saved.battery_percent, "ignoring persisted battery above 100");
        }

        let strings: [(&'static str, &str, usize, &mut String); 7] = [
            ("device_name", saved.device_name.as_str(), DEVICE_NAME_LIMIT, &mut fresh.device_name),
            ("model_number", saved.model_number.as_str(), MODEL_NUMBER_LIMIT, &mut fresh.model_number),
            ("serial_number", saved.serial_number.as_str(), SERIAL_NUMBER_LIMIT, &mut fresh.serial_number),
            ("firmware_revision", saved.firmware_revision.as_str(), REVISION_LIMIT, &mut fresh.firmware_revision),
            ("hardware_revision", saved.hardware_revision.as_str(), REVISION_LIMIT, &mut fresh.hardware_revision),
            ("software_revision", saved.software_revision.as_str(), REVISION_LIMIT, &mut fresh.software_revision),
            ("manufacturer_name", saved.manufacturer_name.as_str(), MANUFACTURER_LIMIT, &mut fresh.manufacturer_name),
        ];
        for (field, value, limit, slot) in strings {
            match check_string(field, value, limit) {
                Ok(()) => *slot = value.to_owned(),
                Err(e) => warn!(error = %e, "ignoring persisted value"),
            }
        }

        let mut state = self.lock();
        fresh.connected = state.connected;
        *state = fresh;
        info!(model = %state.model, "device state restored");
        self.request_advertising_restart(&state);
    }

    pub fn persisted(&self) -> PersistedState {
        self.lock().persisted()
    }
}

fn log_commit(state: &DeviceState) {
    info!(
        lifetime = state.lifetime_print_count,
        photos = state.photos_remaining,
        suspended = state.suspend_decrement,
        "print counters updated"
    );
}

fn apply_device_info_defaults(state: &mut DeviceState) {
    let info = &profile(state.model).device_info;
    state.device_name = info.device_name.to_owned();
    state.model_number = info.model_number.to_owned();
    state.serial_number = info.serial_number.to_owned();
    state.firmware_revision = info.firmware_revision.to_owned();
    state.hardware_revision = info.hardware_revision.to_owned();
    state.software_revision = info.software_revision.to_owned();
    state.manufacturer_name = info.manufacturer_name.to_owned();
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- Defaults and derived values --

    #[test]
    fn defaults_follow_mini_profile() {
        let s = DeviceState::default();
        assert_eq!(s.model, Model::Mini);
        assert_eq!((s.width, s.height), (600, 800));
        assert_eq!(s.battery_percent, 85);
        assert_eq!(s.photos_remaining, 8);
        assert_eq!(s.lifetime_print_count, 35);
        assert_eq!(s.auto_sleep_minutes, 5);
        assert_eq!(s.model_number, "FI033");
        assert!(!s.cover_open && !s.printer_busy && !s.charging && !s.suspend_decrement);
    }

    #[test]
    fn battery_state_thresholds() {
        let mut s = DeviceState::default();
        for (pct, expected) in [(100, 3), (76, 3), (75, 2), (51, 2), (50, 1), (26, 1), (25, 0), (0, 0)] {
            s.battery_percent = pct;
            assert_eq!(s.battery_state(), expected, "{pct}%");
        }
    }

    // -- Preconditions --

    #[test]
    fn precondition_priority_over_all_combinations() {
        for mask in 1u8..16 {
            let mut s = DeviceState::default();
            s.photos_remaining = if mask & 1 != 0 { 0 } else { 5 };
            s.cover_open = mask & 2 != 0;
            s.battery_percent = if mask & 4 != 0 { 19 } else { 80 };
            s.printer_busy = mask & 8 != 0;

            let expected = if mask & 1 != 0 {
                STATUS_NO_FILM
            } else if mask & 2 != 0 {
                STATUS_COVER_OPEN
            } else if mask & 4 != 0 {
                STATUS_BATTERY_LOW
            } else {
                STATUS_PRINTER_BUSY
            };
            assert_eq!(s.print_precondition(), Some(expected), "mask {mask:04b}");
        }
        assert_eq!(DeviceState::default().print_precondition(), None);
    }

    #[test]
    fn battery_at_threshold_is_allowed() {
        let mut s = DeviceState::default();
        s.battery_percent = 20;
        assert_eq!(s.print_precondition(), None);
    }

    // -- Setters --

    #[test]
    fn model_switch_resets_model_fields_only() {
        let handle = DeviceHandle::new(DeviceState::defaults_for(Model::Square));
        handle.set_battery(42).unwrap();
        handle.set_lifetime_print_count(99);
        handle.set_model_number("CUSTOM").unwrap();

        handle.set_model(Model::Mini);
        let s = handle.snapshot();
        assert_eq!(s.model_number, "FI033");
        assert_eq!((s.width, s.height), (600, 800));
        assert_eq!(s.device_name, "INSTAX-70555555(BLE)");
        assert_eq!(s.battery_percent, 42);
        assert_eq!(s.lifetime_print_count, 99);
    }

    #[test]
    fn battery_above_100_rejected() {
        let handle = DeviceHandle::default();
        assert!(matches!(
            handle.set_battery(101),
            Err(InstaxError::InvalidValue { field: "battery_percent", .. })
        ));
        assert_eq!(handle.snapshot().battery_percent, 85);
    }

    #[test]
    fn string_limits_are_exclusive() {
        let handle = DeviceHandle::default();
        assert!(handle.set_model_number(&"x".repeat(15)).is_ok());
        assert!(handle.set_model_number(&"x".repeat(16)).is_err());
        assert!(handle.set_device_name(&"n".repeat(31)).is_ok());
        assert!(handle.set_device_name(&"n".repeat(32)).is_err());
        assert!(handle.set_manufacturer_name("").is_err());
        assert_eq!(handle.snapshot().model_number, "x".repeat(15));
    }

    #[test]
    fn revision_setters_and_reset() {
        let handle = DeviceHandle::default();
        handle.set_serial_number("SN-1").unwrap();
        handle.set_firmware_revision("9.99").unwrap();
        handle.set_hardware_revision("HW-2").unwrap();
        handle.set_software_revision(&"s".repeat(16)).unwrap_err();
        handle.set_software_revision("SW-3").unwrap();
        let s = handle.snapshot();
        assert_eq!(
            (s.serial_number.as_str(), s.firmware_revision.as_str(), s.hardware_revision.as_str()),
            ("SN-1", "9.99", "HW-2")
        );
        assert_eq!(s.software_revision, "SW-3");

        let rx = handle.subscribe_advertising();
        handle.reset_device_info();
        assert_eq!(handle.snapshot().model_number, "FI033");
        assert_eq!(handle.snapshot().serial_number, DeviceState::default().serial_number);
        assert_eq!(rx.borrow().revision, 1);
    }

    #[test]
    fn busy_flag_blocks_printing() {
        let handle = DeviceHandle::default();
        handle.set_busy(true);
        assert_eq!(handle.snapshot().print_precondition(), Some(STATUS_PRINTER_BUSY));
    }

    #[test]
    fn unknown_print_mode_is_stored() {
        let handle = DeviceHandle::default();
        handle.set_print_mode(0x09);
        assert_eq!(handle.snapshot().print_mode, 0x09);
    }

    #[test]
    fn accelerometer_setters() {
        let handle = DeviceHandle::default();
        handle.set_accelerometer(1, -2, 3, 4);
        handle.set_accel_y(-300);
        handle.set_orientation(9);
        let a = handle.snapshot().accelerometer;
        assert_eq!((a.x, a.y, a.z, a.orientation), (1, -300, 3, 9));

        handle.set_accel_x(i16::MIN);
        handle.set_accel_z(i16::MAX);
        let a = handle.snapshot().accelerometer;
        assert_eq!((a.x, a.z), (i16::MIN, i16::MAX));
    }

    // -- Print bookkeeping --

    #[test]
    fn commit_print_updates_counters() {
        let handle = DeviceHandle::default();
        let s = handle.commit_print();
        assert_eq!((s.photos_remaining, s.lifetime_print_count), (7, 36));
    }

    #[test]
    fn suspend_decrement_keeps_film_count() {
        let handle = DeviceHandle::default();
        handle.set_suspend_decrement(true);
        let s = handle.commit_print();
        assert_eq!((s.photos_remaining, s.lifetime_print_count), (8, 36));
    }

    #[test]
    fn commit_with_blocks_setters_until_counted() {
        let handle = DeviceHandle::default();
        let other = handle.clone();
        let mut setter = None;

        let committed = handle
            .commit_print_with(|state| {
                assert_eq!(state.photos_remaining, 8);
                setter = Some(std::thread::spawn(move || other.set_photos_remaining(0)));
                std::thread::sleep(std::time::Duration::from_millis(50));
                Ok::<_, ()>(Some(()))
            })
            .unwrap();

        let ((), after) = committed.unwrap();
        assert_eq!((after.photos_remaining, after.lifetime_print_count), (7, 36));
        setter.unwrap().join().unwrap();
        assert_eq!(handle.snapshot().photos_remaining, 0);
    }

    #[test]
    fn commit_with_none_leaves_counters() {
        let handle = DeviceHandle::default();
        let committed = handle.commit_print_with(|_| Ok::<Option<()>, ()>(None)).unwrap();
        assert!(committed.is_none());
        assert_eq!(handle.snapshot().lifetime_print_count, 35);
    }

    #[test]
    fn film_count_floors_at_zero() {
        let mut s = DeviceState::default();
        s.photos_remaining = 0;
        s.commit_print();
        assert_eq!(s.photos_remaining, 0);
    }

    // -- Advertising requests --

    #[test]
    fn name_and_model_changes_publish_advertising() {
        let handle = DeviceHandle::default();
        let rx = handle.subscribe_advertising();
        assert_eq!(rx.borrow().revision, 0);

        handle.set_device_name("TEST-PRINTER").unwrap();
        assert_eq!(rx.borrow().revision, 1);
        assert_eq!(rx.borrow().advertising.local_name, "TEST-PRINTER");

        handle.set_model(Model::Wide);
        assert_eq!(rx.borrow().revision, 2);
        assert_eq!(rx.borrow().advertising.manufacturer_data, [0xD8, 0x04, 0x02, 0x00]);

        handle.set_battery(50).unwrap();
        assert_eq!(rx.borrow().revision, 2);
    }

    // -- Persistence --

    #[test]
    fn restore_applies_valid_fields_and_skips_invalid() {
        let handle = DeviceHandle::default();
        let mut saved = DeviceState::defaults_for(Model::Wide).persisted();
        saved.photos_remaining = 3;
        saved.lifetime_print_count = 500;
        saved.serial_number = String::new();
        saved.device_name = "MY-WIDE".into();

        handle.set_cover_open(true);
        handle.restore(&saved);
        let s = handle.snapshot();
        assert_eq!(s.model, Model::Wide);
        assert_eq!((s.width, s.height), (1260, 840));
        assert_eq!(s.photos_remaining, 3);
        assert_eq!(s.lifetime_print_count, 500);
        assert_eq!(s.serial_number, "20555555");
        assert_eq!(s.device_name, "MY-WIDE");
        // Runtime-only flags reset.
        assert!(!s.cover_open);
    }

    #[test]
    fn persisted_state_serializes_model_lowercase() {
        let json = serde_json::to_string(&DeviceState::defaults_for(Model::Square).persisted()).unwrap();
        assert!(json.contains("\"model\":\"square\""));
        let back: PersistedState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.model_number, "FI017");
    }
}
