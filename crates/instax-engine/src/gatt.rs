// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Declarative GATT and advertising description for transports.
//
// The engine does not talk to a BLE stack.  Transports ask this module which
// services to register for the current model, what each readable
// characteristic returns, and what to put in the advertising packets.

use instax_core::Model;
use uuid::Uuid;

use crate::device_state::DeviceState;
use crate::profile::profile;

// ---------------------------------------------------------------------------
// UUIDs
// ---------------------------------------------------------------------------

/// Main Instax service.
pub const INSTAX_SERVICE_UUID: Uuid = Uuid::from_u128(0x70954782_2d83_473d_9e5f_81e1d02d5273);
/// App writes command frames here.
pub const INSTAX_WRITE_UUID: Uuid = Uuid::from_u128(0x70954783_2d83_473d_9e5f_81e1d02d5273);
/// Printer notifies response frames here.
pub const INSTAX_NOTIFY_UUID: Uuid = Uuid::from_u128(0x70954784_2d83_473d_9e5f_81e1d02d5273);

/// Lower 96 bits shared by every vendor-specific 16-bit alias.
const VENDOR_BASE: u128 = 0x0000_0000_3C17_D293_8E48_14FE_2E4D_A212;

/// Lower 96 bits of the Bluetooth SIG base UUID.
const SIG_BASE: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

/// Expand a 16-bit alias on the vendor base (`0000XXXX-3C17-D293-8E48-14FE2E4DA212`).
pub const fn vendor_uuid(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | VENDOR_BASE)
}

/// Expand a 16-bit alias on the Bluetooth SIG base.
pub const fn sig_uuid(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | SIG_BASE)
}

pub const LINK_INFO_SERVICE_UUID: Uuid = vendor_uuid(0xD0FF);
pub const LINK_STATUS_SERVICE_UUID: Uuid = vendor_uuid(0x6287);
pub const WIDE_SERVICE_UUID: Uuid = vendor_uuid(0xE0FF);
pub const DEVICE_INFO_SERVICE_UUID: Uuid = sig_uuid(0x180A);

// ---------------------------------------------------------------------------
// Fixed read values (opaque, captured from real printers)
// ---------------------------------------------------------------------------

const SYSTEM_ID: [u8; 8] = [0x00, 0x01, 0x02, 0x00, 0x00, 0x03, 0x04, 0x05];
const PNP_ID: [u8; 7] = [0x01, 0x5D, 0x00, 0x00, 0x00, 0x00, 0x01];

const LINK_FFD1: [u8; 4] = [0x00; 4];
const LINK_FFD2: [u8; 12] = [0x88, 0xB4, 0x36, 0x86, 0x18, 0x4E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
const LINK_FFE0: [u8; 20] = [
    0x00, 0x00, 0x00, 0x00, 0x02, 0x40, 0x25, 0x00, 0x02, 0x00, 0xE0, 0xEE, 0x33, 0x65, 0x00, 0x00,
    0x33, 0x65, 0x00, 0x00,
];
const LINK_FFE1: [u8; 8] = [0xCE, 0x63, 0x00, 0x00, 0x12, 0x00, 0x00, 0x01];
const LINK_FFF3: [u8; 2] = [0x10, 0x00];
const LINK_FFF4: [u8; 20] = [
    0x00, 0x30, 0x00, 0x00, 0x00, 0xC0, 0x01, 0x00, 0x00, 0xF0, 0x04, 0x00, 0x00, 0xB0, 0x00, 0x00,
    0x00, 0x50, 0x01, 0x00,
];
const LINK_FFF5: [u8; 8] = [0x00, 0x30, 0x00, 0x00, 0x00, 0x40, 0x01, 0x00];
const LINK_CONTROL: [u8; 4] = [0x00; 4];

/// Wide FFEA payload, sent on read and on subscription.
pub const WIDE_INFO_PAYLOAD: [u8; 11] = [0x02, 0x09, 0xB9, 0x00, 0x11, 0x01, 0x00, 0x80, 0x84, 0x1E, 0x00];

// ---------------------------------------------------------------------------
// Service and characteristic model
// ---------------------------------------------------------------------------

/// A group of services a model may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceSet {
    /// Main command/notify service (every model).
    Instax,
    /// Link-style info service `D0FF` (Mini).
    LinkInfo,
    /// Link-style status service `6287` (Mini).
    LinkStatus,
    /// Wide service `E0FF`.
    WideStatus,
}

/// Auxiliary status characteristics the engine notifies besides the main
/// notify characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuxChannel {
    /// Mini `FFF1`: film, battery and charging summary.
    LinkStatus,
    /// Wide `FFE1`: written by the app to request a status notification.
    WideStatus,
    /// Wide `FFEA`: fixed info block.
    WideInfo,
}

impl AuxChannel {
    pub fn characteristic(&self) -> Characteristic {
        match self {
            Self::LinkStatus => Characteristic::LinkFff1,
            Self::WideStatus => Characteristic::WideFfe1,
            Self::WideInfo => Characteristic::WideFfea,
        }
    }

    /// One-byte identifier used on the development transport.
    pub fn wire_id(&self) -> u8 {
        match self {
            Self::LinkStatus => 1,
            Self::WideStatus => 2,
            Self::WideInfo => 3,
        }
    }

    pub fn from_wire_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::LinkStatus),
            2 => Some(Self::WideStatus),
            3 => Some(Self::WideInfo),
            _ => None,
        }
    }
}

/// Every characteristic any model exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    InstaxWrite,
    InstaxNotify,
    ModelNumber,
    SerialNumber,
    FirmwareRevision,
    HardwareRevision,
    SoftwareRevision,
    ManufacturerName,
    SystemId,
    PnpId,
    LinkFfd1,
    LinkFfd2,
    LinkFfd3,
    LinkFfd4,
    LinkFff1,
    LinkFfe0,
    LinkFfe1,
    LinkFff3,
    LinkFff4,
    LinkFff5,
    LinkControl,
    LinkStatusNotify,
    WideFfe1,
    WideFfe9,
    WideFfea,
}

/// GATT properties of a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Properties {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
}

impl Properties {
    const READ: Self = Self { read: true, write: false, write_without_response: false, notify: false };
    const READ_NOTIFY: Self = Self { read: true, write: false, write_without_response: false, notify: true };
    const READ_WRITE: Self = Self { read: true, write: true, write_without_response: false, notify: false };
    const WRITE: Self = Self { read: false, write: true, write_without_response: false, notify: false };
    const WRITE_BOTH: Self = Self { read: false, write: true, write_without_response: true, notify: false };
    const NOTIFY: Self = Self { read: false, write: false, write_without_response: false, notify: true };
    // Wide FFE1 must not be readable: a read flag makes the app report
    // "printer busy".
    const NOTIFY_WRITE_BOTH: Self = Self { read: false, write: true, write_without_response: true, notify: true };
}

impl Characteristic {
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::InstaxWrite => INSTAX_WRITE_UUID,
            Self::InstaxNotify => INSTAX_NOTIFY_UUID,
            Self::ModelNumber => sig_uuid(0x2A24),
            Self::SerialNumber => sig_uuid(0x2A25),
            Self::FirmwareRevision => sig_uuid(0x2A26),
            Self::HardwareRevision => sig_uuid(0x2A27),
            Self::SoftwareRevision => sig_uuid(0x2A28),
            Self::ManufacturerName => sig_uuid(0x2A29),
            Self::SystemId => sig_uuid(0x2A23),
            Self::PnpId => sig_uuid(0x2A50),
            Self::LinkFfd1 => vendor_uuid(0xFFD1),
            Self::LinkFfd2 => vendor_uuid(0xFFD2),
            Self::LinkFfd3 => vendor_uuid(0xFFD3),
            Self::LinkFfd4 => vendor_uuid(0xFFD4),
            Self::LinkFff1 => vendor_uuid(0xFFF1),
            Self::LinkFfe0 => vendor_uuid(0xFFE0),
            Self::LinkFfe1 => vendor_uuid(0xFFE1),
            Self::LinkFff3 => vendor_uuid(0xFFF3),
            Self::LinkFff4 => vendor_uuid(0xFFF4),
            Self::LinkFff5 => vendor_uuid(0xFFF5),
            Self::LinkControl => vendor_uuid(0x6387),
            Self::LinkStatusNotify => vendor_uuid(0x6487),
            Self::WideFfe1 => vendor_uuid(0xFFE1),
            Self::WideFfe9 => vendor_uuid(0xFFE9),
            Self::WideFfea => vendor_uuid(0xFFEA),
        }
    }

    pub fn properties(&self) -> Properties {
        match self {
            Self::InstaxWrite => Properties::WRITE_BOTH,
            Self::InstaxNotify => Properties::READ_NOTIFY,
            Self::LinkFff1 => Properties::READ_NOTIFY,
            Self::LinkControl => Properties::READ_WRITE,
            Self::LinkStatusNotify => Properties::NOTIFY,
            Self::WideFfe1 => Properties::NOTIFY_WRITE_BOTH,
            Self::WideFfe9 => Properties::WRITE,
            Self::WideFfea => Properties::READ_NOTIFY,
            _ => Properties::READ,
        }
    }
}

/// One service as a transport should register it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescription {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicDescription>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicDescription {
    pub characteristic: Characteristic,
    pub uuid: Uuid,
    pub properties: Properties,
}

fn describe(uuid: Uuid, characteristics: &[Characteristic]) -> ServiceDescription {
    ServiceDescription {
        uuid,
        characteristics: characteristics
            .iter()
            .map(|c| CharacteristicDescription {
                characteristic: *c,
                uuid: c.uuid(),
                properties: c.properties(),
            })
            .collect(),
    }
}

/// Services to register for `model`, Device Information first.
pub fn service_layout(model: Model) -> Vec<ServiceDescription> {
    use Characteristic::*;

    let mut services = vec![describe(
        DEVICE_INFO_SERVICE_UUID,
        &[
            ModelNumber,
            SerialNumber,
            FirmwareRevision,
            HardwareRevision,
            SoftwareRevision,
            ManufacturerName,
            SystemId,
            PnpId,
        ],
    )];

    for set in profile(model).services {
        services.push(match set {
            ServiceSet::Instax => describe(INSTAX_SERVICE_UUID, &[InstaxWrite, InstaxNotify]),
            ServiceSet::LinkInfo => describe(
                LINK_INFO_SERVICE_UUID,
                &[LinkFfd1, LinkFfd2, LinkFfd3, LinkFfd4, LinkFff1, LinkFfe0, LinkFfe1, LinkFff3, LinkFff4, LinkFff5],
            ),
            ServiceSet::LinkStatus => describe(LINK_STATUS_SERVICE_UUID, &[LinkControl, LinkStatusNotify]),
            ServiceSet::WideStatus => describe(WIDE_SERVICE_UUID, &[WideFfe1, WideFfe9, WideFfea]),
        });
    }
    services
}

// ---------------------------------------------------------------------------
// Read values and auxiliary payloads
// ---------------------------------------------------------------------------

/// Result of a characteristic read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadValue {
    Value(Vec<u8>),
    /// Answer with ATT "attribute not found".
    NotFound,
}

/// Battery scaled to the 0-200 range used by the auxiliary status payloads.
pub fn scaled_battery(percent: u8) -> u8 {
    ((u16::from(percent) * 200) / 100).min(255) as u8
}

/// Twelve-byte status block; `byte1` is the only position that differs
/// between Mini FFF1 and Wide FFE1.
fn status_block(state: &DeviceState, byte1: u8) -> Vec<u8> {
    vec![
        state.photos_remaining,
        byte1,
        0x00,
        0x15,
        0x00,
        0x00,
        0x4F,
        0x00,
        scaled_battery(state.battery_percent),
        if state.charging { 0x00 } else { 0xFF },
        0x0F,
        0x00,
    ]
}

/// Payload notified (or read) on an auxiliary channel.
pub fn aux_payload(channel: AuxChannel, state: &DeviceState) -> Vec<u8> {
    match channel {
        AuxChannel::LinkStatus => status_block(state, 0x01),
        AuxChannel::WideStatus => status_block(state, if state.printer_busy { 0x00 } else { 0x01 }),
        AuxChannel::WideInfo => WIDE_INFO_PAYLOAD.to_vec(),
    }
}

/// Value returned for a read of `characteristic`.
pub fn read_characteristic(characteristic: Characteristic, state: &DeviceState) -> ReadValue {
    use Characteristic::*;

    let value = match characteristic {
        ModelNumber => state.model_number.as_bytes().to_vec(),
        SerialNumber => state.serial_number.as_bytes().to_vec(),
        FirmwareRevision => state.firmware_revision.as_bytes().to_vec(),
        HardwareRevision => state.hardware_revision.as_bytes().to_vec(),
        SoftwareRevision => state.software_revision.as_bytes().to_vec(),
        ManufacturerName => state.manufacturer_name.as_bytes().to_vec(),
        SystemId => SYSTEM_ID.to_vec(),
        PnpId => PNP_ID.to_vec(),
        InstaxNotify => Vec::new(),
        LinkFfd1 => LINK_FFD1.to_vec(),
        LinkFfd2 => LINK_FFD2.to_vec(),
        LinkFfd3 | LinkFfd4 => return ReadValue::NotFound,
        LinkFff1 => aux_payload(AuxChannel::LinkStatus, state),
        LinkFfe0 => LINK_FFE0.to_vec(),
        LinkFfe1 => LINK_FFE1.to_vec(),
        LinkFff3 => LINK_FFF3.to_vec(),
        LinkFff4 => LINK_FFF4.to_vec(),
        LinkFff5 => LINK_FFF5.to_vec(),
        LinkControl => LINK_CONTROL.to_vec(),
        WideFfea => WIDE_INFO_PAYLOAD.to_vec(),
        InstaxWrite | LinkStatusNotify | WideFfe1 | WideFfe9 => return ReadValue::NotFound,
    };
    ReadValue::Value(value)
}

// ---------------------------------------------------------------------------
// Advertising
// ---------------------------------------------------------------------------

/// LE Limited Discoverable, BR/EDR not supported.
pub const ADVERTISING_FLAGS: u8 = 0x05;

const AD_FLAGS: u8 = 0x01;
const AD_INCOMPLETE_UUID128: u8 = 0x06;
const AD_COMPLETE_UUID128: u8 = 0x07;
const AD_COMPLETE_NAME: u8 = 0x09;
const AD_TX_POWER: u8 = 0x0A;
const AD_MANUFACTURER: u8 = 0xFF;

/// Advertising and scan response content for the current personality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingData {
    pub flags: u8,
    pub local_name: String,
    /// Complete 128-bit service list in the main packet.
    pub service_uuids: Vec<Uuid>,
    pub manufacturer_data: [u8; 4],
    pub tx_power: i8,
    /// Incomplete 128-bit service list in the scan response.
    pub scan_response_uuids: Vec<Uuid>,
}

/// Build the advertising description from the device state.
pub fn advertising_data(state: &DeviceState) -> AdvertisingData {
    let p = profile(state.model);
    let scan_response_uuids = if state.model == Model::Wide {
        vec![WIDE_SERVICE_UUID]
    } else {
        Vec::new()
    };
    AdvertisingData {
        flags: ADVERTISING_FLAGS,
        local_name: state.device_name.clone(),
        service_uuids: vec![INSTAX_SERVICE_UUID],
        manufacturer_data: p.manufacturer_data,
        tx_power: p.tx_power,
        scan_response_uuids,
    }
}

fn push_ad(buf: &mut Vec<u8>, ad_type: u8, data: &[u8]) {
    buf.push((data.len() + 1) as u8);
    buf.push(ad_type);
    buf.extend_from_slice(data);
}

/// 128-bit UUIDs go over the air least-significant byte first.
fn uuid_le(uuid: &Uuid) -> [u8; 16] {
    let mut bytes = *uuid.as_bytes();
    bytes.reverse();
    bytes
}

impl AdvertisingData {
    /// Raw AD structures of the main advertising packet.
    pub fn advertising_packet(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(31);
        push_ad(&mut buf, AD_FLAGS, &[self.flags]);
        let uuids: Vec<u8> = self.service_uuids.iter().flat_map(uuid_le).collect();
        push_ad(&mut buf, AD_COMPLETE_UUID128, &uuids);
        push_ad(&mut buf, AD_MANUFACTURER, &self.manufacturer_data);
        push_ad(&mut buf, AD_TX_POWER, &[self.tx_power as u8]);
        buf
    }

    /// Raw AD structures of the scan response (name without terminator).
    pub fn scan_response_packet(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(31);
        push_ad(&mut buf, AD_COMPLETE_NAME, self.local_name.as_bytes());
        if !self.scan_response_uuids.is_empty() {
            let uuids: Vec<u8> = self.scan_response_uuids.iter().flat_map(uuid_le).collect();
            push_ad(&mut buf, AD_INCOMPLETE_UUID128, &uuids);
        }
        buf
    }
}
