// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Model profile registry.
//
// Every model-conditional byte the dispatcher emits lives in these tables so
// the dispatch logic stays model-agnostic.  Byte blocks marked "opaque" are
// copied from captures of real printers; their meaning is unconfirmed and they
// must be reproduced exactly.

use instax_core::Model;

use crate::gatt::{AuxChannel, ServiceSet};

/// Device Information Service defaults for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfoDefaults {
    pub model_number: &'static str,
    pub serial_number: &'static str,
    pub firmware_revision: &'static str,
    pub hardware_revision: &'static str,
    pub software_revision: &'static str,
    pub manufacturer_name: &'static str,
    pub device_name: &'static str,
}

/// Immutable parameter set for one printer personality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelProfile {
    pub model: Model,
    /// Image width in pixels.
    pub width: u16,
    /// Image height in pixels.
    pub height: u16,
    /// Image bytes per print data frame sent by the app.
    pub chunk_size: usize,
    /// Largest image the app will send.
    pub max_file_size: usize,
    pub device_info: DeviceInfoDefaults,
    /// Manufacturer-specific advertising data (company id + model byte).
    pub manufacturer_data: [u8; 4],
    /// Advertised TX power in dBm.
    pub tx_power: i8,
    /// Model flag bits OR-ed into the printer-function capability byte.
    pub capability_base: u8,
    /// Byte 3 of the identify response payload.
    pub identify_byte: u8,
    /// First data byte of the battery info response.
    pub battery_state_byte: u8,
    /// Opaque bytes following width/height in the dimension query response.
    pub dimension_tail: &'static [u8],
    /// Opaque bytes following width/height in the image-support info response.
    pub image_support_tail: &'static [u8],
    /// Opaque bytes 3..8 of the additional-info type 1 response.
    pub additional_info_block: [u8; 5],
    /// Whether a print-history query is followed by an unsolicited status frame.
    pub history_follow_up: bool,
    /// GATT services exposed besides Device Information.
    pub services: &'static [ServiceSet],
    /// Auxiliary status characteristics the engine may notify.
    pub aux_channels: &'static [AuxChannel],
}

/// Opaque tail shared by the Square dimension and image-support responses
/// (also used for the Mini dimension response).
const SQUARE_CAPABILITY_TAIL: [u8; 10] = [0x02, 0x4B, 0x00, 0x06, 0x40, 0x00, 0x01, 0x00, 0x00, 0x00];

/// Opaque image-support tail captured from a Mini Link 3.
const MINI_IMAGE_SUPPORT_TAIL: [u8; 10] = [0x02, 0x7B, 0x00, 0x02, 0x58, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Opaque capability tail captured from a Link Wide.
const WIDE_CAPABILITY_TAIL: [u8; 6] = [0x02, 0x7B, 0x00, 0x05, 0x28, 0x00];

static MINI: ModelProfile = ModelProfile {
    model: Model::Mini,
    width: 600,
    height: 800,
    chunk_size: 900,
    max_file_size: 105 * 1024,
    device_info: DeviceInfoDefaults {
        model_number: "FI033",
        serial_number: "70555555",
        firmware_revision: "0101",
        hardware_revision: "0000",
        software_revision: "0003",
        manufacturer_name: "FUJIFILM",
        device_name: "INSTAX-70555555(BLE)",
    },
    manufacturer_data: [0xD8, 0x04, 0x07, 0x00],
    tx_power: 6,
    capability_base: 0x30,
    identify_byte: 0x02,
    battery_state_byte: 0x03,
    dimension_tail: &SQUARE_CAPABILITY_TAIL,
    image_support_tail: &MINI_IMAGE_SUPPORT_TAIL,
    additional_info_block: [0x02, 0xFF, 0x00, 0x01, 0x02],
    history_follow_up: false,
    services: &[ServiceSet::Instax, ServiceSet::LinkInfo, ServiceSet::LinkStatus],
    aux_channels: &[AuxChannel::LinkStatus],
};

static SQUARE: ModelProfile = ModelProfile {
    model: Model::Square,
    width: 800,
    height: 800,
    chunk_size: 1808,
    max_file_size: 105 * 1024,
    device_info: DeviceInfoDefaults {
        model_number: "FI017",
        serial_number: "50555555",
        firmware_revision: "0101",
        hardware_revision: "0001",
        software_revision: "0002",
        manufacturer_name: "FUJIFILM",
        device_name: "INSTAX-50555555(IOS)",
    },
    manufacturer_data: [0xD8, 0x04, 0x05, 0x00],
    tx_power: 3,
    capability_base: 0x20,
    identify_byte: 0x02,
    battery_state_byte: 0x03,
    dimension_tail: &SQUARE_CAPABILITY_TAIL,
    image_support_tail: &SQUARE_CAPABILITY_TAIL,
    additional_info_block: [0x02, 0xFF, 0x00, 0x01, 0x02],
    history_follow_up: false,
    services: &[ServiceSet::Instax],
    aux_channels: &[],
};

static WIDE: ModelProfile = ModelProfile {
    model: Model::Wide,
    width: 1260,
    height: 840,
    chunk_size: 900,
    max_file_size: 105 * 1024,
    device_info: DeviceInfoDefaults {
        model_number: "FI022",
        serial_number: "20555555",
        firmware_revision: "0100",
        hardware_revision: "0001",
        software_revision: "0002",
        manufacturer_name: "FUJIFILM",
        device_name: "WIDE-205555",
    },
    manufacturer_data: [0xD8, 0x04, 0x02, 0x00],
    tx_power: 0,
    capability_base: 0x10,
    identify_byte: 0x01,
    battery_state_byte: 0x01,
    dimension_tail: &WIDE_CAPABILITY_TAIL,
    image_support_tail: &WIDE_CAPABILITY_TAIL,
    additional_info_block: [0x1E, 0x00, 0x01, 0x01, 0x00],
    history_follow_up: true,
    services: &[ServiceSet::Instax, ServiceSet::WideStatus],
    aux_channels: &[AuxChannel::WideStatus, AuxChannel::WideInfo],
};

/// Look up the profile of `model`.
pub fn profile(model: Model) -> &'static ModelProfile {
    match model {
        Model::Mini => &MINI,
        Model::Square => &SQUARE,
        Model::Wide => &WIDE,
    }
}

/// Map image dimensions back to the model that prints them.
pub fn detect_model(width: u16, height: u16) -> Option<Model> {
    Model::ALL
        .into_iter()
        .find(|m| {
            let p = profile(*m);
            p.width == width && p.height == height
        })
}

impl ModelProfile {
    /// Printer-function capability byte: film count (clamped to 10) in bits
    /// 0-3, model flags in bits 4-6, charging in bit 7.
    pub fn capability_byte(&self, photos_remaining: u8, charging: bool) -> u8 {
        let film = photos_remaining.min(10) & 0x0F;
        let mut byte = self.capability_base | film;
        if charging {
            byte |= 0x80;
        }
        byte
    }

    pub fn has_aux_channel(&self, channel: AuxChannel) -> bool {
        self.aux_channels.contains(&channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_per_model() {
        assert_eq!((profile(Model::Mini).width, profile(Model::Mini).height), (600, 800));
        assert_eq!((profile(Model::Square).width, profile(Model::Square).height), (800, 800));
        assert_eq!((profile(Model::Wide).width, profile(Model::Wide).height), (1260, 840));
    }

    #[test]
    fn detect_model_round_trips_dimensions() {
        for model in Model::ALL {
            let p = profile(model);
            assert_eq!(detect_model(p.width, p.height), Some(model));
        }
        assert_eq!(detect_model(640, 480), None);
    }

    #[test]
    fn capability_byte_formula_for_every_model() {
        for model in Model::ALL {
            let p = profile(model);
            for photos in 0u8..=15 {
                for charging in [false, true] {
                    let expected = p.capability_base
                        | photos.min(10)
                        | if charging { 0x80 } else { 0x00 };
                    assert_eq!(p.capability_byte(photos, charging), expected, "{model} {photos} {charging}");
                }
            }
        }
    }

    #[test]
    fn wide_capability_with_five_films_matches_capture() {
        assert_eq!(profile(Model::Wide).capability_byte(5, false), 0x15);
    }

    #[test]
    fn opaque_tables_have_capture_lengths() {
        assert_eq!(profile(Model::Wide).dimension_tail.len(), 6);
        assert_eq!(profile(Model::Mini).dimension_tail.len(), 10);
        assert_eq!(profile(Model::Square).image_support_tail.len(), 10);
        assert_eq!(profile(Model::Mini).image_support_tail[3..5], [0x02, 0x58]);
    }

    #[test]
    fn only_wide_sends_history_follow_up() {
        assert!(profile(Model::Wide).history_follow_up);
        assert!(!profile(Model::Mini).history_follow_up);
        assert!(!profile(Model::Square).history_follow_up);
    }

    #[test]
    fn square_exposes_no_auxiliary_channels() {
        assert!(profile(Model::Square).aux_channels.is_empty());
        assert!(profile(Model::Mini).has_aux_channel(AuxChannel::LinkStatus));
        assert!(profile(Model::Wide).has_aux_channel(AuxChannel::WideInfo));
    }
}
