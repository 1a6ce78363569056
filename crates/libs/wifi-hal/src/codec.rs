//! Conversions between framework text forms and HAL byte forms.
//!
//! Everything here is pure: parsing failures come back as [`CodecError`] and
//! the proxies turn them into local validation failures before any RPC.

use std::net::Ipv4Addr;

use crate::types::{Band, InformationElement, MacAddress, WfdInfo};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid mac address: {0:?}")]
    Mac(String),

    #[error("invalid mac address length: {0}")]
    MacLength(usize),

    #[error("invalid ssid: {0:?}")]
    Ssid(String),

    #[error("invalid hex string: {0:?}")]
    Hex(String),

    #[error("malformed WPS device type: {0:?}")]
    WpsDeviceType(String),

    #[error("unknown WPS config method: {0:?}")]
    WpsConfigMethod(String),

    #[error("invalid channel {channel} for {band:?}")]
    Channel { band: Band, channel: u32 },
}

/// Vendor specific information element id.
pub const VENDOR_SPECIFIC_IE_ID: u8 = 221;

pub fn parse_mac(s: &str) -> Result<MacAddress, CodecError> {
    s.parse()
}

/// Parses a MAC that may be omitted; `None` and `""` both map to the wildcard address.
pub fn parse_optional_mac(s: Option<&str>) -> Result<MacAddress, CodecError> {
    match s {
        None | Some("") => Ok(MacAddress::ANY),
        Some(text) => parse_mac(text),
    }
}

pub fn hex_bytes(s: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(s).map_err(|_| CodecError::Hex(s.to_string()))
}

// ── WPS ────────────────────────────────────────────────────────────────────

/// Formats an 8-byte primary device type as `category-OUI-subcategory`.
pub fn wps_device_type_to_string(bytes: &[u8]) -> Result<String, CodecError> {
    if bytes.len() != 8 {
        return Err(CodecError::WpsDeviceType(hex::encode(bytes)));
    }
    let category = u16::from_be_bytes([bytes[0], bytes[1]]);
    let subcategory = u16::from_be_bytes([bytes[6], bytes[7]]);
    Ok(format!(
        "{category}-{}-{subcategory}",
        hex::encode_upper(&bytes[2..6])
    ))
}

/// Parses `category-OUI-subcategory` (1-2 digit category and subcategory,
/// 8 hex digit OUI) into the 8-byte wire form.
pub fn wps_device_type_from_string(s: &str) -> Result<[u8; 8], CodecError> {
    let malformed = || CodecError::WpsDeviceType(s.to_string());
    let mut parts = s.split('-');
    let (Some(category), Some(oui), Some(subcategory), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };
    let small_decimal = |part: &str| -> Result<u16, CodecError> {
        if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        part.parse().map_err(|_| malformed())
    };
    let category = small_decimal(category)?;
    let subcategory = small_decimal(subcategory)?;
    if oui.len() != 8 {
        return Err(malformed());
    }
    let oui = hex::decode(oui).map_err(|_| malformed())?;

    let mut bytes = [0u8; 8];
    bytes[0..2].copy_from_slice(&category.to_be_bytes());
    bytes[2..6].copy_from_slice(&oui);
    bytes[6..8].copy_from_slice(&subcategory.to_be_bytes());
    Ok(bytes)
}

/// WPS config method bits.
pub mod wps_config_methods {
    pub const USBA: u16 = 0x0001;
    pub const ETHERNET: u16 = 0x0002;
    pub const LABEL: u16 = 0x0004;
    pub const DISPLAY: u16 = 0x0008;
    pub const EXT_NFC_TOKEN: u16 = 0x0010;
    pub const INT_NFC_TOKEN: u16 = 0x0020;
    pub const NFC_INTERFACE: u16 = 0x0040;
    pub const PUSHBUTTON: u16 = 0x0080;
    pub const KEYPAD: u16 = 0x0100;
    pub const VIRT_PUSHBUTTON: u16 = 0x0280;
    pub const PHY_PUSHBUTTON: u16 = 0x0480;
    pub const P2PS: u16 = 0x1000;
    pub const VIRT_DISPLAY: u16 = 0x2008;
    pub const PHY_DISPLAY: u16 = 0x4008;
}

/// Folds a whitespace separated list of config method names into a bitmask.
pub fn wps_config_methods_mask(s: &str) -> Result<u16, CodecError> {
    use wps_config_methods::*;

    s.split_whitespace().try_fold(0u16, |mask, name| {
        let bit = match name {
            "usba" => USBA,
            "ethernet" => ETHERNET,
            "label" => LABEL,
            "display" => DISPLAY,
            "int_nfc_token" => INT_NFC_TOKEN,
            "ext_nfc_token" => EXT_NFC_TOKEN,
            "nfc_interface" => NFC_INTERFACE,
            "push_button" => PUSHBUTTON,
            "keypad" => KEYPAD,
            "virtual_push_button" => VIRT_PUSHBUTTON,
            "physical_push_button" => PHY_PUSHBUTTON,
            "p2ps" => P2PS,
            "virtual_display" => VIRT_DISPLAY,
            "physical_display" => PHY_DISPLAY,
            other => return Err(CodecError::WpsConfigMethod(other.to_string())),
        };
        Ok(mask | bit)
    })
}

// ── Information elements ───────────────────────────────────────────────────

/// Splits `id, len, bytes` triples. Parsing stops at the first truncated element.
pub fn parse_information_elements(bytes: &[u8]) -> Vec<InformationElement> {
    let mut elements = Vec::new();
    let mut rest = bytes;
    while let [id, len, tail @ ..] = rest {
        let len = usize::from(*len);
        if tail.len() < len {
            log::debug!("codec: truncated information element {id}, {len} > {}", tail.len());
            break;
        }
        elements.push(InformationElement {
            id: *id,
            bytes: tail[..len].to_vec(),
        });
        rest = &tail[len..];
    }
    elements
}

pub fn encode_information_elements(elements: &[InformationElement]) -> Vec<u8> {
    let mut out = Vec::new();
    for element in elements {
        out.push(element.id);
        // Elements longer than 255 bytes cannot be expressed; truncate to the length byte.
        let len = element.bytes.len().min(usize::from(u8::MAX));
        out.push(len as u8);
        out.extend_from_slice(&element.bytes[..len]);
    }
    out
}

// ── Wi-Fi Display ──────────────────────────────────────────────────────────

/// Decodes the 6-byte WFD subelement and the optional 2-byte R2 subelement.
pub fn wfd_info_from_bytes(info: Option<&[u8]>, r2: Option<&[u8]>) -> Option<WfdInfo> {
    let info = info.filter(|b| b.len() >= 6)?;
    let be = |i: usize| u16::from_be_bytes([info[i], info[i + 1]]);
    Some(WfdInfo {
        device_info: be(0),
        control_port: be(2),
        max_throughput: be(4),
        r2_device_info: r2
            .filter(|b| b.len() >= 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]])),
    })
}

// ── Channels ───────────────────────────────────────────────────────────────

pub fn channel_to_frequency(band: Band, channel: u32) -> Result<i32, CodecError> {
    let invalid = || CodecError::Channel { band, channel };
    let freq = match band {
        Band::Band2Ghz => match channel {
            14 => 2484,
            1..=13 => 2407 + 5 * channel,
            _ => return Err(invalid()),
        },
        Band::Band5Ghz => match channel {
            32..=177 => 5000 + 5 * channel,
            _ => return Err(invalid()),
        },
        Band::Band6Ghz => match channel {
            2 => 5935,
            1..=233 => 5950 + 5 * channel,
            _ => return Err(invalid()),
        },
        Band::Band60Ghz => match channel {
            1..=6 => 56160 + 2160 * channel,
            _ => return Err(invalid()),
        },
    };
    i32::try_from(freq).map_err(|_| invalid())
}

/// Decodes a HAL IPv4 address packed little-endian into an `i32`.
pub fn ipv4_from_hal(value: i32) -> Ipv4Addr {
    Ipv4Addr::from(value.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wps_device_type_parses_and_formats() {
        let bytes = wps_device_type_from_string("10-0050F204-5").expect("parse");
        assert_eq!(bytes, [0x00, 0x0a, 0x00, 0x50, 0xf2, 0x04, 0x00, 0x05]);
        assert_eq!(wps_device_type_to_string(&bytes).expect("format"), "10-0050F204-5");
    }

    #[test]
    fn wps_device_type_rejects_bad_shapes() {
        for input in ["", "100-0050F204-5", "10-0050F2-5", "10-0050F204", "a-0050F204-5", "10-0050F204-5-1"] {
            assert!(wps_device_type_from_string(input).is_err(), "{input}");
        }
        assert!(wps_device_type_to_string(&[0; 7]).is_err());
    }

    #[test]
    fn config_methods_fold_into_mask() {
        let mask = wps_config_methods_mask("display  keypad\tp2ps").expect("mask");
        assert_eq!(
            mask,
            wps_config_methods::DISPLAY | wps_config_methods::KEYPAD | wps_config_methods::P2PS
        );
        assert_eq!(wps_config_methods_mask("").expect("empty"), 0);
        assert!(wps_config_methods_mask("display bogus").is_err());
    }

    #[test]
    fn information_elements_stop_at_truncation() {
        let bytes = [221, 2, 0xaa, 0xbb, 10, 1, 0xcc, 221, 5, 0x01];
        let elements = parse_information_elements(&bytes);
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].bytes, vec![0xaa, 0xbb]);
        assert_eq!(elements[1].id, 10);
        assert_eq!(encode_information_elements(&elements), bytes[..7].to_vec());
    }

    #[test]
    fn wfd_info_needs_six_bytes() {
        assert!(wfd_info_from_bytes(Some(&[0, 1, 2]), None).is_none());
        let info = wfd_info_from_bytes(Some(&[0x01, 0x10, 0x1c, 0x44, 0x00, 0x32]), Some(&[0, 1]))
            .expect("wfd info");
        assert_eq!(info.device_info, 0x0110);
        assert_eq!(info.control_port, 7236);
        assert_eq!(info.max_throughput, 50);
        assert_eq!(info.r2_device_info, Some(1));
    }

    #[test]
    fn channels_map_to_frequencies() {
        assert_eq!(channel_to_frequency(Band::Band2Ghz, 6), Ok(2437));
        assert_eq!(channel_to_frequency(Band::Band2Ghz, 14), Ok(2484));
        assert_eq!(channel_to_frequency(Band::Band5Ghz, 36), Ok(5180));
        assert_eq!(channel_to_frequency(Band::Band6Ghz, 1), Ok(5955));
        assert!(channel_to_frequency(Band::Band2Ghz, 15).is_err());
    }

    #[test]
    fn hal_ipv4_is_little_endian() {
        let packed = i32::from_le_bytes([192, 168, 49, 1]);
        assert_eq!(ipv4_from_hal(packed), Ipv4Addr::new(192, 168, 49, 1));
    }
}
