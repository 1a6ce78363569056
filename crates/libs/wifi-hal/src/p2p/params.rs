//! Local validation and argument mapping shared by both P2P transports.
//!
//! Every function here runs before any RPC is issued. A failure becomes
//! [`HalError::InvalidArgument`] and the proxy returns without touching the
//! remote.

use crate::codec::{self, CodecError};
use crate::error::{HalError, HalResult};
use crate::rpc::{FreqRange, MacBytes, MiracastMode as HalMiracastMode, WpsProvisionMethod};
use crate::types::{
    pairing, MacAddress, MiracastMode, P2pConfig, P2pScanType, ServiceInfo, UnsafeChannel, WpsSetup,
    FREQUENCY_UNSPECIFIED, NETWORK_ID_PERSISTENT,
};

pub const DEFAULT_OPERATING_CLASS: i32 = 81;
pub const MAX_GO_INTENT: i32 = 15;

pub(crate) fn invalid(method: &str, err: impl std::fmt::Display) -> HalError {
    HalError::invalid(method, err.to_string())
}

pub fn parse_peer(method: &str, address: &str) -> HalResult<MacBytes> {
    codec::parse_mac(address)
        .map(|mac| mac.octets())
        .map_err(|err| invalid(method, err))
}

/// `None` or an empty string is the wildcard address.
pub fn parse_optional_peer(method: &str, address: Option<&str>) -> HalResult<MacBytes> {
    codec::parse_optional_mac(address)
        .map(|mac| mac.octets())
        .map_err(|err| invalid(method, err))
}

pub fn require_non_empty(method: &str, what: &str, value: &str) -> HalResult<()> {
    if value.is_empty() {
        return Err(HalError::invalid(method, format!("{what} is empty")));
    }
    Ok(())
}

pub fn require_non_negative(method: &str, what: &str, value: i32) -> HalResult<()> {
    if value < 0 {
        return Err(HalError::invalid(method, format!("{what} is negative: {value}")));
    }
    Ok(())
}

pub fn hex_payload(method: &str, hex: &str) -> HalResult<Vec<u8>> {
    codec::hex_bytes(hex).map_err(|err| invalid(method, err))
}

// ── Discovery ──────────────────────────────────────────────────────────────

/// One of the three legacy discovery calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FindCall {
    Full { timeout: i32 },
    Social { timeout: i32 },
    SpecificFrequency { frequency: i32, timeout: i32 },
}

pub fn find_call(method: &str, scan_type: P2pScanType, frequency: i32, timeout: i32) -> HalResult<FindCall> {
    require_non_negative(method, "timeout", timeout)?;
    require_non_negative(method, "frequency", frequency)?;
    if frequency != FREQUENCY_UNSPECIFIED && scan_type != P2pScanType::SingleFreq {
        return Err(HalError::invalid(
            method,
            format!("frequency {frequency} is only valid for single frequency scans"),
        ));
    }
    match scan_type {
        P2pScanType::Full => Ok(FindCall::Full { timeout }),
        P2pScanType::Social => Ok(FindCall::Social { timeout }),
        P2pScanType::SingleFreq if frequency == FREQUENCY_UNSPECIFIED => {
            Err(HalError::invalid(method, "single frequency scan needs a frequency"))
        }
        P2pScanType::SingleFreq => Ok(FindCall::SpecificFrequency { frequency, timeout }),
    }
}

// ── Connection ─────────────────────────────────────────────────────────────

/// Maps a framework pairing bootstrapping method to the HAL mask bit.
pub fn pairing_method_to_hal(method: i32) -> Option<i32> {
    match method {
        pairing::OPPORTUNISTIC
        | pairing::DISPLAY_PINCODE
        | pairing::DISPLAY_PASSPHRASE
        | pairing::KEYPAD_PINCODE
        | pairing::KEYPAD_PASSPHRASE
        | pairing::OUT_OF_BAND => Some(method),
        _ => None,
    }
}

pub fn wps_provision_method(setup: WpsSetup) -> Option<WpsProvisionMethod> {
    match setup {
        WpsSetup::Pbc => Some(WpsProvisionMethod::Pbc),
        WpsSetup::Display => Some(WpsProvisionMethod::Display),
        WpsSetup::Keypad | WpsSetup::Label => Some(WpsProvisionMethod::Keypad),
        WpsSetup::Invalid => None,
    }
}

/// Arguments of a connect request after validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectArgs {
    pub peer: MacBytes,
    pub provision_method: WpsProvisionMethod,
    pub pre_selected_pin: String,
    pub persistent: bool,
    pub go_intent: i32,
    pub pairing_method: i32,
    pub pairing_password: String,
    pub frequency_mhz: i32,
    pub authorize: bool,
}

/// Validates `config` for a connect. With `pairing_enabled` a pairing
/// bootstrapping config takes precedence over WPS.
pub fn connect_args(method: &str, config: &P2pConfig, pairing_enabled: bool) -> HalResult<ConnectArgs> {
    let mut args = ConnectArgs {
        peer: [0; 6],
        provision_method: WpsProvisionMethod::None,
        pre_selected_pin: String::new(),
        persistent: false,
        go_intent: config.group_owner_intent,
        pairing_method: pairing::NONE,
        pairing_password: String::new(),
        frequency_mhz: 0,
        authorize: false,
    };

    match config.pairing.as_ref().filter(|_| pairing_enabled) {
        Some(bootstrap) => {
            args.pairing_method = pairing_method_to_hal(bootstrap.method).ok_or_else(|| {
                HalError::invalid(
                    method,
                    format!("unrecognized pairing bootstrapping method {}", bootstrap.method),
                )
            })?;
            let opportunistic = args.pairing_method == pairing::OPPORTUNISTIC;
            if opportunistic && !bootstrap.password.is_empty() {
                return Err(HalError::invalid(method, "opportunistic bootstrapping takes no password"));
            }
            if !opportunistic && bootstrap.password.is_empty() {
                return Err(HalError::invalid(method, "pairing bootstrapping needs a pin or password"));
            }
            args.pairing_password = bootstrap.password.clone();
            // Band selectors are 0/2/5/6; anything else is a frequency.
            if !matches!(config.group_owner_band, 0 | 2 | 5 | 6) {
                args.frequency_mhz = config.group_owner_band;
            }
            args.authorize = config.authorize_connection_from_peer;
        }
        None => {
            let pin = config.pin.as_deref().unwrap_or_default();
            if config.wps == WpsSetup::Pbc && !pin.is_empty() {
                return Err(HalError::invalid(method, "push button setup takes no pin"));
            }
            args.provision_method = wps_provision_method(config.wps).ok_or_else(|| {
                HalError::invalid(method, format!("invalid WPS setup {:?}", config.wps))
            })?;
            args.pre_selected_pin = pin.to_string();
        }
    }

    args.peer = parse_peer(method, &config.device_address)?;
    args.persistent = config.network_id == NETWORK_ID_PERSISTENT;
    if !(0..=MAX_GO_INTENT).contains(&config.group_owner_intent) {
        return Err(HalError::invalid(
            method,
            format!("invalid group owner intent {}", config.group_owner_intent),
        ));
    }
    Ok(args)
}

/// Provision discovery method: the framework names the local action, the
/// HAL names what the peer does, so display and keypad swap.
pub fn provision_discovery_method(method: &str, setup: WpsSetup) -> HalResult<WpsProvisionMethod> {
    match setup {
        WpsSetup::Pbc => Ok(WpsProvisionMethod::Pbc),
        WpsSetup::Display => Ok(WpsProvisionMethod::Keypad),
        WpsSetup::Keypad | WpsSetup::Label => Ok(WpsProvisionMethod::Display),
        other => Err(HalError::invalid(method, format!("unsupported WPS setup {other:?}"))),
    }
}

// ── Listen and channels ────────────────────────────────────────────────────

/// Returns the `(period, interval)` pair to send; disabling sends zeros.
pub fn ext_listen_timing(method: &str, enable: bool, period_ms: i32, interval_ms: i32) -> HalResult<(i32, i32)> {
    if enable && interval_ms < period_ms {
        return Err(HalError::invalid(
            method,
            format!("interval {interval_ms} is shorter than period {period_ms}"),
        ));
    }
    if !enable {
        return Ok((0, 0));
    }
    require_non_negative(method, "period", period_ms)?;
    require_non_negative(method, "interval", interval_ms)?;
    Ok((period_ms, interval_ms))
}

/// `Ok(None)` means there is nothing to send (channel 0).
pub fn listen_channel(method: &str, channel: i32) -> HalResult<Option<i32>> {
    match channel {
        0 => Ok(None),
        1 | 6 | 11 => Ok(Some(channel)),
        other => Err(HalError::invalid(method, format!("listen channel {other} is not social"))),
    }
}

/// Builds the disallowed ranges: everything around `operating_channel` when
/// it is a valid channel, plus a guard window around each unsafe channel.
pub fn disallowed_frequencies(operating_channel: i32, unsafe_channels: &[UnsafeChannel]) -> Vec<FreqRange> {
    let mut ranges = Vec::new();
    if (1..=165).contains(&operating_channel) {
        let base = if operating_channel <= 14 { 2407 } else { 5000 };
        let freq = base + operating_channel * 5;
        ranges.push(FreqRange { min: 1000, max: freq - 5 });
        ranges.push(FreqRange { min: freq + 5, max: 6000 });
    }
    for channel in unsafe_channels {
        match codec::channel_to_frequency(channel.band, channel.channel) {
            Ok(center) => ranges.push(FreqRange {
                min: center - 6,
                max: center + 4,
            }),
            Err(err) => log::warn!("p2p: skipping unsafe channel: {err}"),
        }
    }
    ranges
}

// ── Services ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceCommand {
    Upnp { version: i32, name: String },
    Bonjour { query: Vec<u8>, response: Vec<u8> },
}

/// Parses every `upnp <hexver> <name>` / `bonjour <hexquery> <hexresponse>`
/// entry. The whole list is validated before anything is sent.
pub fn service_commands(method: &str, info: &ServiceInfo, with_response: bool) -> HalResult<Vec<ServiceCommand>> {
    info.supplicant_queries
        .iter()
        .map(|entry| {
            let parts: Vec<&str> = entry.split(' ').collect();
            if parts.len() < 3 {
                return Err(HalError::invalid(method, format!("service specification invalid: {entry}")));
            }
            match parts[0] {
                "upnp" => {
                    let version = i32::from_str_radix(parts[1], 16).map_err(|_| {
                        HalError::invalid(method, format!("UPnP service specification invalid: {entry}"))
                    })?;
                    Ok(ServiceCommand::Upnp {
                        version,
                        name: parts[2].to_string(),
                    })
                }
                "bonjour" => {
                    let query = hex_payload(method, parts[1])?;
                    let response = if with_response {
                        hex_payload(method, parts[2])?
                    } else {
                        Vec::new()
                    };
                    Ok(ServiceCommand::Bonjour { query, response })
                }
                other => Err(HalError::invalid(
                    method,
                    format!("unknown or unsupported P2P service: {other}"),
                )),
            }
        })
        .collect()
}

pub fn service_discovery_id(method: &str, id: &str) -> HalResult<u64> {
    id.parse()
        .map_err(|_| HalError::invalid(method, format!("service discovery id {id:?} is not a number")))
}

pub fn miracast_mode(mode: MiracastMode) -> HalMiracastMode {
    match mode {
        MiracastMode::Source => HalMiracastMode::Source,
        MiracastMode::Sink => HalMiracastMode::Sink,
        MiracastMode::Disabled => HalMiracastMode::Disabled,
    }
}

pub fn wps_device_type(method: &str, device_type: &str) -> HalResult<[u8; 8]> {
    codec::wps_device_type_from_string(device_type).map_err(|err| invalid(method, err))
}

pub fn wps_config_methods(method: &str, methods: &str) -> HalResult<u16> {
    codec::wps_config_methods_mask(methods).map_err(|err: CodecError| invalid(method, err))
}

// ── Persistent groups ──────────────────────────────────────────────────────

/// Whitespace-separated client addresses, at least one.
pub fn client_list(method: &str, clients: &str) -> HalResult<Vec<MacBytes>> {
    let clients: Vec<&str> = clients.split_whitespace().collect();
    if clients.is_empty() {
        return Err(HalError::invalid(method, "client list is empty"));
    }
    clients.into_iter().map(|client| parse_peer(method, client)).collect()
}

/// Space-joined client addresses; one malformed entry fails the whole list.
pub fn format_client_list(method: &str, clients: &[Vec<u8>]) -> HalResult<String> {
    let clients = clients
        .iter()
        .map(|client| MacAddress::from_bytes(client).map(|mac| mac.to_string()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| invalid(method, err))?;
    Ok(clients.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Band;

    #[test]
    fn find_rejects_frequency_without_single_freq() {
        assert!(find_call("find", P2pScanType::Full, 2412, 30).is_err());
        assert!(find_call("find", P2pScanType::SingleFreq, 0, 30).is_err());
        assert!(find_call("find", P2pScanType::Full, 0, -1).is_err());
        assert_eq!(
            find_call("find", P2pScanType::SingleFreq, 2437, 30),
            Ok(FindCall::SpecificFrequency { frequency: 2437, timeout: 30 })
        );
        assert_eq!(find_call("find", P2pScanType::Social, 0, 5), Ok(FindCall::Social { timeout: 5 }));
    }

    #[test]
    fn connect_maps_wps_setup() {
        let config = P2pConfig::new("aa:bb:cc:dd:ee:ff")
            .with_wps(WpsSetup::Label, Some("12345670"))
            .with_network_id(NETWORK_ID_PERSISTENT);
        let args = connect_args("connect", &config, false).expect("valid");
        assert_eq!(args.provision_method, WpsProvisionMethod::Keypad);
        assert_eq!(args.pre_selected_pin, "12345670");
        assert!(args.persistent);
        assert_eq!(args.peer, [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    }

    #[test]
    fn connect_rejects_pbc_with_pin_and_bad_intent() {
        let pbc = P2pConfig::new("aa:bb:cc:dd:ee:ff").with_wps(WpsSetup::Pbc, Some("1234"));
        assert!(connect_args("connect", &pbc, false).is_err());

        let intent = P2pConfig::new("aa:bb:cc:dd:ee:ff").with_group_owner_intent(16);
        assert!(connect_args("connect", &intent, false).is_err());
    }

    #[test]
    fn connect_pairing_checks_password() {
        let opportunistic = P2pConfig::new("aa:bb:cc:dd:ee:ff").with_pairing(pairing::OPPORTUNISTIC, "x");
        assert!(connect_args("connect", &opportunistic, true).is_err());

        let pin = P2pConfig::new("aa:bb:cc:dd:ee:ff").with_pairing(pairing::KEYPAD_PINCODE, "");
        assert!(connect_args("connect", &pin, true).is_err());

        let ok = P2pConfig::new("aa:bb:cc:dd:ee:ff")
            .with_pairing(pairing::DISPLAY_PASSPHRASE, "secret")
            .with_group_owner_band(2437);
        let args = connect_args("connect", &ok, true).expect("valid");
        assert_eq!(args.pairing_method, pairing::DISPLAY_PASSPHRASE);
        assert_eq!(args.frequency_mhz, 2437);
        assert_eq!(args.provision_method, WpsProvisionMethod::None);

        // Pairing is ignored when the transport cannot carry it.
        let args = connect_args("connect", &ok, false).expect("wps fallback");
        assert_eq!(args.pairing_method, pairing::NONE);
        assert_eq!(args.provision_method, WpsProvisionMethod::Pbc);
    }

    #[test]
    fn provision_discovery_swaps_display_and_keypad() {
        assert_eq!(provision_discovery_method("pd", WpsSetup::Display), Ok(WpsProvisionMethod::Keypad));
        assert_eq!(provision_discovery_method("pd", WpsSetup::Keypad), Ok(WpsProvisionMethod::Display));
        assert_eq!(provision_discovery_method("pd", WpsSetup::Label), Ok(WpsProvisionMethod::Display));
        assert!(provision_discovery_method("pd", WpsSetup::Invalid).is_err());
    }

    #[test]
    fn ext_listen_validates_timing() {
        assert!(ext_listen_timing("ext", true, 100, 50).is_err());
        assert_eq!(ext_listen_timing("ext", false, 100, 50), Ok((0, 0)));
        assert_eq!(ext_listen_timing("ext", true, 100, 500), Ok((100, 500)));
        assert!(ext_listen_timing("ext", true, -5, 500).is_err());
    }

    #[test]
    fn listen_channel_accepts_social_only() {
        assert_eq!(listen_channel("listen", 0), Ok(None));
        assert_eq!(listen_channel("listen", 6), Ok(Some(6)));
        assert!(listen_channel("listen", 3).is_err());
    }

    #[test]
    fn operating_channel_builds_ranges() {
        let ranges = disallowed_frequencies(6, &[]);
        assert_eq!(ranges, vec![FreqRange { min: 1000, max: 2432 }, FreqRange { min: 2442, max: 6000 }]);

        let ranges = disallowed_frequencies(0, &[UnsafeChannel { band: Band::Band5Ghz, channel: 36 }]);
        assert_eq!(ranges, vec![FreqRange { min: 5174, max: 5184 }]);

        assert!(disallowed_frequencies(200, &[]).is_empty());
    }

    #[test]
    fn service_entries_parse() {
        let info = ServiceInfo::new(["upnp 10 uuid:1234::urn:schemas", "bonjour 0b5f 0c01"]);
        let commands = service_commands("serviceAdd", &info, true).expect("valid");
        assert_eq!(
            commands,
            vec![
                ServiceCommand::Upnp { version: 16, name: "uuid:1234::urn:schemas".to_string() },
                ServiceCommand::Bonjour { query: vec![0x0b, 0x5f], response: vec![0x0c, 0x01] },
            ]
        );

        assert!(service_commands("serviceAdd", &ServiceInfo::new(["upnp 10"]), true).is_err());
        assert!(service_commands("serviceAdd", &ServiceInfo::new(["wsd 1 2"]), true).is_err());
        assert!(service_commands("serviceAdd", &ServiceInfo::new(["bonjour zz 00"]), true).is_err());
        // Removal only needs the query.
        assert!(service_commands("serviceRemove", &ServiceInfo::new(["bonjour 0b zz"]), false).is_ok());
    }

    #[test]
    fn client_lists_parse_and_format() {
        let clients = client_list("setClientList", " 02:11:22:33:44:55\t02:aa:bb:cc:dd:ee ").expect("valid");
        assert_eq!(clients, vec![[0x02, 0x11, 0x22, 0x33, 0x44, 0x55], [0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]]);
        assert!(client_list("setClientList", "  ").is_err());
        assert!(client_list("setClientList", "02:11:22:33:44:55 nope").is_err());

        let formatted = format_client_list("getClientList", &[vec![0x02, 0x11, 0x22, 0x33, 0x44, 0x55], vec![0xaa; 6]]);
        assert_eq!(formatted.as_deref(), Ok("02:11:22:33:44:55 aa:aa:aa:aa:aa:aa"));
        assert_eq!(format_client_list("getClientList", &[]).as_deref(), Ok(""));
        assert!(format_client_list("getClientList", &[vec![0x02, 0x11]]).is_err());
    }
}
