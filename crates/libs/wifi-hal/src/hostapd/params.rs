//! Builds hostapd interface and network parameters from a [`SoftApConfig`].

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use crate::codec;
use crate::config::SoftApOverlay;
use crate::error::{HalError, HalResult};
use crate::rpc::aidl::{
    band_mask, reason_code, ChannelParams, EncryptionType, FrequencyRange, HalChannelBandwidth, HalGeneration,
    HwModeParams, IfaceParams, NetworkParams,
};
use crate::types::{
    Band, ChannelBandwidth, ClientDisconnectReason, SapClientBlockReason, SoftApConfig, SoftApSecurity, WifiStandard,
};

/// Everything the parameter builders read besides the AP configuration.
#[derive(Clone, Copy, Debug)]
pub struct ParamsContext<'a> {
    pub overlay: &'a SoftApOverlay,
    pub metered: bool,
    pub uses_mlo: bool,
    pub vendor_data_supported: bool,
    pub client_isolation_supported: bool,
}

pub fn hal_band_mask(band: Band) -> i32 {
    match band {
        Band::Band2Ghz => band_mask::BAND_2_GHZ,
        Band::Band5Ghz => band_mask::BAND_5_GHZ,
        Band::Band6Ghz => band_mask::BAND_6_GHZ,
        Band::Band60Ghz => band_mask::BAND_60_GHZ,
    }
}

pub fn encryption_type(security: SoftApSecurity) -> EncryptionType {
    match security {
        SoftApSecurity::Open => EncryptionType::None,
        SoftApSecurity::Wpa2Psk => EncryptionType::Wpa2,
        SoftApSecurity::Wpa3SaeTransition => EncryptionType::Wpa3SaeTransition,
        SoftApSecurity::Wpa3Sae => EncryptionType::Wpa3Sae,
        SoftApSecurity::Wpa3OweTransition => EncryptionType::Wpa3OweTransition,
        SoftApSecurity::Wpa3Owe => EncryptionType::Wpa3Owe,
        SoftApSecurity::Wpa2Eap => {
            log::warn!("hostapd: {security:?} has no hostapd encryption type, using none");
            EncryptionType::None
        }
    }
}

pub fn bandwidth_to_hal(bandwidth: ChannelBandwidth) -> HalChannelBandwidth {
    match bandwidth {
        ChannelBandwidth::Auto => HalChannelBandwidth::Auto,
        ChannelBandwidth::Width20MhzNoHt => HalChannelBandwidth::Width20NoHt,
        ChannelBandwidth::Width20Mhz => HalChannelBandwidth::Width20,
        ChannelBandwidth::Width40Mhz => HalChannelBandwidth::Width40,
        ChannelBandwidth::Width80Mhz => HalChannelBandwidth::Width80,
        ChannelBandwidth::Width80Plus80Mhz => HalChannelBandwidth::Width80P80,
        ChannelBandwidth::Width160Mhz => HalChannelBandwidth::Width160,
        ChannelBandwidth::Width320Mhz => HalChannelBandwidth::Width320,
        ChannelBandwidth::Width2160Mhz => HalChannelBandwidth::Width2160,
        ChannelBandwidth::Width4320Mhz => HalChannelBandwidth::Width4320,
        ChannelBandwidth::Width6480Mhz => HalChannelBandwidth::Width6480,
        ChannelBandwidth::Width8640Mhz => HalChannelBandwidth::Width8640,
        ChannelBandwidth::Invalid => HalChannelBandwidth::Invalid,
    }
}

pub fn bandwidth_from_hal(bandwidth: HalChannelBandwidth) -> ChannelBandwidth {
    match bandwidth {
        HalChannelBandwidth::Width20NoHt => ChannelBandwidth::Width20MhzNoHt,
        HalChannelBandwidth::Width20 => ChannelBandwidth::Width20Mhz,
        HalChannelBandwidth::Width40 => ChannelBandwidth::Width40Mhz,
        HalChannelBandwidth::Width80 => ChannelBandwidth::Width80Mhz,
        HalChannelBandwidth::Width80P80 => ChannelBandwidth::Width80Plus80Mhz,
        HalChannelBandwidth::Width160 => ChannelBandwidth::Width160Mhz,
        HalChannelBandwidth::Width320 => ChannelBandwidth::Width320Mhz,
        HalChannelBandwidth::Width2160 => ChannelBandwidth::Width2160Mhz,
        HalChannelBandwidth::Width4320 => ChannelBandwidth::Width4320Mhz,
        HalChannelBandwidth::Width6480 => ChannelBandwidth::Width6480Mhz,
        HalChannelBandwidth::Width8640 => ChannelBandwidth::Width8640Mhz,
        HalChannelBandwidth::Auto | HalChannelBandwidth::Invalid => ChannelBandwidth::Invalid,
    }
}

pub fn generation_from_hal(generation: HalGeneration) -> WifiStandard {
    match generation {
        HalGeneration::Legacy => WifiStandard::Legacy,
        HalGeneration::Ieee80211n => WifiStandard::Ieee80211n,
        HalGeneration::Ieee80211ac => WifiStandard::Ieee80211ac,
        HalGeneration::Ieee80211ax => WifiStandard::Ieee80211ax,
        HalGeneration::Ieee80211be => WifiStandard::Ieee80211be,
        HalGeneration::Ieee80211ad => WifiStandard::Ieee80211ad,
        HalGeneration::Unknown => WifiStandard::Unknown,
    }
}

/// IEEE 802.11 reason code sent to a client the framework disconnects.
pub fn disconnect_reason(method: &str, reason: SapClientBlockReason) -> HalResult<i32> {
    match reason {
        SapClientBlockReason::BlockedByUser => Ok(reason_code::PREV_AUTH_NOT_VALID),
        SapClientBlockReason::NoMoreStas => Ok(reason_code::DISASSOC_AP_BUSY),
        SapClientBlockReason::Unspecified => Ok(reason_code::UNSPECIFIED),
        SapClientBlockReason::Other(code) => {
            Err(HalError::invalid(method, format!("unknown disconnect reason code {code}")))
        }
    }
}

/// Reason hostapd gave for a client leaving; 0 means it gave none.
pub fn client_disconnect_reason(code: i32) -> ClientDisconnectReason {
    match code {
        0 => ClientDisconnectReason::Unknown,
        code => ClientDisconnectReason::Code(code),
    }
}

fn full_band(band: Band) -> RangeInclusive<u32> {
    match band {
        Band::Band2Ghz => 1..=14,
        Band::Band5Ghz => 32..=177,
        Band::Band6Ghz => 1..=233,
        Band::Band60Ghz => 1..=6,
    }
}

fn send_freq_ranges_needed(band: Band, overlay: &SoftApOverlay, config: &SoftApConfig) -> bool {
    !overlay.acs_channels(band).is_empty()
        || !config.allowed_acs_channels(band).is_empty()
        || matches!(band, Band::Band5Ghz | Band::Band6Ghz)
}

/// Channels usable for ACS: the overlay list intersected with the caller's.
/// An empty list on either side means the whole band.
pub fn allowed_acs_channels(band: Band, overlay: &SoftApOverlay, config: &SoftApConfig) -> Vec<u32> {
    let restrict = |list: &[u32]| -> BTreeSet<u32> {
        if list.is_empty() {
            full_band(band).collect()
        } else {
            list.iter().copied().filter(|ch| full_band(band).contains(ch)).collect()
        }
    };
    let oem = restrict(overlay.acs_channels(band));
    let caller = restrict(config.allowed_acs_channels(band));
    oem.intersection(&caller).copied().collect()
}

/// Merges sorted channels into frequency ranges of consecutive channel numbers.
pub fn acs_freq_ranges(band: Band, channels: &[u32]) -> Vec<FrequencyRange> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for &channel in channels {
        match runs.last_mut() {
            Some((_, end)) if channel == *end + 1 => *end = channel,
            _ => runs.push((channel, channel)),
        }
    }
    runs.into_iter()
        .filter_map(|(start, end)| {
            let start_mhz = codec::channel_to_frequency(band, start).ok()?;
            let end_mhz = codec::channel_to_frequency(band, end).ok()?;
            Some(FrequencyRange { start_mhz, end_mhz })
        })
        .collect()
}

fn channel_params(band: Band, channel: u32, ctx: &ParamsContext<'_>, config: &SoftApConfig) -> ChannelParams {
    let enable_acs = ctx.overlay.acs_supported && channel == 0;
    let mut params = ChannelParams {
        band_mask: hal_band_mask(band),
        acs_channel_freq_ranges_mhz: Vec::new(),
        enable_acs,
        channel: channel as i32,
    };
    if enable_acs && send_freq_ranges_needed(band, ctx.overlay, config) {
        let channels = allowed_acs_channels(band, ctx.overlay, config);
        if channels.is_empty() {
            log::error!("hostapd: empty list of allowed ACS channels for {band:?}");
        }
        params.acs_channel_freq_ranges_mhz = acs_freq_ranges(band, &channels);
    }
    params
}

/// One channel entry per configured band. OWE transition runs two instances
/// on the first configured band.
pub fn channel_params_list(method: &str, config: &SoftApConfig, ctx: &ParamsContext<'_>) -> HalResult<Vec<ChannelParams>> {
    let Some(&(first_band, first_channel)) = config.channels.first() else {
        return Err(HalError::invalid(method, "no band configured"));
    };
    if config.security == SoftApSecurity::Wpa3OweTransition {
        let params = channel_params(first_band, first_channel, ctx, config);
        return Ok(vec![params.clone(), params]);
    }
    Ok(config
        .channels
        .iter()
        .map(|&(band, channel)| channel_params(band, channel, ctx, config))
        .collect())
}

pub fn hw_mode_params(config: &SoftApConfig, overlay: &SoftApOverlay) -> HwModeParams {
    HwModeParams {
        enable_80211n: true,
        enable_80211ac: overlay.ieee80211ac_supported,
        enable_80211ax: overlay.ieee80211ax_supported && config.ieee80211ax_enabled,
        enable_6ghz_band: overlay.band_6ghz_supported,
        enable_80211be: overlay.ieee80211be_supported && config.ieee80211be_enabled,
        maximum_channel_bandwidth: bandwidth_to_hal(config.max_channel_bandwidth),
    }
}

pub fn iface_params(
    method: &str,
    iface_name: &str,
    config: &SoftApConfig,
    instance_identities: &[String],
    ctx: &ParamsContext<'_>,
) -> HalResult<IfaceParams> {
    Ok(IfaceParams {
        name: iface_name.to_string(),
        hw_mode_params: hw_mode_params(config, ctx.overlay),
        channel_params: channel_params_list(method, config, ctx)?,
        uses_mlo: ctx.uses_mlo,
        instance_identities: instance_identities.to_vec(),
        vendor_data: if ctx.vendor_data_supported {
            config.vendor_data.clone()
        } else {
            Vec::new()
        },
    })
}

pub fn network_params(method: &str, config: &SoftApConfig, ctx: &ParamsContext<'_>) -> HalResult<NetworkParams> {
    let ssid = config
        .ssid
        .as_ref()
        .ok_or_else(|| HalError::invalid(method, "ssid is not set"))?;
    Ok(NetworkParams {
        ssid: ssid.as_bytes().to_vec(),
        is_hidden: config.hidden,
        encryption_type: encryption_type(config.security),
        passphrase: config.passphrase.clone().unwrap_or_default(),
        is_metered: ctx.metered,
        vendor_elements: codec::encode_information_elements(&config.vendor_elements),
        is_client_isolation_enabled: ctx.client_isolation_supported && config.client_isolation,
    })
}
