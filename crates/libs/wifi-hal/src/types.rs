use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::CodecError;

// ── Addresses ──────────────────────────────────────────────────────────────

/// A 48-bit IEEE 802 MAC address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// The all-zero wildcard address.
    pub const ANY: MacAddress = MacAddress([0; 6]);

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Builds an address from a raw HAL byte array. Anything but 6 bytes is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let octets: [u8; 6] =
            bytes.try_into().map_err(|_| CodecError::MacLength(bytes.len()))?;
        Ok(Self(octets))
    }

    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| CodecError::Mac(s.to_string()))?;
            if part.len() != 2 {
                return Err(CodecError::Mac(s.to_string()));
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| CodecError::Mac(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(CodecError::Mac(s.to_string()));
        }
        Ok(Self(octets))
    }
}

// ── SSID ───────────────────────────────────────────────────────────────────

/// Raw SSID octets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ssid(pub Vec<u8>);

impl Ssid {
    pub const MAX_LEN: usize = 32;

    /// Parses a framework SSID string: `"quoted"` text is taken as UTF-8,
    /// a bare string as hex octets.
    pub fn decode(s: &str) -> Result<Self, CodecError> {
        let bytes = if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
            s[1..s.len() - 1].as_bytes().to_vec()
        } else {
            hex::decode(s).map_err(|_| CodecError::Ssid(s.to_string()))?
        };
        if bytes.len() > Self::MAX_LEN {
            return Err(CodecError::Ssid(s.to_string()));
        }
        Ok(Self(bytes))
    }

    /// Renders the SSID the way the framework stores it: quoted when the
    /// octets are valid UTF-8, control characters included; hex otherwise.
    pub fn encode(&self) -> String {
        match std::str::from_utf8(&self.0) {
            Ok(text) => format!("\"{text}\""),
            Err(_) => hex::encode(&self.0),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Strips one pair of enclosing double quotes, if present.
pub fn remove_enclosing_quotes(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

// ── Vendor payloads ────────────────────────────────────────────────────────

/// Opaque vendor payload keyed by an IEEE OUI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OuiKeyedData {
    pub oui: u32,
    pub data: Vec<u8>,
}

/// An 802.11 information element carried verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InformationElement {
    pub id: u8,
    pub bytes: Vec<u8>,
}

// ── P2P configuration ──────────────────────────────────────────────────────

/// WPS setup method requested by the framework.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WpsSetup {
    #[default]
    Pbc,
    Display,
    Keypad,
    Label,
    Invalid,
}

/// Pairing bootstrapping method bits, shared by the framework and the HAL.
pub mod pairing {
    pub const NONE: i32 = 0;
    pub const OPPORTUNISTIC: i32 = 1 << 0;
    pub const DISPLAY_PINCODE: i32 = 1 << 1;
    pub const DISPLAY_PASSPHRASE: i32 = 1 << 2;
    pub const KEYPAD_PINCODE: i32 = 1 << 3;
    pub const KEYPAD_PASSPHRASE: i32 = 1 << 4;
    pub const OUT_OF_BAND: i32 = 1 << 5;
}

/// Framework P2P feature bits reported by `get_supported_features`.
pub mod features {
    pub const SET_VENDOR_ELEMENTS: u64 = 1 << 0;
    pub const FLEXIBLE_DISCOVERY: u64 = 1 << 1;
    pub const GROUP_CLIENT_REMOVAL: u64 = 1 << 2;
    pub const GROUP_OWNER_IPV6_LINK_LOCAL_ADDRESS_PROVIDED: u64 = 1 << 3;
    pub const WIFI_DIRECT_R2: u64 = 1 << 4;
    pub const PCC_MODE_ALLOW_LEGACY_AND_R2_CONNECTION: u64 = 1 << 5;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingBootstrappingConfig {
    pub method: i32,
    pub password: String,
}

pub const NETWORK_ID_TEMPORARY: i32 = -1;
pub const NETWORK_ID_PERSISTENT: i32 = -2;

/// A connection request towards a peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct P2pConfig {
    pub device_address: String,
    pub wps: WpsSetup,
    pub pin: Option<String>,
    pub network_id: i32,
    pub group_owner_intent: i32,
    /// A band selector (0, 2, 5, 6) or a frequency in MHz.
    pub group_owner_band: i32,
    pub pairing: Option<PairingBootstrappingConfig>,
    pub authorize_connection_from_peer: bool,
    pub vendor_data: Vec<OuiKeyedData>,
}

impl P2pConfig {
    pub fn new(device_address: impl Into<String>) -> Self {
        Self {
            device_address: device_address.into(),
            wps: WpsSetup::Pbc,
            pin: None,
            network_id: NETWORK_ID_TEMPORARY,
            group_owner_intent: 7,
            group_owner_band: 0,
            pairing: None,
            authorize_connection_from_peer: false,
            vendor_data: Vec::new(),
        }
    }

    pub fn with_wps(mut self, wps: WpsSetup, pin: Option<&str>) -> Self {
        self.wps = wps;
        self.pin = pin.map(str::to_string);
        self
    }

    pub fn with_pairing(mut self, method: i32, password: impl Into<String>) -> Self {
        self.pairing = Some(PairingBootstrappingConfig {
            method,
            password: password.into(),
        });
        self
    }

    pub fn with_group_owner_intent(mut self, intent: i32) -> Self {
        self.group_owner_intent = intent;
        self
    }

    pub fn with_network_id(mut self, network_id: i32) -> Self {
        self.network_id = network_id;
        self
    }

    pub fn with_group_owner_band(mut self, band: i32) -> Self {
        self.group_owner_band = band;
        self
    }

    pub fn with_vendor_data(mut self, vendor_data: Vec<OuiKeyedData>) -> Self {
        self.vendor_data = vendor_data;
        self
    }
}

// ── Groups and devices ─────────────────────────────────────────────────────

/// Security of a formed group, derived from the HAL key management mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupSecurity {
    #[default]
    Unknown,
    Wpa2Psk,
    Wpa3Sae,
    Wpa3Compatibility,
}

/// Connection type requested when creating a group with a configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupConnectionType {
    #[default]
    Legacy,
    R2Only,
    LegacyOrR2,
}

/// IPv4 addressing handed to a group client through EAPOL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEapolIpInfo {
    pub ip_address_client: std::net::Ipv4Addr,
    pub ip_address_go: std::net::Ipv4Addr,
    pub ip_address_mask: std::net::Ipv4Addr,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct P2pDevice {
    pub address: MacAddress,
    pub name: String,
    pub primary_device_type: Option<String>,
    pub device_capability: u8,
    pub group_capability: i32,
    pub wps_config_methods: i32,
    pub wfd_info: Option<WfdInfo>,
    pub vendor_elements: Vec<InformationElement>,
    pub pairing_methods: i32,
    pub interface_address: Option<MacAddress>,
    pub ip_address: Option<std::net::Ipv4Addr>,
    pub vendor_data: Vec<OuiKeyedData>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct P2pGroup {
    pub interface: String,
    pub owner: Option<MacAddress>,
    pub owner_interface_address: Option<MacAddress>,
    pub clients: Vec<MacAddress>,
    pub ssid: Option<String>,
    pub frequency: i32,
    pub passphrase: Option<String>,
    pub network_id: i32,
    pub is_group_owner: bool,
    pub client_eapol_ip: Option<ClientEapolIpInfo>,
    pub security: GroupSecurity,
    pub vendor_data: Vec<OuiKeyedData>,
}

impl P2pGroup {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            network_id: NETWORK_ID_TEMPORARY,
            ..Self::default()
        }
    }

    pub fn with_owner(mut self, owner: MacAddress) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Wi-Fi Display subelement as carried in device discovery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WfdInfo {
    pub device_info: u16,
    pub control_port: u16,
    pub max_throughput: u16,
    pub r2_device_info: Option<u16>,
}

// ── Discovery ──────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum P2pScanType {
    #[default]
    Full,
    Social,
    SingleFreq,
}

pub const FREQUENCY_UNSPECIFIED: i32 = 0;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DiscoveryConfig {
    pub scan_type: P2pScanType,
    pub frequency_mhz: i32,
    pub vendor_data: Vec<OuiKeyedData>,
}

impl DiscoveryConfig {
    pub fn new(scan_type: P2pScanType, frequency_mhz: i32) -> Self {
        Self {
            scan_type,
            frequency_mhz,
            vendor_data: Vec::new(),
        }
    }
}

/// Extended listen timing parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtListenParams {
    pub vendor_data: Vec<OuiKeyedData>,
}

/// Local service advertisements, each `"<proto> <args...>"`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub supplicant_queries: Vec<String>,
}

impl ServiceInfo {
    pub fn new<I, S>(queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supplicant_queries: queries.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MiracastMode {
    #[default]
    Disabled,
    Source,
    Sink,
}

/// A frequency the framework considers unsafe for operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsafeChannel {
    pub band: Band,
    pub channel: u32,
}

// ── Status ─────────────────────────────────────────────────────────────────

/// Outcome of a GO negotiation or an invitation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum P2pStatus {
    Success,
    InformationIsCurrentlyUnavailable,
    IncompatibleParameters,
    LimitReached,
    InvalidParameter,
    UnableToAccommodateRequest,
    PreviousProtocolError,
    NoCommonChannel,
    UnknownP2pGroup,
    BothGoIntent15,
    IncompatibleProvisioningMethod,
    RejectedByUser,
    Unknown,
}

/// Outcome of a failed provision discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvDiscStatus {
    Success,
    Timeout,
    Rejected,
    TimeoutJoin,
    InfoUnavailable,
    Unknown,
}

// ── SoftAP ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    Band2Ghz,
    Band5Ghz,
    Band6Ghz,
    Band60Ghz,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoftApSecurity {
    #[default]
    Open,
    Wpa2Psk,
    Wpa3SaeTransition,
    Wpa3Sae,
    Wpa3OweTransition,
    Wpa3Owe,
    Wpa2Eap,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChannelBandwidth {
    #[default]
    Auto,
    Width20MhzNoHt,
    Width20Mhz,
    Width40Mhz,
    Width80Mhz,
    Width80Plus80Mhz,
    Width160Mhz,
    Width320Mhz,
    Width2160Mhz,
    Width4320Mhz,
    Width6480Mhz,
    Width8640Mhz,
    Invalid,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WifiStandard {
    #[default]
    Unknown,
    Legacy,
    Ieee80211n,
    Ieee80211ac,
    Ieee80211ax,
    Ieee80211be,
    Ieee80211ad,
}

/// Reason the framework asks hostapd to disconnect a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SapClientBlockReason {
    BlockedByUser,
    NoMoreStas,
    Unspecified,
    Other(i32),
}

/// Reason hostapd reports for a client leaving.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientDisconnectReason {
    #[default]
    Unknown,
    Code(i32),
}

/// Access point configuration handed to hostapd.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SoftApConfig {
    pub ssid: Option<Ssid>,
    pub passphrase: Option<String>,
    pub security: SoftApSecurity,
    pub hidden: bool,
    /// Band to channel; channel 0 requests automatic channel selection.
    pub channels: Vec<(Band, u32)>,
    /// Framework-allowed ACS channels per band. Empty means no restriction.
    pub allowed_acs_channels: Vec<(Band, Vec<u32>)>,
    pub max_channel_bandwidth: ChannelBandwidth,
    pub ieee80211ax_enabled: bool,
    pub ieee80211be_enabled: bool,
    pub client_isolation: bool,
    pub vendor_elements: Vec<InformationElement>,
    pub vendor_data: Vec<OuiKeyedData>,
}

impl SoftApConfig {
    pub fn new(ssid: Ssid, security: SoftApSecurity) -> Self {
        Self {
            ssid: Some(ssid),
            security,
            channels: vec![(Band::Band2Ghz, 0)],
            ieee80211ax_enabled: true,
            ieee80211be_enabled: true,
            ..Self::default()
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn with_channels(mut self, channels: Vec<(Band, u32)>) -> Self {
        self.channels = channels;
        self
    }

    pub fn allowed_acs_channels(&self, band: Band) -> &[u32] {
        self.allowed_acs_channels
            .iter()
            .find(|(b, _)| *b == band)
            .map(|(_, channels)| channels.as_slice())
            .unwrap_or(&[])
    }
}

/// Per-instance operating info reported by hostapd.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApInstanceInfo {
    pub instance: String,
    pub frequency: i32,
    pub bandwidth: ChannelBandwidth,
    pub generation: WifiStandard,
    pub bssid: Option<MacAddress>,
    pub mld_address: Option<MacAddress>,
    pub vendor_data: Vec<OuiKeyedData>,
}
