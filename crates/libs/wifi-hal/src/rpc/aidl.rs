//! Versioned (AIDL) supplicant and hostapd interfaces.

use std::sync::Arc;

use super::{
    DebugLevel, DeviceFoundParams, GoNegotiationReqParams, GroupStartedParams,
    IfaceInfo, InvitationParams, Linkable, MacBytes, P2pIfaceOps, PeerClientParams,
    ProvisionDiscoveryParams, RemoteResult, WpsProvisionMethod,
};
use crate::types::OuiKeyedData;

pub const SUPPLICANT_DESCRIPTOR: &str = "android.hardware.wifi.supplicant.ISupplicant";
pub const HOSTAPD_DESCRIPTOR: &str = "android.hardware.wifi.hostapd.IHostapd";

/// Fully qualified instance name, `<descriptor>/<instance>`.
pub fn instance_name(descriptor: &str, instance: &str) -> String {
    format!("{descriptor}/{instance}")
}

/// Resolves declared versioned services.
pub trait ServiceRegistry: Send + Sync {
    fn is_declared(&self, instance: &str) -> bool;
    fn supplicant(&self, instance: &str) -> Option<Arc<dyn Supplicant>>;
    fn hostapd(&self, instance: &str) -> Option<Arc<dyn Hostapd>>;
}

// ── Supplicant ─────────────────────────────────────────────────────────────

pub trait Supplicant: Linkable {
    fn interface_version(&self) -> RemoteResult<i32>;
    fn set_debug_params(&self, level: DebugLevel, show_timestamp: bool, show_keys: bool) -> RemoteResult<()>;
    fn add_p2p_interface(&self, name: &str) -> RemoteResult<Arc<dyn P2pIface>>;
    fn remove_interface(&self, info: &IfaceInfo) -> RemoteResult<()>;
    fn terminate(&self) -> RemoteResult<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum P2pScanType {
    Full,
    Social,
    SpecificFreq,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct P2pDiscoveryInfo {
    pub scan_type: P2pScanType,
    pub frequency_mhz: i32,
    pub timeout_in_sec: i32,
    pub vendor_data: Vec<OuiKeyedData>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct P2pConnectInfo {
    pub join_existing_group: bool,
    pub peer_address: MacBytes,
    pub provision_method: WpsProvisionMethod,
    pub pre_selected_pin: String,
    pub persistent: bool,
    pub go_intent: i32,
    pub vendor_data: Vec<OuiKeyedData>,
    pub pairing_bootstrapping_method: i32,
    pub password: Option<String>,
    pub frequency_mhz: i32,
    pub authorize_connection_from_peer: bool,
    pub group_interface_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct P2pProvisionDiscoveryParams {
    pub peer_mac_address: MacBytes,
    pub provision_method: WpsProvisionMethod,
    pub pairing_bootstrapping_method: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct P2pReinvokePersistentGroupParams {
    pub peer_mac_address: MacBytes,
    pub persistent_network_id: i32,
    pub device_identity_entry_id: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct P2pCreateGroupOwnerInfo {
    pub persistent: bool,
    pub persistent_network_id: i32,
    pub is_p2p_v2: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct P2pAddGroupConfigurationParams {
    pub ssid: Vec<u8>,
    pub passphrase: String,
    pub is_persistent: bool,
    pub frequency_mhz_or_band: i32,
    pub go_interface_address: MacBytes,
    pub join_existing_group: bool,
    pub key_mgmt_mask: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct P2pExtListenInfo {
    pub period_ms: i32,
    pub interval_ms: i32,
    pub vendor_data: Vec<OuiKeyedData>,
}

/// The versioned P2P interface: the shared surface plus the parameter-struct calls.
pub trait P2pIface: P2pIfaceOps {
    fn as_ops(&self) -> &dyn P2pIfaceOps;
    fn register_callback(&self, callback: Arc<dyn P2pIfaceCallback>) -> RemoteResult<()>;
    fn find_with_params(&self, info: &P2pDiscoveryInfo) -> RemoteResult<()>;
    fn connect_with_params(&self, info: &P2pConnectInfo) -> RemoteResult<String>;
    fn provision_discovery_with_params(&self, params: &P2pProvisionDiscoveryParams) -> RemoteResult<()>;
    fn reinvoke_persistent_group(&self, params: &P2pReinvokePersistentGroupParams) -> RemoteResult<()>;
    fn create_group_owner(&self, info: &P2pCreateGroupOwnerInfo) -> RemoteResult<()>;
    fn add_group_with_configuration_params(&self, params: &P2pAddGroupConfigurationParams) -> RemoteResult<()>;
    fn configure_ext_listen_with_params(&self, info: &P2pExtListenInfo) -> RemoteResult<()>;
    fn remove_client(&self, peer: MacBytes, is_legacy_client: bool) -> RemoteResult<()>;
    fn get_feature_set(&self) -> RemoteResult<i64>;
    fn set_vendor_elements(&self, frame_type_mask: i32, ies: &[u8]) -> RemoteResult<()>;
    fn configure_eapol_ip_address_allocation_params(
        &self,
        ip_address_go: i32,
        ip_address_mask: i32,
        ip_address_start: i32,
        ip_address_end: i32,
    ) -> RemoteResult<()>;
}

/// Events pushed by the versioned P2P interface. Older daemons call the
/// plain variants, newer ones the `_with_params` / `_event` variants.
pub trait P2pIfaceCallback: Send + Sync {
    fn on_device_found(&self, params: &DeviceFoundParams);
    fn on_device_found_with_params(&self, params: &DeviceFoundParams);
    fn on_device_lost(&self, p2p_device_address: &[u8]);
    fn on_find_stopped(&self);
    fn on_go_negotiation_request(&self, src_address: &[u8], password_id: i32);
    fn on_go_negotiation_request_with_params(&self, params: &GoNegotiationReqParams);
    fn on_go_negotiation_completed(&self, status: i32);
    fn on_group_formation_success(&self);
    fn on_group_formation_failure(&self, reason: &str);
    fn on_group_started(&self, params: &GroupStartedParams);
    fn on_group_started_with_params(&self, params: &GroupStartedParams);
    fn on_group_removed(&self, group_ifname: Option<&str>, is_group_owner: bool);
    fn on_invitation_received(&self, params: &InvitationParams);
    fn on_invitation_received_with_params(&self, params: &InvitationParams);
    fn on_invitation_result(&self, bssid: &[u8], status: i32);
    fn on_provision_discovery_completed(&self, params: &ProvisionDiscoveryParams);
    fn on_provision_discovery_completed_event(&self, params: &ProvisionDiscoveryParams);
    fn on_service_discovery_response(&self, src_address: &[u8], update_indicator: u16, tlvs: &[u8]);
    fn on_sta_authorized(&self, src_address: &[u8], p2p_device_address: &[u8]);
    fn on_peer_client_joined(&self, params: &PeerClientParams);
    fn on_sta_deauthorized(&self, src_address: &[u8], p2p_device_address: &[u8]);
    fn on_peer_client_disconnected(&self, params: &PeerClientParams);
    fn on_group_frequency_changed(&self, group_ifname: Option<&str>, frequency: i32);
}

// ── Hostapd ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HalChannelBandwidth {
    #[default]
    Auto,
    Invalid,
    Width20NoHt,
    Width20,
    Width40,
    Width80,
    Width80P80,
    Width160,
    Width320,
    Width2160,
    Width4320,
    Width6480,
    Width8640,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HalGeneration {
    #[default]
    Unknown,
    Legacy,
    Ieee80211n,
    Ieee80211ac,
    Ieee80211ax,
    Ieee80211be,
    Ieee80211ad,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EncryptionType {
    #[default]
    None,
    Wpa,
    Wpa2,
    Wpa3SaeTransition,
    Wpa3Sae,
    Wpa3OweTransition,
    Wpa3Owe,
}

/// Band mask bits for channel params.
pub mod band_mask {
    pub const BAND_2_GHZ: i32 = 1 << 0;
    pub const BAND_5_GHZ: i32 = 1 << 1;
    pub const BAND_6_GHZ: i32 = 1 << 2;
    pub const BAND_60_GHZ: i32 = 1 << 3;
}

/// IEEE 802.11 reason codes used for forced disconnects.
pub mod reason_code {
    pub const UNSPECIFIED: i32 = 1;
    pub const PREV_AUTH_NOT_VALID: i32 = 2;
    pub const DISASSOC_AP_BUSY: i32 = 5;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrequencyRange {
    pub start_mhz: i32,
    pub end_mhz: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HwModeParams {
    pub enable_80211n: bool,
    pub enable_80211ac: bool,
    pub enable_80211ax: bool,
    pub enable_6ghz_band: bool,
    pub enable_80211be: bool,
    pub maximum_channel_bandwidth: HalChannelBandwidth,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelParams {
    pub band_mask: i32,
    pub acs_channel_freq_ranges_mhz: Vec<FrequencyRange>,
    pub enable_acs: bool,
    pub channel: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IfaceParams {
    pub name: String,
    pub hw_mode_params: HwModeParams,
    pub channel_params: Vec<ChannelParams>,
    pub uses_mlo: bool,
    pub instance_identities: Vec<String>,
    pub vendor_data: Vec<OuiKeyedData>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkParams {
    pub ssid: Vec<u8>,
    pub is_hidden: bool,
    pub encryption_type: EncryptionType,
    pub passphrase: String,
    pub is_metered: bool,
    pub vendor_elements: Vec<u8>,
    pub is_client_isolation_enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApInfo {
    pub iface_name: String,
    pub ap_iface_instance: String,
    pub freq_mhz: i32,
    pub channel_bandwidth: HalChannelBandwidth,
    pub generation: HalGeneration,
    pub ap_iface_instance_mac_address: Vec<u8>,
    pub mld_mac_address: Option<Vec<u8>>,
    pub vendor_data: Vec<OuiKeyedData>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub iface_name: String,
    pub ap_iface_instance: String,
    pub client_address: Vec<u8>,
    pub is_connected: bool,
    pub disconnect_reason_code: i32,
}

pub trait Hostapd: Linkable {
    fn interface_version(&self) -> RemoteResult<i32>;
    fn set_debug_params(&self, level: DebugLevel) -> RemoteResult<()>;
    fn register_callback(&self, callback: Arc<dyn HostapdCallback>) -> RemoteResult<()>;
    fn add_access_point(&self, iface: &IfaceParams, network: &NetworkParams) -> RemoteResult<()>;
    fn remove_access_point(&self, iface_name: &str) -> RemoteResult<()>;
    fn force_client_disconnect(&self, iface_name: &str, client: MacBytes, reason_code: i32) -> RemoteResult<()>;
    fn remove_link_from_multiple_link_bridged_ap_iface(&self, iface_name: &str, link_identity: &str) -> RemoteResult<()>;
    fn terminate(&self) -> RemoteResult<()>;
}

pub trait HostapdCallback: Send + Sync {
    fn on_failure(&self, iface_name: &str, instance_name: &str);
    fn on_ap_instance_info_changed(&self, info: &ApInfo);
    fn on_connected_clients_changed(&self, info: &ClientInfo);
}
