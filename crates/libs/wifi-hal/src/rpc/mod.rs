//! Downstream HAL interfaces.
//!
//! These traits stand in for the generated binder / hwbinder stubs. The
//! proxies in [`crate::p2p`] and [`crate::hostapd`] only ever talk to the
//! daemons through them; [`crate::fake`] provides in-process implementations.
//!
//! - **[`aidl`]**: versioned interfaces resolved through a service registry.
//! - **[`hidl`]**: legacy 1.x interfaces resolved through the service manager.
//! - **[`P2pIfaceOps`]**: the P2P call surface both generations share.

pub mod aidl;
pub mod hidl;

use std::sync::Arc;

pub use crate::death::DeathRecipient;
pub use crate::error::{RemoteError, RemoteResult};
use crate::settings::SettingsStore;
use crate::types::OuiKeyedData;

pub type MacBytes = [u8; 6];

/// Everything a proxy needs to find its daemon and persist what it learns.
#[derive(Clone)]
pub struct HalServices {
    pub registry: Arc<dyn aidl::ServiceRegistry>,
    pub hidl: Arc<dyn hidl::HidlServices>,
    pub settings: Arc<dyn SettingsStore>,
}

/// Daemon log verbosity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugLevel {
    Excessive,
    MsgDump,
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IfaceType {
    Sta,
    P2p,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IfaceInfo {
    pub name: String,
    pub kind: IfaceType,
}

impl IfaceInfo {
    pub fn p2p(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: IfaceType::P2p,
        }
    }
}

/// Status codes carried in [`RemoteError::Status`].
pub mod status {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE_UNKNOWN: i32 = 1;
    pub const FAILURE_ARGS_INVALID: i32 = 2;
    pub const FAILURE_IFACE_INVALID: i32 = 3;
    pub const FAILURE_IFACE_UNKNOWN: i32 = 4;
    pub const FAILURE_IFACE_EXISTS: i32 = 5;
    pub const FAILURE_IFACE_DISABLED: i32 = 6;
    pub const FAILURE_NETWORK_INVALID: i32 = 8;
    pub const FAILURE_NETWORK_UNKNOWN: i32 = 9;
    pub const FAILURE_UNSUPPORTED: i32 = 11;
}

/// P2P status codes reported in GO negotiation and invitation results.
pub mod p2p_status {
    pub const SUCCESS: i32 = 0;
    pub const FAIL_INFO_CURRENTLY_UNAVAILABLE: i32 = 1;
    pub const FAIL_INCOMPATIBLE_PARAMS: i32 = 2;
    pub const FAIL_LIMIT_REACHED: i32 = 3;
    pub const FAIL_INVALID_PARAMS: i32 = 4;
    pub const FAIL_UNABLE_TO_ACCOMMODATE: i32 = 5;
    pub const FAIL_PREV_PROTOCOL_ERROR: i32 = 6;
    pub const FAIL_NO_COMMON_CHANNELS: i32 = 7;
    pub const FAIL_UNKNOWN_P2P_GROUP: i32 = 8;
    pub const FAIL_BOTH_GO_INTENT_15: i32 = 9;
    pub const FAIL_INCOMPATIBLE_PROV_METHOD: i32 = 10;
    pub const FAIL_REJECTED_BY_USER: i32 = 11;
    pub const SUCCESS_DEFERRED: i32 = 12;
}

pub mod prov_disc_status {
    pub const SUCCESS: i32 = 0;
    pub const TIMEOUT: i32 = 1;
    pub const REJECTED: i32 = 2;
    pub const TIMEOUT_JOIN: i32 = 3;
    pub const INFO_UNAVAILABLE: i32 = 4;
}

/// WPS device password ids seen in GO negotiation requests.
pub mod wps_dev_password_id {
    pub const DEFAULT: i32 = 0;
    pub const USER_SPECIFIED: i32 = 1;
    pub const MACHINE_SPECIFIED: i32 = 2;
    pub const REKEY: i32 = 3;
    pub const PUSHBUTTON: i32 = 4;
    pub const REGISTRAR_SPECIFIED: i32 = 5;
}

pub mod key_mgmt {
    pub const WPA_PSK: i32 = 1 << 1;
    pub const SAE: i32 = 1 << 10;
}

/// HAL-side P2P feature bits.
pub mod p2p_feature {
    pub const V2: i64 = 1 << 0;
    pub const PCC_MODE_WPA3_COMPATIBILITY: i64 = 1 << 1;
}

/// Frames a vendor element set is attached to.
pub mod p2p_frame_type {
    pub const PROBE_REQ_P2P: i32 = 1 << 0;
    pub const PROBE_RESP_P2P: i32 = 1 << 1;
    pub const PROBE_RESP_P2P_GO: i32 = 1 << 2;
    pub const BEACON_P2P_GO: i32 = 1 << 3;
}

/// Provisioning method for WPS connect and provision discovery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WpsProvisionMethod {
    #[default]
    None,
    Pbc,
    Display,
    Keypad,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MiracastMode {
    Disabled,
    Source,
    Sink,
}

/// Inclusive frequency range in MHz.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreqRange {
    pub min: i32,
    pub max: i32,
}

/// The P2P call surface shared by both interface generations.
///
/// Addresses arrive here already validated; a status failure is reported as
/// [`RemoteError::Status`], a dead endpoint as [`RemoteError::Transport`].
pub trait P2pIfaceOps: Send + Sync {
    fn find(&self, timeout_secs: i32) -> RemoteResult<()>;
    fn find_on_social_channels(&self, timeout_secs: i32) -> RemoteResult<()>;
    fn find_on_specific_frequency(&self, frequency_mhz: i32, timeout_secs: i32) -> RemoteResult<()>;
    fn stop_find(&self) -> RemoteResult<()>;
    fn flush(&self) -> RemoteResult<()>;
    fn flush_services(&self) -> RemoteResult<()>;
    fn set_power_save(&self, group_ifname: &str, enable: bool) -> RemoteResult<()>;
    fn set_group_idle(&self, group_ifname: &str, timeout_secs: i32) -> RemoteResult<()>;
    fn set_ssid_postfix(&self, postfix: &[u8]) -> RemoteResult<()>;
    fn connect(
        &self,
        peer: MacBytes,
        method: WpsProvisionMethod,
        pre_selected_pin: &str,
        join_existing_group: bool,
        persistent: bool,
        go_intent: i32,
    ) -> RemoteResult<String>;
    fn cancel_connect(&self) -> RemoteResult<()>;
    fn provision_discovery(&self, peer: MacBytes, method: WpsProvisionMethod) -> RemoteResult<()>;
    fn invite(&self, group_ifname: &str, go_device: MacBytes, peer: MacBytes) -> RemoteResult<()>;
    fn reject(&self, peer: MacBytes) -> RemoteResult<()>;
    fn get_device_address(&self) -> RemoteResult<Vec<u8>>;
    fn get_ssid(&self, peer: MacBytes) -> RemoteResult<Vec<u8>>;
    fn reinvoke(&self, network_id: i32, peer: MacBytes) -> RemoteResult<()>;
    fn add_group(&self, persistent: bool, network_id: i32) -> RemoteResult<()>;
    fn add_group_with_config(
        &self,
        ssid: &[u8],
        passphrase: &str,
        persistent: bool,
        frequency: i32,
        peer: MacBytes,
        join_existing_group: bool,
    ) -> RemoteResult<()>;
    fn remove_group(&self, group_ifname: &str) -> RemoteResult<()>;
    fn get_group_capability(&self, peer: MacBytes) -> RemoteResult<i32>;
    fn configure_ext_listen(&self, period_ms: i32, interval_ms: i32) -> RemoteResult<()>;
    fn set_listen_channel(&self, channel: i32, operating_class: i32) -> RemoteResult<()>;
    fn set_disallowed_frequencies(&self, ranges: &[FreqRange]) -> RemoteResult<()>;
    fn add_upnp_service(&self, version: i32, service_name: &str) -> RemoteResult<()>;
    fn remove_upnp_service(&self, version: i32, service_name: &str) -> RemoteResult<()>;
    fn add_bonjour_service(&self, query: &[u8], response: &[u8]) -> RemoteResult<()>;
    fn remove_bonjour_service(&self, query: &[u8]) -> RemoteResult<()>;
    fn request_service_discovery(&self, peer: MacBytes, query: &[u8]) -> RemoteResult<u64>;
    fn cancel_service_discovery(&self, identifier: u64) -> RemoteResult<()>;
    fn set_miracast_mode(&self, mode: MiracastMode) -> RemoteResult<()>;
    fn start_wps_pbc(&self, group_ifname: &str, bssid: MacBytes) -> RemoteResult<()>;
    fn start_wps_pin_keypad(&self, group_ifname: &str, pin: &str) -> RemoteResult<()>;
    fn start_wps_pin_display(&self, group_ifname: &str, bssid: MacBytes) -> RemoteResult<String>;
    fn cancel_wps(&self, group_ifname: &str) -> RemoteResult<()>;
    fn enable_wfd(&self, enable: bool) -> RemoteResult<()>;
    fn set_wfd_device_info(&self, info: &[u8]) -> RemoteResult<()>;
    fn set_wfd_r2_device_info(&self, info: &[u8]) -> RemoteResult<()>;
    fn list_networks(&self) -> RemoteResult<Vec<i32>>;
    fn get_network(&self, network_id: i32) -> RemoteResult<Arc<dyn P2pNetwork>>;
    fn remove_network(&self, network_id: i32) -> RemoteResult<()>;
    fn set_wps_device_name(&self, name: &str) -> RemoteResult<()>;
    fn set_wps_device_type(&self, device_type: &[u8; 8]) -> RemoteResult<()>;
    fn set_wps_config_methods(&self, methods: u16) -> RemoteResult<()>;
    fn save_config(&self) -> RemoteResult<()>;
    fn set_mac_randomization(&self, enable: bool) -> RemoteResult<()>;
}

/// A network block stored by the supplicant, usually a persistent group.
pub trait P2pNetwork: Send + Sync {
    /// Whether the block backs the group that is up right now.
    fn is_current(&self) -> RemoteResult<bool>;
    fn ssid(&self) -> RemoteResult<Vec<u8>>;
    fn bssid(&self) -> RemoteResult<Vec<u8>>;
    fn is_group_owner(&self) -> RemoteResult<bool>;
    fn set_client_list(&self, clients: &[MacBytes]) -> RemoteResult<()>;
    fn client_list(&self) -> RemoteResult<Vec<Vec<u8>>>;
}

// ── Callback payloads ──────────────────────────────────────────────────────
//
// Byte fields are exactly what the daemon sent; decoding and validation
// happen in the event adapters.

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceFoundParams {
    pub src_address: Vec<u8>,
    pub p2p_device_address: Vec<u8>,
    pub primary_device_type: Vec<u8>,
    pub device_name: Option<String>,
    pub config_methods: i32,
    pub device_capabilities: u8,
    pub group_capabilities: i32,
    pub wfd_device_info: Option<Vec<u8>>,
    pub wfd_r2_device_info: Option<Vec<u8>>,
    pub vendor_elem_bytes: Option<Vec<u8>>,
    pub vendor_data: Vec<OuiKeyedData>,
    pub pairing_bootstrapping_methods: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GoNegotiationReqParams {
    pub src_address: Vec<u8>,
    pub password_id: i32,
    pub vendor_data: Vec<OuiKeyedData>,
}

/// Client addressing handed out over EAPOL, as packed little-endian IPv4.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EapolIpAddressInfo {
    pub ip_address_client: i32,
    pub ip_address_mask: i32,
    pub ip_address_go: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupStartedParams {
    pub group_interface_name: Option<String>,
    pub is_group_owner: bool,
    pub ssid: Vec<u8>,
    pub frequency_mhz: i32,
    pub psk: Vec<u8>,
    pub passphrase: Option<String>,
    pub go_device_address: Vec<u8>,
    pub go_interface_address: Vec<u8>,
    pub is_persistent: bool,
    pub client_ip_info: Option<EapolIpAddressInfo>,
    pub vendor_data: Vec<OuiKeyedData>,
    pub key_mgmt_mask: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvitationParams {
    pub src_address: Vec<u8>,
    pub go_device_address: Vec<u8>,
    pub bssid: Vec<u8>,
    pub persistent_network_id: i32,
    pub operating_frequency_mhz: i32,
    pub vendor_data: Vec<OuiKeyedData>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProvisionDiscoveryParams {
    pub p2p_device_address: Vec<u8>,
    pub is_request: bool,
    pub status: i32,
    /// WPS config method bits, see [`crate::codec::wps_config_methods`].
    pub config_methods: i32,
    pub generated_pin: Option<String>,
    pub group_interface_name: Option<String>,
    pub vendor_data: Vec<OuiKeyedData>,
    pub pairing_bootstrapping_method: i32,
    pub password: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerClientParams {
    pub group_interface_name: Option<String>,
    pub client_interface_address: Vec<u8>,
    pub client_device_address: Vec<u8>,
    pub client_ip_address: i32,
    pub vendor_data: Vec<OuiKeyedData>,
}

/// Anything a proxy can link a death recipient to.
pub trait Linkable: Send + Sync {
    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>, cookie: u64) -> RemoteResult<()>;
}
