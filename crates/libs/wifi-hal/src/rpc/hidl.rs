//! Legacy (HIDL 1.x) supplicant and hostapd interfaces.
//!
//! Each remote reports the highest 1.x minor version it implements; the
//! proxies gate calls on it.

use std::sync::Arc;

use super::aidl::{IfaceParams, NetworkParams};
use super::{
    DebugLevel, DeviceFoundParams, GroupStartedParams, IfaceInfo, InvitationParams, Linkable,
    MacBytes, P2pIfaceOps, ProvisionDiscoveryParams, RemoteResult,
};

pub const SUPPLICANT_FQ_NAME: &str = "android.hardware.wifi.supplicant@1.0::ISupplicant";
pub const HOSTAPD_FQ_NAME: &str = "android.hardware.wifi.hostapd@1.0::IHostapd";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    Empty,
    Hwbinder,
    Passthrough,
}

/// Notified when a service instance registers with the service manager.
pub trait ServiceNotification: Send + Sync {
    fn on_registration(&self, fq_name: &str, instance: &str, preexisting: bool);
}

pub trait ServiceManager: Linkable {
    fn transport(&self, fq_name: &str, instance: &str) -> RemoteResult<Transport>;
    fn register_for_notifications(
        &self,
        fq_name: &str,
        instance: &str,
        callback: Arc<dyn ServiceNotification>,
    ) -> RemoteResult<bool>;
}

/// `getService` entry points of the hwbinder runtime.
pub trait HidlServices: Send + Sync {
    fn service_manager(&self) -> Option<Arc<dyn ServiceManager>>;
    fn supplicant(&self) -> Option<Arc<dyn Supplicant>>;
    fn hostapd(&self) -> Option<Arc<dyn Hostapd>>;
}

// ── Supplicant ─────────────────────────────────────────────────────────────

/// Result of `addInterface`: `FAILURE_IFACE_EXISTS` still carries the interface.
pub struct AddInterfaceResult {
    pub status: i32,
    pub iface: Option<Arc<dyn P2pIface>>,
}

pub trait Supplicant: Linkable {
    fn minor_version(&self) -> u32;
    fn set_debug_params(&self, level: DebugLevel, show_timestamp: bool, show_keys: bool) -> RemoteResult<()>;
    fn list_interfaces(&self) -> RemoteResult<Vec<IfaceInfo>>;
    fn get_interface(&self, info: &IfaceInfo) -> RemoteResult<Arc<dyn P2pIface>>;
    /// 1.1 and later.
    fn add_interface(&self, info: &IfaceInfo) -> RemoteResult<AddInterfaceResult>;
    /// 1.1 and later.
    fn remove_interface(&self, info: &IfaceInfo) -> RemoteResult<()>;
    /// 1.1 and later.
    fn terminate(&self) -> RemoteResult<()>;
}

pub trait P2pIface: P2pIfaceOps + Linkable {
    fn as_ops(&self) -> &dyn P2pIfaceOps;
    fn minor_version(&self) -> u32;
    fn register_callback(&self, callback: Arc<dyn P2pIfaceCallback>) -> RemoteResult<()>;
    /// 1.4 and later; the callback also receives `on_r2_device_found`.
    fn register_callback_1_4(&self, callback: Arc<dyn P2pIfaceCallback>) -> RemoteResult<()>;
}

pub trait P2pIfaceCallback: Send + Sync {
    fn on_device_found(&self, params: &DeviceFoundParams);
    fn on_r2_device_found(&self, params: &DeviceFoundParams);
    fn on_device_lost(&self, p2p_device_address: &[u8]);
    fn on_find_stopped(&self);
    fn on_go_negotiation_request(&self, src_address: &[u8], password_id: i32);
    fn on_go_negotiation_completed(&self, status: i32);
    fn on_group_formation_success(&self);
    fn on_group_formation_failure(&self, reason: &str);
    fn on_group_started(&self, params: &GroupStartedParams);
    fn on_group_removed(&self, group_ifname: Option<&str>, is_group_owner: bool);
    fn on_invitation_received(&self, params: &InvitationParams);
    fn on_invitation_result(&self, bssid: &[u8], status: i32);
    fn on_provision_discovery_completed(&self, params: &ProvisionDiscoveryParams);
    fn on_service_discovery_response(&self, src_address: &[u8], update_indicator: u16, tlvs: &[u8]);
    fn on_sta_authorized(&self, src_address: &[u8], p2p_device_address: &[u8]);
    fn on_sta_deauthorized(&self, src_address: &[u8], p2p_device_address: &[u8]);
}

// ── Hostapd ────────────────────────────────────────────────────────────────

/// The parameter structs are shared with the versioned interface; each
/// `add_access_point_*` call only reads the fields its version defines.
pub trait Hostapd: Linkable {
    fn minor_version(&self) -> u32;
    fn add_access_point(&self, iface: &IfaceParams, network: &NetworkParams) -> RemoteResult<()>;
    fn add_access_point_1_1(&self, iface: &IfaceParams, network: &NetworkParams) -> RemoteResult<()>;
    fn add_access_point_1_2(&self, iface: &IfaceParams, network: &NetworkParams) -> RemoteResult<()>;
    fn add_access_point_1_3(&self, iface: &IfaceParams, network: &NetworkParams) -> RemoteResult<()>;
    fn remove_access_point(&self, iface_name: &str) -> RemoteResult<()>;
    fn register_callback(&self, callback: Arc<dyn HostapdCallback>) -> RemoteResult<()>;
    fn register_callback_1_3(&self, callback: Arc<dyn HostapdCallback>) -> RemoteResult<()>;
    fn force_client_disconnect(&self, iface_name: &str, client: MacBytes, reason_code: i32) -> RemoteResult<()>;
    fn set_debug_params(&self, level: DebugLevel) -> RemoteResult<()>;
    fn terminate(&self) -> RemoteResult<()>;
}

/// Hostapd 1.1 reports `on_failure`; 1.3 adds instance info and client events.
pub use super::aidl::HostapdCallback;
