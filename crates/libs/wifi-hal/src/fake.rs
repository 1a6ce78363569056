//! In-process fakes of the downstream HAL interfaces.
//!
//! Each daemon is a [`FakeDaemon`]: it counts calls by method name, fails
//! chosen methods on demand, and fires the death recipients linked to it when
//! killed. [`FakeSupplicant`] and [`FakeHostapd`] implement both interface
//! generations; which one a proxy sees depends on where the fake is installed
//! ([`FakeServiceRegistry`] or [`FakeHidlServices`]).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::death::DeathRecipient;
use crate::error::{RemoteError, RemoteResult};
use crate::rpc::aidl::{
    self, IfaceParams, NetworkParams, P2pAddGroupConfigurationParams, P2pConnectInfo, P2pCreateGroupOwnerInfo,
    P2pDiscoveryInfo, P2pExtListenInfo, P2pProvisionDiscoveryParams, P2pReinvokePersistentGroupParams,
};
use crate::rpc::hidl::{self, AddInterfaceResult, ServiceNotification, Transport};
use crate::rpc::{
    status, DebugLevel, FreqRange, HalServices, IfaceInfo, Linkable, MacBytes, MiracastMode, P2pIfaceOps,
    P2pNetwork, WpsProvisionMethod,
};
use crate::settings::MemorySettings;

// ── Daemon core ────────────────────────────────────────────────────────────

/// Call log, failure injection and death links of one fake daemon.
pub struct FakeDaemon {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, RemoteError>>,
    links: Mutex<Vec<(Arc<dyn DeathRecipient>, u64)>>,
    alive: AtomicBool,
    confirm_terminate: AtomicBool,
}

impl Default for FakeDaemon {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            links: Mutex::new(Vec::new()),
            alive: AtomicBool::new(true),
            confirm_terminate: AtomicBool::new(true),
        }
    }
}

impl FakeDaemon {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records a call and returns the injected outcome for it.
    pub fn hit(&self, method: &str) -> RemoteResult<()> {
        self.calls
            .lock()
            .expect("fake daemon mutex poisoned")
            .push(method.to_string());
        if !self.is_alive() {
            return Err(RemoteError::transport("dead object"));
        }
        match self.failures.lock().expect("fake daemon mutex poisoned").get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls
            .lock()
            .expect("fake daemon mutex poisoned")
            .iter()
            .filter(|call| call.as_str() == method)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("fake daemon mutex poisoned").len()
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().expect("fake daemon mutex poisoned").clone()
    }

    pub fn fail_with(&self, method: &str, err: RemoteError) {
        self.failures
            .lock()
            .expect("fake daemon mutex poisoned")
            .insert(method.to_string(), err);
    }

    /// The daemon answers `method` with a status failure.
    pub fn reject(&self, method: &str, code: i32) {
        self.fail_with(method, RemoteError::status(code, format!("{method} rejected")));
    }

    /// `method` fails as if the daemon vanished mid-call, without killing it.
    pub fn break_transport(&self, method: &str) {
        self.fail_with(method, RemoteError::transport(format!("{method}: broken pipe")));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().expect("fake daemon mutex poisoned").clear();
    }

    /// Whether `terminate` kills the daemon. When off, the death is never confirmed.
    pub fn set_confirm_terminate(&self, confirm: bool) {
        self.confirm_terminate.store(confirm, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().expect("fake daemon mutex poisoned").len()
    }

    fn link(&self, recipient: Arc<dyn DeathRecipient>, cookie: u64) -> RemoteResult<()> {
        self.hit("linkToDeath")?;
        self.links
            .lock()
            .expect("fake daemon mutex poisoned")
            .push((recipient, cookie));
        Ok(())
    }

    /// Kills the daemon and notifies every linked recipient with its cookie.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let links = std::mem::take(&mut *self.links.lock().expect("fake daemon mutex poisoned"));
        for (recipient, cookie) in links {
            recipient.binder_died(cookie);
        }
    }

    /// Delivers a death notification carrying `cookie` without killing anything.
    pub fn notify_death(&self, cookie: u64) {
        let recipients: Vec<_> = self
            .links
            .lock()
            .expect("fake daemon mutex poisoned")
            .iter()
            .map(|(recipient, _)| recipient.clone())
            .collect();
        for recipient in recipients {
            recipient.binder_died(cookie);
        }
    }

    /// Brings a killed daemon back, as a lazy service start would.
    pub fn start(&self) {
        self.alive.store(true, Ordering::SeqCst);
    }

    fn terminate(&self) -> RemoteResult<()> {
        self.hit("terminate")?;
        if self.confirm_terminate.load(Ordering::SeqCst) {
            self.kill();
        }
        Ok(())
    }
}

// ── P2P interface ──────────────────────────────────────────────────────────

/// P2P interface of a [`FakeSupplicant`]; shares the supplicant's daemon.
pub struct FakeP2pIface {
    daemon: Arc<FakeDaemon>,
    version: i32,
    pub device_address: MacBytes,
    feature_set: Mutex<i64>,
    aidl_callback: Mutex<Option<Arc<dyn aidl::P2pIfaceCallback>>>,
    hidl_callback: Mutex<Option<Arc<dyn hidl::P2pIfaceCallback>>>,
    last_connect: Mutex<Option<P2pConnectInfo>>,
    networks: Mutex<BTreeMap<i32, Arc<FakeP2pNetwork>>>,
    vendor_elements: Mutex<Option<(i32, Vec<u8>)>>,
}

impl FakeP2pIface {
    fn new(daemon: Arc<FakeDaemon>, version: i32) -> Self {
        Self {
            daemon,
            version,
            device_address: [0x02, 0x00, 0x5e, 0x10, 0x00, 0x01],
            feature_set: Mutex::new(0),
            aidl_callback: Mutex::new(None),
            hidl_callback: Mutex::new(None),
            last_connect: Mutex::new(None),
            networks: Mutex::new(BTreeMap::new()),
            vendor_elements: Mutex::new(None),
        }
    }

    /// Stores a network block the supplicant will list and hand out.
    pub fn add_network(
        &self,
        network_id: i32,
        ssid: &[u8],
        bssid: MacBytes,
        is_group_owner: bool,
    ) -> Arc<FakeP2pNetwork> {
        let network = Arc::new(FakeP2pNetwork {
            daemon: self.daemon.clone(),
            ssid: ssid.to_vec(),
            bssid: bssid.to_vec(),
            is_group_owner,
            current: AtomicBool::new(false),
            clients: Mutex::new(Vec::new()),
        });
        self.networks
            .lock()
            .expect("fake iface mutex poisoned")
            .insert(network_id, network.clone());
        network
    }

    /// The frame mask and element bytes of the last `set_vendor_elements`.
    pub fn vendor_elements(&self) -> Option<(i32, Vec<u8>)> {
        self.vendor_elements.lock().expect("fake iface mutex poisoned").clone()
    }

    pub fn set_feature_set(&self, mask: i64) {
        *self.feature_set.lock().expect("fake iface mutex poisoned") = mask;
    }

    pub fn aidl_callback(&self) -> Option<Arc<dyn aidl::P2pIfaceCallback>> {
        self.aidl_callback.lock().expect("fake iface mutex poisoned").clone()
    }

    pub fn hidl_callback(&self) -> Option<Arc<dyn hidl::P2pIfaceCallback>> {
        self.hidl_callback.lock().expect("fake iface mutex poisoned").clone()
    }

    pub fn last_connect(&self) -> Option<P2pConnectInfo> {
        self.last_connect.lock().expect("fake iface mutex poisoned").clone()
    }
}

/// Generates `P2pIfaceOps` methods that record the call and return `$value`.
macro_rules! recorded {
    ($(fn $name:ident(&self $(, $arg:ident: $ty:ty)*) -> $ret:ty = $value:expr;)*) => {
        $(
            fn $name(&self $(, $arg: $ty)*) -> RemoteResult<$ret> {
                $(let _ = $arg;)*
                self.daemon.hit(stringify!($name))?;
                Ok($value)
            }
        )*
    };
}

impl P2pIfaceOps for FakeP2pIface {
    recorded! {
        fn find(&self, timeout_secs: i32) -> () = ();
        fn find_on_social_channels(&self, timeout_secs: i32) -> () = ();
        fn find_on_specific_frequency(&self, frequency_mhz: i32, timeout_secs: i32) -> () = ();
        fn stop_find(&self) -> () = ();
        fn flush(&self) -> () = ();
        fn flush_services(&self) -> () = ();
        fn set_power_save(&self, group_ifname: &str, enable: bool) -> () = ();
        fn set_group_idle(&self, group_ifname: &str, timeout_secs: i32) -> () = ();
        fn set_ssid_postfix(&self, postfix: &[u8]) -> () = ();
        fn cancel_connect(&self) -> () = ();
        fn provision_discovery(&self, peer: MacBytes, method: WpsProvisionMethod) -> () = ();
        fn invite(&self, group_ifname: &str, go_device: MacBytes, peer: MacBytes) -> () = ();
        fn reject(&self, peer: MacBytes) -> () = ();
        fn get_ssid(&self, peer: MacBytes) -> Vec<u8> = b"DIRECT-xy".to_vec();
        fn reinvoke(&self, network_id: i32, peer: MacBytes) -> () = ();
        fn add_group(&self, persistent: bool, network_id: i32) -> () = ();
        fn add_group_with_config(
            &self,
            ssid: &[u8],
            passphrase: &str,
            persistent: bool,
            frequency: i32,
            peer: MacBytes,
            join_existing_group: bool
        ) -> () = ();
        fn remove_group(&self, group_ifname: &str) -> () = ();
        fn get_group_capability(&self, peer: MacBytes) -> i32 = 0;
        fn configure_ext_listen(&self, period_ms: i32, interval_ms: i32) -> () = ();
        fn set_listen_channel(&self, channel: i32, operating_class: i32) -> () = ();
        fn set_disallowed_frequencies(&self, ranges: &[FreqRange]) -> () = ();
        fn add_upnp_service(&self, version: i32, service_name: &str) -> () = ();
        fn remove_upnp_service(&self, version: i32, service_name: &str) -> () = ();
        fn add_bonjour_service(&self, query: &[u8], response: &[u8]) -> () = ();
        fn remove_bonjour_service(&self, query: &[u8]) -> () = ();
        fn request_service_discovery(&self, peer: MacBytes, query: &[u8]) -> u64 = 1;
        fn cancel_service_discovery(&self, identifier: u64) -> () = ();
        fn set_miracast_mode(&self, mode: MiracastMode) -> () = ();
        fn start_wps_pbc(&self, group_ifname: &str, bssid: MacBytes) -> () = ();
        fn start_wps_pin_keypad(&self, group_ifname: &str, pin: &str) -> () = ();
        fn start_wps_pin_display(&self, group_ifname: &str, bssid: MacBytes) -> String = "12345670".to_string();
        fn cancel_wps(&self, group_ifname: &str) -> () = ();
        fn enable_wfd(&self, enable: bool) -> () = ();
        fn set_wfd_device_info(&self, info: &[u8]) -> () = ();
        fn set_wfd_r2_device_info(&self, info: &[u8]) -> () = ();
        fn remove_network(&self, network_id: i32) -> () = ();
        fn set_wps_device_name(&self, name: &str) -> () = ();
        fn set_wps_device_type(&self, device_type: &[u8; 8]) -> () = ();
        fn set_wps_config_methods(&self, methods: u16) -> () = ();
        fn save_config(&self) -> () = ();
        fn set_mac_randomization(&self, enable: bool) -> () = ();
    }

    fn connect(
        &self,
        _peer: MacBytes,
        method: WpsProvisionMethod,
        pre_selected_pin: &str,
        _join_existing_group: bool,
        _persistent: bool,
        _go_intent: i32,
    ) -> RemoteResult<String> {
        self.daemon.hit("connect")?;
        Ok(generated_pin(method, pre_selected_pin))
    }

    fn get_device_address(&self) -> RemoteResult<Vec<u8>> {
        self.daemon.hit("get_device_address")?;
        Ok(self.device_address.to_vec())
    }

    fn list_networks(&self) -> RemoteResult<Vec<i32>> {
        self.daemon.hit("list_networks")?;
        Ok(self.networks.lock().expect("fake iface mutex poisoned").keys().copied().collect())
    }

    fn get_network(&self, network_id: i32) -> RemoteResult<Arc<dyn P2pNetwork>> {
        self.daemon.hit("get_network")?;
        match self.networks.lock().expect("fake iface mutex poisoned").get(&network_id) {
            Some(network) => Ok(network.clone()),
            None => Err(RemoteError::status(
                status::FAILURE_NETWORK_UNKNOWN,
                format!("no network {network_id}"),
            )),
        }
    }
}

/// A stored network of a [`FakeP2pIface`]; shares the supplicant's daemon.
pub struct FakeP2pNetwork {
    daemon: Arc<FakeDaemon>,
    pub ssid: Vec<u8>,
    pub bssid: Vec<u8>,
    pub is_group_owner: bool,
    current: AtomicBool,
    clients: Mutex<Vec<Vec<u8>>>,
}

impl FakeP2pNetwork {
    pub fn set_current(&self, current: bool) {
        self.current.store(current, Ordering::SeqCst);
    }

    /// Replaces the stored client list verbatim, malformed entries included.
    pub fn set_clients(&self, clients: Vec<Vec<u8>>) {
        *self.clients.lock().expect("fake network mutex poisoned") = clients;
    }

    pub fn clients(&self) -> Vec<Vec<u8>> {
        self.clients.lock().expect("fake network mutex poisoned").clone()
    }
}

impl P2pNetwork for FakeP2pNetwork {
    fn is_current(&self) -> RemoteResult<bool> {
        self.daemon.hit("is_current")?;
        Ok(self.current.load(Ordering::SeqCst))
    }

    fn ssid(&self) -> RemoteResult<Vec<u8>> {
        self.daemon.hit("network_ssid")?;
        Ok(self.ssid.clone())
    }

    fn bssid(&self) -> RemoteResult<Vec<u8>> {
        self.daemon.hit("network_bssid")?;
        Ok(self.bssid.clone())
    }

    fn is_group_owner(&self) -> RemoteResult<bool> {
        self.daemon.hit("is_group_owner")?;
        Ok(self.is_group_owner)
    }

    fn set_client_list(&self, clients: &[MacBytes]) -> RemoteResult<()> {
        self.daemon.hit("set_client_list")?;
        self.set_clients(clients.iter().map(|client| client.to_vec()).collect());
        Ok(())
    }

    fn client_list(&self) -> RemoteResult<Vec<Vec<u8>>> {
        self.daemon.hit("client_list")?;
        Ok(self.clients())
    }
}

fn generated_pin(method: WpsProvisionMethod, pre_selected_pin: &str) -> String {
    if method == WpsProvisionMethod::Display && pre_selected_pin.is_empty() {
        "12345670".to_string()
    } else {
        String::new()
    }
}

impl aidl::P2pIface for FakeP2pIface {
    fn as_ops(&self) -> &dyn P2pIfaceOps {
        self
    }

    fn register_callback(&self, callback: Arc<dyn aidl::P2pIfaceCallback>) -> RemoteResult<()> {
        self.daemon.hit("register_callback")?;
        *self.aidl_callback.lock().expect("fake iface mutex poisoned") = Some(callback);
        Ok(())
    }

    fn find_with_params(&self, _info: &P2pDiscoveryInfo) -> RemoteResult<()> {
        self.daemon.hit("find_with_params")
    }

    fn connect_with_params(&self, info: &P2pConnectInfo) -> RemoteResult<String> {
        self.daemon.hit("connect_with_params")?;
        *self.last_connect.lock().expect("fake iface mutex poisoned") = Some(info.clone());
        Ok(generated_pin(info.provision_method, &info.pre_selected_pin))
    }

    fn provision_discovery_with_params(&self, _params: &P2pProvisionDiscoveryParams) -> RemoteResult<()> {
        self.daemon.hit("provision_discovery_with_params")
    }

    fn reinvoke_persistent_group(&self, _params: &P2pReinvokePersistentGroupParams) -> RemoteResult<()> {
        self.daemon.hit("reinvoke_persistent_group")
    }

    fn create_group_owner(&self, _info: &P2pCreateGroupOwnerInfo) -> RemoteResult<()> {
        self.daemon.hit("create_group_owner")
    }

    fn add_group_with_configuration_params(&self, _params: &P2pAddGroupConfigurationParams) -> RemoteResult<()> {
        self.daemon.hit("add_group_with_configuration_params")
    }

    fn configure_ext_listen_with_params(&self, _info: &P2pExtListenInfo) -> RemoteResult<()> {
        self.daemon.hit("configure_ext_listen_with_params")
    }

    fn remove_client(&self, _peer: MacBytes, _is_legacy_client: bool) -> RemoteResult<()> {
        self.daemon.hit("remove_client")
    }

    fn get_feature_set(&self) -> RemoteResult<i64> {
        self.daemon.hit("get_feature_set")?;
        Ok(*self.feature_set.lock().expect("fake iface mutex poisoned"))
    }

    fn set_vendor_elements(&self, frame_type_mask: i32, ies: &[u8]) -> RemoteResult<()> {
        self.daemon.hit("set_vendor_elements")?;
        *self.vendor_elements.lock().expect("fake iface mutex poisoned") = Some((frame_type_mask, ies.to_vec()));
        Ok(())
    }

    fn configure_eapol_ip_address_allocation_params(
        &self,
        _ip_address_go: i32,
        _ip_address_mask: i32,
        _ip_address_start: i32,
        _ip_address_end: i32,
    ) -> RemoteResult<()> {
        self.daemon.hit("configure_eapol_ip_address_allocation_params")
    }
}

impl Linkable for FakeP2pIface {
    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>, cookie: u64) -> RemoteResult<()> {
        self.daemon.link(recipient, cookie)
    }
}

impl hidl::P2pIface for FakeP2pIface {
    fn as_ops(&self) -> &dyn P2pIfaceOps {
        self
    }

    fn minor_version(&self) -> u32 {
        self.version.max(0) as u32
    }

    fn register_callback(&self, callback: Arc<dyn hidl::P2pIfaceCallback>) -> RemoteResult<()> {
        self.daemon.hit("register_callback")?;
        *self.hidl_callback.lock().expect("fake iface mutex poisoned") = Some(callback);
        Ok(())
    }

    fn register_callback_1_4(&self, callback: Arc<dyn hidl::P2pIfaceCallback>) -> RemoteResult<()> {
        self.daemon.hit("register_callback_1_4")?;
        *self.hidl_callback.lock().expect("fake iface mutex poisoned") = Some(callback);
        Ok(())
    }
}

// ── Supplicant ─────────────────────────────────────────────────────────────

/// Supplicant daemon. `version` is the AIDL interface version, or the 1.x
/// minor version when installed as a HIDL service.
pub struct FakeSupplicant {
    pub daemon: Arc<FakeDaemon>,
    pub iface: Arc<FakeP2pIface>,
    version: i32,
}

impl FakeSupplicant {
    pub fn new(version: i32) -> Arc<Self> {
        let daemon = FakeDaemon::new();
        let iface = Arc::new(FakeP2pIface::new(daemon.clone(), version));
        Arc::new(Self { daemon, iface, version })
    }

    pub fn version(&self) -> i32 {
        self.version
    }
}

impl Linkable for FakeSupplicant {
    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>, cookie: u64) -> RemoteResult<()> {
        self.daemon.link(recipient, cookie)
    }
}

impl aidl::Supplicant for FakeSupplicant {
    fn interface_version(&self) -> RemoteResult<i32> {
        self.daemon.hit("interface_version")?;
        Ok(self.version)
    }

    fn set_debug_params(&self, _level: DebugLevel, _show_timestamp: bool, _show_keys: bool) -> RemoteResult<()> {
        self.daemon.hit("set_debug_params")
    }

    fn add_p2p_interface(&self, _name: &str) -> RemoteResult<Arc<dyn aidl::P2pIface>> {
        self.daemon.hit("add_p2p_interface")?;
        Ok(self.iface.clone())
    }

    fn remove_interface(&self, _info: &IfaceInfo) -> RemoteResult<()> {
        self.daemon.hit("remove_interface")
    }

    fn terminate(&self) -> RemoteResult<()> {
        self.daemon.terminate()
    }
}

impl hidl::Supplicant for FakeSupplicant {
    fn minor_version(&self) -> u32 {
        self.version.max(0) as u32
    }

    fn set_debug_params(&self, _level: DebugLevel, _show_timestamp: bool, _show_keys: bool) -> RemoteResult<()> {
        self.daemon.hit("set_debug_params")
    }

    fn list_interfaces(&self) -> RemoteResult<Vec<IfaceInfo>> {
        self.daemon.hit("list_interfaces")?;
        Ok(vec![IfaceInfo::p2p("p2p0")])
    }

    fn get_interface(&self, _info: &IfaceInfo) -> RemoteResult<Arc<dyn hidl::P2pIface>> {
        self.daemon.hit("get_interface")?;
        Ok(self.iface.clone())
    }

    fn add_interface(&self, _info: &IfaceInfo) -> RemoteResult<AddInterfaceResult> {
        self.daemon.hit("add_interface")?;
        Ok(AddInterfaceResult {
            status: status::SUCCESS,
            iface: Some(self.iface.clone()),
        })
    }

    fn remove_interface(&self, _info: &IfaceInfo) -> RemoteResult<()> {
        self.daemon.hit("remove_interface")
    }

    fn terminate(&self) -> RemoteResult<()> {
        self.daemon.terminate()
    }
}

// ── Hostapd ────────────────────────────────────────────────────────────────

/// Hostapd daemon; `version` works as for [`FakeSupplicant`].
pub struct FakeHostapd {
    pub daemon: Arc<FakeDaemon>,
    version: i32,
    callback: Mutex<Option<Arc<dyn aidl::HostapdCallback>>>,
    last_access_point: Mutex<Option<(IfaceParams, NetworkParams)>>,
    last_disconnect: Mutex<Option<(String, MacBytes, i32)>>,
}

impl FakeHostapd {
    pub fn new(version: i32) -> Arc<Self> {
        Arc::new(Self {
            daemon: FakeDaemon::new(),
            version,
            callback: Mutex::new(None),
            last_access_point: Mutex::new(None),
            last_disconnect: Mutex::new(None),
        })
    }

    /// The event sink the proxy registered, if any.
    pub fn callback(&self) -> Option<Arc<dyn aidl::HostapdCallback>> {
        self.callback.lock().expect("fake hostapd mutex poisoned").clone()
    }

    pub fn last_access_point(&self) -> Option<(IfaceParams, NetworkParams)> {
        self.last_access_point.lock().expect("fake hostapd mutex poisoned").clone()
    }

    pub fn last_disconnect(&self) -> Option<(String, MacBytes, i32)> {
        self.last_disconnect.lock().expect("fake hostapd mutex poisoned").clone()
    }

    fn record_callback(&self, method: &str, callback: Arc<dyn aidl::HostapdCallback>) -> RemoteResult<()> {
        self.daemon.hit(method)?;
        *self.callback.lock().expect("fake hostapd mutex poisoned") = Some(callback);
        Ok(())
    }

    fn record_access_point(&self, method: &str, iface: &IfaceParams, network: &NetworkParams) -> RemoteResult<()> {
        self.daemon.hit(method)?;
        *self.last_access_point.lock().expect("fake hostapd mutex poisoned") = Some((iface.clone(), network.clone()));
        Ok(())
    }

    fn record_disconnect(&self, iface_name: &str, client: MacBytes, reason_code: i32) -> RemoteResult<()> {
        self.daemon.hit("force_client_disconnect")?;
        *self.last_disconnect.lock().expect("fake hostapd mutex poisoned") =
            Some((iface_name.to_string(), client, reason_code));
        Ok(())
    }
}

impl Linkable for FakeHostapd {
    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>, cookie: u64) -> RemoteResult<()> {
        self.daemon.link(recipient, cookie)
    }
}

impl aidl::Hostapd for FakeHostapd {
    fn interface_version(&self) -> RemoteResult<i32> {
        self.daemon.hit("interface_version")?;
        Ok(self.version)
    }

    fn set_debug_params(&self, _level: DebugLevel) -> RemoteResult<()> {
        self.daemon.hit("set_debug_params")
    }

    fn register_callback(&self, callback: Arc<dyn aidl::HostapdCallback>) -> RemoteResult<()> {
        self.record_callback("register_callback", callback)
    }

    fn add_access_point(&self, iface: &IfaceParams, network: &NetworkParams) -> RemoteResult<()> {
        self.record_access_point("add_access_point", iface, network)
    }

    fn remove_access_point(&self, _iface_name: &str) -> RemoteResult<()> {
        self.daemon.hit("remove_access_point")
    }

    fn force_client_disconnect(&self, iface_name: &str, client: MacBytes, reason_code: i32) -> RemoteResult<()> {
        self.record_disconnect(iface_name, client, reason_code)
    }

    fn remove_link_from_multiple_link_bridged_ap_iface(&self, _iface_name: &str, _link_identity: &str) -> RemoteResult<()> {
        self.daemon.hit("remove_link_from_multiple_link_bridged_ap_iface")
    }

    fn terminate(&self) -> RemoteResult<()> {
        self.daemon.terminate()
    }
}

impl hidl::Hostapd for FakeHostapd {
    fn minor_version(&self) -> u32 {
        self.version.max(0) as u32
    }

    fn add_access_point(&self, iface: &IfaceParams, network: &NetworkParams) -> RemoteResult<()> {
        self.record_access_point("add_access_point", iface, network)
    }

    fn add_access_point_1_1(&self, iface: &IfaceParams, network: &NetworkParams) -> RemoteResult<()> {
        self.record_access_point("add_access_point_1_1", iface, network)
    }

    fn add_access_point_1_2(&self, iface: &IfaceParams, network: &NetworkParams) -> RemoteResult<()> {
        self.record_access_point("add_access_point_1_2", iface, network)
    }

    fn add_access_point_1_3(&self, iface: &IfaceParams, network: &NetworkParams) -> RemoteResult<()> {
        self.record_access_point("add_access_point_1_3", iface, network)
    }

    fn remove_access_point(&self, _iface_name: &str) -> RemoteResult<()> {
        self.daemon.hit("remove_access_point")
    }

    fn register_callback(&self, callback: Arc<dyn aidl::HostapdCallback>) -> RemoteResult<()> {
        self.record_callback("register_callback", callback)
    }

    fn register_callback_1_3(&self, callback: Arc<dyn aidl::HostapdCallback>) -> RemoteResult<()> {
        self.record_callback("register_callback_1_3", callback)
    }

    fn force_client_disconnect(&self, iface_name: &str, client: MacBytes, reason_code: i32) -> RemoteResult<()> {
        self.record_disconnect(iface_name, client, reason_code)
    }

    fn set_debug_params(&self, _level: DebugLevel) -> RemoteResult<()> {
        self.daemon.hit("set_debug_params")
    }

    fn terminate(&self) -> RemoteResult<()> {
        self.daemon.terminate()
    }
}

// ── Service discovery ──────────────────────────────────────────────────────

/// Registry of declared versioned services. Resolving a killed daemon starts it again.
#[derive(Default)]
pub struct FakeServiceRegistry {
    declared: Mutex<HashSet<String>>,
    supplicant: Mutex<Option<Arc<FakeSupplicant>>>,
    hostapd: Mutex<Option<Arc<FakeHostapd>>>,
}

impl FakeServiceRegistry {
    pub fn declare_supplicant(&self, instance: &str, supplicant: Arc<FakeSupplicant>) {
        let name = aidl::instance_name(aidl::SUPPLICANT_DESCRIPTOR, instance);
        self.declared.lock().expect("fake registry mutex poisoned").insert(name);
        *self.supplicant.lock().expect("fake registry mutex poisoned") = Some(supplicant);
    }

    pub fn declare_hostapd(&self, instance: &str, hostapd: Arc<FakeHostapd>) {
        let name = aidl::instance_name(aidl::HOSTAPD_DESCRIPTOR, instance);
        self.declared.lock().expect("fake registry mutex poisoned").insert(name);
        *self.hostapd.lock().expect("fake registry mutex poisoned") = Some(hostapd);
    }
}

impl aidl::ServiceRegistry for FakeServiceRegistry {
    fn is_declared(&self, instance: &str) -> bool {
        self.declared.lock().expect("fake registry mutex poisoned").contains(instance)
    }

    fn supplicant(&self, instance: &str) -> Option<Arc<dyn aidl::Supplicant>> {
        if !self.is_declared(instance) {
            return None;
        }
        let supplicant = self.supplicant.lock().expect("fake registry mutex poisoned").clone()?;
        supplicant.daemon.start();
        Some(supplicant)
    }

    fn hostapd(&self, instance: &str) -> Option<Arc<dyn aidl::Hostapd>> {
        if !self.is_declared(instance) {
            return None;
        }
        let hostapd = self.hostapd.lock().expect("fake registry mutex poisoned").clone()?;
        hostapd.daemon.start();
        Some(hostapd)
    }
}

/// Service manager of the legacy runtime.
pub struct FakeServiceManager {
    pub daemon: Arc<FakeDaemon>,
    transports: Mutex<HashMap<String, Transport>>,
    announced: Mutex<HashSet<String>>,
    subscribers: Mutex<Vec<(String, Arc<dyn ServiceNotification>)>>,
    accept_notifications: AtomicBool,
}

impl Default for FakeServiceManager {
    fn default() -> Self {
        Self {
            daemon: FakeDaemon::new(),
            transports: Mutex::new(HashMap::new()),
            announced: Mutex::new(HashSet::new()),
            subscribers: Mutex::new(Vec::new()),
            accept_notifications: AtomicBool::new(true),
        }
    }
}

impl FakeServiceManager {
    pub fn set_transport(&self, fq_name: &str, transport: Transport) {
        self.transports
            .lock()
            .expect("fake service manager mutex poisoned")
            .insert(fq_name.to_string(), transport);
    }

    /// When off, `register_for_notifications` answers `false`.
    pub fn set_accept_notifications(&self, accept: bool) {
        self.accept_notifications.store(accept, Ordering::SeqCst);
    }

    /// Announces `fq_name` as registered and notifies current subscribers.
    pub fn announce(&self, fq_name: &str) {
        self.announced
            .lock()
            .expect("fake service manager mutex poisoned")
            .insert(fq_name.to_string());
        let subscribers: Vec<_> = self
            .subscribers
            .lock()
            .expect("fake service manager mutex poisoned")
            .iter()
            .filter(|(name, _)| name == fq_name)
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in subscribers {
            callback.on_registration(fq_name, "default", false);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("fake service manager mutex poisoned").len()
    }
}

impl Linkable for FakeServiceManager {
    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>, cookie: u64) -> RemoteResult<()> {
        self.daemon.link(recipient, cookie)
    }
}

impl hidl::ServiceManager for FakeServiceManager {
    fn transport(&self, fq_name: &str, _instance: &str) -> RemoteResult<Transport> {
        self.daemon.hit("transport")?;
        Ok(self
            .transports
            .lock()
            .expect("fake service manager mutex poisoned")
            .get(fq_name)
            .copied()
            .unwrap_or(Transport::Empty))
    }

    fn register_for_notifications(
        &self,
        fq_name: &str,
        _instance: &str,
        callback: Arc<dyn ServiceNotification>,
    ) -> RemoteResult<bool> {
        self.daemon.hit("register_for_notifications")?;
        if !self.accept_notifications.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.subscribers
            .lock()
            .expect("fake service manager mutex poisoned")
            .push((fq_name.to_string(), callback.clone()));
        let preexisting = self
            .announced
            .lock()
            .expect("fake service manager mutex poisoned")
            .contains(fq_name);
        if preexisting {
            callback.on_registration(fq_name, "default", true);
        }
        Ok(true)
    }
}

/// `getService` entry points of the legacy runtime.
pub struct FakeHidlServices {
    manager: Option<Arc<FakeServiceManager>>,
    supplicant: Mutex<Option<Arc<FakeSupplicant>>>,
    hostapd: Mutex<Option<Arc<FakeHostapd>>>,
}

impl Default for FakeHidlServices {
    fn default() -> Self {
        Self {
            manager: Some(Arc::new(FakeServiceManager::default())),
            supplicant: Mutex::new(None),
            hostapd: Mutex::new(None),
        }
    }
}

impl FakeHidlServices {
    /// A runtime with no service manager at all.
    pub fn without_manager() -> Self {
        Self {
            manager: None,
            ..Self::default()
        }
    }

    pub fn manager(&self) -> Option<Arc<FakeServiceManager>> {
        self.manager.clone()
    }

    /// Declares the supplicant and announces it as already registered.
    pub fn install_supplicant(&self, supplicant: Arc<FakeSupplicant>) {
        *self.supplicant.lock().expect("fake hidl mutex poisoned") = Some(supplicant);
        if let Some(manager) = &self.manager {
            manager.set_transport(hidl::SUPPLICANT_FQ_NAME, Transport::Hwbinder);
            manager.announce(hidl::SUPPLICANT_FQ_NAME);
        }
    }

    pub fn install_hostapd(&self, hostapd: Arc<FakeHostapd>) {
        *self.hostapd.lock().expect("fake hidl mutex poisoned") = Some(hostapd);
        if let Some(manager) = &self.manager {
            manager.set_transport(hidl::HOSTAPD_FQ_NAME, Transport::Hwbinder);
            manager.announce(hidl::HOSTAPD_FQ_NAME);
        }
    }
}

impl hidl::HidlServices for FakeHidlServices {
    fn service_manager(&self) -> Option<Arc<dyn hidl::ServiceManager>> {
        let manager = self.manager.clone()?;
        Some(manager)
    }

    fn supplicant(&self) -> Option<Arc<dyn hidl::Supplicant>> {
        let supplicant = self.supplicant.lock().expect("fake hidl mutex poisoned").clone()?;
        supplicant.daemon.start();
        Some(supplicant)
    }

    fn hostapd(&self) -> Option<Arc<dyn hidl::Hostapd>> {
        let hostapd = self.hostapd.lock().expect("fake hidl mutex poisoned").clone()?;
        hostapd.daemon.start();
        Some(hostapd)
    }
}

// ── Bundle ─────────────────────────────────────────────────────────────────

/// Every fake a proxy can reach, plus an in-memory settings store.
pub struct FakeHal {
    pub registry: Arc<FakeServiceRegistry>,
    pub hidl: Arc<FakeHidlServices>,
    pub settings: Arc<MemorySettings>,
}

impl Default for FakeHal {
    fn default() -> Self {
        Self::with_hidl(FakeHidlServices::default())
    }
}

impl FakeHal {
    /// Nothing declared, an empty service manager.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hidl(hidl: FakeHidlServices) -> Self {
        Self {
            registry: Arc::new(FakeServiceRegistry::default()),
            hidl: Arc::new(hidl),
            settings: Arc::new(MemorySettings::new()),
        }
    }

    /// A versioned supplicant declared under `"default"`.
    pub fn aidl_supplicant(version: i32) -> (Self, Arc<FakeSupplicant>) {
        let hal = Self::new();
        let supplicant = FakeSupplicant::new(version);
        hal.registry.declare_supplicant("default", supplicant.clone());
        (hal, supplicant)
    }

    /// A legacy supplicant with minor version `minor`.
    pub fn hidl_supplicant(minor: i32) -> (Self, Arc<FakeSupplicant>) {
        let hal = Self::new();
        let supplicant = FakeSupplicant::new(minor);
        hal.hidl.install_supplicant(supplicant.clone());
        (hal, supplicant)
    }

    pub fn aidl_hostapd(version: i32) -> (Self, Arc<FakeHostapd>) {
        let hal = Self::new();
        let hostapd = FakeHostapd::new(version);
        hal.registry.declare_hostapd("default", hostapd.clone());
        (hal, hostapd)
    }

    pub fn hidl_hostapd(minor: i32) -> (Self, Arc<FakeHostapd>) {
        let hal = Self::new();
        let hostapd = FakeHostapd::new(minor);
        hal.hidl.install_hostapd(hostapd.clone());
        (hal, hostapd)
    }

    pub fn services(&self) -> HalServices {
        HalServices {
            registry: self.registry.clone(),
            hidl: self.hidl.clone(),
            settings: self.settings.clone(),
        }
    }
}
