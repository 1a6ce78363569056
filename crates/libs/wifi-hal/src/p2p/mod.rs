//! P2P supplicant proxy.
//!
//! [`SupplicantP2pHal`] is the entry point. On the first
//! [`initialize`](SupplicantP2pHal::initialize) it checks the service
//! registry, picks exactly one [`P2pBackend`] and forwards every later call
//! to it. The backends implement [`P2pIfaceHal`]: the call surface both
//! transport generations share lives in its default methods, the
//! version-specific calls are implemented per backend.
//!
//! Backends report `Result<T, HalError>`; the facade logs a failure once and
//! collapses it to `false` / `None`.

pub mod aidl;
pub mod callback;
pub mod events;
pub mod hidl;
pub mod native;
pub mod params;

use std::sync::{Arc, OnceLock};

use crate::config::HalConfig;
use crate::death::DeathHandler;
use crate::error::{HalError, HalResult};
use crate::rpc::{self, HalServices, P2pIfaceOps, RemoteResult};
use crate::types::{
    remove_enclosing_quotes, DiscoveryConfig, ExtListenParams, GroupConnectionType, InformationElement,
    MacAddress, MiracastMode, P2pConfig, P2pGroup, P2pScanType, ServiceInfo, Ssid, UnsafeChannel,
    NETWORK_ID_TEMPORARY,
};

pub use aidl::SupplicantP2pAidl;
pub use events::{BroadcastP2pMonitor, P2pEvent, P2pMonitor, P2pMonitorEvent};
pub use hidl::SupplicantP2pHidl;
pub use native::P2pNative;

use params::{ServiceCommand, DEFAULT_OPERATING_CLASS};

/// Tags a downstream failure with the proxy method that issued it.
pub(crate) fn remote<T>(method: &str, result: RemoteResult<T>) -> HalResult<T> {
    result.map_err(|err| HalError::from_remote(method, err))
}

/// Like [`remote`], but a status failure is logged and read as `None`.
fn tolerate<T>(method: &str, result: RemoteResult<T>) -> HalResult<Option<T>> {
    match remote(method, result) {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_transport() => Err(err),
        Err(err) => {
            log::error!("p2p: {err}");
            Ok(None)
        }
    }
}

// ── Backend trait ──────────────────────────────────────────────────────────

/// Operations of one supplicant P2P connection.
///
/// Every method checks the interface handle first, then validates its
/// arguments, then issues its RPC. A transport failure tears the connection
/// down before the error is returned.
pub trait P2pIfaceHal: Send + Sync {
    /// Runs `op` against the live P2P interface.
    fn call<T>(&self, method: &str, op: impl FnOnce(&dyn P2pIfaceOps) -> HalResult<T>) -> HalResult<T>;

    fn initialize(&self) -> bool;
    fn is_initialization_started(&self) -> bool;
    fn is_initialization_complete(&self) -> bool;
    fn set_log_level(&self, verbose: bool, show_keys: bool) -> HalResult<()>;
    fn setup_iface(&self, iface_name: &str) -> HalResult<()>;
    fn teardown_iface(&self, iface_name: &str) -> HalResult<()>;
    fn terminate(&self) -> HalResult<()>;
    fn register_death_handler(&self, handler: Arc<dyn DeathHandler>) -> bool;
    fn deregister_death_handler(&self) -> bool;

    fn find_with_params(&self, config: &DiscoveryConfig, timeout_secs: i32) -> HalResult<()>;
    fn connect(&self, config: &P2pConfig, join_existing_group: bool) -> HalResult<String>;
    fn provision_discovery(&self, config: &P2pConfig) -> HalResult<()>;
    fn reinvoke(&self, network_id: i32, peer: &str, dik_id: i32) -> HalResult<()>;
    fn group_add(&self, network_id: i32, persistent: bool, p2p_v2: bool) -> HalResult<()>;
    #[allow(clippy::too_many_arguments)]
    fn group_add_with_config(
        &self,
        network_name: &str,
        passphrase: &str,
        connection_type: GroupConnectionType,
        persistent: bool,
        frequency: i32,
        peer: &str,
        join: bool,
    ) -> HalResult<()>;
    fn configure_ext_listen(
        &self,
        enable: bool,
        period_ms: i32,
        interval_ms: i32,
        params: Option<&ExtListenParams>,
    ) -> HalResult<()>;
    fn set_wfd_r2_device_info(&self, hex: &str) -> HalResult<()>;
    fn set_mac_randomization(&self, enable: bool) -> HalResult<()>;
    fn remove_client(&self, peer: &str, is_legacy_client: bool) -> HalResult<()>;
    fn get_supported_features(&self) -> HalResult<u64>;
    fn configure_eapol_ip_address_allocation_params(
        &self,
        ip_address_go: i32,
        ip_address_mask: i32,
        ip_address_start: i32,
        ip_address_end: i32,
    ) -> HalResult<()>;
    fn authorize_connect_request_on_group_owner(&self, config: &P2pConfig, group_ifname: &str) -> HalResult<()>;
    fn set_vendor_elements(&self, elements: &[InformationElement]) -> HalResult<()>;

    // ── Discovery ──

    fn find(&self, timeout_secs: i32) -> HalResult<()> {
        self.find_typed(P2pScanType::Full, 0, timeout_secs)
    }

    fn find_typed(&self, scan_type: P2pScanType, frequency: i32, timeout_secs: i32) -> HalResult<()> {
        const M: &str = "find";
        self.call(M, |ops| match params::find_call(M, scan_type, frequency, timeout_secs)? {
            params::FindCall::Full { timeout } => remote(M, ops.find(timeout)),
            params::FindCall::Social { timeout } => remote(M, ops.find_on_social_channels(timeout)),
            params::FindCall::SpecificFrequency { frequency, timeout } => {
                remote(M, ops.find_on_specific_frequency(frequency, timeout))
            }
        })
    }

    fn stop_find(&self) -> HalResult<()> {
        self.call("stopFind", |ops| remote("stopFind", ops.stop_find()))
    }

    fn flush(&self) -> HalResult<()> {
        self.call("flush", |ops| remote("flush", ops.flush()))
    }

    fn service_flush(&self) -> HalResult<()> {
        self.call("serviceFlush", |ops| remote("serviceFlush", ops.flush_services()))
    }

    // ── Group settings ──

    fn set_power_save(&self, group_ifname: &str, enable: bool) -> HalResult<()> {
        const M: &str = "setPowerSave";
        self.call(M, |ops| remote(M, ops.set_power_save(group_ifname, enable)))
    }

    fn set_group_idle(&self, group_ifname: &str, timeout_secs: i32) -> HalResult<()> {
        const M: &str = "setGroupIdle";
        self.call(M, |ops| {
            params::require_non_negative(M, "timeout", timeout_secs)?;
            remote(M, ops.set_group_idle(group_ifname, timeout_secs))
        })
    }

    fn set_ssid_postfix(&self, postfix: &str) -> HalResult<()> {
        const M: &str = "setSsidPostfix";
        self.call(M, |ops| remote(M, ops.set_ssid_postfix(postfix.as_bytes())))
    }

    // ── Connection follow-ups ──

    fn cancel_connect(&self) -> HalResult<()> {
        self.call("cancelConnect", |ops| remote("cancelConnect", ops.cancel_connect()))
    }

    fn invite(&self, group: &P2pGroup, peer: &str) -> HalResult<()> {
        const M: &str = "invite";
        self.call(M, |ops| {
            params::require_non_empty(M, "peer address", peer)?;
            let owner = group
                .owner
                .ok_or_else(|| HalError::invalid(M, "group owner address is unknown"))?;
            let peer = params::parse_peer(M, peer)?;
            remote(M, ops.invite(&group.interface, owner.octets(), peer))
        })
    }

    fn reject(&self, peer: &str) -> HalResult<()> {
        const M: &str = "reject";
        self.call(M, |ops| {
            let peer = params::parse_peer(M, peer)?;
            remote(M, ops.reject(peer))
        })
    }

    fn get_device_address(&self) -> HalResult<String> {
        const M: &str = "getDeviceAddress";
        self.call(M, |ops| {
            let bytes = remote(M, ops.get_device_address())?;
            MacAddress::from_bytes(&bytes)
                .map(|mac| mac.to_string())
                .map_err(|err| params::invalid(M, err))
        })
    }

    fn get_ssid(&self, peer: &str) -> HalResult<String> {
        const M: &str = "getSsid";
        self.call(M, |ops| {
            let peer = params::parse_peer(M, peer)?;
            let ssid = Ssid(remote(M, ops.get_ssid(peer))?).encode();
            Ok(remove_enclosing_quotes(&ssid).to_string())
        })
    }

    // ── Groups ──

    fn group_remove(&self, group_ifname: &str) -> HalResult<()> {
        const M: &str = "groupRemove";
        self.call(M, |ops| {
            params::require_non_empty(M, "group interface name", group_ifname)?;
            remote(M, ops.remove_group(group_ifname))
        })
    }

    fn get_group_capability(&self, peer: &str) -> HalResult<i32> {
        const M: &str = "getGroupCapability";
        self.call(M, |ops| {
            let peer = params::parse_peer(M, peer)?;
            remote(M, ops.get_group_capability(peer))
        })
    }

    // ── Listen and channels ──

    fn set_listen_channel(&self, channel: i32) -> HalResult<()> {
        const M: &str = "setListenChannel";
        self.call(M, |ops| match params::listen_channel(M, channel)? {
            Some(channel) => remote(M, ops.set_listen_channel(channel, DEFAULT_OPERATING_CLASS)),
            None => Ok(()),
        })
    }

    fn set_operating_channel(&self, channel: i32, unsafe_channels: &[UnsafeChannel]) -> HalResult<()> {
        const M: &str = "setOperatingChannel";
        self.call(M, |ops| {
            let ranges = params::disallowed_frequencies(channel, unsafe_channels);
            remote(M, ops.set_disallowed_frequencies(&ranges))
        })
    }

    // ── Service discovery ──

    fn service_add(&self, info: &ServiceInfo) -> HalResult<()> {
        const M: &str = "serviceAdd";
        self.call(M, |ops| {
            for command in params::service_commands(M, info, true)? {
                match command {
                    ServiceCommand::Upnp { version, name } => remote(M, ops.add_upnp_service(version, &name))?,
                    ServiceCommand::Bonjour { query, response } => {
                        remote(M, ops.add_bonjour_service(&query, &response))?
                    }
                }
            }
            Ok(())
        })
    }

    fn service_remove(&self, info: &ServiceInfo) -> HalResult<()> {
        const M: &str = "serviceRemove";
        self.call(M, |ops| {
            for command in params::service_commands(M, info, false)? {
                match command {
                    ServiceCommand::Upnp { version, name } => {
                        remote(M, ops.remove_upnp_service(version, &name))?
                    }
                    ServiceCommand::Bonjour { query, .. } => remote(M, ops.remove_bonjour_service(&query))?,
                }
            }
            Ok(())
        })
    }

    fn request_service_discovery(&self, peer: &str, query_hex: &str) -> HalResult<String> {
        const M: &str = "requestServiceDiscovery";
        self.call(M, |ops| {
            let peer = params::parse_peer(M, peer)?;
            let query = params::hex_payload(M, query_hex)?;
            let id = remote(M, ops.request_service_discovery(peer, &query))?;
            Ok(id.to_string())
        })
    }

    fn cancel_service_discovery(&self, id: &str) -> HalResult<()> {
        const M: &str = "cancelServiceDiscovery";
        self.call(M, |ops| {
            let id = params::service_discovery_id(M, id)?;
            remote(M, ops.cancel_service_discovery(id))
        })
    }

    fn set_miracast_mode(&self, mode: MiracastMode) -> HalResult<()> {
        const M: &str = "setMiracastMode";
        self.call(M, |ops| remote(M, ops.set_miracast_mode(params::miracast_mode(mode))))
    }

    // ── WPS ──

    fn start_wps_pbc(&self, group_ifname: &str, bssid: Option<&str>) -> HalResult<()> {
        const M: &str = "startWpsPbc";
        self.call(M, |ops| {
            params::require_non_empty(M, "group interface name", group_ifname)?;
            let bssid = params::parse_optional_peer(M, bssid)?;
            remote(M, ops.start_wps_pbc(group_ifname, bssid))
        })
    }

    fn start_wps_pin_keypad(&self, group_ifname: &str, pin: &str) -> HalResult<()> {
        const M: &str = "startWpsPinKeypad";
        self.call(M, |ops| {
            params::require_non_empty(M, "group interface name", group_ifname)?;
            params::require_non_empty(M, "pin", pin)?;
            remote(M, ops.start_wps_pin_keypad(group_ifname, pin))
        })
    }

    fn start_wps_pin_display(&self, group_ifname: &str, bssid: Option<&str>) -> HalResult<String> {
        const M: &str = "startWpsPinDisplay";
        self.call(M, |ops| {
            params::require_non_empty(M, "group interface name", group_ifname)?;
            let bssid = params::parse_optional_peer(M, bssid)?;
            remote(M, ops.start_wps_pin_display(group_ifname, bssid))
        })
    }

    fn cancel_wps(&self, group_ifname: &str) -> HalResult<()> {
        const M: &str = "cancelWps";
        self.call(M, |ops| {
            params::require_non_empty(M, "group interface name", group_ifname)?;
            remote(M, ops.cancel_wps(group_ifname))
        })
    }

    // ── WFD and device configuration ──

    fn enable_wfd(&self, enable: bool) -> HalResult<()> {
        self.call("enableWfd", |ops| remote("enableWfd", ops.enable_wfd(enable)))
    }

    fn set_wfd_device_info(&self, hex: &str) -> HalResult<()> {
        const M: &str = "setWfdDeviceInfo";
        self.call(M, |ops| {
            let info = params::hex_payload(M, hex)?;
            remote(M, ops.set_wfd_device_info(&info))
        })
    }

    fn remove_network(&self, network_id: i32) -> HalResult<()> {
        const M: &str = "removeNetwork";
        self.call(M, |ops| remote(M, ops.remove_network(network_id)))
    }

    fn set_wps_device_name(&self, name: &str) -> HalResult<()> {
        const M: &str = "setWpsDeviceName";
        self.call(M, |ops| remote(M, ops.set_wps_device_name(name)))
    }

    fn set_wps_device_type(&self, device_type: &str) -> HalResult<()> {
        const M: &str = "setWpsDeviceType";
        self.call(M, |ops| {
            let bytes = params::wps_device_type(M, device_type)?;
            remote(M, ops.set_wps_device_type(&bytes))
        })
    }

    fn set_wps_config_methods(&self, methods: &str) -> HalResult<()> {
        const M: &str = "setWpsConfigMethods";
        self.call(M, |ops| {
            let mask = params::wps_config_methods(M, methods)?;
            remote(M, ops.set_wps_config_methods(mask))
        })
    }

    fn save_config(&self) -> HalResult<()> {
        self.call("saveConfig", |ops| remote("saveConfig", ops.save_config()))
    }

    // ── Persistent groups ──

    /// Persistent groups stored by the supplicant, minus the one currently up.
    /// A network that can't be read is skipped; a field that can't be read is
    /// left unset.
    fn load_groups(&self) -> HalResult<Vec<P2pGroup>> {
        const M: &str = "loadGroups";
        self.call(M, |ops| {
            let mut groups = Vec::new();
            for network_id in remote(M, ops.list_networks())? {
                let Some(network) = tolerate(M, ops.get_network(network_id))? else {
                    log::error!("p2p: failed to retrieve network object for {network_id}");
                    continue;
                };
                if tolerate(M, network.is_current())?.unwrap_or(true) {
                    log::info!("p2p: skipping current network {network_id}");
                    continue;
                }
                let mut group = P2pGroup::new("");
                group.network_id = network_id;
                if let Some(ssid) = tolerate(M, network.ssid())?.filter(|ssid| !ssid.is_empty()) {
                    group.ssid = Some(remove_enclosing_quotes(&Ssid(ssid).encode()).to_string());
                }
                if let Some(bssid) = tolerate(M, network.bssid())?.filter(|bssid| !bssid.is_empty()) {
                    group.owner = MacAddress::from_bytes(&bssid).ok();
                }
                if let Some(is_group_owner) = tolerate(M, network.is_group_owner())? {
                    group.is_group_owner = is_group_owner;
                }
                groups.push(group);
            }
            Ok(groups)
        })
    }

    fn set_client_list(&self, network_id: i32, clients: &str) -> HalResult<()> {
        const M: &str = "setClientList";
        self.call(M, |ops| {
            let clients = params::client_list(M, clients)?;
            let network = remote(M, ops.get_network(network_id))?;
            remote(M, network.set_client_list(&clients))
        })
    }

    /// Space-separated client addresses of a stored network.
    fn get_client_list(&self, network_id: i32) -> HalResult<String> {
        const M: &str = "getClientList";
        self.call(M, |ops| {
            let network = remote(M, ops.get_network(network_id))?;
            params::format_client_list(M, &remote(M, network.client_list())?)
        })
    }
}

// ── Backend selection ──────────────────────────────────────────────────────

/// Which transport generation a [`P2pBackend`] talks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HalTransport {
    Aidl,
    Hidl,
}

/// The selected supplicant backend.
#[derive(Clone)]
pub enum P2pBackend {
    Aidl(Arc<SupplicantP2pAidl>),
    Hidl(Arc<SupplicantP2pHidl>),
}

impl P2pBackend {
    /// Looks for a declared versioned service first, then for a legacy one.
    pub fn select(services: &HalServices, monitor: &Arc<dyn P2pMonitor>, config: &HalConfig) -> Option<Self> {
        let instance = rpc::aidl::instance_name(rpc::aidl::SUPPLICANT_DESCRIPTOR, &config.hal_instance_name);
        if services.registry.is_declared(&instance) {
            log::info!("p2p: using AIDL supplicant ({instance})");
            return Some(Self::Aidl(SupplicantP2pAidl::new(services, monitor.clone(), config)));
        }
        if hidl_declared(services, &config.hal_instance_name) {
            log::info!("p2p: using HIDL supplicant");
            return Some(Self::Hidl(SupplicantP2pHidl::new(services, monitor.clone(), config)));
        }
        log::error!("p2p: no supplicant service is declared");
        None
    }

    pub fn transport(&self) -> HalTransport {
        match self {
            Self::Aidl(_) => HalTransport::Aidl,
            Self::Hidl(_) => HalTransport::Hidl,
        }
    }
}

fn hidl_declared(services: &HalServices, instance: &str) -> bool {
    let Some(manager) = services.hidl.service_manager() else {
        return false;
    };
    match manager.transport(rpc::hidl::SUPPLICANT_FQ_NAME, instance) {
        Ok(transport) => transport != rpc::hidl::Transport::Empty,
        Err(err) => {
            log::error!("p2p: failed to query HIDL transport: {err}");
            false
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $backend:ident => $call:expr) => {
        match $self {
            P2pBackend::Aidl($backend) => $call,
            P2pBackend::Hidl($backend) => $call,
        }
    };
}

impl P2pIfaceHal for P2pBackend {
    fn call<T>(&self, method: &str, op: impl FnOnce(&dyn P2pIfaceOps) -> HalResult<T>) -> HalResult<T> {
        dispatch!(self, b => b.call(method, op))
    }

    fn initialize(&self) -> bool {
        dispatch!(self, b => b.initialize())
    }

    fn is_initialization_started(&self) -> bool {
        dispatch!(self, b => b.is_initialization_started())
    }

    fn is_initialization_complete(&self) -> bool {
        dispatch!(self, b => b.is_initialization_complete())
    }

    fn set_log_level(&self, verbose: bool, show_keys: bool) -> HalResult<()> {
        dispatch!(self, b => b.set_log_level(verbose, show_keys))
    }

    fn setup_iface(&self, iface_name: &str) -> HalResult<()> {
        dispatch!(self, b => b.setup_iface(iface_name))
    }

    fn teardown_iface(&self, iface_name: &str) -> HalResult<()> {
        dispatch!(self, b => b.teardown_iface(iface_name))
    }

    fn terminate(&self) -> HalResult<()> {
        dispatch!(self, b => b.terminate())
    }

    fn register_death_handler(&self, handler: Arc<dyn DeathHandler>) -> bool {
        dispatch!(self, b => b.register_death_handler(handler))
    }

    fn deregister_death_handler(&self) -> bool {
        dispatch!(self, b => b.deregister_death_handler())
    }

    fn find_with_params(&self, config: &DiscoveryConfig, timeout_secs: i32) -> HalResult<()> {
        dispatch!(self, b => b.find_with_params(config, timeout_secs))
    }

    fn connect(&self, config: &P2pConfig, join_existing_group: bool) -> HalResult<String> {
        dispatch!(self, b => b.connect(config, join_existing_group))
    }

    fn provision_discovery(&self, config: &P2pConfig) -> HalResult<()> {
        dispatch!(self, b => b.provision_discovery(config))
    }

    fn reinvoke(&self, network_id: i32, peer: &str, dik_id: i32) -> HalResult<()> {
        dispatch!(self, b => b.reinvoke(network_id, peer, dik_id))
    }

    fn group_add(&self, network_id: i32, persistent: bool, p2p_v2: bool) -> HalResult<()> {
        dispatch!(self, b => b.group_add(network_id, persistent, p2p_v2))
    }

    fn group_add_with_config(
        &self,
        network_name: &str,
        passphrase: &str,
        connection_type: GroupConnectionType,
        persistent: bool,
        frequency: i32,
        peer: &str,
        join: bool,
    ) -> HalResult<()> {
        dispatch!(self, b => b.group_add_with_config(
            network_name,
            passphrase,
            connection_type,
            persistent,
            frequency,
            peer,
            join,
        ))
    }

    fn configure_ext_listen(
        &self,
        enable: bool,
        period_ms: i32,
        interval_ms: i32,
        params: Option<&ExtListenParams>,
    ) -> HalResult<()> {
        dispatch!(self, b => b.configure_ext_listen(enable, period_ms, interval_ms, params))
    }

    fn set_wfd_r2_device_info(&self, hex: &str) -> HalResult<()> {
        dispatch!(self, b => b.set_wfd_r2_device_info(hex))
    }

    fn set_mac_randomization(&self, enable: bool) -> HalResult<()> {
        dispatch!(self, b => b.set_mac_randomization(enable))
    }

    fn remove_client(&self, peer: &str, is_legacy_client: bool) -> HalResult<()> {
        dispatch!(self, b => b.remove_client(peer, is_legacy_client))
    }

    fn get_supported_features(&self) -> HalResult<u64> {
        dispatch!(self, b => b.get_supported_features())
    }

    fn configure_eapol_ip_address_allocation_params(
        &self,
        ip_address_go: i32,
        ip_address_mask: i32,
        ip_address_start: i32,
        ip_address_end: i32,
    ) -> HalResult<()> {
        dispatch!(self, b => b.configure_eapol_ip_address_allocation_params(
            ip_address_go,
            ip_address_mask,
            ip_address_start,
            ip_address_end,
        ))
    }

    fn authorize_connect_request_on_group_owner(&self, config: &P2pConfig, group_ifname: &str) -> HalResult<()> {
        dispatch!(self, b => b.authorize_connect_request_on_group_owner(config, group_ifname))
    }

    fn set_vendor_elements(&self, elements: &[InformationElement]) -> HalResult<()> {
        dispatch!(self, b => b.set_vendor_elements(elements))
    }
}

// ── Facade ─────────────────────────────────────────────────────────────────

/// Framework-facing supplicant P2P HAL.
pub struct SupplicantP2pHal {
    services: HalServices,
    monitor: Arc<dyn P2pMonitor>,
    config: HalConfig,
    backend: OnceLock<Option<P2pBackend>>,
}

impl SupplicantP2pHal {
    pub fn new(services: HalServices, monitor: Arc<dyn P2pMonitor>, config: HalConfig) -> Self {
        Self {
            services,
            monitor,
            config,
            backend: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &HalConfig {
        &self.config
    }

    pub fn services(&self) -> &HalServices {
        &self.services
    }

    /// The selected backend; `None` before the first `initialize` or when no
    /// service is declared.
    pub fn backend(&self) -> Option<&P2pBackend> {
        self.backend.get().and_then(Option::as_ref)
    }

    pub fn transport(&self) -> Option<HalTransport> {
        self.backend().map(P2pBackend::transport)
    }

    fn run<T>(&self, method: &str, op: impl FnOnce(&P2pBackend) -> HalResult<T>) -> Option<T> {
        let Some(backend) = self.backend() else {
            log::error!("Cannot call {method} because HAL object is null");
            return None;
        };
        match op(backend) {
            Ok(value) => Some(value),
            Err(err) => {
                log::error!("p2p: {err}");
                None
            }
        }
    }

    fn run_bool(&self, method: &str, op: impl FnOnce(&P2pBackend) -> HalResult<()>) -> bool {
        self.run(method, op).is_some()
    }

    // ── Lifecycle ──

    /// Selects the backend on first use, connects to it and applies the
    /// configured log level.
    pub fn initialize(&self) -> bool {
        let selected = self
            .backend
            .get_or_init(|| P2pBackend::select(&self.services, &self.monitor, &self.config));
        let Some(backend) = selected else {
            log::error!("Cannot call initialize because HAL object is null");
            return false;
        };
        if !backend.initialize() {
            return false;
        }
        if let Err(err) = backend.set_log_level(self.config.verbose_logging, self.config.show_keys) {
            log::warn!("p2p: {err}");
        }
        true
    }

    pub fn is_initialization_started(&self) -> bool {
        self.run("isInitializationStarted", |b| Ok(b.is_initialization_started()))
            .unwrap_or(false)
    }

    pub fn is_initialization_complete(&self) -> bool {
        self.run("isInitializationComplete", |b| Ok(b.is_initialization_complete()))
            .unwrap_or(false)
    }

    pub fn set_log_level(&self, verbose: bool, show_keys: bool) -> bool {
        self.run_bool("setLogLevel", |b| b.set_log_level(verbose, show_keys))
    }

    pub fn setup_iface(&self, iface_name: &str) -> bool {
        self.run_bool("setupIface", |b| b.setup_iface(iface_name))
    }

    pub fn teardown_iface(&self, iface_name: &str) -> bool {
        self.run_bool("teardownIface", |b| b.teardown_iface(iface_name))
    }

    pub fn terminate(&self) {
        self.run("terminate", |b| b.terminate());
    }

    pub fn register_death_handler(&self, handler: Arc<dyn DeathHandler>) -> bool {
        self.run("registerDeathHandler", |b| Ok(b.register_death_handler(handler)))
            .unwrap_or(false)
    }

    pub fn deregister_death_handler(&self) -> bool {
        self.run("deregisterDeathHandler", |b| Ok(b.deregister_death_handler()))
            .unwrap_or(false)
    }

    // ── Discovery ──

    pub fn find(&self, timeout_secs: i32) -> bool {
        self.run_bool("find", |b| b.find(timeout_secs))
    }

    pub fn find_typed(&self, scan_type: P2pScanType, frequency: i32, timeout_secs: i32) -> bool {
        self.run_bool("find", |b| b.find_typed(scan_type, frequency, timeout_secs))
    }

    pub fn find_with_params(&self, config: &DiscoveryConfig, timeout_secs: i32) -> bool {
        self.run_bool("findWithParams", |b| b.find_with_params(config, timeout_secs))
    }

    pub fn stop_find(&self) -> bool {
        self.run_bool("stopFind", |b| b.stop_find())
    }

    pub fn flush(&self) -> bool {
        self.run_bool("flush", |b| b.flush())
    }

    pub fn service_flush(&self) -> bool {
        self.run_bool("serviceFlush", |b| b.service_flush())
    }

    // ── Group settings ──

    pub fn set_power_save(&self, group_ifname: &str, enable: bool) -> bool {
        self.run_bool("setPowerSave", |b| b.set_power_save(group_ifname, enable))
    }

    pub fn set_group_idle(&self, group_ifname: &str, timeout_secs: i32) -> bool {
        self.run_bool("setGroupIdle", |b| b.set_group_idle(group_ifname, timeout_secs))
    }

    pub fn set_ssid_postfix(&self, postfix: &str) -> bool {
        self.run_bool("setSsidPostfix", |b| b.set_ssid_postfix(postfix))
    }

    // ── Connection ──

    /// Returns the generated pin; an empty string when none was generated.
    pub fn connect(&self, config: &P2pConfig, join_existing_group: bool) -> Option<String> {
        self.run("connect", |b| b.connect(config, join_existing_group))
    }

    pub fn cancel_connect(&self) -> bool {
        self.run_bool("cancelConnect", |b| b.cancel_connect())
    }

    pub fn provision_discovery(&self, config: &P2pConfig) -> bool {
        self.run_bool("provisionDiscovery", |b| b.provision_discovery(config))
    }

    pub fn invite(&self, group: &P2pGroup, peer: &str) -> bool {
        self.run_bool("invite", |b| b.invite(group, peer))
    }

    pub fn reject(&self, peer: &str) -> bool {
        self.run_bool("reject", |b| b.reject(peer))
    }

    pub fn get_device_address(&self) -> Option<String> {
        self.run("getDeviceAddress", |b| b.get_device_address())
    }

    pub fn get_ssid(&self, peer: &str) -> Option<String> {
        self.run("getSsid", |b| b.get_ssid(peer))
    }

    pub fn reinvoke(&self, network_id: i32, peer: &str, dik_id: i32) -> bool {
        self.run_bool("reinvoke", |b| b.reinvoke(network_id, peer, dik_id))
    }

    // ── Groups ──

    pub fn group_add(&self, network_id: i32, persistent: bool, p2p_v2: bool) -> bool {
        self.run_bool("groupAdd", |b| b.group_add(network_id, persistent, p2p_v2))
    }

    /// Autonomous group owner without a stored network.
    pub fn group_add_default(&self, persistent: bool, p2p_v2: bool) -> bool {
        self.group_add(NETWORK_ID_TEMPORARY, persistent, p2p_v2)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn group_add_with_config(
        &self,
        network_name: &str,
        passphrase: &str,
        connection_type: GroupConnectionType,
        persistent: bool,
        frequency: i32,
        peer: &str,
        join: bool,
    ) -> bool {
        self.run_bool("groupAdd", |b| {
            b.group_add_with_config(network_name, passphrase, connection_type, persistent, frequency, peer, join)
        })
    }

    pub fn group_remove(&self, group_ifname: &str) -> bool {
        self.run_bool("groupRemove", |b| b.group_remove(group_ifname))
    }

    pub fn get_group_capability(&self, peer: &str) -> Option<i32> {
        self.run("getGroupCapability", |b| b.get_group_capability(peer))
    }

    // ── Listen and channels ──

    pub fn configure_ext_listen(
        &self,
        enable: bool,
        period_ms: i32,
        interval_ms: i32,
        params: Option<&ExtListenParams>,
    ) -> bool {
        self.run_bool("configureExtListen", |b| {
            b.configure_ext_listen(enable, period_ms, interval_ms, params)
        })
    }

    pub fn set_listen_channel(&self, channel: i32) -> bool {
        self.run_bool("setListenChannel", |b| b.set_listen_channel(channel))
    }

    pub fn set_operating_channel(&self, channel: i32, unsafe_channels: &[UnsafeChannel]) -> bool {
        self.run_bool("setOperatingChannel", |b| b.set_operating_channel(channel, unsafe_channels))
    }

    // ── Service discovery ──

    pub fn service_add(&self, info: &ServiceInfo) -> bool {
        self.run_bool("serviceAdd", |b| b.service_add(info))
    }

    pub fn service_remove(&self, info: &ServiceInfo) -> bool {
        self.run_bool("serviceRemove", |b| b.service_remove(info))
    }

    pub fn request_service_discovery(&self, peer: &str, query_hex: &str) -> Option<String> {
        self.run("requestServiceDiscovery", |b| b.request_service_discovery(peer, query_hex))
    }

    pub fn cancel_service_discovery(&self, id: &str) -> bool {
        self.run_bool("cancelServiceDiscovery", |b| b.cancel_service_discovery(id))
    }

    pub fn set_miracast_mode(&self, mode: MiracastMode) -> bool {
        self.run_bool("setMiracastMode", |b| b.set_miracast_mode(mode))
    }

    // ── WPS ──

    pub fn start_wps_pbc(&self, group_ifname: &str, bssid: Option<&str>) -> bool {
        self.run_bool("startWpsPbc", |b| b.start_wps_pbc(group_ifname, bssid))
    }

    pub fn start_wps_pin_keypad(&self, group_ifname: &str, pin: &str) -> bool {
        self.run_bool("startWpsPinKeypad", |b| b.start_wps_pin_keypad(group_ifname, pin))
    }

    pub fn start_wps_pin_display(&self, group_ifname: &str, bssid: Option<&str>) -> Option<String> {
        self.run("startWpsPinDisplay", |b| b.start_wps_pin_display(group_ifname, bssid))
    }

    pub fn cancel_wps(&self, group_ifname: &str) -> bool {
        self.run_bool("cancelWps", |b| b.cancel_wps(group_ifname))
    }

    // ── WFD and device configuration ──

    pub fn enable_wfd(&self, enable: bool) -> bool {
        self.run_bool("enableWfd", |b| b.enable_wfd(enable))
    }

    pub fn set_wfd_device_info(&self, hex: &str) -> bool {
        self.run_bool("setWfdDeviceInfo", |b| b.set_wfd_device_info(hex))
    }

    pub fn set_wfd_r2_device_info(&self, hex: &str) -> bool {
        self.run_bool("setWfdR2DeviceInfo", |b| b.set_wfd_r2_device_info(hex))
    }

    pub fn remove_network(&self, network_id: i32) -> bool {
        self.run_bool("removeNetwork", |b| b.remove_network(network_id))
    }

    pub fn set_wps_device_name(&self, name: &str) -> bool {
        self.run_bool("setWpsDeviceName", |b| b.set_wps_device_name(name))
    }

    pub fn set_wps_device_type(&self, device_type: &str) -> bool {
        self.run_bool("setWpsDeviceType", |b| b.set_wps_device_type(device_type))
    }

    pub fn set_wps_config_methods(&self, methods: &str) -> bool {
        self.run_bool("setWpsConfigMethods", |b| b.set_wps_config_methods(methods))
    }

    pub fn save_config(&self) -> bool {
        self.run_bool("saveConfig", |b| b.save_config())
    }

    pub fn set_mac_randomization(&self, enable: bool) -> bool {
        self.run_bool("setMacRandomization", |b| b.set_mac_randomization(enable))
    }

    pub fn remove_client(&self, peer: &str, is_legacy_client: bool) -> bool {
        self.run_bool("removeClient", |b| b.remove_client(peer, is_legacy_client))
    }

    /// Attaches vendor elements to the P2P response frames.
    pub fn set_vendor_elements(&self, elements: &[InformationElement]) -> bool {
        self.run_bool("setVendorElements", |b| b.set_vendor_elements(elements))
    }

    // ── Persistent groups ──

    /// Stored persistent groups; `None` when the supplicant can't list them.
    pub fn load_groups(&self) -> Option<Vec<P2pGroup>> {
        self.run("loadGroups", |b| b.load_groups())
    }

    pub fn set_client_list(&self, network_id: i32, clients: &str) -> bool {
        self.run_bool("setClientList", |b| b.set_client_list(network_id, clients))
    }

    pub fn get_client_list(&self, network_id: i32) -> Option<String> {
        self.run("getClientList", |b| b.get_client_list(network_id))
    }

    // ── Features ──

    /// Framework feature bits; 0 when unknown.
    pub fn get_supported_features(&self) -> u64 {
        self.run("getSupportedFeatures", |b| b.get_supported_features())
            .unwrap_or(0)
    }

    pub fn configure_eapol_ip_address_allocation_params(
        &self,
        ip_address_go: i32,
        ip_address_mask: i32,
        ip_address_start: i32,
        ip_address_end: i32,
    ) -> bool {
        self.run_bool("configureEapolIpAddressAllocationParams", |b| {
            b.configure_eapol_ip_address_allocation_params(
                ip_address_go,
                ip_address_mask,
                ip_address_start,
                ip_address_end,
            )
        })
    }

    pub fn authorize_connect_request_on_group_owner(&self, config: &P2pConfig, group_ifname: &str) -> bool {
        self.run_bool("authorizeConnectRequestOnGroupOwner", |b| {
            b.authorize_connect_request_on_group_owner(config, group_ifname)
        })
    }
}
