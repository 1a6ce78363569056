//! Supplicant P2P proxy over the versioned interface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use crate::codec;
use crate::config::HalConfig;
use crate::death::{DeathHandler, DeathMonitor, WeakRecipient};
use crate::error::{HalError, HalResult};
use crate::p2p::callback::AidlP2pCallback;
use crate::p2p::events::P2pMonitor;
use crate::p2p::{params, remote, P2pIfaceHal};
use crate::rpc::aidl::{
    self, P2pAddGroupConfigurationParams, P2pConnectInfo, P2pCreateGroupOwnerInfo, P2pDiscoveryInfo,
    P2pExtListenInfo, P2pProvisionDiscoveryParams, P2pReinvokePersistentGroupParams, ServiceRegistry,
};
use crate::rpc::{
    key_mgmt, p2p_feature, p2p_frame_type, DebugLevel, HalServices, IfaceInfo, P2pIfaceOps, WpsProvisionMethod,
};
use crate::settings::{SettingsStore, SUPPLICANT_HAL_AIDL_SERVICE_VERSION};
use crate::types::{
    features, pairing, DiscoveryConfig, ExtListenParams, GroupConnectionType, InformationElement, P2pConfig,
    P2pScanType, Ssid,
};
use crate::version::{supplicant_aidl, Capability};

const TAG: &str = "p2p-aidl";

#[derive(Default)]
struct State {
    supplicant: Option<Arc<dyn aidl::Supplicant>>,
    iface: Option<Arc<dyn aidl::P2pIface>>,
    callback: Option<Arc<AidlP2pCallback>>,
    cookie: u64,
}

pub struct SupplicantP2pAidl {
    me: Weak<Self>,
    registry: Arc<dyn ServiceRegistry>,
    settings: Arc<dyn SettingsStore>,
    monitor: Arc<dyn P2pMonitor>,
    instance: String,
    state: Mutex<State>,
    init_started: AtomicBool,
    version: OnceLock<i32>,
    death: DeathMonitor,
}

impl SupplicantP2pAidl {
    pub fn new(services: &HalServices, monitor: Arc<dyn P2pMonitor>, config: &HalConfig) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            registry: services.registry.clone(),
            settings: services.settings.clone(),
            monitor,
            instance: aidl::instance_name(aidl::SUPPLICANT_DESCRIPTOR, &config.hal_instance_name),
            state: Mutex::new(State::default()),
            init_started: AtomicBool::new(false),
            version: OnceLock::new(),
            death: DeathMonitor::new(TAG, config.wait_for_death_timeout()),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("p2p-aidl state mutex poisoned")
    }

    fn supplicant(&self, method: &str) -> HalResult<(Arc<dyn aidl::Supplicant>, u64)> {
        let state = self.state();
        let supplicant = state
            .supplicant
            .clone()
            .ok_or_else(|| HalError::not_initialized(method, "supplicant"))?;
        Ok((supplicant, state.cookie))
    }

    /// Runs `op` against the P2P interface snapshot and tears the connection
    /// down if the remote turned out to be dead.
    fn with_iface<T>(&self, method: &str, op: impl FnOnce(&dyn aidl::P2pIface) -> HalResult<T>) -> HalResult<T> {
        let (iface, cookie) = {
            let state = self.state();
            let iface = state
                .iface
                .clone()
                .ok_or_else(|| HalError::not_initialized(method, "p2p iface"))?;
            (iface, state.cookie)
        };
        self.check_transport(cookie, op(iface.as_ref()))
    }

    fn check_transport<T>(&self, cookie: u64, result: HalResult<T>) -> HalResult<T> {
        if let Err(err) = &result {
            if err.is_transport() {
                self.service_died(cookie);
            }
        }
        result
    }

    /// Clears every handle of generation `cookie`, then notifies the death handler.
    fn service_died(&self, cookie: u64) {
        let Some(ticket) = self.death.claim(Some(cookie)) else {
            return;
        };
        log::warn!("{TAG}: supplicant died (cookie {cookie})");
        {
            let mut state = self.state();
            state.supplicant = None;
            state.iface = None;
            state.callback = None;
        }
        self.init_started.store(false, Ordering::SeqCst);
        ticket.finish();
    }

    /// Negotiated interface version, or -1 while it cannot be determined.
    ///
    /// The stored value wins; otherwise the daemon is asked and the answer is
    /// persisted. Once known the version is never re-read.
    pub fn service_version(&self) -> i32 {
        if let Some(version) = self.version.get() {
            return *version;
        }
        if let Some(stored) = self.settings.get_int(SUPPLICANT_HAL_AIDL_SERVICE_VERSION) {
            if let Ok(stored) = i32::try_from(stored) {
                if stored >= 0 {
                    return *self.version.get_or_init(|| stored);
                }
            }
        }
        let Ok((supplicant, cookie)) = self.supplicant("getInterfaceVersion") else {
            return -1;
        };
        match self.check_transport(cookie, remote("getInterfaceVersion", supplicant.interface_version())) {
            Ok(version) if version >= 0 => {
                log::info!("{TAG}: supplicant interface version {version}");
                if let Err(err) = self.settings.put_int(SUPPLICANT_HAL_AIDL_SERVICE_VERSION, i64::from(version)) {
                    log::warn!("{TAG}: failed to persist service version: {err}");
                }
                *self.version.get_or_init(|| version)
            }
            Ok(version) => {
                log::error!("{TAG}: invalid interface version {version}");
                -1
            }
            Err(err) => {
                log::error!("{TAG}: {err}");
                -1
            }
        }
    }

    fn supports(&self, capability: Capability) -> bool {
        capability.supported_by(self.service_version())
    }

    fn require(&self, method: &str, capability: Capability) -> HalResult<()> {
        capability.require(method, self.service_version())
    }

    fn connect_internal(
        &self,
        method: &str,
        config: &P2pConfig,
        join_existing_group: bool,
        group_ifname: Option<&str>,
    ) -> HalResult<String> {
        self.with_iface(method, |iface| {
            let args = params::connect_args(method, config, true)?;
            if !self.supports(supplicant_aidl::CONNECT_WITH_PARAMS) {
                if args.pairing_method != pairing::NONE {
                    return Err(HalError::unsupported(
                        method,
                        supplicant_aidl::PAIRING_BOOTSTRAPPING.min_version,
                        self.service_version(),
                    ));
                }
                return remote(
                    method,
                    iface.connect(
                        args.peer,
                        args.provision_method,
                        &args.pre_selected_pin,
                        join_existing_group,
                        args.persistent,
                        args.go_intent,
                    ),
                );
            }
            let mut info = P2pConnectInfo {
                join_existing_group,
                peer_address: args.peer,
                provision_method: args.provision_method,
                pre_selected_pin: args.pre_selected_pin,
                persistent: args.persistent,
                go_intent: args.go_intent,
                vendor_data: config.vendor_data.clone(),
                pairing_bootstrapping_method: pairing::NONE,
                password: None,
                frequency_mhz: 0,
                authorize_connection_from_peer: false,
                group_interface_name: None,
            };
            // The pairing fields exist only from the bootstrapping version on.
            if args.pairing_method != pairing::NONE {
                self.require(method, supplicant_aidl::PAIRING_BOOTSTRAPPING)?;
                info.pairing_bootstrapping_method = args.pairing_method;
                info.password = (!args.pairing_password.is_empty()).then_some(args.pairing_password);
                info.frequency_mhz = args.frequency_mhz;
                info.authorize_connection_from_peer = args.authorize;
                info.group_interface_name = group_ifname.map(str::to_string);
            }
            remote("connectWithParams", iface.connect_with_params(&info))
        })
    }
}

fn scan_type_to_hal(scan_type: P2pScanType) -> aidl::P2pScanType {
    match scan_type {
        P2pScanType::Full => aidl::P2pScanType::Full,
        P2pScanType::Social => aidl::P2pScanType::Social,
        P2pScanType::SingleFreq => aidl::P2pScanType::SpecificFreq,
    }
}

fn key_mgmt_mask(connection_type: GroupConnectionType) -> i32 {
    match connection_type {
        GroupConnectionType::Legacy => key_mgmt::WPA_PSK,
        GroupConnectionType::R2Only => key_mgmt::SAE,
        GroupConnectionType::LegacyOrR2 => key_mgmt::WPA_PSK | key_mgmt::SAE,
    }
}

fn features_from_hal(hal_features: i64) -> u64 {
    let mut out = 0;
    if hal_features & p2p_feature::V2 != 0 {
        out |= features::WIFI_DIRECT_R2;
    }
    if hal_features & p2p_feature::PCC_MODE_WPA3_COMPATIBILITY != 0 {
        out |= features::PCC_MODE_ALLOW_LEGACY_AND_R2_CONNECTION;
    }
    out
}

impl P2pIfaceHal for SupplicantP2pAidl {
    fn call<T>(&self, method: &str, op: impl FnOnce(&dyn P2pIfaceOps) -> HalResult<T>) -> HalResult<T> {
        self.with_iface(method, |iface| op(iface.as_ops()))
    }

    fn initialize(&self) -> bool {
        if self.state().supplicant.is_some() {
            log::info!("{TAG}: service is already initialized");
            return true;
        }
        self.init_started.store(true, Ordering::SeqCst);
        self.state().iface = None;

        let Some(supplicant) = self.registry.supplicant(&self.instance) else {
            log::error!("{TAG}: unable to obtain supplicant {}", self.instance);
            return false;
        };
        let cookie = self.death.link();
        let recipient = Arc::new(WeakRecipient::new(self.me.clone(), |proxy: &Self, cookie| {
            proxy.service_died(cookie)
        }));
        {
            let mut state = self.state();
            state.supplicant = Some(supplicant.clone());
            state.cookie = cookie;
        }
        if let Err(err) = supplicant.link_to_death(recipient, cookie) {
            log::error!("{TAG}: failed to link to supplicant death: {err}");
            self.state().supplicant = None;
            return false;
        }
        log::info!("{TAG}: obtained supplicant {}", self.instance);
        true
    }

    fn is_initialization_started(&self) -> bool {
        self.init_started.load(Ordering::SeqCst)
    }

    fn is_initialization_complete(&self) -> bool {
        self.state().supplicant.is_some()
    }

    fn set_log_level(&self, verbose: bool, show_keys: bool) -> HalResult<()> {
        const M: &str = "setDebugParams";
        let (supplicant, cookie) = self.supplicant(M)?;
        let level = if verbose { DebugLevel::Debug } else { DebugLevel::Info };
        self.check_transport(cookie, remote(M, supplicant.set_debug_params(level, false, verbose && show_keys)))
    }

    fn setup_iface(&self, iface_name: &str) -> HalResult<()> {
        const M: &str = "setupIface";
        if self.state().iface.is_some() {
            return Err(HalError::invalid(M, "p2p iface already exists"));
        }
        let (supplicant, cookie) = self.supplicant(M)?;
        let iface = self.check_transport(cookie, remote("addP2pInterface", supplicant.add_p2p_interface(iface_name)))?;
        self.state().iface = Some(iface.clone());

        let callback = Arc::new(AidlP2pCallback::new(iface_name, self.monitor.clone(), self.service_version()));
        self.check_transport(cookie, remote("registerCallback", iface.register_callback(callback.clone())))?;
        self.state().callback = Some(callback);
        log::info!("{TAG}: set up p2p iface {iface_name}");
        Ok(())
    }

    fn teardown_iface(&self, iface_name: &str) -> HalResult<()> {
        const M: &str = "teardownIface";
        let (supplicant, cookie) = self.supplicant(M)?;
        if self.state().iface.is_none() {
            return Err(HalError::not_initialized(M, "p2p iface"));
        }
        self.check_transport(cookie, remote(M, supplicant.remove_interface(&IfaceInfo::p2p(iface_name))))?;
        let mut state = self.state();
        state.iface = None;
        state.callback = None;
        Ok(())
    }

    fn terminate(&self) -> HalResult<()> {
        let (supplicant, cookie) = self.supplicant("terminate")?;
        log::info!("{TAG}: terminating supplicant");
        let latch = self.death.arm();
        if let Err(err) = supplicant.terminate() {
            log::debug!("{TAG}: terminate returned {err}");
        }
        if latch.wait() {
            log::debug!("{TAG}: got supplicant death confirmation");
        } else {
            log::warn!("{TAG}: timed out waiting for confirmation of supplicant death");
            self.service_died(cookie);
        }
        Ok(())
    }

    fn register_death_handler(&self, handler: Arc<dyn DeathHandler>) -> bool {
        self.death.register(handler);
        true
    }

    fn deregister_death_handler(&self) -> bool {
        self.death.deregister();
        true
    }

    fn find_with_params(&self, config: &DiscoveryConfig, timeout_secs: i32) -> HalResult<()> {
        const M: &str = "findWithParams";
        self.with_iface(M, |iface| {
            if !self.supports(supplicant_aidl::FIND_WITH_PARAMS) {
                return match params::find_call(M, config.scan_type, config.frequency_mhz, timeout_secs)? {
                    params::FindCall::Full { timeout } => remote(M, iface.find(timeout)),
                    params::FindCall::Social { timeout } => remote(M, iface.find_on_social_channels(timeout)),
                    params::FindCall::SpecificFrequency { frequency, timeout } => {
                        remote(M, iface.find_on_specific_frequency(frequency, timeout))
                    }
                };
            }
            params::require_non_negative(M, "frequency", config.frequency_mhz)?;
            let info = P2pDiscoveryInfo {
                scan_type: scan_type_to_hal(config.scan_type),
                frequency_mhz: config.frequency_mhz,
                timeout_in_sec: timeout_secs,
                vendor_data: config.vendor_data.clone(),
            };
            remote(M, iface.find_with_params(&info))
        })
    }

    fn connect(&self, config: &P2pConfig, join_existing_group: bool) -> HalResult<String> {
        self.connect_internal("connect", config, join_existing_group, None)
    }

    fn provision_discovery(&self, config: &P2pConfig) -> HalResult<()> {
        const M: &str = "provisionDiscovery";
        self.with_iface(M, |iface| {
            let (method, pairing_method) = match &config.pairing {
                Some(bootstrap) => {
                    let pairing_method = params::pairing_method_to_hal(bootstrap.method).ok_or_else(|| {
                        HalError::invalid(M, format!("unrecognized pairing bootstrapping method {}", bootstrap.method))
                    })?;
                    if pairing_method == pairing::OUT_OF_BAND {
                        return Err(HalError::invalid(M, "out of band bootstrapping needs no provisioning"));
                    }
                    (WpsProvisionMethod::None, pairing_method)
                }
                None => (params::provision_discovery_method(M, config.wps)?, pairing::NONE),
            };
            let peer = params::parse_peer(M, &config.device_address)?;
            if self.supports(supplicant_aidl::PROVISION_DISCOVERY_WITH_PARAMS) {
                let params = P2pProvisionDiscoveryParams {
                    peer_mac_address: peer,
                    provision_method: method,
                    pairing_bootstrapping_method: pairing_method,
                };
                return remote("provisionDiscoveryWithParams", iface.provision_discovery_with_params(&params));
            }
            if pairing_method != pairing::NONE {
                return Err(HalError::unsupported(
                    M,
                    supplicant_aidl::PROVISION_DISCOVERY_WITH_PARAMS.min_version,
                    self.service_version(),
                ));
            }
            remote(M, iface.provision_discovery(peer, method))
        })
    }

    fn reinvoke(&self, network_id: i32, peer: &str, dik_id: i32) -> HalResult<()> {
        const M: &str = "reinvoke";
        self.with_iface(M, |iface| {
            params::require_non_empty(M, "peer address", peer)?;
            if network_id < 0 && dik_id < 0 {
                return Err(HalError::invalid(M, "neither a network id nor a device identity is given"));
            }
            let peer = params::parse_peer(M, peer)?;
            if dik_id >= 0 && self.supports(supplicant_aidl::REINVOKE_PERSISTENT_GROUP) {
                let params = P2pReinvokePersistentGroupParams {
                    peer_mac_address: peer,
                    persistent_network_id: network_id,
                    device_identity_entry_id: dik_id,
                };
                return remote("reinvokePersistentGroup", iface.reinvoke_persistent_group(&params));
            }
            remote(M, iface.reinvoke(network_id, peer))
        })
    }

    fn group_add(&self, network_id: i32, persistent: bool, p2p_v2: bool) -> HalResult<()> {
        const M: &str = "groupAdd";
        self.with_iface(M, |iface| {
            if self.supports(supplicant_aidl::CREATE_GROUP_OWNER) {
                let info = P2pCreateGroupOwnerInfo {
                    persistent,
                    persistent_network_id: network_id,
                    is_p2p_v2: p2p_v2,
                };
                return remote("createGroupOwner", iface.create_group_owner(&info));
            }
            remote(M, iface.add_group(persistent, network_id))
        })
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
        const M: &str = "groupAdd";
        self.with_iface(M, |iface| {
            let peer = params::parse_peer(M, peer)?;
            let ssid = Ssid::decode(&format!("\"{network_name}\"")).map_err(|err| params::invalid(M, err))?;
            if self.supports(supplicant_aidl::ADD_GROUP_CONFIGURATION_PARAMS) {
                let params = P2pAddGroupConfigurationParams {
                    ssid: ssid.0,
                    passphrase: passphrase.to_string(),
                    is_persistent: persistent,
                    frequency_mhz_or_band: frequency,
                    go_interface_address: peer,
                    join_existing_group: join,
                    key_mgmt_mask: key_mgmt_mask(connection_type),
                };
                return remote(
                    "addGroupWithConfigurationParams",
                    iface.add_group_with_configuration_params(&params),
                );
            }
            remote(
                M,
                iface.add_group_with_config(ssid.as_bytes(), passphrase, persistent, frequency, peer, join),
            )
        })
    }

    fn configure_ext_listen(
        &self,
        enable: bool,
        period_ms: i32,
        interval_ms: i32,
        params: Option<&ExtListenParams>,
    ) -> HalResult<()> {
        const M: &str = "configureExtListen";
        self.with_iface(M, |iface| {
            let (period_ms, interval_ms) = params::ext_listen_timing(M, enable, period_ms, interval_ms)?;
            if self.supports(supplicant_aidl::EXT_LISTEN_WITH_PARAMS) {
                let info = P2pExtListenInfo {
                    period_ms,
                    interval_ms,
                    vendor_data: params.map(|p| p.vendor_data.clone()).unwrap_or_default(),
                };
                return remote("configureExtListenWithParams", iface.configure_ext_listen_with_params(&info));
            }
            remote(M, iface.configure_ext_listen(period_ms, interval_ms))
        })
    }

    fn set_wfd_r2_device_info(&self, hex: &str) -> HalResult<()> {
        const M: &str = "setWfdR2DeviceInfo";
        self.with_iface(M, |iface| {
            let info = params::hex_payload(M, hex)?;
            remote(M, iface.set_wfd_r2_device_info(&info))
        })
    }

    fn set_mac_randomization(&self, enable: bool) -> HalResult<()> {
        const M: &str = "setMacRandomization";
        self.with_iface(M, |iface| remote(M, iface.set_mac_randomization(enable)))
    }

    fn remove_client(&self, peer: &str, is_legacy_client: bool) -> HalResult<()> {
        const M: &str = "removeClient";
        self.with_iface(M, |iface| {
            let peer = params::parse_peer(M, peer)?;
            remote(M, iface.remove_client(peer, is_legacy_client))
        })
    }

    fn get_supported_features(&self) -> HalResult<u64> {
        const M: &str = "getSupportedFeatures";
        self.with_iface(M, |iface| {
            if !self.supports(supplicant_aidl::FEATURE_SET) {
                return Ok(0);
            }
            let hal_features = remote("getFeatureSet", iface.get_feature_set())?;
            let features = features_from_hal(hal_features);
            log::info!("{TAG}: supported features {features:#x}");
            Ok(features)
        })
    }

    fn configure_eapol_ip_address_allocation_params(
        &self,
        ip_address_go: i32,
        ip_address_mask: i32,
        ip_address_start: i32,
        ip_address_end: i32,
    ) -> HalResult<()> {
        const M: &str = "configureEapolIpAddressAllocationParams";
        self.with_iface(M, |iface| {
            self.require(M, supplicant_aidl::EAPOL_IP_ADDRESS_ALLOCATION)?;
            remote(
                M,
                iface.configure_eapol_ip_address_allocation_params(
                    ip_address_go,
                    ip_address_mask,
                    ip_address_start,
                    ip_address_end,
                ),
            )
        })
    }

    fn authorize_connect_request_on_group_owner(&self, config: &P2pConfig, group_ifname: &str) -> HalResult<()> {
        const M: &str = "authorizeConnectRequestOnGroupOwner";
        params::require_non_empty(M, "group owner interface name", group_ifname)?;
        self.connect_internal(M, config, false, Some(group_ifname)).map(drop)
    }

    fn set_vendor_elements(&self, elements: &[InformationElement]) -> HalResult<()> {
        const M: &str = "setVendorElements";
        self.with_iface(M, |iface| {
            let ies = codec::encode_information_elements(elements);
            remote(M, iface.set_vendor_elements(p2p_frame_type::PROBE_RESP_P2P, &ies))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hal_feature_bits_map_to_framework_bits() {
        assert_eq!(features_from_hal(0), 0);
        assert_eq!(features_from_hal(p2p_feature::V2), features::WIFI_DIRECT_R2);
        assert_eq!(
            features_from_hal(p2p_feature::V2 | p2p_feature::PCC_MODE_WPA3_COMPATIBILITY),
            features::WIFI_DIRECT_R2 | features::PCC_MODE_ALLOW_LEGACY_AND_R2_CONNECTION
        );
    }

    #[test]
    fn connection_type_selects_key_management() {
        assert_eq!(key_mgmt_mask(GroupConnectionType::Legacy), key_mgmt::WPA_PSK);
        assert_eq!(key_mgmt_mask(GroupConnectionType::R2Only), key_mgmt::SAE);
        assert_eq!(
            key_mgmt_mask(GroupConnectionType::LegacyOrR2),
            key_mgmt::WPA_PSK | key_mgmt::SAE
        );
    }
}
