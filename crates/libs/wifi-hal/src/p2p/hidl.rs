//! Supplicant P2P proxy over the legacy 1.x interface.
//!
//! The supplicant is not resolved directly: the proxy registers with the
//! service manager and connects when the supplicant announces itself. Calls
//! newer than 1.0 are gated on the minor version the remote reports.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::config::HalConfig;
use crate::death::{DeathHandler, DeathMonitor, WeakRecipient};
use crate::error::{HalError, HalResult, RemoteError};
use crate::p2p::callback::HidlP2pCallback;
use crate::p2p::events::P2pMonitor;
use crate::p2p::{params, remote, P2pIfaceHal};
use crate::rpc::hidl::{self, HidlServices, ServiceManager, ServiceNotification, SUPPLICANT_FQ_NAME};
use crate::rpc::{status, DebugLevel, HalServices, IfaceInfo, IfaceType, P2pIfaceOps};
use crate::types::{
    DiscoveryConfig, ExtListenParams, GroupConnectionType, InformationElement, P2pConfig, Ssid,
};
use crate::version::{supplicant_hidl, Capability};

const TAG: &str = "p2p-hidl";

#[derive(Default)]
struct State {
    service_manager: Option<Arc<dyn ServiceManager>>,
    supplicant: Option<Arc<dyn hidl::Supplicant>>,
    iface: Option<Arc<dyn hidl::P2pIface>>,
    callback: Option<Arc<HidlP2pCallback>>,
    cookie: u64,
}

pub struct SupplicantP2pHidl {
    me: Weak<Self>,
    services: Arc<dyn HidlServices>,
    monitor: Arc<dyn P2pMonitor>,
    state: Mutex<State>,
    death: DeathMonitor,
}

/// Connects the proxy once the supplicant registers with the service manager.
struct Registration {
    proxy: Weak<SupplicantP2pHidl>,
}

impl ServiceNotification for Registration {
    fn on_registration(&self, fq_name: &str, instance: &str, preexisting: bool) {
        log::info!("{TAG}: {fq_name}/{instance} registered (preexisting: {preexisting})");
        if let Some(proxy) = self.proxy.upgrade() {
            proxy.connect_supplicant();
        }
    }
}

impl SupplicantP2pHidl {
    pub fn new(services: &HalServices, monitor: Arc<dyn P2pMonitor>, config: &HalConfig) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            services: services.hidl.clone(),
            monitor,
            state: Mutex::new(State::default()),
            death: DeathMonitor::new(TAG, config.wait_for_death_timeout()),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("p2p-hidl state mutex poisoned")
    }

    fn supplicant(&self, method: &str) -> HalResult<(Arc<dyn hidl::Supplicant>, u64)> {
        let state = self.state();
        let supplicant = state
            .supplicant
            .clone()
            .ok_or_else(|| HalError::not_initialized(method, "supplicant"))?;
        Ok((supplicant, state.cookie))
    }

    fn check_transport<T>(&self, cookie: u64, result: HalResult<T>) -> HalResult<T> {
        if let Err(err) = &result {
            if err.is_transport() {
                self.service_died(Some(cookie));
            }
        }
        result
    }

    fn require_supplicant(&self, method: &str, supplicant: &dyn hidl::Supplicant, capability: Capability) -> HalResult<()> {
        capability.require(method, supplicant.minor_version() as i32)
    }

    fn with_iface<T>(&self, method: &str, op: impl FnOnce(&dyn hidl::P2pIface) -> HalResult<T>) -> HalResult<T> {
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

    fn with_gated_iface<T>(
        &self,
        method: &str,
        capability: Capability,
        op: impl FnOnce(&dyn hidl::P2pIface) -> HalResult<T>,
    ) -> HalResult<T> {
        let (supplicant, _) = self.supplicant(method)?;
        self.with_iface(method, |iface| {
            self.require_supplicant(method, supplicant.as_ref(), capability)?;
            op(iface)
        })
    }

    fn connect_supplicant(&self) {
        if self.state().service_manager.is_none() {
            log::error!("{TAG}: supplicant registered without a service manager");
            return;
        }
        let Some(supplicant) = self.services.supplicant() else {
            log::error!("{TAG}: got null supplicant service");
            return;
        };
        let cookie = self.death.link();
        {
            let mut state = self.state();
            state.supplicant = Some(supplicant.clone());
            state.cookie = cookie;
        }
        let recipient = Arc::new(WeakRecipient::new(self.me.clone(), |proxy: &Self, cookie| {
            proxy.service_died(Some(cookie))
        }));
        if let Err(err) = supplicant.link_to_death(recipient, cookie) {
            log::error!("{TAG}: failed to link to supplicant death: {err}");
            self.service_died(Some(cookie));
            return;
        }
        log::info!("{TAG}: connected to supplicant 1.{}", supplicant.minor_version());
    }

    fn service_died(&self, cookie: Option<u64>) {
        let Some(ticket) = self.death.claim(cookie) else {
            return;
        };
        log::warn!("{TAG}: supplicant died");
        {
            let mut state = self.state();
            state.supplicant = None;
            state.iface = None;
            state.callback = None;
        }
        ticket.finish();
    }

    fn service_manager_died(&self, _cookie: u64) {
        log::warn!("{TAG}: service manager died");
        self.service_died(None);
        self.state().service_manager = None;
    }

    fn find_iface(&self, method: &str, supplicant: &dyn hidl::Supplicant, name: &str) -> HalResult<Arc<dyn hidl::P2pIface>> {
        let info = IfaceInfo::p2p(name);
        if supplicant_hidl::ADD_INTERFACE.supported_by(supplicant.minor_version() as i32) {
            let added = remote("addInterface", supplicant.add_interface(&info))?;
            if added.status != status::SUCCESS && added.status != status::FAILURE_IFACE_EXISTS {
                return Err(HalError::from_remote(
                    "addInterface",
                    RemoteError::status(added.status, "addInterface failed"),
                ));
            }
            return added
                .iface
                .ok_or_else(|| HalError::invalid(method, format!("no p2p interface {name} returned")));
        }
        let listed = remote("listInterfaces", supplicant.list_interfaces())?;
        let found = listed
            .iter()
            .find(|iface| iface.kind == IfaceType::P2p && iface.name == name)
            .ok_or_else(|| HalError::invalid(method, format!("no p2p interface named {name}")))?;
        remote("getInterface", supplicant.get_interface(found))
    }
}

impl P2pIfaceHal for SupplicantP2pHidl {
    fn call<T>(&self, method: &str, op: impl FnOnce(&dyn P2pIfaceOps) -> HalResult<T>) -> HalResult<T> {
        self.with_iface(method, |iface| op(iface.as_ops()))
    }

    fn initialize(&self) -> bool {
        if self.state().service_manager.is_some() {
            log::info!("{TAG}: service is already initialized");
            return true;
        }
        {
            let mut state = self.state();
            state.supplicant = None;
            state.iface = None;
        }
        let Some(manager) = self.services.service_manager() else {
            log::error!("{TAG}: failed to get the service manager");
            return false;
        };
        let recipient = Arc::new(WeakRecipient::new(self.me.clone(), Self::service_manager_died));
        if let Err(err) = manager.link_to_death(recipient, 0) {
            log::error!("{TAG}: failed to link to service manager death: {err}");
            return false;
        }
        self.state().service_manager = Some(manager.clone());

        let notification = Arc::new(Registration { proxy: self.me.clone() });
        match manager.register_for_notifications(SUPPLICANT_FQ_NAME, "", notification) {
            Ok(true) => true,
            Ok(false) => {
                log::error!("{TAG}: failed to register for supplicant notifications");
                self.state().service_manager = None;
                false
            }
            Err(err) => {
                log::error!("{TAG}: failed to register for supplicant notifications: {err}");
                self.state().service_manager = None;
                false
            }
        }
    }

    fn is_initialization_started(&self) -> bool {
        self.state().service_manager.is_some()
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
        let iface = self.check_transport(cookie, self.find_iface(M, supplicant.as_ref(), iface_name))?;

        let recipient = Arc::new(WeakRecipient::new(self.me.clone(), |proxy: &Self, cookie| {
            proxy.service_died(Some(cookie))
        }));
        self.check_transport(cookie, remote("linkToDeath", iface.link_to_death(recipient, cookie)))?;

        let accepts_r2 = supplicant_hidl::R2_CALLBACK.supported_by(iface.minor_version() as i32);
        let callback = Arc::new(HidlP2pCallback::new(iface_name, self.monitor.clone(), accepts_r2));
        let registered = if accepts_r2 {
            remote("registerCallback_1_4", iface.register_callback_1_4(callback.clone()))
        } else {
            remote("registerCallback", iface.register_callback(callback.clone()))
        };
        self.check_transport(cookie, registered)?;

        let mut state = self.state();
        state.iface = Some(iface);
        state.callback = Some(callback);
        log::info!("{TAG}: set up p2p iface {iface_name}");
        Ok(())
    }

    fn teardown_iface(&self, iface_name: &str) -> HalResult<()> {
        const M: &str = "teardownIface";
        let (supplicant, cookie) = self.supplicant(M)?;
        if self.state().iface.is_none() {
            return Err(HalError::not_initialized(M, "p2p iface"));
        }
        self.require_supplicant(M, supplicant.as_ref(), supplicant_hidl::ADD_INTERFACE)?;
        self.check_transport(cookie, remote(M, supplicant.remove_interface(&IfaceInfo::p2p(iface_name))))?;
        let mut state = self.state();
        state.iface = None;
        state.callback = None;
        Ok(())
    }

    fn terminate(&self) -> HalResult<()> {
        const M: &str = "terminate";
        let (supplicant, cookie) = self.supplicant(M)?;
        self.require_supplicant(M, supplicant.as_ref(), supplicant_hidl::TERMINATE)?;
        log::info!("{TAG}: terminating supplicant");
        let latch = self.death.arm();
        if let Err(err) = supplicant.terminate() {
            log::debug!("{TAG}: terminate returned {err}");
        }
        if !latch.wait() {
            log::warn!("{TAG}: timed out waiting for confirmation of supplicant death");
            self.service_died(Some(cookie));
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

    fn find_with_params(&self, _config: &DiscoveryConfig, _timeout_secs: i32) -> HalResult<()> {
        Err(HalError::invalid("findWithParams", "not supported by the HIDL interface"))
    }

    fn connect(&self, config: &P2pConfig, join_existing_group: bool) -> HalResult<String> {
        const M: &str = "connect";
        self.with_iface(M, |iface| {
            let args = params::connect_args(M, config, false)?;
            remote(
                M,
                iface.connect(
                    args.peer,
                    args.provision_method,
                    &args.pre_selected_pin,
                    join_existing_group,
                    args.persistent,
                    args.go_intent,
                ),
            )
        })
    }

    fn provision_discovery(&self, config: &P2pConfig) -> HalResult<()> {
        const M: &str = "provisionDiscovery";
        self.with_iface(M, |iface| {
            let method = params::provision_discovery_method(M, config.wps)?;
            let peer = params::parse_peer(M, &config.device_address)?;
            remote(M, iface.provision_discovery(peer, method))
        })
    }

    fn reinvoke(&self, network_id: i32, peer: &str, _dik_id: i32) -> HalResult<()> {
        const M: &str = "reinvoke";
        self.with_iface(M, |iface| {
            params::require_non_empty(M, "peer address", peer)?;
            params::require_non_negative(M, "network id", network_id)?;
            let peer = params::parse_peer(M, peer)?;
            remote(M, iface.reinvoke(network_id, peer))
        })
    }

    fn group_add(&self, network_id: i32, persistent: bool, _p2p_v2: bool) -> HalResult<()> {
        const M: &str = "groupAdd";
        self.with_iface(M, |iface| remote(M, iface.add_group(persistent, network_id)))
    }

    fn group_add_with_config(
        &self,
        network_name: &str,
        passphrase: &str,
        _connection_type: GroupConnectionType,
        persistent: bool,
        frequency: i32,
        peer: &str,
        join: bool,
    ) -> HalResult<()> {
        const M: &str = "groupAdd";
        self.with_gated_iface(M, supplicant_hidl::GROUP_ADD_WITH_CONFIG, |iface| {
            let peer = params::parse_peer(M, peer)?;
            let ssid = Ssid::decode(&format!("\"{network_name}\"")).map_err(|err| params::invalid(M, err))?;
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
        _params: Option<&ExtListenParams>,
    ) -> HalResult<()> {
        const M: &str = "configureExtListen";
        self.with_iface(M, |iface| {
            let (period_ms, interval_ms) = params::ext_listen_timing(M, enable, period_ms, interval_ms)?;
            remote(M, iface.configure_ext_listen(period_ms, interval_ms))
        })
    }

    fn set_wfd_r2_device_info(&self, hex: &str) -> HalResult<()> {
        const M: &str = "setWfdR2DeviceInfo";
        self.with_gated_iface(M, supplicant_hidl::WFD_R2_DEVICE_INFO, |iface| {
            let info = params::hex_payload(M, hex)?;
            remote(M, iface.set_wfd_r2_device_info(&info))
        })
    }

    fn set_mac_randomization(&self, enable: bool) -> HalResult<()> {
        const M: &str = "setMacRandomization";
        self.with_gated_iface(M, supplicant_hidl::MAC_RANDOMIZATION, |iface| {
            remote(M, iface.set_mac_randomization(enable))
        })
    }

    fn remove_client(&self, _peer: &str, _is_legacy_client: bool) -> HalResult<()> {
        Err(HalError::invalid("removeClient", "not supported by the HIDL interface"))
    }

    fn set_vendor_elements(&self, _elements: &[InformationElement]) -> HalResult<()> {
        Err(HalError::invalid("setVendorElements", "not supported by the HIDL interface"))
    }

    fn get_supported_features(&self) -> HalResult<u64> {
        Ok(0)
    }

    fn configure_eapol_ip_address_allocation_params(
        &self,
        _ip_address_go: i32,
        _ip_address_mask: i32,
        _ip_address_start: i32,
        _ip_address_end: i32,
    ) -> HalResult<()> {
        Err(HalError::invalid(
            "configureEapolIpAddressAllocationParams",
            "not supported by the HIDL interface",
        ))
    }

    fn authorize_connect_request_on_group_owner(&self, _config: &P2pConfig, _group_ifname: &str) -> HalResult<()> {
        Err(HalError::invalid(
            "authorizeConnectRequestOnGroupOwner",
            "not supported by the HIDL interface",
        ))
    }
}
