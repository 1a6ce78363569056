//! Hostapd proxy over the legacy 1.x interface.
//!
//! Like the legacy supplicant, hostapd is connected when it announces itself
//! to the service manager. What the connection can do depends on the minor
//! version: 1.1 reports failures, 1.2 adds forced disconnects and debug
//! params, 1.3 adds instance info and client events.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::config::{HalConfig, SoftApOverlay};
use crate::death::{DeathHandler, DeathMonitor, WeakRecipient};
use crate::error::{HalError, HalResult};
use crate::hostapd::params::{self, ParamsContext};
use crate::hostapd::{ApRegistry, FailureListener, HostapdEventAdapter, HostapdIfaceHal, SoftApHalCallback};
use crate::p2p::remote;
use crate::rpc::hidl::{self, HidlServices, ServiceManager, ServiceNotification, HOSTAPD_FQ_NAME};
use crate::rpc::{DebugLevel, HalServices};
use crate::types::{MacAddress, SapClientBlockReason, SoftApConfig};
use crate::version::hostapd_hidl;

const TAG: &str = "hostapd-hidl";

#[derive(Default)]
struct State {
    service_manager: Option<Arc<dyn ServiceManager>>,
    hostapd: Option<Arc<dyn hidl::Hostapd>>,
    cookie: u64,
}

pub struct HostapdHidl {
    me: Weak<Self>,
    services: Arc<dyn HidlServices>,
    overlay: SoftApOverlay,
    verbose: bool,
    aps: Arc<ApRegistry>,
    state: Mutex<State>,
    death: DeathMonitor,
}

struct Registration {
    proxy: Weak<HostapdHidl>,
}

impl ServiceNotification for Registration {
    fn on_registration(&self, fq_name: &str, instance: &str, preexisting: bool) {
        log::info!("{TAG}: {fq_name}/{instance} registered (preexisting: {preexisting})");
        if let Some(proxy) = self.proxy.upgrade() {
            proxy.connect_hostapd();
        }
    }
}

impl HostapdHidl {
    pub fn new(services: &HalServices, aps: Arc<ApRegistry>, config: &HalConfig) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            services: services.hidl.clone(),
            overlay: config.softap.clone(),
            verbose: config.verbose_logging,
            aps,
            state: Mutex::new(State::default()),
            death: DeathMonitor::new(TAG, config.wait_for_death_timeout()),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("hostapd-hidl state mutex poisoned")
    }

    fn with_hostapd<T>(&self, method: &str, op: impl FnOnce(&dyn hidl::Hostapd, i32) -> HalResult<T>) -> HalResult<T> {
        let (hostapd, cookie) = {
            let state = self.state();
            let hostapd = state
                .hostapd
                .clone()
                .ok_or_else(|| HalError::not_initialized(method, "hostapd"))?;
            (hostapd, state.cookie)
        };
        let minor = hostapd.minor_version() as i32;
        let result = op(hostapd.as_ref(), minor);
        if let Err(err) = &result {
            if err.is_transport() {
                self.service_died(Some(cookie));
            }
        }
        result
    }

    fn connect_hostapd(&self) {
        if self.state().service_manager.is_none() {
            log::error!("{TAG}: hostapd registered without a service manager");
            return;
        }
        let Some(hostapd) = self.services.hostapd() else {
            log::error!("{TAG}: got null hostapd service");
            return;
        };
        let cookie = self.death.link();
        {
            let mut state = self.state();
            state.hostapd = Some(hostapd.clone());
            state.cookie = cookie;
        }
        let recipient = Arc::new(WeakRecipient::new(self.me.clone(), |proxy: &Self, cookie| {
            proxy.service_died(Some(cookie))
        }));
        if let Err(err) = hostapd.link_to_death(recipient, cookie) {
            log::error!("{TAG}: failed to link to hostapd death: {err}");
            self.service_died(Some(cookie));
            return;
        }

        let minor = hostapd.minor_version() as i32;
        let adapter = Arc::new(HostapdEventAdapter::new(Arc::downgrade(&self.aps), false, false));
        let registered = if hostapd_hidl::AP_INFO_CALLBACK.supported_by(minor) {
            remote("registerCallback_1_3", hostapd.register_callback_1_3(adapter))
        } else if hostapd_hidl::FAILURE_CALLBACK.supported_by(minor) {
            remote("registerCallback", hostapd.register_callback(adapter))
        } else {
            Ok(())
        };
        if let Err(err) = registered {
            log::error!("{TAG}: {err}");
            self.service_died(Some(cookie));
            return;
        }
        if let Err(err) = self.set_debug_params(self.verbose) {
            log::warn!("{TAG}: {err}");
        }
        log::info!("{TAG}: connected to hostapd 1.{minor}");
    }

    fn service_died(&self, cookie: Option<u64>) {
        let Some(ticket) = self.death.claim(cookie) else {
            return;
        };
        log::warn!("{TAG}: hostapd died");
        self.state().hostapd = None;
        ticket.finish();
    }

    fn service_manager_died(&self, _cookie: u64) {
        log::warn!("{TAG}: service manager died");
        self.service_died(None);
        self.state().service_manager = None;
    }
}

impl HostapdIfaceHal for HostapdHidl {
    fn initialize(&self) -> bool {
        if self.state().service_manager.is_some() {
            log::info!("{TAG}: service is already initialized");
            return true;
        }
        self.state().hostapd = None;
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
        match manager.register_for_notifications(HOSTAPD_FQ_NAME, "", notification) {
            Ok(true) => true,
            Ok(false) => {
                log::error!("{TAG}: failed to register for hostapd notifications");
                self.state().service_manager = None;
                false
            }
            Err(err) => {
                log::error!("{TAG}: failed to register for hostapd notifications: {err}");
                self.state().service_manager = None;
                false
            }
        }
    }

    fn is_initialization_started(&self) -> bool {
        self.state().service_manager.is_some()
    }

    fn is_initialization_complete(&self) -> bool {
        self.state().hostapd.is_some()
    }

    /// Fetching the service starts the lazy daemon; the connection itself
    /// arrives through the registration notification.
    fn start_daemon(&self) -> HalResult<()> {
        if self.services.hostapd().is_none() {
            log::debug!("{TAG}: hostapd not yet available after start request");
        }
        Ok(())
    }

    fn terminate(&self) {
        let snapshot = {
            let state = self.state();
            state.hostapd.clone().map(|hostapd| (hostapd, state.cookie))
        };
        let Some((hostapd, cookie)) = snapshot else {
            log::error!("{TAG}: can't call terminate, hostapd is null");
            return;
        };
        log::info!("{TAG}: terminating hostapd");
        let latch = self.death.arm();
        if let Err(err) = hostapd.terminate() {
            log::debug!("{TAG}: terminate returned {err}");
        }
        if !latch.wait() {
            log::warn!("{TAG}: timed out waiting for confirmation of hostapd death");
            self.service_died(Some(cookie));
        }
    }

    fn register_death_handler(&self, handler: Arc<dyn DeathHandler>) -> bool {
        self.death.register(handler);
        true
    }

    fn deregister_death_handler(&self) -> bool {
        self.death.deregister();
        true
    }

    fn register_ap_callback(&self, iface_name: &str, callback: Arc<dyn SoftApHalCallback>) -> HalResult<()> {
        const M: &str = "registerApCallback";
        self.with_hostapd(M, |_, minor| hostapd_hidl::AP_INFO_CALLBACK.require(M, minor))?;
        self.aps.set_callback(iface_name, callback);
        Ok(())
    }

    fn add_access_point(
        &self,
        iface_name: &str,
        config: &SoftApConfig,
        metered: bool,
        _uses_mlo: bool,
        instance_identities: &[String],
        on_failure: FailureListener,
    ) -> HalResult<()> {
        const M: &str = "addAccessPoint";
        self.with_hostapd(M, |hostapd, minor| {
            let ctx = ParamsContext {
                overlay: &self.overlay,
                metered: metered && minor >= 3,
                uses_mlo: false,
                vendor_data_supported: false,
                client_isolation_supported: false,
            };
            let iface = params::iface_params(M, iface_name, config, instance_identities, &ctx)?;
            let network = params::network_params(M, config, &ctx)?;
            let added = match minor {
                0 => hostapd.add_access_point(&iface, &network),
                1 => hostapd.add_access_point_1_1(&iface, &network),
                2 => hostapd.add_access_point_1_2(&iface, &network),
                _ => hostapd.add_access_point_1_3(&iface, &network),
            };
            remote(M, added)
        })?;
        self.aps.set_listener(iface_name, on_failure);
        log::info!("{TAG}: added access point {iface_name}");
        Ok(())
    }

    fn remove_access_point(&self, iface_name: &str) -> HalResult<()> {
        const M: &str = "removeAccessPoint";
        self.with_hostapd(M, |hostapd, _| remote(M, hostapd.remove_access_point(iface_name)))?;
        self.aps.remove(iface_name);
        Ok(())
    }

    fn force_client_disconnect(
        &self,
        iface_name: &str,
        client: MacAddress,
        reason: SapClientBlockReason,
    ) -> HalResult<()> {
        const M: &str = "forceClientDisconnect";
        self.with_hostapd(M, |hostapd, minor| {
            hostapd_hidl::FORCE_CLIENT_DISCONNECT.require(M, minor)?;
            let code = params::disconnect_reason(M, reason)?;
            remote(M, hostapd.force_client_disconnect(iface_name, client.octets(), code))
        })
    }

    fn remove_link_from_multiple_link_bridged_ap_iface(&self, _iface_name: &str, _instance: &str) -> HalResult<()> {
        Err(HalError::invalid(
            "removeLinkFromMultipleLinkBridgedApIface",
            "not supported by the HIDL interface",
        ))
    }

    fn set_debug_params(&self, verbose: bool) -> HalResult<()> {
        const M: &str = "setDebugParams";
        self.with_hostapd(M, |hostapd, minor| {
            hostapd_hidl::DEBUG_PARAMS.require(M, minor)?;
            let level = if verbose { DebugLevel::Debug } else { DebugLevel::Info };
            remote(M, hostapd.set_debug_params(level))
        })
    }

    fn is_ap_info_callback_supported(&self) -> bool {
        self.state()
            .hostapd
            .as_ref()
            .is_some_and(|hostapd| hostapd_hidl::AP_INFO_CALLBACK.supported_by(hostapd.minor_version() as i32))
    }
}
