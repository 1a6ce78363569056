//! Hostapd proxy over the versioned interface.
//!
//! The daemon is started on demand by resolving it from the registry. Every
//! start links a new death generation, so a death notification left over from
//! an earlier instance is ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::config::{HalConfig, SoftApOverlay};
use crate::death::{DeathHandler, DeathMonitor, WeakRecipient};
use crate::error::{HalError, HalResult};
use crate::hostapd::params::{self, ParamsContext};
use crate::hostapd::{ApRegistry, FailureListener, HostapdEventAdapter, HostapdIfaceHal, SoftApHalCallback};
use crate::p2p::remote;
use crate::rpc::aidl::{self, ServiceRegistry};
use crate::rpc::{DebugLevel, HalServices};
use crate::types::{MacAddress, SapClientBlockReason, SoftApConfig};
use crate::version::hostapd_aidl;

const TAG: &str = "hostapd-aidl";

#[derive(Default)]
struct State {
    hostapd: Option<Arc<dyn aidl::Hostapd>>,
    version: Option<i32>,
    cookie: u64,
}

pub struct HostapdAidl {
    me: Weak<Self>,
    registry: Arc<dyn ServiceRegistry>,
    instance: String,
    overlay: SoftApOverlay,
    verbose: bool,
    aps: Arc<ApRegistry>,
    state: Mutex<State>,
    declared: AtomicBool,
    death: DeathMonitor,
}

impl HostapdAidl {
    pub fn new(services: &HalServices, aps: Arc<ApRegistry>, config: &HalConfig) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            registry: services.registry.clone(),
            instance: aidl::instance_name(aidl::HOSTAPD_DESCRIPTOR, &config.hal_instance_name),
            overlay: config.softap.clone(),
            verbose: config.verbose_logging,
            aps,
            state: Mutex::new(State::default()),
            declared: AtomicBool::new(false),
            death: DeathMonitor::new(TAG, config.wait_for_death_timeout()),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("hostapd-aidl state mutex poisoned")
    }

    /// Interface version of the running daemon, if one is connected.
    pub fn service_version(&self) -> Option<i32> {
        self.state().version
    }

    fn with_hostapd<T>(&self, method: &str, op: impl FnOnce(&dyn aidl::Hostapd, i32) -> HalResult<T>) -> HalResult<T> {
        let (hostapd, version, cookie) = {
            let state = self.state();
            let hostapd = state
                .hostapd
                .clone()
                .ok_or_else(|| HalError::not_initialized(method, "hostapd"))?;
            (hostapd, state.version.unwrap_or(-1), state.cookie)
        };
        let result = op(hostapd.as_ref(), version);
        if let Err(err) = &result {
            if err.is_transport() {
                self.service_died(cookie);
            }
        }
        result
    }

    fn service_died(&self, cookie: u64) {
        let Some(ticket) = self.death.claim(Some(cookie)) else {
            return;
        };
        log::warn!("{TAG}: hostapd died (cookie {cookie})");
        self.state().hostapd = None;
        ticket.finish();
    }

    fn clear_handle(&self) {
        self.state().hostapd = None;
    }

    fn debug_level(verbose: bool) -> DebugLevel {
        if verbose {
            DebugLevel::Debug
        } else {
            DebugLevel::Info
        }
    }
}

impl HostapdIfaceHal for HostapdAidl {
    fn initialize(&self) -> bool {
        let declared = self.registry.is_declared(&self.instance);
        if !declared {
            log::error!("{TAG}: {} is not declared", self.instance);
        }
        self.declared.store(declared, Ordering::SeqCst);
        declared
    }

    fn is_initialization_started(&self) -> bool {
        self.declared.load(Ordering::SeqCst)
    }

    fn is_initialization_complete(&self) -> bool {
        self.state().hostapd.is_some()
    }

    fn start_daemon(&self) -> HalResult<()> {
        const M: &str = "startDaemon";
        let hostapd = self
            .registry
            .hostapd(&self.instance)
            .ok_or_else(|| HalError::not_initialized(M, "hostapd"))?;
        let cookie = self.death.link();
        let version = match remote("getInterfaceVersion", hostapd.interface_version()) {
            Ok(version) => version,
            Err(err) => {
                if err.is_transport() {
                    self.service_died(cookie);
                }
                return Err(err);
            }
        };
        log::info!("{TAG}: hostapd interface version {version}");

        {
            let mut state = self.state();
            state.hostapd = Some(hostapd.clone());
            state.version = Some(version);
            state.cookie = cookie;
        }
        let recipient = Arc::new(WeakRecipient::new(self.me.clone(), Self::service_died));
        if let Err(err) = remote("linkToDeath", hostapd.link_to_death(recipient, cookie)) {
            self.clear_handle();
            return Err(err);
        }

        self.with_hostapd(M, |hostapd, _| {
            remote("setDebugParams", hostapd.set_debug_params(Self::debug_level(self.verbose)))
        })?;

        let adapter = Arc::new(HostapdEventAdapter::new(
            Arc::downgrade(&self.aps),
            hostapd_aidl::VENDOR_DATA.supported_by(version),
            hostapd_aidl::DISCONNECT_REASON.supported_by(version),
        ));
        if let Err(err) = remote("registerCallback", hostapd.register_callback(adapter)) {
            self.clear_handle();
            return Err(err);
        }
        log::info!("{TAG}: hostapd started");
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
            self.service_died(cookie);
        }
    }

    fn register_death_handler(&self, handler: Arc<dyn DeathHandler>) -> bool {
        self.death.register(handler);
        true
    }

    fn deregister_death_handler(&self) -> bool {
        self.death.deregister()
    }

    fn register_ap_callback(&self, iface_name: &str, callback: Arc<dyn SoftApHalCallback>) -> HalResult<()> {
        self.aps.set_callback(iface_name, callback);
        Ok(())
    }

    fn add_access_point(
        &self,
        iface_name: &str,
        config: &SoftApConfig,
        metered: bool,
        uses_mlo: bool,
        instance_identities: &[String],
        on_failure: FailureListener,
    ) -> HalResult<()> {
        const M: &str = "addAccessPoint";
        self.with_hostapd(M, |hostapd, version| {
            let ctx = ParamsContext {
                overlay: &self.overlay,
                metered,
                uses_mlo,
                vendor_data_supported: hostapd_aidl::VENDOR_DATA.supported_by(version),
                client_isolation_supported: hostapd_aidl::CLIENT_ISOLATION.supported_by(version),
            };
            let iface = params::iface_params(M, iface_name, config, instance_identities, &ctx)?;
            let network = params::network_params(M, config, &ctx)?;
            remote(M, hostapd.add_access_point(&iface, &network))
        })?;
        self.aps.set_listener(iface_name, on_failure);
        log::info!("{TAG}: added access point {iface_name}");
        Ok(())
    }

    fn remove_access_point(&self, iface_name: &str) -> HalResult<()> {
        const M: &str = "removeAccessPoint";
        self.with_hostapd(M, |hostapd, _| {
            self.aps.remove(iface_name);
            remote(M, hostapd.remove_access_point(iface_name))
        })
    }

    fn force_client_disconnect(
        &self,
        iface_name: &str,
        client: MacAddress,
        reason: SapClientBlockReason,
    ) -> HalResult<()> {
        const M: &str = "forceClientDisconnect";
        self.with_hostapd(M, |hostapd, _| {
            let code = params::disconnect_reason(M, reason)?;
            remote(M, hostapd.force_client_disconnect(iface_name, client.octets(), code))
        })
    }

    fn remove_link_from_multiple_link_bridged_ap_iface(&self, iface_name: &str, instance: &str) -> HalResult<()> {
        const M: &str = "removeLinkFromMultipleLinkBridgedApIface";
        self.with_hostapd(M, |hostapd, version| {
            hostapd_aidl::REMOVE_LINK.require(M, version)?;
            remote(M, hostapd.remove_link_from_multiple_link_bridged_ap_iface(iface_name, instance))
        })
    }

    fn set_debug_params(&self, verbose: bool) -> HalResult<()> {
        const M: &str = "setDebugParams";
        self.with_hostapd(M, |hostapd, _| remote(M, hostapd.set_debug_params(Self::debug_level(verbose))))
    }

    fn is_ap_info_callback_supported(&self) -> bool {
        true
    }
}
