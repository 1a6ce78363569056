//! Hostapd (SoftAP) HAL proxies.
//!
//! The layout mirrors [`crate::p2p`]: one proxy per transport generation, a
//! [`HostapdBackend`] chosen on first `initialize`, and a [`HostapdHal`]
//! facade that collapses every failure to `false` after logging it.
//!
//! Per-interface state (failure listeners, SoftAP callbacks, active bridged
//! instances) lives in an [`ApRegistry`] shared with the event adapter. It is
//! only changed by `add_access_point`, `register_ap_callback` and
//! `remove_access_point`; a daemon death leaves it untouched.

pub mod aidl;
pub mod callback;
pub mod hidl;
pub mod params;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::config::HalConfig;
use crate::death::DeathHandler;
use crate::error::HalResult;
use crate::rpc::{self, HalServices};
use crate::types::{ApInstanceInfo, ClientDisconnectReason, MacAddress, SapClientBlockReason, SoftApConfig};

pub use aidl::HostapdAidl;
pub use callback::HostapdEventAdapter;
pub use hidl::HostapdHidl;

pub use crate::p2p::HalTransport;

/// Runs when a single-instance AP fails.
pub type FailureListener = Arc<dyn Fn() + Send + Sync>;

/// Framework-side receiver of SoftAP events for one interface.
pub trait SoftApHalCallback: Send + Sync {
    fn on_info_changed(&self, info: &ApInstanceInfo);
    fn on_connected_clients_changed(
        &self,
        instance: &str,
        client: MacAddress,
        connected: bool,
        reason: ClientDisconnectReason,
    );
    /// One instance of a bridged AP failed; the other keeps running.
    fn on_instance_failure(&self, instance: &str);
}

#[derive(Default)]
struct RegistryState {
    listeners: HashMap<String, FailureListener>,
    callbacks: HashMap<String, Arc<dyn SoftApHalCallback>>,
    active_instances: HashSet<String>,
}

/// Listener and callback map keyed by AP interface name.
#[derive(Default)]
pub struct ApRegistry {
    state: Mutex<RegistryState>,
}

impl ApRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().expect("ap registry mutex poisoned")
    }

    pub fn set_listener(&self, iface_name: &str, listener: FailureListener) {
        self.state().listeners.insert(iface_name.to_string(), listener);
    }

    pub fn set_callback(&self, iface_name: &str, callback: Arc<dyn SoftApHalCallback>) {
        self.state().callbacks.insert(iface_name.to_string(), callback);
    }

    pub fn listener(&self, iface_name: &str) -> Option<FailureListener> {
        self.state().listeners.get(iface_name).cloned()
    }

    pub fn callback(&self, iface_name: &str) -> Option<Arc<dyn SoftApHalCallback>> {
        self.state().callbacks.get(iface_name).cloned()
    }

    /// Drops the listener and callback of `iface_name`.
    pub fn remove(&self, iface_name: &str) {
        let mut state = self.state();
        state.listeners.remove(iface_name);
        state.callbacks.remove(iface_name);
    }

    pub fn mark_active(&self, instance: &str) {
        self.state().active_instances.insert(instance.to_string());
    }

    pub fn is_active(&self, instance: &str) -> bool {
        self.state().active_instances.contains(instance)
    }

    /// Removes `instance` from the active set, returning whether it was there.
    pub fn deactivate(&self, instance: &str) -> bool {
        self.state().active_instances.remove(instance)
    }
}

// ── Backend trait ──────────────────────────────────────────────────────────

/// Operations of one hostapd connection.
pub trait HostapdIfaceHal: Send + Sync {
    fn initialize(&self) -> bool;
    fn is_initialization_started(&self) -> bool;
    fn is_initialization_complete(&self) -> bool;
    fn start_daemon(&self) -> HalResult<()>;
    fn terminate(&self);
    fn register_death_handler(&self, handler: Arc<dyn DeathHandler>) -> bool;
    fn deregister_death_handler(&self) -> bool;
    fn register_ap_callback(&self, iface_name: &str, callback: Arc<dyn SoftApHalCallback>) -> HalResult<()>;
    #[allow(clippy::too_many_arguments)]
    fn add_access_point(
        &self,
        iface_name: &str,
        config: &SoftApConfig,
        metered: bool,
        uses_mlo: bool,
        instance_identities: &[String],
        on_failure: FailureListener,
    ) -> HalResult<()>;
    fn remove_access_point(&self, iface_name: &str) -> HalResult<()>;
    fn force_client_disconnect(&self, iface_name: &str, client: MacAddress, reason: SapClientBlockReason)
        -> HalResult<()>;
    fn remove_link_from_multiple_link_bridged_ap_iface(&self, iface_name: &str, instance: &str) -> HalResult<()>;
    fn set_debug_params(&self, verbose: bool) -> HalResult<()>;
    fn is_ap_info_callback_supported(&self) -> bool;
}

/// The selected hostapd backend.
#[derive(Clone)]
pub enum HostapdBackend {
    Aidl(Arc<HostapdAidl>),
    Hidl(Arc<HostapdHidl>),
}

impl HostapdBackend {
    /// Looks for a declared versioned service first, then for a legacy one.
    pub fn select(services: &HalServices, registry: &Arc<ApRegistry>, config: &HalConfig) -> Option<Self> {
        let instance = rpc::aidl::instance_name(rpc::aidl::HOSTAPD_DESCRIPTOR, &config.hal_instance_name);
        if services.registry.is_declared(&instance) {
            log::info!("hostapd: using AIDL hostapd ({instance})");
            return Some(Self::Aidl(HostapdAidl::new(services, registry.clone(), config)));
        }
        if hidl_declared(services, &config.hal_instance_name) {
            log::info!("hostapd: using HIDL hostapd");
            return Some(Self::Hidl(HostapdHidl::new(services, registry.clone(), config)));
        }
        log::error!("hostapd: no hostapd service is declared");
        None
    }

    pub fn transport(&self) -> HalTransport {
        match self {
            Self::Aidl(_) => HalTransport::Aidl,
            Self::Hidl(_) => HalTransport::Hidl,
        }
    }

    pub fn ops(&self) -> &dyn HostapdIfaceHal {
        match self {
            Self::Aidl(proxy) => proxy.as_ref(),
            Self::Hidl(proxy) => proxy.as_ref(),
        }
    }
}

fn hidl_declared(services: &HalServices, instance: &str) -> bool {
    let Some(manager) = services.hidl.service_manager() else {
        return false;
    };
    match manager.transport(rpc::hidl::HOSTAPD_FQ_NAME, instance) {
        Ok(transport) => transport != rpc::hidl::Transport::Empty,
        Err(err) => {
            log::error!("hostapd: failed to query HIDL transport: {err}");
            false
        }
    }
}

// ── Facade ─────────────────────────────────────────────────────────────────

/// Framework-facing hostapd HAL.
pub struct HostapdHal {
    services: HalServices,
    config: HalConfig,
    registry: Arc<ApRegistry>,
    backend: OnceLock<Option<HostapdBackend>>,
}

impl HostapdHal {
    pub fn new(services: HalServices, config: HalConfig) -> Self {
        Self {
            services,
            config,
            registry: Arc::new(ApRegistry::new()),
            backend: OnceLock::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ApRegistry> {
        &self.registry
    }

    pub fn backend(&self) -> Option<&HostapdBackend> {
        self.backend.get().and_then(Option::as_ref)
    }

    pub fn transport(&self) -> Option<HalTransport> {
        self.backend().map(HostapdBackend::transport)
    }

    fn run(&self, method: &str, op: impl FnOnce(&dyn HostapdIfaceHal) -> HalResult<()>) -> bool {
        let Some(backend) = self.backend() else {
            log::error!("Cannot call {method} because HAL object is null");
            return false;
        };
        match op(backend.ops()) {
            Ok(()) => true,
            Err(err) => {
                log::error!("hostapd: {err}");
                false
            }
        }
    }

    fn query(&self, method: &str, op: impl FnOnce(&dyn HostapdIfaceHal) -> bool) -> bool {
        match self.backend() {
            Some(backend) => op(backend.ops()),
            None => {
                log::error!("Cannot call {method} because HAL object is null");
                false
            }
        }
    }

    /// Selects the backend on first use and starts watching for the daemon.
    pub fn initialize(&self) -> bool {
        let selected = self
            .backend
            .get_or_init(|| HostapdBackend::select(&self.services, &self.registry, &self.config));
        match selected {
            Some(backend) => backend.ops().initialize(),
            None => {
                log::error!("Cannot call initialize because HAL object is null");
                false
            }
        }
    }

    pub fn is_initialization_started(&self) -> bool {
        self.query("isInitializationStarted", |b| b.is_initialization_started())
    }

    pub fn is_initialization_complete(&self) -> bool {
        self.query("isInitializationComplete", |b| b.is_initialization_complete())
    }

    pub fn start_daemon(&self) -> bool {
        self.run("startDaemon", |b| b.start_daemon())
    }

    pub fn terminate(&self) {
        self.run("terminate", |b| {
            b.terminate();
            Ok(())
        });
    }

    pub fn register_death_handler(&self, handler: Arc<dyn DeathHandler>) -> bool {
        self.query("registerDeathHandler", |b| b.register_death_handler(handler))
    }

    pub fn deregister_death_handler(&self) -> bool {
        self.query("deregisterDeathHandler", |b| b.deregister_death_handler())
    }

    pub fn register_ap_callback(&self, iface_name: &str, callback: Arc<dyn SoftApHalCallback>) -> bool {
        self.run("registerApCallback", |b| b.register_ap_callback(iface_name, callback))
    }

    pub fn add_access_point(
        &self,
        iface_name: &str,
        config: &SoftApConfig,
        metered: bool,
        uses_mlo: bool,
        instance_identities: &[String],
        on_failure: FailureListener,
    ) -> bool {
        self.run("addAccessPoint", |b| {
            b.add_access_point(iface_name, config, metered, uses_mlo, instance_identities, on_failure)
        })
    }

    pub fn remove_access_point(&self, iface_name: &str) -> bool {
        self.run("removeAccessPoint", |b| b.remove_access_point(iface_name))
    }

    pub fn force_client_disconnect(&self, iface_name: &str, client: MacAddress, reason: SapClientBlockReason) -> bool {
        self.run("forceClientDisconnect", |b| b.force_client_disconnect(iface_name, client, reason))
    }

    pub fn remove_link_from_multiple_link_bridged_ap_iface(&self, iface_name: &str, instance: &str) -> bool {
        self.run("removeLinkFromMultipleLinkBridgedApIface", |b| {
            b.remove_link_from_multiple_link_bridged_ap_iface(iface_name, instance)
        })
    }

    pub fn set_debug_params(&self, verbose: bool) -> bool {
        self.run("setDebugParams", |b| b.set_debug_params(verbose))
    }

    pub fn is_ap_info_callback_supported(&self) -> bool {
        self.query("isApInfoCallbackSupported", |b| b.is_ap_info_callback_supported())
    }
}
