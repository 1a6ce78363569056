//! Startup helper that brings a P2P interface up on top of [`SupplicantP2pHal`].

use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use crate::death::DeathHandler;
use crate::p2p::SupplicantP2pHal;
use crate::settings::{SettingsStore, SUPPLICANT_HAL_AIDL_SERVICE_VERSION, WIFI_P2P_SUPPORTED_FEATURES};
use crate::types::features;

const TAG: &str = "p2p-native";

pub struct P2pNative {
    hal: Arc<SupplicantP2pHal>,
    settings: Arc<dyn SettingsStore>,
    features: OnceLock<u64>,
    iface_name: Mutex<Option<String>>,
}

impl P2pNative {
    pub fn new(hal: Arc<SupplicantP2pHal>) -> Self {
        let settings = hal.services().settings.clone();
        Self {
            hal,
            settings,
            features: OnceLock::new(),
            iface_name: Mutex::new(None),
        }
    }

    pub fn hal(&self) -> &Arc<SupplicantP2pHal> {
        &self.hal
    }

    pub fn iface_name(&self) -> Option<String> {
        self.iface_name.lock().expect("p2p-native mutex poisoned").clone()
    }

    /// Starts initialization if needed and polls until the supplicant is
    /// connected or the configured number of samples is exhausted.
    pub fn wait_for_supplicant_connection(&self) -> bool {
        if !self.hal.is_initialization_started() && !self.hal.initialize() {
            return false;
        }
        let config = self.hal.config();
        for _ in 0..config.max_poll_samples {
            if self.hal.is_initialization_complete() {
                return true;
            }
            thread::sleep(config.poll_interval());
        }
        false
    }

    /// Sets up `iface_name` in the supplicant and caches the feature set.
    ///
    /// Returns the interface name, or `None` after tearing down whatever was
    /// already set up.
    pub fn setup_interface(&self, iface_name: &str, handler: Arc<dyn DeathHandler>) -> Option<String> {
        if let Some(existing) = self.iface_name() {
            log::info!("{TAG}: p2p interface {existing} already exists");
            return Some(existing);
        }
        if !self.wait_for_supplicant_connection() {
            log::error!("{TAG}: failed to connect to supplicant");
            self.teardown_interface();
            return None;
        }
        *self.iface_name.lock().expect("p2p-native mutex poisoned") = Some(iface_name.to_string());
        if !self.hal.setup_iface(iface_name) {
            log::error!("{TAG}: failed to set up {iface_name} in supplicant");
            self.teardown_interface();
            return None;
        }
        if !self.hal.register_death_handler(handler) {
            log::error!("{TAG}: failed to register supplicant death handler");
            self.teardown_interface();
            return None;
        }

        let hal_features = self.hal.get_supported_features();
        if let Err(err) = self.settings.put_int(WIFI_P2P_SUPPORTED_FEATURES, hal_features as i64) {
            log::warn!("{TAG}: failed to persist supported features: {err}");
        }
        let cached = *self
            .features
            .get_or_init(|| hal_features | self.driver_independent_features());
        log::info!("{TAG}: p2p supported features {cached:#x}");
        log::info!("{TAG}: p2p interface setup completed");
        Some(iface_name.to_string())
    }

    pub fn teardown_interface(&self) {
        let Some(iface_name) = self.iface_name.lock().expect("p2p-native mutex poisoned").take() else {
            log::debug!("{TAG}: no p2p interface to tear down");
            return;
        };
        log::info!("{TAG}: tearing down p2p interface {iface_name}");
        if !self.hal.teardown_iface(&iface_name) {
            log::warn!("{TAG}: failed to tear down {iface_name} in supplicant");
        }
        self.hal.deregister_death_handler();
        self.stop_p2p_supplicant_if_necessary();
    }

    pub fn stop_p2p_supplicant_if_necessary(&self) {
        if self.hal.is_initialization_started() {
            self.hal.terminate();
        }
    }

    /// Framework feature bits, available whether or not the interface is up.
    ///
    /// Before the first setup this is the persisted HAL feature set plus
    /// what the persisted service version implies.
    pub fn supported_features(&self) -> u64 {
        if let Some(cached) = self.features.get() {
            return *cached;
        }
        let persisted = self
            .settings
            .get_int(WIFI_P2P_SUPPORTED_FEATURES)
            .map_or(0, |value| value as u64);
        persisted | self.driver_independent_features()
    }

    pub fn is_wifi_direct_r2_supported(&self) -> bool {
        self.supported_features() & features::WIFI_DIRECT_R2 != 0
    }

    pub fn is_pcc_mode_allow_legacy_and_r2_supported(&self) -> bool {
        self.supported_features() & features::PCC_MODE_ALLOW_LEGACY_AND_R2_CONNECTION != 0
    }

    fn driver_independent_features(&self) -> u64 {
        let version = self.settings.get_int(SUPPLICANT_HAL_AIDL_SERVICE_VERSION).unwrap_or(-1);
        let mut out = 0;
        if version >= 1 {
            out |= features::SET_VENDOR_ELEMENTS | features::FLEXIBLE_DISCOVERY | features::GROUP_CLIENT_REMOVAL;
        }
        if version >= 2 {
            out |= features::GROUP_OWNER_IPV6_LINK_LOCAL_ADDRESS_PROVIDED;
        }
        out
    }
}
