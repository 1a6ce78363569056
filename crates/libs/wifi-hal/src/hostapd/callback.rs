//! Routes hostapd events to the per-interface listeners and callbacks.

use std::sync::{Arc, Weak};

use crate::hostapd::params::{bandwidth_from_hal, client_disconnect_reason, generation_from_hal};
use crate::hostapd::{ApRegistry, SoftApHalCallback};
use crate::rpc::aidl::{ApInfo, ClientInfo, HostapdCallback};
use crate::types::{ApInstanceInfo, ClientDisconnectReason, MacAddress};

const TAG: &str = "hostapd-events";

/// Receives events from one hostapd connection.
///
/// Holds the registry weakly; events arriving after the HAL is dropped are
/// discarded. Listeners and callbacks run with no lock held.
pub struct HostapdEventAdapter {
    registry: Weak<ApRegistry>,
    vendor_data: bool,
    disconnect_reason: bool,
}

impl HostapdEventAdapter {
    /// `vendor_data` and `disconnect_reason` say whether the remote fills
    /// those fields in.
    pub fn new(registry: Weak<ApRegistry>, vendor_data: bool, disconnect_reason: bool) -> Self {
        Self {
            registry,
            vendor_data,
            disconnect_reason,
        }
    }

    fn registry(&self) -> Option<Arc<ApRegistry>> {
        let registry = self.registry.upgrade();
        if registry.is_none() {
            log::debug!("{TAG}: event after the hostapd HAL was dropped");
        }
        registry
    }

    fn instance_info(&self, info: &ApInfo) -> Option<ApInstanceInfo> {
        let bssid = match MacAddress::from_bytes(&info.ap_iface_instance_mac_address) {
            Ok(bssid) => bssid,
            Err(err) => {
                log::error!("{TAG}: invalid instance address for {}: {err}", info.ap_iface_instance);
                return None;
            }
        };
        let mld_address = match info.mld_mac_address.as_deref().map(MacAddress::from_bytes).transpose() {
            Ok(address) => address,
            Err(err) => {
                log::error!("{TAG}: invalid MLD address for {}: {err}", info.ap_iface_instance);
                return None;
            }
        };
        Some(ApInstanceInfo {
            instance: info.ap_iface_instance.clone(),
            frequency: info.freq_mhz,
            bandwidth: bandwidth_from_hal(info.channel_bandwidth),
            generation: generation_from_hal(info.generation),
            bssid: Some(bssid),
            mld_address,
            vendor_data: if self.vendor_data {
                info.vendor_data.clone()
            } else {
                Vec::new()
            },
        })
    }
}

impl HostapdCallback for HostapdEventAdapter {
    fn on_failure(&self, iface_name: &str, instance_name: &str) {
        log::error!("{TAG}: failure on {iface_name} (instance {instance_name})");
        let Some(registry) = self.registry() else {
            return;
        };
        let Some(listener) = registry.listener(iface_name) else {
            log::warn!("{TAG}: no failure listener for {iface_name}");
            return;
        };
        if iface_name == instance_name {
            listener();
        } else if registry.is_active(instance_name) {
            match registry.callback(iface_name) {
                Some(callback) => callback.on_instance_failure(instance_name),
                None => log::warn!("{TAG}: no SoftAP callback for {iface_name}"),
            }
        } else {
            log::warn!("{TAG}: failure of unknown instance {instance_name} on {iface_name}");
        }
        registry.deactivate(instance_name);
    }

    fn on_ap_instance_info_changed(&self, info: &ApInfo) {
        log::debug!(
            "{TAG}: instance {} of {} on {} MHz",
            info.ap_iface_instance,
            info.iface_name,
            info.freq_mhz
        );
        let Some(registry) = self.registry() else {
            return;
        };
        let Some(instance_info) = self.instance_info(info) else {
            return;
        };
        registry.mark_active(&info.ap_iface_instance);
        match registry.callback(&info.iface_name) {
            Some(callback) => callback.on_info_changed(&instance_info),
            None => log::debug!("{TAG}: no SoftAP callback for {}", info.iface_name),
        }
    }

    fn on_connected_clients_changed(&self, info: &ClientInfo) {
        let Some(registry) = self.registry() else {
            return;
        };
        let client = match MacAddress::from_bytes(&info.client_address) {
            Ok(client) => client,
            Err(err) => {
                log::error!("{TAG}: invalid client address on {}: {err}", info.iface_name);
                return;
            }
        };
        let reason = if self.disconnect_reason && !info.is_connected {
            client_disconnect_reason(info.disconnect_reason_code)
        } else {
            ClientDisconnectReason::Unknown
        };
        log::debug!(
            "{TAG}: client {client} on {} connected={} reason={reason:?}",
            info.ap_iface_instance,
            info.is_connected
        );
        match registry.callback(&info.iface_name) {
            Some(callback) => {
                callback.on_connected_clients_changed(&info.ap_iface_instance, client, info.is_connected, reason)
            }
            None => log::debug!("{TAG}: no SoftAP callback for {}", info.iface_name),
        }
    }
}
