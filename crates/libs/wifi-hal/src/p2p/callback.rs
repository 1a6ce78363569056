//! Adapters that turn supplicant P2P callbacks into [`P2pEvent`]s.
//!
//! Both interface generations funnel into [`EventDecoder`]. A payload that
//! cannot be decoded is logged and dropped; it never reaches the monitor.

use std::sync::Arc;

use crate::codec::{self, wps_config_methods, VENDOR_SPECIFIC_IE_ID};
use crate::p2p::events::{P2pEvent, P2pMonitor, ProvDiscEvent, ProvDiscKind};
use crate::rpc::{
    aidl, hidl, key_mgmt, p2p_status, prov_disc_status, wps_dev_password_id, DeviceFoundParams,
    GoNegotiationReqParams, GroupStartedParams, InvitationParams, PeerClientParams,
    ProvisionDiscoveryParams,
};
use crate::types::{
    pairing, remove_enclosing_quotes, ClientEapolIpInfo, GroupSecurity, MacAddress, OuiKeyedData,
    P2pConfig, P2pDevice, P2pGroup, P2pStatus, ProvDiscStatus, Ssid, WpsSetup,
    NETWORK_ID_PERSISTENT, NETWORK_ID_TEMPORARY,
};
use crate::version::supplicant_aidl;

/// Which optional fields of a payload the calling variant defines.
#[derive(Clone, Copy, Debug, Default)]
struct Scope {
    wfd_r2: bool,
    vendor_elements: bool,
    vendor_data: bool,
    pairing: bool,
    key_mgmt: bool,
    extended_group: bool,
}

impl Scope {
    const LEGACY: Scope = Scope {
        wfd_r2: false,
        vendor_elements: false,
        vendor_data: false,
        pairing: false,
        key_mgmt: false,
        extended_group: false,
    };
}

pub fn p2p_status_from_hal(status: i32) -> P2pStatus {
    match status {
        p2p_status::SUCCESS | p2p_status::SUCCESS_DEFERRED => P2pStatus::Success,
        p2p_status::FAIL_INFO_CURRENTLY_UNAVAILABLE => P2pStatus::InformationIsCurrentlyUnavailable,
        p2p_status::FAIL_INCOMPATIBLE_PARAMS => P2pStatus::IncompatibleParameters,
        p2p_status::FAIL_LIMIT_REACHED => P2pStatus::LimitReached,
        p2p_status::FAIL_INVALID_PARAMS => P2pStatus::InvalidParameter,
        p2p_status::FAIL_UNABLE_TO_ACCOMMODATE => P2pStatus::UnableToAccommodateRequest,
        p2p_status::FAIL_PREV_PROTOCOL_ERROR => P2pStatus::PreviousProtocolError,
        p2p_status::FAIL_NO_COMMON_CHANNELS => P2pStatus::NoCommonChannel,
        p2p_status::FAIL_UNKNOWN_P2P_GROUP => P2pStatus::UnknownP2pGroup,
        p2p_status::FAIL_BOTH_GO_INTENT_15 => P2pStatus::BothGoIntent15,
        p2p_status::FAIL_INCOMPATIBLE_PROV_METHOD => P2pStatus::IncompatibleProvisioningMethod,
        p2p_status::FAIL_REJECTED_BY_USER => P2pStatus::RejectedByUser,
        _ => P2pStatus::Unknown,
    }
}

pub fn prov_disc_status_from_hal(status: i32) -> ProvDiscStatus {
    match status {
        prov_disc_status::SUCCESS => ProvDiscStatus::Success,
        prov_disc_status::TIMEOUT => ProvDiscStatus::Timeout,
        prov_disc_status::REJECTED => ProvDiscStatus::Rejected,
        prov_disc_status::TIMEOUT_JOIN => ProvDiscStatus::TimeoutJoin,
        prov_disc_status::INFO_UNAVAILABLE => ProvDiscStatus::InfoUnavailable,
        _ => ProvDiscStatus::Unknown,
    }
}

fn wps_setup_from_password_id(password_id: i32) -> WpsSetup {
    match password_id {
        wps_dev_password_id::USER_SPECIFIED => WpsSetup::Display,
        wps_dev_password_id::PUSHBUTTON => WpsSetup::Pbc,
        wps_dev_password_id::REGISTRAR_SPECIFIED => WpsSetup::Keypad,
        _ => WpsSetup::Pbc,
    }
}

/// Only an exact PSK or SAE mask names a single mode; extra AKM bits make it unknown.
fn group_security_from_key_mgmt(mask: i32) -> GroupSecurity {
    const BOTH: i32 = key_mgmt::WPA_PSK | key_mgmt::SAE;
    if mask == key_mgmt::WPA_PSK {
        GroupSecurity::Wpa2Psk
    } else if mask == key_mgmt::SAE {
        GroupSecurity::Wpa3Sae
    } else if mask & BOTH == BOTH {
        GroupSecurity::Wpa3Compatibility
    } else {
        GroupSecurity::Unknown
    }
}

/// Maps a HAL pairing bootstrapping bit back to the framework method; 0 if unknown.
fn pairing_method_from_hal(method: i32) -> i32 {
    match method {
        pairing::OPPORTUNISTIC
        | pairing::DISPLAY_PINCODE
        | pairing::DISPLAY_PASSPHRASE
        | pairing::KEYPAD_PINCODE
        | pairing::KEYPAD_PASSPHRASE
        | pairing::OUT_OF_BAND => method,
        _ => pairing::NONE,
    }
}

/// Keeps only the known bits of a pairing bootstrapping mask.
fn pairing_mask_from_hal(mask: i32) -> i32 {
    const KNOWN: i32 = pairing::OPPORTUNISTIC
        | pairing::DISPLAY_PINCODE
        | pairing::DISPLAY_PASSPHRASE
        | pairing::KEYPAD_PINCODE
        | pairing::KEYPAD_PASSPHRASE
        | pairing::OUT_OF_BAND;
    mask & KNOWN
}

/// Decodes callback payloads for one interface and forwards them to the monitor.
pub struct EventDecoder {
    iface: String,
    monitor: Arc<dyn P2pMonitor>,
}

impl EventDecoder {
    pub fn new(iface: impl Into<String>, monitor: Arc<dyn P2pMonitor>) -> Self {
        Self {
            iface: iface.into(),
            monitor,
        }
    }

    pub fn iface(&self) -> &str {
        &self.iface
    }

    fn emit(&self, event: P2pEvent) {
        self.monitor.broadcast(&self.iface, event);
    }

    fn mac(&self, what: &str, bytes: &[u8]) -> Option<MacAddress> {
        match MacAddress::from_bytes(bytes) {
            Ok(mac) => Some(mac),
            Err(err) => {
                log::error!("p2p-callback({}): could not decode {what}: {err}", self.iface);
                None
            }
        }
    }

    fn vendor_data(scope: Scope, data: &[OuiKeyedData]) -> Vec<OuiKeyedData> {
        if scope.vendor_data {
            data.to_vec()
        } else {
            Vec::new()
        }
    }

    fn device_found(&self, params: &DeviceFoundParams, scope: Scope) {
        let Some(name) = params.device_name.as_deref() else {
            log::error!("p2p-callback({}): missing device name", self.iface);
            return;
        };
        let Some(address) = self.mac("device address", &params.p2p_device_address) else {
            return;
        };
        let pairing_methods = if scope.pairing {
            pairing_mask_from_hal(params.pairing_bootstrapping_methods)
        } else {
            pairing::NONE
        };

        // A bootstrapping-capable device may omit its primary type.
        let primary_device_type = match codec::wps_device_type_to_string(&params.primary_device_type) {
            Ok(primary) => Some(primary),
            Err(err) if pairing_methods == pairing::NONE => {
                log::error!("p2p-callback({}): could not encode device primary type: {err}", self.iface);
                return;
            }
            Err(_) => None,
        };

        let r2 = params.wfd_r2_device_info.as_deref().filter(|_| scope.wfd_r2);
        let vendor_elements = if scope.vendor_elements {
            params
                .vendor_elem_bytes
                .as_deref()
                .map(codec::parse_information_elements)
                .unwrap_or_default()
                .into_iter()
                .filter(|ie| ie.id == VENDOR_SPECIFIC_IE_ID)
                .collect()
        } else {
            Vec::new()
        };

        log::debug!("p2p-callback({}): device found {name} {address}", self.iface);
        self.emit(P2pEvent::DeviceFound(P2pDevice {
            address,
            name: name.to_string(),
            primary_device_type,
            device_capability: params.device_capabilities,
            group_capability: params.group_capabilities,
            wps_config_methods: params.config_methods,
            wfd_info: codec::wfd_info_from_bytes(params.wfd_device_info.as_deref(), r2),
            vendor_elements,
            pairing_methods,
            interface_address: None,
            ip_address: None,
            vendor_data: Self::vendor_data(scope, &params.vendor_data),
        }));
    }

    fn device_lost(&self, p2p_device_address: &[u8]) {
        if let Some(address) = self.mac("device address", p2p_device_address) {
            self.emit(P2pEvent::DeviceLost(address));
        }
    }

    fn go_negotiation_request(&self, params: &GoNegotiationReqParams, scope: Scope) {
        let Some(address) = self.mac("source address", &params.src_address) else {
            return;
        };
        let config = P2pConfig::new(address.to_string())
            .with_wps(wps_setup_from_password_id(params.password_id), None)
            .with_vendor_data(Self::vendor_data(scope, &params.vendor_data));
        self.emit(P2pEvent::GoNegotiationRequest(config));
    }

    fn go_negotiation_completed(&self, status: i32) {
        log::debug!("p2p-callback({}): GO negotiation completed, status {status}", self.iface);
        match p2p_status_from_hal(status) {
            P2pStatus::Success => self.emit(P2pEvent::GoNegotiationSuccess),
            failure => self.emit(P2pEvent::GoNegotiationFailure(failure)),
        }
    }

    fn group_formation_failure(&self, reason: &str) {
        self.emit(P2pEvent::GroupFormationFailure(reason.to_string()));
    }

    fn group_started(&self, params: &GroupStartedParams, scope: Scope) {
        let Some(interface) = params.group_interface_name.as_deref() else {
            log::error!("p2p-callback({}): missing group interface name", self.iface);
            return;
        };
        let Some(owner) = self.mac("group owner address", &params.go_device_address) else {
            return;
        };
        let ssid = Ssid(params.ssid.clone()).encode();

        let mut group = P2pGroup::new(interface).with_owner(owner);
        group.ssid = Some(remove_enclosing_quotes(&ssid).to_string());
        group.frequency = params.frequency_mhz;
        group.is_group_owner = params.is_group_owner;
        group.passphrase = params.passphrase.clone();
        group.network_id = if params.is_persistent {
            NETWORK_ID_PERSISTENT
        } else {
            NETWORK_ID_TEMPORARY
        };
        if scope.extended_group {
            group.owner_interface_address = MacAddress::from_bytes(&params.go_interface_address).ok();
            if !params.is_group_owner {
                group.client_eapol_ip = params.client_ip_info.map(|info| ClientEapolIpInfo {
                    ip_address_client: codec::ipv4_from_hal(info.ip_address_client),
                    ip_address_go: codec::ipv4_from_hal(info.ip_address_go),
                    ip_address_mask: codec::ipv4_from_hal(info.ip_address_mask),
                });
            }
        }
        group.vendor_data = Self::vendor_data(scope, &params.vendor_data);
        if scope.key_mgmt {
            group.security = group_security_from_key_mgmt(params.key_mgmt_mask);
        }

        log::debug!("p2p-callback({}): group started on {interface}", self.iface);
        self.emit(P2pEvent::GroupStarted(group));
    }

    fn group_removed(&self, group_ifname: Option<&str>, is_group_owner: bool) {
        let Some(interface) = group_ifname else {
            log::error!("p2p-callback({}): missing group interface name", self.iface);
            return;
        };
        let mut group = P2pGroup::new(interface);
        group.is_group_owner = is_group_owner;
        self.emit(P2pEvent::GroupRemoved(group));
    }

    fn invitation_received(&self, params: &InvitationParams, scope: Scope) {
        let Some(client) = self.mac("source address", &params.src_address) else {
            return;
        };
        let Some(owner) = self.mac("group owner address", &params.go_device_address) else {
            return;
        };
        let mut group = P2pGroup::new(String::new()).with_owner(owner);
        group.network_id = params.persistent_network_id;
        group.frequency = params.operating_frequency_mhz;
        group.clients.push(client);
        group.vendor_data = Self::vendor_data(scope, &params.vendor_data);
        self.emit(P2pEvent::InvitationReceived(group));
    }

    fn invitation_result(&self, status: i32) {
        self.emit(P2pEvent::InvitationResult(p2p_status_from_hal(status)));
    }

    fn provision_discovery_completed(&self, params: &ProvisionDiscoveryParams, scope: Scope) {
        let mut pairing_method = pairing::NONE;
        if scope.pairing && params.pairing_bootstrapping_method != pairing::NONE {
            pairing_method = pairing_method_from_hal(params.pairing_bootstrapping_method);
            if pairing_method == pairing::NONE {
                log::error!(
                    "p2p-callback({}): unsupported pairing bootstrapping method {}",
                    self.iface,
                    params.pairing_bootstrapping_method
                );
                return;
            }
        }

        let device = MacAddress::from_bytes(&params.p2p_device_address)
            .map_err(|err| log::error!("p2p-callback({}): could not decode device address: {err}", self.iface))
            .ok();

        let is_pairing = pairing_method != pairing::NONE;
        let is_comeback = is_pairing && params.status == prov_disc_status::INFO_UNAVAILABLE;
        if !is_comeback && params.status != prov_disc_status::SUCCESS {
            log::error!(
                "p2p-callback({}): provision discovery failed, status {}",
                self.iface,
                params.status
            );
            self.emit(P2pEvent::ProvisionDiscoveryFailure {
                status: prov_disc_status_from_hal(params.status),
                device,
            });
            return;
        }
        let Some(device) = device else {
            return;
        };

        let vendor_data = Self::vendor_data(scope, &params.vendor_data);
        let event = |kind: ProvDiscKind, pin: Option<String>| {
            P2pEvent::ProvisionDiscovery(ProvDiscEvent {
                kind,
                device,
                pin,
                is_comeback,
                vendor_data: vendor_data.clone(),
            })
        };

        if is_pairing {
            let password = params.password.clone();
            let kind = match (pairing_method, params.is_request) {
                (pairing::OPPORTUNISTIC, true) => ProvDiscKind::PairingOpportunisticRequest,
                (pairing::OPPORTUNISTIC, false) => ProvDiscKind::PairingOpportunisticResponse,
                (pairing::KEYPAD_PINCODE, true) | (pairing::DISPLAY_PINCODE, false) => {
                    ProvDiscKind::PairingShowPin
                }
                (pairing::KEYPAD_PINCODE, false) | (pairing::DISPLAY_PINCODE, true) => {
                    ProvDiscKind::PairingEnterPin
                }
                (pairing::KEYPAD_PASSPHRASE, true) | (pairing::DISPLAY_PASSPHRASE, false) => {
                    ProvDiscKind::PairingShowPassphrase
                }
                (pairing::KEYPAD_PASSPHRASE, false) | (pairing::DISPLAY_PASSPHRASE, true) => {
                    ProvDiscKind::PairingEnterPassphrase
                }
                (other, _) => {
                    log::error!("p2p-callback({}): unhandled pairing method {other}", self.iface);
                    return;
                }
            };
            self.emit(event(kind, password));
            return;
        }

        let methods = params.config_methods;
        let has = |bit: u16| methods & i32::from(bit) != 0;
        let pin = params.generated_pin.clone();
        let decoded = if has(wps_config_methods::PUSHBUTTON) {
            if params.is_request {
                event(ProvDiscKind::PbcRequest, None)
            } else {
                event(ProvDiscKind::PbcResponse, None)
            }
        } else if !params.is_request && has(wps_config_methods::KEYPAD) {
            event(ProvDiscKind::ShowPin, pin)
        } else if !params.is_request && has(wps_config_methods::DISPLAY) {
            event(ProvDiscKind::EnterPin, pin)
        } else if params.is_request && has(wps_config_methods::DISPLAY) {
            event(ProvDiscKind::ShowPin, pin)
        } else if params.is_request && has(wps_config_methods::KEYPAD) {
            event(ProvDiscKind::EnterPin, None)
        } else {
            log::error!("p2p-callback({}): unsupported WPS config methods {methods}", self.iface);
            return;
        };
        self.emit(decoded);
    }

    fn service_discovery_response(&self, src_address: &[u8], tlvs: &[u8]) {
        if let Some(source) = self.mac("source address", src_address) {
            self.emit(P2pEvent::ServiceDiscoveryResponse {
                source,
                tlvs: tlvs.to_vec(),
            });
        }
    }

    fn peer_client(&self, params: &PeerClientParams, scope: Scope, connected: bool) {
        let Some(interface_address) = self.mac("client interface address", &params.client_interface_address)
        else {
            return;
        };
        let Some(device_address) = self.mac("client device address", &params.client_device_address) else {
            return;
        };
        // Legacy clients have no P2P device address; fall back to the interface address.
        let address = if device_address.is_any() {
            interface_address
        } else {
            device_address
        };
        let device = P2pDevice {
            address,
            interface_address: Some(interface_address),
            ip_address: (params.client_ip_address != 0)
                .then(|| codec::ipv4_from_hal(params.client_ip_address)),
            vendor_data: Self::vendor_data(scope, &params.vendor_data),
            ..P2pDevice::default()
        };
        if connected {
            self.emit(P2pEvent::ApStaConnected(device));
        } else {
            self.emit(P2pEvent::ApStaDisconnected(device));
        }
    }

    fn sta_changed(&self, src_address: &[u8], p2p_device_address: &[u8], connected: bool) {
        let params = PeerClientParams {
            client_interface_address: src_address.to_vec(),
            client_device_address: p2p_device_address.to_vec(),
            ..PeerClientParams::default()
        };
        self.peer_client(&params, Scope::LEGACY, connected);
    }

    fn frequency_changed(&self, group_ifname: Option<&str>, frequency: i32) {
        if group_ifname.is_none() {
            log::error!("p2p-callback({}): missing group interface name", self.iface);
            return;
        }
        self.emit(P2pEvent::FrequencyChanged(frequency));
    }
}

// ── Versioned interface ────────────────────────────────────────────────────

/// Callback registered on the versioned P2P interface.
pub struct AidlP2pCallback {
    decoder: EventDecoder,
    service_version: i32,
}

impl AidlP2pCallback {
    pub fn new(iface: impl Into<String>, monitor: Arc<dyn P2pMonitor>, service_version: i32) -> Self {
        Self {
            decoder: EventDecoder::new(iface, monitor),
            service_version,
        }
    }

    pub fn iface(&self) -> &str {
        self.decoder.iface()
    }

    fn extended(&self) -> Scope {
        Scope {
            wfd_r2: true,
            vendor_elements: true,
            vendor_data: supplicant_aidl::VENDOR_DATA.supported_by(self.service_version),
            pairing: supplicant_aidl::PAIRING_BOOTSTRAPPING.supported_by(self.service_version),
            key_mgmt: supplicant_aidl::KEY_MGMT_MASK.supported_by(self.service_version),
            extended_group: true,
        }
    }
}

impl aidl::P2pIfaceCallback for AidlP2pCallback {
    fn on_device_found(&self, params: &DeviceFoundParams) {
        self.decoder.device_found(params, Scope::LEGACY);
    }

    fn on_device_found_with_params(&self, params: &DeviceFoundParams) {
        self.decoder.device_found(params, self.extended());
    }

    fn on_device_lost(&self, p2p_device_address: &[u8]) {
        self.decoder.device_lost(p2p_device_address);
    }

    fn on_find_stopped(&self) {
        self.decoder.emit(P2pEvent::FindStopped);
    }

    fn on_go_negotiation_request(&self, src_address: &[u8], password_id: i32) {
        let params = GoNegotiationReqParams {
            src_address: src_address.to_vec(),
            password_id,
            vendor_data: Vec::new(),
        };
        self.decoder.go_negotiation_request(&params, Scope::LEGACY);
    }

    fn on_go_negotiation_request_with_params(&self, params: &GoNegotiationReqParams) {
        self.decoder.go_negotiation_request(params, self.extended());
    }

    fn on_go_negotiation_completed(&self, status: i32) {
        self.decoder.go_negotiation_completed(status);
    }

    fn on_group_formation_success(&self) {
        self.decoder.emit(P2pEvent::GroupFormationSuccess);
    }

    fn on_group_formation_failure(&self, reason: &str) {
        self.decoder.group_formation_failure(reason);
    }

    fn on_group_started(&self, params: &GroupStartedParams) {
        self.decoder.group_started(params, Scope::LEGACY);
    }

    fn on_group_started_with_params(&self, params: &GroupStartedParams) {
        self.decoder.group_started(params, self.extended());
    }

    fn on_group_removed(&self, group_ifname: Option<&str>, is_group_owner: bool) {
        self.decoder.group_removed(group_ifname, is_group_owner);
    }

    fn on_invitation_received(&self, params: &InvitationParams) {
        self.decoder.invitation_received(params, Scope::LEGACY);
    }

    fn on_invitation_received_with_params(&self, params: &InvitationParams) {
        self.decoder.invitation_received(params, self.extended());
    }

    fn on_invitation_result(&self, _bssid: &[u8], status: i32) {
        self.decoder.invitation_result(status);
    }

    fn on_provision_discovery_completed(&self, params: &ProvisionDiscoveryParams) {
        self.decoder.provision_discovery_completed(params, Scope::LEGACY);
    }

    fn on_provision_discovery_completed_event(&self, params: &ProvisionDiscoveryParams) {
        self.decoder.provision_discovery_completed(params, self.extended());
    }

    fn on_service_discovery_response(&self, src_address: &[u8], _update_indicator: u16, tlvs: &[u8]) {
        self.decoder.service_discovery_response(src_address, tlvs);
    }

    fn on_sta_authorized(&self, src_address: &[u8], p2p_device_address: &[u8]) {
        self.decoder.sta_changed(src_address, p2p_device_address, true);
    }

    fn on_peer_client_joined(&self, params: &PeerClientParams) {
        self.decoder.peer_client(params, self.extended(), true);
    }

    fn on_sta_deauthorized(&self, src_address: &[u8], p2p_device_address: &[u8]) {
        self.decoder.sta_changed(src_address, p2p_device_address, false);
    }

    fn on_peer_client_disconnected(&self, params: &PeerClientParams) {
        self.decoder.peer_client(params, self.extended(), false);
    }

    fn on_group_frequency_changed(&self, group_ifname: Option<&str>, frequency: i32) {
        self.decoder.frequency_changed(group_ifname, frequency);
    }
}

// ── Legacy interface ───────────────────────────────────────────────────────

/// Callback registered on the legacy P2P interface. The 1.4 flavour also
/// accepts R2 device discovery.
pub struct HidlP2pCallback {
    decoder: EventDecoder,
    accepts_r2: bool,
}

impl HidlP2pCallback {
    pub fn new(iface: impl Into<String>, monitor: Arc<dyn P2pMonitor>, accepts_r2: bool) -> Self {
        Self {
            decoder: EventDecoder::new(iface, monitor),
            accepts_r2,
        }
    }
}

impl hidl::P2pIfaceCallback for HidlP2pCallback {
    fn on_device_found(&self, params: &DeviceFoundParams) {
        self.decoder.device_found(params, Scope::LEGACY);
    }

    fn on_r2_device_found(&self, params: &DeviceFoundParams) {
        if !self.accepts_r2 {
            log::warn!("p2p-callback({}): R2 device found on a legacy callback", self.decoder.iface);
            return;
        }
        let scope = Scope {
            wfd_r2: true,
            ..Scope::LEGACY
        };
        self.decoder.device_found(params, scope);
    }

    fn on_device_lost(&self, p2p_device_address: &[u8]) {
        self.decoder.device_lost(p2p_device_address);
    }

    fn on_find_stopped(&self) {
        self.decoder.emit(P2pEvent::FindStopped);
    }

    fn on_go_negotiation_request(&self, src_address: &[u8], password_id: i32) {
        let params = GoNegotiationReqParams {
            src_address: src_address.to_vec(),
            password_id,
            vendor_data: Vec::new(),
        };
        self.decoder.go_negotiation_request(&params, Scope::LEGACY);
    }

    fn on_go_negotiation_completed(&self, status: i32) {
        self.decoder.go_negotiation_completed(status);
    }

    fn on_group_formation_success(&self) {
        self.decoder.emit(P2pEvent::GroupFormationSuccess);
    }

    fn on_group_formation_failure(&self, reason: &str) {
        self.decoder.group_formation_failure(reason);
    }

    fn on_group_started(&self, params: &GroupStartedParams) {
        self.decoder.group_started(params, Scope::LEGACY);
    }

    fn on_group_removed(&self, group_ifname: Option<&str>, is_group_owner: bool) {
        self.decoder.group_removed(group_ifname, is_group_owner);
    }

    fn on_invitation_received(&self, params: &InvitationParams) {
        self.decoder.invitation_received(params, Scope::LEGACY);
    }

    fn on_invitation_result(&self, _bssid: &[u8], status: i32) {
        self.decoder.invitation_result(status);
    }

    fn on_provision_discovery_completed(&self, params: &ProvisionDiscoveryParams) {
        self.decoder.provision_discovery_completed(params, Scope::LEGACY);
    }

    fn on_service_discovery_response(&self, src_address: &[u8], _update_indicator: u16, tlvs: &[u8]) {
        self.decoder.service_discovery_response(src_address, tlvs);
    }

    fn on_sta_authorized(&self, src_address: &[u8], p2p_device_address: &[u8]) {
        self.decoder.sta_changed(src_address, p2p_device_address, true);
    }

    fn on_sta_deauthorized(&self, src_address: &[u8], p2p_device_address: &[u8]) {
        self.decoder.sta_changed(src_address, p2p_device_address, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::aidl::P2pIfaceCallback as _;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(String, P2pEvent)>>,
    }

    impl P2pMonitor for Recorder {
        fn broadcast(&self, iface: &str, event: P2pEvent) {
            self.events.lock().expect("recorder mutex poisoned").push((iface.to_string(), event));
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<P2pEvent> {
            self.events
                .lock()
                .expect("recorder mutex poisoned")
                .drain(..)
                .map(|(_, event)| event)
                .collect()
        }
    }

    const PEER: [u8; 6] = [0x02, 0x11, 0x22, 0x33, 0x44, 0x55];

    fn callback(version: i32) -> (Arc<Recorder>, AidlP2pCallback) {
        let recorder = Arc::new(Recorder::default());
        let cb = AidlP2pCallback::new("p2p0", recorder.clone(), version);
        (recorder, cb)
    }

    fn device_found() -> DeviceFoundParams {
        DeviceFoundParams {
            src_address: PEER.to_vec(),
            p2p_device_address: PEER.to_vec(),
            primary_device_type: vec![0x00, 0x0a, 0x00, 0x50, 0xf2, 0x04, 0x00, 0x05],
            device_name: Some("tv".to_string()),
            config_methods: 0x188,
            vendor_elem_bytes: Some(vec![221, 1, 0xaa, 10, 1, 0xbb]),
            vendor_data: vec![OuiKeyedData { oui: 0x00_1a_11, data: vec![1] }],
            pairing_bootstrapping_methods: pairing::OPPORTUNISTIC,
            ..DeviceFoundParams::default()
        }
    }

    #[test]
    fn device_found_respects_version() {
        let (recorder, cb) = callback(3);
        cb.on_device_found_with_params(&device_found());
        let events = recorder.take();
        let [P2pEvent::DeviceFound(device)] = events.as_slice() else {
            panic!("expected one DeviceFound, got {events:?}");
        };
        assert_eq!(device.name, "tv");
        assert_eq!(device.primary_device_type.as_deref(), Some("10-0050F204-5"));
        assert_eq!(device.vendor_elements.len(), 1, "only vendor specific elements are kept");
        assert_eq!(device.vendor_data.len(), 1);
        // Pairing methods need version 4.
        assert_eq!(device.pairing_methods, 0);
    }

    #[test]
    fn undecodable_device_is_dropped() {
        let (recorder, cb) = callback(4);
        let mut params = device_found();
        params.p2p_device_address = vec![1, 2, 3];
        cb.on_device_found_with_params(&params);

        let mut nameless = device_found();
        nameless.device_name = None;
        cb.on_device_found(&nameless);

        let mut untyped = device_found();
        untyped.primary_device_type = vec![0; 3];
        untyped.pairing_bootstrapping_methods = 0;
        cb.on_device_found_with_params(&untyped);

        assert!(recorder.take().is_empty());
    }

    #[test]
    fn pairing_capable_device_may_omit_primary_type() {
        let (recorder, cb) = callback(4);
        let mut params = device_found();
        params.primary_device_type = Vec::new();
        cb.on_device_found_with_params(&params);
        let events = recorder.take();
        let [P2pEvent::DeviceFound(device)] = events.as_slice() else {
            panic!("expected one DeviceFound, got {events:?}");
        };
        assert_eq!(device.primary_device_type, None);
        assert_eq!(device.pairing_methods, pairing::OPPORTUNISTIC);
    }

    #[test]
    fn go_negotiation_completion_maps_status() {
        let (recorder, cb) = callback(1);
        cb.on_go_negotiation_completed(p2p_status::SUCCESS_DEFERRED);
        cb.on_go_negotiation_completed(p2p_status::FAIL_REJECTED_BY_USER);
        cb.on_go_negotiation_completed(99);
        assert_eq!(
            recorder.take(),
            vec![
                P2pEvent::GoNegotiationSuccess,
                P2pEvent::GoNegotiationFailure(P2pStatus::RejectedByUser),
                P2pEvent::GoNegotiationFailure(P2pStatus::Unknown),
            ]
        );
    }

    #[test]
    fn go_negotiation_request_maps_password_id() {
        let (recorder, cb) = callback(1);
        cb.on_go_negotiation_request(&PEER, wps_dev_password_id::REGISTRAR_SPECIFIED);
        let events = recorder.take();
        let [P2pEvent::GoNegotiationRequest(config)] = events.as_slice() else {
            panic!("expected one request, got {events:?}");
        };
        assert_eq!(config.wps, WpsSetup::Keypad);
        assert_eq!(config.device_address, "02:11:22:33:44:55");
    }

    #[test]
    fn group_started_decodes_security_and_client_ip() {
        let (recorder, cb) = callback(4);
        let params = GroupStartedParams {
            group_interface_name: Some("p2p-p2p0-0".to_string()),
            is_group_owner: false,
            ssid: b"DIRECT-ab".to_vec(),
            frequency_mhz: 5180,
            passphrase: Some("secret".to_string()),
            go_device_address: PEER.to_vec(),
            go_interface_address: PEER.to_vec(),
            is_persistent: true,
            client_ip_info: Some(crate::rpc::EapolIpAddressInfo {
                ip_address_client: i32::from_le_bytes([192, 168, 49, 2]),
                ip_address_mask: i32::from_le_bytes([255, 255, 255, 0]),
                ip_address_go: i32::from_le_bytes([192, 168, 49, 1]),
            }),
            key_mgmt_mask: key_mgmt::WPA_PSK | key_mgmt::SAE,
            ..GroupStartedParams::default()
        };
        cb.on_group_started_with_params(&params);
        let events = recorder.take();
        let [P2pEvent::GroupStarted(group)] = events.as_slice() else {
            panic!("expected one GroupStarted, got {events:?}");
        };
        assert_eq!(group.ssid.as_deref(), Some("DIRECT-ab"));
        assert_eq!(group.network_id, NETWORK_ID_PERSISTENT);
        assert_eq!(group.security, GroupSecurity::Wpa3Compatibility);
        let ip = group.client_eapol_ip.expect("client ip info");
        assert_eq!(ip.ip_address_go, std::net::Ipv4Addr::new(192, 168, 49, 1));
    }

    #[test]
    fn group_security_needs_exact_akm_mask() {
        const OTHER: i32 = 1 << 8;
        assert_eq!(group_security_from_key_mgmt(key_mgmt::WPA_PSK), GroupSecurity::Wpa2Psk);
        assert_eq!(group_security_from_key_mgmt(key_mgmt::SAE), GroupSecurity::Wpa3Sae);
        assert_eq!(group_security_from_key_mgmt(key_mgmt::WPA_PSK | OTHER), GroupSecurity::Unknown);
        assert_eq!(group_security_from_key_mgmt(key_mgmt::SAE | OTHER), GroupSecurity::Unknown);
        assert_eq!(
            group_security_from_key_mgmt(key_mgmt::WPA_PSK | key_mgmt::SAE | OTHER),
            GroupSecurity::Wpa3Compatibility
        );
        assert_eq!(group_security_from_key_mgmt(0), GroupSecurity::Unknown);
    }

    #[test]
    fn group_security_is_left_unset_before_key_mgmt_mask() {
        let (recorder, cb) = callback(3);
        cb.on_group_started_with_params(&GroupStartedParams {
            group_interface_name: Some("p2p-p2p0-0".to_string()),
            ssid: b"DIRECT-ab".to_vec(),
            go_device_address: PEER.to_vec(),
            key_mgmt_mask: key_mgmt::WPA_PSK,
            ..GroupStartedParams::default()
        });
        let events = recorder.take();
        let [P2pEvent::GroupStarted(group)] = events.as_slice() else {
            panic!("expected one GroupStarted, got {events:?}");
        };
        assert_eq!(group.security, GroupSecurity::default());
    }

    #[test]
    fn provision_discovery_failure_and_wps_methods() {
        let (recorder, cb) = callback(1);
        let base = ProvisionDiscoveryParams {
            p2p_device_address: PEER.to_vec(),
            generated_pin: Some("12345670".to_string()),
            ..ProvisionDiscoveryParams::default()
        };

        cb.on_provision_discovery_completed(&ProvisionDiscoveryParams {
            status: prov_disc_status::TIMEOUT,
            ..base.clone()
        });
        cb.on_provision_discovery_completed(&ProvisionDiscoveryParams {
            is_request: true,
            config_methods: i32::from(wps_config_methods::DISPLAY),
            ..base.clone()
        });
        cb.on_provision_discovery_completed(&ProvisionDiscoveryParams {
            is_request: false,
            config_methods: i32::from(wps_config_methods::PUSHBUTTON),
            ..base.clone()
        });

        let events = recorder.take();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[0],
            P2pEvent::ProvisionDiscoveryFailure { status: ProvDiscStatus::Timeout, device: Some(_) }
        ));
        let P2pEvent::ProvisionDiscovery(show) = &events[1] else {
            panic!("expected ShowPin, got {:?}", events[1]);
        };
        assert_eq!(show.kind, ProvDiscKind::ShowPin);
        assert_eq!(show.pin.as_deref(), Some("12345670"));
        assert!(matches!(&events[2], P2pEvent::ProvisionDiscovery(e) if e.kind == ProvDiscKind::PbcResponse));
    }

    #[test]
    fn pairing_comeback_is_not_a_failure() {
        let (recorder, cb) = callback(4);
        cb.on_provision_discovery_completed_event(&ProvisionDiscoveryParams {
            p2p_device_address: PEER.to_vec(),
            is_request: true,
            status: prov_disc_status::INFO_UNAVAILABLE,
            pairing_bootstrapping_method: pairing::DISPLAY_PINCODE,
            password: Some("1234".to_string()),
            ..ProvisionDiscoveryParams::default()
        });
        let events = recorder.take();
        let [P2pEvent::ProvisionDiscovery(event)] = events.as_slice() else {
            panic!("expected one event, got {events:?}");
        };
        assert_eq!(event.kind, ProvDiscKind::PairingEnterPin);
        assert!(event.is_comeback);
    }

    #[test]
    fn legacy_client_uses_interface_address() {
        let (recorder, cb) = callback(3);
        cb.on_sta_authorized(&PEER, &[0; 6]);
        let events = recorder.take();
        let [P2pEvent::ApStaConnected(device)] = events.as_slice() else {
            panic!("expected one connection, got {events:?}");
        };
        assert_eq!(device.address.octets(), PEER);
        assert_eq!(device.interface_address.map(|m| m.octets()), Some(PEER));
    }

    #[test]
    fn hidl_legacy_callback_ignores_r2() {
        use crate::rpc::hidl::P2pIfaceCallback as _;

        let recorder = Arc::new(Recorder::default());
        let cb = HidlP2pCallback::new("p2p0", recorder.clone(), false);
        cb.on_r2_device_found(&device_found());
        cb.on_group_removed(None, true);
        assert!(recorder.take().is_empty());

        cb.on_group_removed(Some("p2p-p2p0-1"), true);
        assert!(matches!(recorder.take().as_slice(), [P2pEvent::GroupRemoved(g)] if g.is_group_owner));
    }
}
