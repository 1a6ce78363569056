mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{init_logging, test_config, DeathCounter};
use wifi_hal::fake::{FakeHal, FakeHostapd};
use wifi_hal::rpc::aidl::{ApInfo, ClientInfo, EncryptionType};
use wifi_hal::types::{
    ApInstanceInfo, ClientDisconnectReason, MacAddress, SapClientBlockReason, SoftApConfig, SoftApSecurity, Ssid,
};
use wifi_hal::{FailureListener, HalTransport, HostapdHal, SoftApHalCallback};

const CLIENT: MacAddress = MacAddress([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);

fn hostapd_hal(fake: &FakeHal) -> HostapdHal {
    HostapdHal::new(fake.services(), test_config())
}

fn wpa2_config() -> SoftApConfig {
    SoftApConfig::new(Ssid(b"ap".to_vec()), SoftApSecurity::Wpa2Psk).with_passphrase("passphrase")
}

fn counting_listener() -> (Arc<AtomicUsize>, FailureListener) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let listener: FailureListener = Arc::new(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (count, listener)
}

#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl RecordingCallback {
    fn events(&self) -> Vec<String> {
        self.events.lock().expect("events mutex poisoned").clone()
    }

    fn push(&self, event: String) {
        self.events.lock().expect("events mutex poisoned").push(event);
    }
}

impl SoftApHalCallback for RecordingCallback {
    fn on_info_changed(&self, info: &ApInstanceInfo) {
        self.push(format!("info {} {}", info.instance, info.frequency));
    }

    fn on_connected_clients_changed(
        &self,
        instance: &str,
        client: MacAddress,
        connected: bool,
        reason: ClientDisconnectReason,
    ) {
        self.push(format!("client {instance} {client} {connected} {reason:?}"));
    }

    fn on_instance_failure(&self, instance: &str) {
        self.push(format!("failure {instance}"));
    }
}

fn instance_info(iface: &str, instance: &str, freq_mhz: i32) -> ApInfo {
    ApInfo {
        iface_name: iface.to_string(),
        ap_iface_instance: instance.to_string(),
        freq_mhz,
        ap_iface_instance_mac_address: vec![0x02, 0x00, 0x00, 0x00, 0x00, 0x01],
        ..ApInfo::default()
    }
}

/// Initialized and started AIDL hostapd with one access point on `wlan1`.
fn started(version: i32) -> (FakeHal, Arc<FakeHostapd>, HostapdHal, Arc<AtomicUsize>) {
    let (fake, hostapd) = FakeHal::aidl_hostapd(version);
    let hal = hostapd_hal(&fake);
    assert!(hal.initialize());
    assert!(hal.start_daemon());
    let (failures, listener) = counting_listener();
    assert!(hal.add_access_point("wlan1", &wpa2_config(), false, false, &[], listener));
    (fake, hostapd, hal, failures)
}

// ── Versioned interface ──────────────────────────────────────────────────

#[test]
fn start_daemon_connects_and_registers_callback() {
    init_logging();
    let (fake, hostapd) = FakeHal::aidl_hostapd(3);
    let hal = hostapd_hal(&fake);

    assert!(hal.initialize());
    assert_eq!(hal.transport(), Some(HalTransport::Aidl));
    assert!(hal.is_initialization_started());
    assert!(!hal.is_initialization_complete());

    assert!(hal.start_daemon());
    assert!(hal.is_initialization_complete());
    assert!(hal.is_ap_info_callback_supported());
    assert_eq!(hostapd.daemon.calls("register_callback"), 1);
    assert_eq!(hostapd.daemon.calls("set_debug_params"), 1);
    assert!(hostapd.callback().is_some());
}

#[test]
fn start_daemon_version_transport_error_notifies_death() {
    init_logging();
    let (fake, hostapd) = FakeHal::aidl_hostapd(3);
    let hal = hostapd_hal(&fake);
    assert!(hal.initialize());
    let (deaths, handler) = DeathCounter::new();
    assert!(hal.register_death_handler(handler));

    hostapd.daemon.break_transport("interface_version");
    assert!(!hal.start_daemon());
    assert!(!hal.is_initialization_complete());
    assert_eq!(hostapd.daemon.calls("register_callback"), 0);
    assert_eq!(deaths.fired(), 1);
}

#[test]
fn add_access_point_sends_network_params() {
    init_logging();
    let (fake, hostapd) = FakeHal::aidl_hostapd(3);
    let hal = hostapd_hal(&fake);
    assert!(hal.initialize());
    assert!(hal.start_daemon());

    let mut config = wpa2_config();
    config.client_isolation = true;
    let (_, listener) = counting_listener();
    assert!(hal.add_access_point("wlan1", &config, true, false, &[], listener));

    let (iface, network) = hostapd.last_access_point().expect("access point");
    assert_eq!(iface.name, "wlan1");
    assert_eq!(network.ssid, b"ap".to_vec());
    assert_eq!(network.encryption_type, EncryptionType::Wpa2);
    assert_eq!(network.passphrase, "passphrase");
    assert!(network.is_metered);
    assert!(network.is_client_isolation_enabled);
}

#[test]
fn client_isolation_needs_version_three() {
    init_logging();
    let (fake, hostapd) = FakeHal::aidl_hostapd(2);
    let hal = hostapd_hal(&fake);
    assert!(hal.initialize());
    assert!(hal.start_daemon());

    let mut config = wpa2_config();
    config.client_isolation = true;
    let (_, listener) = counting_listener();
    assert!(hal.add_access_point("wlan1", &config, false, false, &[], listener));
    let (_, network) = hostapd.last_access_point().expect("access point");
    assert!(!network.is_client_isolation_enabled);
}

#[test]
fn add_access_point_before_start_fails() {
    init_logging();
    let (fake, hostapd) = FakeHal::aidl_hostapd(3);
    let hal = hostapd_hal(&fake);
    assert!(hal.initialize());

    let (_, listener) = counting_listener();
    assert!(!hal.add_access_point("wlan1", &wpa2_config(), false, false, &[], listener));
    assert_eq!(hostapd.daemon.calls("add_access_point"), 0);
    assert!(hal.registry().listener("wlan1").is_none());
}

#[test]
fn single_instance_failure_runs_listener() {
    init_logging();
    let (_fake, hostapd, _hal, failures) = started(3);

    let callback = hostapd.callback().expect("registered callback");
    callback.on_failure("wlan1", "wlan1");
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[test]
fn bridged_instance_failure_reaches_softap_callback() {
    init_logging();
    let (_fake, hostapd, hal, failures) = started(3);
    let softap = Arc::new(RecordingCallback::default());
    assert!(hal.register_ap_callback("wlan1", softap.clone()));

    let callback = hostapd.callback().expect("registered callback");
    callback.on_ap_instance_info_changed(&instance_info("wlan1", "wlan1-0", 2437));
    callback.on_ap_instance_info_changed(&instance_info("wlan1", "wlan1-1", 5180));
    assert!(hal.registry().is_active("wlan1-0"));

    callback.on_failure("wlan1", "wlan1-0");
    assert_eq!(failures.load(Ordering::SeqCst), 0);
    assert!(!hal.registry().is_active("wlan1-0"));
    assert!(hal.registry().is_active("wlan1-1"));
    assert_eq!(
        softap.events(),
        vec![
            "info wlan1-0 2437".to_string(),
            "info wlan1-1 5180".to_string(),
            "failure wlan1-0".to_string(),
        ]
    );
}

#[test]
fn client_events_carry_reason_from_version_three() {
    init_logging();
    let (_fake, hostapd, hal, _) = started(3);
    let softap = Arc::new(RecordingCallback::default());
    assert!(hal.register_ap_callback("wlan1", softap.clone()));

    let callback = hostapd.callback().expect("registered callback");
    callback.on_connected_clients_changed(&ClientInfo {
        iface_name: "wlan1".to_string(),
        ap_iface_instance: "wlan1".to_string(),
        client_address: CLIENT.octets().to_vec(),
        is_connected: false,
        disconnect_reason_code: 3,
    });
    assert_eq!(
        softap.events(),
        vec!["client wlan1 02:11:22:33:44:55 false Code(3)".to_string()]
    );
}

#[test]
fn listeners_survive_daemon_death() {
    init_logging();
    let (_fake, hostapd, hal, failures) = started(3);
    let (deaths, handler) = DeathCounter::new();
    assert!(hal.register_death_handler(handler));
    let callback = hostapd.callback().expect("registered callback");

    hostapd.daemon.kill();
    assert_eq!(deaths.fired(), 1);
    assert!(!hal.is_initialization_complete());
    assert!(hal.registry().listener("wlan1").is_some());

    callback.on_failure("wlan1", "wlan1");
    assert_eq!(failures.load(Ordering::SeqCst), 1);

    assert!(hal.start_daemon());
    assert!(hal.is_initialization_complete());
    assert_eq!(hostapd.daemon.calls("register_callback"), 2);
}

#[test]
fn remove_access_point_drops_listener() {
    init_logging();
    let (_fake, hostapd, hal, failures) = started(3);
    let callback = hostapd.callback().expect("registered callback");

    assert!(hal.remove_access_point("wlan1"));
    assert_eq!(hostapd.daemon.calls("remove_access_point"), 1);
    assert!(hal.registry().listener("wlan1").is_none());

    callback.on_failure("wlan1", "wlan1");
    assert_eq!(failures.load(Ordering::SeqCst), 0);
}

#[test]
fn force_client_disconnect_maps_reasons() {
    init_logging();
    let (_fake, hostapd, hal, _) = started(3);

    let cases = [
        (SapClientBlockReason::BlockedByUser, 2),
        (SapClientBlockReason::NoMoreStas, 5),
        (SapClientBlockReason::Unspecified, 1),
    ];
    for (reason, code) in cases {
        assert!(hal.force_client_disconnect("wlan1", CLIENT, reason));
        assert_eq!(hostapd.last_disconnect(), Some(("wlan1".to_string(), CLIENT.octets(), code)));
    }

    assert!(!hal.force_client_disconnect("wlan1", CLIENT, SapClientBlockReason::Other(42)));
    assert_eq!(hostapd.daemon.calls("force_client_disconnect"), 3);
}

#[test]
fn remove_link_needs_version_three() {
    init_logging();
    let (_fake, hostapd, hal, _) = started(2);
    assert!(!hal.remove_link_from_multiple_link_bridged_ap_iface("wlan1", "wlan1-0"));
    assert_eq!(hostapd.daemon.calls("remove_link_from_multiple_link_bridged_ap_iface"), 0);

    let (_fake, hostapd, hal, _) = started(3);
    assert!(hal.remove_link_from_multiple_link_bridged_ap_iface("wlan1", "wlan1-0"));
    assert_eq!(hostapd.daemon.calls("remove_link_from_multiple_link_bridged_ap_iface"), 1);
}

#[test]
fn transport_error_marks_hostapd_dead() {
    init_logging();
    let (_fake, hostapd, hal, _) = started(3);
    let (deaths, handler) = DeathCounter::new();
    assert!(hal.register_death_handler(handler));

    hostapd.daemon.break_transport("set_debug_params");
    assert!(!hal.set_debug_params(true));
    assert!(!hal.is_initialization_complete());
    assert_eq!(deaths.fired(), 1);
}

#[test]
fn terminate_and_restart() {
    init_logging();
    let (_fake, hostapd, hal, _) = started(3);
    let (deaths, handler) = DeathCounter::new();
    assert!(hal.register_death_handler(handler));

    hal.terminate();
    assert_eq!(hostapd.daemon.calls("terminate"), 1);
    assert_eq!(deaths.fired(), 1);
    assert!(!hal.is_initialization_complete());

    assert!(hal.start_daemon());
    assert!(hal.is_initialization_complete());

    // The old generation can no longer tear the new one down.
    hostapd.daemon.notify_death(1);
    assert!(hal.is_initialization_complete());
    assert_eq!(deaths.fired(), 1);
}

#[test]
fn unconfirmed_terminate_forces_death() {
    init_logging();
    let (_fake, hostapd, hal, _) = started(3);
    let (deaths, handler) = DeathCounter::new();
    assert!(hal.register_death_handler(handler));
    hostapd.daemon.set_confirm_terminate(false);

    hal.terminate();
    assert!(hostapd.daemon.is_alive());
    assert!(!hal.is_initialization_complete());
    assert_eq!(deaths.fired(), 1);
}

#[test]
fn no_service_fails_initialize() {
    init_logging();
    let fake = FakeHal::new();
    let hal = hostapd_hal(&fake);

    assert!(!hal.initialize());
    assert!(hal.transport().is_none());
    assert!(!hal.start_daemon());
    assert!(!hal.is_ap_info_callback_supported());
}

// ── Legacy interface ─────────────────────────────────────────────────────

#[test]
fn legacy_minor_one_reports_failures_only() {
    init_logging();
    let (fake, hostapd) = FakeHal::hidl_hostapd(1);
    let hal = hostapd_hal(&fake);

    assert!(hal.initialize());
    assert_eq!(hal.transport(), Some(HalTransport::Hidl));
    assert!(hal.is_initialization_complete());
    assert!(hal.start_daemon());
    assert_eq!(hostapd.daemon.calls("register_callback"), 1);
    assert_eq!(hostapd.daemon.calls("set_debug_params"), 0);
    assert!(!hal.is_ap_info_callback_supported());

    let (failures, listener) = counting_listener();
    assert!(hal.add_access_point("wlan1", &wpa2_config(), true, false, &[], listener));
    assert_eq!(hostapd.daemon.calls("add_access_point_1_1"), 1);
    let (_, network) = hostapd.last_access_point().expect("access point");
    assert!(!network.is_metered);

    assert!(!hal.force_client_disconnect("wlan1", CLIENT, SapClientBlockReason::BlockedByUser));
    assert!(!hal.register_ap_callback("wlan1", Arc::new(RecordingCallback::default())));
    assert!(!hal.remove_link_from_multiple_link_bridged_ap_iface("wlan1", "wlan1-0"));

    hostapd.callback().expect("registered callback").on_failure("wlan1", "wlan1");
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[test]
fn legacy_minor_three_uses_newest_calls() {
    init_logging();
    let (fake, hostapd) = FakeHal::hidl_hostapd(3);
    let hal = hostapd_hal(&fake);
    assert!(hal.initialize());

    assert_eq!(hostapd.daemon.calls("register_callback_1_3"), 1);
    assert_eq!(hostapd.daemon.calls("register_callback"), 0);
    assert_eq!(hostapd.daemon.calls("set_debug_params"), 1);
    assert!(hal.is_ap_info_callback_supported());
    assert!(hal.register_ap_callback("wlan1", Arc::new(RecordingCallback::default())));

    let (_, listener) = counting_listener();
    assert!(hal.add_access_point("wlan1", &wpa2_config(), true, false, &[], listener));
    assert_eq!(hostapd.daemon.calls("add_access_point_1_3"), 1);
    let (_, network) = hostapd.last_access_point().expect("access point");
    assert!(network.is_metered);

    assert!(hal.force_client_disconnect("wlan1", CLIENT, SapClientBlockReason::NoMoreStas));
    assert_eq!(hostapd.last_disconnect(), Some(("wlan1".to_string(), CLIENT.octets(), 5)));
}

#[test]
fn legacy_remove_access_point_keeps_listener_on_failure() {
    init_logging();
    let (fake, hostapd) = FakeHal::hidl_hostapd(2);
    let hal = hostapd_hal(&fake);
    assert!(hal.initialize());
    let (_, listener) = counting_listener();
    assert!(hal.add_access_point("wlan1", &wpa2_config(), false, false, &[], listener));
    assert_eq!(hostapd.daemon.calls("add_access_point_1_2"), 1);

    hostapd.daemon.reject("remove_access_point", wifi_hal::rpc::status::FAILURE_UNKNOWN);
    assert!(!hal.remove_access_point("wlan1"));
    assert!(hal.registry().listener("wlan1").is_some());

    hostapd.daemon.clear_failures();
    assert!(hal.remove_access_point("wlan1"));
    assert!(hal.registry().listener("wlan1").is_none());
}

#[test]
fn legacy_hostapd_death_and_reannouncement() {
    init_logging();
    let (fake, hostapd) = FakeHal::hidl_hostapd(2);
    let hal = hostapd_hal(&fake);
    assert!(hal.initialize());
    let (deaths, handler) = DeathCounter::new();
    assert!(hal.register_death_handler(handler));

    hostapd.daemon.kill();
    assert_eq!(deaths.fired(), 1);
    assert!(!hal.is_initialization_complete());
    assert!(hal.is_initialization_started());

    fake.hidl
        .manager()
        .expect("service manager")
        .announce(wifi_hal::rpc::hidl::HOSTAPD_FQ_NAME);
    assert!(hal.is_initialization_complete());
    assert_eq!(hostapd.daemon.calls("register_callback"), 2);
}
