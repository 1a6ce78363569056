mod common;

use std::time::{Duration, Instant};

use common::{init_logging, p2p_hal, ready_p2p, DeathCounter};
use wifi_hal::fake::{FakeHal, FakeHidlServices, FakeSupplicant};
use wifi_hal::rpc::hidl::SUPPLICANT_FQ_NAME;
use wifi_hal::types::{DiscoveryConfig, InformationElement, P2pScanType};
use wifi_hal::HalTransport;

#[test]
fn legacy_supplicant_is_selected_when_nothing_is_declared() {
    init_logging();
    let (fake, supplicant) = FakeHal::hidl_supplicant(4);
    let (hal, _) = p2p_hal(&fake);

    assert!(hal.initialize());
    assert_eq!(hal.transport(), Some(HalTransport::Hidl));
    assert!(hal.is_initialization_started());
    // The supplicant was already registered, so the connection is immediate.
    assert!(hal.is_initialization_complete());

    // Declaring a versioned service later does not switch transports.
    fake.registry.declare_supplicant("default", FakeSupplicant::new(4));
    assert!(hal.initialize());
    assert_eq!(hal.transport(), Some(HalTransport::Hidl));
    assert_eq!(supplicant.daemon.calls("linkToDeath"), 1);
}

#[test]
fn supplicant_announced_after_initialize_connects() {
    init_logging();
    let fake = FakeHal::new();
    let manager = fake.hidl.manager().expect("service manager");
    manager.set_transport(SUPPLICANT_FQ_NAME, wifi_hal::rpc::hidl::Transport::Hwbinder);
    let (hal, _) = p2p_hal(&fake);

    assert!(hal.initialize());
    assert!(!hal.is_initialization_complete());

    fake.hidl.install_supplicant(FakeSupplicant::new(2));
    assert!(hal.is_initialization_complete());
    assert!(hal.setup_iface("p2p0"));
}

#[test]
fn refused_notification_registration_fails_initialize() {
    init_logging();
    let (fake, _) = FakeHal::hidl_supplicant(4);
    fake.hidl.manager().expect("service manager").set_accept_notifications(false);
    let (hal, _) = p2p_hal(&fake);

    assert!(!hal.initialize());
    assert!(!hal.is_initialization_started());
}

#[test]
fn no_service_manager_means_no_backend() {
    init_logging();
    let fake = FakeHal::with_hidl(FakeHidlServices::without_manager());
    let (hal, _) = p2p_hal(&fake);

    assert!(!hal.initialize());
    assert!(hal.transport().is_none());
}

#[test]
fn minor_version_gates_calls() {
    init_logging();
    let (fake, supplicant) = FakeHal::hidl_supplicant(1);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);
    assert_eq!(supplicant.daemon.calls("add_interface"), 1);
    assert_eq!(supplicant.daemon.calls("register_callback"), 1);

    assert!(!hal.set_mac_randomization(true));
    assert!(!hal.set_wfd_r2_device_info("0006000000000000"));
    assert!(!hal.find_with_params(&DiscoveryConfig::new(P2pScanType::Full, 0), 10));
    assert!(!hal.remove_client("02:11:22:33:44:55", true));
    assert_eq!(hal.get_supported_features(), 0);
    assert_eq!(supplicant.daemon.calls("set_mac_randomization"), 0);
    assert_eq!(supplicant.daemon.calls("set_wfd_r2_device_info"), 0);

    assert!(hal.find(30));
    assert!(hal.is_initialization_complete());
}

#[test]
fn legacy_interface_stores_groups_but_not_vendor_elements() {
    init_logging();
    let (fake, supplicant) = FakeHal::hidl_supplicant(2);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);
    supplicant.iface.add_network(3, b"DIRECT-legacy", [0x02, 0x11, 0x22, 0x33, 0x44, 0x55], false);

    let groups = hal.load_groups().expect("groups");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].ssid.as_deref(), Some("DIRECT-legacy"));
    assert!(hal.set_client_list(3, "02:aa:bb:cc:dd:ee"));
    assert_eq!(hal.get_client_list(3).as_deref(), Some("02:aa:bb:cc:dd:ee"));

    assert!(!hal.set_vendor_elements(&[InformationElement { id: 221, bytes: vec![0x11] }]));
    assert_eq!(supplicant.daemon.calls("set_vendor_elements"), 0);
    assert!(hal.is_initialization_complete());
}

#[test]
fn newest_minor_version_uses_r2_callback() {
    init_logging();
    let (fake, supplicant) = FakeHal::hidl_supplicant(4);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);

    assert_eq!(supplicant.daemon.calls("register_callback_1_4"), 1);
    assert!(supplicant.iface.hidl_callback().is_some());
    assert!(hal.set_mac_randomization(true));
    assert!(hal.set_wfd_r2_device_info("0006000000000000"));
}

#[test]
fn minor_version_zero_looks_the_interface_up() {
    init_logging();
    let (fake, supplicant) = FakeHal::hidl_supplicant(0);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);

    assert_eq!(supplicant.daemon.calls("add_interface"), 0);
    assert_eq!(supplicant.daemon.calls("list_interfaces"), 1);
    assert_eq!(supplicant.daemon.calls("get_interface"), 1);
    // Removing interfaces and terminate are 1.1 additions.
    assert!(!hal.teardown_iface("p2p0"));
}

#[test]
fn supplicant_death_and_reannouncement() {
    init_logging();
    let (fake, supplicant) = FakeHal::hidl_supplicant(2);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);
    let (deaths, handler) = DeathCounter::new();
    hal.register_death_handler(handler);

    supplicant.daemon.kill();
    assert_eq!(deaths.fired(), 1);
    assert!(!hal.is_initialization_complete());
    assert!(hal.is_initialization_started());
    assert!(!hal.find(30));

    fake.hidl.manager().expect("service manager").announce(SUPPLICANT_FQ_NAME);
    assert!(hal.is_initialization_complete());
    assert!(hal.setup_iface("p2p0"));
    assert!(hal.find(30));
}

#[test]
fn service_manager_death_resets_initialization() {
    init_logging();
    let (fake, _) = FakeHal::hidl_supplicant(2);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);
    let (deaths, handler) = DeathCounter::new();
    hal.register_death_handler(handler);

    fake.hidl.manager().expect("service manager").daemon.kill();
    assert_eq!(deaths.fired(), 1);
    assert!(!hal.is_initialization_started());
    assert!(!hal.is_initialization_complete());
}

#[test]
fn terminate_waits_for_death_within_bound() {
    init_logging();
    let (fake, supplicant) = FakeHal::hidl_supplicant(2);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);
    let (deaths, handler) = DeathCounter::new();
    hal.register_death_handler(handler);
    supplicant.daemon.set_confirm_terminate(false);

    let started = Instant::now();
    hal.terminate();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(supplicant.daemon.calls("terminate"), 1);
    assert_eq!(deaths.fired(), 1);
    assert!(!hal.is_initialization_complete());
}
