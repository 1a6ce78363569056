mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{init_logging, p2p_hal, ready_p2p, DeathCounter};
use wifi_hal::fake::FakeHal;
use wifi_hal::rpc::{p2p_frame_type, status};
use wifi_hal::types::{pairing, DiscoveryConfig, InformationElement, MacAddress, P2pConfig, P2pScanType};
use wifi_hal::{HalTransport, P2pEvent};

#[test]
fn selection_happens_once() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(4);
    let (hal, _) = p2p_hal(&fake);

    assert!(hal.initialize());
    assert!(hal.initialize());
    assert_eq!(hal.transport(), Some(HalTransport::Aidl));
    assert_eq!(supplicant.daemon.calls("linkToDeath"), 1);
}

#[test]
fn no_declared_service_fails_fast() {
    init_logging();
    let fake = FakeHal::new();
    let (hal, _) = p2p_hal(&fake);

    let started = Instant::now();
    assert!(!hal.initialize());
    assert!(!hal.find(30));
    assert!(hal.transport().is_none());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn missing_iface_fails_closed_without_remote_calls() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(4);
    let (hal, _) = p2p_hal(&fake);

    assert!(!hal.find(30));
    assert!(hal.initialize());
    let before = supplicant.daemon.total_calls();

    assert!(!hal.find(30));
    assert!(!hal.stop_find());
    assert!(hal.get_device_address().is_none());
    assert!(!hal.group_add(5, true, false));
    assert_eq!(supplicant.daemon.total_calls(), before);
}

#[test]
fn death_clears_handles_before_notifying() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(4);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);

    let cleared = Arc::new(AtomicBool::new(false));
    let seen = cleared.clone();
    let weak = Arc::downgrade(&hal);
    assert!(hal.register_death_handler(Arc::new(move || {
        if let Some(hal) = weak.upgrade() {
            seen.store(
                !hal.is_initialization_complete() && hal.get_device_address().is_none(),
                Ordering::SeqCst,
            );
        }
    })));

    supplicant.daemon.kill();
    assert!(cleared.load(Ordering::SeqCst));
}

#[test]
fn group_add_then_death_fires_once() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(4);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);
    let (deaths, handler) = DeathCounter::new();
    hal.register_death_handler(handler);

    assert!(hal.group_add(5, true, false));
    assert_eq!(supplicant.daemon.calls("create_group_owner"), 1);
    assert_eq!(hal.get_device_address().as_deref(), Some("02:00:5e:10:00:01"));

    supplicant.daemon.kill();
    assert!(hal.get_device_address().is_none());
    assert_eq!(deaths.fired(), 1);

    // A second notification for the same generation changes nothing.
    supplicant.daemon.notify_death(1);
    assert_eq!(deaths.fired(), 1);
}

#[test]
fn terminate_without_confirmation_is_bounded() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(4);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);
    let (deaths, handler) = DeathCounter::new();
    hal.register_death_handler(handler);
    supplicant.daemon.set_confirm_terminate(false);

    let started = Instant::now();
    hal.terminate();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(20));
    assert!(elapsed < Duration::from_secs(2));
    assert!(!hal.is_initialization_complete());
    assert_eq!(deaths.fired(), 1);
}

#[test]
fn confirmed_terminate_fires_handler_once() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(4);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);
    let (deaths, handler) = DeathCounter::new();
    hal.register_death_handler(handler);

    hal.terminate();
    assert_eq!(supplicant.daemon.calls("terminate"), 1);
    assert!(!supplicant.daemon.is_alive());
    assert_eq!(deaths.fired(), 1);
}

#[test]
fn old_interface_versions_degrade() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(1);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);

    assert!(!hal.configure_eapol_ip_address_allocation_params(0x0101a8c0, 0x00ffffff, 0x0501a8c0, 0x0a01a8c0));
    assert_eq!(supplicant.daemon.calls("configure_eapol_ip_address_allocation_params"), 0);

    assert!(hal.group_add(5, true, false));
    assert_eq!(supplicant.daemon.calls("add_group"), 1);
    assert_eq!(supplicant.daemon.calls("create_group_owner"), 0);

    assert!(hal.find_with_params(&DiscoveryConfig::new(P2pScanType::Social, 0), 10));
    assert_eq!(supplicant.daemon.calls("find_on_social_channels"), 1);
    assert_eq!(supplicant.daemon.calls("find_with_params"), 0);

    assert_eq!(hal.get_supported_features(), 0);
    assert!(hal.is_initialization_complete());
}

#[test]
fn rejection_keeps_the_connection() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(4);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);
    let (deaths, handler) = DeathCounter::new();
    hal.register_death_handler(handler);

    supplicant.daemon.reject("find", status::FAILURE_UNKNOWN);
    assert!(!hal.find(30));
    assert!(hal.is_initialization_complete());
    assert_eq!(deaths.fired(), 0);

    supplicant.daemon.clear_failures();
    assert!(hal.find(30));
}

#[test]
fn transport_error_tears_down_and_recovers() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(4);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);
    let (deaths, handler) = DeathCounter::new();
    hal.register_death_handler(handler);

    supplicant.daemon.break_transport("flush");
    assert!(!hal.flush());
    assert!(!hal.is_initialization_complete());
    assert_eq!(deaths.fired(), 1);

    supplicant.daemon.clear_failures();
    ready_p2p(&hal);
    assert!(hal.flush());
    assert_eq!(hal.transport(), Some(HalTransport::Aidl));
}

#[test]
fn stale_death_cookie_is_ignored() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(4);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);
    let (deaths, handler) = DeathCounter::new();
    hal.register_death_handler(handler);

    supplicant.daemon.kill();
    assert_eq!(deaths.fired(), 1);
    ready_p2p(&hal);

    // Generation 1 is gone; only generation 2 may tear the new connection down.
    supplicant.daemon.notify_death(1);
    assert!(hal.is_initialization_complete());
    assert_eq!(deaths.fired(), 1);

    supplicant.daemon.notify_death(2);
    assert!(!hal.is_initialization_complete());
    assert_eq!(deaths.fired(), 2);
}

#[test]
fn connect_uses_parameter_struct_when_available() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(4);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);

    let config = P2pConfig::new("02:11:22:33:44:55").with_group_owner_intent(15);
    assert_eq!(hal.connect(&config, false).as_deref(), Some(""));
    let sent = supplicant.iface.last_connect().expect("connect info");
    assert_eq!(sent.peer_address, [0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
    assert_eq!(sent.go_intent, 15);

    assert!(hal.connect(&P2pConfig::new("not-a-mac"), false).is_none());
    assert_eq!(supplicant.daemon.calls("connect_with_params"), 1);
}

#[test]
fn group_owner_authorization_omits_pairing_fields_before_bootstrapping() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(3);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);

    assert!(hal.authorize_connect_request_on_group_owner(&P2pConfig::new("02:11:22:33:44:55"), "p2p-go0"));
    let sent = supplicant.iface.last_connect().expect("connect info");
    assert_eq!(sent.group_interface_name, None);
    assert_eq!(sent.pairing_bootstrapping_method, pairing::NONE);
    assert_eq!(sent.password, None);
    assert!(!sent.authorize_connection_from_peer);
}

#[test]
fn group_owner_authorization_carries_interface_when_pairing() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(4);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);

    // Plain WPS leaves the pairing fields empty even on a bootstrapping-capable HAL.
    assert!(hal.authorize_connect_request_on_group_owner(&P2pConfig::new("02:11:22:33:44:55"), "p2p-go0"));
    let sent = supplicant.iface.last_connect().expect("connect info");
    assert_eq!(sent.group_interface_name, None);

    let config = P2pConfig::new("02:11:22:33:44:55").with_pairing(pairing::DISPLAY_PINCODE, "1234");
    assert!(hal.authorize_connect_request_on_group_owner(&config, "p2p-go0"));
    let sent = supplicant.iface.last_connect().expect("connect info");
    assert_eq!(sent.group_interface_name.as_deref(), Some("p2p-go0"));
    assert_eq!(sent.pairing_bootstrapping_method, pairing::DISPLAY_PINCODE);
    assert_eq!(sent.password.as_deref(), Some("1234"));
}

#[test]
fn persistent_groups_load_from_stored_networks() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(3);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);
    assert_eq!(hal.load_groups(), Some(Vec::new()));

    supplicant.iface.add_network(0, b"DIRECT-ab-home", [0x02, 0x11, 0x22, 0x33, 0x44, 0x55], true);
    supplicant.iface.add_network(1, b"DIRECT-up", [0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee], false).set_current(true);
    supplicant.iface.add_network(2, &[0xff, 0xfe], [0x02, 0x66, 0x77, 0x88, 0x99, 0x00], false);

    let groups = hal.load_groups().expect("groups");
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].network_id, 0);
    assert_eq!(groups[0].ssid.as_deref(), Some("DIRECT-ab-home"));
    assert_eq!(groups[0].owner, Some(MacAddress([0x02, 0x11, 0x22, 0x33, 0x44, 0x55])));
    assert!(groups[0].is_group_owner);
    // Octets that aren't UTF-8 come back as hex.
    assert_eq!(groups[1].network_id, 2);
    assert_eq!(groups[1].ssid.as_deref(), Some("fffe"));
    assert!(!groups[1].is_group_owner);

    // An unreadable field leaves the group in place.
    supplicant.daemon.reject("is_group_owner", status::FAILURE_UNKNOWN);
    let groups = hal.load_groups().expect("groups");
    assert_eq!(groups.len(), 2);
    assert!(!groups[0].is_group_owner);

    supplicant.daemon.reject("list_networks", status::FAILURE_UNKNOWN);
    assert_eq!(hal.load_groups(), None);
    assert!(hal.is_initialization_complete());
}

#[test]
fn client_lists_are_stored_per_network() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(3);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);
    let network = supplicant.iface.add_network(4, b"DIRECT-xy", [0x02, 0x11, 0x22, 0x33, 0x44, 0x55], true);

    assert!(hal.set_client_list(4, "02:aa:bb:cc:dd:ee  02:11:22:33:44:66"));
    assert_eq!(
        network.clients(),
        vec![vec![0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee], vec![0x02, 0x11, 0x22, 0x33, 0x44, 0x66]]
    );
    assert_eq!(hal.get_client_list(4).as_deref(), Some("02:aa:bb:cc:dd:ee 02:11:22:33:44:66"));

    assert!(!hal.set_client_list(4, ""));
    assert!(!hal.set_client_list(4, "02:aa:bb:cc:dd:ee bogus"));
    assert!(!hal.set_client_list(9, "02:aa:bb:cc:dd:ee"));
    assert_eq!(supplicant.daemon.calls("set_client_list"), 1);
    assert_eq!(hal.get_client_list(9), None);

    network.set_clients(vec![vec![0x02, 0xaa]]);
    assert_eq!(hal.get_client_list(4), None);
}

#[test]
fn vendor_elements_target_p2p_response_frames() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(3);
    let (hal, _) = p2p_hal(&fake);
    ready_p2p(&hal);

    let elements = vec![
        InformationElement { id: 221, bytes: vec![0x00, 0x50, 0xf2, 0x04] },
        InformationElement { id: 221, bytes: vec![0x11] },
    ];
    assert!(hal.set_vendor_elements(&elements));
    assert_eq!(
        supplicant.iface.vendor_elements(),
        Some((p2p_frame_type::PROBE_RESP_P2P, vec![221, 4, 0x00, 0x50, 0xf2, 0x04, 221, 1, 0x11]))
    );

    supplicant.daemon.break_transport("set_vendor_elements");
    assert!(!hal.set_vendor_elements(&elements));
    assert!(!hal.is_initialization_complete());
}

#[test]
fn undecodable_events_are_dropped() {
    init_logging();
    let (fake, supplicant) = FakeHal::aidl_supplicant(4);
    let (hal, monitor) = p2p_hal(&fake);
    let mut rx = monitor.subscribe();
    ready_p2p(&hal);

    let callback = supplicant.iface.aidl_callback().expect("registered callback");
    callback.on_device_lost(&[0x02, 0x11]);
    callback.on_device_lost(&[0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);

    let event = rx.try_recv().expect("decoded event");
    assert_eq!(event.iface, "p2p0");
    assert!(matches!(event.event, P2pEvent::DeviceLost(mac) if mac.to_string() == "02:11:22:33:44:55"));
    assert!(rx.try_recv().is_err());
}
