mod common;

use std::fs;
use std::sync::Arc;

use common::{init_logging, DeathCounter};
use wifi_hal::fake::FakeHal;
use wifi_hal::rpc::p2p_feature;
use wifi_hal::settings::{SUPPLICANT_HAL_AIDL_SERVICE_VERSION, WIFI_P2P_SUPPORTED_FEATURES};
use wifi_hal::types::features;
use wifi_hal::{
    BroadcastP2pMonitor, HalConfig, HalServices, JsonFileSettings, P2pMonitor, P2pNative, SettingsStore,
    SupplicantP2pHal,
};

fn native_with(fake: &FakeHal, settings: Arc<JsonFileSettings>, config: HalConfig) -> P2pNative {
    let services = HalServices {
        registry: fake.registry.clone(),
        hidl: fake.hidl.clone(),
        settings,
    };
    let monitor: Arc<dyn P2pMonitor> = Arc::new(BroadcastP2pMonitor::new(4));
    P2pNative::new(Arc::new(SupplicantP2pHal::new(services, monitor, config)))
}

#[test]
fn config_file_drives_the_stack() {
    init_logging();
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("wifi-hal.toml");
    fs::write(
        &config_path,
        r#"
        wait_for_death_timeout_ms = 10
        poll_interval_ms = 1
        max_poll_samples = 2
        verbose_logging = true
        "#,
    )
    .expect("write config");
    let config = HalConfig::from_path(&config_path).expect("load config");
    assert_eq!(config.max_poll_samples, 2);
    assert_eq!(config.hal_instance_name, "default");

    let (fake, supplicant) = FakeHal::aidl_supplicant(3);
    let settings = Arc::new(JsonFileSettings::open(dir.path().join("settings.json")).expect("open"));
    let native = native_with(&fake, settings, config);
    let (_, handler) = DeathCounter::new();
    assert!(native.setup_interface("p2p0", handler).is_some());
    assert_eq!(supplicant.daemon.calls("set_debug_params"), 1);
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(HalConfig::from_path(dir.path().join("absent.toml")).is_err());

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "max_poll_samples = \"many\"").expect("write config");
    let err = HalConfig::from_path(&bad).expect_err("type mismatch");
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn negotiated_features_survive_restart() {
    init_logging();
    let dir = tempfile::tempdir().expect("tempdir");
    let settings_path = dir.path().join("settings.json");
    let config = HalConfig {
        wait_for_death_timeout_ms: 10,
        poll_interval_ms: 1,
        max_poll_samples: 2,
        ..HalConfig::default()
    };

    {
        let (fake, supplicant) = FakeHal::aidl_supplicant(4);
        supplicant
            .iface
            .set_feature_set(p2p_feature::V2 | p2p_feature::PCC_MODE_WPA3_COMPATIBILITY);
        let settings = Arc::new(JsonFileSettings::open(&settings_path).expect("open"));
        let native = native_with(&fake, settings, config.clone());
        let (_, handler) = DeathCounter::new();
        assert!(native.setup_interface("p2p0", handler).is_some());
        native.teardown_interface();
    }

    let reopened = Arc::new(JsonFileSettings::open(&settings_path).expect("reopen"));
    assert_eq!(reopened.get_int(SUPPLICANT_HAL_AIDL_SERVICE_VERSION), Some(4));
    assert_eq!(
        reopened.get_int(WIFI_P2P_SUPPORTED_FEATURES),
        Some((features::WIFI_DIRECT_R2 | features::PCC_MODE_ALLOW_LEGACY_AND_R2_CONNECTION) as i64)
    );

    // A fresh process knows the feature set before any supplicant is up.
    let fake = FakeHal::new();
    let native = native_with(&fake, reopened, config);
    assert!(native.is_wifi_direct_r2_supported());
    assert!(native.is_pcc_mode_allow_legacy_and_r2_supported());
    assert_ne!(native.supported_features() & features::GROUP_OWNER_IPV6_LINK_LOCAL_ADDRESS_PROVIDED, 0);
}
