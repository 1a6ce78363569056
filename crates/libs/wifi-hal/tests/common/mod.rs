#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wifi_hal::fake::FakeHal;
use wifi_hal::{BroadcastP2pMonitor, DeathHandler, HalConfig, P2pMonitor, SupplicantP2pHal};

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// Short waits so timeouts stay cheap.
pub fn test_config() -> HalConfig {
    HalConfig {
        wait_for_death_timeout_ms: 20,
        poll_interval_ms: 5,
        max_poll_samples: 4,
        ..HalConfig::default()
    }
}

pub struct DeathCounter {
    count: Arc<AtomicUsize>,
}

impl DeathCounter {
    pub fn new() -> (Self, Arc<dyn DeathHandler>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handler: Arc<dyn DeathHandler> = Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (Self { count }, handler)
    }

    pub fn fired(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

pub fn p2p_hal(fake: &FakeHal) -> (Arc<SupplicantP2pHal>, Arc<BroadcastP2pMonitor>) {
    let monitor = Arc::new(BroadcastP2pMonitor::new(16));
    let sink: Arc<dyn P2pMonitor> = monitor.clone();
    let hal = Arc::new(SupplicantP2pHal::new(fake.services(), sink, test_config()));
    (hal, monitor)
}

/// Initializes `hal` and sets up `p2p0`.
pub fn ready_p2p(hal: &SupplicantP2pHal) {
    assert!(hal.initialize(), "initialize");
    assert!(hal.setup_iface("p2p0"), "setup_iface");
}
