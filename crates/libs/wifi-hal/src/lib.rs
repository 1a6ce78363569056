//! Wi-Fi HAL binding layer.
//!
//! Framework-facing proxies for the Wi-Fi Direct supplicant and the SoftAP
//! hostapd daemon. Each proxy talks to one of two transport generations:
//!
//! - **Versioned (AIDL)**: resolved through a service registry, capabilities
//!   gated on the interface version the daemon reports.
//! - **Legacy (HIDL 1.x)**: connected when the daemon announces itself to the
//!   service manager, capabilities gated on the minor version.
//!
//! The generation is selected once, on the first `initialize`, and never
//! changes for the life of the facade.
//!
//! # Layout
//!
//! - [`p2p`]: [`SupplicantP2pHal`] facade, both P2P backends, the callback
//!   adapters and the [`P2pNative`] startup helper
//! - [`hostapd`]: [`HostapdHal`] facade, both hostapd backends and the
//!   per-interface listener registry
//! - [`death`]: generation-cookie death bookkeeping shared by every proxy
//! - [`rpc`]: the downstream interfaces the proxies call
//! - [`fake`]: in-process daemons used by the tests
//!
//! The library never installs a logger; it only emits through `log`.

pub mod codec;
pub mod config;
pub mod death;
pub mod error;
pub mod fake;
pub mod hostapd;
pub mod p2p;
pub mod rpc;
pub mod settings;
pub mod types;
pub mod version;

pub use config::{HalConfig, SoftApOverlay};
pub use death::{DeathHandler, DeathMonitor};
pub use error::{HalError, HalResult, RemoteError, RemoteResult};
pub use hostapd::{FailureListener, HostapdHal, SoftApHalCallback};
pub use p2p::{BroadcastP2pMonitor, HalTransport, P2pEvent, P2pMonitor, P2pNative, SupplicantP2pHal};
pub use rpc::HalServices;
pub use settings::{JsonFileSettings, MemorySettings, SettingsStore};
