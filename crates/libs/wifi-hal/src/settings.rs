//! Small persisted integer store shared with the rest of the Wi-Fi stack.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Negotiated version of the versioned supplicant interface.
pub const SUPPLICANT_HAL_AIDL_SERVICE_VERSION: &str = "supplicant_hal_aidl_service_version";
/// Last known framework P2P feature bitmask.
pub const WIFI_P2P_SUPPORTED_FEATURES: &str = "wifi_p2p_supported_features";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] io::Error),

    #[error("settings encoding: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait SettingsStore: Send + Sync {
    fn get_int(&self, key: &str) -> Option<i64>;
    fn put_int(&self, key: &str, value: i64) -> Result<(), SettingsError>;
}

/// In-memory store, used when nothing needs to outlive the process.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<BTreeMap<String, i64>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get_int(&self, key: &str) -> Option<i64> {
        self.values.lock().expect("settings mutex poisoned").get(key).copied()
    }

    fn put_int(&self, key: &str, value: i64) -> Result<(), SettingsError> {
        self.values
            .lock()
            .expect("settings mutex poisoned")
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a JSON object on disk. Every write rewrites the file.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    values: Mutex<BTreeMap<String, i64>>,
}

impl JsonFileSettings {
    /// Opens the store at `path`. A missing file starts empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileSettings {
    fn get_int(&self, key: &str) -> Option<i64> {
        self.values.lock().expect("settings mutex poisoned").get(key).copied()
    }

    fn put_int(&self, key: &str, value: i64) -> Result<(), SettingsError> {
        let mut values = self.values.lock().expect("settings mutex poisoned");
        values.insert(key.to_string(), value);
        let encoded = serde_json::to_string_pretty(&*values)?;
        fs::write(&self.path, encoded)?;
        Ok(())
    }
}
