use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::types::Band;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct HalConfig {
    /// Bounded wait for death confirmation after `terminate`.
    pub wait_for_death_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub max_poll_samples: u32,
    /// Instance suffix of the versioned services, `<descriptor>/<instance>`.
    pub hal_instance_name: String,
    pub verbose_logging: bool,
    pub show_keys: bool,
    pub softap: SoftApOverlay,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            wait_for_death_timeout_ms: 50,
            poll_interval_ms: 100,
            max_poll_samples: 50,
            hal_instance_name: "default".to_string(),
            verbose_logging: false,
            show_keys: false,
            softap: SoftApOverlay::default(),
        }
    }
}

/// Device capabilities and OEM channel lists used to build hostapd parameters.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SoftApOverlay {
    pub acs_supported: bool,
    pub ieee80211ac_supported: bool,
    pub ieee80211ax_supported: bool,
    pub ieee80211be_supported: bool,
    pub band_6ghz_supported: bool,
    pub acs_channels_2g: Vec<u32>,
    pub acs_channels_5g: Vec<u32>,
    pub acs_channels_6g: Vec<u32>,
}

impl Default for SoftApOverlay {
    fn default() -> Self {
        Self {
            acs_supported: true,
            ieee80211ac_supported: true,
            ieee80211ax_supported: false,
            ieee80211be_supported: false,
            band_6ghz_supported: false,
            acs_channels_2g: (1..=11).collect(),
            acs_channels_5g: vec![36, 40, 44, 48, 149, 153, 157, 161, 165],
            acs_channels_6g: Vec::new(),
        }
    }
}

impl SoftApOverlay {
    pub fn acs_channels(&self, band: Band) -> &[u32] {
        match band {
            Band::Band2Ghz => &self.acs_channels_2g,
            Band::Band5Ghz => &self.acs_channels_5g,
            Band::Band6Ghz => &self.acs_channels_6g,
            Band::Band60Ghz => &[],
        }
    }
}

impl HalConfig {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }

    pub fn wait_for_death_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_for_death_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_uses_defaults() {
        let config = HalConfig::from_toml("").expect("parse");
        assert_eq!(config, HalConfig::default());
        assert_eq!(config.wait_for_death_timeout(), Duration::from_millis(50));
        assert_eq!(config.max_poll_samples, 50);
    }

    #[test]
    fn softap_section_overrides_channels() {
        let config = HalConfig::from_toml(
            r#"
            verbose_logging = true

            [softap]
            acs_channels_2g = [1, 6, 11]
            band_6ghz_supported = true
            "#,
        )
        .expect("parse");
        assert!(config.verbose_logging);
        assert_eq!(config.softap.acs_channels(Band::Band2Ghz), &[1, 6, 11]);
        assert!(config.softap.band_6ghz_supported);
        assert!(config.softap.acs_supported);
    }
}
