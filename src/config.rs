//! Configuration file handling
//!
//! The configuration object is owned by the external configuration UI and
//! read-only to the core. It is exchanged as JSON with the field names the
//! UI uses (camelCase where it does), and persisted in the OS data
//! directory next to the alert-state database.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::CgmError;
use crate::units::GlucoseUnit;

/// Which remote data source to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceMode {
    Nightscout,
    Share,
    /// Placeholder for a user-provided source; fetches nothing.
    Rogue,
    /// Nothing configured yet; the cycle emits the setup payload.
    #[default]
    #[serde(alias = "Default", alias = "Other")]
    Unconfigured,
}

/// User configuration, produced by the external configuration UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: SourceMode,
    /// Nightscout base URL. Also the subscription identifier for
    /// Nightscout and Rogue modes.
    pub api: String,
    /// Dexcom Share account. Also the subscription identifier in Share mode.
    #[serde(rename = "accountName")]
    pub account_name: String,
    pub password: String,
    /// Share region; "outside" selects the non-US host.
    pub region: String,
    pub unit: GlucoseUnit,
    /// High alert threshold in the display unit.
    pub high: f64,
    /// Low alert threshold in the display unit.
    pub low: f64,
    /// Vibration intensity preference; the emitted intensity is `vibe + 1`
    /// for a fresh reading and 0 for an already-notified one.
    pub vibe: u32,
    /// Reconstruct uncalibrated glucose from the unfiltered channel.
    pub raw: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: SourceMode::Unconfigured,
            api: String::new(),
            account_name: String::new(),
            password: String::new(),
            region: String::new(),
            unit: GlucoseUnit::MgDl,
            high: 180.0,
            low: 80.0,
            vibe: 1,
            raw: false,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CgmError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write a default configuration file for the user to edit
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<(), CgmError> {
        let config = Config::default();
        fs::write(path, serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }

    /// The account identifier the subscription topic is derived from:
    /// the server URL for Nightscout/Rogue, the account name for Share.
    pub fn account_identifier(&self) -> &str {
        match self.mode {
            SourceMode::Share => &self.account_name,
            _ => &self.api,
        }
    }
}

/// Get the OS-specific data directory for cgmduo
pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cgmduo")
}

/// Ensure the data directory exists
pub fn ensure_data_dir() -> std::io::Result<()> {
    fs::create_dir_all(get_data_dir())
}

/// Path of the JSON configuration file
pub fn config_file_path() -> PathBuf {
    get_data_dir().join("config.json")
}

/// Default path of the alert-state database
pub fn default_state_path() -> PathBuf {
    get_data_dir().join("state.db")
}

/// Load the configuration, falling back to defaults with a warning.
pub fn load_or_default() -> Config {
    Config::load(config_file_path())
        .or_else(|_| Config::load("config.json"))
        .unwrap_or_else(|e| {
            warn!("Could not load config: {}. Using defaults.", e);
            Config::default()
        })
}
