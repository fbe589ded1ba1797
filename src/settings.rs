use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
    time::Duration,
};

const DEBUG_RESYNC_SECS: u64 = 5;

/// Where the client connects and how often it reconciles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    pub channel_url: String,
    pub api_base_url: String,
    /// First frame sent after the socket opens.
    pub channel_session_id: String,
    /// 0 turns periodic reconciliation off.
    pub resync_interval_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            channel_url: "ws://localhost:9000".into(),
            api_base_url: "http://localhost:8000/api".into(),
            channel_session_id: "0".into(),
            resync_interval_secs: 30,
            fetch_timeout_secs: 10,
        }
    }
}

impl ClientSettings {
    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_secs > 0).then(|| Duration::from_secs(self.resync_interval_secs))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Applies `OPSTRACK_*` overrides read through `var`.
    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var("OPSTRACK_CHANNEL_URL") {
            self.channel_url = url;
        }
        if let Some(url) = var("OPSTRACK_API_URL") {
            self.api_base_url = url;
        }
        let debug_mode = var("OPSTRACK_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            self.resync_interval_secs = DEBUG_RESYNC_SECS;
        }
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ClientSettings>,
}

impl SettingsStore {
    /// Reads `path` if it exists, falling back to defaults, then applies
    /// environment overrides. A file that does not parse is reported and
    /// replaced by defaults rather than failing startup.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let stored = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings in {}: {err}", path.display());
                ClientSettings::default()
            })
        } else {
            info!("No settings at {}, using defaults", path.display());
            ClientSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(stored.with_overrides(|key| std::env::var(key).ok())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> ClientSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: ClientSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &ClientSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
