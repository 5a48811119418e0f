use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::Path, path::PathBuf, time::Duration};

use crate::{model::Location, provider::OpenWeatherProvider, settings::Settings};

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
///
/// [dashboard]
/// temperature_unit = "C"
/// update_interval_minutes = 5
/// alert_threshold = 35.0
///
/// [[locations]]
/// name = "Delhi"
/// latitude = 28.6139
/// longitude = 77.209
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub dashboard: Settings,

    #[serde(default = "default_locations")]
    pub locations: Vec<Location>,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// The six metro areas the dashboard tracks out of the box.
pub fn default_locations() -> Vec<Location> {
    vec![
        Location::new("Delhi", 28.6139, 77.209),
        Location::new("Mumbai", 19.076, 72.8777),
        Location::new("Chennai", 13.0827, 80.2707),
        Location::new("Bangalore", 12.9716, 77.5946),
        Location::new("Kolkata", 22.5726, 88.3639),
        Location::new("Hyderabad", 17.385, 78.4867),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            dashboard: Settings::default(),
            locations: default_locations(),
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatherdash", "weatherdash")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    /// API key from the environment if set, otherwise from the file.
    pub fn api_key(&self) -> Option<String> {
        resolve_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.as_deref())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn location(&self, name: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.name == name)
    }

    /// Check the location set and dashboard settings for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.locations.is_empty() {
            bail!("No locations configured. Add at least one [[locations]] entry.");
        }

        let mut seen = HashSet::new();
        for loc in &self.locations {
            if !seen.insert(loc.name.as_str()) {
                bail!("Duplicate location name '{}'", loc.name);
            }
            if !(loc.latitude.is_finite() && (-90.0..=90.0).contains(&loc.latitude)) {
                bail!("Location '{}' has invalid latitude {}", loc.name, loc.latitude);
            }
            if !(loc.longitude.is_finite() && (-180.0..=180.0).contains(&loc.longitude)) {
                bail!("Location '{}' has invalid longitude {}", loc.name, loc.longitude);
            }
        }

        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than 0");
        }

        self.dashboard
            .validate(&self.locations)
            .context("Invalid [dashboard] settings")?;

        Ok(())
    }
}

fn resolve_api_key(from_env: Option<String>, from_file: Option<&str>) -> Option<String> {
    from_env
        .filter(|k| !k.trim().is_empty())
        .or_else(|| from_file.map(str::to_owned))
        .filter(|k| !k.trim().is_empty())
}

/// Construct the OpenWeather source from config.
pub fn source_from_config(config: &Config) -> Result<OpenWeatherProvider> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow!(
            "No OpenWeather API key configured.\n\
             Hint: run `weatherdash configure` or set {API_KEY_ENV}."
        )
    })?;

    OpenWeatherProvider::new(api_key, config.request_timeout())
        .context("Failed to build OpenWeather HTTP client")
}
