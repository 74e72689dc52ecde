//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use labuse_core::{DEFAULT_MAX_GRID_MINUTES, ReportConfig, TimelineConfig};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the result cache database.
    pub database_path: PathBuf,

    /// Minutes per day the facility counts as open, for daily percentages.
    pub open_minutes_per_day: u32,

    /// Whether computed timelines are cached between runs.
    pub cache_enabled: bool,

    /// Most recent cached timelines kept after each write. 0 keeps all.
    pub cache_max_entries: usize,

    /// Longest span, in minutes, a timeline may cover.
    pub max_grid_minutes: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("open_minutes_per_day", &self.open_minutes_per_day)
            .field("cache_enabled", &self.cache_enabled)
            .field("cache_max_entries", &self.cache_max_entries)
            .field("max_grid_minutes", &self.max_grid_minutes)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("cache.db"),
            open_minutes_per_day: ReportConfig::default().open_minutes_per_day,
            cache_enabled: true,
            cache_max_entries: 64,
            max_grid_minutes: DEFAULT_MAX_GRID_MINUTES,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (LABUSE_*)
        figment = figment.merge(Env::prefixed("LABUSE_"));

        figment.extract()
    }

    /// Report settings derived from this configuration.
    pub const fn report_config(&self) -> ReportConfig {
        ReportConfig {
            open_minutes_per_day: self.open_minutes_per_day,
        }
    }

    /// Engine limits derived from this configuration.
    pub const fn timeline_config(&self) -> TimelineConfig {
        TimelineConfig {
            max_grid_minutes: self.max_grid_minutes,
        }
    }
}

/// Returns the platform-specific config directory for labuse.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("labuse"))
}

/// Returns the platform-specific data directory for labuse.
///
/// On Linux: `~/.local/share/labuse`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("labuse"))
}
