//! Host configuration, read from a TOML game manifest.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use turnstile_protocol::{User, UserId};

/// Session-level knobs for a hosted game.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct HostConfig {
    /// Fewest players the game can start with.
    #[serde(default = "default_min_players")]
    min_players: usize,

    /// Most players the game can seat.
    #[serde(default = "default_max_players")]
    max_players: usize,

    /// Seat count offered before the host changes it.
    #[serde(default)]
    default_players: Option<usize>,

    /// User holding host privileges.
    #[serde(default = "default_host_user")]
    host_user: UserId,

    /// Users who may attach a presentation surface.
    #[serde(default = "default_users")]
    users: Vec<User>,

    /// Palette offered to seated players.
    #[serde(default = "default_colors")]
    colors: Vec<String>,

    /// Gate start on every seated player being ready.
    #[serde(default = "default_true")]
    require_ready: bool,

    /// Start automatically once seats are filled and ready.
    #[serde(default)]
    auto_start: bool,

    /// Follow the player whose turn it is after each move.
    #[serde(default = "default_true")]
    auto_switch: bool,

    /// Directory for named save states.
    #[serde(default = "default_save_dir")]
    save_dir: PathBuf,
}

fn default_min_players() -> usize {
    1
}

fn default_max_players() -> usize {
    10
}

fn default_host_user() -> UserId {
    "0".to_string()
}

fn default_users() -> Vec<User> {
    [
        "Ada", "Bashir", "Chiara", "Dmitri", "Esi", "Farah", "Goran", "Hana", "Ilse", "Jun",
    ]
    .iter()
    .enumerate()
    .map(|(i, name)| User {
        id: i.to_string(),
        name: name.to_string(),
    })
    .collect()
}

fn default_colors() -> Vec<String> {
    [
        "#d50000", "#00695c", "#304ffe", "#ff6f00", "#7c4dff", "#ffa825", "#f2d330", "#43a047",
        "#004d40", "#795a4f",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

fn default_true() -> bool {
    true
}

fn default_save_dir() -> PathBuf {
    PathBuf::from(".save-states")
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            min_players: default_min_players(),
            max_players: default_max_players(),
            default_players: None,
            host_user: default_host_user(),
            users: default_users(),
            colors: default_colors(),
            require_ready: true,
            auto_start: false,
            auto_switch: true,
            save_dir: default_save_dir(),
        }
    }
}

impl HostConfig {
    /// Creates a configuration with the given player bounds and defaults elsewhere.
    #[instrument]
    pub fn with_players(min_players: usize, max_players: usize) -> Self {
        Self {
            min_players,
            max_players,
            ..Self::default()
        }
    }

    /// Loads configuration from TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        info!(
            min_players = config.min_players,
            max_players = config.max_players,
            "Config loaded successfully"
        );
        Ok(config)
    }

    /// Loads configuration from `path` if it exists, defaults otherwise.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            info!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Checks internal consistency.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_players == 0 || self.min_players > self.max_players {
            return Err(ConfigError::new(format!(
                "Invalid player bounds: min {} max {}",
                self.min_players, self.max_players
            )));
        }
        if !self.users.iter().any(|u| u.id == self.host_user) {
            return Err(ConfigError::new(format!(
                "Host user '{}' is not in the user roster",
                self.host_user
            )));
        }
        Ok(())
    }

    /// Seat count offered before the host picks one.
    pub fn initial_seat_count(&self) -> usize {
        self.default_players
            .unwrap_or(self.min_players)
            .clamp(self.min_players, self.max_players)
    }

    /// Overrides the save directory.
    pub fn with_save_dir(mut self, save_dir: impl Into<PathBuf>) -> Self {
        self.save_dir = save_dir.into();
        self
    }

    /// Overrides readiness gating.
    pub fn with_require_ready(mut self, require_ready: bool) -> Self {
        self.require_ready = require_ready;
        self
    }

    /// Overrides auto-start.
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Overrides auto-switch.
    pub fn with_auto_switch(mut self, auto_switch: bool) -> Self {
        self.auto_switch = auto_switch;
        self
    }

    /// Looks up a roster user.
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
