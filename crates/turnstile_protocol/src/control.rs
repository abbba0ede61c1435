//! Live-reload control stream.

use serde::{Deserialize, Serialize};

/// Which context was rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReloadTarget {
    /// Game rules were rebuilt.
    #[serde(alias = "game")]
    Engine,
    /// Presentation code was rebuilt.
    #[serde(alias = "ui")]
    Presentation,
}

/// Events pushed by the build watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlEvent {
    /// A context was rebuilt and must be reloaded.
    Reload {
        /// Rebuilt context.
        target: ReloadTarget,
    },
    /// A build failed.
    BuildError {
        /// Captured stdout.
        out: String,
        /// Captured stderr.
        err: String,
    },
    /// Keepalive.
    Ping,
}
