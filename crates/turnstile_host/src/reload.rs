//! Live-reload handling.

use crate::engine::EngineLauncher;
use crate::host::Host;
use derive_more::Display;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use turnstile_protocol::{ControlEvent, ReloadTarget};

/// Something the operator should see, like a build-error banner.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize)]
#[serde(
    tag = "type",
    content = "detail",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum OperatorNotice {
    /// Reprocessing kept only a prefix of the history.
    #[display("replay halted at move {}: {}", index, reason)]
    ReplayHalted {
        /// Index of the first move the engine rejected.
        index: usize,
        /// Engine's reason.
        reason: String,
    },
    /// Reprocessing could not even rebuild genesis.
    #[display("reprocess failed: {}", _0)]
    ReprocessFailed(String),
    /// A watched build failed.
    #[display("build error:\n{}{}", out, err)]
    BuildError {
        /// Captured stdout.
        out: String,
        /// Captured stderr.
        err: String,
    },
    /// A context was reloaded.
    #[display("{} reloaded", _0)]
    Reloaded(ReloadTarget),
}

/// Reacts to control events by relaunching contexts and rebuilding state.
pub struct ReloadCoordinator {
    launcher: Arc<dyn EngineLauncher>,
}

impl std::fmt::Debug for ReloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadCoordinator").finish_non_exhaustive()
    }
}

impl ReloadCoordinator {
    /// Uses `launcher` to start replacement engine contexts.
    pub fn new(launcher: Arc<dyn EngineLauncher>) -> Self {
        Self { launcher }
    }

    /// Handles one control event to completion.
    ///
    /// An engine reload supersedes whatever was displayed: the old context
    /// is torn down, a fresh one launched, and history replayed against it
    /// before live traffic resumes.
    #[instrument(skip(self, host))]
    pub async fn handle(&self, host: &mut Host, event: ControlEvent) {
        match event {
            ControlEvent::Reload {
                target: ReloadTarget::Engine,
            } => {
                info!("Engine rebuilt, reprocessing history");
                host.replace_engine(self.launcher.launch());
                match host.reprocess().await {
                    Ok(report) if report.error.is_none() => {
                        debug!(replayed = report.replayed, "Reprocess complete");
                    }
                    Ok(report) => {
                        warn!(
                            replayed = report.replayed,
                            total = report.total,
                            "Reprocess kept a prefix"
                        );
                    }
                    Err(e) => warn!(error = %e, "Reprocess failed"),
                }
                host.notify(OperatorNotice::Reloaded(ReloadTarget::Engine));
            }
            ControlEvent::Reload {
                target: ReloadTarget::Presentation,
            } => {
                info!("Presentation rebuilt, re-pushing view");
                host.refresh_presentation().await;
                host.notify(OperatorNotice::Reloaded(ReloadTarget::Presentation));
            }
            ControlEvent::BuildError { out, err } => {
                warn!("Build failed");
                host.notify(OperatorNotice::BuildError { out, err });
            }
            ControlEvent::Ping => debug!("Control ping"),
        }
    }
}
