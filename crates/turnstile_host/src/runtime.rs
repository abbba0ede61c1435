//! The host's single event loop.

use crate::error::HostError;
use crate::host::{Host, ReplayReport};
use crate::reload::ReloadCoordinator;
use crate::snapshot::{SaveStateEntry, SnapshotStore};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument};
use turnstile_protocol::{ControlEvent, RandomSeed, UserId};

/// Out-of-band action requested by the operator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OperatorRequest {
    /// Pin the display to a history index (`-1` for genesis).
    View {
        /// History index.
        index: i64,
    },
    /// Truncate history after an index (`-1` for genesis).
    Revert {
        /// History index.
        index: i64,
    },
    /// Back to phase `new`.
    ResetGame,
    /// New seed, then reset.
    Reseed {
        /// Seed to use, generated if absent.
        #[serde(default)]
        seed: Option<RandomSeed>,
    },
    /// Rebuild history against the current engine.
    Reprocess,
    /// Save the running game.
    Save {
        /// Save name.
        name: String,
    },
    /// Load and reprocess a save.
    Load {
        /// Save name.
        name: String,
    },
    /// List saves.
    ListSaves,
    /// Delete a save.
    DeleteSave {
        /// Save name.
        name: String,
    },
    /// Attach a different user's surface.
    SwitchViewer {
        /// Roster user.
        user: UserId,
    },
    /// Toggle auto-switch.
    SetAutoSwitch {
        /// New setting.
        enabled: bool,
    },
}

/// Outcome of an [`OperatorRequest`].
#[derive(Debug)]
pub enum OperatorReply {
    /// Done, nothing to report.
    Done,
    /// History entries dropped by a revert.
    Reverted(usize),
    /// Reprocess result.
    Report(ReplayReport),
    /// Stored saves.
    Saves(Vec<SaveStateEntry>),
    /// The request failed.
    Failed(HostError),
}

impl OperatorReply {
    /// JSON form for line-oriented consoles.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Done => json!({ "ok": true }),
            Self::Reverted(removed) => json!({ "ok": true, "removed": removed }),
            Self::Report(report) => json!({
                "ok": true,
                "replayed": report.replayed,
                "total": report.total,
                "error": report.error.as_ref().map(HostError::reason),
            }),
            Self::Saves(saves) => json!({ "ok": true, "saves": saves }),
            Self::Failed(e) => json!({ "ok": false, "error": e.reason() }),
        }
    }
}

impl From<Result<(), HostError>> for OperatorReply {
    fn from(result: Result<(), HostError>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(e) => Self::Failed(e),
        }
    }
}

/// An [`OperatorRequest`] paired with where to send its reply.
#[derive(Debug)]
pub struct OperatorCommand {
    /// What to do.
    pub request: OperatorRequest,
    /// Where the outcome goes.
    pub reply: oneshot::Sender<OperatorReply>,
}

impl OperatorCommand {
    /// Pairs `request` with a fresh reply channel.
    pub fn new(request: OperatorRequest) -> (Self, oneshot::Receiver<OperatorReply>) {
        let (reply, rx) = oneshot::channel();
        (Self { request, reply }, rx)
    }
}

/// Owns the host and feeds it one event at a time.
pub struct HostRuntime {
    host: Host,
    reload: ReloadCoordinator,
    store: Arc<dyn SnapshotStore>,
}

impl std::fmt::Debug for HostRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRuntime")
            .field("host", &self.host)
            .field("reload", &self.reload)
            .finish_non_exhaustive()
    }
}

impl HostRuntime {
    /// Assembles a runtime.
    pub fn new(host: Host, reload: ReloadCoordinator, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            host,
            reload,
            store,
        }
    }

    /// Runs until the presentation pipe closes, then hands the host back.
    ///
    /// Intents, control events and operator commands are drained from one
    /// `select!`. Each is handled to completion before the next is taken,
    /// so no two intents ever overlap.
    #[instrument(skip_all)]
    pub async fn run(
        mut self,
        mut intents: mpsc::UnboundedReceiver<String>,
        mut control: mpsc::UnboundedReceiver<ControlEvent>,
        mut commands: mpsc::UnboundedReceiver<OperatorCommand>,
    ) -> Host {
        let mut control_open = true;
        let mut commands_open = true;
        info!("Host event loop started");

        loop {
            tokio::select! {
                text = intents.recv() => match text {
                    Some(text) => self.host.handle_text(&text).await,
                    None => {
                        info!("Presentation closed, stopping");
                        break;
                    }
                },
                event = control.recv(), if control_open => match event {
                    Some(event) => self.reload.handle(&mut self.host, event).await,
                    None => {
                        debug!("Control stream closed");
                        control_open = false;
                    }
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.execute(command).await,
                    None => {
                        debug!("Operator stream closed");
                        commands_open = false;
                    }
                },
            }
        }

        self.host
    }

    #[instrument(skip(self, command), fields(request = ?command.request))]
    async fn execute(&mut self, command: OperatorCommand) {
        let OperatorCommand { request, reply } = command;
        let host = &mut self.host;
        let store = self.store.as_ref();
        let outcome = match request {
            OperatorRequest::View { index } => host.view(index).await.into(),
            OperatorRequest::Revert { index } => match host.revert(index).await {
                Ok(removed) => OperatorReply::Reverted(removed),
                Err(e) => OperatorReply::Failed(e),
            },
            OperatorRequest::ResetGame => {
                host.reset_game().await;
                OperatorReply::Done
            }
            OperatorRequest::Reseed { seed } => {
                host.reseed(seed).await;
                OperatorReply::Done
            }
            OperatorRequest::Reprocess => report(host.reprocess().await),
            OperatorRequest::Save { name } => host.save(store, &name).await.into(),
            OperatorRequest::Load { name } => report(host.load(store, &name).await),
            OperatorRequest::ListSaves => match store.list().await {
                Ok(saves) => OperatorReply::Saves(saves),
                Err(e) => OperatorReply::Failed(e),
            },
            OperatorRequest::DeleteSave { name } => store.delete(&name).await.into(),
            OperatorRequest::SwitchViewer { user } => host.switch_viewer(&user).await.into(),
            OperatorRequest::SetAutoSwitch { enabled } => {
                host.set_auto_switch(enabled);
                OperatorReply::Done
            }
        };
        if reply.send(outcome).is_err() {
            debug!("Operator stopped waiting for reply");
        }
    }
}

fn report(result: Result<ReplayReport, HostError>) -> OperatorReply {
    match result {
        Ok(report) => OperatorReply::Report(report),
        Err(e) => OperatorReply::Failed(e),
    }
}
