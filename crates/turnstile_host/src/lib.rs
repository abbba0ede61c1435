//! Turnstile host - the session orchestrator.
//!
//! The host is the single authority over a turn-based game session. It
//! talks to a sandboxed rules engine and a presentation surface only
//! through serialized messages, and turns that into a deterministic,
//! replayable, persistable session.
//!
//! # Architecture
//!
//! - **Registry / Channel**: correlation ids over JSON text pipes
//! - **Engine adapter**: `initialize`, `apply_move`, `project_view` as async calls
//! - **History**: append-only log with view, revert and replay
//! - **Session / Host**: phase, seating, turn and authority checks
//! - **Snapshots**: named save states, always replayed on load
//! - **Reload**: rebuilds history when the engine changes under it
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use turnstile_guesser::NumberGuesser;
//! use turnstile_host::{Host, HostConfig, spawn_engine};
//! use turnstile_protocol::{Intent, RandomSeed};
//!
//! # async fn example() {
//! let (presentation, _events) = tokio::sync::mpsc::unbounded_channel();
//! let engine = spawn_engine(Arc::new(NumberGuesser));
//! let mut host = Host::new(HostConfig::default(), RandomSeed::generate(), engine, presentation);
//! host.handle_intent(Intent::Ready).await;
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod channel;
mod config;
mod engine;
mod error;
mod history;
mod host;
mod presentation;
mod registry;
mod reload;
mod runtime;
mod session;
mod snapshot;

// Crate-level exports - Configuration
pub use config::{ConfigError, HostConfig};

// Crate-level exports - Errors
pub use error::{HostError, HostErrorKind};

// Crate-level exports - Message plumbing
pub use channel::{Channel, ContextKind, Endpoint, Outbox};
pub use registry::{CorrelationRegistry, Settlement};

// Crate-level exports - Engine
pub use engine::{
    EngineAdapter, EngineLauncher, GameEngine, PlayerView, rules_launcher, spawn_engine,
};

// Crate-level exports - History
pub use history::{
    HistoryEntry, HistoryLog, HistoryPoint, InitialStateRecord, ReplayOutcome, replay,
};

// Crate-level exports - Session and host
pub use host::{Host, ReplayReport};
pub use presentation::{AutoSwitch, Broadcaster, StayPut, ViewerPolicy};
pub use session::{Session, SessionPhase};

// Crate-level exports - Persistence
pub use snapshot::{FileSnapshotStore, SaveState, SaveStateEntry, SnapshotStore};

// Crate-level exports - Reload and event loop
pub use reload::{OperatorNotice, ReloadCoordinator};
pub use runtime::{HostRuntime, OperatorCommand, OperatorReply, OperatorRequest};
