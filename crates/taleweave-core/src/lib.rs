//! Taleweave Core - room orchestration engine
//!
//! Pairs anonymous participants into fixed-size rooms that build a story in
//! strict turn order:
//! - Matchmaking into the single filling room, with lobby seat reuse
//! - Per-room turn/phase state machine with per-phase input grammar
//! - Wall-clock phase expiry
//! - Reconnection to the same seat through an opaque token
//! - Bounded-retry persistence of the finished artifact on teardown
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use taleweave_core::{EngineConfig, MemorySink, Orchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handle = Orchestrator::new(EngineConfig::new(), Arc::new(MemorySink::new()))?.spawn();
//!
//! let mut link = handle.connect();
//! handle.login(link.id, None)?;
//! while let Some(event) = link.events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod config;
pub mod engine;
pub mod error;
pub mod grammar;
pub mod matchmaker;
pub mod persistence;
pub mod protocol;
pub mod reconnect;
pub mod registry;
pub mod runtime;
pub mod turn;
pub mod types;

// Re-exports for convenience
pub use config::EngineConfig;
pub use engine::{Effect, Engine, EngineStats, Session, Timer};
pub use error::{ConfigError, PersistError, TaleweaveError};
pub use matchmaker::{Matchmaker, Placement};
pub use persistence::{
    ArtifactRecord, ArtifactSink, JsonlSink, MemorySink, PersistenceGateway, SaveReceipt,
};
pub use protocol::{Inbound, Outbound};
pub use reconnect::{Reservation, ReservationBook};
pub use registry::{Room, RoomRegistry, Seat};
pub use runtime::{ClientLink, Orchestrator, OrchestratorHandle};
pub use types::{ConnectionId, Phase, ReconnectToken, RoomId, Slot};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with taleweave
    pub use crate::{
        ArtifactSink, ClientLink, EngineConfig, Inbound, Orchestrator, OrchestratorHandle,
        Outbound, Phase, ReconnectToken, Slot,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
