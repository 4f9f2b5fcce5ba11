//! Testing utilities for the taleweave workspace
//!
//! Shared fixtures, sinks with scripted failures, and effect filters.

#![allow(missing_docs)]

use parking_lot::Mutex;
use std::time::Duration;
use taleweave_core::{
    ArtifactRecord, ArtifactSink, ConnectionId, Effect, Engine, EngineConfig, Outbound,
    PersistError, ReconnectToken, RoomId, Timer,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Sink that fails a scripted number of times before storing
#[derive(Debug, Default)]
pub struct FlakySink {
    failures_left: Mutex<u32>,
    calls: Mutex<u32>,
    records: Mutex<Vec<ArtifactRecord>>,
}

impl FlakySink {
    /// Fail the first `failures` inserts with a transient error
    pub fn failing(failures: u32) -> Self {
        Self {
            failures_left: Mutex::new(failures),
            ..Self::default()
        }
    }

    /// Never succeed
    pub fn broken() -> Self {
        Self::failing(u32::MAX)
    }

    /// Insert attempts seen
    pub fn calls(&self) -> u32 {
        *self.calls.lock()
    }

    /// Records stored
    pub fn records(&self) -> Vec<ArtifactRecord> {
        self.records.lock().clone()
    }
}

#[async_trait::async_trait]
impl ArtifactSink for FlakySink {
    async fn insert(&self, record: ArtifactRecord) -> Result<(), PersistError> {
        *self.calls.lock() += 1;
        let mut left = self.failures_left.lock();
        if *left > 0 {
            *left -= 1;
            return Err(PersistError::Unavailable("scripted failure".to_string()));
        }
        drop(left);
        self.records.lock().push(record);
        Ok(())
    }
}

/// Config with short, distinct timers for tests
pub fn test_config(capacity: u32) -> EngineConfig {
    EngineConfig::new()
        .with_capacity(capacity)
        .with_phase_durations(Duration::from_secs(30), Duration::from_secs(45))
        .with_grace(Duration::from_secs(10))
        .with_persist_policy(3, Duration::from_secs(1))
}

pub fn setup_engine(capacity: u32) -> Engine {
    Engine::new(test_config(capacity)).unwrap()
}

/// Messages sent to `connection`, in order
pub fn sent_to(effects: &[Effect], connection: ConnectionId) -> Vec<Outbound> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Send { to, message } if *to == connection => Some(message.clone()),
            _ => None,
        })
        .collect()
}

/// Recipients of any message
pub fn recipients(effects: &[Effect]) -> Vec<ConnectionId> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Send { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}

/// Timers scheduled by `effects`
pub fn timers(effects: &[Effect]) -> Vec<(Duration, Timer)> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Schedule { after, timer } => Some((*after, *timer)),
            _ => None,
        })
        .collect()
}

/// Records handed to persistence
pub fn persisted(effects: &[Effect]) -> Vec<ArtifactRecord> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Persist { record } => Some(record.clone()),
            _ => None,
        })
        .collect()
}

/// Token issued to `connection`
pub fn issued_token(effects: &[Effect], connection: ConnectionId) -> Option<ReconnectToken> {
    sent_to(effects, connection).into_iter().find_map(|m| match m {
        Outbound::NewToken { token } => Some(token),
        _ => None,
    })
}

/// A seated participant
#[derive(Debug, Clone, Copy)]
pub struct Seated {
    pub connection: ConnectionId,
    pub token: ReconnectToken,
    pub room: RoomId,
}

/// Log in `count` connections starting at id `first`
///
/// Returns the participants and the effects of the last login.
pub fn seat_many(engine: &mut Engine, first: u64, count: u32) -> (Vec<Seated>, Vec<Effect>) {
    let mut seated = Vec::new();
    let mut last = Vec::new();
    for n in 0..u64::from(count) {
        let connection = ConnectionId(first + n);
        let effects = engine.login(connection, None);
        let token = issued_token(&effects, connection).unwrap();
        let room = engine.session(connection).unwrap().room;
        seated.push(Seated {
            connection,
            token,
            room,
        });
        last = effects;
    }
    (seated, last)
}

/// Drain everything already queued on a client's event stream
pub fn drain(events: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
