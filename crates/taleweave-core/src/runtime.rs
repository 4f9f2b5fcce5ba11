//! Orchestrator runtime
//!
//! One tokio task owns the [`Engine`] and processes commands, timer firings
//! and persistence completions one at a time. Timers are futures polled by
//! that task, so a firing is just another event in the stream; nothing is
//! cancelled eagerly, a stale timer is a no-op inside the engine. Saves run
//! on a `JoinSet` so slow sinks never hold up other rooms.

use crate::config::EngineConfig;
use crate::engine::{Effect, Engine, EngineStats, Timer};
use crate::error::{PersistError, TaleweaveError};
use crate::persistence::{ArtifactSink, PersistenceGateway, SaveReceipt};
use crate::protocol::{Inbound, Outbound};
use crate::types::{ConnectionId, ReconnectToken, RoomId};
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

type Outboxes = Arc<DashMap<ConnectionId, mpsc::UnboundedSender<Outbound>>>;
type SaveOutcome = (RoomId, Result<SaveReceipt, PersistError>);

/// Messages to the orchestrator task
#[derive(Debug)]
enum Command {
    Event {
        connection: ConnectionId,
        event: Inbound,
    },
    Stats(oneshot::Sender<EngineStats>),
    Shutdown(oneshot::Sender<()>),
}

/// A registered connection and its outbound event stream
#[derive(Debug)]
pub struct ClientLink {
    /// Connection identifier to use with the handle
    pub id: ConnectionId,
    /// Events pushed to this connection
    pub events: mpsc::UnboundedReceiver<Outbound>,
}

/// Cloneable entry point used by transport glue
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::UnboundedSender<Command>,
    outboxes: Outboxes,
    next_connection: Arc<AtomicU64>,
}

impl OrchestratorHandle {
    /// Register a new transport connection
    #[must_use]
    pub fn connect(&self) -> ClientLink {
        let id = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.outboxes.insert(id, tx);
        ClientLink { id, events: rx }
    }

    /// Forward an inbound event
    ///
    /// # Errors
    /// `TaleweaveError::OrchestratorStopped` after shutdown
    pub fn send(&self, connection: ConnectionId, event: Inbound) -> Result<(), TaleweaveError> {
        self.commands
            .send(Command::Event { connection, event })
            .map_err(|_| TaleweaveError::OrchestratorStopped)
    }

    /// `login` event
    ///
    /// # Errors
    /// `TaleweaveError::OrchestratorStopped` after shutdown
    pub fn login(
        &self,
        connection: ConnectionId,
        token: Option<ReconnectToken>,
    ) -> Result<(), TaleweaveError> {
        self.send(connection, Inbound::Login { token })
    }

    /// `submitTurn` event
    ///
    /// # Errors
    /// `TaleweaveError::OrchestratorStopped` after shutdown
    pub fn submit(
        &self,
        connection: ConnectionId,
        text: impl Into<String>,
    ) -> Result<(), TaleweaveError> {
        self.send(connection, Inbound::SubmitTurn { text: text.into() })
    }

    /// Transport-level disconnect
    ///
    /// # Errors
    /// `TaleweaveError::OrchestratorStopped` after shutdown
    pub fn disconnect(&self, connection: ConnectionId) -> Result<(), TaleweaveError> {
        self.send(connection, Inbound::Disconnect)
    }

    /// `leaveGame` event
    ///
    /// # Errors
    /// `TaleweaveError::OrchestratorStopped` after shutdown
    pub fn leave(&self, connection: ConnectionId) -> Result<(), TaleweaveError> {
        self.send(connection, Inbound::LeaveGame)
    }

    /// Statistics snapshot, taken between two events
    ///
    /// # Errors
    /// `TaleweaveError::OrchestratorStopped` after shutdown
    pub async fn stats(&self) -> Result<EngineStats, TaleweaveError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Stats(tx))
            .map_err(|_| TaleweaveError::OrchestratorStopped)?;
        rx.await.map_err(|_| TaleweaveError::OrchestratorStopped)
    }

    /// Stop the orchestrator after in-flight saves complete
    ///
    /// Pending timers are dropped and live rooms are not persisted.
    ///
    /// # Errors
    /// `TaleweaveError::OrchestratorStopped` if it was already stopped
    pub async fn shutdown(&self) -> Result<(), TaleweaveError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Shutdown(tx))
            .map_err(|_| TaleweaveError::OrchestratorStopped)?;
        rx.await.map_err(|_| TaleweaveError::OrchestratorStopped)
    }
}

/// Owner of the engine and its event loop
#[derive(Debug)]
pub struct Orchestrator {
    engine: Engine,
    gateway: PersistenceGateway,
    outboxes: Outboxes,
    timers: FuturesUnordered<BoxFuture<'static, Timer>>,
    saves: JoinSet<SaveOutcome>,
}

impl Orchestrator {
    /// Create orchestrator storing artifacts in `sink`
    ///
    /// # Errors
    /// `TaleweaveError::Config` if the configuration is unusable
    pub fn new(config: EngineConfig, sink: Arc<dyn ArtifactSink>) -> Result<Self, TaleweaveError> {
        let gateway = PersistenceGateway::new(
            sink,
            config.persist_attempts,
            config.persist_retry_delay(),
        );
        Ok(Self {
            engine: Engine::new(config)?,
            gateway,
            outboxes: Arc::new(DashMap::new()),
            timers: FuturesUnordered::new(),
            saves: JoinSet::new(),
        })
    }

    /// Start the event loop on the current tokio runtime
    #[must_use]
    pub fn spawn(self) -> OrchestratorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = OrchestratorHandle {
            commands: tx,
            outboxes: Arc::clone(&self.outboxes),
            next_connection: Arc::new(AtomicU64::new(1)),
        };
        tokio::spawn(self.run(rx));
        handle
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        tracing::info!(capacity = self.engine.config().capacity, "orchestrator started");
        let mut shutdown_reply = None;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Event { connection, event }) => {
                        let closing = matches!(event, Inbound::Disconnect | Inbound::LeaveGame);
                        let effects = self.engine.handle(connection, event);
                        self.apply(effects);
                        if closing {
                            self.outboxes.remove(&connection);
                        }
                    }
                    Some(Command::Stats(reply)) => {
                        let _ = reply.send(self.engine.stats());
                    }
                    Some(Command::Shutdown(reply)) => {
                        shutdown_reply = Some(reply);
                        break;
                    }
                    None => break,
                },
                Some(timer) = self.timers.next(), if !self.timers.is_empty() => {
                    let effects = self.engine.fire(timer);
                    self.apply(effects);
                }
                Some(joined) = self.saves.join_next(), if !self.saves.is_empty() => {
                    self.finish_save(joined);
                }
            }
        }

        let pending = self.saves.len();
        if pending > 0 {
            tracing::info!(pending, "waiting for in-flight saves");
        }
        while let Some(joined) = self.saves.join_next().await {
            self.finish_save(joined);
        }
        self.timers.clear();
        tracing::info!(stats = ?self.engine.stats(), "orchestrator stopped");

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { to, message } => {
                    let delivered = self
                        .outboxes
                        .get(&to)
                        .is_some_and(|outbox| outbox.send(message).is_ok());
                    if !delivered {
                        tracing::debug!(connection = %to, "dropping event for closed connection");
                    }
                }
                Effect::Schedule { after, timer } => {
                    self.timers.push(Box::pin(async move {
                        tokio::time::sleep(after).await;
                        timer
                    }));
                }
                Effect::Persist { record } => {
                    let gateway = self.gateway.clone();
                    self.saves.spawn(async move {
                        let outcome = gateway.save(&record).await;
                        (record.room, outcome)
                    });
                }
            }
        }
    }

    fn finish_save(&mut self, joined: Result<SaveOutcome, tokio::task::JoinError>) {
        match joined {
            Ok((room, outcome)) => self.engine.persisted(room, outcome),
            Err(e) => tracing::error!("persistence task failed: {e}"),
        }
    }
}
