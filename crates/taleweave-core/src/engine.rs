//! Orchestration engine
//!
//! Single owner of the registry, the matchmaker, live sessions and pending
//! reservations. Every operation runs to completion and reports what should
//! happen next as a list of [`Effect`]s; the engine itself never performs
//! I/O, sleeps, or spawns. Timers come back through [`Engine::fire`] and
//! re-check the condition they were armed for.

use crate::config::EngineConfig;
use crate::error::{ConfigError, PersistError};
use crate::matchmaker::{Matchmaker, Placement};
use crate::persistence::{ArtifactRecord, SaveReceipt};
use crate::protocol::{Inbound, Outbound};
use crate::reconnect::{Reservation, ReservationBook};
use crate::registry::{Room, RoomRegistry};
use crate::types::{ConnectionId, Phase, ReconnectToken, RoomId, Slot};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Deferred check re-entering the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// A timed phase ran out
    PhaseExpiry {
        /// Room the timer was armed for
        room: RoomId,
        /// Phase the room was in when armed
        phase: Phase,
    },
    /// The teardown grace window of an emptied room ended
    Grace {
        /// Room the timer was armed for
        room: RoomId,
        /// Vacancy generation when armed
        vacancy: u64,
    },
}

/// Work requested by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Deliver `message` to one connection
    Send {
        /// Recipient
        to: ConnectionId,
        /// Payload
        message: Outbound,
    },
    /// Call [`Engine::fire`] with `timer` after `after`
    Schedule {
        /// Delay
        after: Duration,
        /// Timer to fire
        timer: Timer,
    },
    /// Store a finished artifact, then report back via [`Engine::persisted`]
    Persist {
        /// Document to store
        record: ArtifactRecord,
    },
}

/// Engine statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Rooms currently alive
    pub live_rooms: usize,
    /// Rooms ever opened
    pub rooms_opened: u64,
    /// Rooms that left the lobby
    pub games_started: u64,
    /// Logged-in connections
    pub connections: usize,
    /// Reservations waiting for a reconnect
    pub pending_reservations: usize,
    /// Artifacts stored
    pub artifacts_persisted: u64,
    /// Artifacts lost after exhausting retries
    pub artifacts_dropped: u64,
    /// Submissions applied
    pub submissions_accepted: u64,
    /// Submissions ignored (off-turn, grammar, unknown sender)
    pub submissions_ignored: u64,
}

/// What a logged-in connection is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Durable identity
    pub token: ReconnectToken,
    /// Room joined
    pub room: RoomId,
    /// Seat held
    pub slot: Slot,
    /// Set by `leaveGame` right before the disconnect
    pub leaving: bool,
}

#[derive(Debug, Default)]
struct Counters {
    games_started: u64,
    artifacts_persisted: u64,
    artifacts_dropped: u64,
    submissions_accepted: u64,
    submissions_ignored: u64,
}

/// The room orchestration state machine
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    registry: RoomRegistry,
    matchmaker: Matchmaker,
    reservations: ReservationBook,
    sessions: HashMap<ConnectionId, Session>,
    counters: Counters,
}

impl Engine {
    /// Create engine
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is unusable
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            matchmaker: Matchmaker::new(config.capacity),
            config,
            registry: RoomRegistry::new(),
            reservations: ReservationBook::new(),
            sessions: HashMap::new(),
            counters: Counters::default(),
        })
    }

    /// Dispatch an inbound event from `connection`
    pub fn handle(&mut self, connection: ConnectionId, event: Inbound) -> Vec<Effect> {
        match event {
            Inbound::Login { token } => self.login(connection, token),
            Inbound::SubmitTurn { text } => self.submit(connection, &text),
            Inbound::Disconnect => self.disconnect(connection),
            Inbound::LeaveGame => self.leave(connection),
        }
    }

    /// Seat a connection, honouring a live reservation for `token`
    ///
    /// An unknown or expired token is treated as no token at all.
    pub fn login(&mut self, connection: ConnectionId, token: Option<ReconnectToken>) -> Vec<Effect> {
        if self.sessions.contains_key(&connection) {
            tracing::debug!(%connection, "ignoring repeated login");
            return Vec::new();
        }

        let reservation = token.and_then(|t| self.take_live_reservation(t).map(|r| (t, r)));
        let (token, reservation) = match reservation {
            Some((t, r)) => (t, Some(r)),
            None => (ReconnectToken::generate(), None),
        };

        let placement = self
            .matchmaker
            .assign(&mut self.registry, token, connection, reservation);
        self.sessions.insert(
            connection,
            Session {
                token,
                room: placement.room(),
                slot: placement.slot(),
                leaving: false,
            },
        );

        let mut effects = Vec::new();
        match placement {
            Placement::Rejoined { room, slot } => {
                if let Some(room) = self.registry.get(room) {
                    tracing::info!(room = %room.id(), %slot, %connection, "participant rejoined");
                    effects.push(Effect::Send {
                        to: connection,
                        message: Outbound::ReloadGameData {
                            slot,
                            phase: room.phase(),
                            artifact_text: room.artifact().to_string(),
                            next_active_slot: room.active_slot().unwrap_or(Slot::FIRST),
                        },
                    });
                }
            }
            Placement::Seated { room, slot, filled, .. } => {
                tracing::debug!(%room, %slot, %connection, "participant seated");
                effects.push(Effect::Send {
                    to: connection,
                    message: Outbound::SlotAssigned { slot },
                });
                effects.push(Effect::Send {
                    to: connection,
                    message: Outbound::NewToken { token },
                });
                if filled {
                    self.start_game(room, &mut effects);
                }
            }
        }
        effects
    }

    /// Apply a turn submission
    pub fn submit(&mut self, connection: ConnectionId, text: &str) -> Vec<Effect> {
        let mut effects = Vec::new();
        let applied = match self.sessions.get(&connection) {
            Some(session) => match self.registry.get_mut(session.room) {
                Some(room) => room.apply(session.slot, text).map(|a| (room, a)),
                None => None,
            },
            None => None,
        };

        match applied {
            Some((room, applied)) => {
                self.counters.submissions_accepted += 1;
                tracing::debug!(
                    room = %room.id(),
                    turn = room.turn(),
                    phase = %applied.phase,
                    "submission accepted"
                );
                broadcast(
                    room,
                    &Outbound::TurnAdvanced {
                        next_active_slot: applied.next_active,
                        phase: applied.phase,
                        appended_text: applied.appended,
                    },
                    &mut effects,
                );
            }
            None => {
                self.counters.submissions_ignored += 1;
                tracing::debug!(%connection, "submission ignored");
            }
        }
        effects
    }

    /// Mark the connection as leaving for good, then disconnect it
    pub fn leave(&mut self, connection: ConnectionId) -> Vec<Effect> {
        if let Some(session) = self.sessions.get_mut(&connection) {
            session.leaving = true;
        }
        self.disconnect(connection)
    }

    /// Handle a dropped connection
    pub fn disconnect(&mut self, connection: ConnectionId) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(session) = self.sessions.remove(&connection) else {
            return effects;
        };
        let Some(room) = self.registry.get_mut(session.room) else {
            return effects;
        };

        let lobby = room.phase().is_lobby();
        let permanent = lobby || session.leaving;
        if lobby {
            room.vacate(session.slot);
            self.matchmaker.release(session.room, session.slot);
        } else {
            room.detach(session.slot);
            if !session.leaving {
                self.reservations.reserve(
                    session.token,
                    Reservation {
                        room: session.room,
                        slot: session.slot,
                    },
                );
            }
        }
        tracing::info!(
            room = %session.room,
            slot = %session.slot,
            permanent,
            remaining = room.connected_count(),
            "participant departed"
        );

        broadcast(
            room,
            &Outbound::PeerDeparted {
                slot: session.slot,
                permanent,
            },
            &mut effects,
        );

        if room.connected_count() == 0 {
            if lobby {
                self.registry.delete(session.room);
                self.matchmaker.forget(session.room);
                tracing::info!(room = %session.room, "abandoned lobby deleted");
            } else {
                room.vacancy += 1;
                effects.push(Effect::Schedule {
                    after: self.config.grace(),
                    timer: Timer::Grace {
                        room: session.room,
                        vacancy: room.vacancy,
                    },
                });
            }
        }
        effects
    }

    /// Run a timer; stale timers are no-ops
    pub fn fire(&mut self, timer: Timer) -> Vec<Effect> {
        match timer {
            Timer::PhaseExpiry { room, phase } => self.expire_phase(room, phase),
            Timer::Grace { room, vacancy } => self.end_grace(room, vacancy),
        }
    }

    /// Record the outcome of a [`Effect::Persist`]
    pub fn persisted(&mut self, room: RoomId, outcome: Result<SaveReceipt, PersistError>) {
        if self.registry.get(room).is_some() {
            tracing::warn!(%room, "persistence finished for a room that is still live");
        }
        match outcome {
            Ok(receipt) => {
                self.counters.artifacts_persisted += 1;
                tracing::info!(%room, attempts = receipt.attempts, "artifact persisted");
            }
            Err(e) => {
                self.counters.artifacts_dropped += 1;
                tracing::error!(%room, "artifact dropped: {e}");
            }
        }
    }

    /// Look up a room
    #[inline]
    #[must_use]
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.registry.get(id)
    }

    /// Live rooms
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.registry.iter()
    }

    /// Session bound to `connection`
    #[inline]
    #[must_use]
    pub fn session(&self, connection: ConnectionId) -> Option<&Session> {
        self.sessions.get(&connection)
    }

    /// Pending reservation for `token`
    #[inline]
    #[must_use]
    pub fn reservation(&self, token: &ReconnectToken) -> Option<&Reservation> {
        self.reservations.peek(token)
    }

    /// The matchmaker, for inspection
    #[inline]
    #[must_use]
    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Statistics snapshot
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let registry = self.registry.stats();
        EngineStats {
            live_rooms: registry.live,
            rooms_opened: registry.created,
            games_started: self.counters.games_started,
            connections: self.sessions.len(),
            pending_reservations: self.reservations.len(),
            artifacts_persisted: self.counters.artifacts_persisted,
            artifacts_dropped: self.counters.artifacts_dropped,
            submissions_accepted: self.counters.submissions_accepted,
            submissions_ignored: self.counters.submissions_ignored,
        }
    }

    fn take_live_reservation(&mut self, token: ReconnectToken) -> Option<Reservation> {
        let reservation = self.reservations.take(&token)?;
        let room = self.registry.get(reservation.room)?;
        let seat = room.seat(reservation.slot)?;
        (seat.token == token && seat.connection.is_none()).then_some(reservation)
    }

    fn start_game(&mut self, id: RoomId, effects: &mut Vec<Effect>) {
        let Some(room) = self.registry.get_mut(id) else {
            return;
        };
        if !room.start() {
            return;
        }
        self.counters.games_started += 1;
        tracing::info!(room = %id, "room full, game started");

        broadcast(
            room,
            &Outbound::TurnAdvanced {
                next_active_slot: room.active_slot().unwrap_or(Slot::FIRST),
                phase: room.phase(),
                appended_text: String::new(),
            },
            effects,
        );
        let phase = room.phase();
        self.arm_phase_timer(id, phase, effects);
    }

    fn expire_phase(&mut self, id: RoomId, armed_for: Phase) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(room) = self.registry.get_mut(id) else {
            tracing::debug!(room = %id, "phase timer for deleted room");
            return effects;
        };
        let Some(next) = room.expire_phase(armed_for) else {
            return effects;
        };
        tracing::info!(room = %id, from = %armed_for, to = %next, "phase expired");

        broadcast(
            room,
            &Outbound::TurnAdvanced {
                next_active_slot: room.active_slot().unwrap_or(Slot::FIRST),
                phase: next,
                appended_text: String::new(),
            },
            &mut effects,
        );
        self.arm_phase_timer(id, next, &mut effects);
        effects
    }

    fn end_grace(&mut self, id: RoomId, vacancy: u64) -> Vec<Effect> {
        let still_empty = self.registry.get(id).is_some_and(|room| {
            room.vacancy == vacancy && room.connected_count() == 0 && !room.phase().is_lobby()
        });
        if !still_empty {
            tracing::debug!(room = %id, "grace timer is stale");
            return Vec::new();
        }

        let Some(room) = self.registry.delete(id) else {
            return Vec::new();
        };
        self.matchmaker.forget(id);
        let swept = self.reservations.sweep(id);
        tracing::info!(
            room = %id,
            phase = %room.phase(),
            chars = room.artifact().len(),
            swept,
            "room torn down"
        );
        vec![Effect::Persist {
            record: ArtifactRecord::from_room(&room),
        }]
    }

    fn arm_phase_timer(&self, room: RoomId, phase: Phase, effects: &mut Vec<Effect>) {
        if let Some(after) = self.config.phase_duration(phase) {
            effects.push(Effect::Schedule {
                after,
                timer: Timer::PhaseExpiry { room, phase },
            });
        }
    }
}

fn broadcast(room: &Room, message: &Outbound, effects: &mut Vec<Effect>) {
    effects.extend(room.connections().map(|(_, to)| Effect::Send {
        to,
        message: message.clone(),
    }));
}
