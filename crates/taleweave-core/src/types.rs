//! Core identifiers and enums
//!
//! - Room, connection and reconnection-token identifiers
//! - Seat numbers (`Slot`)
//! - The phase ladder every room climbs

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use ulid::Ulid;
use uuid::Uuid;

/// Unique room identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomId(pub Ulid);

impl RoomId {
    /// Generate new room ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live transport session identifier
///
/// Allocated by whoever owns the transport; the engine only compares them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opaque durable identity handed to a client on first login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReconnectToken(pub Uuid);

impl ReconnectToken {
    /// Generate a fresh random token
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ReconnectToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReconnectToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A seat number in `[1, capacity]`, fixing turn order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(pub u32);

impl Slot {
    /// First seat of every room
    pub const FIRST: Slot = Slot(1);

    /// Seat that owns turn `turn` in a room of `capacity` seats
    ///
    /// Turns are 1-based: turn 1 belongs to slot 1. Turn 0 (lobby) maps to
    /// slot 1 as well so callers never see an out-of-range seat.
    #[inline]
    #[must_use]
    pub fn active_for(turn: u64, capacity: u32) -> Self {
        let capacity = u64::from(capacity.max(1));
        let index = turn.saturating_sub(1) % capacity;
        // index < capacity <= u32::MAX
        Slot(index as u32 + 1)
    }

    /// Numeric seat value
    #[inline]
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Input-grammar regime of a room
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Lobby: filling seats, no submissions
    #[default]
    Waiting,
    /// One word per turn
    SingleWord,
    /// Up to three words per turn
    ThreeWord,
    /// Free text; terminal
    Sentence,
}

impl Phase {
    /// The phase a forced advance moves to, if any
    #[inline]
    #[must_use]
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Waiting => Some(Phase::SingleWord),
            Phase::SingleWord => Some(Phase::ThreeWord),
            Phase::ThreeWord => Some(Phase::Sentence),
            Phase::Sentence => None,
        }
    }

    /// Whether entering this phase arms an expiry timer
    #[inline]
    #[must_use]
    pub fn is_timed(self) -> bool {
        matches!(self, Phase::SingleWord | Phase::ThreeWord)
    }

    /// Whether the game has started
    #[inline]
    #[must_use]
    pub fn is_lobby(self) -> bool {
        self == Phase::Waiting
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Waiting => "WAITING",
            Phase::SingleWord => "SINGLE_WORD",
            Phase::ThreeWord => "THREE_WORD",
            Phase::Sentence => "SENTENCE",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_slot_wraps_around_capacity() {
        assert_eq!(Slot::active_for(1, 3), Slot(1));
        assert_eq!(Slot::active_for(2, 3), Slot(2));
        assert_eq!(Slot::active_for(3, 3), Slot(3));
        assert_eq!(Slot::active_for(4, 3), Slot(1));
        assert_eq!(Slot::active_for(0, 3), Slot(1));
    }

    #[test]
    fn active_slot_single_seat_room() {
        for turn in 1..10 {
            assert_eq!(Slot::active_for(turn, 1), Slot(1));
        }
    }

    #[test]
    fn phase_ladder() {
        assert_eq!(Phase::Waiting.next(), Some(Phase::SingleWord));
        assert_eq!(Phase::SingleWord.next(), Some(Phase::ThreeWord));
        assert_eq!(Phase::ThreeWord.next(), Some(Phase::Sentence));
        assert_eq!(Phase::Sentence.next(), None);
    }

    #[test]
    fn only_word_phases_are_timed() {
        assert!(!Phase::Waiting.is_timed());
        assert!(Phase::SingleWord.is_timed());
        assert!(Phase::ThreeWord.is_timed());
        assert!(!Phase::Sentence.is_timed());
    }

    #[test]
    fn phase_serializes_screaming() {
        let json = serde_json::to_string(&Phase::SingleWord).unwrap();
        assert_eq!(json, "\"SINGLE_WORD\"");
    }

    #[test]
    fn token_round_trips_through_string() {
        let token = ReconnectToken::generate();
        let parsed: ReconnectToken = token.to_string().parse().unwrap();
        assert_eq!(parsed, token);
    }
}
