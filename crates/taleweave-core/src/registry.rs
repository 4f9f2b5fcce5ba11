//! Room registry
//!
//! Owns every live [`Room`]. Rooms are created by the matchmaker and removed
//! on teardown; removing a room twice is a no-op because stale timers may
//! race each other.

use crate::types::{ConnectionId, Phase, ReconnectToken, RoomId, Slot};
use std::collections::{BTreeMap, HashMap};

/// Occupant of a seat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    /// Durable identity of the occupant
    pub token: ReconnectToken,
    /// Live connection; `None` while the seat is reserved for a reconnect
    pub connection: Option<ConnectionId>,
}

/// One self-contained game session
#[derive(Debug, Clone)]
pub struct Room {
    pub(crate) id: RoomId,
    pub(crate) capacity: u32,
    pub(crate) phase: Phase,
    pub(crate) turn: u64,
    pub(crate) artifact: String,
    pub(crate) seats: BTreeMap<Slot, Seat>,
    /// Bumped each time the room empties; grace timers carry the value they
    /// were armed with.
    pub(crate) vacancy: u64,
}

impl Room {
    fn new(id: RoomId, capacity: u32) -> Self {
        Self {
            id,
            capacity,
            phase: Phase::Waiting,
            turn: 0,
            artifact: String::new(),
            seats: BTreeMap::new(),
            vacancy: 0,
        }
    }

    /// Room identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Seat count
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current turn counter; 0 until the game starts
    #[inline]
    #[must_use]
    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// Accumulated artifact text
    #[inline]
    #[must_use]
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// Number of live connections attributed to the room
    ///
    /// Reserved seats whose owner is disconnected are not counted.
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.seats.values().filter(|s| s.connection.is_some()).count()
    }

    /// Occupied seats, reserved ones included
    pub fn occupied_slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.seats.keys().copied()
    }

    /// Seat at `slot`, if occupied
    #[inline]
    #[must_use]
    pub fn seat(&self, slot: Slot) -> Option<&Seat> {
        self.seats.get(&slot)
    }

    /// Live connections in seat order
    pub fn connections(&self) -> impl Iterator<Item = (Slot, ConnectionId)> + '_ {
        self.seats
            .iter()
            .filter_map(|(slot, seat)| seat.connection.map(|c| (*slot, c)))
    }

    /// Whether every seat is occupied
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.seats.len() >= self.capacity as usize
    }

    pub(crate) fn occupy(&mut self, slot: Slot, token: ReconnectToken, connection: ConnectionId) {
        self.seats.insert(
            slot,
            Seat {
                token,
                connection: Some(connection),
            },
        );
    }

    pub(crate) fn vacate(&mut self, slot: Slot) -> Option<Seat> {
        self.seats.remove(&slot)
    }

    /// Detach the live connection from `slot`, keeping the seat reserved
    pub(crate) fn detach(&mut self, slot: Slot) -> bool {
        match self.seats.get_mut(&slot) {
            Some(seat) if seat.connection.is_some() => {
                seat.connection = None;
                true
            }
            _ => false,
        }
    }

    /// Bind a new connection to a reserved seat owned by `token`
    pub(crate) fn attach(
        &mut self,
        slot: Slot,
        token: ReconnectToken,
        connection: ConnectionId,
    ) -> bool {
        match self.seats.get_mut(&slot) {
            Some(seat) if seat.token == token && seat.connection.is_none() => {
                seat.connection = Some(connection);
                true
            }
            _ => false,
        }
    }
}

/// Registry statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Rooms currently alive
    pub live: usize,
    /// Rooms ever created
    pub created: u64,
    /// Rooms deleted
    pub deleted: u64,
}

/// Mapping from room identifier to room state
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    created: u64,
    deleted: u64,
}

impl RoomRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room in the lobby phase
    pub fn create(&mut self, capacity: u32) -> RoomId {
        let id = RoomId::new();
        self.rooms.insert(id, Room::new(id, capacity));
        self.created += 1;
        id
    }

    /// Look up a room
    #[inline]
    #[must_use]
    pub fn get(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&id)
    }

    /// Remove a room; removing an unknown room does nothing
    pub fn delete(&mut self, id: RoomId) -> Option<Room> {
        let removed = self.rooms.remove(&id);
        if removed.is_some() {
            self.deleted += 1;
        }
        removed
    }

    /// Live room count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no rooms are alive
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Iterate live rooms
    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Registry statistics
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            live: self.rooms.len(),
            created: self.created,
            deleted: self.deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_delete() {
        let mut registry = RoomRegistry::new();
        let id = registry.create(3);

        let room = registry.get(id).unwrap();
        assert_eq!(room.phase(), Phase::Waiting);
        assert_eq!(room.turn(), 0);
        assert_eq!(room.artifact(), "");
        assert_eq!(room.capacity(), 3);

        assert!(registry.delete(id).is_some());
        assert!(registry.get(id).is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let mut registry = RoomRegistry::new();
        let id = registry.create(2);

        assert!(registry.delete(id).is_some());
        assert!(registry.delete(id).is_none());
        assert!(registry.delete(RoomId::new()).is_none());

        let stats = registry.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.live, 0);
    }

    #[test]
    fn connected_count_excludes_reserved_seats() {
        let mut registry = RoomRegistry::new();
        let id = registry.create(2);
        let room = registry.get_mut(id).unwrap();
        let token = ReconnectToken::generate();

        room.occupy(Slot(1), token, ConnectionId(1));
        room.occupy(Slot(2), ReconnectToken::generate(), ConnectionId(2));
        assert_eq!(room.connected_count(), 2);
        assert!(room.is_full());

        assert!(room.detach(Slot(1)));
        assert_eq!(room.connected_count(), 1);
        assert_eq!(room.occupied_slots().count(), 2);

        // Wrong token cannot take the seat
        assert!(!room.attach(Slot(1), ReconnectToken::generate(), ConnectionId(3)));
        assert!(room.attach(Slot(1), token, ConnectionId(3)));
        assert_eq!(room.connected_count(), 2);
    }
}
