//! Matchmaker
//!
//! Seats arrivals in the single room currently accepting joins, opening a
//! new one lazily when there is none or it is full. Seats claimed in the
//! filling room form the lobby pool; a lobby member who leaves before the
//! room fills hands the seat back to the pool.

use crate::reconnect::Reservation;
use crate::registry::RoomRegistry;
use crate::types::{ConnectionId, ReconnectToken, RoomId, Slot};
use std::collections::BTreeSet;

/// Where an arrival ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Returned to a reserved seat in a started room
    Rejoined {
        /// Room rejoined
        room: RoomId,
        /// Seat restored
        slot: Slot,
    },
    /// Took a fresh seat in the filling room
    Seated {
        /// Room joined
        room: RoomId,
        /// Seat claimed
        slot: Slot,
        /// Whether this arrival opened the room
        opened: bool,
        /// Whether this arrival filled the room
        filled: bool,
    },
}

impl Placement {
    /// Room of the placement
    #[inline]
    #[must_use]
    pub fn room(&self) -> RoomId {
        match self {
            Self::Rejoined { room, .. } | Self::Seated { room, .. } => *room,
        }
    }

    /// Seat of the placement
    #[inline]
    #[must_use]
    pub fn slot(&self) -> Slot {
        match self {
            Self::Rejoined { slot, .. } | Self::Seated { slot, .. } => *slot,
        }
    }
}

/// Slot allocator for the filling room
#[derive(Debug)]
pub struct Matchmaker {
    capacity: u32,
    accepting: Option<RoomId>,
    claimed: BTreeSet<Slot>,
}

impl Matchmaker {
    /// Create matchmaker for rooms of `capacity` seats
    #[inline]
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity: capacity.max(1),
            accepting: None,
            claimed: BTreeSet::new(),
        }
    }

    /// Room currently accepting joins
    #[inline]
    #[must_use]
    pub fn accepting(&self) -> Option<RoomId> {
        self.accepting
    }

    /// Seats claimed in the filling room
    pub fn claimed(&self) -> impl Iterator<Item = Slot> + '_ {
        self.claimed.iter().copied()
    }

    /// Place an arrival
    ///
    /// A live reservation is honoured first and bypasses slot allocation.
    /// A reservation whose room is gone or whose seat no longer matches is
    /// ignored and the arrival is seated like a newcomer.
    pub fn assign(
        &mut self,
        registry: &mut RoomRegistry,
        token: ReconnectToken,
        connection: ConnectionId,
        reservation: Option<Reservation>,
    ) -> Placement {
        if let Some(reservation) = reservation {
            if let Some(room) = registry.get_mut(reservation.room) {
                if room.attach(reservation.slot, token, connection) {
                    return Placement::Rejoined {
                        room: reservation.room,
                        slot: reservation.slot,
                    };
                }
            }
        }

        let mut opened = false;
        let room_id = match self.accepting.filter(|id| registry.get(*id).is_some()) {
            Some(id) if self.claimed.len() < self.capacity as usize => id,
            _ => {
                let id = registry.create(self.capacity);
                self.accepting = Some(id);
                self.claimed.clear();
                opened = true;
                tracing::info!(room = %id, capacity = self.capacity, "opened room");
                id
            }
        };

        let slot = self.lowest_free();
        self.claimed.insert(slot);
        let filled = self.claimed.len() >= self.capacity as usize;
        if let Some(room) = registry.get_mut(room_id) {
            room.occupy(slot, token, connection);
        }
        if filled {
            self.accepting = None;
        }

        Placement::Seated {
            room: room_id,
            slot,
            opened,
            filled,
        }
    }

    /// Hand a lobby seat back to the pool
    ///
    /// Only seats of the room still filling can be released; returns whether
    /// the seat was released.
    pub fn release(&mut self, room: RoomId, slot: Slot) -> bool {
        self.accepting == Some(room) && self.claimed.remove(&slot)
    }

    /// Drop the filling room if it is `room`
    pub fn forget(&mut self, room: RoomId) {
        if self.accepting == Some(room) {
            self.accepting = None;
            self.claimed.clear();
        }
    }

    fn lowest_free(&self) -> Slot {
        (1..=self.capacity)
            .map(Slot)
            .find(|s| !self.claimed.contains(s))
            .unwrap_or(Slot::FIRST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(mm: &mut Matchmaker, registry: &mut RoomRegistry, conn: u64) -> Placement {
        mm.assign(registry, ReconnectToken::generate(), ConnectionId(conn), None)
    }

    #[test]
    fn first_arrival_opens_room() {
        let mut registry = RoomRegistry::new();
        let mut mm = Matchmaker::new(3);

        let placement = seat(&mut mm, &mut registry, 1);
        match placement {
            Placement::Seated { slot, opened, filled, .. } => {
                assert_eq!(slot, Slot(1));
                assert!(opened);
                assert!(!filled);
            }
            other => panic!("expected Seated, got {other:?}"),
        }
        assert_eq!(mm.accepting(), Some(placement.room()));
        assert_eq!(registry.get(placement.room()).unwrap().connected_count(), 1);
    }

    #[test]
    fn filling_room_closes_and_next_arrival_opens_new_room() {
        let mut registry = RoomRegistry::new();
        let mut mm = Matchmaker::new(2);

        let a = seat(&mut mm, &mut registry, 1);
        let b = seat(&mut mm, &mut registry, 2);
        assert_eq!(a.room(), b.room());
        assert_eq!(b.slot(), Slot(2));
        assert!(matches!(b, Placement::Seated { filled: true, .. }));
        assert_eq!(mm.accepting(), None);

        let c = seat(&mut mm, &mut registry, 3);
        assert_ne!(c.room(), a.room());
        assert_eq!(c.slot(), Slot(1));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn released_lobby_seat_is_reused_lowest_first() {
        let mut registry = RoomRegistry::new();
        let mut mm = Matchmaker::new(3);

        let a = seat(&mut mm, &mut registry, 1);
        let _b = seat(&mut mm, &mut registry, 2);

        registry.get_mut(a.room()).unwrap().vacate(Slot(1));
        assert!(mm.release(a.room(), Slot(1)));

        let c = seat(&mut mm, &mut registry, 3);
        assert_eq!(c.room(), a.room());
        assert_eq!(c.slot(), Slot(1));

        let d = seat(&mut mm, &mut registry, 4);
        assert_eq!(d.slot(), Slot(3));
        assert!(matches!(d, Placement::Seated { filled: true, .. }));
    }

    #[test]
    fn release_ignores_started_rooms() {
        let mut registry = RoomRegistry::new();
        let mut mm = Matchmaker::new(1);

        let a = seat(&mut mm, &mut registry, 1);
        assert!(!mm.release(a.room(), Slot(1)));
    }

    #[test]
    fn reservation_bypasses_allocation() {
        let mut registry = RoomRegistry::new();
        let mut mm = Matchmaker::new(2);
        let token = ReconnectToken::generate();

        let a = mm.assign(&mut registry, token, ConnectionId(1), None);
        let _b = seat(&mut mm, &mut registry, 2);
        registry.get_mut(a.room()).unwrap().detach(a.slot());

        let reservation = Reservation {
            room: a.room(),
            slot: a.slot(),
        };
        let back = mm.assign(&mut registry, token, ConnectionId(9), Some(reservation));
        assert_eq!(
            back,
            Placement::Rejoined {
                room: a.room(),
                slot: Slot(1)
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn stale_reservation_seats_as_newcomer() {
        let mut registry = RoomRegistry::new();
        let mut mm = Matchmaker::new(2);

        let reservation = Reservation {
            room: RoomId::new(),
            slot: Slot(2),
        };
        let placement = mm.assign(
            &mut registry,
            ReconnectToken::generate(),
            ConnectionId(1),
            Some(reservation),
        );
        assert!(matches!(placement, Placement::Seated { opened: true, .. }));
        assert_eq!(placement.slot(), Slot(1));
    }

    #[test]
    fn forgotten_room_is_not_reused() {
        let mut registry = RoomRegistry::new();
        let mut mm = Matchmaker::new(3);

        let a = seat(&mut mm, &mut registry, 1);
        registry.delete(a.room());
        mm.forget(a.room());
        assert_eq!(mm.claimed().count(), 0);

        let b = seat(&mut mm, &mut registry, 2);
        assert_ne!(a.room(), b.room());
        assert_eq!(b.slot(), Slot(1));
    }
}
