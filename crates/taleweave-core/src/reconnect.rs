//! Reconnection reservations
//!
//! A reservation ties a durable token to the seat its owner held when the
//! connection dropped mid-game. Presenting the token consumes it; tearing
//! the room down sweeps every reservation pointing at it.

use crate::types::{ReconnectToken, RoomId, Slot};
use std::collections::HashMap;

/// Claim on a seat in a started room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reservation {
    /// Room the seat belongs to
    pub room: RoomId,
    /// Seat to restore
    pub slot: Slot,
}

/// Pending reservations keyed by token
#[derive(Debug, Default)]
pub struct ReservationBook {
    pending: HashMap<ReconnectToken, Reservation>,
}

impl ReservationBook {
    /// Create empty book
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the reservation for `token`
    pub fn reserve(&mut self, token: ReconnectToken, reservation: Reservation) {
        if let Some(previous) = self.pending.insert(token, reservation) {
            if previous != reservation {
                tracing::debug!(
                    token = %token,
                    old_room = %previous.room,
                    new_room = %reservation.room,
                    "replaced reservation"
                );
            }
        }
    }

    /// Consume the reservation for `token`
    pub fn take(&mut self, token: &ReconnectToken) -> Option<Reservation> {
        self.pending.remove(token)
    }

    /// Look at the reservation for `token` without consuming it
    #[inline]
    #[must_use]
    pub fn peek(&self, token: &ReconnectToken) -> Option<&Reservation> {
        self.pending.get(token)
    }

    /// Drop every reservation pointing at `room`; returns how many were dropped
    pub fn sweep(&mut self, room: RoomId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, r| r.room != room);
        before - self.pending.len()
    }

    /// Pending reservation count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no reservations are pending
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
