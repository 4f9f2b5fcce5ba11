//! Turn/phase state machine
//!
//! `WAITING -> SINGLE_WORD -> THREE_WORD -> SENTENCE`, one step at a time,
//! never backward. WAITING is left exactly once when the room fills; the
//! word phases are left only by their expiry timer; SENTENCE is terminal.

use crate::grammar;
use crate::registry::Room;
use crate::types::{Phase, Slot};

/// Phases reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: Phase) -> Vec<Phase> {
    from.next().into_iter().collect()
}

/// Whether `from -> to` is a legal transition
#[inline]
#[must_use]
pub fn is_allowed(from: Phase, to: Phase) -> bool {
    from.next() == Some(to)
}

/// An accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Text appended to the artifact, leading space included
    pub appended: String,
    /// Seat that owns the new turn
    pub next_active: Slot,
    /// Phase the submission was accepted in
    pub phase: Phase,
}

impl Room {
    /// Seat owning the current turn; `None` while in the lobby
    #[must_use]
    pub fn active_slot(&self) -> Option<Slot> {
        (!self.phase.is_lobby()).then(|| Slot::active_for(self.turn, self.capacity))
    }

    /// Leave the lobby: turn 1, first word phase
    ///
    /// Returns `false` if the game had already started.
    pub(crate) fn start(&mut self) -> bool {
        if !self.phase.is_lobby() {
            return false;
        }
        self.phase = Phase::SingleWord;
        self.turn = 1;
        true
    }

    /// Expiry of the phase a timer was armed for
    ///
    /// Advances exactly one step, and only if the room is still in
    /// `armed_for`; counters and text are untouched.
    pub(crate) fn expire_phase(&mut self, armed_for: Phase) -> Option<Phase> {
        if self.phase != armed_for || armed_for.is_lobby() {
            return None;
        }
        let next = armed_for.next()?;
        debug_assert!(is_allowed(self.phase, next));
        self.phase = next;
        Some(next)
    }

    /// Validate and apply a submission from `slot`
    ///
    /// Off-turn submissions and grammar mismatches return `None` and leave
    /// the room untouched.
    pub(crate) fn apply(&mut self, slot: Slot, raw: &str) -> Option<Applied> {
        if self.active_slot() != Some(slot) {
            return None;
        }
        let accepted = grammar::accept(self.phase, raw)?;
        let appended = grammar::joined(&self.artifact, accepted);
        self.artifact.push_str(&appended);
        self.turn += 1;
        Some(Applied {
            appended,
            next_active: Slot::active_for(self.turn, self.capacity),
            phase: self.phase,
        })
    }
}
