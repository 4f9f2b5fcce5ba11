//! Property-based tests over random event sequences.

use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use taleweave_core::{ConnectionId, Effect, Engine, Phase, ReconnectToken, RoomId, Slot, Timer};
use taleweave_test_utils::{issued_token, test_config};

#[derive(Debug, Clone)]
enum Op {
    Login { who: u64, with_token: bool },
    Submit { who: u64, text: &'static str },
    Disconnect { who: u64 },
    Leave { who: u64 },
    Fire { pick: usize },
}

const TEXTS: &[&str] = &[
    "Once",
    "upon",
    "a time",
    "old grey man",
    "four words are here",
    "It ended.",
    "",
    "   ",
    "hi.",
    ",",
];

fn op() -> impl Strategy<Value = Op> {
    let who = 1u64..=8;
    prop_oneof![
        3 => (who.clone(), any::<bool>()).prop_map(|(who, with_token)| Op::Login { who, with_token }),
        4 => (who.clone(), prop::sample::select(TEXTS)).prop_map(|(who, text)| Op::Submit { who, text }),
        1 => who.clone().prop_map(|who| Op::Disconnect { who }),
        1 => who.prop_map(|who| Op::Leave { who }),
        2 => any::<usize>().prop_map(|pick| Op::Fire { pick }),
    ]
}

#[derive(Default)]
struct Harness {
    tokens: HashMap<ConnectionId, ReconnectToken>,
    timers: Vec<Timer>,
    phases: HashMap<RoomId, Phase>,
}

impl Harness {
    fn absorb(&mut self, connection: Option<ConnectionId>, effects: &[Effect]) {
        for effect in effects {
            if let Effect::Schedule { timer, .. } = effect {
                self.timers.push(*timer);
            }
        }
        if let Some(connection) = connection {
            if let Some(token) = issued_token(effects, connection) {
                self.tokens.insert(connection, token);
            }
        }
    }

    fn step(&mut self, engine: &mut Engine, op: &Op) {
        match *op {
            Op::Login { who, with_token } => {
                let connection = ConnectionId(who);
                let token = with_token.then(|| self.tokens.get(&connection).copied()).flatten();
                let effects = engine.login(connection, token);
                self.absorb(Some(connection), &effects);
            }
            Op::Submit { who, text } => {
                let effects = engine.submit(ConnectionId(who), text);
                self.absorb(None, &effects);
            }
            Op::Disconnect { who } => {
                let effects = engine.disconnect(ConnectionId(who));
                self.absorb(None, &effects);
            }
            Op::Leave { who } => {
                let effects = engine.leave(ConnectionId(who));
                self.absorb(None, &effects);
            }
            Op::Fire { pick } => {
                if !self.timers.is_empty() {
                    let timer = self.timers.remove(pick % self.timers.len());
                    let effects = engine.fire(timer);
                    self.absorb(None, &effects);
                }
            }
        }
    }

    fn check(&mut self, engine: &Engine) -> Result<(), TestCaseError> {
        let capacity = engine.config().capacity;
        let mut sessions_per_room: HashMap<RoomId, usize> = HashMap::new();

        for who in 1..=8 {
            let connection = ConnectionId(who);
            if let Some(session) = engine.session(connection) {
                let room = engine.room(session.room);
                prop_assert!(room.is_some(), "session points at a deleted room");
                let seat = room.and_then(|r| r.seat(session.slot));
                prop_assert_eq!(seat.and_then(|s| s.connection), Some(connection));
                *sessions_per_room.entry(session.room).or_default() += 1;
            }
        }

        for room in engine.rooms() {
            let slots: Vec<Slot> = room.occupied_slots().collect();
            let unique: BTreeSet<Slot> = slots.iter().copied().collect();
            prop_assert_eq!(slots.len(), unique.len());
            prop_assert!(slots.len() <= capacity as usize);
            prop_assert!(slots.iter().all(|s| (1..=capacity).contains(&s.get())));

            let connected = sessions_per_room.get(&room.id()).copied().unwrap_or(0);
            prop_assert_eq!(room.connected_count(), connected);
            if room.phase().is_lobby() {
                prop_assert_eq!(room.turn(), 0);
                prop_assert!(room.connected_count() > 0, "empty lobby left alive");
            } else {
                prop_assert_eq!(room.active_slot(), Some(Slot::active_for(room.turn(), capacity)));
            }

            if let Some(before) = self.phases.insert(room.id(), room.phase()) {
                prop_assert!(before <= room.phase(), "phase moved backwards");
            }
        }

        if let Some(accepting) = engine.matchmaker().accepting() {
            let room = engine.room(accepting);
            prop_assert!(room.is_some_and(|r| r.phase().is_lobby()));
            let seated: BTreeSet<Slot> = room.map(|r| r.occupied_slots().collect()).unwrap_or_default();
            let claimed: BTreeSet<Slot> = engine.matchmaker().claimed().collect();
            prop_assert_eq!(claimed, seated);
        }
        Ok(())
    }
}

proptest! {
    #[test]
    fn random_sessions_keep_rooms_consistent(
        capacity in 1u32..=4,
        ops in prop::collection::vec(op(), 1..80),
    ) {
        let mut engine = Engine::new(test_config(capacity)).unwrap();
        let mut harness = Harness::default();
        for op in &ops {
            harness.step(&mut engine, op);
            harness.check(&engine)?;
        }
    }

    #[test]
    fn off_turn_submissions_change_nothing(
        capacity in 2u32..=4,
        text in prop::sample::select(TEXTS),
    ) {
        let mut engine = Engine::new(test_config(capacity)).unwrap();
        for who in 1..=u64::from(capacity) {
            engine.login(ConnectionId(who), None);
        }
        let room = engine.session(ConnectionId(1)).unwrap().room;
        let before = engine.room(room).unwrap().clone();

        // Slot 1 is active on turn 1, so everyone else is off turn
        for who in 2..=u64::from(capacity) {
            prop_assert!(engine.submit(ConnectionId(who), text).is_empty());
        }
        let after = engine.room(room).unwrap();
        prop_assert_eq!(after.turn(), before.turn());
        prop_assert_eq!(after.artifact(), before.artifact());
        prop_assert_eq!(after.phase(), before.phase());
    }

    #[test]
    fn active_slot_cycles_through_every_seat(capacity in 1u32..=16, turn in 1u64..10_000) {
        let slot = Slot::active_for(turn, capacity);
        prop_assert_eq!(u64::from(slot.get()), (turn - 1) % u64::from(capacity) + 1);
        prop_assert_eq!(Slot::active_for(turn + u64::from(capacity), capacity), slot);
    }

    #[test]
    fn lone_seat_accepts_every_single_word(words in prop::collection::vec("[A-Za-z]{1,8}", 1..20)) {
        let mut engine = Engine::new(test_config(1)).unwrap();
        engine.login(ConnectionId(1), None);
        for word in &words {
            prop_assert!(!engine.submit(ConnectionId(1), word).is_empty());
        }
        let room = engine.session(ConnectionId(1)).unwrap().room;
        prop_assert_eq!(engine.room(room).unwrap().artifact(), words.join(" "));
        prop_assert_eq!(engine.room(room).unwrap().turn(), words.len() as u64 + 1);
    }
}
