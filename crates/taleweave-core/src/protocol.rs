//! Event payloads exchanged with the transport
//!
//! Shapes only; framing and delivery belong to the transport. Both enums
//! are tagged by `event` with camelCase names so they can be carried as
//! JSON messages as-is.

use crate::types::{Phase, ReconnectToken, Slot};
use serde::{Deserialize, Serialize};

/// Events consumed by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Inbound {
    /// Join, optionally presenting a reconnection token
    Login {
        /// Token from an earlier session
        #[serde(default)]
        token: Option<ReconnectToken>,
    },
    /// Text for the current turn
    SubmitTurn {
        /// Raw text as typed
        text: String,
    },
    /// Transport lost the connection
    Disconnect,
    /// The participant is leaving for good
    LeaveGame,
}

/// Events produced by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Outbound {
    /// Your seat number
    SlotAssigned {
        /// Seat
        slot: Slot,
    },
    /// Token the client must keep to reconnect
    NewToken {
        /// Token
        token: ReconnectToken,
    },
    /// A submission was accepted or a phase expired
    TurnAdvanced {
        /// Seat owning the next turn
        next_active_slot: Slot,
        /// Phase after the change
        phase: Phase,
        /// Text appended; empty for a forced phase change
        appended_text: String,
    },
    /// Full state for a rejoining connection
    ReloadGameData {
        /// Restored seat
        slot: Slot,
        /// Current phase
        phase: Phase,
        /// Artifact so far
        artifact_text: String,
        /// Seat owning the current turn
        next_active_slot: Slot,
    },
    /// Another occupant went away
    PeerDeparted {
        /// Seat they held
        slot: Slot,
        /// `false` if they may still come back
        permanent: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn inbound_login_without_token() {
        let event: Inbound = serde_json::from_str(r#"{"event":"login"}"#).unwrap();
        assert_eq!(event, Inbound::Login { token: None });
    }

    #[test]
    fn inbound_submit_turn() {
        let event: Inbound =
            serde_json::from_str(r#"{"event":"submitTurn","text":"Once"}"#).unwrap();
        assert_eq!(event, Inbound::SubmitTurn { text: "Once".into() });
    }

    #[test]
    fn outbound_turn_advanced_shape() {
        let event = Outbound::TurnAdvanced {
            next_active_slot: Slot(2),
            phase: Phase::SingleWord,
            appended_text: " upon".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "turnAdvanced",
                "nextActiveSlot": 2,
                "phase": "SINGLE_WORD",
                "appendedText": " upon",
            })
        );
    }

    #[test]
    fn outbound_peer_departed_shape() {
        let event = Outbound::PeerDeparted {
            slot: Slot(3),
            permanent: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "peerDeparted", "slot": 3, "permanent": true})
        );
    }
}
