use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    // Private rooms
    CreateRoom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    JoinRoom {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    LeaveRoom,

    // Quick play
    QuickPlay {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    CancelQuickPlay,

    // Negotiation
    SelectMode {
        mode: String,
    },
    SelectAbility {
        ability: String,
    },
    StartGame,

    // Forwarded to the simulation
    Input {
        keys: serde_json::Value,
    },
    Dash,
    Ability,

    /// Any type this server does not know about.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    // Private rooms
    RoomCreated {
        code: String,
        #[serde(rename = "playerId")]
        player_id: u8,
    },
    RoomJoined {
        code: String,
        #[serde(rename = "playerId")]
        player_id: u8,
    },
    OpponentJoined,
    OpponentLeft,

    // Quick play
    QuickSearching,
    QuickMatched {
        code: String,
        #[serde(rename = "playerId")]
        player_id: u8,
    },

    // Negotiation
    ModeSelected {
        mode: String,
    },
    OpponentAbilitySelected,
    AbilitiesReady,
    GameStarted {
        mode: String,
    },

    // Simulation relay
    StateUpdate {
        state: serde_json::Value,
    },
    GameOver {
        winner: u8,
    },

    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl ToString) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }
}
