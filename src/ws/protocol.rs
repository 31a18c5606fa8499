//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::game::{PlayerId, SyncEvent};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Request a player slot, must be the first message
    Hello {
        username: String,
        #[serde(default)]
        team: String,
    },

    /// Latest movement intent, replaces the previous one
    Intent {
        /// `[forward, left, back, right, jump, sprint]`
        inputs: [bool; 6],
        /// Look rotation as `[x, y, z, w]`
        rotation: Quat,
    },

    /// Fire the weapon along a view direction
    Shoot { direction: Vec3 },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Slot granted
    Welcome {
        player_id: PlayerId,
        tick_rate: u32,
        server_time: u64,
    },

    /// Simulation state change
    Sync(SyncEvent),

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_intent() {
        let msg: ClientMsg = serde_json::from_value(json!({
            "type": "intent",
            "inputs": [true, false, false, true, false, true],
            "rotation": [0.0, 0.0, 0.0, 1.0],
        }))
        .unwrap();

        match msg {
            ClientMsg::Intent { inputs, rotation } => {
                assert_eq!(inputs, [true, false, false, true, false, true]);
                assert_eq!(rotation, Quat::IDENTITY);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn hello_team_is_optional() {
        let msg: ClientMsg =
            serde_json::from_value(json!({ "type": "hello", "username": "alice" })).unwrap();
        assert!(matches!(msg, ClientMsg::Hello { ref team, .. } if team.is_empty()));
    }

    #[test]
    fn sync_events_are_flattened_under_type() {
        let msg = ServerMsg::Sync(SyncEvent::HealthChanged {
            player_id: 3,
            health: 40.0,
        });
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(
            value,
            json!({ "type": "sync", "event": "health_changed", "player_id": 3, "health": 40.0 })
        );
    }

    #[test]
    fn rejects_wrong_flag_count() {
        let result = serde_json::from_value::<ClientMsg>(json!({
            "type": "intent",
            "inputs": [true, false],
            "rotation": [0.0, 0.0, 0.0, 1.0],
        }));
        assert!(result.is_err());
    }
}
