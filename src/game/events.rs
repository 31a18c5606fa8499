//! Outbound synchronization events
//!
//! Each event is a snapshot taken at the moment of the mutation that caused
//! it. Within a tick the simulation emits movement events, then stamina,
//! then damage and score.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::{PlayerId, Pose};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Player entered the world (also used for roster snapshots)
    PlayerSpawned {
        player_id: PlayerId,
        username: String,
        team: String,
        pose: Pose,
    },
    PositionChanged {
        player_id: PlayerId,
        position: Vec3,
    },
    RotationChanged {
        player_id: PlayerId,
        rotation: Quat,
    },
    StaminaChanged {
        player_id: PlayerId,
        stamina: f32,
    },
    HealthChanged {
        player_id: PlayerId,
        health: f32,
    },
    PlayerRespawned {
        player_id: PlayerId,
        pose: Pose,
    },
    PlayerScored {
        player_id: PlayerId,
        score: u32,
    },
    PlayerDisconnected {
        player_id: PlayerId,
    },
}

impl SyncEvent {
    pub fn player_id(&self) -> PlayerId {
        match self {
            SyncEvent::PlayerSpawned { player_id, .. }
            | SyncEvent::PositionChanged { player_id, .. }
            | SyncEvent::RotationChanged { player_id, .. }
            | SyncEvent::StaminaChanged { player_id, .. }
            | SyncEvent::HealthChanged { player_id, .. }
            | SyncEvent::PlayerRespawned { player_id, .. }
            | SyncEvent::PlayerScored { player_id, .. }
            | SyncEvent::PlayerDisconnected { player_id } => *player_id,
        }
    }
}
