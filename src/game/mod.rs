//! Game simulation modules

pub mod combat;
pub mod events;
pub mod movement;
pub mod player;
pub mod runner;
pub mod simulation;
pub mod spawn;
pub mod timers;
pub mod world;

pub use events::SyncEvent;
pub use player::{PlayerState, PlayerStats};
pub use runner::{SimulationError, SimulationHandle, SimulationRunner};
pub use simulation::Simulation;
pub use spawn::{SpawnPoint, SpawnRegistry};
pub use world::{ArenaWorld, CollisionWorld};

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Player slot identity, assigned by the session manager
pub type PlayerId = u32;

/// Position and orientation of a player avatar.
///
/// `position` is the bottom of the player's collider (the feet).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Latest client intent for one player, replaced wholesale every time the
/// client sends a new one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub forward: bool,
    pub left: bool,
    pub back: bool,
    pub right: bool,
    pub jump: bool,
    pub sprint: bool,
    /// Look rotation applied to the avatar on the next tick
    pub look_rotation: Quat,
}

impl Intent {
    /// Build from the wire flag order `[forward, left, back, right, jump, sprint]`
    pub fn from_flags(flags: [bool; 6], look_rotation: Quat) -> Self {
        let [forward, left, back, right, jump, sprint] = flags;
        Self {
            forward,
            left,
            back,
            right,
            jump,
            sprint,
            look_rotation,
        }
    }

    /// Planar input direction, `x` is strafe and `y` is forward.
    ///
    /// Axes are summed independently and never normalized, so diagonal
    /// movement is faster than axis-aligned movement.
    pub fn planar_direction(&self) -> Vec2 {
        let mut direction = Vec2::ZERO;
        if self.forward {
            direction.y += 1.0;
        }
        if self.left {
            direction.x -= 1.0;
        }
        if self.back {
            direction.y -= 1.0;
        }
        if self.right {
            direction.x += 1.0;
        }
        direction
    }
}

impl Default for Intent {
    fn default() -> Self {
        Self::from_flags([false; 6], Quat::IDENTITY)
    }
}
