//! Player movement and stamina

use glam::{Vec2, Vec3};

use super::player::{PlayerState, PlayerStats};
use super::world::CollisionWorld;
use super::Pose;

/// Result of advancing one player by one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveStep {
    pub pose: Pose,
    pub vertical_velocity: f32,
    pub grounded: bool,
    pub stamina: f32,
    pub fatigued: bool,
    /// Sprinting exhausted stamina this tick, the fatigue timer must be armed
    pub fatigue_started: bool,
    /// The resolved move ended inside a kill volume
    pub entered_kill_volume: bool,
}

/// Movement system for advancing players each tick
pub struct MovementSystem;

impl MovementSystem {
    /// Advance a player by `dt` seconds using their stored intent.
    ///
    /// Returns `None` for dead players and players whose controller is
    /// disabled. The collision world is moved as a side effect; the caller
    /// applies the returned step to the player state.
    pub fn advance<W: CollisionWorld + ?Sized>(
        state: &PlayerState,
        stats: &PlayerStats,
        world: &mut W,
        dt: f32,
    ) -> Option<MoveStep> {
        if !state.is_alive() || !state.controller_enabled {
            return None;
        }

        let intent = &state.intent;
        let input = intent.planar_direction();
        let rotation = intent.look_rotation;
        let mut velocity = rotation * Vec3::X * input.x + rotation * Vec3::Z * input.y;

        let mut stamina = state.stamina;
        let mut fatigued = state.fatigued;
        let mut fatigue_started = false;

        if intent.sprint && !intent.back && stamina > 0.0 {
            velocity *= stats.sprint_speed();

            // Sprinting in place recovers stamina like walking does
            if input != Vec2::ZERO {
                stamina -= stats.drain_rate * dt;
                if stamina <= 0.0 {
                    stamina = 0.0;
                    fatigued = true;
                    fatigue_started = true;
                }
            } else {
                stamina = Self::regenerate(stamina, fatigued, stats, dt);
            }
        } else {
            velocity *= stats.move_speed;
            stamina = Self::regenerate(stamina, fatigued, stats, dt);
        }

        let mut vertical_velocity = state.vertical_velocity;
        if state.grounded {
            vertical_velocity = 0.0;
            if intent.jump && stamina > stats.jump_cost {
                vertical_velocity = stats.jump_speed;
                stamina -= stats.jump_cost;
            }
        }
        vertical_velocity += stats.gravity * dt;
        velocity.y = vertical_velocity;

        let result = world.move_player(state.id, velocity * dt);

        Some(MoveStep {
            pose: Pose {
                position: state.pose.position + result.displacement,
                rotation,
            },
            vertical_velocity,
            grounded: result.grounded,
            stamina,
            fatigued,
            fatigue_started,
            entered_kill_volume: result.entered_kill_volume,
        })
    }

    fn regenerate(stamina: f32, fatigued: bool, stats: &PlayerStats, dt: f32) -> f32 {
        if fatigued || stamina >= stats.max_stamina {
            return stamina;
        }
        (stamina + stats.recharge_rate * dt).min(stats.max_stamina)
    }
}
