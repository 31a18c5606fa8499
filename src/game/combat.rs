//! Combat system - hit-scan weapon and damage

use glam::Vec3;

use super::player::PlayerState;
use super::world::{CollisionWorld, HitTarget};
use super::PlayerId;

/// Weapon stats
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Damage per hit
    pub damage: f32,
    /// Maximum ray length
    pub range: f32,
    /// Height of the muzzle above the player's feet
    pub muzzle_height: f32,
}

impl Default for WeaponStats {
    fn default() -> Self {
        Self {
            damage: 20.0,
            range: 100.0,
            muzzle_height: 1.6,
        }
    }
}

/// Hit result from combat resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    pub shooter_id: PlayerId,
    pub target_id: PlayerId,
    pub damage: f32,
    pub point: Vec3,
    pub target_killed: bool,
}

/// Combat system for resolving shots
pub struct CombatSystem;

impl CombatSystem {
    /// Where shots fired by `attacker` start
    pub fn shot_origin(attacker: &PlayerState, weapon: &WeaponStats) -> Vec3 {
        attacker.pose.position + Vec3::Y * weapon.muzzle_height
    }

    /// Trace a shot and report the player it struck, if any.
    ///
    /// Dead shooters never fire. Hitting level geometry, or nothing within
    /// range, is a miss. The shooter's own collider is excluded from the ray.
    pub fn trace_shot<W: CollisionWorld + ?Sized>(
        attacker: &PlayerState,
        direction: Vec3,
        weapon: &WeaponStats,
        world: &W,
    ) -> Option<(PlayerId, Vec3)> {
        if !attacker.is_alive() {
            return None;
        }

        let origin = Self::shot_origin(attacker, weapon);
        let hit = world.raycast(origin, direction, weapon.range, Some(attacker.id))?;
        match hit.target {
            HitTarget::Player(target_id) => Some((target_id, hit.point)),
            HitTarget::Geometry => None,
        }
    }
}
