//! World collision and raycast services
//!
//! The simulation only decides where a player *wants* to go. Resolving that
//! motion against level geometry, ground detection and ray queries belong to
//! a [`CollisionWorld`], so movement and combat can run against a stub in
//! tests and against [`ArenaWorld`] in the server.

use glam::Vec3;
use std::collections::HashMap;

use super::PlayerId;

/// Outcome of resolving a desired displacement against the world
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveResult {
    /// Displacement actually applied
    pub displacement: Vec3,
    /// Whether the collider ended the move standing on something
    pub grounded: bool,
    /// Whether the collider ended the move inside a kill volume
    pub entered_kill_volume: bool,
}

/// What a ray struck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Player(PlayerId),
    Geometry,
}

/// Nearest intersection along a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub target: HitTarget,
    pub point: Vec3,
    pub distance: f32,
}

/// Collision and raycast capability the simulation depends on
pub trait CollisionWorld: Send + 'static {
    /// Register a player collider with its feet at `position`
    fn insert_player(&mut self, id: PlayerId, position: Vec3);

    /// Drop a player collider
    fn remove_player(&mut self, id: PlayerId);

    /// Enable or disable a collider. Disabled colliders do not move and are
    /// invisible to raycasts.
    fn set_player_enabled(&mut self, id: PlayerId, enabled: bool);

    /// Place a collider without resolving collisions
    fn teleport_player(&mut self, id: PlayerId, position: Vec3);

    /// Resolve a desired displacement for a player collider
    fn move_player(&mut self, id: PlayerId, desired: Vec3) -> MoveResult;

    /// Nearest hit along `direction` within `max_range`, skipping `ignore`
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_range: f32,
        ignore: Option<PlayerId>,
    ) -> Option<RaycastHit>;
}

/// Axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Strict overlap, touching faces do not count
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    /// Distance along a normalized ray to the entry point (slab test)
    pub fn ray_distance(&self, origin: Vec3, direction: Vec3, max_range: f32) -> Option<f32> {
        let mut t_min = 0.0_f32;
        let mut t_max = max_range;

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            if d.abs() < f32::EPSILON {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let mut t0 = (self.min[axis] - o) * inv;
            let mut t1 = (self.max[axis] - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }

        Some(t_min)
    }
}

#[derive(Debug, Clone, Copy)]
struct PlayerCollider {
    position: Vec3,
    enabled: bool,
}

/// Box-based arena: static obstacles, player boxes and a kill plane below
/// the level
#[derive(Debug, Clone)]
pub struct ArenaWorld {
    obstacles: Vec<Aabb>,
    players: HashMap<PlayerId, PlayerCollider>,
    /// Half extents of a player box (feet sit at `center.y - half.y`)
    player_half_extents: Vec3,
    /// Anything whose feet fall below this height is in the kill volume
    kill_height: f32,
}

impl ArenaWorld {
    pub fn new(kill_height: f32) -> Self {
        Self {
            obstacles: Vec::new(),
            players: HashMap::new(),
            player_half_extents: Vec3::new(0.5, 1.0, 0.5),
            kill_height,
        }
    }

    /// Default arena: an 80x80 floor with its top at y = 0, a ring of cover
    /// blocks and a kill plane 30 units below the floor
    pub fn standard() -> Self {
        let mut world = Self::new(-30.0);
        world.add_obstacle(Aabb {
            min: Vec3::new(-40.0, -2.0, -40.0),
            max: Vec3::new(40.0, 0.0, 40.0),
        });
        for (x, z) in [(-12.0, 0.0), (12.0, 0.0), (0.0, -12.0), (0.0, 12.0)] {
            world.add_obstacle(Aabb::from_center(
                Vec3::new(x, 1.0, z),
                Vec3::new(2.0, 1.0, 2.0),
            ));
        }
        world
    }

    pub fn add_obstacle(&mut self, obstacle: Aabb) {
        self.obstacles.push(obstacle);
    }

    pub fn player_position(&self, id: PlayerId) -> Option<Vec3> {
        self.players.get(&id).map(|c| c.position)
    }

    fn player_box(&self, feet: Vec3) -> Aabb {
        let half = self.player_half_extents;
        Aabb::from_center(feet + Vec3::Y * half.y, half)
    }

    fn blocking_obstacles(&self, feet: Vec3) -> impl Iterator<Item = &Aabb> {
        let player_box = self.player_box(feet);
        self.obstacles
            .iter()
            .filter(move |o| o.intersects(&player_box))
    }
}

impl CollisionWorld for ArenaWorld {
    fn insert_player(&mut self, id: PlayerId, position: Vec3) {
        self.players.insert(
            id,
            PlayerCollider {
                position,
                enabled: true,
            },
        );
    }

    fn remove_player(&mut self, id: PlayerId) {
        self.players.remove(&id);
    }

    fn set_player_enabled(&mut self, id: PlayerId, enabled: bool) {
        if let Some(collider) = self.players.get_mut(&id) {
            collider.enabled = enabled;
        }
    }

    fn teleport_player(&mut self, id: PlayerId, position: Vec3) {
        if let Some(collider) = self.players.get_mut(&id) {
            collider.position = position;
        }
    }

    fn move_player(&mut self, id: PlayerId, desired: Vec3) -> MoveResult {
        let start = match self.players.get(&id) {
            Some(collider) if collider.enabled => collider.position,
            _ => return MoveResult::default(),
        };

        let mut position = start;
        let mut grounded = false;

        // Horizontal axes first, a blocked axis is simply not applied
        for axis in [0, 2] {
            let mut candidate = position;
            candidate[axis] += desired[axis];
            if self.blocking_obstacles(candidate).next().is_none() {
                position = candidate;
            }
        }

        let mut candidate = position;
        candidate.y += desired.y;
        if desired.y < 0.0 {
            if let Some(top) = self
                .blocking_obstacles(candidate)
                .map(|o| o.max.y)
                .reduce(f32::max)
            {
                candidate.y = top;
                grounded = true;
            }
        } else if desired.y > 0.0 {
            if let Some(bottom) = self
                .blocking_obstacles(candidate)
                .map(|o| o.min.y)
                .reduce(f32::min)
            {
                // Ceiling hits are not reported, upward velocity decays under gravity
                candidate.y = bottom - self.player_half_extents.y * 2.0;
            }
        }
        position = candidate;

        if let Some(collider) = self.players.get_mut(&id) {
            collider.position = position;
        }

        MoveResult {
            displacement: position - start,
            grounded,
            entered_kill_volume: position.y < self.kill_height,
        }
    }

    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_range: f32,
        ignore: Option<PlayerId>,
    ) -> Option<RaycastHit> {
        let direction = direction.try_normalize()?;

        let geometry = self
            .obstacles
            .iter()
            .filter_map(|o| o.ray_distance(origin, direction, max_range))
            .map(|distance| (HitTarget::Geometry, distance));

        let players = self
            .players
            .iter()
            .filter(|(id, collider)| collider.enabled && Some(**id) != ignore)
            .filter_map(|(id, collider)| {
                self.player_box(collider.position)
                    .ray_distance(origin, direction, max_range)
                    .map(|distance| (HitTarget::Player(*id), distance))
            });

        geometry
            .chain(players)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(target, distance)| RaycastHit {
                target,
                point: origin + direction * distance,
                distance,
            })
    }
}
