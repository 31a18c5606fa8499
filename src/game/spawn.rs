//! Spawn point registry

use glam::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::Pose;

/// A fixed location players can spawn at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Quat,
}

impl SpawnPoint {
    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            rotation: self.rotation,
        }
    }
}

/// Ordered, fixed-size set of spawn points populated at startup
#[derive(Debug, Clone)]
pub struct SpawnRegistry {
    points: Vec<SpawnPoint>,
}

impl SpawnRegistry {
    pub fn new(points: Vec<SpawnPoint>) -> Result<Self, SpawnError> {
        if points.is_empty() {
            return Err(SpawnError::Empty);
        }
        Ok(Self { points })
    }

    /// Load spawn points from a JSON array of `{ position, rotation }`
    pub fn load_json(path: &Path) -> Result<Self, SpawnError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SpawnError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let points: Vec<SpawnPoint> = serde_json::from_str(&raw)?;
        Self::new(points)
    }

    /// `count` points evenly spaced on a circle at floor height, each facing
    /// the centre
    pub fn ring(count: usize, radius: f32) -> Result<Self, SpawnError> {
        let points = (0..count)
            .map(|i| {
                let angle = i as f32 / count as f32 * std::f32::consts::TAU;
                SpawnPoint {
                    position: Vec3::new(angle.sin() * radius, 0.0, angle.cos() * radius),
                    rotation: Quat::from_rotation_y(angle + std::f32::consts::PI),
                }
            })
            .collect();
        Self::new(points)
    }

    /// Pick a point uniformly at random over the whole registry. The previous
    /// choice has no influence, so the same point can come up twice in a row.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> (usize, SpawnPoint) {
        let index = rng.gen_range(0..self.points.len());
        (index, self.get(index))
    }

    /// Resolve a spawn index. An out-of-range index is a caller bug.
    pub fn get(&self, index: usize) -> SpawnPoint {
        assert!(
            index < self.points.len(),
            "spawn index {} out of range for {} points",
            index,
            self.points.len()
        );
        self.points[index]
    }

    pub fn points(&self) -> &[SpawnPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// Spawn registry errors
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("Spawn registry needs at least one spawn point")]
    Empty,

    #[error("Failed to read spawn points from {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid spawn point file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    #[test]
    fn empty_registry_is_rejected() {
        assert!(matches!(SpawnRegistry::new(vec![]), Err(SpawnError::Empty)));
    }

    #[test]
    fn choose_covers_every_point() {
        let registry = SpawnRegistry::ring(7, 20.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let seen: HashSet<usize> = (0..500).map(|_| registry.choose(&mut rng).0).collect();

        assert_eq!(seen.len(), 7);
    }

    #[test]
    fn choice_is_deterministic_for_a_seed() {
        let registry = SpawnRegistry::ring(7, 20.0).unwrap();
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);

        for _ in 0..20 {
            assert_eq!(registry.choose(&mut a), registry.choose(&mut b));
        }
    }

    #[test]
    fn ring_points_face_the_centre() {
        let registry = SpawnRegistry::ring(4, 10.0).unwrap();
        for point in registry.points() {
            let facing = point.rotation * Vec3::Z;
            let to_centre = (-point.position).normalize();
            assert!(facing.abs_diff_eq(to_centre, 1e-4));
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_index_fails_fast() {
        let registry = SpawnRegistry::ring(3, 5.0).unwrap();
        registry.get(3);
    }

    #[test]
    fn parses_json_with_default_rotation() {
        let points: Vec<SpawnPoint> =
            serde_json::from_str(r#"[{"position":[1.0,0.0,2.0]}]"#).unwrap();
        let registry = SpawnRegistry::new(points).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(0).rotation, Quat::IDENTITY);
        assert_eq!(registry.get(0).position, Vec3::new(1.0, 0.0, 2.0));
    }
}
