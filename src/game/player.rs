//! Player state and lifecycle transitions

use std::time::Duration;

use super::spawn::SpawnPoint;
use super::{Intent, PlayerId, Pose};

/// Movement, stamina and lifecycle tuning shared by all players
#[derive(Debug, Clone, Copy)]
pub struct PlayerStats {
    pub max_health: f32,
    pub max_stamina: f32,
    /// Walking speed in units per second
    pub move_speed: f32,
    /// Sprint speed as a multiple of `move_speed`
    pub sprint_multiplier: f32,
    /// Upward speed applied on jump, units per second
    pub jump_speed: f32,
    /// Units per second squared, negative is down
    pub gravity: f32,
    /// Stamina regained per second
    pub recharge_rate: f32,
    /// Stamina spent per second while sprinting
    pub drain_rate: f32,
    /// Stamina spent per jump. A jump needs strictly more than this.
    pub jump_cost: f32,
    /// How long regeneration stays locked after stamina runs out
    pub fatigue_duration: Duration,
    /// Time between death and respawn
    pub respawn_delay: Duration,
}

impl PlayerStats {
    pub fn sprint_speed(&self) -> f32 {
        self.move_speed * self.sprint_multiplier
    }
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            max_stamina: 50.0,
            move_speed: 6.0,
            sprint_multiplier: 1.65,
            jump_speed: 5.0,
            gravity: -9.81,
            recharge_rate: 5.0,
            drain_rate: 5.0,
            jump_cost: 5.0,
            fatigue_duration: Duration::from_secs(3),
            respawn_delay: Duration::from_secs(5),
        }
    }
}

/// Lifecycle of a player avatar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    /// Moves and can be damaged
    Alive,
    /// Health reached zero, waiting on the respawn timer
    Dying,
    /// Respawn timer fired, being placed at a spawn point
    Respawning,
}

/// Result of applying damage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// Player was already at zero health, nothing changed
    Ignored,
    /// Player survived with the given health
    Damaged { health: f32 },
    /// This hit took the player to zero health
    Killed,
}

/// Authoritative player state, owned by the simulation
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: PlayerId,
    pub username: String,
    pub team: String,

    pub pose: Pose,
    /// Vertical speed carried between ticks, units per second
    pub vertical_velocity: f32,
    /// Ground contact reported by the last move resolution
    pub grounded: bool,
    /// When false the player is skipped by movement resolution
    pub controller_enabled: bool,

    pub health: f32,
    pub max_health: f32,
    pub stamina: f32,
    pub max_stamina: f32,
    /// Blocks stamina regeneration until the fatigue timer fires
    pub fatigued: bool,

    pub score: u32,
    pub life: LifeState,
    pub intent: Intent,
}

impl PlayerState {
    pub fn new(
        id: PlayerId,
        username: String,
        team: String,
        spawn: &SpawnPoint,
        stats: &PlayerStats,
    ) -> Self {
        Self {
            id,
            username,
            team,
            pose: spawn.pose(),
            vertical_velocity: 0.0,
            grounded: false,
            controller_enabled: true,
            health: stats.max_health,
            max_health: stats.max_health,
            stamina: stats.max_stamina,
            max_stamina: stats.max_stamina,
            fatigued: false,
            score: 0,
            life: LifeState::Alive,
            intent: Intent::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Replace the stored intent wholesale
    pub fn set_intent(&mut self, intent: Intent) {
        self.intent = intent;
    }

    /// Subtract `amount` from health, clamping at zero.
    ///
    /// Lethal damage disables the controller and moves the player to
    /// [`LifeState::Dying`]. Arming the respawn timer is the caller's job.
    pub fn take_damage(&mut self, amount: f32) -> DamageOutcome {
        if !self.is_alive() {
            return DamageOutcome::Ignored;
        }

        self.health = (self.health - amount).clamp(0.0, self.max_health);
        if self.health > 0.0 {
            return DamageOutcome::Damaged {
                health: self.health,
            };
        }

        self.controller_enabled = false;
        self.life = LifeState::Dying;
        DamageOutcome::Killed
    }

    /// Respawn timer fired
    pub fn begin_respawn(&mut self) {
        assert_eq!(
            self.life,
            LifeState::Dying,
            "player {} respawning while not dying",
            self.id
        );
        self.life = LifeState::Respawning;
    }

    /// Place the player at `spawn` with full health and stamina and hand
    /// control back. Only the spawn position is taken, the player keeps
    /// facing where they were looking.
    pub fn complete_respawn(&mut self, spawn: &SpawnPoint) {
        assert_eq!(
            self.life,
            LifeState::Respawning,
            "player {} completing a respawn that never began",
            self.id
        );
        self.pose.position = spawn.position;
        self.vertical_velocity = 0.0;
        self.grounded = false;
        self.health = self.max_health;
        self.stamina = self.max_stamina;
        self.controller_enabled = true;
        self.life = LifeState::Alive;
    }

    /// Fatigue timer fired
    pub fn release_fatigue(&mut self) {
        self.fatigued = false;
    }

    /// Credit one kill, returning the new score
    pub fn award_kill(&mut self) -> u32 {
        self.score += 1;
        self.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn spawn_at(x: f32) -> SpawnPoint {
        SpawnPoint {
            position: Vec3::new(x, 0.0, 0.0),
            rotation: Quat::IDENTITY,
        }
    }

    fn player() -> PlayerState {
        PlayerState::new(
            1,
            "alice".to_string(),
            "red".to_string(),
            &spawn_at(0.0),
            &PlayerStats::default(),
        )
    }

    #[test]
    fn starts_full_and_alive() {
        let p = player();
        assert_eq!(p.health, 100.0);
        assert_eq!(p.stamina, 50.0);
        assert_eq!(p.score, 0);
        assert!(!p.fatigued);
        assert!(p.controller_enabled);
        assert_eq!(p.life, LifeState::Alive);
    }

    #[test]
    fn non_lethal_damage_keeps_player_alive() {
        let mut p = player();
        p.health = 30.0;

        assert_eq!(p.take_damage(20.0), DamageOutcome::Damaged { health: 10.0 });
        assert!(p.controller_enabled);
        assert_eq!(p.life, LifeState::Alive);
    }

    #[test]
    fn lethal_damage_clamps_and_disables_controller() {
        let mut p = player();
        p.health = 15.0;

        assert_eq!(p.take_damage(20.0), DamageOutcome::Killed);
        assert_eq!(p.health, 0.0);
        assert!(!p.controller_enabled);
        assert_eq!(p.life, LifeState::Dying);
    }

    #[test]
    fn damage_on_dead_player_is_ignored() {
        let mut p = player();
        p.take_damage(500.0);
        let before = p.clone();

        assert_eq!(p.take_damage(20.0), DamageOutcome::Ignored);
        assert_eq!(p.health, before.health);
        assert_eq!(p.life, before.life);
    }

    #[test]
    fn health_stays_in_range_for_any_sequence() {
        let mut p = player();
        for amount in [5.0, 0.0, 37.5, 12.0, 80.0, 20.0, 3.0] {
            p.take_damage(amount);
            assert!((0.0..=p.max_health).contains(&p.health));
        }
    }

    #[test]
    fn respawn_restores_everything() {
        let mut p = player();
        p.stamina = 3.0;
        p.vertical_velocity = -4.0;
        p.take_damage(100.0);

        p.begin_respawn();
        assert_eq!(p.life, LifeState::Respawning);
        p.complete_respawn(&spawn_at(9.0));

        assert_eq!(p.health, p.max_health);
        assert_eq!(p.stamina, p.max_stamina);
        assert!(p.controller_enabled);
        assert_eq!(p.life, LifeState::Alive);
        assert_eq!(p.pose.position, Vec3::new(9.0, 0.0, 0.0));
        assert_eq!(p.vertical_velocity, 0.0);
    }

    #[test]
    #[should_panic(expected = "while not dying")]
    fn respawning_a_live_player_is_a_bug() {
        let mut p = player();
        p.begin_respawn();
    }

    #[test]
    fn fatigue_survives_respawn() {
        let mut p = player();
        p.fatigued = true;
        p.take_damage(100.0);
        p.begin_respawn();
        p.complete_respawn(&spawn_at(1.0));
        assert!(p.fatigued);

        p.release_fatigue();
        assert!(!p.fatigued);
    }
}
