//! Authoritative player simulation
//!
//! [`Simulation`] owns every player slot and is the only thing that mutates
//! them. It is driven from a single task (see [`super::runner`]), which makes
//! movement ticks, inbound shots and fired timers mutually exclusive per
//! player without any locking.

use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::combat::{CombatSystem, HitResult, WeaponStats};
use super::events::SyncEvent;
use super::movement::MovementSystem;
use super::player::{DamageOutcome, PlayerState, PlayerStats};
use super::spawn::SpawnRegistry;
use super::timers::{TimerKey, TimerKind, TimerScheduler};
use super::world::CollisionWorld;
use super::{Intent, PlayerId, Pose};

pub struct Simulation<W: CollisionWorld> {
    players: HashMap<PlayerId, PlayerState>,
    world: W,
    spawns: SpawnRegistry,
    timers: TimerScheduler,
    rng: ChaCha8Rng,
    stats: PlayerStats,
    weapon: WeaponStats,
    /// Events produced since the last drain, in emission order
    events: Vec<SyncEvent>,
    /// Time since simulation start, used to arm timers
    clock: Duration,
    tick: u64,
}

impl<W: CollisionWorld> Simulation<W> {
    pub fn new(world: W, spawns: SpawnRegistry, seed: u64) -> Self {
        Self::with_stats(world, spawns, seed, PlayerStats::default(), WeaponStats::default())
    }

    pub fn with_stats(
        world: W,
        spawns: SpawnRegistry,
        seed: u64,
        stats: PlayerStats,
        weapon: WeaponStats,
    ) -> Self {
        Self {
            players: HashMap::new(),
            world,
            spawns,
            timers: TimerScheduler::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            stats,
            weapon,
            events: Vec::new(),
            clock: Duration::ZERO,
            tick: 0,
        }
    }

    /// Move the simulation clock forward. The clock never goes backwards.
    pub fn set_clock(&mut self, now: Duration) {
        self.clock = self.clock.max(now);
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn timers(&self) -> &TimerScheduler {
        &self.timers
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn next_timer_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Take every event emitted since the last call
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.events)
    }

    /// Create a player for an admitted session at a random spawn point.
    ///
    /// Slot ids come from the session manager, reusing a live id is a bug.
    pub fn admit(&mut self, id: PlayerId, username: String, team: String) -> Pose {
        assert!(
            !self.players.contains_key(&id),
            "player slot {} is already occupied",
            id
        );

        let (spawn_index, spawn) = self.spawns.choose(&mut self.rng);
        let player = PlayerState::new(id, username, team, &spawn, &self.stats);
        let pose = player.pose;

        self.world.insert_player(id, pose.position);
        self.events.push(SyncEvent::PlayerSpawned {
            player_id: id,
            username: player.username.clone(),
            team: player.team.clone(),
            pose,
        });

        info!(
            player_id = id,
            username = %player.username,
            spawn_index,
            "Player spawned"
        );
        self.players.insert(id, player);
        pose
    }

    /// Destroy a player slot, cancelling anything still scheduled for it
    pub fn remove(&mut self, id: PlayerId) -> Option<PlayerState> {
        let player = self.players.remove(&id)?;
        let cancelled = self.timers.cancel_player(id);
        self.world.remove_player(id);
        self.events
            .push(SyncEvent::PlayerDisconnected { player_id: id });

        info!(player_id = id, cancelled_timers = cancelled, "Player removed");
        Some(player)
    }

    /// `PlayerSpawned` snapshot of every current player, for late joiners
    pub fn roster(&self) -> Vec<SyncEvent> {
        let mut players: Vec<&PlayerState> = self.players.values().collect();
        players.sort_by_key(|p| p.id);
        players
            .into_iter()
            .map(|p| SyncEvent::PlayerSpawned {
                player_id: p.id,
                username: p.username.clone(),
                team: p.team.clone(),
                pose: p.pose,
            })
            .collect()
    }

    /// Replace a player's intent. Applied on the next tick.
    pub fn set_intent(&mut self, id: PlayerId, intent: Intent) {
        match self.players.get_mut(&id) {
            Some(player) => player.set_intent(intent),
            None => debug!(player_id = id, "Intent for unknown player dropped"),
        }
    }

    /// Advance every player by one fixed step of `dt` seconds
    pub fn advance_tick(&mut self, dt: f32) {
        self.tick += 1;

        let mut ids: Vec<PlayerId> = self.players.keys().copied().collect();
        ids.sort_unstable();

        let mut fallen = Vec::new();
        for id in ids {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            let Some(step) = MovementSystem::advance(player, &self.stats, &mut self.world, dt)
            else {
                continue;
            };

            player.pose = step.pose;
            player.vertical_velocity = step.vertical_velocity;
            player.grounded = step.grounded;
            player.stamina = step.stamina;
            player.fatigued = step.fatigued;

            self.events.push(SyncEvent::PositionChanged {
                player_id: id,
                position: step.pose.position,
            });
            self.events.push(SyncEvent::RotationChanged {
                player_id: id,
                rotation: step.pose.rotation,
            });
            self.events.push(SyncEvent::StaminaChanged {
                player_id: id,
                stamina: step.stamina,
            });

            if step.fatigue_started {
                self.timers.arm(
                    TimerKey::new(id, TimerKind::FatigueRelease),
                    self.clock,
                    self.stats.fatigue_duration,
                );
                debug!(player_id = id, "Player fatigued");
            }

            if step.entered_kill_volume {
                fallen.push(id);
            }
        }

        for id in fallen {
            info!(player_id = id, "Player fell into kill volume");
            self.apply_damage(id, self.stats.max_health);
        }
    }

    /// Fire a hit-scan shot from `attacker_id` along `direction`.
    ///
    /// Returns `None` on a miss, or when the shooter is dead or unknown.
    /// Killing the target credits the shooter with one point.
    pub fn shoot(&mut self, attacker_id: PlayerId, direction: Vec3) -> Option<HitResult> {
        let attacker = self.players.get(&attacker_id)?;
        let (target_id, point) =
            CombatSystem::trace_shot(attacker, direction, &self.weapon, &self.world)?;

        let damage = self.weapon.damage;
        let outcome = self.apply_damage(target_id, damage);
        let target_killed = outcome == Some(DamageOutcome::Killed);

        if target_killed {
            if let Some(attacker) = self.players.get_mut(&attacker_id) {
                let score = attacker.award_kill();
                self.events.push(SyncEvent::PlayerScored {
                    player_id: attacker_id,
                    score,
                });
                info!(
                    player_id = attacker_id,
                    victim_id = target_id,
                    score,
                    "Kill credited"
                );
            }
        }

        Some(HitResult {
            shooter_id: attacker_id,
            target_id,
            damage,
            point,
            target_killed,
        })
    }

    /// Damage a player. Lethal damage disables their collider and arms the
    /// respawn timer. Returns `None` for unknown players.
    pub fn apply_damage(&mut self, id: PlayerId, amount: f32) -> Option<DamageOutcome> {
        let player = self.players.get_mut(&id)?;
        let outcome = player.take_damage(amount);

        match outcome {
            DamageOutcome::Ignored => return Some(outcome),
            DamageOutcome::Damaged { health } => {
                debug!(player_id = id, health, "Player damaged");
            }
            DamageOutcome::Killed => {
                self.world.set_player_enabled(id, false);
                let superseded = self.timers.arm(
                    TimerKey::new(id, TimerKind::Respawn),
                    self.clock,
                    self.stats.respawn_delay,
                );
                debug_assert!(!superseded, "respawn timer armed twice for player {}", id);
                info!(player_id = id, "Player died");
            }
        }

        self.events.push(SyncEvent::HealthChanged {
            player_id: id,
            health: player.health,
        });
        Some(outcome)
    }

    /// Apply every timer due at `now`
    pub fn fire_due_timers(&mut self, now: Duration) {
        self.set_clock(now);

        for key in self.timers.pop_due(self.clock) {
            if !self.players.contains_key(&key.player_id) {
                warn!(player_id = key.player_id, kind = ?key.kind, "Timer fired for missing player");
                continue;
            }

            match key.kind {
                TimerKind::FatigueRelease => {
                    if let Some(player) = self.players.get_mut(&key.player_id) {
                        player.release_fatigue();
                    }
                    debug!(player_id = key.player_id, "Fatigue released");
                }
                TimerKind::Respawn => self.respawn(key.player_id),
            }
        }
    }

    fn respawn(&mut self, id: PlayerId) {
        let (spawn_index, spawn) = self.spawns.choose(&mut self.rng);
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };

        player.begin_respawn();
        player.complete_respawn(&spawn);
        let pose = player.pose;

        self.world.teleport_player(id, pose.position);
        self.world.set_player_enabled(id, true);

        self.events.push(SyncEvent::PositionChanged {
            player_id: id,
            position: pose.position,
        });
        self.events
            .push(SyncEvent::PlayerRespawned { player_id: id, pose });

        info!(player_id = id, spawn_index, "Player respawned");
    }
}
