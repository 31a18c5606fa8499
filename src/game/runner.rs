//! Simulation task and the handle used to talk to it

use glam::Vec3;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::events::SyncEvent;
use super::simulation::Simulation;
use super::world::CollisionWorld;
use super::{Intent, PlayerId};

/// Commands delivered to the simulation task
#[derive(Debug)]
pub enum SimulationCommand {
    /// Create a player for an admitted session. Replies with the players
    /// already present and a subscription starting right after them.
    Admit {
        player_id: PlayerId,
        username: String,
        team: String,
        reply: oneshot::Sender<Admission>,
    },
    Remove {
        player_id: PlayerId,
    },
    SetIntent {
        player_id: PlayerId,
        intent: Intent,
    },
    Shoot {
        player_id: PlayerId,
        direction: Vec3,
    },
}

/// What a newly admitted player is sent
#[derive(Debug)]
pub struct Admission {
    /// `PlayerSpawned` for every player present before the joiner
    pub roster: Vec<SyncEvent>,
    /// Every event from the joiner's own spawn onwards
    pub events: broadcast::Receiver<SyncEvent>,
}

/// Cloneable handle to a running simulation
#[derive(Clone)]
pub struct SimulationHandle {
    cmd_tx: mpsc::Sender<SimulationCommand>,
    tick_rate: u32,
}

impl SimulationHandle {
    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub async fn admit(
        &self,
        player_id: PlayerId,
        username: String,
        team: String,
    ) -> Result<Admission, SimulationError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(SimulationCommand::Admit {
            player_id,
            username,
            team,
            reply,
        })
        .await?;
        reply_rx.await.map_err(|_| SimulationError::Closed)
    }

    pub async fn remove(&self, player_id: PlayerId) -> Result<(), SimulationError> {
        self.send(SimulationCommand::Remove { player_id }).await
    }

    pub async fn set_intent(
        &self,
        player_id: PlayerId,
        intent: Intent,
    ) -> Result<(), SimulationError> {
        self.send(SimulationCommand::SetIntent { player_id, intent })
            .await
    }

    pub async fn shoot(&self, player_id: PlayerId, direction: Vec3) -> Result<(), SimulationError> {
        self.send(SimulationCommand::Shoot {
            player_id,
            direction,
        })
        .await
    }

    async fn send(&self, cmd: SimulationCommand) -> Result<(), SimulationError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SimulationError::Closed)
    }
}

/// Simulation task errors
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Simulation task is no longer running")]
    Closed,
}

/// Owns the simulation and runs the fixed-rate tick loop.
///
/// Ticks, inbound commands and timer deadlines are all handled on this one
/// task. Shots run as soon as they arrive rather than waiting for the next
/// tick.
pub struct SimulationRunner<W: CollisionWorld> {
    sim: Simulation<W>,
    cmd_rx: mpsc::Receiver<SimulationCommand>,
    events_tx: broadcast::Sender<SyncEvent>,
    tick_rate: u32,
}

impl<W: CollisionWorld> SimulationRunner<W> {
    pub fn new(sim: Simulation<W>, tick_rate: u32) -> (Self, SimulationHandle) {
        assert!(tick_rate > 0, "tick rate must be positive");

        let (cmd_tx, cmd_rx) = mpsc::channel(1024);
        let (events_tx, _) = broadcast::channel(4096);

        let handle = SimulationHandle { cmd_tx, tick_rate };

        let runner = Self {
            sim,
            cmd_rx,
            events_tx,
            tick_rate,
        };

        (runner, handle)
    }

    /// Run until every handle has been dropped. Returns the final state.
    pub async fn run(mut self) -> Simulation<W> {
        info!(tick_rate = self.tick_rate, "Simulation started");

        let start = Instant::now();
        let tick_duration = Duration::from_secs_f64(1.0 / self.tick_rate as f64);
        let dt = tick_duration.as_secs_f32();

        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The first interval tick fires immediately
        tick_interval.tick().await;

        loop {
            let next_timer = self.sim.next_timer_deadline().map(|d| start + d);

            tokio::select! {
                _ = tick_interval.tick() => {
                    self.sim.fire_due_timers(start.elapsed());
                    self.sim.advance_tick(dt);
                }
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            self.sim.set_clock(start.elapsed());
                            self.handle_command(cmd);
                        }
                        None => {
                            info!("All simulation handles dropped, stopping");
                            break;
                        }
                    }
                }
                _ = sleep_until_deadline(next_timer) => {
                    self.sim.fire_due_timers(start.elapsed());
                }
            }

            self.publish();
        }

        self.sim
    }

    fn handle_command(&mut self, cmd: SimulationCommand) {
        match cmd {
            SimulationCommand::Admit {
                player_id,
                username,
                team,
                reply,
            } => {
                // Pending events were published at the end of the previous
                // step, so the roster and the subscription line up exactly
                let admission = Admission {
                    roster: self.sim.roster(),
                    events: self.events_tx.subscribe(),
                };
                self.sim.admit(player_id, username, team);
                if reply.send(admission).is_err() {
                    debug!(player_id, "Admit caller went away before the reply");
                }
            }
            SimulationCommand::Remove { player_id } => {
                if self.sim.remove(player_id).is_none() {
                    warn!(player_id, "Remove for unknown player");
                }
            }
            SimulationCommand::SetIntent { player_id, intent } => {
                self.sim.set_intent(player_id, intent);
            }
            SimulationCommand::Shoot {
                player_id,
                direction,
            } => {
                if let Some(hit) = self.sim.shoot(player_id, direction) {
                    debug!(
                        shooter_id = hit.shooter_id,
                        target_id = hit.target_id,
                        killed = hit.target_killed,
                        "Shot hit"
                    );
                }
            }
        }
    }

    fn publish(&mut self) {
        for event in self.sim.drain_events() {
            // No subscribers is fine, events are snapshots
            let _ = self.events_tx.send(event);
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::ArenaWorld;
    use crate::game::{SpawnPoint, SpawnRegistry};
    use glam::Quat;

    fn spawn_runner() -> (SimulationHandle, tokio::task::JoinHandle<Simulation<ArenaWorld>>) {
        let sim = Simulation::new(ArenaWorld::standard(), SpawnRegistry::ring(7, 20.0).unwrap(), 5);
        let (runner, handle) = SimulationRunner::new(sim, 30);
        let task = tokio::spawn(runner.run());
        (handle, task)
    }

    #[tokio::test(start_paused = true)]
    async fn admit_replies_with_existing_roster() {
        let (handle, task) = spawn_runner();

        let first = handle.admit(1, "alice".into(), "red".into()).await.unwrap();
        assert!(first.roster.is_empty());

        let second = handle.admit(2, "bob".into(), "blue".into()).await.unwrap();
        assert_eq!(second.roster.len(), 1);
        assert_eq!(second.roster[0].player_id(), 1);

        drop(handle);
        let sim = task.await.unwrap();
        assert_eq!(sim.player_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_publish_sync_events() {
        let (handle, task) = spawn_runner();

        let mut events = handle.admit(1, "alice".into(), "red".into()).await.unwrap().events;
        handle
            .set_intent(1, Intent::from_flags([true, false, false, false, false, false], Quat::IDENTITY))
            .await
            .unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            SyncEvent::PlayerSpawned { player_id: 1, .. }
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(
            events.recv().await.unwrap(),
            SyncEvent::PositionChanged { player_id: 1, .. }
        ));

        drop(handle);
        let sim = task.await.unwrap();
        assert!(sim.tick() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn killed_player_respawns_after_delay() {
        // One spawn point puts both players in the same spot, so every shot
        // starts inside the target's collider and connects
        let spawns = SpawnRegistry::new(vec![SpawnPoint {
            position: Vec3::new(0.0, 0.0, -30.0),
            rotation: Quat::IDENTITY,
        }])
        .unwrap();
        let sim = Simulation::new(ArenaWorld::standard(), spawns, 5);
        let (runner, handle) = SimulationRunner::new(sim, 30);
        let task = tokio::spawn(runner.run());

        handle.admit(1, "alice".into(), "red".into()).await.unwrap();
        let mut events = handle.admit(2, "bob".into(), "blue".into()).await.unwrap().events;

        for _ in 0..5 {
            handle.shoot(1, Vec3::Z).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut scored = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SyncEvent::PlayerScored { player_id, score } = event {
                scored.push((player_id, score));
            }
            assert!(!matches!(event, SyncEvent::PlayerRespawned { .. }));
        }
        assert_eq!(scored, vec![(1, 1)]);

        tokio::time::sleep(Duration::from_secs(5)).await;

        let mut respawned = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SyncEvent::PlayerRespawned { player_id: 2, .. }) {
                respawned += 1;
            }
        }
        assert_eq!(respawned, 1);

        drop(handle);
        let sim = task.await.unwrap();
        let player = sim.player(2).unwrap();
        assert_eq!(player.health, player.max_health);
        assert!(player.controller_enabled);
        assert!(sim.timers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn removal_cancels_respawn() {
        let (handle, task) = spawn_runner();
        let mut events = handle.admit(1, "alice".into(), "red".into()).await.unwrap().events;

        handle.remove(1).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        let mut saw_disconnect = false;
        while let Ok(event) = events.try_recv() {
            if event == (SyncEvent::PlayerDisconnected { player_id: 1 }) {
                saw_disconnect = true;
            }
        }
        assert!(saw_disconnect);

        drop(handle);
        let sim = task.await.unwrap();
        assert!(sim.player(1).is_none());
        assert!(sim.timers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn joiner_sees_each_existing_player_once() {
        let (handle, task) = spawn_runner();
        handle.admit(7, "early".into(), "red".into()).await.unwrap();

        let Admission { roster, mut events } =
            handle.admit(1, "late".into(), "blue".into()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut spawned = roster.clone();
        while let Ok(event) = events.try_recv() {
            if matches!(event, SyncEvent::PlayerSpawned { .. }) {
                spawned.push(event);
            }
        }

        let ids: Vec<PlayerId> = spawned.iter().map(SyncEvent::player_id).collect();
        assert_eq!(ids, vec![7, 1]);
        assert_eq!(roster.len(), 1);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn handle_reports_closed_simulation() {
        let (handle, task) = spawn_runner();
        task.abort();
        let _ = task.await;

        assert!(matches!(
            handle.remove(1).await,
            Err(SimulationError::Closed)
        ));
    }
}
