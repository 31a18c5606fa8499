//! Player slot allocation

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::game::PlayerId;

/// Longest username accepted at admission
pub const MAX_USERNAME_LEN: usize = 32;

/// An admitted connection
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,
    pub username: String,
    pub team: String,
    pub connected_at: Instant,
}

impl Session {
    /// How long this session has been connected
    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Hands out player ids `1..=max_players` and tracks who holds them.
///
/// The lowest free id is always handed out first, and released ids go back
/// into the pool.
pub struct SessionManager {
    max_players: usize,
    free_slots: Mutex<BTreeSet<PlayerId>>,
    sessions: DashMap<PlayerId, Session>,
}

impl SessionManager {
    pub fn new(max_players: usize) -> Self {
        let free_slots = (1..=max_players as PlayerId).collect();
        Self {
            max_players,
            free_slots: Mutex::new(free_slots),
            sessions: DashMap::new(),
        }
    }

    /// Claim a slot for a new connection
    pub fn admit(&self, username: &str, team: &str) -> Result<Session, SessionError> {
        let username = username.trim();
        if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
            return Err(SessionError::InvalidUsername);
        }

        let player_id = self
            .free_slots
            .lock()
            .pop_first()
            .ok_or(SessionError::ServerFull {
                max_players: self.max_players,
            })?;

        let session = Session {
            player_id,
            username: username.to_string(),
            team: team.trim().to_string(),
            connected_at: Instant::now(),
        };
        self.sessions.insert(player_id, session.clone());
        Ok(session)
    }

    /// Free a slot. Returns the session that held it, if any.
    pub fn release(&self, player_id: PlayerId) -> Option<Session> {
        let (_, session) = self.sessions.remove(&player_id)?;
        self.free_slots.lock().insert(player_id);
        Some(session)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }
}

/// Session admission errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Server is full ({max_players} players)")]
    ServerFull { max_players: usize },

    #[error("Username must be 1 to 32 characters")]
    InvalidUsername,
}

impl SessionError {
    /// Stable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::ServerFull { .. } => "server_full",
            SessionError::InvalidUsername => "invalid_username",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn hands_out_lowest_free_slot() {
        let sessions = SessionManager::new(3);
        assert_eq!(assert_ok!(sessions.admit("a", "red")).player_id, 1);
        assert_eq!(assert_ok!(sessions.admit("b", "red")).player_id, 2);

        sessions.release(1);
        assert_eq!(assert_ok!(sessions.admit("c", "blue")).player_id, 1);
        assert_eq!(sessions.active_count(), 2);
    }

    #[test]
    fn rejects_when_full() {
        let sessions = SessionManager::new(1);
        assert_ok!(sessions.admit("a", "red"));

        let err = assert_err!(sessions.admit("b", "red"));
        assert!(matches!(err, SessionError::ServerFull { max_players: 1 }));
        assert_eq!(err.code(), "server_full");
    }

    #[test]
    fn rejects_bad_usernames() {
        let sessions = SessionManager::new(4);
        assert!(matches!(
            sessions.admit("   ", "red"),
            Err(SessionError::InvalidUsername)
        ));
        assert!(matches!(
            sessions.admit(&"x".repeat(33), "red"),
            Err(SessionError::InvalidUsername)
        ));
        assert_eq!(sessions.active_count(), 0);
    }

    #[test]
    fn trims_and_records_session() {
        let sessions = SessionManager::new(4);
        let session = assert_ok!(sessions.admit("  alice ", " red "));

        assert_eq!(session.username, "alice");
        assert_eq!(session.team, "red");

        let stored = sessions.release(session.player_id).unwrap();
        assert_eq!(stored.username, "alice");
        assert_eq!(stored.team, "red");
    }

    #[test]
    fn releasing_unknown_slot_is_harmless() {
        let sessions = SessionManager::new(2);
        assert!(sessions.release(2).is_none());
        assert_eq!(assert_ok!(sessions.admit("a", "red")).player_id, 1);
    }
}
