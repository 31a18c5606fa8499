//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::SimulationHandle;
use crate::session::SessionManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionManager>,
    pub simulation: SimulationHandle,
}

impl AppState {
    pub fn new(config: Config, simulation: SimulationHandle) -> Self {
        let sessions = Arc::new(SessionManager::new(config.max_players));

        Self {
            config: Arc::new(config),
            sessions,
            simulation,
        }
    }
}
