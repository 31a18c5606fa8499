//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Maximum concurrent players
    pub max_players: usize,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Seed for spawn selection, random when unset
    pub sim_seed: Option<u64>,
    /// JSON file with spawn points, built-in ring when unset
    pub spawn_points_path: Option<PathBuf>,

    /// Allowed client origins for CORS (comma separated), any when unset
    pub client_origin: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:20521".to_string())
        };

        let max_players: usize = parse_or(&lookup, "MAX_PLAYERS", 10)?;
        if max_players == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_PLAYERS",
                value: "0".to_string(),
            });
        }

        let tick_rate: u32 = parse_or(&lookup, "TICK_RATE", 30)?;
        if tick_rate == 0 {
            return Err(ConfigError::Invalid {
                var: "TICK_RATE",
                value: "0".to_string(),
            });
        }

        let sim_seed = match lookup("SIM_SEED") {
            Some(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                var: "SIM_SEED",
                value: raw,
            })?),
            None => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            max_players,
            tick_rate,
            sim_seed,
            spawn_points_path: lookup("SPAWN_POINTS_PATH").map(PathBuf::from),

            client_origin: lookup("CLIENT_ORIGIN"),
        })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { var, value: raw }),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::assert_ok;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = assert_ok!(Config::from_lookup(lookup(&[])));
        assert_eq!(config.server_addr.port(), 20521);
        assert_eq!(config.max_players, 10);
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.log_level, "info");
        assert!(config.sim_seed.is_none());
        assert!(config.spawn_points_path.is_none());
    }

    #[test]
    fn port_overrides_server_addr() {
        let config = assert_ok!(Config::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("SERVER_ADDR", "127.0.0.1:1234"),
        ])));
        assert_eq!(config.server_addr.to_string(), "0.0.0.0:9000");
    }

    #[test]
    fn parses_simulation_settings() {
        let config = assert_ok!(Config::from_lookup(lookup(&[
            ("MAX_PLAYERS", "16"),
            ("TICK_RATE", "60"),
            ("SIM_SEED", "42"),
            ("SPAWN_POINTS_PATH", "maps/arena.json"),
        ])));
        assert_eq!(config.max_players, 16);
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.sim_seed, Some(42));
        assert_eq!(
            config.spawn_points_path,
            Some(PathBuf::from("maps/arena.json"))
        );
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("TICK_RATE", "fast")])),
            Err(ConfigError::Invalid { var: "TICK_RATE", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("MAX_PLAYERS", "0")])),
            Err(ConfigError::Invalid { var: "MAX_PLAYERS", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("SERVER_ADDR", "nowhere")])),
            Err(ConfigError::InvalidAddress)
        ));
    }
}
