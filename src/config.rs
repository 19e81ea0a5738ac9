use std::env;

/// Runtime configuration, read from the environment once at boot.
///
/// Environment variables:
/// - `TOKEN_SECRET` — HMAC secret for access tokens (required, no default)
/// - `REFRESH_SECRET` — HMAC secret for refresh tokens (defaults to `TOKEN_SECRET`)
/// - `DATABASE_PATH` — SQLite file path (default: `data/learnhub.db`)
/// - `SOCIAL_SERVICE_URL` — base URL of the social service
/// - `ACCOUNT_SERVICE_URL` — base URL of the account service
/// - `STUN_SERVERS` — comma-separated `host:port` list
/// - `TURN_SERVER` / `TURN_USERNAME` / `TURN_PASSWORD` — optional TURN relay
/// - `MEETING_TTL` — meeting cache TTL in seconds (default: 14400)
/// - `STATS_SYNC_INTERVAL_MS` — stats sync tick interval (default: 300000)
/// - `QUEUE_POLL_INTERVAL_MS` — queue worker poll interval (default: 100)
/// - `CORS_ORIGINS` — comma-separated allowed origins (default: any)
#[derive(Debug, Clone)]
pub struct Config {
    pub token_secret: String,
    pub refresh_secret: String,
    pub database_path: String,
    pub social_service_url: Option<String>,
    pub account_service_url: Option<String>,
    pub stun_servers: Vec<String>,
    pub turn_server: Option<String>,
    pub turn_username: Option<String>,
    pub turn_password: Option<String>,
    pub meeting_ttl_secs: u64,
    pub stats_sync_interval_ms: u64,
    pub queue_poll_interval_ms: u64,
    pub cors_origins: Option<Vec<String>>,
    /// Access token lifetime in seconds (default 7 days).
    pub access_token_ttl_secs: i64,
    /// Refresh token lifetime in seconds (default 30 days).
    pub refresh_token_ttl_secs: i64,
}

impl Config {
    /// Read configuration from the environment. Fails when a required
    /// secret is missing so the binary can log and exit at startup.
    pub fn from_env() -> Result<Self, String> {
        let token_secret = env::var("TOKEN_SECRET")
            .map_err(|_| "TOKEN_SECRET is not set; refusing to start".to_string())?;
        if token_secret.trim().is_empty() {
            return Err("TOKEN_SECRET is empty; refusing to start".to_string());
        }
        let refresh_secret = env::var("REFRESH_SECRET").unwrap_or_else(|_| token_secret.clone());

        Ok(Self {
            refresh_secret,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/learnhub.db".to_string()),
            social_service_url: env::var("SOCIAL_SERVICE_URL").ok(),
            account_service_url: env::var("ACCOUNT_SERVICE_URL").ok(),
            stun_servers: env::var("STUN_SERVERS")
                .map(|s| {
                    s.split(',')
                        .map(|x| x.trim().to_string())
                        .filter(|x| !x.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| vec!["stun.l.google.com:19302".to_string()]),
            turn_server: env::var("TURN_SERVER").ok(),
            turn_username: env::var("TURN_USERNAME").ok(),
            turn_password: env::var("TURN_PASSWORD").ok(),
            meeting_ttl_secs: env_u64("MEETING_TTL", 14400),
            stats_sync_interval_ms: env_u64("STATS_SYNC_INTERVAL_MS", 300_000),
            queue_poll_interval_ms: env_u64("QUEUE_POLL_INTERVAL_MS", 100),
            cors_origins: env::var("CORS_ORIGINS").ok().map(|s| {
                s.split(',')
                    .map(|x| x.trim().to_string())
                    .filter(|x| !x.is_empty())
                    .collect()
            }),
            access_token_ttl_secs: 7 * 24 * 3600,
            refresh_token_ttl_secs: 30 * 24 * 3600,
            token_secret,
        })
    }

    /// Configuration for tests: fixed secret, caller-provided database path,
    /// fast queue polling so async assertions converge quickly.
    pub fn for_tests(database_path: &str) -> Self {
        Self {
            token_secret: "test-token-secret".to_string(),
            refresh_secret: "test-refresh-secret".to_string(),
            database_path: database_path.to_string(),
            social_service_url: None,
            account_service_url: None,
            stun_servers: vec!["stun.l.google.com:19302".to_string()],
            turn_server: None,
            turn_username: None,
            turn_password: None,
            meeting_ttl_secs: 14400,
            stats_sync_interval_ms: 300_000,
            queue_poll_interval_ms: 25,
            cors_origins: None,
            access_token_ttl_secs: 7 * 24 * 3600,
            refresh_token_ttl_secs: 30 * 24 * 3600,
        }
    }

    /// ICE server list handed to joining participants: all STUN servers,
    /// plus the TURN relay when configured.
    pub fn ice_servers(&self) -> Vec<serde_json::Value> {
        let mut servers: Vec<serde_json::Value> = self
            .stun_servers
            .iter()
            .map(|s| serde_json::json!({ "urls": format!("stun:{s}") }))
            .collect();
        if let Some(turn) = &self.turn_server {
            servers.push(serde_json::json!({
                "urls": format!("turn:{turn}"),
                "username": self.turn_username.clone().unwrap_or_default(),
                "credential": self.turn_password.clone().unwrap_or_default(),
            }));
        }
        servers
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
