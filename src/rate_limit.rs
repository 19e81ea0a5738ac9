use std::collections::HashMap;
use std::env;
use std::sync::Mutex;
use std::time::Instant;

/// Per-window request limits, read from the environment with defaults.
///
/// Environment variables:
/// - `RATE_LIMIT_GENERAL` — max general API requests per window per IP (default: 100)
/// - `RATE_LIMIT_AUTH` — max auth-sensitive requests per window per IP (default: 10)
/// - `RATE_LIMIT_HEAVY` — max heavy requests per window per IP (default: 20)
/// - `RATE_LIMIT_WINDOW_SECS` — window length (default: 900)
pub struct RateLimitConfig {
    pub general_max: usize,
    pub auth_max: usize,
    pub heavy_max: usize,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_max: 100,
            auth_max: 10,
            heavy_max: 20,
            window_secs: 900,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = env::var("RATE_LIMIT_GENERAL")
            && let Ok(n) = val.parse::<usize>()
        {
            config.general_max = n;
        }
        if let Ok(val) = env::var("RATE_LIMIT_AUTH")
            && let Ok(n) = val.parse::<usize>()
        {
            config.auth_max = n;
        }
        if let Ok(val) = env::var("RATE_LIMIT_HEAVY")
            && let Ok(n) = val.parse::<usize>()
        {
            config.heavy_max = n;
        }
        if let Ok(val) = env::var("RATE_LIMIT_WINDOW_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.window_secs = n;
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub allowed: bool,
    pub limit: usize,
    pub remaining: usize,
    /// Seconds until the oldest request in the window expires. 0 while
    /// capacity remains.
    pub retry_after_secs: u64,
}

/// Sliding-window limiter keyed by `"class:ip"`. Windows are request
/// timestamps pruned on each check.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Vec<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str, max: usize, window_secs: u64) -> RateLimitInfo {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let window = std::time::Duration::from_secs(window_secs);

        let entries = windows.entry(key.to_string()).or_default();
        entries.retain(|t| now.duration_since(*t) < window);

        if entries.len() >= max {
            let retry_after = entries
                .iter()
                .min()
                .map(|oldest| {
                    let elapsed = now.duration_since(*oldest);
                    if elapsed < window {
                        (window - elapsed).as_secs() + 1
                    } else {
                        1
                    }
                })
                .unwrap_or(1);
            return RateLimitInfo {
                allowed: false,
                limit: max,
                remaining: 0,
                retry_after_secs: retry_after,
            };
        }

        entries.push(now);
        RateLimitInfo {
            allowed: true,
            limit: max,
            remaining: max - entries.len(),
            retry_after_secs: 0,
        }
    }
}
