//! Client configuration

use std::path::PathBuf;
use std::time::Duration;

/// Default interval between token validations
pub const DEFAULT_VALIDATION_INTERVAL: Duration = Duration::from_secs(120);
/// Delay before the first validation after sign-in
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);
/// Refresh when the access token expires sooner than this
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(300);

/// Endpoint paths, relative to the API base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRoutes {
    pub login: String,
    pub refresh: String,
    pub logout: String,
    /// Role collection; a role's detail lives at `{roles}/{id}`
    pub roles: String,
    pub current_user: String,
}

impl ApiRoutes {
    pub fn role_detail(&self, role_id: &str) -> String {
        format!("{}/{}", self.roles.trim_end_matches('/'), role_id)
    }
}

impl Default for ApiRoutes {
    fn default() -> Self {
        Self {
            login: "auth/login".into(),
            refresh: "auth/refresh".into(),
            logout: "auth/logout".into(),
            roles: "roles".into(),
            current_user: "users/me".into(),
        }
    }
}

/// Session client configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// API base URL (e.g., "http://localhost:8080/api")
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout: u64,

    /// File backing the persisted session (tokens + cached user)
    pub store_path: PathBuf,

    /// How often an authenticated session re-checks its token
    pub validation_interval: Duration,

    /// Delay before the first check, so start-up hydration settles first
    pub initial_delay: Duration,

    /// Remaining lifetime below which the token is refreshed proactively
    pub refresh_threshold: Duration,

    pub routes: ApiRoutes,
}

impl SessionConfig {
    /// Create a new configuration with default timings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: 30,
            store_path: PathBuf::from(".coursedesk/session.json"),
            validation_interval: DEFAULT_VALIDATION_INTERVAL,
            initial_delay: DEFAULT_INITIAL_DELAY,
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            routes: ApiRoutes::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// | variable                            | default                     |
    /// |-------------------------------------|-----------------------------|
    /// | `COURSEDESK_API_URL`                | `http://localhost:8080/api` |
    /// | `COURSEDESK_TIMEOUT_SECS`           | `30`                        |
    /// | `COURSEDESK_STORE_PATH`             | `.coursedesk/session.json`  |
    /// | `COURSEDESK_VALIDATE_INTERVAL_SECS` | `120`                       |
    /// | `COURSEDESK_REFRESH_THRESHOLD_SECS` | `300`                       |
    pub fn from_env() -> Self {
        let base_url = std::env::var("COURSEDESK_API_URL")
            .unwrap_or_else(|_| "http://localhost:8080/api".to_string());
        let mut config = Self::new(base_url);

        if let Some(timeout) = env_u64("COURSEDESK_TIMEOUT_SECS") {
            config.timeout = timeout;
        }
        if let Ok(path) = std::env::var("COURSEDESK_STORE_PATH") {
            if !path.is_empty() {
                config.store_path = PathBuf::from(path);
            }
        }
        if let Some(secs) = env_u64("COURSEDESK_VALIDATE_INTERVAL_SECS") {
            config.validation_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = env_u64("COURSEDESK_REFRESH_THRESHOLD_SECS") {
            config.refresh_threshold = Duration::from_secs(secs);
        }
        config
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Set the persisted session file
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    /// Set the validation interval
    pub fn with_validation_interval(mut self, interval: Duration) -> Self {
        self.validation_interval = interval;
        self
    }

    /// Set the delay before the first validation
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the proactive refresh threshold
    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Override endpoint paths
    pub fn with_routes(mut self, routes: ApiRoutes) -> Self {
        self.routes = routes;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080/api")
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
