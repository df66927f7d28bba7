use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::notify::Severity;
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};

/// Main configuration for a castway application
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Expose internal error messages in responses
    #[serde(default)]
    pub dev_mode: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Settings for the subscription gate, shared by the HTTP middleware and
/// the client-side guard.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessConfig {
    /// Page users without an active or trialing subscription are sent to
    #[serde(default = "default_billing_path")]
    pub billing_path: String,
    /// Header an upstream gateway sets with the authenticated user id
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
    /// Whether a redirect also enqueues a notification
    #[serde(default = "default_true")]
    pub notify_on_redirect: bool,
    #[serde(default = "default_redirect_message")]
    pub redirect_message: String,
    #[serde(default = "default_redirect_severity")]
    pub redirect_severity: Severity,
    #[serde(default = "default_notification_duration_ms")]
    pub notification_duration_ms: u64,
}

/// Settings for the scheduled post publisher.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Run the in-process polling loop (disable when an external cron hits
    /// the publish endpoint instead)
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    /// Bearer secret required by `POST /api/cron/publish-posts`
    #[serde(default, skip_serializing)]
    pub cron_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_mode: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            billing_path: default_billing_path(),
            identity_header: default_identity_header(),
            notify_on_redirect: true,
            redirect_message: default_redirect_message(),
            redirect_severity: default_redirect_severity(),
            notification_duration_ms: default_notification_duration_ms(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_seconds: default_poll_interval_seconds(),
            cron_secret: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_billing_path() -> String {
    "/settings".to_string()
}

fn default_identity_header() -> String {
    "x-user-id".to_string()
}

fn default_true() -> bool {
    true
}

fn default_redirect_message() -> String {
    "An active subscription is required. Choose a plan to continue.".to_string()
}

fn default_redirect_severity() -> Severity {
    Severity::Warning
}

fn default_notification_duration_ms() -> u64 {
    5000
}

fn default_poll_interval_seconds() -> u64 {
    60
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl AccessConfig {
    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_duration_ms)
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_dev_mode(mut self, enabled: bool) -> Self {
        self.config.server.dev_mode = enabled;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_billing_path(mut self, path: impl Into<String>) -> Self {
        self.config.access.billing_path = path.into();
        self
    }

    pub fn with_identity_header(mut self, header: impl Into<String>) -> Self {
        self.config.access.identity_header = header.into();
        self
    }

    pub fn with_redirect_notification(mut self, enabled: bool) -> Self {
        self.config.access.notify_on_redirect = enabled;
        self
    }

    pub fn with_notification_duration_ms(mut self, duration_ms: u64) -> Self {
        self.config.access.notification_duration_ms = duration_ms;
        self
    }

    pub fn with_scheduler(mut self, enabled: bool) -> Self {
        self.config.scheduler.enabled = enabled;
        self
    }

    pub fn with_poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.config.scheduler.poll_interval_seconds = seconds;
        self
    }

    pub fn with_cron_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.scheduler.cron_secret = Some(secret.into());
        self
    }

    /// Load configuration from environment variables with CASTWAY_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        // CASTWAY_PORT first, then PORT as set by most hosting platforms
        if let Some(port) = parse_env_with_prefix("PORT") {
            self.config.server.port = port;
        }
        if let Some(dev_mode) = parse_env_with_prefix("DEV_MODE") {
            self.config.server.dev_mode = dev_mode;
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }

        if let Some(path) = get_env_with_prefix("BILLING_PATH") {
            self.config.access.billing_path = path;
        }
        if let Some(header) = get_env_with_prefix("IDENTITY_HEADER") {
            self.config.access.identity_header = header;
        }
        if let Some(notify) = parse_env_with_prefix("NOTIFY_ON_REDIRECT") {
            self.config.access.notify_on_redirect = notify;
        }
        if let Some(duration) = parse_env_with_prefix("NOTIFICATION_DURATION_MS") {
            self.config.access.notification_duration_ms = duration;
        }

        if let Some(enabled) = parse_env_with_prefix("SCHEDULER_ENABLED") {
            self.config.scheduler.enabled = enabled;
        }
        if let Some(interval) = parse_env_with_prefix("SCHEDULER_POLL_INTERVAL_SECONDS") {
            self.config.scheduler.poll_interval_seconds = interval;
        }
        if let Some(secret) = get_env_with_prefix("CRON_SECRET") {
            self.config.scheduler.cron_secret = Some(secret);
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns an error if the server address, log level, billing path,
    /// identity header, notification duration or poll interval is invalid.
    pub fn build(self) -> crate::error::Result<Config> {
        let config = self.config;

        config.server.addr().map_err(|e| {
            crate::error::CastwayError::bad_request(format!(
                "Invalid server address {}:{} - {}",
                config.server.host, config.server.port, e
            ))
        })?;

        if config.server.port == 0 {
            return Err(crate::error::CastwayError::bad_request(
                "Server port must be greater than 0",
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(crate::error::CastwayError::bad_request(format!(
                "Invalid log level: {}. Must be one of: {}",
                config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if !config.access.billing_path.starts_with('/') {
            return Err(crate::error::CastwayError::bad_request(format!(
                "Billing path must be an absolute path, got: {}",
                config.access.billing_path
            )));
        }

        if axum::http::HeaderName::from_bytes(config.access.identity_header.as_bytes()).is_err() {
            return Err(crate::error::CastwayError::bad_request(format!(
                "Invalid identity header name: {}",
                config.access.identity_header
            )));
        }

        if config.access.notification_duration_ms == 0 {
            return Err(crate::error::CastwayError::bad_request(
                "Notification duration must be greater than 0",
            ));
        }

        if config.scheduler.enabled && config.scheduler.poll_interval_seconds == 0 {
            return Err(crate::error::CastwayError::bad_request(
                "Scheduler poll interval must be greater than 0 when enabled",
            ));
        }

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
