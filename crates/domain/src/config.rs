use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub pack: PackConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default)]
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            production: false,
        }
    }
}

fn d_host() -> String {
    "127.0.0.1".into()
}

fn d_port() -> u16 {
    8080
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file, or ":memory:" for an ephemeral store.
    #[serde(default = "d_store_path")]
    pub path: String,
    #[serde(default = "d_pool_size")]
    pub pool_size: usize,
    #[serde(default = "d_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "d_retry_backoffs_ms")]
    pub retry_backoffs_ms: Vec<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: d_store_path(),
            pool_size: d_pool_size(),
            busy_timeout_ms: d_busy_timeout_ms(),
            retry_backoffs_ms: d_retry_backoffs_ms(),
        }
    }
}

fn d_store_path() -> String {
    "contextcache.db".into()
}

fn d_pool_size() -> usize {
    20
}

fn d_busy_timeout_ms() -> u64 {
    5000
}

fn d_retry_backoffs_ms() -> Vec<u64> {
    vec![100, 300]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Quota
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "d_memories_per_day")]
    pub memories_per_day: u32,
    #[serde(default = "d_recalls_per_day")]
    pub recalls_per_day: u32,
    #[serde(default = "d_projects_per_day")]
    pub projects_per_day: u32,
    /// Timezone used for day-boundary rollover. Currently UTC is the only
    /// supported value; kept as a string to make the source of the
    /// constraint explicit in config files.
    #[serde(default = "d_timezone")]
    pub timezone: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            memories_per_day: d_memories_per_day(),
            recalls_per_day: d_recalls_per_day(),
            projects_per_day: d_projects_per_day(),
            timezone: d_timezone(),
        }
    }
}

fn d_memories_per_day() -> u32 {
    200
}

fn d_recalls_per_day() -> u32 {
    1000
}

fn d_projects_per_day() -> u32 {
    20
}

fn d_timezone() -> String {
    "UTC".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pack assembly
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackConfig {
    #[serde(default = "d_max_pack_bytes")]
    pub max_pack_bytes: usize,
    #[serde(default = "d_default_limit")]
    pub default_recall_limit: u32,
    #[serde(default = "d_max_limit")]
    pub max_recall_limit: u32,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            max_pack_bytes: d_max_pack_bytes(),
            default_recall_limit: d_default_limit(),
            max_recall_limit: d_max_limit(),
        }
    }
}

fn d_max_pack_bytes() -> usize {
    32 * 1024
}

fn d_default_limit() -> u32 {
    10
}

fn d_max_limit() -> u32 {
    50
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Jobs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "d_worker_count")]
    pub worker_count: usize,
    #[serde(default = "d_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "d_dedup_window_secs")]
    pub dedup_window_secs: u64,
    #[serde(default = "d_retry_backoffs_secs")]
    pub retry_backoffs_secs: Vec<u64>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            worker_count: d_worker_count(),
            queue_capacity: d_queue_capacity(),
            dedup_window_secs: d_dedup_window_secs(),
            retry_backoffs_secs: d_retry_backoffs_secs(),
        }
    }
}

fn d_worker_count() -> usize {
    4
}

fn d_queue_capacity() -> usize {
    256
}

fn d_dedup_window_secs() -> u64 {
    60
}

fn d_retry_backoffs_secs() -> Vec<u64> {
    vec![1, 5, 25]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rate limiting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "d_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "d_per_hour")]
    pub requests_per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: d_per_minute(),
            requests_per_hour: d_per_hour(),
        }
    }
}

fn d_per_minute() -> u32 {
    60
}

fn d_per_hour() -> u32 {
    1000
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "d_session_ttl_days")]
    pub ttl_days: i64,
    #[serde(default = "d_invite_ttl_days")]
    pub invite_ttl_days: i64,
    #[serde(default = "d_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "d_login_history_limit")]
    pub login_history_limit: usize,
    #[serde(default = "d_login_history_retention_days")]
    pub login_history_retention_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_days: d_session_ttl_days(),
            invite_ttl_days: d_invite_ttl_days(),
            cookie_name: d_cookie_name(),
            login_history_limit: d_login_history_limit(),
            login_history_retention_days: d_login_history_retention_days(),
        }
    }
}

fn d_session_ttl_days() -> i64 {
    30
}

fn d_invite_ttl_days() -> i64 {
    14
}

fn d_cookie_name() -> String {
    "contextcache_session".into()
}

fn d_login_history_limit() -> usize {
    10
}

fn d_login_history_retention_days() -> i64 {
    90
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    /// Empty vec means the config is usable as-is.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.store.path.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "store.path".into(),
                message: "path must not be empty".into(),
            });
        }

        if self.store.pool_size == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "store.pool_size".into(),
                message: "pool_size must be at least 1".into(),
            });
        }

        if self.pack.max_recall_limit > 50 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "pack.max_recall_limit".into(),
                message: "values above 50 are clamped at request time".into(),
            });
        }

        if self.quota.timezone != "UTC" {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "quota.timezone".into(),
                message: "only UTC day boundaries are currently implemented".into(),
            });
        }

        if self.jobs.worker_count == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "jobs.worker_count".into(),
                message: "worker_count must be at least 1".into(),
            });
        }

        if !self.server.production && self.session.cookie_name.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "session.cookie_name".into(),
                message: "cookie_name must not be empty".into(),
            });
        }

        issues
    }

    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == ConfigSeverity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_errors() {
        let cfg = Config::default();
        let issues = cfg.validate();
        assert!(!Config::has_errors(&issues), "{issues:?}");
    }

    #[test]
    fn zero_port_is_an_error() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(Config::has_errors(&issues));
    }
}
