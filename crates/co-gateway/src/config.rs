//! Environment-driven server configuration (spec.md §6 "Configuration").
//!
//! Mirrors the workspace model's `sa_domain::config::Config::validate`
//! pattern: a typed struct assembled from env vars at startup, with a
//! `validate()` pass that collects `ConfigIssue`s rather than failing on
//! the first bad field, so operators see every problem in one log line.

use std::fmt;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub classroom_db_host: Option<String>,
    pub classroom_db_port: Option<u16>,
    pub classroom_db_name: Option<String>,
    pub classroom_db_logging: bool,
}

impl Config {
    /// Reads `PORT`, `CORS_ORIGIN`, and `CLASSROOM_DB_*` from the
    /// environment. Missing vars fall back to documented defaults
    /// (spec.md §6); malformed values are caught by `validate()`, not here,
    /// so a bad `PORT` still produces a readable error instead of a panic.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(3000);
        let cors_origins = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let classroom_db_host = std::env::var("CLASSROOM_DB_HOST").ok();
        let classroom_db_port = std::env::var("CLASSROOM_DB_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok());
        let classroom_db_name = std::env::var("CLASSROOM_DB_NAME").ok();
        let classroom_db_logging = std::env::var("CLASSROOM_DB_LOGGING")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            port,
            cors_origins,
            classroom_db_host,
            classroom_db_port,
            classroom_db_name,
            classroom_db_logging,
        }
    }

    /// Validate the configuration and return every issue found. An empty
    /// vec means the server is safe to start.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "PORT".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.cors_origins.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "CORS_ORIGIN".into(),
                message: "at least one origin (or \"*\") is required".into(),
            });
        }

        // The demo loader is in-memory (FixtureClassroomLoader), so a
        // classroom DB host is informational only at this layer — absence
        // is a warning, not a startup failure.
        if self.classroom_db_host.is_none() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "CLASSROOM_DB_HOST".into(),
                message: "unset — classroom/student data served from the in-memory fixture loader".into(),
            });
        }

        issues
    }
}

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_port_is_an_error() {
        let config = Config {
            port: 0,
            cors_origins: vec!["*".into()],
            classroom_db_host: Some("localhost".into()),
            classroom_db_port: None,
            classroom_db_name: None,
            classroom_db_logging: false,
        };
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.severity == ConfigSeverity::Error && i.field == "PORT"));
    }

    #[test]
    fn missing_classroom_db_host_is_a_warning_not_an_error() {
        let config = Config {
            port: 3000,
            cors_origins: vec!["*".into()],
            classroom_db_host: None,
            classroom_db_port: None,
            classroom_db_name: None,
            classroom_db_logging: false,
        };
        let issues = config.validate();
        assert!(issues.iter().all(|i| i.severity != ConfigSeverity::Error));
        assert!(issues.iter().any(|i| i.field == "CLASSROOM_DB_HOST"));
    }
}
