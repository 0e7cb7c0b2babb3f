//! Configuration management.
//!
//! Loads settings from environment variables and .env file.

use std::str::FromStr;

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Settings {
    // Collaborator store
    pub api_base_url: String,
    pub backend_mode: BackendMode,

    // Live clock
    pub tick_interval_ms: u64,
    pub reconcile_interval_seconds: f64,

    // HTTP client
    pub http_timeout_seconds: u64,
    pub http_max_attempts: u32,
    pub http_rate_limit: u32,

    // Matches in view; empty means every confirmed match
    pub watch_match_ids: Vec<u64>,

    // Logging
    pub log_level: String,
    pub log_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Http,
    Memory,
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("Invalid backend mode: {s}")),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            backend_mode: BackendMode::Http,
            tick_interval_ms: 1000,
            reconcile_interval_seconds: 5.0,
            http_timeout_seconds: 0,
            http_max_attempts: 1,
            http_rate_limit: 20,
            watch_match_ids: Vec::new(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Settings {
    /// Load settings from environment variables (and .env file).
    pub fn from_env() -> Self {
        // Try to load .env file (ignore if not found).
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            api_base_url: env_str("API_BASE_URL", &defaults.api_base_url),
            backend_mode: env_str("BACKEND_MODE", "http")
                .parse()
                .unwrap_or(defaults.backend_mode),

            tick_interval_ms: env_u64("TICK_INTERVAL_MS", defaults.tick_interval_ms),
            reconcile_interval_seconds: env_f64(
                "RECONCILE_INTERVAL_SECONDS",
                defaults.reconcile_interval_seconds,
            ),

            http_timeout_seconds: env_u64("HTTP_TIMEOUT_SECONDS", defaults.http_timeout_seconds),
            http_max_attempts: env_u32("HTTP_MAX_ATTEMPTS", defaults.http_max_attempts),
            http_rate_limit: env_u32("HTTP_RATE_LIMIT", defaults.http_rate_limit),

            watch_match_ids: parse_ids(&env_str("WATCH_MATCH_IDS", "")),

            log_level: env_str("LOG_LEVEL", &defaults.log_level),
            log_json: env_bool("LOG_JSON", defaults.log_json),
        }
    }

    /// Validate configuration for critical requirements.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.backend_mode == BackendMode::Http
            && !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            errors.push("API_BASE_URL must start with http:// or https://".to_string());
        }

        if self.tick_interval_ms == 0 {
            errors.push("TICK_INTERVAL_MS must be positive".to_string());
        }

        let reconcile = self.reconcile_interval_seconds;
        if !(reconcile.is_finite() && reconcile > 0.0) {
            errors.push("RECONCILE_INTERVAL_SECONDS must be positive".to_string());
        }

        if self.http_max_attempts == 0 {
            errors.push("HTTP_MAX_ATTEMPTS must be at least 1".to_string());
        }

        if self.http_rate_limit == 0 {
            errors.push("HTTP_RATE_LIMIT must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

// =============================================================================
// Environment helpers
// =============================================================================

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Comma-separated ids; entries that are not numbers are skipped.
fn parse_ids(raw: &str) -> Vec<u64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let settings = Settings {
            api_base_url: "localhost:8000".to_string(),
            tick_interval_ms: 0,
            http_max_attempts: 0,
            ..Settings::default()
        };
        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_memory_mode_ignores_base_url() {
        let settings = Settings {
            api_base_url: String::new(),
            backend_mode: BackendMode::Memory,
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_backend_mode_parse() {
        assert_eq!("HTTP".parse::<BackendMode>(), Ok(BackendMode::Http));
        assert_eq!("memory".parse::<BackendMode>(), Ok(BackendMode::Memory));
        assert!("grpc".parse::<BackendMode>().is_err());
    }

    #[test]
    fn test_parse_ids_skips_garbage() {
        assert_eq!(parse_ids(" 3, 7,,x, 12 "), vec![3, 7, 12]);
        assert!(parse_ids("").is_empty());
    }
}
