//! Runtime settings derived from the TOML config

use std::time::Duration;

use spz_common::config::TomlConfig;

/// Settings handlers and sessions read at runtime
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub autosave_debounce: Duration,
    pub poll_interval: Duration,
    pub allow_admin_signup: bool,
    pub recovery_token_ttl: chrono::Duration,
    pub session_ttl: chrono::Duration,
    pub session_idle: Duration,
}

impl PlannerConfig {
    pub fn from_toml(toml: &TomlConfig) -> Self {
        Self {
            autosave_debounce: Duration::from_millis(toml.autosave.debounce_ms),
            poll_interval: Duration::from_millis(toml.realtime.poll_interval_ms.max(1)),
            allow_admin_signup: toml.auth.allow_admin_signup,
            recovery_token_ttl: chrono::Duration::minutes(toml.auth.recovery_token_ttl_minutes),
            session_ttl: chrono::Duration::days(toml.auth.session_ttl_days),
            session_idle: Duration::from_secs(toml.auth.session_idle_minutes * 60),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self::from_toml(&TomlConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.autosave_debounce, Duration::from_millis(1000));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(!config.allow_admin_signup);
        assert_eq!(config.recovery_token_ttl, chrono::Duration::minutes(60));
        assert_eq!(config.session_ttl, chrono::Duration::days(30));
        assert_eq!(config.session_idle, Duration::from_secs(3600));
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let mut toml = TomlConfig::default();
        toml.realtime.poll_interval_ms = 0;
        assert_eq!(PlannerConfig::from_toml(&toml).poll_interval, Duration::from_millis(1));
    }
}
