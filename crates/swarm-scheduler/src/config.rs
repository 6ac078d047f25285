// SPDX-License-Identifier: MIT

//! Scheduler configuration (spec §4.4, §6, §10.3). Every field is optional
//! on the wire; non-positive or absent values fall back to hard-coded
//! defaults silently rather than erroring.

use std::time::Duration;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval: RawDuration,
    pub dispatch_timeout: RawDuration,
    pub max_concurrent_dispatches: u32,
    pub idle_state_required: bool,
    pub auto_resume_enabled: bool,
    /// `after_cooldown`'s threshold: agent idle time required before the
    /// condition is met.
    pub after_cooldown_threshold: RawDuration,
}

/// Seconds on the wire; `0` means "unset, use the default".
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RawDuration(pub u64);

impl RawDuration {
    fn resolve(self, default: Duration) -> Duration {
        if self.0 == 0 {
            default
        } else {
            Duration::from_secs(self.0)
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: RawDuration(1),
            dispatch_timeout: RawDuration(30),
            max_concurrent_dispatches: 10,
            idle_state_required: true,
            auto_resume_enabled: true,
            after_cooldown_threshold: RawDuration(30),
        }
    }
}

impl SchedulerConfig {
    pub fn from_toml(document: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(document)
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval.resolve(Duration::from_secs(1))
    }

    pub fn dispatch_timeout(&self) -> Duration {
        self.dispatch_timeout.resolve(Duration::from_secs(30))
    }

    pub fn max_concurrent_dispatches(&self) -> usize {
        if self.max_concurrent_dispatches == 0 {
            10
        } else {
            self.max_concurrent_dispatches as usize
        }
    }

    pub fn after_cooldown_threshold(&self) -> Duration {
        self.after_cooldown_threshold.resolve(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.dispatch_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_concurrent_dispatches(), 10);
        assert!(config.idle_state_required);
        assert!(config.auto_resume_enabled);
    }

    #[test]
    fn zero_values_from_toml_fall_back_to_defaults() {
        let config = SchedulerConfig::from_toml("max_concurrent_dispatches = 0\ntick_interval = 0\n").unwrap();
        assert_eq!(config.max_concurrent_dispatches(), 10);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn partial_toml_document_fills_the_rest_with_defaults() {
        let config = SchedulerConfig::from_toml("max_concurrent_dispatches = 3\n").unwrap();
        assert_eq!(config.max_concurrent_dispatches(), 3);
        assert_eq!(config.dispatch_timeout(), Duration::from_secs(30));
    }
}
