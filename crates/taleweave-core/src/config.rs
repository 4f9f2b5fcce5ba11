//! Engine configuration

use crate::error::ConfigError;
use crate::types::Phase;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seats per room
    pub capacity: u32,
    /// SINGLE_WORD phase duration in milliseconds
    pub single_word_ms: u64,
    /// THREE_WORD phase duration in milliseconds
    pub three_word_ms: u64,
    /// How long an emptied, started room waits for a reconnection
    pub grace_ms: u64,
    /// Total save attempts per teardown
    pub persist_attempts: u32,
    /// Fixed pause between save attempts in milliseconds
    pub persist_retry_delay_ms: u64,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With room capacity
    #[inline]
    #[must_use]
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// With both word-phase durations
    #[inline]
    #[must_use]
    pub fn with_phase_durations(mut self, single_word: Duration, three_word: Duration) -> Self {
        self.single_word_ms = millis(single_word);
        self.three_word_ms = millis(three_word);
        self
    }

    /// With teardown grace window
    #[inline]
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace_ms = millis(grace);
        self
    }

    /// With persistence retry policy
    #[inline]
    #[must_use]
    pub fn with_persist_policy(mut self, attempts: u32, delay: Duration) -> Self {
        self.persist_attempts = attempts;
        self.persist_retry_delay_ms = millis(delay);
        self
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    /// Returns the first invalid setting found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.persist_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        for (field, value) in [
            ("single_word_ms", self.single_word_ms),
            ("three_word_ms", self.three_word_ms),
            ("grace_ms", self.grace_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration { field });
            }
        }
        Ok(())
    }

    /// Expiry of a timed phase; `None` for untimed phases
    #[must_use]
    pub fn phase_duration(&self, phase: Phase) -> Option<Duration> {
        match phase {
            Phase::SingleWord => Some(Duration::from_millis(self.single_word_ms)),
            Phase::ThreeWord => Some(Duration::from_millis(self.three_word_ms)),
            Phase::Waiting | Phase::Sentence => None,
        }
    }

    /// Teardown grace window
    #[inline]
    #[must_use]
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    /// Pause between save attempts
    #[inline]
    #[must_use]
    pub fn persist_retry_delay(&self) -> Duration {
        Duration::from_millis(self.persist_retry_delay_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            single_word_ms: 120_000,
            three_word_ms: 120_000,
            grace_ms: 60_000,
            persist_attempts: 3,
            persist_retry_delay_ms: 2_000,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
