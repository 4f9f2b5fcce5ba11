//! Settings file
//!
//! Optional TOML document with an `[engine]` table (an [`EngineConfig`]) and
//! a `[simulation]` table. Missing keys fall back to defaults; command-line
//! flags are applied on top by `main`.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use taleweave_core::EngineConfig;

/// Whole settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Orchestrator configuration
    pub engine: EngineConfig,
    /// Bot simulator knobs
    pub simulation: SimulationSettings,
}

/// Bot simulator knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Rooms to fill
    pub rooms: usize,
    /// Turns each bot takes before leaving
    pub rounds: u32,
    /// Random seed
    pub seed: u64,
    /// Chance a bot drops instead of taking its turn
    pub drop_rate: f64,
    /// Word-phase duration used while simulating
    pub phase_ms: u64,
    /// Grace window used while simulating
    pub grace_ms: u64,
    /// Persistence retry delay used while simulating
    pub retry_delay_ms: u64,
    /// Upper bound of a bot's pause before acting
    pub think_ms: u64,
    /// Give up waiting for the rooms after this long
    pub timeout_secs: u64,
    /// Append artifacts to this JSONL file instead of keeping them in memory
    pub out: Option<PathBuf>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            rooms: 4,
            rounds: 3,
            seed: 42,
            drop_rate: 0.1,
            phase_ms: 1_500,
            grace_ms: 500,
            retry_delay_ms: 100,
            think_ms: 40,
            timeout_secs: 60,
            out: None,
        }
    }
}

impl Settings {
    /// Load from `path`, or defaults when no file is given
    ///
    /// # Errors
    /// Fails if the file cannot be read or parsed
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// Fails on malformed TOML or mistyped values
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Engine configuration with the simulation timers applied
    #[must_use]
    pub fn simulation_engine(&self) -> EngineConfig {
        let sim = &self.simulation;
        let phase = std::time::Duration::from_millis(sim.phase_ms);
        self.engine
            .clone()
            .with_phase_durations(phase, phase)
            .with_grace(std::time::Duration::from_millis(sim.grace_ms))
            .with_persist_policy(
                self.engine.persist_attempts,
                std::time::Duration::from_millis(sim.retry_delay_ms),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.engine.capacity, 4);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let settings = Settings::from_toml(
            r#"
            [engine]
            capacity = 2
            grace_ms = 5000

            [simulation]
            rooms = 10
            drop_rate = 0.0
            out = "artifacts.jsonl"
            "#,
        )
        .unwrap();

        assert_eq!(settings.engine.capacity, 2);
        assert_eq!(settings.engine.grace_ms, 5_000);
        assert_eq!(settings.engine.single_word_ms, 120_000);
        assert_eq!(settings.simulation.rooms, 10);
        assert_eq!(settings.simulation.rounds, 3);
        assert_eq!(settings.simulation.out, Some(PathBuf::from("artifacts.jsonl")));
    }

    #[test]
    fn mistyped_value_is_rejected() {
        assert!(Settings::from_toml("[engine]\ncapacity = \"four\"").is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taleweave.toml");
        std::fs::write(&path, "[simulation]\nseed = 7\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.simulation.seed, 7);
    }

    #[test]
    fn missing_file_mentions_path() {
        let err = Settings::load(Some(Path::new("/nonexistent/taleweave.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/taleweave.toml"));
    }

    #[test]
    fn simulation_engine_uses_short_timers() {
        let settings = Settings::default();
        let engine = settings.simulation_engine();
        assert_eq!(engine.single_word_ms, 1_500);
        assert_eq!(engine.three_word_ms, 1_500);
        assert_eq!(engine.grace_ms, 500);
        assert_eq!(engine.persist_retry_delay_ms, 100);
        assert_eq!(engine.capacity, settings.engine.capacity);
    }
}
