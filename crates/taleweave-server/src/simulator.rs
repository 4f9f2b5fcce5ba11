//! Bot simulator
//!
//! Fills `rooms` rooms with seeded bots that play through the protocol:
//! - log in and wait for their turn
//! - submit text that fits the phase they last saw
//! - sometimes drop on their turn and come back with their token
//! - leave after `rounds` turns
//!
//! Once every bot has left, the simulator waits for the grace teardown to
//! persist each room and checks the stored artifacts.

use crate::settings::SimulationSettings;
use anyhow::Context;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use taleweave_core::{
    ArtifactRecord, ArtifactSink, EngineConfig, EngineStats, JsonlSink, MemorySink, Orchestrator,
    OrchestratorHandle, Outbound, Phase, ReconnectToken, RoomId, Slot,
};
use tokio::task::JoinSet;

const WORDS: &[&str] = &[
    "moss", "lantern", "river", "quietly", "fox", "ember", "wandered", "beneath", "silver",
    "crow", "old", "tide", "whispered", "gate", "stone", "bright", "over", "hollow", "the",
    "a", "drifted", "salt", "morning", "owl",
];

/// Something the checks found wrong
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Violation {
    /// Fewer artifacts stored than rooms played
    MissingArtifacts {
        /// Rooms played
        expected: usize,
        /// Artifacts stored
        stored: usize,
    },
    /// A stored artifact has the wrong number of turns
    TurnCount {
        /// Room
        room: RoomId,
        /// Turns every room should reach
        expected: u64,
        /// Turns recorded
        actual: u64,
    },
    /// Stored digest does not match the text
    Digest {
        /// Room
        room: RoomId,
    },
    /// A bot task ended with an error
    BotFailed {
        /// Bot index
        bot: usize,
        /// Error text
        reason: String,
    },
    /// Rooms were still alive when the timeout hit
    Timeout {
        /// Rooms alive
        live_rooms: usize,
    },
}

/// What one bot did
#[derive(Debug, Clone, Copy, Default)]
struct BotOutcome {
    turns: u32,
    drops: u32,
}

/// Final report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorReport {
    /// Seed used
    pub seed: u64,
    /// Rooms played
    pub rooms: usize,
    /// Seats per room
    pub capacity: u32,
    /// Turns per bot
    pub rounds: u32,
    /// Bots spawned
    pub bots: usize,
    /// Times a bot dropped and reconnected
    pub reconnects: u32,
    /// Engine statistics at the end
    pub stats: EngineStats,
    /// Artifacts stored
    pub artifacts: Vec<ArtifactRecord>,
    /// Problems found
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Whether every room was stored and passed the checks
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Human-readable report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Taleweave Simulation Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.seed));
        report.push_str(&format!("Rooms: {} x {} seats\n", self.rooms, self.capacity));
        report.push_str(&format!("Bots: {} ({} turns each)\n", self.bots, self.rounds));
        report.push_str(&format!("Reconnects: {}\n", self.reconnects));
        report.push_str(&format!("Games Started: {}\n", self.stats.games_started));
        report.push_str(&format!("Submissions Accepted: {}\n", self.stats.submissions_accepted));
        report.push_str(&format!("Submissions Ignored: {}\n", self.stats.submissions_ignored));
        report.push_str(&format!("Artifacts Persisted: {}\n", self.stats.artifacts_persisted));
        report.push_str(&format!("Artifacts Dropped: {}\n", self.stats.artifacts_dropped));

        if !self.artifacts.is_empty() {
            report.push_str("\n=== Artifacts ===\n");
            for record in &self.artifacts {
                report.push_str(&format!("[{}] {}\n", record.room, record.text));
            }
        }

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));
        report
    }
}

/// Run the simulation to completion
///
/// # Errors
/// Fails if the orchestrator cannot start or the artifact file cannot be read
pub async fn run_simulator(
    engine: EngineConfig,
    sim: SimulationSettings,
) -> anyhow::Result<SimulatorReport> {
    let capacity = engine.capacity;
    let memory = Arc::new(MemorySink::new());
    let sink: Arc<dyn ArtifactSink> = match &sim.out {
        Some(path) => Arc::new(JsonlSink::new(path.clone())),
        None => memory.clone(),
    };
    let handle = Orchestrator::new(engine, sink)
        .context("starting orchestrator")?
        .spawn();

    let bots = sim.rooms * capacity as usize;
    tracing::info!(bots, rooms = sim.rooms, capacity, seed = sim.seed, "simulation started");

    let mut tasks = JoinSet::new();
    for bot in 0..bots {
        let handle = handle.clone();
        let sim = sim.clone();
        tasks.spawn(async move { (bot, run_bot(handle, bot, sim).await) });
    }

    let mut violations = Vec::new();
    let mut reconnects = 0;
    let deadline = Duration::from_secs(sim.timeout_secs);
    let joined = tokio::time::timeout(deadline, async {
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => {
                    reconnects += outcome.drops;
                    tracing::debug!(turns = outcome.turns, drops = outcome.drops, "bot finished");
                }
                Ok((bot, Err(e))) => violations.push(Violation::BotFailed {
                    bot,
                    reason: format!("{e:#}"),
                }),
                Err(e) => violations.push(Violation::BotFailed {
                    bot: usize::MAX,
                    reason: e.to_string(),
                }),
            }
        }
    })
    .await;
    if joined.is_err() {
        tracing::warn!("bots did not finish in time");
        tasks.abort_all();
    }

    let stats = wait_for_teardown(&handle, deadline).await?;
    if stats.live_rooms > 0 {
        violations.push(Violation::Timeout {
            live_rooms: stats.live_rooms,
        });
    }
    handle.shutdown().await?;

    let artifacts = match &sim.out {
        Some(path) => read_jsonl(path).await?,
        None => memory.records(),
    };
    violations.extend(check_artifacts(
        &artifacts,
        sim.rooms,
        u64::from(capacity) * u64::from(sim.rounds),
    ));

    Ok(SimulatorReport {
        seed: sim.seed,
        rooms: sim.rooms,
        capacity,
        rounds: sim.rounds,
        bots,
        reconnects,
        stats,
        artifacts,
        violations,
    })
}

async fn wait_for_teardown(
    handle: &OrchestratorHandle,
    deadline: Duration,
) -> anyhow::Result<EngineStats> {
    let started = tokio::time::Instant::now();
    loop {
        let stats = handle.stats().await?;
        let settled = stats.artifacts_persisted + stats.artifacts_dropped;
        if stats.live_rooms == 0 && settled >= stats.games_started {
            return Ok(stats);
        }
        if started.elapsed() >= deadline {
            return Ok(stats);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn read_jsonl(path: &std::path::Path) -> anyhow::Result<Vec<ArtifactRecord>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).context("malformed artifact line"))
        .collect()
}

fn check_artifacts(records: &[ArtifactRecord], rooms: usize, turns: u64) -> Vec<Violation> {
    let mut violations = Vec::new();
    if records.len() < rooms {
        violations.push(Violation::MissingArtifacts {
            expected: rooms,
            stored: records.len(),
        });
    }
    for record in records {
        if record.turns != turns {
            violations.push(Violation::TurnCount {
                room: record.room,
                expected: turns,
                actual: record.turns,
            });
        }
        if record.digest != blake3::hash(record.text.as_bytes()).to_hex().to_string() {
            violations.push(Violation::Digest { room: record.room });
        }
    }
    violations
}

/// One participant's view of its room
#[derive(Debug, Default)]
struct BotState {
    slot: Option<Slot>,
    token: Option<ReconnectToken>,
    phase: Phase,
    active: Option<Slot>,
    submitted: bool,
}

impl BotState {
    /// Fold an event in; returns whether it is now this bot's move
    fn observe(&mut self, event: Outbound, outcome: &mut BotOutcome) -> bool {
        match event {
            Outbound::SlotAssigned { slot } => self.slot = Some(slot),
            Outbound::NewToken { token } => self.token = Some(token),
            Outbound::TurnAdvanced {
                next_active_slot,
                phase,
                appended_text,
            } => {
                // Only the turn owner can be accepted, so this was ours
                if !appended_text.is_empty() && self.active.is_some() && self.active == self.slot {
                    outcome.turns += 1;
                    self.submitted = false;
                }
                self.phase = phase;
                self.active = Some(next_active_slot);
            }
            Outbound::ReloadGameData {
                slot,
                phase,
                next_active_slot,
                ..
            } => {
                self.slot = Some(slot);
                self.phase = phase;
                self.active = Some(next_active_slot);
                self.submitted = false;
            }
            Outbound::PeerDeparted { .. } => {}
        }
        !self.phase.is_lobby() && !self.submitted && self.active.is_some() && self.active == self.slot
    }
}

async fn run_bot(
    handle: OrchestratorHandle,
    index: usize,
    sim: SimulationSettings,
) -> anyhow::Result<BotOutcome> {
    let mut rng = StdRng::seed_from_u64(sim.seed.wrapping_add(index as u64));
    let mut outcome = BotOutcome::default();
    let mut state = BotState::default();

    let mut link = handle.connect();
    handle.login(link.id, None)?;

    while outcome.turns < sim.rounds {
        let Some(event) = link.events.recv().await else {
            anyhow::bail!("event stream closed after {} turns", outcome.turns);
        };
        if !state.observe(event, &mut outcome) || outcome.turns >= sim.rounds {
            continue;
        }

        think(&mut rng, sim.think_ms).await;
        match state.token {
            Some(token) if rng.gen_bool(sim.drop_rate.clamp(0.0, 1.0)) => {
                handle.disconnect(link.id)?;
                outcome.drops += 1;
                think(&mut rng, sim.think_ms).await;
                link = handle.connect();
                handle.login(link.id, Some(token))?;
            }
            _ => {
                handle.submit(link.id, compose(&mut rng, state.phase))?;
                state.submitted = true;
            }
        }
    }

    handle.leave(link.id)?;
    Ok(outcome)
}

async fn think(rng: &mut StdRng, max_ms: u64) {
    if max_ms > 0 {
        tokio::time::sleep(Duration::from_millis(rng.gen_range(0..=max_ms))).await;
    }
}

/// Text valid in `phase` and every later one
fn compose(rng: &mut StdRng, phase: Phase) -> String {
    let count = match phase {
        Phase::Waiting | Phase::SingleWord => 1,
        Phase::ThreeWord => rng.gen_range(1..=3),
        Phase::Sentence => rng.gen_range(4..=8),
    };
    let words: Vec<&str> = (0..count)
        .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
        .collect();
    let mut text = words.join(" ");
    if phase == Phase::Sentence {
        text.push('.');
    }
    text
}
