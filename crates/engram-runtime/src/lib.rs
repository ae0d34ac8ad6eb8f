//! `engram-runtime` – the engine that ties the memory tiers together.
//!
//! # Modules
//!
//! - [`coordinator`] – [`MemoryCoordinator`]: ingestion, retrieval,
//!   two-hop consolidation, snapshots, topics, emotion, attention and routing
//!   behind one facade. Time comes from an injected
//!   [`Clock`](engram_types::Clock) so runs are reproducible.
//! - [`attention`] – per-modality focus with a primary-focus threshold.
//! - [`emotion`] – [`EmotionTracker`]: emotion intensities, valence/arousal
//!   and a searchable mood history.
//! - [`state`] – [`EngineState`], the serializable export of a coordinator.
//! - [`config`] – `~/.engram/config.toml` loading, `ENGRAM_*` overrides and
//!   validation.
//! - [`telemetry`] – [`init_tracing`](telemetry::init_tracing): console or
//!   JSON logs plus optional OTLP export via `OTEL_EXPORTER_OTLP_ENDPOINT`.

pub mod attention;
pub mod config;
pub mod coordinator;
pub mod emotion;
pub mod state;
pub mod telemetry;

pub use attention::{AttentionMap, AttentionSummary, Focus};
pub use config::{ConfigError, EngineConfig};
pub use coordinator::{EngineStatus, MemoryCoordinator, UNASSIGNED_TOPIC};
pub use emotion::{EmotionTracker, MoodSample};
pub use engram_memory::pipeline::ConsolidationRecord;
pub use state::{EngineCounters, EngineState};
