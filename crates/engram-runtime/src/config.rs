//! Engine configuration – reads/writes `~/.engram/config.toml`.
//!
//! A config file only needs the keys it changes; everything else falls back
//! to [`EngineConfig::default`]:
//!
//! ```toml
//! [working]
//! capacity = 20
//!
//! [consolidation]
//! interval_cycles = 5
//! ```

use engram_embedding::spaces::{EMOTION_SEED, TOPIC_SEED};
use engram_types::{DecayCurve, DecayPolicy, EngramError, EvictionPolicy, FieldWeight, StoreConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error(transparent)]
    Invalid(#[from] EngramError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Per-store settings as they appear in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub capacity: usize,
    /// `decay-priority`, `fifo`, or `composite`.
    pub eviction_policy: String,
    pub decay_curve: DecayCurve,
    /// Per-minute decay factor in `(0, 1]`; `1.0` disables decay.
    pub decay_rate: f64,
    /// `0` disables the retention window.
    pub retention_window_seconds: u64,
    /// Only used by the `composite` policy.
    pub composite_weights: Vec<FieldWeight>,
}

impl StoreSettings {
    fn new(capacity: usize, eviction_policy: &str, decay_rate: f64) -> Self {
        Self {
            capacity,
            eviction_policy: eviction_policy.to_string(),
            decay_curve: DecayCurve::Exponential,
            decay_rate,
            retention_window_seconds: 0,
            composite_weights: Vec::new(),
        }
    }

    fn with_retention(mut self, secs: u64) -> Self {
        self.retention_window_seconds = secs;
        self
    }

    fn with_weights(mut self, weights: &[(&str, f64)]) -> Self {
        self.composite_weights = weights.iter().map(|(f, w)| FieldWeight::new(*f, *w)).collect();
        self
    }

    /// Validate and convert into the store's construction-time config.
    pub fn to_store_config(&self, name: &str) -> Result<StoreConfig, EngramError> {
        let eviction = EvictionPolicy::from_name(&self.eviction_policy, &self.composite_weights)?;
        let decay = DecayPolicy { curve: self.decay_curve, rate: self.decay_rate };
        decay
            .validate()
            .map_err(|e| EngramError::InvalidConfiguration(format!("[{name}] {e}")))?;

        let mut config = StoreConfig::new(name, self.capacity, eviction);
        if self.decay_rate < 1.0 {
            config = config.with_decay(decay);
        }
        if self.retention_window_seconds > 0 {
            config = config.with_retention_secs(self.retention_window_seconds);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationSettings {
    /// Working → context relevance threshold (inclusive).
    pub working_to_context_threshold: f64,
    /// Context → long-term relevance threshold (inclusive).
    pub context_to_long_term_threshold: f64,
    /// Minimum age in the working tier before the first hop.
    pub first_hop_min_age_seconds: u64,
    /// `tick` triggers consolidation every N cycles.
    pub interval_cycles: u64,
    /// Relevance added to a working/context item on each retrieval.
    pub retrieval_boost: f64,
    /// Consolidation records kept for status reporting.
    pub history_limit: usize,
}

impl Default for ConsolidationSettings {
    fn default() -> Self {
        Self {
            working_to_context_threshold: 0.6,
            context_to_long_term_threshold: 0.7,
            first_hop_min_age_seconds: 0,
            interval_cycles: 10,
            retrieval_boost: 0.05,
            history_limit: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub emotion_seed: u64,
    pub topic_seed: u64,
    /// Minimum similarity for a feature set to be assigned to a topic.
    pub topic_match_threshold: f32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            emotion_seed: EMOTION_SEED,
            topic_seed: TOPIC_SEED,
            topic_match_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSettings {
    pub history_limit: usize,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self { history_limit: 1000 }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub working: StoreSettings,
    pub context: StoreSettings,
    /// Per-cycle context frames.
    pub frames: StoreSettings,
    pub episodic: StoreSettings,
    pub facts: StoreSettings,
    pub concepts: StoreSettings,
    pub topics: StoreSettings,
    pub topic_history: StoreSettings,
    pub mood_history: StoreSettings,
    pub archive: StoreSettings,
    pub consolidation: ConsolidationSettings,
    pub embedding: EmbeddingSettings,
    pub routing: RoutingSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            working: StoreSettings::new(50, "decay-priority", 0.99),
            context: StoreSettings::new(100, "fifo", 0.995).with_retention(300),
            frames: StoreSettings::new(100, "fifo", 1.0).with_retention(300),
            episodic: StoreSettings::new(1000, "decay-priority", 0.999),
            facts: StoreSettings::new(5000, "composite", 1.0).with_weights(&[
                ("verified", 10.0),
                ("confidence", 1.0),
                ("usage_count", 0.01),
            ]),
            concepts: StoreSettings::new(500, "composite", 1.0)
                .with_weights(&[("confidence", 1.0), ("usage_count", 0.01)]),
            topics: StoreSettings::new(50, "decay-priority", 0.99),
            topic_history: StoreSettings::new(500, "fifo", 1.0),
            mood_history: StoreSettings::new(100, "fifo", 1.0),
            archive: StoreSettings::new(50, "fifo", 1.0),
            consolidation: ConsolidationSettings::default(),
            embedding: EmbeddingSettings::default(),
            routing: RoutingSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Every store section paired with the store name it configures.
    pub fn store_sections(&self) -> [(&'static str, &StoreSettings); 10] {
        [
            ("working", &self.working),
            ("context", &self.context),
            ("context-frames", &self.frames),
            ("episodic", &self.episodic),
            ("semantic.facts", &self.facts),
            ("semantic.concepts", &self.concepts),
            ("topics", &self.topics),
            ("topic-history", &self.topic_history),
            ("mood-history", &self.mood_history),
            ("archive", &self.archive),
        ]
    }

    pub fn validate(&self) -> Result<(), EngramError> {
        for (name, settings) in self.store_sections() {
            settings.to_store_config(name)?;
        }
        let c = &self.consolidation;
        for (label, value) in [
            ("working_to_context_threshold", c.working_to_context_threshold),
            ("context_to_long_term_threshold", c.context_to_long_term_threshold),
            ("retrieval_boost", c.retrieval_boost),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngramError::InvalidConfiguration(format!(
                    "consolidation.{label} must be in [0, 1], got {value}"
                )));
            }
        }
        if c.interval_cycles == 0 {
            return Err(EngramError::InvalidConfiguration(
                "consolidation.interval_cycles must be greater than zero".into(),
            ));
        }
        if c.history_limit < 10 {
            return Err(EngramError::InvalidConfiguration(format!(
                "consolidation.history_limit must be at least 10, got {}",
                c.history_limit
            )));
        }
        if self.routing.history_limit == 0 {
            return Err(EngramError::InvalidConfiguration(
                "routing.history_limit must be greater than zero".into(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.embedding.topic_match_threshold) {
            return Err(EngramError::InvalidConfiguration(
                "embedding.topic_match_threshold must be in [-1, 1]".into(),
            ));
        }
        Ok(())
    }

    /// Parse a (possibly partial) TOML document over the defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let overlay: toml::Value = toml::from_str(raw)?;
        let mut base = toml::Value::try_from(EngineConfig::default())?;
        merge(&mut base, overlay);
        let cfg: EngineConfig = base.try_into()?;
        Ok(cfg)
    }
}

fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading and saving
// ─────────────────────────────────────────────────────────────────────────────

/// Return the path to `~/.engram/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".engram").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<EngineConfig>, ConfigError> {
    load_from(&config_path())
}

/// Load, apply environment overrides, and validate the config at `path`.
pub fn load_from(path: &Path) -> Result<Option<EngineConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg = EngineConfig::from_toml_str(&raw)?;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(Some(cfg))
}

/// Apply `ENGRAM_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ENGRAM_WORKING_CAPACITY` | `working.capacity` |
/// | `ENGRAM_CONTEXT_CAPACITY` | `context.capacity` |
/// | `ENGRAM_CONSOLIDATION_INTERVAL` | `consolidation.interval_cycles` |
/// | `ENGRAM_PROMOTION_THRESHOLD` | `consolidation.working_to_context_threshold` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut EngineConfig) {
    if let Ok(v) = std::env::var("ENGRAM_WORKING_CAPACITY")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.working.capacity = n;
    }
    if let Ok(v) = std::env::var("ENGRAM_CONTEXT_CAPACITY")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.context.capacity = n;
    }
    if let Ok(v) = std::env::var("ENGRAM_CONSOLIDATION_INTERVAL")
        && let Ok(n) = v.parse::<u64>()
    {
        cfg.consolidation.interval_cycles = n;
    }
    if let Ok(v) = std::env::var("ENGRAM_PROMOTION_THRESHOLD")
        && let Ok(t) = v.parse::<f64>()
    {
        cfg.consolidation.working_to_context_threshold = t;
    }
}

/// Save the config to disk, creating `~/.engram/` if necessary.
pub fn save(cfg: &EngineConfig) -> Result<(), ConfigError> {
    save_to(cfg, &config_path())
}

pub fn save_to(cfg: &EngineConfig, path: &Path) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(io_err)?;
        }
    }
    let raw = toml::to_string_pretty(cfg)?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(io_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(io_err)?;
    Ok(())
}
