//! `engram-types` – shared vocabulary of the engram memory engine.
//!
//! Every other crate in the workspace speaks in these types:
//!
//! - [`Item`] – the generic unit held by every bounded store.
//! - [`Priority`], [`Modality`], [`TierKind`] – closed enumerations used by
//!   eviction, attention, and consolidation logic.
//! - [`StoreConfig`], [`EvictionPolicy`], [`DecayPolicy`] – the per-store
//!   configuration surface accepted at construction time.
//! - [`Clock`] – the single source of time for age-dependent behaviour.
//! - [`EngramError`] – the error taxonomy shared by all crates.

pub mod clock;
pub mod item;
pub mod policy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use item::{Item, Payload, clamp_unit};
pub use policy::{DecayCurve, DecayPolicy, EvictionPolicy, FieldWeight, StoreConfig};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Importance level attached to an ingested observation.
///
/// Maps onto the scalar priority used by decay-priority eviction and onto the
/// relevance an item starts with in the working tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Critical,
    ];

    /// Scalar weight used by eviction (`Low = 1` … `Critical = 4`).
    pub fn scalar(self) -> f64 {
        match self {
            Priority::Low => 1.0,
            Priority::Normal => 2.0,
            Priority::High => 3.0,
            Priority::Critical => 4.0,
        }
    }

    /// Relevance an item starts with when the caller does not supply one.
    pub fn initial_relevance(self) -> f64 {
        match self {
            Priority::Low => 0.3,
            Priority::Normal => 0.5,
            Priority::High => 0.75,
            Priority::Critical => 0.9,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(EngramError::InvalidConfiguration(format!(
                "unknown priority '{other}'"
            ))),
        }
    }
}

/// Attention modality tracked by the attention map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Visual,
    Auditory,
    Proprioceptive,
    Semantic,
    Emotional,
}

impl Modality {
    pub const ALL: [Modality; 5] = [
        Modality::Visual,
        Modality::Auditory,
        Modality::Proprioceptive,
        Modality::Semantic,
        Modality::Emotional,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Visual => "visual",
            Modality::Auditory => "auditory",
            Modality::Proprioceptive => "proprioceptive",
            Modality::Semantic => "semantic",
            Modality::Emotional => "emotional",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Modality::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EngramError::InvalidConfiguration(format!("unknown modality '{s}'")))
    }
}

/// One stage of the memory hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    Working,
    Context,
    Episodic,
    Semantic,
    Archive,
}

impl TierKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TierKind::Working => "working",
            TierKind::Context => "context",
            TierKind::Episodic => "episodic",
            TierKind::Semantic => "semantic",
            TierKind::Archive => "archive",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error taxonomy shared by every engram crate.
///
/// Capacity pressure is deliberately absent: a full store evicts and reports
/// the victim through its return value instead of failing.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngramError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("No handler for topic '{0}'")]
    NoHandler(String),

    #[error("Handler '{handler}' failed: {reason}")]
    HandlerFailed { handler: String, reason: String },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngramError {
    fn from(e: serde_json::Error) -> Self {
        EngramError::Serialization(e.to_string())
    }
}
