//! Per-store eviction and decay configuration.
//!
//! | Policy           | Victim                                                        |
//! |------------------|---------------------------------------------------------------|
//! | `decay-priority` | lowest `priority × decay_factor(age)`, oldest on ties          |
//! | `fifo`           | oldest creation timestamp                                      |
//! | `composite`      | lowest weighted sum of named fields, oldest on ties            |

use crate::EngramError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ────────────────────────────────────────────────────────────────────────────
// Decay
// ────────────────────────────────────────────────────────────────────────────

/// Shape of the relevance decay applied with age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecayCurve {
    #[default]
    Exponential,
    Linear,
}

impl fmt::Display for DecayCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecayCurve::Exponential => f.write_str("exponential"),
            DecayCurve::Linear => f.write_str("linear"),
        }
    }
}

impl FromStr for DecayCurve {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exponential" => Ok(DecayCurve::Exponential),
            "linear" => Ok(DecayCurve::Linear),
            other => Err(EngramError::InvalidConfiguration(format!(
                "unknown decay curve '{other}'"
            ))),
        }
    }
}

/// Decay rate per minute of age, applied through a [`DecayCurve`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayPolicy {
    pub curve: DecayCurve,
    /// Per-minute retention factor in `(0, 1]`.
    pub rate: f64,
}

impl DecayPolicy {
    pub fn exponential(rate: f64) -> Self {
        Self { curve: DecayCurve::Exponential, rate }
    }

    pub fn linear(rate: f64) -> Self {
        Self { curve: DecayCurve::Linear, rate }
    }

    /// Multiplier in `[0, 1]` for an item of the given age.
    ///
    /// Exponential: `rate^age`. Linear: `max(0, 1 - (1 - rate) · age)`.
    pub fn factor(&self, age_minutes: f64) -> f64 {
        let age = age_minutes.max(0.0);
        match self.curve {
            DecayCurve::Exponential => self.rate.powf(age),
            DecayCurve::Linear => (1.0 - (1.0 - self.rate) * age).max(0.0),
        }
    }

    pub fn validate(&self) -> Result<(), EngramError> {
        if !(self.rate > 0.0 && self.rate <= 1.0) {
            return Err(EngramError::InvalidConfiguration(format!(
                "decay rate must be in (0, 1], got {}",
                self.rate
            )));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Eviction
// ────────────────────────────────────────────────────────────────────────────

/// One term of a composite eviction score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWeight {
    pub field: String,
    pub weight: f64,
}

impl FieldWeight {
    pub fn new(field: impl Into<String>, weight: f64) -> Self {
        Self { field: field.into(), weight }
    }
}

/// Which item a full store gives up to admit a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "weights", rename_all = "kebab-case")]
pub enum EvictionPolicy {
    DecayPriority,
    Fifo,
    CompositeScore(Vec<FieldWeight>),
}

impl EvictionPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            EvictionPolicy::DecayPriority => "decay-priority",
            EvictionPolicy::Fifo => "fifo",
            EvictionPolicy::CompositeScore(_) => "composite",
        }
    }

    /// Build a policy from its configuration name.
    ///
    /// `weights` is only consulted for `composite`.
    pub fn from_name(name: &str, weights: &[FieldWeight]) -> Result<Self, EngramError> {
        match name.to_ascii_lowercase().as_str() {
            "decay-priority" | "decay_priority" => Ok(EvictionPolicy::DecayPriority),
            "fifo" => Ok(EvictionPolicy::Fifo),
            "composite" | "composite-score" => Ok(EvictionPolicy::CompositeScore(weights.to_vec())),
            other => Err(EngramError::InvalidConfiguration(format!(
                "unknown eviction policy '{other}'"
            ))),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Store configuration
// ────────────────────────────────────────────────────────────────────────────

/// Everything a bounded store needs at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub name: String,
    pub capacity: usize,
    pub eviction: EvictionPolicy,
    /// `None` for stores whose relevance does not decay.
    pub decay: Option<DecayPolicy>,
    /// Minimum residence before items may leave the store, in seconds.
    pub retention_window_secs: Option<u64>,
}

impl StoreConfig {
    pub fn new(name: impl Into<String>, capacity: usize, eviction: EvictionPolicy) -> Self {
        Self {
            name: name.into(),
            capacity,
            eviction,
            decay: None,
            retention_window_secs: None,
        }
    }

    pub fn with_decay(mut self, decay: DecayPolicy) -> Self {
        self.decay = Some(decay);
        self
    }

    pub fn with_retention_secs(mut self, secs: u64) -> Self {
        self.retention_window_secs = Some(secs);
        self
    }

    pub fn validate(&self) -> Result<(), EngramError> {
        if self.capacity == 0 {
            return Err(EngramError::InvalidConfiguration(format!(
                "store '{}': capacity must be greater than zero",
                self.name
            )));
        }
        if let Some(decay) = &self.decay {
            decay.validate().map_err(|e| match e {
                EngramError::InvalidConfiguration(msg) => {
                    EngramError::InvalidConfiguration(format!("store '{}': {msg}", self.name))
                }
                other => other,
            })?;
        }
        if let EvictionPolicy::CompositeScore(weights) = &self.eviction {
            if weights.is_empty() {
                return Err(EngramError::InvalidConfiguration(format!(
                    "store '{}': composite eviction needs at least one weighted field",
                    self.name
                )));
            }
            if let Some(bad) = weights.iter().find(|w| !w.weight.is_finite()) {
                return Err(EngramError::InvalidConfiguration(format!(
                    "store '{}': weight for '{}' is not finite",
                    self.name, bad.field
                )));
            }
        }
        Ok(())
    }
}
