//! The generic memory item held by every bounded store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Content carried by an [`Item`].
///
/// Composite-score eviction asks the payload for named numeric fields it
/// cannot find on the item itself (e.g. `verified` or `confidence` on a fact).
pub trait Payload: Clone + fmt::Debug {
    fn score_field(&self, _field: &str) -> Option<f64> {
        None
    }
}

impl Payload for Value {
    fn score_field(&self, field: &str) -> Option<f64> {
        match self.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

impl Payload for String {}

/// Clamp a relevance-like value into `[0, 1]`; `NaN` becomes `0`.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A single stored unit with the metadata that eviction and consolidation
/// decisions depend on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item<T> {
    pub id: String,
    pub content: T,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
    pub priority: f64,
    /// Base relevance in `[0, 1]`, before any decay is applied.
    pub relevance: f64,
}

impl<T> Item<T> {
    pub fn new(
        id: impl Into<String>,
        content: T,
        priority: f64,
        relevance: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            content,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            priority: if priority.is_finite() { priority } else { 0.0 },
            relevance: clamp_unit(relevance),
        }
    }

    /// Same as [`Item::new`] with a fresh UUID v4 identifier.
    pub fn with_generated_id(content: T, priority: f64, relevance: f64, now: DateTime<Utc>) -> Self {
        Self::new(Uuid::new_v4().to_string(), content, priority, relevance, now)
    }

    /// Fractional minutes since creation; never negative.
    pub fn age_minutes(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_milliseconds().max(0) as f64 / 60_000.0
    }

    /// Whole seconds since creation; never negative.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> u64 {
        (now - self.created_at).num_seconds().max(0) as u64
    }

    /// Record a retrieval.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        if now > self.last_accessed_at {
            self.last_accessed_at = now;
        }
    }

    pub fn map_content<U>(self, f: impl FnOnce(T) -> U) -> Item<U> {
        Item {
            id: self.id,
            content: f(self.content),
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
            access_count: self.access_count,
            priority: self.priority,
            relevance: self.relevance,
        }
    }
}
