//! Promotion pipeline between two bounded stores.
//!
//! One hop moves every source item that passes its [`PromotionRule`] and a
//! caller-supplied filter into the destination store:
//!
//! ```text
//!   source ──list_candidates(min_relevance)──► age gate ──► filter
//!          ──transform(content)──► destination.put ──► source.remove
//! ```
//!
//! The decayed relevance at promotion time becomes the item's new base
//! relevance and its age restarts in the destination. Any item the
//! destination evicts to make room is counted as pruned.

use crate::store::BoundedItemStore;
use chrono::{DateTime, Utc};
use engram_types::{Item, Payload};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Gate an item must pass to leave its current store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromotionRule {
    /// Inclusive lower bound on decayed relevance.
    pub min_relevance: f64,
    /// Inclusive lower bound on time spent in the source store.
    pub min_age_secs: u64,
}

impl PromotionRule {
    pub fn new(min_relevance: f64) -> Self {
        Self { min_relevance, min_age_secs: 0 }
    }

    pub fn with_min_age(mut self, secs: u64) -> Self {
        self.min_age_secs = secs;
        self
    }

    fn old_enough<T>(&self, item: &Item<T>, now: DateTime<Utc>) -> bool {
        item.age_seconds(now) >= self.min_age_secs
    }
}

/// Summary of one promotion hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationRecord {
    pub source: String,
    pub destination: String,
    pub promoted: usize,
    pub pruned: usize,
    pub promoted_ids: Vec<String>,
    pub pruned_ids: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConsolidationRecord {
    pub fn is_noop(&self) -> bool {
        self.promoted == 0 && self.pruned == 0
    }
}

/// Run one promotion hop from `source` into `dest`.
///
/// `transform` maps source content into the destination's payload type; a
/// `None` leaves the item where it is.
pub fn promote<S, D, P, F>(
    source: &mut BoundedItemStore<S>,
    dest: &mut BoundedItemStore<D>,
    rule: &PromotionRule,
    filter: P,
    mut transform: F,
) -> ConsolidationRecord
where
    S: Payload,
    D: Payload,
    P: Fn(&Item<S>) -> bool,
    F: FnMut(&S) -> Option<D>,
{
    let now = source.now();
    let candidates = source.list_candidates(rule.min_relevance, |item| {
        rule.old_enough(item, now) && filter(item)
    });

    let mut record = ConsolidationRecord {
        source: source.name().to_string(),
        destination: dest.name().to_string(),
        promoted: 0,
        pruned: 0,
        promoted_ids: Vec::new(),
        pruned_ids: Vec::new(),
        timestamp: now,
    };

    for candidate in candidates {
        let Some(item) = source.peek(&candidate.id) else {
            continue;
        };
        let Some(content) = transform(&item.content) else {
            debug!(id = %candidate.id, source = %record.source, "candidate declined by transform");
            continue;
        };
        let promoted = Item {
            id: item.id.clone(),
            content,
            created_at: now,
            last_accessed_at: item.last_accessed_at,
            access_count: item.access_count,
            priority: item.priority,
            relevance: candidate.relevance,
        };

        let outcome = dest.put(promoted);
        if let Some(evicted) = outcome.evicted {
            record.pruned += 1;
            record.pruned_ids.push(evicted.id);
        }
        // Cannot fail: the id was just observed via peek.
        let _ = source.remove(&candidate.id);
        record.promoted += 1;
        record.promoted_ids.push(candidate.id);
    }

    if record.is_noop() {
        debug!(source = %record.source, destination = %record.destination, "nothing to promote");
    } else {
        info!(
            source = %record.source,
            destination = %record.destination,
            promoted = record.promoted,
            pruned = record.pruned,
            "promotion hop complete"
        );
    }
    record
}
