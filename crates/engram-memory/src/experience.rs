//! Episodic long-term store: experiences with outcomes and rewards.
//!
//! Context-tier observations that are not fact-shaped land here during
//! consolidation. Each [`Experience`] keeps the original context, the
//! actions taken, and – once known – the outcome and reward.

use crate::pipeline::{ConsolidationRecord, PromotionRule, promote};
use crate::store::{BoundedItemStore, PutOutcome, StoreStatus};
use engram_types::{
    Clock, DecayPolicy, EngramError, EvictionPolicy, Item, Payload, Priority, StoreConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub context: Value,
    pub actions: Vec<Value>,
    pub outcome: Option<Value>,
    pub reward: f64,
    pub success: bool,
}

impl Experience {
    pub fn new(context: Value) -> Self {
        Self {
            context,
            actions: Vec::new(),
            outcome: None,
            reward: 0.0,
            success: false,
        }
    }

    pub fn with_actions(mut self, actions: Vec<Value>) -> Self {
        self.actions = actions;
        self
    }
}

impl Payload for Experience {
    fn score_field(&self, field: &str) -> Option<f64> {
        match field {
            "reward" => Some(self.reward),
            "success" => Some(if self.success { 1.0 } else { 0.0 }),
            _ => self.context.score_field(field),
        }
    }
}

/// Jaccard overlap of the top-level keys of two JSON objects.
///
/// Non-objects have no keys; two key-less values score `0.0`.
pub fn key_overlap(a: &Value, b: &Value) -> f64 {
    let keys = |v: &Value| -> BTreeSet<String> {
        v.as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    };
    let (ka, kb) = (keys(a), keys(b));
    let union = ka.union(&kb).count();
    if union == 0 {
        return 0.0;
    }
    ka.intersection(&kb).count() as f64 / union as f64
}

/// Bounded store of [`Experience`]s.
#[derive(Debug)]
pub struct ExperienceStore {
    store: BoundedItemStore<Experience>,
}

impl ExperienceStore {
    pub fn default_config() -> StoreConfig {
        StoreConfig::new("episodic", DEFAULT_CAPACITY, EvictionPolicy::DecayPriority)
            .with_decay(DecayPolicy::exponential(0.999))
    }

    pub fn new(config: StoreConfig, clock: Arc<dyn Clock>) -> Result<Self, EngramError> {
        Ok(Self {
            store: BoundedItemStore::new(config, clock)?,
        })
    }

    /// Record a new experience; `importance` in `[0, 1]` becomes its relevance.
    pub fn record(&mut self, experience: Experience, importance: f64) -> PutOutcome<Experience> {
        let item = Item::with_generated_id(
            experience,
            Priority::Normal.scalar(),
            importance,
            self.store.now(),
        );
        self.store.put(item)
    }

    /// Attach the outcome of a previously recorded experience.
    pub fn record_outcome(
        &mut self,
        id: &str,
        outcome: Value,
        reward: f64,
        success: bool,
    ) -> Result<(), EngramError> {
        self.store.update_content(id, |exp| {
            exp.outcome = Some(outcome);
            exp.reward = reward;
            exp.success = success;
        })?;
        debug!(id, reward, success, "experience outcome recorded");
        Ok(())
    }

    pub fn get(&mut self, id: &str) -> Result<&Item<Experience>, EngramError> {
        self.store.get(id)
    }

    pub fn peek(&self, id: &str) -> Option<&Item<Experience>> {
        self.store.peek(id)
    }

    /// Up to `k` experiences whose context shares keys with `context`.
    ///
    /// Ranked by key overlap descending, then id. Zero-overlap experiences are
    /// skipped. Each hit counts as an access.
    pub fn similar(&mut self, context: &Value, k: usize) -> Vec<(Item<Experience>, f64)> {
        let mut scored: Vec<(String, f64)> = self
            .store
            .items()
            .into_iter()
            .map(|item| (item.id.clone(), key_overlap(context, &item.content.context)))
            .filter(|(_, s)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);

        scored
            .into_iter()
            .filter_map(|(id, score)| self.store.get(&id).ok().map(|item| (item.clone(), score)))
            .collect()
    }

    /// Fraction of experiences with a recorded outcome that succeeded.
    pub fn success_rate(&self) -> f64 {
        let judged: Vec<&Item<Experience>> = self
            .store
            .items()
            .into_iter()
            .filter(|i| i.content.outcome.is_some())
            .collect();
        if judged.is_empty() {
            return 0.0;
        }
        judged.iter().filter(|i| i.content.success).count() as f64 / judged.len() as f64
    }

    pub fn average_reward(&self) -> f64 {
        let items = self.store.items();
        if items.is_empty() {
            return 0.0;
        }
        items.iter().map(|i| i.content.reward).sum::<f64>() / items.len() as f64
    }

    /// Promote context-tier observations that pass `rule` and `filter`.
    pub fn absorb<P>(
        &mut self,
        source: &mut BoundedItemStore<Value>,
        rule: &PromotionRule,
        filter: P,
    ) -> ConsolidationRecord
    where
        P: Fn(&Item<Value>) -> bool,
    {
        promote(source, &mut self.store, rule, filter, |content| {
            Some(Experience::new(content.clone()))
        })
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn export(&self) -> Vec<Item<Experience>> {
        self.store.export()
    }

    pub fn restore(&mut self, items: Vec<Item<Experience>>) -> Result<(), EngramError> {
        self.store.restore(items)
    }

    pub fn status(&self) -> StoreStatus {
        self.store.status()
    }
}
