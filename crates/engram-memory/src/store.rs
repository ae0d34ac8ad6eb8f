//! Bounded Item Store.
//!
//! A capacity-limited map of [`Item`]s keyed by id. Every tier of the
//! hierarchy (working, context, episodic, facts, concepts, topics, archive)
//! is one of these with a different [`StoreConfig`].
//!
//! # Invariants
//!
//! - `len() <= capacity` after every public operation.
//! - Inserting a new id into a full store evicts exactly one victim chosen by
//!   the configured [`EvictionPolicy`]; the victim is returned to the caller.
//! - Re-inserting an existing id replaces it in place and never evicts.
//! - Decay is evaluated lazily from `created_at`; stored base relevance is
//!   only rewritten by explicit updates.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use engram_memory::store::BoundedItemStore;
//! use engram_types::{Clock, EvictionPolicy, Item, ManualClock, StoreConfig};
//!
//! let clock = Arc::new(ManualClock::fixed());
//! let config = StoreConfig::new("scratch", 2, EvictionPolicy::Fifo);
//! let mut store = BoundedItemStore::<String>::new(config, clock.clone()).unwrap();
//!
//! for id in ["a", "b", "c"] {
//!     let item = Item::new(id, id.to_string(), 1.0, 0.5, clock.now());
//!     store.put(item);
//! }
//! assert_eq!(store.len(), 2);
//! assert!(store.peek("a").is_none());
//! ```

use chrono::{DateTime, Utc};
use engram_types::{
    Clock, DecayPolicy, EngramError, EvictionPolicy, FieldWeight, Item, Payload, StoreConfig,
    clamp_unit,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// Result of [`BoundedItemStore::put`].
#[derive(Debug, Clone, PartialEq)]
pub struct PutOutcome<T> {
    pub id: String,
    /// The item removed to make room, if any.
    pub evicted: Option<Item<T>>,
    /// `true` when an item with the same id was overwritten.
    pub replaced: bool,
}

/// A promotion / retrieval candidate as seen at the time of listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    /// Relevance after decay.
    pub relevance: f64,
    pub last_accessed_at: DateTime<Utc>,
}

/// Structured status report shared by every store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStatus {
    pub name: String,
    pub size: usize,
    pub capacity: usize,
    pub eviction_policy: String,
    pub decay_rate: Option<f64>,
    pub retention_window_secs: Option<u64>,
    pub evictions: u64,
    /// Mean decayed relevance, `0.0` when empty.
    pub mean_relevance: f64,
}

impl StoreStatus {
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.size as f64 / self.capacity as f64
        }
    }

    pub fn utilization_percent(&self) -> f64 {
        self.utilization() * 100.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BoundedItemStore
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Slot<T> {
    item: Item<T>,
    /// Insertion sequence; breaks ties between identical timestamps.
    seq: u64,
}

/// Capacity-limited item store with pluggable eviction and lazy decay.
#[derive(Debug)]
pub struct BoundedItemStore<T> {
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    slots: HashMap<String, Slot<T>>,
    next_seq: u64,
    evictions: u64,
}

impl<T: Payload> BoundedItemStore<T> {
    /// Validate `config` and create an empty store.
    pub fn new(config: StoreConfig, clock: Arc<dyn Clock>) -> Result<Self, EngramError> {
        config.validate()?;
        debug!(
            store = %config.name,
            capacity = config.capacity,
            policy = config.eviction.name(),
            "store created"
        );
        Ok(Self {
            config,
            clock,
            slots: HashMap::new(),
            next_seq: 0,
            evictions: 0,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    // ── Insertion ────────────────────────────────────────────────────────────

    /// Insert or replace `item`.
    ///
    /// A new id arriving at a full store first evicts one victim. An existing
    /// id is overwritten in place: its insertion order is kept and its access
    /// count never goes backwards.
    pub fn put(&mut self, mut item: Item<T>) -> PutOutcome<T> {
        item.relevance = clamp_unit(item.relevance);
        let id = item.id.clone();

        if let Some(slot) = self.slots.get_mut(&id) {
            item.access_count = item.access_count.max(slot.item.access_count);
            slot.item = item;
            return PutOutcome { id, evicted: None, replaced: true };
        }

        let evicted = self.evict_if_full();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(id.clone(), Slot { item, seq });
        PutOutcome { id, evicted, replaced: false }
    }

    /// Remove and return the policy's victim if the store is at capacity.
    pub fn evict_if_full(&mut self) -> Option<Item<T>> {
        if self.slots.len() < self.config.capacity {
            return None;
        }
        let victim = self.select_victim(self.clock.now())?;
        let slot = self.slots.remove(&victim)?;
        self.evictions += 1;
        debug!(
            store = %self.config.name,
            id = %victim,
            policy = self.config.eviction.name(),
            "evicted item"
        );
        Some(slot.item)
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    /// Fetch an item, recording the access.
    pub fn get(&mut self, id: &str) -> Result<&Item<T>, EngramError> {
        let now = self.clock.now();
        let slot = self
            .slots
            .get_mut(id)
            .ok_or_else(|| not_found(&self.config.name, id))?;
        slot.item.touch(now);
        Ok(&slot.item)
    }

    /// Fetch an item without touching its access metadata.
    pub fn peek(&self, id: &str) -> Option<&Item<T>> {
        self.slots.get(id).map(|s| &s.item)
    }

    pub fn remove(&mut self, id: &str) -> Result<Item<T>, EngramError> {
        self.slots
            .remove(id)
            .map(|s| s.item)
            .ok_or_else(|| not_found(&self.config.name, id))
    }

    /// Items in insertion order.
    pub fn items(&self) -> Vec<&Item<T>> {
        let mut slots: Vec<&Slot<T>> = self.slots.values().collect();
        slots.sort_by_key(|s| s.seq);
        slots.into_iter().map(|s| &s.item).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item<T>> {
        self.slots.values().map(|s| &s.item)
    }

    pub fn ids(&self) -> Vec<String> {
        self.items().into_iter().map(|i| i.id.clone()).collect()
    }

    // ── Relevance ────────────────────────────────────────────────────────────

    /// Overwrite the base relevance (clamped to `[0, 1]`).
    pub fn update_relevance(&mut self, id: &str, relevance: f64) -> Result<(), EngramError> {
        let slot = self
            .slots
            .get_mut(id)
            .ok_or_else(|| not_found(&self.config.name, id))?;
        slot.item.relevance = clamp_unit(relevance);
        Ok(())
    }

    /// Add `delta` to the base relevance and return the new value.
    pub fn reinforce(&mut self, id: &str, delta: f64) -> Result<f64, EngramError> {
        let slot = self
            .slots
            .get_mut(id)
            .ok_or_else(|| not_found(&self.config.name, id))?;
        slot.item.relevance = clamp_unit(slot.item.relevance + delta);
        Ok(slot.item.relevance)
    }

    /// Apply `f` to an item's content in place.
    pub fn update_content<F>(&mut self, id: &str, f: F) -> Result<(), EngramError>
    where
        F: FnOnce(&mut T),
    {
        let slot = self
            .slots
            .get_mut(id)
            .ok_or_else(|| not_found(&self.config.name, id))?;
        f(&mut slot.item.content);
        Ok(())
    }

    /// Decayed relevance of `item` at `now`.
    pub fn relevance_at(&self, item: &Item<T>, now: DateTime<Utc>) -> f64 {
        match &self.config.decay {
            Some(decay) => clamp_unit(item.relevance * decay.factor(item.age_minutes(now))),
            None => item.relevance,
        }
    }

    pub fn current_relevance(&self, id: &str) -> Option<f64> {
        let now = self.clock.now();
        self.peek(id).map(|item| self.relevance_at(item, now))
    }

    /// Items whose decayed relevance is at least `min_relevance` and which
    /// satisfy `predicate`.
    ///
    /// Ordered by relevance descending, then most recently accessed, then id.
    pub fn list_candidates<P>(&self, min_relevance: f64, predicate: P) -> Vec<Candidate>
    where
        P: Fn(&Item<T>) -> bool,
    {
        let now = self.clock.now();
        let mut out: Vec<Candidate> = self
            .slots
            .values()
            .map(|s| &s.item)
            .filter(|item| predicate(item))
            .filter_map(|item| {
                let relevance = self.relevance_at(item, now);
                (relevance >= min_relevance).then(|| Candidate {
                    id: item.id.clone(),
                    relevance,
                    last_accessed_at: item.last_accessed_at,
                })
            })
            .collect();
        out.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then_with(|| b.last_accessed_at.cmp(&a.last_accessed_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    // ── Eviction ─────────────────────────────────────────────────────────────

    fn select_victim(&self, now: DateTime<Utc>) -> Option<String> {
        self.slots
            .values()
            .map(|s| (self.eviction_score(&s.item, now), s))
            .min_by(|(sa, a), (sb, b)| {
                sa.total_cmp(sb)
                    .then_with(|| a.item.created_at.cmp(&b.item.created_at))
                    .then_with(|| a.seq.cmp(&b.seq))
            })
            .map(|(_, s)| s.item.id.clone())
    }

    fn eviction_score(&self, item: &Item<T>, now: DateTime<Utc>) -> f64 {
        match &self.config.eviction {
            EvictionPolicy::DecayPriority => {
                let factor = self
                    .config
                    .decay
                    .as_ref()
                    .map_or(1.0, |d: &DecayPolicy| d.factor(item.age_minutes(now)));
                item.priority * factor
            }
            // Every item scores the same; creation order decides.
            EvictionPolicy::Fifo => 0.0,
            EvictionPolicy::CompositeScore(weights) => self.composite_score(item, weights, now),
        }
    }

    fn composite_score(&self, item: &Item<T>, weights: &[FieldWeight], now: DateTime<Utc>) -> f64 {
        weights
            .iter()
            .map(|w| w.weight * self.score_field(item, &w.field, now))
            .filter(|x| x.is_finite())
            .sum()
    }

    fn score_field(&self, item: &Item<T>, field: &str, now: DateTime<Utc>) -> f64 {
        match field {
            "priority" => item.priority,
            "relevance" => self.relevance_at(item, now),
            "access_count" | "usage_count" => item.access_count as f64,
            "age_minutes" => item.age_minutes(now),
            other => item.content.score_field(other).unwrap_or(0.0),
        }
    }

    // ── Export / restore ─────────────────────────────────────────────────────

    /// All items in insertion order.
    pub fn export(&self) -> Vec<Item<T>> {
        self.items().into_iter().cloned().collect()
    }

    /// Replace the contents with `items`.
    ///
    /// Validated before anything changes: duplicate ids or more items than
    /// capacity leave the store untouched.
    pub fn restore(&mut self, items: Vec<Item<T>>) -> Result<(), EngramError> {
        if items.len() > self.config.capacity {
            return Err(EngramError::InvalidConfiguration(format!(
                "store '{}': cannot restore {} items into capacity {}",
                self.config.name,
                items.len(),
                self.config.capacity
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = items.iter().find(|i| !seen.insert(i.id.as_str())) {
            return Err(EngramError::AlreadyExists(format!(
                "store '{}': duplicate id '{}'",
                self.config.name, dup.id
            )));
        }

        self.slots.clear();
        self.next_seq = 0;
        for mut item in items {
            item.relevance = clamp_unit(item.relevance);
            let seq = self.next_seq;
            self.next_seq += 1;
            self.slots.insert(item.id.clone(), Slot { item, seq });
        }
        Ok(())
    }

    /// Drop every item and reset insertion order and the eviction counter.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.next_seq = 0;
        self.evictions = 0;
    }

    pub fn status(&self) -> StoreStatus {
        let now = self.clock.now();
        let mean_relevance = if self.slots.is_empty() {
            0.0
        } else {
            self.slots
                .values()
                .map(|s| self.relevance_at(&s.item, now))
                .sum::<f64>()
                / self.slots.len() as f64
        };
        StoreStatus {
            name: self.config.name.clone(),
            size: self.slots.len(),
            capacity: self.config.capacity,
            eviction_policy: self.config.eviction.name().to_string(),
            decay_rate: self.config.decay.map(|d| d.rate),
            retention_window_secs: self.config.retention_window_secs,
            evictions: self.evictions,
            mean_relevance,
        }
    }
}

fn not_found(store: &str, id: &str) -> EngramError {
    EngramError::NotFound(format!("'{id}' in store '{store}'"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use engram_types::ManualClock;
    use serde_json::{Value, json};

    fn store_with(
        capacity: usize,
        eviction: EvictionPolicy,
        decay: Option<DecayPolicy>,
    ) -> (BoundedItemStore<Value>, ManualClock) {
        let clock = ManualClock::fixed();
        let mut config = StoreConfig::new("test", capacity, eviction);
        config.decay = decay;
        let store = BoundedItemStore::new(config, Arc::new(clock.clone())).unwrap();
        (store, clock)
    }

    fn item(id: &str, priority: f64, relevance: f64, clock: &ManualClock) -> Item<Value> {
        Item::new(id, json!({ "id": id }), priority, relevance, clock.now())
    }

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn invalid_config_is_rejected() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::fixed());
        let cfg = StoreConfig::new("bad", 0, EvictionPolicy::Fifo);
        assert!(BoundedItemStore::<Value>::new(cfg, clock.clone()).is_err());

        let cfg = StoreConfig::new("bad", 3, EvictionPolicy::Fifo)
            .with_decay(DecayPolicy::exponential(1.5));
        assert!(BoundedItemStore::<Value>::new(cfg, clock).is_err());
    }

    // ── Capacity & eviction ──────────────────────────────────────────────────

    #[test]
    fn size_never_exceeds_capacity() {
        let (mut store, clock) = store_with(3, EvictionPolicy::Fifo, None);
        for i in 0..10 {
            store.put(item(&format!("i{i}"), 1.0, 0.5, &clock));
            assert!(store.len() <= 3);
        }
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn fifo_evicts_oldest() {
        let (mut store, clock) = store_with(2, EvictionPolicy::Fifo, None);
        store.put(item("a", 4.0, 1.0, &clock));
        clock.advance_secs(1);
        store.put(item("b", 1.0, 0.1, &clock));
        clock.advance_secs(1);
        let out = store.put(item("c", 1.0, 0.1, &clock));
        assert_eq!(out.evicted.unwrap().id, "a");
        assert!(store.contains("b") && store.contains("c"));
    }

    #[test]
    fn fifo_tie_breaks_on_insertion_order() {
        let (mut store, clock) = store_with(2, EvictionPolicy::Fifo, None);
        store.put(item("x", 1.0, 0.5, &clock));
        store.put(item("y", 1.0, 0.5, &clock));
        let out = store.put(item("z", 1.0, 0.5, &clock));
        assert_eq!(out.evicted.unwrap().id, "x");
    }

    #[test]
    fn decay_priority_evicts_lowest_effective_priority() {
        let (mut store, clock) = store_with(
            3,
            EvictionPolicy::DecayPriority,
            Some(DecayPolicy::exponential(0.5)),
        );
        store.put(item("old-high", 3.0, 0.5, &clock));
        clock.advance_mins(2);
        // old-high now scores 3 · 0.25 = 0.75
        store.put(item("new-low", 1.0, 0.5, &clock));
        store.put(item("new-normal", 2.0, 0.5, &clock));
        let out = store.put(item("incoming", 2.0, 0.5, &clock));
        assert_eq!(out.evicted.unwrap().id, "old-high");
    }

    #[test]
    fn decay_priority_ties_go_to_oldest() {
        let (mut store, clock) = store_with(2, EvictionPolicy::DecayPriority, None);
        store.put(item("first", 2.0, 0.5, &clock));
        store.put(item("second", 2.0, 0.5, &clock));
        let out = store.put(item("third", 2.0, 0.5, &clock));
        assert_eq!(out.evicted.unwrap().id, "first");
    }

    #[test]
    fn composite_evicts_lowest_weighted_sum() {
        let weights = vec![
            FieldWeight::new("verified", 10.0),
            FieldWeight::new("confidence", 1.0),
        ];
        let (mut store, clock) = store_with(2, EvictionPolicy::CompositeScore(weights), None);
        store.put(Item::new("verified", json!({"verified": true, "confidence": 0.1}), 1.0, 0.5, clock.now()));
        store.put(Item::new("confident", json!({"verified": false, "confidence": 0.9}), 1.0, 0.5, clock.now()));
        let out = store.put(Item::new("new", json!({"verified": false, "confidence": 0.95}), 1.0, 0.5, clock.now()));
        assert_eq!(out.evicted.unwrap().id, "confident");
    }

    #[test]
    fn composite_counts_usage_from_access_count() {
        let weights = vec![FieldWeight::new("usage_count", 1.0)];
        let (mut store, clock) = store_with(2, EvictionPolicy::CompositeScore(weights), None);
        store.put(item("used", 1.0, 0.5, &clock));
        store.put(item("unused", 1.0, 0.5, &clock));
        store.get("used").unwrap();
        let out = store.put(item("new", 1.0, 0.5, &clock));
        assert_eq!(out.evicted.unwrap().id, "unused");
    }

    #[test]
    fn capacity_one_evicts_previous() {
        let (mut store, clock) = store_with(1, EvictionPolicy::DecayPriority, None);
        store.put(item("a", 4.0, 1.0, &clock));
        let out = store.put(item("b", 1.0, 0.1, &clock));
        assert_eq!(out.evicted.unwrap().id, "a");
        assert_eq!(store.ids(), vec!["b".to_string()]);
    }

    #[test]
    fn replacing_existing_id_does_not_evict() {
        let (mut store, clock) = store_with(2, EvictionPolicy::Fifo, None);
        store.put(item("a", 1.0, 0.5, &clock));
        store.put(item("b", 1.0, 0.5, &clock));
        store.get("a").unwrap();
        let out = store.put(Item::new("a", json!("updated"), 1.0, 0.9, clock.now()));
        assert!(out.replaced);
        assert!(out.evicted.is_none());
        assert_eq!(store.len(), 2);
        let a = store.peek("a").unwrap();
        assert_eq!(a.content, json!("updated"));
        assert_eq!(a.access_count, 1);
        // Insertion order kept.
        assert_eq!(store.ids(), vec!["a".to_string(), "b".to_string()]);
    }

    // ── Access metadata ──────────────────────────────────────────────────────

    #[test]
    fn get_bumps_access_but_peek_does_not() {
        let (mut store, clock) = store_with(4, EvictionPolicy::Fifo, None);
        store.put(item("a", 1.0, 0.5, &clock));
        clock.advance_secs(5);
        store.peek("a").unwrap();
        assert_eq!(store.peek("a").unwrap().access_count, 0);
        store.get("a").unwrap();
        let a = store.peek("a").unwrap();
        assert_eq!(a.access_count, 1);
        assert_eq!(a.last_accessed_at, clock.now());
    }

    #[test]
    fn missing_ids_are_not_found() {
        let (mut store, _clock) = store_with(4, EvictionPolicy::Fifo, None);
        assert!(matches!(store.get("nope"), Err(EngramError::NotFound(_))));
        assert!(matches!(store.remove("nope"), Err(EngramError::NotFound(_))));
        assert!(store.update_relevance("nope", 0.5).is_err());
    }

    // ── Relevance & candidates ───────────────────────────────────────────────

    #[test]
    fn relevance_updates_are_clamped() {
        let (mut store, clock) = store_with(4, EvictionPolicy::Fifo, None);
        store.put(item("a", 1.0, 0.5, &clock));
        store.update_relevance("a", 3.0).unwrap();
        assert_eq!(store.peek("a").unwrap().relevance, 1.0);
        assert_eq!(store.reinforce("a", -2.0).unwrap(), 0.0);
    }

    #[test]
    fn decay_is_lazy() {
        let (mut store, clock) = store_with(
            4,
            EvictionPolicy::Fifo,
            Some(DecayPolicy::exponential(0.5)),
        );
        store.put(item("a", 1.0, 0.8, &clock));
        clock.advance_mins(1);
        assert!((store.current_relevance("a").unwrap() - 0.4).abs() < 1e-9);
        // Base relevance untouched.
        assert_eq!(store.peek("a").unwrap().relevance, 0.8);
    }

    #[test]
    fn candidates_are_inclusive_and_ordered() {
        let (mut store, clock) = store_with(8, EvictionPolicy::Fifo, None);
        store.put(item("low", 1.0, 0.59, &clock));
        store.put(item("exact", 1.0, 0.6, &clock));
        store.put(item("high-b", 1.0, 0.9, &clock));
        store.put(item("high-a", 1.0, 0.9, &clock));
        clock.advance_secs(1);
        store.get("high-b").unwrap();

        let ids: Vec<String> = store
            .list_candidates(0.6, |_| true)
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["high-b", "high-a", "exact"]);
    }

    #[test]
    fn candidates_respect_predicate() {
        let (mut store, clock) = store_with(8, EvictionPolicy::Fifo, None);
        store.put(Item::new("f", json!({"subject": "s"}), 1.0, 0.9, clock.now()));
        store.put(Item::new("e", json!({"event": "x"}), 1.0, 0.9, clock.now()));
        let got = store.list_candidates(0.0, |i| i.content.get("subject").is_some());
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, "f");
    }

    // ── Export / restore ─────────────────────────────────────────────────────

    #[test]
    fn restore_rejects_duplicates_without_mutation() {
        let (mut store, clock) = store_with(4, EvictionPolicy::Fifo, None);
        store.put(item("keep", 1.0, 0.5, &clock));
        let bad = vec![item("d", 1.0, 0.5, &clock), item("d", 1.0, 0.5, &clock)];
        assert!(matches!(store.restore(bad), Err(EngramError::AlreadyExists(_))));
        assert_eq!(store.ids(), vec!["keep".to_string()]);
    }

    #[test]
    fn restore_rejects_overflow() {
        let (mut store, clock) = store_with(1, EvictionPolicy::Fifo, None);
        let many = vec![item("a", 1.0, 0.5, &clock), item("b", 1.0, 0.5, &clock)];
        assert!(store.restore(many).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn export_then_restore_preserves_order() {
        let (mut store, clock) = store_with(4, EvictionPolicy::Fifo, None);
        for id in ["c", "a", "b"] {
            store.put(item(id, 1.0, 0.5, &clock));
        }
        let exported = store.export();
        let (mut other, _) = store_with(4, EvictionPolicy::Fifo, None);
        other.restore(exported).unwrap();
        assert_eq!(other.ids(), vec!["c", "a", "b"]);
    }

    // ── Status ───────────────────────────────────────────────────────────────

    #[test]
    fn status_reports_configuration_and_counts() {
        let (mut store, clock) = store_with(
            2,
            EvictionPolicy::DecayPriority,
            Some(DecayPolicy::exponential(0.99)),
        );
        store.put(item("a", 1.0, 0.4, &clock));
        store.put(item("b", 1.0, 0.6, &clock));
        store.put(item("c", 1.0, 0.5, &clock));
        let status = store.status();
        assert_eq!(status.size, 2);
        assert_eq!(status.capacity, 2);
        assert_eq!(status.eviction_policy, "decay-priority");
        assert_eq!(status.decay_rate, Some(0.99));
        assert_eq!(status.evictions, 1);
        assert!((status.utilization() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn clear_resets_counters_and_order() {
        let (mut store, clock) = store_with(2, EvictionPolicy::Fifo, None);
        for id in ["a", "b", "c"] {
            store.put(item(id, 1.0, 0.5, &clock));
        }
        assert_eq!(store.status().evictions, 1);

        store.clear();
        let status = store.status();
        assert_eq!(status.size, 0);
        assert_eq!(status.evictions, 0);
        assert!(store.is_empty());

        // Insertion order starts over, so FIFO evicts the first item put after clearing.
        for id in ["x", "y", "z"] {
            store.put(item(id, 1.0, 0.5, &clock));
        }
        assert_eq!(store.ids(), vec!["y", "z"]);
        assert_eq!(store.status().evictions, 1);
    }
}
