//! Topic context: embedded topics, their relations, and focus history.
//!
//! Topics live in a decay-priority store so stale, unvisited topics are the
//! first to go. Every focus change is appended to a FIFO history store, from
//! which transition counts are derived.

use crate::store::{BoundedItemStore, PutOutcome, StoreStatus};
use engram_embedding::{EmbeddingVector, Neighbor, VectorEncoder};
use engram_types::{
    Clock, DecayPolicy, EngramError, EvictionPolicy, Item, Payload, Priority, StoreConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub features: BTreeMap<String, f32>,
    pub embedding: EmbeddingVector,
    pub related: BTreeSet<String>,
}

impl Payload for Topic {}

/// One entry of the focus history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicChange {
    pub topic: String,
    pub previous: Option<String>,
}

impl Payload for TopicChange {}

#[derive(Debug)]
pub struct TopicContext {
    topics: BoundedItemStore<Topic>,
    history: BoundedItemStore<TopicChange>,
    encoder: VectorEncoder,
    current: Option<String>,
}

impl TopicContext {
    pub fn default_topic_config() -> StoreConfig {
        StoreConfig::new("topics", 50, EvictionPolicy::DecayPriority)
            .with_decay(DecayPolicy::exponential(0.99))
    }

    pub fn default_history_config() -> StoreConfig {
        StoreConfig::new("topic-history", 500, EvictionPolicy::Fifo)
    }

    pub fn new(
        topic_config: StoreConfig,
        history_config: StoreConfig,
        encoder: VectorEncoder,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngramError> {
        Ok(Self {
            topics: BoundedItemStore::new(topic_config, Arc::clone(&clock))?,
            history: BoundedItemStore::new(history_config, clock)?,
            encoder,
            current: None,
        })
    }

    pub fn encoder(&self) -> &VectorEncoder {
        &self.encoder
    }

    /// Add a topic, or refresh an existing one's features and embedding.
    ///
    /// Relations of a refreshed topic are kept; an evicted topic is removed
    /// from every other topic's relation set.
    pub fn add_topic(
        &mut self,
        name: &str,
        features: BTreeMap<String, f32>,
        relevance: f64,
    ) -> PutOutcome<Topic> {
        let embedding = self.encoder.encode(features.iter().map(|(k, v)| (k.as_str(), *v)));
        let related = self
            .topics
            .peek(name)
            .map(|t| t.content.related.clone())
            .unwrap_or_default();
        let topic = Topic { features, embedding, related };
        let item = Item::new(name, topic, Priority::Normal.scalar(), relevance, self.topics.now());
        let outcome = self.topics.put(item);
        if let Some(evicted) = &outcome.evicted {
            self.forget(&evicted.id);
        }
        outcome
    }

    pub fn topic(&self, name: &str) -> Option<&Item<Topic>> {
        self.topics.peek(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.topics.contains(name)
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Make `name` the current topic and record the change.
    pub fn focus(&mut self, name: &str) -> Result<(), EngramError> {
        self.topics.get(name)?;
        if self.current.as_deref() == Some(name) {
            return Ok(());
        }
        let previous = self.current.replace(name.to_string());
        debug!(topic = name, previous = previous.as_deref(), "topic focus changed");
        let change = TopicChange { topic: name.to_string(), previous };
        self.history
            .put(Item::with_generated_id(change, 1.0, 1.0, self.history.now()));
        Ok(())
    }

    /// Symmetric relation between two stored topics.
    pub fn relate(&mut self, a: &str, b: &str) -> Result<(), EngramError> {
        for name in [a, b] {
            if !self.topics.contains(name) {
                return Err(EngramError::NotFound(format!("topic '{name}'")));
            }
        }
        if a == b {
            return Ok(());
        }
        self.topics.update_content(a, |t| {
            t.related.insert(b.to_string());
        })?;
        self.topics.update_content(b, |t| {
            t.related.insert(a.to_string());
        })
    }

    pub fn related(&self, name: &str) -> Result<BTreeSet<String>, EngramError> {
        self.topics
            .peek(name)
            .map(|t| t.content.related.clone())
            .ok_or_else(|| EngramError::NotFound(format!("topic '{name}'")))
    }

    /// Overwrite a topic's base relevance (clamped to `[0, 1]`).
    pub fn update_relevance(&mut self, name: &str, relevance: f64) -> Result<(), EngramError> {
        self.topics
            .update_relevance(name, relevance)
            .map_err(|_| EngramError::NotFound(format!("topic '{name}'")))
    }

    /// Topic names with their decayed relevance, most relevant first.
    pub fn ranked(&self) -> Vec<(String, f64)> {
        self.topics
            .list_candidates(0.0, |_| true)
            .into_iter()
            .map(|c| (c.id, c.relevance))
            .collect()
    }

    /// Up to `k` topics most similar to `name`, excluding itself.
    pub fn similar(&self, name: &str, k: usize) -> Result<Vec<Neighbor>, EngramError> {
        let query = &self
            .topics
            .peek(name)
            .ok_or_else(|| EngramError::NotFound(format!("topic '{name}'")))?
            .content
            .embedding;
        let items = self.topics.items();
        let others = items
            .iter()
            .filter(|t| t.id != name)
            .map(|t| (t.id.as_str(), &t.content.embedding));
        self.encoder.nearest(query, others, k)
    }

    /// The stored topic closest to `features`, if at least `min_similarity`.
    pub fn assign(
        &self,
        features: &BTreeMap<String, f32>,
        min_similarity: f32,
    ) -> Result<Option<Neighbor>, EngramError> {
        let query = self.encoder.encode(features.iter().map(|(k, v)| (k.as_str(), *v)));
        if query.is_zero() {
            return Ok(None);
        }
        let items = self.topics.items();
        let best = self
            .encoder
            .nearest(&query, items.iter().map(|t| (t.id.as_str(), &t.content.embedding)), 1)?
            .into_iter()
            .next();
        Ok(best.filter(|n| n.similarity >= min_similarity))
    }

    pub fn clusters(&self, threshold: f32) -> Result<Vec<BTreeSet<String>>, EngramError> {
        let items = self.topics.items();
        self.encoder
            .cluster(items.iter().map(|t| (t.id.as_str(), &t.content.embedding)), threshold)
    }

    /// Focus changes, oldest first.
    pub fn history(&self) -> Vec<TopicChange> {
        self.history.items().into_iter().map(|i| i.content.clone()).collect()
    }

    /// `from → to → count` over the recorded history.
    pub fn transitions(&self) -> BTreeMap<String, BTreeMap<String, usize>> {
        let mut out: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        for change in self.history.items() {
            if let Some(prev) = &change.content.previous {
                *out.entry(prev.clone())
                    .or_default()
                    .entry(change.content.topic.clone())
                    .or_insert(0) += 1;
            }
        }
        out
    }

    fn forget(&mut self, name: &str) {
        let ids = self.topics.ids();
        for id in ids {
            let _ = self.topics.update_content(&id, |t| {
                t.related.remove(name);
            });
        }
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
    }

    pub fn export_topics(&self) -> Vec<Item<Topic>> {
        self.topics.export()
    }

    pub fn export_history(&self) -> Vec<Item<TopicChange>> {
        self.history.export()
    }

    /// Replace all contents, rejecting embeddings from a different space.
    pub fn restore(
        &mut self,
        topics: Vec<Item<Topic>>,
        history: Vec<Item<TopicChange>>,
        current: Option<String>,
    ) -> Result<(), EngramError> {
        let dimension = self.encoder.dimension();
        if let Some(bad) = topics.iter().find(|t| t.content.embedding.dimension() != dimension) {
            return Err(EngramError::DimensionMismatch {
                expected: dimension,
                found: bad.content.embedding.dimension(),
            });
        }
        if let Some(name) = &current {
            if !topics.iter().any(|t| &t.id == name) {
                return Err(EngramError::NotFound(format!("current topic '{name}'")));
            }
        }
        let mut fresh_topics = BoundedItemStore::new(self.topics.config().clone(), self.topics.clock())?;
        fresh_topics.restore(topics)?;
        let mut fresh_history =
            BoundedItemStore::new(self.history.config().clone(), self.history.clock())?;
        fresh_history.restore(history)?;

        self.topics = fresh_topics;
        self.history = fresh_history;
        self.current = current;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn statuses(&self) -> [StoreStatus; 2] {
        [self.topics.status(), self.history.status()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_embedding::topic_encoder;
    use engram_types::ManualClock;

    fn context(capacity: usize) -> TopicContext {
        let mut cfg = TopicContext::default_topic_config();
        cfg.capacity = capacity;
        TopicContext::new(
            cfg,
            TopicContext::default_history_config(),
            topic_encoder(7).unwrap(),
            Arc::new(ManualClock::fixed()),
        )
        .unwrap()
    }

    fn features(pairs: &[(&str, f32)]) -> BTreeMap<String, f32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn focus_records_transitions() {
        let mut t = context(10);
        t.add_topic("cooking", features(&[("food", 1.0)]), 0.5);
        t.add_topic("travel", features(&[("trip", 1.0)]), 0.5);
        t.focus("cooking").unwrap();
        t.focus("travel").unwrap();
        t.focus("cooking").unwrap();
        t.focus("cooking").unwrap();

        assert_eq!(t.current(), Some("cooking"));
        assert_eq!(t.history().len(), 3);
        let transitions = t.transitions();
        assert_eq!(transitions["cooking"]["travel"], 1);
        assert_eq!(transitions["travel"]["cooking"], 1);
    }

    #[test]
    fn focus_on_unknown_topic_fails() {
        let mut t = context(10);
        assert!(matches!(t.focus("ghost"), Err(EngramError::NotFound(_))));
    }

    #[test]
    fn relations_are_symmetric_and_pruned_on_eviction() {
        let mut t = context(2);
        t.add_topic("a", features(&[("x", 1.0)]), 0.5);
        t.add_topic("b", features(&[("y", 1.0)]), 0.5);
        t.relate("a", "b").unwrap();
        assert!(t.related("b").unwrap().contains("a"));

        let out = t.add_topic("c", features(&[("z", 1.0)]), 0.5);
        let evicted = out.evicted.unwrap().id;
        let survivor = if evicted == "a" { "b" } else { "a" };
        assert!(t.related(survivor).unwrap().is_empty());
    }

    #[test]
    fn refreshing_a_topic_keeps_relations() {
        let mut t = context(10);
        t.add_topic("a", features(&[("x", 1.0)]), 0.5);
        t.add_topic("b", features(&[("y", 1.0)]), 0.5);
        t.relate("a", "b").unwrap();
        let out = t.add_topic("a", features(&[("x", 1.0), ("w", 0.5)]), 0.7);
        assert!(out.replaced);
        assert!(t.related("a").unwrap().contains("b"));
    }

    #[test]
    fn assign_picks_matching_topic_above_threshold() {
        let mut t = context(10);
        t.add_topic("math", features(&[("algebra", 1.0), ("numbers", 0.5)]), 0.5);
        t.add_topic("music", features(&[("melody", 1.0)]), 0.5);

        let hit = t.assign(&features(&[("algebra", 1.0), ("numbers", 0.5)]), 0.9).unwrap();
        assert_eq!(hit.unwrap().id, "math");
        assert!(t.assign(&features(&[("volcano", 1.0)]), 0.9).unwrap().is_none());
        assert!(t.assign(&BTreeMap::new(), 0.0).unwrap().is_none());
    }

    #[test]
    fn similar_excludes_self() {
        let mut t = context(10);
        t.add_topic("a", features(&[("x", 1.0)]), 0.5);
        t.add_topic("b", features(&[("x", 1.0), ("y", 0.1)]), 0.5);
        t.add_topic("c", features(&[("z", 1.0)]), 0.5);
        let hits = t.similar("a", 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "b");
    }

    #[test]
    fn raising_relevance_reorders_ranking() {
        let mut t = context(10);
        t.add_topic("a", features(&[("x", 1.0)]), 0.8);
        t.add_topic("b", features(&[("y", 1.0)]), 0.5);
        t.add_topic("c", features(&[("z", 1.0)]), 0.3);
        let names: Vec<String> = t.ranked().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        t.update_relevance("c", 1.7).unwrap();
        let ranked = t.ranked();
        assert_eq!(ranked[0].0, "c");
        assert!((ranked[0].1 - 1.0).abs() < 1e-12);
        assert!(matches!(t.update_relevance("ghost", 0.5), Err(EngramError::NotFound(_))));
    }
}
