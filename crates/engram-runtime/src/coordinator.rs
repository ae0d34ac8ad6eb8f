//! [`MemoryCoordinator`] – the engine facade.
//!
//! Owns every tier and auxiliary component and is the only place where they
//! meet:
//!
//! ```text
//!  store() ──► working ──(≥0.6)──► context ──(≥0.7, ≥300 s)──┬─► semantic (fact-shaped)
//!                                                            └─► episodic (everything else)
//! ```
//!
//! Consolidation runs on demand via [`MemoryCoordinator::consolidate`] or
//! every `interval_cycles` calls to [`MemoryCoordinator::tick`]. All time
//! comes from the injected [`Clock`].

use crate::attention::{AttentionMap, AttentionSummary};
use crate::config::EngineConfig;
use crate::emotion::EmotionTracker;
use crate::state::{ArchiveState, EngineCounters, EngineState};
use engram_embedding::{Emotion, Neighbor, topic_encoder};
use engram_memory::archive::{SnapshotArchive, SnapshotDelta, SnapshotInfo};
use engram_memory::experience::{Experience, ExperienceStore};
use engram_memory::frames::{ContextFrame, ContextTrend, DEFAULT_IMPORTANCE, FrameBuffer};
use engram_memory::knowledge::{Concept, Fact, FactQuery, KnowledgeStore};
use engram_memory::pipeline::{ConsolidationRecord, PromotionRule, promote};
use engram_memory::store::{BoundedItemStore, StoreStatus};
use engram_memory::topics::TopicContext;
use engram_memory::vault::{SnapshotVault, VaultError};
use engram_routing::{Condition, Handler, RouteOutcome, RoutingStats, RoutingTable};
use engram_types::{Clock, EngramError, Item, Modality, Priority, SystemClock, TierKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Topic used when a feature set matches no known topic.
pub const UNASSIGNED_TOPIC: &str = "unassigned";

/// Structured status report for the whole engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub counters: EngineCounters,
    pub stores: Vec<StoreStatus>,
    pub attention: AttentionSummary,
    pub routing: RoutingStats,
    pub recent_consolidations: Vec<ConsolidationRecord>,
    pub active_snapshot: Option<String>,
    pub current_topic: Option<String>,
    pub valence: f32,
    pub arousal: f32,
    pub relationships: usize,
}

pub struct MemoryCoordinator {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    working: BoundedItemStore<Value>,
    context: BoundedItemStore<Value>,
    frames: FrameBuffer,
    experiences: ExperienceStore,
    knowledge: KnowledgeStore,
    topics: TopicContext,
    emotions: EmotionTracker,
    attention: AttentionMap,
    archive: SnapshotArchive,
    router: RoutingTable,
    first_hop: PromotionRule,
    second_hop: PromotionRule,
    consolidations: VecDeque<ConsolidationRecord>,
    counters: EngineCounters,
}

impl MemoryCoordinator {
    /// Build an engine on the system clock.
    pub fn new(config: EngineConfig) -> Result<Self, EngramError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build an engine reading time from `clock`.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, EngramError> {
        config.validate()?;
        let store_config = |name: &str, s: &crate::config::StoreSettings| s.to_store_config(name);

        let working = BoundedItemStore::new(store_config("working", &config.working)?, Arc::clone(&clock))?;
        let context = BoundedItemStore::new(store_config("context", &config.context)?, Arc::clone(&clock))?;
        let frames = FrameBuffer::new(store_config("context-frames", &config.frames)?, Arc::clone(&clock))?;
        let experiences = ExperienceStore::new(store_config("episodic", &config.episodic)?, Arc::clone(&clock))?;
        let knowledge = KnowledgeStore::new(
            store_config("semantic.facts", &config.facts)?,
            store_config("semantic.concepts", &config.concepts)?,
            Arc::clone(&clock),
        )?;
        let topics = TopicContext::new(
            store_config("topics", &config.topics)?,
            store_config("topic-history", &config.topic_history)?,
            topic_encoder(config.embedding.topic_seed)?,
            Arc::clone(&clock),
        )?;
        let emotions = EmotionTracker::new(
            store_config("mood-history", &config.mood_history)?,
            config.embedding.emotion_seed,
            Arc::clone(&clock),
        )?;
        let archive = SnapshotArchive::new(store_config("archive", &config.archive)?, Arc::clone(&clock))?;
        let router = RoutingTable::with_history_limit(Arc::clone(&clock), config.routing.history_limit);

        let c = &config.consolidation;
        let first_hop = PromotionRule::new(c.working_to_context_threshold)
            .with_min_age(c.first_hop_min_age_seconds);
        let second_hop = PromotionRule::new(c.context_to_long_term_threshold)
            .with_min_age(config.context.retention_window_seconds);

        info!(
            working = config.working.capacity,
            context = config.context.capacity,
            interval = c.interval_cycles,
            "memory coordinator ready"
        );

        Ok(Self {
            clock,
            working,
            context,
            frames,
            experiences,
            knowledge,
            topics,
            emotions,
            attention: AttentionMap::new(),
            archive,
            router,
            first_hop,
            second_hop,
            consolidations: VecDeque::new(),
            counters: EngineCounters::default(),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    // ── Ingestion & retrieval ────────────────────────────────────────────────

    /// Ingest an observation into working memory; returns its id.
    pub fn store(&mut self, content: Value, priority: Priority) -> String {
        self.store_with_relevance(content, priority, priority.initial_relevance())
    }

    pub fn store_with_relevance(&mut self, content: Value, priority: Priority, relevance: f64) -> String {
        let item = Item::with_generated_id(content, priority.scalar(), relevance, self.clock.now());
        let outcome = self.working.put(item);
        self.counters.stored += 1;
        if let Some(evicted) = &outcome.evicted {
            self.counters.pruned += 1;
            debug!(id = %evicted.id, "working memory full, evicted");
        }
        debug!(id = %outcome.id, %priority, "observation stored");
        outcome.id
    }

    /// Fetch any item by id, wherever it currently lives.
    ///
    /// Working and context items get a relevance boost on retrieval.
    pub fn retrieve(&mut self, id: &str) -> Result<Value, EngramError> {
        let boost = self.config.consolidation.retrieval_boost;
        let value = if self.working.contains(id) {
            let content = self.working.get(id)?.content.clone();
            self.working.reinforce(id, boost)?;
            content
        } else if self.context.contains(id) {
            let content = self.context.get(id)?.content.clone();
            self.context.reinforce(id, boost)?;
            content
        } else if self.experiences.peek(id).is_some() {
            serde_json::to_value(&self.experiences.get(id)?.content)?
        } else if self.knowledge.fact(id).is_some() {
            serde_json::to_value(&self.knowledge.get_fact(id)?.content)?
        } else if self.knowledge.concept(id).is_some() {
            serde_json::to_value(&self.knowledge.get_concept(id)?.content)?
        } else {
            return Err(EngramError::NotFound(format!("item '{id}'")));
        };
        self.counters.retrieved += 1;
        Ok(value)
    }

    /// Like [`retrieve`](Self::retrieve) without touching access metadata.
    pub fn peek(&self, id: &str) -> Option<Value> {
        if let Some(item) = self.working.peek(id).or_else(|| self.context.peek(id)) {
            return Some(item.content.clone());
        }
        if let Some(item) = self.experiences.peek(id) {
            return serde_json::to_value(&item.content).ok();
        }
        if let Some(item) = self.knowledge.fact(id) {
            return serde_json::to_value(&item.content).ok();
        }
        self.knowledge
            .concept(id)
            .and_then(|item| serde_json::to_value(&item.content).ok())
    }

    /// The tier currently holding `id`.
    pub fn locate(&self, id: &str) -> Option<TierKind> {
        if self.working.contains(id) {
            Some(TierKind::Working)
        } else if self.context.contains(id) {
            Some(TierKind::Context)
        } else if self.experiences.peek(id).is_some() {
            Some(TierKind::Episodic)
        } else if self.knowledge.fact(id).is_some() || self.knowledge.concept(id).is_some() {
            Some(TierKind::Semantic)
        } else if self.archive.get(id).is_some() {
            Some(TierKind::Archive)
        } else {
            None
        }
    }

    /// Decayed relevance of a working or context item.
    pub fn relevance(&self, id: &str) -> Option<f64> {
        self.working
            .current_relevance(id)
            .or_else(|| self.context.current_relevance(id))
    }

    pub fn update_relevance(&mut self, id: &str, relevance: f64) -> Result<(), EngramError> {
        if self.working.contains(id) {
            self.working.update_relevance(id, relevance)
        } else if self.context.contains(id) {
            self.context.update_relevance(id, relevance)
        } else {
            Err(EngramError::NotFound(format!("item '{id}' in working or context memory")))
        }
    }

    /// Empty working memory; returns how many items were dropped.
    pub fn clear_working(&mut self) -> usize {
        let dropped = self.working.len();
        self.working.clear();
        info!(dropped, "working memory cleared");
        dropped
    }

    // ── Consolidation ────────────────────────────────────────────────────────

    /// Run both promotion hops: working → context, then context → semantic
    /// for fact-shaped content and context → episodic for the rest.
    #[instrument(skip(self))]
    pub fn consolidate(&mut self) -> Vec<ConsolidationRecord> {
        let to_context = promote(
            &mut self.working,
            &mut self.context,
            &self.first_hop,
            |_| true,
            |content| Some(content.clone()),
        );
        let to_semantic = self.knowledge.absorb_facts(&mut self.context, &self.second_hop);
        let to_episodic = self.experiences.absorb(&mut self.context, &self.second_hop, |item| {
            !Fact::is_fact_shaped(&item.content)
        });

        let expired_frames = self.frames.prune_expired();
        self.counters.pruned += expired_frames as u64;

        let records = vec![to_context, to_semantic, to_episodic];
        for record in &records {
            self.counters.promoted += record.promoted as u64;
            self.counters.pruned += record.pruned as u64;
            if self.consolidations.len() == self.config.consolidation.history_limit {
                self.consolidations.pop_front();
            }
            self.consolidations.push_back(record.clone());
        }
        self.counters.consolidations += 1;
        info!(
            promoted = records.iter().map(|r| r.promoted).sum::<usize>(),
            pruned = records.iter().map(|r| r.pruned).sum::<usize>(),
            expired_frames,
            "consolidation complete"
        );
        records
    }

    /// Advance one cycle and open its context frame; consolidates every
    /// `interval_cycles` ticks.
    pub fn tick(&mut self) -> Option<Vec<ConsolidationRecord>> {
        self.counters.cycles += 1;
        self.frames.start_frame(DEFAULT_IMPORTANCE);
        if self.counters.cycles % self.config.consolidation.interval_cycles == 0 {
            Some(self.consolidate())
        } else {
            None
        }
    }

    pub fn consolidation_history(&self) -> impl Iterator<Item = &ConsolidationRecord> {
        self.consolidations.iter()
    }

    // ── Context frames ───────────────────────────────────────────────────────

    /// Open a new frame outside the tick cycle; returns its id.
    pub fn start_context_frame(&mut self, importance: f64) -> String {
        self.frames.start_frame(importance)
    }

    /// Record an event in the current frame, opening one if none is current.
    pub fn add_context_event(&mut self, event: Value) -> String {
        let id = self.current_frame_id();
        self.frames.add_event(event);
        id
    }

    /// Record a decision in the current frame, opening one if none is current.
    pub fn add_context_decision(&mut self, decision: Value) -> String {
        let id = self.current_frame_id();
        self.frames.add_decision(decision);
        id
    }

    fn current_frame_id(&mut self) -> String {
        match self.frames.current() {
            Some(frame) => frame.id.clone(),
            None => self.frames.start_frame(DEFAULT_IMPORTANCE),
        }
    }

    /// Up to `n` most recent frames, oldest first.
    pub fn recent_context(&self, n: usize) -> Vec<Item<ContextFrame>> {
        self.frames.recent(n)
    }

    pub fn context_trend(&self) -> Option<ContextTrend> {
        self.frames.trend()
    }

    /// Drop frames past the retention window; also runs on every consolidation.
    pub fn prune_context_frames(&mut self) -> usize {
        let pruned = self.frames.prune_expired();
        self.counters.pruned += pruned as u64;
        pruned
    }

    // ── Attention ────────────────────────────────────────────────────────────

    pub fn set_focus(&mut self, modality: Modality, target: &str, intensity: f64) {
        let now = self.clock.now();
        self.attention.set_focus(modality, target, intensity, now);
    }

    pub fn shift_focus(&mut self, from: Modality, to: Modality) -> Result<(), EngramError> {
        let now = self.clock.now();
        self.attention.shift(from, to, now)
    }

    pub fn update_attention(&mut self, modality: Modality, intensity: f64) -> Result<(), EngramError> {
        self.attention.update_intensity(modality, intensity)
    }

    pub fn clear_focus(&mut self, modality: Modality) -> bool {
        self.attention.clear(modality)
    }

    pub fn attention(&self) -> &AttentionMap {
        &self.attention
    }

    // ── Emotion ──────────────────────────────────────────────────────────────

    pub fn update_emotion(&mut self, emotion: Emotion, intensity: f32) {
        self.emotions.update(emotion, intensity);
    }

    pub fn emotions(&self) -> &EmotionTracker {
        &self.emotions
    }

    pub fn similar_moods(&self, k: usize) -> Result<Vec<Neighbor>, EngramError> {
        self.emotions.similar_moods(k)
    }

    // ── Topics ───────────────────────────────────────────────────────────────

    /// Add or refresh a topic; returns the name of a topic evicted to make room.
    pub fn add_topic(&mut self, name: &str, features: BTreeMap<String, f32>, relevance: f64) -> Option<String> {
        self.topics
            .add_topic(name, features, relevance)
            .evicted
            .map(|t| t.id)
    }

    pub fn focus_topic(&mut self, name: &str) -> Result<(), EngramError> {
        self.topics.focus(name)
    }

    pub fn relate_topics(&mut self, a: &str, b: &str) -> Result<(), EngramError> {
        self.topics.relate(a, b)
    }

    pub fn related_topics(&self, name: &str) -> Result<BTreeSet<String>, EngramError> {
        self.topics.related(name)
    }

    pub fn similar_topics(&self, name: &str, k: usize) -> Result<Vec<Neighbor>, EngramError> {
        self.topics.similar(name, k)
    }

    pub fn topic_clusters(&self, threshold: f32) -> Result<Vec<BTreeSet<String>>, EngramError> {
        self.topics.clusters(threshold)
    }

    /// The known topic matching `features`, if similar enough.
    pub fn assign_topic(&self, features: &BTreeMap<String, f32>) -> Result<Option<Neighbor>, EngramError> {
        self.topics
            .assign(features, self.config.embedding.topic_match_threshold)
    }

    /// Overwrite a topic's base relevance, which orders [`ranked_topics`](Self::ranked_topics).
    pub fn update_topic_relevance(&mut self, name: &str, relevance: f64) -> Result<(), EngramError> {
        self.topics.update_relevance(name, relevance)
    }

    /// Topics with their decayed relevance, most relevant first.
    pub fn ranked_topics(&self) -> Vec<(String, f64)> {
        self.topics.ranked()
    }

    pub fn topics(&self) -> &TopicContext {
        &self.topics
    }

    // ── Routing ──────────────────────────────────────────────────────────────

    pub fn register_handler(&mut self, topic: &str, handler: Arc<dyn Handler>) {
        self.router.register_handler(topic, handler);
    }

    pub fn unregister_handler(&mut self, topic: &str) -> bool {
        self.router.unregister_handler(topic)
    }

    pub fn add_rule(&mut self, rule_id: &str, condition: Condition, destination: &str, priority: i32) {
        self.router.add_rule(rule_id, condition, destination, priority);
    }

    pub fn remove_rule(&mut self, rule_id: &str) -> bool {
        self.router.remove_rule(rule_id)
    }

    pub fn route(&mut self, payload: &Value, topic: &str) -> Result<RouteOutcome, EngramError> {
        self.router.route(payload, topic)
    }

    /// Classify `features` into a topic, then route under that topic.
    ///
    /// Unmatched features are routed under [`UNASSIGNED_TOPIC`].
    pub fn route_by_features(
        &mut self,
        payload: &Value,
        features: &BTreeMap<String, f32>,
    ) -> Result<RouteOutcome, EngramError> {
        let topic = self
            .assign_topic(features)?
            .map_or_else(|| UNASSIGNED_TOPIC.to_string(), |n| n.id);
        self.router.route(payload, &topic)
    }

    pub fn router(&self) -> &RoutingTable {
        &self.router
    }

    // ── Long-term stores ─────────────────────────────────────────────────────

    pub fn record_experience(&mut self, context: Value, actions: Vec<Value>, importance: f64) -> String {
        self.experiences
            .record(Experience::new(context).with_actions(actions), importance)
            .id
    }

    pub fn record_outcome(&mut self, id: &str, outcome: Value, reward: f64, success: bool) -> Result<(), EngramError> {
        self.experiences.record_outcome(id, outcome, reward, success)
    }

    pub fn similar_experiences(&mut self, context: &Value, k: usize) -> Vec<(Item<Experience>, f64)> {
        self.experiences.similar(context, k)
    }

    pub fn experiences(&self) -> &ExperienceStore {
        &self.experiences
    }

    pub fn add_fact(&mut self, fact: Fact) -> String {
        self.knowledge.add_fact(fact).id
    }

    pub fn verify_fact(&mut self, id: &str) -> Result<(), EngramError> {
        self.knowledge.verify_fact(id)
    }

    pub fn query_facts(&mut self, query: &FactQuery) -> Vec<Item<Fact>> {
        self.knowledge.query_facts(query)
    }

    pub fn add_concept(&mut self, id: &str, concept: Concept) {
        self.knowledge.add_concept(id, concept);
    }

    pub fn relate_concepts(&mut self, from: &str, relation: &str, to: &str) -> Result<(), EngramError> {
        self.knowledge.relate_concepts(from, relation, to)
    }

    pub fn related_concepts(&self, id: &str) -> Result<BTreeMap<String, Vec<String>>, EngramError> {
        self.knowledge.related_concepts(id)
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    // ── Snapshots ────────────────────────────────────────────────────────────

    pub fn snapshot(&mut self, id: &str, state: Value, metric: Option<f64>) -> Result<SnapshotInfo, EngramError> {
        self.archive.create_snapshot(id, state, metric)
    }

    pub fn rollback_to(&mut self, id: &str) -> Result<Value, EngramError> {
        self.archive.rollback_to(id)
    }

    pub fn compare_snapshots(&self, from: &str, to: &str) -> Result<SnapshotDelta, EngramError> {
        self.archive.compare(from, to)
    }

    /// Snapshot the engine's own memory (everything except the archive).
    pub fn checkpoint(&mut self, id: &str, metric: Option<f64>) -> Result<SnapshotInfo, EngramError> {
        let mut state = self.export_state();
        state.archive = None;
        let value = serde_json::to_value(&state)?;
        self.archive.create_snapshot(id, value, metric)
    }

    /// Roll the engine's memory back to a checkpoint taken with
    /// [`checkpoint`](Self::checkpoint).
    pub fn restore_checkpoint(&mut self, id: &str) -> Result<(), EngramError> {
        let value = self
            .archive
            .get(id)
            .map(|s| s.content.state.clone())
            .ok_or_else(|| EngramError::NotFound(format!("snapshot '{id}'")))?;
        let state: EngineState = serde_json::from_value(value)?;
        self.import_state(state)?;
        self.archive.rollback_to(id)?;
        Ok(())
    }

    pub fn archive(&self) -> &SnapshotArchive {
        &self.archive
    }

    pub fn persist_archive(&self, vault: &mut SnapshotVault) -> Result<(), VaultError> {
        vault.save_all(&self.archive.export(), self.archive.active())
    }

    /// Replace the archive with the vault's contents, restoring the saved
    /// active snapshot. A vault saved without one activates its newest
    /// snapshot.
    pub fn load_archive(&mut self, vault: &SnapshotVault) -> Result<usize, VaultError> {
        let snapshots = vault.load_all()?;
        let active = match vault.active()? {
            Some(id) => Some(id),
            None => snapshots.last().map(|s| s.id.clone()),
        };
        let count = snapshots.len();
        self.archive
            .restore(snapshots, active)
            .map_err(|e| VaultError::Corrupt { id: "*".into(), reason: e.to_string() })?;
        Ok(count)
    }

    // ── State & status ───────────────────────────────────────────────────────

    pub fn export_state(&self) -> EngineState {
        EngineState {
            working: self.working.export(),
            context: self.context.export(),
            frames: self.frames.export(),
            experiences: self.experiences.export(),
            facts: self.knowledge.export_facts(),
            concepts: self.knowledge.export_concepts(),
            relationships: self.knowledge.relationships().cloned().collect(),
            topics: self.topics.export_topics(),
            topic_history: self.topics.export_history(),
            current_topic: self.topics.current().map(str::to_string),
            emotions: self.emotions.export(),
            attention: self.attention.clone(),
            consolidations: self.consolidations.iter().cloned().collect(),
            counters: self.counters,
            archive: Some(ArchiveState {
                snapshots: self.archive.export(),
                active: self.archive.active().map(str::to_string),
            }),
        }
    }

    /// Replace all memory with `state`.
    ///
    /// Validation happens on a fresh engine; on error nothing changes.
    /// Routing handlers and rules are kept, as is the archive when `state`
    /// carries none.
    pub fn import_state(&mut self, state: EngineState) -> Result<(), EngramError> {
        let mut fresh = Self::with_clock(self.config.clone(), Arc::clone(&self.clock))?;
        fresh.working.restore(state.working)?;
        fresh.context.restore(state.context)?;
        fresh.frames.restore(state.frames)?;
        fresh.experiences.restore(state.experiences)?;
        fresh
            .knowledge
            .restore(state.facts, state.concepts, state.relationships)?;
        fresh
            .topics
            .restore(state.topics, state.topic_history, state.current_topic)?;
        fresh.emotions.restore(state.emotions)?;
        fresh.attention = state.attention;
        let limit = self.config.consolidation.history_limit;
        let skip = state.consolidations.len().saturating_sub(limit);
        fresh.consolidations = state.consolidations.into_iter().skip(skip).collect();
        fresh.counters = state.counters;
        match state.archive {
            Some(archive) => fresh.archive.restore(archive.snapshots, archive.active)?,
            None => std::mem::swap(&mut fresh.archive, &mut self.archive),
        }

        std::mem::swap(&mut fresh.router, &mut self.router);
        *self = fresh;
        info!("engine state imported");
        Ok(())
    }

    pub fn status(&self) -> EngineStatus {
        let mut stores = vec![
            self.working.status(),
            self.context.status(),
            self.frames.status(),
            self.experiences.status(),
        ];
        stores.extend(self.knowledge.statuses());
        stores.extend(self.topics.statuses());
        stores.push(self.emotions.status());
        stores.push(self.archive.status());

        EngineStatus {
            counters: self.counters,
            stores,
            attention: self.attention.summary(),
            routing: self.router.statistics(),
            recent_consolidations: self.consolidations.iter().cloned().collect(),
            active_snapshot: self.archive.active().map(str::to_string),
            current_topic: self.topics.current().map(str::to_string),
            valence: self.emotions.valence(),
            arousal: self.emotions.arousal(),
            relationships: self.knowledge.relationships().count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_routing::FnHandler;
    use engram_types::ManualClock;
    use serde_json::json;

    fn engine() -> (MemoryCoordinator, ManualClock) {
        let clock = ManualClock::fixed();
        let coordinator =
            MemoryCoordinator::with_clock(EngineConfig::default(), Arc::new(clock.clone())).unwrap();
        (coordinator, clock)
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut cfg = EngineConfig::default();
        cfg.working.capacity = 0;
        assert!(matches!(
            MemoryCoordinator::new(cfg),
            Err(EngramError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn store_then_retrieve_round_trips_and_boosts() {
        let (mut e, _) = engine();
        let id = e.store(json!({"event": "door opened"}), Priority::Normal);
        assert_eq!(e.retrieve(&id).unwrap(), json!({"event": "door opened"}));
        assert!((e.relevance(&id).unwrap() - 0.55).abs() < 1e-9);
        assert_eq!(e.locate(&id), Some(TierKind::Working));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let (mut e, _) = engine();
        assert!(matches!(e.retrieve("ghost"), Err(EngramError::NotFound(_))));
        assert!(e.peek("ghost").is_none());
    }

    #[test]
    fn tick_consolidates_on_interval() {
        let (mut e, _) = engine();
        for _ in 0..9 {
            assert!(e.tick().is_none());
        }
        assert_eq!(e.tick().unwrap().len(), 3);
        assert_eq!(e.status().counters.consolidations, 1);
    }

    #[test]
    fn clear_working_starts_from_a_clean_store() {
        let mut cfg = EngineConfig::default();
        cfg.working.capacity = 2;
        let mut e = MemoryCoordinator::with_clock(cfg, Arc::new(ManualClock::fixed())).unwrap();
        for n in 0..3 {
            e.store(json!({"n": n}), Priority::Normal);
        }
        assert_eq!(e.status().stores[0].evictions, 1);

        assert_eq!(e.clear_working(), 2);
        let working = &e.status().stores[0];
        assert_eq!((working.size, working.evictions), (0, 0));
    }

    #[test]
    fn context_events_open_a_frame_when_none_is_current() {
        let (mut e, clock) = engine();
        let first = e.add_context_event(json!("door opened"));
        assert_eq!(e.add_context_decision(json!({"action": "greet"})), first);

        e.tick();
        clock.advance_secs(30);
        let second = e.add_context_event(json!("visitor left"));
        assert_ne!(second, first);

        let recent = e.recent_context(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content.decisions.len(), 1);
        let trend = e.context_trend().unwrap();
        assert_eq!((trend.total_events, trend.total_decisions), (2, 1));
    }

    #[test]
    fn consolidation_prunes_expired_frames() {
        let (mut e, clock) = engine();
        e.start_context_frame(0.9);
        clock.advance_secs(301);
        e.start_context_frame(0.9);
        let before = e.status().counters.pruned;

        assert_eq!(e.consolidate().len(), 3);
        assert_eq!(e.recent_context(10).len(), 1);
        assert_eq!(e.status().counters.pruned, before + 1);
        assert_eq!(e.prune_context_frames(), 0);
    }

    #[test]
    fn topic_relevance_update_changes_ranking() {
        let (mut e, _) = engine();
        e.add_topic("cooking", BTreeMap::from([("food".to_string(), 1.0f32)]), 0.9);
        e.add_topic("travel", BTreeMap::from([("trip".to_string(), 1.0f32)]), 0.4);
        assert_eq!(e.ranked_topics()[0].0, "cooking");

        e.update_topic_relevance("travel", 1.0).unwrap();
        e.update_topic_relevance("cooking", 0.1).unwrap();
        let ranked: Vec<String> = e.ranked_topics().into_iter().map(|(n, _)| n).collect();
        assert_eq!(ranked, vec!["travel", "cooking"]);
        assert!(matches!(
            e.update_topic_relevance("ghost", 0.5),
            Err(EngramError::NotFound(_))
        ));
    }

    #[test]
    fn route_by_features_falls_back_to_unassigned() {
        let (mut e, _) = engine();
        e.register_handler(UNASSIGNED_TOPIC, Arc::new(FnHandler::new("inbox", |_, p| p.clone())));
        let features = BTreeMap::from([("volcano".to_string(), 1.0f32)]);
        let out = e.route_by_features(&json!({"q": 1}), &features).unwrap();
        assert_eq!(out.destination, "inbox");
    }

    #[test]
    fn unregistered_topic_is_no_longer_routable() {
        let (mut e, _) = engine();
        e.register_handler("alerts", Arc::new(FnHandler::new("pager", |_, p| p.clone())));
        assert!(e.route(&json!({}), "alerts").is_ok());
        assert!(e.unregister_handler("alerts"));
        assert!(matches!(e.route(&json!({}), "alerts"), Err(EngramError::NoHandler(_))));
        assert_eq!(e.router().statistics().unrouted, 1);
    }

    #[test]
    fn attention_intensity_drives_primary_focus() {
        let (mut e, _) = engine();
        e.set_focus(Modality::Visual, "door", 0.4);
        assert!(e.attention().primary().is_none());
        e.update_attention(Modality::Visual, 0.9).unwrap();
        assert_eq!(e.attention().primary().map(|(m, _)| m), Some(Modality::Visual));
        assert!(e.clear_focus(Modality::Visual));
        assert!(e.attention().primary().is_none());
        assert!(matches!(
            e.update_attention(Modality::Auditory, 0.5),
            Err(EngramError::NotFound(_))
        ));
    }

    #[test]
    fn checkpoint_and_restore() {
        let (mut e, _) = engine();
        let kept = e.store(json!({"n": 1}), Priority::High);
        e.checkpoint("cp1", Some(0.5)).unwrap();
        let later = e.store(json!({"n": 2}), Priority::High);

        e.restore_checkpoint("cp1").unwrap();
        assert!(e.peek(&kept).is_some());
        assert!(e.peek(&later).is_none());
        assert_eq!(e.archive().active(), Some("cp1"));
        assert_eq!(e.archive().len(), 1);
    }

    #[test]
    fn import_failure_leaves_engine_untouched() {
        let (mut e, _) = engine();
        let id = e.store(json!("keep me"), Priority::Normal);
        let mut state = e.export_state();
        let dup = state.working[0].clone();
        state.working.push(dup);
        assert!(e.import_state(state).is_err());
        assert_eq!(e.peek(&id), Some(json!("keep me")));
    }

    #[test]
    fn status_lists_every_store() {
        let (e, _) = engine();
        let names: Vec<String> = e.status().stores.into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "working",
                "context",
                "context-frames",
                "episodic",
                "semantic.facts",
                "semantic.concepts",
                "topics",
                "topic-history",
                "mood-history",
                "archive"
            ]
        );
    }
}
