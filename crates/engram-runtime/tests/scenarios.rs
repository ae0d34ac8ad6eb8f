//! End-to-end behaviour of the engine, driven by a manual clock.

use engram_embedding::topic_encoder;
use engram_memory::knowledge::FactQuery;
use engram_memory::store::BoundedItemStore;
use engram_memory::vault::SnapshotVault;
use engram_routing::{Condition, FnHandler, Handler, RouteVia};
use engram_runtime::{EngineConfig, EngineState, MemoryCoordinator};
use engram_types::{
    Clock, DecayPolicy, EngramError, EvictionPolicy, Item, ManualClock, Modality, Priority, StoreConfig,
    TierKind,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

fn engine() -> (MemoryCoordinator, ManualClock) {
    let clock = ManualClock::fixed();
    let engine = MemoryCoordinator::with_clock(EngineConfig::default(), Arc::new(clock.clone()))
        .expect("default config is valid");
    (engine, clock)
}

fn named(name: &str) -> Arc<dyn Handler> {
    let label = name.to_string();
    Arc::new(FnHandler::new(name, move |_, payload| json!({ "by": label, "payload": payload })))
}

fn features(pairs: &[(&str, f32)]) -> BTreeMap<String, f32> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

// ── Capacity & eviction ──────────────────────────────────────────────────────

#[test]
fn working_memory_never_exceeds_capacity() {
    let (mut e, clock) = engine();
    for i in 0..200 {
        e.store(json!({ "n": i }), Priority::Normal);
        clock.advance_secs(1);
    }
    let status = e.status();
    let working = &status.stores[0];
    assert_eq!(working.name, "working");
    assert_eq!(working.size, 50);
    assert_eq!(working.evictions, 150);
}

#[test]
fn decay_priority_evicts_lowest_priority() {
    let clock = ManualClock::fixed();
    let config = StoreConfig::new("working", 2, EvictionPolicy::DecayPriority)
        .with_decay(DecayPolicy::exponential(0.99));
    let mut store = BoundedItemStore::<Value>::new(config, Arc::new(clock.clone())).unwrap();

    store.put(Item::new("A", json!("a"), 1.0, 0.5, clock.now()));
    store.put(Item::new("B", json!("b"), 5.0, 0.5, clock.now()));
    let outcome = store.put(Item::new("C", json!("c"), 3.0, 0.5, clock.now()));

    assert_eq!(outcome.evicted.map(|i| i.id), Some("A".to_string()));
    assert!(store.contains("B"));
    assert!(store.contains("C"));
}

#[test]
fn decay_priority_evicts_older_of_equal_priority() {
    let clock = ManualClock::fixed();
    let config = StoreConfig::new("working", 2, EvictionPolicy::DecayPriority)
        .with_decay(DecayPolicy::exponential(0.99));
    let mut store = BoundedItemStore::<Value>::new(config, Arc::new(clock.clone())).unwrap();

    store.put(Item::new("old", json!(1), 2.0, 0.5, clock.now()));
    clock.advance_mins(10);
    store.put(Item::new("young", json!(2), 2.0, 0.5, clock.now()));
    let outcome = store.put(Item::new("new", json!(3), 2.0, 0.5, clock.now()));

    assert_eq!(outcome.evicted.map(|i| i.id), Some("old".to_string()));
}

#[test]
fn fifo_evicts_exactly_the_first_inserted() {
    let clock = ManualClock::fixed();
    let config = StoreConfig::new("context", 3, EvictionPolicy::Fifo);
    let mut store = BoundedItemStore::<Value>::new(config, Arc::new(clock.clone())).unwrap();

    for id in ["a", "b", "c"] {
        store.put(Item::new(id, json!(id), 9.0, 0.9, clock.now()));
        clock.advance_secs(1);
    }
    let outcome = store.put(Item::new("d", json!("d"), 0.1, 0.1, clock.now()));

    assert_eq!(outcome.evicted.map(|i| i.id), Some("a".to_string()));
    assert_eq!(store.ids(), vec!["b", "c", "d"]);
}

// ── Embeddings ───────────────────────────────────────────────────────────────

#[test]
fn encoding_is_deterministic_and_self_similar() {
    let weights = [("rust", 0.8f32), ("memory", 0.4)];
    let a = topic_encoder(1337).unwrap().encode(weights);
    let b = topic_encoder(1337).unwrap().encode(weights);
    assert_eq!(a, b);
    assert_eq!(a.similarity(&a).unwrap(), 1.0);
}

#[test]
fn different_dimensions_are_rejected() {
    let (e, _) = engine();
    let mood = e.emotions().vector();
    let topic = topic_encoder(1337).unwrap().encode([("x", 1.0f32)]);
    assert!(matches!(
        mood.similarity(&topic),
        Err(EngramError::DimensionMismatch { expected: 32, found: 64 })
    ));
}

// ── Consolidation ────────────────────────────────────────────────────────────

#[test]
fn threshold_is_inclusive() {
    let (mut e, _) = engine();
    let at = e.store_with_relevance(json!("at threshold"), Priority::Normal, 0.6);
    let below = e.store_with_relevance(json!("just below"), Priority::Normal, 0.59);

    let records = e.consolidate();
    assert_eq!(records[0].promoted, 1);
    assert_eq!(e.locate(&at), Some(TierKind::Context));
    assert_eq!(e.locate(&below), Some(TierKind::Working));
}

#[test]
fn second_consolidation_is_a_noop() {
    let (mut e, _) = engine();
    e.store(json!({"event": "alarm"}), Priority::Critical);
    e.store(json!({"event": "hum"}), Priority::Low);

    let first = e.consolidate();
    assert_eq!(first.iter().map(|r| r.promoted).sum::<usize>(), 1);

    let second = e.consolidate();
    assert!(second.iter().all(|r| r.promoted == 0 && r.pruned == 0));
}

#[test]
fn second_hop_waits_for_retention_window() {
    let (mut e, clock) = engine();
    let id = e.store_with_relevance(json!({"event": "door opened"}), Priority::High, 0.75);
    e.consolidate();
    assert_eq!(e.locate(&id), Some(TierKind::Context));

    clock.advance_secs(290);
    let records = e.consolidate();
    assert_eq!(records[2].promoted, 0, "age gate must hold at 290s");
    assert_eq!(e.locate(&id), Some(TierKind::Context));
    assert!(e.relevance(&id).unwrap() >= 0.7);

    clock.advance_secs(15);
    let records = e.consolidate();
    assert_eq!(records[2].destination, "episodic");
    assert_eq!(records[2].promoted_ids, vec![id.clone()]);
    assert_eq!(e.locate(&id), Some(TierKind::Episodic));
}

#[test]
fn fact_shaped_content_lands_in_semantic_memory() {
    let (mut e, clock) = engine();
    let id = e.store(
        json!({"subject": "water", "predicate": "boils_at", "object": "100C"}),
        Priority::Critical,
    );
    e.consolidate();
    clock.advance_secs(301);
    e.consolidate();

    assert_eq!(e.locate(&id), Some(TierKind::Semantic));
    let query = FactQuery { subject: Some("water".into()), ..FactQuery::default() };
    let hits = e.query_facts(&query);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content.object, "100C");
    assert_eq!(e.retrieve(&id).unwrap()["predicate"], "boils_at");
}

#[test]
fn tick_drives_periodic_consolidation() {
    let (mut e, _) = engine();
    let id = e.store(json!("urgent"), Priority::Critical);
    for _ in 0..9 {
        assert!(e.tick().is_none());
    }
    assert_eq!(e.locate(&id), Some(TierKind::Working));
    assert!(e.tick().is_some());
    assert_eq!(e.locate(&id), Some(TierKind::Context));
    assert_eq!(e.status().counters.cycles, 10);
}

// ── Routing ──────────────────────────────────────────────────────────────────

#[test]
fn explicit_rule_beats_direct_handler() {
    let (mut e, _) = engine();
    e.register_handler("math", named("calculator"));
    e.register_handler("math-solver", named("math-solver"));
    e.add_rule("R1", Condition::topic("math"), "math-solver", 5);

    let outcome = e.route(&json!({"expr": "1+1"}), "math").unwrap();
    assert_eq!(outcome.destination, "math-solver");
    assert_eq!(outcome.via, RouteVia::Rule { rule_id: "R1".into() });
    assert_eq!(outcome.output.unwrap()["by"], "math-solver");
}

#[test]
fn rule_destination_matching_a_topic_name_still_reaches_the_rule_handler() {
    let (mut e, _) = engine();
    e.register_handler("math", named("direct-calculator"));
    e.register_handler("solvers", named("math"));
    e.add_rule("R1", Condition::topic("math"), "math", 5);

    let outcome = e.route(&json!({"expr": "2*3"}), "math").unwrap();
    assert_eq!(outcome.destination, "math");
    assert_eq!(outcome.via, RouteVia::Rule { rule_id: "R1".into() });
    assert_eq!(outcome.output.unwrap()["by"], "math");
}

#[test]
fn unroutable_payload_is_recorded_not_fatal() {
    let (mut e, _) = engine();
    let err = e.route(&json!(1), "nowhere").unwrap_err();
    assert_eq!(err, EngramError::NoHandler("nowhere".into()));
    let stats = e.status().routing;
    assert_eq!(stats.total, 1);
    assert_eq!(stats.unrouted, 1);
    assert_eq!(e.router().history().count(), 1);
}

#[test]
fn features_route_through_the_nearest_topic() {
    let (mut e, _) = engine();
    e.add_topic("cooking", features(&[("recipe", 1.0), ("oven", 0.5)]), 0.8);
    e.add_topic("robotics", features(&[("servo", 1.0), ("lidar", 0.7)]), 0.8);
    e.register_handler("robotics", named("motion"));

    let outcome = e
        .route_by_features(&json!({"cmd": "scan"}), &features(&[("servo", 1.0), ("lidar", 0.7)]))
        .unwrap();
    assert_eq!(outcome.topic, "robotics");
    assert_eq!(outcome.destination, "motion");
}

// ── Snapshots ────────────────────────────────────────────────────────────────

#[test]
fn rollback_returns_exact_blob_and_keeps_later_snapshots() {
    let (mut e, clock) = engine();
    let s1 = json!({"weights": [0.1, 0.2], "epoch": 1});
    e.snapshot("S1", s1.clone(), Some(0.4)).unwrap();
    clock.advance_mins(5);
    e.snapshot("S2", json!({"weights": [0.3, 0.1], "epoch": 2}), Some(0.6)).unwrap();

    assert_eq!(e.rollback_to("S1").unwrap(), s1);
    assert!(e.archive().get("S2").is_some());
    assert_eq!(e.archive().active(), Some("S1"));

    let delta = e.compare_snapshots("S1", "S2").unwrap();
    assert!(delta.changed.contains_key("epoch"));
    assert!(delta.changed.contains_key("weights[0]"));
    assert!((delta.metric_delta.unwrap() - 0.2).abs() < 1e-6);
    assert!((delta.elapsed_seconds - 300.0).abs() < 1e-6);

    assert!(matches!(e.rollback_to("S9"), Err(EngramError::NotFound(_))));
}

#[test]
fn archive_survives_a_vault_round_trip() {
    let (mut e, _) = engine();
    e.snapshot("a", json!({"v": 1}), None).unwrap();
    e.snapshot("b", json!({"v": 2}), Some(0.9)).unwrap();

    let mut vault = SnapshotVault::open_in_memory().unwrap();
    e.persist_archive(&mut vault).unwrap();

    let (mut other, _) = engine();
    assert_eq!(other.load_archive(&vault).unwrap(), 2);
    assert_eq!(other.archive().active(), Some("b"));
    assert_eq!(other.rollback_to("a").unwrap(), json!({"v": 1}));
}

#[test]
fn rollback_survives_a_vault_round_trip() {
    let (mut e, _) = engine();
    e.snapshot("S1", json!({"v": 1}), None).unwrap();
    e.snapshot("S2", json!({"v": 2}), None).unwrap();
    e.rollback_to("S1").unwrap();

    let mut vault = SnapshotVault::open_in_memory().unwrap();
    e.persist_archive(&mut vault).unwrap();

    let (mut other, _) = engine();
    other.load_archive(&vault).unwrap();
    assert_eq!(other.archive().active(), Some("S1"));
    let s3 = other.snapshot("S3", json!({"v": 3}), None).unwrap();
    assert_eq!(s3.parent_id.as_deref(), Some("S1"));
}

// ── State ────────────────────────────────────────────────────────────────────

#[test]
fn exported_state_round_trips_through_json() {
    let (mut e, clock) = engine();
    let obs = e.store(json!({"seen": "cat"}), Priority::High);
    e.set_focus(Modality::Visual, "cat", 0.9);
    e.update_emotion(engram_embedding::Emotion::Joy, 0.9);
    e.add_topic("pets", features(&[("cat", 1.0)]), 0.7);
    e.focus_topic("pets").unwrap();
    let exp = e.record_experience(json!({"room": "kitchen"}), vec![json!("pet")], 0.8);
    e.record_outcome(&exp, json!("purr"), 1.0, true).unwrap();

    let raw = serde_json::to_string(&e.export_state()).unwrap();
    let state: EngineState = serde_json::from_str(&raw).unwrap();

    let mut restored = MemoryCoordinator::with_clock(EngineConfig::default(), Arc::new(clock)).unwrap();
    restored.import_state(state).unwrap();

    assert_eq!(restored.peek(&obs), Some(json!({"seen": "cat"})));
    assert_eq!(restored.attention().primary().map(|(m, _)| m), Some(Modality::Visual));
    assert_eq!(restored.topics().current(), Some("pets"));
    assert!((restored.emotions().valence() - e.emotions().valence()).abs() < 1e-6);
    assert_eq!(restored.experiences().success_rate(), 1.0);
}

#[test]
fn context_frames_survive_export_and_import() {
    let (mut e, clock) = engine();
    e.tick();
    e.add_context_event(json!("door opened"));
    clock.advance_secs(5);
    e.tick();
    e.add_context_decision(json!({"action": "greet"}));

    let raw = serde_json::to_string(&e.export_state()).unwrap();
    let state: EngineState = serde_json::from_str(&raw).unwrap();
    let mut restored = MemoryCoordinator::with_clock(EngineConfig::default(), Arc::new(clock)).unwrap();
    restored.import_state(state).unwrap();

    assert_eq!(restored.context_trend(), e.context_trend());
    // The next decision still lands in the frame that was current at export.
    let frame = restored.add_context_decision(json!({"action": "wave"}));
    assert_eq!(frame, "frame-2");
    assert_eq!(restored.recent_context(1)[0].content.decisions.len(), 2);
}

#[test]
fn raising_topic_relevance_moves_it_to_the_top() {
    let (mut e, _) = engine();
    e.add_topic("cooking", features(&[("food", 1.0)]), 0.9);
    e.add_topic("travel", features(&[("trip", 1.0)]), 0.6);
    e.add_topic("music", features(&[("melody", 1.0)]), 0.3);

    e.update_topic_relevance("music", 0.95).unwrap();
    let ranked: Vec<String> = e.ranked_topics().into_iter().map(|(name, _)| name).collect();
    assert_eq!(ranked, vec!["music", "cooking", "travel"]);
}
