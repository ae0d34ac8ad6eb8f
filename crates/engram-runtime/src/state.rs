//! Serializable engine state for export / import and checkpoints.

use crate::attention::AttentionMap;
use crate::emotion::EmotionState;
use engram_memory::archive::Snapshot;
use engram_memory::experience::Experience;
use engram_memory::frames::FrameState;
use engram_memory::knowledge::{Concept, Fact, Relationship};
use engram_memory::pipeline::ConsolidationRecord;
use engram_memory::topics::{Topic, TopicChange};
use engram_types::Item;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Running totals maintained by the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCounters {
    pub cycles: u64,
    pub stored: u64,
    pub retrieved: u64,
    pub promoted: u64,
    pub pruned: u64,
    pub consolidations: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveState {
    pub snapshots: Vec<Item<Snapshot>>,
    pub active: Option<String>,
}

/// Everything needed to rebuild a coordinator's memory.
///
/// Routing handlers are code, not data, and are never part of the state.
/// `archive` is `None` in checkpoints so snapshots do not nest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub working: Vec<Item<Value>>,
    pub context: Vec<Item<Value>>,
    #[serde(default)]
    pub frames: FrameState,
    pub experiences: Vec<Item<Experience>>,
    pub facts: Vec<Item<Fact>>,
    pub concepts: Vec<Item<Concept>>,
    pub relationships: Vec<Relationship>,
    pub topics: Vec<Item<Topic>>,
    pub topic_history: Vec<Item<TopicChange>>,
    pub current_topic: Option<String>,
    pub emotions: EmotionState,
    pub attention: AttentionMap,
    pub consolidations: Vec<ConsolidationRecord>,
    pub counters: EngineCounters,
    #[serde(default)]
    pub archive: Option<ArchiveState>,
}
