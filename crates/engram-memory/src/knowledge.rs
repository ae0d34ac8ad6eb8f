//! Semantic long-term store: facts, concepts, and concept relationships.
//!
//! Facts are subject–predicate–object triples with a confidence and a
//! verification flag. Concepts carry a definition and are linked to one
//! another through named relationships.
//!
//! | Store    | Default capacity | Eviction score                                |
//! |----------|------------------|-----------------------------------------------|
//! | facts    | 5000             | `10·verified + confidence + 0.01·usage_count` |
//! | concepts | 500              | `confidence + 0.01·usage_count`               |

use crate::pipeline::{ConsolidationRecord, PromotionRule, promote};
use crate::store::{BoundedItemStore, PutOutcome, StoreStatus};
use engram_types::{
    Clock, EngramError, EvictionPolicy, FieldWeight, Item, Payload, Priority, StoreConfig,
    clamp_unit,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Confidence added by each verification.
pub const VERIFICATION_BOOST: f64 = 0.1;

// ─────────────────────────────────────────────────────────────────────────────
// Fact
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f64,
    pub source: String,
    pub verified: bool,
}

impl Fact {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            confidence: 1.0,
            source: "observation".to_string(),
            verified: false,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// `true` for JSON objects carrying string `subject`, `predicate`, and
    /// `object` fields.
    pub fn is_fact_shaped(content: &Value) -> bool {
        ["subject", "predicate", "object"]
            .iter()
            .all(|k| content.get(k).is_some_and(Value::is_string))
    }

    /// Read a fact out of a fact-shaped JSON object.
    pub fn from_content(content: &Value) -> Option<Self> {
        if !Self::is_fact_shaped(content) {
            return None;
        }
        let text = |k: &str| content.get(k).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            subject: text("subject")?,
            predicate: text("predicate")?,
            object: text("object")?,
            confidence: content
                .get("confidence")
                .and_then(Value::as_f64)
                .map_or(1.0, clamp_unit),
            source: text("source").unwrap_or_else(|| "consolidation".to_string()),
            verified: content.get("verified").and_then(Value::as_bool).unwrap_or(false),
        })
    }
}

impl Payload for Fact {
    fn score_field(&self, field: &str) -> Option<f64> {
        match field {
            "verified" => Some(if self.verified { 1.0 } else { 0.0 }),
            "confidence" => Some(self.confidence),
            _ => None,
        }
    }
}

/// Filter for [`KnowledgeStore::query_facts`]; `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactQuery {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<String>,
}

impl FactQuery {
    fn matches(&self, fact: &Fact) -> bool {
        self.subject.as_ref().is_none_or(|s| *s == fact.subject)
            && self.predicate.as_ref().is_none_or(|p| *p == fact.predicate)
            && self.object.as_ref().is_none_or(|o| *o == fact.object)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Concept
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub name: String,
    pub definition: String,
    pub category: String,
    pub confidence: f64,
}

impl Concept {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
            category: "general".to_string(),
            confidence: 1.0,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }
}

impl Payload for Concept {
    fn score_field(&self, field: &str) -> Option<f64> {
        (field == "confidence").then_some(self.confidence)
    }
}

/// A named link between two concepts, stored once and reported from both ends.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub relation: String,
    pub to: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// KnowledgeStore
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct KnowledgeStore {
    facts: BoundedItemStore<Fact>,
    concepts: BoundedItemStore<Concept>,
    relationships: BTreeSet<Relationship>,
}

impl KnowledgeStore {
    pub fn default_fact_config() -> StoreConfig {
        StoreConfig::new(
            "semantic.facts",
            5000,
            EvictionPolicy::CompositeScore(vec![
                FieldWeight::new("verified", 10.0),
                FieldWeight::new("confidence", 1.0),
                FieldWeight::new("usage_count", 0.01),
            ]),
        )
    }

    pub fn default_concept_config() -> StoreConfig {
        StoreConfig::new(
            "semantic.concepts",
            500,
            EvictionPolicy::CompositeScore(vec![
                FieldWeight::new("confidence", 1.0),
                FieldWeight::new("usage_count", 0.01),
            ]),
        )
    }

    pub fn new(
        fact_config: StoreConfig,
        concept_config: StoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngramError> {
        Ok(Self {
            facts: BoundedItemStore::new(fact_config, Arc::clone(&clock))?,
            concepts: BoundedItemStore::new(concept_config, clock)?,
            relationships: BTreeSet::new(),
        })
    }

    // ── Facts ────────────────────────────────────────────────────────────────

    pub fn add_fact(&mut self, fact: Fact) -> PutOutcome<Fact> {
        let relevance = fact.confidence;
        let item = Item::with_generated_id(fact, Priority::Normal.scalar(), relevance, self.facts.now());
        self.facts.put(item)
    }

    /// Mark a fact verified and raise its confidence.
    pub fn verify_fact(&mut self, id: &str) -> Result<(), EngramError> {
        self.facts.update_content(id, |fact| {
            fact.verified = true;
            fact.confidence = clamp_unit(fact.confidence + VERIFICATION_BOOST);
        })?;
        info!(id, "fact verified");
        Ok(())
    }

    pub fn update_fact_confidence(&mut self, id: &str, confidence: f64) -> Result<(), EngramError> {
        self.facts
            .update_content(id, |fact| fact.confidence = clamp_unit(confidence))
    }

    pub fn fact(&self, id: &str) -> Option<&Item<Fact>> {
        self.facts.peek(id)
    }

    pub fn get_fact(&mut self, id: &str) -> Result<&Item<Fact>, EngramError> {
        self.facts.get(id)
    }

    /// Facts matching `query`, most confident first. Each hit counts as a use.
    pub fn query_facts(&mut self, query: &FactQuery) -> Vec<Item<Fact>> {
        let mut hits: Vec<(String, f64)> = self
            .facts
            .items()
            .into_iter()
            .filter(|i| query.matches(&i.content))
            .map(|i| (i.id.clone(), i.content.confidence))
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        hits.into_iter()
            .filter_map(|(id, _)| self.facts.get(&id).ok().cloned())
            .collect()
    }

    /// Move fact-shaped context items into the fact store.
    pub fn absorb_facts(
        &mut self,
        source: &mut BoundedItemStore<Value>,
        rule: &PromotionRule,
    ) -> ConsolidationRecord {
        promote(
            source,
            &mut self.facts,
            rule,
            |item| Fact::is_fact_shaped(&item.content),
            Fact::from_content,
        )
    }

    // ── Concepts ─────────────────────────────────────────────────────────────

    /// Add a concept under `id`, replacing any concept already stored there.
    ///
    /// An evicted concept takes its relationships with it.
    pub fn add_concept(&mut self, id: impl Into<String>, concept: Concept) -> PutOutcome<Concept> {
        let relevance = concept.confidence;
        let item = Item::new(id, concept, Priority::Normal.scalar(), relevance, self.concepts.now());
        let outcome = self.concepts.put(item);
        if let Some(evicted) = &outcome.evicted {
            self.drop_relationships(&evicted.id);
        }
        outcome
    }

    pub fn concept(&self, id: &str) -> Option<&Item<Concept>> {
        self.concepts.peek(id)
    }

    pub fn get_concept(&mut self, id: &str) -> Result<&Item<Concept>, EngramError> {
        self.concepts.get(id)
    }

    pub fn remove_concept(&mut self, id: &str) -> Result<Item<Concept>, EngramError> {
        let removed = self.concepts.remove(id)?;
        self.drop_relationships(id);
        Ok(removed)
    }

    /// Link two stored concepts.
    pub fn relate_concepts(&mut self, from: &str, relation: &str, to: &str) -> Result<(), EngramError> {
        for id in [from, to] {
            if !self.concepts.contains(id) {
                return Err(EngramError::NotFound(format!("concept '{id}'")));
            }
        }
        let inserted = self.relationships.insert(Relationship {
            from: from.to_string(),
            relation: relation.to_string(),
            to: to.to_string(),
        });
        if inserted {
            debug!(from, relation, to, "concepts related");
        }
        Ok(())
    }

    /// Concepts linked to `id` in either direction, grouped by relation name.
    pub fn related_concepts(&self, id: &str) -> Result<BTreeMap<String, Vec<String>>, EngramError> {
        if !self.concepts.contains(id) {
            return Err(EngramError::NotFound(format!("concept '{id}'")));
        }
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for rel in &self.relationships {
            let other = if rel.from == id {
                &rel.to
            } else if rel.to == id {
                &rel.from
            } else {
                continue;
            };
            let linked = out.entry(rel.relation.clone()).or_default();
            if !linked.contains(other) {
                linked.push(other.clone());
            }
        }
        Ok(out)
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter()
    }

    fn drop_relationships(&mut self, id: &str) {
        self.relationships.retain(|r| r.from != id && r.to != id);
    }

    // ── Export / status ──────────────────────────────────────────────────────

    pub fn export_facts(&self) -> Vec<Item<Fact>> {
        self.facts.export()
    }

    pub fn export_concepts(&self) -> Vec<Item<Concept>> {
        self.concepts.export()
    }

    /// Replace all contents. Relationships naming unknown concepts are
    /// rejected before anything changes.
    pub fn restore(
        &mut self,
        facts: Vec<Item<Fact>>,
        concepts: Vec<Item<Concept>>,
        relationships: Vec<Relationship>,
    ) -> Result<(), EngramError> {
        let known: BTreeSet<&str> = concepts.iter().map(|c| c.id.as_str()).collect();
        if let Some(bad) = relationships
            .iter()
            .find(|r| !known.contains(r.from.as_str()) || !known.contains(r.to.as_str()))
        {
            return Err(EngramError::NotFound(format!(
                "relationship {} -{}-> {} names an unknown concept",
                bad.from, bad.relation, bad.to
            )));
        }
        let mut fresh_facts = BoundedItemStore::new(self.facts.config().clone(), self.facts.clock())?;
        fresh_facts.restore(facts)?;
        let mut fresh_concepts =
            BoundedItemStore::new(self.concepts.config().clone(), self.concepts.clock())?;
        fresh_concepts.restore(concepts)?;

        self.facts = fresh_facts;
        self.concepts = fresh_concepts;
        self.relationships = relationships.into_iter().collect();
        Ok(())
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    pub fn statuses(&self) -> [StoreStatus; 2] {
        [self.facts.status(), self.concepts.status()]
    }
}
