//! [`RoutingTable`] – rule-based topic router.
//!
//! Resolution order for `route(payload, topic)`:
//!
//! 1. Every rule whose [`Condition`] matches is a candidate; the highest
//!    priority wins and ties go to the earliest registered rule.
//! 2. Otherwise, a handler registered directly for `topic` receives it.
//! 3. Otherwise the attempt is recorded as unrouted and
//!    [`EngramError::NoHandler`] is returned.
//!
//! A rule's destination names a handler by [`Handler::name`] only; the
//! topic a handler was registered under never stands in for it. A
//! destination without a local handler is still a successful route; the
//! outcome simply carries no handler output. A handler that returns an
//! error is recorded as a failed attempt and the error is passed back.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use engram_routing::{Condition, FnHandler, RoutingTable};
//! use engram_types::SystemClock;
//! use serde_json::json;
//!
//! let mut table = RoutingTable::new(Arc::new(SystemClock));
//! table.register_handler("math", Arc::new(FnHandler::new("calc", |_, p| p.clone())));
//! table.add_rule("urgent", Condition::has_key("urgent"), "pager", 10);
//!
//! let out = table.route(&json!({"x": 1}), "math").unwrap();
//! assert_eq!(out.destination, "calc");
//!
//! let out = table.route(&json!({"urgent": true}), "math").unwrap();
//! assert_eq!(out.destination, "pager");
//! ```

use crate::condition::Condition;
use chrono::{DateTime, Utc};
use engram_types::{Clock, EngramError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

// ────────────────────────────────────────────────────────────────────────────
// Handler trait
// ────────────────────────────────────────────────────────────────────────────

/// Receiver of routed payloads.
pub trait Handler: Send + Sync {
    /// Name used as a rule destination and in routing records.
    fn name(&self) -> &str;

    fn handle(&self, topic: &str, payload: &Value) -> Result<Value, EngramError>;
}

/// Adapts an infallible closure into a [`Handler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&str, &Value) -> Value + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&str, &Value) -> Value + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, topic: &str, payload: &Value) -> Result<Value, EngramError> {
        Ok((self.f)(topic, payload))
    }
}

/// Adapts a fallible closure into a [`Handler`].
pub struct TryFnHandler<F> {
    name: String,
    f: F,
}

impl<F> TryFnHandler<F>
where
    F: Fn(&str, &Value) -> Result<Value, String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> Handler for TryFnHandler<F>
where
    F: Fn(&str, &Value) -> Result<Value, String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, topic: &str, payload: &Value) -> Result<Value, EngramError> {
        (self.f)(topic, payload).map_err(|reason| EngramError::HandlerFailed {
            handler: self.name.clone(),
            reason,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rules and records
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub rule_id: String,
    pub condition: Condition,
    pub destination: String,
    pub priority: i32,
}

/// How a payload reached its destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum RouteVia {
    Rule { rule_id: String },
    TopicHandler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOutcome {
    pub topic: String,
    pub destination: String,
    pub via: RouteVia,
    /// Handler output, when a local handler received the payload.
    pub output: Option<Value>,
}

/// One routing attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub destination: Option<String>,
    pub via: Option<RouteVia>,
    /// Set when the destination handler returned an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RouteRecord {
    pub fn succeeded(&self) -> bool {
        self.destination.is_some() && self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingStats {
    pub total: u64,
    pub routed: u64,
    pub unrouted: u64,
    /// Attempts whose handler returned an error.
    pub failed: u64,
    pub by_destination: BTreeMap<String, u64>,
    pub by_rule: BTreeMap<String, u64>,
    /// Attempts per topic, delivered or not.
    pub by_topic: BTreeMap<String, u64>,
    pub handlers: usize,
    pub rules: usize,
}

impl RoutingStats {
    /// Share of attempts delivered without error; `0.0` before any attempt.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.routed as f64 / self.total as f64
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RoutingTable
// ────────────────────────────────────────────────────────────────────────────

pub struct RoutingTable {
    handlers: BTreeMap<String, Arc<dyn Handler>>,
    /// Registration order; re-adding an id moves it to the back.
    rules: Vec<RoutingRule>,
    history: VecDeque<RouteRecord>,
    history_limit: usize,
    stats: RoutingStats,
    clock: Arc<dyn Clock>,
}

impl RoutingTable {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_history_limit(clock, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(clock: Arc<dyn Clock>, history_limit: usize) -> Self {
        Self {
            handlers: BTreeMap::new(),
            rules: Vec::new(),
            history: VecDeque::new(),
            history_limit: history_limit.max(1),
            stats: RoutingStats::default(),
            clock,
        }
    }

    /// Register `handler` for `topic`, replacing any previous one.
    pub fn register_handler(&mut self, topic: impl Into<String>, handler: Arc<dyn Handler>) {
        let topic = topic.into();
        debug!(topic = %topic, handler = handler.name(), "handler registered");
        self.handlers.insert(topic, handler);
    }

    pub fn unregister_handler(&mut self, topic: &str) -> bool {
        self.handlers.remove(topic).is_some()
    }

    pub fn registered_topics(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Add a rule; an existing rule with the same id is replaced and counts
    /// as newly registered for tie-breaking.
    pub fn add_rule(
        &mut self,
        rule_id: impl Into<String>,
        condition: Condition,
        destination: impl Into<String>,
        priority: i32,
    ) {
        let rule = RoutingRule {
            rule_id: rule_id.into(),
            condition,
            destination: destination.into(),
            priority,
        };
        self.rules.retain(|r| r.rule_id != rule.rule_id);
        debug!(rule = %rule.rule_id, destination = %rule.destination, priority, "routing rule added");
        self.rules.push(rule);
    }

    pub fn remove_rule(&mut self, rule_id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.rule_id != rule_id);
        before != self.rules.len()
    }

    /// Rules in evaluation order: priority descending, then registration.
    pub fn rules(&self) -> Vec<&RoutingRule> {
        let mut out: Vec<&RoutingRule> = self.rules.iter().collect();
        // Stable sort keeps registration order among equal priorities.
        out.sort_by(|a, b| b.priority.cmp(&a.priority));
        out
    }

    /// Pure resolution; does not record history or invoke handlers.
    pub fn resolve(&self, payload: &Value, topic: &str) -> Option<(String, RouteVia)> {
        let mut best: Option<&RoutingRule> = None;
        for rule in self.rules.iter().filter(|r| r.condition.matches(topic, payload)) {
            if best.is_none_or(|b| rule.priority > b.priority) {
                best = Some(rule);
            }
        }
        if let Some(rule) = best {
            return Some((
                rule.destination.clone(),
                RouteVia::Rule { rule_id: rule.rule_id.clone() },
            ));
        }
        self.handlers
            .get(topic)
            .map(|h| (h.name().to_string(), RouteVia::TopicHandler))
    }

    /// Dispatch `payload` published under `topic`.
    pub fn route(&mut self, payload: &Value, topic: &str) -> Result<RouteOutcome, EngramError> {
        let Some((destination, via)) = self.resolve(payload, topic) else {
            warn!(topic, "no route for payload");
            self.record(topic, None, None, None);
            self.stats.unrouted += 1;
            return Err(EngramError::NoHandler(topic.to_string()));
        };

        let handler = match &via {
            RouteVia::TopicHandler => self.handlers.get(topic),
            RouteVia::Rule { .. } => self.handler_named(&destination),
        };
        let output = match handler.map(|h| h.handle(topic, payload)).transpose() {
            Ok(output) => output,
            Err(e) => {
                warn!(topic, destination = %destination, error = %e, "handler failed");
                self.stats.failed += 1;
                self.record(topic, Some(destination), Some(via), Some(e.to_string()));
                return Err(e);
            }
        };

        debug!(topic, destination = %destination, via = ?via, "payload routed");
        self.stats.routed += 1;
        *self.stats.by_destination.entry(destination.clone()).or_insert(0) += 1;
        if let RouteVia::Rule { rule_id } = &via {
            *self.stats.by_rule.entry(rule_id.clone()).or_insert(0) += 1;
        }
        self.record(topic, Some(destination.clone()), Some(via.clone()), None);

        Ok(RouteOutcome {
            topic: topic.to_string(),
            destination,
            via,
            output,
        })
    }

    fn handler_named(&self, destination: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.values().find(|h| h.name() == destination)
    }

    fn record(
        &mut self,
        topic: &str,
        destination: Option<String>,
        via: Option<RouteVia>,
        error: Option<String>,
    ) {
        self.stats.total += 1;
        *self.stats.by_topic.entry(topic.to_string()).or_insert(0) += 1;
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(RouteRecord {
            timestamp: self.clock.now(),
            topic: topic.to_string(),
            destination,
            via,
            error,
        });
    }

    /// Most recent attempts, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &RouteRecord> {
        self.history.iter()
    }

    pub fn statistics(&self) -> RoutingStats {
        RoutingStats {
            handlers: self.handlers.len(),
            rules: self.rules.len(),
            ..self.stats.clone()
        }
    }
}
