//! Snapshot archive with rollback and structural comparison.
//!
//! Snapshots are immutable once created. The archive is a FIFO-bounded store
//! (default 50), so the oldest snapshot is dropped when a new one arrives at
//! capacity. Each snapshot records the snapshot that was active when it was
//! taken, which gives a parent chain across rollbacks.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use engram_memory::archive::SnapshotArchive;
//! use engram_types::ManualClock;
//! use serde_json::json;
//!
//! let mut archive =
//!     SnapshotArchive::new(SnapshotArchive::default_config(), Arc::new(ManualClock::fixed())).unwrap();
//! archive.create_snapshot("s1", json!({"w": 1}), Some(0.4)).unwrap();
//! archive.create_snapshot("s2", json!({"w": 2}), Some(0.6)).unwrap();
//!
//! let delta = archive.compare("s1", "s2").unwrap();
//! assert_eq!(delta.changed.len(), 1);
//! assert_eq!(archive.rollback_to("s1").unwrap(), json!({"w": 1}));
//! ```

use crate::store::{BoundedItemStore, StoreStatus};
use chrono::{DateTime, Utc};
use engram_types::{Clock, EngramError, EvictionPolicy, Item, Payload, StoreConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: Value,
    pub metric: Option<f64>,
    pub parent_id: Option<String>,
}

impl Payload for Snapshot {
    fn score_field(&self, field: &str) -> Option<f64> {
        match field {
            "metric" => self.metric,
            _ => None,
        }
    }
}

/// Lightweight listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub metric: Option<f64>,
    pub parent_id: Option<String>,
}

/// Old and new value at one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    pub before: Value,
    pub after: Value,
}

/// Structural difference between two snapshots' states.
///
/// Paths are dotted object keys with array indices in brackets, e.g.
/// `layers.encoder[2].bias`. The root path is `$`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDelta {
    pub from: String,
    pub to: String,
    pub added: BTreeMap<String, Value>,
    pub removed: BTreeMap<String, Value>,
    pub changed: BTreeMap<String, ValueChange>,
    pub metric_delta: Option<f64>,
    pub elapsed_seconds: f64,
}

impl SnapshotDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

#[derive(Debug)]
pub struct SnapshotArchive {
    store: BoundedItemStore<Snapshot>,
    active: Option<String>,
}

impl SnapshotArchive {
    pub fn default_config() -> StoreConfig {
        StoreConfig::new("archive", DEFAULT_CAPACITY, EvictionPolicy::Fifo)
    }

    pub fn new(config: StoreConfig, clock: Arc<dyn Clock>) -> Result<Self, EngramError> {
        Ok(Self {
            store: BoundedItemStore::new(config, clock)?,
            active: None,
        })
    }

    /// Store `state` under `id`; it becomes the active snapshot.
    ///
    /// Ids are never reused while their snapshot is retained.
    pub fn create_snapshot(
        &mut self,
        id: &str,
        state: Value,
        metric: Option<f64>,
    ) -> Result<SnapshotInfo, EngramError> {
        if self.store.contains(id) {
            return Err(EngramError::AlreadyExists(format!("snapshot '{id}'")));
        }
        let snapshot = Snapshot {
            state,
            metric: metric.filter(|m| m.is_finite()),
            parent_id: self.active.clone(),
        };
        let item = Item::new(id, snapshot, 1.0, 1.0, self.store.now());
        let info = info_of(&item);
        let outcome = self.store.put(item);
        if let Some(evicted) = outcome.evicted {
            warn!(id = %evicted.id, "archive full, dropped oldest snapshot");
        }
        self.active = Some(id.to_string());
        info!(id, metric = ?info.metric, "snapshot created");
        Ok(info)
    }

    /// Return the stored state of `id` and mark it active.
    ///
    /// History is left exactly as it was.
    pub fn rollback_to(&mut self, id: &str) -> Result<Value, EngramError> {
        let state = self
            .store
            .peek(id)
            .map(|item| item.content.state.clone())
            .ok_or_else(|| EngramError::NotFound(format!("snapshot '{id}'")))?;
        self.active = Some(id.to_string());
        info!(id, "rolled back to snapshot");
        Ok(state)
    }

    pub fn get(&self, id: &str) -> Option<&Item<Snapshot>> {
        self.store.peek(id)
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn compare(&self, from: &str, to: &str) -> Result<SnapshotDelta, EngramError> {
        let a = self
            .store
            .peek(from)
            .ok_or_else(|| EngramError::NotFound(format!("snapshot '{from}'")))?;
        let b = self
            .store
            .peek(to)
            .ok_or_else(|| EngramError::NotFound(format!("snapshot '{to}'")))?;

        let mut delta = SnapshotDelta {
            from: from.to_string(),
            to: to.to_string(),
            added: BTreeMap::new(),
            removed: BTreeMap::new(),
            changed: BTreeMap::new(),
            metric_delta: match (a.content.metric, b.content.metric) {
                (Some(x), Some(y)) => Some(y - x),
                _ => None,
            },
            elapsed_seconds: (b.created_at - a.created_at).num_milliseconds() as f64 / 1000.0,
        };
        diff_values("$", &a.content.state, &b.content.state, &mut delta);
        Ok(delta)
    }

    /// Newest first, at most `limit` entries.
    pub fn history(&self, limit: usize) -> Vec<SnapshotInfo> {
        self.store
            .items()
            .into_iter()
            .rev()
            .take(limit)
            .map(info_of)
            .collect()
    }

    /// Snapshot with the highest metric; ties go to the newest.
    pub fn best_snapshot(&self) -> Option<SnapshotInfo> {
        self.store
            .items()
            .into_iter()
            .filter(|i| i.content.metric.is_some())
            .max_by(|a, b| {
                let (ma, mb) = (a.content.metric.unwrap_or(f64::MIN), b.content.metric.unwrap_or(f64::MIN));
                ma.total_cmp(&mb).then_with(|| a.created_at.cmp(&b.created_at))
            })
            .map(info_of)
    }

    /// Snapshots whose metric is at least `min_metric`, best first.
    pub fn recovery_candidates(&self, min_metric: f64) -> Vec<SnapshotInfo> {
        let mut out: Vec<SnapshotInfo> = self
            .store
            .items()
            .into_iter()
            .filter(|i| i.content.metric.is_some_and(|m| m >= min_metric))
            .map(info_of)
            .collect();
        out.sort_by(|a, b| {
            b.metric
                .unwrap_or(f64::MIN)
                .total_cmp(&a.metric.unwrap_or(f64::MIN))
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        out
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn export(&self) -> Vec<Item<Snapshot>> {
        self.store.export()
    }

    pub fn restore(&mut self, snapshots: Vec<Item<Snapshot>>, active: Option<String>) -> Result<(), EngramError> {
        if let Some(id) = &active {
            if !snapshots.iter().any(|s| &s.id == id) {
                return Err(EngramError::NotFound(format!("active snapshot '{id}'")));
            }
        }
        self.store.restore(snapshots)?;
        self.active = active;
        Ok(())
    }

    pub fn status(&self) -> StoreStatus {
        self.store.status()
    }
}

fn info_of(item: &Item<Snapshot>) -> SnapshotInfo {
    SnapshotInfo {
        id: item.id.clone(),
        created_at: item.created_at,
        metric: item.content.metric,
        parent_id: item.content.parent_id.clone(),
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent == "$" {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn diff_values(path: &str, a: &Value, b: &Value, delta: &mut SnapshotDelta) {
    match (a, b) {
        (Value::Object(ma), Value::Object(mb)) => {
            for (k, va) in ma {
                let p = child_path(path, k);
                match mb.get(k) {
                    Some(vb) => diff_values(&p, va, vb, delta),
                    None => {
                        delta.removed.insert(p, va.clone());
                    }
                }
            }
            for (k, vb) in mb {
                if !ma.contains_key(k) {
                    delta.added.insert(child_path(path, k), vb.clone());
                }
            }
        }
        (Value::Array(xa), Value::Array(xb)) => {
            for i in 0..xa.len().max(xb.len()) {
                let p = format!("{path}[{i}]");
                match (xa.get(i), xb.get(i)) {
                    (Some(va), Some(vb)) => diff_values(&p, va, vb, delta),
                    (Some(va), None) => {
                        delta.removed.insert(p, va.clone());
                    }
                    (None, Some(vb)) => {
                        delta.added.insert(p, vb.clone());
                    }
                    (None, None) => {}
                }
            }
        }
        _ if a != b => {
            delta.changed.insert(
                path.to_string(),
                ValueChange { before: a.clone(), after: b.clone() },
            );
        }
        _ => {}
    }
}
