//! Context frames: one record per processing cycle.
//!
//! A [`FrameBuffer`] keeps the most recent frames in a FIFO store. Events
//! and decisions are appended to the current frame only; with no frame open
//! they are refused. Frames older than the retention window are dropped by
//! [`FrameBuffer::prune_expired`].

use crate::store::{BoundedItemStore, StoreStatus};
use chrono::Duration;
use engram_types::{Clock, EngramError, EvictionPolicy, Item, Payload, StoreConfig, clamp_unit};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_RETENTION_SECS: u64 = 300;
pub const DEFAULT_IMPORTANCE: f64 = 0.5;
/// Frames considered by [`FrameBuffer::trend`].
pub const TREND_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFrame {
    pub cycle: u64,
    pub state: Value,
    pub events: Vec<Value>,
    pub decisions: Vec<Value>,
    pub importance: f64,
}

impl ContextFrame {
    pub fn new(cycle: u64, importance: f64) -> Self {
        Self {
            cycle,
            state: Value::Object(Default::default()),
            events: Vec::new(),
            decisions: Vec::new(),
            importance,
        }
    }
}

impl Payload for ContextFrame {
    fn score_field(&self, field: &str) -> Option<f64> {
        match field {
            "importance" => Some(self.importance),
            "events" => Some(self.events.len() as f64),
            "decisions" => Some(self.decisions.len() as f64),
            _ => self.state.score_field(field),
        }
    }
}

/// Aggregate over the last [`TREND_WINDOW`] frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextTrend {
    pub frames: usize,
    pub total_events: usize,
    pub total_decisions: usize,
    pub average_importance: f64,
    /// Newest minus oldest creation time; `0.0` for a single frame.
    pub timespan_seconds: f64,
}

/// Serializable contents of a [`FrameBuffer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameState {
    pub frames: Vec<Item<ContextFrame>>,
    pub current: Option<String>,
    pub cycle: u64,
}

#[derive(Debug)]
pub struct FrameBuffer {
    store: BoundedItemStore<ContextFrame>,
    current: Option<String>,
    cycle: u64,
}

impl FrameBuffer {
    pub fn default_config() -> StoreConfig {
        StoreConfig::new("context-frames", DEFAULT_CAPACITY, EvictionPolicy::Fifo)
            .with_retention_secs(DEFAULT_RETENTION_SECS)
    }

    pub fn new(config: StoreConfig, clock: Arc<dyn Clock>) -> Result<Self, EngramError> {
        Ok(Self {
            store: BoundedItemStore::new(config, clock)?,
            current: None,
            cycle: 0,
        })
    }

    /// Open a new frame and make it current; returns its id.
    pub fn start_frame(&mut self, importance: f64) -> String {
        self.cycle += 1;
        let importance = clamp_unit(importance);
        let id = format!("frame-{}", self.cycle);
        let frame = ContextFrame::new(self.cycle, importance);
        let item = Item::new(id.clone(), frame, 1.0, importance, self.store.now());
        if let Some(evicted) = self.store.put(item).evicted {
            debug!(id = %evicted.id, "frame buffer full, dropped oldest frame");
        }
        self.current = Some(id.clone());
        id
    }

    pub fn current(&self) -> Option<&Item<ContextFrame>> {
        self.current.as_deref().and_then(|id| self.store.peek(id))
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Append to the current frame; `false` when no frame is open.
    pub fn add_event(&mut self, event: Value) -> bool {
        self.update_current(|f| f.events.push(event))
    }

    /// Append to the current frame; `false` when no frame is open.
    pub fn add_decision(&mut self, decision: Value) -> bool {
        self.update_current(|f| f.decisions.push(decision))
    }

    /// Set one key of the current frame's state object.
    pub fn set_state(&mut self, key: &str, value: Value) -> bool {
        self.update_current(|f| {
            if let Value::Object(map) = &mut f.state {
                map.insert(key.to_string(), value);
            }
        })
    }

    fn update_current<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut ContextFrame),
    {
        let Some(id) = self.current.clone() else {
            return false;
        };
        match self.store.update_content(&id, f) {
            Ok(()) => true,
            Err(_) => {
                self.current = None;
                false
            }
        }
    }

    /// Up to `n` most recent frames, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Item<ContextFrame>> {
        let items = self.store.items();
        let skip = items.len().saturating_sub(n);
        items.into_iter().skip(skip).cloned().collect()
    }

    /// `None` when the buffer is empty.
    pub fn trend(&self) -> Option<ContextTrend> {
        let recent = self.recent(TREND_WINDOW);
        let (first, last) = (recent.first()?, recent.last()?);
        let timespan_seconds =
            (last.created_at - first.created_at).num_milliseconds().max(0) as f64 / 1000.0;
        Some(ContextTrend {
            frames: recent.len(),
            total_events: recent.iter().map(|f| f.content.events.len()).sum(),
            total_decisions: recent.iter().map(|f| f.content.decisions.len()).sum(),
            average_importance: recent.iter().map(|f| f.content.importance).sum::<f64>()
                / recent.len() as f64,
            timespan_seconds,
        })
    }

    /// Drop frames strictly older than the retention window; returns how many.
    ///
    /// A buffer configured without a window never prunes.
    pub fn prune_expired(&mut self) -> usize {
        let Some(window) = self.store.config().retention_window_secs else {
            return 0;
        };
        let now = self.store.now();
        let window = Duration::seconds(window as i64);
        let expired: Vec<String> = self
            .store
            .items()
            .into_iter()
            .filter(|f| now - f.created_at > window)
            .map(|f| f.id.clone())
            .collect();
        for id in &expired {
            let _ = self.store.remove(id);
            if self.current.as_deref() == Some(id.as_str()) {
                self.current = None;
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "pruned expired context frames");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn export(&self) -> FrameState {
        FrameState {
            frames: self.store.export(),
            current: self.current.clone(),
            cycle: self.cycle,
        }
    }

    /// Replace all frames. The cycle counter never falls behind a restored frame.
    pub fn restore(&mut self, state: FrameState) -> Result<(), EngramError> {
        if let Some(id) = &state.current {
            if !state.frames.iter().any(|f| &f.id == id) {
                return Err(EngramError::NotFound(format!("current frame '{id}'")));
            }
        }
        let newest = state.frames.iter().map(|f| f.content.cycle).max().unwrap_or(0);
        self.store.restore(state.frames)?;
        self.current = state.current;
        self.cycle = state.cycle.max(newest);
        Ok(())
    }

    pub fn status(&self) -> StoreStatus {
        self.store.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_types::ManualClock;
    use serde_json::json;

    fn buffer(capacity: usize) -> (FrameBuffer, ManualClock) {
        let clock = ManualClock::fixed();
        let mut cfg = FrameBuffer::default_config();
        cfg.capacity = capacity;
        (FrameBuffer::new(cfg, Arc::new(clock.clone())).unwrap(), clock)
    }

    #[test]
    fn events_need_an_open_frame() {
        let (mut b, _) = buffer(10);
        assert!(!b.add_event(json!("door opened")));
        assert!(!b.add_decision(json!({"action": "wait"})));

        let id = b.start_frame(DEFAULT_IMPORTANCE);
        assert_eq!(id, "frame-1");
        assert!(b.add_event(json!("door opened")));
        assert!(b.add_decision(json!({"action": "greet"})));
        let current = b.current().unwrap();
        assert_eq!(current.content.cycle, 1);
        assert_eq!(current.content.events, vec![json!("door opened")]);
        assert_eq!(current.content.decisions.len(), 1);
    }

    #[test]
    fn events_land_in_the_newest_frame_only() {
        let (mut b, _) = buffer(10);
        b.start_frame(0.5);
        b.add_event(json!("a"));
        b.start_frame(0.5);
        b.add_event(json!("b"));
        b.add_event(json!("c"));
        let recent = b.recent(10);
        assert_eq!(recent[0].content.events.len(), 1);
        assert_eq!(recent[1].content.events.len(), 2);
    }

    #[test]
    fn recent_returns_last_n_oldest_first() {
        let (mut b, _) = buffer(3);
        for _ in 0..5 {
            b.start_frame(0.5);
        }
        assert_eq!(b.len(), 3);
        let cycles: Vec<u64> = b.recent(2).iter().map(|f| f.content.cycle).collect();
        assert_eq!(cycles, vec![4, 5]);
        assert_eq!(b.recent(50).len(), 3);
    }

    #[test]
    fn trend_summarizes_last_window() {
        let (mut b, clock) = buffer(50);
        assert!(b.trend().is_none());

        b.start_frame(0.2);
        b.add_event(json!("x"));
        let single = b.trend().unwrap();
        assert_eq!(single.timespan_seconds, 0.0);

        for _ in 0..11 {
            clock.advance_secs(2);
            b.start_frame(0.8);
            b.add_decision(json!({"go": true}));
        }
        let trend = b.trend().unwrap();
        assert_eq!(trend.frames, TREND_WINDOW);
        // The first frame and its event fell out of the window.
        assert_eq!(trend.total_events, 0);
        assert_eq!(trend.total_decisions, 10);
        assert!((trend.average_importance - 0.8).abs() < 1e-12);
        assert!((trend.timespan_seconds - 18.0).abs() < 1e-9);
    }

    #[test]
    fn prune_is_strictly_older_than_window() {
        let (mut b, clock) = buffer(10);
        b.start_frame(0.5);
        clock.advance_secs(100);
        b.start_frame(0.5);

        clock.advance_secs(200);
        assert_eq!(b.prune_expired(), 0, "exactly at the window is kept");
        clock.advance_secs(1);
        assert_eq!(b.prune_expired(), 1);
        assert!(b.current().is_some());

        clock.advance_secs(100);
        assert_eq!(b.prune_expired(), 1);
        assert!(b.current().is_none());
        assert!(!b.add_event(json!("late")));
    }

    #[test]
    fn restore_keeps_cycle_ahead_of_frames() {
        let (mut b, _) = buffer(10);
        b.start_frame(0.5);
        b.start_frame(0.5);
        let mut state = b.export();
        state.cycle = 0;

        let (mut fresh, _) = buffer(10);
        fresh.restore(state).unwrap();
        assert_eq!(fresh.current().unwrap().id, "frame-2");
        assert_eq!(fresh.start_frame(0.5), "frame-3");

        let bad = FrameState { current: Some("frame-9".into()), ..FrameState::default() };
        assert!(matches!(fresh.restore(bad), Err(EngramError::NotFound(_))));
        assert_eq!(fresh.len(), 3);
    }
}
