//! Attention map: one focus per sensory / cognitive modality.
//!
//! Setting a focus with intensity above [`PRIMARY_THRESHOLD`] makes that
//! modality the primary focus. Shifting attention moves a focus (target and
//! intensity) from one modality to another.

use chrono::{DateTime, Utc};
use engram_types::{EngramError, Modality, clamp_unit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Intensity above which a focus claims primary attention.
pub const PRIMARY_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Focus {
    pub target: String,
    pub intensity: f64,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionSummary {
    pub active: Vec<Modality>,
    pub primary: Option<Modality>,
    pub updates: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttentionMap {
    foci: BTreeMap<Modality, Focus>,
    primary: Option<Modality>,
    updates: u64,
}

impl AttentionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_focus(
        &mut self,
        modality: Modality,
        target: impl Into<String>,
        intensity: f64,
        now: DateTime<Utc>,
    ) {
        let intensity = clamp_unit(intensity);
        let target = target.into();
        debug!(%modality, target = %target, intensity, "attention focus set");
        self.foci.insert(modality, Focus { target, intensity, since: now });
        self.updates += 1;
        self.refresh_primary(modality);
    }

    pub fn focus(&self, modality: Modality) -> Option<&Focus> {
        self.foci.get(&modality)
    }

    pub fn primary(&self) -> Option<(Modality, &Focus)> {
        let m = self.primary?;
        self.foci.get(&m).map(|f| (m, f))
    }

    pub fn update_intensity(&mut self, modality: Modality, intensity: f64) -> Result<(), EngramError> {
        let focus = self
            .foci
            .get_mut(&modality)
            .ok_or_else(|| EngramError::NotFound(format!("no focus on {modality}")))?;
        focus.intensity = clamp_unit(intensity);
        self.updates += 1;
        self.refresh_primary(modality);
        Ok(())
    }

    /// Move the focus held by `from` onto `to`.
    pub fn shift(&mut self, from: Modality, to: Modality, now: DateTime<Utc>) -> Result<(), EngramError> {
        let mut focus = self
            .foci
            .remove(&from)
            .ok_or_else(|| EngramError::NotFound(format!("no focus on {from}")))?;
        focus.since = now;
        self.foci.insert(to, focus);
        if self.primary == Some(from) {
            self.primary = None;
        }
        self.updates += 1;
        self.refresh_primary(to);
        Ok(())
    }

    pub fn clear(&mut self, modality: Modality) -> bool {
        if self.primary == Some(modality) {
            self.primary = None;
        }
        self.foci.remove(&modality).is_some()
    }

    /// Modalities in focus, strongest first.
    pub fn active_modalities(&self) -> Vec<Modality> {
        let mut active: Vec<(Modality, f64)> = self.foci.iter().map(|(m, f)| (*m, f.intensity)).collect();
        active.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        active.into_iter().map(|(m, _)| m).collect()
    }

    /// Intensities normalised to sum to 1; empty when nothing is in focus.
    pub fn distribution(&self) -> BTreeMap<Modality, f64> {
        let total: f64 = self.foci.values().map(|f| f.intensity).sum();
        if total <= 0.0 {
            return BTreeMap::new();
        }
        self.foci
            .iter()
            .map(|(m, f)| (*m, f.intensity / total))
            .collect()
    }

    pub fn summary(&self) -> AttentionSummary {
        AttentionSummary {
            active: self.active_modalities(),
            primary: self.primary,
            updates: self.updates,
        }
    }

    fn refresh_primary(&mut self, touched: Modality) {
        let intensity = self.foci.get(&touched).map_or(0.0, |f| f.intensity);
        if intensity > PRIMARY_THRESHOLD {
            self.primary = Some(touched);
        } else if self.primary == Some(touched) {
            self.primary = None;
        }
    }
}
