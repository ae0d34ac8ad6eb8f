//! Emotional state tracking over the 32-d emotion space.
//!
//! The tracker holds the current intensity of each [`Emotion`]; every update
//! appends a [`MoodSample`] (intensities plus their encoded vector) to a FIFO
//! history store so past moods can be searched by similarity.

use engram_embedding::spaces::{arousal, valence};
use engram_embedding::{EmbeddingVector, Emotion, Neighbor, VectorEncoder, emotion_encoder};
use engram_memory::store::{BoundedItemStore, StoreStatus};
use engram_types::{Clock, EngramError, EvictionPolicy, Item, Payload, StoreConfig, clamp_unit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodSample {
    pub intensities: BTreeMap<Emotion, f32>,
    pub vector: EmbeddingVector,
    pub valence: f32,
    pub arousal: f32,
}

impl Payload for MoodSample {
    fn score_field(&self, field: &str) -> Option<f64> {
        match field {
            "valence" => Some(f64::from(self.valence)),
            "arousal" => Some(f64::from(self.arousal)),
            _ => None,
        }
    }
}

/// Serializable form of the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionState {
    pub intensities: BTreeMap<Emotion, f32>,
    pub history: Vec<Item<MoodSample>>,
}

#[derive(Debug)]
pub struct EmotionTracker {
    intensities: BTreeMap<Emotion, f32>,
    encoder: VectorEncoder,
    history: BoundedItemStore<MoodSample>,
}

impl EmotionTracker {
    pub fn default_history_config() -> StoreConfig {
        StoreConfig::new("mood-history", 100, EvictionPolicy::Fifo)
    }

    pub fn new(history_config: StoreConfig, seed: u64, clock: Arc<dyn Clock>) -> Result<Self, EngramError> {
        Ok(Self {
            intensities: Emotion::baseline_intensities(),
            encoder: emotion_encoder(seed)?,
            history: BoundedItemStore::new(history_config, clock)?,
        })
    }

    /// Set one emotion's intensity (clamped to `[0, 1]`) and record the mood.
    pub fn update(&mut self, emotion: Emotion, intensity: f32) -> MoodSample {
        let intensity = clamp_unit(f64::from(intensity)) as f32;
        self.intensities.insert(emotion, intensity);
        let sample = self.sample();
        debug!(%emotion, intensity, valence = sample.valence, arousal = sample.arousal, "emotion updated");
        let item = Item::with_generated_id(sample.clone(), 1.0, 1.0, self.history.now());
        self.history.put(item);
        sample
    }

    pub fn intensity(&self, emotion: Emotion) -> f32 {
        self.intensities.get(&emotion).copied().unwrap_or(0.0)
    }

    pub fn intensities(&self) -> &BTreeMap<Emotion, f32> {
        &self.intensities
    }

    pub fn valence(&self) -> f32 {
        valence(&self.intensities)
    }

    pub fn arousal(&self) -> f32 {
        arousal(&self.intensities)
    }

    /// Strongest current emotion; ties go to the first in [`Emotion::ALL`].
    pub fn dominant(&self) -> Emotion {
        Emotion::ALL
            .into_iter()
            .fold(Emotion::Joy, |best, e| if self.intensity(e) > self.intensity(best) { e } else { best })
    }

    pub fn vector(&self) -> EmbeddingVector {
        self.encoder
            .encode(self.intensities.iter().map(|(e, v)| (e.as_str(), *v)))
    }

    pub fn decode(&self, vector: &EmbeddingVector) -> Result<BTreeMap<String, f32>, EngramError> {
        self.encoder.decode(vector)
    }

    /// Past moods most similar to the current one.
    pub fn similar_moods(&self, k: usize) -> Result<Vec<Neighbor>, EngramError> {
        let query = self.vector();
        let items = self.history.items();
        self.encoder
            .nearest(&query, items.iter().map(|i| (i.id.as_str(), &i.content.vector)), k)
    }

    pub fn history(&self) -> Vec<&Item<MoodSample>> {
        self.history.items()
    }

    pub fn export(&self) -> EmotionState {
        EmotionState {
            intensities: self.intensities.clone(),
            history: self.history.export(),
        }
    }

    pub fn restore(&mut self, state: EmotionState) -> Result<(), EngramError> {
        let dimension = self.encoder.dimension();
        if let Some(bad) = state.history.iter().find(|i| i.content.vector.dimension() != dimension) {
            return Err(EngramError::DimensionMismatch {
                expected: dimension,
                found: bad.content.vector.dimension(),
            });
        }
        self.history.restore(state.history)?;
        self.intensities = Emotion::baseline_intensities();
        for (e, v) in state.intensities {
            self.intensities.insert(e, clamp_unit(f64::from(v)) as f32);
        }
        Ok(())
    }

    pub fn status(&self) -> StoreStatus {
        self.history.status()
    }

    fn sample(&self) -> MoodSample {
        MoodSample {
            intensities: self.intensities.clone(),
            vector: self.vector(),
            valence: self.valence(),
            arousal: self.arousal(),
        }
    }
}
