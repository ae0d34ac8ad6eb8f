//! Preset vector spaces used by the engine.
//!
//! | Space   | Dimension | Vocabulary                     | Default seed |
//! |---------|-----------|--------------------------------|--------------|
//! | emotion | 32        | the eight [`Emotion`]s         | 42           |
//! | topic   | 64        | open (topic feature labels)    | 1337         |

use crate::encoder::VectorEncoder;
use engram_types::EngramError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const EMOTION_DIMENSION: usize = 32;
pub const EMOTION_SEED: u64 = 42;
pub const TOPIC_DIMENSION: usize = 64;
pub const TOPIC_SEED: u64 = 1337;

/// The eight tracked emotions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Trust,
    Disgust,
    Surprise,
    Anticipation,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Trust,
        Emotion::Disgust,
        Emotion::Surprise,
        Emotion::Anticipation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Trust => "trust",
            Emotion::Disgust => "disgust",
            Emotion::Surprise => "surprise",
            Emotion::Anticipation => "anticipation",
        }
    }

    /// Resting intensity before any update.
    pub fn baseline(self) -> f32 {
        match self {
            Emotion::Joy => 0.5,
            Emotion::Sadness => 0.3,
            Emotion::Anger => 0.2,
            Emotion::Fear => 0.3,
            Emotion::Trust => 0.6,
            Emotion::Disgust => 0.2,
            Emotion::Surprise => 0.4,
            Emotion::Anticipation => 0.5,
        }
    }

    pub fn baseline_intensities() -> BTreeMap<Emotion, f32> {
        Emotion::ALL.into_iter().map(|e| (e, e.baseline())).collect()
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EngramError::InvalidConfiguration(format!("unknown emotion '{s}'")))
    }
}

/// `mean(joy, trust) − mean(sadness, anger, fear, disgust)`.
pub fn valence(intensities: &BTreeMap<Emotion, f32>) -> f32 {
    let get = |e: Emotion| intensities.get(&e).copied().unwrap_or(0.0);
    let positive = (get(Emotion::Joy) + get(Emotion::Trust)) / 2.0;
    let negative = (get(Emotion::Sadness) + get(Emotion::Anger) + get(Emotion::Fear) + get(Emotion::Disgust)) / 4.0;
    positive - negative
}

/// `mean(joy, anger, fear, surprise)`.
pub fn arousal(intensities: &BTreeMap<Emotion, f32>) -> f32 {
    let get = |e: Emotion| intensities.get(&e).copied().unwrap_or(0.0);
    (get(Emotion::Joy) + get(Emotion::Anger) + get(Emotion::Fear) + get(Emotion::Surprise)) / 4.0
}

/// Closed 32-d encoder over the eight emotions.
pub fn emotion_encoder(seed: u64) -> Result<VectorEncoder, EngramError> {
    VectorEncoder::closed(
        "emotion",
        EMOTION_DIMENSION,
        seed,
        Emotion::ALL.iter().map(|e| e.as_str()),
    )
}

/// Open 64-d encoder over topic feature labels.
pub fn topic_encoder(seed: u64) -> Result<VectorEncoder, EngramError> {
    VectorEncoder::open("topic", TOPIC_DIMENSION, seed)
}
