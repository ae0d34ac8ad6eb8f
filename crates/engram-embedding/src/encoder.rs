//! Seeded encoder mapping label weights onto a fixed-dimension space.
//!
//! Each label owns a unit basis vector derived from the space seed and the
//! label itself, so two encoders built with the same `(seed, dimension)`
//! produce bit-identical output while differently seeded spaces never share a
//! basis.
//!
//! ```text
//!  {"joy": 0.8, "trust": 0.4} ──encode──► Σ wᵢ·basis(labelᵢ) ──normalise──► v̂
//!  v̂ ──decode──► { label: clamp(v̂·basis(label), 0, 1) / Σ }
//! ```

use crate::vector::{EmbeddingVector, cosine_similarity};
use engram_types::EngramError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Which labels an encoder accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vocabulary {
    /// A fixed label set; unknown labels are ignored by `encode`.
    Closed(BTreeSet<String>),
    /// Any label; bases are derived on demand.
    Open,
}

/// One result of a nearest-neighbour search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: String,
    pub similarity: f32,
}

/// Encoder for a single named vector space.
#[derive(Debug, Clone)]
pub struct VectorEncoder {
    space: String,
    dimension: usize,
    seed: u64,
    vocabulary: Vocabulary,
    basis: BTreeMap<String, EmbeddingVector>,
}

impl VectorEncoder {
    /// Encoder over a fixed label set.
    pub fn closed<I, S>(
        space: impl Into<String>,
        dimension: usize,
        seed: u64,
        labels: I,
    ) -> Result<Self, EngramError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: BTreeSet<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(EngramError::InvalidConfiguration(
                "closed vocabulary needs at least one label".into(),
            ));
        }
        let mut encoder = Self::build(space.into(), dimension, seed, Vocabulary::Closed(labels.clone()))?;
        for label in labels {
            let v = derive_basis(seed, &label, dimension);
            encoder.basis.insert(label, v);
        }
        Ok(encoder)
    }

    /// Encoder accepting any label.
    pub fn open(space: impl Into<String>, dimension: usize, seed: u64) -> Result<Self, EngramError> {
        Self::build(space.into(), dimension, seed, Vocabulary::Open)
    }

    fn build(
        space: String,
        dimension: usize,
        seed: u64,
        vocabulary: Vocabulary,
    ) -> Result<Self, EngramError> {
        if dimension == 0 {
            return Err(EngramError::InvalidConfiguration(format!(
                "space '{space}': dimension must be greater than zero"
            )));
        }
        debug!(space = %space, dimension, seed, "vector encoder ready");
        Ok(Self {
            space,
            dimension,
            seed,
            vocabulary,
            basis: BTreeMap::new(),
        })
    }

    pub fn space(&self) -> &str {
        &self.space
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// The unit basis vector for `label`, or `None` when a closed vocabulary
    /// does not contain it.
    pub fn basis_vector(&self, label: &str) -> Option<EmbeddingVector> {
        match &self.vocabulary {
            Vocabulary::Closed(_) => self.basis.get(label).cloned(),
            Vocabulary::Open => Some(derive_basis(self.seed, label, self.dimension)),
        }
    }

    /// Encode a label→weight map into a unit vector.
    ///
    /// Repeated labels accumulate. Unknown labels (closed vocabulary) and
    /// non-finite weights are ignored. An input with no usable weight yields
    /// the zero vector.
    pub fn encode<I, K>(&self, weights: I) -> EmbeddingVector
    where
        I: IntoIterator<Item = (K, f32)>,
        K: AsRef<str>,
    {
        let mut merged: BTreeMap<String, f64> = BTreeMap::new();
        for (label, w) in weights {
            if w.is_finite() {
                *merged.entry(label.as_ref().to_string()).or_insert(0.0) += f64::from(w);
            }
        }

        let mut acc = vec![0.0f64; self.dimension];
        for (label, w) in &merged {
            let Some(basis) = self.basis_vector(label) else {
                continue;
            };
            for (slot, &b) in acc.iter_mut().zip(basis.as_slice()) {
                *slot += w * f64::from(b);
            }
        }

        let norm = acc.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return EmbeddingVector::zeros(self.dimension);
        }
        EmbeddingVector::new(acc.iter().map(|x| (x / norm) as f32).collect())
    }

    /// Decode against the closed vocabulary.
    ///
    /// Open vocabularies have no implicit label set; use
    /// [`decode_against`](Self::decode_against) for those.
    pub fn decode(&self, vector: &EmbeddingVector) -> Result<BTreeMap<String, f32>, EngramError> {
        match &self.vocabulary {
            Vocabulary::Closed(labels) => self.decode_against(vector, labels.iter()),
            Vocabulary::Open => Err(EngramError::InvalidConfiguration(format!(
                "space '{}' has an open vocabulary; decode against explicit labels",
                self.space
            ))),
        }
    }

    /// Per-label scores: `clamp(v̂·basis, 0, 1)`, normalised to sum to 1 when
    /// any score is positive.
    pub fn decode_against<I, S>(
        &self,
        vector: &EmbeddingVector,
        labels: I,
    ) -> Result<BTreeMap<String, f32>, EngramError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.check_dimension(vector)?;
        let unit = vector.normalized();
        let mut scores = BTreeMap::new();
        for label in labels {
            let label = label.as_ref();
            let Some(basis) = self.basis_vector(label) else {
                continue;
            };
            let dot: f64 = unit
                .as_slice()
                .iter()
                .zip(basis.as_slice())
                .map(|(&a, &b)| f64::from(a) * f64::from(b))
                .sum();
            scores.insert(label.to_string(), dot.clamp(0.0, 1.0));
        }
        let total: f64 = scores.values().sum();
        Ok(scores
            .into_iter()
            .map(|(k, s)| {
                let v = if total > 0.0 { s / total } else { 0.0 };
                (k, v as f32)
            })
            .collect())
    }

    /// Cosine similarity of two vectors in this space.
    pub fn similarity(&self, a: &EmbeddingVector, b: &EmbeddingVector) -> Result<f32, EngramError> {
        self.check_dimension(a)?;
        self.check_dimension(b)?;
        Ok(cosine_similarity(a.as_slice(), b.as_slice()))
    }

    /// Top-`k` candidates by similarity to `query`.
    ///
    /// Ordered by similarity descending, ties broken by id ascending.
    pub fn nearest<'a, I>(
        &self,
        query: &EmbeddingVector,
        candidates: I,
        k: usize,
    ) -> Result<Vec<Neighbor>, EngramError>
    where
        I: IntoIterator<Item = (&'a str, &'a EmbeddingVector)>,
    {
        self.check_dimension(query)?;
        let mut scored = Vec::new();
        for (id, v) in candidates {
            self.check_dimension(v)?;
            scored.push(Neighbor {
                id: id.to_string(),
                similarity: cosine_similarity(query.as_slice(), v.as_slice()),
            });
        }
        scored.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Greedy single-pass clustering.
    ///
    /// Candidates are visited in id order; each joins the first cluster whose
    /// running-mean centroid is at least `threshold` similar, otherwise it
    /// starts a new cluster.
    pub fn cluster<'a, I>(&self, candidates: I, threshold: f32) -> Result<Vec<BTreeSet<String>>, EngramError>
    where
        I: IntoIterator<Item = (&'a str, &'a EmbeddingVector)>,
    {
        let mut ordered: Vec<(&str, &EmbeddingVector)> = candidates.into_iter().collect();
        for (_, v) in &ordered {
            self.check_dimension(v)?;
        }
        ordered.sort_by(|a, b| a.0.cmp(b.0));

        struct Cluster {
            members: BTreeSet<String>,
            centroid: Vec<f64>,
        }

        let mut clusters: Vec<Cluster> = Vec::new();
        for (id, v) in ordered {
            let home = clusters.iter_mut().find(|c| {
                let centroid: Vec<f32> = c.centroid.iter().map(|&x| x as f32).collect();
                cosine_similarity(&centroid, v.as_slice()) >= threshold
            });
            match home {
                Some(c) => {
                    c.members.insert(id.to_string());
                    let n = c.members.len() as f64;
                    for (slot, &x) in c.centroid.iter_mut().zip(v.as_slice()) {
                        *slot += (f64::from(x) - *slot) / n;
                    }
                }
                None => clusters.push(Cluster {
                    members: BTreeSet::from([id.to_string()]),
                    centroid: v.as_slice().iter().map(|&x| f64::from(x)).collect(),
                }),
            }
        }
        Ok(clusters.into_iter().map(|c| c.members).collect())
    }

    fn check_dimension(&self, v: &EmbeddingVector) -> Result<(), EngramError> {
        if v.dimension() != self.dimension {
            return Err(EngramError::DimensionMismatch {
                expected: self.dimension,
                found: v.dimension(),
            });
        }
        Ok(())
    }
}

/// 64-bit FNV-1a; mixes a label into the space seed.
fn fnv1a(label: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    label
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

fn derive_basis(seed: u64, label: &str, dimension: usize) -> EmbeddingVector {
    let mut rng = ChaCha20Rng::seed_from_u64(seed ^ fnv1a(label));
    let raw: Vec<f32> = (0..dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    EmbeddingVector::new(raw).normalized()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colours(seed: u64) -> VectorEncoder {
        VectorEncoder::closed("colour", 16, seed, ["red", "green", "blue"]).unwrap()
    }

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(VectorEncoder::open("x", 0, 1).is_err());
    }

    #[test]
    fn empty_closed_vocabulary_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(VectorEncoder::closed("x", 8, 1, empty).is_err());
    }

    // ── Encode ────────────────────────────────────────────────────────────────

    #[test]
    fn encode_is_deterministic_across_instances() {
        let a = colours(7).encode([("red", 0.8f32), ("blue", 0.2)]);
        let b = colours(7).encode([("blue", 0.2f32), ("red", 0.8)]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_give_different_bases() {
        let a = colours(1).basis_vector("red").unwrap();
        let b = colours(2).basis_vector("red").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn encode_produces_unit_vector() {
        let v = colours(3).encode([("green", 2.5f32)]);
        assert!((v.norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn encode_of_nothing_is_zero_vector() {
        let enc = colours(3);
        assert!(enc.encode(Vec::<(&str, f32)>::new()).is_zero());
        assert!(enc.encode([("purple", 1.0f32)]).is_zero());
        assert!(enc.encode([("red", 0.0f32)]).is_zero());
    }

    #[test]
    fn open_vocabulary_accepts_any_label() {
        let enc = VectorEncoder::open("topic", 32, 9).unwrap();
        let v = enc.encode([("weather", 1.0f32)]);
        assert!(!v.is_zero());
        assert_eq!(v, enc.encode([("weather", 1.0f32)]));
    }

    // ── Decode ────────────────────────────────────────────────────────────────

    #[test]
    fn decode_recovers_dominant_label() {
        let enc = colours(11);
        let v = enc.encode([("blue", 1.0f32)]);
        let scores = enc.decode(&v).unwrap();
        let (best, _) = scores
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(best, "blue");
        let total: f32 = scores.values().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn decode_rejects_wrong_dimension() {
        let enc = colours(11);
        let v = EmbeddingVector::new(vec![1.0; 8]);
        assert!(matches!(
            enc.decode(&v),
            Err(EngramError::DimensionMismatch { expected: 16, found: 8 })
        ));
    }

    #[test]
    fn decode_on_open_vocabulary_needs_labels() {
        let enc = VectorEncoder::open("topic", 8, 1).unwrap();
        let v = enc.encode([("a", 1.0f32)]);
        assert!(enc.decode(&v).is_err());
        let scores = enc.decode_against(&v, ["a", "b"]).unwrap();
        assert!(scores["a"] > scores["b"]);
    }

    // ── Nearest / cluster ─────────────────────────────────────────────────────

    #[test]
    fn nearest_orders_by_similarity_then_id() {
        let enc = colours(5);
        let red = enc.encode([("red", 1.0f32)]);
        let blue = enc.encode([("blue", 1.0f32)]);
        let candidates = vec![
            ("z-red".to_string(), red.clone()),
            ("a-red".to_string(), red.clone()),
            ("blue".to_string(), blue),
        ];
        let hits = enc
            .nearest(&red, candidates.iter().map(|(id, v)| (id.as_str(), v)), 2)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a-red");
        assert_eq!(hits[1].id, "z-red");
        assert_eq!(hits[0].similarity, 1.0);
    }

    #[test]
    fn nearest_rejects_mismatched_candidate() {
        let enc = colours(5);
        let q = enc.encode([("red", 1.0f32)]);
        let bad = EmbeddingVector::new(vec![1.0; 4]);
        assert!(enc.nearest(&q, [("bad", &bad)], 1).is_err());
    }

    #[test]
    fn cluster_groups_identical_vectors() {
        let enc = colours(5);
        let red = enc.encode([("red", 1.0f32)]);
        let green = enc.encode([("green", 1.0f32)]);
        let items = vec![
            ("r1".to_string(), red.clone()),
            ("g1".to_string(), green.clone()),
            ("r2".to_string(), red),
            ("g2".to_string(), green),
        ];
        let clusters = enc
            .cluster(items.iter().map(|(id, v)| (id.as_str(), v)), 0.99)
            .unwrap();
        assert_eq!(clusters.len(), 2);
        assert!(clusters.contains(&BTreeSet::from(["r1".to_string(), "r2".to_string()])));
        assert!(clusters.contains(&BTreeSet::from(["g1".to_string(), "g2".to_string()])));
    }
}
