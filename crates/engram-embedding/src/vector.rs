//! Dense embedding vectors.

use engram_types::EngramError;
use serde::{Deserialize, Serialize};

/// A fixed-dimension vector of `f32` components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingVector {
    values: Vec<f32>,
}

impl EmbeddingVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn zeros(dimension: usize) -> Self {
        Self { values: vec![0.0; dimension] }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.values
    }

    pub fn norm(&self) -> f64 {
        self.values
            .iter()
            .map(|&x| f64::from(x) * f64::from(x))
            .sum::<f64>()
            .sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&x| x == 0.0)
    }

    /// Unit-length copy; the zero vector stays zero.
    pub fn normalized(&self) -> Self {
        let norm = self.norm();
        if norm == 0.0 || !norm.is_finite() {
            return Self::zeros(self.dimension());
        }
        Self {
            values: self
                .values
                .iter()
                .map(|&x| (f64::from(x) / norm) as f32)
                .collect(),
        }
    }

    /// Cosine similarity against `other`, failing on a dimension mismatch.
    pub fn similarity(&self, other: &EmbeddingVector) -> Result<f32, EngramError> {
        if self.dimension() != other.dimension() {
            return Err(EngramError::DimensionMismatch {
                expected: self.dimension(),
                found: other.dimension(),
            });
        }
        Ok(cosine_similarity(&self.values, &other.values))
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Compute the cosine similarity between two equal-length slices.
///
/// Returns a value in `[-1, 1]`; `0.0` when either side is the zero vector.
/// Identical non-zero inputs yield exactly `1.0`. Accumulation happens in
/// `f64` so long vectors do not drift outside the range.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f64 = a.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(&x, &y)| f64::from(x) * f64::from(y)).sum();
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors_is_exactly_one() {
        let v = vec![0.3f32, -1.7, 2.9, 0.0001];
        assert_eq!(cosine_similarity(&v, &v), 1.0);
    }

    #[test]
    fn cosine_orthogonal_vectors_is_zero() {
        let a = vec![1.0f32, 0.0, 0.0];
        let b = vec![0.0f32, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors_is_minus_one() {
        let a = vec![1.0f32, 0.0];
        let b = vec![-1.0f32, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        let a = vec![0.0f32; 3];
        let b = vec![1.0f32, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert_eq!(cosine_similarity(&a, &a), 0.0);
    }

    #[test]
    fn similarity_rejects_dimension_mismatch() {
        let a = EmbeddingVector::new(vec![1.0; 32]);
        let b = EmbeddingVector::new(vec![1.0; 64]);
        assert_eq!(
            a.similarity(&b),
            Err(EngramError::DimensionMismatch { expected: 32, found: 64 })
        );
    }

    #[test]
    fn normalized_has_unit_norm() {
        let v = EmbeddingVector::new(vec![3.0, 4.0]);
        let n = v.normalized();
        assert!((n.norm() - 1.0).abs() < 1e-6);
        assert!(EmbeddingVector::zeros(4).normalized().is_zero());
    }
}
