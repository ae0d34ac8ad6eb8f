//! `engram-embedding` – fixed-dimension vectors and similarity search.
//!
//! - [`vector`] – [`EmbeddingVector`] and cosine similarity.
//! - [`encoder`] – [`VectorEncoder`]: label-weight maps → unit vectors over a
//!   seeded, per-space basis, plus decode / nearest / cluster.
//! - [`spaces`] – the two preset spaces used by the engine: emotions (32-d)
//!   and topics (64-d).

pub mod encoder;
pub mod spaces;
pub mod vector;

pub use encoder::{Neighbor, VectorEncoder, Vocabulary};
pub use spaces::{Emotion, emotion_encoder, topic_encoder};
pub use vector::{EmbeddingVector, cosine_similarity};
