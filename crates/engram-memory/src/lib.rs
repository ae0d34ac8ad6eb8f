//! `engram-memory` – bounded stores and the tiers built on them.
//!
//! - [`store`] – [`BoundedItemStore`](store::BoundedItemStore), the generic
//!   capacity-limited store with eviction and lazy decay.
//! - [`pipeline`] – one promotion hop between two stores.
//! - [`frames`] – per-cycle context frames with events and decisions.
//! - [`experience`] – episodic long-term store.
//! - [`knowledge`] – semantic long-term store (facts, concepts, relations).
//! - [`topics`] – embedded topic context with focus history.
//! - [`archive`] – snapshot archive with rollback and comparison.
//! - [`vault`] – SQLite persistence for archived snapshots.

pub mod archive;
pub mod experience;
pub mod frames;
pub mod knowledge;
pub mod pipeline;
pub mod store;
pub mod topics;
pub mod vault;
