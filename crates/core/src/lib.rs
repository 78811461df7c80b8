//! Domain logic for the FloodWatch map pipeline.
//!
//! Runtime-agnostic building blocks: the canonical [`types::FloodPoint`]
//! shape, the point normalizer, the stream reconciler, the hierarchical
//! clusterer and static flood-zone reference data. [`local_log`] is the only
//! module that touches the filesystem.

pub mod cluster;
pub mod error;
pub mod local_log;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod seed;
pub mod types;
pub mod zones;
