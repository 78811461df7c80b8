//! Headless flood map dashboard.
//!
//! Wires the REST loader, the push channel and the local report log into a
//! single [`store::MapStore`] that the render layer queries for clusters.

pub mod app;
pub mod config;
pub mod store;
