//! REST side of the flood backend.
//!
//! Typed endpoint wrappers ([`client::FloodApi`]), response mapping
//! ([`models`]) and the dashboard loader with per-field failure isolation
//! ([`dashboard::load_dashboard`]).

pub mod client;
pub mod dashboard;
pub mod models;
