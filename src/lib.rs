//! MINTWATCH: a venue-watching agent for newly listed tokens.
//!
//! The pipeline runs detection, deduplication, enrichment, and strategy
//! evaluation as cooperating async tasks over a shared SQLite store and
//! an in-process notification bus.

pub mod bus;
pub mod config;
pub mod engine;
pub mod license;
pub mod model;
pub mod retry;
pub mod scoring;
pub mod stats;
pub mod store;
pub mod strategy;
pub mod types;
pub mod venue;
