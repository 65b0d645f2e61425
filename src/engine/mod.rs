//! Pipeline engine.
//!
//! Two long-running tasks connected by the notification bus: the poller
//! detects and records new assets, the evaluator enriches them and runs
//! the strategy engine. The enricher is the shared feature-computation
//! stage the evaluator calls per asset.

pub mod enricher;
pub mod evaluator;
pub mod poller;

pub use enricher::Enricher;
pub use evaluator::{EvalOutcome, Evaluator};
pub use poller::{CycleSummary, Poller};

/// Atomic units per whole base asset (9 decimals).
pub(crate) const BASE_UNIT: f64 = 1_000_000_000.0;
