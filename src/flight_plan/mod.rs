//! Flight-plan store: scheduled commands indexed by execution time.

pub mod engine;
pub mod entry;
pub mod tlb;

pub use engine::FlightPlanEngine;
pub use entry::{FlightPlanEntry, FP_NULL};
