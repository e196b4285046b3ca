//! Relationship-graph ranking engine.
//!
//! Converts co-presence observations into a rooted, ranked hierarchy:
//! the presence aggregator accumulates dilution-weighted pairwise time,
//! weight fusion turns raw activity into comparable scores, a minimum
//! spanning forest captures the strongest relationship structure, the
//! rollup roots and scores the forest, and the rank assigner and promotion
//! monitor discretize the result.

pub mod clock;
pub mod engine;
pub mod fusion;
pub mod presence;
pub mod promotion;
pub mod rank;
pub mod rollup;
pub mod spanning;
