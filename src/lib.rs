//! TravelMate matching engine
//!
//! Scores travel plans against each other, recommends compatible plans and
//! runs the match request lifecycle, keeping plan headcounts consistent as
//! matches are accepted and cancelled.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{CapacityLedger, CompatibilityScorer, MatchingEngine, MatchingOptions, RegionAffinity};
pub use error::MatchError;
pub use models::{
    CompatibilityScore, MatchRequest, MatchStatistics, MatchStatus, ScoredPlan, ScoringWeights,
    TravelPlanSnapshot,
};
