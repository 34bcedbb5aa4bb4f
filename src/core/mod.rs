// Core algorithm exports
pub mod filters;
pub mod ledger;
pub mod lifecycle;
pub mod matcher;
pub mod region;
pub mod scoring;

pub use filters::{fits_capacity, is_recommendable, matches_search_criteria};
pub use ledger::CapacityLedger;
pub use matcher::{MatchingEngine, MatchingOptions};
pub use region::RegionAffinity;
pub use scoring::{destinations_match, overlap_days, shared_style_count, CompatibilityScorer};
