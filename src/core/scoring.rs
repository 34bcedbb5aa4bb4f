use chrono::NaiveDate;

use crate::core::region::RegionAffinity;
use crate::error::MatchError;
use crate::models::{CompatibilityScore, ScoreBreakdown, ScoringWeights, TravelPlanSnapshot};

/// Scores how well a candidate plan fits a reference plan
///
/// Scoring formula (each term independent, total clamped to 100):
///   destination  - full weight on a case-insensitive exact/contains match,
///                  `region_ratio` of it for a same-region match
///   date overlap - overlap days / reference plan duration * weight
///   group size   - tiered on |target size difference|: 0, 1, 2, >2
///   style        - shared style tags, capped at `style_tags_for_full`
///
/// The date term is relative to the reference plan only, so
/// `score(a, b)` and `score(b, a)` generally differ.
#[derive(Debug, Clone)]
pub struct CompatibilityScorer {
    weights: ScoringWeights,
    regions: &'static RegionAffinity,
}

impl CompatibilityScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self {
            weights,
            regions: RegionAffinity::global(),
        }
    }

    pub fn with_regions(weights: ScoringWeights, regions: &'static RegionAffinity) -> Self {
        Self { weights, regions }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score `candidate` against `reference`
    ///
    /// Fails with a validation error if either plan has an inverted date range.
    pub fn score(
        &self,
        reference: &TravelPlanSnapshot,
        candidate: &TravelPlanSnapshot,
    ) -> Result<CompatibilityScore, MatchError> {
        validate_dates(reference)?;
        validate_dates(candidate)?;

        let breakdown = ScoreBreakdown {
            destination: self.destination_term(&reference.destination, &candidate.destination),
            date_overlap: self.date_term(reference, candidate),
            group_size: self.group_size_term(reference.target_size, candidate.target_size),
            style: self.style_term(reference.style_tags(), candidate.style_tags()),
        };

        Ok(CompatibilityScore {
            total: breakdown.sum().min(100),
            breakdown,
        })
    }

    fn destination_term(&self, reference: &str, candidate: &str) -> u32 {
        if destinations_match(reference, candidate) {
            self.weights.destination
        } else if self.regions.same_region(reference, candidate) {
            (self.weights.destination as f64 * self.weights.region_ratio).floor() as u32
        } else {
            0
        }
    }

    fn date_term(&self, reference: &TravelPlanSnapshot, candidate: &TravelPlanSnapshot) -> u32 {
        let overlap = overlap_days(
            reference.start_date,
            reference.end_date,
            candidate.start_date,
            candidate.end_date,
        );
        if overlap == 0 {
            return 0;
        }

        let reference_days = match reference.duration_days() {
            Some(days) if days > 0 => days,
            _ => return 0,
        };

        let overlap = overlap.min(reference_days);
        (overlap * self.weights.date_overlap as i64 / reference_days) as u32
    }

    fn group_size_term(&self, reference: u32, candidate: u32) -> u32 {
        let percent = match reference.abs_diff(candidate) {
            0 => 100,
            1 => 60,
            2 => 30,
            _ => 0,
        };
        self.weights.group_size * percent / 100
    }

    fn style_term(&self, reference: &[String], candidate: &[String]) -> u32 {
        let shared = shared_style_count(reference, candidate);
        if shared == 0 {
            return 0;
        }

        let full_at = self.weights.style_tags_for_full.max(1);
        shared.min(full_at) * self.weights.style / full_at
    }
}

impl Default for CompatibilityScorer {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

/// Inclusive number of days two date ranges share, never negative
pub fn overlap_days(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> i64 {
    let start = a_start.max(b_start);
    let end = a_end.min(b_end);
    ((end - start).num_days() + 1).max(0)
}

/// Case-insensitive exact or contains match, in either direction
pub fn destinations_match(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

/// Number of distinct tags present in both sets
pub fn shared_style_count(a: &[String], b: &[String]) -> u32 {
    let mut shared: Vec<&String> = a.iter().filter(|tag| b.contains(tag)).collect();
    shared.sort();
    shared.dedup();
    shared.len() as u32
}

fn validate_dates(plan: &TravelPlanSnapshot) -> Result<(), MatchError> {
    if plan.start_date > plan.end_date {
        return Err(MatchError::Validation(format!(
            "plan {} ends ({}) before it starts ({})",
            plan.id, plan.end_date, plan.start_date
        )));
    }
    Ok(())
}
