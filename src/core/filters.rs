use chrono::Duration;

use crate::core::region::RegionAffinity;
use crate::core::scoring::{destinations_match, overlap_days};
use crate::models::{PlanId, SearchCriteria, TravelPlanSnapshot, UserId};

/// Check if a candidate plan may be recommended to the owner of `reference`
///
/// Only recruiting plans of other owners that were not already contacted and
/// that can absorb the reference group without overflowing qualify.
#[inline]
pub fn is_recommendable(
    candidate: &TravelPlanSnapshot,
    reference: &TravelPlanSnapshot,
    contacted_plan_ids: &[PlanId],
) -> bool {
    if candidate.owner_id == reference.owner_id {
        return false;
    }

    if !candidate.recruiting {
        return false;
    }

    if contacted_plan_ids.contains(&candidate.id) {
        return false;
    }

    fits_capacity(candidate, reference.current_headcount)
}

/// Whether `joining` more people fit into the candidate's target group size
#[inline]
pub fn fits_capacity(candidate: &TravelPlanSnapshot, joining: u32) -> bool {
    candidate.current_headcount.saturating_add(joining) <= candidate.target_size
}

/// Check if a plan satisfies explicit search criteria
#[inline]
pub fn matches_search_criteria(
    plan: &TravelPlanSnapshot,
    criteria: &SearchCriteria,
    searcher_id: UserId,
    regions: &RegionAffinity,
) -> bool {
    if plan.owner_id == searcher_id || !plan.recruiting {
        return false;
    }

    if !destinations_match(&plan.destination, &criteria.destination)
        && !regions.same_region(&plan.destination, &criteria.destination)
    {
        return false;
    }

    let flex = Duration::days(criteria.date_flex_days as i64);
    let window_start = criteria.start_date - flex;
    let window_end = criteria.end_date + flex;
    if overlap_days(plan.start_date, plan.end_date, window_start, window_end) == 0 {
        return false;
    }

    if let Some(max) = criteria.max_group_size {
        if plan.target_size > max {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    fn create_test_plan(destination: &str, current: u32, target: u32) -> TravelPlanSnapshot {
        TravelPlanSnapshot {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            destination: destination.to_string(),
            start_date: date(6, 1),
            end_date: date(6, 5),
            target_size: target,
            current_headcount: current,
            recruiting: current < target,
            style_tags: None,
            description: None,
            created_at: Utc::now(),
            version: 0,
        }
    }

    fn criteria(destination: &str) -> SearchCriteria {
        SearchCriteria {
            destination: destination.to_string(),
            start_date: date(6, 10),
            end_date: date(6, 12),
            style_tags: vec![],
            date_flex_days: 0,
            max_group_size: None,
            page: 0,
            size: 20,
        }
    }

    #[test]
    fn test_capacity_precheck() {
        let reference = create_test_plan("Seoul", 2, 2);
        let roomy = create_test_plan("Seoul", 1, 4);
        let tight = create_test_plan("Seoul", 3, 4);

        assert!(is_recommendable(&roomy, &reference, &[]));
        assert!(!is_recommendable(&tight, &reference, &[]));
    }

    #[test]
    fn test_contacted_and_closed_plans_excluded() {
        let reference = create_test_plan("Seoul", 1, 2);
        let candidate = create_test_plan("Seoul", 1, 4);
        assert!(!is_recommendable(&candidate, &reference, &[candidate.id]));

        let mut closed = create_test_plan("Seoul", 1, 4);
        closed.recruiting = false;
        assert!(!is_recommendable(&closed, &reference, &[]));
    }

    #[test]
    fn test_own_plans_excluded() {
        let reference = create_test_plan("Seoul", 1, 2);
        let mut mine = create_test_plan("Seoul", 1, 4);
        mine.owner_id = reference.owner_id;
        assert!(!is_recommendable(&mine, &reference, &[]));
    }

    #[test]
    fn test_search_date_flex_window() {
        let plan = create_test_plan("Seoul", 1, 4);
        let regions = RegionAffinity::global();
        let searcher = Uuid::new_v4();

        let strict = criteria("seoul");
        assert!(!matches_search_criteria(&plan, &strict, searcher, regions));

        let flexible = SearchCriteria {
            date_flex_days: 5,
            ..criteria("seoul")
        };
        assert!(matches_search_criteria(&plan, &flexible, searcher, regions));
    }

    #[test]
    fn test_search_region_and_group_limits() {
        let plan = create_test_plan("Incheon", 1, 6);
        let regions = RegionAffinity::global();
        let searcher = Uuid::new_v4();

        let wide = SearchCriteria {
            start_date: date(6, 1),
            end_date: date(6, 3),
            ..criteria("Seoul")
        };
        assert!(matches_search_criteria(&plan, &wide, searcher, regions));

        let small_groups = SearchCriteria {
            max_group_size: Some(4),
            ..wide.clone()
        };
        assert!(!matches_search_criteria(&plan, &small_groups, searcher, regions));
    }
}
