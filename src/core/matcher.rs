use chrono::Utc;
use std::future::Future;
use std::sync::Arc;

use crate::core::filters::{fits_capacity, is_recommendable, matches_search_criteria};
use crate::core::ledger::CapacityLedger;
use crate::core::lifecycle;
use crate::core::region::RegionAffinity;
use crate::core::scoring::CompatibilityScorer;
use crate::error::MatchError;
use crate::models::{
    ActiveMatch, MatchRequest, MatchStatistics, MatchStatus, NewMatchRequest, NotificationKind,
    PlanId, RequestId, ScoredPlan, SearchCriteria, SearchPage, TravelPlanSnapshot, UserId,
};
use crate::services::store::{
    MatchRequestStore, NotificationSink, PlanStore, Transition, UserDirectory,
};

/// Tunables for recommendation and request handling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingOptions {
    /// Candidates scoring below this are never recommended
    pub min_score: u32,
    pub max_results: usize,
    /// Maximum length of a request message, in characters
    pub message_max_len: usize,
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self {
            min_score: 50,
            max_results: 50,
            message_max_len: 500,
        }
    }
}

/// Orchestrates recommendations and the match request lifecycle
///
/// # Pipeline Stages (recommend)
/// 1. Resolve the caller's latest plan
/// 2. Drop own, closed, already-contacted and overflowing plans
/// 3. Score against the caller's plan
/// 4. Threshold, rank and truncate
///
/// Status transitions that touch plan capacity are committed together with
/// the plan rows; a concurrent modification is retried once.
pub struct MatchingEngine {
    plans: Arc<dyn PlanStore>,
    requests: Arc<dyn MatchRequestStore>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn NotificationSink>,
    scorer: CompatibilityScorer,
    options: MatchingOptions,
}

impl MatchingEngine {
    pub fn new(
        plans: Arc<dyn PlanStore>,
        requests: Arc<dyn MatchRequestStore>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            plans,
            requests,
            users,
            notifier,
            scorer: CompatibilityScorer::default(),
            options: MatchingOptions::default(),
        }
    }

    pub fn with_scorer(mut self, scorer: CompatibilityScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_options(mut self, options: MatchingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &MatchingOptions {
        &self.options
    }

    /// Recommend plans for the owner of `user_id`'s latest plan
    pub async fn recommend(&self, user_id: UserId) -> Result<Vec<ScoredPlan>, MatchError> {
        let reference = self
            .plans
            .latest_plan_for(user_id)
            .await?
            .ok_or(MatchError::NoActivePlan(user_id))?;

        let candidates = self.plans.list_plans_excluding_user(user_id).await?;
        let contacted = self.requests.contacted_plan_ids(user_id).await?;
        let total_candidates = candidates.len();

        let ranked = self.rank(&reference, candidates, &contacted)?;

        tracing::debug!(
            "Recommended {} of {} plans for user {}",
            ranked.len(),
            total_candidates,
            user_id
        );

        Ok(ranked)
    }

    /// Filter, score and order candidates against a reference plan
    ///
    /// Candidates with an inverted date range are skipped; an inverted
    /// reference fails the whole call.
    pub fn rank(
        &self,
        reference: &TravelPlanSnapshot,
        candidates: Vec<TravelPlanSnapshot>,
        contacted_plan_ids: &[PlanId],
    ) -> Result<Vec<ScoredPlan>, MatchError> {
        if reference.duration_days().is_none() {
            return Err(MatchError::Validation(format!(
                "plan {} ends before it starts",
                reference.id
            )));
        }

        let mut scored: Vec<ScoredPlan> = candidates
            .into_iter()
            .filter(|candidate| is_recommendable(candidate, reference, contacted_plan_ids))
            .filter_map(|candidate| match self.scorer.score(reference, &candidate) {
                Ok(score) => Some(ScoredPlan { candidate, score }),
                Err(e) => {
                    tracing::warn!("Skipping candidate plan {}: {}", candidate.id, e);
                    None
                }
            })
            .filter(|scored| scored.score.total >= self.options.min_score)
            .collect();

        sort_ranked(&mut scored);
        scored.truncate(self.options.max_results);

        Ok(scored)
    }

    /// Criteria-driven partner search, scored like recommendations
    ///
    /// The searcher's latest plan, when there is one, supplies the group size
    /// compared against candidates; there is no score threshold.
    pub async fn search(
        &self,
        user_id: UserId,
        criteria: &SearchCriteria,
    ) -> Result<SearchPage, MatchError> {
        if criteria.start_date > criteria.end_date {
            return Err(MatchError::Validation(
                "search end date is before start date".to_string(),
            ));
        }
        if criteria.size == 0 {
            return Err(MatchError::Validation(
                "page size must be at least 1".to_string(),
            ));
        }

        let own_plan = self.plans.latest_plan_for(user_id).await?;
        let reference = search_reference(user_id, criteria, own_plan.as_ref());
        let regions = RegionAffinity::global();

        let mut scored: Vec<ScoredPlan> = self
            .plans
            .list_plans_excluding_user(user_id)
            .await?
            .into_iter()
            .filter(|plan| matches_search_criteria(plan, criteria, user_id, regions))
            .filter(|plan| fits_capacity(plan, reference.current_headcount))
            .filter_map(|candidate| match self.scorer.score(&reference, &candidate) {
                Ok(score) => Some(ScoredPlan { candidate, score }),
                Err(e) => {
                    tracing::warn!("Skipping candidate plan {}: {}", candidate.id, e);
                    None
                }
            })
            .collect();

        sort_ranked(&mut scored);

        let total = scored.len();
        let items = scored
            .into_iter()
            .skip(criteria.page as usize * criteria.size as usize)
            .take(criteria.size as usize)
            .collect();

        Ok(SearchPage {
            items,
            page: criteria.page,
            size: criteria.size,
            total,
        })
    }

    /// Propose a match to the owner of a plan, or offer one's own plan
    pub async fn send_request(
        &self,
        requester_id: UserId,
        receiver_id: UserId,
        plan_id: PlanId,
        message: Option<String>,
    ) -> Result<MatchRequest, MatchError> {
        if requester_id == receiver_id {
            return Err(MatchError::SelfRequest);
        }

        if self
            .requests
            .find_pending(requester_id, receiver_id)
            .await?
            .is_some()
        {
            return Err(MatchError::DuplicateRequest);
        }

        let requester = self.users.get_user(requester_id).await?;
        self.users.get_user(receiver_id).await?;
        let plan = self.plans.get_plan(plan_id).await?;

        let (requester_plan_id, receiver_plan_id) = if plan.owner_id == receiver_id {
            let own = self.plans.latest_plan_for(requester_id).await?;
            (own.map(|p| p.id), Some(plan.id))
        } else if plan.owner_id == requester_id {
            let theirs = self.plans.latest_plan_for(receiver_id).await?;
            (Some(plan.id), theirs.map(|p| p.id))
        } else {
            return Err(MatchError::Validation(format!(
                "plan {} belongs to neither party",
                plan_id
            )));
        };

        let message = self.normalize_message(message)?;

        let request = self
            .requests
            .insert_request(NewMatchRequest {
                requester_id,
                receiver_id,
                plan_id,
                requester_plan_id,
                receiver_plan_id,
                status: MatchStatus::Pending,
                message,
                created_at: Utc::now(),
                responded_at: None,
            })
            .await?;

        tracing::info!(
            "Match request {} sent from {} to {} about plan {}",
            request.id,
            requester_id,
            receiver_id,
            plan_id
        );

        self.notify(
            receiver_id,
            &requester.display_name,
            format!(
                "{} sent you a match request for {}",
                requester.display_name, plan.destination
            ),
        )
        .await;

        Ok(request)
    }

    /// Accept or reject a pending request as its receiver
    pub async fn respond(
        &self,
        request_id: RequestId,
        responder_id: UserId,
        accept: bool,
    ) -> Result<MatchRequest, MatchError> {
        let request = retry_on_conflict("respond", || {
            self.try_respond(request_id, responder_id, accept)
        })
        .await?;

        tracing::info!("Match request {} is now {}", request.id, request.status);

        let responder = self.display_name(responder_id).await;
        let message = if accept {
            format!("{} accepted your match request", responder)
        } else {
            format!("{} declined your match request", responder)
        };
        self.notify(request.requester_id, &responder, message).await;

        Ok(request)
    }

    async fn try_respond(
        &self,
        request_id: RequestId,
        responder_id: UserId,
        accept: bool,
    ) -> Result<MatchRequest, MatchError> {
        let current = self.requests.get_request(request_id).await?;
        let mut next = lifecycle::respond(&current, responder_id, accept, Utc::now())?;

        let mut plans = Vec::new();
        if accept {
            match (current.requester_plan_id, current.receiver_plan_id) {
                (Some(sender_id), Some(receiver_id)) => {
                    let mut sender = self.plans.get_plan(sender_id).await?;
                    let mut receiver = self.plans.get_plan(receiver_id).await?;
                    next.merge = Some(CapacityLedger::merge(&mut sender, &mut receiver));
                    plans.push(sender);
                    plans.push(receiver);
                }
                _ => tracing::info!(
                    "Match request {} accepted without a plan on both sides, capacity unchanged",
                    request_id
                ),
            }
        }

        Ok(self
            .requests
            .commit(Transition {
                request: next,
                plans,
            })
            .await?)
    }

    /// Withdraw a pending request as its requester
    pub async fn cancel_request(
        &self,
        request_id: RequestId,
        caller_id: UserId,
    ) -> Result<MatchRequest, MatchError> {
        let request = retry_on_conflict("cancel_request", || async move {
            let current = self.requests.get_request(request_id).await?;
            let next = lifecycle::cancel_pending(&current, caller_id, Utc::now())?;
            Ok(self
                .requests
                .commit(Transition {
                    request: next,
                    plans: Vec::new(),
                })
                .await?)
        })
        .await?;

        tracing::info!("Match request {} cancelled by {}", request_id, caller_id);
        Ok(request)
    }

    /// Call off an accepted match as either party, releasing merged capacity
    pub async fn cancel_accepted_match(
        &self,
        request_id: RequestId,
        caller_id: UserId,
    ) -> Result<MatchRequest, MatchError> {
        let request = retry_on_conflict("cancel_accepted_match", || {
            self.try_cancel_accepted(request_id, caller_id)
        })
        .await?;

        tracing::info!("Accepted match {} cancelled by {}", request_id, caller_id);

        let caller = self.display_name(caller_id).await;
        self.notify(
            request.counterparty(caller_id),
            &caller,
            format!("{} cancelled your travel match", caller),
        )
        .await;

        Ok(request)
    }

    async fn try_cancel_accepted(
        &self,
        request_id: RequestId,
        caller_id: UserId,
    ) -> Result<MatchRequest, MatchError> {
        let current = self.requests.get_request(request_id).await?;
        let next = lifecycle::cancel_accepted(&current, caller_id)?;

        let mut plans = Vec::new();
        if let (Some(receipt), Some(sender_id), Some(receiver_id)) = (
            current.merge,
            current.requester_plan_id,
            current.receiver_plan_id,
        ) {
            let mut sender = self.plans.get_plan(sender_id).await?;
            let mut receiver = self.plans.get_plan(receiver_id).await?;
            CapacityLedger::reverse(&mut sender, &mut receiver, &receipt);
            plans.push(sender);
            plans.push(receiver);
        }

        Ok(self
            .requests
            .commit(Transition {
                request: next,
                plans,
            })
            .await?)
    }

    /// Record a plan as rejected so it is no longer recommended to `sender_id`
    pub async fn reject_plan(
        &self,
        sender_id: UserId,
        plan_id: PlanId,
    ) -> Result<MatchRequest, MatchError> {
        let plan = self.plans.get_plan(plan_id).await?;
        let receiver_id = plan.owner_id;

        if sender_id == receiver_id {
            return Err(MatchError::SelfRequest);
        }

        if self
            .requests
            .find_pending(sender_id, receiver_id)
            .await?
            .is_some()
        {
            return Err(MatchError::DuplicateRequest);
        }

        let own = self.plans.latest_plan_for(sender_id).await?;
        let now = Utc::now();

        let request = self
            .requests
            .insert_request(NewMatchRequest {
                requester_id: sender_id,
                receiver_id,
                plan_id,
                requester_plan_id: own.map(|p| p.id),
                receiver_plan_id: Some(plan_id),
                status: MatchStatus::Rejected,
                message: None,
                created_at: now,
                responded_at: Some(now),
            })
            .await?;

        tracing::info!("User {} rejected plan {}", sender_id, plan_id);
        Ok(request)
    }

    pub async fn get_received(
        &self,
        user_id: UserId,
        status: Option<MatchStatus>,
    ) -> Result<Vec<MatchRequest>, MatchError> {
        Ok(self.requests.list_received(user_id, status).await?)
    }

    pub async fn get_sent(&self, user_id: UserId) -> Result<Vec<MatchRequest>, MatchError> {
        Ok(self.requests.list_sent(user_id).await?)
    }

    /// Accepted matches of a user with the partner and the joined plan
    pub async fn get_active_matches(&self, user_id: UserId) -> Result<Vec<ActiveMatch>, MatchError> {
        let accepted = self.requests.list_accepted_involving(user_id).await?;

        let mut matches = Vec::with_capacity(accepted.len());
        for request in accepted {
            let partner = self.users.get_user(request.counterparty(user_id)).await?;
            let plan_id = request.receiver_plan_id.unwrap_or(request.plan_id);
            let plan = self.plans.get_plan(plan_id).await?;

            matches.push(ActiveMatch {
                request_id: request.id,
                partner,
                plan,
                matched_at: request.accepted_at,
            });
        }

        Ok(matches)
    }

    pub async fn get_statistics(&self) -> Result<MatchStatistics, MatchError> {
        let counts = self.requests.counts().await?;
        Ok(MatchStatistics::from_counts(counts, Utc::now()))
    }

    fn normalize_message(&self, message: Option<String>) -> Result<Option<String>, MatchError> {
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        if let Some(text) = &message {
            if text.chars().count() > self.options.message_max_len {
                return Err(MatchError::Validation(format!(
                    "message must be at most {} characters",
                    self.options.message_max_len
                )));
            }
        }

        Ok(message)
    }

    async fn display_name(&self, user_id: UserId) -> String {
        match self.users.get_user(user_id).await {
            Ok(user) => user.display_name,
            Err(e) => {
                tracing::warn!("Could not resolve display name for {}: {}", user_id, e);
                user_id.to_string()
            }
        }
    }

    /// Best-effort delivery; failures are logged and swallowed
    async fn notify(&self, target_user_id: UserId, sender_name: &str, message: String) {
        if let Err(e) = self
            .notifier
            .send(
                target_user_id,
                sender_name,
                NotificationKind::MatchRequest,
                &message,
            )
            .await
        {
            tracing::warn!("Failed to notify user {}: {}", target_user_id, e);
        }
    }
}

/// Highest score first, ties broken by candidate id ascending
fn sort_ranked(scored: &mut [ScoredPlan]) {
    scored.sort_by(|a, b| {
        b.score
            .total
            .cmp(&a.score.total)
            .then_with(|| a.candidate.id.cmp(&b.candidate.id))
    });
}

fn search_reference(
    user_id: UserId,
    criteria: &SearchCriteria,
    own_plan: Option<&TravelPlanSnapshot>,
) -> TravelPlanSnapshot {
    let (target_size, current_headcount) = match own_plan {
        Some(plan) => (plan.target_size, plan.current_headcount),
        None => (criteria.max_group_size.unwrap_or(1), 1),
    };

    TravelPlanSnapshot {
        id: uuid::Uuid::nil(),
        owner_id: user_id,
        destination: criteria.destination.clone(),
        start_date: criteria.start_date,
        end_date: criteria.end_date,
        target_size,
        current_headcount,
        recruiting: true,
        style_tags: Some(criteria.style_tags.clone()),
        description: None,
        created_at: Utc::now(),
        version: 0,
    }
}

/// Run `attempt`, and once more if it lost an optimistic-lock race
async fn retry_on_conflict<T, F, Fut>(operation: &str, mut attempt: F) -> Result<T, MatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MatchError>>,
{
    match attempt().await {
        Err(MatchError::Conflict(what)) => {
            tracing::warn!(
                "{} hit a concurrent modification on {}, retrying",
                operation,
                what
            );
            attempt().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::{
        InMemoryStore, InMemoryUserDirectory, RecordingNotificationSink,
    };
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    fn create_plan(destination: &str, start: NaiveDate, end: NaiveDate) -> TravelPlanSnapshot {
        TravelPlanSnapshot {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            destination: destination.to_string(),
            start_date: start,
            end_date: end,
            target_size: 4,
            current_headcount: 1,
            recruiting: true,
            style_tags: Some(vec!["CULTURAL".to_string()]),
            description: None,
            created_at: Utc::now(),
            version: 0,
        }
    }

    fn create_engine() -> MatchingEngine {
        let store = Arc::new(InMemoryStore::new());
        MatchingEngine::new(
            store.clone(),
            store,
            Arc::new(InMemoryUserDirectory::new()),
            Arc::new(RecordingNotificationSink::new()),
        )
    }

    #[test]
    fn test_rank_orders_by_score_then_id() {
        let engine = create_engine();
        let reference = create_plan("Seoul", date(6, 1), date(6, 5));

        let exact = create_plan("Seoul", date(6, 1), date(6, 5));
        let mut twin = create_plan("Seoul", date(6, 1), date(6, 5));
        twin.id = Uuid::from_u128(exact.id.as_u128().wrapping_sub(1));
        let partial = create_plan("Seoul", date(6, 4), date(6, 9));

        let ranked = engine
            .rank(&reference, vec![partial.clone(), exact.clone(), twin.clone()], &[])
            .unwrap();

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].candidate.id, exact.id.min(twin.id));
        assert_eq!(ranked[1].candidate.id, exact.id.max(twin.id));
        assert_eq!(ranked[2].candidate.id, partial.id);
    }

    #[test]
    fn test_rank_applies_threshold_and_limit() {
        let engine = create_engine().with_options(MatchingOptions {
            max_results: 2,
            ..MatchingOptions::default()
        });
        let reference = create_plan("Seoul", date(6, 1), date(6, 5));

        let far = create_plan("Jeju", date(9, 1), date(9, 5));
        let candidates: Vec<_> = (0..5)
            .map(|_| create_plan("Seoul", date(6, 1), date(6, 5)))
            .chain(std::iter::once(far))
            .collect();

        let ranked = engine.rank(&reference, candidates, &[]).unwrap();

        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|r| r.score.total >= 50));
    }

    #[test]
    fn test_rank_skips_candidate_with_inverted_dates() {
        let engine = create_engine();
        let reference = create_plan("Seoul", date(6, 1), date(6, 5));
        let broken = create_plan("Seoul", date(6, 9), date(6, 2));
        let good = create_plan("Seoul", date(6, 1), date(6, 5));

        let ranked = engine.rank(&reference, vec![broken, good.clone()], &[]).unwrap();

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].candidate.id, good.id);
    }

    #[test]
    fn test_rank_rejects_inverted_reference() {
        let engine = create_engine();
        let reference = create_plan("Seoul", date(6, 5), date(6, 1));
        let result = engine.rank(&reference, vec![], &[]);
        assert!(matches!(result, Err(MatchError::Validation(_))));
    }

    #[test]
    fn test_search_reference_without_plan() {
        let criteria = SearchCriteria {
            destination: "Busan".to_string(),
            start_date: date(7, 1),
            end_date: date(7, 3),
            style_tags: vec![],
            date_flex_days: 0,
            max_group_size: Some(3),
            page: 0,
            size: 10,
        };
        let reference = search_reference(Uuid::new_v4(), &criteria, None);
        assert_eq!(reference.target_size, 3);
        assert_eq!(reference.current_headcount, 1);
    }

    #[tokio::test]
    async fn test_retry_on_conflict_retries_once() {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result = retry_on_conflict("test", || async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(MatchError::Conflict("row".to_string()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_on_conflict_gives_up_after_second_conflict() {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result: Result<(), MatchError> = retry_on_conflict("test", || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(MatchError::Conflict("row".to_string()))
        })
        .await;

        assert!(matches!(result, Err(MatchError::Conflict(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
