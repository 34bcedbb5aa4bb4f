use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    MatchRequest, MatchStatus, NewMatchRequest, NotificationKind, PlanId, RequestCounts,
    RequestId, TravelPlanSnapshot, UserId, UserSummary,
};
use crate::services::store::{
    DirectoryError, MatchRequestStore, NotificationError, NotificationSink, PlanStore, StoreError,
    Transition, UserDirectory,
};

#[derive(Default)]
struct State {
    plans: HashMap<PlanId, TravelPlanSnapshot>,
    requests: HashMap<RequestId, MatchRequest>,
}

/// Process-local plan and match request store
///
/// One lock guards both collections, so duplicate checks, inserts and
/// transitions are serialized exactly like a serializable transaction.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a plan record
    pub async fn put_plan(&self, plan: TravelPlanSnapshot) {
        self.state.lock().await.plans.insert(plan.id, plan);
    }

    pub async fn plan(&self, id: PlanId) -> Option<TravelPlanSnapshot> {
        self.state.lock().await.plans.get(&id).cloned()
    }
}

fn check_plan_version(
    plans: &HashMap<PlanId, TravelPlanSnapshot>,
    plan: &TravelPlanSnapshot,
) -> Result<(), StoreError> {
    let stored = plans
        .get(&plan.id)
        .ok_or_else(|| StoreError::NotFound(format!("plan {}", plan.id)))?;
    if stored.version != plan.version {
        return Err(StoreError::Conflict(format!("plan {}", plan.id)));
    }
    Ok(())
}

fn newest_first(mut requests: Vec<MatchRequest>) -> Vec<MatchRequest> {
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    requests
}

#[async_trait]
impl PlanStore for InMemoryStore {
    async fn get_plan(&self, id: PlanId) -> Result<TravelPlanSnapshot, StoreError> {
        self.state
            .lock()
            .await
            .plans
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("plan {}", id)))
    }

    async fn latest_plan_for(
        &self,
        owner_id: UserId,
    ) -> Result<Option<TravelPlanSnapshot>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .plans
            .values()
            .filter(|p| p.owner_id == owner_id)
            .max_by(|a, b| {
                a.start_date
                    .cmp(&b.start_date)
                    .then(a.created_at.cmp(&b.created_at))
            })
            .cloned())
    }

    async fn list_plans_excluding_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TravelPlanSnapshot>, StoreError> {
        let state = self.state.lock().await;
        let mut plans: Vec<TravelPlanSnapshot> = state
            .plans
            .values()
            .filter(|p| p.owner_id != user_id)
            .cloned()
            .collect();
        plans.sort_by_key(|p| p.id);
        Ok(plans)
    }

    async fn save_plan(&self, plan: &TravelPlanSnapshot) -> Result<TravelPlanSnapshot, StoreError> {
        let mut state = self.state.lock().await;
        check_plan_version(&state.plans, plan)?;

        let mut saved = plan.clone();
        saved.version += 1;
        state.plans.insert(saved.id, saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl MatchRequestStore for InMemoryStore {
    async fn insert_request(&self, new: NewMatchRequest) -> Result<MatchRequest, StoreError> {
        let mut state = self.state.lock().await;

        if new.status == MatchStatus::Pending
            && state.requests.values().any(|r| {
                r.status == MatchStatus::Pending
                    && r.requester_id == new.requester_id
                    && r.receiver_id == new.receiver_id
            })
        {
            return Err(StoreError::Duplicate);
        }

        let request = MatchRequest {
            id: Uuid::new_v4(),
            requester_id: new.requester_id,
            receiver_id: new.receiver_id,
            plan_id: new.plan_id,
            requester_plan_id: new.requester_plan_id,
            receiver_plan_id: new.receiver_plan_id,
            status: new.status,
            message: new.message,
            created_at: new.created_at,
            responded_at: new.responded_at,
            accepted_at: None,
            merge: None,
            version: 0,
        };
        state.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_request(&self, id: RequestId) -> Result<MatchRequest, StoreError> {
        self.state
            .lock()
            .await
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("match request {}", id)))
    }

    async fn find_pending(
        &self,
        requester_id: UserId,
        receiver_id: UserId,
    ) -> Result<Option<MatchRequest>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .requests
            .values()
            .find(|r| {
                r.status == MatchStatus::Pending
                    && r.requester_id == requester_id
                    && r.receiver_id == receiver_id
            })
            .cloned())
    }

    async fn list_received(
        &self,
        receiver_id: UserId,
        status: Option<MatchStatus>,
    ) -> Result<Vec<MatchRequest>, StoreError> {
        let state = self.state.lock().await;
        Ok(newest_first(
            state
                .requests
                .values()
                .filter(|r| r.receiver_id == receiver_id)
                .filter(|r| status.map_or(true, |s| r.status == s))
                .cloned()
                .collect(),
        ))
    }

    async fn list_sent(&self, requester_id: UserId) -> Result<Vec<MatchRequest>, StoreError> {
        let state = self.state.lock().await;
        Ok(newest_first(
            state
                .requests
                .values()
                .filter(|r| r.requester_id == requester_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_accepted_involving(
        &self,
        user_id: UserId,
    ) -> Result<Vec<MatchRequest>, StoreError> {
        let state = self.state.lock().await;
        Ok(newest_first(
            state
                .requests
                .values()
                .filter(|r| r.status == MatchStatus::Accepted && r.involves(user_id))
                .cloned()
                .collect(),
        ))
    }

    async fn contacted_plan_ids(&self, requester_id: UserId) -> Result<Vec<PlanId>, StoreError> {
        let state = self.state.lock().await;
        let mut ids: Vec<PlanId> = state
            .requests
            .values()
            .filter(|r| r.requester_id == requester_id && r.status != MatchStatus::Cancelled)
            .flat_map(|r| std::iter::once(r.plan_id).chain(r.receiver_plan_id))
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn commit(&self, transition: Transition) -> Result<MatchRequest, StoreError> {
        let mut state = self.state.lock().await;

        let stored = state
            .requests
            .get(&transition.request.id)
            .ok_or_else(|| StoreError::NotFound(format!("match request {}", transition.request.id)))?;
        if stored.version != transition.request.version {
            return Err(StoreError::Conflict(format!(
                "match request {}",
                transition.request.id
            )));
        }
        for plan in &transition.plans {
            check_plan_version(&state.plans, plan)?;
        }

        for plan in transition.plans {
            let mut saved = plan;
            saved.version += 1;
            state.plans.insert(saved.id, saved);
        }

        let mut request = transition.request;
        request.version += 1;
        state.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn counts(&self) -> Result<RequestCounts, StoreError> {
        let state = self.state.lock().await;
        let mut counts = RequestCounts::default();
        let mut response_secs = Vec::new();
        let mut destinations: HashMap<&str, u64> = HashMap::new();

        for request in state.requests.values() {
            counts.total += 1;
            match request.status {
                MatchStatus::Pending => counts.pending += 1,
                MatchStatus::Rejected => counts.rejected += 1,
                MatchStatus::Cancelled => counts.cancelled += 1,
                MatchStatus::Accepted => counts.active += 1,
            }
            if request.accepted_at.is_some() {
                counts.accepted += 1;
            }

            let answered = matches!(request.status, MatchStatus::Accepted | MatchStatus::Rejected)
                || request.accepted_at.is_some();
            if let (true, Some(responded_at)) = (answered, request.responded_at) {
                response_secs.push((responded_at - request.created_at).num_seconds() as f64);
            }

            if let Some(plan) = state.plans.get(&request.plan_id) {
                *destinations.entry(plan.destination.as_str()).or_default() += 1;
            }
        }

        if !response_secs.is_empty() {
            counts.average_response_secs =
                Some(response_secs.iter().sum::<f64>() / response_secs.len() as f64);
        }
        counts.most_popular_destination = destinations
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
            .map(|(destination, _)| destination.to_string());

        Ok(counts)
    }
}

/// Fixed set of users, for the in-memory backend and tests
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: StdMutex<HashMap<UserId, UserSummary>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_user(&self, user: UserSummary) {
        if let Ok(mut users) = self.users.lock() {
            users.insert(user.id, user);
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, id: UserId) -> Result<UserSummary, DirectoryError> {
        let users = self
            .users
            .lock()
            .map_err(|_| DirectoryError::ApiError("user table poisoned".to_string()))?;
        users.get(&id).cloned().ok_or(DirectoryError::NotFound(id))
    }
}

/// A notification captured by [`RecordingNotificationSink`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub target_user_id: UserId,
    pub sender_name: String,
    pub kind: NotificationKind,
    pub message: String,
}

/// Sink that keeps every notification in memory
///
/// Can be switched into a failing mode to exercise best-effort delivery.
#[derive(Default)]
pub struct RecordingNotificationSink {
    sent: StdMutex<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn send(
        &self,
        target_user_id: UserId,
        sender_name: &str,
        kind: NotificationKind,
        message: &str,
    ) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::ApiError(
                "notification service unavailable".to_string(),
            ));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentNotification {
                target_user_id,
                sender_name: sender_name.to_string(),
                kind,
                message: message.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn plan(owner_id: UserId, month: u32) -> TravelPlanSnapshot {
        TravelPlanSnapshot {
            id: Uuid::new_v4(),
            owner_id,
            destination: "Busan".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, month, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, month, 4).unwrap(),
            target_size: 3,
            current_headcount: 1,
            recruiting: true,
            style_tags: None,
            description: None,
            created_at: Utc::now(),
            version: 0,
        }
    }

    fn new_request(requester_id: UserId, receiver_id: UserId, plan_id: PlanId) -> NewMatchRequest {
        NewMatchRequest {
            requester_id,
            receiver_id,
            plan_id,
            requester_plan_id: None,
            receiver_plan_id: Some(plan_id),
            status: MatchStatus::Pending,
            message: None,
            created_at: Utc::now(),
            responded_at: None,
        }
    }

    #[test]
    fn test_latest_plan_by_start_date() {
        tokio_test::block_on(async {
            let store = InMemoryStore::new();
            let owner = Uuid::new_v4();
            let june = plan(owner, 6);
            let august = plan(owner, 8);
            store.put_plan(august.clone()).await;
            store.put_plan(june).await;

            let latest = store.latest_plan_for(owner).await.unwrap().unwrap();
            assert_eq!(latest.id, august.id);
            assert!(store.latest_plan_for(Uuid::new_v4()).await.unwrap().is_none());
        });
    }

    #[tokio::test]
    async fn test_pending_pair_is_unique() {
        let store = InMemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let plan_id = Uuid::new_v4();

        store.insert_request(new_request(a, b, plan_id)).await.unwrap();
        let second = store.insert_request(new_request(a, b, plan_id)).await;
        assert!(matches!(second, Err(StoreError::Duplicate)));

        // The opposite direction is a different pair
        store.insert_request(new_request(b, a, plan_id)).await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_versions() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let target = plan(owner, 6);
        store.put_plan(target.clone()).await;

        let request = store
            .insert_request(new_request(Uuid::new_v4(), owner, target.id))
            .await
            .unwrap();

        let mut accepted = request.clone();
        accepted.status = MatchStatus::Accepted;
        let committed = store
            .commit(Transition {
                request: accepted.clone(),
                plans: vec![target.clone()],
            })
            .await
            .unwrap();
        assert_eq!(committed.version, 1);

        let stale = store
            .commit(Transition {
                request: accepted,
                plans: vec![],
            })
            .await;
        assert!(matches!(stale, Err(StoreError::Conflict(_))));

        let stale_plan = store.save_plan(&target).await;
        assert!(matches!(stale_plan, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_contacted_plans_include_receiver_side() {
        let store = InMemoryStore::new();
        let (requester, receiver) = (Uuid::new_v4(), Uuid::new_v4());
        let own_plan = Uuid::new_v4();
        let their_plan = Uuid::new_v4();

        let mut offer = new_request(requester, receiver, own_plan);
        offer.requester_plan_id = Some(own_plan);
        offer.receiver_plan_id = Some(their_plan);
        store.insert_request(offer).await.unwrap();

        let contacted = store.contacted_plan_ids(requester).await.unwrap();
        assert!(contacted.contains(&own_plan));
        assert!(contacted.contains(&their_plan));
        assert!(store.contacted_plan_ids(receiver).await.unwrap().is_empty());
    }
}
