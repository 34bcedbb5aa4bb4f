use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    MatchRequest, MatchStatus, NewMatchRequest, NotificationKind, PlanId, RequestCounts,
    RequestId, TravelPlanSnapshot, UserId, UserSummary,
};

/// Errors that can occur in a plan or match request store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("A pending request already exists for this pair")]
    Duplicate,

    #[error("Version mismatch on {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors from the user directory
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("User not found: {0}")]
    NotFound(UserId),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Errors from the notification service
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),
}

/// A status change on one request together with the plan rows it touches
///
/// `request` and `plans` carry the new state and the version they were read
/// at; a store applies all of them in one transaction or none at all.
#[derive(Debug, Clone)]
pub struct Transition {
    pub request: MatchRequest,
    pub plans: Vec<TravelPlanSnapshot>,
}

/// Read access to travel plans, plus write-back of capacity columns
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn get_plan(&self, id: PlanId) -> Result<TravelPlanSnapshot, StoreError>;

    /// The owner's most recent plan by start date
    async fn latest_plan_for(&self, owner_id: UserId)
        -> Result<Option<TravelPlanSnapshot>, StoreError>;

    async fn list_plans_excluding_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TravelPlanSnapshot>, StoreError>;

    /// Persist `current_headcount` and `recruiting` if the version still matches
    ///
    /// Standalone plan edits only. The engine writes capacity changes through
    /// [`MatchRequestStore::commit`] together with the request row.
    async fn save_plan(&self, plan: &TravelPlanSnapshot) -> Result<TravelPlanSnapshot, StoreError>;
}

/// Persistent collection of match requests
#[async_trait]
pub trait MatchRequestStore: Send + Sync {
    /// Insert a new request
    ///
    /// The pending-pair uniqueness check and the insert are atomic: a PENDING
    /// insert fails with [`StoreError::Duplicate`] if the pair already has one.
    async fn insert_request(&self, new: NewMatchRequest) -> Result<MatchRequest, StoreError>;

    async fn get_request(&self, id: RequestId) -> Result<MatchRequest, StoreError>;

    async fn find_pending(
        &self,
        requester_id: UserId,
        receiver_id: UserId,
    ) -> Result<Option<MatchRequest>, StoreError>;

    async fn list_received(
        &self,
        receiver_id: UserId,
        status: Option<MatchStatus>,
    ) -> Result<Vec<MatchRequest>, StoreError>;

    async fn list_sent(&self, requester_id: UserId) -> Result<Vec<MatchRequest>, StoreError>;

    /// Requests in ACCEPTED where the user is either party
    async fn list_accepted_involving(&self, user_id: UserId)
        -> Result<Vec<MatchRequest>, StoreError>;

    /// Plans the user already sent a non-cancelled request about
    ///
    /// Covers both the plan the request was sent on and the receiver's plan,
    /// so a request offering the requester's own plan still marks the
    /// receiver's plan as contacted.
    async fn contacted_plan_ids(&self, requester_id: UserId) -> Result<Vec<PlanId>, StoreError>;

    /// Apply a transition atomically, failing with [`StoreError::Conflict`]
    /// if any row changed since it was read
    async fn commit(&self, transition: Transition) -> Result<MatchRequest, StoreError>;

    async fn counts(&self) -> Result<RequestCounts, StoreError>;
}

/// Platform user lookup
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<UserSummary, DirectoryError>;
}

/// Outbound alerts to platform users
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(
        &self,
        target_user_id: UserId,
        sender_name: &str,
        kind: NotificationKind,
        message: &str,
    ) -> Result<(), NotificationError>;
}
