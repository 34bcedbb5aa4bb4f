// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    ActiveMatch, CompatibilityScore, MatchRequest, MatchStatistics, MatchStatus, MergeReceipt,
    NewMatchRequest, NotificationKind, PlanId, RequestCounts, RequestId, ScoreBreakdown,
    ScoredPlan, ScoringWeights, SearchCriteria, SearchPage, TravelPlanSnapshot, UserId, UserRole,
    UserSummary,
};
pub use requests::{ReceivedQuery, RespondMatchRequest, SearchRequest, SendMatchRequest};
pub use responses::{ErrorResponse, HealthResponse, MatchRequestsResponse, RecommendationsResponse};
