use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type PlanId = Uuid;
pub type RequestId = Uuid;

/// Read-only view of a travel plan as consumed by the matching engine
///
/// Only `current_headcount`, `recruiting` and `version` are ever written back
/// by the engine, through the capacity ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelPlanSnapshot {
    pub id: PlanId,
    #[serde(rename = "ownerId")]
    pub owner_id: UserId,
    pub destination: String,
    #[serde(rename = "startDate")]
    pub start_date: NaiveDate,
    #[serde(rename = "endDate")]
    pub end_date: NaiveDate,
    #[serde(rename = "targetSize")]
    pub target_size: u32,
    #[serde(rename = "currentHeadcount")]
    pub current_headcount: u32,
    pub recruiting: bool,
    #[serde(rename = "styleTags", default)]
    pub style_tags: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: i64,
}

impl TravelPlanSnapshot {
    /// Inclusive length of the trip in days, `None` if the range is inverted
    pub fn duration_days(&self) -> Option<i64> {
        let days = (self.end_date - self.start_date).num_days();
        if days < 0 {
            None
        } else {
            Some(days + 1)
        }
    }

    /// Whether the plan still has room for more joiners
    pub fn has_capacity(&self) -> bool {
        self.current_headcount < self.target_size
    }

    pub fn style_tags(&self) -> &[String] {
        self.style_tags.as_deref().unwrap_or(&[])
    }
}

/// Status of a match request
///
/// PENDING is the only state a request is created in (apart from a direct
/// plan rejection) and nothing ever moves back into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "PENDING",
            MatchStatus::Accepted => "ACCEPTED",
            MatchStatus::Rejected => "REJECTED",
            MatchStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => Some(MatchStatus::Pending),
            "ACCEPTED" => Some(MatchStatus::Accepted),
            "REJECTED" => Some(MatchStatus::Rejected),
            "CANCELLED" => Some(MatchStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the capacity ledger changed when a match was accepted
///
/// Stored on the accepted request so the acceptance can be reversed exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReceipt {
    #[serde(rename = "senderHeadcount")]
    pub sender_headcount: u32,
    #[serde(rename = "senderWasRecruiting")]
    pub sender_was_recruiting: bool,
    #[serde(rename = "receiverWasRecruiting")]
    pub receiver_was_recruiting: bool,
}

/// A proposal from one plan owner to another to combine travel plans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub id: RequestId,
    #[serde(rename = "requesterId")]
    pub requester_id: UserId,
    #[serde(rename = "receiverId")]
    pub receiver_id: UserId,
    /// The plan this request is about
    #[serde(rename = "planId")]
    pub plan_id: PlanId,
    #[serde(rename = "requesterPlanId")]
    pub requester_plan_id: Option<PlanId>,
    #[serde(rename = "receiverPlanId")]
    pub receiver_plan_id: Option<PlanId>,
    pub status: MatchStatus,
    pub message: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "respondedAt")]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(rename = "acceptedAt")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub merge: Option<MergeReceipt>,
    #[serde(skip)]
    pub version: i64,
}

impl MatchRequest {
    pub fn involves(&self, user_id: UserId) -> bool {
        self.requester_id == user_id || self.receiver_id == user_id
    }

    /// The other party of the request, from `user_id`'s point of view
    pub fn counterparty(&self, user_id: UserId) -> UserId {
        if self.requester_id == user_id {
            self.receiver_id
        } else {
            self.requester_id
        }
    }
}

/// Fields needed to persist a new match request
#[derive(Debug, Clone)]
pub struct NewMatchRequest {
    pub requester_id: UserId,
    pub receiver_id: UserId,
    pub plan_id: PlanId,
    pub requester_plan_id: Option<PlanId>,
    pub receiver_plan_id: Option<PlanId>,
    pub status: MatchStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User,
    Admin,
}

/// Directory entry for a platform user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub email: String,
    pub role: UserRole,
}

/// Kind of alert pushed to the notification service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Follow,
    Comment,
    MatchRequest,
}

/// Per-factor breakdown of a compatibility score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub destination: u32,
    #[serde(rename = "dateOverlap")]
    pub date_overlap: u32,
    #[serde(rename = "groupSize")]
    pub group_size: u32,
    pub style: u32,
}

impl ScoreBreakdown {
    pub fn sum(&self) -> u32 {
        self.destination + self.date_overlap + self.group_size + self.style
    }
}

/// Compatibility of a candidate plan with a reference plan, in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityScore {
    pub total: u32,
    pub breakdown: ScoreBreakdown,
}

/// Points awarded per factor
///
/// Terms are computed independently and summed, the total is clamped to 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub destination: u32,
    /// Fraction of the destination weight awarded for a same-region match
    pub region_ratio: f64,
    pub date_overlap: u32,
    pub group_size: u32,
    pub style: u32,
    /// Number of shared style tags that earns the full style weight
    pub style_tags_for_full: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            destination: 40,
            region_ratio: 0.625,
            date_overlap: 30,
            group_size: 15,
            style: 15,
            style_tags_for_full: 3,
        }
    }
}

/// A recommended plan with its score against the caller's plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPlan {
    pub candidate: TravelPlanSnapshot,
    pub score: CompatibilityScore,
}

/// An accepted match seen from one of its parties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveMatch {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    pub partner: UserSummary,
    pub plan: TravelPlanSnapshot,
    #[serde(rename = "matchedAt")]
    pub matched_at: Option<DateTime<Utc>>,
}

/// Raw aggregates over the match request store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestCounts {
    pub total: u64,
    /// Requests that were accepted at some point, including later cancellations
    pub accepted: u64,
    pub rejected: u64,
    pub pending: u64,
    pub cancelled: u64,
    /// Requests currently in ACCEPTED
    pub active: u64,
    pub average_response_secs: Option<f64>,
    pub most_popular_destination: Option<String>,
}

/// Matching system statistics for administrators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStatistics {
    pub total: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub pending: u64,
    pub cancelled: u64,
    pub active: u64,
    #[serde(rename = "successRatePercent")]
    pub success_rate_percent: f64,
    #[serde(rename = "averageResponseTimeHours")]
    pub average_response_time_hours: Option<f64>,
    #[serde(rename = "mostPopularDestination")]
    pub most_popular_destination: Option<String>,
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,
}

impl MatchStatistics {
    pub fn from_counts(counts: RequestCounts, generated_at: DateTime<Utc>) -> Self {
        let success_rate_percent = if counts.total == 0 {
            0.0
        } else {
            let rate = counts.accepted as f64 * 100.0 / counts.total as f64;
            (rate * 100.0).round() / 100.0
        };

        Self {
            total: counts.total,
            accepted: counts.accepted,
            rejected: counts.rejected,
            pending: counts.pending,
            cancelled: counts.cancelled,
            active: counts.active,
            success_rate_percent,
            average_response_time_hours: counts
                .average_response_secs
                .map(|secs| (secs / 3600.0 * 100.0).round() / 100.0),
            most_popular_destination: counts.most_popular_destination,
            generated_at,
        }
    }
}

/// Criteria for an explicit partner search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub style_tags: Vec<String>,
    /// Days of slack allowed on either side of the date range
    pub date_flex_days: u32,
    pub max_group_size: Option<u32>,
    pub page: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<ScoredPlan>,
    pub page: u32,
    pub size: u32,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_is_exact_for_round_numbers() {
        let counts = RequestCounts {
            total: 100,
            accepted: 60,
            ..Default::default()
        };
        let stats = MatchStatistics::from_counts(counts, Utc::now());
        assert_eq!(stats.success_rate_percent, 60.0);
    }

    #[test]
    fn test_success_rate_without_requests() {
        let stats = MatchStatistics::from_counts(RequestCounts::default(), Utc::now());
        assert_eq!(stats.success_rate_percent, 0.0);
        assert_eq!(stats.average_response_time_hours, None);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(MatchStatus::parse("pending"), Some(MatchStatus::Pending));
        assert_eq!(MatchStatus::parse("ACCEPTED"), Some(MatchStatus::Accepted));
        assert_eq!(MatchStatus::parse("unknown"), None);
        assert_eq!(MatchStatus::Cancelled.to_string(), "CANCELLED");
    }

    #[test]
    fn test_notification_kind_serializes_as_tag() {
        let json = serde_json::to_string(&NotificationKind::MatchRequest).unwrap();
        assert_eq!(json, "\"MATCH_REQUEST\"");
    }
}
