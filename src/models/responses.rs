use serde::{Deserialize, Serialize};

use crate::models::domain::{MatchRequest, ScoredPlan};

/// Response for the recommendations endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<ScoredPlan>,
    pub total_results: usize,
}

/// Response listing match requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequestsResponse {
    pub requests: Vec<MatchRequest>,
    pub count: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
