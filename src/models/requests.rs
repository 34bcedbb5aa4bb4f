use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::{PlanId, SearchCriteria, UserId};

/// Request to send a match request to another plan owner
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMatchRequest {
    #[serde(alias = "receiver_id", rename = "receiverId")]
    pub receiver_id: UserId,
    #[serde(alias = "plan_id", rename = "planId")]
    pub plan_id: PlanId,
    /// Length is checked against `matching.message_max_len` by the engine
    #[serde(default)]
    pub message: Option<String>,
}

/// Accept or reject a received match request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondMatchRequest {
    pub accept: bool,
}

/// Query string for listing received requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedQuery {
    #[serde(default)]
    pub status: Option<String>,
}

/// Partner search criteria
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 100))]
    pub destination: String,
    #[serde(alias = "start_date", rename = "startDate")]
    pub start_date: NaiveDate,
    #[serde(alias = "end_date", rename = "endDate")]
    pub end_date: NaiveDate,
    #[serde(alias = "style_tags", rename = "styleTags", default)]
    pub style_tags: Vec<String>,
    #[validate(range(max = 365))]
    #[serde(alias = "date_flex_days", rename = "dateFlexDays", default)]
    pub date_flex_days: u32,
    #[validate(range(min = 1))]
    #[serde(alias = "max_group_size", rename = "maxGroupSize", default)]
    pub max_group_size: Option<u32>,
    #[serde(default)]
    pub page: u32,
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_page_size")]
    pub size: u32,
}

fn default_page_size() -> u32 {
    20
}

impl From<SearchRequest> for SearchCriteria {
    fn from(req: SearchRequest) -> Self {
        SearchCriteria {
            destination: req.destination,
            start_date: req.start_date,
            end_date: req.end_date,
            style_tags: req.style_tags,
            date_flex_days: req.date_flex_days,
            max_group_size: req.max_group_size,
            page: req.page,
            size: req.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_request_message_length_not_fixed_here() {
        let req = SendMatchRequest {
            receiver_id: uuid::Uuid::new_v4(),
            plan_id: uuid::Uuid::new_v4(),
            message: Some("a".repeat(600)),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_search_request_defaults() {
        let json = r#"{"destination":"Seoul","startDate":"2025-06-01","endDate":"2025-06-05"}"#;
        let req: SearchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.size, 20);
        assert_eq!(req.page, 0);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_search_request_flex_bound() {
        let json = r#"{"destination":"Seoul","startDate":"2025-06-01","endDate":"2025-06-05","dateFlexDays":400}"#;
        let req: SearchRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate().is_err());
    }
}
