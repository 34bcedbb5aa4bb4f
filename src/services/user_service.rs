use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::models::{UserId, UserSummary};
use crate::services::store::{DirectoryError, UserDirectory};

/// HTTP client for the platform's user service
///
/// Resolves user ids to display names, emails and roles. Responses are either
/// a bare user object or one wrapped in a `data` field.
pub struct UserServiceClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl UserServiceClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl UserDirectory for UserServiceClient {
    async fn get_user(&self, id: UserId) -> Result<UserSummary, DirectoryError> {
        let url = format!("{}/users/{}", self.base_url.trim_end_matches('/'), id);

        tracing::debug!("Fetching user summary for: {}", id);

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(DirectoryError::NotFound(id));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            tracing::error!("Failed to fetch user {}: {} - {}", id, status, body);
            return Err(DirectoryError::ApiError(format!(
                "Failed to fetch user: {}",
                status
            )));
        }

        let json: Value = response.json().await?;
        let data = json.get("data").unwrap_or(&json);

        serde_json::from_value(data.clone())
            .map_err(|e| DirectoryError::InvalidResponse(format!("Failed to parse user: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use uuid::Uuid;

    fn client_for(server: &mockito::Server) -> UserServiceClient {
        UserServiceClient::new(server.url(), "test_key".to_string(), Duration::from_secs(2))
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_user_parses_wrapped_payload() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        let body = serde_json::json!({
            "data": {
                "id": id,
                "displayName": "Mina",
                "email": "mina@example.com",
                "role": "ADMIN"
            }
        });
        let mock = server
            .mock("GET", format!("/users/{}", id).as_str())
            .match_header("X-Api-Key", "test_key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let user = client_for(&server).get_user(id).await.unwrap();

        mock.assert_async().await;
        assert_eq!(user.display_name, "Mina");
        assert_eq!(user.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        server
            .mock("GET", format!("/users/{}", id).as_str())
            .with_status(404)
            .create_async()
            .await;

        let err = client_for(&server).get_user(id).await.unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound(found) if found == id));
    }

    #[tokio::test]
    async fn test_get_user_server_error() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        server
            .mock("GET", format!("/users/{}", id).as_str())
            .with_status(503)
            .create_async()
            .await;

        let err = client_for(&server).get_user(id).await.unwrap_err();
        assert!(matches!(err, DirectoryError::ApiError(_)));
    }
}
