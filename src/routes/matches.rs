use actix_web::{web, HttpResponse};
use std::sync::Arc;
use validator::Validate;

use crate::core::MatchingEngine;
use crate::error::MatchError;
use crate::models::{
    HealthResponse, MatchRequestsResponse, MatchStatus, PlanId, ReceivedQuery,
    RecommendationsResponse, RequestId, RespondMatchRequest, SearchCriteria, SearchRequest,
    SendMatchRequest,
};
use crate::routes::auth::{AuthenticatedUser, JwtVerifier};
use crate::services::PgStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchingEngine>,
    pub jwt: Arc<JwtVerifier>,
    /// Present when running on PostgreSQL, used by the health check
    pub database: Option<Arc<PgStore>>,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/matches/recommendations", web::get().to(recommendations))
        .route("/matches/search", web::post().to(search))
        .route("/matches/requests", web::post().to(send_request))
        .route("/matches/requests/received", web::get().to(received_requests))
        .route("/matches/requests/sent", web::get().to(sent_requests))
        .route("/matches/requests/{id}/respond", web::post().to(respond))
        .route("/matches/requests/{id}", web::delete().to(cancel_request))
        .route("/matches/plans/{id}/reject", web::post().to(reject_plan))
        .route("/matches/active", web::get().to(active_matches))
        .route("/matches/active/{id}", web::delete().to(cancel_active_match))
        .route("/admin/matches/statistics", web::get().to(statistics));
}

fn validate<T: Validate>(body: &T) -> Result<(), MatchError> {
    body.validate().map_err(|errors| {
        tracing::info!("Validation failed: field_errors={:?}", errors);
        MatchError::Validation(errors.to_string())
    })
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let healthy = match &state.database {
        Some(db) => db.health_check().await.unwrap_or(false),
        None => true,
    };

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// GET /api/v1/matches/recommendations
async fn recommendations(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, MatchError> {
    let recommendations = state.engine.recommend(user.id).await?;

    Ok(HttpResponse::Ok().json(RecommendationsResponse {
        total_results: recommendations.len(),
        recommendations,
    }))
}

/// POST /api/v1/matches/search
///
/// Request body:
/// ```json
/// {
///   "destination": "Busan",
///   "startDate": "2025-07-01",
///   "endDate": "2025-07-05",
///   "styleTags": ["FOOD"],
///   "dateFlexDays": 2,
///   "page": 0,
///   "size": 20
/// }
/// ```
async fn search(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<SearchRequest>,
) -> Result<HttpResponse, MatchError> {
    validate(&*req)?;
    let criteria = SearchCriteria::from(req.into_inner());

    let page = state.engine.search(user.id, &criteria).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// POST /api/v1/matches/requests
async fn send_request(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<SendMatchRequest>,
) -> Result<HttpResponse, MatchError> {
    validate(&*req)?;
    let req = req.into_inner();

    let request = state
        .engine
        .send_request(user.id, req.receiver_id, req.plan_id, req.message)
        .await?;

    Ok(HttpResponse::Created().json(request))
}

/// POST /api/v1/matches/requests/{id}/respond
async fn respond(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<RequestId>,
    req: web::Json<RespondMatchRequest>,
) -> Result<HttpResponse, MatchError> {
    let request = state
        .engine
        .respond(path.into_inner(), user.id, req.accept)
        .await?;

    Ok(HttpResponse::Ok().json(request))
}

/// DELETE /api/v1/matches/requests/{id}
async fn cancel_request(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<RequestId>,
) -> Result<HttpResponse, MatchError> {
    let request = state
        .engine
        .cancel_request(path.into_inner(), user.id)
        .await?;

    Ok(HttpResponse::Ok().json(request))
}

/// GET /api/v1/matches/requests/received?status={status}
async fn received_requests(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<ReceivedQuery>,
) -> Result<HttpResponse, MatchError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(MatchStatus::parse(raw).ok_or_else(|| {
            MatchError::Validation(format!(
                "status must be one of PENDING, ACCEPTED, REJECTED, CANCELLED, got {}",
                raw
            ))
        })?),
        None => None,
    };

    let requests = state.engine.get_received(user.id, status).await?;

    Ok(HttpResponse::Ok().json(MatchRequestsResponse {
        count: requests.len(),
        requests,
    }))
}

/// GET /api/v1/matches/requests/sent
async fn sent_requests(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, MatchError> {
    let requests = state.engine.get_sent(user.id).await?;

    Ok(HttpResponse::Ok().json(MatchRequestsResponse {
        count: requests.len(),
        requests,
    }))
}

/// POST /api/v1/matches/plans/{id}/reject
async fn reject_plan(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<PlanId>,
) -> Result<HttpResponse, MatchError> {
    let request = state.engine.reject_plan(user.id, path.into_inner()).await?;
    Ok(HttpResponse::Created().json(request))
}

/// GET /api/v1/matches/active
async fn active_matches(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, MatchError> {
    let matches = state.engine.get_active_matches(user.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "matches": matches,
        "count": matches.len(),
    })))
}

/// DELETE /api/v1/matches/active/{id}
async fn cancel_active_match(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<RequestId>,
) -> Result<HttpResponse, MatchError> {
    let request = state
        .engine
        .cancel_accepted_match(path.into_inner(), user.id)
        .await?;

    Ok(HttpResponse::Ok().json(request))
}

/// GET /api/v1/admin/matches/statistics
async fn statistics(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, MatchError> {
    user.require_admin()?;

    let stats = state.engine.get_statistics().await?;
    Ok(HttpResponse::Ok().json(stats))
}
