use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

use crate::models::{
    MatchRequest, MatchStatus, MergeReceipt, NewMatchRequest, PlanId, RequestCounts, RequestId,
    TravelPlanSnapshot, UserId,
};
use crate::services::store::{MatchRequestStore, PlanStore, StoreError, Transition};

/// Match status as stored in the `match_status` enum column
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "match_status", rename_all = "UPPERCASE")]
pub enum StatusColumn {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl From<MatchStatus> for StatusColumn {
    fn from(value: MatchStatus) -> Self {
        match value {
            MatchStatus::Pending => StatusColumn::Pending,
            MatchStatus::Accepted => StatusColumn::Accepted,
            MatchStatus::Rejected => StatusColumn::Rejected,
            MatchStatus::Cancelled => StatusColumn::Cancelled,
        }
    }
}

impl From<StatusColumn> for MatchStatus {
    fn from(value: StatusColumn) -> Self {
        match value {
            StatusColumn::Pending => MatchStatus::Pending,
            StatusColumn::Accepted => MatchStatus::Accepted,
            StatusColumn::Rejected => MatchStatus::Rejected,
            StatusColumn::Cancelled => MatchStatus::Cancelled,
        }
    }
}

const PLAN_COLUMNS: &str = "id, owner_id, destination, start_date, end_date, target_size, \
     current_headcount, recruiting, style_tags, description, created_at, version";

const REQUEST_COLUMNS: &str = "id, requester_id, receiver_id, plan_id, requester_plan_id, \
     receiver_plan_id, status, message, created_at, responded_at, accepted_at, \
     merge_sender_headcount, merge_sender_recruiting, merge_receiver_recruiting, version";

/// PostgreSQL-backed plan and match request store
///
/// The plan table belongs to the wider platform; this store only reads it
/// and writes back the `current_headcount`, `recruiting` and `version`
/// columns. Pending-pair uniqueness is enforced by a partial unique index,
/// and every transition commits in a single transaction guarded by
/// optimistic `version` columns.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

fn to_u32(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidInput(format!("negative {}: {}", column, value)))
}

fn plan_from_row(row: &PgRow) -> Result<TravelPlanSnapshot, StoreError> {
    Ok(TravelPlanSnapshot {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        destination: row.try_get("destination")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        target_size: to_u32(row.try_get("target_size")?, "target_size")?,
        current_headcount: to_u32(row.try_get("current_headcount")?, "current_headcount")?,
        recruiting: row.try_get("recruiting")?,
        style_tags: row.try_get("style_tags")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        version: row.try_get("version")?,
    })
}

fn request_from_row(row: &PgRow) -> Result<MatchRequest, StoreError> {
    let headcount: Option<i32> = row.try_get("merge_sender_headcount")?;
    let sender_recruiting: Option<bool> = row.try_get("merge_sender_recruiting")?;
    let receiver_recruiting: Option<bool> = row.try_get("merge_receiver_recruiting")?;

    let merge = match (headcount, sender_recruiting, receiver_recruiting) {
        (Some(headcount), Some(sender_was_recruiting), Some(receiver_was_recruiting)) => {
            Some(MergeReceipt {
                sender_headcount: to_u32(headcount, "merge_sender_headcount")?,
                sender_was_recruiting,
                receiver_was_recruiting,
            })
        }
        _ => None,
    };

    let status: StatusColumn = row.try_get("status")?;

    Ok(MatchRequest {
        id: row.try_get("id")?,
        requester_id: row.try_get("requester_id")?,
        receiver_id: row.try_get("receiver_id")?,
        plan_id: row.try_get("plan_id")?,
        requester_plan_id: row.try_get("requester_plan_id")?,
        receiver_plan_id: row.try_get("receiver_plan_id")?,
        status: status.into(),
        message: row.try_get("message")?,
        created_at: row.try_get("created_at")?,
        responded_at: row.try_get("responded_at")?,
        accepted_at: row.try_get("accepted_at")?,
        merge,
        version: row.try_get("version")?,
    })
}

fn requests_from_rows(rows: &[PgRow]) -> Result<Vec<MatchRequest>, StoreError> {
    rows.iter().map(request_from_row).collect()
}

#[async_trait]
impl PlanStore for PgStore {
    async fn get_plan(&self, id: PlanId) -> Result<TravelPlanSnapshot, StoreError> {
        let query = format!("SELECT {} FROM travel_plans WHERE id = $1", PLAN_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("plan {}", id)))?;

        plan_from_row(&row)
    }

    async fn latest_plan_for(
        &self,
        owner_id: UserId,
    ) -> Result<Option<TravelPlanSnapshot>, StoreError> {
        let query = format!(
            "SELECT {} FROM travel_plans WHERE owner_id = $1 \
             ORDER BY start_date DESC, created_at DESC LIMIT 1",
            PLAN_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(plan_from_row).transpose()
    }

    async fn list_plans_excluding_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TravelPlanSnapshot>, StoreError> {
        let query = format!(
            "SELECT {} FROM travel_plans WHERE owner_id <> $1 ORDER BY id",
            PLAN_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!("Loaded {} candidate plans excluding user {}", rows.len(), user_id);

        rows.iter().map(plan_from_row).collect()
    }

    async fn save_plan(&self, plan: &TravelPlanSnapshot) -> Result<TravelPlanSnapshot, StoreError> {
        let query = r#"
            UPDATE travel_plans
            SET current_headcount = $1, recruiting = $2, version = version + 1
            WHERE id = $3 AND version = $4
        "#;

        let result = sqlx::query(query)
            .bind(plan.current_headcount as i32)
            .bind(plan.recruiting)
            .bind(plan.id)
            .bind(plan.version)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("plan {}", plan.id)));
        }

        let mut saved = plan.clone();
        saved.version += 1;
        Ok(saved)
    }
}

#[async_trait]
impl MatchRequestStore for PgStore {
    async fn insert_request(&self, new: NewMatchRequest) -> Result<MatchRequest, StoreError> {
        let query = r#"
            INSERT INTO match_requests (
                id, requester_id, receiver_id, plan_id, requester_plan_id, receiver_plan_id,
                status, message, created_at, responded_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0)
        "#;

        let id = Uuid::new_v4();
        let result = sqlx::query(query)
            .bind(id)
            .bind(new.requester_id)
            .bind(new.receiver_id)
            .bind(new.plan_id)
            .bind(new.requester_plan_id)
            .bind(new.receiver_plan_id)
            .bind(StatusColumn::from(new.status))
            .bind(&new.message)
            .bind(new.created_at)
            .bind(new.responded_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(StoreError::Duplicate);
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(
            "Inserted match request {}: {} -> {} ({})",
            id,
            new.requester_id,
            new.receiver_id,
            new.status
        );

        Ok(MatchRequest {
            id,
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
        })
    }

    async fn get_request(&self, id: RequestId) -> Result<MatchRequest, StoreError> {
        let query = format!("SELECT {} FROM match_requests WHERE id = $1", REQUEST_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("match request {}", id)))?;

        request_from_row(&row)
    }

    async fn find_pending(
        &self,
        requester_id: UserId,
        receiver_id: UserId,
    ) -> Result<Option<MatchRequest>, StoreError> {
        let query = format!(
            "SELECT {} FROM match_requests \
             WHERE requester_id = $1 AND receiver_id = $2 AND status = 'PENDING'",
            REQUEST_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(requester_id)
            .bind(receiver_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(request_from_row).transpose()
    }

    async fn list_received(
        &self,
        receiver_id: UserId,
        status: Option<MatchStatus>,
    ) -> Result<Vec<MatchRequest>, StoreError> {
        let query = format!(
            "SELECT {} FROM match_requests \
             WHERE receiver_id = $1 AND ($2::match_status IS NULL OR status = $2) \
             ORDER BY created_at DESC, id",
            REQUEST_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(receiver_id)
            .bind(status.map(StatusColumn::from))
            .fetch_all(&self.pool)
            .await?;

        requests_from_rows(&rows)
    }

    async fn list_sent(&self, requester_id: UserId) -> Result<Vec<MatchRequest>, StoreError> {
        let query = format!(
            "SELECT {} FROM match_requests WHERE requester_id = $1 ORDER BY created_at DESC, id",
            REQUEST_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(requester_id)
            .fetch_all(&self.pool)
            .await?;

        requests_from_rows(&rows)
    }

    async fn list_accepted_involving(
        &self,
        user_id: UserId,
    ) -> Result<Vec<MatchRequest>, StoreError> {
        let query = format!(
            "SELECT {} FROM match_requests \
             WHERE status = 'ACCEPTED' AND (requester_id = $1 OR receiver_id = $1) \
             ORDER BY created_at DESC, id",
            REQUEST_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        requests_from_rows(&rows)
    }

    async fn contacted_plan_ids(&self, requester_id: UserId) -> Result<Vec<PlanId>, StoreError> {
        let query = r#"
            SELECT plan_id
            FROM match_requests
            WHERE requester_id = $1 AND status <> 'CANCELLED'
            UNION
            SELECT receiver_plan_id AS plan_id
            FROM match_requests
            WHERE requester_id = $1 AND status <> 'CANCELLED'
              AND receiver_plan_id IS NOT NULL
            ORDER BY plan_id
        "#;

        let rows = sqlx::query(query)
            .bind(requester_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("plan_id").map_err(Into::into))
            .collect()
    }

    async fn commit(&self, transition: Transition) -> Result<MatchRequest, StoreError> {
        let request = transition.request;
        let mut tx = self.pool.begin().await?;

        let update_request = r#"
            UPDATE match_requests
            SET status = $1,
                responded_at = $2,
                accepted_at = $3,
                merge_sender_headcount = $4,
                merge_sender_recruiting = $5,
                merge_receiver_recruiting = $6,
                version = version + 1
            WHERE id = $7 AND version = $8
        "#;

        let result = sqlx::query(update_request)
            .bind(StatusColumn::from(request.status))
            .bind(request.responded_at)
            .bind(request.accepted_at)
            .bind(request.merge.map(|m| m.sender_headcount as i32))
            .bind(request.merge.map(|m| m.sender_was_recruiting))
            .bind(request.merge.map(|m| m.receiver_was_recruiting))
            .bind(request.id)
            .bind(request.version)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::Conflict(format!("match request {}", request.id)));
        }

        let update_plan = r#"
            UPDATE travel_plans
            SET current_headcount = $1, recruiting = $2, version = version + 1
            WHERE id = $3 AND version = $4
        "#;

        for plan in &transition.plans {
            let result = sqlx::query(update_plan)
                .bind(plan.current_headcount as i32)
                .bind(plan.recruiting)
                .bind(plan.id)
                .bind(plan.version)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(StoreError::Conflict(format!("plan {}", plan.id)));
            }
        }

        tx.commit().await?;

        tracing::debug!(
            "Committed match request {} as {} with {} plan update(s)",
            request.id,
            request.status,
            transition.plans.len()
        );

        let mut committed = request;
        committed.version += 1;
        Ok(committed)
    }

    async fn counts(&self) -> Result<RequestCounts, StoreError> {
        let query = r#"
            SELECT
                COUNT(*) as total,
                COUNT(*) FILTER (WHERE accepted_at IS NOT NULL) as accepted,
                COUNT(*) FILTER (WHERE status = 'REJECTED') as rejected,
                COUNT(*) FILTER (WHERE status = 'PENDING') as pending,
                COUNT(*) FILTER (WHERE status = 'CANCELLED') as cancelled,
                COUNT(*) FILTER (WHERE status = 'ACCEPTED') as active,
                (AVG(EXTRACT(EPOCH FROM (responded_at - created_at))) FILTER (
                    WHERE responded_at IS NOT NULL
                      AND (status IN ('ACCEPTED', 'REJECTED') OR accepted_at IS NOT NULL)
                ))::DOUBLE PRECISION as average_response_secs
            FROM match_requests
        "#;

        let row = sqlx::query(query).fetch_one(&self.pool).await?;

        let destination_query = r#"
            SELECT p.destination, COUNT(*) as requests
            FROM match_requests r
            JOIN travel_plans p ON p.id = r.plan_id
            GROUP BY p.destination
            ORDER BY requests DESC, p.destination ASC
            LIMIT 1
        "#;

        let top = sqlx::query(destination_query)
            .fetch_optional(&self.pool)
            .await?;

        let count = |column: &str| -> Result<u64, StoreError> {
            let value: i64 = row.try_get(column)?;
            Ok(value.max(0) as u64)
        };

        Ok(RequestCounts {
            total: count("total")?,
            accepted: count("accepted")?,
            rejected: count("rejected")?,
            pending: count("pending")?,
            cancelled: count("cancelled")?,
            active: count("active")?,
            average_response_secs: row.try_get("average_response_secs")?,
            most_popular_destination: top
                .as_ref()
                .map(|r| r.try_get("destination"))
                .transpose()?,
        })
    }
}
