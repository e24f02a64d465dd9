//! API route definitions.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::queue::QueueError;
use crate::ranking::{sort_by_score, DispatchJob, JobProfile, PriorityRule, UrgencyLevel};
use crate::storage;

use super::state::AppState;

type ApiError = (StatusCode, Json<Value>);

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/rank", post(rank_job))
        .route("/queue", get(technician_feed).post(enqueue_job))
        .route("/queue/{job_id}/accept", post(accept_job))
        .route("/queue/{job_id}/reject", post(reject_job))
        .route("/queue/{job_id}", delete(cancel_job))
        .route("/rules", get(list_rules).post(create_rule))
        .route("/rules/{rule_id}", delete(remove_rule))
        .route("/events", get(list_events))
}

// ---------------------------------------------------------------------------
// Error envelope helpers
// ---------------------------------------------------------------------------

fn bad_request(message: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": { "code": "validation", "message": message.to_string() } })),
    )
}

fn not_found(message: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": { "code": "not_found", "message": message } })),
    )
}

fn internal(err: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": { "code": "internal", "message": "internal error" } })),
    )
}

/// Run a synchronous storage call off the async runtime.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(internal)?
        .map_err(internal)
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RankRequest {
    dealership_id: String,
    service_id: String,
    urgency: UrgencyLevel,
    vehicle_make: Option<String>,
}

impl RankRequest {
    fn into_profile(self) -> JobProfile {
        JobProfile {
            dealership_id: self.dealership_id,
            service_id: self.service_id,
            urgency: self.urgency,
            vehicle_make: self.vehicle_make,
        }
    }
}

async fn rank_job(
    State(state): State<AppState>,
    Json(request): Json<RankRequest>,
) -> Result<Json<Value>, ApiError> {
    let profile = request.into_profile();
    profile.validate().map_err(bad_request)?;

    let pool = state.pool.clone();
    let dealership = profile.dealership_id.clone();
    let rules = run_blocking(move || storage::list_rules(&pool, Some(&dealership))).await?;

    let result = state.calculator.rank(&profile, &rules);
    Ok(Json(json!({
        "data": result,
        "meta": { "rules_considered": rules.len() }
    })))
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EnqueueRequest {
    job_id: Option<Uuid>,
    dealership_id: String,
    service_id: String,
    urgency: UrgencyLevel,
    vehicle_make: Option<String>,
    eligible_tech_ids: Option<Vec<String>>,
}

async fn enqueue_job(
    State(state): State<AppState>,
    Json(request): Json<EnqueueRequest>,
) -> Result<Json<Value>, ApiError> {
    let profile = JobProfile {
        dealership_id: request.dealership_id,
        service_id: request.service_id,
        urgency: request.urgency,
        vehicle_make: request.vehicle_make,
    };
    profile.validate().map_err(bad_request)?;

    let job = DispatchJob {
        id: request.job_id.unwrap_or_else(Uuid::new_v4),
        profile,
    };
    let job_id = job.id;

    // Rank eagerly so the caller sees where the job will land.
    let pool = state.pool.clone();
    let dealership = job.profile.dealership_id.clone();
    let rules = run_blocking(move || storage::list_rules(&pool, Some(&dealership))).await?;
    let ranking = state.calculator.rank(&job.profile, &rules);

    state
        .queue
        .enqueue(job, request.eligible_tech_ids.unwrap_or_default())
        .await;

    let pool = state.pool.clone();
    run_blocking(move || storage::record_event(&pool, job_id, None, "enqueued")).await?;

    Ok(Json(json!({
        "data": { "job_id": job_id, "ranking": ranking },
        "meta": { "status": "pending" }
    })))
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    tech: String,
}

async fn technician_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Value>, ApiError> {
    if query.tech.trim().is_empty() {
        return Err(bad_request("tech query parameter must not be empty"));
    }

    let jobs = state.queue.visible_to(&query.tech).await;

    // Rules for every dealership in one load; the matcher scopes per job.
    let pool = state.pool.clone();
    let rules = run_blocking(move || storage::list_rules(&pool, None)).await?;

    let ranked = sort_by_score(&state.calculator, jobs, &rules);
    let total = ranked.len();
    Ok(Json(json!({
        "data": ranked,
        "meta": { "total": total, "tech": query.tech }
    })))
}

#[derive(Debug, Deserialize)]
struct TechRequest {
    tech_id: String,
}

async fn accept_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(request): Json<TechRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.tech_id.trim().is_empty() {
        return Err(bad_request("tech_id must not be empty"));
    }

    match state.queue.accept(job_id, &request.tech_id).await {
        Ok(job) => {
            let pool = state.pool.clone();
            let tech = request.tech_id.clone();
            run_blocking(move || storage::record_event(&pool, job_id, Some(&tech), "accepted"))
                .await?;
            Ok(Json(json!({
                "data": { "job": job, "accepted_by": request.tech_id },
                "meta": { "status": "accepted" }
            })))
        }
        Err(QueueError::NotAvailable(_)) => Err((
            StatusCode::CONFLICT,
            Json(json!({
                "error": {
                    "code": "not_available",
                    "message": "job is no longer available; refresh the queue"
                }
            })),
        )),
    }
}

async fn reject_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(request): Json<TechRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.tech_id.trim().is_empty() {
        return Err(bad_request("tech_id must not be empty"));
    }

    let newly_rejected = state.queue.reject(job_id, &request.tech_id).await;
    if newly_rejected {
        let pool = state.pool.clone();
        let tech = request.tech_id.clone();
        run_blocking(move || storage::record_event(&pool, job_id, Some(&tech), "rejected"))
            .await?;
    }

    Ok(Json(json!({
        "data": { "job_id": job_id, "rejected_by": request.tech_id },
        "meta": { "status": "rejected" }
    })))
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    if !state.queue.remove(job_id).await {
        return Err(not_found("no pending offer for that job"));
    }

    let pool = state.pool.clone();
    run_blocking(move || storage::record_event(&pool, job_id, None, "cancelled")).await?;

    Ok(Json(json!({
        "data": { "job_id": job_id },
        "meta": { "status": "cancelled" }
    })))
}

// ---------------------------------------------------------------------------
// Priority rules
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RulesQuery {
    dealership: Option<String>,
}

async fn list_rules(
    State(state): State<AppState>,
    Query(query): Query<RulesQuery>,
) -> Result<Json<Value>, ApiError> {
    let pool = state.pool.clone();
    let rules =
        run_blocking(move || storage::list_rules(&pool, query.dealership.as_deref())).await?;

    let total = rules.len();
    Ok(Json(json!({
        "data": rules,
        "meta": { "total": total }
    })))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct CreateRuleRequest {
    dealership_id: String,
    service_id: Option<String>,
    vehicle_make: Option<String>,
    urgency_match: Option<UrgencyLevel>,
    target_urgency: UrgencyLevel,
    #[serde(default)]
    ranking_score: i64,
    description: String,
    #[serde(default = "default_true")]
    is_active: bool,
}

async fn create_rule(
    State(state): State<AppState>,
    Json(request): Json<CreateRuleRequest>,
) -> Result<Json<Value>, ApiError> {
    let now = chrono::Utc::now();
    let rule = PriorityRule {
        id: Uuid::new_v4(),
        dealership_id: request.dealership_id,
        service_id: request.service_id,
        vehicle_make: request.vehicle_make,
        urgency_match: request.urgency_match,
        target_urgency: request.target_urgency,
        ranking_score: request.ranking_score,
        is_active: request.is_active,
        description: request.description,
        created_at: now,
        updated_at: now,
    };
    rule.validate().map_err(bad_request)?;

    let pool = state.pool.clone();
    let stored = rule.clone();
    run_blocking(move || storage::insert_rule(&pool, &stored)).await?;

    Ok(Json(json!({
        "data": rule,
        "meta": { "status": "created" }
    })))
}

async fn remove_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let pool = state.pool.clone();
    let removed = run_blocking(move || storage::delete_rule(&pool, rule_id)).await?;
    if !removed {
        return Err(not_found("no rule with that id"));
    }

    Ok(Json(json!({
        "data": { "rule_id": rule_id },
        "meta": { "status": "deleted" }
    })))
}

// ---------------------------------------------------------------------------
// Dispatch audit log
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EventsQuery {
    limit: Option<usize>,
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.unwrap_or(50).min(500);
    let pool = state.pool.clone();
    let events = run_blocking(move || storage::recent_events(&pool, limit)).await?;

    let total = events.len();
    Ok(Json(json!({
        "data": events,
        "meta": { "total": total }
    })))
}
