// src/api/handlers.rs
//
// Operator control surface. Every mutation is a single store write plus one
// audit log entry; cycle triggers share the driver's run guards.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::api::{auth, types::*, ApiState};
use crate::engine::driver::{trigger_cycle, Task, TriggerOutcome};
use crate::infra::errors::FlockError;
use crate::store::store::{keys, LogEntry};
use crate::util::parse_target_profile;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal(e: anyhow::Error) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// POST /api/v1/settings — Update runtime settings.
pub async fn update_settings(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<SettingsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    auth::check_auth(&state, &headers)?;
    let store = &state.engine.store;

    let mut changes = Vec::new();

    if let Some(ref url) = body.target_profile {
        let username = match parse_target_profile(url) {
            Ok(username) => username,
            Err(e) => {
                store
                    .append_log(format!("Rejected invalid target profile URL: {e}"))
                    .await
                    .map_err(internal)?;
                return Err(bad_request(e.to_string()));
            }
        };
        store
            .set_setting(keys::TARGET_PROFILE, &username)
            .await
            .map_err(internal)?;
        // A pagination token from the previous target must not leak into the
        // next listing.
        store.set_setting(keys::CURSOR, "").await.map_err(internal)?;
        changes.push(format!("Target @{username}"));
    }
    if let Some(limit) = body.daily_follow_limit {
        if limit == 0 {
            return Err(bad_request("daily_follow_limit must be positive"));
        }
        store
            .set_setting(keys::DAILY_FOLLOW_LIMIT, &limit.to_string())
            .await
            .map_err(internal)?;
        changes.push(format!("Limit {limit}"));
    }
    if let Some(delay) = body.unfollow_delay {
        store
            .set_setting(keys::UNFOLLOW_DELAY, &delay.to_string())
            .await
            .map_err(internal)?;
        changes.push(format!("Delay {delay} days"));
    }
    if let Some(filter) = body.filter_active {
        store
            .set_setting(keys::FILTER_ACTIVE, if filter { "true" } else { "false" })
            .await
            .map_err(internal)?;
        changes.push(format!("Filter {filter}"));
    }

    if changes.is_empty() {
        return Err(bad_request("No settings provided"));
    }

    store
        .append_log(format!("Settings updated: {}", changes.join(", ")))
        .await
        .map_err(internal)?;

    Ok(Json(serde_json::json!({ "updated": changes })))
}

/// POST /api/v1/bot — Toggle the bot's operational state.
pub async fn set_bot(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<BotRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    auth::check_auth(&state, &headers)?;
    let store = &state.engine.store;

    store
        .set_setting(keys::BOT_ACTIVE, if body.active { "true" } else { "false" })
        .await
        .map_err(internal)?;
    store
        .append_log(if body.active {
            "Bot activated"
        } else {
            "Bot deactivated"
        })
        .await
        .map_err(internal)?;

    Ok(Json(serde_json::json!({ "bot_active": body.active })))
}

/// POST /api/v1/whitelist — Add a user (by handle) to the whitelist.
pub async fn add_whitelist(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<WhitelistRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    auth::check_auth(&state, &headers)?;

    let handle = body.screen_name.trim().trim_start_matches('@').to_string();
    if handle.is_empty() {
        return Err(bad_request("screen_name cannot be empty"));
    }

    let Some(ref session) = state.engine.session else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: FlockError::NoSession.to_string(),
            }),
        ));
    };

    let user = match state.engine.gateway.resolve_user(session, &handle).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: FlockError::UserNotFound { handle }.to_string(),
                }),
            ));
        }
        Err(e) => {
            return Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ));
        }
    };

    // Persist the gateway's canonical screen name, not the operator-typed
    // handle.
    let store = &state.engine.store;
    let inserted = store
        .insert_whitelisted(user.id.clone(), user.screen_name.clone())
        .await
        .map_err(internal)?;
    if inserted {
        store
            .append_log(format!("Added @{} to whitelist", user.screen_name))
            .await
            .map_err(internal)?;
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "user_id": user.id, "screen_name": user.screen_name })),
    ))
}

/// DELETE /api/v1/whitelist/{user_id} — Remove a whitelist entry.
pub async fn remove_whitelist(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    auth::check_auth(&state, &headers)?;
    let store = &state.engine.store;

    match store.remove_whitelisted(&user_id).await.map_err(internal)? {
        Some(screen_name) => {
            store
                .append_log(format!("Removed @{screen_name} from whitelist"))
                .await
                .map_err(internal)?;
            Ok(Json(serde_json::json!({ "removed": user_id })))
        }
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No whitelist entry for '{user_id}'"),
            }),
        )),
    }
}

/// POST /api/v1/run/{task} — Manually trigger one cycle. Unlike scheduled
/// fires, failures propagate to the operator.
pub async fn run_task(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(task): Path<String>,
) -> Result<Json<TriggerResponse>, ApiError> {
    auth::check_auth(&state, &headers)?;

    let task: Task = task.parse().map_err(|_| bad_request("Invalid task"))?;

    match trigger_cycle(&state.engine, task).await {
        Ok(TriggerOutcome::Ran(report)) => Ok(Json(TriggerResponse {
            task: task.as_str().to_string(),
            report,
        })),
        Ok(TriggerOutcome::AlreadyRunning) => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("{} cycle already running", task.as_str()),
            }),
        )),
        Err(e) => Err(internal(e)),
    }
}

/// GET /api/v1/status — Current settings plus store counts.
pub async fn get_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, ApiError> {
    auth::check_auth(&state, &headers)?;
    let store = &state.engine.store;

    let bot_active = store.get_setting(keys::BOT_ACTIVE).await.map_err(internal)?;
    let target = store
        .get_setting(keys::TARGET_PROFILE)
        .await
        .map_err(internal)?
        .filter(|v| !v.is_empty());
    let limit = store
        .get_setting(keys::DAILY_FOLLOW_LIMIT)
        .await
        .map_err(internal)?
        .unwrap_or_else(|| "100".into());
    let delay = store
        .get_setting(keys::UNFOLLOW_DELAY)
        .await
        .map_err(internal)?
        .unwrap_or_else(|| "7".into());
    let filter = store.get_setting(keys::FILTER_ACTIVE).await.map_err(internal)?;

    let followed_count = store.count_followed().await.map_err(internal)?;
    let whitelist_count = store.whitelist().await.map_err(internal)?.len();

    Ok(Json(StatusResponse {
        bot_active: bot_active.as_deref() != Some("false"),
        target_profile: target,
        daily_follow_limit: limit,
        unfollow_delay: delay,
        filter_active: filter.as_deref() == Some("true"),
        followed_count,
        whitelist_count,
        session_present: state.engine.session.is_some(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_log_limit")]
    pub limit: u32,
}

fn default_log_limit() -> u32 {
    50
}

/// GET /api/v1/logs — Recent audit log entries, newest first.
pub async fn get_logs(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    auth::check_auth(&state, &headers)?;

    let logs = state
        .engine
        .store
        .recent_logs(query.limit)
        .await
        .map_err(internal)?;
    Ok(Json(logs))
}

/// GET /api/v1/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
