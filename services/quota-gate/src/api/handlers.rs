use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::gate::{QuotaDecision, QuotaError};

use super::types::{
    ChargeRequest, ChargeResponse, DecisionKind, ErrorResponse, LimitsResponse, UsageQuery,
    UsageResponse,
};
use super::ApiState;

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn charge(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChargeRequest>,
) -> Result<(StatusCode, Json<ChargeResponse>), ApiError> {
    let device_id = request.device_id.trim().to_string();
    if device_id.is_empty() {
        return Err(bad_request("invalid_device_id", "device_id cannot be empty"));
    }

    let requested_chars = match (request.requested_chars, request.text.as_deref()) {
        (Some(count), _) => count,
        (None, Some(text)) if !text.trim().is_empty() => text.len() as u64,
        _ => {
            return Err(bad_request(
                "invalid_request",
                "either requested_chars or a non-empty text is required",
            ))
        }
    };
    let tier = request.tier;

    let gate = Arc::clone(&state.gate);
    let charged_device = device_id.clone();
    let result = tokio::task::spawn_blocking(move || {
        gate.check_and_charge(&charged_device, requested_chars, tier, Utc::now())
    })
    .await
    .map_err(internal_error)?;

    let mut response = ChargeResponse {
        decision: DecisionKind::Allowed,
        device_id,
        tier,
        requested_chars,
        usage: Vec::new(),
        denial: None,
    };

    match result {
        Ok(QuotaDecision::Allowed { usage }) => {
            response.usage = usage;
            Ok((StatusCode::OK, Json(response)))
        }
        Ok(QuotaDecision::Bypassed { .. }) => {
            response.decision = DecisionKind::Bypassed;
            Ok((StatusCode::OK, Json(response)))
        }
        Ok(QuotaDecision::Denied(denial)) => {
            response.decision = DecisionKind::Denied;
            response.denial = Some(denial);
            Ok((StatusCode::TOO_MANY_REQUESTS, Json(response)))
        }
        Err(err) if err.is_store_failure() => {
            if state.config.failure_mode.admits_on_outage() {
                warn!(
                    device_id = %response.device_id,
                    requested_chars,
                    error = %err,
                    "usage store failed, admitting request unmetered"
                );
                response.decision = DecisionKind::Unmetered;
                Ok((StatusCode::OK, Json(response)))
            } else {
                error!(
                    device_id = %response.device_id,
                    error = %err,
                    "usage store failed, refusing request"
                );
                Err(service_unavailable(
                    "quota_unavailable",
                    "usage accounting is temporarily unavailable",
                ))
            }
        }
        Err(QuotaError::InvalidDeviceId) => Err(bad_request(
            "invalid_device_id",
            "device_id cannot be empty",
        )),
        Err(err) => Err(internal_error(err)),
    }
}

pub async fn get_usage(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
    Query(query): Query<UsageQuery>,
) -> ApiResult<UsageResponse> {
    let tier = query.tier.unwrap_or_default();
    let gate = Arc::clone(&state.gate);

    let report = tokio::task::spawn_blocking(move || gate.usage(&device_id, tier, Utc::now()))
        .await
        .map_err(internal_error)?;

    match report {
        Ok(report) => Ok(Json(UsageResponse {
            report,
            limits: state.gate.cache().get().limits,
        })),
        Err(QuotaError::InvalidDeviceId) => Err(bad_request(
            "invalid_device_id",
            "device_id cannot be empty",
        )),
        Err(err) if err.is_store_failure() => Err(service_unavailable(
            "quota_unavailable",
            "usage accounting is temporarily unavailable",
        )),
        Err(err) => Err(internal_error(err)),
    }
}

pub async fn get_limits(State(state): State<Arc<ApiState>>) -> ApiResult<LimitsResponse> {
    let cache = state.gate.cache();
    let snapshot = cache.get();

    Ok(Json(LimitsResponse {
        limits: snapshot.limits,
        fetched_at: snapshot.fetched_at,
        consecutive_failures: cache.consecutive_failures(),
    }))
}

pub async fn refresh_limits(State(state): State<Arc<ApiState>>) -> ApiResult<LimitsResponse> {
    let cache = state.gate.cache();

    match cache.try_refresh().await {
        Ok(snapshot) => {
            info!(limits = ?snapshot.limits, "limits refreshed on demand");
            Ok(Json(LimitsResponse {
                limits: snapshot.limits,
                fetched_at: snapshot.fetched_at,
                consecutive_failures: 0,
            }))
        }
        Err(err) => {
            error!(error = %err, "on-demand limits refresh failed");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: "limits provider failed, previous limits kept".to_string(),
                    code: "limits_refresh_failed".to_string(),
                    details: Some(serde_json::json!({ "message": err.to_string() })),
                }),
            ))
        }
    }
}

pub async fn health_check(State(state): State<Arc<ApiState>>) -> ApiResult<serde_json::Value> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": "tts-quota-gate",
        "policy": state.gate.policy().name(),
        "failure_mode": state.config.failure_mode.to_string(),
        "limits_refresh_failures": state.gate.cache().consecutive_failures(),
    })))
}

fn bad_request(code: &str, message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
            details: None,
        }),
    )
}

fn service_unavailable(code: &str, message: &str) -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
            details: None,
        }),
    )
}

fn internal_error<E: std::fmt::Display>(err: E) -> ApiError {
    error!(error = %err, "quota API internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal server error".to_string(),
            code: "internal_error".to_string(),
            details: Some(serde_json::json!({ "message": err.to_string() })),
        }),
    )
}
