use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use crate::{
    storage::{models::TriggerSource, ProviderRole, ProviderStore},
    verification::PassSummary,
};
use super::{auth::authorize, error::ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct TriggerQuery {
    role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TriggerResponse {
    pub success: bool,
    pub role: ProviderRole,
    pub verified: usize,
    pub revoked: usize,
    pub failed: usize,
    pub total: usize,
    pub dry_run: bool,
    pub failed_providers: Vec<String>,
}

impl From<&PassSummary> for TriggerResponse {
    fn from(summary: &PassSummary) -> Self {
        Self {
            success: true,
            role: summary.role,
            verified: summary.verified,
            revoked: summary.revoked,
            failed: summary.failed,
            total: summary.total,
            dry_run: summary.dry_run,
            failed_providers: summary
                .failures
                .iter()
                .map(|f| f.provider_id.clone())
                .collect(),
        }
    }
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Cron entry point. Rate limit, then authorize, then run one pass.
pub async fn trigger_handler<S: ProviderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<TriggerQuery>,
    headers: HeaderMap,
) -> Result<Json<TriggerResponse>, ApiError> {
    state.rate_limiter.check(addr.ip())?;

    authorize(&headers, state.config.trigger.cron_secret.as_deref()).map_err(|_| {
        warn!("Rejected verification trigger from {}: bad or missing secret", addr.ip());
        ApiError::Unauthorized
    })?;

    let role = match query.role.as_deref() {
        Some(raw) => raw
            .parse::<ProviderRole>()
            .map_err(|_| ApiError::InvalidRole(raw.to_string()))?,
        None => state.config.trigger.default_role,
    };

    match state.runner.run_pass(role, TriggerSource::Http).await {
        Ok(summary) => {
            let response = TriggerResponse::from(&summary);
            if state.notifier.is_some() {
                tokio::spawn(async move {
                    if let Some(notifier) = &state.notifier {
                        notifier.notify_pass_complete(&summary).await;
                    }
                });
            }
            Ok(Json(response))
        }
        Err(e) => {
            error!("Verification pass triggered by {} failed: {}", addr.ip(), e);
            let reason = e.to_string();
            if state.notifier.is_some() {
                let message = reason.clone();
                tokio::spawn(async move {
                    if let Some(notifier) = &state.notifier {
                        notifier.notify_pass_failed(role, &message).await;
                    }
                });
            }
            Err(ApiError::PassFailed(reason))
        }
    }
}
