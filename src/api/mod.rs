// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::{ApiError, ErrorBody},
    models::{
        BackupRequest, BackupResponse, ProvisionRequest, ResetRequest, RestoreRequest,
        RotatePasswordRequest, SetupResponse, SetupStatusResponse, TokenParams, TokenResponse,
    },
    setup::{SetupLifecycle, SetupResult},
    state::AppState,
};

pub mod health;
pub mod setup;
pub mod token;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/token",
            get(token::issue_token_query).post(token::issue_token_json),
        )
        .route(
            "/setup",
            get(setup::setup_status)
                .post(setup::provision)
                .delete(setup::destroy),
        )
        .route("/setup/password", post(setup::rotate_password))
        .route("/setup/backup", post(setup::backup))
        .route("/setup/restore", post(setup::restore))
        .route("/setup/reset", post(setup::force_reset))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run a lifecycle call on the blocking pool. Keystore work is PBKDF2 and
/// file I/O and must not stall the async workers.
pub(crate) async fn run_blocking<T, F>(state: &AppState, op: F) -> Result<SetupResult<T>, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&SetupLifecycle) -> SetupResult<T> + Send + 'static,
{
    let lifecycle = Arc::clone(&state.lifecycle);
    tokio::task::spawn_blocking(move || op(&lifecycle))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Keystore task failed");
            ApiError::internal("Internal error while processing the keystore")
        })
}

#[derive(OpenApi)]
#[openapi(
    paths(
        token::issue_token_query,
        token::issue_token_json,
        setup::setup_status,
        setup::provision,
        setup::rotate_password,
        setup::backup,
        setup::restore,
        setup::force_reset,
        setup::destroy,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            TokenParams,
            TokenResponse,
            SetupStatusResponse,
            SetupResponse,
            ProvisionRequest,
            RotatePasswordRequest,
            BackupRequest,
            BackupResponse,
            RestoreRequest,
            ResetRequest,
            ErrorBody,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Token", description = "ES256 token issuance"),
        (name = "Setup", description = "Keystore provisioning and administration"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
