// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keystore administration endpoints.
//!
//! Operations that leave the caller holding a working password answer with
//! the session id, both in the body and in the `x-session-id` header, so
//! later token requests on that session can open the keystore.

use axum::{extract::State, http::StatusCode, Json};
use base64ct::{Base64, Encoding};

use super::run_blocking;
use crate::{
    error::{ApiError, ErrorBody},
    models::{
        BackupRequest, BackupResponse, ProvisionRequest, ResetRequest, RestoreRequest,
        RotatePasswordRequest, SetupResponse, SetupStatusResponse,
    },
    session::{SessionId, SESSION_HEADER},
    state::AppState,
};

type SessionReply = (StatusCode, [(&'static str, String); 1], Json<SetupResponse>);

fn session_reply(
    status: StatusCode,
    session_id: String,
    message: &str,
    public_key: Option<String>,
) -> SessionReply {
    (
        status,
        [(SESSION_HEADER, session_id.clone())],
        Json(SetupResponse {
            success: true,
            message: message.to_string(),
            session_id: Some(session_id),
            public_key,
        }),
    )
}

#[utoipa::path(
    get,
    path = "/v1/setup",
    tag = "Setup",
    responses((status = 200, body = SetupStatusResponse))
)]
pub async fn setup_status(
    State(state): State<AppState>,
) -> Result<Json<SetupStatusResponse>, ApiError> {
    let setup_completed =
        run_blocking(&state, |lifecycle| Ok(lifecycle.is_provisioned())).await??;
    Ok(Json(SetupStatusResponse { setup_completed }))
}

/// First-time provisioning.
#[utoipa::path(
    post,
    path = "/v1/setup",
    request_body = ProvisionRequest,
    tag = "Setup",
    responses(
        (status = 201, body = SetupResponse),
        (status = 400, description = "Invalid password", body = ErrorBody),
        (status = 409, description = "Already provisioned", body = ErrorBody)
    )
)]
pub async fn provision(
    State(state): State<AppState>,
    session: SessionId,
    Json(request): Json<ProvisionRequest>,
) -> Result<SessionReply, ApiError> {
    let session_id = session.or_new();
    let id = session_id.clone();
    let summary = run_blocking(&state, move |lifecycle| {
        lifecycle.provision(
            &id,
            request.password.as_deref(),
            request.confirm_password.as_deref(),
        )
    })
    .await??;

    Ok(session_reply(
        StatusCode::CREATED,
        session_id,
        "Keystore created",
        Some(summary.public_key_pem),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/setup/password",
    request_body = RotatePasswordRequest,
    tag = "Setup",
    responses(
        (status = 200, body = SetupResponse),
        (status = 400, description = "Invalid new password", body = ErrorBody),
        (status = 401, description = "Current password rejected", body = ErrorBody),
        (status = 409, description = "Not provisioned", body = ErrorBody)
    )
)]
pub async fn rotate_password(
    State(state): State<AppState>,
    session: SessionId,
    Json(request): Json<RotatePasswordRequest>,
) -> Result<SessionReply, ApiError> {
    let session_id = session.or_new();
    let id = session_id.clone();
    run_blocking(&state, move |lifecycle| {
        lifecycle.rotate(
            &id,
            request.current_password.as_deref(),
            request.new_password.as_deref(),
            request.confirm_password.as_deref(),
        )
    })
    .await??;

    Ok(session_reply(
        StatusCode::OK,
        session_id,
        "Keystore password changed",
        None,
    ))
}

/// Download the container. The password is checked but the session is
/// left unchanged.
#[utoipa::path(
    post,
    path = "/v1/setup/backup",
    request_body = BackupRequest,
    tag = "Setup",
    responses(
        (status = 200, body = BackupResponse),
        (status = 401, description = "Password rejected", body = ErrorBody),
        (status = 409, description = "Not provisioned", body = ErrorBody)
    )
)]
pub async fn backup(
    State(state): State<AppState>,
    session: SessionId,
    Json(request): Json<BackupRequest>,
) -> Result<Json<BackupResponse>, ApiError> {
    let backup = run_blocking(&state, move |lifecycle| {
        lifecycle.backup(session.as_deref(), request.password.as_deref())
    })
    .await??;

    Ok(Json(BackupResponse {
        success: true,
        data: Base64::encode_string(&backup.data),
        filename: backup.filename,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/setup/restore",
    request_body = RestoreRequest,
    tag = "Setup",
    responses(
        (status = 200, body = SetupResponse),
        (status = 400, description = "Missing or undecodable data", body = ErrorBody),
        (status = 401, description = "Backup does not open with password", body = ErrorBody)
    )
)]
pub async fn restore(
    State(state): State<AppState>,
    session: SessionId,
    Json(request): Json<RestoreRequest>,
) -> Result<SessionReply, ApiError> {
    let session_id = session.or_new();
    let id = session_id.clone();
    let summary = run_blocking(&state, move |lifecycle| {
        lifecycle.restore(&id, request.data.as_deref(), request.password.as_deref())
    })
    .await??;

    Ok(session_reply(
        StatusCode::OK,
        session_id,
        "Keystore restored",
        Some(summary.public_key_pem),
    ))
}

/// Replace the keypair under a new password.
#[utoipa::path(
    post,
    path = "/v1/setup/reset",
    request_body = ResetRequest,
    tag = "Setup",
    responses(
        (status = 200, body = SetupResponse),
        (status = 400, description = "Invalid new password", body = ErrorBody),
        (status = 401, description = "Admin password rejected", body = ErrorBody),
        (status = 409, description = "Not provisioned", body = ErrorBody)
    )
)]
pub async fn force_reset(
    State(state): State<AppState>,
    session: SessionId,
    Json(request): Json<ResetRequest>,
) -> Result<SessionReply, ApiError> {
    let session_id = session.or_new();
    let id = session_id.clone();
    let summary = run_blocking(&state, move |lifecycle| {
        lifecycle.force_reset(
            &id,
            request.admin_password.as_deref(),
            request.new_password.as_deref(),
            request.confirm_password.as_deref(),
        )
    })
    .await??;

    Ok(session_reply(
        StatusCode::OK,
        session_id,
        "Keystore reset with a new keypair",
        Some(summary.public_key_pem),
    ))
}

/// Keystore deletion. Always refused.
#[utoipa::path(
    delete,
    path = "/v1/setup",
    tag = "Setup",
    responses((status = 403, description = "Deletion is disabled", body = ErrorBody))
)]
pub async fn destroy(
    State(state): State<AppState>,
    session: SessionId,
) -> Result<StatusCode, ApiError> {
    run_blocking(&state, move |lifecycle| lifecycle.destroy(session.as_deref())).await??;
    Ok(StatusCode::NO_CONTENT)
}
