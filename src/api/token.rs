// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Query, State},
    Json,
};

use super::run_blocking;
use crate::{
    error::{ApiError, ErrorBody},
    models::{TokenParams, TokenResponse},
    session::SessionId,
    state::AppState,
};

/// Issue a token from query parameters.
#[utoipa::path(
    get,
    path = "/v1/token",
    params(TokenParams),
    tag = "Token",
    responses(
        (status = 200, body = TokenResponse),
        (status = 400, description = "Missing or invalid claims", body = ErrorBody),
        (status = 401, description = "No usable keystore password", body = ErrorBody),
        (status = 503, description = "Keystore not set up", body = ErrorBody)
    )
)]
pub async fn issue_token_query(
    State(state): State<AppState>,
    session: SessionId,
    Query(params): Query<TokenParams>,
) -> Result<Json<TokenResponse>, ApiError> {
    issue(state, session, params).await
}

/// Issue a token from a JSON body.
#[utoipa::path(
    post,
    path = "/v1/token",
    request_body = TokenParams,
    tag = "Token",
    responses(
        (status = 200, body = TokenResponse),
        (status = 400, description = "Missing or invalid claims", body = ErrorBody),
        (status = 401, description = "No usable keystore password", body = ErrorBody),
        (status = 503, description = "Keystore not set up", body = ErrorBody)
    )
)]
pub async fn issue_token_json(
    State(state): State<AppState>,
    session: SessionId,
    Json(params): Json<TokenParams>,
) -> Result<Json<TokenResponse>, ApiError> {
    issue(state, session, params).await
}

async fn issue(
    state: AppState,
    session: SessionId,
    params: TokenParams,
) -> Result<Json<TokenResponse>, ApiError> {
    let exp = params.exp.map(|e| e.into_raw()).unwrap_or_default();
    let iss = params.iss.unwrap_or_default();
    let sub = params.sub.unwrap_or_default();

    let issued = run_blocking(&state, move |lifecycle| {
        lifecycle.issue(session.as_deref(), &exp, &iss, &sub)
    })
    .await?
    .map_err(ApiError::from_signing)?;

    Ok(Json(TokenResponse {
        success: true,
        jwt: issued.jwt,
        public_key: issued.public_key_pem,
    }))
}
