// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request and response bodies of the HTTP API.
//!
//! Field names are snake_case; the camelCase names older clients send
//! (`confirmPassword`, `adminPassword`, ...) are accepted as aliases.
//! Password-bearing requests wipe their fields on drop and do not
//! implement `Debug`.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// `exp` as sent by the client. Any JSON value is accepted here so that
/// non-integers are rejected by claim validation, not by body parsing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExpParam {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

impl ExpParam {
    pub fn into_raw(self) -> String {
        match self {
            ExpParam::Number(n) => n.to_string(),
            ExpParam::Text(s) => s,
            ExpParam::Other(value) => value.to_string(),
        }
    }
}

/// Token claims requested by the caller.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct TokenParams {
    /// Expiry as Unix seconds.
    #[schema(value_type = Option<i64>, example = 9999999999i64)]
    #[param(value_type = Option<i64>)]
    pub exp: Option<ExpParam>,
    #[schema(example = "svc")]
    pub iss: Option<String>,
    #[schema(example = "user1")]
    pub sub: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub success: bool,
    /// Compact ES256 JWT.
    pub jwt: String,
    /// PEM `PUBLIC KEY` that verifies `jwt`.
    pub public_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetupStatusResponse {
    pub setup_completed: bool,
}

/// Outcome of an administrative operation.
#[derive(Debug, Serialize, ToSchema)]
pub struct SetupResponse {
    pub success: bool,
    pub message: String,
    /// Session now holding the keystore password. Also sent as `x-session-id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

#[derive(Deserialize, ToSchema, Zeroize, ZeroizeOnDrop)]
pub struct ProvisionRequest {
    pub password: Option<String>,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: Option<String>,
}

#[derive(Deserialize, ToSchema, Zeroize, ZeroizeOnDrop)]
pub struct RotatePasswordRequest {
    #[serde(alias = "currentPassword")]
    pub current_password: Option<String>,
    #[serde(alias = "newPassword")]
    pub new_password: Option<String>,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: Option<String>,
}

#[derive(Deserialize, ToSchema, Zeroize, ZeroizeOnDrop)]
pub struct BackupRequest {
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BackupResponse {
    pub success: bool,
    /// Base64 keystore container.
    pub data: String,
    /// Suggested file name, e.g. `keystore-2026-01-15.p8ks`.
    pub filename: String,
}

#[derive(Deserialize, ToSchema, Zeroize, ZeroizeOnDrop)]
pub struct RestoreRequest {
    /// Base64 keystore container from a backup.
    pub data: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, ToSchema, Zeroize, ZeroizeOnDrop)]
pub struct ResetRequest {
    /// Current keystore password.
    #[serde(alias = "adminPassword")]
    pub admin_password: Option<String>,
    #[serde(alias = "newPassword")]
    pub new_password: Option<String>,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_accepts_number_or_string() {
        let params: TokenParams =
            serde_json::from_str(r#"{"exp":9999999999,"iss":"svc","sub":"user1"}"#).unwrap();
        assert_eq!(params.exp.unwrap().into_raw(), "9999999999");

        let params: TokenParams = serde_json::from_str(r#"{"exp":"not-a-number"}"#).unwrap();
        assert_eq!(params.exp.unwrap().into_raw(), "not-a-number");
        assert!(params.iss.is_none());
    }

    #[test]
    fn exp_keeps_non_integer_values() {
        for (body, raw) in [
            (r#"{"exp":1.5}"#, "1.5"),
            (r#"{"exp":true}"#, "true"),
            (r#"{"exp":null}"#, ""),
        ] {
            let params: TokenParams = serde_json::from_str(body).unwrap();
            assert_eq!(params.exp.map(ExpParam::into_raw).unwrap_or_default(), raw);
        }

        let params: TokenParams = serde_json::from_str(r#"{"exp":99999999999999999999}"#).unwrap();
        assert!(params.exp.unwrap().into_raw().parse::<i64>().is_err());
    }

    #[test]
    fn camel_case_aliases() {
        let req: ResetRequest = serde_json::from_str(
            r#"{"adminPassword":"a","newPassword":"b","confirmPassword":"c"}"#,
        )
        .unwrap();
        assert_eq!(req.admin_password.as_deref(), Some("a"));
        assert_eq!(req.new_password.as_deref(), Some("b"));
        assert_eq!(req.confirm_password.as_deref(), Some("c"));
    }
}
