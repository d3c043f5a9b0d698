// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Input checks for the administrative operations.
//!
//! Each check returns `SetupError::InvalidParameters` with a message naming
//! the offending field. Messages never include submitted values.

use base64ct::{Base64, Encoding};

use super::SetupError;

/// Minimum keystore password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

fn invalid(message: &str) -> SetupError {
    SetupError::InvalidParameters(message.to_string())
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, SetupError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SetupError::InvalidParameters(format!("{field} is required"))),
    }
}

fn strong_enough(password: &str, field: &str) -> Result<(), SetupError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(SetupError::InvalidParameters(format!(
            "{field} must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Provisioning: both fields present, equal, long enough.
pub fn validate_provision<'a>(
    password: Option<&'a str>,
    confirm_password: Option<&str>,
) -> Result<&'a str, SetupError> {
    let password = required(password, "password")?;
    let confirm = required(confirm_password, "confirm_password")?;
    if password != confirm {
        return Err(invalid("Passwords do not match"));
    }
    strong_enough(password, "password")?;
    Ok(password)
}

/// Rotation and reset share the new-password rules: present, confirmed,
/// long enough.
fn validate_new_password<'a>(
    new_password: Option<&'a str>,
    confirm_password: Option<&str>,
) -> Result<&'a str, SetupError> {
    let new_password = required(new_password, "new_password")?;
    let confirm = required(confirm_password, "confirm_password")?;
    if confirm != new_password {
        return Err(invalid("New passwords do not match"));
    }
    strong_enough(new_password, "new_password")?;
    Ok(new_password)
}

/// Rotation: `(current, new)`.
pub fn validate_rotation<'a>(
    current_password: Option<&'a str>,
    new_password: Option<&'a str>,
    confirm_password: Option<&str>,
) -> Result<(&'a str, &'a str), SetupError> {
    let current = required(current_password, "current_password")?;
    let new_password = validate_new_password(new_password, confirm_password)?;
    Ok((current, new_password))
}

/// Forced reset: `(admin, new)`.
pub fn validate_reset<'a>(
    admin_password: Option<&'a str>,
    new_password: Option<&'a str>,
    confirm_password: Option<&str>,
) -> Result<(&'a str, &'a str), SetupError> {
    let admin = required(admin_password, "admin_password")?;
    let new_password = validate_new_password(new_password, confirm_password)?;
    Ok((admin, new_password))
}

pub fn validate_backup(password: Option<&str>) -> Result<&str, SetupError> {
    required(password, "password")
}

/// Restore: decoded container bytes and the password to open them.
///
/// Whitespace inside `data` (line-wrapped base64) is ignored.
pub fn validate_restore<'a>(
    data: Option<&str>,
    password: Option<&'a str>,
) -> Result<(Vec<u8>, &'a str), SetupError> {
    let data = required(data, "data")?;
    let password = required(password, "password")?;

    let compact: String = data.split_whitespace().collect();
    let bytes = Base64::decode_vec(&compact).map_err(|_| invalid("data is not valid base64"))?;
    if bytes.is_empty() {
        return Err(invalid("data is required"));
    }
    Ok((bytes, password))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: SetupError) -> String {
        match err {
            SetupError::InvalidParameters(msg) => msg,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn provision_rules() {
        assert_eq!(
            validate_provision(Some("long-enough"), Some("long-enough")).unwrap(),
            "long-enough"
        );
        assert_eq!(
            message(validate_provision(None, Some("x")).unwrap_err()),
            "password is required"
        );
        assert_eq!(
            message(validate_provision(Some("long-enough"), None).unwrap_err()),
            "confirm_password is required"
        );
        assert_eq!(
            message(validate_provision(Some("long-enough"), Some("different!")).unwrap_err()),
            "Passwords do not match"
        );
        assert!(message(validate_provision(Some("short"), Some("short")).unwrap_err())
            .contains("at least 8"));
    }

    #[test]
    fn length_counts_characters() {
        // 8 multi-byte characters
        assert!(validate_provision(Some("비밀번호비밀번호"), Some("비밀번호비밀번호")).is_ok());
        assert!(validate_provision(Some("비밀번호"), Some("비밀번호")).is_err());
    }

    #[test]
    fn rotation_rules() {
        assert_eq!(
            validate_rotation(Some("old"), Some("new-password"), Some("new-password")).unwrap(),
            ("old", "new-password")
        );
        assert!(validate_rotation(None, Some("new-password"), Some("new-password")).is_err());
        assert!(validate_rotation(Some("old"), Some("short"), Some("short")).is_err());
        assert_eq!(
            message(
                validate_rotation(Some("old"), Some("new-password"), Some("other-password"))
                    .unwrap_err()
            ),
            "New passwords do not match"
        );
    }

    #[test]
    fn new_password_must_be_confirmed() {
        assert_eq!(
            message(validate_rotation(Some("old"), Some("new-password"), None).unwrap_err()),
            "confirm_password is required"
        );
        assert_eq!(
            message(validate_reset(Some("admin"), Some("new-password"), Some("")).unwrap_err()),
            "confirm_password is required"
        );
    }

    #[test]
    fn reset_rules() {
        assert!(validate_reset(Some("admin"), Some("new-password"), Some("new-password")).is_ok());
        assert_eq!(
            message(validate_reset(Some(""), Some("new-password"), Some("new-password")).unwrap_err()),
            "admin_password is required"
        );
    }

    #[test]
    fn restore_rules() {
        let (bytes, password) = validate_restore(Some("aGVs\nbG8="), Some("pw")).unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(password, "pw");

        assert_eq!(
            message(validate_restore(Some("!!!"), Some("pw")).unwrap_err()),
            "data is not valid base64"
        );
        assert!(validate_restore(None, Some("pw")).is_err());
        assert!(validate_restore(Some("aGVsbG8="), None).is_err());
    }

    #[test]
    fn backup_requires_password() {
        assert!(validate_backup(Some("pw")).is_ok());
        assert!(validate_backup(None).is_err());
    }
}
