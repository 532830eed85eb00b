use garde::Validate;
use serde::Deserialize;

use crate::error::{AppError, Result};

/// The request payload for user registration.
#[derive(Deserialize, Validate, Debug)]
pub struct RegisterRequest {
    #[serde(default)]
    #[garde(email, length(max = 255))]
    pub email: String,
    #[serde(default)]
    #[garde(length(min = 1, max = 128))]
    pub password: String,
}

/// The request payload for user login.
#[derive(Deserialize, Validate, Debug)]
pub struct LoginRequest {
    #[serde(default)]
    #[garde(length(min = 1, max = 255))]
    pub email: String,
    #[serde(default)]
    #[garde(length(min = 1, max = 128))]
    pub password: String,
}

/// Runs the garde rules on `payload` and reports the first violation.
///
/// # Arguments
///
/// * `payload` - The deserialized request body.
///
/// # Returns
///
/// A `Result<()>`; `AppError::Validation` names the offending field.
pub fn validate_payload<T>(payload: &T) -> Result<()>
where
    T: Validate<Context = ()>,
{
    payload.validate().map_err(|report| {
        let message = report
            .iter()
            .next()
            .map(|(path, error)| format!("{}: {}", path, error))
            .unwrap_or_else(|| "Invalid request".to_string());
        AppError::Validation(message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn accepts_a_well_formed_registration() {
        assert!(validate_payload(&register("a@x.com", "password-one")).is_ok());
    }

    #[test]
    fn rejects_malformed_email() {
        let err = validate_payload(&register("not-an-email", "password-one")).unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.starts_with("email")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn any_non_empty_password_up_to_the_cap_is_accepted() {
        assert!(validate_payload(&register("a@x.com", "pw1")).is_ok());
        assert!(validate_payload(&register("a@x.com", "")).is_err());
        assert!(validate_payload(&register("a@x.com", &"p".repeat(129))).is_err());
    }

    #[test]
    fn missing_fields_deserialize_empty_and_fail_validation() {
        let request: RegisterRequest = serde_json::from_str(r#"{"password":"pw1"}"#).unwrap();
        assert!(matches!(validate_payload(&request), Err(AppError::Validation(_))));

        let login: LoginRequest = serde_json::from_str(r#"{"email":"a@x.com"}"#).unwrap();
        assert!(matches!(validate_payload(&login), Err(AppError::Validation(_))));
    }

    #[test]
    fn login_only_needs_both_fields() {
        let empty = LoginRequest {
            email: String::new(),
            password: "whatever".to_string(),
        };
        assert!(validate_payload(&empty).is_err());
    }
}
