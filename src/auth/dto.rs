use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::AuthError;

pub const NAME_LEN: (usize, usize) = (2, 100);
pub const PASSWORD_LEN: (usize, usize) = (6, 128);
pub const RESET_CODE_LEN: usize = 6;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
}

pub(crate) fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(AuthError::Validation("Invalid email".into()));
    }
    Ok(email)
}

fn check_len(field: &str, value: &str, (min, max): (usize, usize)) -> Result<(), AuthError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AuthError::Validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    pub fn validate(mut self) -> Result<Self, AuthError> {
        self.name = self.name.trim().to_string();
        check_len("name", &self.name, NAME_LEN)?;
        self.email = normalize_email(&self.email)?;
        check_len("password", &self.password, PASSWORD_LEN)?;
        Ok(self)
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(mut self) -> Result<Self, AuthError> {
        self.email = normalize_email(&self.email)?;
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl ForgotPasswordRequest {
    pub fn validate(mut self) -> Result<Self, AuthError> {
        self.email = normalize_email(&self.email)?;
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

impl ResetPasswordRequest {
    pub fn validate(mut self) -> Result<Self, AuthError> {
        self.email = normalize_email(&self.email)?;
        check_len("code", &self.code, (RESET_CODE_LEN, RESET_CODE_LEN))?;
        check_len("new_password", &self.new_password, PASSWORD_LEN)?;
        Ok(self)
    }
}

/// Body returned by every auth endpoint.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AuthResponse {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}
