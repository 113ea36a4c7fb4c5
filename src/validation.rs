// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request bodies for the JSON API and their input rules.
//!
//! A failed check surfaces a single message: the first failing field in
//! declaration order, and for that field the first failing rule.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{AppError, GENERIC_ERROR};

/// A request body with a fixed field order for error reporting.
pub trait Schema: Validate {
    const FIELDS: &'static [&'static str];
}

/// Run the rules for `input`, mapping failures to `AppError::Validation`.
pub fn check<T: Schema>(input: &T) -> Result<(), AppError> {
    match input.validate() {
        Ok(()) => Ok(()),
        Err(errors) => Err(AppError::Validation(first_message(&errors, T::FIELDS))),
    }
}

fn first_message(errors: &ValidationErrors, order: &[&str]) -> String {
    let fields = errors.field_errors();
    order
        .iter()
        .filter_map(|field| fields.get(*field))
        .filter_map(|errs| errs.first())
        .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| GENERIC_ERROR.to_string())
}

// ─── Password rules ──────────────────────────────────────────────

const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?`~";

fn password_rules(value: &str, label: &str) -> Result<(), ValidationError> {
    let fail = |message: String| {
        Err(ValidationError::new("password").with_message(Cow::Owned(message)))
    };

    if value.is_empty() {
        return Ok(()); // reported by the required rule
    }
    if value.chars().count() < 8 {
        return fail(format!("\"{label}\" length must be at least 8 characters long"));
    }
    if !value.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return fail(format!("\"{label}\" should contain at least 1 special character"));
    }
    if !value.chars().any(|c| c.is_lowercase()) {
        return fail(format!("\"{label}\" should contain at least 1 lowercase character"));
    }
    if !value.chars().any(|c| c.is_uppercase()) {
        return fail(format!("\"{label}\" should contain at least 1 uppercase character"));
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return fail(format!("\"{label}\" should contain at least 1 numeric character"));
    }
    if value.chars().any(char::is_whitespace) {
        return fail(format!("\"{label}\" should not contain white spaces"));
    }
    Ok(())
}

fn strong_password(value: &str) -> Result<(), ValidationError> {
    password_rules(value, "Password")
}

fn strong_old_password(value: &str) -> Result<(), ValidationError> {
    password_rules(value, "Old password")
}

// ─── Request bodies ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(
        length(min = 1, message = "\"Email\" is required"),
        email(message = "\"Email\" must be a valid email")
    )]
    pub email: String,
    /// Presence only. A weak password simply fails to match.
    #[serde(default)]
    #[validate(length(min = 1, message = "\"Password\" is required"))]
    pub password: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Schema for LoginRequest {
    const FIELDS: &'static [&'static str] = &["email", "password"];
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignUpEmailRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "\"Full name\" is required"))]
    pub full_name: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "\"Email\" is required"),
        email(message = "\"Email\" must be a valid email")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "\"Password\" is required"),
        custom(function = "strong_password")
    )]
    pub password: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "\"Confirm password\" is required"),
        must_match(other = "password", message = "\"Confirm password\" does not match")
    )]
    pub confirm_password: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Schema for SignUpEmailRequest {
    const FIELDS: &'static [&'static str] = &["full_name", "email", "password", "confirm_password"];
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignUpGoogleRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "\"Full name\" is required"))]
    pub full_name: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "\"Email\" is required"),
        email(message = "\"Email\" must be a valid email")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "\"Identity\" is required"))]
    pub google_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Schema for SignUpGoogleRequest {
    const FIELDS: &'static [&'static str] = &["full_name", "email", "google_id"];
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignUpFacebookRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "\"Full name\" is required"))]
    pub full_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "\"Identity\" is required"))]
    pub facebook_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Schema for SignUpFacebookRequest {
    const FIELDS: &'static [&'static str] = &["full_name", "facebook_id"];
}

/// Body for password reset and registration resend requests.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EmailRequest {
    #[serde(default)]
    #[validate(
        length(min = 1, message = "\"Email\" is required"),
        email(message = "\"Email\" must be a valid email")
    )]
    pub email: String,
}

impl Schema for EmailRequest {
    const FIELDS: &'static [&'static str] = &["email"];
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPasswordRequest {
    #[serde(default)]
    #[validate(length(
        min = 6,
        message = "\"Verification code\" length must be at least 6 characters long"
    ))]
    pub verification_code: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "\"Old password\" is required"),
        custom(function = "strong_old_password")
    )]
    pub old_password: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "\"Password\" is required"),
        custom(function = "strong_password")
    )]
    pub password: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "\"Confirm password\" is required"),
        must_match(other = "password", message = "\"Confirm password\" does not match")
    )]
    pub confirm_password: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Schema for NewPasswordRequest {
    const FIELDS: &'static [&'static str] =
        &["verification_code", "old_password", "password", "confirm_password"];
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterVerificationRequest {
    #[serde(default)]
    #[validate(length(
        min = 6,
        message = "\"Verification code\" length must be at least 6 characters long"
    ))]
    pub verification_code: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Schema for RegisterVerificationRequest {
    const FIELDS: &'static [&'static str] = &["verification_code"];
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VerificationCodeCheckRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "\"Action\" is required"))]
    pub action: String,
    #[serde(default)]
    #[validate(length(
        min = 6,
        message = "\"Verification code\" length must be at least 6 characters long"
    ))]
    pub verification_code: String,
}

impl Schema for VerificationCodeCheckRequest {
    const FIELDS: &'static [&'static str] = &["action", "verification_code"];
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DisplayNameRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "\"Display name\" is required"))]
    pub display_name: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Schema for DisplayNameRequest {
    const FIELDS: &'static [&'static str] = &["display_name"];
}

/// Body of `POST /api/user/session` and the display-name reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}
