//! Form inputs and JSON outputs for projects, configs and header replacements.
//!
//! Forms keep every field as raw text with `serde(default)`, so a missing
//! field surfaces as a field error rather than a decode failure.

use std::borrow::Cow;

use axum::http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::{LimitPeriod, ProjectResponse, RateLimitPolicy, UserResponse};

const NAME_MAX_CHARS: usize = 100;

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(field_error("required", "required"));
    }
    Ok(())
}

/// Names are stored trimmed, so the limit applies to the trimmed text.
fn validate_name(value: &str) -> Result<(), ValidationError> {
    validate_not_blank(value)?;
    if value.trim().chars().count() > NAME_MAX_CHARS {
        return Err(field_error("length", "must be at most 100 characters"));
    }
    Ok(())
}

fn validate_header_name(value: &str) -> Result<(), ValidationError> {
    validate_not_blank(value)?;
    HeaderName::from_bytes(value.as_bytes())
        .map(|_| ())
        .map_err(|_| field_error("header_name", "not a valid HTTP header name"))
}

/// The value is injected verbatim into proxied requests.
fn validate_header_value(value: &str) -> Result<(), ValidationError> {
    HeaderValue::from_str(value)
        .map(|_| ())
        .map_err(|_| field_error("header_value", "not a valid HTTP header value"))
}

fn validate_request_count(value: &str) -> Result<(), ValidationError> {
    match value.trim().parse::<i64>() {
        Ok(n) if n >= 1 => Ok(()),
        Ok(_) => Err(field_error("range", "must be at least 1")),
        Err(_) => Err(field_error("number", "must be a whole number")),
    }
}

fn validate_limit_period(value: &str) -> Result<(), ValidationError> {
    value
        .trim()
        .parse::<LimitPeriod>()
        .map(|_| ())
        .map_err(|_| {
            field_error(
                "period",
                "must be one of second, minute, hour, day, week, month, year, forever",
            )
        })
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateProjectForm {
    #[serde(default)]
    #[validate(custom(function = "validate_name"))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub description: Option<String>,
}

impl CreateProjectForm {
    pub fn name(&self) -> String {
        self.name.trim().to_string()
    }

    /// Blank descriptions are stored as absent.
    pub fn description(&self) -> Option<String> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
    }
}

/// Header replacement fields. The value never appears in `Debug` output.
#[derive(Default, Deserialize, Validate)]
pub struct CreateHeaderForm {
    #[serde(default, rename = "header-name")]
    #[validate(
        length(max = 256, message = "must be at most 256 characters"),
        custom(function = "validate_header_name")
    )]
    pub header_name: String,

    #[serde(default, rename = "header-value")]
    #[validate(
        length(min = 1, max = 8192, message = "required, at most 8192 characters"),
        custom(function = "validate_header_value")
    )]
    pub header_value: String,
}

impl std::fmt::Debug for CreateHeaderForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateHeaderForm")
            .field("header_name", &self.header_name)
            .field("header_value", &"<redacted>")
            .finish()
    }
}

/// A config is always created together with its first header replacement.
#[derive(Default, Deserialize, Validate)]
pub struct CreateConfigForm {
    #[serde(default)]
    #[validate(custom(function = "validate_name"))]
    pub name: String,

    #[serde(default, rename = "num-of-requests")]
    #[validate(custom(function = "validate_request_count"))]
    pub num_of_requests: String,

    #[serde(default, rename = "requests-per")]
    #[validate(custom(function = "validate_limit_period"))]
    pub requests_per: String,

    #[serde(default, rename = "header-name")]
    #[validate(
        length(max = 256, message = "must be at most 256 characters"),
        custom(function = "validate_header_name")
    )]
    pub header_name: String,

    #[serde(default, rename = "header-value")]
    #[validate(
        length(min = 1, max = 8192, message = "required, at most 8192 characters"),
        custom(function = "validate_header_value")
    )]
    pub header_value: String,
}

impl CreateConfigForm {
    pub fn name(&self) -> String {
        self.name.trim().to_string()
    }

    /// Typed policy. `None` only if the form has not passed validation.
    pub fn policy(&self) -> Option<RateLimitPolicy> {
        let requests = self.num_of_requests.trim().parse::<i64>().ok()?;
        let period = self.requests_per.trim().parse::<LimitPeriod>().ok()?;
        Some(RateLimitPolicy { requests, period })
    }
}

impl std::fmt::Debug for CreateConfigForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateConfigForm")
            .field("name", &self.name)
            .field("num_of_requests", &self.num_of_requests)
            .field("requests_per", &self.requests_per)
            .field("header_name", &self.header_name)
            .field("header_value", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub user: UserResponse,
    pub projects: Vec<ProjectResponse>,
}

/// Credential a downstream proxy uses to identify a config.
#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub credential: String,
    pub url: String,
}
