//! Wire strings → typed values. Nothing in here touches the store; a
//! [`ConvertError`] stops the request before any query runs.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

use super::dto::{CreateUserRequest, ListParams, PatchUserRequest, UserRequest};
use super::password::hash_password;
use super::query::{effective_limit, Keyset, ListFilter, SortDirection};
use super::repo_types::{NewUser, UserChanges};
use crate::config::ListConfig;
use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid user id '{0}': expected a UUID")]
    Id(String),

    #[error("invalid {field} '{value}': expected an RFC3339 timestamp")]
    Timestamp { field: &'static str, value: String },

    #[error("invalid email '{0}'")]
    Email(String),

    #[error("password must not be empty")]
    EmptyPassword,

    #[error("invalid limit '{0}': expected an integer")]
    Limit(String),

    #[error("password hashing failed: {0:#}")]
    Hash(anyhow::Error),
}

impl From<ConvertError> for ApiError {
    fn from(e: ConvertError) -> Self {
        match e {
            ConvertError::Hash(source) => ApiError::Internal(source.context("hash password")),
            id @ ConvertError::Id(_) => ApiError::InvalidId(id.to_string()),
            other => ApiError::Validation(other.to_string()),
        }
    }
}

/// List parameters are reported as a bad filter whatever the field.
pub fn bad_filter(e: ConvertError) -> ApiError {
    match e {
        ConvertError::Hash(source) => ApiError::Internal(source),
        other => ApiError::BadFilter(other.to_string()),
    }
}

pub fn parse_id(raw: &str) -> Result<Uuid, ConvertError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ConvertError::Id(raw.to_string()))
}

/// RFC3339 with up to nanosecond precision; an empty string is `None`.
pub fn parse_timestamp(
    field: &'static str,
    raw: &str,
) -> Result<Option<OffsetDateTime>, ConvertError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    OffsetDateTime::parse(raw, &Rfc3339)
        .map(Some)
        .map_err(|_| ConvertError::Timestamp {
            field,
            value: raw.to_string(),
        })
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed, lower-cased and shape-checked.
pub fn normalize_email(raw: &str) -> Result<String, ConvertError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ConvertError::Email(raw.to_string()));
    }
    Ok(email)
}

pub fn hash_new_password(raw: &str) -> Result<String, ConvertError> {
    if raw.is_empty() {
        return Err(ConvertError::EmptyPassword);
    }
    hash_password(raw).map_err(ConvertError::Hash)
}

pub fn list_filter(params: ListParams, cfg: &ListConfig) -> Result<ListFilter, ConvertError> {
    let requested = match params.limit.as_deref().map(str::trim) {
        None | Some("") => 0,
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| ConvertError::Limit(raw.to_string()))?,
    };

    let cursor = match params.cursor.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_id(raw)?),
    };
    let last_timestamp = match params.last_timestamp.as_deref() {
        None => None,
        Some(raw) => parse_timestamp("lastTimestamp", raw)?,
    };

    // Only a complete pair positions the page.
    let after = match (cursor, last_timestamp) {
        (Some(id), Some(created_at)) => Some(Keyset { created_at, id }),
        _ => None,
    };

    Ok(ListFilter {
        emails: params
            .emails
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect(),
        limit: effective_limit(requested, cfg.default_limit, cfg.max_limit),
        after,
        direction: SortDirection::from_param(params.order_created_at.as_deref()),
    })
}

pub fn new_user(req: CreateUserRequest, now: OffsetDateTime) -> Result<NewUser, ConvertError> {
    let id = match req.id.as_deref().map(str::trim) {
        None | Some("") => Uuid::new_v4(),
        Some(raw) => parse_id(raw)?,
    };
    let UserRequest {
        email,
        password,
        created_at,
        updated_at,
        deleted_at,
    } = req.user;

    let email = normalize_email(&email)?;
    let created_at = parse_timestamp("created_at", &created_at)?.unwrap_or(now);
    let updated_at = parse_timestamp("updated_at", &updated_at)?.unwrap_or(now);
    let deleted_at = parse_timestamp("deleted_at", &deleted_at)?;
    // Hash last: it is the expensive step.
    let password_hash = hash_new_password(&password)?;

    Ok(NewUser {
        id,
        email,
        password_hash,
        created_at,
        updated_at,
        deleted_at,
    })
}

/// PUT: every writable column is overwritten. An omitted `created_at` keeps
/// the stored value, an omitted `updated_at` becomes `now`, and an omitted
/// `deleted_at` clears the column.
pub fn full_changes(req: UserRequest, now: OffsetDateTime) -> Result<UserChanges, ConvertError> {
    let email = normalize_email(&req.email)?;
    let created_at = parse_timestamp("created_at", &req.created_at)?;
    let updated_at = parse_timestamp("updated_at", &req.updated_at)?.unwrap_or(now);
    let deleted_at = parse_timestamp("deleted_at", &req.deleted_at)?;
    let password_hash = hash_new_password(&req.password)?;

    Ok(UserChanges {
        email: Some(email),
        password_hash: Some(password_hash),
        created_at,
        updated_at: Some(updated_at),
        deleted_at: Some(deleted_at),
    })
}

/// PATCH: only fields present in the body are written; `updated_at` is
/// always bumped. `"deleted_at": ""` clears the soft-delete marker.
pub fn partial_changes(
    req: PatchUserRequest,
    now: OffsetDateTime,
) -> Result<UserChanges, ConvertError> {
    let email = req.email.as_deref().map(normalize_email).transpose()?;
    let created_at = match req.created_at.as_deref() {
        Some(raw) => parse_timestamp("created_at", raw)?,
        None => None,
    };
    let updated_at = match req.updated_at.as_deref() {
        Some(raw) => parse_timestamp("updated_at", raw)?,
        None => None,
    }
    .unwrap_or(now);
    let deleted_at = req
        .deleted_at
        .as_deref()
        .map(|raw| parse_timestamp("deleted_at", raw))
        .transpose()?;
    let password_hash = req.password.as_deref().map(hash_new_password).transpose()?;

    Ok(UserChanges {
        email,
        password_hash,
        created_at,
        updated_at: Some(updated_at),
        deleted_at,
    })
}
