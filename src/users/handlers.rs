use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::convert::{self, bad_filter};
use super::dto::{
    CreateUserRequest, CredentialsRequest, EmailRequest, ListParams, MessageResponse,
    PatchUserRequest, UserListResponse, UserRequest, UserResponse,
};
use super::password::verify_credentials;
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

const SAVED: &str = "Saved successfully";
const DELETED: &str = "User deleted successfully";

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(list_users).post(create_user))
        .route(
            "/user/get-by-email-and-password",
            post(get_user_by_email_and_password),
        )
        .route("/user/get-by-email", post(get_user_by_email))
        .route(
            "/user/:id",
            get(get_user)
                .put(put_user)
                .patch(patch_user)
                .delete(delete_user),
        )
}

fn not_found_by_id(id: impl std::fmt::Display) -> ApiError {
    ApiError::NotFound(format!("User with id {id} not found"))
}

fn not_found_by_email(email: &str) -> ApiError {
    ApiError::NotFound(format!("User with email {email} not found"))
}

/// GET /user?emails=..&limit=..&cursor=..&lastTimestamp=..&orders[created_at]=..
#[instrument(skip(state, query))]
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<Json<UserListResponse>> {
    let Query(pairs) = query?;
    let filter = convert::list_filter(ListParams::from_pairs(pairs), &state.config.list)
        .map_err(bad_filter)?;

    let page = state.users.list(&filter).await?;
    if page.users.is_empty() {
        return Err(ApiError::EmptyResult);
    }
    Ok(Json(page.into()))
}

/// GET /user/:id
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let id = convert::parse_id(&raw_id)?;
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found_by_id(id))?;
    Ok(Json(user.into()))
}

/// POST /user
#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let new_user = convert::new_user(payload, OffsetDateTime::now_utc())?;
    let user = state.users.create(new_user).await?;

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/user/{}", user.id))],
        Json(MessageResponse::new(SAVED)),
    ))
}

/// POST /user/get-by-email-and-password
#[instrument(skip(state, payload))]
pub async fn get_user_by_email_and_password(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<Json<UserResponse>> {
    let Json(payload) = payload?;
    let email = convert::normalize_email(&payload.email)?;
    if payload.password.is_empty() {
        return Err(convert::ConvertError::EmptyPassword.into());
    }

    let user = state.users.find_by_email(&email).await?;
    let matched = verify_credentials(
        &payload.password,
        user.as_ref().map(|u| u.password_hash.as_str()),
    )?;
    match user {
        Some(user) if matched => Ok(Json(user.into())),
        // Unknown email and wrong password get the same answer.
        _ => Err(not_found_by_email(&email)),
    }
}

/// POST /user/get-by-email
#[instrument(skip(state, payload))]
pub async fn get_user_by_email(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> ApiResult<Json<UserResponse>> {
    let Json(payload) = payload?;
    let email = convert::normalize_email(&payload.email)?;
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| not_found_by_email(&email))?;
    Ok(Json(user.into()))
}

/// PUT /user/:id
#[instrument(skip(state, payload))]
pub async fn put_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let id = convert::parse_id(&raw_id)?;
    let Json(payload) = payload?;
    let changes = convert::full_changes(payload, OffsetDateTime::now_utc())?;

    if !state.users.update(id, &changes).await? {
        return Err(not_found_by_id(id));
    }
    info!(user_id = %id, "user replaced");
    Ok(Json(MessageResponse::new(SAVED)))
}

/// PATCH /user/:id
#[instrument(skip(state, payload))]
pub async fn patch_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<PatchUserRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let id = convert::parse_id(&raw_id)?;
    let Json(payload) = payload?;
    let changes = convert::partial_changes(payload, OffsetDateTime::now_utc())?;

    if !state.users.update(id, &changes).await? {
        return Err(not_found_by_id(id));
    }
    info!(user_id = %id, "user patched");
    Ok(Json(MessageResponse::new(SAVED)))
}

/// DELETE /user/:id
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = convert::parse_id(&raw_id)?;
    if !state.users.delete(id).await? {
        return Err(not_found_by_id(id));
    }
    info!(user_id = %id, "user deleted");
    Ok(Json(MessageResponse::new(DELETED)))
}
