use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{CreateUserRequest, UpdateContactRequest, UpdateNameRequest, UpdatePhoneRequest};
use super::repo_types::{PreferredContact, TelegramId, User};
use crate::{
    ads::repo_types::Advertisement,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/:telegram_id", get(get_user).delete(delete_user))
        .route("/users/:telegram_id/name", patch(update_name))
        .route("/users/:telegram_id/phone", patch(update_phone))
        .route("/users/:telegram_id/contact", patch(update_contact))
        .route("/users/:telegram_id/ads", get(list_user_ads))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<User>)> {
    let Json(body) = payload?;
    let new_user = body.into_new_user()?;

    let user = state.users.create(new_user).await.map_err(|e| {
        if let AppError::Conflict(msg) = &e {
            warn!(%msg, "duplicate user");
        }
        e
    })?;

    info!(telegram_id = %user.telegram_id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(telegram_id): Path<String>,
) -> AppResult<Json<User>> {
    let id = TelegramId::parse(&telegram_id)?;
    Ok(Json(state.users.get(&id).await?))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(telegram_id): Path<String>,
) -> AppResult<Json<User>> {
    let id = TelegramId::parse(&telegram_id)?;
    let user = state.users.delete(&id).await?;
    info!(telegram_id = %user.telegram_id, "user deleted");
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn update_name(
    State(state): State<AppState>,
    Path(telegram_id): Path<String>,
    payload: Result<Json<UpdateNameRequest>, JsonRejection>,
) -> AppResult<Json<User>> {
    let id = TelegramId::parse(&telegram_id)?;
    let Json(body) = payload?;
    Ok(Json(state.users.update_name(&id, body.name.trim()).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_phone(
    State(state): State<AppState>,
    Path(telegram_id): Path<String>,
    payload: Result<Json<UpdatePhoneRequest>, JsonRejection>,
) -> AppResult<Json<User>> {
    let id = TelegramId::parse(&telegram_id)?;
    let Json(body) = payload?;
    Ok(Json(state.users.update_phone(&id, body.phone.trim()).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_contact(
    State(state): State<AppState>,
    Path(telegram_id): Path<String>,
    payload: Result<Json<UpdateContactRequest>, JsonRejection>,
) -> AppResult<Json<User>> {
    let id = TelegramId::parse(&telegram_id)?;
    let Json(body) = payload?;
    let contact: PreferredContact = body.preferred_contact.parse()?;
    Ok(Json(state.users.update_preferred_contact(&id, contact).await?))
}

/// Active ads of one user, newest first. Unknown users simply have none.
#[instrument(skip(state))]
pub async fn list_user_ads(
    State(state): State<AppState>,
    Path(telegram_id): Path<String>,
) -> AppResult<Json<Vec<Advertisement>>> {
    let id = TelegramId::parse(&telegram_id)?;
    Ok(Json(state.ads.list_by_owner(&id).await?))
}
