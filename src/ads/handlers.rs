use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    routing::{get, patch, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{OwnerQuery, SearchParams, UpdateAdRequest};
use super::repo_types::{AdId, Advertisement, NewAdvertisement, SearchFilter};
use super::services::{create_ad_with_photos, PhotoSpooler, UploadItem};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
    users::repo_types::TelegramId,
};

const MAX_FORM_BYTES: usize = 20 * 1024 * 1024;

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/ads", get(search_ads))
        .route("/ads/:id", get(get_ad))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/ads", post(create_ad))
        .route("/ads/:id", put(update_ad).delete(delete_ad))
        .route("/ads/:id/archive", patch(archive_ad))
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
}

// --- handlers ---

/// POST /ads (multipart)
/// Fields: telegram_id (or user_id), title, description, price, address and
/// one or more files under photos / photos[] / photo.
#[instrument(skip(state, mp))]
pub async fn create_ad(
    State(state): State<AppState>,
    mp: Multipart,
) -> AppResult<(StatusCode, [(header::HeaderName, String); 1], Json<Advertisement>)> {
    let (draft, photos) = read_ad_form(mp).await?;
    if photos.is_empty() {
        return Err(AppError::validation("at least one photo is required"));
    }

    let ad = create_ad_with_photos(&state, draft, photos).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/ads/{}", ad.id))],
        Json(ad),
    ))
}

async fn read_ad_form(mut mp: Multipart) -> AppResult<(NewAdvertisement, Vec<UploadItem>)> {
    let mut owner = None;
    let mut title = None;
    let mut price = None;
    let mut description = String::new();
    let mut address = String::new();
    let mut photos = Vec::new();

    while let Some(mut field) = mp.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "telegram_id" | "user_id" => owner = Some(field.text().await?),
            "title" => title = Some(field.text().await?),
            "price" => price = Some(field.text().await?),
            "description" => description = field.text().await?,
            "address" => address = field.text().await?,
            "photos" | "photos[]" | "photo" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let mut spool = PhotoSpooler::new()?;
                while let Some(chunk) = field.chunk().await? {
                    spool.write(&chunk).await?;
                }
                let body = spool.finish().await?;
                // browsers send an empty part when no file was picked
                if body.is_empty() {
                    continue;
                }
                photos.push(UploadItem {
                    file_name,
                    content_type,
                    body,
                });
            }
            // `archived` included: new ads always start active.
            _ => {}
        }
    }

    let owner = TelegramId::parse(owner.as_deref().unwrap_or_default())?;
    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::validation("title is required"))?;
    let price = price
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::validation("price is required"))?
        .parse::<i64>()
        .map_err(|e| AppError::validation(format!("invalid price: {}", e)))?;

    let draft = NewAdvertisement {
        owner,
        title,
        description,
        price,
        photos_urls: Vec::new(),
        address,
    };
    Ok((draft, photos))
}

/// GET /ads?search=&max_price=
#[instrument(skip(state))]
pub async fn search_ads(
    State(state): State<AppState>,
    Query(p): Query<SearchParams>,
) -> AppResult<Json<Vec<Advertisement>>> {
    let max_price = match p.max_price.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| AppError::validation("invalid max_price"))?,
        None => 0,
    };
    let filter = SearchFilter {
        keyword: p.search.unwrap_or_default(),
        max_price,
    };
    let ads = state.ads.search(&filter).await?;
    Ok(Json(ads))
}

/// GET /ads/:id, optionally scoped to an owner with ?telegram_id=
#[instrument(skip(state))]
pub async fn get_ad(
    State(state): State<AppState>,
    id: Result<Path<AdId>, PathRejection>,
    Query(q): Query<OwnerQuery>,
) -> AppResult<Json<Advertisement>> {
    let Path(id) = id?;
    let ad = match q.telegram_id.as_deref() {
        Some(raw) => {
            let owner = TelegramId::parse(raw)?;
            state.ads.get_owned(id, &owner).await?
        }
        None => state.ads.get(id).await?,
    };
    Ok(Json(ad))
}

#[instrument(skip(state, payload))]
pub async fn update_ad(
    State(state): State<AppState>,
    id: Result<Path<AdId>, PathRejection>,
    payload: Result<Json<UpdateAdRequest>, JsonRejection>,
) -> AppResult<Json<Advertisement>> {
    let Path(id) = id?;
    let Json(body) = payload?;
    let ad = state.ads.update(body.into_update(id)).await?;
    info!(ad_id = %ad.id, "ad updated");
    Ok(Json(ad))
}

#[instrument(skip(state))]
pub async fn delete_ad(
    State(state): State<AppState>,
    id: Result<Path<AdId>, PathRejection>,
) -> AppResult<StatusCode> {
    let Path(id) = id?;
    state.ads.delete(id).await?;
    info!(ad_id = %id, "ad deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn archive_ad(
    State(state): State<AppState>,
    id: Result<Path<AdId>, PathRejection>,
) -> AppResult<StatusCode> {
    let Path(id) = id?;
    state.ads.archive(id).await?;
    info!(ad_id = %id, "ad archived");
    Ok(StatusCode::NO_CONTENT)
}
