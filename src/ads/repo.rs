use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{AdId, AdUpdate, Advertisement, NewAdvertisement, SearchFilter};
use super::search::{search_query, AD_COLUMNS};
use crate::error::{AppError, AppResult};
use crate::users::repo_types::{TelegramId, UserId};

#[async_trait]
pub trait AdStore: Send + Sync {
    /// Looks the owner up by telegram id. `NotFound` when nobody matches.
    async fn resolve_owner(&self, owner: &TelegramId) -> AppResult<UserId>;
    /// Inserts an active ad; the owner is re-resolved in the same statement.
    async fn create(&self, ad: NewAdvertisement) -> AppResult<Advertisement>;
    async fn get(&self, id: AdId) -> AppResult<Advertisement>;
    /// Like `get`, but only when the ad belongs to `owner`.
    async fn get_owned(&self, id: AdId, owner: &TelegramId) -> AppResult<Advertisement>;
    async fn list_by_owner(&self, owner: &TelegramId) -> AppResult<Vec<Advertisement>>;
    async fn search(&self, filter: &SearchFilter) -> AppResult<Vec<Advertisement>>;
    /// Overwrites an active ad. Archived ads are `NotFound`, so they can never
    /// be brought back.
    async fn update(&self, ad: AdUpdate) -> AppResult<Advertisement>;
    async fn delete(&self, id: AdId) -> AppResult<()>;
    async fn archive(&self, id: AdId) -> AppResult<()>;
}

pub(crate) fn ensure_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::validation("price must not be negative"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct PgAdStore {
    db: PgPool,
}

impl PgAdStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AdStore for PgAdStore {
    async fn resolve_owner(&self, owner: &TelegramId) -> AppResult<UserId> {
        sqlx::query_scalar::<_, UserId>("SELECT id FROM users WHERE telegram_id = $1")
            .bind(owner)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("owner not found"))
    }

    async fn create(&self, ad: NewAdvertisement) -> AppResult<Advertisement> {
        ensure_price(ad.price)?;
        let sql = format!(
            r#"
            WITH a AS (
                INSERT INTO advertisements
                    (user_id, title, description, price, photos_urls, address,
                     archived, created_at, updated_at)
                SELECT u.id, $2, $3, $4, $5, $6, FALSE, now(), now()
                  FROM users u
                 WHERE u.telegram_id = $1
                RETURNING *
            )
            SELECT {} FROM a JOIN users u ON u.id = a.user_id
            "#,
            AD_COLUMNS
        );
        sqlx::query_as::<_, Advertisement>(&sql)
            .bind(&ad.owner)
            .bind(&ad.title)
            .bind(&ad.description)
            .bind(ad.price)
            .bind(&ad.photos_urls)
            .bind(&ad.address)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("owner not found"))
    }

    async fn get(&self, id: AdId) -> AppResult<Advertisement> {
        let sql = format!(
            r#"
            SELECT {}
              FROM advertisements a
              JOIN users u ON u.id = a.user_id
             WHERE a.id = $1 AND a.archived = FALSE
            "#,
            AD_COLUMNS
        );
        sqlx::query_as::<_, Advertisement>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("ad not found"))
    }

    async fn get_owned(&self, id: AdId, owner: &TelegramId) -> AppResult<Advertisement> {
        let sql = format!(
            r#"
            SELECT {}
              FROM advertisements a
              JOIN users u ON u.id = a.user_id
             WHERE a.id = $1 AND u.telegram_id = $2 AND a.archived = FALSE
            "#,
            AD_COLUMNS
        );
        sqlx::query_as::<_, Advertisement>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("ad not found"))
    }

    async fn list_by_owner(&self, owner: &TelegramId) -> AppResult<Vec<Advertisement>> {
        let sql = format!(
            r#"
            SELECT {}
              FROM advertisements a
              JOIN users u ON u.id = a.user_id
             WHERE u.telegram_id = $1 AND a.archived = FALSE
             ORDER BY a.created_at DESC, a.id DESC
            "#,
            AD_COLUMNS
        );
        let rows = sqlx::query_as::<_, Advertisement>(&sql)
            .bind(owner)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn search(&self, filter: &SearchFilter) -> AppResult<Vec<Advertisement>> {
        let rows = search_query(filter)
            .build_query_as::<Advertisement>()
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn update(&self, ad: AdUpdate) -> AppResult<Advertisement> {
        ensure_price(ad.price)?;
        let sql = format!(
            r#"
            WITH a AS (
                UPDATE advertisements
                   SET title = $1, description = $2, price = $3, photos_urls = $4,
                       address = $5, archived = $6, updated_at = now()
                 WHERE id = $7 AND archived = FALSE
                RETURNING *
            )
            SELECT {} FROM a JOIN users u ON u.id = a.user_id
            "#,
            AD_COLUMNS
        );
        sqlx::query_as::<_, Advertisement>(&sql)
            .bind(&ad.title)
            .bind(&ad.description)
            .bind(ad.price)
            .bind(&ad.photos_urls)
            .bind(&ad.address)
            .bind(ad.archived)
            .bind(ad.id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("ad not found"))
    }

    async fn delete(&self, id: AdId) -> AppResult<()> {
        let done = sqlx::query("DELETE FROM advertisements WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(AppError::not_found("ad not found"));
        }
        Ok(())
    }

    async fn archive(&self, id: AdId) -> AppResult<()> {
        let done = sqlx::query(
            "UPDATE advertisements SET archived = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        if done.rows_affected() == 0 {
            return Err(AppError::not_found("ad not found"));
        }
        Ok(())
    }
}
