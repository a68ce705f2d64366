use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{NewUser, PreferredContact, TelegramId, User, UserRow};
use crate::error::{AppError, AppResult};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the telegram id is already registered.
    async fn create(&self, user: NewUser) -> AppResult<User>;
    async fn get(&self, telegram_id: &TelegramId) -> AppResult<User>;
    async fn update_name(&self, telegram_id: &TelegramId, name: &str) -> AppResult<User>;
    async fn update_phone(&self, telegram_id: &TelegramId, phone: &str) -> AppResult<User>;
    async fn update_preferred_contact(
        &self,
        telegram_id: &TelegramId,
        contact: PreferredContact,
    ) -> AppResult<User>;
    /// Returns the record as it was right before removal.
    async fn delete(&self, telegram_id: &TelegramId) -> AppResult<User>;
}

const SELECT_USER: &str = r#"
    SELECT u.id, u.telegram_id, u.name, u.phone, u.preferred_contact, u.created_at,
           (
             SELECT COUNT(*)
               FROM advertisements a
              WHERE a.user_id = u.id
                AND a.archived = FALSE
           ) AS ads_count
      FROM users u
     WHERE u.telegram_id = $1
"#;

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn set_column(
        &self,
        telegram_id: &TelegramId,
        column: &'static str,
        value: &str,
    ) -> AppResult<User> {
        let sql = format!("UPDATE users SET {} = $1 WHERE telegram_id = $2", column);
        let done = sqlx::query(&sql)
            .bind(value)
            .bind(telegram_id)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }
        self.get(telegram_id).await
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (telegram_id, name, phone, preferred_contact)
            VALUES ($1, $2, $3, $4)
            RETURNING id, telegram_id, name, phone, preferred_contact, created_at,
                      0::BIGINT AS ads_count
            "#,
        )
        .bind(&user.telegram_id)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(user.preferred_contact.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict(format!("user {} already exists", user.telegram_id))
            }
            other => other,
        })?;
        row.try_into()
    }

    async fn get(&self, telegram_id: &TelegramId) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(SELECT_USER)
            .bind(telegram_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;
        row.try_into()
    }

    async fn update_name(&self, telegram_id: &TelegramId, name: &str) -> AppResult<User> {
        self.set_column(telegram_id, "name", name).await
    }

    async fn update_phone(&self, telegram_id: &TelegramId, phone: &str) -> AppResult<User> {
        self.set_column(telegram_id, "phone", phone).await
    }

    async fn update_preferred_contact(
        &self,
        telegram_id: &TelegramId,
        contact: PreferredContact,
    ) -> AppResult<User> {
        self.set_column(telegram_id, "preferred_contact", contact.as_str())
            .await
    }

    async fn delete(&self, telegram_id: &TelegramId) -> AppResult<User> {
        let user = self.get(telegram_id).await?;
        let done = sqlx::query("DELETE FROM users WHERE telegram_id = $1")
            .bind(telegram_id)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }
        Ok(user)
    }
}
