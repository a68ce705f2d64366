use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::error::{AppError, AppResult};

/// Storage primary key of a user. Never used for lookups from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(pub i64);

const MAX_TELEGRAM_ID_LEN: usize = 64;

/// Messaging-platform account id; the public key of a user.
///
/// Limited to ASCII letters, digits, `-` and `_` because it is embedded in
/// object keys and public photo URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct TelegramId(String);

impl TelegramId {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::validation("telegram_id is required"));
        }
        if raw.len() > MAX_TELEGRAM_ID_LEN {
            return Err(AppError::validation("telegram_id is too long"));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AppError::validation(
                "telegram_id may only contain letters, digits, '-' and '_'",
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TelegramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredContact {
    #[default]
    Telegram,
    Phone,
}

impl PreferredContact {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferredContact::Telegram => "telegram",
            PreferredContact::Phone => "phone",
        }
    }
}

impl FromStr for PreferredContact {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(PreferredContact::Telegram),
            "phone" => Ok(PreferredContact::Phone),
            other => Err(AppError::validation(format!(
                "unknown preferred_contact {:?}, expected telegram or phone",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    #[serde(skip_serializing)]
    pub id: UserId,
    pub telegram_id: TelegramId,
    pub name: String,
    pub phone: String,
    pub preferred_contact: PreferredContact,
    /// Non-archived ads owned by this user, counted at read time.
    pub ads_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub telegram_id: TelegramId,
    pub name: String,
    pub phone: String,
    pub preferred_contact: PreferredContact,
}

/// Row as read from `users` plus the derived ad count.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: UserId,
    pub telegram_id: TelegramId,
    pub name: String,
    pub phone: String,
    pub preferred_contact: String,
    pub created_at: OffsetDateTime,
    pub ads_count: i64,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let preferred_contact = r.preferred_contact.parse().map_err(|_| {
            AppError::Upstream(anyhow::anyhow!(
                "user {} has unreadable preferred_contact {:?}",
                r.telegram_id,
                r.preferred_contact
            ))
        })?;
        Ok(Self {
            id: r.id,
            telegram_id: r.telegram_id,
            name: r.name,
            phone: r.phone,
            preferred_contact,
            ads_count: r.ads_count,
            created_at: r.created_at,
        })
    }
}
