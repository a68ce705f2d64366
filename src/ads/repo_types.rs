use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::users::repo_types::{TelegramId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AdId(pub i64);

impl std::fmt::Display for AdId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Advertisement joined with the owner's public details.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Advertisement {
    pub id: AdId,
    #[serde(skip_serializing)]
    pub user_id: UserId,
    pub telegram_id: TelegramId,
    pub owner_name: String,
    pub owner_phone: String,
    pub title: String,
    pub description: String,
    pub price: i64,
    /// In upload order.
    pub photos_urls: Vec<String>,
    pub address: String,
    pub archived: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewAdvertisement {
    pub owner: TelegramId,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub photos_urls: Vec<String>,
    pub address: String,
}

/// Full replacement of the client-settable fields of an ad.
#[derive(Debug, Clone)]
pub struct AdUpdate {
    pub id: AdId,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub photos_urls: Vec<String>,
    pub address: String,
    pub archived: bool,
}

/// Optional filters, combined with AND. Empty keyword and non-positive
/// price mean "no filter".
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub keyword: String,
    pub max_price: i64,
}
