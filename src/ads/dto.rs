use serde::Deserialize;

use super::repo_types::{AdId, AdUpdate};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
    /// Kept as text so a malformed value is reported as a validation error.
    pub max_price: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub telegram_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAdRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
    #[serde(default)]
    pub photos_urls: Vec<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub archived: bool,
}

impl UpdateAdRequest {
    pub fn into_update(self, id: AdId) -> AdUpdate {
        AdUpdate {
            id,
            title: self.title,
            description: self.description,
            price: self.price,
            photos_urls: self.photos_urls,
            address: self.address,
            archived: self.archived,
        }
    }
}
