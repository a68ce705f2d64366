use serde::Deserialize;

use super::repo_types::{NewUser, PreferredContact, TelegramId};
use crate::error::AppResult;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub telegram_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    pub preferred_contact: Option<String>,
}

impl CreateUserRequest {
    pub fn into_new_user(self) -> AppResult<NewUser> {
        let preferred_contact = match self.preferred_contact.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => PreferredContact::default(),
        };
        Ok(NewUser {
            telegram_id: TelegramId::parse(&self.telegram_id)?,
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            preferred_contact,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateNameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePhoneRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContactRequest {
    pub preferred_contact: String,
}
