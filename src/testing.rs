//! In-memory stand-ins for Postgres and the object store.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use aws_smithy_types::byte_stream::ByteStream;
use time::OffsetDateTime;

use crate::ads::repo::{ensure_price, AdStore};
use crate::ads::repo_types::{AdId, AdUpdate, Advertisement, NewAdvertisement, SearchFilter};
use crate::error::{AppError, AppResult};
use crate::storage::{object_url, StorageClient};
use crate::users::repo::UserStore;
use crate::users::repo_types::{NewUser, PreferredContact, TelegramId, User, UserId};

pub struct Fakes {
    pub store: Arc<MemoryStore>,
    pub storage: Arc<FakeStorage>,
}

struct UserRecord {
    id: UserId,
    telegram_id: TelegramId,
    name: String,
    phone: String,
    preferred_contact: PreferredContact,
    created_at: OffsetDateTime,
}

struct AdRecord {
    id: AdId,
    user_id: UserId,
    title: String,
    description: String,
    price: i64,
    photos_urls: Vec<String>,
    address: String,
    archived: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Default)]
struct Inner {
    next_user: i64,
    next_ad: i64,
    fail_next_ad_insert: bool,
    users: Vec<UserRecord>,
    ads: Vec<AdRecord>,
}

impl Inner {
    fn user_by_tg(&self, tg: &TelegramId) -> Option<&UserRecord> {
        self.users.iter().find(|u| &u.telegram_id == tg)
    }

    fn user_view(&self, u: &UserRecord) -> User {
        let ads_count = self
            .ads
            .iter()
            .filter(|a| a.user_id == u.id && !a.archived)
            .count() as i64;
        User {
            id: u.id,
            telegram_id: u.telegram_id.clone(),
            name: u.name.clone(),
            phone: u.phone.clone(),
            preferred_contact: u.preferred_contact,
            ads_count,
            created_at: u.created_at,
        }
    }

    fn ad_view(&self, a: &AdRecord) -> Advertisement {
        let owner = self
            .users
            .iter()
            .find(|u| u.id == a.user_id)
            .expect("ads cascade with their owner");
        Advertisement {
            id: a.id,
            user_id: a.user_id,
            telegram_id: owner.telegram_id.clone(),
            owner_name: owner.name.clone(),
            owner_phone: owner.phone.clone(),
            title: a.title.clone(),
            description: a.description.clone(),
            price: a.price,
            photos_urls: a.photos_urls.clone(),
            address: a.address.clone(),
            archived: a.archived,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }

    fn active_sorted<F>(&self, keep: F) -> Vec<Advertisement>
    where
        F: Fn(&AdRecord) -> bool,
    {
        let mut out: Vec<_> = self
            .ads
            .iter()
            .filter(|a| !a.archived && keep(a))
            .map(|a| self.ad_view(a))
            .collect();
        out.sort_by(|x, y| (y.created_at, y.id.0).cmp(&(x.created_at, x.id.0)));
        out
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Every advertisement row, archived ones included.
    pub fn ad_rows(&self) -> usize {
        self.inner.lock().unwrap().ads.len()
    }

    pub fn fail_next_ad_insert(&self) {
        self.inner.lock().unwrap().fail_next_ad_insert = true;
    }

    /// Last-modified time of an ad, archived ones included.
    pub fn ad_updated_at(&self, id: AdId) -> Option<OffsetDateTime> {
        let inner = self.inner.lock().unwrap();
        inner.ads.iter().find(|a| a.id == id).map(|a| a.updated_at)
    }

    fn set_user<F>(&self, tg: &TelegramId, apply: F) -> AppResult<User>
    where
        F: FnOnce(&mut UserRecord),
    {
        let mut inner = self.inner.lock().unwrap();
        let rec = inner
            .users
            .iter_mut()
            .find(|u| &u.telegram_id == tg)
            .ok_or_else(|| AppError::not_found("user not found"))?;
        apply(rec);
        let rec = inner.user_by_tg(tg).unwrap();
        Ok(inner.user_view(rec))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> AppResult<User> {
        let mut inner = self.inner.lock().unwrap();
        if inner.user_by_tg(&user.telegram_id).is_some() {
            return Err(AppError::Conflict(format!(
                "user {} already exists",
                user.telegram_id
            )));
        }
        inner.next_user += 1;
        let rec = UserRecord {
            id: UserId(inner.next_user),
            telegram_id: user.telegram_id,
            name: user.name,
            phone: user.phone,
            preferred_contact: user.preferred_contact,
            created_at: OffsetDateTime::now_utc(),
        };
        let view = inner.user_view(&rec);
        inner.users.push(rec);
        Ok(view)
    }

    async fn get(&self, telegram_id: &TelegramId) -> AppResult<User> {
        let inner = self.inner.lock().unwrap();
        inner
            .user_by_tg(telegram_id)
            .map(|u| inner.user_view(u))
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    async fn update_name(&self, telegram_id: &TelegramId, name: &str) -> AppResult<User> {
        self.set_user(telegram_id, |u| u.name = name.to_string())
    }

    async fn update_phone(&self, telegram_id: &TelegramId, phone: &str) -> AppResult<User> {
        self.set_user(telegram_id, |u| u.phone = phone.to_string())
    }

    async fn update_preferred_contact(
        &self,
        telegram_id: &TelegramId,
        contact: PreferredContact,
    ) -> AppResult<User> {
        self.set_user(telegram_id, |u| u.preferred_contact = contact)
    }

    async fn delete(&self, telegram_id: &TelegramId) -> AppResult<User> {
        let mut inner = self.inner.lock().unwrap();
        let pos = inner
            .users
            .iter()
            .position(|u| &u.telegram_id == telegram_id)
            .ok_or_else(|| AppError::not_found("user not found"))?;
        let view = inner.user_view(&inner.users[pos]);
        let rec = inner.users.remove(pos);
        inner.ads.retain(|a| a.user_id != rec.id);
        Ok(view)
    }
}

#[async_trait]
impl AdStore for MemoryStore {
    async fn resolve_owner(&self, owner: &TelegramId) -> AppResult<UserId> {
        let inner = self.inner.lock().unwrap();
        inner
            .user_by_tg(owner)
            .map(|u| u.id)
            .ok_or_else(|| AppError::not_found("owner not found"))
    }

    async fn create(&self, ad: NewAdvertisement) -> AppResult<Advertisement> {
        ensure_price(ad.price)?;
        let mut inner = self.inner.lock().unwrap();
        if std::mem::take(&mut inner.fail_next_ad_insert) {
            return Err(AppError::Upstream(anyhow::anyhow!("injected insert failure")));
        }
        let user_id = inner
            .user_by_tg(&ad.owner)
            .map(|u| u.id)
            .ok_or_else(|| AppError::not_found("owner not found"))?;
        inner.next_ad += 1;
        let now = OffsetDateTime::now_utc();
        let rec = AdRecord {
            id: AdId(inner.next_ad),
            user_id,
            title: ad.title,
            description: ad.description,
            price: ad.price,
            photos_urls: ad.photos_urls,
            address: ad.address,
            archived: false,
            created_at: now,
            updated_at: now,
        };
        let view = inner.ad_view(&rec);
        inner.ads.push(rec);
        Ok(view)
    }

    async fn get(&self, id: AdId) -> AppResult<Advertisement> {
        let inner = self.inner.lock().unwrap();
        inner
            .ads
            .iter()
            .find(|a| a.id == id && !a.archived)
            .map(|a| inner.ad_view(a))
            .ok_or_else(|| AppError::not_found("ad not found"))
    }

    async fn get_owned(&self, id: AdId, owner: &TelegramId) -> AppResult<Advertisement> {
        let ad = AdStore::get(self, id).await?;
        if &ad.telegram_id != owner {
            return Err(AppError::not_found("ad not found"));
        }
        Ok(ad)
    }

    async fn list_by_owner(&self, owner: &TelegramId) -> AppResult<Vec<Advertisement>> {
        let inner = self.inner.lock().unwrap();
        let Some(user_id) = inner.user_by_tg(owner).map(|u| u.id) else {
            return Ok(Vec::new());
        };
        Ok(inner.active_sorted(|a| a.user_id == user_id))
    }

    async fn search(&self, filter: &SearchFilter) -> AppResult<Vec<Advertisement>> {
        let inner = self.inner.lock().unwrap();
        let keyword = filter.keyword.to_lowercase();
        Ok(inner.active_sorted(|a| {
            (keyword.is_empty() || a.title.to_lowercase().contains(&keyword))
                && (filter.max_price <= 0 || a.price <= filter.max_price)
        }))
    }

    async fn update(&self, ad: AdUpdate) -> AppResult<Advertisement> {
        ensure_price(ad.price)?;
        let mut inner = self.inner.lock().unwrap();
        let rec = inner
            .ads
            .iter_mut()
            .find(|a| a.id == ad.id && !a.archived)
            .ok_or_else(|| AppError::not_found("ad not found"))?;
        rec.title = ad.title;
        rec.description = ad.description;
        rec.price = ad.price;
        rec.photos_urls = ad.photos_urls;
        rec.address = ad.address;
        rec.archived = ad.archived;
        rec.updated_at = OffsetDateTime::now_utc();
        let rec = inner.ads.iter().find(|a| a.id == ad.id).unwrap();
        Ok(inner.ad_view(rec))
    }

    async fn delete(&self, id: AdId) -> AppResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.ads.len();
        inner.ads.retain(|a| a.id != id);
        if inner.ads.len() == before {
            return Err(AppError::not_found("ad not found"));
        }
        Ok(())
    }

    async fn archive(&self, id: AdId) -> AppResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let rec = inner
            .ads
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::not_found("ad not found"))?;
        rec.archived = true;
        rec.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }
}

/// Records writes and deletes; can be told to fail the n-th put (0-based).
pub struct FakeStorage {
    base: String,
    bucket: String,
    fail_put_at: Mutex<Option<usize>>,
    attempts: Mutex<usize>,
    pub puts: Mutex<Vec<(String, usize, String)>>,
    pub deletes: Mutex<Vec<String>>,
}

impl FakeStorage {
    pub fn new(base: &str, bucket: &str) -> Self {
        Self {
            base: base.to_string(),
            bucket: bucket.to_string(),
            fail_put_at: Mutex::new(None),
            attempts: Mutex::new(0),
            puts: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_put_at(&self, n: usize) {
        *self.fail_put_at.lock().unwrap() = Some(n);
    }

    pub fn put_keys(&self) -> Vec<String> {
        self.puts.lock().unwrap().iter().map(|(k, _, _)| k.clone()).collect()
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        body: ByteStream,
        len: u64,
        content_type: &str,
    ) -> anyhow::Result<()> {
        let attempt = {
            let mut n = self.attempts.lock().unwrap();
            let current = *n;
            *n += 1;
            current
        };
        if *self.fail_put_at.lock().unwrap() == Some(attempt) {
            anyhow::bail!("injected put failure");
        }
        let data = body.collect().await.context("read upload body")?.into_bytes();
        anyhow::ensure!(data.len() as u64 == len, "declared {} bytes, got {}", len, data.len());
        self.puts
            .lock()
            .unwrap()
            .push((key.to_string(), data.len(), content_type.to_string()));
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.deletes.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        object_url(&self.base, &self.bucket, key)
    }
}
