use std::path::Path;

use anyhow::Context;
use aws_smithy_types::byte_stream::ByteStream;
use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use super::repo::ensure_price;
use super::repo_types::{Advertisement, NewAdvertisement};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::repo_types::TelegramId;

pub struct UploadItem {
    pub file_name: Option<String>,
    pub content_type: String,
    pub body: SpooledPhoto,
}

/// Copies one photo part to a temporary file chunk by chunk as it arrives.
pub struct PhotoSpooler {
    file: NamedTempFile,
    out: tokio::fs::File,
    len: u64,
}

impl PhotoSpooler {
    pub fn new() -> AppResult<Self> {
        let file = tempfile::Builder::new()
            .prefix("ad-photo-")
            .tempfile()
            .context("create photo spool file")?;
        let out = file.as_file().try_clone().context("open photo spool file")?;
        Ok(Self {
            file,
            out: tokio::fs::File::from_std(out),
            len: 0,
        })
    }

    pub async fn write(&mut self, chunk: &[u8]) -> AppResult<()> {
        self.out
            .write_all(chunk)
            .await
            .context("write photo spool file")?;
        self.len += chunk.len() as u64;
        Ok(())
    }

    pub async fn finish(mut self) -> AppResult<SpooledPhoto> {
        self.out.flush().await.context("flush photo spool file")?;
        Ok(SpooledPhoto {
            file: self.file,
            len: self.len,
        })
    }
}

/// A fully received photo on disk. The file is removed on drop.
pub struct SpooledPhoto {
    file: NamedTempFile,
    len: u64,
}

impl SpooledPhoto {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    async fn stream(&self) -> anyhow::Result<ByteStream> {
        ByteStream::from_path(self.file.path())
            .await
            .context("read photo spool file")
    }
}

/// Uploads every photo in order, then writes the ad with their public URLs.
///
/// The owner is resolved first, so an unknown owner costs no uploads. If an
/// upload or the insert fails, objects already written for this call are
/// removed and no ad row exists.
pub async fn create_ad_with_photos(
    st: &AppState,
    mut draft: NewAdvertisement,
    photos: Vec<UploadItem>,
) -> AppResult<Advertisement> {
    ensure_price(draft.price)?;
    st.ads.resolve_owner(&draft.owner).await?;

    let mut clock = KeyClock::default();
    let mut keys: Vec<String> = Vec::with_capacity(photos.len());
    for photo in photos {
        let key = object_key(
            &draft.owner,
            clock.next(),
            photo.file_name.as_deref(),
            &photo.content_type,
        );
        let size = photo.body.len();
        let uploaded = match photo.body.stream().await {
            Ok(body) => {
                st.storage
                    .put_object(&key, body, size, &photo.content_type)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = uploaded {
            error!(error = %e, %key, "photo upload failed");
            discard_uploads(st, &keys).await;
            return Err(AppError::Upstream(e.context(format!("put_object {}", key))));
        }
        debug!(%key, size, "photo uploaded");
        keys.push(key);
    }

    draft.photos_urls = keys.iter().map(|k| st.storage.public_url(k)).collect();
    match st.ads.create(draft).await {
        Ok(ad) => {
            info!(ad_id = %ad.id, owner = %ad.telegram_id, photos = keys.len(), "ad created");
            Ok(ad)
        }
        Err(e) => {
            discard_uploads(st, &keys).await;
            Err(e)
        }
    }
}

async fn discard_uploads(st: &AppState, keys: &[String]) {
    for key in keys {
        if let Err(e) = st.storage.delete_object(key).await {
            warn!(error = %e, %key, "could not remove orphaned photo");
        }
    }
}

/// `ads/<owner>_<nanos><ext>`
pub(crate) fn object_key(
    owner: &TelegramId,
    nanos: i128,
    file_name: Option<&str>,
    content_type: &str,
) -> String {
    let ext = file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .or_else(|| ext_from_mime(content_type).map(|e| format!(".{}", e)))
        .unwrap_or_default();
    format!("ads/{}_{}{}", owner.as_str(), nanos, ext)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// Wall-clock nanoseconds, forced to increase within one request.
#[derive(Default)]
struct KeyClock {
    last: i128,
}

impl KeyClock {
    fn next(&mut self) -> i128 {
        let now = OffsetDateTime::now_utc().unix_timestamp_nanos();
        self.last = now.max(self.last + 1);
        self.last
    }
}
