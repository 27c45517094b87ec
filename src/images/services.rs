use anyhow::Context;
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::entries::model::FoodEntry;
use crate::storage::StorageClient;

const DEFAULT_MIME: &str = "image/jpeg";
const ENTRY_PREFIX: &str = "entries/";

/// Rejected before any analysis call; reported to the client as a bad request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("image is empty")]
    Empty,
    #[error("image is not valid base64")]
    Encoding,
}

/// A self-contained encoded image, from a camera frame or an uploaded file.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub mime: String,
    pub bytes: Bytes,
}

impl CapturedImage {
    /// Accepts `data:image/<kind>;base64,<payload>` or a bare base64 payload.
    pub fn from_data_uri(raw: &str) -> Result<Self, CaptureError> {
        lazy_static! {
            static ref DATA_URI_RE: Regex =
                Regex::new(r"^data:(image/(?:png|jpeg|jpg|webp|heic));base64,").unwrap();
        }
        let raw = raw.trim();
        let (mime, payload) = match DATA_URI_RE.captures(raw) {
            Some(caps) => {
                let header = caps.get(0).map_or(0, |m| m.end());
                let mime = caps.get(1).map_or(DEFAULT_MIME, |m| m.as_str());
                (mime.to_string(), &raw[header..])
            }
            None => (DEFAULT_MIME.to_string(), raw),
        };
        let bytes = Base64::decode_vec(payload).map_err(|_| CaptureError::Encoding)?;
        Self::from_bytes(Bytes::from(bytes), Some(mime.as_str()))
    }

    pub fn from_bytes(bytes: Bytes, content_type: Option<&str>) -> Result<Self, CaptureError> {
        if bytes.is_empty() {
            return Err(CaptureError::Empty);
        }
        let mime = content_type
            .filter(|ct| ext_from_mime(ct).is_some())
            .unwrap_or(DEFAULT_MIME);
        Ok(Self {
            mime: mime.to_string(),
            bytes,
        })
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, Base64::encode_string(&self.bytes))
    }
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

/// Stores the capture under `entries/{id}.{ext}` and returns the key.
pub async fn upload_entry_image(
    storage: &dyn StorageClient,
    entry_id: Uuid,
    image: &CapturedImage,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(&image.mime).unwrap_or("bin");
    let key = format!("{ENTRY_PREFIX}{entry_id}.{ext}");
    storage
        .put_object(&key, image.bytes.clone(), &image.mime)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(key)
}

/// Object key of an entry's image, if it lives in the object store
/// rather than inline as a data URI.
pub fn stored_key(entry: &FoodEntry) -> Option<&str> {
    entry
        .image_url
        .as_deref()
        .filter(|url| url.starts_with(ENTRY_PREFIX))
}

pub async fn presign_entry_image(storage: &dyn StorageClient, key: &str) -> anyhow::Result<String> {
    const TTL_SECS: u64 = 10 * 60;
    storage
        .presign_get(key, TTL_SECS)
        .await
        .with_context(|| format!("presign url for {}", key))
}

/// Best effort: failures are logged and skipped.
pub async fn delete_entry_images(storage: &dyn StorageClient, entries: &[FoodEntry]) -> usize {
    let mut deleted = 0;
    for key in entries.iter().filter_map(stored_key) {
        match storage.delete_object(key).await {
            Ok(()) => deleted += 1,
            Err(e) => warn!(error = %e, key, "failed to delete entry image"),
        }
    }
    deleted
}
