// ABOUTME: Evidence vault contract: capture, signed retrieval, purge, and destroy
// ABOUTME: Upload-then-record ordering; sentinel-keyed records never touch the object store

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::evidence;
use crate::error::{AppError, Result};
use crate::objects::{ObjectStore, ObjectVariant, SIGNED_URL_TTL, UrlSigner};
use crate::storage::Storage;

/// Reserved storage key meaning "log-only entry, no file attached". Records
/// carrying it must never reach the object store or the URL signer.
pub const SENTINEL_STORAGE_KEY: &str = "no-file";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    Physical,
    Verbal,
    Digital,
    Financial,
    Stalking,
    Other,
}

impl IncidentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentKind::Physical => "physical",
            IncidentKind::Verbal => "verbal",
            IncidentKind::Digital => "digital",
            IncidentKind::Financial => "financial",
            IncidentKind::Stalking => "stalking",
            IncidentKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureMeta {
    pub incident_kind: IncidentKind,
    pub description: String,
    pub threat_level: i32,
}

pub fn threat_level_in_bounds(level: i32) -> bool {
    (1..=5).contains(&level)
}

/// File extension from the declared MIME type. Explicit allow-list; a
/// client-supplied extension string is never trusted, unknown types get a
/// generic binary extension.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "audio/webm" => "weba",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "audio/ogg" => "ogg",
        "audio/wav" => "wav",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

/// Content type for serving, recovered from the key's extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("weba") => "audio/webm",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

pub struct EvidenceVault {
    storage: Arc<Storage>,
    objects: Arc<ObjectStore>,
    signer: UrlSigner,
}

impl EvidenceVault {
    pub fn new(storage: Arc<Storage>, objects: Arc<ObjectStore>) -> Self {
        Self {
            storage,
            objects,
            signer: UrlSigner::new(),
        }
    }

    /// Store the file, then record the metadata. Not transactional: a
    /// metadata failure after a successful write leaves an orphaned object
    /// (unreferenced, still access-controlled); a storage failure leaves
    /// nothing. Returns `None` on any failure.
    pub async fn upload(
        &self,
        account_id: &str,
        bytes: &[u8],
        mime: &str,
        meta: &CaptureMeta,
    ) -> Option<evidence::Model> {
        if !threat_level_in_bounds(meta.threat_level) {
            tracing::warn!("capture rejected: threat level {} out of bounds", meta.threat_level);
            return None;
        }

        let storage_key = format!(
            "{}/{}.{}",
            account_id,
            Uuid::new_v4(),
            extension_for_mime(mime)
        );

        if let Err(err) = self.objects.put(&storage_key, bytes).await {
            tracing::warn!("evidence upload failed, no record created: {}", err);
            return None;
        }

        match self
            .storage
            .insert_evidence(
                account_id,
                &storage_key,
                meta.incident_kind.as_str(),
                &meta.description,
                meta.threat_level,
            )
            .await
        {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(
                    "evidence record write failed after upload, object {} orphaned: {}",
                    storage_key,
                    err
                );
                None
            }
        }
    }

    /// Log-only entry: metadata row with the sentinel key, no file.
    pub async fn record_without_file(
        &self,
        account_id: &str,
        meta: &CaptureMeta,
    ) -> Option<evidence::Model> {
        if !threat_level_in_bounds(meta.threat_level) {
            tracing::warn!("capture rejected: threat level {} out of bounds", meta.threat_level);
            return None;
        }

        match self
            .storage
            .insert_evidence(
                account_id,
                SENTINEL_STORAGE_KEY,
                meta.incident_kind.as_str(),
                &meta.description,
                meta.threat_level,
            )
            .await
        {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!("log-only evidence record write failed: {}", err);
                None
            }
        }
    }

    /// Time-limited URL for an owned object. `None` for the sentinel, for
    /// keys the account does not own, for dangling keys whose object was
    /// purged, and on signer failure. Callers treat `None` as
    /// "unavailable", distinct from "loading".
    pub async fn signed_url(&self, account_id: &str, storage_key: &str, thumbnail: bool) -> Option<String> {
        if storage_key == SENTINEL_STORAGE_KEY {
            return None;
        }

        match self.storage.find_evidence_by_key(account_id, storage_key).await {
            Ok(Some(_)) => {}
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!("ownership lookup failed for {}: {}", storage_key, err);
                return None;
            }
        }

        if !self.objects.exists(storage_key).await {
            return None;
        }

        let variant = if thumbnail {
            ObjectVariant::Thumbnail
        } else {
            ObjectVariant::Full
        };

        match self.signer.issue(storage_key, SIGNED_URL_TTL, variant) {
            Ok(ticket) => Some(format!("/objects/{}", ticket.token)),
            Err(err) => {
                tracing::warn!("ticket issuance failed for {}: {}", storage_key, err);
                None
            }
        }
    }

    /// Delete only the stored object. The record survives with a dangling
    /// key; later signed-URL requests against it resolve to `None`.
    pub async fn purge_file(&self, account_id: &str, storage_key: &str) -> bool {
        if storage_key == SENTINEL_STORAGE_KEY {
            return true;
        }

        match self.storage.find_evidence_by_key(account_id, storage_key).await {
            Ok(Some(_)) => {}
            Ok(None) => return false,
            Err(err) => {
                tracing::warn!("ownership lookup failed for {}: {}", storage_key, err);
                return false;
            }
        }

        match self.objects.delete(storage_key).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("purge failed for {}: {}", storage_key, err);
                false
            }
        }
    }

    /// Full delete: record first, then best-effort object cleanup for
    /// non-sentinel keys. Idempotent; an already-gone record or object is
    /// not an error.
    pub async fn delete_evidence(&self, account_id: &str, record_id: Uuid) -> bool {
        let record = match self.storage.find_evidence(account_id, record_id).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!("evidence lookup failed for {}: {}", record_id, err);
                return false;
            }
        };

        let Some(record) = record else {
            return true;
        };

        if let Err(err) = self
            .storage
            .delete_evidence_record(account_id, record_id)
            .await
        {
            tracing::warn!("evidence delete failed for {}: {}", record_id, err);
            return false;
        }

        if record.storage_key != SENTINEL_STORAGE_KEY {
            if let Err(err) = self.objects.delete(&record.storage_key).await {
                tracing::warn!(
                    "object cleanup failed for {} (record already deleted): {}",
                    record.storage_key,
                    err
                );
            }
        }

        true
    }

    pub async fn list(&self, account_id: &str) -> Result<Vec<evidence::Model>> {
        Ok(self.storage.list_evidence(account_id).await?)
    }

    pub async fn update(
        &self,
        account_id: &str,
        record_id: Uuid,
        description: Option<String>,
        threat_level: Option<i32>,
        incident_kind: Option<IncidentKind>,
        archived: Option<bool>,
    ) -> Result<Option<evidence::Model>> {
        if let Some(level) = threat_level {
            if !threat_level_in_bounds(level) {
                return Err(AppError::InvalidInput(
                    "threat level must be between 1 and 5".to_string(),
                ));
            }
        }

        Ok(self
            .storage
            .update_evidence(
                account_id,
                record_id,
                description,
                threat_level,
                incident_kind.map(|kind| kind.as_str().to_string()),
                archived,
            )
            .await?)
    }

    /// Redeem a signed-URL token and load the bytes it grants access to.
    pub async fn open_ticket(&self, token: &str) -> Option<(Vec<u8>, &'static str)> {
        let ticket = self.signer.redeem(token)?;

        match self.objects.read(&ticket.storage_key).await {
            Ok(Some(bytes)) => Some((bytes, content_type_for_key(&ticket.storage_key))),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!("object read failed for {}: {}", ticket.storage_key, err);
                None
            }
        }
    }
}
