// ABOUTME: Access-controlled object storage and time-limited signed URL tickets
// ABOUTME: Objects have no public path; every read goes through a ticket that self-expires

use anyhow::{Result, anyhow};
use rand::{RngCore, rngs::OsRng};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

const TOKEN_SIZE: usize = 32;

/// Signed URL lifetime. A leaked URL self-expires after this window.
pub const SIGNED_URL_TTL: u64 = 3600;

/// Filesystem-backed object store. Keys are relative paths of the form
/// `<account_id>/<uuid>.<ext>`; anything that could escape the root is
/// rejected before touching the filesystem.
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.contains('\\')
            || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(anyhow!("invalid storage key"));
        }
        Ok(self.root.join(key))
    }

    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    /// Idempotent: a missing object is not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        match self.path_for(key) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

/// Requested rendition of an object. The variant travels in the ticket;
/// stores without an image pipeline serve the original bytes for both,
/// which keeps the access-control model identical across renditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectVariant {
    Full,
    Thumbnail,
}

#[derive(Debug, Clone)]
pub struct ObjectTicket {
    pub token: String,
    pub storage_key: String,
    pub variant: ObjectVariant,
    pub created_at: u64,
    pub expires_at: u64,
}

impl ObjectTicket {
    fn new(storage_key: &str, ttl_seconds: u64, variant: ObjectVariant) -> Result<Self> {
        let mut token_bytes = [0u8; TOKEN_SIZE];
        OsRng.fill_bytes(&mut token_bytes);

        // Basic entropy check
        if token_bytes.iter().all(|&b| b == token_bytes[0]) {
            return Err(anyhow!("Insufficient entropy in ticket generation"));
        }

        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        Ok(ObjectTicket {
            token: hex::encode(token_bytes),
            storage_key: storage_key.to_string(),
            variant,
            created_at: now,
            expires_at: now + ttl_seconds,
        })
    }

    pub fn is_expired(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        now >= self.expires_at
    }
}

/// Issues and redeems signed-URL tickets. Tickets stay valid until expiry,
/// so two URLs for the same key resolve to the same bytes within their TTLs.
#[derive(Clone)]
pub struct UrlSigner {
    tickets: Arc<RwLock<HashMap<String, ObjectTicket>>>,
}

impl Default for UrlSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlSigner {
    pub fn new() -> Self {
        Self {
            tickets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn issue(
        &self,
        storage_key: &str,
        ttl_seconds: u64,
        variant: ObjectVariant,
    ) -> Result<ObjectTicket> {
        let ticket = ObjectTicket::new(storage_key, ttl_seconds, variant)?;

        if let Ok(mut tickets) = self.tickets.write() {
            tickets.insert(ticket.token.clone(), ticket.clone());

            // Clean up expired tickets while we have the lock
            tickets.retain(|_, t| !t.is_expired());
        }

        Ok(ticket)
    }

    pub fn redeem(&self, token: &str) -> Option<ObjectTicket> {
        let tickets = self.tickets.read().ok()?;
        tickets
            .get(token)
            .filter(|ticket| !ticket.is_expired())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_expiry() {
        let signer = UrlSigner::new();
        let live = signer.issue("a/b.jpg", 60, ObjectVariant::Full).unwrap();
        assert!(signer.redeem(&live.token).is_some());
        assert_eq!(live.expires_at - live.created_at, 60);

        let dead = signer.issue("a/b.jpg", 0, ObjectVariant::Full).unwrap();
        assert!(signer.redeem(&dead.token).is_none());
    }

    #[test]
    fn test_tickets_are_unique_per_issue() {
        let signer = UrlSigner::new();
        let one = signer.issue("a/b.jpg", 60, ObjectVariant::Full).unwrap();
        let two = signer.issue("a/b.jpg", 60, ObjectVariant::Thumbnail).unwrap();
        assert_ne!(one.token, two.token);
        assert_eq!(one.storage_key, two.storage_key);
    }

    #[test]
    fn test_path_traversal_rejected() {
        let store = ObjectStore::new("/tmp/haven-objects");
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("/etc/passwd").is_err());
        assert!(store.path_for("acct/../../x").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for("acct_1/file.jpg").is_ok());
    }
}
