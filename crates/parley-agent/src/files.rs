use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, Utc};
use parley_persist::{is_allowed_content_type, BlobStore, PersistenceClient, StoredFile, UploadToken};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::auth::Caller;
use crate::config::UploadSettings;
use crate::error::{ChatError, Result};

/// Resolved attachment handed to the UI and to model prompts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileForAi {
    pub url: String,
    pub content_type: String,
    pub size: u64,
    pub checksum: String,
    /// Milliseconds since the Unix epoch
    pub creation_time: i64,
}

/// Upload URL issuing, direct uploads and signed downloads
pub struct FileService {
    db: Arc<dyn PersistenceClient>,
    blobs: Arc<dyn BlobStore>,
    settings: UploadSettings,
}

impl FileService {
    pub fn new(
        db: Arc<dyn PersistenceClient>,
        blobs: Arc<dyn BlobStore>,
        settings: UploadSettings,
    ) -> Self {
        Self { db, blobs, settings }
    }

    fn base_url(&self) -> &str {
        self.settings.public_base_url.trim_end_matches('/')
    }

    /// Issue a single-use upload URL
    pub async fn generate_upload_url(&self, caller: &Caller) -> Result<String> {
        let user_id = caller.require()?;
        let token = UploadToken {
            token: uuid::Uuid::new_v4().simple().to_string(),
            user_id: user_id.to_string(),
            expires_at: Utc::now() + Duration::seconds(self.settings.url_ttl_secs as i64),
        };
        let url = format!("{}/upload/{}", self.base_url(), token.token);
        self.db.create_upload_token(token).await?;
        tracing::debug!(user_id, "upload URL issued");
        Ok(url)
    }

    /// Accept the bytes posted to an upload URL and return the storage id
    pub async fn store_upload(&self, token: &str, content_type: &str, bytes: Vec<u8>) -> Result<String> {
        let token = self
            .db
            .consume_upload_token(token)
            .await?
            .ok_or(ChatError::Unauthorized)?;
        if token.is_expired(Utc::now()) {
            return Err(ChatError::Unauthorized);
        }

        if !is_allowed_content_type(content_type) {
            return Err(ChatError::validation(format!(
                "Unsupported file type: {content_type}"
            )));
        }
        if bytes.is_empty() {
            return Err(ChatError::validation("File is empty"));
        }
        if bytes.len() as u64 > self.settings.max_bytes {
            return Err(ChatError::validation(format!(
                "File is too large (max {} MB)",
                self.settings.max_bytes / (1024 * 1024)
            )));
        }

        let storage_id = uuid::Uuid::new_v4().to_string();
        let file = StoredFile {
            storage_id: storage_id.clone(),
            user_id: token.user_id,
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            sha256: STANDARD.encode(Sha256::digest(&bytes)),
            created_at: Utc::now(),
        };
        self.blobs.put(&storage_id, bytes).await?;
        self.db.save_file(file).await?;
        tracing::info!(storage_id = %storage_id, content_type, "file stored");
        Ok(storage_id)
    }

    /// Metadata plus a signed URL; `None` for unknown or foreign files
    pub async fn get_file_for_ai(&self, caller: &Caller, storage_id: &str) -> Result<Option<FileForAi>> {
        let user_id = caller.require()?;
        let Some(file) = self.db.get_file(storage_id).await? else {
            return Ok(None);
        };
        if file.user_id != user_id {
            return Ok(None);
        }
        Ok(Some(FileForAi {
            url: self.signed_url(&file.storage_id),
            content_type: file.content_type,
            size: file.size,
            checksum: file.sha256,
            creation_time: file.created_at.timestamp_millis(),
        }))
    }

    /// Stored file owned by the caller, or a validation error naming it
    pub async fn owned_file(&self, user_id: &str, storage_id: &str) -> Result<StoredFile> {
        match self.db.get_file(storage_id).await? {
            Some(file) if file.user_id == user_id => Ok(file),
            _ => Err(ChatError::validation(format!(
                "Unknown attachment: {storage_id}"
            ))),
        }
    }

    pub fn signed_url(&self, storage_id: &str) -> String {
        format!(
            "{}/files/{}?sig={}",
            self.base_url(),
            storage_id,
            self.signature(storage_id)
        )
    }

    fn signature(&self, storage_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.settings.url_secret.as_bytes());
        hasher.update(storage_id.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn verify_signature(&self, storage_id: &str, sig: &str) -> bool {
        let expected = self.signature(storage_id);
        // Compare every byte regardless of where the first mismatch is
        expected.len() == sig.len()
            && expected
                .bytes()
                .zip(sig.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }

    /// Bytes behind a signed URL
    pub async fn download(&self, storage_id: &str, sig: &str) -> Result<(StoredFile, Vec<u8>)> {
        if !self.verify_signature(storage_id, sig) {
            return Err(ChatError::Unauthorized);
        }
        let file = self
            .db
            .get_file(storage_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("file {storage_id}")))?;
        let bytes = self
            .blobs
            .get(storage_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("file {storage_id}")))?;
        Ok((file, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_persist::{MemoryBlobStore, MemoryPersistenceClient};

    fn service() -> FileService {
        let settings = UploadSettings {
            public_base_url: "http://files.test/".into(),
            url_secret: "s3cret".into(),
            ..Default::default()
        };
        FileService::new(
            Arc::new(MemoryPersistenceClient::new()),
            Arc::new(MemoryBlobStore::new()),
            settings,
        )
    }

    fn token_of(url: &str) -> &str {
        url.rsplit('/').next().unwrap()
    }

    #[tokio::test]
    async fn test_upload_then_resolve() {
        let files = service();
        let caller = Caller::user("u1");

        let url = files.generate_upload_url(&caller).await.unwrap();
        assert!(url.starts_with("http://files.test/upload/"));

        let id = files
            .store_upload(token_of(&url), "text/plain", b"hello".to_vec())
            .await
            .unwrap();

        let meta = files.get_file_for_ai(&caller, &id).await.unwrap().unwrap();
        assert_eq!(meta.content_type, "text/plain");
        assert_eq!(meta.size, 5);
        assert_eq!(meta.checksum, STANDARD.encode(Sha256::digest(b"hello")));

        let sig = meta.url.split("sig=").nth(1).unwrap();
        let (file, bytes) = files.download(&id, sig).await.unwrap();
        assert_eq!(file.size, 5);
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn test_upload_url_is_single_use() {
        let files = service();
        let url = files.generate_upload_url(&Caller::user("u1")).await.unwrap();
        let token = token_of(&url);

        files.store_upload(token, "image/png", vec![1]).await.unwrap();
        let again = files.store_upload(token, "image/png", vec![1]).await;
        assert!(matches!(again, Err(ChatError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_upload_rejects_type_and_size() {
        let files = service();
        let caller = Caller::user("u1");

        let url = files.generate_upload_url(&caller).await.unwrap();
        let err = files
            .store_upload(token_of(&url), "application/zip", vec![1])
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));

        let url = files.generate_upload_url(&caller).await.unwrap();
        let big = vec![0u8; (parley_persist::MAX_UPLOAD_BYTES + 1) as usize];
        let err = files
            .store_upload(token_of(&url), "image/png", big)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }

    #[tokio::test]
    async fn test_resolve_requires_auth_and_hides_others() {
        let files = service();
        assert!(matches!(
            files.get_file_for_ai(&Caller::Anonymous, "x").await,
            Err(ChatError::Unauthenticated)
        ));
        assert!(matches!(
            files.generate_upload_url(&Caller::Anonymous).await,
            Err(ChatError::Unauthenticated)
        ));

        let url = files.generate_upload_url(&Caller::user("u1")).await.unwrap();
        let id = files
            .store_upload(token_of(&url), "image/png", vec![1, 2])
            .await
            .unwrap();

        assert!(files.get_file_for_ai(&Caller::user("u2"), &id).await.unwrap().is_none());
        assert!(files.get_file_for_ai(&Caller::user("u1"), "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_signature_is_rejected() {
        let files = service();
        assert!(!files.verify_signature("abc", "deadbeef"));
        assert!(matches!(
            files.download("abc", "deadbeef").await,
            Err(ChatError::Unauthorized)
        ));
    }
}
