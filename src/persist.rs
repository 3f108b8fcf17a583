//! Encrypted persistence for memory and conversation snapshots.
//!
//! Values are serialized to JSON, sealed with AES-256-GCM under a key
//! derived from the configured secret, and written with a temp-file +
//! rename so a crash never leaves a partial blob behind. A blob that fails
//! authentication on load is deleted and replaced by the caller's fallback
//! so corruption can never permanently block an identity.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::{debug, warn};

const NONCE_SIZE: usize = 12;

pub struct PersistenceLayer {
    root: PathBuf,
    cipher: Aes256Gcm,
}

impl PersistenceLayer {
    pub fn new(root: impl Into<PathBuf>, secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key).expect("SHA-256 digest is 32 bytes");
        Self {
            root: root.into(),
            cipher,
        }
    }

    fn blob_path(&self, namespace: &str, id: &str) -> PathBuf {
        self.root.join(namespace).join(format!("{id}.json"))
    }

    fn seal(&self, plaintext: &[u8]) -> anyhow::Result<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| anyhow::anyhow!("Failed to encrypt payload: {:?}", e))?;

        let mut packed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        packed.extend_from_slice(&nonce_bytes);
        packed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(packed))
    }

    fn open(&self, payload: &str) -> anyhow::Result<Vec<u8>> {
        let packed = BASE64.decode(payload.trim())?;
        if packed.len() < NONCE_SIZE {
            anyhow::bail!("Payload too short");
        }

        let (nonce_bytes, ciphertext) = packed.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| anyhow::anyhow!("Authentication failed"))
    }

    /// Serialize, encrypt and atomically replace `namespace/id`.
    pub async fn save<T: Serialize>(
        &self,
        namespace: &str,
        id: &str,
        value: &T,
    ) -> anyhow::Result<()> {
        let path = self.blob_path(namespace, id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec(value)?;
        let payload = self.seal(&json)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, payload.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Persisted {}/{}", namespace, id);
        Ok(())
    }

    /// Decrypt and parse `namespace/id`, returning `fallback` when the blob
    /// is absent. A blob that fails authentication or parsing is deleted
    /// before the fallback is returned.
    pub async fn load<T: DeserializeOwned>(&self, namespace: &str, id: &str, fallback: T) -> T {
        let path = self.blob_path(namespace, id);
        let payload = match tokio::fs::read_to_string(&path).await {
            Ok(payload) => payload,
            Err(_) => return fallback,
        };

        let parsed = self
            .open(&payload)
            .and_then(|json| Ok(serde_json::from_slice(&json)?));

        match parsed {
            Ok(value) => value,
            Err(e) => {
                warn!("Discarding corrupt blob {}/{}: {}", namespace, id, e);
                let _ = tokio::fs::remove_file(&path).await;
                fallback
            }
        }
    }

    /// Delete `namespace/id` if present.
    pub async fn remove(&self, namespace: &str, id: &str) -> anyhow::Result<()> {
        match tokio::fs::remove_file(self.blob_path(namespace, id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        tags: Vec<String>,
        count: u64,
    }

    fn sample() -> Sample {
        Sample {
            name: "alice".to_string(),
            tags: vec!["a".to_string(), "b".to_string()],
            count: 7,
        }
    }

    #[tokio::test]
    async fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let layer = PersistenceLayer::new(dir.path(), "secret");

        layer.save("memory/user", "1", &sample()).await.unwrap();
        let loaded: Sample = layer
            .load(
                "memory/user",
                "1",
                Sample {
                    name: String::new(),
                    tags: vec![],
                    count: 0,
                },
            )
            .await;
        assert_eq!(loaded, sample());
    }

    #[tokio::test]
    async fn missing_blob_returns_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let layer = PersistenceLayer::new(dir.path(), "secret");

        let loaded: Vec<String> = layer
            .load("conversations", "nope", vec!["fallback".to_string()])
            .await;
        assert_eq!(loaded, vec!["fallback".to_string()]);
    }

    #[tokio::test]
    async fn on_disk_payload_is_not_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let layer = PersistenceLayer::new(dir.path(), "secret");
        layer.save("memory/user", "1", &sample()).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("memory/user/1.json")).unwrap();
        assert!(!raw.contains("alice"));
    }

    #[tokio::test]
    async fn tampered_blob_is_deleted_and_fallback_returned() {
        let dir = tempfile::tempdir().unwrap();
        let layer = PersistenceLayer::new(dir.path(), "secret");
        layer.save("memory/user", "1", &sample()).await.unwrap();

        let path = dir.path().join("memory/user/1.json");
        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.replace_range(10..12, "!!");
        std::fs::write(&path, raw).unwrap();

        let loaded: Option<Sample> = layer.load("memory/user", "1", None).await;
        assert!(loaded.is_none());
        assert!(!path.exists(), "corrupt blob should be deleted");
    }

    #[tokio::test]
    async fn wrong_secret_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PersistenceLayer::new(dir.path(), "secret-a");
        writer.save("memory/user", "1", &sample()).await.unwrap();

        let reader = PersistenceLayer::new(dir.path(), "secret-b");
        let loaded: Option<Sample> = reader.load("memory/user", "1", None).await;
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_overwrites_previous_blob() {
        let dir = tempfile::tempdir().unwrap();
        let layer = PersistenceLayer::new(dir.path(), "secret");

        layer.save("conversations", "g1", &1u32).await.unwrap();
        layer.save("conversations", "g1", &2u32).await.unwrap();
        let loaded: u32 = layer.load("conversations", "g1", 0).await;
        assert_eq!(loaded, 2);
    }
}
