//! Encrypted JSON file store.
//!
//! # Responsibilities
//! - Keep a small map of string values in one JSON file
//! - Encrypt each value with ChaCha20-Poly1305 (random nonce per write)
//! - Derive the key from a configured secret with BLAKE2s
//!
//! # Design Decisions
//! - File is rewritten on every write; the map is tiny and writes are rare
//! - A value that fails to decrypt reads as absent, not as an error

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use blake2::{Blake2s256, Digest};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;

use crate::storage::{KeyValueStore, StorageError};

const NONCE_LEN: usize = 12;

/// Key/value store persisted to a JSON file, values encrypted.
pub struct FileStore {
    path: PathBuf,
    cipher: ChaCha20Poly1305,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, loading existing entries if the file exists.
    pub fn open(path: impl AsRef<Path>, secret: &str) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let digest = Blake2s256::digest(secret.as_bytes());
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&digest));

        let entries = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let map: HashMap<String, String> = serde_json::from_reader(reader)?;
            tracing::debug!(path = %path.display(), entries = map.len(), "Loaded store file");
            map
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            cipher,
            entries: Mutex::new(entries),
        })
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, StorageError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| StorageError::Crypto(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn decrypt(&self, encoded: &str) -> Option<String> {
        let sealed = STANDARD.decode(encoded).ok()?;
        if sealed.len() <= NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self.cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()?;
        String::from_utf8(plaintext).ok()
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer(writer, entries)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn read_encrypted(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(encoded) = entries.get(key) else {
            return Ok(None);
        };
        let value = self.decrypt(encoded);
        if value.is_none() {
            tracing::warn!(key = %key, "Stored value could not be decrypted, ignoring it");
        }
        Ok(value)
    }

    fn write_encrypted(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let sealed = self.encrypt(value)?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), sealed);
        self.save(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("server_api_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_round_trip_across_reopen() {
        let path = temp_path("round_trip");
        let _ = fs::remove_file(&path);

        let store = FileStore::open(&path, "secret").unwrap();
        store.write_encrypted("flv", "alt.example.com").unwrap();

        let reopened = FileStore::open(&path, "secret").unwrap();
        assert_eq!(reopened.read_encrypted("flv").unwrap().as_deref(), Some("alt.example.com"));
        assert!(reopened.read_encrypted("missing").unwrap().is_none());

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_value_not_stored_in_plaintext() {
        let path = temp_path("plaintext");
        let _ = fs::remove_file(&path);

        let store = FileStore::open(&path, "secret").unwrap();
        store.write_encrypted("flv", "alt.example.com").unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("alt.example.com"));

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_wrong_secret_reads_as_absent() {
        let path = temp_path("wrong_secret");
        let _ = fs::remove_file(&path);

        let store = FileStore::open(&path, "secret").unwrap();
        store.write_encrypted("flv", "alt.example.com").unwrap();

        let other = FileStore::open(&path, "another").unwrap();
        assert!(other.read_encrypted("flv").unwrap().is_none());

        fs::remove_file(&path).unwrap_or_default();
    }
}
