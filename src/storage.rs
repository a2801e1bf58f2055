use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::crypto::KdfParams;
use crate::error::{GroupError, Result};

pub const FORMAT_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHeader {
    pub kdf: KdfParams,
    pub argon2_salt: String,      // Base64 encoded
    pub encryption_nonce: String, // Base64 encoded
}

impl StoreHeader {
    /// Canonical bytes covered by the checksum, the MAC and the AEAD tag.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            GroupError::persistence_caused_by("Could not serialize the database header.", e)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedStore {
    pub version: u8,
    pub header: StoreHeader,
    pub header_sha256: String,  // Base64 encoded
    pub header_hmac: String,    // Base64 encoded
    pub encrypted_data: String, // Base64 encoded
}

pub fn load_encrypted_store(path: &Path) -> Result<EncryptedStore> {
    let file_content = fs::read_to_string(path).map_err(|e| GroupError::NotFound {
        message: "Could not open the database or keyfile.".to_string(),
        source: Some(e),
    })?;
    if file_content.trim().is_empty() {
        return Err(GroupError::Corruption("database file is empty".to_string()));
    }
    let store: EncryptedStore = serde_json::from_str(&file_content)
        .map_err(|e| GroupError::Corruption(format!("malformed container: {}", e)))?;
    if store.version != FORMAT_VERSION {
        return Err(GroupError::Corruption(format!(
            "unsupported container version {}",
            store.version
        )));
    }
    Ok(store)
}

/// Writes the container through a temp file in the same directory, then
/// renames it over `path`. A failed write never truncates the existing database.
pub fn save_encrypted_store(path: &Path, store: &EncryptedStore) -> Result<()> {
    let json = serde_json::to_string_pretty(store).map_err(|e| {
        GroupError::persistence_caused_by("Could not serialize the database.", e)
    })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = format!(
        ".{}.",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("passgroup")
    );
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| GroupError::persistence_caused_by("Could not create a temporary file.", e))?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| GroupError::persistence_caused_by("Could not write the database.", e))?;
    tmp.persist(path).map_err(|e| {
        GroupError::persistence_caused_by("Could not replace the database.", e.error)
    })?;
    Ok(())
}

pub fn encode(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decodes a base64 container field; `field` names it in the corruption message.
pub fn decode(encoded: &str, field: &str) -> Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| GroupError::Corruption(format!("invalid {}: {}", field, e)))
}

/// Like [`decode`], but also checks the decoded length.
pub fn decode_array<const N: usize>(encoded: &str, field: &str) -> Result<[u8; N]> {
    let bytes = decode(encoded, field)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        GroupError::Corruption(format!(
            "invalid {}: expected {} bytes, got {}",
            field,
            N,
            bytes.len()
        ))
    })
}
