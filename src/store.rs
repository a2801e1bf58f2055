//! The credential store: an encrypted container holding a tree of groups.
//!
//! [`CredentialStore`] is the seam the reconciler works against; [`Database`]
//! is the file-backed implementation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::{self, KdfParams};
use crate::error::{GroupError, Result};
use crate::group::Group;
use crate::secret::SensitiveString;
use crate::storage::{self, EncryptedStore, FORMAT_VERSION, StoreHeader};

/// Group operations an opened store offers.
pub trait CredentialStore {
    /// Groups named exactly `name`, in tree order. With `first_only` at most one is returned.
    fn find_groups(&self, name: &str, first_only: bool) -> Vec<Group>;

    /// Adds a new group directly under the root group.
    fn add_group(&mut self, name: &str, icon_id: &str, notes: &str) -> Result<Group>;

    fn group_mut(&mut self, uuid: &Uuid) -> Option<&mut Group>;

    fn delete_group(&mut self, uuid: &Uuid) -> Result<()>;

    /// Commits pending changes.
    fn save(&mut self) -> Result<()>;
}

/// The factors that unlock a container. At least one should be present.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub password: Option<SensitiveString>,
    pub keyfile: Option<PathBuf>,
}

impl Credentials {
    pub fn new(password: Option<SensitiveString>, keyfile: Option<PathBuf>) -> Self {
        Self { password, keyfile }
    }

    pub fn with_password(password: impl Into<String>) -> Self {
        Self::new(Some(SensitiveString::new(password.into())), None)
    }

    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.keyfile.is_none()
    }

    fn composite_key(&self) -> Result<Zeroizing<[u8; 32]>> {
        let keyfile = match &self.keyfile {
            Some(path) => Some(Zeroizing::new(fs::read(path).map_err(|e| {
                GroupError::NotFound {
                    message: "Could not open the database or keyfile.".to_string(),
                    source: Some(e),
                }
            })?)),
            None => None,
        };
        Ok(crypto::composite_key(
            self.password.as_ref().map(|p| p.expose().as_bytes()),
            keyfile.as_ref().map(|k| k.as_slice()),
        ))
    }
}

#[derive(Serialize, Deserialize)]
struct StorePayload {
    root: Group,
}

/// An opened, authenticated container.
pub struct Database {
    path: PathBuf,
    root: Group,
    kdf: KdfParams,
    composite: Zeroizing<[u8; 32]>,
}

impl Database {
    /// Writes a new container with an empty root group.
    pub fn create(path: &Path, credentials: &Credentials, kdf: KdfParams) -> Result<Self> {
        if credentials.is_empty() {
            return Err(GroupError::configuration(
                "Either 'database_password' or 'keyfile' (or both) are required.",
            ));
        }
        if path.exists() {
            return Err(GroupError::persistence(format!(
                "Refusing to overwrite existing database {}",
                path.display()
            )));
        }
        let mut db = Self {
            path: path.to_path_buf(),
            root: Group::root(),
            kdf,
            composite: credentials.composite_key()?,
        };
        db.save()?;
        log::info!("Created database {}", path.display());
        Ok(db)
    }

    /// Opens and authenticates a container.
    ///
    /// Fails with `NotFound` when the container or key file cannot be read,
    /// `Authentication` when the header signature does not verify under the
    /// given factors, and `Corruption` for any integrity failure.
    pub fn open(path: &Path, credentials: &Credentials) -> Result<Self> {
        let store = storage::load_encrypted_store(path)?;
        let composite = credentials.composite_key()?;

        let header_bytes = store.header.to_bytes()?;
        let expected_sum: [u8; 32] = storage::decode_array(&store.header_sha256, "header checksum")?;
        if crypto::checksum(&header_bytes) != expected_sum {
            return Err(GroupError::Corruption("header checksum mismatch".to_string()));
        }

        store
            .header
            .kdf
            .check_limits()
            .map_err(|e| GroupError::Corruption(e.to_string()))?;
        let salt = storage::decode(&store.header.argon2_salt, "salt")?;
        let nonce: [u8; 12] = storage::decode_array(&store.header.encryption_nonce, "nonce")?;
        let tag = storage::decode(&store.header_hmac, "header signature")?;
        let keys = crypto::derive_key(&composite, &salt, &store.header.kdf)
            .map_err(|e| GroupError::Corruption(e.to_string()))?;
        if !crypto::verify(&header_bytes, &keys.mac, &tag) {
            return Err(GroupError::Authentication);
        }

        let encrypted = storage::decode(&store.encrypted_data, "payload")?;
        let plaintext = Zeroizing::new(
            crypto::decrypt(&encrypted, &header_bytes, &keys.encryption, &nonce)
                .map_err(|_| GroupError::Corruption("payload checksum mismatch".to_string()))?,
        );
        let payload: StorePayload = serde_json::from_slice(&plaintext)
            .map_err(|e| GroupError::Corruption(format!("malformed payload: {}", e)))?;

        log::debug!("Opened database {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            root: payload.root,
            kdf: store.header.kdf,
            composite,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root_group(&self) -> &Group {
        &self.root
    }

    fn seal(&self) -> anyhow::Result<EncryptedStore> {
        let salt = crypto::generate_salt()?;
        let nonce = crypto::generate_nonce()?;
        let header = StoreHeader {
            kdf: self.kdf,
            argon2_salt: storage::encode(&salt),
            encryption_nonce: storage::encode(&nonce),
        };
        let header_bytes = serde_json::to_vec(&header)?;
        let keys = crypto::derive_key(&self.composite, &salt, &self.kdf)?;

        let payload = Zeroizing::new(serde_json::to_vec(&StorePayload {
            root: self.root.clone(),
        })?);
        let encrypted = crypto::encrypt(&payload, &header_bytes, &keys.encryption, &nonce)?;

        Ok(EncryptedStore {
            version: FORMAT_VERSION,
            header_sha256: storage::encode(&crypto::checksum(&header_bytes)),
            header_hmac: storage::encode(&crypto::sign(&header_bytes, &keys.mac)?),
            header,
            encrypted_data: storage::encode(&encrypted),
        })
    }
}

impl CredentialStore for Database {
    fn find_groups(&self, name: &str, first_only: bool) -> Vec<Group> {
        let matches = self.root.descendants().into_iter().filter(|g| g.name == name);
        if first_only {
            matches.take(1).cloned().collect()
        } else {
            matches.cloned().collect()
        }
    }

    fn add_group(&mut self, name: &str, icon_id: &str, notes: &str) -> Result<Group> {
        if name.is_empty() {
            return Err(GroupError::persistence("Group name must not be empty."));
        }
        let group = Group::new(name, icon_id, notes);
        self.root.groups.push(group.clone());
        log::debug!("Added group '{}' under root", name);
        Ok(group)
    }

    fn group_mut(&mut self, uuid: &Uuid) -> Option<&mut Group> {
        self.root.find_mut(uuid)
    }

    fn delete_group(&mut self, uuid: &Uuid) -> Result<()> {
        match self.root.remove(uuid) {
            Some(group) => {
                log::debug!("Deleted group '{}'", group.name);
                Ok(())
            }
            None => Err(GroupError::persistence(format!("Group {} is not in the database.", uuid))),
        }
    }

    fn save(&mut self) -> Result<()> {
        let store = self.seal().map_err(|e| GroupError::Persistence {
            message: "Could not save the database.".to_string(),
            source: Some(e.into()),
        })?;
        crate::log_timed!("database save", storage::save_encrypted_store(&self.path, &store))?;
        log::debug!("Saved database {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_db(dir: &TempDir, credentials: &Credentials) -> (PathBuf, Database) {
        let path = dir.path().join("groups.db");
        let db = Database::create(&path, credentials, KdfParams::minimal()).unwrap();
        (path, db)
    }

    #[test]
    fn test_create_and_reopen() {
        let dir = TempDir::new().unwrap();
        let creds = Credentials::with_password("pw");
        let (path, mut db) = new_db(&dir, &creds);
        db.add_group("Web", "12", "servers").unwrap();
        db.save().unwrap();

        let reopened = Database::open(&path, &creds).unwrap();
        let found = reopened.find_groups("Web", false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].icon_id, "12");
        assert_eq!(found[0].notes, "servers");
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let creds = Credentials::with_password("pw");
        let (path, _db) = new_db(&dir, &creds);
        assert!(matches!(
            Database::create(&path, &creds, KdfParams::minimal()),
            Err(GroupError::Persistence { .. })
        ));
    }

    #[test]
    fn test_wrong_password_is_authentication_error() {
        let dir = TempDir::new().unwrap();
        let (path, _db) = new_db(&dir, &Credentials::with_password("right"));
        assert!(matches!(
            Database::open(&path, &Credentials::with_password("wrong")),
            Err(GroupError::Authentication)
        ));
    }

    #[test]
    fn test_keyfile_factor() {
        let dir = TempDir::new().unwrap();
        let keyfile = dir.path().join("db.key");
        fs::write(&keyfile, b"key material").unwrap();
        let both = Credentials::new(Some(SensitiveString::new("pw")), Some(keyfile.clone()));
        let (path, _db) = new_db(&dir, &both);

        assert!(Database::open(&path, &both).is_ok());
        assert!(matches!(
            Database::open(&path, &Credentials::with_password("pw")),
            Err(GroupError::Authentication)
        ));

        let missing = Credentials::new(None, Some(dir.path().join("absent.key")));
        assert!(matches!(
            Database::open(&path, &missing),
            Err(GroupError::NotFound { .. })
        ));
    }

    #[test]
    fn test_tampered_header_is_corruption() {
        let dir = TempDir::new().unwrap();
        let creds = Credentials::with_password("pw");
        let (path, _db) = new_db(&dir, &creds);

        let mut store = storage::load_encrypted_store(&path).unwrap();
        store.header.kdf.iterations += 1;
        storage::save_encrypted_store(&path, &store).unwrap();

        assert!(matches!(
            Database::open(&path, &creds),
            Err(GroupError::Corruption(_))
        ));
    }

    #[test]
    fn test_oversized_kdf_header_is_corruption() {
        let dir = TempDir::new().unwrap();
        let creds = Credentials::with_password("pw");
        let (path, _db) = new_db(&dir, &creds);

        // A rewritten header with a matching checksum still has to stay within the cost limits.
        let mut store = storage::load_encrypted_store(&path).unwrap();
        store.header.kdf.memory_kib = 64 * 1024 * 1024;
        let header_bytes = store.header.to_bytes().unwrap();
        store.header_sha256 = storage::encode(&crypto::checksum(&header_bytes));
        storage::save_encrypted_store(&path, &store).unwrap();

        match Database::open(&path, &creds) {
            Err(GroupError::Corruption(message)) => assert!(message.contains("memory cost")),
            Err(other) => panic!("expected corruption, got {:?}", other),
            Ok(_) => panic!("expected corruption, database opened"),
        }
    }

    #[test]
    fn test_tampered_payload_is_corruption() {
        let dir = TempDir::new().unwrap();
        let creds = Credentials::with_password("pw");
        let (path, _db) = new_db(&dir, &creds);

        let mut store = storage::load_encrypted_store(&path).unwrap();
        let mut data = storage::decode(&store.encrypted_data, "payload").unwrap();
        data[0] ^= 0xff;
        store.encrypted_data = storage::encode(&data);
        storage::save_encrypted_store(&path, &store).unwrap();

        assert!(matches!(
            Database::open(&path, &creds),
            Err(GroupError::Corruption(_))
        ));
    }

    #[test]
    fn test_find_groups_first_only_and_root_excluded() {
        let dir = TempDir::new().unwrap();
        let (_path, mut db) = new_db(&dir, &Credentials::with_password("pw"));
        db.add_group("Dup", "1", "").unwrap();
        db.add_group("Dup", "2", "").unwrap();

        assert_eq!(db.find_groups("Dup", false).len(), 2);
        let first = db.find_groups("Dup", true);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].icon_id, "1");
        assert!(db.find_groups("Root", false).is_empty());
        assert!(db.find_groups("dup", false).is_empty());
    }

    #[test]
    fn test_delete_unknown_group() {
        let dir = TempDir::new().unwrap();
        let (_path, mut db) = new_db(&dir, &Credentials::with_password("pw"));
        assert!(db.delete_group(&Uuid::new_v4()).is_err());
    }
}
