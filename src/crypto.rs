use anyhow::{Result, anyhow};
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use hmac::{Hmac, Mac};
use rand::{TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const ENCRYPTION_KEY_LABEL: u8 = 0x01;
const MAC_KEY_LABEL: u8 = 0x02;

/// Upper bounds for header-supplied cost parameters, checked before any derivation.
pub const MAX_MEMORY_KIB: u32 = 1024 * 1024;
pub const MAX_ITERATIONS: u32 = 64;
pub const MAX_PARALLELISM: u32 = 16;

/// Argon2id cost parameters, stored in the container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl KdfParams {
    /// The cheapest parameters argon2 accepts. Used by tests and the startup probe.
    pub fn minimal() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST,
            iterations: Params::MIN_T_COST,
            parallelism: Params::MIN_P_COST,
        }
    }

    pub fn check_limits(&self) -> Result<()> {
        if self.memory_kib > MAX_MEMORY_KIB {
            return Err(anyhow!(
                "Argon2id memory cost {} KiB exceeds the limit of {} KiB",
                self.memory_kib,
                MAX_MEMORY_KIB
            ));
        }
        if self.iterations > MAX_ITERATIONS {
            return Err(anyhow!(
                "Argon2id iteration count {} exceeds the limit of {}",
                self.iterations,
                MAX_ITERATIONS
            ));
        }
        if self.parallelism > MAX_PARALLELISM {
            return Err(anyhow!(
                "Argon2id parallelism {} exceeds the limit of {}",
                self.parallelism,
                MAX_PARALLELISM
            ));
        }
        Ok(())
    }
}

/// Keys derived from one master key.
pub struct DerivedKeys {
    pub encryption: Zeroizing<[u8; 32]>,
    pub mac: Zeroizing<[u8; 32]>,
}

/// Combines the credential factors into one composite key.
///
/// Each present factor is hashed on its own and the hashes are hashed together,
/// passphrase first.
pub fn composite_key(password: Option<&[u8]>, keyfile: Option<&[u8]>) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    for factor in [password, keyfile].into_iter().flatten() {
        hasher.update(Sha256::digest(factor));
    }
    Zeroizing::new(hasher.finalize().into())
}

pub fn derive_key(composite: &[u8; 32], salt: &[u8], kdf: &KdfParams) -> Result<DerivedKeys> {
    kdf.check_limits()?;
    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(32))
        .map_err(|e| anyhow!("Invalid Argon2id parameters: {}", e))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut master = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(composite, salt, &mut master[..])
        .map_err(|e| anyhow!("Failed to derive encryption key using Argon2id: {}", e))?;

    Ok(DerivedKeys {
        encryption: subkey(&master, ENCRYPTION_KEY_LABEL),
        mac: subkey(&master, MAC_KEY_LABEL),
    })
}

fn subkey(master: &[u8; 32], label: u8) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(master);
    hasher.update([label]);
    Zeroizing::new(hasher.finalize().into())
}

pub fn generate_salt() -> Result<[u8; 16]> {
    let mut salt = [0u8; 16];
    OsRng.try_fill_bytes(&mut salt)?;
    Ok(salt)
}

pub fn generate_nonce() -> Result<[u8; 12]> {
    let mut nonce_bytes = [0u8; 12];
    OsRng.try_fill_bytes(&mut nonce_bytes)?;
    Ok(nonce_bytes)
}

pub fn checksum(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn sign(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| anyhow!("Invalid MAC key: {}", e))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Constant-time check of a header signature.
pub fn verify(data: &[u8], key: &[u8; 32], tag: &[u8]) -> bool {
    match <HmacSha256 as Mac>::new_from_slice(key) {
        Ok(mut mac) => {
            mac.update(data);
            mac.verify_slice(tag).is_ok()
        }
        Err(_) => false,
    }
}

pub fn encrypt(data: &[u8], aad: &[u8], key: &[u8; 32], nonce: &[u8; 12]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.into());
    let nonce = Nonce::from_slice(nonce);
    cipher
        .encrypt(nonce, Payload { msg: data, aad })
        .map_err(|_| anyhow!("Encryption failed"))
}

pub fn decrypt(encrypted_data: &[u8], aad: &[u8], key: &[u8; 32], nonce: &[u8; 12]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.into());
    let nonce = Nonce::from_slice(nonce);
    cipher
        .decrypt(nonce, Payload { msg: encrypted_data, aad })
        .map_err(|_| anyhow!("Decryption failed - payload checksum mismatch"))
}

/// Checks that the key derivation backend works at all.
pub fn probe() -> Result<()> {
    let composite = composite_key(Some(&b"probe"[..]), None);
    derive_key(&composite, &[0u8; 16], &KdfParams::minimal()).map(|_| ())
}
