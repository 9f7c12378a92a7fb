use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ChaCha20Poly1305 for authenticated encryption
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};

const SALT_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const PBKDF2_ROUNDS: u32 = 100_000;
const SEALED_SEED_VERSION: u32 = 1;

/// A mnemonic sealed under a password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedSeed {
    pub version: u32,
    pub encryption_method: String,
    #[serde(with = "crate::types::serde_hex")]
    pub salt: Vec<u8>,
    #[serde(with = "crate::types::serde_hex")]
    pub nonce: Vec<u8>,
    #[serde(with = "crate::types::serde_hex")]
    pub ciphertext: Vec<u8>,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

pub fn seal(data: &[u8], password: &str) -> Result<SealedSeed> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(password, &salt);
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let cipher = ChaCha20Poly1305::new(&key);

    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|e| CoreError::crypto(format!("Encryption failed: {}", e)))?;

    let checksum = calculate_checksum(&ciphertext);

    Ok(SealedSeed {
        version: SEALED_SEED_VERSION,
        encryption_method: "ChaCha20Poly1305".to_string(),
        salt: salt.to_vec(),
        nonce: nonce.to_vec(),
        ciphertext,
        checksum,
        created_at: Utc::now(),
    })
}

pub fn open(sealed: &SealedSeed, password: &str) -> Result<Vec<u8>> {
    if sealed.version != SEALED_SEED_VERSION {
        return Err(CoreError::crypto(format!(
            "Unsupported sealed seed version {}",
            sealed.version
        )));
    }

    if calculate_checksum(&sealed.ciphertext) != sealed.checksum {
        return Err(CoreError::crypto("Sealed seed checksum verification failed"));
    }

    if sealed.nonce.len() != NONCE_SIZE {
        return Err(CoreError::crypto("Sealed seed nonce has wrong length"));
    }

    let key = derive_key(password, &sealed.salt);
    let cipher = ChaCha20Poly1305::new(&key);
    let nonce = Nonce::from_slice(&sealed.nonce);

    cipher
        .decrypt(nonce, sealed.ciphertext.as_ref())
        .map_err(|_| CoreError::crypto("Decryption failed: wrong password or corrupted seed"))
}

fn derive_key(password: &str, salt: &[u8]) -> Key {
    use pbkdf2::pbkdf2_hmac;

    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    *Key::from_slice(&key)
}

fn calculate_checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
