use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::Rng;
use sha2::Sha256;

use weft_core::error::{Result, WeftError};

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const SALT_SIZE: usize = 16;
const PBKDF2_ROUNDS: u32 = 100_000;

/// Credential vault: AES-256-GCM with a PBKDF2-derived key.
///
/// The master key comes from `ENCRYPTION_KEY`, a 64-char hex string
/// (32 bytes). Each blob carries its own random salt and nonce:
/// `hex(salt ‖ nonce ‖ ciphertext)`.
pub struct Vault {
    master: [u8; KEY_SIZE],
}

impl Vault {
    /// Build a vault from a 64-char hex master key.
    pub fn new(key_hex: &str) -> Result<Self> {
        let bytes = hex::decode(key_hex)
            .map_err(|_| WeftError::Credential("ENCRYPTION_KEY is not valid hex".into()))?;
        let master: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| WeftError::Credential("ENCRYPTION_KEY must be 32 bytes (64 hex chars)".into()))?;
        Ok(Self { master })
    }

    /// Read the master key from the `ENCRYPTION_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var("ENCRYPTION_KEY")
            .map_err(|_| WeftError::Credential("ENCRYPTION_KEY is not set".into()))?;
        Self::new(&key)
    }

    fn derive_key(&self, salt: &[u8]) -> [u8; KEY_SIZE] {
        let mut derived = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(&self.master, salt, PBKDF2_ROUNDS, &mut derived);
        derived
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_SIZE];
        rng.fill(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rng.fill(&mut nonce_bytes);

        let derived = self.derive_key(&salt);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| WeftError::Credential("encryption failed".into()))?;

        let mut blob = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(hex::encode(blob))
    }

    pub fn decrypt(&self, blob_hex: &str) -> Result<String> {
        let blob = hex::decode(blob_hex)
            .map_err(|_| WeftError::Credential("stored credential is not valid hex".into()))?;
        if blob.len() <= SALT_SIZE + NONCE_SIZE {
            return Err(WeftError::Credential("stored credential is too short".into()));
        }

        let (salt, rest) = blob.split_at(SALT_SIZE);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

        let derived = self.derive_key(salt);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| WeftError::Credential("decryption failed".into()))?;

        String::from_utf8(plaintext)
            .map_err(|_| WeftError::Credential("decrypted credential is not UTF-8".into()))
    }
}
