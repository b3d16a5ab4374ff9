use anyhow::{anyhow, bail, Context, Result};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use sha2::{Digest, Sha256};

use crate::domain::ports::ValueCipher;
use crate::infrastructure::config::CipherConfig;

const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;
const KEY_DERIVATION_DOMAIN: &str = "envsync.cipher.key.v1";

/// XChaCha20-Poly1305 implementation of [`ValueCipher`].
///
/// Ciphertext format: `hex(nonce):hex(ciphertext || tag)`. A fresh random
/// nonce is drawn per call, so encrypting the same value twice yields two
/// different strings.
pub struct ChaChaValueCipher {
    cipher: XChaCha20Poly1305,
}

impl ChaChaValueCipher {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(&key)),
        }
    }

    pub fn from_config(cfg: &CipherConfig) -> Result<Self> {
        Ok(Self::new(derive_key(&cfg.key)?))
    }
}

/// Turn the configured key material into a 32-byte key.
///
/// - 64 hex characters are decoded as the raw key.
/// - Anything else is treated as a passphrase and hashed with SHA-256 under a
///   fixed domain prefix.
pub fn derive_key(material: &str) -> Result<[u8; KEY_LEN]> {
    let material = material.trim();
    if material.is_empty() {
        bail!("cipher key is empty; set [cipher].key or ENVSYNC__CIPHER__KEY");
    }

    let mut key = [0u8; KEY_LEN];
    if material.len() == KEY_LEN * 2 && material.chars().all(|c| c.is_ascii_hexdigit()) {
        let bytes = hex::decode(material).context("invalid hex cipher key")?;
        key.copy_from_slice(&bytes);
    } else {
        let digest = Sha256::digest(format!("{}\n{}", KEY_DERIVATION_DOMAIN, material).as_bytes());
        key.copy_from_slice(&digest);
    }
    Ok(key)
}

impl ValueCipher for ChaChaValueCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut nonce).map_err(|e| anyhow!("failed to generate nonce: {}", e))?;

        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| anyhow!("encryption failed: {}", e))?;

        Ok(format!("{}:{}", hex::encode(nonce), hex::encode(ciphertext)))
    }

    fn decrypt(&self, encrypted: &str) -> Result<String> {
        let (nonce_hex, body_hex) = encrypted
            .split_once(':')
            .ok_or_else(|| anyhow!("invalid encrypted value format"))?;

        let nonce = hex::decode(nonce_hex).context("invalid nonce encoding")?;
        if nonce.len() != NONCE_LEN {
            bail!("invalid nonce length: {} bytes", nonce.len());
        }
        let body = hex::decode(body_hex).context("invalid ciphertext encoding")?;

        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(&nonce), body.as_ref())
            .map_err(|_| anyhow!("decryption failed (wrong key or tampered value)"))?;

        String::from_utf8(plaintext).context("decrypted value is not valid UTF-8")
    }
}
