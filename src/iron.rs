//! Authenticated sealing of JSON values.
//!
//! The session engine only depends on the [`Sealer`] trait. [`Iron`] is the bundled
//! implementation and produces `Fe26.2` seals:
//!
//! ```text
//! Fe26.2*<password id>*<encryption salt>*<iv>*<ciphertext>*<expiration ms>*<hmac salt>*<hmac>
//! ```
//!
//! Keys are derived with PBKDF2-HMAC-SHA1 (one iteration, hex salt), the payload is encrypted
//! with AES-256-CBC and the first six components are authenticated with HMAC-SHA256. Seals
//! produced by other `Fe26.2` implementations with the same password open here, and the other
//! way around.

use std::fmt;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use serde_json::Value;
use sha1::Sha1;
use sha2::Sha256;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::password::{PasswordsMap, SealingKey, Secret};

pub const MAC_PREFIX: &str = "Fe26.2";

/// Allowed clock difference when checking a seal's expiration.
pub const TIMESTAMP_SKEW: Duration = Duration::seconds(60);

const SALT_BYTES: usize = 32;
const KEY_BYTES: usize = 32;
const IV_BYTES: usize = 16;
const KDF_ITERATIONS: u32 = 1;
const COMPONENTS: usize = 8;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("Expired seal")]
    Expired,

    #[error("Bad hmac value")]
    BadHmac,

    #[error("Cannot find password: {0}")]
    UnknownPassword(String),

    #[error("Incorrect number of sealed components")]
    ComponentCount,

    #[error("Wrong mac prefix")]
    WrongPrefix,

    #[error("Invalid expiration")]
    InvalidExpiration,

    #[error("Invalid sealed component encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Failed decrypting sealed object")]
    Decrypt,

    #[error("Failed parsing sealed object JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Failed serializing object to seal: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Invalid key material")]
    InvalidKey,
}

impl SealError {
    /// True when the failure comes from the token itself (stale, forged, truncated or sealed
    /// under a retired password). Such tokens are treated as "no session".
    pub fn is_invalid_token(&self) -> bool {
        !matches!(self, Self::Serialize(_) | Self::InvalidKey)
    }
}

/// Authenticated-encryption primitive consumed by the session engine.
#[async_trait]
pub trait Sealer: fmt::Debug + Send + Sync {
    /// Seal `data` with `key`. A zero `ttl` produces a seal that never expires.
    async fn seal(
        &self,
        data: &Value,
        key: SealingKey<'_>,
        ttl: Duration,
    ) -> Result<String, SealError>;

    /// Open a seal with whichever entry of `passwords` it was sealed under.
    async fn unseal(
        &self,
        sealed: &str,
        passwords: &PasswordsMap,
        ttl: Duration,
    ) -> Result<Value, SealError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Iron {
    localtime_offset: Duration,
}

impl Iron {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift this sealer's clock, e.g. to compensate for a known server clock error.
    #[must_use]
    pub fn with_localtime_offset(mut self, offset: Duration) -> Self {
        self.localtime_offset = offset;
        self
    }

    fn now_ms(&self) -> i128 {
        (OffsetDateTime::now_utc() + self.localtime_offset).unix_timestamp_nanos() / 1_000_000
    }

    pub fn seal_json(
        &self,
        data: &Value,
        key: SealingKey<'_>,
        ttl: Duration,
    ) -> Result<String, SealError> {
        let object = serde_json::to_vec(data).map_err(SealError::Serialize)?;

        let encryption_salt = random_salt();
        let encryption_key = derive_key(key.secret, &encryption_salt);
        let mut iv = [0u8; IV_BYTES];
        OsRng.fill_bytes(&mut iv);

        let encrypted = Aes256CbcEnc::new_from_slices(&encryption_key, &iv)
            .map_err(|_| SealError::InvalidKey)?
            .encrypt_padded_vec_mut::<Pkcs7>(&object);

        let expiration = if ttl.is_zero() {
            String::new()
        } else {
            (self.now_ms() + ttl.whole_milliseconds()).to_string()
        };

        let mac_base = format!(
            "{MAC_PREFIX}*{id}*{encryption_salt}*{iv}*{encrypted}*{expiration}",
            id = key.id,
            iv = URL_SAFE_NO_PAD.encode(iv),
            encrypted = URL_SAFE_NO_PAD.encode(encrypted),
        );

        let hmac_salt = random_salt();
        let mut mac = hmac_for(key.secret, &hmac_salt).ok_or(SealError::InvalidKey)?;
        mac.update(mac_base.as_bytes());
        let digest = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{mac_base}*{hmac_salt}*{digest}"))
    }

    pub fn unseal_json(&self, sealed: &str, passwords: &PasswordsMap) -> Result<Value, SealError> {
        let parts: Vec<&str> = sealed.split('*').collect();
        let &[
            prefix,
            password_id,
            encryption_salt,
            iv,
            encrypted,
            expiration,
            hmac_salt,
            hmac,
        ] = parts.as_slice()
        else {
            return Err(SealError::ComponentCount);
        };

        if prefix != MAC_PREFIX {
            return Err(SealError::WrongPrefix);
        }

        if !expiration.is_empty() {
            if !expiration.bytes().all(|b| b.is_ascii_digit()) {
                return Err(SealError::InvalidExpiration);
            }
            let expiration: i128 = expiration
                .parse()
                .map_err(|_| SealError::InvalidExpiration)?;
            if expiration <= self.now_ms() - TIMESTAMP_SKEW.whole_milliseconds() {
                return Err(SealError::Expired);
            }
        }

        let candidates: Vec<&Secret> = if password_id.is_empty() {
            passwords.iter().map(|(_, secret)| secret).collect()
        } else {
            let secret = password_id
                .parse::<u32>()
                .ok()
                .and_then(|id| passwords.get(id))
                .ok_or_else(|| SealError::UnknownPassword(password_id.to_string()))?;
            vec![secret]
        };

        let mac_base = parts[..COMPONENTS - 2].join("*");
        let provided = URL_SAFE_NO_PAD
            .decode(hmac)
            .map_err(|_| SealError::BadHmac)?;
        let secret = candidates
            .into_iter()
            .find(|secret| {
                hmac_for(secret, hmac_salt).is_some_and(|mut mac| {
                    mac.update(mac_base.as_bytes());
                    mac.verify_slice(&provided).is_ok()
                })
            })
            .ok_or(SealError::BadHmac)?;

        let encryption_key = derive_key(secret, encryption_salt);
        let iv = URL_SAFE_NO_PAD.decode(iv)?;
        let encrypted = URL_SAFE_NO_PAD.decode(encrypted)?;
        let decrypted = Aes256CbcDec::new_from_slices(&encryption_key, &iv)
            .map_err(|_| SealError::Decrypt)?
            .decrypt_padded_vec_mut::<Pkcs7>(&encrypted)
            .map_err(|_| SealError::Decrypt)?;

        serde_json::from_slice(&decrypted).map_err(SealError::Parse)
    }
}

#[async_trait]
impl Sealer for Iron {
    async fn seal(
        &self,
        data: &Value,
        key: SealingKey<'_>,
        ttl: Duration,
    ) -> Result<String, SealError> {
        self.seal_json(data, key, ttl)
    }

    // The expiration travels inside the seal, so `ttl` is not consulted here.
    async fn unseal(
        &self,
        sealed: &str,
        passwords: &PasswordsMap,
        _ttl: Duration,
    ) -> Result<Value, SealError> {
        self.unseal_json(sealed, passwords)
    }
}

fn random_salt() -> String {
    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    hex::encode(salt)
}

fn derive_key(secret: &Secret, salt: &str) -> [u8; KEY_BYTES] {
    let mut key = [0u8; KEY_BYTES];
    pbkdf2::pbkdf2_hmac::<Sha1>(
        secret.expose().as_bytes(),
        salt.as_bytes(),
        KDF_ITERATIONS,
        &mut key,
    );
    key
}

fn hmac_for(secret: &Secret, salt: &str) -> Option<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(&derive_key(secret, salt)).ok()
}
