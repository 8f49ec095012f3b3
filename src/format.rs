//! Helpers for encoding/decoding the session cookie token.
//!
//! A token is a seal followed by `~` and the major version of the payload layout inside it. Seals
//! without a version tag come from the pre-versioning layout, which nested the session under a
//! `persistent` key next to a `flash` key. Only `persistent` survives decoding.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use time::Duration;

use crate::{
    config::{SealOptions, checked_ttl},
    error::Result,
    iron::{Iron, SealError, Sealer},
    password::PasswordsMap,
};

pub const CURRENT_MAJOR_VERSION: u32 = 2;
pub const VERSION_DELIMITER: char = '~';

const LEGACY_PERSISTENT_KEY: &str = "persistent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenVersion {
    /// No version tag: `{ persistent, flash }` payload.
    Legacy,
    /// `~2`: the payload is the session object itself.
    Flat,
    /// `~3`: post-quantum envelope, not supported by this crate.
    PostQuantum,
    Unknown(u32),
}

impl TokenVersion {
    fn from_tag(tag: u32) -> Self {
        match tag {
            2 => Self::Flat,
            3 => Self::PostQuantum,
            other => Self::Unknown(other),
        }
    }
}

/// Split a token into its seal and version.
pub fn parse_token(token: &str) -> (&str, TokenVersion) {
    token
        .rsplit_once(VERSION_DELIMITER)
        .filter(|(_, tag)| !tag.is_empty() && tag.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|(sealed, tag)| {
            tag.parse::<u32>()
                .ok()
                .map(|tag| (sealed, TokenVersion::from_tag(tag)))
        })
        .unwrap_or((token, TokenVersion::Legacy))
}

/// Seal `data` with the newest password and tag it with the current major version.
pub async fn encode<S: Sealer + ?Sized>(
    sealer: &S,
    data: &Value,
    passwords: &PasswordsMap,
    ttl: Duration,
) -> Result<String, SealError> {
    let sealed = sealer.seal(data, passwords.newest(), ttl).await?;
    Ok(format!("{sealed}{VERSION_DELIMITER}{CURRENT_MAJOR_VERSION}"))
}

/// Decode a token into the session object.
///
/// Tokens that are expired, forged, malformed or sealed under a password that is no longer
/// configured decode to an empty object. Only misuse errors from the sealer are returned.
pub async fn decode<S: Sealer + ?Sized>(
    sealer: &S,
    token: &str,
    passwords: &PasswordsMap,
    ttl: Duration,
) -> Result<Map<String, Value>, SealError> {
    let (sealed, version) = parse_token(token);

    if matches!(
        version,
        TokenVersion::PostQuantum | TokenVersion::Unknown(_)
    ) {
        tracing::warn!(?version, "unsupported session token version, starting a new session");
        return Ok(Map::new());
    }

    let payload = match sealer.unseal(sealed, passwords, ttl).await {
        Ok(payload) => payload,
        Err(err) if err.is_invalid_token() => {
            tracing::warn!(err = %err, "session token rejected, starting a new session");
            return Ok(Map::new());
        }
        Err(err) => return Err(err),
    };

    tracing::debug!(?version, "decoded session token");

    let data = match (version, payload) {
        (TokenVersion::Legacy, Value::Object(mut legacy)) => legacy
            .remove(LEGACY_PERSISTENT_KEY)
            .unwrap_or_default(),
        (_, payload) => payload,
    };

    Ok(match data {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

/// Seal any serializable value into a versioned token, outside of a session cookie.
pub async fn seal_data<T>(data: &T, options: &SealOptions) -> Result<String>
where
    T: Serialize + ?Sized,
{
    seal_data_with(&Iron::new(), data, options).await
}

pub async fn seal_data_with<S, T>(sealer: &S, data: &T, options: &SealOptions) -> Result<String>
where
    S: Sealer + ?Sized,
    T: Serialize + ?Sized,
{
    let passwords = options.password.normalize()?;
    let ttl = checked_ttl(options.ttl)?;
    let value = serde_json::to_value(data)?;
    Ok(encode(sealer, &value, &passwords, ttl).await?)
}

/// Open a token produced by [`seal_data`].
///
/// Invalid tokens open as an empty object, so `T` should accept one (e.g. a struct whose fields
/// are all optional, or a map).
pub async fn unseal_data<T: DeserializeOwned>(token: &str, options: &SealOptions) -> Result<T> {
    unseal_data_with(&Iron::new(), token, options).await
}

pub async fn unseal_data_with<S, T>(sealer: &S, token: &str, options: &SealOptions) -> Result<T>
where
    S: Sealer + ?Sized,
    T: DeserializeOwned,
{
    let passwords = options.password.normalize()?;
    let ttl = checked_ttl(options.ttl)?;
    let data = decode(sealer, token, &passwords, ttl).await?;
    Ok(serde_json::from_value(Value::Object(data))?)
}
