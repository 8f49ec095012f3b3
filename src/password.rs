//! Password normalization.
//!
//! Callers may hand over a single secret or a map of numbered secrets. Both are turned into a
//! [`PasswordsMap`] before any cryptographic work happens. With several entries the highest id
//! seals new tokens while every id can still open old ones, which is how secrets are rotated.

use std::{collections::BTreeMap, fmt};

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ConfigError;

/// Minimum length of every secret, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 32;

/// A secret used to derive sealing keys. Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Password(s) as supplied by the caller.
#[derive(Clone, PartialEq, Eq)]
pub enum Password {
    Single(Secret),
    Rotating(BTreeMap<u32, Secret>),
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(_) => f.write_str("Password::Single(***)"),
            Self::Rotating(map) => f
                .debug_tuple("Password::Rotating")
                .field(&map.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

impl From<&str> for Password {
    fn from(secret: &str) -> Self {
        Self::Single(Secret::new(secret))
    }
}

impl From<String> for Password {
    fn from(secret: String) -> Self {
        Self::Single(Secret::new(secret))
    }
}

impl<S: Into<String>> From<BTreeMap<u32, S>> for Password {
    fn from(map: BTreeMap<u32, S>) -> Self {
        Self::Rotating(
            map.into_iter()
                .map(|(id, secret)| (id, Secret::new(secret)))
                .collect(),
        )
    }
}

impl<S: Into<String>, const N: usize> From<[(u32, S); N]> for Password {
    fn from(entries: [(u32, S); N]) -> Self {
        Self::from(BTreeMap::from(entries))
    }
}

impl Password {
    /// Canonical `{id -> secret}` form. A single secret becomes id `1`.
    pub fn normalize(&self) -> Result<PasswordsMap, ConfigError> {
        let map = match self {
            Self::Single(secret) if secret.expose().is_empty() => {
                return Err(ConfigError::MissingPassword);
            }
            Self::Single(secret) => BTreeMap::from([(1, secret.clone())]),
            Self::Rotating(map) => map.clone(),
        };

        if map.is_empty() {
            return Err(ConfigError::MissingPassword);
        }

        for (&id, secret) in &map {
            if id == 0 {
                return Err(ConfigError::InvalidPasswordId { id });
            }
            if secret.expose().chars().count() < MIN_PASSWORD_LENGTH {
                return Err(ConfigError::PasswordTooShort {
                    id,
                    min: MIN_PASSWORD_LENGTH,
                });
            }
        }

        Ok(PasswordsMap(map))
    }
}

/// Validated, non-empty set of secrets keyed by positive id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordsMap(BTreeMap<u32, Secret>);

/// The secret that seals new tokens, along with the id written into them.
#[derive(Debug, Clone, Copy)]
pub struct SealingKey<'a> {
    pub id: u32,
    pub secret: &'a Secret,
}

impl PasswordsMap {
    /// Entry with the numerically highest id.
    pub fn newest(&self) -> SealingKey<'_> {
        let (&id, secret) = self
            .0
            .last_key_value()
            .unwrap_or_else(|| unreachable!("PasswordsMap is never empty"));
        SealingKey { id, secret }
    }

    pub fn get(&self, id: u32) -> Option<&Secret> {
        self.0.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Secret)> {
        self.0.iter().map(|(&id, secret)| (id, secret))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
