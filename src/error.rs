use thiserror::Error;

use crate::iron::SealError;

/// Bad usage of the session API. These are caller bugs and are never swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("bad usage: a non-empty cookie name is required")]
    MissingCookieName,

    #[error("bad usage: at least one password is required")]
    MissingPassword,

    #[error("bad usage: password {id} must be at least {min} characters long")]
    PasswordTooShort { id: u32, min: usize },

    #[error("bad usage: password ids must be positive integers, got {id}")]
    InvalidPasswordId { id: u32 },

    #[error("bad usage: ttl must not be negative, got {ttl}")]
    InvalidTtl { ttl: time::Duration },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cookie length is too big ({len} > {max} bytes), browsers will refuse it")]
    CookieTooLarge { len: usize, max: usize },

    #[error("cannot set session cookie: save() was called after headers were sent")]
    HeadersSent,

    #[error(transparent)]
    Seal(#[from] SealError),

    #[error("session data does not match the requested type: {0}")]
    Data(#[from] serde_json::Error),

    #[error("session cookie is not a valid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
