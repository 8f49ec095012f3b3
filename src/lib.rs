//! Stateless sessions stored in a single sealed cookie.
//!
//! The whole session is a JSON object that is encrypted and authenticated with a server-side
//! password (an `Fe26.2` "iron" seal), tagged with a format version and sent to the client as a
//! cookie. Nothing is kept on the server between requests.
//!
//! Use [`get_session`] with any [`CookieReader`]/[`CookieWriter`] pair (an `http` request and
//! response, a [`HeaderMap`](http::HeaderMap), an [`OutgoingResponse`]) or
//! [`get_cookie_store_session`] with a `tower-cookies` jar. [`seal_data`] and [`unseal_data`]
//! expose the same sealing for values that never touch a cookie, such as magic links.
//!
//! # Security
//! Passwords must be at least 32 characters. Supplying several numbered passwords rotates them:
//! the highest id seals new cookies and every id still opens old ones.
//!
//! A cookie that is expired, forged, truncated or sealed with a removed password is never an
//! error. The request simply starts with an empty session.

mod config;
mod controller;
mod error;
mod format;
mod iron;
mod password;
mod session;

pub use tower_cookies::{Cookies, cookie::SameSite};

pub use crate::config::{
    CookieOptions, DEFAULT_TTL, MAX_COOKIE_MAX_AGE, MaxAge, SealOptions, SessionConfig,
    SessionOptions, SessionOverrides,
};
pub use crate::controller::{CookieReader, CookieWriter, OutgoingResponse, set_cookie_string};
pub use crate::error::{ConfigError, Error, Result};
pub use crate::format::{
    CURRENT_MAJOR_VERSION, TokenVersion, parse_token, seal_data, seal_data_with, unseal_data,
    unseal_data_with,
};
pub use crate::iron::{Iron, MAC_PREFIX, SealError, Sealer, TIMESTAMP_SKEW};
pub use crate::password::{MIN_PASSWORD_LENGTH, Password, PasswordsMap, SealingKey, Secret};
pub use crate::session::{MAX_COOKIE_BYTES, Session, get_cookie_store_session, get_session};
