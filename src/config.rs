use std::borrow::Cow;

use time::Duration;
use tower_cookies::Cookie;

use crate::{
    SameSite,
    error::ConfigError,
    iron::TIMESTAMP_SKEW,
    password::{Password, PasswordsMap},
};

pub const DEFAULT_TTL: Duration = Duration::days(14);

/// Largest `Max-Age` browsers accept, used for sessions that never expire.
pub const MAX_COOKIE_MAX_AGE: i64 = 2_147_483_647;

/// An explicit `Max-Age` choice that overrides the one derived from the ttl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxAge {
    /// No `Max-Age` attribute: the browser drops the cookie when it closes. The seal itself
    /// never expires.
    Session,
    Seconds(i64),
}

/// Cookie attributes. Unset fields fall back to the next layer (defaults, then options, then
/// per-call overrides).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    http_only: Option<bool>,
    secure: Option<bool>,
    same_site: Option<SameSite>,
    path: Option<Cow<'static, str>>,
    domain: Option<Cow<'static, str>>,
    max_age: Option<MaxAge>,
}

impl CookieOptions {
    fn defaults() -> Self {
        Self {
            http_only: Some(true),
            secure: Some(true),
            same_site: Some(SameSite::Lax),
            path: Some("/".into()),
            domain: None,
            max_age: None,
        }
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = Some(http_only);
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: MaxAge) -> Self {
        self.max_age = Some(max_age);
        self
    }

    fn layered(&self, over: &Self) -> Self {
        Self {
            http_only: over.http_only.or(self.http_only),
            secure: over.secure.or(self.secure),
            same_site: over.same_site.or(self.same_site),
            path: over.path.clone().or_else(|| self.path.clone()),
            domain: over.domain.clone().or_else(|| self.domain.clone()),
            max_age: over.max_age.or(self.max_age),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub(crate) cookie_name: Cow<'static, str>,
    pub(crate) password: Password,
    pub(crate) ttl: Duration,
    pub(crate) cookie_options: CookieOptions,
}

impl SessionOptions {
    pub fn new<N, P>(cookie_name: N, password: P) -> Self
    where
        N: Into<Cow<'static, str>>,
        P: Into<Password>,
    {
        Self {
            cookie_name: cookie_name.into(),
            password: password.into(),
            ttl: DEFAULT_TTL,
            cookie_options: CookieOptions::default(),
        }
    }

    #[must_use]
    pub fn with_cookie_name<N: Into<Cow<'static, str>>>(mut self, cookie_name: N) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    #[must_use]
    pub fn with_password<P: Into<Password>>(mut self, password: P) -> Self {
        self.password = password.into();
        self
    }

    /// Validity of the sealed session. Zero means the session never expires.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_cookie_options(mut self, cookie_options: CookieOptions) -> Self {
        self.cookie_options = cookie_options;
        self
    }
}

/// One-off changes applied on top of [`SessionOptions`] for a single save or destroy.
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    ttl: Option<Duration>,
    cookie_options: CookieOptions,
}

impl SessionOverrides {
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_cookie_options(mut self, cookie_options: CookieOptions) -> Self {
        self.cookie_options = cookie_options;
        self
    }
}

/// Options for sealing data outside of a session cookie.
#[derive(Debug, Clone)]
pub struct SealOptions {
    pub(crate) password: Password,
    pub(crate) ttl: Duration,
}

impl SealOptions {
    pub fn new<P: Into<Password>>(password: P) -> Self {
        Self {
            password: password.into(),
            ttl: DEFAULT_TTL,
        }
    }

    /// Zero seals data that never expires.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// A negative ttl would seal data that is already expired, or never expires at all.
pub(crate) fn checked_ttl(ttl: Duration) -> Result<Duration, ConfigError> {
    if ttl.is_negative() {
        return Err(ConfigError::InvalidTtl { ttl });
    }
    Ok(ttl)
}

/// Fully resolved configuration a session saves and destroys with.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    cookie_name: Cow<'static, str>,
    passwords: PasswordsMap,
    ttl: Duration,
    http_only: bool,
    secure: bool,
    same_site: SameSite,
    path: Option<Cow<'static, str>>,
    domain: Option<Cow<'static, str>>,
    max_age: Option<i64>,
}

impl SessionConfig {
    pub fn resolve(
        options: &SessionOptions,
        overrides: Option<&SessionOverrides>,
    ) -> Result<Self, ConfigError> {
        if options.cookie_name.is_empty() {
            return Err(ConfigError::MissingCookieName);
        }
        let passwords = options.password.normalize()?;

        let mut ttl = options.ttl;
        let mut cookie = CookieOptions::defaults().layered(&options.cookie_options);
        if let Some(overrides) = overrides {
            ttl = overrides.ttl.unwrap_or(ttl);
            cookie = cookie.layered(&overrides.cookie_options);
        }

        let ttl = checked_ttl(ttl)?;
        let never_expires = Duration::seconds(MAX_COOKIE_MAX_AGE);
        let (ttl, max_age) = match cookie.max_age {
            Some(MaxAge::Session) => (Duration::ZERO, None),
            Some(MaxAge::Seconds(seconds)) if ttl.is_zero() => (never_expires, Some(seconds)),
            Some(MaxAge::Seconds(seconds)) => (ttl, Some(seconds)),
            None if ttl.is_zero() => (never_expires, Some(MAX_COOKIE_MAX_AGE)),
            // The cookie must go away before the seal inside it expires.
            None => {
                let max_age = ttl.saturating_sub(TIMESTAMP_SKEW).whole_seconds();
                (ttl, Some(max_age.min(MAX_COOKIE_MAX_AGE)))
            }
        };

        Ok(Self {
            cookie_name: options.cookie_name.clone(),
            passwords,
            ttl,
            http_only: cookie.http_only.unwrap_or(true),
            secure: cookie.secure.unwrap_or(true),
            same_site: cookie.same_site.unwrap_or(SameSite::Lax),
            path: cookie.path,
            domain: cookie.domain,
            max_age,
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn passwords(&self) -> &PasswordsMap {
        &self.passwords
    }

    /// Ttl the seal is created with. Zero for browser-session cookies.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// `Max-Age` in seconds, or `None` for a browser-session cookie.
    pub fn max_age(&self) -> Option<i64> {
        self.max_age
    }

    pub(crate) fn build_cookie(&self, value: String) -> Cookie<'static> {
        self.cookie(value, self.max_age)
    }

    pub(crate) fn build_removal_cookie(&self) -> Cookie<'static> {
        self.cookie(String::new(), Some(0))
    }

    fn cookie(&self, value: String, max_age: Option<i64>) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((self.cookie_name.clone(), value))
            .http_only(self.http_only)
            .same_site(self.same_site)
            .secure(self.secure);

        if let Some(path) = self.path.clone() {
            cookie_builder = cookie_builder.path(path);
        }

        if let Some(domain) = self.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        if let Some(max_age) = max_age {
            cookie_builder = cookie_builder.max_age(Duration::seconds(max_age));
        }

        cookie_builder.build()
    }
}
