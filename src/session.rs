use std::fmt;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tower_cookies::Cookies;

use crate::{
    config::{SessionConfig, SessionOptions, SessionOverrides},
    controller::{CookieReader, CookieWriter, set_cookie_string},
    error::{Error, Result},
    format,
    iron::{Iron, Sealer},
};

/// Browsers refuse `Set-Cookie` values longer than this.
pub const MAX_COOKIE_BYTES: usize = 4096;

/// A session whose whole state lives in one sealed cookie.
///
/// The data is a JSON object loaded when the session is created. Changes are only sent to the
/// client by [`save`](Self::save) or [`destroy`](Self::destroy).
pub struct Session<W, S = Iron> {
    data: Map<String, Value>,
    options: SessionOptions,
    config: SessionConfig,
    writer: W,
    sealer: S,
}

/// Load the session for `request` and write changes to `response`.
///
/// An absent, expired, tampered or otherwise unreadable cookie yields an empty session.
pub async fn get_session<R, W>(
    request: &R,
    response: W,
    options: SessionOptions,
) -> Result<Session<W>>
where
    R: CookieReader + ?Sized,
    W: CookieWriter,
{
    Session::load(request, response, options, Iron::new()).await
}

/// Like [`get_session`], for hosts that expose cookies through a `tower-cookies` jar.
pub async fn get_cookie_store_session(
    cookies: Cookies,
    options: SessionOptions,
) -> Result<Session<Cookies>> {
    let reader = cookies.clone();
    Session::load(&reader, cookies, options, Iron::new()).await
}

impl<W, S> Session<W, S>
where
    W: CookieWriter,
    S: Sealer,
{
    pub async fn load<R>(
        request: &R,
        writer: W,
        options: SessionOptions,
        sealer: S,
    ) -> Result<Self>
    where
        R: CookieReader + ?Sized,
    {
        let config = SessionConfig::resolve(&options, None)?;

        let data = match request.read_cookie(config.cookie_name()) {
            Some(token) => {
                format::decode(&sealer, &token, config.passwords(), config.ttl()).await?
            }
            None => Map::new(),
        };

        Ok(Self {
            data,
            options,
            config,
            writer,
            sealer,
        })
    }

    /// Seal the current data and add it to the response.
    pub async fn save(&mut self) -> Result<()> {
        persist(&self.sealer, &mut self.writer, &self.data, &self.config).await
    }

    /// [`save`](Self::save) with per-call changes to the ttl or cookie attributes.
    pub async fn save_with(&mut self, overrides: &SessionOverrides) -> Result<()> {
        let config = SessionConfig::resolve(&self.options, Some(overrides))?;
        persist(&self.sealer, &mut self.writer, &self.data, &config).await
    }

    /// Clear the data and tell the client to drop the cookie.
    pub fn destroy(&mut self) -> Result<()> {
        self.data.clear();
        expire(&mut self.writer, &self.config)
    }

    pub fn destroy_with(&mut self, overrides: &SessionOverrides) -> Result<()> {
        let config = SessionConfig::resolve(&self.options, Some(overrides))?;
        self.data.clear();
        expire(&mut self.writer, &config)
    }

    /// Replace the options used by later saves and destroys. Data is kept.
    pub fn update_config(&mut self, options: SessionOptions) -> Result<()> {
        self.config = SessionConfig::resolve(&options, None)?;
        self.options = options;
        Ok(())
    }
}

impl<W, S> Session<W, S> {
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.data
            .get(key)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::Data)
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns the previous value of `key`, if any.
    pub fn insert<K, T>(&mut self, key: K, value: T) -> Result<Option<Value>>
    where
        K: Into<String>,
        T: Serialize,
    {
        let value = serde_json::to_value(value)?;
        Ok(self.data.insert(key.into(), value))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data
    }

    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<W, S: fmt::Debug> fmt::Debug for Session<W, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookie_name", &self.config.cookie_name())
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .field("sealer", &self.sealer)
            .finish_non_exhaustive()
    }
}

async fn persist<W, S>(
    sealer: &S,
    writer: &mut W,
    data: &Map<String, Value>,
    config: &SessionConfig,
) -> Result<()>
where
    W: CookieWriter,
    S: Sealer,
{
    let token = format::encode(
        sealer,
        &Value::Object(data.clone()),
        config.passwords(),
        config.ttl(),
    )
    .await?;

    let cookie = config.build_cookie(token);
    let len = set_cookie_string(&cookie).len();
    if len > MAX_COOKIE_BYTES {
        return Err(Error::CookieTooLarge {
            len,
            max: MAX_COOKIE_BYTES,
        });
    }

    writer.write_cookie(cookie)?;
    tracing::debug!(cookie = config.cookie_name(), len, "saved session");
    Ok(())
}

fn expire<W: CookieWriter>(writer: &mut W, config: &SessionConfig) -> Result<()> {
    writer.write_cookie(config.build_removal_cookie())?;
    tracing::debug!(cookie = config.cookie_name(), "destroyed session");
    Ok(())
}

#[cfg(test)]
mod tests {
    use http::{HeaderMap, HeaderValue, header};
    use serde_json::json;

    use super::*;

    const PASSWORD: &str = "Gbm49ATjnqnkCCCdhV4uDBhbfnPqsCW0";

    fn request_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("test={token}")).expect("cookie header is valid"),
        );
        headers
    }

    #[tokio::test]
    async fn typed_access() {
        let mut session = get_session(
            &HeaderMap::new(),
            HeaderMap::new(),
            SessionOptions::new("test", PASSWORD),
        )
        .await
        .expect("session loads");

        assert!(session.is_empty());
        assert_eq!(session.insert("count", 3).expect("insert succeeds"), None);
        assert_eq!(session.get::<u32>("count").expect("get succeeds"), Some(3));
        assert!(session.get::<String>("count").is_err());
        assert_eq!(session.get::<u32>("missing").expect("get succeeds"), None);
        assert_eq!(session.keys().collect::<Vec<_>>(), ["count"]);

        assert_eq!(session.remove("count"), Some(json!(3)));
        assert!(!session.contains_key("count"));
    }

    #[tokio::test]
    async fn save_then_load() {
        let options = SessionOptions::new("test", PASSWORD);
        let mut session = get_session(&HeaderMap::new(), HeaderMap::new(), options.clone())
            .await
            .expect("session loads");
        session
            .insert("user", json!({"id": 1}))
            .expect("insert succeeds");
        session.save().await.expect("save succeeds");

        let response = session.into_writer();
        let set_cookie = response
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("response has set-cookie");
        let token = set_cookie
            .strip_prefix("test=")
            .and_then(|rest| rest.split(';').next())
            .expect("set-cookie carries the token");

        let session = get_session(&request_with(token), HeaderMap::new(), options)
            .await
            .expect("session loads");
        assert_eq!(session.get_value("user"), Some(&json!({"id": 1})));
    }

    #[tokio::test]
    async fn debug_hides_values() {
        let mut session = get_session(
            &HeaderMap::new(),
            HeaderMap::new(),
            SessionOptions::new("test", PASSWORD),
        )
        .await
        .expect("session loads");
        session
            .insert("token", "secret-value")
            .expect("insert succeeds");

        let rendered = format!("{session:?}");
        assert!(rendered.contains("token"));
        assert!(!rendered.contains("secret-value"));
        assert!(!rendered.contains(PASSWORD));
    }
}
