//! Reading the session cookie from a request and writing `Set-Cookie` to a response.
//!
//! Sessions only need two capabilities from the host: look up a cookie by name, and append a
//! cookie to whatever is sent back. Both are traits so any header container can take part.

use std::fmt::Write as _;

use http::{
    HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode,
    header::{self, AsHeaderName},
    request::Parts,
};
use tower_cookies::{Cookie, Cookies};

use crate::error::{Error, Result};

pub trait CookieReader {
    /// Value of the first cookie called `name`, percent-decoded.
    fn read_cookie(&self, name: &str) -> Option<String>;
}

pub trait CookieWriter {
    /// Add `cookie` to the outgoing response without dropping cookies set before it.
    fn write_cookie(&mut self, cookie: Cookie<'static>) -> Result<()>;
}

impl CookieReader for HeaderMap {
    fn read_cookie(&self, name: &str) -> Option<String> {
        self.get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse_encoded)
            .filter_map(|cookie| cookie.ok())
            .find(|cookie| cookie.name() == name)
            .map(|cookie| cookie.value().to_owned())
    }
}

impl<B> CookieReader for Request<B> {
    fn read_cookie(&self, name: &str) -> Option<String> {
        self.headers().read_cookie(name)
    }
}

impl CookieReader for Parts {
    fn read_cookie(&self, name: &str) -> Option<String> {
        self.headers.read_cookie(name)
    }
}

impl CookieReader for Cookies {
    fn read_cookie(&self, name: &str) -> Option<String> {
        self.get(name).map(|cookie| cookie.value().to_owned())
    }
}

impl CookieWriter for HeaderMap {
    fn write_cookie(&mut self, cookie: Cookie<'static>) -> Result<()> {
        let value = HeaderValue::from_str(&set_cookie_string(&cookie))?;
        self.append(header::SET_COOKIE, value);
        Ok(())
    }
}

impl<B> CookieWriter for Response<B> {
    fn write_cookie(&mut self, cookie: Cookie<'static>) -> Result<()> {
        self.headers_mut().write_cookie(cookie)
    }
}

/// The jar serializes the cookie itself when the response leaves the `CookieManager` layer.
impl CookieWriter for Cookies {
    fn write_cookie(&mut self, cookie: Cookie<'static>) -> Result<()> {
        self.add(cookie);
        Ok(())
    }
}

impl<W: CookieWriter + ?Sized> CookieWriter for &mut W {
    fn write_cookie(&mut self, cookie: Cookie<'static>) -> Result<()> {
        (**self).write_cookie(cookie)
    }
}

/// A response head that handlers mutate in place until it is flushed with
/// [`send_headers`](Self::send_headers). Headers cannot change afterwards.
#[derive(Debug, Default)]
pub struct OutgoingResponse {
    status: StatusCode,
    headers: HeaderMap,
    headers_sent: bool,
}

impl OutgoingResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn get_header<K: AsHeaderName>(&self, name: K) -> impl Iterator<Item = &HeaderValue> {
        self.headers.get_all(name).into_iter()
    }

    /// Replace every value of `name`.
    pub fn set_header<I>(&mut self, name: HeaderName, values: I)
    where
        I: IntoIterator<Item = HeaderValue>,
    {
        self.headers.remove(&name);
        for value in values {
            self.headers.append(name.clone(), value);
        }
    }

    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    pub fn send_headers(&mut self) {
        self.headers_sent = true;
    }

    pub fn into_response<B>(self, body: B) -> Response<B> {
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl CookieWriter for OutgoingResponse {
    fn write_cookie(&mut self, cookie: Cookie<'static>) -> Result<()> {
        if self.headers_sent {
            return Err(Error::HeadersSent);
        }

        let value = HeaderValue::from_str(&set_cookie_string(&cookie))?;
        let mut set_cookie: Vec<HeaderValue> =
            self.get_header(header::SET_COOKIE).cloned().collect();
        set_cookie.push(value);
        self.set_header(header::SET_COOKIE, set_cookie);
        Ok(())
    }
}

/// Render a `Set-Cookie` value with attributes in a fixed order: `Max-Age`, `Domain`, `Path`,
/// `HttpOnly`, `Secure`, `SameSite`.
pub fn set_cookie_string(cookie: &Cookie<'_>) -> String {
    let mut out = format!("{}={}", cookie.name(), cookie.value());

    if let Some(max_age) = cookie.max_age() {
        let _ = write!(out, "; Max-Age={}", max_age.whole_seconds());
    }
    if let Some(domain) = cookie.domain() {
        let _ = write!(out, "; Domain={domain}");
    }
    if let Some(path) = cookie.path() {
        let _ = write!(out, "; Path={path}");
    }
    if cookie.http_only() == Some(true) {
        out.push_str("; HttpOnly");
    }
    if cookie.secure() == Some(true) {
        out.push_str("; Secure");
    }
    if let Some(same_site) = cookie.same_site() {
        let _ = write!(out, "; SameSite={same_site}");
    }

    out
}
