#![allow(dead_code)]

// Shared helpers for integration tests.
//
// Cookies are parsed back with `tower_cookies::Cookie` so the tests see `Set-Cookie` values the
// way a browser would, and send them back the way a browser would.
use axum::body::Body;
use http::{HeaderMap, Request, header};
use http_body_util::BodyExt as _;
use sealed_cookie_session::{OutgoingResponse, SessionOptions};
use tower_cookies::Cookie;

pub const PASSWORD: &str = "Gbm49ATjnqnkCCCdhV4uDBhbfnPqsCW0";
pub const OTHER_PASSWORD: &str = "xXg1fsSz6Jq3MhtPEAsVm8Qk3zQbJd9S";

pub fn options() -> SessionOptions {
    SessionOptions::new("test", PASSWORD)
}

pub async fn body_string(body: Body) -> String {
    let bytes = body
        .collect()
        .await
        .expect("body collects successfully")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    // Every `Set-Cookie` line, in order.
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| {
            value
                .to_str()
                .expect("set-cookie header is valid utf-8")
                .to_string()
        })
        .collect()
}

pub fn last_set_cookie(headers: &HeaderMap) -> Cookie<'static> {
    let set_cookie = set_cookies(headers)
        .pop()
        .expect("response includes set-cookie header");
    Cookie::parse_encoded(set_cookie)
        .expect("set-cookie parses successfully")
        .into_owned()
}

pub fn cookie_header_value(cookie: &Cookie<'_>) -> String {
    // Encode a cookie for use in a `Cookie` request header.
    cookie.encoded().to_string()
}

pub fn request_with(cookie: &Cookie<'_>) -> Request<()> {
    Request::builder()
        .header(header::COOKIE, cookie_header_value(cookie))
        .body(())
        .expect("request builds successfully")
}

pub fn request_with_token(name: &str, token: &str) -> Request<()> {
    Request::builder()
        .header(header::COOKIE, format!("{name}={token}"))
        .body(())
        .expect("request builds successfully")
}

pub fn empty_request() -> Request<()> {
    Request::builder()
        .body(())
        .expect("request builds successfully")
}

pub fn session_cookie(response: &OutgoingResponse) -> Cookie<'static> {
    last_set_cookie(response.headers())
}
