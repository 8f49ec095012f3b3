// End-to-end tests using an Axum `Router` with `tower_cookies::CookieManagerLayer`, where the
// session reads and writes through the request's `Cookies` jar.
mod common;

use axum::{Router, body::Body, routing::get};
use common::{body_string, cookie_header_value, last_set_cookie, options};
use http::{Request, header};
use sealed_cookie_session::{Cookies, get_cookie_store_session};
use time::Duration;
use tower::ServiceExt as _;
use tower_cookies::CookieManagerLayer;

fn routes() -> Router {
    Router::new()
        .route(
            "/login",
            get(|cookies: Cookies| async move {
                let mut session = get_cookie_store_session(cookies, options())
                    .await
                    .expect("session loads");
                session.insert("user", "alice").expect("insert succeeds");
                session.save().await.expect("save succeeds");
            }),
        )
        .route(
            "/whoami",
            get(|cookies: Cookies| async move {
                let session = get_cookie_store_session(cookies, options())
                    .await
                    .expect("session loads");
                session
                    .get::<String>("user")
                    .expect("get succeeds")
                    .unwrap_or_else(|| "none".to_string())
            }),
        )
        .route(
            "/logout",
            get(|cookies: Cookies| async move {
                let mut session = get_cookie_store_session(cookies, options())
                    .await
                    .expect("session loads");
                session.destroy().expect("destroy succeeds");
            }),
        )
        .layer(CookieManagerLayer::new())
}

#[tokio::test]
async fn login_then_whoami() {
    let app = routes();

    let req = Request::builder()
        .uri("/login")
        .body(Body::empty())
        .expect("request builds successfully");
    let res = app
        .clone()
        .oneshot(req)
        .await
        .expect("service call succeeds");
    let session_cookie = last_set_cookie(res.headers());

    assert_eq!(session_cookie.name(), "test");
    assert_eq!(session_cookie.http_only(), Some(true));
    assert_eq!(
        session_cookie.max_age(),
        Some(Duration::days(14) - Duration::seconds(60))
    );

    let req = Request::builder()
        .uri("/whoami")
        .header(header::COOKIE, cookie_header_value(&session_cookie))
        .body(Body::empty())
        .expect("request builds successfully");
    let res = app.oneshot(req).await.expect("service call succeeds");

    assert_eq!(body_string(res.into_body()).await, "alice");
}

#[tokio::test]
async fn whoami_without_cookie() {
    let req = Request::builder()
        .uri("/whoami")
        .body(Body::empty())
        .expect("request builds successfully");
    let res = routes()
        .oneshot(req)
        .await
        .expect("service call succeeds");

    assert!(res.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_string(res.into_body()).await, "none");
}

#[tokio::test]
async fn bogus_cookie_is_ignored() {
    let req = Request::builder()
        .uri("/whoami")
        .header(header::COOKIE, "test=bogus~2")
        .body(Body::empty())
        .expect("request builds successfully");
    let res = routes()
        .oneshot(req)
        .await
        .expect("service call succeeds");

    assert_eq!(body_string(res.into_body()).await, "none");
}

#[tokio::test]
async fn logout_removes_cookie() {
    let app = routes();

    let req = Request::builder()
        .uri("/login")
        .body(Body::empty())
        .expect("request builds successfully");
    let res = app
        .clone()
        .oneshot(req)
        .await
        .expect("service call succeeds");
    let session_cookie = last_set_cookie(res.headers());

    let req = Request::builder()
        .uri("/logout")
        .header(header::COOKIE, cookie_header_value(&session_cookie))
        .body(Body::empty())
        .expect("request builds successfully");
    let res = app.oneshot(req).await.expect("service call succeeds");
    let removal = last_set_cookie(res.headers());

    assert_eq!(removal.name(), "test");
    assert_eq!(removal.value(), "");
    assert_eq!(removal.max_age(), Some(Duration::ZERO));
}
