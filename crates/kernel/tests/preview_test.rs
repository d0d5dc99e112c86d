#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Social preview endpoint.

mod common;

use axum::http::{StatusCode, header};
use cadence_kernel::services::social::PREVIEW_CACHE_CONTROL;
use cadence_test_utils::{assert, test_post};
use common::{TestApp, body_string, empty_request, json_request};

#[tokio::test]
async fn published_post_gets_its_own_tags() {
    let app = TestApp::new().await;
    let post = test_post("Tiny Habits")
        .with_slug("tiny-habits")
        .with_image("/files/media/cover.png")
        .published();
    let response = app
        .admin(json_request("POST", "/api/admin/posts", &post.to_json()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(empty_request("GET", "/api/blog-preview?slug=tiny-habits"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], PREVIEW_CACHE_CONTROL);

    let html = body_string(response).await;
    assert::contains(&html, r#"<meta property="og:title" content="Tiny Habits""#);
    assert::contains(&html, r#"<meta property="og:type" content="article""#);
    assert::contains(&html, "https://cadence.test/files/media/cover.png");
    assert::contains(&html, "https://cadence.test/blog/tiny-habits");
}

#[tokio::test]
async fn drafts_and_unknown_slugs_get_site_defaults() {
    let app = TestApp::new().await;
    let draft = test_post("Secret Plans").with_slug("secret-plans").draft();
    app.admin(json_request("POST", "/api/admin/posts", &draft.to_json()))
        .await;

    for slug in ["secret-plans", "does-not-exist"] {
        let response = app
            .request(empty_request("GET", &format!("/api/blog-preview?slug={slug}")))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{slug}");
        assert_eq!(response.headers()[header::CACHE_CONTROL], PREVIEW_CACHE_CONTROL);

        let html = body_string(response).await;
        assert::not_contains(&html, "Secret Plans");
        assert::contains(&html, r#"<meta property="og:type" content="website""#);
    }
}

#[tokio::test]
async fn missing_slug_is_a_bad_request() {
    let app = TestApp::new().await;
    for uri in ["/api/blog-preview", "/api/blog-preview?slug=%20"] {
        let response = app.request(empty_request("GET", uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn only_get_and_head_are_allowed() {
    let app = TestApp::new().await;

    let response = app
        .request(empty_request("POST", "/api/blog-preview?slug=x"))
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "GET, HEAD");

    let response = app
        .request(empty_request("HEAD", "/api/blog-preview?slug=x"))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
