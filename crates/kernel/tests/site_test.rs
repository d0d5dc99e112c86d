#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Public pages, blog rendering and health.

mod common;

use axum::Router;
use axum::http::{StatusCode, header};
use axum::routing::get;
use cadence_kernel::routes::catch_panics;
use cadence_test_utils::{assert, test_post};
use common::{TestApp, TestOptions, body_json, body_string, empty_request, json_request};
use tower::ServiceExt;

#[tokio::test]
async fn static_pages_render() {
    let app = TestApp::new().await;

    for (path, needle) in [
        ("/", "Cadence"),
        ("/privacy", "Privacy"),
        ("/terms", "Terms"),
        ("/feedback", "/api/feedback"),
        ("/delete-account", "Delete"),
    ] {
        let response = app.request(empty_request("GET", path)).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
        let html = body_string(response).await;
        assert::contains(&html, needle);
        assert::contains(
            &html,
            &format!(r#"<link rel="canonical" href="https://cadence.test{path}""#),
        );
    }
}

#[tokio::test]
async fn blog_lists_only_published_posts() {
    let app = TestApp::new().await;
    for post in [
        test_post("Out Loud").with_slug("out-loud").published(),
        test_post("Not Yet").with_slug("not-yet").draft(),
    ] {
        app.admin(json_request("POST", "/api/admin/posts", &post.to_json()))
            .await;
    }
    app.wait_for(|s| s.posts.len() == 2).await;

    let html = body_string(app.request(empty_request("GET", "/blog")).await).await;
    assert::contains(&html, "/blog/out-loud");
    assert::not_contains(&html, "/blog/not-yet");

    let response = app.request(empty_request("GET", "/blog/not-yet")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_page_links_outline_to_headings() {
    let app = TestApp::new().await;
    let post = test_post("Streaks")
        .with_slug("streaks")
        .with_content(
            r#"<h2>Why streaks work</h2><p>Text <span data-type="toc-anchor" data-id="toc-tip" data-label="A quick tip"></span></p><h2>FAQ</h2><script>alert(1)</script>"#,
        )
        .hiding("faq")
        .published();
    app.admin(json_request("POST", "/api/admin/posts", &post.to_json()))
        .await;
    app.wait_for(|s| s.posts.len() == 1).await;

    // Slug lookup ignores case.
    let response = app.request(empty_request("GET", "/blog/STREAKS")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;

    assert::contains(&html, r#"<h2 id="why-streaks-work-0">"#);
    assert::contains(&html, r##"href="#why-streaks-work-0""##);
    assert::contains(&html, r##"href="#toc-tip""##);
    assert::contains(&html, "A quick tip");
    assert::not_contains(&html, r##"href="#faq-1""##);
    assert::not_contains(&html, "alert(1)");
}

#[tokio::test]
async fn unknown_paths_get_404() {
    let app = TestApp::new().await;

    let response = app.request(empty_request("GET", "/nowhere")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/html"), "{content_type}");

    let response = app.request(empty_request("GET", "/api/nowhere")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn health_reports_store_and_counts() {
    let app = TestApp::new().await;

    let response = app.request(empty_request("GET", "/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], true);
    assert_eq!(body["posts"], 0);
}

async fn explode() -> &'static str {
    panic!("disk on fire")
}

/// A router with one panicking route, wrapped the way the app wraps its own.
fn exploding_router(app: &TestApp) -> Router {
    catch_panics(Router::new().route("/explode", get(explode)), &app.state)
        .with_state(app.state.clone())
}

#[tokio::test]
async fn handler_panic_renders_themed_error_page() {
    let app = TestApp::new().await;
    let response = exploding_router(&app)
        .oneshot(empty_request("GET", "/explode"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    let html = body_string(response).await;
    assert::contains(&html, "Something went wrong");
    assert::contains(&html, "disk on fire");

    // The app still serves requests afterwards.
    let response = app.request(empty_request("GET", "/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn panic_detail_is_hidden_in_production() {
    let app = TestApp::with(TestOptions {
        production: true,
        ..TestOptions::default()
    })
    .await;
    let response = exploding_router(&app)
        .oneshot(empty_request("GET", "/explode"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let html = body_string(response).await;
    assert::contains(&html, "Something went wrong");
    assert::not_contains(&html, "disk on fire");
    assert::not_contains(&html, "error-detail");
}
