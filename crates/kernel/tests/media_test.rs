#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Media library over the admin API.

mod common;

use axum::http::StatusCode;
use cadence_kernel::store::Collection;
use cadence_test_utils::{JPEG_HEADER, PNG_1X1};
use common::{TestApp, TestOptions, body_json, empty_request, multipart_request};

#[tokio::test]
async fn upload_then_serve_then_delete() {
    let app = TestApp::new().await;

    let response = app
        .admin(multipart_request(
            "/api/admin/media",
            &[("Cover Photo.png", "image/png", PNG_1X1)],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let item = body["uploaded"][0].clone();
    assert!(body["failed"].as_array().unwrap().is_empty());
    assert_eq!(item["mimeType"], "image/png");
    assert_eq!(item["originalName"], "Cover Photo.png");
    assert_eq!(item["size"], PNG_1X1.len());

    let url = item["url"].as_str().unwrap();
    assert!(url.starts_with("/files/media/"), "{url}");
    let response = app.request(empty_request("GET", url)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let id = item["id"].as_str().unwrap().to_string();
    app.wait_for(|s| s.media.len() == 1).await;
    let response = app.admin(empty_request("GET", "/api/admin/media")).await;
    assert_eq!(body_json(response).await[0]["id"], id.as_str());

    // Deleting needs an explicit confirmation.
    let response = app
        .admin(empty_request("DELETE", &format!("/api/admin/media/{id}")))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .admin(empty_request(
            "DELETE",
            &format!("/api/admin/media/{id}?confirm=true"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    app.wait_for(|s| s.media.is_empty()).await;
    let response = app.request(empty_request("GET", url)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn single_rejected_file_reports_its_own_status() {
    let app = TestApp::new().await;

    let response = app
        .admin(multipart_request(
            "/api/admin/media",
            &[("notes.txt", "text/plain", b"hello".as_slice())],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let response = app
        .admin(multipart_request(
            "/api/admin/media",
            &[("fake.png", "image/png", JPEG_HEADER)],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let response = app
        .admin(multipart_request(
            "/api/admin/media",
            &[("empty.png", "image/png", b"".as_slice())],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_keeps_going_past_failures() {
    let app = TestApp::new().await;

    let response = app
        .admin(multipart_request(
            "/api/admin/media",
            &[
                ("a.png", "image/png", PNG_1X1),
                ("b.txt", "text/plain", b"nope".as_slice()),
                ("c.png", "image/png", PNG_1X1),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["uploaded"].as_array().unwrap().len(), 2);
    assert_eq!(body["failed"][0]["name"], "b.txt");

    let response = app
        .admin(multipart_request(
            "/api/admin/media",
            &[
                ("x.txt", "text/plain", b"nope".as_slice()),
                ("y.txt", "text/plain", b"nope".as_slice()),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn failed_media_record_reports_stored_url() {
    let app = TestApp::new().await;
    app.store.fail_writes_to(Some(Collection::Media));

    let response = app
        .admin(multipart_request(
            "/api/admin/media",
            &[("orphan.png", "image/png", PNG_1X1)],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/files/media/"), "{url}");
    assert!(body["error"].is_string());
    let response = app.request(empty_request("GET", &url)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // A batch reports the same URL per failed file.
    let response = app
        .admin(multipart_request(
            "/api/admin/media",
            &[
                ("a.png", "image/png", PNG_1X1),
                ("b.png", "image/png", PNG_1X1),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    for failure in body["failed"].as_array().unwrap() {
        let url = failure["url"].as_str().unwrap();
        assert!(url.starts_with("/files/media/"), "{url}");
    }
}

#[tokio::test]
async fn empty_upload_is_a_validation_error() {
    let app = TestApp::new().await;

    let response = app.admin(multipart_request("/api/admin/media", &[])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["field"], "file");
}

#[tokio::test]
async fn storage_failure_does_not_resurrect_deleted_media() {
    let app = TestApp::with(TestOptions {
        undeletable_storage: true,
        ..TestOptions::default()
    })
    .await;

    let response = app
        .admin(multipart_request(
            "/api/admin/media",
            &[("keep.png", "image/png", PNG_1X1)],
        ))
        .await;
    let id = body_json(response).await["uploaded"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();
    app.wait_for(|s| s.media.len() == 1).await;

    let response = app
        .admin(empty_request(
            "DELETE",
            &format!("/api/admin/media/{id}?confirm=true"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    app.wait_for(|s| s.media.is_empty()).await;
    let response = app.admin(empty_request("GET", "/api/admin/media")).await;
    assert!(body_json(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_media_is_not_found() {
    let app = TestApp::new().await;
    let id = uuid::Uuid::now_v7();

    let response = app
        .admin(empty_request(
            "DELETE",
            &format!("/api/admin/media/{id}?confirm=true"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
