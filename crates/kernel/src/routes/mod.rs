//! HTTP route handlers.

pub mod admin_feedback;
pub mod admin_media;
pub mod admin_posts;
pub mod blog;
pub mod editor;
pub mod feedback;
pub mod health;
pub mod helpers;
pub mod pages;
pub mod preview;

use std::any::Any;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderValue, Method, Response, StatusCode, Uri, header};
use axum::response::{Html, IntoResponse};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::middleware::require_admin;
use crate::state::AppState;

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let config = state.config();
    let cors = build_cors_layer(config);

    let admin = Router::new()
        .merge(admin_posts::router())
        .merge(admin_media::router())
        .merge(admin_feedback::router())
        .merge(editor::router())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    let mut app = Router::new()
        .merge(pages::router())
        .merge(blog::router())
        .merge(feedback::router())
        .merge(preview::router())
        .merge(health::router())
        .nest("/api/admin", admin);

    // Uploaded files are served from disk unless a remote store hands out
    // absolute URLs.
    if config.files_url.starts_with('/') && config.s3_bucket.is_none() {
        app = app.nest_service(&config.files_url, ServeDir::new(&config.uploads_dir));
    }

    // Middleware layers (last added = first executed in request flow):
    // TraceLayer → CORS → compression → catch panic → routes
    catch_panics(app.fallback(fallback), &state)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 404 for unknown paths: JSON under `/api`, the themed page elsewhere.
async fn fallback(
    axum::extract::State(state): axum::extract::State<AppState>,
    uri: Uri,
) -> axum::response::Response {
    if uri.path().starts_with("/api/") {
        AppError::NotFound.into_response()
    } else {
        helpers::not_found_page(&state)
    }
}

/// Render panics from any route in `app` as the themed 500 page.
pub fn catch_panics(app: Router<AppState>, state: &AppState) -> Router<AppState> {
    let state = state.clone();
    app.layer(CatchPanicLayer::custom(move |err| {
        panic_response(&state, err)
    }))
}

/// Turn a handler panic into the "something went wrong" page.
fn panic_response(state: &AppState, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "handler panicked");

    let page = state
        .theme()
        .render_error("Something went wrong", Some(&detail));
    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Html(page)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
    response
}

pub fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    }
}
