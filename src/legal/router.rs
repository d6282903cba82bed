//! Legal pages routing

use axum::{
    Router,
    body::Body,
    http::{Response, StatusCode, header},
    routing::get,
};
use rust_embed::Embed;

/// Embedded legal pages
#[derive(Embed)]
#[folder = "pages"]
struct Page;

/// Create legal pages router
///
/// # Endpoints
/// - `GET /terms` - Terms of service
/// - `GET /privacy` - Privacy policy
pub fn create_legal_router() -> Router {
    Router::new()
        .route("/terms", get(|| async { serve_page("terms.html") }))
        .route("/privacy", get(|| async { serve_page("privacy.html") }))
}

fn serve_page(file: &str) -> Response<Body> {
    let Some(content) = Page::get(file) else {
        let mut response = Response::new(Body::from("Not found"));
        *response.status_mut() = StatusCode::NOT_FOUND;
        return response;
    };

    let mime = mime_guess::from_path(file).first_or_octet_stream();
    let content_type = if mime.type_() == mime_guess::mime::TEXT {
        format!("{}; charset=utf-8", mime)
    } else {
        mime.to_string()
    };

    let mut response = Response::new(Body::from(content.data.into_owned()));
    let headers = response.headers_mut();
    if let Ok(value) = content_type.parse() {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=3600"),
    );
    response
}
