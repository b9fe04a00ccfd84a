//! Bootstrap client page.

use axum::response::Html;

/// The page is compiled into the binary; it never changes at runtime.
const INDEX_HTML: &str = include_str!("../../../static/index.html");

/// `GET /` (without upgrade) — Serve the bootstrap client page.
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}
