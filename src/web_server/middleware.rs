use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// Session responses describe live state; never let a browser or proxy
/// reuse one.
pub(crate) async fn no_store_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        "Cache-Control",
        HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
    );
    headers.insert("Pragma", HeaderValue::from_static("no-cache"));
    headers.insert("Expires", HeaderValue::from_static("0"));

    response
}
