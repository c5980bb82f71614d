//! Reverse proxy to per-user backends and memory services: strip
//! hop-by-hop headers, forward method/headers/query/body verbatim,
//! surface the upstream status code unchanged.

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, HeaderName, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use std::time::Duration;

const PROXY_TIMEOUT: Duration = Duration::from_secs(30);

/// Headers that must never be forwarded verbatim in either direction —
/// they describe *this* hop's transport framing, not the proxied payload.
const HOP_BY_HOP: &[&str] = &["host", "content-length", "transfer-encoding", "content-encoding"];

pub async fn forward(
    client: &reqwest::Client,
    base_url: &str,
    subpath: &str,
    method: Method,
    headers: HeaderMap,
    query: Option<&str>,
    body: Body,
) -> Response {
    let mut url = format!("{base_url}{subpath}");
    if let Some(q) = query {
        if !q.is_empty() {
            url.push('?');
            url.push_str(q);
        }
    }

    let method = match reqwest::Method::from_bytes(method.as_str().as_bytes()) {
        Ok(m) => m,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let body_bytes = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let mut request = client.request(method, &url).timeout(PROXY_TIMEOUT);
    for (name, value) in headers.iter() {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        request = request.header(name.as_str(), value.as_bytes());
    }
    if !body_bytes.is_empty() {
        request = request.body(body_bytes);
    }

    match request.send().await {
        Ok(upstream) => {
            let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut response_headers = HeaderMap::new();
            for (name, value) in upstream.headers().iter() {
                if HOP_BY_HOP.contains(&name.as_str()) {
                    continue;
                }
                if let Ok(name) = HeaderName::from_bytes(name.as_str().as_bytes()) {
                    response_headers.insert(name, value.clone());
                }
            }
            let bytes = upstream.bytes().await.unwrap_or_default();
            let mut response = (status, bytes).into_response();
            *response.headers_mut() = response_headers;
            response
        }
        Err(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT.into_response(),
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// Target for a per-user assistant backend.
pub fn backend_base_url(username: &str) -> String {
    format!("http://{username}:8080")
}

/// Target for a per-user memory service, kept a black box: the memory
/// service's own contract is out of scope here.
pub fn memory_base_url(username: &str) -> String {
    format!("http://memory-{username}:8080")
}

/// Split `/memory/<rest>` into the sub-path forwarded to the memory
/// service: `/memory/memories` -> `/memories`, bare `/memory` -> `/`.
pub fn memory_subpath(uri: &Uri) -> String {
    let path = uri.path();
    let rest = path.strip_prefix("/memory").unwrap_or("");
    if rest.is_empty() {
        "/".to_string()
    } else {
        rest.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_subpath_strips_prefix() {
        let uri: Uri = "/memory/memories".parse().unwrap();
        assert_eq!(memory_subpath(&uri), "/memories");
    }

    #[test]
    fn memory_subpath_bare_is_root() {
        let uri: Uri = "/memory".parse().unwrap();
        assert_eq!(memory_subpath(&uri), "/");
    }

    #[test]
    fn backend_base_url_is_port_8080() {
        assert_eq!(backend_base_url("alice"), "http://alice:8080");
    }
}
