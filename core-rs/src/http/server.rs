//! The axum router implementing the HTTP protocol (spec §4.8).

use super::wire::{classify_path, AccessMode, PathKind, RAW_CONTENT_TYPE, TTL_HEADER};
use crate::driver::Options;
use crate::engine::StorageEngine;
use crate::error::StoreError;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::sync::Arc;

/// `(event, key, mode) -> Err(status)` to reject. `event` is the HTTP
/// method name.
pub type AuthHook = Arc<dyn Fn(&str, &str, AccessMode) -> Result<(), u16> + Send + Sync>;

/// Rewrites a request path into a key before anything else runs.
pub type PathResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub engine: StorageEngine,
    pub auth: Option<AuthHook>,
    pub resolver: Option<PathResolver>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new().fallback(handle).with_state(state)
}

async fn handle(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw_path = uri.path().trim_start_matches('/').to_string();
    let path = state.resolver.as_ref().map(|r| r(&raw_path)).unwrap_or(raw_path);
    let kind = classify_path(&path);
    let key = match crate::key::normalize(&path) {
        Ok(k) => k,
        Err(e) => return error_response(&e),
    };

    let mode = match &method {
        &Method::GET | &Method::HEAD => AccessMode::Read,
        &Method::PUT | &Method::DELETE => AccessMode::Write,
        _ => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
    };

    if let Some(auth) = &state.auth {
        if let Err(status) = auth(method.as_str(), &key, mode) {
            return StatusCode::from_u16(status).unwrap_or(StatusCode::UNAUTHORIZED).into_response();
        }
    }

    match (&method, kind) {
        (&Method::GET, PathKind::Leaf) => get_leaf(&state, &key, &headers).await,
        (&Method::GET, PathKind::Base) => list_base(&state, &key).await,
        (&Method::HEAD, PathKind::Leaf) => head_leaf(&state, &key).await,
        (&Method::HEAD, PathKind::Base) => StatusCode::OK.into_response(),
        (&Method::PUT, PathKind::Leaf) => put_leaf(&state, &key, &headers, body).await,
        (&Method::PUT, PathKind::Base) => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        (&Method::DELETE, PathKind::Leaf) => delete_leaf(&state, &key).await,
        (&Method::DELETE, PathKind::Base) => delete_base(&state, &key).await,
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

fn wants_raw(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains(RAW_CONTENT_TYPE))
        .unwrap_or(false)
}

fn meta_headers(meta: &crate::value::Meta) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(mtime) = meta.mtime() {
        if let Some(dt) = chrono::DateTime::from_timestamp(mtime, 0) {
            if let Ok(v) = dt.to_rfc2822().parse() {
                headers.insert(header::LAST_MODIFIED, v);
            }
        }
    }
    if let Some(ttl) = meta.ttl() {
        if let Ok(v) = ttl.to_string().parse() {
            headers.insert(TTL_HEADER, v);
        }
        if let Ok(v) = format!("max-age={ttl}").parse() {
            headers.insert(header::CACHE_CONTROL, v);
        }
    }
    headers
}

async fn get_leaf(state: &AppState, key: &str, headers: &HeaderMap) -> Response {
    let opts = Options::default();
    if wants_raw(headers) {
        match state.engine.get_raw(key, &opts).await {
            Ok(Some(bytes)) => {
                let meta = state.engine.get_meta(key, &opts).await.ok().flatten();
                let mut resp = (
                    [(header::CONTENT_TYPE, RAW_CONTENT_TYPE)],
                    bytes,
                )
                    .into_response();
                if let Some(m) = meta {
                    resp.headers_mut().extend(meta_headers(&m));
                }
                resp
            }
            Ok(None) => StatusCode::NOT_FOUND.into_response(),
            Err(e) => error_response(&e),
        }
    } else {
        match state.engine.get(key, &opts).await {
            Ok(Some(value)) => {
                let text = crate::serialize::stringify(&value).unwrap_or_default();
                let meta = state.engine.get_meta(key, &opts).await.ok().flatten();
                let mut resp = text.into_response();
                if let Some(m) = meta {
                    resp.headers_mut().extend(meta_headers(&m));
                }
                resp
            }
            Ok(None) => StatusCode::NOT_FOUND.into_response(),
            Err(e) => error_response(&e),
        }
    }
}

async fn head_leaf(state: &AppState, key: &str) -> Response {
    let opts = Options::default();
    match state.engine.has(key, &opts).await {
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Ok(true) => {
            let meta = state.engine.get_meta(key, &opts).await.ok().flatten();
            let mut resp = StatusCode::OK.into_response();
            if let Some(m) = meta {
                resp.headers_mut().extend(meta_headers(&m));
            }
            resp
        }
        Err(e) => error_response(&e),
    }
}

async fn put_leaf(state: &AppState, key: &str, headers: &HeaderMap, body: Bytes) -> Response {
    let mut opts = Options::default();
    if let Some(ttl) = headers.get(TTL_HEADER).and_then(|v| v.to_str().ok()).and_then(|v| v.parse::<i64>().ok()) {
        opts = opts.with("ttl", ttl);
    }
    let is_raw = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains(RAW_CONTENT_TYPE))
        .unwrap_or(false);

    let result = if is_raw {
        state.engine.set_raw(key, &body, &opts).await
    } else {
        let text = String::from_utf8_lossy(&body).to_string();
        let value = crate::serialize::parse(&text);
        state.engine.set(key, &value, &opts).await
    };
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

async fn delete_leaf(state: &AppState, key: &str) -> Response {
    match state.engine.remove(key, &Options::default()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

async fn delete_base(state: &AppState, base: &str) -> Response {
    match state.engine.clear(base, &Options::default()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

async fn list_base(state: &AppState, base: &str) -> Response {
    match state.engine.list_keys(base, &Options::default()).await {
        Ok(keys) => {
            let paths: Vec<String> = keys.into_iter().map(|k| k.replace(':', "/")).collect();
            axum::Json(paths).into_response()
        }
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &StoreError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, err.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_headers_includes_ttl_and_cache_control() {
        let meta = crate::value::Meta::new().with("ttl", 60);
        let headers = meta_headers(&meta);
        assert_eq!(headers.get(TTL_HEADER).unwrap(), "60");
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "max-age=60");
    }

    #[test]
    fn meta_headers_without_ttl_has_no_cache_control() {
        let meta = crate::value::Meta::new();
        let headers = meta_headers(&meta);
        assert!(headers.get(header::CACHE_CONTROL).is_none());
    }
}
