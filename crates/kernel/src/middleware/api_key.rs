//! API key authentication and per-request site settings.
//!
//! `load_site_settings` runs on every request and stores a [`SiteSettings`]
//! snapshot in the request extensions. `require_api_key` then compares the
//! `X-API-Key` header against the resolved key in constant time.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::settings::SiteSettings;
use crate::state::AppState;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Check a presented key against the configured one.
///
/// An empty configured key matches nothing.
pub fn verify_api_key(expected: &str, provided: Option<&str>) -> bool {
    if expected.is_empty() {
        return false;
    }
    match provided {
        Some(provided) => provided.as_bytes().ct_eq(expected.as_bytes()).into(),
        None => false,
    }
}

/// Middleware that resolves site settings for the request.
///
/// If the overrides cannot be read, the config defaults are used.
pub async fn load_site_settings(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let settings = match SiteSettings::resolve(state.config(), state.settings().as_ref()).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "failed to load site settings, using config defaults");
            SiteSettings::from_config(state.config())
        }
    };

    request.extensions_mut().insert(settings);
    next.run(request).await
}

/// Middleware that rejects requests without a valid `X-API-Key` header.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let settings = request
        .extensions()
        .get::<SiteSettings>()
        .cloned()
        .unwrap_or_else(|| SiteSettings::from_config(state.config()));

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if !verify_api_key(&settings.report_api_key, provided) {
        return AppError::Unauthorized.into_response();
    }

    next.run(request).await
}
