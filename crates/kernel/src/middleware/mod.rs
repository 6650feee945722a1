//! HTTP middleware components.
//!
//! Provides site settings resolution and API key authentication.

pub mod api_key;

pub use api_key::{API_KEY_HEADER, load_site_settings, require_api_key, verify_api_key};
