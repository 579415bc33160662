//! CORS layer configuration.

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use compozit_core::config::ServerConfig;

/// Builds a CORS tower layer from configuration.
///
/// `"*"` in `allowed_origins` allows any origin; otherwise only the listed
/// origins that parse as header values are allowed.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .max_age(std::time::Duration::from_secs(3600));

    if config.allowed_origins.iter().any(|o| o == "*") {
        layer = layer.allow_origin(Any).allow_headers(Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        let mut headers = vec![axum::http::header::CONTENT_TYPE];
        if let Ok(identity) = HeaderName::try_from(config.identity_header.as_str()) {
            headers.push(identity);
        }
        layer = layer.allow_origin(origins).allow_headers(headers);
    }

    layer
}
