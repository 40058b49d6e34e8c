//! Pre-shared key extractor for webhook routes
//!
//! Reads the `x-api-key` header and checks it against the [`WebhookAuth`]
//! extension. Handlers that take [`WebhookKey`] never run for a bad key.

use crate::api::response::ApiError;
use axum::{extract::FromRequestParts, http::request::Parts};
use convoy_core::WebhookAuth;
use tracing::warn;

/// Header carrying the webhook key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Proof that the request presented the webhook key (or none is configured)
#[derive(Debug, Clone, Copy)]
pub struct WebhookKey;

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for WebhookKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts
            .extensions
            .get::<WebhookAuth>()
            .ok_or_else(|| ApiError::internal("webhook auth not configured"))?;

        let provided = parts.headers.get(API_KEY_HEADER).map(|v| v.as_bytes());
        auth.verify_bytes(provided).map_err(|e| {
            warn!(path = %parts.uri.path(), "Rejected webhook with missing or invalid key");
            ApiError::from(e)
        })?;

        Ok(WebhookKey)
    }
}
