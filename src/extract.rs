use axum_core::extract::FromRequestParts;
use http::{StatusCode, request::Parts};

use crate::RequestContext;

/// Axum Extractor for [`RequestContext`].
impl<S> FromRequestParts<S> for RequestContext
where
    S: Sync + Send,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("session layer not found in the request extensions");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "session layer not found in the request extensions",
                )
            })
    }
}
