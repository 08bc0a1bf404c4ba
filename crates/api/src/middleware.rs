use std::sync::Arc;

use axum::{extract::State, http::StatusCode, middleware::Next, response::Response};

use crate::context::{IdentityResolver, RequesterContext};

#[derive(Clone)]
pub struct IdentityState {
    pub resolver: Arc<dyn IdentityResolver>,
}

pub async fn identity_middleware(
    State(state): State<IdentityState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let requester = state.resolver.resolve(req.headers()).map_err(|e| {
        tracing::debug!(error = %e, "rejecting request without identity");
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(RequesterContext::new(requester));

    Ok(next.run(req).await)
}
