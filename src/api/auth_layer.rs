//! Authentication middleware for protected routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::header;

use crate::api::ApiError;
use crate::auth::AuthGate;

/// Run the auth gate and attach the admitted identity to the request.
///
/// The identity is inserted in one step after the gate has fully decided,
/// so a rejected or cancelled request never carries a partial identity.
pub async fn require_auth(
    State(gate): State<AuthGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let user = match gate.authenticate(authorization).await {
        Ok(user) => user,
        Err(e) => {
            if e.is_client_error() {
                tracing::debug!(reason = %e, path = %req.uri().path(), "request rejected");
            } else {
                tracing::warn!(reason = %e, "identity lookup failed");
            }
            return Err(e.into());
        }
    };

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
