use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use super::errors::{store_error_response, unauthorized_response};
use super::supabase_identity::verify_access_token;
use super::{AppState, AuthUser};

pub(super) async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty());

    let Some(token) = token else {
        warn!("missing or invalid authorization header");
        return unauthorized_response();
    };

    let identity = match verify_access_token(&state.auth, token) {
        Ok(identity) => identity,
        Err(err) => {
            warn!("auth rejected: code={}, message={}", err.code, err.message);
            return unauthorized_response();
        }
    };

    if let Err(err) = state
        .store
        .ensure_profile(identity.user_id, identity.email.as_deref())
        .await
    {
        return store_error_response(err);
    }

    req.extensions_mut().insert(AuthUser {
        user_id: identity.user_id,
    });
    next.run(req).await
}
