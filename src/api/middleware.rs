use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;

use crate::api::server::AppState;
use crate::error::ApiError;

/// The authenticated caller's identity, attached to the request by the
/// auth middleware and extracted by handlers as a parameter.
#[derive(Clone, Debug)]
pub struct Ctx {
    user_id: String,
}

impl Ctx {
    pub fn new(user_id: String) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Ctx>()
            .cloned()
            .ok_or(ApiError::Unauthorized("No token provided"))
    }
}

/// Caller identity for optional-auth routes: `None` when the request is
/// anonymous or carried an unusable token.
#[derive(Clone, Debug)]
pub struct MaybeCtx(pub Option<Ctx>);

impl<S> FromRequestParts<S> for MaybeCtx
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Ctx>().cloned()))
    }
}

/// Parses `Authorization: Bearer <token>`. Exactly two space-separated
/// parts, the first literally `Bearer`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .ok_or(ApiError::Unauthorized("No token provided"))?;
    let header = header
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Token format invalid"))?;

    let parts: Vec<&str> = header.split(' ').collect();
    if parts.len() != 2 || parts[0] != "Bearer" {
        return Err(ApiError::Unauthorized("Token format invalid"));
    }
    Ok(parts[1])
}

/// Mandatory auth: rejects with 401 before any handler (and so before any
/// store access) unless a valid bearer token is presented.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?;
    let user_id = state
        .keys
        .verify(token)
        .ok_or(ApiError::Unauthorized("Invalid token"))?;

    req.extensions_mut().insert(Ctx::new(user_id));
    Ok(next.run(req).await)
}

/// Optional auth: same parsing, but every failure is swallowed and the
/// request proceeds anonymously.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let user_id = bearer_token(req.headers())
        .ok()
        .and_then(|token| state.keys.verify(token));
    if let Some(user_id) = user_id {
        req.extensions_mut().insert(Ctx::new(user_id));
    }
    next.run(req).await
}
