use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::server::AppState;
use crate::api::users::UserView;
use crate::auth;
use crate::db::models::User;
use crate::db::repo;
use crate::error::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct RegisterPayload {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginPayload {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterPayload>,
) -> ApiResult<Json<AuthResponse>> {
    if payload.username.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.password.is_empty()
    {
        return Err(ApiError::InvalidInput("Missing fields"));
    }

    if repo::find_user_by_email(&state.db, &payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Email already registered"));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        username: payload.username,
        email: payload.email,
        password_hash: auth::hash_password(&payload.password)?,
        bio: String::new(),
        avatar: String::new(),
        created_at: repo::now_millis(),
    };
    repo::insert_user(&state.db, &user).await?;

    tracing::info!(user_id = %user.id, "registered user");

    let token = state.keys.issue(&user.id)?;
    Ok(Json(AuthResponse {
        token,
        user: UserView::from(&user),
    }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginPayload>,
) -> ApiResult<Json<AuthResponse>> {
    // Unknown email and wrong password are deliberately indistinguishable.
    let user = repo::find_user_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::Unauthorized("Invalid credentials"))?;

    if !auth::verify_password(&payload.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("Invalid credentials"));
    }

    let token = state.keys.issue(&user.id)?;
    Ok(Json(AuthResponse {
        token,
        user: UserView::from(&user),
    }))
}
