use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::api::middleware::Ctx;
use crate::api::server::AppState;
use crate::db::models::User;
use crate::db::repo;
use crate::error::{ApiError, ApiResult};

/// Public projection of a user (no password hash).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub avatar: String,
    pub created_at: i64,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            bio: user.bio.clone(),
            avatar: user.avatar.clone(),
            created_at: user.created_at,
        }
    }
}

/// Profile with follower/following counts, as `GET /users/{id}` returns it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub avatar: String,
    pub followers_count: i64,
    pub following_count: i64,
}

#[derive(Deserialize)]
pub struct EditProfilePayload {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

async fn profile_view(state: &AppState, user: &User) -> Result<ProfileView, sqlx::Error> {
    let (followers_count, following_count) = repo::follow_counts(&state.db, &user.id).await?;
    Ok(ProfileView {
        id: user.id.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        bio: user.bio.clone(),
        avatar: user.avatar.clone(),
        followers_count,
        following_count,
    })
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProfileView>> {
    let user = repo::find_user_by_id(&state.db, &id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(profile_view(&state, &user).await?))
}

/// Partial profile update. Only the caller's own record may be edited;
/// username is ignored when empty, bio/avatar accept an explicit empty
/// string.
pub async fn edit_profile(
    ctx: Ctx,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<EditProfilePayload>,
) -> ApiResult<Json<ProfileView>> {
    if ctx.user_id() != id {
        return Err(ApiError::InvalidOperation(
            "Cannot edit another user's profile",
        ));
    }

    let mut user = repo::find_user_by_id(&state.db, &id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    if let Some(username) = payload.username {
        if !username.trim().is_empty() {
            user.username = username;
        }
    }
    if let Some(bio) = payload.bio {
        user.bio = bio;
    }
    if let Some(avatar) = payload.avatar {
        user.avatar = avatar;
    }

    repo::update_profile(&state.db, &user.id, &user.username, &user.bio, &user.avatar).await?;

    Ok(Json(profile_view(&state, &user).await?))
}

pub async fn follow_user(
    ctx: Ctx,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if ctx.user_id() == id {
        return Err(ApiError::InvalidOperation("Can't follow yourself"));
    }
    if repo::find_user_by_id(&state.db, &id).await?.is_none() {
        return Err(ApiError::NotFound("User not found"));
    }

    repo::follow(&state.db, ctx.user_id(), &id).await?;
    Ok(Json(json!({ "message": "Followed" })))
}

pub async fn unfollow_user(
    ctx: Ctx,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if repo::find_user_by_id(&state.db, &id).await?.is_none() {
        return Err(ApiError::NotFound("User not found"));
    }

    repo::unfollow(&state.db, ctx.user_id(), &id).await?;
    Ok(Json(json!({ "message": "Unfollowed" })))
}
