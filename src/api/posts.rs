use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::middleware::{Ctx, MaybeCtx};
use crate::api::server::AppState;
use crate::db::models::{Post, PostWithAuthor};
use crate::db::repo;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: String,
    pub username: String,
    pub avatar: String,
}

/// A post as the API returns it: author populated, likes as user ids.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub author: AuthorView,
    pub text: String,
    pub image: String,
    pub likes: Vec<String>,
    pub created_at: i64,
}

impl PostView {
    fn new(row: PostWithAuthor, likes: Vec<String>) -> Self {
        Self {
            id: row.id,
            author: AuthorView {
                id: row.author_id,
                username: row.username,
                avatar: row.avatar,
            },
            text: row.text,
            image: row.image,
            likes,
            created_at: row.created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct CreatePostPayload {
    pub text: Option<String>,
    pub image: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub message: &'static str,
    pub likes_count: i64,
}

async fn with_likes(state: &AppState, rows: Vec<PostWithAuthor>) -> Result<Vec<PostView>, sqlx::Error> {
    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        let likes = repo::likers(&state.db, &row.id).await?;
        views.push(PostView::new(row, likes));
    }
    Ok(views)
}

pub async fn create_post(
    ctx: Ctx,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreatePostPayload>,
) -> ApiResult<Json<PostView>> {
    let text = payload.text.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ApiError::InvalidInput("Text is required"));
    }

    let post = Post {
        id: Uuid::new_v4().to_string(),
        author_id: ctx.user_id().to_string(),
        text,
        image: payload.image.unwrap_or_default(),
        created_at: repo::now_millis(),
    };
    repo::insert_post(&state.db, &post).await?;

    let row = repo::find_post(&state.db, &post.id)
        .await?
        .ok_or(ApiError::NotFound("Post not found"))?;
    Ok(Json(PostView::new(row, Vec::new())))
}

/// The feed. Authenticated callers get their own posts plus followed
/// authors' posts; anonymous callers get every post in the system. Both
/// newest-first, no pagination.
pub async fn get_feed(
    MaybeCtx(ctx): MaybeCtx,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<PostView>>> {
    let rows = match &ctx {
        Some(ctx) => repo::feed_for(&state.db, ctx.user_id()).await?,
        None => repo::all_posts(&state.db).await?,
    };
    Ok(Json(with_likes(&state, rows).await?))
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<PostView>> {
    let row = repo::find_post(&state.db, &id)
        .await?
        .ok_or(ApiError::NotFound("Post not found"))?;
    let likes = repo::likers(&state.db, &id).await?;
    Ok(Json(PostView::new(row, likes)))
}

pub async fn toggle_like(
    ctx: Ctx,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<LikeResponse>> {
    if !repo::post_exists(&state.db, &id).await? {
        return Err(ApiError::NotFound("Post not found"));
    }

    let (liked, likes_count) = repo::toggle_like(&state.db, &id, ctx.user_id()).await?;
    Ok(Json(LikeResponse {
        message: if liked { "Liked" } else { "Unliked" },
        likes_count,
    }))
}
