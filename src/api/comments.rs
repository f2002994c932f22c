use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::middleware::Ctx;
use crate::api::posts::AuthorView;
use crate::api::server::AppState;
use crate::db::models::{Comment, CommentWithAuthor};
use crate::db::repo;
use crate::error::{ApiError, ApiResult};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentPayload {
    pub post_id: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub author: AuthorView,
    pub text: String,
    pub created_at: i64,
}

impl From<CommentWithAuthor> for CommentView {
    fn from(row: CommentWithAuthor) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            author: AuthorView {
                id: row.author_id,
                username: row.username,
                avatar: row.avatar,
            },
            text: row.text,
            created_at: row.created_at,
        }
    }
}

/// Adds a comment. The post id is not checked against the posts table;
/// comments may reference a post that does not exist.
pub async fn add_comment(
    ctx: Ctx,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddCommentPayload>,
) -> ApiResult<Json<CommentView>> {
    let (post_id, text) = match (payload.post_id, payload.text) {
        (Some(post_id), Some(text)) if !post_id.is_empty() && !text.trim().is_empty() => {
            (post_id, text)
        }
        _ => return Err(ApiError::InvalidInput("Missing fields")),
    };

    let author = repo::find_user_by_id(&state.db, ctx.user_id())
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        post_id,
        author_id: author.id.clone(),
        text,
        created_at: repo::now_millis(),
    };
    repo::insert_comment(&state.db, &comment).await?;

    Ok(Json(CommentView {
        id: comment.id,
        post_id: comment.post_id,
        author: AuthorView {
            id: author.id,
            username: author.username,
            avatar: author.avatar,
        },
        text: comment.text,
        created_at: comment.created_at,
    }))
}

/// Comments for a post, oldest first, author populated.
pub async fn get_comments(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> ApiResult<Json<Vec<CommentView>>> {
    let rows = repo::comments_for_post(&state.db, &post_id).await?;
    Ok(Json(rows.into_iter().map(CommentView::from).collect()))
}
