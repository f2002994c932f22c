use sqlx::FromRow;

/// A stored user record. The password hash never leaves the db layer; the
/// API modules project users into client-safe shapes.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub bio: String,
    pub avatar: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub image: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: i64,
}

/// A post joined with its author's public fields, as the feed queries
/// return it.
#[derive(Debug, Clone, FromRow)]
pub struct PostWithAuthor {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub image: String,
    pub created_at: i64,
    pub username: String,
    pub avatar: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct CommentWithAuthor {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: i64,
    pub username: String,
    pub avatar: String,
}
