use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::SqlitePool;

use crate::db::models::{Comment, CommentWithAuthor, Post, PostWithAuthor, User};

/// Creates all tables. Idempotent; run once at startup.
///
/// Notes on the schema: `users.username` is intentionally not unique (only
/// email is the login key); `comments.post_id` carries no enforced foreign
/// key, so comments may reference posts that do not exist; likes and follow
/// edges are relation tables whose composite primary keys make set-add and
/// set-remove atomic.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            bio TEXT NOT NULL DEFAULT '',
            avatar TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            author_id TEXT NOT NULL,
            text TEXT NOT NULL,
            image TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS likes (
            post_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (post_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS follows (
            follower_id TEXT NOT NULL,
            followee_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (follower_id, followee_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            post_id TEXT NOT NULL,
            author_id TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

// === users ===

pub async fn insert_user(pool: &SqlitePool, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (id, username, email, password_hash, bio, avatar, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.bio)
    .bind(&user.avatar)
    .bind(user.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_user_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_profile(
    pool: &SqlitePool,
    id: &str,
    username: &str,
    bio: &str,
    avatar: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET username = ?, bio = ?, avatar = ? WHERE id = ?")
        .bind(username)
        .bind(bio)
        .bind(avatar)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

// === follow edges ===

/// Inserts the follow edge. `INSERT OR IGNORE` makes this idempotent and
/// atomic, so there is no read-modify-write race to lose an edge.
pub async fn follow(
    pool: &SqlitePool,
    follower_id: &str,
    followee_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at) VALUES (?, ?, ?)",
    )
    .bind(follower_id)
    .bind(followee_id)
    .bind(now_millis())
    .execute(pool)
    .await?;

    Ok(())
}

/// Removes the follow edge. A no-op if the edge does not exist.
pub async fn unfollow(
    pool: &SqlitePool,
    follower_id: &str,
    followee_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
        .bind(follower_id)
        .bind(followee_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Returns (followers, following) counts for a user.
pub async fn follow_counts(pool: &SqlitePool, id: &str) -> Result<(i64, i64), sqlx::Error> {
    sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM follows WHERE followee_id = ?),
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?)
        "#,
    )
    .bind(id)
    .bind(id)
    .fetch_one(pool)
    .await
}

// === posts ===

pub async fn insert_post(pool: &SqlitePool, post: &Post) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO posts (id, author_id, text, image, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&post.id)
    .bind(&post.author_id)
    .bind(&post.text)
    .bind(&post.image)
    .bind(post.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_post(pool: &SqlitePool, id: &str) -> Result<Option<PostWithAuthor>, sqlx::Error> {
    sqlx::query_as::<_, PostWithAuthor>(
        r#"
        SELECT p.id, p.author_id, p.text, p.image, p.created_at, u.username, u.avatar
        FROM posts p JOIN users u ON u.id = p.author_id
        WHERE p.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn post_exists(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Feed for an authenticated caller: own posts plus followed authors'
/// posts, newest first. Ties on the millisecond timestamp fall back to
/// insertion order.
pub async fn feed_for(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<PostWithAuthor>, sqlx::Error> {
    sqlx::query_as::<_, PostWithAuthor>(
        r#"
        SELECT p.id, p.author_id, p.text, p.image, p.created_at, u.username, u.avatar
        FROM posts p JOIN users u ON u.id = p.author_id
        WHERE p.author_id = ?
           OR p.author_id IN (SELECT followee_id FROM follows WHERE follower_id = ?)
        ORDER BY p.created_at DESC, p.rowid DESC
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// The anonymous fallback: every post in the system, newest first.
pub async fn all_posts(pool: &SqlitePool) -> Result<Vec<PostWithAuthor>, sqlx::Error> {
    sqlx::query_as::<_, PostWithAuthor>(
        r#"
        SELECT p.id, p.author_id, p.text, p.image, p.created_at, u.username, u.avatar
        FROM posts p JOIN users u ON u.id = p.author_id
        ORDER BY p.created_at DESC, p.rowid DESC
        "#,
    )
    .fetch_all(pool)
    .await
}

// === likes ===

/// Toggles `user_id`'s like on a post inside one transaction and returns
/// `(liked, like_count)`. The composite primary key keeps the like set
/// duplicate-free even under concurrent toggles.
pub async fn toggle_like(
    pool: &SqlitePool,
    post_id: &str,
    user_id: &str,
) -> Result<(bool, i64), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

    let liked = if existing.is_some() {
        sqlx::query("DELETE FROM likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        false
    } else {
        sqlx::query("INSERT OR IGNORE INTO likes (post_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(user_id)
            .bind(now_millis())
            .execute(&mut *tx)
            .await?;
        true
    };

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM likes WHERE post_id = ?")
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok((liked, count))
}

/// Ids of the users who liked a post, in like order.
pub async fn likers(pool: &SqlitePool, post_id: &str) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT user_id FROM likes WHERE post_id = ? ORDER BY rowid ASC")
            .bind(post_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

// === comments ===

pub async fn insert_comment(pool: &SqlitePool, comment: &Comment) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO comments (id, post_id, author_id, text, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&comment.id)
    .bind(&comment.post_id)
    .bind(&comment.author_id)
    .bind(&comment.text)
    .bind(comment.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Comments for a post, oldest first (opposite order from the feed).
pub async fn comments_for_post(
    pool: &SqlitePool,
    post_id: &str,
) -> Result<Vec<CommentWithAuthor>, sqlx::Error> {
    sqlx::query_as::<_, CommentWithAuthor>(
        r#"
        SELECT c.id, c.post_id, c.author_id, c.text, c.created_at, u.username, u.avatar
        FROM comments c JOIN users u ON u.id = c.author_id
        WHERE c.post_id = ?
        ORDER BY c.created_at ASC, c.rowid ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
}
