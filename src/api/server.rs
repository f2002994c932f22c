use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::middleware::{optional_auth, require_auth};
use crate::api::{auth, comments, posts, users};
use crate::auth::TokenKeys;
use crate::config::Config;
use crate::db::repo;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub keys: TokenKeys,
}

/// Builds the full router. Exposed so tests can drive it in-process.
pub fn app(state: Arc<AppState>) -> Router {
    // Routes that reject unauthenticated callers outright.
    let protected = Router::new()
        .route("/posts/create", post(posts::create_post))
        .route("/posts/like/{id}", post(posts::toggle_like))
        .route("/comments/add", post(comments::add_comment))
        .route("/users/{id}", put(users::edit_profile))
        .route("/users/follow/{id}", post(users::follow_user))
        .route("/users/unfollow/{id}", post(users::unfollow_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // The feed attaches identity when a valid token is present but never
    // rejects; anonymous callers get the public firehose.
    let feed = Router::new()
        .route("/posts", get(posts::get_feed))
        .route_layer(middleware::from_fn_with_state(state.clone(), optional_auth));

    let public = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/posts/{id}", get(posts::get_post))
        .route("/comments/{post_id}", get(comments::get_comments))
        .route("/users/{id}", get(users::get_profile));

    Router::new()
        .merge(protected)
        .merge(feed)
        .merge(public)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: Config) -> anyhow::Result<()> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    repo::init_schema(&pool).await?;

    let state = Arc::new(AppState {
        db: pool,
        keys: TokenKeys::new(&config.jwt_secret),
    });

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
