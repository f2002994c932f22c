pub mod auth;
pub mod comments;
pub mod middleware;
pub mod posts;
pub mod server;
pub mod users;
