use axum::Router;

pub mod catalog;
pub mod common;
pub mod periods;
pub mod stream;
pub mod system;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .nest("/periods", periods::router())
        .nest("/catalog", catalog::router())
}
