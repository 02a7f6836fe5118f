pub mod generate;
pub mod notifications;
pub mod posts;
pub mod push;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(generate::routes())
        .merge(notifications::routes())
        .merge(posts::routes())
        .merge(push::routes())
}
