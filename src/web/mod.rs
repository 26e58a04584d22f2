//! JSON API over the content store.
//!
//! Listing endpoints answer with a tagged [`QueryOutcome`](crate::store::QueryOutcome)
//! and the mutation endpoint always answers with a
//! [`MutationOutcome`](crate::store::MutationOutcome), whatever the status code.

pub mod error;
pub mod handlers;

use crate::store::InMemoryContentStore;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::WebError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<InMemoryContentStore>,
    /// Page size used when a request does not carry `limit`
    pub page_size: usize,
}

impl AppState {
    pub fn new(store: Arc<InMemoryContentStore>, page_size: usize) -> Self {
        Self { store, page_size }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthcheck))
        .route("/api/v1/content/:kind", get(handlers::list_content))
        .route("/api/v1/posts/:id/comments", get(handlers::list_comments))
        .route("/api/v1/mutations", post(handlers::mutate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
