use std::sync::Arc;

use axum::extract::FromRef;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use axum::routing::{get, post};
use axum::Router;
use common_token::TokenConfig;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{health, issue_token, whoami};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TokenConfig>,
}

impl AppState {
    pub fn new(config: TokenConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for Arc<TokenConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .route("/healthz", get(health))
        .route("/tokens", post(issue_token))
        .route("/me", get(whoami))
        .with_state(state)
        .layer(cors)
}
