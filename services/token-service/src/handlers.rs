use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use common_token::{AuthRejection, TokenBuilder, TokenConfig, TokenContext};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct IssueTokenRequest {
    #[serde(default)]
    pub body: Map<String, Value>,
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct IssueTokenResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
}

pub async fn issue_token(
    State(config): State<Arc<TokenConfig>>,
    Json(request): Json<IssueTokenRequest>,
) -> Result<Json<IssueTokenResponse>, Response> {
    let now = Utc::now();
    let mut builder = TokenBuilder::from_config(&config).with_body(request.body);

    if let Some(seconds) = request.ttl_seconds {
        let Some(ttl) = Duration::try_seconds(seconds).filter(|_| seconds > 0) else {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "code": "INVALID_TTL",
                    "message": "ttl_seconds must be a positive number of seconds",
                })),
            )
                .into_response());
        };
        builder = builder.with_expiry(ttl);
    }

    let token = builder.build().map_err(reject)?;
    let signed = token.create().map_err(|err| {
        warn!(error = %err, "failed to sign token");
        reject(err)
    })?;

    let expires_at = token.claims().standard.expires_at_utc().unwrap_or(now);
    info!(jti = %token.claims().standard.id, %expires_at, "issued token");

    Ok(Json(IssueTokenResponse {
        token: signed,
        token_type: "Bearer",
        expires_at,
        expires_in: (expires_at - now).num_seconds(),
    }))
}

fn reject(err: common_token::TokenError) -> Response {
    AuthRejection::from(err).into_response()
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub body: Map<String, Value>,
    pub subject: String,
    pub id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn whoami(context: TokenContext) -> Json<WhoAmIResponse> {
    let standard = &context.claims.standard;
    Json(WhoAmIResponse {
        body: context.claims.body.clone(),
        subject: standard.subject.clone(),
        id: standard.id.clone(),
        expires_at: standard.expires_at_utc(),
    })
}
