use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderValue};
use serde_json::{Map, Value};
use tracing::debug;

use crate::builder::TokenBuilder;
use crate::claims::Claims;
use crate::config::TokenConfig;
use crate::error::AuthRejection;

/// Verified claims of the bearer token presented with the request.
#[derive(Debug, Clone)]
pub struct TokenContext {
    pub claims: Claims,
    pub token: String,
}

impl TokenContext {
    pub fn body(&self) -> &Map<String, Value> {
        &self.claims.body
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.claims.get(key)
    }

    pub fn into_claims(self) -> Claims {
        self.claims
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TokenContext
where
    Arc<TokenConfig>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = Arc::<TokenConfig>::from_ref(state);

        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthRejection::MissingAuthorization)?;

        let token = parse_bearer(header_value)?;
        let verifier = TokenBuilder::from_config(&config).build()?;
        let claims = verifier.verify(&token).inspect_err(|err| {
            debug!(error = %err, path = %parts.uri.path(), "bearer token rejected");
        })?;

        Ok(Self { claims, token })
    }
}

/// Extracts the compact token from an `Authorization: Bearer <token>` value.
///
/// The scheme matches case-insensitively. The credential must be a single
/// `header.payload.signature` word; anything else is rejected before any
/// key material is touched.
pub fn parse_bearer(value: &HeaderValue) -> Result<String, AuthRejection> {
    let raw = value
        .to_str()
        .map_err(|_| AuthRejection::InvalidAuthorization)?
        .trim();

    let (scheme, credential) = raw
        .split_once(' ')
        .ok_or(AuthRejection::InvalidAuthorization)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthRejection::InvalidAuthorization);
    }

    let token = credential.trim_start();
    let compact = token.split('.').count() == 3
        && !token.chars().any(|c| c.is_ascii_whitespace());
    if !compact {
        return Err(AuthRejection::InvalidAuthorization);
    }

    Ok(token.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TokenError;
    use crate::token::Token;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use chrono::Duration;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::util::ServiceExt;

    fn bearer(value: &'static str) -> Result<String, AuthRejection> {
        parse_bearer(&HeaderValue::from_static(value))
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        for value in ["Bearer h.p.s", "bearer h.p.s", "BEARER   h.p.s  "] {
            assert_eq!(bearer(value).expect(value), "h.p.s");
        }
    }

    #[test]
    fn bearer_credential_must_be_one_compact_token() {
        for value in [
            "Bearer",
            "Bearer    ",
            "Bearerh.p.s",
            "Basic h.p.s",
            "Bearer h.p",
            "Bearer h.p.s.extra",
            "Bearer h.p.s other",
            "Bearer h.p.s\tother",
        ] {
            assert!(
                matches!(bearer(value), Err(AuthRejection::InvalidAuthorization)),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn bearer_value_must_be_visible_ascii() {
        let header = HeaderValue::from_bytes(b"Bearer h.p.\xff").expect("opaque header");
        assert!(matches!(
            parse_bearer(&header),
            Err(AuthRejection::InvalidAuthorization)
        ));
    }

    async fn echo_body(context: TokenContext) -> Json<Value> {
        Json(Value::Object(context.body().clone()))
    }

    fn app(config: TokenConfig) -> Router {
        Router::new()
            .route("/echo", get(echo_body))
            .with_state(Arc::new(config))
    }

    async fn call(app: Router, authorization: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().uri("/echo");
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        let response = app
            .oneshot(request.body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn extractor_exposes_verified_body() {
        let token = Token::builder()
            .with_key("route-secret")
            .with_body_entry("tenant", "t-1")
            .build()
            .and_then(|token| token.create())
            .expect("token");

        let (status, body) = call(
            app(TokenConfig::new("route-secret")),
            Some(&format!("Bearer {token}")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "tenant": "t-1" }));
    }

    #[tokio::test]
    async fn extractor_maps_failures_to_status() {
        let (status, body) = call(app(TokenConfig::new("route-secret")), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_HEADER");

        let expired = Token::builder()
            .with_key("route-secret")
            .with_expiry(Duration::minutes(-1))
            .build()
            .and_then(|token| token.create())
            .expect("token");
        let (status, body) = call(
            app(TokenConfig::new("route-secret")),
            Some(&format!("Bearer {expired}")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_EXPIRED");
        assert_eq!(body["message"], TokenError::Expired.to_string());

        let (status, body) = call(app(TokenConfig::new("")), Some("Bearer a.b.c")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "AUTH_CONFIG");
    }
}
