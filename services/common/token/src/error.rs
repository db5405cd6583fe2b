use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use serde::Serialize;
use thiserror::Error;

pub type TokenResult<T> = Result<T, TokenError>;

/// Every way building, signing or verifying a token can fail.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signing key is missing")]
    MissingKey,
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("token could not be verified: {0}")]
    Unverifiable(String),
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token audience is invalid")]
    Audience,
    #[error("token has expired")]
    Expired,
    #[error("token used before it was issued")]
    IssuedAt,
    #[error("token issuer is invalid")]
    Issuer,
    #[error("token is not valid yet")]
    NotValidYet,
    #[error("token id is missing")]
    Id,
    #[error("token claims are invalid: {0}")]
    ClaimsInvalid(String),
    #[error("failed to sign token: {0}")]
    Signing(#[source] JwtError),
    #[error(transparent)]
    Jwt(JwtError),
}

impl TokenError {
    /// True for failures caused by the local setup rather than by the
    /// presented token.
    pub fn is_configuration(&self) -> bool {
        matches!(self, TokenError::MissingKey | TokenError::Signing(_))
    }
}

/// Translates a verification failure reported by `jsonwebtoken`.
///
/// Kinds without a dedicated variant are kept as-is in [`TokenError::Jwt`].
impl From<JwtError> for TokenError {
    fn from(value: JwtError) -> Self {
        match value.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::Malformed(value.to_string()),
            ErrorKind::InvalidSignature => Self::SignatureInvalid,
            ErrorKind::InvalidAlgorithm
            | ErrorKind::MissingAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::Crypto(_) => Self::Unverifiable(value.to_string()),
            ErrorKind::InvalidAudience => Self::Audience,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidIssuer => Self::Issuer,
            ErrorKind::ImmatureSignature => Self::NotValidYet,
            ErrorKind::InvalidSubject | ErrorKind::MissingRequiredClaim(_) => {
                Self::ClaimsInvalid(value.to_string())
            }
            _ => Self::Jwt(value),
        }
    }
}

/// Rejection produced when a request cannot be authenticated with a bearer
/// token.
#[derive(Debug, Error)]
pub enum AuthRejection {
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl AuthRejection {
    pub fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AuthRejection::MissingAuthorization | AuthRejection::InvalidAuthorization => {
                (StatusCode::UNAUTHORIZED, "AUTH_HEADER")
            }
            AuthRejection::Token(err) if err.is_configuration() => {
                (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_CONFIG")
            }
            AuthRejection::Token(TokenError::Expired) => (StatusCode::UNAUTHORIZED, "AUTH_EXPIRED"),
            AuthRejection::Token(_) => (StatusCode::UNAUTHORIZED, "AUTH_TOKEN"),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
