use std::collections::HashSet;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{crypto, decode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use crate::builder::TokenBuilder;
use crate::claims::Claims;
use crate::error::{TokenError, TokenResult};

const TOKEN_TYPE: &str = "JWT";

/// Algorithms accepted in the header of a token presented for verification.
const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// JOSE header written by [`Token::create`]. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: Algorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl TokenHeader {
    fn new(alg: Algorithm) -> Self {
        Self {
            alg,
            typ: Some(TOKEN_TYPE.to_owned()),
        }
    }
}

impl From<Header> for TokenHeader {
    fn from(value: Header) -> Self {
        Self {
            alg: value.alg,
            typ: value.typ,
        }
    }
}

/// Checks applied on parse in addition to signature and time validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectations {
    /// Required `aud` value; unchecked when `None`.
    pub audience: Option<String>,
    /// Required `iss` value; unchecked when `None`.
    pub issuer: Option<String>,
    /// Reject tokens without a `jti`.
    pub require_id: bool,
    /// Clock skew tolerated on `exp`, `nbf` and `iat`.
    pub leeway_seconds: u32,
    pub skip_issued_at: bool,
}

/// An immutable token descriptor: key, algorithm and claims.
///
/// The same type signs ([`Token::create`]) and verifies ([`Token::parse`]);
/// a verifying descriptor only needs its key.
#[derive(Clone)]
pub struct Token {
    key: Zeroizing<Vec<u8>>,
    algorithm: Algorithm,
    claims: Claims,
    expectations: Expectations,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("key", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("claims", &self.claims)
            .field("expectations", &self.expectations)
            .finish()
    }
}

impl Token {
    pub fn builder() -> TokenBuilder {
        TokenBuilder::new()
    }

    pub(crate) fn from_parts(
        key: Zeroizing<Vec<u8>>,
        algorithm: Algorithm,
        claims: Claims,
        expectations: Expectations,
    ) -> Self {
        Self {
            key,
            algorithm,
            claims,
            expectations,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.claims.body
    }

    pub fn expectations(&self) -> &Expectations {
        &self.expectations
    }

    /// Serializes and signs the descriptor into compact JWS form.
    pub fn create(&self) -> TokenResult<String> {
        let header = encode_segment(&TokenHeader::new(self.algorithm))?;
        let payload = encode_segment(&self.claims)?;
        let message = format!("{header}.{payload}");

        let key = EncodingKey::from_secret(&self.key);
        let signature =
            crypto::sign(message.as_bytes(), &key, self.algorithm).map_err(TokenError::Signing)?;

        debug!(algorithm = ?self.algorithm, jti = %self.claims.standard.id, "signed token");
        Ok(format!("{message}.{signature}"))
    }

    /// Verifies `token` and returns the decoded handle.
    ///
    /// On failure the rejection still carries an unverified handle when the
    /// header and payload could be decoded.
    pub fn parse(&self, token: &str) -> Result<ParsedToken, Rejection> {
        match self.verify_parts(token) {
            Ok((header, claims)) => {
                debug!(jti = %claims.standard.id, "verified token");
                Ok(ParsedToken {
                    header,
                    claims,
                    signature: signature_segment(token).to_owned(),
                    valid: true,
                })
            }
            Err(error) => {
                debug!(%error, "rejected token");
                Err(Rejection {
                    error,
                    token: ParsedToken::unverified(token),
                })
            }
        }
    }

    /// Verifies `token` and returns only its claims.
    pub fn verify(&self, token: &str) -> TokenResult<Claims> {
        self.parse(token)
            .map(ParsedToken::into_claims)
            .map_err(Rejection::into_error)
    }

    fn verify_parts(&self, token: &str) -> TokenResult<(TokenHeader, Claims)> {
        let key = DecodingKey::from_secret(&self.key);
        let data = decode::<Value>(token, &key, &self.validation())?;
        let claims = Claims::try_from(data.claims)?;
        self.check_claims(&claims)?;
        Ok((data.header.into(), claims))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        // Time claims are signed; `check_claims` enforces them.
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims = HashSet::new();
        validation.validate_aud = false;

        if let Some(audience) = &self.expectations.audience {
            validation.set_audience(&[audience]);
            validation.validate_aud = true;
        }
        if let Some(issuer) = &self.expectations.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }

    /// Time checks on signed claims plus `jti`. Zero claims are unset and
    /// never enforced; negative ones are ordinary pre-epoch instants.
    fn check_claims(&self, claims: &Claims) -> TokenResult<()> {
        let standard = &claims.standard;
        let now = Utc::now().timestamp();
        let leeway = i64::from(self.expectations.leeway_seconds);

        if standard.expires_at != 0 && standard.expires_at < now.saturating_sub(leeway) {
            return Err(TokenError::Expired);
        }
        if standard.not_before != 0 && standard.not_before > now.saturating_add(leeway) {
            return Err(TokenError::NotValidYet);
        }
        if !self.expectations.skip_issued_at
            && standard.issued_at != 0
            && standard.issued_at > now.saturating_add(leeway)
        {
            return Err(TokenError::IssuedAt);
        }

        if self.expectations.require_id && standard.id.is_empty() {
            return Err(TokenError::Id);
        }
        Ok(())
    }
}

/// A decoded token. `is_valid` is true only when it came out of a
/// successful [`Token::parse`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToken {
    header: TokenHeader,
    claims: Claims,
    signature: String,
    valid: bool,
}

impl ParsedToken {
    /// Decodes header and payload without checking the signature or any
    /// claim. The result is never valid.
    pub fn unverified(token: &str) -> Option<Self> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return None;
        };

        let header: TokenHeader = decode_segment(header)?;
        let claims = Claims::try_from(decode_segment::<Value>(payload)?).ok()?;
        Some(Self {
            header,
            claims,
            signature: signature.to_owned(),
            valid: false,
        })
    }

    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.claims.body
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn into_claims(self) -> Claims {
        self.claims
    }
}

/// Failed [`Token::parse`]: the translated error plus whatever could be
/// decoded from the token.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Rejection {
    #[source]
    error: TokenError,
    token: Option<ParsedToken>,
}

impl Rejection {
    pub fn error(&self) -> &TokenError {
        &self.error
    }

    pub fn token(&self) -> Option<&ParsedToken> {
        self.token.as_ref()
    }

    pub fn into_error(self) -> TokenError {
        self.error
    }
}

impl From<Rejection> for TokenError {
    fn from(value: Rejection) -> Self {
        value.error
    }
}

fn encode_segment<T: Serialize>(value: &T) -> TokenResult<String> {
    let json = serde_json::to_vec(value).map_err(|err| TokenError::Signing(err.into()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn signature_segment(token: &str) -> &str {
    token.rsplit_once('.').map_or("", |(_, signature)| signature)
}
