use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::Algorithm;
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::claims::{
    default_ttl, Claims, StandardClaims, DEFAULT_AUDIENCE, DEFAULT_ISSUER, DEFAULT_SUBJECT,
};
use crate::config::TokenConfig;
use crate::error::{TokenError, TokenResult};
use crate::id::random_id;
use crate::token::{Expectations, Token};

/// Source of the `jti` used when none is set explicitly.
pub type IdGenerator = fn() -> String;

/// Accumulates token settings; [`TokenBuilder::build`] freezes them into a
/// [`Token`].
///
/// Setters apply in call order, so a later call wins over an earlier one
/// touching the same field. Unset time claims default relative to the
/// builder clock, which is the wall clock unless [`TokenBuilder::with_clock`]
/// pins it.
#[derive(Clone)]
pub struct TokenBuilder {
    key: Zeroizing<Vec<u8>>,
    algorithm: Algorithm,
    body: Map<String, Value>,
    audience: String,
    issuer: String,
    subject: String,
    id: Option<String>,
    issued_at: Option<i64>,
    not_before: Option<i64>,
    expires_at: Option<i64>,
    clock: Option<DateTime<Utc>>,
    id_generator: IdGenerator,
    expectations: Expectations,
}

impl fmt::Debug for TokenBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBuilder")
            .field("algorithm", &self.algorithm)
            .field("body", &self.body)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("subject", &self.subject)
            .field("id", &self.id)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Default for TokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBuilder {
    pub fn new() -> Self {
        Self {
            key: Zeroizing::new(Vec::new()),
            algorithm: Algorithm::HS256,
            body: Map::new(),
            audience: DEFAULT_AUDIENCE.to_owned(),
            issuer: DEFAULT_ISSUER.to_owned(),
            subject: DEFAULT_SUBJECT.to_owned(),
            id: None,
            issued_at: None,
            not_before: None,
            expires_at: None,
            clock: None,
            id_generator: random_id,
            expectations: Expectations::default(),
        }
    }

    /// Seeds key, algorithm, issuer, audience, lifetime and verification
    /// expectations from runtime configuration.
    pub fn from_config(config: &TokenConfig) -> Self {
        let mut builder = Self::new()
            .with_key(config.secret())
            .with_algorithm(config.algorithm)
            .with_issuer(config.issuer.clone())
            .with_audience(config.audience.clone())
            .with_expiry(config.ttl)
            .with_leeway(config.leeway_seconds);

        if config.enforce_audience {
            builder = builder.expect_audience(config.audience.clone());
        }
        if config.enforce_issuer {
            builder = builder.expect_issuer(config.issuer.clone());
        }
        builder
    }

    pub fn with_key(mut self, key: impl AsRef<[u8]>) -> Self {
        self.key = Zeroizing::new(key.as_ref().to_vec());
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Replaces the whole caller payload.
    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_body_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    /// Expires the token `ttl` after the builder clock reads now.
    pub fn with_expiry(mut self, ttl: Duration) -> Self {
        let expires_at = self
            .now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.expires_at = Some(expires_at.timestamp());
        self
    }

    pub fn with_expires_at(mut self, instant: DateTime<Utc>) -> Self {
        self.expires_at = Some(instant.timestamp());
        self
    }

    pub fn with_not_before(mut self, instant: DateTime<Utc>) -> Self {
        self.not_before = Some(instant.timestamp());
        self
    }

    pub fn with_issued_at(mut self, instant: DateTime<Utc>) -> Self {
        self.issued_at = Some(instant.timestamp());
        self
    }

    /// Replaces every registered claim at once, including `jti`.
    pub fn with_claims(mut self, claims: StandardClaims) -> Self {
        self.audience = claims.audience;
        self.issuer = claims.issuer;
        self.subject = claims.subject;
        self.id = Some(claims.id);
        self.issued_at = Some(claims.issued_at);
        self.not_before = Some(claims.not_before);
        self.expires_at = Some(claims.expires_at);
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Pins "now" for default time claims and [`TokenBuilder::with_expiry`].
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    pub fn with_id_generator(mut self, generator: IdGenerator) -> Self {
        self.id_generator = generator;
        self
    }

    /// Rejects tokens whose `aud` differs from `audience` on parse.
    pub fn expect_audience(mut self, audience: impl Into<String>) -> Self {
        self.expectations.audience = Some(audience.into());
        self
    }

    /// Rejects tokens whose `iss` differs from `issuer` on parse.
    pub fn expect_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expectations.issuer = Some(issuer.into());
        self
    }

    pub fn require_id(mut self) -> Self {
        self.expectations.require_id = true;
        self
    }

    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.expectations.leeway_seconds = seconds;
        self
    }

    pub fn skip_issued_at_check(mut self) -> Self {
        self.expectations.skip_issued_at = true;
        self
    }

    /// Freezes the draft. Fails only when no key was set.
    pub fn build(self) -> TokenResult<Token> {
        if self.key.is_empty() {
            return Err(TokenError::MissingKey);
        }

        let now = self.now();
        let expires_at = self.expires_at.unwrap_or_else(|| {
            now.checked_add_signed(default_ttl())
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
                .timestamp()
        });
        let id = self.id.unwrap_or_else(self.id_generator);

        let standard = StandardClaims {
            audience: self.audience,
            expires_at,
            id,
            issued_at: self.issued_at.unwrap_or_else(|| now.timestamp()),
            issuer: self.issuer,
            not_before: self.not_before.unwrap_or_else(|| now.timestamp()),
            subject: self.subject,
        };

        Ok(Token::from_parts(
            self.key,
            self.algorithm,
            Claims::new(self.body, standard),
            self.expectations,
        ))
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }
}
