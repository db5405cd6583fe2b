use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{TokenError, TokenResult};

pub const DEFAULT_AUDIENCE: &str = "server";
pub const DEFAULT_ISSUER: &str = "app";
pub const DEFAULT_SUBJECT: &str = "authentication token";

/// Lifetime applied when no explicit expiry is configured.
pub fn default_ttl() -> Duration {
    Duration::days(7)
}

/// Registered JWT claims carried by every token.
///
/// Time fields are Unix-epoch seconds. Empty strings and zero instants are
/// left out of the encoded payload, and a zero instant is never enforced on
/// parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardClaims {
    #[serde(rename = "aud", default, skip_serializing_if = "String::is_empty")]
    pub audience: String,
    #[serde(rename = "exp", default, skip_serializing_if = "is_unset")]
    pub expires_at: i64,
    #[serde(rename = "jti", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "iat", default, skip_serializing_if = "is_unset")]
    pub issued_at: i64,
    #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    #[serde(rename = "nbf", default, skip_serializing_if = "is_unset")]
    pub not_before: i64,
    #[serde(rename = "sub", default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
}

fn is_unset(value: &i64) -> bool {
    *value == 0
}

impl StandardClaims {
    /// Default claim block for a token issued at `now`.
    pub fn issued_at(now: DateTime<Utc>, id: impl Into<String>) -> Self {
        let expires_at = now
            .checked_add_signed(default_ttl())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            audience: DEFAULT_AUDIENCE.to_owned(),
            expires_at: expires_at.timestamp(),
            id: id.into(),
            issued_at: now.timestamp(),
            issuer: DEFAULT_ISSUER.to_owned(),
            not_before: now.timestamp(),
            subject: DEFAULT_SUBJECT.to_owned(),
        }
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        instant(self.expires_at)
    }

    pub fn issued_at_utc(&self) -> Option<DateTime<Utc>> {
        instant(self.issued_at)
    }

    pub fn not_before_utc(&self) -> Option<DateTime<Utc>> {
        instant(self.not_before)
    }
}

fn instant(seconds: i64) -> Option<DateTime<Utc>> {
    if seconds == 0 {
        return None;
    }
    Utc.timestamp_opt(seconds, 0).single()
}

/// Full token payload: the caller's `body` plus the registered claims.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, deserialize_with = "nullable_map")]
    pub body: Map<String, Value>,
    #[serde(flatten)]
    pub standard: StandardClaims,
}

fn nullable_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Claims {
    pub fn new(body: Map<String, Value>, standard: StandardClaims) -> Self {
        Self { body, standard }
    }

    /// Looks up a single entry of the caller payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Deserializes the caller payload into a typed value.
    pub fn body_as<T: DeserializeOwned>(&self) -> TokenResult<T> {
        serde_json::from_value(Value::Object(self.body.clone()))
            .map_err(|err| TokenError::ClaimsInvalid(err.to_string()))
    }
}

impl TryFrom<Value> for Claims {
    type Error = TokenError;

    fn try_from(value: Value) -> TokenResult<Self> {
        if !value.is_object() {
            return Err(TokenError::ClaimsInvalid(
                "claims payload is not a JSON object".to_owned(),
            ));
        }
        serde_json::from_value(value).map_err(|err| TokenError::ClaimsInvalid(err.to_string()))
    }
}
