use std::env;
use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use jsonwebtoken::Algorithm;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::claims::{default_ttl, DEFAULT_AUDIENCE, DEFAULT_ISSUER};

pub const ENV_SECRET: &str = "TOKEN_SECRET";
pub const ENV_ALGORITHM: &str = "TOKEN_ALGORITHM";
pub const ENV_ISSUER: &str = "TOKEN_ISSUER";
pub const ENV_AUDIENCE: &str = "TOKEN_AUDIENCE";
pub const ENV_TTL_SECONDS: &str = "TOKEN_TTL_SECONDS";
pub const ENV_LEEWAY_SECONDS: &str = "TOKEN_LEEWAY_SECONDS";
pub const ENV_ENFORCE_AUDIENCE: &str = "TOKEN_ENFORCE_AUDIENCE";
pub const ENV_ENFORCE_ISSUER: &str = "TOKEN_ENFORCE_ISSUER";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value '{value}' for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Runtime configuration for issuing and verifying tokens.
#[derive(Clone)]
pub struct TokenConfig {
    secret: Zeroizing<Vec<u8>>,
    /// Signing algorithm; HMAC family only.
    pub algorithm: Algorithm,
    /// Issuer claim (iss) written into new tokens.
    pub issuer: String,
    /// Audience claim (aud) written into new tokens.
    pub audience: String,
    /// Lifetime of newly issued tokens.
    pub ttl: Duration,
    /// Allowable clock skew in seconds when validating exp/nbf/iat.
    pub leeway_seconds: u32,
    /// Reject tokens whose aud differs from `audience`.
    pub enforce_audience: bool,
    /// Reject tokens whose iss differs from `issuer`.
    pub enforce_issuer: bool,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .field("leeway_seconds", &self.leeway_seconds)
            .field("enforce_audience", &self.enforce_audience)
            .field("enforce_issuer", &self.enforce_issuer)
            .finish()
    }
}

impl TokenConfig {
    /// Construct config with defaults: HS256, 7 day lifetime, no leeway and
    /// no audience/issuer enforcement.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Zeroizing::new(secret.as_ref().to_vec()),
            algorithm: Algorithm::HS256,
            issuer: DEFAULT_ISSUER.to_owned(),
            audience: DEFAULT_AUDIENCE.to_owned(),
            ttl: default_ttl(),
            leeway_seconds: 0,
            enforce_audience: false,
            enforce_issuer: false,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`TokenConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup(ENV_SECRET)
            .and_then(|value| normalize_optional(&value))
            .ok_or(ConfigError::Missing(ENV_SECRET))?;
        let mut config = Self::new(secret);

        if let Some(value) = lookup(ENV_ALGORITHM).and_then(|v| normalize_optional(&v)) {
            config.algorithm = parse_algorithm(&value)?;
        }
        if let Some(issuer) = lookup(ENV_ISSUER).and_then(|v| normalize_optional(&v)) {
            config.issuer = issuer;
        }
        if let Some(audience) = lookup(ENV_AUDIENCE).and_then(|v| normalize_optional(&v)) {
            config.audience = audience;
        }
        if let Some(value) = lookup(ENV_TTL_SECONDS) {
            let seconds = parse_number::<i64>(ENV_TTL_SECONDS, &value)?;
            if seconds <= 0 {
                return Err(invalid(ENV_TTL_SECONDS, &value));
            }
            config.ttl =
                Duration::try_seconds(seconds).ok_or_else(|| invalid(ENV_TTL_SECONDS, &value))?;
        }
        if let Some(value) = lookup(ENV_LEEWAY_SECONDS) {
            config.leeway_seconds = parse_number(ENV_LEEWAY_SECONDS, &value)?;
        }
        config.enforce_audience = lookup(ENV_ENFORCE_AUDIENCE)
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        config.enforce_issuer = lookup(ENV_ENFORCE_ISSUER)
            .map(|value| parse_bool(&value))
            .unwrap_or(false);

        Ok(config)
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    /// Enforce `issuer` and `audience` when verifying.
    pub fn enforcing(mut self, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self.audience = audience.into();
        self.enforce_issuer = true;
        self.enforce_audience = true;
        self
    }
}

fn parse_algorithm(value: &str) -> Result<Algorithm, ConfigError> {
    let algorithm = Algorithm::from_str(&value.to_ascii_uppercase())
        .map_err(|_| invalid(ENV_ALGORITHM, value))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        _ => Err(invalid(ENV_ALGORITHM, value)),
    }
}

fn parse_number<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(var, value))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn invalid(var: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn requires_secret() {
        let err = TokenConfig::from_lookup(lookup(&[])).expect_err("missing secret");
        assert_eq!(err, ConfigError::Missing(ENV_SECRET));

        let err = TokenConfig::from_lookup(lookup(&[(ENV_SECRET, "   ")])).expect_err("blank");
        assert_eq!(err, ConfigError::Missing(ENV_SECRET));
    }

    #[test]
    fn applies_defaults() {
        let config = TokenConfig::from_lookup(lookup(&[(ENV_SECRET, "s3cret")])).expect("config");
        assert_eq!(config.secret(), b"s3cret");
        assert_eq!(config.algorithm, Algorithm::HS256);
        assert_eq!(config.issuer, "app");
        assert_eq!(config.audience, "server");
        assert_eq!(config.ttl, Duration::days(7));
        assert_eq!(config.leeway_seconds, 0);
        assert!(!config.enforce_audience);
        assert!(!config.enforce_issuer);
    }

    #[test]
    fn reads_overrides() {
        let config = TokenConfig::from_lookup(lookup(&[
            (ENV_SECRET, "s3cret"),
            (ENV_ALGORITHM, "hs512"),
            (ENV_ISSUER, "pos"),
            (ENV_AUDIENCE, "terminal"),
            (ENV_TTL_SECONDS, "900"),
            (ENV_LEEWAY_SECONDS, " 15 "),
            (ENV_ENFORCE_AUDIENCE, "yes"),
            (ENV_ENFORCE_ISSUER, "off"),
        ]))
        .expect("config");

        assert_eq!(config.algorithm, Algorithm::HS512);
        assert_eq!(config.issuer, "pos");
        assert_eq!(config.audience, "terminal");
        assert_eq!(config.ttl, Duration::seconds(900));
        assert_eq!(config.leeway_seconds, 15);
        assert!(config.enforce_audience);
        assert!(!config.enforce_issuer);
    }

    #[test]
    fn rejects_invalid_values() {
        for (var, value) in [
            (ENV_ALGORITHM, "RS256"),
            (ENV_ALGORITHM, "none"),
            (ENV_TTL_SECONDS, "0"),
            (ENV_TTL_SECONDS, "soon"),
            (ENV_LEEWAY_SECONDS, "-1"),
        ] {
            let err = TokenConfig::from_lookup(lookup(&[(ENV_SECRET, "s"), (var, value)]))
                .expect_err("invalid value");
            assert_eq!(
                err,
                ConfigError::Invalid {
                    var,
                    value: value.to_owned()
                }
            );
        }
    }

    #[test]
    fn rejects_out_of_range_durations() {
        let too_long = i64::MAX.to_string();
        let too_lenient = u64::MAX.to_string();
        for (var, value) in [
            (ENV_TTL_SECONDS, too_long.as_str()),
            (ENV_LEEWAY_SECONDS, too_lenient.as_str()),
            (ENV_LEEWAY_SECONDS, "4294967296"),
        ] {
            let err = TokenConfig::from_lookup(lookup(&[(ENV_SECRET, "s"), (var, value)]))
                .expect_err("out of range");
            assert!(matches!(err, ConfigError::Invalid { var: v, .. } if v == var));
        }

        let config = TokenConfig::from_lookup(lookup(&[
            (ENV_SECRET, "s"),
            (ENV_LEEWAY_SECONDS, "4294967295"),
        ]))
        .expect("largest leeway");
        assert_eq!(config.leeway_seconds, u32::MAX);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", TokenConfig::new("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
