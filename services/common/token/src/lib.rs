pub mod builder;
pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod id;
pub mod token;

pub use builder::{IdGenerator, TokenBuilder};
pub use claims::{Claims, StandardClaims};
pub use config::{ConfigError, TokenConfig};
pub use error::{AuthRejection, TokenError, TokenResult};
pub use extractors::TokenContext;
pub use id::random_id;
pub use jsonwebtoken::Algorithm;
pub use token::{Expectations, ParsedToken, Rejection, Token, TokenHeader};
