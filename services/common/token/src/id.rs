use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

/// Length of identifiers produced by [`random_id`].
pub const DEFAULT_ID_LENGTH: usize = 64;

/// Default token identifier: 64 alphanumeric characters drawn from the OS
/// random source.
pub fn random_id() -> String {
    random_string(DEFAULT_ID_LENGTH)
}

pub fn random_string(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
