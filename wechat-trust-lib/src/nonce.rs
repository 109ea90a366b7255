//! Nonce strings and timestamps used by every signed exchange.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Longest nonce the platform accepts.
pub const NONCE_MAX_LEN: usize = 32;

/// Default nonce length.
pub const NONCE_DEFAULT_LEN: usize = 16;

/// Random alphanumeric nonce, clamped to [`NONCE_MAX_LEN`] characters.
pub fn create_nonce_str(len: usize) -> String {
    let len = len.min(NONCE_MAX_LEN);
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Current unix time in seconds.
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
