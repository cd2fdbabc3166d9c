//! Random tokens: project access keys and OAuth state values.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::models::AccessKey;

/// Access keys carry 256 bits from the OS CSPRNG.
pub const ACCESS_KEY_BYTES: usize = 32;

const OAUTH_STATE_BYTES: usize = 16;

fn random_hex(len: usize) -> String {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

pub fn generate_access_key() -> AccessKey {
    AccessKey::new(random_hex(ACCESS_KEY_BYTES))
}

/// CSRF state for the identity provider round trip.
pub fn generate_oauth_state() -> String {
    random_hex(OAUTH_STATE_BYTES)
}
