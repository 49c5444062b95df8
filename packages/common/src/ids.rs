//! Id, seed and timestamp generation.
//!
//! Element and cell ids are opaque strings; collaborators (renderers,
//! edit orchestrators) treat them as tokens and never parse them, so a
//! UUID is fine even where the original tooling used shorter ids.

use rand::Rng;
use uuid::Uuid;

/// Generate a fresh element/cell id.
pub fn fresh_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Generate a random seed for hand-drawn rendering jitter.
pub fn fresh_seed() -> u64 {
    rand::thread_rng().gen_range(1..=u32::MAX as u64)
}

/// Generate a version nonce. Renderers use this to break ties between
/// concurrent updates of the same element version.
pub fn fresh_nonce() -> u64 {
    rand::thread_rng().gen_range(1..=u32::MAX as u64)
}

/// Current wall-clock time in milliseconds since the epoch.
pub fn timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
