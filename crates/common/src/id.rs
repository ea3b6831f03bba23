//! ID and token generation.

use ulid::Ulid;
use uuid::Uuid;

/// ID generator for users, polls, options and votes.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based row ID (26 lower-case characters).
    ///
    /// ULIDs sort by creation time, which keeps `ORDER BY id` close to
    /// insertion order.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate an opaque session token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        // No time component, unlike row IDs
        Uuid::new_v4().simple().to_string()
    }
}
