//! Caller identity as resolved by the surrounding authentication layer.

use serde::{Deserialize, Serialize};

/// Stable user identifier.
pub type UserId = i64;

/// Authenticated user.
///
/// Profile fields are carried for callers; the service only reads `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl User {
    /// Creates a user with empty profile data.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            name: String::new(),
            email: String::new(),
        }
    }
}
