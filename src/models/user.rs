//! Users allowed to sign in.

use serde::{Deserialize, Serialize};

use crate::db::Record;

/// Name of the users collection.
pub const USERS: &str = "users";

/// An allow-listed operator. Created out of band, looked up by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Record for User {
    fn id(&self) -> &str {
        &self.id
    }
}
