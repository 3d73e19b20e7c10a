//! Authentication schemes
//!
//! The server validates the plain form fields of every request; the client
//! contributes the matching key/value pairs to every form it sends.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field carrying an API key
pub const API_KEY_FIELD: &str = "api_key";

/// Field carrying a user name
pub const USER_FIELD: &str = "user";

/// Field carrying a password
pub const PASSWORD_FIELD: &str = "password";

/// Server-side authentication scheme
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum Authentication {
    /// Accept every request
    #[default]
    None,

    /// `api_key` field must match one of the keys
    ApiKey {
        /// Accepted keys
        keys: Vec<String>,
    },

    /// `user` and `password` fields must match a configured pair
    Basic {
        /// user -> password
        users: HashMap<String, String>,
    },
}

impl Authentication {
    /// Whether this is the no-op scheme
    pub fn is_noop(&self) -> bool {
        matches!(self, Authentication::None)
    }

    /// Validate the request fields
    pub fn authenticate(&self, fields: &HashMap<String, String>) -> Result<()> {
        match self {
            Authentication::None => Ok(()),
            Authentication::ApiKey { keys } => match fields.get(API_KEY_FIELD) {
                None => Err(Error::Authentication("No API key provided!".to_string())),
                Some(key) if keys.iter().any(|k| k == key) => Ok(()),
                Some(_) => Err(Error::Authentication("Invalid API key!".to_string())),
            },
            Authentication::Basic { users } => {
                let user = fields
                    .get(USER_FIELD)
                    .ok_or_else(|| Error::Authentication("No user provided!".to_string()))?;
                let password = fields
                    .get(PASSWORD_FIELD)
                    .ok_or_else(|| Error::Authentication("No password provided!".to_string()))?;

                match users.get(user) {
                    Some(expected) if expected == password => Ok(()),
                    _ => Err(Error::Authentication(format!(
                        "Invalid credentials for user '{}'!",
                        user
                    ))),
                }
            }
        }
    }
}

/// Client-side authentication, produces the form fields to send
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum ClientAuthentication {
    /// Send nothing
    #[default]
    None,

    /// Send an API key
    ApiKey {
        /// Key
        key: String,
    },

    /// Send user and password
    Basic {
        /// User name
        user: String,
        /// Password
        password: String,
    },
}

impl ClientAuthentication {
    /// Key/value pairs to add to each request form
    pub fn fields(&self) -> Vec<(String, String)> {
        match self {
            ClientAuthentication::None => Vec::new(),
            ClientAuthentication::ApiKey { key } => {
                vec![(API_KEY_FIELD.to_string(), key.clone())]
            }
            ClientAuthentication::Basic { user, password } => vec![
                (USER_FIELD.to_string(), user.clone()),
                (PASSWORD_FIELD.to_string(), password.clone()),
            ],
        }
    }
}
