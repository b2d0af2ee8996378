//! User DTOs, roles and password hashing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Access level stored in `users.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Operator,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Admin, Role::Operator];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "operator" => Some(Role::Operator),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Operator => "Operator",
        }
    }
}

/// DTO for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
}

/// DTO for updating a user. A `password` replaces the stored hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

/// Hash a password, salted with the username.
pub fn hash_password(username: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare a password against a stored hash.
pub fn verify_password(username: &str, password: &str, stored_hash: &str) -> bool {
    hash_password(username, password) == stored_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = hash_password("admin", "secret");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_depends_on_username() {
        assert_ne!(hash_password("ana", "secret"), hash_password("luis", "secret"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("ana", "s3cret");
        assert!(verify_password("ana", "s3cret", &hash));
        assert!(!verify_password("ana", "wrong", &hash));
    }
}
