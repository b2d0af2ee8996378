//! Accounting account DTOs.

use serde::{Deserialize, Serialize};

/// DTO for creating an accounting account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccount {
    pub code: String,
    pub name: String,
}

/// DTO for updating an accounting account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAccount {
    pub code: Option<String>,
    pub name: Option<String>,
    pub is_active: Option<bool>,
}
