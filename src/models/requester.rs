//! Requester DTOs for create and update operations.

use serde::{Deserialize, Serialize};

/// DTO for creating a requester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequester {
    pub full_name: String,
    pub identity_number: String,
    pub position: Option<String>,
    pub department_id: i32,
}

/// DTO for updating a requester.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRequester {
    pub full_name: Option<String>,
    pub identity_number: Option<String>,
    pub position: Option<Option<String>>,
    pub department_id: Option<i32>,
    pub is_active: Option<bool>,
}
