//! Prepaid card and recharge DTOs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// DTO for registering a prepaid card. Cards start with a zero balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCard {
    pub card_number: String,
    pub description: Option<String>,
    pub account_id: Option<i32>,
}

/// DTO for updating a card.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCard {
    pub card_number: Option<String>,
    pub description: Option<Option<String>>,
    pub account_id: Option<Option<i32>>,
    pub is_active: Option<bool>,
}

/// DTO for loading money onto a card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecharge {
    pub card_id: i32,
    pub amount: f64,
    pub recharge_date: NaiveDate,
    pub notes: Option<String>,
}
