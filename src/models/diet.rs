//! Diet (per-diem request) DTOs, status values and amount computation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::round_cents;
use crate::config::RateConfig;

/// Lifecycle status stored in `diets.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DietStatus {
    Pending,
    Liquidated,
    Cancelled,
}

impl DietStatus {
    pub const ALL: [DietStatus; 3] = [DietStatus::Pending, DietStatus::Liquidated, DietStatus::Cancelled];

    /// Value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            DietStatus::Pending => "pending",
            DietStatus::Liquidated => "liquidated",
            DietStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a stored value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(DietStatus::Pending),
            "liquidated" => Some(DietStatus::Liquidated),
            "cancelled" => Some(DietStatus::Cancelled),
            _ => None,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            DietStatus::Pending => "Pending",
            DietStatus::Liquidated => "Liquidated",
            DietStatus::Cancelled => "Cancelled",
        }
    }
}

/// How the advance was handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
        }
    }
}

/// Meals and nights covered by a diet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealCounts {
    pub breakfasts: i32,
    pub lunches: i32,
    pub dinners: i32,
    pub lodging_nights: i32,
}

impl MealCounts {
    /// Advance owed for these counts at the given rates, rounded to cents.
    pub fn amount(&self, rates: &RateConfig) -> f64 {
        round_cents(
            self.breakfasts as f64 * rates.breakfast
                + self.lunches as f64 * rates.lunch
                + self.dinners as f64 * rates.dinner
                + self.lodging_nights as f64 * rates.lodging,
        )
    }

    /// Check counts are non-negative and fit the trip length.
    pub fn validate(&self, start_date: NaiveDate, end_date: NaiveDate) -> Result<(), String> {
        if self.breakfasts < 0 || self.lunches < 0 || self.dinners < 0 || self.lodging_nights < 0 {
            return Err("Meal and lodging counts cannot be negative".to_string());
        }
        if end_date < start_date {
            return Err("End date cannot be before start date".to_string());
        }

        let days = (end_date - start_date).num_days() as i32 + 1;
        if self.breakfasts > days || self.lunches > days || self.dinners > days {
            return Err(format!("Meal counts cannot exceed the {days} day(s) of the trip"));
        }
        if self.lodging_nights > days - 1 {
            return Err(format!("Lodging cannot exceed {} night(s)", days - 1));
        }
        Ok(())
    }
}

/// DTO for requesting a diet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDiet {
    pub requester_id: i32,
    pub account_id: Option<i32>,
    pub card_id: Option<i32>,
    pub destination: String,
    pub purpose: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub meals: MealCounts,
    pub payment_method: PaymentMethod,
}

/// DTO for editing the descriptive fields of a pending diet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDiet {
    pub destination: Option<String>,
    pub purpose: Option<String>,
    pub account_id: Option<Option<i32>>,
}

/// Format a sequence value as a diet number.
pub fn format_number(sequence: i32) -> String {
    format!("D-{sequence:06}")
}

/// Parse the sequence value out of a diet number.
pub fn parse_number(number: &str) -> Option<i32> {
    number.strip_prefix("D-")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_amount_uses_rates() {
        let rates = RateConfig {
            breakfast: 2.5,
            lunch: 7.25,
            dinner: 7.25,
            lodging: 30.0,
        };
        let meals = MealCounts {
            breakfasts: 2,
            lunches: 3,
            dinners: 2,
            lodging_nights: 2,
        };
        assert_eq!(meals.amount(&rates), 5.0 + 21.75 + 14.5 + 60.0);
    }

    #[test]
    fn test_validate_counts_against_trip_length() {
        let meals = MealCounts {
            breakfasts: 3,
            lunches: 3,
            dinners: 3,
            lodging_nights: 2,
        };
        assert!(meals.validate(date(2025, 3, 1), date(2025, 3, 3)).is_ok());
        assert!(meals.validate(date(2025, 3, 1), date(2025, 3, 2)).is_err());
        assert!(meals.validate(date(2025, 3, 3), date(2025, 3, 1)).is_err());

        let negative = MealCounts {
            lunches: -1,
            ..Default::default()
        };
        assert!(negative.validate(date(2025, 3, 1), date(2025, 3, 1)).is_err());
    }

    #[test]
    fn test_single_day_trip_has_no_lodging() {
        let meals = MealCounts {
            lunches: 1,
            lodging_nights: 1,
            ..Default::default()
        };
        assert!(meals.validate(date(2025, 3, 1), date(2025, 3, 1)).is_err());
    }

    #[test]
    fn test_number_format() {
        assert_eq!(format_number(42), "D-000042");
        assert_eq!(parse_number("D-000042"), Some(42));
        assert_eq!(parse_number("X-1"), None);
    }

    #[test]
    fn test_status_values() {
        for status in DietStatus::ALL {
            assert_eq!(DietStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DietStatus::parse("archived"), None);
        assert_eq!(PaymentMethod::parse("card"), Some(PaymentMethod::Card));
    }
}
