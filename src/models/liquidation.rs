//! Liquidation DTOs and settlement arithmetic.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::round_cents;

/// DTO for liquidating a pending diet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLiquidation {
    pub diet_id: i32,
    pub liquidation_date: NaiveDate,
    pub amount_spent: f64,
    pub notes: Option<String>,
}

/// How an advance is closed against actual spending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    /// Unspent advance handed back by the requester.
    pub returned: f64,
    /// Overspend owed to the requester.
    pub reimbursed: f64,
}

impl Settlement {
    /// Split the difference between the advance and the amount spent.
    pub fn compute(advance: f64, spent: f64) -> Self {
        let diff = round_cents(advance - spent);
        if diff >= 0.0 {
            Self {
                returned: diff,
                reimbursed: 0.0,
            }
        } else {
            Self {
                returned: 0.0,
                reimbursed: -diff,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underspend_is_returned() {
        let s = Settlement::compute(100.0, 80.5);
        assert_eq!(s.returned, 19.5);
        assert_eq!(s.reimbursed, 0.0);
    }

    #[test]
    fn test_overspend_is_reimbursed() {
        let s = Settlement::compute(100.0, 112.25);
        assert_eq!(s.returned, 0.0);
        assert_eq!(s.reimbursed, 12.25);
    }

    #[test]
    fn test_exact_spend() {
        let s = Settlement::compute(45.0, 45.0);
        assert_eq!(s, Settlement { returned: 0.0, reimbursed: 0.0 });
    }
}
