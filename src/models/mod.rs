//! Data models for master data, diets, liquidations and cards.

pub mod account;
pub mod card;
pub mod department;
pub mod diet;
pub mod liquidation;
pub mod requester;
pub mod user;

pub use account::{CreateAccount, UpdateAccount};
pub use card::{CreateCard, CreateRecharge, UpdateCard};
pub use department::{CreateDepartment, UpdateDepartment};
pub use diet::{CreateDiet, DietStatus, MealCounts, PaymentMethod, UpdateDiet};
pub use liquidation::{CreateLiquidation, Settlement};
pub use requester::{CreateRequester, UpdateRequester};
pub use user::{CreateUser, Role, UpdateUser};

/// Round a money amount to cents.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round_cents;

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(10.006), 10.01);
        assert_eq!(round_cents(0.1 + 0.2), 0.3);
        assert_eq!(round_cents(-2.344), -2.34);
    }
}
