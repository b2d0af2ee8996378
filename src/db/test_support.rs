//! Shared fixtures for database tests.

use std::path::PathBuf;

use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use tempfile::TempDir;

use crate::config::RateConfig;
use crate::db;
use crate::models::card::{CreateCard, CreateRecharge};
use crate::models::department::CreateDepartment;
use crate::models::diet::{CreateDiet, MealCounts, PaymentMethod};
use crate::models::requester::CreateRequester;

/// A connected database in its own temporary directory.
pub struct TestDb {
    pub dir: TempDir,
    pub path: PathBuf,
    pub db: DatabaseConnection,
    pub rates: RateConfig,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dietas.db");
        let db = db::connect(&path).await.unwrap();
        Self {
            dir,
            path,
            db,
            rates: RateConfig::default(),
        }
    }

    pub async fn department(&self, code: &str) -> i32 {
        db::department::create(
            &self.db,
            CreateDepartment {
                code: code.to_string(),
                name: format!("Department {code}"),
            },
        )
        .await
        .unwrap()
        .id
    }

    pub async fn requester(&self, department_id: i32, identity_number: &str) -> i32 {
        db::requester::create(
            &self.db,
            CreateRequester {
                full_name: format!("Requester {identity_number}"),
                identity_number: identity_number.to_string(),
                position: None,
                department_id,
            },
        )
        .await
        .unwrap()
        .id
    }

    pub async fn card(&self, card_number: &str) -> i32 {
        db::card::create(
            &self.db,
            CreateCard {
                card_number: card_number.to_string(),
                description: None,
                account_id: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    pub async fn card_with_balance(&self, card_number: &str, balance: f64) -> i32 {
        let id = self.card(card_number).await;
        db::card::recharge(
            &self.db,
            CreateRecharge {
                card_id: id,
                amount: balance,
                recharge_date: date(2025, 1, 15),
                notes: None,
            },
        )
        .await
        .unwrap();
        id
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Two-day trip in March 2025: 2 lunches, 1 dinner, 1 night (60.00 at default rates).
pub fn diet_request(requester_id: i32, card_id: Option<i32>) -> CreateDiet {
    CreateDiet {
        requester_id,
        account_id: None,
        card_id,
        destination: "Havana".to_string(),
        purpose: "Audit".to_string(),
        start_date: date(2025, 3, 10),
        end_date: date(2025, 3, 11),
        meals: MealCounts {
            breakfasts: 0,
            lunches: 2,
            dinners: 1,
            lodging_nights: 1,
        },
        payment_method: if card_id.is_some() {
            PaymentMethod::Card
        } else {
            PaymentMethod::Cash
        },
    }
}
