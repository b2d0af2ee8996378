//! Liquidation repository: closing diets against actual spending.

use chrono::{Local, NaiveDate};
use sea_orm::*;

use super::card::adjust_balance;
use super::diet::ensure_status;
use crate::entities::{diets, liquidations, prelude::*};
use crate::error::{AppError, Result};
use crate::models::diet::DietStatus;
use crate::models::liquidation::{CreateLiquidation, Settlement};
use crate::models::round_cents;

/// List all liquidations, newest first.
pub async fn list_all(db: &DatabaseConnection) -> std::result::Result<Vec<liquidations::Model>, DbErr> {
    Liquidations::find()
        .order_by_desc(liquidations::Column::LiquidationDate)
        .order_by_desc(liquidations::Column::Id)
        .all(db)
        .await
}

/// List liquidations dated within a range.
pub async fn list_in_range(
    db: &DatabaseConnection,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> std::result::Result<Vec<liquidations::Model>, DbErr> {
    Liquidations::find()
        .filter(liquidations::Column::LiquidationDate.between(start_date, end_date))
        .order_by_asc(liquidations::Column::LiquidationDate)
        .order_by_asc(liquidations::Column::Id)
        .all(db)
        .await
}

/// Get the liquidation of a diet, if any.
pub async fn get_by_diet(
    db: &DatabaseConnection,
    diet_id: i32,
) -> std::result::Result<Option<liquidations::Model>, DbErr> {
    Liquidations::find()
        .filter(liquidations::Column::DietId.eq(diet_id))
        .one(db)
        .await
}

/// Liquidate a pending diet.
///
/// Unspent money on a card-paid diet goes back to the card.
pub async fn create(db: &DatabaseConnection, data: CreateLiquidation) -> Result<liquidations::Model> {
    if !data.amount_spent.is_finite() || data.amount_spent < 0.0 {
        return Err(AppError::validation("Amount spent cannot be negative"));
    }

    let txn = db.begin().await?;

    let diet = Diets::find_by_id(data.diet_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Diet {}", data.diet_id)))?;
    ensure_status(&diet, DietStatus::Pending, "liquidated")?;
    if data.liquidation_date < diet.start_date {
        return Err(AppError::validation("Liquidation date cannot precede the trip start"));
    }

    let spent = round_cents(data.amount_spent);
    let settlement = Settlement::compute(diet.amount, spent);

    if let Some(card_id) = diet.card_id
        && settlement.returned > 0.0
    {
        adjust_balance(&txn, card_id, settlement.returned).await?;
    }

    let liquidation = liquidations::ActiveModel {
        diet_id: Set(diet.id),
        liquidation_date: Set(data.liquidation_date),
        amount_spent: Set(spent),
        amount_returned: Set(settlement.returned),
        amount_reimbursed: Set(settlement.reimbursed),
        notes: Set(data.notes.filter(|n| !n.trim().is_empty())),
        created_at: Set(Local::now().naive_local()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let number = diet.number.clone();
    let mut active: diets::ActiveModel = diet.into();
    active.status = Set(DietStatus::Liquidated.as_str().to_string());
    active.update(&txn).await?;

    txn.commit().await?;
    tracing::info!(
        "Liquidated diet {}: spent {:.2}, returned {:.2}, reimbursed {:.2}",
        number,
        spent,
        settlement.returned,
        settlement.reimbursed
    );
    Ok(liquidation)
}

/// Delete a liquidation, reopening its diet.
pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool> {
    let txn = db.begin().await?;

    let Some(liquidation) = Liquidations::find_by_id(id).one(&txn).await? else {
        return Ok(false);
    };
    let diet = Diets::find_by_id(liquidation.diet_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Diet {}", liquidation.diet_id)))?;

    if let Some(card_id) = diet.card_id
        && liquidation.amount_returned > 0.0
    {
        adjust_balance(&txn, card_id, -liquidation.amount_returned).await?;
    }

    Liquidations::delete_by_id(liquidation.id).exec(&txn).await?;

    let mut active: diets::ActiveModel = diet.into();
    active.status = Set(DietStatus::Pending.as_str().to_string());
    active.update(&txn).await?;

    txn.commit().await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{TestDb, date, diet_request};
    use crate::db::{card, diet};

    fn liquidation(diet_id: i32, spent: f64) -> CreateLiquidation {
        CreateLiquidation {
            diet_id,
            liquidation_date: date(2025, 3, 12),
            amount_spent: spent,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_cash_liquidation_marks_diet() {
        let test = TestDb::new().await;
        let dept = test.department("ADM").await;
        let requester = test.requester(dept, "80010100010").await;
        let d = diet::create(&test.db, &test.rates, diet_request(requester, None)).await.unwrap();

        let liq = create(&test.db, liquidation(d.id, 75.5)).await.unwrap();
        assert_eq!(liq.amount_returned, 0.0);
        assert_eq!(liq.amount_reimbursed, 15.5);

        let d = diet::get_by_id(&test.db, d.id).await.unwrap().unwrap();
        assert_eq!(d.status, "liquidated");
        assert!(get_by_diet(&test.db, d.id).await.unwrap().is_some());

        // A liquidated diet cannot be liquidated again, cancelled, or deleted
        assert!(create(&test.db, liquidation(d.id, 10.0)).await.is_err());
        assert!(diet::cancel(&test.db, d.id).await.is_err());
        assert!(diet::delete(&test.db, d.id).await.is_err());
    }

    #[tokio::test]
    async fn test_card_liquidation_returns_unspent() {
        let test = TestDb::new().await;
        let dept = test.department("ADM").await;
        let requester = test.requester(dept, "80010100011").await;
        let card_id = test.card_with_balance("9225-2000", 100.0).await;
        let d = diet::create(&test.db, &test.rates, diet_request(requester, Some(card_id)))
            .await
            .unwrap();

        let liq = create(&test.db, liquidation(d.id, 42.0)).await.unwrap();
        assert_eq!(liq.amount_returned, 18.0);

        let balance = card::get_by_id(&test.db, card_id).await.unwrap().unwrap().balance;
        assert_eq!(balance, 58.0);

        assert!(delete(&test.db, liq.id).await.unwrap());
        let balance = card::get_by_id(&test.db, card_id).await.unwrap().unwrap().balance;
        assert_eq!(balance, 40.0);
        let d = diet::get_by_id(&test.db, d.id).await.unwrap().unwrap();
        assert_eq!(d.status, "pending");
    }

    #[tokio::test]
    async fn test_liquidation_validations() {
        let test = TestDb::new().await;
        let dept = test.department("ADM").await;
        let requester = test.requester(dept, "80010100012").await;
        let d = diet::create(&test.db, &test.rates, diet_request(requester, None)).await.unwrap();

        assert!(create(&test.db, liquidation(d.id, -1.0)).await.is_err());

        let mut early = liquidation(d.id, 10.0);
        early.liquidation_date = date(2025, 3, 1);
        assert!(create(&test.db, early).await.is_err());

        assert!(matches!(
            create(&test.db, liquidation(9999, 10.0)).await,
            Err(AppError::NotFound(_))
        ));
        assert!(list_all(&test.db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_in_range() {
        let test = TestDb::new().await;
        let dept = test.department("ADM").await;
        let requester = test.requester(dept, "80010100013").await;
        let d = diet::create(&test.db, &test.rates, diet_request(requester, None)).await.unwrap();
        create(&test.db, liquidation(d.id, 60.0)).await.unwrap();

        assert_eq!(
            list_in_range(&test.db, date(2025, 3, 1), date(2025, 3, 31))
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(list_in_range(&test.db, date(2025, 4, 1), date(2025, 4, 30))
            .await
            .unwrap()
            .is_empty());
    }
}
