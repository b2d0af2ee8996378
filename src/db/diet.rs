//! Diet repository: per-diem requests and their card bookkeeping.

use chrono::{Local, NaiveDate};
use sea_orm::*;

use super::card::adjust_balance;
use crate::config::RateConfig;
use crate::entities::{diets, prelude::*};
use crate::error::{AppError, Result};
use crate::models::diet::{CreateDiet, DietStatus, PaymentMethod, UpdateDiet, format_number, parse_number};

/// List all diets, newest first.
pub async fn list_all(db: &DatabaseConnection) -> std::result::Result<Vec<diets::Model>, DbErr> {
    Diets::find().order_by_desc(diets::Column::Id).all(db).await
}

/// List diets in a given status, oldest trip first.
pub async fn list_by_status(
    db: &DatabaseConnection,
    status: DietStatus,
) -> std::result::Result<Vec<diets::Model>, DbErr> {
    Diets::find()
        .filter(diets::Column::Status.eq(status.as_str()))
        .order_by_asc(diets::Column::StartDate)
        .order_by_asc(diets::Column::Id)
        .all(db)
        .await
}

/// List diets whose trip starts within a date range, optionally for one department.
pub async fn list_in_range(
    db: &DatabaseConnection,
    start_date: NaiveDate,
    end_date: NaiveDate,
    department_id: Option<i32>,
) -> std::result::Result<Vec<diets::Model>, DbErr> {
    let mut query = Diets::find().filter(diets::Column::StartDate.between(start_date, end_date));

    if let Some(id) = department_id {
        query = query.filter(diets::Column::DepartmentId.eq(id));
    }

    query
        .order_by_asc(diets::Column::StartDate)
        .order_by_asc(diets::Column::Id)
        .all(db)
        .await
}

/// Get diet by ID.
pub async fn get_by_id(db: &DatabaseConnection, id: i32) -> std::result::Result<Option<diets::Model>, DbErr> {
    Diets::find_by_id(id).one(db).await
}

/// Next sequential diet number.
pub async fn next_number<C: ConnectionTrait>(db: &C) -> std::result::Result<String, DbErr> {
    let last = Diets::find().order_by_desc(diets::Column::Id).one(db).await?;
    let sequence = last.and_then(|d| parse_number(&d.number)).unwrap_or(0) + 1;
    Ok(format_number(sequence))
}

/// Request a diet. Card-paid diets debit the card in the same transaction.
pub async fn create(db: &DatabaseConnection, rates: &RateConfig, data: CreateDiet) -> Result<diets::Model> {
    if data.destination.trim().is_empty() {
        return Err(AppError::validation("Destination is required"));
    }
    data.meals
        .validate(data.start_date, data.end_date)
        .map_err(AppError::validation)?;

    let amount = data.meals.amount(rates);
    if amount <= 0.0 {
        return Err(AppError::validation("The diet amount must be greater than 0"));
    }

    let txn = db.begin().await?;

    let requester = Requesters::find_by_id(data.requester_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Requester {}", data.requester_id)))?;
    if !requester.is_active {
        return Err(AppError::validation(format!("Requester {} is inactive", requester.full_name)));
    }

    let card_id = match data.payment_method {
        PaymentMethod::Card => {
            let card_id = data
                .card_id
                .ok_or_else(|| AppError::validation("A card is required for card payments"))?;
            let card = Cards::find_by_id(card_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Card {card_id}")))?;
            if !card.is_active {
                return Err(AppError::validation(format!("Card {} is inactive", card.card_number)));
            }
            adjust_balance(&txn, card_id, -amount).await?;
            Some(card_id)
        }
        PaymentMethod::Cash => None,
    };

    let number = next_number(&txn).await?;
    let model = diets::ActiveModel {
        number: Set(number),
        requester_id: Set(requester.id),
        department_id: Set(requester.department_id),
        account_id: Set(data.account_id),
        card_id: Set(card_id),
        destination: Set(data.destination.trim().to_string()),
        purpose: Set(data.purpose.trim().to_string()),
        start_date: Set(data.start_date),
        end_date: Set(data.end_date),
        breakfasts: Set(data.meals.breakfasts),
        lunches: Set(data.meals.lunches),
        dinners: Set(data.meals.dinners),
        lodging_nights: Set(data.meals.lodging_nights),
        amount: Set(amount),
        payment_method: Set(data.payment_method.as_str().to_string()),
        status: Set(DietStatus::Pending.as_str().to_string()),
        created_at: Set(Local::now().naive_local()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    tracing::info!("Created diet {} for {:.2}", model.number, model.amount);
    Ok(model)
}

/// Edit the descriptive fields of a pending diet.
pub async fn update(db: &DatabaseConnection, id: i32, data: UpdateDiet) -> Result<Option<diets::Model>> {
    let Some(existing) = Diets::find_by_id(id).one(db).await? else {
        return Ok(None);
    };
    ensure_status(&existing, DietStatus::Pending, "edited")?;

    let mut active: diets::ActiveModel = existing.into();
    if let Some(destination) = data.destination {
        if destination.trim().is_empty() {
            return Err(AppError::validation("Destination is required"));
        }
        active.destination = Set(destination.trim().to_string());
    }
    if let Some(purpose) = data.purpose {
        active.purpose = Set(purpose.trim().to_string());
    }
    if let Some(account_id) = data.account_id {
        active.account_id = Set(account_id);
    }

    Ok(Some(active.update(db).await?))
}

/// Cancel a pending diet, refunding a card-paid advance.
pub async fn cancel(db: &DatabaseConnection, id: i32) -> Result<diets::Model> {
    let txn = db.begin().await?;

    let diet = Diets::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Diet {id}")))?;
    ensure_status(&diet, DietStatus::Pending, "cancelled")?;

    if let Some(card_id) = diet.card_id {
        adjust_balance(&txn, card_id, diet.amount).await?;
    }

    let mut active: diets::ActiveModel = diet.into();
    active.status = Set(DietStatus::Cancelled.as_str().to_string());
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    tracing::info!("Cancelled diet {}", updated.number);
    Ok(updated)
}

/// Delete a diet that was never liquidated.
pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool> {
    let txn = db.begin().await?;

    let Some(diet) = Diets::find_by_id(id).one(&txn).await? else {
        return Ok(false);
    };
    let status = DietStatus::parse(&diet.status);
    if status == Some(DietStatus::Liquidated) {
        return Err(AppError::validation(format!(
            "Diet {} is liquidated; delete its liquidation first",
            diet.number
        )));
    }

    if status == Some(DietStatus::Pending)
        && let Some(card_id) = diet.card_id
    {
        adjust_balance(&txn, card_id, diet.amount).await?;
    }

    let result = Diets::delete_by_id(diet.id).exec(&txn).await?;
    txn.commit().await?;
    Ok(result.rows_affected > 0)
}

/// Fail unless the diet is in the expected status.
pub(crate) fn ensure_status(diet: &diets::Model, expected: DietStatus, action: &str) -> Result<()> {
    if DietStatus::parse(&diet.status) == Some(expected) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Diet {} is {} and cannot be {action}",
            diet.number, diet.status
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::card;
    use crate::db::test_support::{TestDb, date, diet_request};

    #[tokio::test]
    async fn test_cash_diet_gets_sequential_numbers() {
        let test = TestDb::new().await;
        let dept = test.department("ADM").await;
        let requester = test.requester(dept, "80010100001").await;

        let first = create(&test.db, &test.rates, diet_request(requester, None)).await.unwrap();
        let second = create(&test.db, &test.rates, diet_request(requester, None)).await.unwrap();

        assert_eq!(first.number, "D-000001");
        assert_eq!(second.number, "D-000002");
        assert_eq!(first.department_id, dept);
        assert_eq!(first.status, "pending");
        assert_eq!(first.card_id, None);
        // 2 lunches, 1 dinner, 1 night at default rates
        assert_eq!(first.amount, 60.0);
    }

    #[tokio::test]
    async fn test_card_diet_debits_and_cancel_refunds() {
        let test = TestDb::new().await;
        let dept = test.department("ADM").await;
        let requester = test.requester(dept, "80010100002").await;
        let card_id = test.card_with_balance("9225-1000", 100.0).await;

        let diet = create(&test.db, &test.rates, diet_request(requester, Some(card_id)))
            .await
            .unwrap();
        let balance = card::get_by_id(&test.db, card_id).await.unwrap().unwrap().balance;
        assert_eq!(balance, 40.0);

        let cancelled = cancel(&test.db, diet.id).await.unwrap();
        assert_eq!(cancelled.status, "cancelled");
        let balance = card::get_by_id(&test.db, card_id).await.unwrap().unwrap().balance;
        assert_eq!(balance, 100.0);

        assert!(cancel(&test.db, diet.id).await.is_err());
    }

    #[tokio::test]
    async fn test_card_diet_requires_funds() {
        let test = TestDb::new().await;
        let dept = test.department("ADM").await;
        let requester = test.requester(dept, "80010100003").await;
        let card_id = test.card_with_balance("9225-1001", 59.99).await;

        let result = create(&test.db, &test.rates, diet_request(requester, Some(card_id))).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        // Nothing written when the transaction fails
        assert!(list_all(&test.db).await.unwrap().is_empty());
        let balance = card::get_by_id(&test.db, card_id).await.unwrap().unwrap().balance;
        assert_eq!(balance, 59.99);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let test = TestDb::new().await;
        let dept = test.department("ADM").await;
        let requester = test.requester(dept, "80010100004").await;

        let mut no_destination = diet_request(requester, None);
        no_destination.destination = " ".to_string();
        assert!(create(&test.db, &test.rates, no_destination).await.is_err());

        let mut reversed = diet_request(requester, None);
        reversed.end_date = date(2025, 1, 1);
        assert!(create(&test.db, &test.rates, reversed).await.is_err());

        let mut card_without_id = diet_request(requester, None);
        card_without_id.payment_method = PaymentMethod::Card;
        assert!(create(&test.db, &test.rates, card_without_id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_pending_card_diet_refunds() {
        let test = TestDb::new().await;
        let dept = test.department("ADM").await;
        let requester = test.requester(dept, "80010100005").await;
        let card_id = test.card_with_balance("9225-1002", 60.0).await;

        let diet = create(&test.db, &test.rates, diet_request(requester, Some(card_id)))
            .await
            .unwrap();
        assert!(delete(&test.db, diet.id).await.unwrap());

        let balance = card::get_by_id(&test.db, card_id).await.unwrap().unwrap().balance;
        assert_eq!(balance, 60.0);
        assert!(!delete(&test.db, diet.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_and_filters() {
        let test = TestDb::new().await;
        let dept = test.department("ADM").await;
        let requester = test.requester(dept, "80010100006").await;
        let diet = create(&test.db, &test.rates, diet_request(requester, None)).await.unwrap();

        let updated = update(
            &test.db,
            diet.id,
            UpdateDiet {
                destination: Some("Santiago".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.destination, "Santiago");

        assert_eq!(list_by_status(&test.db, DietStatus::Pending).await.unwrap().len(), 1);
        assert!(list_by_status(&test.db, DietStatus::Cancelled).await.unwrap().is_empty());

        let in_march = list_in_range(&test.db, date(2025, 3, 1), date(2025, 3, 31), Some(dept))
            .await
            .unwrap();
        assert_eq!(in_march.len(), 1);
        let other_dept = list_in_range(&test.db, date(2025, 3, 1), date(2025, 3, 31), Some(dept + 1))
            .await
            .unwrap();
        assert!(other_dept.is_empty());
    }
}
