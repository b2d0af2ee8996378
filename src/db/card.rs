//! Prepaid card repository: CRUD, recharges and balance bookkeeping.

use chrono::Local;
use sea_orm::*;

use crate::entities::{card_recharges, cards, prelude::*};
use crate::error::{AppError, Result};
use crate::models::card::{CreateCard, CreateRecharge, UpdateCard};
use crate::models::round_cents;

/// List all cards ordered by number.
pub async fn list_all(db: &DatabaseConnection) -> std::result::Result<Vec<cards::Model>, DbErr> {
    Cards::find().order_by_asc(cards::Column::CardNumber).all(db).await
}

/// List only active cards.
pub async fn list_active(db: &DatabaseConnection) -> std::result::Result<Vec<cards::Model>, DbErr> {
    Cards::find()
        .filter(cards::Column::IsActive.eq(true))
        .order_by_asc(cards::Column::CardNumber)
        .all(db)
        .await
}

/// Get card by ID.
pub async fn get_by_id(db: &DatabaseConnection, id: i32) -> std::result::Result<Option<cards::Model>, DbErr> {
    Cards::find_by_id(id).one(db).await
}

/// Register a new card with a zero balance.
pub async fn create(db: &DatabaseConnection, data: CreateCard) -> std::result::Result<cards::Model, DbErr> {
    let model = cards::ActiveModel {
        card_number: Set(data.card_number.trim().to_string()),
        description: Set(data.description.filter(|d| !d.trim().is_empty())),
        account_id: Set(data.account_id),
        balance: Set(0.0),
        is_active: Set(true),
        ..Default::default()
    };
    model.insert(db).await
}

/// Update card details. The balance only changes through recharges and diets.
pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    data: UpdateCard,
) -> std::result::Result<Option<cards::Model>, DbErr> {
    let existing = Cards::find_by_id(id).one(db).await?;

    match existing {
        Some(model) => {
            let mut active: cards::ActiveModel = model.into();

            if let Some(card_number) = data.card_number {
                active.card_number = Set(card_number.trim().to_string());
            }
            if let Some(description) = data.description {
                active.description = Set(description.filter(|d| !d.trim().is_empty()));
            }
            if let Some(account_id) = data.account_id {
                active.account_id = Set(account_id);
            }
            if let Some(is_active) = data.is_active {
                active.is_active = Set(is_active);
            }

            let updated = active.update(db).await?;
            Ok(Some(updated))
        }
        None => Ok(None),
    }
}

/// Delete a card by ID.
///
/// Fails with a constraint error while diets or recharges reference it.
pub async fn delete(db: &DatabaseConnection, id: i32) -> std::result::Result<bool, DbErr> {
    let result = Cards::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// Check if a card number is already registered.
pub async fn number_exists(
    db: &DatabaseConnection,
    card_number: &str,
    exclude_id: Option<i32>,
) -> std::result::Result<bool, DbErr> {
    let mut query = Cards::find().filter(cards::Column::CardNumber.eq(card_number.trim()));

    if let Some(id) = exclude_id {
        query = query.filter(cards::Column::Id.ne(id));
    }

    let count = query.count(db).await?;
    Ok(count > 0)
}

/// Add `delta` to a card balance, refusing to go below zero.
pub(crate) async fn adjust_balance<C: ConnectionTrait>(db: &C, card_id: i32, delta: f64) -> Result<cards::Model> {
    let card = Cards::find_by_id(card_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Card {card_id}")))?;

    let new_balance = round_cents(card.balance + delta);
    if new_balance < 0.0 {
        return Err(AppError::validation(format!(
            "Card {} has insufficient balance ({:.2} available, {:.2} required)",
            card.card_number, card.balance, -delta
        )));
    }

    let mut active: cards::ActiveModel = card.into();
    active.balance = Set(new_balance);
    Ok(active.update(db).await?)
}

/// Load money onto an active card.
pub async fn recharge(db: &DatabaseConnection, data: CreateRecharge) -> Result<card_recharges::Model> {
    if !data.amount.is_finite() || data.amount <= 0.0 {
        return Err(AppError::validation("Recharge amount must be greater than 0"));
    }

    let txn = db.begin().await?;

    let card = Cards::find_by_id(data.card_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Card {}", data.card_id)))?;
    if !card.is_active {
        return Err(AppError::validation(format!("Card {} is inactive", card.card_number)));
    }

    let amount = round_cents(data.amount);
    adjust_balance(&txn, card.id, amount).await?;

    let recharge = card_recharges::ActiveModel {
        card_id: Set(card.id),
        amount: Set(amount),
        recharge_date: Set(data.recharge_date),
        notes: Set(data.notes.filter(|n| !n.trim().is_empty())),
        created_at: Set(Local::now().naive_local()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    tracing::info!("Recharged card {} with {:.2}", card.card_number, amount);
    Ok(recharge)
}

/// Undo a recharge, provided the card still holds the recharged money.
pub async fn delete_recharge(db: &DatabaseConnection, recharge_id: i32) -> Result<()> {
    let txn = db.begin().await?;

    let recharge = CardRecharges::find_by_id(recharge_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Recharge {recharge_id}")))?;

    adjust_balance(&txn, recharge.card_id, -recharge.amount).await?;
    CardRecharges::delete_by_id(recharge.id).exec(&txn).await?;

    txn.commit().await?;
    Ok(())
}

/// List recharges of one card, newest first.
pub async fn list_recharges(
    db: &DatabaseConnection,
    card_id: i32,
) -> std::result::Result<Vec<card_recharges::Model>, DbErr> {
    CardRecharges::find()
        .filter(card_recharges::Column::CardId.eq(card_id))
        .order_by_desc(card_recharges::Column::RechargeDate)
        .order_by_desc(card_recharges::Column::Id)
        .all(db)
        .await
}

/// List all recharges dated within a range.
pub async fn list_recharges_in_range(
    db: &DatabaseConnection,
    start_date: chrono::NaiveDate,
    end_date: chrono::NaiveDate,
) -> std::result::Result<Vec<card_recharges::Model>, DbErr> {
    CardRecharges::find()
        .filter(card_recharges::Column::RechargeDate.between(start_date, end_date))
        .order_by_asc(card_recharges::Column::RechargeDate)
        .order_by_asc(card_recharges::Column::Id)
        .all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{TestDb, date};

    #[tokio::test]
    async fn test_recharge_increases_balance() {
        let test = TestDb::new().await;
        let card_id = test.card("9225-0001").await;

        recharge(
            &test.db,
            CreateRecharge {
                card_id,
                amount: 150.0,
                recharge_date: date(2025, 2, 1),
                notes: None,
            },
        )
        .await
        .unwrap();
        recharge(
            &test.db,
            CreateRecharge {
                card_id,
                amount: 49.999,
                recharge_date: date(2025, 2, 3),
                notes: Some("top-up".to_string()),
            },
        )
        .await
        .unwrap();

        let card = get_by_id(&test.db, card_id).await.unwrap().unwrap();
        assert_eq!(card.balance, 200.0);

        let history = list_recharges(&test.db, card_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].recharge_date, date(2025, 2, 3));

        let in_range = list_recharges_in_range(&test.db, date(2025, 2, 2), date(2025, 2, 28))
            .await
            .unwrap();
        assert_eq!(in_range.len(), 1);
    }

    #[tokio::test]
    async fn test_recharge_rejects_bad_amount_and_inactive_card() {
        let test = TestDb::new().await;
        let card_id = test.card("9225-0002").await;

        let zero = recharge(
            &test.db,
            CreateRecharge {
                card_id,
                amount: 0.0,
                recharge_date: date(2025, 2, 1),
                notes: None,
            },
        )
        .await;
        assert!(matches!(zero, Err(AppError::Validation(_))));

        update(
            &test.db,
            card_id,
            UpdateCard {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let inactive = recharge(
            &test.db,
            CreateRecharge {
                card_id,
                amount: 10.0,
                recharge_date: date(2025, 2, 1),
                notes: None,
            },
        )
        .await;
        assert!(matches!(inactive, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_recharge_reverts_balance() {
        let test = TestDb::new().await;
        let card_id = test.card("9225-0003").await;
        let r = recharge(
            &test.db,
            CreateRecharge {
                card_id,
                amount: 80.0,
                recharge_date: date(2025, 2, 1),
                notes: None,
            },
        )
        .await
        .unwrap();

        delete_recharge(&test.db, r.id).await.unwrap();
        let card = get_by_id(&test.db, card_id).await.unwrap().unwrap();
        assert_eq!(card.balance, 0.0);
        assert!(list_recharges(&test.db, card_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_balance_cannot_go_negative() {
        let test = TestDb::new().await;
        let card_id = test.card("9225-0004").await;

        let result = adjust_balance(&test.db, card_id, -0.01).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
