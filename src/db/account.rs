//! Accounting account repository with CRUD operations.

use crate::entities::{accounts, prelude::*};
use crate::models::account::{CreateAccount, UpdateAccount};
use sea_orm::*;

/// List all accounts ordered by code.
pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<accounts::Model>, DbErr> {
    Accounts::find()
        .order_by_asc(accounts::Column::Code)
        .all(db)
        .await
}

/// List only active accounts.
pub async fn list_active(db: &DatabaseConnection) -> Result<Vec<accounts::Model>, DbErr> {
    Accounts::find()
        .filter(accounts::Column::IsActive.eq(true))
        .order_by_asc(accounts::Column::Code)
        .all(db)
        .await
}

/// Get account by ID.
pub async fn get_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<accounts::Model>, DbErr> {
    Accounts::find_by_id(id).one(db).await
}

/// Create a new account.
pub async fn create(db: &DatabaseConnection, data: CreateAccount) -> Result<accounts::Model, DbErr> {
    let model = accounts::ActiveModel {
        code: Set(data.code.trim().to_string()),
        name: Set(data.name.trim().to_string()),
        is_active: Set(true),
        ..Default::default()
    };
    model.insert(db).await
}

/// Update an existing account.
pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    data: UpdateAccount,
) -> Result<Option<accounts::Model>, DbErr> {
    let existing = Accounts::find_by_id(id).one(db).await?;

    match existing {
        Some(model) => {
            let mut active: accounts::ActiveModel = model.into();

            if let Some(code) = data.code {
                active.code = Set(code.trim().to_string());
            }
            if let Some(name) = data.name {
                active.name = Set(name.trim().to_string());
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

/// Delete a account by ID.
///
/// Fails with a constraint error while diets reference it.
pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool, DbErr> {
    let result = Accounts::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// Check if account code exists (for validation).
pub async fn code_exists(db: &DatabaseConnection, code: &str, exclude_id: Option<i32>) -> Result<bool, DbErr> {
    let mut query = Accounts::find().filter(accounts::Column::Code.eq(code.trim()));

    if let Some(id) = exclude_id {
        query = query.filter(accounts::Column::Id.ne(id));
    }

    let count = query.count(db).await?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::TestDb;

    #[tokio::test]
    async fn test_accounts_ordered_by_code() {
        let test = TestDb::new().await;
        let db = &test.db;

        for (code, name) in [("731", "Travel expenses"), ("164", "Advances to staff")] {
            create(
                db,
                CreateAccount {
                    code: code.to_string(),
                    name: name.to_string(),
                },
            )
            .await
            .unwrap();
        }

        let codes: Vec<_> = list_all(db).await.unwrap().into_iter().map(|a| a.code).collect();
        assert_eq!(codes, vec!["164", "731"]);
        assert!(code_exists(db, " 731", None).await.unwrap());
    }
}
