//! Requester repository with CRUD operations.

use crate::entities::{prelude::*, requesters};
use crate::models::requester::{CreateRequester, UpdateRequester};
use sea_orm::*;

/// List all requesters ordered by name.
pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<requesters::Model>, DbErr> {
    Requesters::find()
        .order_by_asc(requesters::Column::FullName)
        .all(db)
        .await
}

/// List only active requesters.
pub async fn list_active(db: &DatabaseConnection) -> Result<Vec<requesters::Model>, DbErr> {
    Requesters::find()
        .filter(requesters::Column::IsActive.eq(true))
        .order_by_asc(requesters::Column::FullName)
        .all(db)
        .await
}

/// List requesters belonging to a department.
pub async fn list_by_department(
    db: &DatabaseConnection,
    department_id: i32,
) -> Result<Vec<requesters::Model>, DbErr> {
    Requesters::find()
        .filter(requesters::Column::DepartmentId.eq(department_id))
        .order_by_asc(requesters::Column::FullName)
        .all(db)
        .await
}

/// Get requester by ID.
pub async fn get_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<requesters::Model>, DbErr> {
    Requesters::find_by_id(id).one(db).await
}

/// Create a new requester.
pub async fn create(db: &DatabaseConnection, data: CreateRequester) -> Result<requesters::Model, DbErr> {
    let model = requesters::ActiveModel {
        full_name: Set(data.full_name.trim().to_string()),
        identity_number: Set(data.identity_number.trim().to_string()),
        position: Set(data.position.filter(|p| !p.trim().is_empty())),
        department_id: Set(data.department_id),
        is_active: Set(true),
        ..Default::default()
    };
    model.insert(db).await
}

/// Update an existing requester.
pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    data: UpdateRequester,
) -> Result<Option<requesters::Model>, DbErr> {
    let existing = Requesters::find_by_id(id).one(db).await?;

    match existing {
        Some(model) => {
            let mut active: requesters::ActiveModel = model.into();

            if let Some(full_name) = data.full_name {
                active.full_name = Set(full_name.trim().to_string());
            }
            if let Some(identity_number) = data.identity_number {
                active.identity_number = Set(identity_number.trim().to_string());
            }
            if let Some(position) = data.position {
                active.position = Set(position.filter(|p| !p.trim().is_empty()));
            }
            if let Some(department_id) = data.department_id {
                active.department_id = Set(department_id);
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

/// Delete a requester by ID.
pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool, DbErr> {
    let result = Requesters::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// Check if an identity number is already registered.
pub async fn identity_exists(
    db: &DatabaseConnection,
    identity_number: &str,
    exclude_id: Option<i32>,
) -> Result<bool, DbErr> {
    let mut query = Requesters::find().filter(requesters::Column::IdentityNumber.eq(identity_number.trim()));

    if let Some(id) = exclude_id {
        query = query.filter(requesters::Column::Id.ne(id));
    }

    let count = query.count(db).await?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::TestDb;

    #[tokio::test]
    async fn test_requester_crud() {
        let test = TestDb::new().await;
        let db = &test.db;
        let dept_a = test.department("ADM").await;
        let dept_b = test.department("ECO").await;

        let requester = create(
            db,
            CreateRequester {
                full_name: "Maria Perez".to_string(),
                identity_number: "85020312345".to_string(),
                position: Some("  ".to_string()),
                department_id: dept_a,
            },
        )
        .await
        .unwrap();
        assert_eq!(requester.position, None);
        assert!(identity_exists(db, "85020312345", None).await.unwrap());

        let moved = update(
            db,
            requester.id,
            UpdateRequester {
                department_id: Some(dept_b),
                position: Some(Some("Driver".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(moved.department_id, dept_b);
        assert_eq!(moved.position.as_deref(), Some("Driver"));

        assert!(list_by_department(db, dept_a).await.unwrap().is_empty());
        assert_eq!(list_by_department(db, dept_b).await.unwrap().len(), 1);
        assert!(delete(db, requester.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_identity_rejected_by_database() {
        let test = TestDb::new().await;
        let dept = test.department("ADM").await;
        test.requester(dept, "90010100000").await;

        let duplicate = create(
            &test.db,
            CreateRequester {
                full_name: "Someone Else".to_string(),
                identity_number: "90010100000".to_string(),
                position: None,
                department_id: dept,
            },
        )
        .await;
        assert!(duplicate.is_err());
    }
}
