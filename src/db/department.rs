//! Department repository with CRUD operations.

use crate::entities::{departments, prelude::*};
use crate::models::department::{CreateDepartment, UpdateDepartment};
use sea_orm::*;

/// List all departments ordered by name.
pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<departments::Model>, DbErr> {
    Departments::find()
        .order_by_asc(departments::Column::Name)
        .all(db)
        .await
}

/// List only active departments.
pub async fn list_active(db: &DatabaseConnection) -> Result<Vec<departments::Model>, DbErr> {
    Departments::find()
        .filter(departments::Column::IsActive.eq(true))
        .order_by_asc(departments::Column::Name)
        .all(db)
        .await
}

/// Get department by ID.
pub async fn get_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<departments::Model>, DbErr> {
    Departments::find_by_id(id).one(db).await
}

/// Create a new department.
pub async fn create(db: &DatabaseConnection, data: CreateDepartment) -> Result<departments::Model, DbErr> {
    let model = departments::ActiveModel {
        code: Set(data.code.trim().to_string()),
        name: Set(data.name.trim().to_string()),
        is_active: Set(true),
        ..Default::default()
    };
    model.insert(db).await
}

/// Update an existing department.
pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    data: UpdateDepartment,
) -> Result<Option<departments::Model>, DbErr> {
    let existing = Departments::find_by_id(id).one(db).await?;

    match existing {
        Some(model) => {
            let mut active: departments::ActiveModel = model.into();

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

/// Delete a department by ID.
///
/// Fails with a constraint error while requesters or diets reference it.
pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool, DbErr> {
    let result = Departments::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// Check if department code exists (for validation).
pub async fn code_exists(db: &DatabaseConnection, code: &str, exclude_id: Option<i32>) -> Result<bool, DbErr> {
    let mut query = Departments::find().filter(departments::Column::Code.eq(code.trim()));

    if let Some(id) = exclude_id {
        query = query.filter(departments::Column::Id.ne(id));
    }

    let count = query.count(db).await?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::TestDb;

    #[tokio::test]
    async fn test_department_crud() {
        let test = TestDb::new().await;
        let db = &test.db;

        let dept = create(
            db,
            CreateDepartment {
                code: " ECO ".to_string(),
                name: "Economics".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(dept.code, "ECO");
        assert!(dept.is_active);

        assert!(code_exists(db, "ECO", None).await.unwrap());
        assert!(!code_exists(db, "ECO", Some(dept.id)).await.unwrap());

        let updated = update(
            db,
            dept.id,
            UpdateDepartment {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!updated.is_active);
        assert!(list_active(db).await.unwrap().is_empty());
        assert_eq!(list_all(db).await.unwrap().len(), 1);

        assert!(delete(db, dept.id).await.unwrap());
        assert!(!delete(db, dept.id).await.unwrap());
        assert!(update(db, dept.id, UpdateDepartment::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_department_in_use_cannot_be_deleted() {
        let test = TestDb::new().await;
        let dept_id = test.department("ADM").await;
        test.requester(dept_id, "81010112345").await;

        assert!(delete(&test.db, dept_id).await.is_err());
    }
}
