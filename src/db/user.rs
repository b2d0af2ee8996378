//! User repository: accounts for people operating the application.

use sea_orm::*;

use crate::entities::{prelude::*, users};
use crate::error::{AppError, Result};
use crate::models::user::{CreateUser, Role, UpdateUser, hash_password, verify_password};

const MIN_PASSWORD_LEN: usize = 4;

/// List all users ordered by username.
pub async fn list_all(db: &DatabaseConnection) -> std::result::Result<Vec<users::Model>, DbErr> {
    Users::find().order_by_asc(users::Column::Username).all(db).await
}

/// Get user by ID.
pub async fn get_by_id(db: &DatabaseConnection, id: i32) -> std::result::Result<Option<users::Model>, DbErr> {
    Users::find_by_id(id).one(db).await
}

/// Check if a username is taken.
pub async fn username_exists(db: &DatabaseConnection, username: &str) -> std::result::Result<bool, DbErr> {
    let count = Users::find()
        .filter(users::Column::Username.eq(username.trim()))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Number of users; zero means the application runs without login.
pub async fn count(db: &DatabaseConnection) -> std::result::Result<u64, DbErr> {
    Users::find().count(db).await
}

/// Create a user with a hashed password. Until an active administrator exists only
/// administrators can be created.
pub async fn create(db: &DatabaseConnection, data: CreateUser) -> Result<users::Model> {
    let username = data.username.trim().to_lowercase();
    if username.is_empty() {
        return Err(AppError::validation("Username is required"));
    }
    if data.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if username_exists(db, &username).await? {
        return Err(AppError::validation(format!("Username '{username}' already exists")));
    }
    if data.role != Role::Admin && count_active_admins(db, None).await? == 0 {
        return Err(AppError::validation("The first user must be an administrator"));
    }

    let model = users::ActiveModel {
        password_hash: Set(hash_password(&username, &data.password)),
        username: Set(username),
        full_name: Set(data.full_name.trim().to_string()),
        role: Set(data.role.as_str().to_string()),
        is_active: Set(true),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Update a user, keeping at least one active administrator.
pub async fn update(db: &DatabaseConnection, id: i32, data: UpdateUser) -> Result<Option<users::Model>> {
    let Some(existing) = Users::find_by_id(id).one(db).await? else {
        return Ok(None);
    };

    let demoted = data.role.is_some_and(|r| r != Role::Admin);
    let deactivated = data.is_active == Some(false);
    if is_active_admin(&existing) && (demoted || deactivated) && count_active_admins(db, Some(id)).await? == 0 {
        return Err(AppError::validation("At least one active administrator is required"));
    }

    let username = existing.username.clone();
    let mut active: users::ActiveModel = existing.into();

    if let Some(full_name) = data.full_name {
        active.full_name = Set(full_name.trim().to_string());
    }
    if let Some(password) = data.password {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(format!(
                "Password must have at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        active.password_hash = Set(hash_password(&username, &password));
    }
    if let Some(role) = data.role {
        active.role = Set(role.as_str().to_string());
    }
    if let Some(is_active) = data.is_active {
        active.is_active = Set(is_active);
    }

    Ok(Some(active.update(db).await?))
}

/// Delete a user, keeping at least one active administrator.
pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool> {
    let Some(existing) = Users::find_by_id(id).one(db).await? else {
        return Ok(false);
    };

    if is_active_admin(&existing) && count_active_admins(db, Some(id)).await? == 0 {
        return Err(AppError::validation("Cannot delete the last active administrator"));
    }

    let result = Users::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// Return the active user matching the credentials.
pub async fn authenticate(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> std::result::Result<Option<users::Model>, DbErr> {
    let username = username.trim().to_lowercase();
    let user = Users::find()
        .filter(users::Column::Username.eq(username.as_str()))
        .filter(users::Column::IsActive.eq(true))
        .one(db)
        .await?;

    Ok(user.filter(|u| verify_password(&u.username, password, &u.password_hash)))
}

fn is_active_admin(user: &users::Model) -> bool {
    user.is_active && user.role == Role::Admin.as_str()
}

async fn count_active_admins(db: &DatabaseConnection, exclude_id: Option<i32>) -> std::result::Result<u64, DbErr> {
    let mut query = Users::find()
        .filter(users::Column::Role.eq(Role::Admin.as_str()))
        .filter(users::Column::IsActive.eq(true));

    if let Some(id) = exclude_id {
        query = query.filter(users::Column::Id.ne(id));
    }

    query.count(db).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::TestDb;

    fn new_user(username: &str, role: Role) -> CreateUser {
        CreateUser {
            username: username.to_string(),
            full_name: format!("{username} full name"),
            password: "secret".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let test = TestDb::new().await;
        let db = &test.db;

        let user = create(db, new_user(" Admin ", Role::Admin)).await.unwrap();
        assert_eq!(user.username, "admin");
        assert_ne!(user.password_hash, "secret");

        assert!(authenticate(db, "ADMIN", "secret").await.unwrap().is_some());
        assert!(authenticate(db, "admin", "wrong").await.unwrap().is_none());
        assert!(authenticate(db, "nobody", "secret").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_validations() {
        let test = TestDb::new().await;
        let db = &test.db;

        create(db, new_user("admin", Role::Admin)).await.unwrap();
        create(db, new_user("ana", Role::Operator)).await.unwrap();
        assert!(matches!(
            create(db, new_user("ana", Role::Operator)).await,
            Err(AppError::Validation(_))
        ));

        let mut short = new_user("luis", Role::Operator);
        short.password = "abc".to_string();
        assert!(matches!(create(db, short).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_first_user_must_be_admin() {
        let test = TestDb::new().await;
        let db = &test.db;

        assert!(matches!(
            create(db, new_user("ana", Role::Operator)).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(count(db).await.unwrap(), 0);

        create(db, new_user("admin", Role::Admin)).await.unwrap();
        create(db, new_user("ana", Role::Operator)).await.unwrap();
        assert_eq!(count(db).await.unwrap(), 2);
        assert_eq!(count_active_admins(db, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_last_admin_is_protected() {
        let test = TestDb::new().await;
        let db = &test.db;

        let admin = create(db, new_user("admin", Role::Admin)).await.unwrap();
        let operator = create(db, new_user("op", Role::Operator)).await.unwrap();

        let demote = UpdateUser {
            role: Some(Role::Operator),
            ..Default::default()
        };
        assert!(update(db, admin.id, demote.clone()).await.is_err());
        assert!(delete(db, admin.id).await.is_err());
        assert!(delete(db, operator.id).await.unwrap());

        let second = create(db, new_user("boss", Role::Admin)).await.unwrap();
        assert!(update(db, admin.id, demote).await.unwrap().is_some());
        assert!(delete(db, second.id).await.is_err());
    }

    #[tokio::test]
    async fn test_password_change() {
        let test = TestDb::new().await;
        let db = &test.db;
        let user = create(db, new_user("ana", Role::Admin)).await.unwrap();

        update(
            db,
            user.id,
            UpdateUser {
                password: Some("new-pass".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(authenticate(db, "ana", "secret").await.unwrap().is_none());
        assert!(authenticate(db, "ana", "new-pass").await.unwrap().is_some());
    }
}
