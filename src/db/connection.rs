//! Database connection and utility functions.

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, Schema,
    Statement,
};
use std::path::Path;
use std::time::Duration;
use tracing::log::LevelFilter;

use crate::entities::prelude::*;

/// Build the SQLite URL for a database file, creating it when missing.
pub fn database_url(path: &Path) -> String {
    format!("sqlite://{}?mode=rwc", path.display())
}

/// Open the database file with configured pool settings and make sure the schema exists.
pub async fn connect(path: &Path) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url(path));
    opt.max_connections(4)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    let db = Database::connect(opt).await?;
    db.execute_unprepared("PRAGMA foreign_keys = ON").await?;
    ensure_schema(&db).await?;
    Ok(db)
}

/// Create every table that does not exist yet.
///
/// Master tables first so foreign keys resolve in creation order.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Departments).await?;
    create_table(db, &schema, Accounts).await?;
    create_table(db, &schema, Requesters).await?;
    create_table(db, &schema, Cards).await?;
    create_table(db, &schema, Users).await?;
    create_table(db, &schema, Diets).await?;
    create_table(db, &schema, Liquidations).await?;
    create_table(db, &schema, CardRecharges).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr> {
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(db.get_database_backend().build(&stmt)).await?;
    Ok(())
}

/// Test database connection by executing a simple query.
pub async fn test_connection(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute_unprepared("SELECT 1").await?;
    Ok(())
}

/// Get SQLite library version string.
pub async fn get_version(db: &DatabaseConnection) -> Result<String, DbErr> {
    let result = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            "SELECT sqlite_version() AS version".to_owned(),
        ))
        .await?;

    match result {
        Some(row) => {
            let version: String = row.try_get("", "version")?;
            Ok(version)
        }
        None => Ok("Unknown".to_owned()),
    }
}

/// Run `PRAGMA integrity_check`; true when SQLite reports "ok".
pub async fn integrity_check<C: ConnectionTrait>(db: &C) -> Result<bool, DbErr> {
    let rows = db
        .query_all(Statement::from_string(
            db.get_database_backend(),
            "PRAGMA integrity_check".to_owned(),
        ))
        .await?;

    let mut ok = !rows.is_empty();
    for row in rows {
        let line: String = row.try_get_by_index(0)?;
        if line != "ok" {
            tracing::warn!("Integrity check: {}", line);
            ok = false;
        }
    }
    Ok(ok)
}

/// Names of the user tables present in the database.
pub async fn list_tables<C: ConnectionTrait>(db: &C) -> Result<Vec<String>, DbErr> {
    let rows = db
        .query_all(Statement::from_string(
            db.get_database_backend(),
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
                .to_owned(),
        ))
        .await?;

    rows.iter().map(|row| row.try_get::<String>("", "name")).collect()
}

/// Get record counts for all tables.
pub async fn get_table_counts(db: &DatabaseConnection) -> Result<TableCounts, DbErr> {
    Ok(TableCounts {
        departments: Departments::find().count(db).await?,
        requesters: Requesters::find().count(db).await?,
        accounts: Accounts::find().count(db).await?,
        cards: Cards::find().count(db).await?,
        users: Users::find().count(db).await?,
        diets: Diets::find().count(db).await?,
        liquidations: Liquidations::find().count(db).await?,
        card_recharges: CardRecharges::find().count(db).await?,
    })
}

/// Table record counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub departments: u64,
    pub requesters: u64,
    pub accounts: u64,
    pub cards: u64,
    pub users: u64,
    pub diets: u64,
    pub liquidations: u64,
    pub card_recharges: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::TestDb;

    #[tokio::test]
    async fn test_connect_creates_schema() {
        let test = TestDb::new().await;

        let tables = list_tables(&test.db).await.unwrap();
        for expected in [
            "accounts",
            "card_recharges",
            "cards",
            "departments",
            "diets",
            "liquidations",
            "requesters",
            "users",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }

        assert_eq!(get_table_counts(&test.db).await.unwrap(), TableCounts::default());
        assert!(integrity_check(&test.db).await.unwrap());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let test = TestDb::new().await;
        let path = test.path.clone();
        test.db.close().await.unwrap();

        let db = connect(&path).await.unwrap();
        test_connection(&db).await.unwrap();
        assert!(!get_version(&db).await.unwrap().is_empty());
    }
}
