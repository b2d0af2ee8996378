use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use super::*;
use crate::db::test_support::{TestDb, diet_request};

/// Seed one department, requester, funded card and card-paid diet.
async fn seed(test: &TestDb) {
    let dept = test.department("ADM").await;
    let requester = test.requester(dept, "85010112345").await;
    let card = test.card_with_balance("4000-0001", 200.0).await;
    db::diet::create(&test.db, &test.rates, diet_request(requester, Some(card)))
        .await
        .unwrap();
}

/// Close the pool so files can be replaced underneath it.
async fn close(test: TestDb) -> (tempfile::TempDir, PathBuf) {
    let TestDb { dir, path, db, .. } = test;
    db.close().await.unwrap();
    (dir, path)
}

fn service_for(dir: &Path, db_path: &Path) -> DatabaseService {
    DatabaseService::new(db_path, dir.join("backups"))
}

fn write_fake_sqlite(path: &Path) {
    let mut bytes = SQLITE_HEADER.to_vec();
    bytes.resize(4096, 0xFF);
    fs::write(path, bytes).unwrap();
}

#[tokio::test]
async fn test_backup_restores_source_rows() {
    let test = TestDb::new().await;
    seed(&test).await;
    let service = service_for(test.dir.path(), &test.path);

    let backup = service.create_backup("Before March").await.unwrap();
    assert!(backup.file_name.starts_with("backup_"));
    assert!(backup.file_name.ends_with("_before_march.db"));
    assert_eq!(backup.description.as_deref(), Some("before march"));
    assert!(backup.size_bytes > 0);

    test.department("ECO").await;
    let (_dir, path) = close(test).await;

    let outcome = service.restore_backup(&backup.path).await;
    assert!(outcome.is_success(), "{outcome:?}");
    assert!(service.markers().restart_required());
    assert!(service.markers().is_locked());
    assert_eq!(fs::read(&path).unwrap(), fs::read(&backup.path).unwrap());

    let db = db::connect(&path).await.unwrap();
    let counts = db::get_table_counts(&db).await.unwrap();
    assert_eq!(counts.departments, 1);
    assert_eq!(counts.diets, 1);
    assert_eq!(counts.card_recharges, 1);
}

#[tokio::test]
async fn test_restore_takes_safety_backup() {
    let test = TestDb::new().await;
    seed(&test).await;
    let service = service_for(test.dir.path(), &test.path);
    let backup = service.create_backup("").await.unwrap();
    let (_dir, _path) = close(test).await;

    match service.restore_backup(&backup.path).await {
        RestoreOutcome::Restored { safety_backup } => {
            let safety = safety_backup.expect("safety backup");
            assert_eq!(safety.description.as_deref(), Some("pre restore"));
            assert!(safety.path.is_file());
        }
        other => panic!("expected restore, got {other:?}"),
    }
    assert_eq!(service.list_backups().unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_restore_rolls_back() {
    let test = TestDb::new().await;
    seed(&test).await;
    let service = service_for(test.dir.path(), &test.path);
    let (dir, path) = close(test).await;
    let before = fs::read(&path).unwrap();

    let broken = dir.path().join("broken.db");
    write_fake_sqlite(&broken);

    let outcome = service.restore_backup(&broken).await;
    assert!(matches!(outcome, RestoreOutcome::RolledBack { .. }), "{outcome:?}");
    assert!(!outcome.is_success());
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(!service.markers().is_locked());
    assert!(!service.markers().restart_required());
    assert!(!Path::new(&format!("{}.rollback", path.display())).exists());

    let db = db::connect(&path).await.unwrap();
    assert_eq!(db::get_table_counts(&db).await.unwrap().diets, 1);
}

#[tokio::test]
async fn test_restore_rejects_invalid_files() {
    let test = TestDb::new().await;
    let service = service_for(test.dir.path(), &test.path);
    let (dir, path) = close(test).await;
    let before = fs::read(&path).unwrap();

    let text = dir.path().join("notes.db");
    fs::write(&text, "not a database").unwrap();
    let outcome = service.restore_backup(&text).await;
    assert!(matches!(outcome, RestoreOutcome::Rejected { .. }), "{outcome:?}");

    let missing = dir.path().join("missing.db");
    assert!(matches!(
        service.restore_backup(&missing).await,
        RestoreOutcome::Rejected { .. }
    ));

    assert!(matches!(
        service.restore_backup(&path).await,
        RestoreOutcome::Rejected { .. }
    ));

    // Nothing touched: no safety backups, no markers
    assert!(service.list_backups().unwrap().is_empty());
    assert!(!service.markers().is_locked());
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn test_backup_of_missing_database() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_for(dir.path(), &dir.path().join("absent.db"));

    let err = service.create_backup("x").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_backup_names_are_unique() {
    let test = TestDb::new().await;
    let service = service_for(test.dir.path(), &test.path);

    let mut paths = Vec::new();
    for _ in 0..3 {
        paths.push(service.create_backup("daily").await.unwrap().path);
    }
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 3);
    assert_eq!(service.list_backups().unwrap().len(), 3);
}

#[tokio::test]
async fn test_prune_keeps_newest() {
    let test = TestDb::new().await;
    let service = service_for(test.dir.path(), &test.path);

    let mut created = Vec::new();
    for i in 0..4 {
        created.push(service.create_backup(&format!("run {i}")).await.unwrap());
    }

    let removed = service.prune_backups(2).unwrap();
    assert_eq!(removed.len(), 2);

    let remaining: Vec<_> = service.list_backups().unwrap().into_iter().map(|b| b.path).collect();
    assert_eq!(remaining, vec![created[3].path.clone(), created[2].path.clone()]);

    // Zero keeps everything
    assert!(service.prune_backups(0).unwrap().is_empty());
    assert_eq!(service.list_backups().unwrap().len(), 2);
}

#[tokio::test]
async fn test_prune_spares_cycle_archives() {
    let test = TestDb::new().await;
    seed(&test).await;
    let service = service_for(test.dir.path(), &test.path);

    let archive = service.create_backup("cycle 2024").await.unwrap();
    assert!(archive.is_cycle_archive());
    for i in 0..3 {
        let backup = service.create_backup(&format!("daily {i}")).await.unwrap();
        assert!(!backup.is_cycle_archive());
    }

    let removed = service.prune_backups(1).unwrap();
    assert_eq!(removed.len(), 2);
    assert!(!removed.contains(&archive.path));
    assert!(archive.path.is_file());
    assert_eq!(service.list_backups().unwrap().len(), 2);

    // Words that merely start with "cycle" are ordinary backups
    let other = service.create_backup("cycles review").await.unwrap();
    assert!(!other.is_cycle_archive());
}

#[tokio::test]
async fn test_startup_recovers_interrupted_restore() {
    let test = TestDb::new().await;
    seed(&test).await;
    let service = service_for(test.dir.path(), &test.path);
    let (_dir, path) = close(test).await;

    // State left by a crash while the live file was being overwritten
    let rollback = rollback_path_for(&path);
    service.markers().write_lock("restoring").unwrap();
    fs::copy(&path, &rollback).unwrap();
    fs::write(&path, b"").unwrap();

    assert_eq!(service.check_on_startup().unwrap(), StartupState::RecoveredRestore);
    assert!(!service.markers().is_locked());
    assert!(!rollback.exists());
    assert!(fs::metadata(&path).unwrap().len() > 0);

    let db = db::connect(&path).await.unwrap();
    assert_eq!(db::get_table_counts(&db).await.unwrap().diets, 1);
}

#[tokio::test]
async fn test_startup_without_rollback_copy_keeps_live_file() {
    let test = TestDb::new().await;
    seed(&test).await;
    let service = service_for(test.dir.path(), &test.path);
    let (_dir, path) = close(test).await;
    let before = fs::read(&path).unwrap();

    service.markers().write_lock("restoring").unwrap();

    assert_eq!(service.check_on_startup().unwrap(), StartupState::InterruptedRestore);
    assert!(!service.markers().is_locked());
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(service.check_on_startup().unwrap(), StartupState::Clean);
}

#[tokio::test]
async fn test_startup_after_completed_restore_drops_rollback_copy() {
    let test = TestDb::new().await;
    let service = service_for(test.dir.path(), &test.path);
    let (_dir, path) = close(test).await;

    let rollback = rollback_path_for(&path);
    fs::copy(&path, &rollback).unwrap();
    service.markers().write_lock("restoring").unwrap();
    service.markers().write_restart_required("done").unwrap();

    assert_eq!(service.check_on_startup().unwrap(), StartupState::RestartCompleted);
    assert!(!service.markers().is_locked());
    assert!(!service.markers().restart_required());
    assert!(!rollback.exists());
}

#[test]
fn test_failed_recovery_keeps_lock() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the database file should be makes the copy fail
    let path = dir.path().join("dietas.db");
    fs::create_dir(&path).unwrap();
    let service = service_for(dir.path(), &path);

    fs::write(rollback_path_for(&path), b"previous").unwrap();
    service.markers().write_lock("restoring").unwrap();

    assert!(service.check_on_startup().is_err());
    assert!(service.markers().is_locked());
    assert!(rollback_path_for(&path).is_file());
}

#[tokio::test]
async fn test_list_ignores_foreign_files() {
    let test = TestDb::new().await;
    let service = service_for(test.dir.path(), &test.path);
    service.create_backup("").await.unwrap();

    fs::write(service.backup_dir().join("notes.txt"), "x").unwrap();
    fs::write(service.backup_dir().join("backup_latest.db"), "x").unwrap();

    let backups = service.list_backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].description, None);
}

#[tokio::test]
async fn test_delete_backup_only_inside_directory() {
    let test = TestDb::new().await;
    let service = service_for(test.dir.path(), &test.path);
    let backup = service.create_backup("").await.unwrap();

    let outside = test.dir.path().join("backup_20250101_000000.db");
    fs::write(&outside, "x").unwrap();
    assert!(service.delete_backup(&outside).is_err());
    assert!(outside.exists());

    service.delete_backup(&backup.path).unwrap();
    assert!(service.list_backups().unwrap().is_empty());
}

#[tokio::test]
async fn test_clean_copy_keeps_master_data() {
    let test = TestDb::new().await;
    seed(&test).await;
    let service = service_for(test.dir.path(), &test.path);

    let clean = service.create_clean_database_copy("2025 Q1").await.unwrap();
    assert!(clean.starts_with(service.cycles_dir()));
    assert!(clean.file_name().unwrap().to_string_lossy().starts_with("cycle_2025_q1_"));

    let conn = open_file(&clean, true).await.unwrap();
    let tables = db::list_tables(&conn).await.unwrap();
    conn.close().await.unwrap();
    for table in TRANSACTIONAL_TABLES {
        assert!(!tables.iter().any(|t| t == table), "{table} still present");
    }
    assert!(tables.iter().any(|t| t == "departments"));

    let db = db::connect(&clean).await.unwrap();
    let counts = db::get_table_counts(&db).await.unwrap();
    assert_eq!(counts.departments, 1);
    assert_eq!(counts.requesters, 1);
    assert_eq!(counts.cards, 1);
    assert_eq!(counts.diets, 0);
    assert_eq!(counts.card_recharges, 0);

    // Card balances survive the cycle
    let card = db::card::list_all(&db).await.unwrap().remove(0);
    assert_eq!(card.balance, 140.0);

    // The live database is untouched
    let live = db::get_table_counts(&test.db).await.unwrap();
    assert_eq!(live.diets, 1);
}

#[tokio::test]
async fn test_clean_copy_requires_name() {
    let test = TestDb::new().await;
    let service = service_for(test.dir.path(), &test.path);
    assert!(service.create_clean_database_copy(" - ").await.is_err());
}

#[tokio::test]
async fn test_start_new_cycle() {
    let test = TestDb::new().await;
    seed(&test).await;
    let service = service_for(test.dir.path(), &test.path);
    let (_dir, path) = close(test).await;

    let outcome = service.start_new_cycle("2024").await.unwrap();
    assert!(outcome.restore.is_success(), "{:?}", outcome.restore);
    assert_eq!(outcome.archive.description.as_deref(), Some("cycle 2024"));
    assert!(outcome.archive.is_cycle_archive());
    assert!(outcome.clean_copy.is_file());
    assert!(service.markers().restart_required());

    let db = db::connect(&path).await.unwrap();
    let counts = db::get_table_counts(&db).await.unwrap();
    assert_eq!(counts.departments, 1);
    assert_eq!(counts.diets, 0);

    // The archive still holds the old cycle
    let archive = db::connect(&outcome.archive.path).await.unwrap();
    assert_eq!(db::get_table_counts(&archive).await.unwrap().diets, 1);
}

#[test]
fn test_parse_backup_name() {
    let stamp = NaiveDate::from_ymd_opt(2025, 3, 10)
        .unwrap()
        .and_hms_opt(14, 25, 1)
        .unwrap();

    assert_eq!(parse_backup_name("backup_20250310_142501.db"), Some((stamp, 0, None)));
    assert_eq!(
        parse_backup_name("backup_20250310_142501-2_pre_restore.db"),
        Some((stamp, 2, Some("pre restore".to_string())))
    );
    assert_eq!(parse_backup_name("backup_20250310_142501.sqlite"), None);
    assert_eq!(parse_backup_name("backup_2025_bad.db"), None);
    assert_eq!(parse_backup_name("backup_20250310_142501x.db"), None);
}

#[test]
fn test_slugify() {
    assert_eq!(slugify("Before March"), "before_march");
    assert_eq!(slugify("  ciclo 2025/2026!  "), "ciclo_2025_2026");
    assert_eq!(slugify("---"), "");
    assert_eq!(slugify(&"a".repeat(60)).len(), 40);
}

#[test]
fn test_restore_outcome_messages() {
    assert!(RestoreOutcome::Restored { safety_backup: None }.is_success());
    let failed = RestoreOutcome::RolledBack {
        reason: "integrity".to_string(),
    };
    assert!(!failed.is_success());
    assert!(failed.message().contains("integrity"));
}
