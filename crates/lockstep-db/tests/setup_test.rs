//! Integration tests for first-time setup: database creation and fixture
//! preparation.

use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use lockstep_db::accounts;
use lockstep_db::config::DbConfig;
use lockstep_db::pool;
use lockstep_test_utils::{TestDb, pg_url};

#[tokio::test]
async fn prepare_is_repeatable_and_resets_drift() {
    let db = TestDb::create().await;

    sqlx::query("INSERT INTO account (balance) VALUES (99)")
        .execute(&db.pool)
        .await
        .unwrap();

    accounts::prepare(&db.pool).await.unwrap();
    accounts::prepare(&db.pool).await.unwrap();

    let snapshot = accounts::snapshot(&db.pool).await.unwrap();
    assert_eq!(snapshot.rows.len(), 2);
    assert_eq!(snapshot.value(0, "balance"), Some("67"));
    assert_eq!(snapshot.value(1, "balance"), Some("31"));

    db.teardown().await;
}

#[tokio::test]
async fn missing_database_is_created_once() {
    let name = format!("lockstep_setup_{}", Uuid::new_v4().simple());
    let config = DbConfig::new(format!("{}/{name}", pg_url().await));

    assert!(pool::create_database_if_missing(&config).await.unwrap());
    assert!(!pool::create_database_if_missing(&config).await.unwrap());

    let run_pool = pool::connect(&config).await.unwrap();
    accounts::prepare(&run_pool).await.unwrap();
    assert_eq!(accounts::balance_of(&run_pool, 1).await.unwrap(), Some(67));
    run_pool.close().await;

    let maint = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.maintenance_url())
        .await
        .unwrap();
    maint
        .execute(format!("DROP DATABASE IF EXISTS {name}").as_str())
        .await
        .unwrap();
    maint.close().await;
}
