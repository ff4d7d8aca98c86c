//! Shared test utilities for lockstep integration tests.
//!
//! Every test gets its own database, migrated and seeded with the `account`
//! fixture, inside one PostgreSQL server shared by the whole test binary.
//!
//! Two modes:
//! - **`LOCKSTEP_TEST_PG_URL`** set: use that server directly (for CI jobs
//!   that already run PostgreSQL as a service).
//! - **No env var**: start a container via testcontainers on first use,
//!   shared per binary through a `OnceCell`.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use lockstep_db::accounts;

struct SharedPg {
    base_url: String,
    /// Held to keep the container alive. `None` when using an external URL.
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_PG: OnceCell<SharedPg> = OnceCell::const_new();

async fn init_shared_pg() -> SharedPg {
    if let Ok(url) = std::env::var("LOCKSTEP_TEST_PG_URL") {
        return SharedPg {
            base_url: url.trim_end_matches('/').to_owned(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("16")
        .start()
        .await
        .expect("failed to start PostgreSQL container");

    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");

    SharedPg {
        base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// Server URL without a database name.
pub async fn pg_url() -> &'static str {
    let shared = SHARED_PG.get_or_init(init_shared_pg).await;
    &shared.base_url
}

async fn maintenance_pool() -> PgPool {
    let url = format!("{}/postgres", pg_url().await);
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&url)
        .await
        .expect("failed to connect to maintenance database")
}

/// A temporary database holding a freshly seeded `account` fixture.
pub struct TestDb {
    pub pool: PgPool,
    pub name: String,
    pub url: String,
}

impl TestDb {
    /// Create, migrate and seed a uniquely named database.
    pub async fn create() -> Self {
        let name = format!("lockstep_test_{}", Uuid::new_v4().simple());

        let maint = maintenance_pool().await;
        maint
            .execute(format!("CREATE DATABASE {name}").as_str())
            .await
            .unwrap_or_else(|e| panic!("failed to create temp database {name}: {e}"));
        maint.close().await;

        let url = format!("{}/{name}", pg_url().await);
        // Two task sessions plus one connection for fixture reads.
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
            .unwrap_or_else(|e| panic!("failed to connect to temp database {name}: {e}"));

        accounts::prepare(&pool)
            .await
            .expect("fixture preparation should succeed");

        Self { pool, name, url }
    }

    /// Close the pool and drop the database. Lingering connections are
    /// terminated first.
    pub async fn teardown(self) {
        self.pool.close().await;

        let maint = maintenance_pool().await;
        let terminate = format!(
            "SELECT pg_terminate_backend(pid) \
             FROM pg_stat_activity \
             WHERE datname = '{}' AND pid <> pg_backend_pid()",
            self.name
        );
        let _ = maint.execute(terminate.as_str()).await;
        let _ = maint
            .execute(format!("DROP DATABASE IF EXISTS {}", self.name).as_str())
            .await;
        maint.close().await;
    }
}
