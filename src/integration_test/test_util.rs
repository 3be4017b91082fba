use crate::{SharedData, app_env, persistence};
use axum::Router;
use dotenv::dotenv;
use lazy_static::lazy_static;
use rand::{Rng, thread_rng};
use sqlx::{Connection, PgConnection, PgPool};
use std::sync::Arc;
use std::{env, future::Future};
use tokio::runtime::Runtime;

lazy_static! {
    static ref TOKIO_RT: Runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Tokio runtime failed to initialize");
}

struct TestDatabase {
    base_url: String,
    db_name: String,
}

impl TestDatabase {
    async fn create(base_url: &str) -> Result<Self, sqlx::Error> {
        let mut rng = thread_rng();
        let schema_id: u32 = rng.gen_range(10_000..99_999);
        let db_name = format!("test_db_{}", schema_id);

        let mut conn = PgConnection::connect(base_url).await?;
        sqlx::query(format!("CREATE DATABASE {}", db_name).as_str())
            .execute(&mut conn)
            .await?;

        Ok(Self {
            base_url: String::from(base_url),
            db_name,
        })
    }

    async fn drop_database(self) {
        let conn = PgConnection::connect(self.base_url.as_str()).await;
        let mut conn = match conn {
            Ok(cxn) => cxn,
            Err(conn_err) => {
                println!(
                    "Failed to reconnect to database to drop test database {}, please remove it manually. Error: {}",
                    self.db_name, conn_err
                );
                return;
            }
        };

        let drop_result = sqlx::query(format!("DROP DATABASE {}", self.db_name).as_str())
            .execute(&mut conn)
            .await;
        if let Err(db_err) = drop_result {
            println!(
                "Failed to drop test database {}, please remove it manually. Error: {}",
                self.db_name, db_err
            );
        }
    }
}

/// Provisions a dedicated database for a test, runs the app's migrations
/// against it, and hands the test a connected pool.
///
/// Expects that the TEST_DB_URL environment variable is populated
pub fn prepare_db_and_test<F, R>(test_fn: F)
where
    R: Future<Output = ()>,
    F: FnOnce(PgPool) -> R,
{
    if dotenv().is_err() {
        println!("Test is running without .env file.");
    }

    let pg_connection_base_url = env::var(app_env::test::TEST_DB_URL).expect(
        "You must provide the TEST_DB_URL environment variable as the base postgres connection string",
    );
    let test_db = TOKIO_RT.block_on(TestDatabase::create(&pg_connection_base_url));
    let test_db = match test_db {
        Ok(tdb) => tdb,
        Err(db_err) => panic!("Failed to start test database: {}", db_err),
    };

    TOKIO_RT.block_on(async {
        let sqlx_pool = persistence::connect_sqlx(
            format!("{}/{}", pg_connection_base_url, test_db.db_name).as_str(),
        )
        .await;
        sqlx::migrate!("./migrations")
            .run(&sqlx_pool)
            .await
            .expect("Failed to apply migrations to the test database");

        test_fn(sqlx_pool).await;
    });

    TOKIO_RT.block_on(test_db.drop_database());
}

/// Builds the full application router backed by the given database pool
pub fn test_router(db: PgPool) -> Router {
    crate::app_router(Arc::new(SharedData {
        ext_cxn: persistence::ExternalConnectivity::new(db),
    }))
}
