use anyhow::Context;
use dotenv::dotenv;
use std::env;
use std::sync::Arc;
use tasktrack::{SharedData, app_env, logging, persistence};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();
    logging::setup_logging(logging::init_env_filter());

    let db_url = env::var(app_env::DB_URL)
        .with_context(|| format!("{} must be set to the database URL", app_env::DB_URL))?;
    let db_pool = persistence::connect_sqlx(&db_url).await;
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("running database migrations")?;

    let shared_data = Arc::new(SharedData {
        ext_cxn: persistence::ExternalConnectivity::new(db_pool),
    });
    let router = tasktrack::app_router(shared_data);

    let listen_addr =
        env::var(app_env::LISTEN_ADDR).unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    info!("Starting server on {listen_addr}.");
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("binding to {listen_addr}"))?;
    axum::serve(listener, router)
        .await
        .context("serving the application")?;

    Ok(())
}
