use anyhow::Context;

use pvz_infra::{db, PvzConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pvz_observability::init();

    let config = PvzConfig::from_env().context("loading configuration")?;
    let pool = db::connect(&config.database)
        .await
        .context("connecting to database")?;

    db::migrate(&pool).await.context("applying migrations")?;
    db::check_ready(&pool).await?;

    tracing::info!("migrations applied successfully");
    Ok(())
}
