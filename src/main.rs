use dotenvy::dotenv;
use retainer_ledger::{
    config::{database, settings},
    core::{closing, lock::PeriodLocks, org_settings},
    errors::Result,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load settings
    let settings_path = settings::settings_path();
    let settings = settings::load_settings_or_default(&settings_path)
        .inspect_err(|e| error!("Failed to load settings from {}: {}", settings_path, e))?;

    // 4. Initialize database
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database tables ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed organization settings on first start
    org_settings::seed_org_settings(
        &db,
        &settings.organization.name,
        settings.organization.default_currency.as_deref(),
    )
    .await?;

    // 6. Close every period that has ended
    let locks = PeriodLocks::new(settings.closing.lock_timeout());
    let today = chrono::Utc::now().date_naive();
    let result =
        closing::close_due_periods(&db, &locks, today, settings.closing.actor_id).await?;

    let summary = closing::format_sweep_summary(&result);
    if result.failed.is_empty() {
        info!("{summary}");
    } else {
        warn!("{summary}");
    }

    Ok(())
}
