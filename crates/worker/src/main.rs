use std::sync::Arc;

use relight_cloud::{KeyStrategy, ReqwestFetcher, S3BlobStore};
use relight_db::PgJobRepository;
use relight_events::{NoopNotifier, NotificationSink, PushNotifier};
use relight_pipeline::{JobService, Orchestrator};
use relight_providers::ProviderRegistry;
use relight_worker::{JobDispatcher, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "relight_worker=debug,relight_pipeline=debug,relight_providers=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();

    let pool = relight_db::create_pool(&config.database_url).await?;
    relight_db::run_migrations(&pool).await?;

    let service = JobService::new(Arc::new(PgJobRepository::new(pool)));
    let registry = Arc::new(ProviderRegistry::from_config(config.providers.clone())?);

    let health = registry.health().await;
    tracing::info!(
        analysis_healthy = health.analysis,
        editing_healthy = health.editing,
        "Provider health probed"
    );

    let notifier: Arc<dyn NotificationSink> = match &config.push_gateway_url {
        Some(url) => Arc::new(PushNotifier::new(url)),
        None => {
            tracing::warn!("PUSH_GATEWAY_URL not set, notifications will be dropped");
            Arc::new(NoopNotifier)
        }
    };

    let orchestrator = Arc::new(Orchestrator::new(
        service.clone(),
        Arc::new(S3BlobStore::from_env().await),
        Arc::new(ReqwestFetcher::new()),
        registry,
        notifier,
        KeyStrategy::new(),
        config.pipeline.clone(),
    ));

    let dispatcher = JobDispatcher::new(
        service,
        orchestrator,
        config.pipeline.upload_bucket.clone(),
        config.poll_interval,
        config.dispatch_limit,
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                cancel.cancel();
            }
        });
    }

    dispatcher.run(cancel).await;
    Ok(())
}
