use anyhow::Context;

use opsforge_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    opsforge_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let (services, worker) =
        opsforge_api::app::services::build_services(config.dispatcher()).context("failed to start trigger worker")?;
    let app = opsforge_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        policy = %config.redelivery_policy,
        max_steps = config.max_steps,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    worker.shutdown();
    tracing::info!("shut down");
    Ok(())
}
