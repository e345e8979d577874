use payment_link_service::{config::Config, services::init_metrics, Application};
use service_core::observability::{init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    init_tracing(
        &config.service_name,
        &config.observability.log_level,
        config.observability.otlp_endpoint.as_deref(),
    )?;
    init_metrics();

    let application = Application::build(config).await?;
    let result = application.run_until_stopped().await;

    shutdown_tracing();
    result?;
    Ok(())
}
