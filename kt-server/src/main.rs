use kt_server::{ServerConfig, run_server, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    telemetry::init(config.log_format);
    tracing::info!(
        provider = ?config.provider,
        vector_db = ?config.vector_db,
        collection = %config.collection,
        "starting kt-server"
    );
    run_server(config).await
}
