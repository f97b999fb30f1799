use kvitto_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    kvitto_api::setup::telemetry::init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (repositories, storage, extractor, routes)
    let (_state, router) = kvitto_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    kvitto_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
