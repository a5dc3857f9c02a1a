use std::sync::Arc;

use clap::Parser;

use vitrine_server::config::Config;
use vitrine_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Config::parse();
    let state = AppState::from_config(&config)
        .await
        .map_err(|err| anyhow::anyhow!("Could not initialise server state: {:?}", err))?;
    let app = vitrine_server::build_router(Arc::new(state));

    log::info!("Starting Vitrine HTTP Server on http://{}", config.listen);
    axum::Server::bind(&config.listen)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
