use flux::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    flux::logging::init("info")?;

    let config = RelayConfig::from_env();
    tracing::info!(web = %config.web_addr, game = %config.game_addr, "starting relay");

    let server = FluxServer::builder().config(config).build().await?;
    server.run().await?;
    Ok(())
}
