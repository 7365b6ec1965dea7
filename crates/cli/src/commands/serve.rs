//! `webhound serve` — Start the HTTP server.

use webhound_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("webhound — web research agent");
    println!("  Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("  Model:     {}", config.agent.model);
    println!("  Downloads: {}", config.download.base_dir);

    webhound_gateway::start(config).await?;

    Ok(())
}
