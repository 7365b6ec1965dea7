//! `webhound doctor` — Diagnose configuration and provider reachability.

use webhound_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("webhound doctor");
    println!("===============\n");

    let config = match AppConfig::load() {
        Ok(c) => {
            println!("[ok]   Config loaded");
            c
        }
        Err(e) => {
            println!("[fail] Config: {e}");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("[ok]   Provider API key configured");
    } else {
        println!("[fail] No provider API key (set WEBHOUND_API_KEY or OPENAI_API_KEY)");
    }

    if config.bright_data.api_token.is_some() {
        println!("[ok]   Bright Data token configured");
    } else {
        println!("[warn] No Bright Data token — tool calls will fail (set BRIGHT_DATA_API_TOKEN)");
    }

    if let Some(client) = webhound_providers::build_from_config(&config) {
        use webhound_core::ModelClient;
        match client.health_check().await {
            Ok(true) => println!("[ok]   Provider reachable at {}", config.provider_url),
            Ok(false) => println!("[warn] Provider responded with an error status"),
            Err(e) => println!("[fail] Provider unreachable: {e}"),
        }
    }

    println!("\nModel: {}  max_tool_calls: {}", config.agent.model, config.agent.max_tool_calls);

    Ok(())
}
