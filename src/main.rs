use payment_gateway::config::{GatewayConfig, CONFIG_PATH_ENV};
use payment_gateway::init_gateway;
use payment_gateway::observability::{init_tracing, LogFormat};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize tracing
    init_tracing(LogFormat::from_env());

    // Config path: first argument, then environment, then default
    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var(CONFIG_PATH_ENV).ok())
        .unwrap_or_else(|| "config/gateway.yaml".to_string());

    // Load configuration
    let config = match GatewayConfig::from_file(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", config_path, e);
            eprintln!("Usage: payment-gateway [config_file]");
            process::exit(1);
        }
    };

    // Start the gateway
    if let Err(e) = init_gateway(config).await {
        eprintln!("Gateway error: {}", e);
        process::exit(1);
    }
}
