//! Snowflake MCP Server - Main entry point.

use clap::Parser;
use snowflake_mcp_server::config::{Config, TransportMode};
use snowflake_mcp_server::mcp::SnowflakeService;
use snowflake_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber. Output goes to stderr so the stdio
/// transport keeps stdout for protocol messages.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    if config.enable_logs || config.transport == TransportMode::Http {
        init_tracing(&config);
    }

    info!(
        transport = %config.transport,
        "Starting Snowflake MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let service = match SnowflakeService::from_config(&config) {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, "Startup failed");
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("Usage: snowflake-mcp-server --account <ACCOUNT> --user <USER> --password <PAT>");
            eprintln!("       [--service-config-file services.yaml] [--transport stdio|http]");
            eprintln!();
            eprintln!("Credentials may also be set with SNOWFLAKE_ACCOUNT, SNOWFLAKE_USER and SNOWFLAKE_PASSWORD.");
            std::process::exit(1);
        }
    };

    let result = match config.transport {
        TransportMode::Stdio => StdioTransport::new(service).run().await,
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                service,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
