//! Standalone Duoraid relay.
//!
//! ```sh
//! RUST_LOG=duoraid=debug cargo run -p relayd -- 0.0.0.0:8080
//! ```

use duoraid::RelayServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:8080".to_string());

    let server = RelayServer::builder().bind(&addr).build().await?;
    tracing::info!(%addr, "relay listening");
    server.run().await?;
    Ok(())
}
