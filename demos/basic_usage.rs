//! Basic usage example for the resource storage client
//!
//! Run with: QBOX_TOKEN=<access-token> cargo run --example basic_usage -- <table> <local-file>

use qbox_rs_client::{ClientConfig, Connection, Service};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let token = std::env::var("QBOX_TOKEN").unwrap_or_else(|_| "dev-token".to_string());
    let mut args = std::env::args().skip(1);
    let table = args.next().unwrap_or_else(|| "demo".to_string());
    let local_file = args.next().unwrap_or_else(|| "Cargo.toml".to_string());

    let config = ClientConfig::from_env();
    info!("IO host: {}, RS host: {}", config.io_host, config.rs_host);

    let conn = Connection::new(&token, &config)?;
    let rs = Service::new(&conn, table)?;

    // Upload a local file
    info!("Uploading {}...", local_file);
    let put = rs.put_file(&local_file, None, &local_file, None).await?;
    info!("Stored! Hash: {}", put.data.hash);

    // Read its attributes back
    let entry = rs.stat(&local_file).await?.data;
    info!("Size: {} bytes, mime type: {}", entry.fsize, entry.mime_type);

    // Get a download URL
    let grant = rs.get(&local_file, Some("download.txt")).await?.data;
    info!("Download from {} (valid {}s)", grant.url, grant.expires);

    // Delete it again
    let code = rs.delete(&local_file).await?;
    info!("Deleted with status {}", code);

    info!("Example completed successfully!");
    Ok(())
}
