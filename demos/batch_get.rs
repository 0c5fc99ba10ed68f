//! Batch download grants for the resource storage client
//!
//! Run with: QBOX_TOKEN=<access-token> cargo run --example batch_get -- <table> <key>...

use qbox_rs_client::{BatchGetParam, ClientConfig, Connection, Service};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let token = std::env::var("QBOX_TOKEN").unwrap_or_else(|_| "dev-token".to_string());
    let mut args = std::env::args().skip(1);
    let table = args.next().unwrap_or_else(|| "demo".to_string());

    // Every other key gets an attachment name and a one-hour expiry
    let params: Vec<BatchGetParam> = args
        .enumerate()
        .map(|(i, key)| {
            if i % 2 == 0 {
                BatchGetParam::from(key)
            } else {
                let name = format!("attachment-{}", i);
                BatchGetParam::key(key).with_att_name(name).with_expires(3600)
            }
        })
        .collect();

    let config = ClientConfig::from_env();
    let conn = Connection::new(&token, &config)?;
    let rs = Service::new(&conn, table)?;

    info!("Requesting {} download grants...", params.len());
    let reply = rs.batch_get(&params).await?;
    info!("Batch status: {}", reply.code);

    for (param, item) in params.iter().zip(&reply.data) {
        match item.ret() {
            Some(ret) if item.is_ok() => info!("{} -> {}", param.key_str(), ret.url),
            _ => warn!(
                "{} failed ({}): {}",
                param.key_str(),
                item.code,
                item.error().unwrap_or("unknown error")
            ),
        }
    }

    Ok(())
}
