use sdwan_flow::app;
use std::env;

/// Starts the upload web app
///
/// The bind address comes from `SDWAN_FLOW_ADDR`, defaulting to
/// `127.0.0.1:3000`. Log level is taken from `RUST_LOG`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr = env::var("SDWAN_FLOW_ADDR").unwrap_or_else(|_| app::DEFAULT_ADDR.to_string());
    app::run(&addr).await
}
