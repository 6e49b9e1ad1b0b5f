//! Chatline entry point.

use chatline_cli::{Args, Runtime, StdioDriver};
use chatline_client::SystemEnv;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr so they never interleave with the chat on stdout
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    let store = args.identity_store()?;
    tracing::info!(endpoint = %args.endpoint, identity = %store.path().display(), "starting chatline");

    let driver = StdioDriver::new(args.endpoint.clone(), args.tick_interval());
    let runtime = Runtime::new(driver, SystemEnv::new(), store, args.connection_config());

    Ok(runtime.run().await?)
}
