use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;

use mokart_api::{config::DEFAULT_PORT, logger, start_server, ApiConfig};

#[derive(Parser, Debug)]
#[command(name = "mokart_api", about = "Mokart telemetry API")]
struct Args {
    /// Interface to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to serve on
    #[arg(long, env = "MOKART_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Accept the demo credentials (same as MOKART_DEMO_MODE=1)
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::init_logger();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()
        .context("invalid configuration")?
        .with_bind_addr(SocketAddr::new(args.host, args.port));
    if args.demo {
        config = config.with_demo_mode(true);
    }

    start_server(config).await.context("server failed")?;
    Ok(())
}
