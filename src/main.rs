//! Custodial wallet server entry point.
use anyhow::Result;
use clap::{Parser, Subcommand};
use custodial_wallet::api::server::WalletServer;
use custodial_wallet::core::config::AppConfig;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "custodial_wallet")]
#[command(about = "Custodial wallet API server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Server {
        /// Address to bind, overrides the config file
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overrides the config file
        #[arg(long)]
        port: Option<u16>,
    },
    /// Load and validate configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging()?;

    info!("Starting custodial wallet v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load()?;

    match args.command {
        Some(Commands::CheckConfig) => {
            config.validate()?;
            info!(?config, "configuration OK");
            Ok(())
        }
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        None => serve(config).await,
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    config.validate()?;
    let server = WalletServer::new(config).await?;
    server.start().await
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=info,h2=info"));

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
