use clap::Parser;
use kinde_starter_kit::{AppConfig, KindeError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    name = "kinde-starter-kit",
    about = "Serve the Kinde starter kit site. Settings come from the environment or a .env file."
)]
struct Cli {
    /// Overrides SITE_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Overrides SITE_PORT.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), KindeError> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = AppConfig::from_env()?;
    if let Some(host) = cli.host {
        config.site_host = host;
    }
    if let Some(port) = cli.port {
        config.site_port = port;
    }

    kinde_starter_kit::serve(config).await
}
