use anyhow::Result;
use clap::Parser;
use relay_server::signaling::{self, OfferSource};
use relay_server::state::Config;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Selective forwarding relay: answers offers and forwards each session's
/// audio and video to every other session
#[derive(Debug, Parser)]
#[command(name = "relay-server", version)]
struct Cli {
    /// File holding a base64 offer; repeat to answer several in order.
    /// Offers are read from stdin, one per line, when none is given
    #[arg(long = "offer", value_name = "PATH")]
    offers: Vec<PathBuf>,

    /// Seconds to wait between offer files
    #[arg(long, value_name = "SECS", default_value_t = 0)]
    offer_interval: u64,

    /// Config file (defaults to ./relay.toml when present)
    #[arg(long, short, env = "RELAY_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, stdout carries answers only
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting relay...");

    let config = Config::load(cli.config.as_deref())?;
    let relay = relay_server::create_relay(&config)?;

    let source = if cli.offers.is_empty() {
        OfferSource::Stdin
    } else {
        OfferSource::Files {
            paths: cli.offers,
            interval: Duration::from_secs(cli.offer_interval),
        }
    };

    let serve = async {
        let mut stdout = tokio::io::stdout();
        match signaling::run(&relay, &source, &mut stdout).await {
            Ok(answered) => tracing::info!("Answered {} offers, relaying until interrupted", answered),
            Err(e) => tracing::error!("Offer intake stopped: {}", e),
        }
        std::future::pending::<()>().await
    };

    tokio::select! {
        _ = serve => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for interrupt: {}", e);
            }
        }
    }

    relay.shutdown().await;
    tracing::info!("Relay stopped");

    Ok(())
}
