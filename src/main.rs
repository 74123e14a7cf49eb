use std::process::ExitCode;

use clap::Parser;
use daq_ingest::{
    cli::Cli,
    config::BridgeConfig,
    error::BridgeError,
    ingest::IngestLoop,
    store::{DocumentStore, SqliteStore},
    transport::{self, MqttTransport},
};
use tracing::{error, info, span, Instrument, Level};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.log_level.as_deref() {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), BridgeError> {
    info!(
        private = %cli.config_private.display(),
        public = %cli.config_public.display(),
        "reading configuration"
    );
    let cfg = BridgeConfig::load(&cli.config_private, &cli.config_public)?;

    let store = SqliteStore::open(&cfg.store.path).await?;
    store.ping().await?;
    info!(path = %cfg.store.path.display(), "store is operational");

    let (tx, mut rx) = transport::queue();
    let mut transport = MqttTransport::spawn(&cfg.mqtt, tx)?;
    let mut ingest = IngestLoop::new(store, &cfg.ingest);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("listening for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    let res = ingest
        .run(
            &mut rx,
            shutdown,
            transport.stop(),
            cfg.ingest.shutdown_grace(),
        )
        .instrument(span!(Level::INFO, "Ingest"))
        .await;

    // no-op after a clean shutdown, stops the broker connection after a fatal error
    transport.stop().await;
    res?;
    Ok(())
}
