use std::{env, path::PathBuf, process, sync::Arc};

use clap::Parser;
use revolt_api::{RevoltClient, TokenKind, UsersApi};
use song_tally::{
    archive::UploadArchive,
    audio::SymphoniaDecoder,
    commands::{CommandHint, Dispatcher},
    config::BotConfig,
    handler::TallyHandler,
    ingest::UploadPipeline,
    live::LiveUploads,
    rescan::Rescanner,
    store::FileStatStore,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Count the songs posted in a Revolt channel.
#[derive(Debug, Parser)]
#[command(name = "song_tally", version)]
struct Cli {
    /// Load environment variables from this file instead of `.env`.
    #[arg(short, long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Revolt token; falls back to REVOLT_TOKEN.
    #[arg(short, long)]
    token: Option<String>,

    /// Treat the token as a user session token rather than a bot token.
    #[arg(long)]
    user: bool,

    /// JSON config file; every field is optional.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stats file, overriding the config.
    #[arg(short, long, value_name = "FILE")]
    data_file: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "song_tally=debug,revolt_api=debug"
    } else {
        "song_tally=info,revolt_api=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load the env file before logging starts so RUST_LOG can live there.
    let env_loaded = match &cli.env_file {
        Some(path) => dotenvy::from_path(path).map(|_| ()),
        None => dotenvy::dotenv().map(|_| ()),
    };
    init_tracing(cli.verbose);

    match (&cli.env_file, env_loaded) {
        (Some(path), Err(e)) => {
            error!("Failed to load env file '{}': {e}", path.display());
            process::exit(1);
        }
        (None, Err(e)) if !e.not_found() => {
            error!("Failed to load .env: {e}");
            process::exit(1);
        }
        _ => {}
    }

    if let Err(e) = run(cli).await {
        error!("{e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let token = cli.token.or_else(|| env::var("REVOLT_TOKEN").ok());
    let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
        return Err("No token provided. Pass --token or set REVOLT_TOKEN.".into());
    };

    let mut config = BotConfig::load(cli.config.as_deref())?;
    if let Some(data_file) = cli.data_file {
        config.data_file = data_file;
        config.validate()?;
    }
    if let Some(path) = &cli.config {
        debug!("Successfully validated config file: {}", path.display());
    }

    let store = Arc::new(FileStatStore::new(&config.data_file));
    let decoder = Arc::new(SymphoniaDecoder);
    let archive = config
        .save_uploads
        .then(|| UploadArchive::new(&config.download_dir, &config.display_names));

    let pipeline = Arc::new(UploadPipeline::new(store.clone(), decoder, archive));
    let rescanner = Arc::new(Rescanner::with_pipeline(
        pipeline.clone(),
        config.monitored_channel.clone(),
    ));
    let live = Arc::new(LiveUploads::new(
        pipeline,
        rescanner.clone(),
        config.announce_rejections,
    ));
    let dispatcher = Arc::new(Dispatcher::new(store, rescanner, Arc::new(CommandHint)));

    let client = RevoltClient::new(
        config.base_url.clone(),
        config.ws_url.clone(),
        config.autumn_url.clone(),
    )?;
    let kind = if cli.user {
        TokenKind::Session
    } else {
        TokenKind::Bot
    };
    client.set_token(Some((kind, token))).await;

    let handler = TallyHandler::new(live, dispatcher);
    let me = client.fetch_self().await?;
    info!("Logged in as {}", me.tag());
    handler.set_bot_user_id(me.id).await;

    client.event_handler(handler).await?;
    client.start().await?;
    info!(
        channel = %config.monitored_channel,
        data_file = %config.data_file.display(),
        "Bot is running. Press Ctrl+C to stop."
    );

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutting down...");
            if let Err(e) = client.close_ws(Some("Shutting down")).await {
                error!("Error during shutdown: {e}");
            }
        }
        Err(e) => error!("Error waiting for Ctrl+C: {e}"),
    }
    Ok(())
}
