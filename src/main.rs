#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info};

mod bridge;
mod cli;
mod config;
mod db;
mod irc;
mod matrix;
mod media;
mod parsers;
mod paste;
mod utils;
mod web;

use crate::bridge::{BridgeCore, BridgeOptions, EVENT_QUEUE_CAPACITY, RoomMap};
use crate::config::Config;
use crate::db::{NICK_FLUSH_INTERVAL, NickStore};
use crate::irc::IrcClient;
use crate::matrix::MatrixBot;
use crate::paste::{PasteClient, PasteService};
use crate::web::WebServer;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    let config = Config::load_from_file(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    if args.check_config {
        println!("{}: configuration is valid", args.config.display());
        return Ok(());
    }

    utils::logging::init_tracing(&config.logging);
    info!("matrix-irc bridge starting up");

    let nick_store = Arc::new(
        NickStore::load(&config.bridge.nick_store_path).context("failed to load nickname store")?,
    );

    let room_map = Arc::new(RoomMap::from_pairs(&config.bridge.mapping)?);
    let paste: Arc<dyn PasteService> = Arc::new(PasteClient::new(&config.paste)?);
    let options = BridgeOptions::from_config(&config.bridge)?;

    let (irc_client, irc_stream) = IrcClient::connect(&config.irc)
        .await
        .context("failed to connect to irc")?;
    let irc_client = Arc::new(irc_client);

    let matrix = Arc::new(MatrixBot::connect(&config.matrix).await?);
    matrix.join_rooms(room_map.rooms()).await;

    let bridge = BridgeCore::new(
        matrix.clone(),
        irc_client.clone(),
        room_map.clone(),
        nick_store.clone(),
        paste,
        options,
    );

    let (irc_tx, irc_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let (matrix_tx, matrix_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

    let irc_handle = {
        let irc = irc_client.clone();
        let channels = bridge.irc_channels();
        tokio::spawn(async move {
            irc_stream
                .run(&*irc, irc.nickname(), &channels, irc_tx)
                .await
        })
    };

    let sync_handle = {
        let matrix = matrix.clone();
        tokio::spawn(async move { matrix.run_sync(matrix_tx).await })
    };

    let flusher_handle = {
        let store = nick_store.clone();
        tokio::spawn(async move { store.run_flusher(NICK_FLUSH_INTERVAL).await })
    };

    {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.run_irc_consumer(irc_rx).await });
    }
    {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.run_matrix_consumer(matrix_rx).await });
    }
    {
        let bridge = bridge.clone();
        let interval = Duration::from_secs(config.irc.rejoin_interval_secs);
        tokio::spawn(async move { bridge.run_rejoin(interval).await });
    }

    if config.metrics.enabled {
        let web_server = WebServer::new(config.metrics.clone(), room_map.clone(), nick_store.clone());
        tokio::spawn(async move {
            if let Err(e) = web_server.start().await {
                error!("status server error: {}", e);
            }
        });
    }

    let failure = tokio::select! {
        joined = irc_handle => task_failure("irc connection", joined),
        joined = sync_handle => task_failure("matrix sync", joined),
        joined = flusher_handle => task_failure("nickname store flusher", joined),
    };
    error!("{failure:#}");

    if nick_store.is_dirty() {
        info!(
            "saving pending nickname changes to {}",
            nick_store.path().display()
        );
        if let Err(err) = nick_store.flush().await {
            error!("final nickname store flush failed: {err}");
        }
    }

    info!("matrix-irc bridge shutting down");
    Err(failure)
}

/// Every supervised task is meant to run forever; turn its exit into the
/// error `main` returns.
fn task_failure<E>(name: &str, joined: Result<Result<(), E>, JoinError>) -> anyhow::Error
where
    E: Into<anyhow::Error>,
{
    match joined {
        Ok(Ok(())) => anyhow!("{name} stopped"),
        Ok(Err(err)) => err.into().context(format!("{name} failed")),
        Err(err) => anyhow!(err).context(format!("{name} task panicked")),
    }
}
