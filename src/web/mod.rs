use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use once_cell::sync::OnceCell;
use salvo::prelude::*;
use tracing::info;

use crate::bridge::RoomMap;
use crate::config::MetricsConfig;
use crate::db::NickStore;

pub mod handlers;
pub mod metrics;

use self::handlers::{get_status, health_check, metrics_endpoint};

#[derive(Clone)]
pub struct WebState {
    pub room_map: Arc<RoomMap>,
    pub nick_store: Arc<NickStore>,
    pub started_at: Instant,
}

static WEB_STATE: OnceCell<WebState> = OnceCell::new();

pub fn web_state() -> Option<&'static WebState> {
    WEB_STATE.get()
}

pub fn create_router() -> Router {
    Router::new()
        .push(Router::with_path("health").get(health_check))
        .push(Router::with_path("status").get(get_status))
        .push(Router::with_path("metrics").get(metrics_endpoint))
}

/// Read-only status endpoints for operators and probes.
#[derive(Clone)]
pub struct WebServer {
    config: MetricsConfig,
}

impl WebServer {
    pub fn new(config: MetricsConfig, room_map: Arc<RoomMap>, nick_store: Arc<NickStore>) -> Self {
        let _ = WEB_STATE.set(WebState {
            room_map,
            nick_store,
            started_at: Instant::now(),
        });

        Self { config }
    }

    pub async fn start(&self) -> Result<()> {
        let bind_addr = format!("{}:{}", self.config.bind_address, self.config.port);
        info!("starting status server on {}", bind_addr);

        let acceptor = TcpListener::new(bind_addr).bind().await;
        Server::new(acceptor).serve(create_router()).await;

        Ok(())
    }
}
