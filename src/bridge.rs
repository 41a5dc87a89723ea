use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::db::NickStore;
use crate::irc::{IrcInboundMessage, IrcTarget};
use crate::matrix::{
    MatrixCommandHandler, MatrixCommandOutcome, MatrixContent, MatrixTarget, MatrixTimelineEvent,
    is_stale,
};
use crate::parsers::MessageUtils;
use crate::paste::PasteService;
use crate::web::metrics::Metrics;

pub mod identity;
pub mod message_flow;
pub mod overflow;
pub mod reply;
pub mod room_map;
#[cfg(test)]
mod testing;

pub use self::room_map::RoomMap;

use self::identity::IdentityResolver;
use self::overflow::OverflowOffloader;
use self::reply::ReplyResolver;

/// Capacity of each per-source event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotInChannel,
    UnmappedChannel,
    Backfill,
    UnmappedRoom,
    OwnMessage,
    Stale,
    NotLive,
    UnsupportedContent,
    OffloadFailed,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotInChannel => "not_in_channel",
            Self::UnmappedChannel => "unmapped_channel",
            Self::Backfill => "backfill",
            Self::UnmappedRoom => "unmapped_room",
            Self::OwnMessage => "own_message",
            Self::Stale => "stale",
            Self::NotLive => "not_live",
            Self::UnsupportedContent => "unsupported_content",
            Self::OffloadFailed => "offload_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Relayed,
    /// Consumed as a bridge command.
    Handled,
    Dropped(DropReason),
}

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub display_name_suffix: Regex,
    pub stale_after: Duration,
    pub reply_lookup_timeout: Duration,
}

impl BridgeOptions {
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        Ok(Self {
            display_name_suffix: Regex::new(&config.display_name_suffix_pattern)?,
            stale_after: Duration::from_secs(config.stale_after_secs),
            reply_lookup_timeout: Duration::from_millis(config.reply_lookup_timeout_ms),
        })
    }
}

/// Everything one relay decision needs, shared by every pipeline task.
#[derive(Clone)]
pub struct BridgeCore {
    matrix: Arc<dyn MatrixTarget>,
    irc: Arc<dyn IrcTarget>,
    room_map: Arc<RoomMap>,
    identity: IdentityResolver,
    commands: Arc<MatrixCommandHandler>,
    offloader: OverflowOffloader,
    replies: ReplyResolver,
    stale_after_ms: i64,
}

impl BridgeCore {
    pub fn new(
        matrix: Arc<dyn MatrixTarget>,
        irc: Arc<dyn IrcTarget>,
        room_map: Arc<RoomMap>,
        nick_store: Arc<NickStore>,
        paste: Arc<dyn PasteService>,
        options: BridgeOptions,
    ) -> Self {
        let identity = IdentityResolver::new(nick_store.clone(), options.display_name_suffix);
        Self {
            replies: ReplyResolver::new(
                matrix.clone(),
                identity.clone(),
                options.reply_lookup_timeout,
            ),
            commands: Arc::new(MatrixCommandHandler::new(nick_store)),
            offloader: OverflowOffloader::new(paste),
            stale_after_ms: i64::try_from(options.stale_after.as_millis()).unwrap_or(i64::MAX),
            identity,
            matrix,
            irc,
            room_map,
        }
    }

    pub fn irc_channels(&self) -> Vec<String> {
        self.room_map.channels().map(ToOwned::to_owned).collect()
    }

    pub async fn handle_irc_message(&self, message: IrcInboundMessage) -> Result<RelayOutcome> {
        Metrics::irc_message_received();
        debug!(
            "irc inbound message nick={} target={:?} kind={:?} body_preview={}",
            message.nick,
            message.target,
            message.kind,
            MessageUtils::preview_text(&message.message)
        );

        let Some(channel) = message.target.as_deref() else {
            return Ok(irc_dropped(DropReason::NotInChannel));
        };
        let Some(room_id) = self.room_map.irc_to_matrix(channel) else {
            return Ok(irc_dropped(DropReason::UnmappedChannel));
        };

        let outbound = message_flow::irc_to_matrix(&message, room_id);
        match self
            .matrix
            .send_text(&outbound.room_id, &outbound.body, &outbound.irc_nick)
            .await
        {
            Ok(event_id) => {
                debug!(
                    "irc message relayed channel={} room_id={} event_id={}",
                    channel, outbound.room_id, event_id
                );
                Metrics::irc_message_relayed();
                Ok(RelayOutcome::Relayed)
            }
            Err(err) => {
                Metrics::irc_message_failed();
                Err(err)
            }
        }
    }

    pub async fn handle_matrix_event(&self, event: MatrixTimelineEvent) -> Result<RelayOutcome> {
        self.relay_matrix_event(event, Utc::now().timestamp_millis())
            .await
    }

    async fn relay_matrix_event(
        &self,
        event: MatrixTimelineEvent,
        now_ms: i64,
    ) -> Result<RelayOutcome> {
        Metrics::matrix_message_received();
        debug!(
            "matrix inbound event event_id={} room_id={} sender={} backfill={} live={} ts={}",
            event.event_id,
            event.room_id,
            event.sender.user_id,
            event.backfill,
            event.live,
            event.timestamp_ms
        );

        if let Err(err) = self
            .matrix
            .send_read_receipt(&event.room_id, &event.event_id)
            .await
        {
            warn!(
                "failed to send read receipt for {} in {}: {err:#}",
                event.event_id, event.room_id
            );
        }

        if event.backfill {
            return Ok(matrix_dropped(DropReason::Backfill));
        }
        let Some(channel) = self.room_map.matrix_to_irc(&event.room_id) else {
            return Ok(matrix_dropped(DropReason::UnmappedRoom));
        };
        if event.sender.user_id == self.matrix.user_id() {
            return Ok(matrix_dropped(DropReason::OwnMessage));
        }
        if is_stale(event.timestamp_ms, now_ms, self.stale_after_ms) {
            return Ok(matrix_dropped(DropReason::Stale));
        }
        if !event.live {
            return Ok(matrix_dropped(DropReason::NotLive));
        }
        let Some(content) = event.content.as_ref() else {
            return Ok(matrix_dropped(DropReason::UnsupportedContent));
        };

        if let MatrixContent::PlainText { body } = content {
            if self.commands.is_command(body) {
                if let MatrixCommandOutcome::Reply(reply) =
                    self.commands.handle(&event.sender.user_id, body)
                {
                    info!(
                        "handled command from {} in {}: {}",
                        event.sender.user_id,
                        event.room_id,
                        MessageUtils::preview_text(body)
                    );
                    Metrics::command_handled();
                    self.matrix.send_notice(&event.room_id, &reply).await?;
                    return Ok(RelayOutcome::Handled);
                }
            }
        }

        let text = message_flow::matrix_text(content, |mxc| self.matrix.media_url(mxc));
        let prefix = self
            .replies
            .prefix(&event.room_id, event.reply_to.as_deref())
            .await;

        let text = match self.offloader.apply(text).await {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    "dropping {} from {}: long message could not be offloaded: {err}",
                    event.event_id, event.sender.user_id
                );
                Metrics::paste_failed();
                return Ok(matrix_dropped(DropReason::OffloadFailed));
            }
        };

        let name = self
            .identity
            .resolve(&event.sender.user_id, &event.sender.display_name);
        let outbound = message_flow::matrix_to_irc(content, channel, &name, &prefix, &text);

        match self.irc.send_chat(&outbound.channel, &outbound.text).await {
            Ok(()) => {
                debug!(
                    "matrix event relayed event_id={} channel={} text_preview={}",
                    event.event_id,
                    outbound.channel,
                    MessageUtils::preview_text(&outbound.text)
                );
                Metrics::matrix_message_relayed();
                Ok(RelayOutcome::Relayed)
            }
            Err(err) => {
                Metrics::matrix_message_failed();
                Err(err)
            }
        }
    }

    /// Drains the IRC queue, one pipeline task per message.
    pub async fn run_irc_consumer(&self, mut events: mpsc::Receiver<IrcInboundMessage>) {
        let mut pipelines = JoinSet::new();
        while let Some(message) = events.recv().await {
            let bridge = self.clone();
            pipelines.spawn(async move {
                if let Err(err) = bridge.handle_irc_message(message).await {
                    warn!("failed to relay irc message to matrix: {err:#}");
                }
            });
            while pipelines.try_join_next().is_some() {}
        }
        while pipelines.join_next().await.is_some() {}
        info!("irc event queue closed");
    }

    /// Drains the Matrix queue, one pipeline task per event.
    pub async fn run_matrix_consumer(&self, mut events: mpsc::Receiver<MatrixTimelineEvent>) {
        let mut pipelines = JoinSet::new();
        while let Some(event) = events.recv().await {
            let bridge = self.clone();
            pipelines.spawn(async move {
                let event_id = event.event_id.clone();
                if let Err(err) = bridge.handle_matrix_event(event).await {
                    warn!("failed to relay matrix event {} to irc: {err:#}", event_id);
                }
            });
            while pipelines.try_join_next().is_some() {}
        }
        while pipelines.join_next().await.is_some() {}
        info!("matrix event queue closed");
    }

    /// Re-requests invites and joins for every mapped channel on a fixed
    /// interval. The first join happens on IRC registration, so the
    /// immediate tick is skipped.
    pub async fn run_rejoin(&self, interval: Duration) {
        let channels = self.irc_channels();
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            debug!("rejoining {} irc channels", channels.len());
            if let Err(err) = self.irc.join_channels(&channels).await {
                warn!("irc channel maintenance failed: {err:#}");
            }
        }
    }
}

fn irc_dropped(reason: DropReason) -> RelayOutcome {
    debug!("irc message dropped reason={}", reason.as_str());
    Metrics::irc_message_dropped();
    RelayOutcome::Dropped(reason)
}

fn matrix_dropped(reason: DropReason) -> RelayOutcome {
    debug!("matrix event dropped reason={}", reason.as_str());
    Metrics::matrix_message_dropped();
    RelayOutcome::Dropped(reason)
}
