use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use matrix_bot_sdk::client::{MatrixAuth, MatrixClient};
use parking_lot::RwLock;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::bridge::identity::localpart;
use crate::config::MatrixConfig;
use crate::media::{mxc_to_http, urlencoding};

pub mod command_handler;
pub mod event_handler;

pub use self::command_handler::{MatrixCommandHandler, MatrixCommandOutcome};
pub use self::event_handler::{AGE_LIMIT_MS, RawTimelineEvent, is_stale};

/// Content key carrying the IRC nickname on messages relayed from IRC.
pub const IRC_NICK_CONTENT_KEY: &str = "xyz.ircbridge.nick";

const SYNC_RETRY_DELAY: Duration = Duration::from_secs(5);
const INITIAL_SYNC_FILTER: &str = r#"{"room":{"timeline":{"limit":1}}}"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixIdentity {
    pub user_id: String,
    pub display_name: String,
}

/// Message content the bridge knows how to relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixContent {
    PlainText { body: String },
    Emote { body: String },
    Media { body: String, url: String },
    Sticker { body: String, url: String },
}

#[derive(Debug, Clone)]
pub struct MatrixTimelineEvent {
    pub event_id: String,
    pub room_id: String,
    pub sender: MatrixIdentity,
    /// `None` for event types and msgtypes the bridge does not relay.
    pub content: Option<MatrixContent>,
    pub timestamp_ms: i64,
    pub reply_to: Option<String>,
    /// Historical event delivered while filling the timeline.
    pub backfill: bool,
    pub live: bool,
}

/// The message a reply points at, as far as reply quoting cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencedEvent {
    pub sender: MatrixIdentity,
    pub irc_nick: Option<String>,
}

#[async_trait]
pub trait MatrixTarget: Send + Sync {
    fn user_id(&self) -> &str;

    async fn send_text(&self, room_id: &str, body: &str, irc_nick: &str) -> Result<String>;

    async fn send_notice(&self, room_id: &str, body: &str) -> Result<()>;

    async fn send_read_receipt(&self, room_id: &str, event_id: &str) -> Result<()>;

    fn media_url(&self, mxc_url: &str) -> Option<String>;

    async fn fetch_event(&self, room_id: &str, event_id: &str)
    -> Result<Option<ReferencedEvent>>;
}

struct SyncBatch {
    next_batch: String,
    events: Vec<RawTimelineEvent>,
}

/// Matrix connection of the bridge user: sends through `matrix-bot-sdk`,
/// long-polls `/sync` and reads single events over the client-server API.
pub struct MatrixBot {
    user_id: String,
    homeserver_url: Url,
    access_token: SecretString,
    sync_timeout_ms: u64,
    client: MatrixClient,
    http: reqwest::Client,
    display_names: RwLock<HashMap<(String, String), String>>,
}

impl MatrixBot {
    pub async fn connect(config: &MatrixConfig) -> Result<Self> {
        info!("connecting to matrix homeserver {}", config.homeserver_url);

        let homeserver_url = Url::parse(&config.homeserver_url)?;
        let access_token = SecretString::from(config.access_token.clone());
        let client = MatrixClient::new(
            homeserver_url.clone(),
            MatrixAuth::new(access_token.expose_secret()),
        );

        let bot = Self {
            user_id: config.user_id.clone(),
            homeserver_url,
            access_token,
            sync_timeout_ms: config.sync_timeout_ms,
            client,
            http: reqwest::Client::new(),
            display_names: RwLock::new(HashMap::new()),
        };

        let whoami = bot.whoami().await.context("matrix authentication failed")?;
        if whoami != bot.user_id {
            warn!(
                "access token belongs to {} but matrix.user_id is {}; using {}",
                whoami, bot.user_id, whoami
            );
        }

        Ok(Self {
            user_id: whoami,
            ..bot
        })
    }

    pub async fn join_rooms<'a>(&self, rooms: impl IntoIterator<Item = &'a str>) {
        for room_id in rooms {
            match self.client.join_room(room_id).await {
                Ok(joined) => info!("joined matrix room {}", joined),
                Err(err) => warn!("failed to join matrix room {}: {}", room_id, err),
            }
        }
    }

    /// Feeds timeline events into `events` until the receiver goes away.
    /// Sync failures are retried after a delay.
    pub async fn run_sync(&self, events: mpsc::Sender<MatrixTimelineEvent>) -> Result<()> {
        let mut since: Option<String> = None;

        loop {
            let batch = match self.sync_once(since.as_deref()).await {
                Ok(batch) => batch,
                Err(err) => {
                    warn!("matrix sync failed: {err:#}");
                    tokio::time::sleep(SYNC_RETRY_DELAY).await;
                    continue;
                }
            };

            let initial = since.is_none();
            since = Some(batch.next_batch);
            if initial {
                info!("matrix initial sync complete");
            }

            for raw in batch.events {
                let display_name = self.display_name(&raw.room_id, &raw.sender).await;
                let event = raw.into_timeline_event(display_name, initial, !initial);
                if events.send(event).await.is_err() {
                    info!("matrix event queue closed, stopping sync");
                    return Ok(());
                }
            }
        }
    }

    async fn whoami(&self) -> Result<String> {
        let response = self
            .http
            .get(self.endpoint("account/whoami"))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await?;
        let response = error_for_status(response, "whoami").await?;
        let payload: Value = response.json().await?;
        payload
            .get("user_id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| anyhow!("whoami response has no user_id"))
    }

    async fn sync_once(&self, since: Option<&str>) -> Result<SyncBatch> {
        let url = sync_url(&self.endpoint("sync"), since, self.sync_timeout_ms)?;
        let request = self
            .http
            .get(url)
            .bearer_auth(self.access_token.expose_secret());

        let response = error_for_status(request.send().await?, "/sync").await?;
        let payload: Value = response.json().await?;

        let next_batch = payload
            .get("next_batch")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| anyhow!("/sync response missing next_batch"))?;

        let joined_rooms = payload
            .pointer("/rooms/join")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut events = Vec::new();
        for (room_id, room) in joined_rooms {
            let state = room
                .pointer("/state/events")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let timeline = room
                .pointer("/timeline/events")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for event in state.iter().chain(timeline) {
                self.remember_member(&room_id, event);
            }

            events.extend(
                timeline
                    .iter()
                    .filter_map(|event| RawTimelineEvent::parse(&room_id, event)),
            );
        }

        debug!("matrix sync delivered {} timeline events", events.len());
        Ok(SyncBatch { next_batch, events })
    }

    fn remember_member(&self, room_id: &str, event: &Value) {
        if event.get("type").and_then(Value::as_str) != Some("m.room.member") {
            return;
        }
        let Some(user_id) = event.get("state_key").and_then(Value::as_str) else {
            return;
        };

        let key = (room_id.to_owned(), user_id.to_owned());
        match event.pointer("/content/displayname").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => {
                self.display_names.write().insert(key, name.to_owned());
            }
            _ => {
                self.display_names.write().remove(&key);
            }
        }
    }

    /// Room display name of `user_id`, falling back to the localpart.
    async fn display_name(&self, room_id: &str, user_id: &str) -> String {
        let key = (room_id.to_owned(), user_id.to_owned());
        if let Some(name) = self.display_names.read().get(&key) {
            return name.clone();
        }

        match self.fetch_member_name(room_id, user_id).await {
            Ok(Some(name)) => {
                self.display_names.write().insert(key, name.clone());
                name
            }
            Ok(None) => localpart(user_id).to_owned(),
            Err(err) => {
                debug!("failed to fetch display name of {} in {}: {err:#}", user_id, room_id);
                localpart(user_id).to_owned()
            }
        }
    }

    async fn fetch_member_name(&self, room_id: &str, user_id: &str) -> Result<Option<String>> {
        let path = format!(
            "rooms/{}/state/m.room.member/{}",
            urlencoding::encode(room_id),
            urlencoding::encode(user_id)
        );
        let response = self
            .http
            .get(self.endpoint(&path))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = error_for_status(response, "member state").await?;
        let content: Value = response.json().await?;
        Ok(content
            .get("displayname")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned))
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/_matrix/client/v3/{}",
            self.homeserver_url.as_str().trim_end_matches('/'),
            path
        )
    }
}

#[async_trait]
impl MatrixTarget for MatrixBot {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn send_text(&self, room_id: &str, body: &str, irc_nick: &str) -> Result<String> {
        let content = json!({
            "msgtype": "m.text",
            "body": body,
            IRC_NICK_CONTENT_KEY: irc_nick,
        });
        let event_id = self
            .client
            .send_event(room_id, "m.room.message", &content)
            .await?;
        Ok(event_id)
    }

    async fn send_notice(&self, room_id: &str, body: &str) -> Result<()> {
        self.client.send_notice(room_id, body).await?;
        Ok(())
    }

    async fn send_read_receipt(&self, room_id: &str, event_id: &str) -> Result<()> {
        let path = format!(
            "rooms/{}/receipt/m.read/{}",
            urlencoding::encode(room_id),
            urlencoding::encode(event_id)
        );
        let response = self
            .http
            .post(self.endpoint(&path))
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({}))
            .send()
            .await?;
        error_for_status(response, "read receipt").await?;
        Ok(())
    }

    fn media_url(&self, mxc_url: &str) -> Option<String> {
        mxc_to_http(&self.homeserver_url, mxc_url)
    }

    async fn fetch_event(
        &self,
        room_id: &str,
        event_id: &str,
    ) -> Result<Option<ReferencedEvent>> {
        let path = format!(
            "rooms/{}/event/{}",
            urlencoding::encode(room_id),
            urlencoding::encode(event_id)
        );
        let response = self
            .http
            .get(self.endpoint(&path))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = error_for_status(response, "event lookup").await?;
        let payload: Value = response.json().await?;

        let Some(raw) = RawTimelineEvent::parse(room_id, &payload) else {
            return Ok(None);
        };
        let irc_nick = raw.irc_nick();
        let display_name = self.display_name(room_id, &raw.sender).await;

        Ok(Some(ReferencedEvent {
            sender: MatrixIdentity {
                user_id: raw.sender,
                display_name,
            },
            irc_nick,
        }))
    }
}

/// `/sync` URL: a long poll from `since`, or an immediate initial sync
/// limited to the latest event per room.
fn sync_url(endpoint: &str, since: Option<&str>, timeout_ms: u64) -> Result<Url> {
    let mut url = Url::parse(endpoint)?;
    {
        let mut query = url.query_pairs_mut();
        match since {
            Some(token) => {
                query.append_pair("since", token);
                query.append_pair("timeout", &timeout_ms.to_string());
            }
            None => {
                query.append_pair("timeout", "0");
                query.append_pair("filter", INITIAL_SYNC_FILTER);
            }
        }
    }
    Ok(url)
}

async fn error_for_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!(
        "matrix {} failed: HTTP {} {}",
        what,
        status,
        body.chars().take(300).collect::<String>()
    ))
}
