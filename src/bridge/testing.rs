//! In-memory stand-ins for the Matrix, IRC and paste collaborators.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use reqwest::StatusCode;
use tempfile::TempDir;

use super::identity::IdentityResolver;
use crate::db::NickStore;
use crate::irc::IrcTarget;
use crate::matrix::{MatrixTarget, ReferencedEvent};
use crate::paste::{PasteError, PasteService};

pub const BRIDGE_USER: &str = "@ircbridge:example.org";
pub const SUFFIX_PATTERN: &str = r"\s*\((?:IRC|Telegram|Discord|Slack|Signal|WhatsApp)\)$";

pub fn identity_resolver(dir: &TempDir) -> (IdentityResolver, Arc<NickStore>) {
    let store = Arc::new(
        NickStore::load(dir.path().join("nicknames.json")).expect("load nickname store"),
    );
    let pattern = Regex::new(SUFFIX_PATTERN).expect("suffix pattern");
    (IdentityResolver::new(store.clone(), pattern), store)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub room_id: String,
    pub body: String,
    pub irc_nick: String,
}

#[derive(Default)]
struct MatrixRecord {
    texts: Vec<SentText>,
    notices: Vec<(String, String)>,
    receipts: Vec<(String, String)>,
    events: HashMap<String, ReferencedEvent>,
    fail_lookups: bool,
    fail_receipts: bool,
    lookup_delay: Option<Duration>,
}

pub struct RecordingMatrix {
    record: Mutex<MatrixRecord>,
}

impl RecordingMatrix {
    pub fn new() -> Self {
        Self {
            record: Mutex::new(MatrixRecord::default()),
        }
    }

    pub fn add_event(&self, event_id: &str, event: ReferencedEvent) {
        self.record.lock().events.insert(event_id.to_string(), event);
    }

    pub fn fail_event_lookups(&self) {
        self.record.lock().fail_lookups = true;
    }

    pub fn fail_receipts(&self) {
        self.record.lock().fail_receipts = true;
    }

    pub fn delay_event_lookups(&self, delay: Duration) {
        self.record.lock().lookup_delay = Some(delay);
    }

    pub fn texts(&self) -> Vec<SentText> {
        self.record.lock().texts.clone()
    }

    pub fn notices(&self) -> Vec<(String, String)> {
        self.record.lock().notices.clone()
    }

    pub fn receipts(&self) -> Vec<(String, String)> {
        self.record.lock().receipts.clone()
    }
}

#[async_trait]
impl MatrixTarget for RecordingMatrix {
    fn user_id(&self) -> &str {
        BRIDGE_USER
    }

    async fn send_text(&self, room_id: &str, body: &str, irc_nick: &str) -> Result<String> {
        let mut record = self.record.lock();
        record.texts.push(SentText {
            room_id: room_id.to_string(),
            body: body.to_string(),
            irc_nick: irc_nick.to_string(),
        });
        Ok(format!("$sent{}", record.texts.len()))
    }

    async fn send_notice(&self, room_id: &str, body: &str) -> Result<()> {
        self.record
            .lock()
            .notices
            .push((room_id.to_string(), body.to_string()));
        Ok(())
    }

    async fn send_read_receipt(&self, room_id: &str, event_id: &str) -> Result<()> {
        let mut record = self.record.lock();
        record
            .receipts
            .push((room_id.to_string(), event_id.to_string()));
        if record.fail_receipts {
            return Err(anyhow!("receipt rejected"));
        }
        Ok(())
    }

    fn media_url(&self, mxc_url: &str) -> Option<String> {
        mxc_url
            .strip_prefix("mxc://")
            .map(|rest| format!("https://matrix.example.org/_matrix/media/v3/download/{rest}"))
    }

    async fn fetch_event(&self, _room_id: &str, event_id: &str) -> Result<Option<ReferencedEvent>> {
        let (delay, fail, event) = {
            let record = self.record.lock();
            (
                record.lookup_delay,
                record.fail_lookups,
                record.events.get(event_id).cloned(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(anyhow!("event lookup failed"));
        }
        Ok(event)
    }
}

#[derive(Default)]
pub struct RecordingIrc {
    sent: Mutex<Vec<(String, String)>>,
    joins: Mutex<Vec<Vec<String>>>,
}

impl RecordingIrc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub fn joins(&self) -> Vec<Vec<String>> {
        self.joins.lock().clone()
    }
}

#[async_trait]
impl IrcTarget for RecordingIrc {
    async fn send_chat(&self, channel: &str, text: &str) -> Result<()> {
        self.sent.lock().push((channel.to_string(), text.to_string()));
        Ok(())
    }

    async fn join_channels(&self, channels: &[String]) -> Result<()> {
        self.joins.lock().push(channels.to_vec());
        Ok(())
    }
}

pub struct StubPaste {
    url: Option<String>,
    uploads: Mutex<Vec<String>>,
}

impl StubPaste {
    pub fn succeeding(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            url: None,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl PasteService for StubPaste {
    async fn upload(&self, content: &str) -> Result<String, PasteError> {
        self.uploads.lock().push(content.to_string());
        self.url
            .clone()
            .ok_or(PasteError::Status(StatusCode::SERVICE_UNAVAILABLE))
    }
}
