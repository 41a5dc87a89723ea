use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::StreamExt;
use ::irc::client::prelude::{Client, Command, Config as IrcClientConfig, Response, Sender};
use ::irc::client::ClientStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::IrcConfig;

const CTCP_ACTION_PREFIX: &str = "\x01ACTION ";
const CTCP_DELIMITER: char = '\x01';

/// Payload bytes per PRIVMSG. Leaves room for the command, target and the
/// prefix the server adds within the 512-byte line limit.
pub const MAX_LINE_BYTES: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrcMessageKind {
    Privmsg,
    Action,
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcInboundMessage {
    pub nick: String,
    /// Destination channel; `None` for private messages.
    pub target: Option<String>,
    pub message: String,
    pub kind: IrcMessageKind,
}

impl IrcInboundMessage {
    /// Decodes a PRIVMSG or NOTICE. CTCP requests other than ACTION are
    /// not chat and yield `None`.
    pub fn decode(nick: &str, target: &str, text: &str, notice: bool) -> Option<Self> {
        let (kind, message) = if let Some(action) = text.strip_prefix(CTCP_ACTION_PREFIX) {
            (
                IrcMessageKind::Action,
                action.trim_end_matches(CTCP_DELIMITER),
            )
        } else if text.starts_with(CTCP_DELIMITER) {
            return None;
        } else if notice {
            (IrcMessageKind::Notice, text)
        } else {
            (IrcMessageKind::Privmsg, text)
        };

        Some(Self {
            nick: nick.to_owned(),
            target: is_channel_name(target).then(|| target.to_owned()),
            message: message.to_owned(),
            kind,
        })
    }
}

pub fn is_channel_name(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}

/// Splits outgoing text into PRIVMSG payloads. CR and LF both end a line,
/// other control characters except CTCP framing are removed, and long lines
/// are cut on character boundaries at `MAX_LINE_BYTES`.
pub fn irc_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.split(['\r', '\n']) {
        let line: String = raw
            .chars()
            .filter(|c| *c == CTCP_DELIMITER || !c.is_control())
            .collect();
        if line.trim().is_empty() {
            continue;
        }
        push_chunks(&line, MAX_LINE_BYTES, &mut lines);
    }
    lines
}

fn push_chunks(line: &str, max_bytes: usize, out: &mut Vec<String>) {
    let mut chunk = String::new();
    for ch in line.chars() {
        if !chunk.is_empty() && chunk.len() + ch.len_utf8() > max_bytes {
            out.push(std::mem::take(&mut chunk));
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        out.push(chunk);
    }
}

#[async_trait]
pub trait IrcTarget: Send + Sync {
    async fn send_chat(&self, channel: &str, text: &str) -> Result<()>;

    async fn join_channels(&self, channels: &[String]) -> Result<()>;
}

/// Sending half of the IRC connection.
pub struct IrcClient {
    nickname: String,
    sender: Sender,
}

/// Receiving half of the IRC connection. Ending the stream ends the bridge.
pub struct IrcEventStream {
    _client: Client,
    stream: ClientStream,
}

impl IrcClient {
    pub async fn connect(config: &IrcConfig) -> Result<(Self, IrcEventStream)> {
        let client_config = IrcClientConfig {
            nickname: Some(config.nickname.clone()),
            username: config.username.clone(),
            realname: config.realname.clone(),
            server: Some(config.server.clone()),
            port: Some(config.port),
            use_tls: Some(config.use_tls),
            password: config.password.clone(),
            nick_password: config.nickserv_password.clone(),
            ..IrcClientConfig::default()
        };

        let mut client = Client::from_config(client_config)
            .await
            .map_err(|e| anyhow!("irc client error: {e}"))?;
        client
            .identify()
            .map_err(|e| anyhow!("irc identify error: {e}"))?;

        let sender = client.sender();
        let stream = client
            .stream()
            .map_err(|e| anyhow!("irc stream error: {e}"))?;

        info!("irc connected to {}:{}", config.server, config.port);

        Ok((
            Self {
                nickname: config.nickname.clone(),
                sender,
            },
            IrcEventStream {
                _client: client,
                stream,
            },
        ))
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }
}

#[async_trait]
impl IrcTarget for IrcClient {
    async fn send_chat(&self, channel: &str, text: &str) -> Result<()> {
        for line in irc_lines(text) {
            self.sender
                .send_privmsg(channel, &line)
                .map_err(|e| anyhow!("failed to send to {channel}: {e}"))?;
        }
        Ok(())
    }

    async fn join_channels(&self, channels: &[String]) -> Result<()> {
        for channel in channels {
            debug!("asking ChanServ for an invite to {}", channel);
            self.sender
                .send_privmsg("ChanServ", format!("INVITE {channel}"))
                .map_err(|e| anyhow!("failed to request invite to {channel}: {e}"))?;
            self.sender
                .send_join(channel)
                .map_err(|e| anyhow!("failed to join {channel}: {e}"))?;
            info!("joining irc channel {}", channel);
        }
        Ok(())
    }
}

impl IrcEventStream {
    /// Pumps chat messages into `events` and (re)joins `channels` whenever
    /// registration completes. Always ends with an error: losing the IRC
    /// connection is fatal.
    pub async fn run(
        mut self,
        irc: &dyn IrcTarget,
        own_nick: &str,
        channels: &[String],
        events: mpsc::Sender<IrcInboundMessage>,
    ) -> Result<()> {
        while let Some(message) = self.stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    error!("irc connection error: {err}");
                    return Err(anyhow!("irc connection error: {err}"));
                }
            };

            let source = message.source_nickname().unwrap_or_default().to_owned();
            let decoded = match &message.command {
                Command::PRIVMSG(target, text) => {
                    IrcInboundMessage::decode(&source, target, text, false)
                }
                Command::NOTICE(target, text) if !source.is_empty() => {
                    IrcInboundMessage::decode(&source, target, text, true)
                }
                Command::Response(resp, _)
                    if *resp == Response::RPL_ENDOFMOTD || *resp == Response::ERR_NOMOTD =>
                {
                    info!("irc registration complete, joining mapped channels");
                    if let Err(err) = irc.join_channels(channels).await {
                        warn!("failed to join irc channels: {err:#}");
                    }
                    None
                }
                _ => None,
            };

            let Some(decoded) = decoded else {
                continue;
            };
            if decoded.nick.eq_ignore_ascii_case(own_nick) {
                continue;
            }
            if events.send(decoded).await.is_err() {
                return Err(anyhow!("irc event queue closed"));
            }
        }

        error!("irc connection closed");
        Err(anyhow!("irc connection closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::{IrcInboundMessage, IrcMessageKind, MAX_LINE_BYTES, irc_lines, is_channel_name};

    #[test]
    fn channel_privmsg_decodes() {
        let message = IrcInboundMessage::decode("dave", "#rust", "hello", false)
            .expect("privmsg should decode");

        assert_eq!(
            message,
            IrcInboundMessage {
                nick: "dave".to_string(),
                target: Some("#rust".to_string()),
                message: "hello".to_string(),
                kind: IrcMessageKind::Privmsg,
            }
        );
    }

    #[test]
    fn ctcp_action_decodes_as_action() {
        let message = IrcInboundMessage::decode("dave", "#rust", "\x01ACTION waves\x01", false)
            .expect("action should decode");

        assert_eq!(message.kind, IrcMessageKind::Action);
        assert_eq!(message.message, "waves");
    }

    #[test]
    fn other_ctcp_is_ignored() {
        assert!(IrcInboundMessage::decode("dave", "#rust", "\x01VERSION\x01", false).is_none());
    }

    #[test]
    fn private_message_has_no_channel() {
        let message = IrcInboundMessage::decode("dave", "matrixbridge", "psst", false)
            .expect("private message should decode");

        assert_eq!(message.target, None);
    }

    #[test]
    fn notice_keeps_its_kind() {
        let message = IrcInboundMessage::decode("ChanServ", "#rust", "topic set", true)
            .expect("notice should decode");

        assert_eq!(message.kind, IrcMessageKind::Notice);
    }

    #[test]
    fn carriage_return_ends_a_line() {
        let lines = irc_lines("[Alice] hi\rQUIT :gone\r\nPRIVMSG NickServ :identify x");

        assert_eq!(
            lines,
            vec![
                "[Alice] hi".to_string(),
                "QUIT :gone".to_string(),
                "PRIVMSG NickServ :identify x".to_string(),
            ]
        );
        assert!(lines.iter().all(|line| !line.contains(['\r', '\n'])));
    }

    #[test]
    fn control_characters_are_removed_except_ctcp_framing() {
        let lines = irc_lines("\x01ACTION waves\x01\0\x07\tok");

        assert_eq!(lines, vec!["\x01ACTION waves\x01ok".to_string()]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(irc_lines("one\r\r\n  \ntwo"), vec!["one".to_string(), "two".to_string()]);
        assert!(irc_lines("\r\n").is_empty());
    }

    #[test]
    fn long_multibyte_line_is_split_on_char_boundaries() {
        let text = format!("[Alice] bob: {}", "漢".repeat(159));

        let lines = irc_lines(&text);

        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|line| line.len() <= MAX_LINE_BYTES));
        assert_eq!(lines.concat(), text);
    }

    #[test]
    fn channel_prefixes() {
        assert!(is_channel_name("#rust"));
        assert!(is_channel_name("&local"));
        assert!(!is_channel_name("dave"));
    }
}
