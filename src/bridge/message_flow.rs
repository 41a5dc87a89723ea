use crate::irc::{IrcInboundMessage, IrcMessageKind};
use crate::matrix::MatrixContent;
use crate::parsers::MessageUtils;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMatrixMessage {
    pub room_id: String,
    pub body: String,
    /// Original IRC nickname, stored on the event for reply attribution.
    pub irc_nick: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundIrcMessage {
    pub channel: String,
    pub text: String,
}

pub fn irc_to_matrix(message: &IrcInboundMessage, room_id: &str) -> OutboundMatrixMessage {
    let body = match message.kind {
        IrcMessageKind::Action => format!("* {} {}", message.nick, message.message),
        IrcMessageKind::Privmsg | IrcMessageKind::Notice => {
            format!("[{}] {}", message.nick, message.message)
        }
    };

    OutboundMatrixMessage {
        room_id: room_id.to_string(),
        body,
        irc_nick: message.nick.clone(),
    }
}

/// Text of a Matrix message before the sender name and reply prefix are
/// attached. Line breaks are normalized to `\n`. Media falls back to the raw
/// URL when it is not an mxc URI.
pub fn matrix_text(content: &MatrixContent, media_url: impl Fn(&str) -> Option<String>) -> String {
    match content {
        MatrixContent::Media { body, url } | MatrixContent::Sticker { body, url } => {
            let resolved = media_url(url).unwrap_or_else(|| url.clone());
            MessageUtils::normalize_line_breaks(&format!("{body} {resolved}"))
        }
        MatrixContent::PlainText { body } | MatrixContent::Emote { body } => {
            MessageUtils::strip_reply_fallback(&MessageUtils::normalize_line_breaks(body))
        }
    }
}

pub fn matrix_to_irc(
    content: &MatrixContent,
    channel: &str,
    name: &str,
    reply_prefix: &str,
    text: &str,
) -> OutboundIrcMessage {
    let text = match content {
        MatrixContent::Emote { .. } => format!("* {name} {text}"),
        _ => format!("[{name}] {reply_prefix}{text}"),
    };

    OutboundIrcMessage {
        channel: channel.to_string(),
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn irc(kind: IrcMessageKind, message: &str) -> IrcInboundMessage {
        IrcInboundMessage {
            nick: "dave".to_string(),
            target: Some("#rust".to_string()),
            message: message.to_string(),
            kind,
        }
    }

    #[test]
    fn irc_action_renders_as_emote_line() {
        let outbound = irc_to_matrix(&irc(IrcMessageKind::Action, "waves"), "!room:example.org");

        assert_eq!(outbound.body, "* dave waves");
        assert_eq!(outbound.irc_nick, "dave");
        assert_eq!(outbound.room_id, "!room:example.org");
    }

    #[test]
    fn irc_privmsg_and_notice_render_with_brackets() {
        for kind in [IrcMessageKind::Privmsg, IrcMessageKind::Notice] {
            let outbound = irc_to_matrix(&irc(kind, "hello"), "!room:example.org");
            assert_eq!(outbound.body, "[dave] hello");
        }
    }

    #[test]
    fn media_text_includes_resolved_url() {
        let content = MatrixContent::Media {
            body: "cat.png".to_string(),
            url: "mxc://example.org/cat".to_string(),
        };
        let text = matrix_text(&content, |_| Some("https://hs/cat".to_string()));
        assert_eq!(text, "cat.png https://hs/cat");

        let text = matrix_text(&content, |_| None);
        assert_eq!(text, "cat.png mxc://example.org/cat");
    }

    #[test]
    fn plain_text_drops_reply_fallback() {
        let content = MatrixContent::PlainText {
            body: "> <@bob:example.org> hi\n\nhello back".to_string(),
        };
        assert_eq!(matrix_text(&content, |_| None), "hello back");
    }

    #[test]
    fn carriage_return_breaks_count_as_lines() {
        let content = MatrixContent::PlainText {
            body: "a\rb\rc\rd\re".to_string(),
        };

        let text = matrix_text(&content, |_| None);

        assert_eq!(text, "a\nb\nc\nd\ne");
        assert!(crate::bridge::overflow::needs_offload(&text));
    }

    #[test]
    fn crlf_reply_fallback_is_stripped() {
        let content = MatrixContent::PlainText {
            body: "> <@bob:example.org> hi\r\n\r\nhello back".to_string(),
        };
        assert_eq!(matrix_text(&content, |_| None), "hello back");
    }

    #[test]
    fn emote_line_ignores_reply_prefix() {
        let content = MatrixContent::Emote {
            body: "waves".to_string(),
        };
        let outbound = matrix_to_irc(&content, "#rust", "Alice", "bob: ", "waves");
        assert_eq!(outbound.text, "* Alice waves");
        assert_eq!(outbound.channel, "#rust");
    }

    #[test]
    fn plain_line_carries_reply_prefix() {
        let content = MatrixContent::PlainText {
            body: "sure".to_string(),
        };
        let outbound = matrix_to_irc(&content, "#rust", "D", "dave: ", "sure");
        assert_eq!(outbound.text, "[D] dave: sure");
    }
}
