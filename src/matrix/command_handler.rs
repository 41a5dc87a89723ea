use std::sync::Arc;

use tracing::info;

use crate::bridge::identity::MAX_NICK_CHARS;
use crate::db::NickStore;

const COMMAND_PREFIX: char = '!';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixCommandOutcome {
    /// Not a recognised command; the message is relayed as usual.
    NotACommand,
    /// Command was consumed; send this text back into the room.
    Reply(String),
}

/// In-band administrative commands sent as Matrix messages.
pub struct MatrixCommandHandler {
    nick_store: Arc<NickStore>,
}

impl MatrixCommandHandler {
    pub fn new(nick_store: Arc<NickStore>) -> Self {
        Self { nick_store }
    }

    pub fn is_command(&self, body: &str) -> bool {
        body.starts_with(COMMAND_PREFIX)
    }

    pub fn handle(&self, sender: &str, body: &str) -> MatrixCommandOutcome {
        let Some(rest) = body.strip_prefix(COMMAND_PREFIX) else {
            return MatrixCommandOutcome::NotACommand;
        };

        let mut tokens = rest.split_whitespace();
        match tokens.next() {
            Some("nick") => self.handle_nick(sender, tokens.collect()),
            _ => MatrixCommandOutcome::NotACommand,
        }
    }

    fn handle_nick(&self, sender: &str, args: Vec<&str>) -> MatrixCommandOutcome {
        match args.as_slice() {
            [] => {
                self.nick_store.set(sender, None);
                info!("cleared nickname alias for {}", sender);
                MatrixCommandOutcome::Reply("Nickname cleared".to_string())
            }
            [alias] if alias.chars().count() <= MAX_NICK_CHARS => {
                self.nick_store.set(sender, Some(*alias));
                info!("set nickname alias for {} to {}", sender, alias);
                MatrixCommandOutcome::Reply(format!("Nickname set to {alias}"))
            }
            _ => MatrixCommandOutcome::Reply(format!(
                "Invalid format. Usage: !nick [name] (single word, at most {MAX_NICK_CHARS} characters)"
            )),
        }
    }
}
