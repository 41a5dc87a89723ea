use std::sync::Arc;

use regex::Regex;

use crate::db::NickStore;

/// Longest name relayed to IRC for a Matrix user, in characters.
pub const MAX_NICK_CHARS: usize = 16;

/// Picks the name a Matrix user is shown under on IRC.
#[derive(Clone)]
pub struct IdentityResolver {
    nick_store: Arc<NickStore>,
    suffix_pattern: Regex,
}

impl IdentityResolver {
    pub fn new(nick_store: Arc<NickStore>, suffix_pattern: Regex) -> Self {
        Self {
            nick_store,
            suffix_pattern,
        }
    }

    pub fn resolve(&self, user_id: &str, display_name: &str) -> String {
        if let Some(alias) = self.nick_store.get(user_id) {
            return alias;
        }

        let stripped = self.suffix_pattern.replace(display_name, "");
        let trimmed = stripped.trim();
        let name = if trimmed.is_empty() {
            localpart(user_id)
        } else {
            trimmed
        };
        truncate_chars(name, MAX_NICK_CHARS)
    }
}

pub(crate) fn localpart(user_id: &str) -> &str {
    let without_sigil = user_id.strip_prefix('@').unwrap_or(user_id);
    without_sigil
        .split_once(':')
        .map(|(local, _)| local)
        .unwrap_or(without_sigil)
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
