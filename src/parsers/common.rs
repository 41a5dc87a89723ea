use once_cell::sync::Lazy;
use regex::Regex;

/// Reply fallback some Matrix clients prepend to a reply body: one or more
/// `> ` quote lines followed by an empty line.
static REPLY_FALLBACK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:>[^\n]*\n)+\n").expect("reply fallback pattern is valid"));

pub struct MessageUtils;

impl MessageUtils {
    /// Rewrites `\r\n` and lone `\r` as `\n`.
    pub fn normalize_line_breaks(body: &str) -> String {
        body.replace("\r\n", "\n").replace('\r', "\n")
    }

    pub fn strip_reply_fallback(body: &str) -> String {
        REPLY_FALLBACK.replace(body, "").into_owned()
    }

    pub fn preview_text(value: &str) -> String {
        const MAX_PREVIEW_CHARS: usize = 120;
        let mut chars = value.chars();
        let preview: String = chars.by_ref().take(MAX_PREVIEW_CHARS).collect();
        if chars.next().is_some() {
            format!("{preview}…")
        } else {
            preview
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MessageUtils;

    #[test]
    fn strips_leading_quote_block() {
        let body = "> <@bob:example.org> original line\n> second line\n\nmy answer";
        assert_eq!(MessageUtils::strip_reply_fallback(body), "my answer");
    }

    #[test]
    fn keeps_quotes_without_separator_or_in_the_middle() {
        assert_eq!(MessageUtils::strip_reply_fallback("> just quoting"), "> just quoting");
        assert_eq!(
            MessageUtils::strip_reply_fallback("hi\n> quoted\n\nbye"),
            "hi\n> quoted\n\nbye"
        );
    }

    #[test]
    fn carriage_returns_become_newlines() {
        assert_eq!(MessageUtils::normalize_line_breaks("a\r\nb\rc\nd"), "a\nb\nc\nd");
    }

    #[test]
    fn preview_is_cut_at_120_chars() {
        let long = "x".repeat(130);
        let preview = MessageUtils::preview_text(&long);
        assert_eq!(preview.chars().count(), 121);
        assert!(preview.ends_with('…'));
        assert_eq!(MessageUtils::preview_text("short"), "short");
    }
}
