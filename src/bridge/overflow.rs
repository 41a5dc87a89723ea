use std::sync::Arc;

use tracing::info;

use crate::paste::{PasteError, PasteService};

/// Text at least this many characters long is offloaded.
pub const MAX_INLINE_CHARS: usize = 160;
/// Text with more line breaks than this is offloaded.
pub const MAX_INLINE_NEWLINES: usize = 3;

pub fn needs_offload(text: &str) -> bool {
    text.chars().count() >= MAX_INLINE_CHARS || text.matches('\n').count() > MAX_INLINE_NEWLINES
}

/// Replaces text too long for an IRC line with a link to a paste of it.
#[derive(Clone)]
pub struct OverflowOffloader {
    paste: Arc<dyn PasteService>,
}

impl OverflowOffloader {
    pub fn new(paste: Arc<dyn PasteService>) -> Self {
        Self { paste }
    }

    pub async fn apply(&self, text: String) -> Result<String, PasteError> {
        if !needs_offload(&text) {
            return Ok(text);
        }

        let url = self.paste.upload(&text).await?;
        info!("offloaded long message to {}", url);
        Ok(format!("Long Msg: {url}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use test_case::test_case;

    use super::{OverflowOffloader, needs_offload};
    use crate::bridge::testing::StubPaste;

    #[test_case(&"a".repeat(159), false; "159 chars single line")]
    #[test_case(&"a".repeat(160), true; "160 chars")]
    #[test_case(&"é".repeat(159), false; "159 multibyte chars")]
    #[test_case("one\ntwo\nthree\nfour", false; "four lines")]
    #[test_case("one\ntwo\nthree\nfour\nfive", true; "five lines")]
    #[test_case("", false; "empty")]
    fn offload_threshold(text: &str, expected: bool) {
        assert_eq!(needs_offload(text), expected);
    }

    #[tokio::test]
    async fn short_text_is_left_alone() {
        let paste = Arc::new(StubPaste::succeeding("https://paste.example.org/x"));
        let offloader = OverflowOffloader::new(paste.clone());

        let text = offloader.apply("hello".to_string()).await.expect("apply");

        assert_eq!(text, "hello");
        assert!(paste.uploads().is_empty());
    }

    #[tokio::test]
    async fn long_text_becomes_link() {
        let paste = Arc::new(StubPaste::succeeding("https://paste.example.org/x"));
        let offloader = OverflowOffloader::new(paste.clone());
        let long = "a".repeat(200);

        let text = offloader.apply(long.clone()).await.expect("apply");

        assert_eq!(text, "Long Msg: https://paste.example.org/x");
        assert_eq!(paste.uploads(), vec![long]);
    }

    #[tokio::test]
    async fn failed_upload_is_an_error() {
        let paste = Arc::new(StubPaste::failing());
        let offloader = OverflowOffloader::new(paste);

        assert!(offloader.apply("a".repeat(200)).await.is_err());
    }
}
