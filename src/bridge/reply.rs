use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::identity::IdentityResolver;
use crate::matrix::MatrixTarget;

/// Works out who a Matrix reply is addressed to, for the `name: ` prefix
/// on the IRC side.
#[derive(Clone)]
pub struct ReplyResolver {
    matrix: Arc<dyn MatrixTarget>,
    identity: IdentityResolver,
    timeout: Duration,
}

impl ReplyResolver {
    pub fn new(matrix: Arc<dyn MatrixTarget>, identity: IdentityResolver, timeout: Duration) -> Self {
        Self {
            matrix,
            identity,
            timeout,
        }
    }

    /// Returns `"<name>: "`, or an empty string when there is no reply or
    /// the original cannot be found in time.
    pub async fn prefix(&self, room_id: &str, reply_to: Option<&str>) -> String {
        let Some(event_id) = reply_to else {
            return String::new();
        };

        let lookup = self.matrix.fetch_event(room_id, event_id);
        let referenced = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(Some(referenced))) => referenced,
            Ok(Ok(None)) => {
                debug!("reply target {} not found in {}", event_id, room_id);
                return String::new();
            }
            Ok(Err(err)) => {
                warn!("failed to fetch reply target {} in {}: {err:#}", event_id, room_id);
                return String::new();
            }
            Err(_) => {
                warn!(
                    "timed out after {:?} fetching reply target {} in {}",
                    self.timeout, event_id, room_id
                );
                return String::new();
            }
        };

        let name = match referenced.irc_nick {
            Some(nick) => nick,
            None => self
                .identity
                .resolve(&referenced.sender.user_id, &referenced.sender.display_name),
        };
        format!("{name}: ")
    }
}
