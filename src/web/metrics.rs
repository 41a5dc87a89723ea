use std::sync::atomic::{AtomicU64, Ordering};

static IRC_MESSAGES_RECEIVED: AtomicU64 = AtomicU64::new(0);
static IRC_MESSAGES_RELAYED: AtomicU64 = AtomicU64::new(0);
static IRC_MESSAGES_DROPPED: AtomicU64 = AtomicU64::new(0);
static IRC_MESSAGES_FAILED: AtomicU64 = AtomicU64::new(0);
static MATRIX_MESSAGES_RECEIVED: AtomicU64 = AtomicU64::new(0);
static MATRIX_MESSAGES_RELAYED: AtomicU64 = AtomicU64::new(0);
static MATRIX_MESSAGES_DROPPED: AtomicU64 = AtomicU64::new(0);
static MATRIX_MESSAGES_FAILED: AtomicU64 = AtomicU64::new(0);
static COMMANDS_HANDLED: AtomicU64 = AtomicU64::new(0);
static PASTE_FAILURES: AtomicU64 = AtomicU64::new(0);

/// Process-wide relay counters.
pub struct Metrics;

impl Metrics {
    pub fn irc_message_received() {
        IRC_MESSAGES_RECEIVED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn irc_message_relayed() {
        IRC_MESSAGES_RELAYED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn irc_message_dropped() {
        IRC_MESSAGES_DROPPED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn irc_message_failed() {
        IRC_MESSAGES_FAILED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn matrix_message_received() {
        MATRIX_MESSAGES_RECEIVED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn matrix_message_relayed() {
        MATRIX_MESSAGES_RELAYED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn matrix_message_dropped() {
        MATRIX_MESSAGES_DROPPED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn matrix_message_failed() {
        MATRIX_MESSAGES_FAILED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_handled() {
        COMMANDS_HANDLED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn paste_failed() {
        PASTE_FAILURES.fetch_add(1, Ordering::Relaxed);
    }
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    out.push_str(&format!(
        "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n\n"
    ));
}

pub fn format_prometheus(uptime_seconds: u64) -> String {
    let mut out = format!(
        "# HELP bridge_uptime_seconds Number of seconds the bridge has been running\n\
         # TYPE bridge_uptime_seconds gauge\n\
         bridge_uptime_seconds {uptime_seconds}\n\n"
    );

    counter(
        &mut out,
        "irc_messages_received_total",
        "IRC chat messages taken off the queue",
        IRC_MESSAGES_RECEIVED.load(Ordering::Relaxed),
    );
    counter(
        &mut out,
        "irc_messages_relayed_total",
        "IRC messages delivered to Matrix",
        IRC_MESSAGES_RELAYED.load(Ordering::Relaxed),
    );
    counter(
        &mut out,
        "irc_messages_dropped_total",
        "IRC messages filtered out before delivery",
        IRC_MESSAGES_DROPPED.load(Ordering::Relaxed),
    );
    counter(
        &mut out,
        "irc_messages_failed_total",
        "IRC messages Matrix refused",
        IRC_MESSAGES_FAILED.load(Ordering::Relaxed),
    );
    counter(
        &mut out,
        "matrix_messages_received_total",
        "Matrix timeline events taken off the queue",
        MATRIX_MESSAGES_RECEIVED.load(Ordering::Relaxed),
    );
    counter(
        &mut out,
        "matrix_messages_relayed_total",
        "Matrix events delivered to IRC",
        MATRIX_MESSAGES_RELAYED.load(Ordering::Relaxed),
    );
    counter(
        &mut out,
        "matrix_messages_dropped_total",
        "Matrix events filtered out before delivery",
        MATRIX_MESSAGES_DROPPED.load(Ordering::Relaxed),
    );
    counter(
        &mut out,
        "matrix_messages_failed_total",
        "Matrix events IRC refused",
        MATRIX_MESSAGES_FAILED.load(Ordering::Relaxed),
    );
    counter(
        &mut out,
        "bridge_commands_handled_total",
        "In-room commands consumed by the bridge",
        COMMANDS_HANDLED.load(Ordering::Relaxed),
    );
    counter(
        &mut out,
        "paste_failures_total",
        "Long messages dropped because the paste upload failed",
        PASTE_FAILURES.load(Ordering::Relaxed),
    );

    out
}
