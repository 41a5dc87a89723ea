use salvo::prelude::*;
use serde_json::json;

use crate::web::web_state;

#[handler]
pub async fn health_check(res: &mut Response) {
    res.render(Json(json!({ "status": "ok" })));
}

#[handler]
pub async fn get_status(res: &mut Response) {
    let (uptime_seconds, mappings, aliases) = match web_state() {
        Some(state) => (
            state.started_at.elapsed().as_secs(),
            state.room_map.len(),
            state.nick_store.len(),
        ),
        None => (0, 0, 0),
    };

    res.render(Json(json!({
        "bridge": {
            "status": "running",
            "uptime_seconds": uptime_seconds,
            "version": env!("CARGO_PKG_VERSION"),
            "mappings": mappings,
            "nickname_aliases": aliases,
        }
    })));
}
