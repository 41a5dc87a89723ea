use salvo::http::header::{CONTENT_TYPE, HeaderValue};
use salvo::prelude::*;

use crate::web::metrics::format_prometheus;
use crate::web::web_state;

#[handler]
pub async fn metrics_endpoint(res: &mut Response) {
    let uptime_seconds = web_state()
        .map(|state| state.started_at.elapsed().as_secs())
        .unwrap_or_default();

    res.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    res.body(format_prometheus(uptime_seconds));
}
