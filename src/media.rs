use url::Url;

/// Turns an `mxc://server/media-id` URI into the homeserver's public
/// download URL. Returns `None` for anything that is not an mxc URI.
pub fn mxc_to_http(homeserver_url: &Url, mxc_url: &str) -> Option<String> {
    let mxc_path = mxc_url.strip_prefix("mxc://")?;
    let (server_name, media_id) = mxc_path.split_once('/')?;
    if server_name.is_empty() || media_id.is_empty() || media_id.contains('/') {
        return None;
    }

    Some(format!(
        "{}/_matrix/media/v3/download/{}/{}",
        homeserver_url.as_str().trim_end_matches('/'),
        urlencoding::encode(server_name),
        urlencoding::encode(media_id)
    ))
}

pub(crate) mod urlencoding {
    pub fn encode(s: &str) -> String {
        url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
    }
}
