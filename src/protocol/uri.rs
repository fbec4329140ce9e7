//! Request URI helpers
//!
//! URIs look like `rtsp://host:port/<path>[/trackID=<n>]`. The path is the
//! last segment that is not a track selector; an empty path (or `live`)
//! selects the device's own capture, anything else names a published stream.

use crate::error::ProtocolError;

const TRACK_SELECTOR: &str = "trackid=";

/// Extract the stream path from a request URI
pub fn parse_path(uri: &str) -> String {
    let rest = match uri.find("://") {
        Some(idx) => {
            let after_scheme = &uri[idx + 3..];
            match after_scheme.find('/') {
                Some(slash) => &after_scheme[slash + 1..],
                None => "",
            }
        }
        None => uri,
    };

    let rest = rest.split(['?', '#']).next().unwrap_or("");

    rest.split('/')
        .filter(|segment| !segment.is_empty())
        .filter(|segment| !segment.to_ascii_lowercase().starts_with(TRACK_SELECTOR))
        .last()
        .unwrap_or("")
        .to_string()
}

/// Extract the `trackID=<n>` selector from a request URI
pub fn parse_track_id(uri: &str) -> Result<u8, ProtocolError> {
    let lower = uri.to_ascii_lowercase();
    let start = lower
        .find(TRACK_SELECTOR)
        .map(|idx| idx + TRACK_SELECTOR.len())
        .ok_or(ProtocolError::InvalidTrackSelector)?;

    let digits: String = uri[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    digits
        .parse::<u8>()
        .map_err(|_| ProtocolError::InvalidTrackSelector)
}
