//! Basic authorization

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::server::config::Credentials;

/// Check an `Authorization` header against the configured credentials
///
/// Only the last space-separated token of the header is compared, so the
/// scheme name is not checked. With no credentials configured every request
/// passes.
pub fn is_authorized(credentials: Option<&Credentials>, header: Option<&str>) -> bool {
    let Some(credentials) = credentials else {
        return true;
    };

    let Some(received) = header
        .filter(|h| !h.is_empty())
        .and_then(|h| h.rsplit(' ').next())
    else {
        return false;
    };

    received == encode(credentials)
}

/// Encode credentials as a Basic token
pub fn encode(credentials: &Credentials) -> String {
    STANDARD.encode(format!("{}:{}", credentials.username, credentials.password))
}

/// `WWW-Authenticate` value for a 401
pub fn challenge(server_name: &str) -> String {
    format!("Basic realm=\"{}\"", server_name)
}
