//! Join page URL construction.
//!
//! The controller and the backend it joins calls against may live in
//! different network namespaces; a loopback API URL that is valid for the
//! service is dead inside the browser's container, so it is rewritten to
//! the configured gateway host before being handed to the page.

use url::Url;

use crate::recorder::CallType;

const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0", "::1", "[::1]"];

/// Replace a loopback host with the container-reachable gateway. URLs
/// that do not parse, or already point somewhere real, pass through
/// unchanged.
pub fn rewrite_loopback(api_url: &str, gateway: &str) -> String {
    let Ok(mut parsed) = Url::parse(api_url) else {
        return api_url.to_string();
    };

    let is_loopback = parsed
        .host_str()
        .map(|host| LOOPBACK_HOSTS.contains(&host))
        .unwrap_or(false);

    if is_loopback && parsed.set_host(Some(gateway)).is_ok() {
        return parsed.to_string();
    }

    api_url.to_string()
}

/// Build the join page URL for one session. The page reads the call
/// coordinates and credentials from its query string.
pub fn build_join_url(
    base: &str,
    group_id: &str,
    call_id: &str,
    call_type: CallType,
    auth_token: &str,
    api_url: &str,
) -> Result<String, url::ParseError> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut()
        .append_pair("groupId", group_id)
        .append_pair("callId", call_id)
        .append_pair("callType", call_type.as_str())
        .append_pair("token", auth_token)
        .append_pair("api", api_url);
    Ok(url.to_string())
}
