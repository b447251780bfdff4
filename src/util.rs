// src/util.rs — Shared helpers

use url::Url;

/// Extract the target username from a profile URL. Accepts twitter.com /
/// x.com profile links (with or without www.) and rejects everything else.
pub fn parse_target_profile(input: &str) -> anyhow::Result<String> {
    let url = Url::parse(input.trim()).map_err(|_| anyhow::anyhow!("Invalid profile URL"))?;

    let host = url.host_str().unwrap_or("");
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host != "twitter.com" && host != "x.com" {
        anyhow::bail!("Invalid profile URL: unsupported host '{host}'");
    }

    let username = url
        .path()
        .trim_matches('/')
        .split('/')
        .next()
        .unwrap_or("")
        .to_string();
    if username.is_empty() {
        anyhow::bail!("Invalid profile URL: no username in path");
    }

    Ok(username)
}
