use reqwest::{Client, ClientBuilder};
use std::time::Duration;

const USER_AGENT: &str = concat!("fba-ledger-api/", env!("CARGO_PKG_VERSION"));

pub fn build_client() -> Client {
    base_builder()
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Client for pre-signed document URLs. Transparent content decoding is off so
/// a declared GZIP payload reaches the decompression step byte-for-byte.
pub fn build_download_client() -> Client {
    base_builder()
        .no_gzip()
        .no_brotli()
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn base_builder() -> ClientBuilder {
    let timeout = env_secs("HTTP_TIMEOUT_SECS", 60);
    let connect = env_secs("HTTP_CONNECT_TIMEOUT_SECS", 5);
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout))
        .connect_timeout(Duration::from_secs(connect))
}

fn env_secs(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
