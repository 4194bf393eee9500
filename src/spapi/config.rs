use once_cell::sync::Lazy;
use std::env;

/// India marketplace.
pub const DEFAULT_MARKETPLACE_ID: &str = "A21TJRUUN4KGV";

pub static SP_API_REGION: Lazy<String> =
    Lazy::new(|| env::var("SP_API_REGION").unwrap_or_else(|_| "eu".to_string()));

pub static SP_API_ENDPOINT: Lazy<String> = Lazy::new(|| {
    env::var("SP_API_ENDPOINT")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| region_endpoint(&SP_API_REGION).to_string())
});

pub static LWA_TOKEN_URL: Lazy<String> = Lazy::new(|| {
    env::var("LWA_TOKEN_URL").unwrap_or_else(|_| "https://api.amazon.com/auth/o2/token".to_string())
});

pub static LWA_CLIENT_ID: Lazy<String> =
    Lazy::new(|| env::var("LWA_CLIENT_ID").unwrap_or_default());

pub static LWA_CLIENT_SECRET: Lazy<String> =
    Lazy::new(|| env::var("LWA_CLIENT_SECRET").unwrap_or_default());

pub static REFRESH_TOKEN: Lazy<String> =
    Lazy::new(|| env::var("REFRESH_TOKEN").unwrap_or_default());

pub static MARKETPLACE_ID: Lazy<String> = Lazy::new(|| {
    env::var("MARKETPLACE_ID").unwrap_or_else(|_| DEFAULT_MARKETPLACE_ID.to_string())
});

fn region_endpoint(region: &str) -> &'static str {
    match region.trim().to_lowercase().as_str() {
        "na" => "https://sellingpartnerapi-na.amazon.com",
        "fe" => "https://sellingpartnerapi-fe.amazon.com",
        _ => "https://sellingpartnerapi-eu.amazon.com",
    }
}

#[derive(Debug, Clone)]
pub struct SpApiConfig {
    pub endpoint: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub marketplace_id: String,
    pub max_throttle_retries: u32,
}

impl SpApiConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: SP_API_ENDPOINT.trim_end_matches('/').to_string(),
            token_url: LWA_TOKEN_URL.clone(),
            client_id: LWA_CLIENT_ID.clone(),
            client_secret: LWA_CLIENT_SECRET.clone(),
            refresh_token: REFRESH_TOKEN.clone(),
            marketplace_id: MARKETPLACE_ID.clone(),
            max_throttle_retries: env::var("SP_API_MAX_THROTTLE_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
        }
    }
}
