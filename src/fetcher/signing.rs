use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SIGNATURE_HEADER: &str = "x-signature";

/// RFC3339 timestamp with millisecond precision and a `Z` suffix,
/// e.g. `2024-05-01T13:00:00.000Z`
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Lowercase hex HMAC-SHA256 of `timestamp`, keyed with the API key
pub fn sign(api_key: &str, timestamp: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(api_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Headers for one signed request to the jobs API
pub fn signed_headers(
    api_key: &str,
    origin: Option<&str>,
    now: DateTime<Utc>,
) -> Result<HeaderMap, InvalidHeaderValue> {
    let timestamp = format_timestamp(now);
    let signature = sign(api_key, &timestamp);

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(HeaderName::from_static(API_KEY_HEADER), HeaderValue::from_str(api_key)?);
    headers.insert(HeaderName::from_static(TIMESTAMP_HEADER), HeaderValue::from_str(&timestamp)?);
    headers.insert(HeaderName::from_static(SIGNATURE_HEADER), HeaderValue::from_str(&signature)?);
    if let Some(origin) = origin {
        headers.insert(ORIGIN, HeaderValue::from_str(origin)?);
    }

    Ok(headers)
}
