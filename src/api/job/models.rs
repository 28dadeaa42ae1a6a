use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Accepts `null` wherever a plain value is expected and falls back to the
/// type's default. The upstream API sends `null` for absent strings.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Companion payload shipped by the upstream API as a JSON string in `raw_data`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawJobData {
    #[serde(deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(deserialize_with = "null_as_default")]
    pub company_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub company_logo: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_remote: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub job_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub job_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(deserialize_with = "null_as_default")]
    pub posted_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub salary: String,
    #[serde(deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

/// A single job posting as cached and served to the UI.
///
/// Every field is optional on the wire; missing or `null` strings become `""`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct JobPosting {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub job_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(deserialize_with = "null_as_default")]
    pub company_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub company_logo: String,
    #[serde(deserialize_with = "null_as_default")]
    pub country: String,
    #[serde(deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_remote: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub employment_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub posted_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub date_gotten: String,
    #[serde(deserialize_with = "null_as_default")]
    pub exp_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub salary: String,
    #[serde(deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(deserialize_with = "null_as_default")]
    pub job_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub raw_data: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(rename = "rawDataParsed", skip_serializing_if = "Option::is_none")]
    pub raw_data_parsed: Option<RawJobData>,
}

impl JobPosting {
    /// Parse the `raw_data` companion payload once and backfill fields the
    /// top-level posting is missing. Unparseable payloads are left alone.
    pub fn normalize(mut self) -> Self {
        if self.raw_data_parsed.is_none() && !self.raw_data.trim().is_empty() {
            if let Ok(raw) = serde_json::from_str::<RawJobData>(&self.raw_data) {
                if self.company_logo.is_empty() && !raw.company_logo.is_empty() {
                    self.company_logo = raw.company_logo.clone();
                }
                self.raw_data_parsed = Some(raw);
            }
        }
        self
    }

    /// Milliseconds since the epoch used for "newest first" ordering.
    /// Falls back to `date_gotten`, then to zero when nothing parses.
    pub fn posted_timestamp(&self) -> i64 {
        let raw = if self.posted_at.is_empty() {
            &self.date_gotten
        } else {
            &self.posted_at
        };
        parse_timestamp(raw).unwrap_or(0)
    }
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}
