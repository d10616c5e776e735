use crate::error::{ContribError, Result};
use crate::model::DateRange;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Connection settings for the hosting API, passed through to the commit source.
#[derive(Debug, Clone)]
pub struct Config {
    pub owner: String,
    pub name: String,
    pub access_token: Option<String>,
    pub api_url: String,
    pub range: DateRange,
}

impl Config {
    pub fn new(repository: &str, access_token: Option<String>, api_url: Option<String>) -> Result<Self> {
        let (owner, name) = parse_repository(repository)?;
        let access_token = access_token.filter(|t| !t.trim().is_empty());
        if access_token.is_none() {
            tracing::warn!("no access token configured, requests will be unauthenticated");
        }
        Ok(Self {
            owner,
            name,
            access_token,
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            range: DateRange::new(),
        })
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Load a `.env` file from the working directory if there is one.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("ignoring unreadable .env file: {e}"),
    }
}

pub fn parse_repository(input: &str) -> Result<(String, String)> {
    let trimmed = input.trim().trim_end_matches('/');
    match trimmed.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner.to_string(), name.trim_end_matches(".git").to_string()))
        }
        _ => Err(ContribError::Config(format!(
            "repository must look like owner/name, got '{input}'"
        ))),
    }
}

pub fn resolve_range(since: Option<&str>, until: Option<&str>) -> Result<DateRange> {
    let mut range = DateRange::new();
    let since_dt = since.map(parse_date).transpose()?;
    let until_dt = until.map(parse_date).transpose()?;

    if let (Some(s), Some(u)) = (since_dt, until_dt) {
        if s > u {
            return Err(ContribError::InvalidDate(format!(
                "Invalid range: since ({s}) is after until ({u})"
            )));
        }
    }
    if let Some(s) = since_dt {
        range = range.with_since(s);
    }
    if let Some(u) = until_dt {
        range = range.with_until(u);
    }
    Ok(range)
}

fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .ok_or_else(|| ContribError::InvalidDate(format!("expected RFC3339 or YYYY-MM-DD, got '{input}'")))
}
