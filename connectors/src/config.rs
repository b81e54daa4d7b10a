use anyhow::{Context, Result};
use std::env;

// ── Default endpoints ───────────────────────────────────────────────────

const DEFAULT_AIRTABLE_URL: &str = "https://api.airtable.com/v0";
const DEFAULT_ROCKETAPI_URL: &str = "https://v1.rocketapi.io";
const DEFAULT_SHEETS_URL: &str = "https://sheets.googleapis.com/v4";

// ── Default Airtable layout ─────────────────────────────────────────────

const DEFAULT_AIRTABLE_BASE: &str = "appoLMfEjRaZGXMh4";
const DEFAULT_ACCOUNTS_TABLE: &str = "Instagram Statistics";
const DEFAULT_STATS_TABLE: &str = "Instagram FC";
const DEFAULT_POSTS_TABLE: &str = "Instagram Posts";

// ── Paging ──────────────────────────────────────────────────────────────

const DEFAULT_PAGE_SIZE: u32 = 12;
const DEFAULT_SHEETS_RANGE: &str = "Followers!A:E";

// ── Config structs ──────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct AirtableConfig {
    pub api_url: String,
    pub api_key: String,
    pub base_id: String,
    pub accounts_table: String,
    pub stats_table: String,
    pub posts_table: String,
}

#[derive(Clone, Debug)]
pub struct RocketApiConfig {
    pub api_url: String,
    pub token: String,
    pub page_size: u32,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub api_url: String,
    pub spreadsheet_id: String,
    pub access_token: String,
    pub default_range: String,
}

/// Everything a run needs, read once at process start.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub airtable: AirtableConfig,
    pub rocketapi: RocketApiConfig,
    /// Present only when both the spreadsheet id and token are set.
    pub sheets: Option<SheetsConfig>,
    pub max_pages: Option<usize>,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let airtable = AirtableConfig {
            api_url: var("INSTASYNC_AIRTABLE_URL").unwrap_or_else(|| DEFAULT_AIRTABLE_URL.into()),
            api_key: var("AIRTABLE_API_KEY").context("AIRTABLE_API_KEY is not set")?,
            base_id: var("INSTASYNC_AIRTABLE_BASE")
                .unwrap_or_else(|| DEFAULT_AIRTABLE_BASE.into()),
            accounts_table: var("INSTASYNC_ACCOUNTS_TABLE")
                .unwrap_or_else(|| DEFAULT_ACCOUNTS_TABLE.into()),
            stats_table: var("INSTASYNC_STATS_TABLE")
                .unwrap_or_else(|| DEFAULT_STATS_TABLE.into()),
            posts_table: var("INSTASYNC_POSTS_TABLE")
                .unwrap_or_else(|| DEFAULT_POSTS_TABLE.into()),
        };

        let rocketapi = RocketApiConfig {
            api_url: var("INSTASYNC_ROCKETAPI_URL")
                .unwrap_or_else(|| DEFAULT_ROCKETAPI_URL.into()),
            token: var("ROCKETAPI_TOKEN").context("ROCKETAPI_TOKEN is not set")?,
            page_size: parse_or(var("INSTASYNC_PAGE_SIZE"), DEFAULT_PAGE_SIZE),
        };

        let sheets = match (var("GOOGLE_SHEETS_ID"), var("GOOGLE_SHEETS_TOKEN")) {
            (Some(spreadsheet_id), Some(access_token)) => Some(SheetsConfig {
                api_url: var("INSTASYNC_SHEETS_URL").unwrap_or_else(|| DEFAULT_SHEETS_URL.into()),
                spreadsheet_id,
                access_token,
                default_range: var("INSTASYNC_SHEETS_RANGE")
                    .unwrap_or_else(|| DEFAULT_SHEETS_RANGE.into()),
            }),
            _ => None,
        };

        let max_pages = var("INSTASYNC_MAX_PAGES")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0);

        Ok(Self {
            airtable,
            rocketapi,
            sheets,
            max_pages,
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    match value {
        Some(val) => val.trim().parse::<T>().unwrap_or(default),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_follow_original_layout() {
        let config = SyncConfig::from_vars(lookup(&[
            ("AIRTABLE_API_KEY", "key"),
            ("ROCKETAPI_TOKEN", "token"),
        ]))
        .unwrap();

        assert_eq!(config.airtable.accounts_table, "Instagram Statistics");
        assert_eq!(config.airtable.stats_table, "Instagram FC");
        assert_eq!(config.airtable.posts_table, "Instagram Posts");
        assert_eq!(config.rocketapi.page_size, 12);
        assert!(config.sheets.is_none());
        assert!(config.max_pages.is_none());
    }

    #[test]
    fn missing_credentials_name_the_variable() {
        let err = SyncConfig::from_vars(lookup(&[("AIRTABLE_API_KEY", "key")])).unwrap_err();
        assert!(err.to_string().contains("ROCKETAPI_TOKEN"));

        let err = SyncConfig::from_vars(lookup(&[
            ("AIRTABLE_API_KEY", "  "),
            ("ROCKETAPI_TOKEN", "token"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("AIRTABLE_API_KEY"));
    }

    #[test]
    fn sheets_needs_id_and_token() {
        let config = SyncConfig::from_vars(lookup(&[
            ("AIRTABLE_API_KEY", "key"),
            ("ROCKETAPI_TOKEN", "token"),
            ("GOOGLE_SHEETS_ID", "sheet"),
        ]))
        .unwrap();
        assert!(config.sheets.is_none());

        let config = SyncConfig::from_vars(lookup(&[
            ("AIRTABLE_API_KEY", "key"),
            ("ROCKETAPI_TOKEN", "token"),
            ("GOOGLE_SHEETS_ID", "sheet"),
            ("GOOGLE_SHEETS_TOKEN", "ya29"),
            ("INSTASYNC_MAX_PAGES", "40"),
            ("INSTASYNC_PAGE_SIZE", "not-a-number"),
        ]))
        .unwrap();
        let sheets = config.sheets.expect("sheets enabled");
        assert_eq!(sheets.default_range, "Followers!A:E");
        assert_eq!(config.max_pages, Some(40));
        assert_eq!(config.rocketapi.page_size, 12);
    }
}
