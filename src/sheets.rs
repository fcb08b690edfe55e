use std::time::Duration;

use reqwest::Url;
use thiserror::Error;
use tracing::{info, warn};

use crate::parser::{parse_records, Record};
use crate::posts::demo_posts;
use crate::settings::BlogConfig;

const GOOGLE_SHEETS_BASE: &str = "https://docs.google.com/spreadsheets/d";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; sheetblog/0.1)";
const LOGIN_HOST: &str = "accounts.google.com";

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("sheet source unavailable ({tried} candidate URLs tried)")]
    SourceUnavailable { tried: usize },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedCsv {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostSource {
    Sheet { url: String },
    Demo,
}

pub struct SheetFetcher {
    client: reqwest::Client,
    base: String,
}

impl SheetFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SheetError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(SheetFetcher {
            client,
            base: GOOGLE_SHEETS_BASE.to_string(),
        })
    }

    pub fn from_config(config: &BlogConfig) -> Result<Self, SheetError> {
        Self::new(Duration::from_secs(config.request_timeout_secs))
    }

    /// Point at another host serving the same paths.
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Export endpoints for one spreadsheet, in the order they are tried.
    pub fn candidate_urls(&self, spreadsheet_id: &str, sheet_name: &str) -> Vec<String> {
        let id = spreadsheet_id.trim();
        if id.is_empty() {
            return Vec::new();
        }
        let root = format!("{}/{}", self.base, id);
        let gviz = Url::parse_with_params(
            &format!("{}/gviz/tq", root),
            &[("tqx", "out:csv"), ("sheet", sheet_name)],
        )
        .map(String::from)
        .unwrap_or_else(|_| format!("{}/gviz/tq?tqx=out:csv", root));

        vec![
            format!("{}/export?format=csv&gid=0", root),
            format!("{}/export?format=csv", root),
            gviz,
            format!("{}/pub?output=csv", root),
        ]
    }

    /// Try each candidate in order; the first one that returns CSV wins.
    pub async fn fetch_csv(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<FetchedCsv, SheetError> {
        let candidates = self.candidate_urls(spreadsheet_id, sheet_name);
        for url in &candidates {
            info!("Trying sheet URL: {}", url);
            match self.try_candidate(url).await {
                Ok(text) => {
                    info!(bytes = text.len(), "Sheet CSV fetched from {}", url);
                    return Ok(FetchedCsv {
                        url: url.clone(),
                        text,
                    });
                }
                Err(reason) => warn!("Rejected {}: {}", url, reason),
            }
        }
        Err(SheetError::SourceUnavailable {
            tried: candidates.len(),
        })
    }

    async fn try_candidate(&self, url: &str) -> Result<String, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }
        if is_sign_in(response.url()) {
            return Err("redirected to Google sign-in".to_string());
        }

        let text = response.text().await.map_err(|e| e.to_string())?;
        if text.trim().is_empty() {
            return Err("empty body".to_string());
        }
        if looks_like_html(&text) {
            return Err("HTML page instead of CSV".to_string());
        }
        Ok(text)
    }
}

/// An HTML page starts with a doctype or `<html>`; CSV cells that merely
/// mention those tags do not count.
pub fn looks_like_html(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(9).collect();
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

fn is_sign_in(url: &Url) -> bool {
    url.host_str() == Some(LOGIN_HOST)
}

/// Records from the configured sheet, or the demo posts when no candidate
/// URL yields CSV.
pub async fn load_posts(fetcher: &SheetFetcher, config: &BlogConfig) -> (Vec<Record>, PostSource) {
    match fetcher
        .fetch_csv(&config.spreadsheet_id, &config.sheet_name)
        .await
    {
        Ok(csv) => (parse_records(&csv.text), PostSource::Sheet { url: csv.url }),
        Err(e) => {
            warn!("{}; showing demo posts", e);
            (demo_posts(), PostSource::Demo)
        }
    }
}

/// First `n` non-blank lines of a document.
pub fn preview_lines(text: &str, n: usize) -> Vec<&str> {
    text.split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .take(n)
        .collect()
}
