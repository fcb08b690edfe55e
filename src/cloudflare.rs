use std::sync::LazyLock;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::parser::slugify;
use crate::settings::{BlogConfig, Deployment};

const NAME_SUFFIX_LEN: usize = 8;
const NAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const MAX_SUBDOMAIN_LEN: usize = 20;

static ACCOUNT_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)@[^']*'s\s+Account").unwrap());

#[derive(Debug, Error)]
pub enum CloudflareError {
    #[error("Cloudflare API token and account id must be configured")]
    MissingCredentials,
    #[error("request to Cloudflare failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Cloudflare API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStatus {
    #[serde(default)]
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerScript {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub modified_on: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Subdomain {
    subdomain: String,
}

pub struct CloudflareClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl CloudflareClient {
    pub fn new(
        base: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CloudflareError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(CloudflareError::MissingCredentials);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(CloudflareClient {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &BlogConfig) -> Result<Self, CloudflareError> {
        Self::new(
            config.cf_api_base.as_str(),
            config.cf_api_token.as_str(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Send with bearer auth and unwrap the `{success, errors, result}` envelope.
    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, CloudflareError> {
        let response = req.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "cloudflare response");

        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| CloudflareError::Api {
                status: status.as_u16(),
                message: format!("unexpected response body: {}", e),
            })?;

        if !status.is_success() || !envelope.success {
            let message = envelope
                .errors
                .first()
                .map(|e| format!("{} (code {})", e.message, e.code))
                .unwrap_or_else(|| "request was not successful".to_string());
            return Err(CloudflareError::Api {
                status: status.as_u16(),
                message,
            });
        }

        envelope.result.ok_or_else(|| CloudflareError::Api {
            status: status.as_u16(),
            message: "response has no result".to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CloudflareError> {
        self.send(self.http.get(self.url(path))).await
    }

    pub async fn verify_token(&self) -> Result<TokenStatus, CloudflareError> {
        self.get("/user/tokens/verify").await
    }

    pub async fn accounts(&self) -> Result<Vec<Account>, CloudflareError> {
        self.get("/accounts").await
    }

    pub async fn account(&self, account_id: &str) -> Result<Account, CloudflareError> {
        self.get(&format!("/accounts/{}", account_id)).await
    }

    pub async fn scripts(&self, account_id: &str) -> Result<Vec<WorkerScript>, CloudflareError> {
        self.get(&format!("/accounts/{}/workers/scripts", account_id))
            .await
    }

    pub async fn subdomain(&self, account_id: &str) -> Result<String, CloudflareError> {
        let sub: Subdomain = self
            .get(&format!("/accounts/{}/workers/subdomain", account_id))
            .await?;
        Ok(sub.subdomain)
    }

    pub async fn upload_script(
        &self,
        account_id: &str,
        name: &str,
        script: &str,
    ) -> Result<WorkerScript, CloudflareError> {
        let req = self
            .http
            .put(self.url(&format!(
                "/accounts/{}/workers/scripts/{}",
                account_id, name
            )))
            .header(CONTENT_TYPE, "application/javascript")
            .body(script.to_string());
        self.send(req).await
    }
}

/// `prefix`, or `prefix-xxxxxxxx` with a random lowercase suffix.
pub fn worker_name(prefix: &str, auto_generate: bool) -> String {
    let mut base = slugify(prefix);
    if base.is_empty() {
        base = "blog".to_string();
    }
    if !auto_generate {
        return base;
    }
    let mut rng = rand::thread_rng();
    let suffix: String = (0..NAME_SUFFIX_LEN)
        .map(|_| NAME_CHARSET[rng.gen_range(0..NAME_CHARSET.len())] as char)
        .collect();
    format!("{}-{}", base, suffix)
}

/// Subdomain guess from an account name like `ana@example.com's Account`.
pub fn clean_subdomain(account_name: &str) -> String {
    let stripped = ACCOUNT_SUFFIX_RE.replace_all(account_name, "");
    let slug = slugify(&stripped);
    let truncated: String = slug.chars().take(MAX_SUBDOMAIN_LEN).collect();
    let cleaned = truncated.trim_matches('-');
    if cleaned.is_empty() {
        "blog".to_string()
    } else {
        cleaned.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionReport {
    pub token: TokenStatus,
    pub accounts: Vec<Account>,
    /// The configured account, when it is among `accounts`.
    pub account: Option<Account>,
    /// Worker count for the configured account, if listing was permitted.
    pub scripts: Option<usize>,
}

pub async fn check_connection(
    client: &CloudflareClient,
    account_id: &str,
) -> Result<ConnectionReport, CloudflareError> {
    let token = client.verify_token().await?;
    info!("Token status: {}", token.status);
    let accounts = client.accounts().await?;
    let account = accounts.iter().find(|a| a.id == account_id).cloned();

    let scripts = match &account {
        Some(a) => match client.scripts(&a.id).await {
            Ok(list) => Some(list.len()),
            Err(e) => {
                warn!("Cannot list workers (token may lack Workers edit permission): {}", e);
                None
            }
        },
        None => None,
    };

    Ok(ConnectionReport {
        token,
        accounts,
        account,
        scripts,
    })
}

/// Upload `script` as a worker and work out its public URL.
pub async fn deploy(
    client: &CloudflareClient,
    config: &BlogConfig,
    script: &str,
    name: Option<&str>,
) -> Result<Deployment, CloudflareError> {
    let account_id = config.cf_account_id.trim();
    if account_id.is_empty() {
        return Err(CloudflareError::MissingCredentials);
    }

    let worker = match name {
        Some(n) => worker_name(n, false),
        None => worker_name(&config.worker_name_prefix, config.auto_generate_name),
    };
    info!(bytes = script.len(), "Uploading worker {}", worker);
    client.upload_script(account_id, &worker, script).await?;

    let subdomain = match client.subdomain(account_id).await {
        Ok(s) => s,
        Err(e) => {
            warn!("workers.dev subdomain lookup failed, deriving from account name: {}", e);
            match client.account(account_id).await {
                Ok(account) => clean_subdomain(&account.name),
                Err(_) => clean_subdomain(""),
            }
        }
    };

    Ok(Deployment {
        url: format!("https://{}.{}.workers.dev", worker, subdomain),
        worker_name: worker,
        deployed_at: Utc::now().to_rfc3339(),
    })
}
