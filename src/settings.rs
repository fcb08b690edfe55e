use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::template::{ColorScheme, TemplateStyle};

pub const DEFAULT_CONFIG_PATH: &str = "app_config.json";
pub const ENV_PREFIX: &str = "SHEETBLOG";
pub const DEFAULT_CF_API_BASE: &str = "https://api.cloudflare.com/client/v4";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("config overlay failed: {0}")]
    Overlay(#[from] config::ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub worker_name: String,
    pub url: String,
    pub deployed_at: String,
}

/// Everything the tool needs, passed explicitly to whoever needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub cf_api_token: String,
    pub cf_account_id: String,
    pub cf_api_base: String,
    pub worker_name_prefix: String,
    pub auto_generate_name: bool,
    pub blog_title: String,
    pub blog_description: String,
    pub blog_keywords: String,
    pub posts_per_page: u32,
    pub color_scheme: ColorScheme,
    pub template_style: TemplateStyle,
    pub request_timeout_secs: u64,
    pub last_deployment: Option<Deployment>,
}

impl Default for BlogConfig {
    fn default() -> Self {
        BlogConfig {
            spreadsheet_id: String::new(),
            sheet_name: "WEBSITE".to_string(),
            cf_api_token: String::new(),
            cf_account_id: String::new(),
            cf_api_base: DEFAULT_CF_API_BASE.to_string(),
            worker_name_prefix: "blog".to_string(),
            auto_generate_name: true,
            blog_title: "My Blog".to_string(),
            blog_description: "Blog powered by Google Sheets".to_string(),
            blog_keywords: "blog, google sheets".to_string(),
            posts_per_page: 6,
            color_scheme: ColorScheme::Blue,
            template_style: TemplateStyle::Modern,
            request_timeout_secs: 30,
            last_deployment: None,
        }
    }
}

impl BlogConfig {
    /// Token with all but the last four characters masked, for display.
    pub fn masked_token(&self) -> String {
        let n = self.cf_api_token.chars().count();
        if n <= 4 {
            return "*".repeat(n);
        }
        let tail: String = self.cf_api_token.chars().skip(n - 4).collect();
        format!("{}{}", "*".repeat(n - 4), tail)
    }
}

/// Field-by-field changes requested by `configure`. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub spreadsheet_id: Option<String>,
    pub sheet_name: Option<String>,
    pub cf_api_token: Option<String>,
    pub cf_account_id: Option<String>,
    pub cf_api_base: Option<String>,
    pub worker_name_prefix: Option<String>,
    pub auto_generate_name: Option<bool>,
    pub blog_title: Option<String>,
    pub blog_description: Option<String>,
    pub blog_keywords: Option<String>,
    pub posts_per_page: Option<u32>,
    pub color_scheme: Option<ColorScheme>,
    pub template_style: Option<TemplateStyle>,
    pub request_timeout_secs: Option<u64>,
}

impl ConfigUpdate {
    /// Apply to `config`, returning whether anything changed.
    pub fn apply(self, config: &mut BlogConfig) -> bool {
        let before = config.clone();

        if let Some(v) = self.spreadsheet_id {
            config.spreadsheet_id = v;
        }
        if let Some(v) = self.sheet_name {
            config.sheet_name = v;
        }
        if let Some(v) = self.cf_api_token {
            config.cf_api_token = v;
        }
        if let Some(v) = self.cf_account_id {
            config.cf_account_id = v;
        }
        if let Some(v) = self.cf_api_base {
            config.cf_api_base = v;
        }
        if let Some(v) = self.worker_name_prefix {
            config.worker_name_prefix = v;
        }
        if let Some(v) = self.auto_generate_name {
            config.auto_generate_name = v;
        }
        if let Some(v) = self.blog_title {
            config.blog_title = v;
        }
        if let Some(v) = self.blog_description {
            config.blog_description = v;
        }
        if let Some(v) = self.blog_keywords {
            config.blog_keywords = v;
        }
        if let Some(v) = self.posts_per_page {
            config.posts_per_page = v;
        }
        if let Some(v) = self.color_scheme {
            config.color_scheme = v;
        }
        if let Some(v) = self.template_style {
            config.template_style = v;
        }
        if let Some(v) = self.request_timeout_secs {
            config.request_timeout_secs = v;
        }

        *config != before
    }
}

pub trait ConfigStore {
    fn load(&self) -> Result<BlogConfig, ConfigError>;
    fn save(&self, config: &BlogConfig) -> Result<(), ConfigError>;
}

/// Pretty-printed JSON on disk. A missing file loads defaults.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<BlogConfig, ConfigError> {
        if !self.path.exists() {
            debug!(path = ?self.path, "no config file, using defaults");
            return Ok(BlogConfig::default());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, config: &BlogConfig) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        std::fs::write(&self.path, json).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = ?self.path, "config saved");
        Ok(())
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Option<BlogConfig>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with(config: BlogConfig) -> Self {
        MemoryStore {
            inner: Mutex::new(Some(config)),
        }
    }
}

#[cfg(test)]
impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<BlogConfig, ConfigError> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone().unwrap_or_default())
    }

    fn save(&self, config: &BlogConfig) -> Result<(), ConfigError> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(config.clone());
        Ok(())
    }
}

/// Stored config overlaid by `<PREFIX>_<FIELD>` environment variables.
/// The result is for use at runtime only; never save it back.
pub fn resolve(store: &dyn ConfigStore, env_prefix: &str) -> Result<BlogConfig, ConfigError> {
    let stored = store.load()?;
    let merged = config::Config::builder()
        .add_source(config::Config::try_from(&stored)?)
        .add_source(config::Environment::with_prefix(env_prefix))
        .build()?
        .try_deserialize::<BlogConfig>()?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("app_config.json"));
        assert_eq!(store.load().unwrap(), BlogConfig::default());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/app_config.json"));
        let mut cfg = BlogConfig::default();
        cfg.spreadsheet_id = "sheet-123".into();
        cfg.color_scheme = ColorScheme::Purple;
        cfg.last_deployment = Some(Deployment {
            worker_name: "blog-abc".into(),
            url: "https://blog-abc.me.workers.dev".into(),
            deployed_at: "2025-01-18T00:00:00Z".into(),
        });
        store.save(&cfg).unwrap();
        assert_eq!(store.load().unwrap(), cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app_config.json");
        std::fs::write(&path, r#"{"blog_title": "Catatan", "color_scheme": "green"}"#).unwrap();
        let cfg = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(cfg.blog_title, "Catatan");
        assert_eq!(cfg.color_scheme, ColorScheme::Green);
        assert_eq!(cfg.sheet_name, "WEBSITE");
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app_config.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn update_reports_changes() {
        let mut cfg = BlogConfig::default();
        let unchanged = ConfigUpdate {
            blog_title: Some("My Blog".into()),
            ..Default::default()
        };
        assert!(!unchanged.apply(&mut cfg));

        let update = ConfigUpdate {
            sheet_name: Some("Posts".into()),
            posts_per_page: Some(10),
            ..Default::default()
        };
        assert!(update.apply(&mut cfg));
        assert_eq!(cfg.sheet_name, "Posts");
        assert_eq!(cfg.posts_per_page, 10);
    }

    #[test]
    fn environment_overlays_store_without_saving() {
        let store = MemoryStore::with(BlogConfig {
            blog_title: "Stored".into(),
            ..Default::default()
        });
        std::env::set_var("SHEETBLOG_OVERLAY_TEST_CF_ACCOUNT_ID", "acct-from-env");
        let cfg = resolve(&store, "SHEETBLOG_OVERLAY_TEST").unwrap();
        std::env::remove_var("SHEETBLOG_OVERLAY_TEST_CF_ACCOUNT_ID");

        assert_eq!(cfg.cf_account_id, "acct-from-env");
        assert_eq!(cfg.blog_title, "Stored");
        assert_eq!(store.load().unwrap().cf_account_id, "");
    }

    #[test]
    fn environment_values_keep_their_text() {
        let store = MemoryStore::default();
        std::env::set_var("SHEETBLOG_NUMERIC_TEST_SPREADSHEET_ID", "1234e5");
        std::env::set_var("SHEETBLOG_NUMERIC_TEST_CF_ACCOUNT_ID", "0012");
        std::env::set_var("SHEETBLOG_NUMERIC_TEST_POSTS_PER_PAGE", "10");
        std::env::set_var("SHEETBLOG_NUMERIC_TEST_AUTO_GENERATE_NAME", "false");
        let cfg = resolve(&store, "SHEETBLOG_NUMERIC_TEST");
        for field in ["SPREADSHEET_ID", "CF_ACCOUNT_ID", "POSTS_PER_PAGE", "AUTO_GENERATE_NAME"] {
            std::env::remove_var(format!("SHEETBLOG_NUMERIC_TEST_{}", field));
        }

        let cfg = cfg.unwrap();
        assert_eq!(cfg.spreadsheet_id, "1234e5");
        assert_eq!(cfg.cf_account_id, "0012");
        assert_eq!(cfg.posts_per_page, 10);
        assert!(!cfg.auto_generate_name);
    }

    #[test]
    fn masked_token_keeps_tail() {
        let cfg = BlogConfig {
            cf_api_token: "abcdefgh".into(),
            ..Default::default()
        };
        assert_eq!(cfg.masked_token(), "****efgh");
    }
}
