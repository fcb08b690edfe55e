use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::settings::BlogConfig;
use crate::template::{render, TemplateContext};

const WORKER_TEMPLATE: &str = include_str!("../templates/worker.js");

/// Values for the worker script. Every lookup yields a JS literal.
pub struct WorkerContext<'a> {
    pub config: &'a BlogConfig,
    pub custom_html: Option<&'a str>,
    pub now: DateTime<Utc>,
}

fn js_literal<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

impl TemplateContext for WorkerContext<'_> {
    fn lookup(&self, name: &str) -> Option<String> {
        let c = self.config;
        let palette = c.color_scheme.palette();
        let value = match name {
            "spreadsheet_id" => js_literal(&c.spreadsheet_id),
            "sheet_name" => js_literal(&c.sheet_name),
            "blog_title" => js_literal(&c.blog_title),
            "blog_description" => js_literal(&c.blog_description),
            "blog_keywords" => js_literal(&c.blog_keywords),
            "primary_color" => js_literal(palette.primary),
            "secondary_color" => js_literal(palette.secondary),
            "posts_per_page" => c.posts_per_page.max(1).to_string(),
            "custom_template" => js_literal(&self.custom_html),
            "generated_at" => self.now.to_rfc3339(),
            _ => return None,
        };
        Some(value)
    }
}

/// Build the Workers script for `config`, embedding `custom_html` as the home
/// page when given.
pub fn generate_script(config: &BlogConfig, custom_html: Option<&str>) -> String {
    let ctx = WorkerContext {
        config,
        custom_html,
        now: Utc::now(),
    };
    let out = render(WORKER_TEMPLATE, &ctx);
    if !out.missing.is_empty() {
        warn!(missing = ?out.missing, "worker template has unresolved placeholders");
    }
    out.text
}
