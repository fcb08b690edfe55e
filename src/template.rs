use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Utc};
use clap::ValueEnum;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::settings::BlogConfig;

const BLOG_TEMPLATE: &str = include_str!("../templates/blog.html");

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").unwrap());

/// Source of placeholder values for [`render`].
pub trait TemplateContext {
    fn lookup(&self, name: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Placeholder names the context had no value for, in order of first use.
    pub missing: Vec<String>,
}

/// Single pass over `template`, replacing each `{{ name }}` with the
/// context's value. Unknown names are left as written.
pub fn render(template: &str, ctx: &dyn TemplateContext) -> Rendered {
    let mut missing: Vec<String> = Vec::new();
    let text = PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match ctx.lookup(name) {
                Some(value) => value,
                None => {
                    if !missing.iter().any(|m| m == name) {
                        missing.push(name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        })
        .into_owned();
    Rendered { text, missing }
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Blue,
    Green,
    Purple,
    Red,
    Orange,
    Dark,
}

pub struct Palette {
    pub primary: &'static str,
    pub secondary: &'static str,
    pub background: &'static str,
}

impl ColorScheme {
    pub fn palette(self) -> Palette {
        let (primary, secondary, background) = match self {
            ColorScheme::Blue => ("#2563eb", "#1d4ed8", "#eff6ff"),
            ColorScheme::Green => ("#059669", "#047857", "#ecfdf5"),
            ColorScheme::Purple => ("#7c3aed", "#6d28d9", "#f3e8ff"),
            ColorScheme::Red => ("#dc2626", "#b91c1c", "#fef2f2"),
            ColorScheme::Orange => ("#ea580c", "#c2410c", "#fff7ed"),
            ColorScheme::Dark => ("#1f2937", "#374151", "#f9fafb"),
        };
        Palette {
            primary,
            secondary,
            background,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColorScheme::Blue => "Blue",
            ColorScheme::Green => "Green",
            ColorScheme::Purple => "Purple",
            ColorScheme::Red => "Red",
            ColorScheme::Orange => "Orange",
            ColorScheme::Dark => "Dark",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStyle {
    Modern,
    Classic,
    Minimal,
}

impl TemplateStyle {
    pub fn layout_class(self) -> &'static str {
        match self {
            TemplateStyle::Modern => "layout-modern",
            TemplateStyle::Classic => "layout-classic",
            TemplateStyle::Minimal => "layout-minimal",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TemplateStyle::Modern => "Modern",
            TemplateStyle::Classic => "Classic",
            TemplateStyle::Minimal => "Minimal",
        }
    }
}

/// Values for the HTML blog template. Text is HTML-escaped on lookup.
pub struct PageContext<'a> {
    pub config: &'a BlogConfig,
    pub now: DateTime<Utc>,
}

impl<'a> PageContext<'a> {
    pub fn new(config: &'a BlogConfig) -> Self {
        PageContext {
            config,
            now: Utc::now(),
        }
    }
}

impl TemplateContext for PageContext<'_> {
    fn lookup(&self, name: &str) -> Option<String> {
        let c = self.config;
        let palette = c.color_scheme.palette();
        let value = match name {
            "blog_title" | "site_title" => escape_html(&c.blog_title),
            "blog_description" | "site_description" => escape_html(&c.blog_description),
            "blog_keywords" | "site_keywords" => escape_html(&c.blog_keywords),
            "current_year" => self.now.year().to_string(),
            "generated_at" => self.now.to_rfc3339(),
            "primary_color" => palette.primary.to_string(),
            "secondary_color" => palette.secondary.to_string(),
            "background_color" => palette.background.to_string(),
            "layout_class" => c.template_style.layout_class().to_string(),
            "posts_per_page" => c.posts_per_page.to_string(),
            _ => return None,
        };
        Some(value)
    }
}

/// Metadata written next to a generated template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMeta {
    #[serde(rename = "type")]
    pub kind: String,
    pub layout_style: String,
    pub color_scheme: String,
    pub blog_title: String,
    pub blog_description: String,
    pub blog_keywords: String,
    pub posts_per_page: u32,
    pub generated_at: String,
}

pub fn generate_html(config: &BlogConfig) -> Rendered {
    render(BLOG_TEMPLATE, &PageContext::new(config))
}

pub fn template_meta(config: &BlogConfig) -> TemplateMeta {
    TemplateMeta {
        kind: "Blog Homepage".to_string(),
        layout_style: config.template_style.name().to_string(),
        color_scheme: config.color_scheme.name().to_string(),
        blog_title: config.blog_title.clone(),
        blog_description: config.blog_description.clone(),
        blog_keywords: config.blog_keywords.clone(),
        posts_per_page: config.posts_per_page,
        generated_at: Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    struct MapContext(HashMap<&'static str, &'static str>);

    impl TemplateContext for MapContext {
        fn lookup(&self, name: &str) -> Option<String> {
            self.0.get(name).map(|v| v.to_string())
        }
    }

    #[test]
    fn replaces_known_and_reports_missing() {
        let ctx = MapContext(HashMap::from([("title", "Hi")]));
        let out = render("<h1>{{title}}</h1><p>{{ title }}</p>{{nope}}{{nope}}", &ctx);
        assert_eq!(out.text, "<h1>Hi</h1><p>Hi</p>{{nope}}{{nope}}");
        assert_eq!(out.missing, vec!["nope"]);
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let ctx = MapContext(HashMap::from([("a", "{{b}}"), ("b", "x")]));
        assert_eq!(render("{{a}}", &ctx).text, "{{b}}");
    }

    #[test]
    fn js_template_literals_untouched() {
        let ctx = MapContext(HashMap::new());
        let js = "const s = `${post.title}`; if (x) { y() }";
        let out = render(js, &ctx);
        assert_eq!(out.text, js);
        assert!(out.missing.is_empty());
    }

    #[test]
    fn page_context_escapes_and_colors() {
        let config = BlogConfig {
            blog_title: "Tips & <Tricks>".into(),
            color_scheme: ColorScheme::Green,
            ..Default::default()
        };
        let ctx = PageContext {
            config: &config,
            now: Utc.with_ymd_and_hms(2025, 1, 18, 0, 0, 0).unwrap(),
        };
        let out = render(
            "{{site_title}}|{{primary_color}}|{{current_year}}|{{layout_class}}",
            &ctx,
        );
        assert_eq!(out.text, "Tips &amp; &lt;Tricks&gt;|#059669|2025|layout-modern");
    }

    #[test]
    fn blog_template_fully_resolves() {
        let config = BlogConfig::default();
        let out = generate_html(&config);
        assert!(out.missing.is_empty(), "unresolved: {:?}", out.missing);
        assert!(out.text.contains("<title>My Blog</title>"));
        assert!(out.text.contains("#2563eb"));
    }
}
