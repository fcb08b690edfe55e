mod cloudflare;
mod parser;
mod posts;
mod settings;
mod sheets;
mod template;
mod worker;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use parser::Record;
use settings::{BlogConfig, ConfigStore, ConfigUpdate, JsonFileStore};
use sheets::{PostSource, SheetFetcher};
use template::{ColorScheme, TemplateStyle};

const GENERATED_TEMPLATE: &str = "generated_template.html";
const GENERATED_TEMPLATE_META: &str = "generated_template_config.json";

#[derive(Parser)]
#[command(
    name = "sheetblog",
    about = "Blog generator backed by Google Sheets, deployed to Cloudflare Workers"
)]
struct Cli {
    /// Config file (JSON)
    #[arg(short, long, global = true, default_value = settings::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the stored configuration
    Configure(ConfigureArgs),
    /// Print the effective configuration (file + SHEETBLOG_* env)
    ShowConfig,
    /// Check that the spreadsheet can be fetched as CSV
    TestSheets,
    /// Fetch and list posts (demo posts when the sheet is unreachable)
    Preview {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
        /// Include drafts
        #[arg(long)]
        all: bool,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Parse a local CSV file
    Parse {
        file: PathBuf,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate the HTML blog template
    Generate {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Write the Cloudflare Workers script
    Worker {
        /// HTML template to serve as the home page (default: generated template, if present)
        #[arg(long)]
        template: Option<PathBuf>,
        /// Directory searched for the generated template (the `generate --out-dir`)
        #[arg(long, default_value = ".")]
        template_dir: PathBuf,
        #[arg(short, long, default_value = "worker.js")]
        out: PathBuf,
    },
    /// Verify the Cloudflare token and account
    TestCloudflare,
    /// List Cloudflare accounts visible to the token
    Accounts,
    /// Generate the worker script and upload it to Cloudflare
    Deploy {
        /// HTML template to serve as the home page (default: generated template, if present)
        #[arg(long)]
        template: Option<PathBuf>,
        /// Directory searched for the generated template (the `generate --out-dir`)
        #[arg(long, default_value = ".")]
        template_dir: PathBuf,
        /// Worker name (default: prefix from config, optionally with random suffix)
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Args)]
struct ConfigureArgs {
    #[arg(long)]
    spreadsheet_id: Option<String>,
    #[arg(long)]
    sheet_name: Option<String>,
    #[arg(long)]
    cf_api_token: Option<String>,
    #[arg(long)]
    cf_account_id: Option<String>,
    #[arg(long)]
    cf_api_base: Option<String>,
    #[arg(long)]
    worker_name_prefix: Option<String>,
    #[arg(long)]
    auto_generate_name: Option<bool>,
    #[arg(long)]
    blog_title: Option<String>,
    #[arg(long)]
    blog_description: Option<String>,
    #[arg(long)]
    blog_keywords: Option<String>,
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=20))]
    posts_per_page: Option<u32>,
    #[arg(long, value_enum)]
    color_scheme: Option<ColorScheme>,
    #[arg(long, value_enum)]
    template_style: Option<TemplateStyle>,
    #[arg(long)]
    request_timeout_secs: Option<u64>,
}

impl From<ConfigureArgs> for ConfigUpdate {
    fn from(a: ConfigureArgs) -> Self {
        ConfigUpdate {
            spreadsheet_id: a.spreadsheet_id,
            sheet_name: a.sheet_name,
            cf_api_token: a.cf_api_token,
            cf_account_id: a.cf_account_id,
            cf_api_base: a.cf_api_base,
            worker_name_prefix: a.worker_name_prefix,
            auto_generate_name: a.auto_generate_name,
            blog_title: a.blog_title,
            blog_description: a.blog_description,
            blog_keywords: a.blog_keywords,
            posts_per_page: a.posts_per_page,
            color_scheme: a.color_scheme,
            template_style: a.template_style,
            request_timeout_secs: a.request_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let store = JsonFileStore::new(&cli.config);

    let result = match cli.command {
        Commands::Configure(args) => {
            let mut cfg = store.load()?;
            if ConfigUpdate::from(args).apply(&mut cfg) {
                store.save(&cfg)?;
                println!("Configuration saved to {}", store.path().display());
            } else {
                println!("No changes.");
            }
            Ok(())
        }
        Commands::ShowConfig => {
            let mut cfg = load_config(&store)?;
            cfg.cf_api_token = cfg.masked_token();
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            Ok(())
        }
        Commands::TestSheets => {
            let cfg = load_config(&store)?;
            if cfg.spreadsheet_id.trim().is_empty() {
                bail!("No spreadsheet id configured. Run `sheetblog configure --spreadsheet-id <ID>`.");
            }
            let fetcher = SheetFetcher::from_config(&cfg)?;
            let pb = spinner("Testing Google Sheets connection...")?;
            let fetched = fetcher.fetch_csv(&cfg.spreadsheet_id, &cfg.sheet_name).await;
            pb.finish_and_clear();

            match fetched {
                Ok(csv) => {
                    let rows = sheets::preview_lines(&csv.text, usize::MAX).len();
                    println!("Connection successful! Found {} rows via {}", rows, csv.url);
                    println!("\nFirst 5 rows:");
                    for (i, line) in sheets::preview_lines(&csv.text, 5).iter().enumerate() {
                        println!("  Row {}: {}", i + 1, line);
                    }
                    Ok(())
                }
                Err(e) => Err(anyhow::Error::new(e).context(
                    "Could not read the spreadsheet; make sure it is shared publicly (anyone with the link)",
                )),
            }
        }
        Commands::Preview { json, all, limit } => {
            let cfg = load_config(&store)?;
            let fetcher = SheetFetcher::from_config(&cfg)?;
            let pb = spinner("Fetching posts...")?;
            let (records, source) = sheets::load_posts(&fetcher, &cfg).await;
            pb.finish_and_clear();

            let shown: Vec<&Record> = if all {
                records.iter().collect()
            } else {
                posts::published(&records)
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
                return Ok(());
            }

            match &source {
                PostSource::Sheet { url } => println!("Source: {}\n", url),
                PostSource::Demo => println!("Source: demo posts (sheet unavailable)\n"),
            }
            print_posts(&shown, limit);
            print_stats(&records);
            Ok(())
        }
        Commands::Parse { file, json } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let sheet = parser::parse(&text);
            if json {
                println!("{}", serde_json::to_string_pretty(&sheet.records)?);
            } else {
                println!("Columns: {}", sheet.header.join(", "));
                let refs: Vec<&Record> = sheet.records.iter().collect();
                print_posts(&refs, usize::MAX);
            }
            Ok(())
        }
        Commands::Generate { out_dir } => {
            let cfg = load_config(&store)?;
            let rendered = template::generate_html(&cfg);
            if !rendered.missing.is_empty() {
                warn!(missing = ?rendered.missing, "template placeholders left unresolved");
            }
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("Failed to create {}", out_dir.display()))?;

            let html_path = out_dir.join(GENERATED_TEMPLATE);
            std::fs::write(&html_path, &rendered.text)
                .with_context(|| format!("Failed to write {}", html_path.display()))?;
            let meta_path = out_dir.join(GENERATED_TEMPLATE_META);
            let meta = serde_json::to_string_pretty(&template::template_meta(&cfg))?;
            std::fs::write(&meta_path, meta)
                .with_context(|| format!("Failed to write {}", meta_path.display()))?;

            println!(
                "Template generated: {} ({} characters, {} / {})",
                html_path.display(),
                rendered.text.chars().count(),
                cfg.template_style.name(),
                cfg.color_scheme.name()
            );
            Ok(())
        }
        Commands::Worker {
            template,
            template_dir,
            out,
        } => {
            let cfg = load_config(&store)?;
            let custom = read_custom_template(template.as_deref(), &template_dir)?;
            let script = worker::generate_script(&cfg, custom.as_deref());
            std::fs::write(&out, &script)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!(
                "Worker script written to {} ({} bytes{})",
                out.display(),
                script.len(),
                if custom.is_some() { ", custom template" } else { "" }
            );
            Ok(())
        }
        Commands::TestCloudflare => {
            let cfg = load_config(&store)?;
            let client = cloudflare::CloudflareClient::from_config(&cfg)?;
            let pb = spinner("Checking Cloudflare credentials...")?;
            let report = cloudflare::check_connection(&client, &cfg.cf_account_id).await;
            pb.finish_and_clear();
            let report = report?;

            println!("Token status: {}", report.token.status);
            match &report.account {
                Some(a) => println!("Account: {} ({}, {})", a.name, a.id, a.kind),
                None => {
                    let ids: Vec<&str> = report.accounts.iter().map(|a| a.id.as_str()).collect();
                    bail!(
                        "Account id {:?} not found. Available accounts: {}",
                        cfg.cf_account_id,
                        ids.join(", ")
                    );
                }
            }
            match report.scripts {
                Some(n) => println!("Workers: {} existing", n),
                None => println!(
                    "Workers: cannot list (token needs the 'Cloudflare Workers:Edit' permission)"
                ),
            }
            Ok(())
        }
        Commands::Accounts => {
            let cfg = load_config(&store)?;
            let client = cloudflare::CloudflareClient::from_config(&cfg)?;
            let accounts = client.accounts().await?;
            if accounts.is_empty() {
                println!("No accounts visible to this token.");
                return Ok(());
            }
            println!("{:<34} | {:<30} | {:<10}", "ID", "Name", "Type");
            println!("{}", "-".repeat(80));
            for a in &accounts {
                println!("{:<34} | {:<30} | {:<10}", a.id, truncate(&a.name, 30), a.kind);
            }
            Ok(())
        }
        Commands::Deploy {
            template,
            template_dir,
            name,
        } => {
            let cfg = load_config(&store)?;
            let client = cloudflare::CloudflareClient::from_config(&cfg)?;
            let custom = read_custom_template(template.as_deref(), &template_dir)?;
            let script = worker::generate_script(&cfg, custom.as_deref());

            let pb = spinner("Deploying to Cloudflare Workers...")?;
            let deployed = cloudflare::deploy(&client, &cfg, &script, name.as_deref()).await;
            pb.finish_and_clear();
            let deployment = deployed?;

            println!("Deployed worker {}", deployment.worker_name);
            println!("URL: {}", deployment.url);

            // Stored config only; the env overlay must not leak into the file.
            let mut stored = store.load()?;
            stored.last_deployment = Some(deployment);
            store.save(&stored)?;
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn load_config(store: &JsonFileStore) -> anyhow::Result<BlogConfig> {
    let cfg = settings::resolve(store, settings::ENV_PREFIX)
        .with_context(|| format!("Failed to load config from {}", store.path().display()))?;
    info!(config = %store.path().display(), "Configuration loaded");
    Ok(cfg)
}

/// Explicit template file, else the generated template in `dir` when it exists.
fn read_custom_template(path: Option<&Path>, dir: &Path) -> anyhow::Result<Option<String>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = dir.join(GENERATED_TEMPLATE);
            if !default.exists() {
                return Ok(None);
            }
            default
        }
    };
    let html = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read template {}", path.display()))?;
    info!(chars = html.chars().count(), "Using custom template {}", path.display());
    Ok(Some(html))
}

fn spinner(msg: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn print_posts(records: &[&Record], limit: usize) {
    if records.is_empty() {
        println!("No posts found.");
        return;
    }

    println!(
        "{:>4} | {:<32} | {:<14} | {:<10} | {:<9} | {:<24}",
        "ID", "Title", "Category", "Date", "Status", "Slug"
    );
    println!("{}", "-".repeat(108));

    for r in records.iter().take(limit) {
        println!(
            "{:>4} | {:<32} | {:<14} | {:<10} | {:<9} | {:<24}",
            truncate(r.id(), 4),
            truncate(r.title(), 32),
            truncate(posts::category(r), 14),
            truncate(r.get("date").unwrap_or("-"), 10),
            r.non_empty("status").unwrap_or("published"),
            truncate(r.slug(), 24)
        );
    }

    if records.len() > limit {
        println!("... {} more", records.len() - limit);
    }
}

fn print_stats(records: &[Record]) {
    let s = posts::stats(records);
    println!(
        "\n{} posts ({} published) | {} categories | {} tags",
        s.total_posts, s.published_posts, s.total_categories, s.total_tags
    );
    for c in &s.categories {
        println!("  {}: {}", c.name, c.count);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_template_found_in_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_custom_template(None, dir.path()).unwrap(), None);

        std::fs::write(dir.path().join(GENERATED_TEMPLATE), "<h1>{{blog_title}}</h1>").unwrap();
        let html = read_custom_template(None, dir.path()).unwrap();
        assert_eq!(html.as_deref(), Some("<h1>{{blog_title}}</h1>"));
    }

    #[test]
    fn explicit_template_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(GENERATED_TEMPLATE), "generated").unwrap();
        let explicit = dir.path().join("custom.html");
        std::fs::write(&explicit, "custom").unwrap();

        let html = read_custom_template(Some(&explicit), dir.path()).unwrap();
        assert_eq!(html.as_deref(), Some("custom"));
    }

    #[test]
    fn missing_explicit_template_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.html");
        assert!(read_custom_template(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("Belajar", 10), "Belajar");
        assert_eq!(truncate("Panduan lengkap", 7), "Panduan...");
    }
}
