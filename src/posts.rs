use std::collections::HashSet;

use serde::Serialize;

use crate::parser::{slugify, Record};

const UNCATEGORIZED: &str = "Uncategorized";

/// A record is published unless its status says `draft`.
pub fn is_published(record: &Record) -> bool {
    record
        .get("status")
        .map(|s| !s.trim().eq_ignore_ascii_case("draft"))
        .unwrap_or(true)
}

pub fn published(records: &[Record]) -> Vec<&Record> {
    records.iter().filter(|r| is_published(r)).collect()
}

/// Split the comma-separated `tags` column into trimmed, non-empty names.
pub fn tags(record: &Record) -> Vec<&str> {
    record
        .get("tags")
        .map(|t| t.split(',').map(str::trim).filter(|t| !t.is_empty()).collect())
        .unwrap_or_default()
}

pub fn category(record: &Record) -> &str {
    record.non_empty("category").unwrap_or(UNCATEGORIZED)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStats {
    pub total_posts: usize,
    pub published_posts: usize,
    pub total_categories: usize,
    pub total_tags: usize,
    /// First-seen order.
    pub categories: Vec<CategoryCount>,
}

pub fn stats(records: &[Record]) -> PostStats {
    let mut categories: Vec<CategoryCount> = Vec::new();
    let mut tag_set: HashSet<&str> = HashSet::new();

    for record in records {
        let name = category(record);
        match categories.iter_mut().find(|c| c.name == name) {
            Some(c) => c.count += 1,
            None => categories.push(CategoryCount {
                name: name.to_string(),
                count: 1,
            }),
        }
        tag_set.extend(tags(record));
    }

    PostStats {
        total_posts: records.len(),
        published_posts: records.iter().filter(|r| is_published(r)).count(),
        total_categories: categories.len(),
        total_tags: tag_set.len(),
        categories,
    }
}

/// Built-in posts shown when the sheet cannot be reached.
pub fn demo_posts() -> Vec<Record> {
    const DEMO: &[(&str, &str, &str, &str, &str)] = &[
        (
            "Cara Membuat Blog dengan Google Sheets",
            "Panduan lengkap untuk membuat blog sederhana yang terhubung dengan Google Sheets sebagai database.",
            "Tutorial",
            "blog, google sheets, tutorial",
            "2025-01-18",
        ),
        (
            "Optimasi SEO untuk Blog",
            "Tips dan trik untuk mengoptimalkan SEO blog Anda agar lebih mudah ditemukan di mesin pencari.",
            "SEO",
            "seo, optimasi, blog",
            "2025-01-17",
        ),
        (
            "Deploy ke Cloudflare Workers",
            "Panduan step-by-step untuk deploy blog Anda ke Cloudflare Workers secara gratis.",
            "Deployment",
            "cloudflare, workers, deploy",
            "2025-01-16",
        ),
    ];

    DEMO.iter()
        .enumerate()
        .map(|(i, (title, content, category, tags, date))| {
            Record::from_pairs([
                ("id", (i + 1).to_string()),
                ("title", title.to_string()),
                ("slug", slugify(title)),
                ("content", content.to_string()),
                ("category", category.to_string()),
                ("tags", tags.to_string()),
                ("author", "Admin".to_string()),
                ("date", date.to_string()),
                ("status", "published".to_string()),
            ])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_records;

    #[test]
    fn draft_is_unpublished_missing_status_is_published() {
        let records = parse_records("title,status\nA,draft\nB,published\nC,\nD, Draft ");
        let titles: Vec<&str> = published(&records).iter().map(|r| r.title()).collect();
        assert_eq!(titles, vec!["B", "C"]);

        let no_status = parse_records("title\nOnly");
        assert!(is_published(&no_status[0]));
    }

    #[test]
    fn tags_are_split_and_trimmed() {
        let records = parse_records("title,tags\nA,\"rust , cli,,web\"");
        assert_eq!(tags(&records[0]), vec!["rust", "cli", "web"]);
    }

    #[test]
    fn stats_count_categories_and_tags() {
        let text = "title,category,tags,status\n\
                    A,News,\"x, y\",published\n\
                    B,,y,draft\n\
                    C,News,z,";
        let s = stats(&parse_records(text));
        assert_eq!(s.total_posts, 3);
        assert_eq!(s.published_posts, 2);
        assert_eq!(s.total_categories, 2);
        assert_eq!(s.total_tags, 3);
        assert_eq!(
            s.categories,
            vec![
                CategoryCount { name: "News".into(), count: 2 },
                CategoryCount { name: "Uncategorized".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn demo_posts_are_fixed() {
        let demo = demo_posts();
        assert_eq!(demo.len(), 3);
        assert_eq!(demo[0].id(), "1");
        assert_eq!(demo[2].slug(), "deploy-ke-cloudflare-workers");
        assert_eq!(demo, demo_posts());
    }
}
