use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fields::{normalize_header, split_fields};
use super::lines::split_lines;
use super::slug::slugify;

/// One data row: lower-cased column name → trimmed value.
///
/// After parsing, `id` and `slug` are always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Record(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value for `key`, treating an empty string as absent.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn id(&self) -> &str {
        self.get("id").unwrap_or_default()
    }

    pub fn slug(&self) -> &str {
        self.get("slug").unwrap_or_default()
    }

    pub fn title(&self) -> &str {
        self.get("title").unwrap_or_default()
    }

    /// Fill `id` with the line index and `slug` from the title when either is
    /// missing or empty.
    fn backfill(&mut self, line_index: usize) {
        if self.non_empty("id").is_none() {
            self.insert("id", line_index.to_string());
        }
        if self.non_empty("slug").is_none() {
            let slug = slugify(self.title());
            self.insert("slug", slug);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSheet {
    /// Header names in column order, case preserved.
    pub header: Vec<String>,
    pub records: Vec<Record>,
}

/// Parse a raw CSV document. Total over all input: malformed lines are
/// dropped, an empty or header-only document gives no records.
pub fn parse(text: &str) -> ParsedSheet {
    // A final newline ends the last row; it does not start an empty one.
    let text = text.strip_suffix('\n').unwrap_or(text);
    let mut lines = split_lines(text);
    let header = match lines.next() {
        Some(first) if !first.trim().is_empty() => normalize_header(first),
        _ => return ParsedSheet::default(),
    };
    let keys: Vec<String> = header.iter().map(|h| h.to_lowercase()).collect();

    let mut records = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line_index = idx + 1;
        let values = split_fields(line);
        if values.len() != keys.len() {
            debug!(
                line = line_index,
                expected = keys.len(),
                found = values.len(),
                "dropping line with mismatched field count"
            );
            continue;
        }

        let mut record = Record::from_pairs(keys.iter().cloned().zip(values));
        record.backfill(line_index);
        records.push(record);
    }

    ParsedSheet { header, records }
}

pub fn parse_records(text: &str) -> Vec<Record> {
    parse(text).records
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "title,category,tags\n\"Hello, World\",News,\"a, b\"\nShort,Misc,x";

    #[test]
    fn scenario_two_records() {
        let records = parse_records(SCENARIO);
        assert_eq!(records.len(), 2);

        let expected_first = Record::from_pairs([
            ("title", "Hello, World"),
            ("category", "News"),
            ("tags", "a, b"),
            ("id", "1"),
            ("slug", "hello-world"),
        ]);
        let expected_second = Record::from_pairs([
            ("title", "Short"),
            ("category", "Misc"),
            ("tags", "x"),
            ("id", "2"),
            ("slug", "short"),
        ]);
        assert_eq!(records[0], expected_first);
        assert_eq!(records[1], expected_second);
    }

    #[test]
    fn empty_and_header_only_yield_nothing() {
        assert!(parse_records("").is_empty());
        assert!(parse_records("title,category").is_empty());
        assert!(parse_records("title,category\n").is_empty());
    }

    #[test]
    fn well_formed_lines_all_become_records() {
        let mut text = String::from("title,author");
        for i in 0..25 {
            text.push_str(&format!("\nPost {},Admin", i));
        }
        assert_eq!(parse_records(&text).len(), 25);
    }

    #[test]
    fn mismatched_lines_are_dropped() {
        let text = "title,category\nOne,A\nTwo\nThree,C,extra\nFour,D";
        let records = parse_records(text);
        let titles: Vec<&str> = records.iter().map(|r| r.title()).collect();
        assert_eq!(titles, vec!["One", "Four"]);
        // dropped lines still consume their line index
        assert_eq!(records[1].id(), "4");
    }

    #[test]
    fn parsing_is_idempotent() {
        assert_eq!(parse(SCENARIO), parse(SCENARIO));
    }

    #[test]
    fn header_case_kept_keys_lowercased() {
        let sheet = parse("Title,CATEGORY\nHi,News");
        assert_eq!(sheet.header, vec!["Title", "CATEGORY"]);
        assert_eq!(sheet.records[0].get("category"), Some("News"));
        assert_eq!(sheet.records[0].get("CATEGORY"), None);
    }

    #[test]
    fn existing_id_and_slug_are_kept() {
        let records = parse_records("id,slug,title\n42,custom,Some Title\n,,Other Title");
        assert_eq!(records[0].id(), "42");
        assert_eq!(records[0].slug(), "custom");
        assert_eq!(records[1].id(), "2");
        assert_eq!(records[1].slug(), "other-title");
    }

    #[test]
    fn id_and_slug_present_without_title() {
        let records = parse_records("category\nNews");
        assert_eq!(records[0].id(), "1");
        assert_eq!(records[0].get("slug"), Some(""));
    }

    #[test]
    fn crlf_documents_parse() {
        let records = parse_records("title,status\r\nA,draft\r\nB,published\r\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("status"), Some("draft"));
        assert_eq!(records[1].get("status"), Some("published"));
    }

    #[test]
    fn blank_line_is_a_record_in_single_column_sheets() {
        let records = parse_records("title\nA\n\nB");
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].title(), "");
        assert_eq!(records[1].id(), "2");
        assert_eq!(records[2].id(), "3");
    }

    #[test]
    fn blank_line_dropped_when_header_has_several_columns() {
        let records = parse_records("title,category\nA,x\n\nB,y");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id(), "3");
    }

    #[test]
    fn trailing_newline_adds_no_record() {
        assert_eq!(parse_records("title\nA\n").len(), 1);
        assert_eq!(parse_records("title\r\nA\r\n").len(), 1);
    }

    #[test]
    fn duplicate_header_keeps_last_column() {
        let records = parse_records("title,Title\nfirst,second");
        assert_eq!(records[0].title(), "second");
    }
}
