pub mod fields;
pub mod lines;
pub mod records;
pub mod slug;

pub use records::{parse, parse_records, ParsedSheet, Record};
pub use slug::slugify;
