/// Split one line on commas outside double-quoted spans.
///
/// A `"` only toggles the quoted state and is never kept. Doubled quotes are
/// not an escape: `""` toggles twice and contributes nothing. An unbalanced
/// quote keeps the rest of the line inside one field. Each field is trimmed.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

/// Header names: split like any other line, then strip one surviving layer of
/// quotes. Case is preserved here.
pub fn normalize_header(line: &str) -> Vec<String> {
    split_fields(line)
        .into_iter()
        .map(|name| {
            let name = name.trim();
            let name = name.strip_prefix('"').unwrap_or(name);
            let name = name.strip_suffix('"').unwrap_or(name);
            name.trim().to_string()
        })
        .collect()
}
