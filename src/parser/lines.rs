use std::str::Split;

/// Lazy line iterator over a raw document. Splits on `\n` only and leaves
/// every line untrimmed; a trailing `\r` is the field splitter's problem.
/// Cloning forks an independent cursor at the current position.
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    inner: Split<'a, char>,
}

pub fn split_lines(text: &str) -> Lines<'_> {
    Lines {
        inner: text.split('\n'),
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.inner.next()
    }
}
