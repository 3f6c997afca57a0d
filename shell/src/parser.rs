//! Splitting one input line into pipeline segments.
//!
//! The grammar is deliberately tiny: `segment ('|' segment)*`, where a segment is
//! a whitespace-separated list of words. There is no quoting and no escaping.

use crate::error::ShellError;

pub(crate) const PIPE: char = '|';

/// One command of a pipeline, not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub args: Vec<String>,
}

/// Parse a raw line into its segments, in order.
///
/// A blank line gives no segments. A segment without any word (as in
/// `echo a |` or `| wc`) is an error.
pub fn parse_line(line: &str) -> Result<Vec<Segment>, ShellError> {
    if line.trim().is_empty() {
        return Ok(Vec::new());
    }
    line.split(PIPE)
        .enumerate()
        .map(|(position, raw)| {
            let mut words = raw.split_whitespace().map(str::to_owned);
            let name = words
                .next()
                .ok_or_else(|| ShellError::Parse(format!("no command in segment {}", position + 1)))?;
            Ok(Segment {
                name,
                args: words.collect(),
            })
        })
        .collect()
}
