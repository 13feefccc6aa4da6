//! Citation edges from the reference feed.
//!
//! Every feed line names one cited paper followed by the papers citing it:
//!
//! ```text
//! RePEc:aea:aecrev:v:91:y:2001:i:1:p:1-20 RePEc:nbr:nberwo:8001#RePEc:wpa:wuwpma:0102
//! ```
//!
//! Each line becomes the edges `citing -> cited`, committed together.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::construct::Database;
use crate::error::{RepeciError, Result};

pub const DEFAULT_SEPARATOR: &str = "#";

/// One parsed feed line, with self references and repeated handles removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLine<'l> {
    pub cited: &'l str,
    pub citing: Vec<&'l str>,
    pub self_loops: usize,
    pub duplicates: usize,
}

/// Returns `None` when the line does not hold a cited handle followed by at
/// least one citing handle.
pub fn parse_reference_line<'l>(line: &'l str, separator: &str) -> Option<ReferenceLine<'l>> {
    let mut fields = line.split_whitespace();
    let cited = fields.next()?;
    let mut rest = fields.peekable();
    rest.peek()?;
    let mut parsed = ReferenceLine {
        cited,
        citing: Vec::new(),
        self_loops: 0,
        duplicates: 0,
    };
    for handle in rest
        .flat_map(|field| field.split(separator))
        .filter(|h| !h.is_empty())
    {
        if handle == cited {
            parsed.self_loops += 1;
        } else if parsed.citing.contains(&handle) {
            parsed.duplicates += 1;
        } else {
            parsed.citing.push(handle);
        }
    }
    Some(parsed)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefsReport {
    /// Non blank lines read, malformed ones included.
    pub lines_processed: usize,
    pub edges_created: usize,
    pub edges_existing: usize,
    pub self_loops_dropped: usize,
    pub duplicates_dropped: usize,
    /// Line numbers of lines that could not be parsed.
    pub malformed: Vec<usize>,
    pub storage_failures: usize,
}

pub struct CitationEdgeBuilder<'db> {
    db: &'db Database,
    separator: String,
}

impl<'db> CitationEdgeBuilder<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self {
            db,
            separator: String::from(DEFAULT_SEPARATOR),
        }
    }
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
    pub fn import_refs_file(&self, path: &Path, limit: usize) -> Result<RefsReport> {
        let file = File::open(path)?;
        tracing::debug!(path = %path.display(), "reading reference feed");
        self.import_refs(BufReader::new(file), limit)
    }
    /// Links the papers of every feed line. A `limit` above zero caps the
    /// number of lines processed; blank lines are not counted.
    pub fn import_refs<R: BufRead>(&self, mut feed: R, limit: usize) -> Result<RefsReport> {
        if self.separator.is_empty() {
            return Err(RepeciError::InvalidArgument(String::from(
                "citing handle separator is empty",
            )));
        }
        let mut report = RefsReport::default();
        let mut buffer = Vec::new();
        let mut line_number = 0;
        loop {
            if limit > 0 && report.lines_processed >= limit {
                break;
            }
            buffer.clear();
            if feed.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }
            line_number += 1;
            let Ok(line) = std::str::from_utf8(&buffer) else {
                report.lines_processed += 1;
                tracing::warn!(line = line_number, "reference line is not valid UTF-8");
                report.malformed.push(line_number);
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            report.lines_processed += 1;
            let Some(parsed) = parse_reference_line(line, &self.separator) else {
                tracing::warn!(line = line_number, "malformed reference line");
                report.malformed.push(line_number);
                continue;
            };
            report.self_loops_dropped += parsed.self_loops;
            report.duplicates_dropped += parsed.duplicates;
            match self.db.link_citations(parsed.cited, &parsed.citing) {
                Ok(linked) => {
                    report.edges_created += linked.created;
                    report.edges_existing += linked.existing;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        line = line_number,
                        cited = parsed.cited,
                        error = %e,
                        "could not link citations"
                    );
                    report.storage_failures += 1;
                }
            }
        }
        tracing::info!(
            lines = report.lines_processed,
            created = report.edges_created,
            existing = report.edges_existing,
            self_loops = report.self_loops_dropped,
            duplicates = report.duplicates_dropped,
            malformed = report.malformed.len(),
            "reference feed imported"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_references_and_repeats_are_dropped() {
        let parsed = parse_reference_line("RePEc:x:1 RePEc:x:2#RePEc:x:2#RePEc:x:1\n", "#").unwrap();
        assert_eq!(parsed.cited, "RePEc:x:1");
        assert_eq!(parsed.citing, vec!["RePEc:x:2"]);
        assert_eq!(parsed.self_loops, 1);
        assert_eq!(parsed.duplicates, 1);
    }

    #[test]
    fn single_field_is_malformed() {
        assert_eq!(parse_reference_line("RePEc:x:1", "#"), None);
        assert_eq!(parse_reference_line("   ", "#"), None);
    }
}
