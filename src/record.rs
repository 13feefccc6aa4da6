//! Parsing of ReDIF paper records.
//!
//! A record is a block of `Key: value` lines describing one paper. Records are
//! concatenated without separators; each one ends at its `Handle` line. The
//! [`RecordParser`] turns a stream of lines into a lazy [`Records`] iterator of
//! validated [`PaperDraft`]s, or [`Rejection`]s for records that failed validation.
//!
//! Only the fields listed in [`Field`] are interpreted, everything else is skipped
//! so that unknown metadata does not break ingestion.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

/// `Template-Type` value marking a record as a journal article.
pub const ARTICLE_MARKER: &str = "ReDIF-Article 1.0";
/// Every JEL classification code has exactly this many characters.
pub const CLASSIFICATION_LENGTH: usize = 3;

lazy_static! {
    // everything up to the first colon is the field name
    static ref FIELD_LINE: Regex = Regex::new(r"^([^:]*):(.*)$").unwrap();
    static ref FIELDS: HashMap<&'static str, Field> = {
        let mut fields = HashMap::new();
        fields.insert("template-type", Field::TemplateType);
        fields.insert("title", Field::Title);
        fields.insert("year", Field::Year);
        fields.insert("author-name", Field::AuthorName);
        fields.insert("classification-jel", Field::ClassificationJel);
        fields.insert("handle", Field::Handle);
        fields
    };
}

// ------------- Field -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    TemplateType,
    Title,
    Year,
    AuthorName,
    ClassificationJel,
    Handle,
}
impl Field {
    /// Field names are matched without regard to case, as ReDIF prescribes.
    pub fn recognize(name: &str) -> Option<Field> {
        FIELDS.get(name.trim().to_ascii_lowercase().as_str()).copied()
    }
}

/// Splits a line into its field name and trimmed value.
/// Returns `None` for lines without a colon.
pub fn split_field(line: &str) -> Option<(&str, &str)> {
    let line = line
        .trim_start_matches('\u{feff}')
        .trim_end_matches(['\r', '\n']);
    let captures = FIELD_LINE.captures(line)?;
    Some((
        captures.get(1)?.as_str().trim(),
        captures.get(2)?.as_str().trim(),
    ))
}

// ------------- PaperDraft -------------
/// A fully validated record, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaperDraft {
    handle: String,
    title: Option<String>,
    year: Option<i32>,
    authors: Vec<String>,
    classifications: BTreeSet<String>,
    line: usize,
}
impl PaperDraft {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            ..Self::default()
        }
    }
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
    pub fn with_author(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.authors.contains(&name) {
            self.authors.push(name);
        }
        self
    }
    pub fn with_classification(mut self, code: impl Into<String>) -> Self {
        self.classifications.insert(code.into());
        self
    }
    pub fn handle(&self) -> &str {
        &self.handle
    }
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
    pub fn year(&self) -> Option<i32> {
        self.year
    }
    /// Author names in order of first appearance, without repetitions.
    pub fn authors(&self) -> &[String] {
        &self.authors
    }
    pub fn classifications(&self) -> &BTreeSet<String> {
        &self.classifications
    }
    /// Line number of the terminating `Handle` line (zero when built by hand).
    pub fn line(&self) -> usize {
        self.line
    }
    /// Checks the invariants every persisted paper must satisfy.
    pub fn validate(&self) -> Result<(), RejectReason> {
        if self.handle.is_empty() {
            return Err(RejectReason::EmptyHandle);
        }
        if self.authors.is_empty() {
            return Err(RejectReason::NoAuthors);
        }
        if let Some(code) = self
            .classifications
            .iter()
            .find(|code| code.chars().count() != CLASSIFICATION_LENGTH)
        {
            return Err(RejectReason::ClassificationLength { code: code.clone() });
        }
        Ok(())
    }
}

// ------------- Rejection -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    ClassificationLength { code: String },
    NonIntegerYear { value: String },
    NoAuthors,
    EmptyHandle,
    Unterminated,
}
impl RejectReason {
    /// Short stable name, used when counting rejections per reason.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClassificationLength { .. } => "classification_length",
            Self::NonIntegerYear { .. } => "non_integer_year",
            Self::NoAuthors => "no_authors",
            Self::EmptyHandle => "empty_handle",
            Self::Unterminated => "unterminated",
        }
    }
}
impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ClassificationLength { code } => write!(
                f,
                "classification code '{}' does not have {} characters",
                code, CLASSIFICATION_LENGTH
            ),
            Self::NonIntegerYear { value } => write!(f, "year '{}' is not an integer", value),
            Self::NoAuthors => write!(f, "record has no authors"),
            Self::EmptyHandle => write!(f, "record has an empty handle"),
            Self::Unterminated => write!(f, "record ended without a handle"),
        }
    }
}

/// A record that was discarded, with enough context to find it in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub line: usize,
    pub handle: Option<String>,
    pub reason: RejectReason,
}
impl Rejection {
    pub fn new(line: usize, handle: Option<String>, reason: RejectReason) -> Self {
        Self {
            line,
            handle,
            reason,
        }
    }
}
impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.handle {
            Some(handle) => write!(f, "record {} at line {}: {}", handle, self.line, self.reason),
            None => write!(f, "record at line {}: {}", self.line, self.reason),
        }
    }
}

// ------------- Accumulator -------------
enum Step {
    Continue,
    Skipped,
    Emit(Result<PaperDraft, Rejection>),
}

// Collects the fields of the record currently being read.
#[derive(Debug, Default)]
struct Accumulator {
    is_article: bool,
    touched: bool,
    title: Option<String>,
    year: Option<i32>,
    authors: Vec<String>,
    classifications: BTreeSet<String>,
    rejected: Option<RejectReason>,
}
impl Accumulator {
    fn feed(&mut self, line: usize, field: Field, value: &str, marker: &str) -> Step {
        match field {
            // the template type of a record is fixed once its fields are collected
            Field::TemplateType => {
                if !self.touched {
                    self.is_article = value == marker;
                }
                return Step::Continue;
            }
            Field::Handle => return self.finish(line, value),
            _ => (),
        }
        // non-articles and already rejected records are read through to their handle
        if !self.is_article || self.rejected.is_some() {
            return Step::Continue;
        }
        self.touched = true;
        match field {
            Field::Title => self.title = Some(value.to_owned()),
            Field::Year => match value.parse::<i32>() {
                Ok(year) => self.year = Some(year),
                Err(_) => {
                    self.rejected = Some(RejectReason::NonIntegerYear {
                        value: value.to_owned(),
                    })
                }
            },
            Field::AuthorName => {
                if !value.is_empty() && !self.authors.iter().any(|a| a == value) {
                    self.authors.push(value.to_owned());
                }
            }
            Field::ClassificationJel => {
                for code in value.split(',').map(str::trim).filter(|c| !c.is_empty()) {
                    if code.chars().count() != CLASSIFICATION_LENGTH {
                        self.rejected = Some(RejectReason::ClassificationLength {
                            code: code.to_owned(),
                        });
                        break;
                    }
                    self.classifications.insert(code.to_owned());
                }
            }
            Field::TemplateType | Field::Handle => (),
        }
        Step::Continue
    }
    fn finish(&mut self, line: usize, handle: &str) -> Step {
        let record = std::mem::take(self);
        if !record.is_article {
            return Step::Skipped;
        }
        let handle = handle.to_owned();
        if let Some(reason) = record.rejected {
            return Step::Emit(Err(Rejection::new(line, Some(handle), reason)));
        }
        let draft = PaperDraft {
            handle,
            title: record.title,
            year: record.year,
            authors: record.authors,
            classifications: record.classifications,
            line,
        };
        match draft.validate() {
            Ok(()) => Step::Emit(Ok(draft)),
            Err(reason) => Step::Emit(Err(Rejection::new(
                line,
                Some(draft.handle).filter(|h| !h.is_empty()),
                reason,
            ))),
        }
    }
    fn unterminated(&mut self, line: usize) -> Option<Rejection> {
        let record = std::mem::take(self);
        (record.is_article && record.touched)
            .then(|| Rejection::new(line, None, RejectReason::Unterminated))
    }
}

// ------------- RecordParser -------------
#[derive(Debug, Clone)]
pub struct RecordParser {
    article_marker: String,
}
impl Default for RecordParser {
    fn default() -> Self {
        Self::new(ARTICLE_MARKER)
    }
}
impl RecordParser {
    pub fn new(article_marker: impl Into<String>) -> Self {
        Self {
            article_marker: article_marker.into(),
        }
    }
    pub fn article_marker(&self) -> &str {
        &self.article_marker
    }
    /// Lazily parses the given lines. The input is consumed once.
    pub fn parse<I>(&self, lines: I) -> Records<I::IntoIter>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Records {
            lines: lines.into_iter(),
            line_number: 0,
            marker: self.article_marker.clone(),
            accumulator: Accumulator::default(),
            skipped: 0,
            finished: false,
        }
    }
}

/// Iterator over the records of a line stream.
pub struct Records<I> {
    lines: I,
    line_number: usize,
    marker: String,
    accumulator: Accumulator,
    skipped: usize,
    finished: bool,
}
impl<I> Records<I> {
    /// Number of complete records skipped because they were not articles.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
impl<I> Iterator for Records<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = Result<PaperDraft, Rejection>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        for line in self.lines.by_ref() {
            self.line_number += 1;
            let Some((name, value)) = split_field(line.as_ref()) else {
                continue;
            };
            let Some(field) = Field::recognize(name) else {
                continue;
            };
            match self
                .accumulator
                .feed(self.line_number, field, value, &self.marker)
            {
                Step::Continue => (),
                Step::Skipped => self.skipped += 1,
                Step::Emit(record) => return Some(record),
            }
        }
        self.finished = true;
        self.accumulator.unterminated(self.line_number).map(Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_field_takes_text_before_first_colon() {
        assert_eq!(
            split_field("Handle: RePEc:aea:aecrev:v:1:y:2001"),
            Some(("Handle", "RePEc:aea:aecrev:v:1:y:2001"))
        );
        assert_eq!(split_field("Title:   spaced  \r\n"), Some(("Title", "spaced")));
        assert_eq!(split_field("\u{feff}Year: 1999"), Some(("Year", "1999")));
        assert_eq!(split_field("no colon here"), None);
    }

    #[test]
    fn field_names_ignore_case() {
        assert_eq!(Field::recognize("author-name"), Some(Field::AuthorName));
        assert_eq!(Field::recognize("CLASSIFICATION-JEL"), Some(Field::ClassificationJel));
        assert_eq!(Field::recognize("Abstract"), None);
    }

    #[test]
    fn draft_validation_checks_authors_and_codes() {
        let draft = PaperDraft::new("RePEc:x:1");
        assert_eq!(draft.validate(), Err(RejectReason::NoAuthors));
        let draft = draft.with_author("Smith").with_classification("C1");
        assert_eq!(
            draft.validate(),
            Err(RejectReason::ClassificationLength { code: "C1".into() })
        );
        assert_eq!(PaperDraft::new("").with_author("Smith").validate(), Err(RejectReason::EmptyHandle));
    }
}
