//! File by file ingestion of ReDIF records.
//!
//! Each file is read whole, decoded, and handed to the [`RecordParser`]. Every
//! draft the parser emits is committed as its own unit of work, so a failure
//! never leaves a paper half linked to its authors or classifications.
//! Recoverable problems (undecodable files, rejected records, a failed commit)
//! are logged, counted in the [`ImportReport`], and the import goes on. Only
//! storage becoming unusable aborts it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Encoding, ImportSettings};
use crate::construct::Database;
use crate::error::{RepeciError, Result};
use crate::interface::CancelToken;
use crate::record::{RecordParser, Rejection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub path: PathBuf,
    pub rejection: Rejection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Files read and parsed, whatever happened to their records.
    pub files_processed: usize,
    pub files_skipped: Vec<SkippedFile>,
    pub papers_committed: usize,
    /// Complete records that were not articles.
    pub records_skipped: usize,
    pub rejected: Vec<RejectedRecord>,
    pub storage_failures: usize,
}
impl ImportReport {
    pub fn merge(&mut self, other: ImportReport) {
        self.files_processed += other.files_processed;
        self.files_skipped.extend(other.files_skipped);
        self.papers_committed += other.papers_committed;
        self.records_skipped += other.records_skipped;
        self.rejected.extend(other.rejected);
        self.storage_failures += other.storage_failures;
    }
    /// Number of rejected records per reason.
    pub fn rejections_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut kinds = BTreeMap::new();
        for rejected in &self.rejected {
            *kinds.entry(rejected.rejection.reason.kind()).or_insert(0) += 1;
        }
        kinds
    }
    /// Article records that did not make it into the store.
    pub fn discarded(&self) -> usize {
        self.rejected.len() + self.storage_failures
    }
}

/// Turns raw file content into text. Latin-1 maps every byte to the code point
/// of the same value and therefore never fails.
pub fn decode(path: &Path, bytes: Vec<u8>, encoding: Encoding) -> Result<String> {
    match encoding {
        Encoding::Utf8 => String::from_utf8(bytes).map_err(|e| RepeciError::Decode {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
        Encoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
    }
}

pub struct CorpusImporter<'db> {
    db: &'db Database,
    parser: RecordParser,
    encoding: Encoding,
    cancel: Option<CancelToken>,
}

impl<'db> CorpusImporter<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self {
            db,
            parser: RecordParser::default(),
            encoding: Encoding::default(),
            cancel: None,
        }
    }
    pub fn with_settings(db: &'db Database, settings: &ImportSettings) -> Self {
        Self {
            db,
            parser: RecordParser::new(settings.article_marker.clone()),
            encoding: settings.encoding,
            cancel: None,
        }
    }
    /// Stops the import at the next file boundary once the token is cancelled.
    pub fn cancel_on(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
    /// Imports the files in the given order. A `limit` above zero stops the
    /// import after that many files were processed.
    pub fn import_all<P: AsRef<Path>>(&self, files: &[P], limit: usize) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for file in files {
            if limit > 0 && report.files_processed >= limit {
                break;
            }
            if self.cancelled() {
                tracing::info!(processed = report.files_processed, "import cancelled");
                break;
            }
            if self.import_file(file.as_ref(), &mut report)? {
                report.files_processed += 1;
            }
        }
        tracing::info!(
            files = report.files_processed,
            skipped_files = report.files_skipped.len(),
            papers = report.papers_committed,
            rejected = report.rejected.len(),
            storage_failures = report.storage_failures,
            "import finished"
        );
        Ok(report)
    }
    /// Returns false when the file could not be read or decoded.
    pub fn import_file(&self, path: &Path, report: &mut ImportReport) -> Result<bool> {
        let text = match fs::read(path)
            .map_err(RepeciError::from)
            .and_then(|bytes| decode(path, bytes, self.encoding))
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping file");
                report.files_skipped.push(SkippedFile {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
                return Ok(false);
            }
        };
        tracing::debug!(path = %path.display(), "importing file");
        self.import_lines(path, text.lines(), report)?;
        Ok(true)
    }
    /// Parses and commits the records in `lines`, reporting them under `source`.
    pub fn import_lines<I>(&self, source: &Path, lines: I, report: &mut ImportReport) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut records = self.parser.parse(lines);
        for record in records.by_ref() {
            let draft = match record {
                Ok(draft) => draft,
                Err(rejection) => {
                    self.reject(source, rejection, report);
                    continue;
                }
            };
            match self.db.commit_paper(&draft) {
                Ok(paper) => {
                    tracing::trace!(handle = paper.handle(), "paper committed");
                    report.papers_committed += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(RepeciError::Validation(rejection)) => self.reject(source, rejection, report),
                Err(e) => {
                    tracing::warn!(
                        path = %source.display(),
                        handle = draft.handle(),
                        line = draft.line(),
                        error = %e,
                        "could not commit paper"
                    );
                    report.storage_failures += 1;
                }
            }
        }
        report.records_skipped += records.skipped();
        Ok(())
    }
    fn reject(&self, source: &Path, rejection: Rejection, report: &mut ImportReport) {
        tracing::warn!(
            path = %source.display(),
            line = rejection.line,
            handle = rejection.handle.as_deref().unwrap_or(""),
            reason = %rejection.reason,
            "record rejected"
        );
        report.rejected.push(RejectedRecord {
            path: source.to_path_buf(),
            rejection,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_never_fails() {
        let text = decode(Path::new("x.rdf"), vec![b'M', 0xfc, b'l'], Encoding::Latin1).unwrap();
        assert_eq!(text, "Mül");
        assert!(decode(Path::new("x.rdf"), vec![b'M', 0xfc, b'l'], Encoding::Utf8).is_err());
    }
}
