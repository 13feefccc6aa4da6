//! Threaded interface for importing a corpus with several workers.
//!
//! The files are dealt round-robin into disjoint subsets, one per worker
//! thread, and every worker imports its subset into the same shared
//! [`Database`]. Entity resolution serializes on the database itself, so two
//! workers meeting the same author name still end up with one author.
//! Cancellation is cooperative via an `Arc<AtomicBool>` and is observed
//! between files, never in the middle of one.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::ImportSettings;
use crate::construct::Database;
use crate::error::{RepeciError, Result};
use crate::import::{CorpusImporter, ImportReport};

/// Cancellation token shared with the worker threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Deals the files round-robin into `workers` subsets.
pub fn partition(files: Vec<PathBuf>, workers: usize) -> Vec<Vec<PathBuf>> {
    let workers = workers.max(1);
    let mut subsets = vec![Vec::new(); workers];
    for (i, file) in files.into_iter().enumerate() {
        subsets[i % workers].push(file);
    }
    subsets.retain(|subset| !subset.is_empty());
    subsets
}

pub struct ParallelImporter {
    db: Arc<Database>, // shared database
    settings: ImportSettings,
    workers: usize,
    cancel: CancelToken, // for external cancellation
}

impl ParallelImporter {
    pub fn new(db: Arc<Database>, settings: ImportSettings) -> Self {
        let workers = settings.workers.max(1);
        Self {
            db,
            settings,
            workers,
            cancel: CancelToken::new(),
        }
    }
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
    /// Token that stops all workers at their next file boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
    /// Imports all files and merges the worker reports. With a `limit` above
    /// zero exactly that many files are processed, or all of them if fewer.
    /// Skipped files give their slot back.
    pub fn import_all(&self, files: Vec<PathBuf>, limit: usize) -> Result<ImportReport> {
        // files reserved by a worker, and files actually imported
        let reserved = Arc::new(AtomicUsize::new(0));
        let processed = Arc::new(AtomicUsize::new(0));
        // stops this run only, on reaching the limit or a fatal error
        let halt = CancelToken::new();
        let subsets = partition(files, self.workers);
        tracing::info!(workers = subsets.len(), limit, "starting parallel import");
        let joins: Vec<JoinHandle<Result<ImportReport>>> = subsets
            .into_iter()
            .map(|subset| {
                let db = Arc::clone(&self.db);
                let settings = self.settings.clone();
                let cancel = self.cancel.clone();
                let halt = halt.clone();
                let reserved = Arc::clone(&reserved);
                let processed = Arc::clone(&processed);
                thread::spawn(move || {
                    let importer = CorpusImporter::with_settings(&db, &settings);
                    let mut report = ImportReport::default();
                    'files: for path in &subset {
                        // a slot is reserved before the file is read; while the
                        // limit is taken by files in flight, wait for one of them
                        // to finish or give its slot back
                        loop {
                            if cancel.is_cancelled() || halt.is_cancelled() {
                                break 'files;
                            }
                            let slot = reserved.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                                (limit == 0 || n < limit).then_some(n + 1)
                            });
                            if slot.is_ok() {
                                break;
                            }
                            thread::yield_now();
                        }
                        match importer.import_file(path, &mut report) {
                            Ok(true) => {
                                report.files_processed += 1;
                                let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                                if limit > 0 && done >= limit {
                                    halt.cancel();
                                }
                            }
                            Ok(false) => {
                                reserved.fetch_sub(1, Ordering::SeqCst);
                            }
                            Err(e) => {
                                reserved.fetch_sub(1, Ordering::SeqCst);
                                halt.cancel();
                                return Err(e);
                            }
                        }
                    }
                    Ok(report)
                })
            })
            .collect();
        let mut report = ImportReport::default();
        let mut failure = None;
        for join in joins {
            match join.join() {
                Ok(Ok(worker_report)) => report.merge(worker_report),
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "worker aborted");
                    failure.get_or_insert(e);
                }
                Err(_) => {
                    failure.get_or_insert(RepeciError::Invariant(String::from(
                        "import worker panicked",
                    )));
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }
        tracing::info!(
            files = report.files_processed,
            papers = report.papers_committed,
            rejected = report.rejected.len(),
            "parallel import finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_deals_round_robin() {
        let files: Vec<PathBuf> = (0..5).map(|i| PathBuf::from(format!("{i}.rdf"))).collect();
        let subsets = partition(files, 2);
        assert_eq!(subsets.len(), 2);
        assert_eq!(subsets[0], vec![PathBuf::from("0.rdf"), PathBuf::from("2.rdf"), PathBuf::from("4.rdf")]);
        assert_eq!(subsets[1], vec![PathBuf::from("1.rdf"), PathBuf::from("3.rdf")]);
        assert_eq!(partition(vec![PathBuf::from("a.rdf")], 4).len(), 1);
    }
}
