use std::fs;
use std::path::{Path, PathBuf};

use repeci::config::{Encoding, ImportSettings};
use repeci::construct::{Database, PersistenceMode};
use repeci::discover::discover;
use repeci::import::CorpusImporter;
use repeci::refs::CitationEdgeBuilder;

fn article(title: &str, authors: &[&str], jel: &str, handle: &str) -> String {
    let mut record = format!("Template-Type: ReDIF-Article 1.0\nTitle: {title}\n");
    for author in authors {
        record.push_str(&format!("Author-Name: {author}\n"));
    }
    if !jel.is_empty() {
        record.push_str(&format!("Classification-JEL: {jel}\n"));
    }
    record.push_str(&format!("Handle: {handle}\n"));
    record
}

fn write(dir: &Path, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write fixture");
    path
}

#[test]
fn valid_record_is_committed_with_its_associations() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = write(dir.path(), "a.rdf", article("A", &["Smith"], "C10", "RePEc:x:1"));
    let db = Database::new(PersistenceMode::InMemory).expect("db");
    let report = CorpusImporter::new(&db).import_all(&[file], 0).expect("import");
    assert_eq!(report.files_processed, 1);
    assert_eq!(report.papers_committed, 1);
    assert_eq!(report.discarded(), 0);
    let paper = db.paper("RePEc:x:1").expect("read").expect("paper");
    assert_eq!(paper.title(), Some("A"));
    assert_eq!(paper.author_names(), vec!["Smith"]);
    assert_eq!(paper.classification_codes(), vec!["C10"]);
}

#[test]
fn rejected_record_is_reported_and_import_continues() {
    let dir = tempfile::tempdir().expect("tempdir");
    let content = article("B", &["Smith"], "C1", "RePEc:x:2") + &article("C", &["Jones"], "D22", "RePEc:x:3");
    let file = write(dir.path(), "b.rdf", content);
    let db = Database::new(PersistenceMode::InMemory).expect("db");
    let report = CorpusImporter::new(&db).import_all(&[&file], 0).expect("import");
    assert_eq!(report.papers_committed, 1);
    assert_eq!(report.rejected.len(), 1);
    let rejected = &report.rejected[0];
    assert_eq!(rejected.path, file);
    assert_eq!(rejected.rejection.handle.as_deref(), Some("RePEc:x:2"));
    assert_eq!(report.rejections_by_kind().get("classification_length"), Some(&1));
    assert!(db.paper("RePEc:x:2").expect("read").is_none());
    assert!(db.paper("RePEc:x:3").expect("read").is_some());
    // the rejected record leaves no author behind
    assert_eq!(db.author_count().expect("count"), 1);
}

#[test]
fn shared_author_is_created_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = write(dir.path(), "1.rdf", article("A", &["Smith"], "", "RePEc:x:1"));
    let second = write(dir.path(), "2.rdf", article("B", &["Smith", "Jones"], "", "RePEc:x:2"));
    let db = Database::new(PersistenceMode::InMemory).expect("db");
    CorpusImporter::new(&db).import_all(&[first, second], 0).expect("import");
    assert_eq!(db.author_count().expect("count"), 2);
    let a = db.paper("RePEc:x:1").expect("read").expect("paper");
    let b = db.paper("RePEc:x:2").expect("read").expect("paper");
    assert_eq!(a.authors()[0].author(), b.authors().iter().find(|x| x.name() == "Smith").expect("smith").author());
}

#[test]
fn reimporting_a_file_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = write(dir.path(), "a.rdf", article("A", &["Smith", "Jones"], "C10, D22", "RePEc:x:1"));
    let db = Database::new(PersistenceMode::InMemory).expect("db");
    let importer = CorpusImporter::new(&db);
    importer.import_all(&[&file], 0).expect("import");
    let associations = db.association_count().expect("count");
    importer.import_all(&[&file], 0).expect("import");
    assert_eq!(db.paper_count().expect("count"), 1);
    assert_eq!(db.author_count().expect("count"), 2);
    assert_eq!(db.classification_count().expect("count"), 2);
    assert_eq!(db.association_count().expect("count"), associations);
    assert_eq!(associations, 4);
}

#[test]
fn limit_counts_processed_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    for i in 0..4 {
        write(dir.path(), &format!("{i}.rdf"), article("T", &["Smith"], "", &format!("RePEc:x:{i}")));
    }
    let files = discover(dir.path(), "rdf").expect("discover");
    assert_eq!(files.len(), 4);
    let db = Database::new(PersistenceMode::InMemory).expect("db");
    let report = CorpusImporter::new(&db).import_all(&files, 2).expect("import");
    assert_eq!(report.files_processed, 2);
    assert_eq!(db.paper_count().expect("count"), 2);
}

#[test]
fn undecodable_file_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    // a latin-1 encoded umlaut is not valid UTF-8
    let latin1: Vec<u8> = article("M\u{fc}ller", &["M\u{fc}ller"], "", "RePEc:x:1")
        .chars()
        .map(|c| c as u32 as u8)
        .collect();
    let broken = write(dir.path(), "broken.rdf", latin1);
    let fine = write(dir.path(), "fine.rdf", article("A", &["Smith"], "", "RePEc:x:2"));
    let db = Database::new(PersistenceMode::InMemory).expect("db");
    let report = CorpusImporter::new(&db)
        .import_all(&[broken.clone(), fine], 1)
        .expect("import");
    assert_eq!(report.files_skipped.len(), 1);
    assert_eq!(report.files_skipped[0].path, broken);
    // skipped files do not count against the limit
    assert_eq!(report.files_processed, 1);
    assert_eq!(db.paper_count().expect("count"), 1);

    let settings = ImportSettings {
        encoding: Encoding::Latin1,
        ..ImportSettings::default()
    };
    let report = CorpusImporter::with_settings(&db, &settings)
        .import_all(&[broken], 0)
        .expect("import");
    assert!(report.files_skipped.is_empty());
    let paper = db.paper("RePEc:x:1").expect("read").expect("paper");
    assert_eq!(paper.author_names(), vec!["M\u{fc}ller"]);
}

#[test]
fn missing_file_is_skipped() {
    let db = Database::new(PersistenceMode::InMemory).expect("db");
    let report = CorpusImporter::new(&db)
        .import_all(&[PathBuf::from("/nonexistent/a.rdf")], 0)
        .expect("import");
    assert_eq!(report.files_processed, 0);
    assert_eq!(report.files_skipped.len(), 1);
}

#[test]
fn record_fills_in_a_citation_stub() {
    let db = Database::new(PersistenceMode::InMemory).expect("db");
    CitationEdgeBuilder::new(&db)
        .import_refs("RePEc:x:1 RePEc:x:2\n".as_bytes(), 0)
        .expect("refs");
    let stub = db.paper("RePEc:x:1").expect("read").expect("stub");
    assert_eq!(stub.title(), None);
    assert!(stub.authors().is_empty());

    let dir = tempfile::tempdir().expect("tempdir");
    let file = write(dir.path(), "a.rdf", article("A", &["Smith"], "", "RePEc:x:1"));
    CorpusImporter::new(&db).import_all(&[file], 0).expect("import");
    let paper = db.paper("RePEc:x:1").expect("read").expect("paper");
    assert_eq!(paper.paper(), stub.paper());
    assert_eq!(paper.title(), Some("A"));
    assert_eq!(db.citations("RePEc:x:1").expect("citations"), vec!["RePEc:x:2"]);
}

#[test]
fn cancelled_importer_stops_before_the_next_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = write(dir.path(), "a.rdf", article("A", &["Smith"], "", "RePEc:x:1"));
    let db = Database::new(PersistenceMode::InMemory).expect("db");
    let cancel = repeci::interface::CancelToken::new();
    cancel.cancel();
    let report = CorpusImporter::new(&db)
        .cancel_on(cancel)
        .import_all(&[file], 0)
        .expect("import");
    assert_eq!(report.files_processed, 0);
    assert_eq!(db.paper_count().expect("count"), 0);
}
