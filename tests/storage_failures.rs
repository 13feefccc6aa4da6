use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use repeci::construct::{Database, PersistenceMode};
use repeci::error::RepeciError;
use repeci::import::CorpusImporter;
use repeci::refs::CitationEdgeBuilder;

// the store refuses to insert a paper with this handle
const REFUSED: &str = "RePEc:x:bad";

fn refuse_handle(path: &str) {
    Connection::open(path)
        .expect("second connection")
        .execute_batch(&format!(
            "create trigger refuse_handle before insert on Paper
             when new.Handle = '{REFUSED}'
             begin select raise(abort, 'refused'); end;"
        ))
        .expect("trigger");
}

fn database(dir: &Path) -> (Database, String) {
    let path = dir.join("corpus.db").to_string_lossy().into_owned();
    let db = Database::new(PersistenceMode::File(path.clone())).expect("db");
    (db, path)
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write fixture");
    path
}

#[test]
fn refused_paper_is_counted_and_the_import_goes_on() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (db, path) = database(dir.path());
    refuse_handle(&path);
    let file = write(
        dir.path(),
        "a.rdf",
        &format!(
            "Template-Type: ReDIF-Article 1.0\nTitle: Refused\nAuthor-Name: Nobody\nClassification-JEL: Z99\nHandle: {REFUSED}\n\
             Template-Type: ReDIF-Article 1.0\nTitle: Kept\nAuthor-Name: Smith\nHandle: RePEc:x:1\n"
        ),
    );
    let report = CorpusImporter::new(&db).import_all(&[file], 0).expect("import");
    assert_eq!(report.storage_failures, 1);
    assert_eq!(report.papers_committed, 1);
    assert_eq!(report.discarded(), 1);
    assert!(db.paper(REFUSED).expect("read").is_none());
    assert!(db.paper("RePEc:x:1").expect("read").is_some());
    // nothing of the refused record was kept
    assert_eq!(db.author_count().expect("count"), 1);
    assert_eq!(db.classification_count().expect("count"), 0);
    assert!(db.author_keeper.lock().unwrap().get("Nobody").is_none());
}

#[test]
fn refused_feed_line_leaves_no_edges_or_stubs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (db, path) = database(dir.path());
    refuse_handle(&path);
    let feed = format!(
        "RePEc:x:1 RePEc:x:2\nRePEc:x:3 RePEc:x:4#{REFUSED}\nRePEc:x:5 RePEc:x:6\n"
    );
    let report = CitationEdgeBuilder::new(&db)
        .import_refs(feed.as_bytes(), 0)
        .expect("refs");
    assert_eq!(report.lines_processed, 3);
    assert_eq!(report.storage_failures, 1);
    assert_eq!(report.edges_created, 2);
    assert_eq!(db.citation_count().expect("count"), 2);
    assert_eq!(db.paper_count().expect("count"), 4);
    assert!(db.paper("RePEc:x:3").expect("read").is_none());
    assert!(db.paper("RePEc:x:4").expect("read").is_none());
    assert!(db.handle_keeper.lock().unwrap().paper("RePEc:x:4").is_none());
}

#[test]
fn locked_store_aborts_the_import() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (db, path) = database(dir.path());
    let file = write(
        dir.path(),
        "a.rdf",
        "Template-Type: ReDIF-Article 1.0\nTitle: A\nAuthor-Name: Smith\nHandle: RePEc:x:1\n",
    );
    let locker = Connection::open(&path).expect("second connection");
    locker.execute_batch("begin exclusive;").expect("lock");
    let result = CorpusImporter::new(&db).import_all(&[file], 0);
    assert!(matches!(result, Err(RepeciError::Unavailable(_))));
    drop(locker);
    assert_eq!(db.paper_count().expect("count"), 0);
}

#[test]
fn locked_store_aborts_the_feed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (db, path) = database(dir.path());
    let locker = Connection::open(&path).expect("second connection");
    locker.execute_batch("begin exclusive;").expect("lock");
    let result = CitationEdgeBuilder::new(&db).import_refs("RePEc:x:1 RePEc:x:2\n".as_bytes(), 0);
    assert!(matches!(result, Err(RepeciError::Unavailable(_))));
    drop(locker);
    assert_eq!(db.citation_count().expect("count"), 0);
}
