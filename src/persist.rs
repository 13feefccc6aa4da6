// used for persistence
use rusqlite::{params, Connection, OptionalExtension};
use crate::construct::{Database, PersistenceMode, Thing, Author, Classification};
use crate::record::PaperDraft;
use crate::error::Result;
use chrono::Utc;
use std::time::Duration;

// how long a writer waits on a lock held by another connection before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Either the identity of an already kept entity or the key of one that may
/// still have to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'k> {
    Kept(Thing),
    New(&'k str),
}

/// Identities assigned when a paper was committed, aligned with the input order.
#[derive(Debug)]
pub struct CommittedPaper {
    pub paper: Thing,
    pub authors: Vec<Thing>,
    pub classifications: Vec<Thing>,
}

/// Identities assigned when the citations of one feed line were committed.
#[derive(Debug)]
pub struct CommittedCitations {
    pub cited: Thing,
    pub citing: Vec<Thing>,
    pub created: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperRow {
    pub paper: Thing,
    pub handle: String,
    pub title: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Paper,
    Author,
    Classification,
    PaperAuthor,
    PaperClassification,
    Citation,
}
impl Table {
    fn name(&self) -> &'static str {
        match self {
            Table::Paper => "Paper",
            Table::Author => "Author",
            Table::Classification => "Classification",
            Table::PaperAuthor => "Paper_Author",
            Table::PaperClassification => "Paper_Classification",
            Table::Citation => "Citation",
        }
    }
}

const INSERT_AUTHOR: &str = "insert or ignore into Author (Name) values (?)";
const SELECT_AUTHOR: &str = "select Author_Identity from Author where Name = ?";
const INSERT_CLASSIFICATION: &str = "insert or ignore into Classification (Code) values (?)";
const SELECT_CLASSIFICATION: &str =
    "select Classification_Identity from Classification where Code = ?";
const INSERT_HANDLE: &str = "insert or ignore into Paper (Handle) values (?)";
const SELECT_HANDLE: &str = "select Paper_Identity from Paper where Handle = ?";

// Creates the row unless the unique key already exists, then reads back its
// identity. Whoever inserted it first, every caller ends up with the same row.
fn identity_of(connection: &Connection, insert: &str, select: &str, key: &str) -> Result<Thing> {
    connection.prepare_cached(insert)?.execute([key])?;
    let thing = connection
        .prepare_cached(select)?
        .query_row([key], |row| row.get(0))?;
    Ok(thing)
}

fn resolve(connection: &Connection, insert: &str, select: &str, resolution: &Resolution) -> Result<Thing> {
    match resolution {
        Resolution::Kept(thing) => Ok(*thing),
        Resolution::New(key) => identity_of(connection, insert, select, key),
    }
}

// ------------- Persistence -------------
pub struct Persistor {
    connection: Connection,
    location: String,
}
impl Persistor {
    pub fn new(mode: &PersistenceMode) -> Result<Persistor> {
        let (connection, location) = match mode {
            PersistenceMode::InMemory => (Connection::open_in_memory()?, String::from(":memory:")),
            PersistenceMode::File(path) => (Connection::open(path)?, path.clone()),
        };
        connection.busy_timeout(BUSY_TIMEOUT)?;
        connection.execute_batch(
            "
            pragma foreign_keys = on;
            create table if not exists Paper (
                Paper_Identity integer,
                Handle text not null,
                Title text null,
                Year integer null,
                Imported text null,
                constraint referenceable_Paper_Identity primary key (
                    Paper_Identity
                ),
                constraint unique_Handle unique (
                    Handle
                )
            );
            create table if not exists Author (
                Author_Identity integer,
                Name text not null,
                Code text null,
                constraint referenceable_Author_Identity primary key (
                    Author_Identity
                ),
                constraint unique_Name unique (
                    Name
                )
            );
            create table if not exists Classification (
                Classification_Identity integer,
                Code text not null,
                Name text null,
                constraint referenceable_Classification_Identity primary key (
                    Classification_Identity
                ),
                constraint unique_Code unique (
                    Code
                ),
                constraint Code_has_three_characters check (
                    length(Code) = 3
                )
            );
            create table if not exists Paper_Author (
                Paper_Identity integer not null,
                Author_Identity integer not null,
                constraint Paper_Author_has_Paper foreign key (
                    Paper_Identity
                ) references Paper(Paper_Identity),
                constraint Paper_Author_has_Author foreign key (
                    Author_Identity
                ) references Author(Author_Identity),
                constraint unique_Paper_Author primary key (
                    Paper_Identity,
                    Author_Identity
                )
            );
            create table if not exists Paper_Classification (
                Paper_Identity integer not null,
                Classification_Identity integer not null,
                constraint Paper_Classification_has_Paper foreign key (
                    Paper_Identity
                ) references Paper(Paper_Identity),
                constraint Paper_Classification_has_Classification foreign key (
                    Classification_Identity
                ) references Classification(Classification_Identity),
                constraint unique_Paper_Classification primary key (
                    Paper_Identity,
                    Classification_Identity
                )
            );
            create table if not exists Citation (
                Citing_Identity integer not null,
                Cited_Identity integer not null,
                constraint Citing_is_Paper foreign key (
                    Citing_Identity
                ) references Paper(Paper_Identity),
                constraint Cited_is_Paper foreign key (
                    Cited_Identity
                ) references Paper(Paper_Identity),
                constraint unique_Citation primary key (
                    Citing_Identity,
                    Cited_Identity
                ),
                constraint Citation_is_not_self_reference check (
                    Citing_Identity <> Cited_Identity
                )
            );
            ",
        )?;
        Ok(Persistor {
            connection,
            location,
        })
    }
    pub fn location(&self) -> &str {
        &self.location
    }
    pub fn persist_author(&mut self, name: &str) -> Result<Thing> {
        identity_of(&self.connection, INSERT_AUTHOR, SELECT_AUTHOR, name)
    }
    pub fn persist_classification(&mut self, code: &str) -> Result<Thing> {
        identity_of(&self.connection, INSERT_CLASSIFICATION, SELECT_CLASSIFICATION, code)
    }
    /// Writes the paper and all of its associations in one transaction.
    /// An existing paper with the same handle (possibly a stub) gets its
    /// metadata overwritten, associations are only ever added.
    pub fn persist_paper(
        &mut self,
        draft: &PaperDraft,
        authors: &[Resolution],
        classifications: &[Resolution],
    ) -> Result<CommittedPaper> {
        let tx = self.connection.transaction()?;
        tx.prepare_cached(
            "
            insert into Paper (
                Handle,
                Title,
                Year,
                Imported
            ) values (?1, ?2, ?3, ?4)
            on conflict (Handle) do update set
                Title = excluded.Title,
                Year = excluded.Year,
                Imported = excluded.Imported
        ",
        )?
        .execute(params![draft.handle(), draft.title(), draft.year(), Utc::now()])?;
        let paper: Thing = tx
            .prepare_cached(SELECT_HANDLE)?
            .query_row([draft.handle()], |row| row.get(0))?;
        let mut author_things = Vec::with_capacity(authors.len());
        for resolution in authors {
            let author = resolve(&tx, INSERT_AUTHOR, SELECT_AUTHOR, resolution)?;
            tx.prepare_cached(
                "insert or ignore into Paper_Author (Paper_Identity, Author_Identity) values (?, ?)",
            )?
            .execute(params![paper, author])?;
            author_things.push(author);
        }
        let mut classification_things = Vec::with_capacity(classifications.len());
        for resolution in classifications {
            let classification =
                resolve(&tx, INSERT_CLASSIFICATION, SELECT_CLASSIFICATION, resolution)?;
            tx.prepare_cached(
                "insert or ignore into Paper_Classification (Paper_Identity, Classification_Identity) values (?, ?)",
            )?
            .execute(params![paper, classification])?;
            classification_things.push(classification);
        }
        tx.commit()?;
        Ok(CommittedPaper {
            paper,
            authors: author_things,
            classifications: classification_things,
        })
    }
    /// Records `citing -> cited` for every citing paper in one transaction,
    /// creating stubs for handles not seen before.
    pub fn persist_citations(
        &mut self,
        cited: &Resolution,
        citing: &[Resolution],
    ) -> Result<CommittedCitations> {
        let tx = self.connection.transaction()?;
        let cited = resolve(&tx, INSERT_HANDLE, SELECT_HANDLE, cited)?;
        let mut citing_things = Vec::with_capacity(citing.len());
        let mut created = 0;
        for resolution in citing {
            let paper = resolve(&tx, INSERT_HANDLE, SELECT_HANDLE, resolution)?;
            if paper != cited {
                created += tx
                    .prepare_cached(
                        "insert or ignore into Citation (Citing_Identity, Cited_Identity) values (?, ?)",
                    )?
                    .execute(params![paper, cited])?;
            }
            citing_things.push(paper);
        }
        tx.commit()?;
        Ok(CommittedCitations {
            cited,
            citing: citing_things,
            created,
        })
    }
    pub fn paper(&self, handle: &str) -> Result<Option<PaperRow>> {
        let row = self
            .connection
            .prepare_cached(
                "
                select Paper_Identity, Handle, Title, Year
                    from Paper
                    where Handle = ?
            ",
            )?
            .query_row([handle], |row| {
                Ok(PaperRow {
                    paper: row.get(0)?,
                    handle: row.get(1)?,
                    title: row.get(2)?,
                    year: row.get(3)?,
                })
            })
            .optional()?;
        Ok(row)
    }
    pub fn paper_authors(&self, paper: Thing) -> Result<Vec<Author>> {
        let mut statement = self.connection.prepare_cached(
            "
            select a.Author_Identity, a.Name, a.Code
                from Paper_Author pa
                join Author a
                on a.Author_Identity = pa.Author_Identity
                where pa.Paper_Identity = ?
                order by a.Name
        ",
        )?;
        let authors = statement
            .query_map([paper], |row| Ok(Author::new(row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(authors)
    }
    pub fn paper_classifications(&self, paper: Thing) -> Result<Vec<Classification>> {
        let mut statement = self.connection.prepare_cached(
            "
            select c.Classification_Identity, c.Code, c.Name
                from Paper_Classification pc
                join Classification c
                on c.Classification_Identity = pc.Classification_Identity
                where pc.Paper_Identity = ?
                order by c.Code
        ",
        )?;
        let classifications = statement
            .query_map([paper], |row| {
                Ok(Classification::new(row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(classifications)
    }
    /// Handles of the papers cited by the given paper.
    pub fn references(&self, handle: &str) -> Result<Vec<String>> {
        self.handles_by(
            "
            select cited.Handle
                from Citation c
                join Paper citing
                on citing.Paper_Identity = c.Citing_Identity
                join Paper cited
                on cited.Paper_Identity = c.Cited_Identity
                where citing.Handle = ?
                order by cited.Handle
        ",
            handle,
        )
    }
    /// Handles of the papers citing the given paper.
    pub fn citations(&self, handle: &str) -> Result<Vec<String>> {
        self.handles_by(
            "
            select citing.Handle
                from Citation c
                join Paper citing
                on citing.Paper_Identity = c.Citing_Identity
                join Paper cited
                on cited.Paper_Identity = c.Cited_Identity
                where cited.Handle = ?
                order by citing.Handle
        ",
            handle,
        )
    }
    fn handles_by(&self, sql: &str, handle: &str) -> Result<Vec<String>> {
        let mut statement = self.connection.prepare_cached(sql)?;
        let handles = statement
            .query_map([handle], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(handles)
    }
    /// Every edge as a (citing handle, cited handle) pair.
    pub fn all_citations(&self) -> Result<Vec<(String, String)>> {
        let mut statement = self.connection.prepare_cached(
            "
            select citing.Handle, cited.Handle
                from Citation c
                join Paper citing
                on citing.Paper_Identity = c.Citing_Identity
                join Paper cited
                on cited.Paper_Identity = c.Cited_Identity
                order by citing.Handle, cited.Handle
        ",
        )?;
        let edges = statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }
    pub fn all_handles(&self) -> Result<Vec<String>> {
        let mut statement = self
            .connection
            .prepare_cached("select Handle from Paper order by Handle")?;
        let handles = statement
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(handles)
    }
    pub fn count(&self, table: Table) -> Result<usize> {
        let count: i64 = self.connection.query_row(
            &format!("select count(*) from {}", table.name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
    pub fn restore_authors(&self, db: &Database) -> Result<()> {
        let mut statement = self
            .connection
            .prepare("select Author_Identity, Name, Code from Author")?;
        let author_iter =
            statement.query_map([], |row| Ok(Author::new(row.get(0)?, row.get(1)?, row.get(2)?)))?;
        let mut keeper = db.author_keeper.lock()?;
        for author in author_iter {
            keeper.keep(author?);
        }
        Ok(())
    }
    pub fn restore_classifications(&self, db: &Database) -> Result<()> {
        let mut statement = self
            .connection
            .prepare("select Classification_Identity, Code, Name from Classification")?;
        let classification_iter = statement.query_map([], |row| {
            Ok(Classification::new(row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        let mut keeper = db.classification_keeper.lock()?;
        for classification in classification_iter {
            keeper.keep(classification?);
        }
        Ok(())
    }
    pub fn restore_handles(&self, db: &Database) -> Result<()> {
        let mut statement = self
            .connection
            .prepare("select Paper_Identity, Handle from Paper")?;
        let handle_iter =
            statement.query_map([], |row| Ok((row.get::<_, Thing>(0)?, row.get::<_, String>(1)?)))?;
        let mut keeper = db.handle_keeper.lock()?;
        for row in handle_iter {
            let (paper, handle) = row?;
            keeper.keep(handle, paper);
        }
        Ok(())
    }
}
