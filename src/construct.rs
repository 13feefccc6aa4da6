use std::sync::{Arc, Mutex};

// keepers use HashMaps with a fast hasher
use core::hash::{BuildHasherDefault, Hasher};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;
use seahash::SeaHasher;

// custom made ordering for entities
use std::cmp::Ordering;

// used to print out readable forms of a construct
use std::fmt;

// our own stuff that we need
use crate::error::{RepeciError, Result};
use crate::persist::{Persistor, Resolution, Table};
use crate::record::{CLASSIFICATION_LENGTH, PaperDraft, RejectReason, Rejection};

// ------------- Thing -------------
// identities are the row ids assigned by the store
pub type Thing = i64;

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

/// Something a keeper can hold: it has a unique key.
pub trait Keepsake {
    fn keepsake(&self) -> &str;
}

// ------------- Author -------------
#[derive(Eq, Debug)]
pub struct Author {
    author: Thing,
    name: String,
    code: Option<String>,
}

impl Author {
    pub fn new(author: Thing, name: String, code: Option<String>) -> Self {
        Self { author, name, code }
    }
    // Fields are only exposed through getters, so a kept author
    // cannot change after creation.
    pub fn author(&self) -> Thing {
        self.author
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}
impl Keepsake for Author {
    fn keepsake(&self) -> &str {
        &self.name
    }
}
impl Ord for Author {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}
impl PartialOrd for Author {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for Author {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Hash for Author {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.author)
    }
}

// ------------- Classification -------------
#[derive(Eq, Debug)]
pub struct Classification {
    classification: Thing,
    code: String,
    name: Option<String>,
}

impl Classification {
    pub fn new(classification: Thing, code: String, name: Option<String>) -> Self {
        Self {
            classification,
            code,
            name,
        }
    }
    pub fn classification(&self) -> Thing {
        self.classification
    }
    pub fn code(&self) -> &str {
        &self.code
    }
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
impl Keepsake for Classification {
    fn keepsake(&self) -> &str {
        &self.code
    }
}
impl Ord for Classification {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code.cmp(&other.code)
    }
}
impl PartialOrd for Classification {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for Classification {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}
impl Hash for Classification {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}
impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.classification)
    }
}

// ------------- Keeper -------------
/// Owns one shared instance per key. Keeping something whose key is already
/// kept hands back the instance kept first.
#[derive(Debug)]
pub struct Keeper<T> {
    kept: HashMap<String, Arc<T>, OtherHasher>,
}
impl<T: Keepsake> Keeper<T> {
    pub fn new() -> Self {
        Self {
            kept: HashMap::default(),
        }
    }
    pub fn keep(&mut self, keepsake: T) -> (Arc<T>, bool) {
        match self.kept.entry(keepsake.keepsake().to_owned()) {
            Entry::Occupied(e) => (Arc::clone(e.get()), true),
            Entry::Vacant(e) => {
                let kept = Arc::new(keepsake);
                e.insert(Arc::clone(&kept));
                (kept, false)
            }
        }
    }
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.kept.get(key).map(Arc::clone)
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
impl<T: Keepsake> Default for Keeper<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub type AuthorKeeper = Keeper<Author>;
pub type ClassificationKeeper = Keeper<Classification>;

// ------------- Handles -------------
#[derive(Debug, Default)]
pub struct HandleKeeper {
    kept: HashMap<String, Thing, OtherHasher>,
}
impl HandleKeeper {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn keep(&mut self, handle: String, paper: Thing) -> bool {
        let previously_kept = self.kept.contains_key(&handle);
        if !previously_kept {
            self.kept.insert(handle, paper);
        }
        previously_kept
    }
    pub fn paper(&self, handle: &str) -> Option<Thing> {
        self.kept.get(handle).copied()
    }
    pub fn resolution<'k>(&self, handle: &'k str) -> Resolution<'k> {
        match self.paper(handle) {
            Some(paper) => Resolution::Kept(paper),
            None => Resolution::New(handle),
        }
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

// ------------- Paper -------------
#[derive(Debug, Clone)]
pub struct Paper {
    paper: Thing,
    handle: String,
    title: Option<String>,
    year: Option<i32>,
    authors: Vec<Arc<Author>>,
    classifications: Vec<Arc<Classification>>,
}
impl Paper {
    pub fn paper(&self) -> Thing {
        self.paper
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
    pub fn authors(&self) -> &[Arc<Author>] {
        &self.authors
    }
    pub fn classifications(&self) -> &[Arc<Classification>] {
        &self.classifications
    }
    pub fn author_names(&self) -> Vec<&str> {
        self.authors.iter().map(|a| a.name()).collect()
    }
    pub fn classification_codes(&self) -> Vec<&str> {
        self.classifications.iter().map(|c| c.code()).collect()
    }
}
impl fmt::Display for Paper {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} [{}] by {}",
            self.handle,
            self.title.as_deref().unwrap_or(""),
            self.author_names().join("; ")
        )
    }
}

// ------------- CitationEdge -------------
/// `citing` cites `cited`, the direction of every edge in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CitationEdge {
    citing: String,
    cited: String,
}
impl CitationEdge {
    pub fn new(citing: impl Into<String>, cited: impl Into<String>) -> Self {
        Self {
            citing: citing.into(),
            cited: cited.into(),
        }
    }
    pub fn citing(&self) -> &str {
        &self.citing
    }
    pub fn cited(&self) -> &str {
        &self.cited
    }
    pub fn is_self_loop(&self) -> bool {
        self.citing == self.cited
    }
}
impl fmt::Display for CitationEdge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.citing, self.cited)
    }
}

/// Outcome of linking the citing papers of one feed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Linked {
    pub created: usize,
    pub existing: usize,
}

// ------------- Database -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

// Wires the persistor together with the keepers. Locks are always taken
// persistor first, keeper second.
pub struct Database {
    // owns keepers for the shared entities
    pub author_keeper: Arc<Mutex<AuthorKeeper>>,
    pub classification_keeper: Arc<Mutex<ClassificationKeeper>>,
    pub handle_keeper: Arc<Mutex<HandleKeeper>>,
    // responsible for the persistence layer
    pub persistor: Arc<Mutex<Persistor>>,
}

impl Database {
    pub fn new(mode: PersistenceMode) -> Result<Database> {
        let persistor = Persistor::new(&mode)?;
        let database = Database {
            author_keeper: Arc::new(Mutex::new(AuthorKeeper::new())),
            classification_keeper: Arc::new(Mutex::new(ClassificationKeeper::new())),
            handle_keeper: Arc::new(Mutex::new(HandleKeeper::new())),
            persistor: Arc::new(Mutex::new(persistor)),
        };
        // Restore the existing database
        {
            let persistor = database.persistor.lock()?;
            persistor.restore_authors(&database)?;
            persistor.restore_classifications(&database)?;
            persistor.restore_handles(&database)?;
        }
        let location = database.persistor.lock()?.location().to_owned();
        let authors = database.author_keeper.lock()?.len();
        let classifications = database.classification_keeper.lock()?.len();
        let papers = database.handle_keeper.lock()?.len();
        tracing::debug!(location = %location, authors, classifications, papers, "database restored");
        Ok(database)
    }
    /// Returns the author with the given name, creating it if absent.
    /// Concurrent calls for one name all get the same author.
    pub fn resolve_author(&self, name: &str) -> Result<Arc<Author>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepeciError::InvalidArgument(String::from("empty author name")));
        }
        // the persistor lock serializes the check-then-create sequence
        let mut persistor = self.persistor.lock()?;
        if let Some(kept) = self.author_keeper.lock()?.get(name) {
            return Ok(kept);
        }
        let author = persistor.persist_author(name)?;
        let (kept, _) = self
            .author_keeper
            .lock()?
            .keep(Author::new(author, name.to_owned(), None));
        Ok(kept)
    }
    /// Returns the classification with the given code, creating it if absent.
    pub fn resolve_classification(&self, code: &str) -> Result<Arc<Classification>> {
        let code = code.trim();
        if code.chars().count() != CLASSIFICATION_LENGTH {
            return Err(Rejection::new(
                0,
                None,
                RejectReason::ClassificationLength {
                    code: code.to_owned(),
                },
            )
            .into());
        }
        let mut persistor = self.persistor.lock()?;
        if let Some(kept) = self.classification_keeper.lock()?.get(code) {
            return Ok(kept);
        }
        let classification = persistor.persist_classification(code)?;
        let (kept, _) = self
            .classification_keeper
            .lock()?
            .keep(Classification::new(classification, code.to_owned(), None));
        Ok(kept)
    }
    /// Commits the paper together with its author and classification
    /// associations. Either all of it is stored or none of it.
    pub fn commit_paper(&self, draft: &PaperDraft) -> Result<Paper> {
        draft
            .validate()
            .map_err(|reason| Rejection::new(draft.line(), Some(draft.handle().to_owned()), reason))?;
        let mut persistor = self.persistor.lock()?;
        let authors: Vec<Resolution> = {
            let keeper = self.author_keeper.lock()?;
            draft
                .authors()
                .iter()
                .map(|name| match keeper.get(name) {
                    Some(kept) => Resolution::Kept(kept.author()),
                    None => Resolution::New(name.as_str()),
                })
                .collect()
        };
        let classifications: Vec<Resolution> = {
            let keeper = self.classification_keeper.lock()?;
            draft
                .classifications()
                .iter()
                .map(|code| match keeper.get(code) {
                    Some(kept) => Resolution::Kept(kept.classification()),
                    None => Resolution::New(code.as_str()),
                })
                .collect()
        };
        let committed = persistor.persist_paper(draft, &authors, &classifications)?;
        // keepers only learn about entities once their transaction is committed
        let authors = {
            let mut keeper = self.author_keeper.lock()?;
            committed
                .authors
                .iter()
                .zip(draft.authors())
                .map(|(thing, name)| keeper.keep(Author::new(*thing, name.clone(), None)).0)
                .collect()
        };
        let classifications = {
            let mut keeper = self.classification_keeper.lock()?;
            committed
                .classifications
                .iter()
                .zip(draft.classifications())
                .map(|(thing, code)| {
                    keeper
                        .keep(Classification::new(*thing, code.clone(), None))
                        .0
                })
                .collect()
        };
        self.handle_keeper
            .lock()?
            .keep(draft.handle().to_owned(), committed.paper);
        Ok(Paper {
            paper: committed.paper,
            handle: draft.handle().to_owned(),
            title: draft.title().map(str::to_owned),
            year: draft.year(),
            authors,
            classifications,
        })
    }
    /// Links every citing paper to the cited one in a single transaction.
    /// Self references are ignored, existing edges are left as they are.
    pub fn link_citations(&self, cited: &str, citing: &[&str]) -> Result<Linked> {
        let citing: Vec<&str> = citing.iter().copied().filter(|h| *h != cited).collect();
        let mut persistor = self.persistor.lock()?;
        let (cited_resolution, citing_resolutions) = {
            let keeper = self.handle_keeper.lock()?;
            let citing_resolutions: Vec<Resolution> = citing
                .iter()
                .map(|handle| keeper.resolution(handle))
                .collect();
            (keeper.resolution(cited), citing_resolutions)
        };
        let committed = persistor.persist_citations(&cited_resolution, &citing_resolutions)?;
        {
            let mut keeper = self.handle_keeper.lock()?;
            keeper.keep(cited.to_owned(), committed.cited);
            for (handle, paper) in citing.iter().zip(&committed.citing) {
                keeper.keep((*handle).to_owned(), *paper);
            }
        }
        Ok(Linked {
            created: committed.created,
            existing: citing.len() - committed.created,
        })
    }
    /// Reads a paper back, with its authors and classifications.
    pub fn paper(&self, handle: &str) -> Result<Option<Paper>> {
        let persistor = self.persistor.lock()?;
        let Some(row) = persistor.paper(handle)? else {
            return Ok(None);
        };
        let authors = persistor.paper_authors(row.paper)?;
        let classifications = persistor.paper_classifications(row.paper)?;
        let authors = {
            let mut keeper = self.author_keeper.lock()?;
            authors.into_iter().map(|a| keeper.keep(a).0).collect()
        };
        let classifications = {
            let mut keeper = self.classification_keeper.lock()?;
            classifications.into_iter().map(|c| keeper.keep(c).0).collect()
        };
        Ok(Some(Paper {
            paper: row.paper,
            handle: row.handle,
            title: row.title,
            year: row.year,
            authors,
            classifications,
        }))
    }
    /// Handles of the papers the given paper cites.
    pub fn references(&self, handle: &str) -> Result<Vec<String>> {
        self.persistor.lock()?.references(handle)
    }
    /// Handles of the papers citing the given paper.
    pub fn citations(&self, handle: &str) -> Result<Vec<String>> {
        self.persistor.lock()?.citations(handle)
    }
    pub fn citation_edges(&self) -> Result<Vec<CitationEdge>> {
        let edges = self.persistor.lock()?.all_citations()?;
        Ok(edges
            .into_iter()
            .map(|(citing, cited)| CitationEdge::new(citing, cited))
            .collect())
    }
    pub fn paper_handles(&self) -> Result<Vec<String>> {
        self.persistor.lock()?.all_handles()
    }
    pub fn paper_count(&self) -> Result<usize> {
        self.persistor.lock()?.count(Table::Paper)
    }
    pub fn author_count(&self) -> Result<usize> {
        self.persistor.lock()?.count(Table::Author)
    }
    pub fn classification_count(&self) -> Result<usize> {
        self.persistor.lock()?.count(Table::Classification)
    }
    pub fn citation_count(&self) -> Result<usize> {
        self.persistor.lock()?.count(Table::Citation)
    }
    pub fn association_count(&self) -> Result<usize> {
        let persistor = self.persistor.lock()?;
        Ok(persistor.count(Table::PaperAuthor)? + persistor.count(Table::PaperClassification)?)
    }
}
