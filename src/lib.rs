//! Repeci – ingestion of ReDIF bibliographic records into a citation graph.
//!
//! Repeci reads the paper records of a RePEc style archive, stores papers
//! together with their authors and JEL classification codes, links papers
//! through a separate reference feed, and computes structural metrics over
//! the resulting citation graph.
//!
//! * A [`construct::Paper`] is identified by its handle (`RePEc:provider:series:item`).
//! * A [`construct::Author`] is identified by its exact name.
//! * A [`construct::Classification`] is a three character JEL code.
//! * A [`construct::CitationEdge`] states that one paper cites another.
//!
//! Authors, classifications and handles are owned and deduplicated by
//! "keeper" structures (see the `construct` module), so every paper naming
//! the same author shares one `Arc`d author.
//!
//! ## Modules
//! * [`record`] – The record parser, turning lines into validated paper drafts.
//! * [`construct`] – Entities, keepers and the [`construct::Database`] performing entity resolution.
//! * [`persist`] – SQLite persistence & restoration layer.
//! * [`import`] – File by file corpus import with per record failure reporting.
//! * [`refs`] – The reference feed, turned into citation edges.
//! * [`graph`] – The in-memory citation graph.
//! * [`metrics`] – Degree, PageRank, closeness and betweenness per paper.
//! * [`interface`] – Importing with several worker threads.
//! * [`discover`] – Finding record files below a root directory.
//! * [`config`] – Layered settings.
//!
//! ## Persistence
//! The [`persist::Persistor`] encapsulates SQLite schema creation and durable
//! storage of papers, authors, classifications and citations. The
//! [`construct::Database`] wires a persistor together with in-memory keepers
//! and restores prior state on startup.
//!
//! ## Quick Start
//! ```
//! use repeci::construct::{Database, PersistenceMode};
//! use repeci::graph::GraphAssembler;
//! use repeci::import::{CorpusImporter, ImportReport};
//! use repeci::metrics::MetricsEngine;
//! use repeci::refs::CitationEdgeBuilder;
//! use std::path::Path;
//!
//! let db = Database::new(PersistenceMode::InMemory).unwrap();
//! let record = "Template-Type: ReDIF-Article 1.0\nTitle: A\nAuthor-Name: Smith\nHandle: RePEc:x:1\n";
//! let mut report = ImportReport::default();
//! CorpusImporter::new(&db)
//!     .import_lines(Path::new("x.rdf"), record.lines(), &mut report)
//!     .unwrap();
//! CitationEdgeBuilder::new(&db)
//!     .import_refs("RePEc:x:1 RePEc:x:2\n".as_bytes(), 0)
//!     .unwrap();
//! let graph = GraphAssembler::new(&db).build_graph().unwrap();
//! let table = MetricsEngine::default().compute_metrics(&graph).unwrap();
//! assert_eq!(table.get("RePEc:x:1").unwrap().in_degree_centrality, 1.0);
//! ```

pub mod config;
pub mod construct;
pub mod discover;
pub mod error;
pub mod graph;
pub mod import;
pub mod interface;
pub mod metrics;
pub mod persist;
pub mod record;
pub mod refs;

pub use error::{RepeciError, Result};
