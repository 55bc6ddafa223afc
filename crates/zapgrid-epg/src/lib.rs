//! EPG engine for zapgrid.
//!
//! Crawls the listings grid in 3-hour windows through a permanent cache,
//! folds every window into one schedule model, optionally enriches
//! programs with per-series overview details, and writes the result as
//! an XMLTV document.

/// Window loop.
pub mod crawler;
/// Run orchestration.
pub mod engine;
/// Overview enrichment.
pub mod enrich;
/// Schedule model.
pub mod model;
/// Options contract.
pub mod options;
/// Grid payload parser.
pub mod parser;
/// Window planning.
pub mod window;
/// XMLTV writer.
pub mod xmltv;

pub use engine::{Collected, RunSummary, collect, grab, plan_windows, write_output};
pub use options::{EngineOptions, EntitySet, OutputEncoding, OutputTarget};
