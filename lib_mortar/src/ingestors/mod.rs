//! # Data Ingestors Module
//!
//! Turns a `Fetch` record stream into queryable results.
//!
//! ## Contained Modules:
//! - **`assembler`**: `ResultAssembler`, which routes metadata rows into
//!   per-view SQL tables and accumulates timeseries samples per selection.
//! - **`series`**: sample accumulation and the merge/align step that yields a
//!   `SelectionFrame`.

/// Stream consumer owning the per-result tables and series.
pub mod assembler;
/// Per-identifier sample runs and materialized selection frames.
pub mod series;

pub use assembler::{AssemblyState, IngestStats, ResultAssembler};
pub use series::SelectionFrame;
