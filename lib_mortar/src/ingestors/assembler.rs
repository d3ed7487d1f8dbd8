//! # Result Assembler
//!
//! Consumes the records of one `Fetch` stream, in transport order, and turns
//! them into queryable outputs:
//!
//! - metadata records fill one in-memory SQL table per view, created from the
//!   first record that names the view and carries its variables;
//! - data records accumulate raw sample runs per (selection, identifier),
//!   materialized into a [`SelectionFrame`] on first read and cached.
//!
//! A record carrying a service error, or one that cannot be stored, is
//! terminal: the whole assembly fails.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::series::{SelectionFrame, SelectionSeries};
use crate::connections::db_sqlite::{QueryResult, RelationalStore};
use crate::error::{MortarError, Result};
use crate::mortar::records::{DataRecord, MetadataRecord, Record};

/// Name of the synthetic trailing column every view table carries.
pub const SITE_COLUMN: &str = "site";

/// Lifecycle of one assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    /// Records are still being ingested.
    Collecting,
    /// The stream completed and `finalize` ran.
    Complete,
    /// The stream was cancelled before completion.
    Partial,
    /// A record carried a service error or could not be stored.
    Failed,
}

/// Counters over everything ingested so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub metadata_rows: usize,
    pub samples: usize,
    /// Records skipped because they named no selection or identifier, or
    /// carried rows for a view without a schema.
    pub skipped_records: usize,
}

/// Why an assembly stopped accepting records.
#[derive(Debug, Clone)]
enum Failure {
    /// The service sent an error record.
    Remote(String),
    /// A record could not be stored.
    Local(String),
}

pub struct ResultAssembler {
    store: RelationalStore,
    selections: HashMap<String, SelectionSeries>,
    selection_order: Vec<String>,
    frames: Mutex<HashMap<String, Arc<SelectionFrame>>>,
    state: AssemblyState,
    failure: Option<Failure>,
    stats: IngestStats,
}

impl ResultAssembler {
    /// A fresh assembler with its own private in-memory database.
    pub fn new() -> Result<Self> {
        Ok(Self {
            store: RelationalStore::open_in_memory()?,
            selections: HashMap::new(),
            selection_order: Vec::new(),
            frames: Mutex::new(HashMap::new()),
            state: AssemblyState::Collecting,
            failure: None,
            stats: IngestStats::default(),
        })
    }

    /// Adds one streamed record.
    pub fn ingest(&mut self, record: impl Into<Record>) -> Result<()> {
        match self.state {
            AssemblyState::Collecting => {}
            AssemblyState::Failed => {
                return Err(match &self.failure {
                    Some(Failure::Remote(message)) => MortarError::RemoteStream(message.clone()),
                    Some(Failure::Local(message)) => MortarError::MalformedRecord(format!(
                        "assembly already failed: {}",
                        message
                    )),
                    None => MortarError::MalformedRecord("assembly already failed".to_string()),
                })
            }
            state => {
                return Err(MortarError::MalformedRecord(format!(
                    "record arrived after the assembly was closed ({:?})",
                    state
                )))
            }
        }

        let record = record.into();
        if let Some(message) = record.error() {
            error!(error = %message, "service reported an error in the fetch stream");
            self.state = AssemblyState::Failed;
            self.failure = Some(Failure::Remote(message.to_string()));
            return Err(MortarError::RemoteStream(message.to_string()));
        }

        let outcome = match record {
            Record::Metadata(m) => self.ingest_metadata(m),
            Record::Data(d) => self.ingest_data(d),
        };
        if let Err(e) = &outcome {
            warn!("record rejected, assembly failed: {}", e);
            self.state = AssemblyState::Failed;
            self.failure = Some(Failure::Local(e.to_string()));
        }
        outcome
    }

    fn ingest_metadata(&mut self, record: MetadataRecord) -> Result<()> {
        if !self.store.has_table(&record.view) && !record.variables.is_empty() {
            let mut columns: Vec<String> = record
                .variables
                .iter()
                .map(|v| v.trim_start_matches('?').to_string())
                .collect();
            columns.push(SITE_COLUMN.to_string());
            self.store.create_table(&record.view, &columns)?;
        }

        if !self.store.has_table(&record.view) {
            if !record.rows.is_empty() {
                debug!(view = %record.view, rows = record.rows.len(), "rows for a view without schema dropped");
                self.stats.skipped_records += 1;
            }
            return Ok(());
        }

        for row in &record.rows {
            let mut values: Vec<String> = row.iter().map(|uri| uri.display_form()).collect();
            values.push(record.site.clone());
            self.store.insert_row(&record.view, &values)?;
            self.stats.metadata_rows += 1;
        }
        Ok(())
    }

    fn ingest_data(&mut self, record: DataRecord) -> Result<()> {
        if record.selection.is_empty() || record.identifier.is_empty() {
            debug!(
                selection = %record.selection,
                identifier = %record.identifier,
                "data record without selection or identifier skipped"
            );
            self.stats.skipped_records += 1;
            return Ok(());
        }
        if record.values.len() != record.times.len() {
            return Err(MortarError::MalformedRecord(format!(
                "{}/{} carries {} values but {} timestamps",
                record.selection,
                record.identifier,
                record.values.len(),
                record.times.len()
            )));
        }

        if !self.selections.contains_key(&record.selection) {
            self.selection_order.push(record.selection.clone());
        }
        self.stats.samples += record.values.len();
        self.selections
            .entry(record.selection)
            .or_default()
            .group_mut(&record.identifier)
            .push(record.values, record.times);
        Ok(())
    }

    /// Marks the assembly read-ready. Repeated calls do nothing.
    pub fn finalize(&mut self) {
        match self.state {
            AssemblyState::Collecting => {
                self.state = AssemblyState::Complete;
                debug!(
                    views = self.store.tables().len(),
                    selections = self.selection_order.len(),
                    samples = self.stats.samples,
                    "assembly complete"
                );
            }
            AssemblyState::Complete => {}
            state => warn!(?state, "finalize called on an assembly that did not complete"),
        }
    }

    /// Marks a cancelled stream. What was collected stays readable but is
    /// reported as partial.
    pub fn abort(&mut self) {
        if self.state == AssemblyState::Collecting {
            self.state = AssemblyState::Partial;
        }
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == AssemblyState::Complete
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// The merged frame for `selection`, built on first access and cached.
    /// Unknown selections yield an empty frame.
    pub fn materialize(&self, selection: &str) -> Arc<SelectionFrame> {
        if !self.is_complete() {
            warn!(
                state = ?self.state,
                selection,
                "materializing a partial result; the stream did not complete"
            );
        }

        let mut frames = self.frames.lock();
        if let Some(frame) = frames.get(selection) {
            return Arc::clone(frame);
        }

        let frame = match self.selections.get(selection) {
            Some(series) => Arc::new(series.materialize()),
            None => return Arc::new(SelectionFrame::empty()),
        };
        debug!(selection, rows = frame.len(), columns = frame.columns().len(), "selection materialized");
        frames.insert(selection.to_string(), Arc::clone(&frame));
        frame
    }

    /// View names in creation order.
    pub fn list_views(&self) -> &[String] {
        self.store.tables()
    }

    /// Selection names in first-seen order.
    pub fn list_selections(&self) -> &[String] {
        &self.selection_order
    }

    /// Identifiers seen for `selection`, in first-seen order.
    pub fn identifiers(&self, selection: &str) -> &[String] {
        self.selections
            .get(selection)
            .map(SelectionSeries::identifiers)
            .unwrap_or(&[])
    }

    pub fn table_columns(&self, view: &str) -> Option<&[String]> {
        self.store.columns(view)
    }

    /// Runs read-only SQL over the view tables.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        Ok(self.store.query(sql)?)
    }
}

impl fmt::Debug for ResultAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultAssembler")
            .field("state", &self.state)
            .field("views", &self.store.tables())
            .field("selections", &self.selection_order)
            .field("stats", &self.stats)
            .finish()
    }
}
