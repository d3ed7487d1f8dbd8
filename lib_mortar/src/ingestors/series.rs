//! # Series Accumulation and Materialization
//!
//! Samples for one (selection, identifier) key arrive as runs spread over the
//! stream. They are kept raw until a selection is first read, then merged:
//! sorted by time, deduplicated (the earliest-ingested sample for an instant
//! wins) and outer-joined with the other identifiers of the selection.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// Raw runs received for one identifier, in ingestion order.
#[derive(Debug, Default, Clone)]
pub struct SeriesGroup {
    runs: Vec<(Vec<f64>, Vec<DateTime<Utc>>)>,
}

impl SeriesGroup {
    pub fn push(&mut self, values: Vec<f64>, times: Vec<DateTime<Utc>>) {
        self.runs.push((values, times));
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn sample_count(&self) -> usize {
        self.runs.iter().map(|(v, _)| v.len()).sum()
    }

    /// Concatenates all runs, sorts by time and drops later duplicates of an
    /// instant.
    pub fn merged(&self) -> Vec<(DateTime<Utc>, f64)> {
        let mut samples: Vec<(DateTime<Utc>, f64)> = self
            .runs
            .iter()
            .flat_map(|(values, times)| times.iter().copied().zip(values.iter().copied()))
            .collect();
        // Stable sort keeps ingestion order among equal timestamps.
        samples.sort_by_key(|(ts, _)| *ts);
        samples.dedup_by_key(|(ts, _)| *ts);
        samples
    }
}

/// All identifiers of one selection, in first-seen order.
#[derive(Debug, Default)]
pub struct SelectionSeries {
    order: Vec<String>,
    groups: HashMap<String, SeriesGroup>,
}

impl SelectionSeries {
    /// The group for `identifier`, created on first use.
    pub fn group_mut(&mut self, identifier: &str) -> &mut SeriesGroup {
        if !self.groups.contains_key(identifier) {
            self.order.push(identifier.to_string());
        }
        self.groups.entry(identifier.to_string()).or_default()
    }

    pub fn identifiers(&self) -> &[String] {
        &self.order
    }

    /// Builds the aligned, UTC-indexed frame for this selection.
    pub fn materialize(&self) -> SelectionFrame {
        let merged: Vec<Vec<(DateTime<Utc>, f64)>> = self
            .order
            .iter()
            .map(|id| self.groups.get(id).map(SeriesGroup::merged).unwrap_or_default())
            .collect();

        let mut index: Vec<DateTime<Utc>> =
            merged.iter().flat_map(|s| s.iter().map(|(ts, _)| *ts)).collect();
        index.sort_unstable();
        index.dedup();

        let data = merged
            .iter()
            .map(|series| {
                let mut column = vec![None; index.len()];
                // Both sides are sorted, so one forward cursor is enough.
                let mut row = 0;
                for (ts, value) in series {
                    while index[row] < *ts {
                        row += 1;
                    }
                    column[row] = Some(*value);
                }
                column
            })
            .collect();

        SelectionFrame {
            index,
            columns: self.order.clone(),
            data,
        }
    }
}

/// Column-oriented, time-indexed table for one selection.
///
/// Rows are the sorted union of timestamps across all identifiers. A cell is
/// `None` when that identifier has no sample at that instant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionFrame {
    index: Vec<DateTime<Utc>>,
    columns: Vec<String>,
    data: Vec<Vec<Option<f64>>>,
}

impl SelectionFrame {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    /// Identifier column names in first-seen order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, identifier: &str) -> Option<&[Option<f64>]> {
        let pos = self.columns.iter().position(|c| c == identifier)?;
        Some(&self.data[pos])
    }

    /// The sample at `ts` for `identifier`; `None` when either is absent.
    pub fn value(&self, ts: DateTime<Utc>, identifier: &str) -> Option<f64> {
        let row = self.index.binary_search(&ts).ok()?;
        self.column(identifier)?[row]
    }

    pub fn row(&self, row: usize) -> Option<(DateTime<Utc>, Vec<Option<f64>>)> {
        let ts = *self.index.get(row)?;
        Some((ts, self.data.iter().map(|col| col[row]).collect()))
    }

    pub fn rows(&self) -> impl Iterator<Item = (DateTime<Utc>, Vec<Option<f64>>)> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }
}

/// CSV rendering with an RFC 3339 `time` column; missing cells are empty.
impl fmt::Display for SelectionFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "time")?;
        for col in &self.columns {
            write!(f, ",{}", col)?;
        }
        writeln!(f)?;
        for (ts, values) in self.rows() {
            write!(f, "{}", ts.to_rfc3339())?;
            for v in values {
                match v {
                    Some(v) => write!(f, ",{}", v)?,
                    None => write!(f, ",")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
