//! # Stream Records
//!
//! Typed views of a streamed `FetchResponse`. The wire carries one message
//! shape for both kinds of record; [`Record::from`] decides which one it is.

use std::fmt;

use chrono::{DateTime, Utc};

use super::proto_handler as pb;

/// A metadata term as it appears in a view row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Uri {
    pub namespace: Option<String>,
    pub value: String,
}

impl Uri {
    pub fn new(namespace: Option<&str>, value: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            value: value.to_string(),
        }
    }

    /// `namespace#value`, or just `value` for literals, with surrounding
    /// quote characters removed.
    pub fn display_form(&self) -> String {
        let joined = match &self.namespace {
            Some(ns) => format!("{}#{}", ns, self.value),
            None => self.value.clone(),
        };
        joined.trim_matches('"').to_string()
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_form())
    }
}

impl From<pb::Uri> for Uri {
    fn from(uri: pb::Uri) -> Self {
        Self {
            namespace: if uri.namespace.is_empty() {
                None
            } else {
                Some(uri.namespace)
            },
            value: uri.value,
        }
    }
}

/// Qualification/metadata rows for one view at one site.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MetadataRecord {
    pub view: String,
    /// Query variable names; only present the first time a view is sent.
    pub variables: Vec<String>,
    pub rows: Vec<Vec<Uri>>,
    pub site: String,
    pub error: Option<String>,
}

/// Numeric samples for one identifier of one selection.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct DataRecord {
    pub selection: String,
    pub identifier: String,
    pub values: Vec<f64>,
    pub times: Vec<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Metadata(MetadataRecord),
    Data(DataRecord),
}

impl Record {
    /// The service-reported error carried by this record, if any.
    pub fn error(&self) -> Option<&str> {
        let error = match self {
            Record::Metadata(r) => r.error.as_deref(),
            Record::Data(r) => r.error.as_deref(),
        };
        error.filter(|e| !e.is_empty())
    }
}

impl From<MetadataRecord> for Record {
    fn from(r: MetadataRecord) -> Self {
        Record::Metadata(r)
    }
}

impl From<DataRecord> for Record {
    fn from(r: DataRecord) -> Self {
        Record::Data(r)
    }
}

impl From<pb::FetchResponse> for Record {
    fn from(resp: pb::FetchResponse) -> Self {
        let error = if resp.error.is_empty() {
            None
        } else {
            Some(resp.error)
        };

        let is_metadata =
            !resp.view.is_empty() || !resp.variables.is_empty() || !resp.rows.is_empty();

        if is_metadata {
            Record::Metadata(MetadataRecord {
                view: resp.view,
                variables: resp.variables,
                rows: resp
                    .rows
                    .into_iter()
                    .map(|row| row.values.into_iter().map(Uri::from).collect())
                    .collect(),
                site: resp.site,
                error,
            })
        } else {
            Record::Data(DataRecord {
                selection: resp.selection,
                identifier: resp.identifier,
                values: resp.values,
                times: resp
                    .times
                    .into_iter()
                    .map(DateTime::from_timestamp_nanos)
                    .collect(),
                error,
            })
        }
    }
}
