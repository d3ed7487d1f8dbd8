//! # Fetch Request Builders
//!
//! Plain value objects describing a fetch. They serialize to JSON (the CLI
//! reads requests from files) and convert into the wire messages in
//! [`super::proto_handler`]. [`FetchRequest::validate`] applies the checks the
//! service would otherwise reject the request for, so mistakes fail locally.

use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use super::proto_handler as pb;
use crate::error::{MortarError, Result};

/// Aggregation applied to each selection window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Aggregation {
    Raw,
    Mean,
    Min,
    Max,
    Count,
    Sum,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Raw => "RAW",
            Aggregation::Mean => "MEAN",
            Aggregation::Min => "MIN",
            Aggregation::Max => "MAX",
            Aggregation::Count => "COUNT",
            Aggregation::Sum => "SUM",
        }
    }

    /// Every aggregation except RAW buckets samples into windows.
    pub fn is_windowed(&self) -> bool {
        !matches!(self, Aggregation::Raw)
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = MortarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RAW" => Ok(Aggregation::Raw),
            "MEAN" => Ok(Aggregation::Mean),
            "MIN" => Ok(Aggregation::Min),
            "MAX" => Ok(Aggregation::Max),
            "COUNT" => Ok(Aggregation::Count),
            "SUM" => Ok(Aggregation::Sum),
            other => Err(MortarError::InvalidRequest(format!(
                "unknown aggregation function {:?}",
                other
            ))),
        }
    }
}

impl From<Aggregation> for pb::AggFunc {
    fn from(agg: Aggregation) -> Self {
        match agg {
            Aggregation::Raw => pb::AggFunc::Raw,
            Aggregation::Mean => pb::AggFunc::Mean,
            Aggregation::Min => pb::AggFunc::Min,
            Aggregation::Max => pb::AggFunc::Max,
            Aggregation::Count => pb::AggFunc::Count,
            Aggregation::Sum => pb::AggFunc::Sum,
        }
    }
}

/// A named metadata query.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct View {
    pub sites: Vec<String>,
    pub name: String,
    pub definition: String,
}

impl View {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            sites: Vec::new(),
            name: name.into(),
            definition: definition.into(),
        }
    }

    pub fn sites<I, S>(mut self, sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sites = sites.into_iter().map(Into::into).collect();
        self
    }
}

/// Variables of one view whose timeseries belong to a selection.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeseries {
    pub view: String,
    pub variables: Vec<String>,
}

impl Timeseries {
    pub fn new<I, S>(view: impl Into<String>, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            view: view.into(),
            variables: variables.into_iter().map(Into::into).collect(),
        }
    }
}

/// A named group of timeseries fetched with one aggregation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub name: String,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub window: String,
    #[serde(default)]
    pub timeseries: Vec<Timeseries>,
}

impl Selection {
    pub fn new(name: impl Into<String>, aggregation: Aggregation) -> Self {
        Self {
            name: name.into(),
            aggregation,
            window: String::new(),
            timeseries: Vec::new(),
        }
    }

    pub fn window(mut self, window: impl Into<String>) -> Self {
        self.window = window.into();
        self
    }

    pub fn timeseries(mut self, ts: Timeseries) -> Self {
        self.timeseries.push(ts);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeParams {
    pub start: String,
    pub end: String,
    pub window: String,
}

impl TimeParams {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            window: String::new(),
        }
    }

    pub fn window(mut self, window: impl Into<String>) -> Self {
        self.window = window.into();
        self
    }
}

/// Everything one `fetch` call asks for.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchRequest {
    pub sites: Vec<String>,
    pub views: Vec<View>,
    pub selections: Vec<Selection>,
    pub time: Option<TimeParams>,
}

impl FetchRequest {
    pub fn new<I, S>(sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sites: sites.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn view(mut self, view: View) -> Self {
        self.views.push(view);
        self
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.selections.push(selection);
        self
    }

    pub fn time(mut self, time: TimeParams) -> Self {
        self.time = Some(time);
        self
    }

    /// Rejects requests the service is known to refuse.
    pub fn validate(&self) -> Result<()> {
        if self.sites.is_empty() {
            return invalid("request needs a non-empty list of sites");
        }
        if self.views.is_empty() && self.selections.is_empty() {
            return invalid("request needs at least one view or selection");
        }

        for (idx, view) in self.views.iter().enumerate() {
            if view.name.is_empty() {
                return invalid(format!("view {} must have a name", idx));
            }
            if view.definition.trim().is_empty() {
                return invalid(format!("view {:?} must have a definition", view.name));
            }
        }

        let mut windowed = false;
        for (idx, sel) in self.selections.iter().enumerate() {
            if sel.name.is_empty() {
                return invalid(format!("selection {} must have a name", idx));
            }
            if sel.timeseries.is_empty() {
                return invalid(format!(
                    "selection {:?} must list at least one timeseries",
                    sel.name
                ));
            }
            for ts in &sel.timeseries {
                if ts.view.is_empty() || ts.variables.is_empty() {
                    return invalid(format!(
                        "selection {:?} has a timeseries without a view or variables",
                        sel.name
                    ));
                }
            }
            windowed |= sel.aggregation.is_windowed();
        }

        if !self.selections.is_empty() {
            let time = match &self.time {
                Some(time) => time,
                None => return invalid("request with selections needs time parameters"),
            };
            if DateTime::parse_from_rfc3339(&time.start).is_err() {
                return invalid(format!(
                    "time.start is not an RFC 3339 timestamp ({})",
                    time.start
                ));
            }
            if DateTime::parse_from_rfc3339(&time.end).is_err() {
                return invalid(format!(
                    "time.end is not an RFC 3339 timestamp ({})",
                    time.end
                ));
            }
            let has_window = !time.window.is_empty()
                || self.selections.iter().all(|s| !s.window.is_empty() || !s.aggregation.is_windowed());
            if windowed && !has_window {
                return invalid("a windowed aggregation (anything but RAW) needs a time window");
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> Result<()> {
    Err(MortarError::InvalidRequest(msg.into()))
}

impl From<&FetchRequest> for pb::FetchRequest {
    fn from(req: &FetchRequest) -> Self {
        pb::FetchRequest {
            sites: req.sites.clone(),
            views: req
                .views
                .iter()
                .map(|v| pb::View {
                    sites: v.sites.clone(),
                    name: v.name.clone(),
                    definition: v.definition.clone(),
                })
                .collect(),
            selections: req
                .selections
                .iter()
                .map(|s| pb::Selection {
                    name: s.name.clone(),
                    aggregation: pb::AggFunc::from(s.aggregation) as i32,
                    window: s.window.clone(),
                    timeseries: s
                        .timeseries
                        .iter()
                        .map(|t| pb::Timeseries {
                            view: t.view.clone(),
                            variables: t.variables.clone(),
                        })
                        .collect(),
                })
                .collect(),
            time: req.time.as_ref().map(|t| pb::TimeParams {
                start: t.start.clone(),
                end: t.end.clone(),
                window: t.window.clone(),
            }),
        }
    }
}
