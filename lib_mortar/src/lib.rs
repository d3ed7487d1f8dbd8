//! Client library for the Mortar building-data service.
//!
//! `qualify` filters sites by metadata queries; `fetch` streams metadata rows
//! and timeseries samples into a [`ResultAssembler`], whose views can be
//! queried with SQL and whose selections materialize into time-aligned
//! [`SelectionFrame`]s. Expired credential tokens are renewed transparently,
//! once per call.

pub mod client;
pub mod configs;
pub mod connections;
pub mod error;
pub mod ingestors;
pub mod mortar;
pub mod retrieve;

#[cfg(feature = "blocking")]
pub mod blocking;

#[cfg(feature = "loggers")]
pub mod loggers;

// Re-export the public surface
pub use client::Client;
pub use configs::{ClientConfig, ClientConfigBuilder};
pub use error::{MortarError, Result};
pub use ingestors::{AssemblyState, ResultAssembler, SelectionFrame};
pub use mortar::{Aggregation, FetchRequest, Selection, TimeParams, Timeseries, View};
