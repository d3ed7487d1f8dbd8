//! # Mortar Protocol Module
//!
//! Everything that speaks the `mortar.Mortar` wire protocol.
//!
//! ## Contained Modules:
//!
//! - **`proto_handler`**: prost message definitions for the three RPCs.
//! - **`mortar_client`**: the tonic client stub for `GetAPIKey`, `Qualify`
//!   and the server-streaming `Fetch`.
//! - **`request`**: fetch request value objects with local validation.
//! - **`records`**: typed stream records decoded from `FetchResponse`.

pub mod mortar_client;
pub mod proto_handler;
pub mod records;
pub mod request;

pub use records::{DataRecord, MetadataRecord, Record, Uri};
pub use request::{Aggregation, FetchRequest, Selection, TimeParams, Timeseries, View};
