//! # Mortar Protobuf Messages
//!
//! Rust representations of the `mortar.Mortar` service messages. They are
//! declared directly with the `prost` derives, so no build script or `protoc`
//! is needed.

use prost::Message;

/// Username/password exchange for a credential token.
#[derive(Clone, PartialEq, Message)]
pub struct GetApiKeyRequest {
    #[prost(string, tag = "1")]
    pub username: String,

    #[prost(string, tag = "2")]
    pub password: String,
}

/// Credential token issued by `GetAPIKey`.
#[derive(Clone, PartialEq, Message)]
pub struct ApiKeyResponse {
    /// Access token, sent back as the `token` call-metadata entry.
    #[prost(string, tag = "1")]
    pub token: String,

    /// Refresh token. The client renews by logging in again and does not use it.
    #[prost(string, tag = "2")]
    pub refreshtoken: String,
}

/// Site qualification request: every query must match for a site to qualify.
#[derive(Clone, PartialEq, Message)]
pub struct QualifyRequest {
    #[prost(string, repeated, tag = "1")]
    pub required: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QualifyResponse {
    /// Non-empty when the service could not evaluate the queries.
    #[prost(string, tag = "1")]
    pub error: String,

    #[prost(string, repeated, tag = "2")]
    pub sites: Vec<String>,
}

/// A named metadata query, evaluated per site.
#[derive(Clone, PartialEq, Message)]
pub struct View {
    #[prost(string, repeated, tag = "1")]
    pub sites: Vec<String>,

    #[prost(string, tag = "2")]
    pub name: String,

    /// The query text defining the view.
    #[prost(string, tag = "3")]
    pub definition: String,
}

/// Which variables of a view carry timeseries for a selection.
#[derive(Clone, PartialEq, Message)]
pub struct Timeseries {
    #[prost(string, tag = "1")]
    pub view: String,

    #[prost(string, repeated, tag = "2")]
    pub variables: Vec<String>,
}

/// A named group of timeseries fetched with one aggregation.
#[derive(Clone, PartialEq, Message)]
pub struct Selection {
    #[prost(string, tag = "1")]
    pub name: String,

    /// Maps to the [`AggFunc`] enum.
    #[prost(enumeration = "AggFunc", tag = "2")]
    pub aggregation: i32,

    #[prost(string, tag = "3")]
    pub window: String,

    #[prost(message, repeated, tag = "4")]
    pub timeseries: Vec<Timeseries>,
}

/// Temporal bounds of a fetch. `start`/`end` are RFC 3339 timestamps.
#[derive(Clone, PartialEq, Message)]
pub struct TimeParams {
    #[prost(string, tag = "1")]
    pub start: String,

    #[prost(string, tag = "2")]
    pub end: String,

    #[prost(string, tag = "3")]
    pub window: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct FetchRequest {
    #[prost(string, repeated, tag = "1")]
    pub sites: Vec<String>,

    #[prost(message, repeated, tag = "2")]
    pub views: Vec<View>,

    #[prost(message, repeated, tag = "3")]
    pub selections: Vec<Selection>,

    #[prost(message, optional, tag = "4")]
    pub time: Option<TimeParams>,
}

/// A metadata term. `namespace` is empty for literals.
#[derive(Clone, PartialEq, Message)]
pub struct Uri {
    #[prost(string, tag = "1")]
    pub namespace: String,

    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Row {
    #[prost(message, repeated, tag = "1")]
    pub values: Vec<Uri>,
}

/// One streamed unit of a `Fetch` call. Carries either metadata rows for a
/// view or samples for one (selection, identifier) pair.
#[derive(Clone, PartialEq, Message)]
pub struct FetchResponse {
    /// Non-empty on the final record of a failed stream.
    #[prost(string, tag = "1")]
    pub error: String,

    #[prost(string, tag = "2")]
    pub site: String,

    #[prost(string, tag = "3")]
    pub view: String,

    /// Query variable names, sent with the first record of each view.
    #[prost(string, repeated, tag = "4")]
    pub variables: Vec<String>,

    #[prost(message, repeated, tag = "5")]
    pub rows: Vec<Row>,

    #[prost(string, tag = "6")]
    pub selection: String,

    #[prost(string, tag = "7")]
    pub identifier: String,

    /// Nanoseconds since the Unix epoch, parallel to `values`.
    #[prost(int64, repeated, tag = "8")]
    pub times: Vec<i64>,

    #[prost(double, repeated, tag = "9")]
    pub values: Vec<f64>,
}

/// Aggregation applied to each selection window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum AggFunc {
    /// Unset; rejected by the service.
    Invalid = 0,
    Raw = 1,
    Mean = 2,
    Min = 3,
    Max = 4,
    Count = 5,
    Sum = 6,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_response_survives_the_wire() {
        let resp = FetchResponse {
            selection: "meter_data".into(),
            identifier: "5f3c".into(),
            times: vec![1_500_000_000_000_000_000, 1_500_000_060_000_000_000],
            values: vec![1.5, 2.5],
            ..Default::default()
        };
        let bytes = resp.encode_to_vec();
        let decoded = FetchResponse::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, resp);
        assert!(decoded.view.is_empty());
    }

    #[test]
    fn aggregation_getter_maps_unknown_values_to_default() {
        let mut sel = Selection::default();
        sel.set_aggregation(AggFunc::Mean);
        assert_eq!(sel.aggregation(), AggFunc::Mean);
        sel.aggregation = 99;
        assert_eq!(sel.aggregation(), AggFunc::Invalid);
    }
}
