//! `Client::fetch` against the scripted transport: assembly, token renewal,
//! terminal stream errors and cancellation.

mod common;

use std::sync::Arc;

use chrono::DateTime;
use tokio::sync::watch;

use common::{data, expired, metadata, session, stream_error, FetchStep, ScriptedTransport};
use lib_mortar::retrieve::{CallState, FileTokenStore, TokenStore};
use lib_mortar::{
    Aggregation, AssemblyState, Client, FetchRequest, MortarError, Selection, TimeParams,
    Timeseries, View,
};

fn request() -> FetchRequest {
    FetchRequest::new(["site-a"])
        .view(View::new(
            "meter",
            "SELECT ?meter ?unit WHERE { ?meter rdf:type brick:Meter . ?meter brick:hasUnit ?unit }",
        ))
        .selection(
            Selection::new("energy", Aggregation::Raw)
                .timeseries(Timeseries::new("meter", ["?meter"])),
        )
        .time(TimeParams::new("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z"))
}

#[tokio::test]
async fn fetch_builds_tables_and_frames() {
    let transport = ScriptedTransport::new();
    transport.push_fetch(FetchStep::Stream(vec![
        Ok(metadata(
            "meter",
            &["?meter", "?unit"],
            &[&[("brick", "m1"), ("", "kW")], &[("brick", "m2"), ("", "kW")]],
            "site-a",
        )),
        Ok(data("energy", "m1", &[1.0, 2.0], &[0, 60])),
        Ok(data("energy", "m2", &[5.0], &[60])),
        Ok(data("energy", "m1", &[9.0], &[60])),
    ]));

    let mut client = Client::new(session(transport.clone()));
    let result = client.fetch(&request()).await.unwrap();

    assert_eq!(result.state(), AssemblyState::Complete);
    assert_eq!(client.last_call_state(), CallState::Succeeded);
    assert_eq!(result.list_views(), &["meter".to_string()]);
    assert_eq!(result.list_selections(), &["energy".to_string()]);

    let rows = result.query("select meter, unit, site from meter").unwrap();
    assert_eq!(rows.columns, vec!["meter", "unit", "site"]);
    assert_eq!(
        rows.rows[1],
        vec![Some("brick#m2".to_string()), Some("kW".to_string()), Some("site-a".to_string())]
    );

    let frame = result.materialize("energy");
    let t60 = DateTime::from_timestamp(60, 0).unwrap();
    assert_eq!(frame.columns(), &["m1".to_string(), "m2".to_string()]);
    assert_eq!(frame.len(), 2);
    assert_eq!(frame.value(t60, "m1"), Some(2.0));
    assert_eq!(frame.value(t60, "m2"), Some(5.0));
    assert_eq!(frame.column("m2").unwrap()[0], None);

    assert_eq!(transport.logins(), 1);
    assert_eq!(transport.tokens_used(), vec!["token-1"]);
}

#[tokio::test]
async fn expiry_at_call_start_is_retried_with_a_new_token() {
    let transport = ScriptedTransport::new();
    transport.push_fetch(FetchStep::Reject(expired()));
    transport.push_fetch(FetchStep::Stream(vec![Ok(data("energy", "m1", &[1.0], &[0]))]));

    let mut client = Client::new(session(transport.clone()));
    let result = client.fetch(&request()).await.unwrap();

    assert_eq!(result.materialize("energy").len(), 1);
    assert_eq!(transport.tokens_used(), vec!["token-1", "token-2"]);
    assert_eq!(client.session().current_token(), Some("token-2"));
}

#[tokio::test]
async fn mid_stream_expiry_restarts_from_an_empty_result() {
    let transport = ScriptedTransport::new();
    transport.push_fetch(FetchStep::Stream(vec![
        Ok(metadata("meter", &["?meter"], &[&[("brick", "m1")]], "site-a")),
        Ok(data("energy", "m1", &[100.0], &[0])),
        Err(expired()),
    ]));
    transport.push_fetch(FetchStep::Stream(vec![
        Ok(metadata("meter", &["?meter"], &[&[("brick", "m1")]], "site-a")),
        Ok(data("energy", "m1", &[1.0], &[0])),
    ]));

    let mut client = Client::new(session(transport.clone()));
    let result = client.fetch(&request()).await.unwrap();

    // Nothing from the abandoned attempt survives.
    assert_eq!(result.query("select * from meter").unwrap().len(), 1);
    let t0 = DateTime::from_timestamp(0, 0).unwrap();
    assert_eq!(result.materialize("energy").value(t0, "m1"), Some(1.0));
    assert_eq!(result.stats().samples, 1);
    assert_eq!(transport.logins(), 2);
}

#[tokio::test]
async fn second_expiry_is_fatal() {
    let transport = ScriptedTransport::new();
    transport.push_fetch(FetchStep::Reject(expired()));
    transport.push_fetch(FetchStep::Reject(expired()));
    transport.push_fetch(FetchStep::Stream(vec![]));

    let mut client = Client::new(session(transport.clone()));
    let err = client.fetch(&request()).await.unwrap_err();

    assert!(err.is_auth_expired());
    assert_eq!(transport.tokens_used().len(), 2);
    assert_eq!(client.last_call_state(), CallState::Failed);
}

#[tokio::test]
async fn error_record_fails_the_fetch_without_retry() {
    let transport = ScriptedTransport::new();
    transport.push_fetch(FetchStep::Stream(vec![
        Ok(stream_error("permission denied")),
        Ok(metadata("meter", &["?meter"], &[], "site-a")),
    ]));

    let mut client = Client::new(session(transport.clone()));
    let err = client.fetch(&request()).await.unwrap_err();

    assert!(matches!(&err, MortarError::RemoteStream(m) if m == "permission denied"));
    assert_eq!(transport.tokens_used().len(), 1);
}

#[tokio::test]
async fn other_transport_failures_are_not_retried() {
    let transport = ScriptedTransport::new();
    transport.push_fetch(FetchStep::Stream(vec![
        Ok(data("energy", "m1", &[1.0], &[0])),
        Err(tonic::Status::unavailable("connection reset")),
    ]));

    let mut client = Client::new(session(transport.clone()));
    let err = client.fetch(&request()).await.unwrap_err();

    assert!(matches!(err, MortarError::Transport(ref s) if s.code() == tonic::Code::Unavailable));
    assert_eq!(transport.tokens_used().len(), 1);
}

#[tokio::test]
async fn invalid_request_never_reaches_the_service() {
    let transport = ScriptedTransport::new();
    let mut client = Client::new(session(transport.clone()));

    let no_time = FetchRequest::new(["site-a"]).selection(
        Selection::new("energy", Aggregation::Mean).timeseries(Timeseries::new("meter", ["?meter"])),
    );
    let err = client.fetch(&no_time).await.unwrap_err();

    assert!(matches!(err, MortarError::InvalidRequest(_)));
    assert_eq!(transport.logins(), 0);
    assert!(transport.tokens_used().is_empty());
}

#[tokio::test]
async fn cancelled_fetch_returns_a_partial_result() {
    let transport = ScriptedTransport::new();
    transport.push_fetch(FetchStep::Stream(vec![Ok(data("energy", "m1", &[1.0], &[0]))]));

    let (cancel, rx) = watch::channel(false);
    cancel.send(true).unwrap();

    let mut client = Client::new(session(transport.clone()));
    let result = client.fetch_cancellable(&request(), rx).await.unwrap();

    assert_eq!(result.state(), AssemblyState::Partial);
    assert!(!result.is_complete());
}

#[tokio::test]
async fn uncancelled_fetch_completes() {
    let transport = ScriptedTransport::new();
    transport.push_fetch(FetchStep::Stream(vec![Ok(data("energy", "m1", &[1.0], &[0]))]));

    let (_cancel, rx) = watch::channel(false);
    let mut client = Client::new(session(transport.clone()));
    let result = client.fetch_cancellable(&request(), rx).await.unwrap();

    assert!(result.is_complete());
    assert_eq!(result.materialize("energy").len(), 1);
}

#[tokio::test]
async fn renewed_token_is_persisted_and_reused() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileTokenStore::new(dir.path().join("tokens.json")));

    let first = ScriptedTransport::new();
    first.push_fetch(FetchStep::Stream(vec![]));
    let mut client = Client::new(session(first.clone()).with_store(store.clone()));
    client.fetch(&request()).await.unwrap();
    assert_eq!(store.load("alice@test:9001").unwrap().as_deref(), Some("token-1"));

    // A second process picks the token up without logging in.
    let second = ScriptedTransport::new();
    second.push_fetch(FetchStep::Stream(vec![]));
    let mut client = Client::new(session(second.clone()).with_store(store.clone()));
    client.fetch(&request()).await.unwrap();
    assert_eq!(second.logins(), 0);
    assert_eq!(second.tokens_used(), vec!["token-1"]);
}
