#![cfg(feature = "blocking")]

mod common;

use common::{data, expired, session, FetchStep, ScriptedTransport};
use lib_mortar::blocking::Client;
use lib_mortar::mortar::proto_handler::QualifyResponse;
use lib_mortar::{Aggregation, FetchRequest, Selection, TimeParams, Timeseries};

#[test]
fn blocking_calls_run_to_completion() {
    let transport = ScriptedTransport::new();
    transport.push_qualify(Ok(QualifyResponse {
        error: String::new(),
        sites: vec!["site-a".to_string()],
    }));
    transport.push_fetch(FetchStep::Reject(expired()));
    transport.push_fetch(FetchStep::Stream(vec![Ok(data("s", "id1", &[1.0, 2.0], &[0, 1]))]));

    let mut client = Client::new(session(transport.clone())).unwrap();
    assert_eq!(client.qualify(&["q"]).unwrap(), vec!["site-a"]);

    let request = FetchRequest::new(["site-a"])
        .selection(Selection::new("s", Aggregation::Raw).timeseries(Timeseries::new("v", ["?x"])))
        .time(TimeParams::new("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z"));
    let result = client.fetch(&request).unwrap();

    assert!(result.is_complete());
    assert_eq!(result.materialize("s").len(), 2);
    assert_eq!(client.session().current_token(), Some("token-2"));
}
