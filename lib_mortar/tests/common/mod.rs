//! Scripted in-process transport shared by the integration tests.
//!
//! Each `qualify`/`fetch` call pops the next scripted outcome. Logins hand
//! out `token-1`, `token-2`, ... and every token a call was made with is
//! recorded, so tests can check exactly when a renewal happened.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use tonic::Status;

use lib_mortar::mortar::proto_handler::{
    ApiKeyResponse, FetchRequest, FetchResponse, QualifyRequest, QualifyResponse, Row, Uri,
};
use lib_mortar::retrieve::{MortarTransport, RecordStream, Session};

pub const PASSWORD: &str = "secret";

/// One scripted outcome of a `Fetch` call.
pub enum FetchStep {
    /// The call is rejected before any record is streamed.
    Reject(Status),
    /// These items are streamed in order, then the stream ends.
    Stream(Vec<Result<FetchResponse, Status>>),
}

#[derive(Default)]
pub struct ScriptedTransport {
    logins: Mutex<u32>,
    qualify_script: Mutex<VecDeque<Result<QualifyResponse, Status>>>,
    fetch_script: Mutex<VecDeque<FetchStep>>,
    tokens_used: Mutex<Vec<String>>,
    qualify_requests: Mutex<Vec<QualifyRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_qualify(&self, outcome: Result<QualifyResponse, Status>) {
        self.qualify_script.lock().push_back(outcome);
    }

    pub fn push_fetch(&self, step: FetchStep) {
        self.fetch_script.lock().push_back(step);
    }

    pub fn logins(&self) -> u32 {
        *self.logins.lock()
    }

    pub fn tokens_used(&self) -> Vec<String> {
        self.tokens_used.lock().clone()
    }

    pub fn qualify_requests(&self) -> Vec<QualifyRequest> {
        self.qualify_requests.lock().clone()
    }
}

#[async_trait]
impl MortarTransport for ScriptedTransport {
    async fn get_credential_token(
        &self,
        _username: &str,
        password: &str,
    ) -> Result<ApiKeyResponse, Status> {
        if password != PASSWORD {
            return Err(Status::unauthenticated("invalid credentials"));
        }
        let mut n = self.logins.lock();
        *n += 1;
        Ok(ApiKeyResponse {
            token: format!("token-{}", *n),
            refreshtoken: String::new(),
        })
    }

    async fn qualify(
        &self,
        request: QualifyRequest,
        token: &str,
    ) -> Result<QualifyResponse, Status> {
        self.tokens_used.lock().push(token.to_string());
        self.qualify_requests.lock().push(request);
        self.qualify_script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Status::internal("qualify script exhausted")))
    }

    async fn fetch(&self, _request: FetchRequest, token: &str) -> Result<RecordStream, Status> {
        self.tokens_used.lock().push(token.to_string());
        let step = self.fetch_script.lock().pop_front();
        match step {
            Some(FetchStep::Reject(status)) => Err(status),
            Some(FetchStep::Stream(items)) => Ok(stream::iter(items).boxed()),
            None => Err(Status::internal("fetch script exhausted")),
        }
    }
}

pub fn session(transport: Arc<ScriptedTransport>) -> Session<ScriptedTransport> {
    Session::new(transport, "alice@test:9001", "alice", PASSWORD)
}

pub fn expired() -> Status {
    Status::unauthenticated("token expired")
}

pub fn data(selection: &str, identifier: &str, values: &[f64], secs: &[i64]) -> FetchResponse {
    FetchResponse {
        selection: selection.to_string(),
        identifier: identifier.to_string(),
        values: values.to_vec(),
        times: secs.iter().map(|s| s * 1_000_000_000).collect(),
        ..Default::default()
    }
}

pub fn metadata(view: &str, variables: &[&str], rows: &[&[(&str, &str)]], site: &str) -> FetchResponse {
    FetchResponse {
        view: view.to_string(),
        variables: variables.iter().map(|v| v.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| Row {
                values: row
                    .iter()
                    .map(|(ns, value)| Uri {
                        namespace: ns.to_string(),
                        value: value.to_string(),
                    })
                    .collect(),
            })
            .collect(),
        site: site.to_string(),
        ..Default::default()
    }
}

pub fn stream_error(message: &str) -> FetchResponse {
    FetchResponse {
        error: message.to_string(),
        ..Default::default()
    }
}
