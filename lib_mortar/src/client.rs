//! # Async Client
//!
//! The public entry point: `qualify` and `fetch` against one Mortar instance.
//! Calls take `&mut self`, so one client runs one logical call at a time.

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::configs::config_client::ClientConfig;
use crate::error::{MortarError, Result};
use crate::ingestors::assembler::ResultAssembler;
use crate::mortar::proto_handler as pb;
use crate::mortar::records::Record;
use crate::mortar::request::FetchRequest;
use crate::retrieve::invoker::{CallState, Operation, RetryingInvoker};
use crate::retrieve::session::Session;
use crate::retrieve::token_store::FileTokenStore;
use crate::retrieve::transport::{GrpcTransport, MortarTransport, RecordStream};

pub struct Client<T: ?Sized = GrpcTransport> {
    invoker: RetryingInvoker<T>,
}

impl Client<GrpcTransport> {
    /// Connects lazily to the configured address, with tokens persisted in
    /// `config.token_file`. Must run inside a Tokio runtime.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let transport = Arc::new(GrpcTransport::new(config)?);
        let store = Arc::new(FileTokenStore::new(&config.token_file));
        let session = Session::new(
            transport,
            config.instance_key(),
            config.username.clone(),
            config.password.clone(),
        )
        .with_store(store);
        info!(address = %config.address, tls = !config.disable_tls, "mortar client ready");
        Ok(Self::new(session))
    }

    /// [`Client::connect`] with configuration taken from the environment.
    pub fn from_env() -> Result<Self> {
        Self::connect(&ClientConfig::from_env()?)
    }
}

impl<T: MortarTransport + ?Sized> Client<T> {
    pub fn new(session: Session<T>) -> Self {
        Self {
            invoker: RetryingInvoker::new(session),
        }
    }

    pub fn session(&self) -> &Session<T> {
        self.invoker.session()
    }

    /// Outcome of the most recent call.
    pub fn last_call_state(&self) -> CallState {
        self.invoker.last_state()
    }

    /// Logs in explicitly with the given credentials. Not required before
    /// `qualify`/`fetch`, which log in on demand.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<String> {
        self.invoker.session_mut().login(username, password).await
    }

    /// Returns the sites satisfying every query in `queries`.
    pub async fn qualify<S: AsRef<str>>(&mut self, queries: &[S]) -> Result<Vec<String>> {
        if queries.is_empty() {
            return Err(MortarError::InvalidRequest(
                "qualify needs at least one query".to_string(),
            ));
        }
        let request = pb::QualifyRequest {
            required: queries.iter().map(|q| q.as_ref().to_string()).collect(),
        };

        let response = self
            .invoker
            .call(Operation::Qualify, |transport, token| {
                let request = request.clone();
                async move {
                    transport
                        .qualify(request, &token)
                        .await
                        .map_err(MortarError::from_status)
                }
            })
            .await?;

        if !response.error.is_empty() {
            error!(error = %response.error, "service rejected qualify");
            return Err(MortarError::RemoteQuery(response.error));
        }
        debug!(sites = response.sites.len(), "qualify complete");
        Ok(response.sites)
    }

    /// Streams the request's results into a complete [`ResultAssembler`].
    pub async fn fetch(&mut self, request: &FetchRequest) -> Result<ResultAssembler> {
        self.fetch_inner(request, None).await
    }

    /// Like [`Client::fetch`], but stops draining once `cancel` turns true.
    /// A cancelled fetch returns what was collected, marked partial.
    pub async fn fetch_cancellable(
        &mut self,
        request: &FetchRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<ResultAssembler> {
        self.fetch_inner(request, Some(cancel)).await
    }

    async fn fetch_inner(
        &mut self,
        request: &FetchRequest,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<ResultAssembler> {
        request.validate()?;
        let wire = pb::FetchRequest::from(request);

        let assembler = self
            .invoker
            .call(Operation::Fetch, |transport, token| {
                let wire = wire.clone();
                let cancel = cancel.clone();
                async move {
                    let stream = transport
                        .fetch(wire, &token)
                        .await
                        .map_err(MortarError::from_status)?;
                    // Each attempt starts from an empty assembler.
                    drain(stream, ResultAssembler::new()?, cancel).await
                }
            })
            .await?;

        let stats = assembler.stats();
        debug!(
            state = ?assembler.state(),
            views = assembler.list_views().len(),
            selections = assembler.list_selections().len(),
            metadata_rows = stats.metadata_rows,
            samples = stats.samples,
            skipped = stats.skipped_records,
            "fetch complete"
        );
        Ok(assembler)
    }
}

async fn drain(
    mut stream: RecordStream,
    mut assembler: ResultAssembler,
    mut cancel: Option<watch::Receiver<bool>>,
) -> Result<ResultAssembler> {
    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                warn!("fetch cancelled; result is partial");
                assembler.abort();
                return Ok(assembler);
            }
            next = stream.next() => match next {
                Some(Ok(response)) => assembler.ingest(Record::from(response))?,
                Some(Err(status)) => return Err(MortarError::from_status(status)),
                None => break,
            },
        }
    }
    assembler.finalize();
    Ok(assembler)
}

/// Resolves once cancellation is requested; never resolves without a
/// receiver or after the sender is gone.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = cancel {
        if rx.wait_for(|c| *c).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}

impl<T: ?Sized> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}
