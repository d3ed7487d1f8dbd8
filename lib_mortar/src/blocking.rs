//! # Blocking Client
//!
//! A synchronous wrapper around [`crate::client::Client`] for callers without
//! an async runtime. The client owns a current-thread Tokio runtime and
//! blocks on each call until it completes or fails.
//!
//! Do not use it from inside an async context; the runtime panics when
//! blocked on from a runtime worker.

use tokio::runtime::{Builder, Runtime};

use crate::client::Client as AsyncClient;
use crate::configs::config_client::ClientConfig;
use crate::error::Result;
use crate::ingestors::assembler::ResultAssembler;
use crate::mortar::request::FetchRequest;
use crate::retrieve::invoker::CallState;
use crate::retrieve::session::Session;
use crate::retrieve::transport::{GrpcTransport, MortarTransport};

pub struct Client<T: ?Sized = GrpcTransport> {
    runtime: Runtime,
    inner: AsyncClient<T>,
}

fn runtime() -> Result<Runtime> {
    Ok(Builder::new_current_thread().enable_all().build()?)
}

impl Client<GrpcTransport> {
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let runtime = runtime()?;
        // The lazy channel registers with the runtime it is created in.
        let inner = {
            let _guard = runtime.enter();
            AsyncClient::connect(config)?
        };
        Ok(Self { runtime, inner })
    }

    pub fn from_env() -> Result<Self> {
        Self::connect(&ClientConfig::from_env()?)
    }
}

impl<T: MortarTransport + ?Sized> Client<T> {
    pub fn new(session: Session<T>) -> Result<Self> {
        Ok(Self {
            runtime: runtime()?,
            inner: AsyncClient::new(session),
        })
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<String> {
        self.runtime.block_on(self.inner.login(username, password))
    }

    pub fn qualify<S: AsRef<str>>(&mut self, queries: &[S]) -> Result<Vec<String>> {
        self.runtime.block_on(self.inner.qualify(queries))
    }

    pub fn fetch(&mut self, request: &FetchRequest) -> Result<ResultAssembler> {
        self.runtime.block_on(self.inner.fetch(request))
    }

    pub fn last_call_state(&self) -> CallState {
        self.inner.last_call_state()
    }

    pub fn session(&self) -> &Session<T> {
        self.inner.session()
    }
}
