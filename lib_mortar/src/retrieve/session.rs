//! # Session
//!
//! Owns one authenticated logical connection: the transport, the configured
//! credentials and the current token. Token mutation takes `&mut self`, so a
//! session shared between tasks needs an outer lock.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::token_store::TokenStore;
use super::transport::MortarTransport;
use crate::error::{MortarError, Result};

pub struct Session<T: ?Sized> {
    transport: Arc<T>,
    instance: String,
    username: String,
    password: String,
    token: Option<String>,
    store: Option<Arc<dyn TokenStore>>,
}

impl<T: MortarTransport + ?Sized> Session<T> {
    /// Creates a session without persistence.
    pub fn new(
        transport: Arc<T>,
        instance: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            instance: instance.into(),
            username: username.into(),
            password: password.into(),
            token: None,
            store: None,
        }
    }

    /// Attaches a token store and adopts any token already persisted for
    /// this instance. An unreadable store is logged and ignored.
    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        match store.load(&self.instance) {
            Ok(Some(token)) => {
                debug!(instance = %self.instance, "loaded persisted token");
                self.token = Some(token);
            }
            Ok(None) => {}
            Err(e) => warn!(instance = %self.instance, "could not read persisted token: {}", e),
        }
        self.store = Some(store);
        self
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Exchanges the given credentials for a token, caches and persists it.
    ///
    /// Any transport failure, including an unreachable endpoint, is reported
    /// as [`MortarError::Authentication`].
    pub async fn login(&mut self, username: &str, password: &str) -> Result<String> {
        if username.is_empty() {
            return Err(MortarError::Authentication(
                "no username configured".to_string(),
            ));
        }

        let response = self
            .transport
            .get_credential_token(username, password)
            .await
            .map_err(|status| {
                MortarError::Authentication(format!(
                    "login as {:?} failed ({:?}): {}",
                    username,
                    status.code(),
                    status.message()
                ))
            })?;

        if response.token.is_empty() {
            return Err(MortarError::Authentication(format!(
                "service issued no token for {:?}",
                username
            )));
        }

        info!(instance = %self.instance, "obtained credential token");
        self.token = Some(response.token.clone());
        self.persist(&response.token);
        Ok(response.token)
    }

    pub fn current_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Forgets the cached token; the next [`Session::ensure_token`] logs in.
    pub fn invalidate(&mut self) {
        if self.token.take().is_some() {
            debug!(instance = %self.instance, "credential token invalidated");
        }
    }

    /// Returns the cached token, logging in with the configured credentials
    /// when there is none.
    pub async fn ensure_token(&mut self) -> Result<String> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }
        let username = self.username.clone();
        let password = self.password.clone();
        self.login(&username, &password).await
    }

    fn persist(&self, token: &str) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.instance, token) {
                warn!(instance = %self.instance, "could not persist credential token: {}", e);
            }
        }
    }
}
