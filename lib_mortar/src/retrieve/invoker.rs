//! # Auth-Aware Retry
//!
//! Runs one logical remote call with the session's token. A call rejected
//! because the token is stale is retried exactly once after a fresh login;
//! every other failure, and a second expiry, surfaces unchanged.
//!
//! ```text
//! NotStarted -> InFlight -> Succeeded
//!                        -> Failed
//!                        -> AuthExpired -> Reauthenticating -> InFlight (retry) -> Succeeded | Failed
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use super::session::Session;
use super::transport::MortarTransport;
use crate::error::Result;

/// The remote operations that go through the invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Qualify,
    Fetch,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Qualify => write!(f, "Qualify"),
            Operation::Fetch => write!(f, "Fetch"),
        }
    }
}

/// Where the most recent logical call stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    NotStarted,
    InFlight,
    AuthExpired,
    Reauthenticating,
    Succeeded,
    Failed,
}

pub struct RetryingInvoker<T: ?Sized> {
    session: Session<T>,
    state: CallState,
    attempts: u32,
}

impl<T: MortarTransport + ?Sized> RetryingInvoker<T> {
    pub fn new(session: Session<T>) -> Self {
        Self {
            session,
            state: CallState::NotStarted,
            attempts: 0,
        }
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    /// State reached by the last call; `NotStarted` before the first one.
    pub fn last_state(&self) -> CallState {
        self.state
    }

    /// Attempts made by the last call (1, or 2 after a renewal).
    pub fn last_attempts(&self) -> u32 {
        self.attempts
    }

    /// Runs `attempt` with the transport and a valid token.
    ///
    /// `attempt` is invoked again from scratch on retry, so any state it
    /// builds (such as a partially filled assembler) must live inside it.
    pub async fn call<R, F, Fut>(&mut self, op: Operation, mut attempt: F) -> Result<R>
    where
        F: FnMut(Arc<T>, String) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        self.attempts = 0;
        self.state = CallState::InFlight;

        let first = match self.session.ensure_token().await {
            Ok(token) => self.run(&mut attempt, token).await,
            Err(e) => Err(e),
        };

        let err = match first {
            Ok(value) => return Ok(self.succeed(op, value)),
            Err(e) if e.is_auth_expired() => e,
            Err(e) => return Err(self.fail(op, e)),
        };

        self.state = CallState::AuthExpired;
        warn!(operation = %op, instance = %self.session.instance(), "{}; renewing token", err);
        self.session.invalidate();

        self.state = CallState::Reauthenticating;
        let token = match self.session.ensure_token().await {
            Ok(token) => token,
            Err(e) => return Err(self.fail(op, e)),
        };

        self.state = CallState::InFlight;
        match self.run(&mut attempt, token).await {
            Ok(value) => Ok(self.succeed(op, value)),
            Err(e) => {
                if e.is_auth_expired() {
                    warn!(operation = %op, "token rejected again after renewal; giving up");
                }
                Err(self.fail(op, e))
            }
        }
    }

    async fn run<R, F, Fut>(&mut self, attempt: &mut F, token: String) -> Result<R>
    where
        F: FnMut(Arc<T>, String) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        self.attempts += 1;
        attempt(Arc::clone(self.session.transport()), token).await
    }

    fn succeed<R>(&mut self, op: Operation, value: R) -> R {
        self.state = CallState::Succeeded;
        debug!(operation = %op, attempts = self.attempts, "call succeeded");
        value
    }

    fn fail<E: fmt::Display>(&mut self, op: Operation, err: E) -> E {
        self.state = CallState::Failed;
        debug!(operation = %op, attempts = self.attempts, "call failed: {}", err);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MortarError;
    use crate::mortar::proto_handler::{
        ApiKeyResponse, FetchRequest, QualifyRequest, QualifyResponse,
    };
    use crate::retrieve::transport::RecordStream;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tonic::Status;

    #[derive(Default)]
    struct Tokens {
        issued: Mutex<u32>,
    }

    #[async_trait]
    impl MortarTransport for Tokens {
        async fn get_credential_token(
            &self,
            _username: &str,
            _password: &str,
        ) -> std::result::Result<ApiKeyResponse, Status> {
            let mut n = self.issued.lock();
            *n += 1;
            Ok(ApiKeyResponse {
                token: format!("t{}", *n),
                refreshtoken: String::new(),
            })
        }

        async fn qualify(
            &self,
            _request: QualifyRequest,
            _token: &str,
        ) -> std::result::Result<QualifyResponse, Status> {
            Err(Status::unimplemented("qualify"))
        }

        async fn fetch(
            &self,
            _request: FetchRequest,
            _token: &str,
        ) -> std::result::Result<RecordStream, Status> {
            Err(Status::unimplemented("fetch"))
        }
    }

    fn invoker() -> RetryingInvoker<Tokens> {
        RetryingInvoker::new(Session::new(Arc::new(Tokens::default()), "u@h", "u", "p"))
    }

    fn expired() -> MortarError {
        MortarError::from_status(Status::unauthenticated("token expired"))
    }

    #[tokio::test]
    async fn success_needs_one_attempt() {
        let mut inv = invoker();
        assert_eq!(inv.last_state(), CallState::NotStarted);
        let out = inv
            .call(Operation::Qualify, |_, token| async move { Ok(token) })
            .await
            .unwrap();
        assert_eq!(out, "t1");
        assert_eq!(inv.last_state(), CallState::Succeeded);
        assert_eq!(inv.last_attempts(), 1);
    }

    #[tokio::test]
    async fn expiry_is_retried_once_with_a_new_token() {
        let mut inv = invoker();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let out = inv
            .call(Operation::Fetch, move |_, token| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().push(token.clone());
                    if token == "t1" {
                        Err(expired())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 42);
        assert_eq!(*seen.lock(), vec!["t1".to_string(), "t2".to_string()]);
        assert_eq!(inv.last_attempts(), 2);
        assert_eq!(inv.session().current_token(), Some("t2"));
    }

    #[tokio::test]
    async fn second_expiry_is_not_retried() {
        let mut inv = invoker();
        let calls = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&calls);
        let err = inv
            .call(Operation::Qualify, move |_, _| {
                *counter.lock() += 1;
                async { Err::<(), _>(expired()) }
            })
            .await
            .unwrap_err();
        assert!(err.is_auth_expired());
        assert_eq!(*calls.lock(), 2);
        assert_eq!(inv.last_state(), CallState::Failed);
    }

    #[tokio::test]
    async fn other_failures_surface_without_retry() {
        let mut inv = invoker();
        let err = inv
            .call(Operation::Qualify, |_, _| async {
                Err::<(), _>(MortarError::from_status(Status::unavailable("down")))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MortarError::Transport(_)));
        assert_eq!(inv.last_attempts(), 1);
        assert_eq!(*inv.session().transport().issued.lock(), 1);
    }
}
