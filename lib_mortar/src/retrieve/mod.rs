//! # Data Retrieval Module
//!
//! The call path between the public client and the wire.
//!
//! ## Contained Modules:
//!
//! - **`transport`**: the `MortarTransport` trait and its gRPC implementation.
//!   Tests substitute scripted transports here.
//! - **`session`**: credential token lifecycle (login, cache, invalidate).
//! - **`token_store`**: durable token persistence keyed by client instance.
//! - **`invoker`**: runs one logical call, renewing the token and retrying
//!   exactly once when the service reports it expired.

pub mod invoker;
pub mod session;
pub mod token_store;
pub mod transport;

pub use invoker::{CallState, Operation, RetryingInvoker};
pub use session::Session;
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};
pub use transport::{GrpcTransport, MortarTransport, RecordStream};
