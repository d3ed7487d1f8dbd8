//! # Connections Module
//!
//! This module owns the two resources the client talks to: the remote
//! service over a gRPC channel, and the private in-memory SQLite database
//! each fetch result keeps its metadata tables in.

/// Endpoint, TLS and compression setup for the tonic channel.
pub mod grpc_channel;

/// In-memory relational table store backed by SQLite.
pub mod db_sqlite;
