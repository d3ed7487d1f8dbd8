//! # Transport Seam
//!
//! The three remote operations of the Mortar API behind one trait, so the
//! session and retry layers can be driven by something other than a live
//! gRPC channel.

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use tonic::codec::CompressionEncoding;
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic::{Request, Status};

use crate::configs::config_client::ClientConfig;
use crate::connections::grpc_channel;
use crate::error::Result;
use crate::mortar::mortar_client::MortarClient;
use crate::mortar::proto_handler::{
    ApiKeyResponse, FetchRequest, FetchResponse, GetApiKeyRequest, QualifyRequest,
    QualifyResponse,
};

/// Call-metadata key carrying the credential token.
pub const TOKEN_METADATA_KEY: &str = "token";

/// Streamed `Fetch` records, in transport order.
pub type RecordStream = BoxStream<'static, std::result::Result<FetchResponse, Status>>;

/// The remote service boundary.
#[async_trait]
pub trait MortarTransport: Send + Sync {
    /// Exchanges credentials for a token.
    async fn get_credential_token(
        &self,
        username: &str,
        password: &str,
    ) -> std::result::Result<ApiKeyResponse, Status>;

    async fn qualify(
        &self,
        request: QualifyRequest,
        token: &str,
    ) -> std::result::Result<QualifyResponse, Status>;

    /// Opens the record stream. Errors may surface here or from the stream.
    async fn fetch(
        &self,
        request: FetchRequest,
        token: &str,
    ) -> std::result::Result<RecordStream, Status>;
}

/// [`MortarTransport`] over a gzip-compressed tonic channel.
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    client: MortarClient<Channel>,
}

impl GrpcTransport {
    /// Builds the transport from resolved configuration. Must run inside a
    /// Tokio runtime.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let channel = grpc_channel::connect_lazy(config)?;
        Ok(Self::from_channel(channel))
    }

    pub fn from_channel(channel: Channel) -> Self {
        let client = MortarClient::new(channel)
            .send_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Gzip);
        Self { client }
    }
}

fn with_token<T>(message: T, token: &str) -> std::result::Result<Request<T>, Status> {
    let mut req = Request::new(message);
    let value = MetadataValue::try_from(token)
        .map_err(|_| Status::invalid_argument("credential token is not valid call metadata"))?;
    req.metadata_mut().insert(TOKEN_METADATA_KEY, value);
    Ok(req)
}

#[async_trait]
impl MortarTransport for GrpcTransport {
    async fn get_credential_token(
        &self,
        username: &str,
        password: &str,
    ) -> std::result::Result<ApiKeyResponse, Status> {
        let mut client = self.client.clone();
        let req = GetApiKeyRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        Ok(client.get_api_key(req).await?.into_inner())
    }

    async fn qualify(
        &self,
        request: QualifyRequest,
        token: &str,
    ) -> std::result::Result<QualifyResponse, Status> {
        let mut client = self.client.clone();
        Ok(client.qualify(with_token(request, token)?).await?.into_inner())
    }

    async fn fetch(
        &self,
        request: FetchRequest,
        token: &str,
    ) -> std::result::Result<RecordStream, Status> {
        let mut client = self.client.clone();
        let stream = client.fetch(with_token(request, token)?).await?.into_inner();
        Ok(stream.boxed())
    }
}
