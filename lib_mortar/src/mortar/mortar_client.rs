//! gRPC client for the `mortar.Mortar` service.
//!
//! Written in the shape `tonic-build` generates so it can be swapped for
//! generated code without touching callers.

use tonic::codegen::*;

use super::proto_handler::{
    ApiKeyResponse, FetchRequest, FetchResponse, GetApiKeyRequest, QualifyRequest,
    QualifyResponse,
};

const SERVICE: &str = "mortar.Mortar";

/// Mortar RPC client
#[derive(Debug, Clone)]
pub struct MortarClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl MortarClient<tonic::transport::Channel> {
    /// Create a new client from a channel
    pub fn new(channel: tonic::transport::Channel) -> Self {
        let inner = tonic::client::Grpc::new(channel);
        Self { inner }
    }
}

impl<T> MortarClient<T>
where
    T: tonic::client::GrpcService<tonic::body::BoxBody>,
    T::Error: Into<StdError>,
    T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
    <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
{
    /// Compress requests with the given encoding.
    #[must_use]
    pub fn send_compressed(mut self, encoding: CompressionEncoding) -> Self {
        self.inner = self.inner.send_compressed(encoding);
        self
    }

    /// Enable decompressing responses.
    #[must_use]
    pub fn accept_compressed(mut self, encoding: CompressionEncoding) -> Self {
        self.inner = self.inner.accept_compressed(encoding);
        self
    }

    /// Exchange a username/password for a credential token.
    pub async fn get_api_key(
        &mut self,
        request: impl tonic::IntoRequest<GetApiKeyRequest>,
    ) -> std::result::Result<tonic::Response<ApiKeyResponse>, tonic::Status> {
        self.ready().await?;
        let codec = tonic::codec::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/mortar.Mortar/GetAPIKey");
        let mut req = request.into_request();
        req.extensions_mut().insert(GrpcMethod::new(SERVICE, "GetAPIKey"));
        self.inner.unary(req, path, codec).await
    }

    /// Identify which sites meet the requirements of the queries.
    pub async fn qualify(
        &mut self,
        request: impl tonic::IntoRequest<QualifyRequest>,
    ) -> std::result::Result<tonic::Response<QualifyResponse>, tonic::Status> {
        self.ready().await?;
        let codec = tonic::codec::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/mortar.Mortar/Qualify");
        let mut req = request.into_request();
        req.extensions_mut().insert(GrpcMethod::new(SERVICE, "Qualify"));
        self.inner.unary(req, path, codec).await
    }

    /// Pull data from Mortar as a stream of records.
    pub async fn fetch(
        &mut self,
        request: impl tonic::IntoRequest<FetchRequest>,
    ) -> std::result::Result<
        tonic::Response<tonic::codec::Streaming<FetchResponse>>,
        tonic::Status,
    > {
        self.ready().await?;
        let codec = tonic::codec::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/mortar.Mortar/Fetch");
        let mut req = request.into_request();
        req.extensions_mut().insert(GrpcMethod::new(SERVICE, "Fetch"));
        self.inner.server_streaming(req, path, codec).await
    }

    async fn ready(&mut self) -> std::result::Result<(), tonic::Status> {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::new(
                tonic::Code::Unknown,
                format!("Service was not ready: {}", e.into()),
            )
        })
    }
}
