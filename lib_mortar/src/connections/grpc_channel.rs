//! Builds the HTTP/2 channel to the Mortar API from a [`ClientConfig`].

use std::fs;
use std::time::Duration;

use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tracing::{info, warn};

use crate::configs::config_client::ClientConfig;
use crate::error::{MortarError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Creates a lazily connecting channel. Must be called from within a Tokio
/// runtime. Connection failures surface on the first call, not here.
pub fn connect_lazy(config: &ClientConfig) -> Result<Channel> {
    let uri = config.endpoint_uri();
    let mut endpoint = Endpoint::from_shared(uri.clone())
        .map_err(|e| MortarError::Channel(format!("invalid address {:?}: {}", uri, e)))?
        .connect_timeout(CONNECT_TIMEOUT)
        .http2_keep_alive_interval(KEEPALIVE_INTERVAL)
        .keep_alive_while_idle(true);

    if config.disable_tls {
        warn!(address = %config.address, "TLS disabled; credentials travel in plaintext");
    } else {
        let mut tls = ClientTlsConfig::new().with_native_roots();
        if let Some(path) = &config.ca_cert {
            let pem = fs::read(path).map_err(|e| {
                MortarError::Channel(format!("cannot read CA certificate {}: {}", path.display(), e))
            })?;
            tls = tls.ca_certificate(Certificate::from_pem(pem));
        }
        endpoint = endpoint
            .tls_config(tls)
            .map_err(|e| MortarError::Channel(format!("TLS configuration rejected: {}", e)))?;
    }

    info!(endpoint = %uri, "Mortar channel configured");
    Ok(endpoint.connect_lazy())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plaintext_config(address: &str) -> ClientConfig {
        ClientConfig::builder()
            .address(address)
            .disable_tls(true)
            .resolve_with(|_| None)
            .unwrap()
    }

    #[tokio::test]
    async fn lazy_channel_does_not_dial() {
        // Port 9 (discard) is never dialled because the channel is lazy.
        connect_lazy(&plaintext_config("127.0.0.1:9")).unwrap();
    }

    #[tokio::test]
    async fn malformed_address_is_a_channel_error() {
        let err = connect_lazy(&plaintext_config("not a uri")).unwrap_err();
        assert!(matches!(err, MortarError::Channel(_)));
    }

    #[tokio::test]
    async fn missing_ca_certificate_is_reported() {
        let mut cfg = plaintext_config("localhost:9001");
        cfg.disable_tls = false;
        cfg.ca_cert = Some("/nonexistent/ca.pem".into());
        let err = connect_lazy(&cfg).unwrap_err();
        assert!(err.to_string().contains("CA certificate"));
    }
}
