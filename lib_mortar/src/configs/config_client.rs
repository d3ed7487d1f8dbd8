//! # Client Configuration
//!
//! Resolves the settings needed to reach the Mortar API. Every field follows
//! the same precedence: a value set explicitly on the builder (or loaded from a
//! JSON file) wins over the environment, which wins over the built-in default.

use std::path::{Path, PathBuf};
use std::{env, fmt, fs};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default Mortar API endpoint.
pub const DEFAULT_ADDRESS: &str = "corbusier.cs.berkeley.edu:9001";
/// Default location of the persisted credential token.
pub const DEFAULT_TOKEN_FILE: &str = ".mortartoken.json";

pub const ENV_ADDRESS: &str = "MORTAR_API_ADDRESS";
pub const ENV_USERNAME: &str = "MORTAR_API_USERNAME";
pub const ENV_PASSWORD: &str = "MORTAR_API_PASSWORD";
pub const ENV_DISABLE_TLS: &str = "MORTAR_DISABLE_TLS";
pub const ENV_CA_CERT: &str = "MORTAR_CA_CERT";
pub const ENV_TOKEN_FILE: &str = "MORTAR_TOKEN_FILE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config file {path}: {source}")]
    JsonError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Environment variable {name} is not a boolean: {value:?}")]
    InvalidBool { name: String, value: String },
}

/// Fully resolved client settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `host:port` of the Mortar API.
    pub address: String,
    pub username: String,
    pub password: String,
    /// Connect over plaintext HTTP/2 instead of TLS.
    pub disable_tls: bool,
    /// Optional PEM bundle of trusted roots, used in addition to the native store.
    pub ca_cert: Option<PathBuf>,
    /// Where the credential token is persisted between runs.
    pub token_file: PathBuf,
}

impl ClientConfig {
    /// Starts a builder with nothing set explicitly.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Resolves every field from the environment and defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        ClientConfigBuilder::default().resolve()
    }

    /// Key under which the session token is persisted.
    pub fn instance_key(&self) -> String {
        format!("{}@{}", self.username, self.address)
    }

    /// The URI handed to the gRPC endpoint, scheme chosen by the TLS setting.
    pub fn endpoint_uri(&self) -> String {
        if self.address.starts_with("http://") || self.address.starts_with("https://") {
            return self.address.clone();
        }
        let scheme = if self.disable_tls { "http" } else { "https" };
        format!("{}://{}", scheme, self.address)
    }
}

// The password is never printed.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("disable_tls", &self.disable_tls)
            .field("ca_cert", &self.ca_cert)
            .field("token_file", &self.token_file)
            .finish()
    }
}

impl fmt::Display for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClientConfig
    Address: {},
    Username: {},
    TLS: {},
    CA cert: {:?},
    Token file: {}
",
            self.address,
            self.username,
            if self.disable_tls { "disabled" } else { "enabled" },
            self.ca_cert,
            self.token_file.display()
        )
    }
}

/// Explicitly provided settings. Unset fields fall back to the environment,
/// then to defaults, when [`ClientConfigBuilder::resolve`] runs.
#[derive(Default, Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ClientConfigBuilder {
    pub address: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub disable_tls: Option<bool>,
    pub ca_cert: Option<PathBuf>,
    pub token_file: Option<PathBuf>,
}

impl ClientConfigBuilder {
    /// Loads explicit settings from a JSON file. Keys match the field names.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::JsonError {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn disable_tls(mut self, disable: bool) -> Self {
        self.disable_tls = Some(disable);
        self
    }

    pub fn ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    pub fn token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    /// Fills unset fields from explicit values in `other`. Values already set
    /// on `self` are kept.
    pub fn or(mut self, other: ClientConfigBuilder) -> Self {
        self.address = self.address.or(other.address);
        self.username = self.username.or(other.username);
        self.password = self.password.or(other.password);
        self.disable_tls = self.disable_tls.or(other.disable_tls);
        self.ca_cert = self.ca_cert.or(other.ca_cert);
        self.token_file = self.token_file.or(other.token_file);
        self
    }

    /// Resolves against the process environment.
    pub fn resolve(self) -> Result<ClientConfig, ConfigError> {
        self.resolve_with(|name| env::var(name).ok())
    }

    /// Resolves against an arbitrary variable lookup.
    pub fn resolve_with<F>(self, lookup: F) -> Result<ClientConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let disable_tls = match self.disable_tls {
            Some(flag) => flag,
            None => match lookup(ENV_DISABLE_TLS) {
                Some(raw) => parse_bool(ENV_DISABLE_TLS, &raw)?,
                None => false,
            },
        };

        Ok(ClientConfig {
            address: self
                .address
                .or_else(|| lookup(ENV_ADDRESS))
                .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            username: self
                .username
                .or_else(|| lookup(ENV_USERNAME))
                .unwrap_or_default(),
            password: self
                .password
                .or_else(|| lookup(ENV_PASSWORD))
                .unwrap_or_default(),
            disable_tls,
            ca_cert: self.ca_cert.or_else(|| lookup(ENV_CA_CERT).map(PathBuf::from)),
            token_file: self
                .token_file
                .or_else(|| lookup(ENV_TOKEN_FILE).map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE)),
        })
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}
