use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use lib_mortar::{ClientConfig, ClientConfigBuilder};

/// Connection options shared by the Mortar tools. Anything left unset falls
/// back to the `MORTAR_*` environment variables, then to built-in defaults.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Mortar API address as host:port.
    #[arg(long, value_name = "HOST:PORT")]
    pub address: Option<String>,

    #[arg(long, short)]
    pub username: Option<String>,

    #[arg(long, short)]
    pub password: Option<String>,

    /// Connect without TLS.
    #[arg(long)]
    pub insecure: bool,

    /// JSON file with connection settings (address, username, password, ...).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn resolve(&self) -> anyhow::Result<ClientConfig> {
        // .env values become environment, which explicit flags override.
        dotenvy::dotenv().ok();

        let mut builder = ClientConfigBuilder::default();
        if let Some(address) = &self.address {
            builder = builder.address(address);
        }
        if let Some(username) = &self.username {
            builder = builder.username(username);
        }
        if let Some(password) = &self.password {
            builder = builder.password(password);
        }
        if self.insecure {
            builder = builder.disable_tls(true);
        }
        if let Some(path) = &self.config {
            let file = ClientConfigBuilder::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            builder = builder.or(file);
        }

        Ok(builder.resolve()?)
    }
}
