use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use http::Uri;

use crate::authenticator::{DEFAULT_AUTH_ENDPOINT, Password};
use crate::config::SmartControlConfig;
use crate::credential_store::DEFAULT_TOKEN_FILE;
use crate::http::config::HttpConfig;
use crate::telemetry::DEFAULT_API_ENDPOINT;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Prints a valid access token, logging in only if the cached one is stale.
    Token,
    /// Prints the latest power sample in watts.
    Power,
    /// Prints the cumulative consumption in kWh.
    Energy,
    /// Prints power and then energy (default).
    Read,
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// Only the values, one per line
    #[value(name = "plain")]
    Plain,
    /// A JSON document
    #[value(name = "json")]
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Smart Control account name
    #[arg(long, short, env = "SMART_CONTROL_USERNAME")]
    pub username: String,

    /// Account password. Prompted for when absent.
    #[arg(long, short, env = "SMART_CONTROL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// File caching the access token between runs
    #[arg(long, env = "SMART_CONTROL_TOKEN_FILE", default_value = DEFAULT_TOKEN_FILE)]
    pub token_file: PathBuf,

    /// Login endpoint
    #[arg(long, default_value = DEFAULT_AUTH_ENDPOINT)]
    pub auth_endpoint: Uri,

    /// Metering API base url
    #[arg(long, default_value = DEFAULT_API_ENDPOINT)]
    pub api_endpoint: Uri,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub timeout_secs: u64,
}

impl ConnectionArgs {
    /// Builds the client configuration, using `password` when none was given on the command line.
    pub fn into_config(self, password: Password) -> SmartControlConfig {
        let timeout = std::time::Duration::from_secs(self.timeout_secs);
        SmartControlConfig::new(self.username, password)
            .with_token_file(self.token_file)
            .with_endpoints(self.auth_endpoint, self.api_endpoint)
            .with_http_config(HttpConfig::new(timeout, timeout))
    }
}
