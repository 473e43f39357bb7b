use std::path::PathBuf;

use http::Uri;

use crate::authenticator::{DEFAULT_AUTH_ENDPOINT, Password};
use crate::credential_store::DEFAULT_TOKEN_FILE;
use crate::http::config::HttpConfig;
use crate::telemetry::DEFAULT_API_ENDPOINT;

/// Everything the client needs from its host: the login pair, where to keep the token and
/// which endpoints to talk to.
#[derive(Debug, Clone)]
pub struct SmartControlConfig {
    pub username: String,
    pub password: Password,
    pub token_file: PathBuf,
    pub auth_endpoint: Uri,
    pub api_endpoint: Uri,
    pub http: HttpConfig,
}

impl SmartControlConfig {
    pub fn new(username: impl Into<String>, password: Password) -> Self {
        Self {
            username: username.into(),
            password,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            auth_endpoint: Uri::from_static(DEFAULT_AUTH_ENDPOINT),
            api_endpoint: Uri::from_static(DEFAULT_API_ENDPOINT),
            http: HttpConfig::default(),
        }
    }

    pub fn with_token_file(self, token_file: impl Into<PathBuf>) -> Self {
        Self {
            token_file: token_file.into(),
            ..self
        }
    }

    pub fn with_endpoints(self, auth_endpoint: Uri, api_endpoint: Uri) -> Self {
        Self {
            auth_endpoint,
            api_endpoint,
            ..self
        }
    }

    pub fn with_http_config(self, http: HttpConfig) -> Self {
        Self { http, ..self }
    }
}
