use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::warn;

use crate::authenticator::HttpAuthenticator;
use crate::config::SmartControlConfig;
use crate::credential_store::{CredentialStoreError, FileCredentialStore};
use crate::http::client::{HttpBuildError, HttpClient};
use crate::http_client::HttpClient as SmartControlHttpClient;
use crate::telemetry::{TelemetryClient, TelemetryError};
use crate::token_manager::{Cancellation, TokenManager, TokenManagerError, ValidToken};
use crate::TokenRetriever;

#[derive(Error, Debug)]
pub enum SmartControlError {
    #[error("could not get an access token: `{0}`")]
    Token(#[from] TokenManagerError),
    #[error("could not read telemetry: `{0}`")]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    HttpBuild(#[from] HttpBuildError),
}

/// Token manager wired to the real login endpoint and a token file.
pub type HttpTokenManager = TokenManager<HttpAuthenticator<HttpClient>, FileCredentialStore>;

/// Entry point for the host: a token accessor plus the two telemetry reads.
///
/// Every read asks the token retriever first, so an expired token is refreshed transparently.
/// A refreshed token that could not be written to the store is still used for the read; the
/// store failure is kept and handed out once by [`SmartControl::take_persist_warning`].
#[derive(Debug)]
pub struct SmartControl<T, C>
where
    T: TokenRetriever,
    C: SmartControlHttpClient,
{
    token_retriever: T,
    telemetry: TelemetryClient<C>,
    persist_warning: Mutex<Option<CredentialStoreError>>,
}

impl SmartControl<HttpTokenManager, HttpClient> {
    pub fn try_from_config(config: SmartControlConfig) -> Result<Self, SmartControlError> {
        let http_client = HttpClient::new(config.http.clone())?;

        let authenticator = HttpAuthenticator::new(http_client.clone(), config.auth_endpoint);
        let store = FileCredentialStore::new(config.token_file);
        let token_manager =
            TokenManager::new(config.username, config.password, authenticator, store);

        let telemetry = TelemetryClient::new(http_client, &config.api_endpoint);

        Ok(Self::new(token_manager, telemetry))
    }

    /// Handle that stops further token refreshes, e.g. on shutdown.
    pub fn cancellation(&self) -> Cancellation {
        self.token_retriever.cancellation().clone()
    }
}

impl<T, C> SmartControl<T, C>
where
    T: TokenRetriever,
    C: SmartControlHttpClient,
{
    pub fn new(token_retriever: T, telemetry: TelemetryClient<C>) -> Self {
        Self {
            token_retriever,
            telemetry,
            persist_warning: Mutex::new(None),
        }
    }

    /// The returned token carries its own `persist_error`, so nothing is kept here.
    pub fn get_access_token(&self) -> Result<ValidToken, SmartControlError> {
        Ok(self.token_retriever.retrieve()?)
    }

    /// Latest power sample in watts.
    pub fn get_power(&self) -> Result<f64, SmartControlError> {
        let token = self.token_for_read()?;
        Ok(self.telemetry.power(&token)?)
    }

    /// Cumulative consumption in kWh.
    pub fn get_energy(&self) -> Result<i64, SmartControlError> {
        let token = self.token_for_read()?;
        Ok(self.telemetry.energy(&token)?)
    }

    /// Store failure from the last refresh done on behalf of a read, if any. Cleared once taken.
    pub fn take_persist_warning(&self) -> Option<CredentialStoreError> {
        self.persist_warning
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn token_for_read(&self) -> Result<String, SmartControlError> {
        let token = self.token_retriever.retrieve()?;
        if let Some(err) = token.persist_error {
            warn!("refreshed token is used but could not be stored: {err}");
            *self
                .persist_warning
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(err);
        }
        Ok(token.access_token)
    }
}
