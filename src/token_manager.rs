use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, warn};

use crate::authenticator::{AuthRequest, AuthenticateError, Authenticator, Password};
use crate::credential::{AccessToken, Credential};
use crate::credential_store::{CredentialStore, CredentialStoreError};
use crate::TokenRetriever;

#[derive(Error, Debug)]
pub enum TokenManagerError {
    #[error("fetching access token: `{0}`")]
    Authenticate(#[from] AuthenticateError),
    #[error("token refresh cancelled")]
    Cancelled,
    #[error("acquiring cache mutex lock")]
    PoisonError,
}

/// Shared flag telling an in-progress or upcoming refresh to stop.
///
/// Clones observe the same flag, so one handle can be kept by whoever drives shutdown.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where a returned token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Loaded from the credential store.
    Store,
    /// Held in memory after a refresh whose result could not be stored.
    Memory,
    /// Obtained from the authentication endpoint during this call.
    Refreshed,
}

/// A token safe to use right now.
#[derive(Debug)]
pub struct ValidToken {
    pub access_token: AccessToken,
    pub source: TokenSource,
    /// Set when a refreshed token could not be persisted. The token itself is still valid.
    pub persist_error: Option<CredentialStoreError>,
}

impl ValidToken {
    fn new(access_token: AccessToken, source: TokenSource) -> Self {
        Self {
            access_token,
            source,
            persist_error: None,
        }
    }
}

/// Hands out a fresh bearer token, authenticating only when the stored one is missing or stale.
///
/// There is a single token slot: the manager is bound to one username/password pair. Refreshes
/// are serialized, so concurrent callers facing a stale token share one authentication.
pub struct TokenManager<A, S>
where
    A: Authenticator,
    S: CredentialStore,
{
    auth_request: AuthRequest,
    authenticator: A,
    store: S,
    cached: Mutex<Option<Credential>>,
    cancellation: Cancellation,
}

impl<A, S> fmt::Debug for TokenManager<A, S>
where
    A: Authenticator,
    S: CredentialStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("auth_request", &self.auth_request)
            .field("cancellation", &self.cancellation)
            .finish_non_exhaustive()
    }
}

impl<A, S> TokenRetriever for TokenManager<A, S>
where
    A: Authenticator,
    S: CredentialStore,
{
    fn retrieve(&self) -> Result<ValidToken, TokenManagerError> {
        self.get_valid_token()
    }
}

impl<A, S> TokenManager<A, S>
where
    A: Authenticator,
    S: CredentialStore,
{
    pub fn new(username: impl Into<String>, password: Password, authenticator: A, store: S) -> Self {
        Self {
            auth_request: AuthRequest::login(username, password),
            authenticator,
            store,
            cached: Mutex::new(None),
            cancellation: Cancellation::default(),
        }
    }

    pub fn with_cancellation(self, cancellation: Cancellation) -> Self {
        Self {
            cancellation,
            ..self
        }
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    pub fn get_valid_token(&self) -> Result<ValidToken, TokenManagerError> {
        // Held for the whole call: it is what coalesces concurrent refreshes.
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| TokenManagerError::PoisonError)?;

        match self.store.load() {
            Ok(Some(stored)) if stored.is_fresh() => {
                debug!("using stored authorization token");
                let access_token = stored.access_token().to_owned();
                *cached = Some(stored);
                return Ok(ValidToken::new(access_token, TokenSource::Store));
            }
            Ok(Some(stored)) => {
                debug!(
                    age_secs = stored.age().num_seconds(),
                    "stored authorization token is stale"
                );
            }
            Ok(None) => debug!("no stored authorization token"),
            Err(e) => warn!("reading stored authorization token, refreshing instead: {e}"),
        }

        if let Some(in_memory) = cached.as_ref().filter(|c| c.is_fresh()) {
            debug!("using in-memory authorization token");
            return Ok(ValidToken::new(
                in_memory.access_token().to_owned(),
                TokenSource::Memory,
            ));
        }

        let credential = self.refresh_token()?;
        debug!("authorization token refreshed");

        let persist_error = self
            .store
            .save(&credential)
            .inspect_err(|e| warn!("storing refreshed authorization token: {e}"))
            .err();

        let access_token = credential.access_token().to_owned();
        *cached = Some(credential);

        Ok(ValidToken {
            access_token,
            source: TokenSource::Refreshed,
            persist_error,
        })
    }

    fn refresh_token(&self) -> Result<Credential, TokenManagerError> {
        if self.cancellation.is_cancelled() {
            debug!("not refreshing authorization token, cancelled");
            return Err(TokenManagerError::Cancelled);
        }

        let credential = self
            .authenticator
            .authenticate(&self.auth_request)
            .inspect_err(|e| debug!("error refreshing token: {e}"))?;

        // Results arriving after cancellation are dropped so nothing is stored.
        if self.cancellation.is_cancelled() {
            debug!("discarding authorization token obtained after cancellation");
            return Err(TokenManagerError::Cancelled);
        }

        Ok(credential)
    }
}
