use std::fmt;

use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Request, Response, Uri};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credential::{AccessToken, Credential};
use crate::http_client::{HttpClient, HttpClientError};

pub const DEFAULT_AUTH_ENDPOINT: &str = "https://smartcontrol.eon.de/auth";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthenticateError {
    #[error("unable to serialize request: `{0}`")]
    Encode(String),
    #[error("unable to deserialize token: `{0}`")]
    Decode(String),
    #[error("authentication server error: Status code: `{0}`, Reason: `{1}`")]
    UnsuccessfulResponse(u16, String),
    #[error("http transport error: `{0}`")]
    Transport(String),
    #[error("authentication timed out: `{0}`")]
    Timeout(String),
    #[error("authentication response carried no access token")]
    MissingToken,
}

impl From<HttpClientError> for AuthenticateError {
    fn from(err: HttpClientError) -> Self {
        match err {
            HttpClientError::Timeout(msg) => AuthenticateError::Timeout(msg),
            HttpClientError::TransportError(msg) | HttpClientError::InvalidResponse(msg) => {
                AuthenticateError::Transport(msg)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Login,
}

/// Secret half of the login pair. Never shown by `Debug`.
#[derive(Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Password(String);

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<hidden>")
    }
}

/// Body of the login request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: Password,
    pub method: AuthMethod,
}

impl AuthRequest {
    pub fn login(username: impl Into<String>, password: Password) -> Self {
        Self {
            username: username.into(),
            password,
            method: AuthMethod::Login,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub access_token: Option<AccessToken>,
}

/// Exchanges a username and password for a bearer token.
pub trait Authenticator {
    fn authenticate(&self, req: &AuthRequest) -> Result<Credential, AuthenticateError>;
}

/// The Authenticator talking to the Smart Control login endpoint.
pub struct HttpAuthenticator<C> {
    http_client: C,
    uri: Uri,
}

impl<C> fmt::Debug for HttpAuthenticator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAuthenticator")
            .field("uri", &self.uri)
            .field("http_client", &"impl HttpClient")
            .finish()
    }
}

impl<C> HttpAuthenticator<C> {
    pub fn new(http_client: C, uri: Uri) -> Self {
        Self { http_client, uri }
    }
}

impl<C> Authenticator for HttpAuthenticator<C>
where
    C: HttpClient,
{
    /// Executes a GET request carrying the `AuthRequest` as JSON body. The endpoint expects
    /// a body on GET, which is unusual but required.
    fn authenticate(&self, req: &AuthRequest) -> Result<Credential, AuthenticateError> {
        let request = build_request(req, &self.uri)?;

        let response = self.http_client.send(request)?;

        evaluate_response(response)
    }
}

fn build_request(req: &AuthRequest, uri: &Uri) -> Result<Request<Vec<u8>>, AuthenticateError> {
    let json_body = serde_json::to_vec(req)
        .map_err(|e| AuthenticateError::Encode(format!("Failed to encode JSON: {e}")))?;

    Request::builder()
        .uri(uri)
        .method("GET")
        .header(ACCEPT, "application/json")
        .header(CONTENT_TYPE, "application/json")
        .body(json_body)
        .map_err(|e| AuthenticateError::Encode(format!("Failed to build request: {e}")))
}

fn evaluate_response(res: Response<Vec<u8>>) -> Result<Credential, AuthenticateError> {
    let body = res.body();

    if !res.status().is_success() {
        return Err(AuthenticateError::UnsuccessfulResponse(
            res.status().as_u16(),
            String::from_utf8_lossy(body).to_string(),
        ));
    }

    let decoded: AuthResponse = serde_json::from_slice(body)
        .map_err(|e| AuthenticateError::Decode(format!("Failed to decode JSON response: {e}")))?;

    match decoded.access_token {
        Some(token) if !token.trim().is_empty() => Ok(Credential::acquired_now(token)),
        _ => Err(AuthenticateError::MissingToken),
    }
}
