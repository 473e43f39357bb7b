use crate::http::config::HttpConfig;
use crate::http_client::{HttpClient as SmartControlHttpClient, HttpClientError};
use http::{Request, Response};
use reqwest::blocking::{Client, Response as BlockingResponse};
use reqwest::redirect::Policy;

/// Blocking reqwest implementation of the crate's [`SmartControlHttpClient`] seam.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self, HttpBuildError> {
        let redirect_policy = if config.follow_redirects {
            Policy::default()
        } else {
            Policy::none()
        };

        let builder = Client::builder()
            .use_rustls_tls()
            .tls_built_in_native_certs(true)
            .redirect(redirect_policy)
            .timeout(config.timeout)
            .connect_timeout(config.conn_timeout);

        let client = builder
            .build()
            .map_err(|err| HttpBuildError::ClientBuilder(err.to_string()))?;

        Ok(Self { client })
    }

    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpResponseError> {
        let req = self
            .client
            .request(request.method().into(), request.uri().to_string().as_str())
            .headers(request.headers().clone())
            .body(request.body().to_vec());

        let res = req.send().map_err(HttpResponseError::from_transport)?;

        try_build_response(res)
    }
}

fn try_build_response(res: BlockingResponse) -> Result<Response<Vec<u8>>, HttpResponseError> {
    let status = res.status();
    let version = res.version();

    let body: Vec<u8> = res
        .bytes()
        .map_err(|err| {
            if err.is_timeout() {
                HttpResponseError::Timeout(err.to_string())
            } else {
                HttpResponseError::ReadingResponse(err.to_string())
            }
        })?
        .into();

    http::Response::builder()
        .status(status)
        .version(version)
        .body(body)
        .map_err(|err| HttpResponseError::BuildingResponse(err.to_string()))
}

impl SmartControlHttpClient for HttpClient {
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError> {
        let response = self.send(req)?;

        Ok(response)
    }
}

impl From<HttpResponseError> for HttpClientError {
    fn from(err: HttpResponseError) -> Self {
        match err {
            HttpResponseError::TransportError(msg) => HttpClientError::TransportError(msg),
            HttpResponseError::Timeout(msg) => HttpClientError::Timeout(msg),
            HttpResponseError::BuildingResponse(msg) | HttpResponseError::ReadingResponse(msg) => {
                HttpClientError::InvalidResponse(msg)
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HttpBuildError {
    #[error("could not build the http client: {0}")]
    ClientBuilder(String),
}

#[derive(thiserror::Error, Debug)]
enum HttpResponseError {
    #[error("could read response body: {0}")]
    ReadingResponse(String),
    #[error("could build response: {0}")]
    BuildingResponse(String),
    #[error("http transport error: `{0}`")]
    TransportError(String),
    #[error("timed out: `{0}`")]
    Timeout(String),
}

impl HttpResponseError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpResponseError::Timeout(err.to_string())
        } else {
            HttpResponseError::TransportError(err.to_string())
        }
    }
}
