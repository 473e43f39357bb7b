use http::{Request, Response};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HttpClientError {
    /// Represents an http transport crate error.
    #[error("HTTP Transport error: `{0}`")]
    TransportError(String),
    /// The request did not complete within the configured timeout.
    #[error("request timed out: `{0}`")]
    Timeout(String),
    /// Represents an unexpected response.
    #[error("invalid http response: `{0}`")]
    InvalidResponse(String),
}

/// A synchronous trait that defines the internal methods for HTTP clients.
pub trait HttpClient {
    /// A synchronous function sends a request. The method and url are defined inside the Request.
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError>;
}

// Accept closures as HttpClient implementations
impl<F> HttpClient for F
where
    F: Fn(Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError>,
{
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError> {
        self(req)
    }
}
