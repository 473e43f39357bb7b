use std::fmt;

use chrono::{DateTime, Utc};
use http::header::{ACCEPT, AUTHORIZATION};
use http::{HeaderValue, Request, Response, Uri};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::http_client::{HttpClient, HttpClientError};

pub const DEFAULT_API_ENDPOINT: &str = "https://api.n2g-iona.net";

const METER_INFO_PATH: &str = "/v2/meter/info";
const CONSUMPTION_POINTER: &str = "/data/Electricity/CSD";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelemetryError {
    #[error("http transport error: `{0}`")]
    Transport(String),
    #[error("request timed out: `{0}`")]
    Timeout(String),
    #[error("error decoding the response payload: `{0}`")]
    Decode(String),
    #[error("error building the request: `{0}`")]
    Encode(String),
    #[error("power series is empty")]
    EmptySeries,
    #[error("missing field in response: `{0}`")]
    MissingField(String),
    #[error("access token is empty")]
    EmptyToken,
}

impl From<HttpClientError> for TelemetryError {
    fn from(err: HttpClientError) -> Self {
        match err {
            HttpClientError::Timeout(msg) => TelemetryError::Timeout(msg),
            HttpClientError::TransportError(msg) | HttpClientError::InvalidResponse(msg) => {
                TelemetryError::Transport(msg)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PowerResponse {
    data: PowerData,
}

#[derive(Debug, Deserialize)]
struct PowerData {
    results: Vec<PowerSample>,
}

#[derive(Debug, Deserialize)]
struct PowerSample {
    power: f64,
}

/// Reads power and energy from the metering API with an already valid bearer token.
pub struct TelemetryClient<C>
where
    C: HttpClient,
{
    http_client: C,
    api_endpoint: String,
}

impl<C> fmt::Debug for TelemetryClient<C>
where
    C: HttpClient,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryClient")
            .field("api_endpoint", &self.api_endpoint)
            .field("http_client", &"impl HttpClient")
            .finish()
    }
}

impl<C> TelemetryClient<C>
where
    C: HttpClient,
{
    pub fn new(http_client: C, api_endpoint: &Uri) -> Self {
        Self {
            http_client,
            api_endpoint: api_endpoint.to_string().trim_end_matches('/').to_string(),
        }
    }

    /// Most recent power sample, in watts, of today's series.
    pub fn power(&self, token: &str) -> Result<f64, TelemetryError> {
        self.power_at(token, Utc::now())
    }

    /// Cumulative consumption in whole kWh.
    pub fn energy(&self, token: &str) -> Result<i64, TelemetryError> {
        let request = self.build_request(METER_INFO_PATH, token)?;
        let body = self.fetch(request)?;

        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| TelemetryError::Decode(format!("Failed to decode meter info: {e}")))?;
        let raw = value
            .pointer(CONSUMPTION_POINTER)
            .ok_or_else(|| TelemetryError::MissingField("data.Electricity.CSD".to_string()))?;

        let wh = whole_watt_hours(raw)?;
        debug!(wh, "meter consumption read");
        Ok(wh_to_kwh(wh))
    }

    pub(crate) fn power_at(&self, token: &str, now: DateTime<Utc>) -> Result<f64, TelemetryError> {
        let request = self.build_request(&power_window_path(now), token)?;
        let body = self.fetch(request)?;

        let response: PowerResponse = serde_json::from_slice(&body)
            .map_err(|e| TelemetryError::Decode(format!("Failed to decode power series: {e}")))?;

        let sample = response
            .data
            .results
            .last()
            .ok_or(TelemetryError::EmptySeries)?;
        debug!(
            samples = response.data.results.len(),
            watts = sample.power,
            "power series read"
        );
        Ok(sample.power)
    }

    fn build_request(&self, path: &str, token: &str) -> Result<Request<Vec<u8>>, TelemetryError> {
        if token.trim().is_empty() {
            return Err(TelemetryError::EmptyToken);
        }

        let uri: Uri = format!("{}{path}", self.api_endpoint)
            .parse()
            .map_err(|e| TelemetryError::Encode(format!("invalid request uri: {e}")))?;

        let mut bearer_token_header = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| {
                TelemetryError::Encode("invalid HTTP header value set for Authorization".into())
            })?;
        bearer_token_header.set_sensitive(true);

        Request::builder()
            .uri(uri)
            .method("GET")
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, bearer_token_header)
            .body(Vec::new())
            .map_err(|e| TelemetryError::Encode(format!("Failed to build request: {e}")))
    }

    fn fetch(&self, request: Request<Vec<u8>>) -> Result<Vec<u8>, TelemetryError> {
        let response: Response<Vec<u8>> = self.http_client.send(request)?;

        if !response.status().is_success() {
            return Err(TelemetryError::Transport(format!(
                "Unsuccessful HTTP response: {}. Body: {}",
                response.status(),
                String::from_utf8_lossy(response.body())
            )));
        }

        Ok(response.into_body())
    }
}

/// Path requesting the power series from midnight UTC until `now`, millisecond precision.
pub(crate) fn power_window_path(now: DateTime<Utc>) -> String {
    format!(
        "/v2/power/{}T00:00:00.000Z/{}Z",
        now.format("%Y-%m-%d"),
        now.format("%Y-%m-%dT%H:%M:%S%.3f")
    )
}

/// The counter arrives as a numeric string or a number; any fraction is dropped.
///
/// Integers are taken exactly. Only fractional input goes through `f64`.
fn whole_watt_hours(raw: &Value) -> Result<u64, TelemetryError> {
    let wh = match raw {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(wh) = s.parse::<u64>() {
                return Ok(wh);
            }
            s.parse::<f64>()
                .map_err(|e| TelemetryError::Decode(format!("non numeric consumption `{s}`: {e}")))?
        }
        Value::Number(n) => {
            if let Some(wh) = n.as_u64() {
                return Ok(wh);
            }
            n.as_f64()
                .ok_or_else(|| TelemetryError::Decode(format!("non numeric consumption `{n}`")))?
        }
        other => {
            return Err(TelemetryError::Decode(format!(
                "unexpected consumption value `{other}`"
            )));
        }
    };

    if !wh.is_finite() || wh < 0.0 {
        return Err(TelemetryError::Decode(format!(
            "consumption out of range `{wh}`"
        )));
    }

    Ok(wh.trunc() as u64)
}

/// Wh to kWh, rounding half to even: 500 is 0 kWh, 1500 is 2 kWh, 2500 is 2 kWh.
pub(crate) fn wh_to_kwh(wh: u64) -> i64 {
    let (q, r) = (wh / 1000, wh % 1000);
    let kwh = q + u64::from(r > 500 || (r == 500 && q % 2 == 1));
    i64::try_from(kwh).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;
    use crate::http_client::tests::{MockHttpClient, response};

    fn client(http_client: MockHttpClient) -> TelemetryClient<MockHttpClient> {
        TelemetryClient::new(http_client, &DEFAULT_API_ENDPOINT.parse().unwrap())
    }

    fn client_answering(status: u16, body: &'static str) -> TelemetryClient<MockHttpClient> {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .returning(move |_| Ok(response(status, body)));
        client(http_client)
    }

    #[rstest]
    #[case::midday(
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 34, 56).unwrap() + chrono::TimeDelta::milliseconds(789),
        "/v2/power/2024-03-09T00:00:00.000Z/2024-03-09T12:34:56.789Z"
    )]
    #[case::midnight(
        Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap(),
        "/v2/power/2024-12-31T00:00:00.000Z/2024-12-31T00:00:00.000Z"
    )]
    fn power_window(#[case] now: DateTime<Utc>, #[case] expected: &str) {
        assert_eq!(power_window_path(now), expected);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(499, 0)]
    #[case(500, 0)]
    #[case(501, 1)]
    #[case(1499, 1)]
    #[case(1500, 2)]
    #[case(2500, 2)]
    #[case(3500, 4)]
    #[case(123_456_789, 123_457)]
    #[case(u64::MAX, 18_446_744_073_709_552)]
    fn energy_rounding(#[case] wh: u64, #[case] kwh: i64) {
        assert_eq!(wh_to_kwh(wh), kwh);
    }

    #[test]
    fn power_request_is_authorized_and_windowed() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 1).unwrap();
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .withf(|req| {
                req.method() == http::Method::GET
                    && req.uri()
                        == "https://api.n2g-iona.net/v2/power/2024-03-09T00:00:00.000Z/2024-03-09T08:00:01.000Z"
                    && req.headers().get(AUTHORIZATION).unwrap() == "Bearer tkn"
                    && req.headers().get(AUTHORIZATION).unwrap().is_sensitive()
                    && req.headers().get(ACCEPT).unwrap() == "application/json"
            })
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"data":{"results":[{"power":10.5,"time":"a"},{"power":321,"time":"b"}]}}"#,
                ))
            });

        let watts = client(http_client).power_at("tkn", now).unwrap();

        assert_eq!(watts, 321.0);
    }

    #[test]
    fn empty_power_series() {
        let result = client_answering(200, r#"{"data":{"results":[]}}"#).power("tkn");
        assert_eq!(result, Err(TelemetryError::EmptySeries));
    }

    #[test]
    fn malformed_power_response() {
        let result = client_answering(200, "<html>").power("tkn");
        assert_matches!(result, Err(TelemetryError::Decode(_)));
    }

    #[test]
    fn power_unsuccessful_response() {
        let result = client_answering(401, "unauthorized").power("tkn");
        assert_matches!(result, Err(TelemetryError::Transport(msg)) => {
            assert!(msg.contains("401"));
        });
    }

    #[test]
    fn power_timeout() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .returning(|_| Err(HttpClientError::Timeout("operation timed out".into())));

        let result = client(http_client).power("tkn");

        assert_matches!(result, Err(TelemetryError::Timeout(_)));
    }

    #[test]
    fn empty_token_is_rejected_before_sending() {
        let mut http_client = MockHttpClient::new();
        http_client.expect_send().never();
        let client = client(http_client);

        assert_eq!(client.power(""), Err(TelemetryError::EmptyToken));
        assert_eq!(client.energy("  "), Err(TelemetryError::EmptyToken));
    }

    #[test]
    fn energy_request_targets_meter_info() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .withf(|req| {
                req.uri() == "https://api.n2g-iona.net/v2/meter/info"
                    && req.headers().get(AUTHORIZATION).unwrap() == "Bearer tkn"
            })
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"data":{"Electricity":{"CSD":"1500","SD":"0"}}}"#,
                ))
            });

        assert_eq!(client(http_client).energy("tkn"), Ok(2));
    }

    #[rstest]
    #[case::string(r#"{"data":{"Electricity":{"CSD":"1499"}}}"#, 1)]
    #[case::fractional_string(r#"{"data":{"Electricity":{"CSD":"1499.9"}}}"#, 1)]
    #[case::number(r#"{"data":{"Electricity":{"CSD":2500}}}"#, 2)]
    #[case::fractional_number(r#"{"data":{"Electricity":{"CSD":1999.99}}}"#, 2)]
    #[case::beyond_f64_precision_string(
        r#"{"data":{"Electricity":{"CSD":"9007199254742501"}}}"#,
        9_007_199_254_743
    )]
    #[case::beyond_f64_precision_number(
        r#"{"data":{"Electricity":{"CSD":18446744073709551115}}}"#,
        18_446_744_073_709_551
    )]
    fn energy_values(#[case] body: &'static str, #[case] kwh: i64) {
        assert_eq!(client_answering(200, body).energy("tkn"), Ok(kwh));
    }

    #[rstest]
    #[case::no_data(r#"{"status":"ok"}"#)]
    #[case::no_electricity(r#"{"data":{"Gas":{"CSD":"1"}}}"#)]
    #[case::no_csd(r#"{"data":{"Electricity":{}}}"#)]
    fn energy_missing_field(#[case] body: &'static str) {
        assert_eq!(
            client_answering(200, body).energy("tkn"),
            Err(TelemetryError::MissingField("data.Electricity.CSD".into()))
        );
    }

    #[rstest]
    #[case::not_json("not json")]
    #[case::not_numeric(r#"{"data":{"Electricity":{"CSD":"abc"}}}"#)]
    #[case::null(r#"{"data":{"Electricity":{"CSD":null}}}"#)]
    #[case::negative(r#"{"data":{"Electricity":{"CSD":"-10"}}}"#)]
    fn energy_decode_errors(#[case] body: &'static str) {
        assert_matches!(
            client_answering(200, body).energy("tkn"),
            Err(TelemetryError::Decode(_))
        );
    }

    #[test]
    fn energy_unsuccessful_response() {
        let result = client_answering(503, "maintenance").energy("tkn");
        assert_matches!(result, Err(TelemetryError::Transport(_)));
    }

    #[test]
    fn trailing_slash_in_endpoint_is_ignored() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .withf(|req| req.uri() == "https://meter.example.com/api/v2/meter/info")
            .returning(|_| Ok(response(200, r#"{"data":{"Electricity":{"CSD":"0"}}}"#)));

        let client = TelemetryClient::new(
            http_client,
            &"https://meter.example.com/api/".parse().unwrap(),
        );

        assert_eq!(client.energy("tkn"), Ok(0));
    }
}
