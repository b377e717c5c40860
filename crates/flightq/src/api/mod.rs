//! Flight data API client.
//!
//! [`FlightApi`] is the seam the update worker and CLI talk to.
//! [`AviationStackClient`] implements it over HTTP with retries for transient
//! failures and a DNS fallback for the API host.

pub mod dns;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::flight::{FlightNumber, FlightResponse};

use self::dns::FallbackResolver;

/// Errors from the flight data API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request could not be sent or the response not read. The request
    /// URL is stripped since its query carries the access key.
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The API answered with a non-success HTTP status.
    #[error("API returned HTTP {code}")]
    Status {
        /// The HTTP status code.
        code: u16,
    },

    /// The API answered with an error object.
    #[error("API error {code}: {message}")]
    Remote {
        /// Error code reported by the API.
        code: String,
        /// Error message reported by the API.
        message: String,
    },

    /// The response body was not a flights payload.
    #[error("failed to decode API response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The API host could not be reached at all.
    #[error("cannot reach {host}")]
    NoConnectivity {
        /// The API host.
        host: String,
    },
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.without_url())
    }
}

/// Result type for API calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Whether the request may succeed if repeated.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Status { code } => matches!(code, 500 | 502 | 503 | 504),
            Self::Remote { .. } | Self::Decode(_) | Self::NoConnectivity { .. } => false,
        }
    }

    /// A message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { code: 401 } => "API access denied. Please check your API key.".into(),
            Self::Status { code: 404 } => {
                "Flight not found. Please check the flight number and try again.".into()
            }
            Self::Status { code: 429 } => "Too many requests. API rate limit exceeded.".into(),
            Self::Status {
                code: 500 | 502 | 503 | 504,
            } => "Server is experiencing issues. Please try again later.".into(),
            Self::Status { code } => format!("Server error ({code}). Please try again later."),
            Self::Transport(e) if e.is_timeout() => {
                "Connection timed out. The server might be overloaded.".into()
            }
            Self::Transport(e) => format!("Network error: {e}"),
            Self::Remote { message, .. } => message.clone(),
            Self::Decode(_) => "Invalid data received from server. Please try again later.".into(),
            Self::NoConnectivity { host } => format!(
                "Failed to connect to {host}. Please check your internet connection."
            ),
        }
    }
}

/// Source of flight records.
#[async_trait]
pub trait FlightApi: Send + Sync {
    /// Flights operating between two airports.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after retries.
    async fn search_by_route(
        &self,
        departure: &str,
        arrival: &str,
        limit: u32,
    ) -> ApiResult<FlightResponse>;

    /// Records for one flight number.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after retries.
    async fn track_flight(&self, number: &FlightNumber, limit: u32) -> ApiResult<FlightResponse>;
}

/// HTTP client for the aviationstack `/flights` endpoint.
#[derive(Debug, Clone)]
pub struct AviationStackClient {
    client: reqwest::Client,
    flights_url: Url,
    host: String,
    access_key: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl AviationStackClient {
    /// Build a client from the API configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or fallback addresses are invalid, or
    /// the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let base = config.base_url()?;
        let flights_url = base
            .join("flights")
            .map_err(|e| Error::config(format!("invalid base_url: {e}")))?;
        let host = base.host_str().unwrap_or_default().to_string();

        let resolver = FallbackResolver::new(host.clone(), config.fallback_ips()?);
        let timeout = config.request_timeout();
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .dns_resolver(Arc::new(resolver))
            .user_agent(concat!("flightq/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::from)?;

        if config.api.access_key.is_empty() {
            warn!("No API access key configured; requests will be rejected");
        }

        Ok(Self {
            client,
            flights_url,
            host,
            access_key: config.api.access_key.clone(),
            max_retries: config.api.max_retries,
            retry_delay: config.retry_delay(),
        })
    }

    /// Query the flights endpoint, retrying transient failures.
    async fn fetch(&self, query: &[(&str, String)]) -> ApiResult<FlightResponse> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once(query).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt <= self.max_retries => {
                    warn!(
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        "Transient API failure, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(ApiError::Transport(e)) if e.is_connect() => {
                    return Err(ApiError::NoConnectivity {
                        host: self.host.clone(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, query: &[(&str, String)]) -> ApiResult<FlightResponse> {
        let response = self
            .client
            .get(self.flights_url.clone())
            .query(&[("access_key", self.access_key.as_str())])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                code: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let mut parsed: FlightResponse =
            serde_json::from_str(&body).map_err(ApiError::Decode)?;
        if let Some(error) = parsed.error.take() {
            return Err(ApiError::Remote {
                code: error.code.unwrap_or_default(),
                message: error.message.unwrap_or_default(),
            });
        }

        debug!(count = parsed.data.len(), "Fetched flights");
        Ok(parsed)
    }
}

#[async_trait]
impl FlightApi for AviationStackClient {
    async fn search_by_route(
        &self,
        departure: &str,
        arrival: &str,
        limit: u32,
    ) -> ApiResult<FlightResponse> {
        debug!(departure, arrival, limit, "Searching flights by route");
        self.fetch(&[
            ("dep_iata", departure.to_string()),
            ("arr_iata", arrival.to_string()),
            ("limit", limit.to_string()),
        ])
        .await
    }

    async fn track_flight(&self, number: &FlightNumber, limit: u32) -> ApiResult<FlightResponse> {
        let key = match number {
            FlightNumber::Icao(_) => "flight_icao",
            FlightNumber::Iata(_) => "flight_iata",
        };
        debug!(flight = %number, key, limit, "Tracking flight");
        self.fetch(&[(key, number.as_str().to_string()), ("limit", limit.to_string())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const ONE_FLIGHT: &str = r#"{"data": [{"flight": {"icao": "AAL1", "iata": "AA1"}}]}"#;

    /// Serve one canned response per connection and record request lines.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap();
                let request = String::from_utf8_lossy(&buf[..n]);
                let line = request.lines().next().unwrap_or_default().to_string();
                seen.lock().unwrap().push(line);

                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}/v1/"), requests)
    }

    fn client_for(base_url: &str, max_retries: u32) -> AviationStackClient {
        let mut config = Config::default();
        config.api.base_url = base_url.to_string();
        config.api.access_key = "test-key".to_string();
        config.api.max_retries = max_retries;
        config.api.retry_delay_secs = 0;
        AviationStackClient::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn test_search_by_route_sends_query() {
        let (url, requests) = serve(vec![(200, ONE_FLIGHT)]).await;
        let client = client_for(&url, 0);

        let response = client.search_by_route("JFK", "LAX", 100).await.unwrap();
        assert_eq!(response.data[0].flight.icao, "AAL1");

        let line = requests.lock().unwrap()[0].clone();
        assert!(line.starts_with("GET /v1/flights?"));
        assert!(line.contains("access_key=test-key"));
        assert!(line.contains("dep_iata=JFK"));
        assert!(line.contains("arr_iata=LAX"));
        assert!(line.contains("limit=100"));
    }

    #[tokio::test]
    async fn test_track_flight_picks_designator_param() {
        let (url, requests) = serve(vec![(200, ONE_FLIGHT), (200, ONE_FLIGHT)]).await;
        let client = client_for(&url, 0);

        client.track_flight(&FlightNumber::parse("AAL1"), 10).await.unwrap();
        client.track_flight(&FlightNumber::parse("AA1"), 10).await.unwrap();

        let requests = requests.lock().unwrap();
        assert!(requests[0].contains("flight_icao=AAL1"));
        assert!(requests[1].contains("flight_iata=AA1"));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let (url, requests) = serve(vec![(503, "{}"), (200, ONE_FLIGHT)]).await;
        let client = client_for(&url, 3);

        let response = client.search_by_route("JFK", "LAX", 100).await.unwrap();
        assert_eq!(response.data.len(), 1);
        assert_eq!(requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let (url, requests) = serve(vec![(502, "{}"), (502, "{}"), (502, "{}")]).await;
        let client = client_for(&url, 2);

        let err = client.search_by_route("JFK", "LAX", 100).await.unwrap_err();
        assert!(matches!(err, ApiError::Status { code: 502 }));
        assert_eq!(requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let (url, requests) = serve(vec![(401, "{}")]).await;
        let client = client_for(&url, 3);

        let err = client.search_by_route("JFK", "LAX", 100).await.unwrap_err();
        assert!(matches!(err, ApiError::Status { code: 401 }));
        assert!(err.user_message().contains("access denied"));
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remote_error_object() {
        let body = r#"{"error": {"code": "usage_limit_reached", "message": "limit reached"}}"#;
        let (url, _) = serve(vec![(200, body)]).await;
        let client = client_for(&url, 0);

        let err = client.search_by_route("JFK", "LAX", 100).await.unwrap_err();
        match err {
            ApiError::Remote { code, message } => {
                assert_eq!(code, "usage_limit_reached");
                assert_eq!(message, "limit reached");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (url, _) = serve(vec![(200, "<html>")]).await;
        let client = client_for(&url, 0);

        let err = client.search_by_route("JFK", "LAX", 100).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{addr}/v1/"), 1);
        let err = client.search_by_route("JFK", "LAX", 100).await.unwrap_err();
        assert!(matches!(err, ApiError::NoConnectivity { ref host } if host == "127.0.0.1"));
    }

    #[tokio::test]
    async fn test_transport_error_hides_access_key() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let mut config = Config::default();
        config.api.base_url = format!("http://{addr}/v1/");
        config.api.access_key = "SECRETKEY123".to_string();
        config.api.max_retries = 0;
        let client = AviationStackClient::from_config(&config).unwrap();

        let err = client.search_by_route("JFK", "LAX", 100).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)), "unexpected error: {err:?}");
        assert!(!err.to_string().contains("SECRETKEY123"));
        assert!(!format!("{err:?}").contains("SECRETKEY123"));
        assert!(!err.user_message().contains("SECRETKEY123"));
    }

    #[test]
    fn test_retryable_statuses() {
        for code in [500, 502, 503, 504] {
            assert!(ApiError::Status { code }.is_retryable());
        }
        for code in [400, 401, 404, 429, 501] {
            assert!(!ApiError::Status { code }.is_retryable());
        }
    }

    #[test]
    fn test_user_messages() {
        assert!(ApiError::Status { code: 429 }
            .user_message()
            .contains("Too many requests"));
        assert!(ApiError::Status { code: 404 }
            .user_message()
            .contains("not found"));
        assert_eq!(
            ApiError::Status { code: 418 }.user_message(),
            "Server error (418). Please try again later."
        );
    }
}
