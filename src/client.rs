// Booking backend client: catalog ingestion and room allocation

use crate::booking::{AllocationResponse, RoomAllocationRequest};
use crate::catalog::{Catalog, CatalogError};
use crate::config::{BackendConfig, RetryConfig};
use crate::supplier::CatalogResponse;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

// Error types for backend calls
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("API error: {status_code} - {message}")]
    ApiResponseError {
        status_code: u16,
        message: String,
        is_retryable: bool,
    },

    #[error("Malformed response: {0}")]
    DecodeError(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::NetworkError(_) | ApiError::Timeout(_) => true,
            ApiError::ApiResponseError { is_retryable, .. } => *is_retryable,
            ApiError::DecodeError(_) | ApiError::Catalog(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Default, Clone)]
pub struct ClientStats {
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_retried: usize,
    pub requests_timeout: usize,
    pub average_response_time_ms: f64,
    pub max_response_time_ms: f64,
}

// The two boundaries the selection engine has with the booking backend
#[async_trait]
pub trait BookingBackend: Send + Sync + 'static {
    // Rates, rooms and recommendations for an itinerary, validated
    async fn fetch_catalog(&self, itinerary_id: &str) -> Result<Catalog, ApiError>;

    // Submit a validated selection for room allocation
    async fn allocate_rooms(
        &self,
        request: &RoomAllocationRequest,
    ) -> Result<AllocationResponse, ApiError>;
}

pub struct HttpBookingBackend {
    http: reqwest::Client,
    base_url: Url,
    config: BackendConfig,
    stats: Mutex<ClientStats>,
}

impl HttpBookingBackend {
    pub fn new(config: BackendConfig) -> Result<Self, ClientError> {
        if config.timeout_ms == 0 {
            return Err(ClientError::ConfigError(
                "timeout_ms must be positive".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Self::with_client(config, http)
    }

    // Reuses an existing reqwest client; its own timeout and proxy settings apply
    pub fn with_client(config: BackendConfig, http: reqwest::Client) -> Result<Self, ClientError> {
        if config.base_url.trim().is_empty() {
            return Err(ClientError::ConfigError(
                "base_url must not be empty".to_string(),
            ));
        }
        let base_url = Url::parse(config.base_url.trim())
            .map_err(|e| ClientError::ConfigError(format!("invalid base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::ConfigError(format!(
                "base_url {} cannot hold a path",
                base_url
            )));
        }

        Ok(Self {
            http,
            base_url,
            config,
            stats: Mutex::new(ClientStats::default()),
        })
    }

    pub fn stats(&self) -> ClientStats {
        self.stats.lock().clone()
    }

    // Helper to calculate exponential backoff with jitter
    pub fn calculate_backoff(retry_attempt: u32, config: &RetryConfig) -> Duration {
        let base_backoff_ms = (config.initial_backoff_ms as f64
            * config.backoff_multiplier.powf(retry_attempt as f64))
        .min(config.max_backoff_ms as f64);

        // Apply jitter to prevent thundering herd
        let jitter = rand::random::<f64>() * config.jitter_factor * base_backoff_ms;
        let backoff_ms = base_backoff_ms * (1.0 - config.jitter_factor / 2.0) + jitter;

        Duration::from_millis(backoff_ms as u64)
    }

    // Each segment is percent-encoded, so ids may contain '/' or '?'
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send_with_retry<T, F>(&self, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send,
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let started = Instant::now();
            let result = self.send_once(build()).await;
            self.record(&result, started.elapsed());

            match result {
                Err(e) if e.is_retryable() && attempt < self.config.retry.max_retries => {
                    let backoff = Self::calculate_backoff(attempt, &self.config.retry);
                    warn!(attempt, backoff_ms = (backoff.as_millis() as u64), error = %e, "retrying backend call");
                    self.stats.lock().requests_retried += 1;
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout(self.config.timeout_ms)
                } else {
                    ApiError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::ApiResponseError {
                status_code: status.as_u16(),
                message,
                is_retryable: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::DecodeError(e.to_string()))
    }

    fn record<T>(&self, result: &Result<T, ApiError>, elapsed: Duration) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let mut stats = self.stats.lock();

        stats.requests_sent += 1;
        match result {
            Ok(_) => stats.requests_succeeded += 1,
            Err(ApiError::Timeout(_)) => {
                stats.requests_failed += 1;
                stats.requests_timeout += 1;
            }
            Err(_) => stats.requests_failed += 1,
        }

        let sent = stats.requests_sent as f64;
        stats.average_response_time_ms =
            (stats.average_response_time_ms * (sent - 1.0) + elapsed_ms) / sent;
        stats.max_response_time_ms = stats.max_response_time_ms.max(elapsed_ms);
    }
}

#[async_trait]
impl BookingBackend for HttpBookingBackend {
    async fn fetch_catalog(&self, itinerary_id: &str) -> Result<Catalog, ApiError> {
        let url = self.url(&["itineraries", itinerary_id, "rates"]);
        let response: CatalogResponse = self.send_with_retry(|| self.http.get(url.clone())).await?;

        let age = Utc::now().signed_duration_since(response.timestamp);
        debug!(
            itinerary_id,
            age_seconds = age.num_seconds(),
            recommendations = response.recommendations.len(),
            "catalog fetched"
        );
        Ok(Catalog::try_from(response)?)
    }

    async fn allocate_rooms(
        &self,
        request: &RoomAllocationRequest,
    ) -> Result<AllocationResponse, ApiError> {
        let url = self.url(&["itineraries", request.itinerary_id.as_str(), "rooms"]);
        self.send_with_retry(|| {
            self.http
                .post(url.clone())
                .header(IDEMPOTENCY_KEY_HEADER, &request.idempotency_key)
                .json(request)
        })
        .await
    }
}


#[cfg(test)]
mod tests {
    use super::mock_backend::MockBackend;
    use super::*;
    use crate::catalog::fixtures::two_room_catalog;
    use crate::catalog::RateId;
    use crate::selection::SelectionStateMachine;
    use crate::supplier::samples::TWO_ROOM_JSON;
    use std::sync::Arc;
    use test_case::test_case;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    // Reads one HTTP/1.1 request, body included
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            data.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&data);
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    // Answers one connection per canned response, then stops listening
    async fn stub_server(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        tokio::spawn(async move {
            for (status, body) in responses {
                let mut socket = match listener.accept().await {
                    Ok((socket, _)) => socket,
                    Err(_) => return,
                };
                let request = read_request(&mut socket).await;
                seen.lock().push(request);

                let response = format!(
                    "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (base_url, requests)
    }

    // Direct connections only, so proxy settings in the environment cannot reroute localhost
    fn client_for(base_url: String, max_retries: u32, timeout_ms: u64) -> HttpBookingBackend {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap();
        HttpBookingBackend::with_client(
            BackendConfig {
                base_url,
                api_key: "test-key".to_string(),
                timeout_ms,
                retry: RetryConfig {
                    max_retries,
                    initial_backoff_ms: 1,
                    max_backoff_ms: 5,
                    ..RetryConfig::default()
                },
            },
            http,
        )
        .unwrap()
    }

    fn catalog_body() -> (u16, String) {
        (200, TWO_ROOM_JSON.to_string())
    }

    fn failure(status: u16) -> (u16, String) {
        (status, r#"{"error":"stub"}"#.to_string())
    }

    #[test_case(0, 100; "first retry")]
    #[test_case(1, 200; "second retry")]
    #[test_case(3, 800; "fourth retry")]
    #[test_case(20, 10000; "capped")]
    fn test_backoff_stays_within_jitter_band(attempt: u32, base_ms: u64) {
        let config = RetryConfig::default();
        let low = base_ms as f64 * (1.0 - config.jitter_factor / 2.0);
        let high = base_ms as f64 * (1.0 + config.jitter_factor / 2.0);

        for _ in 0..50 {
            let backoff = HttpBookingBackend::calculate_backoff(attempt, &config).as_millis() as f64;
            assert!(
                backoff >= low.floor() && backoff <= high,
                "backoff {}ms outside [{}, {}]",
                backoff,
                low,
                high
            );
        }
    }

    #[test_case(" "; "blank")]
    #[test_case("not a url"; "unparseable")]
    #[test_case("mailto:ops@example.com"; "no path")]
    fn test_client_rejects_bad_base_url(base_url: &str) {
        let config = BackendConfig {
            base_url: base_url.to_string(),
            ..BackendConfig::default()
        };
        assert!(matches!(
            HttpBookingBackend::new(config),
            Err(ClientError::ConfigError(_))
        ));
    }

    #[test]
    fn test_client_rejects_zero_timeout() {
        let no_timeout = BackendConfig {
            timeout_ms: 0,
            ..BackendConfig::default()
        };
        assert!(matches!(
            HttpBookingBackend::new(no_timeout),
            Err(ClientError::ConfigError(_))
        ));
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let client = HttpBookingBackend::new(BackendConfig {
            base_url: "https://booking.example.com/api/".to_string(),
            ..BackendConfig::default()
        })
        .unwrap();

        assert_eq!(
            client.url(&["itineraries", "IT-1", "rates"]).as_str(),
            "https://booking.example.com/api/itineraries/IT-1/rates"
        );
        assert_eq!(
            client.url(&["itineraries", "IT/1?x", "rates"]).as_str(),
            "https://booking.example.com/api/itineraries/IT%2F1%3Fx/rates"
        );
        assert_eq!(client.stats().requests_sent, 0);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ApiError::Timeout(100).is_retryable());
        assert!(ApiError::NetworkError("reset".to_string()).is_retryable());
        assert!(!ApiError::Catalog(CatalogError::NoRooms).is_retryable());
        assert!(!ApiError::ApiResponseError {
            status_code: 400,
            message: "bad request".to_string(),
            is_retryable: false,
        }
        .is_retryable());
    }

    #[tokio::test]
    async fn test_mock_backend_serves_validated_catalog() {
        let backend = MockBackend::new();
        backend
            .add_catalog("IT-1001", serde_json::from_str(TWO_ROOM_JSON).unwrap())
            .await;

        let catalog = backend.fetch_catalog("IT-1001").await.unwrap();
        assert_eq!(catalog.room_count(), 2);

        let missing = backend.fetch_catalog("IT-404").await;
        assert!(matches!(
            missing,
            Err(ApiError::ApiResponseError {
                status_code: 404,
                ..
            })
        ));
        assert_eq!(backend.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_backend_rejects_inconsistent_catalog() {
        let backend = MockBackend::new();
        let mut response: CatalogResponse = serde_json::from_str(TWO_ROOM_JSON).unwrap();
        response.recommendations[2].rate_ids[0] = "C9".to_string();
        backend.add_catalog("IT-1001", response).await;

        let result = backend.fetch_catalog("IT-1001").await;
        assert!(matches!(result, Err(ApiError::Catalog(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let (base_url, requests) = stub_server(vec![failure(503), catalog_body()]).await;
        let client = client_for(base_url, 3, 2000);

        let catalog = client.fetch_catalog("IT-1001").await.unwrap();
        assert_eq!(catalog.room_count(), 2);

        let requests = requests.lock();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("GET /itineraries/IT-1001/rates HTTP/1.1"));
        assert!(requests[0].contains("x-api-key: test-key"));

        let stats = client.stats();
        assert_eq!(stats.requests_sent, 2);
        assert_eq!(stats.requests_succeeded, 1);
        assert_eq!(stats.requests_failed, 1);
        assert_eq!(stats.requests_retried, 1);
        assert_eq!(stats.requests_timeout, 0);
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let (base_url, requests) = stub_server(vec![failure(429), catalog_body()]).await;
        let client = client_for(base_url, 3, 2000);

        assert!(client.fetch_catalog("IT-1001").await.is_ok());
        assert_eq!(requests.lock().len(), 2);
        assert_eq!(client.stats().requests_retried, 1);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (base_url, requests) = stub_server(vec![failure(400), catalog_body()]).await;
        let client = client_for(base_url, 3, 2000);

        let result = client.fetch_catalog("IT-1001").await;
        assert!(matches!(
            result,
            Err(ApiError::ApiResponseError {
                status_code: 400,
                is_retryable: false,
                ..
            })
        ));
        assert_eq!(requests.lock().len(), 1);

        let stats = client.stats();
        assert_eq!(stats.requests_sent, 1);
        assert_eq!(stats.requests_failed, 1);
        assert_eq!(stats.requests_retried, 0);
    }

    #[tokio::test]
    async fn test_retries_stop_at_max_retries() {
        // The success after the third failure is never reached
        let (base_url, requests) =
            stub_server(vec![failure(503), failure(503), failure(503), catalog_body()]).await;
        let client = client_for(base_url, 2, 2000);

        let result = client.fetch_catalog("IT-1001").await;
        assert!(matches!(
            result,
            Err(ApiError::ApiResponseError {
                status_code: 503,
                ..
            })
        ));
        assert_eq!(requests.lock().len(), 3);

        let stats = client.stats();
        assert_eq!(stats.requests_sent, 3);
        assert_eq!(stats.requests_failed, 3);
        assert_eq!(stats.requests_retried, 2);
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let client = client_for(base_url, 1, 2000);

        let result = client.fetch_catalog("IT-1001").await;
        assert!(matches!(result, Err(ApiError::NetworkError(_))));

        let stats = client.stats();
        assert_eq!(stats.requests_sent, 2);
        assert_eq!(stats.requests_retried, 1);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let client = client_for(base_url, 0, 100);

        let result = client.fetch_catalog("IT-1001").await;
        assert!(matches!(result, Err(ApiError::Timeout(100))));

        let stats = client.stats();
        assert_eq!(stats.requests_timeout, 1);
        assert_eq!(stats.requests_failed, 1);
        assert_eq!(stats.requests_retried, 0);
    }

    #[tokio::test]
    async fn test_itinerary_id_is_encoded_in_path() {
        let (base_url, requests) = stub_server(vec![catalog_body()]).await;
        let client = client_for(base_url, 0, 2000);

        assert!(client.fetch_catalog("IT/1?x").await.is_ok());
        assert!(requests.lock()[0].starts_with("GET /itineraries/IT%2F1%3Fx/rates HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_allocation_posts_idempotency_key() {
        let body = r#"{"booking_id":"B-1","status":"confirmed","confirmation_code":null}"#;
        let (base_url, requests) = stub_server(vec![(200, body.to_string())]).await;
        let client = client_for(base_url, 0, 2000);

        let mut machine = SelectionStateMachine::new(Arc::new(two_room_catalog()));
        machine.select_rate(&RateId::from("A1")).unwrap();
        machine.select_rate(&RateId::from("B1")).unwrap();
        let request =
            RoomAllocationRequest::new("IT-1001", machine.catalog(), &machine.confirm().unwrap());

        let response = client.allocate_rooms(&request).await.unwrap();
        assert_eq!(response.booking_id, "B-1");

        let requests = requests.lock();
        assert!(requests[0].starts_with("POST /itineraries/IT-1001/rooms HTTP/1.1"));
        assert!(requests[0].contains(&format!("idempotency-key: {}", request.idempotency_key)));
        assert!(requests[0].contains(r#""recommendation_id":"R1""#));
    }
}
