use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderMap, HeaderValue};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;

/// Default hard limit on a single network probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// A probe that never produced an HTTP response.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Probe client could not be built: {0}")]
    Client(String),
}

/// What came back from a target that answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub latency_ms: u64,
}

impl ProbeResponse {
    pub fn is_healthy(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Transport used to reach a target; the executor only sees the result.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &str) -> Result<ProbeResponse, ProbeError>;
}

/// Reachability probe over HTTP `HEAD`.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    timeout_duration: Duration,
}

impl HttpProber {
    pub fn new(timeout_duration: Duration) -> Result<Self, ProbeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .timeout(timeout_duration)
            .user_agent(format!("uptrack/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        Ok(Self { client, timeout_duration })
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &str) -> Result<ProbeResponse, ProbeError> {
        let start = Instant::now();

        // The client has its own timeout; this outer one also bounds DNS and
        // connection setup on every platform.
        let response = timeout(self.timeout_duration, self.client.head(target).send())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout_duration))??;

        Ok(ProbeResponse {
            status_code: response.status().as_u16(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_head_probe_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ok"))
            .and(header("cache-control", "no-cache"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let prober = HttpProber::new(Duration::from_secs(5)).unwrap();

        let ok = prober.probe(&format!("{}/ok", server.uri())).await.unwrap();
        assert_eq!(ok.status_code, 200);
        assert!(ok.is_healthy());

        let broken = prober.probe(&format!("{}/broken", server.uri())).await.unwrap();
        assert_eq!(broken.status_code, 503);
        assert!(!broken.is_healthy());
    }

    #[tokio::test]
    async fn test_slow_target_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let prober = HttpProber::new(Duration::from_millis(200)).unwrap();
        let result = prober.probe(&server.uri()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_target_errors() {
        let prober = HttpProber::new(Duration::from_secs(2)).unwrap();
        // Port 9 (discard) on loopback is essentially never listening.
        let result = prober.probe("http://127.0.0.1:9/").await;
        assert!(result.is_err());
    }
}
