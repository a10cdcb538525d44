use std::io::Write;
use std::time::Duration;

use reqwest::Client;
use url::Url;

use reap_core::error::AppError;
use reap_core::models::CapturedItem;
use reap_core::traits::{NullSink, Sink};

/// Publishes records as JSON to an HTTP endpoint.
///
/// `publish_one` posts a single object, `publish_many` posts one array.
/// Any non-2xx response is a [`AppError::PublishError`].
#[derive(Clone)]
pub struct HttpSink {
    client: Client,
    endpoint: Url,
}

impl HttpSink {
    pub fn new(endpoint: &str) -> Result<Self, AppError> {
        Self::with_timeout(endpoint, Duration::from_secs(30))
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self, AppError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| AppError::ConfigError(format!("Invalid sink URL {endpoint}: {e}")))?;
        let client = Client::builder()
            .user_agent(concat!("reap/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::PublishError(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post<T: serde::Serialize + ?Sized>(&self, body: &T) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::PublishError(format!("Sink timed out: {e}"))
                } else {
                    AppError::PublishError(format!("Sink request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::PublishError(format!(
                "HTTP {} from {}",
                status.as_u16(),
                self.endpoint
            )));
        }
        Ok(())
    }
}

impl Sink for HttpSink {
    async fn publish_one(&self, record: &CapturedItem) -> Result<(), AppError> {
        self.post(record).await
    }

    async fn publish_many(&self, records: &[CapturedItem]) -> Result<(), AppError> {
        self.post(records).await
    }
}

/// Writes one JSON line per record to stdout.
#[derive(Debug, Clone, Default)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    async fn publish_one(&self, record: &CapturedItem) -> Result<(), AppError> {
        write_lines(&mut std::io::stdout().lock(), std::slice::from_ref(record))
    }

    async fn publish_many(&self, records: &[CapturedItem]) -> Result<(), AppError> {
        write_lines(&mut std::io::stdout().lock(), records)
    }
}

fn write_lines(out: &mut impl Write, records: &[CapturedItem]) -> Result<(), AppError> {
    for record in records {
        let line = serde_json::to_string(record)?;
        writeln!(out, "{line}").map_err(|e| AppError::PublishError(e.to_string()))?;
    }
    out.flush().map_err(|e| AppError::PublishError(e.to_string()))
}

/// A sink chosen at startup.
#[derive(Clone)]
pub enum AnySink {
    Http(HttpSink),
    Stdout(StdoutSink),
    Null(NullSink),
}

impl AnySink {
    /// HTTP when an endpoint is given, stdout otherwise.
    pub fn from_endpoint(endpoint: Option<&str>) -> Result<Self, AppError> {
        match endpoint.map(str::trim).filter(|e| !e.is_empty()) {
            Some(url) => Ok(AnySink::Http(HttpSink::new(url)?)),
            None => Ok(AnySink::Stdout(StdoutSink)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnySink::Http(_) => "http",
            AnySink::Stdout(_) => "stdout",
            AnySink::Null(_) => "null",
        }
    }
}

impl Sink for AnySink {
    async fn publish_one(&self, record: &CapturedItem) -> Result<(), AppError> {
        match self {
            AnySink::Http(sink) => sink.publish_one(record).await,
            AnySink::Stdout(sink) => sink.publish_one(record).await,
            AnySink::Null(sink) => sink.publish_one(record).await,
        }
    }

    async fn publish_many(&self, records: &[CapturedItem]) -> Result<(), AppError> {
        match self {
            AnySink::Http(sink) => sink.publish_many(records).await,
            AnySink::Stdout(sink) => sink.publish_many(records).await,
            AnySink::Null(sink) => sink.publish_many(records).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use reap_core::models::{ItemDetail, ItemStub};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn record(id: &str) -> CapturedItem {
        let detail = ItemDetail {
            stub: ItemStub {
                id: id.to_string(),
                community: "rust".to_string(),
                posted_at_millis: 1_700_000_000_000,
                author: "ferris".to_string(),
                url: format!("https://old.reddit.com/r/rust/comments/{id}/post/"),
            },
            media_type: "self".to_string(),
            media_url: None,
            is_promoted: false,
            is_gallery: false,
            title: "Hello".to_string(),
            score: 7,
            body_text: String::new(),
            discussion: vec![],
        };
        CapturedItem::new(detail, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_publish_one_posts_single_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/records"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpSink::new(&format!("{}/records", server.uri())).unwrap();
        sink.publish_one(&record("t3_a")).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["id"], "t3_a");
        assert_eq!(body["community"], "rust");
        assert_eq!(body["capturedAt"], "2024-05-01T12:00:00Z");
    }

    #[tokio::test]
    async fn test_publish_many_posts_one_array() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/records"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpSink::new(&format!("{}/records", server.uri())).unwrap();
        sink.publish_many(&[record("t3_a"), record("t3_b")])
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let ids: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["t3_a", "t3_b"]);
    }

    #[tokio::test]
    async fn test_non_success_status_is_publish_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sink = HttpSink::new(&server.uri()).unwrap();
        let err = sink.publish_one(&record("t3_a")).await.unwrap_err();
        assert!(matches!(err, AppError::PublishError(ref m) if m.contains("503")));
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        assert!(matches!(
            HttpSink::new("not a url"),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_write_lines_one_json_per_line() {
        let mut out = Vec::new();
        write_lines(&mut out, &[record("t3_a"), record("t3_b")]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], "t3_a");
    }

    #[test]
    fn test_sink_selection() {
        assert_eq!(AnySink::from_endpoint(None).unwrap().name(), "stdout");
        assert_eq!(AnySink::from_endpoint(Some("  ")).unwrap().name(), "stdout");
        assert_eq!(
            AnySink::from_endpoint(Some("http://localhost:8080/in"))
                .unwrap()
                .name(),
            "http"
        );
    }
}
