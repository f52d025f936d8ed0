//! HTTP status store: posts each upsert as a multipart form to a remote endpoint

use super::traits::{StatusRecord, StatusStore, StoreError, StoreResult};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Default request timeout for upserts
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// File name of the evidence part; the API stores it as an opaque blob
const EVIDENCE_FILE_NAME: &str = "report.csv";

/// Shared-secret credential sent with every upsert
#[derive(Clone)]
pub struct ApiSecret(String);

impl ApiSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Read the secret from the environment variable `var`
    pub fn from_env(var: &str) -> StoreResult<Self> {
        std::env::var(var)
            .ok()
            .filter(|s| !s.is_empty())
            .map(Self)
            .ok_or_else(|| StoreError::MissingSecret(var.to_string()))
    }
}

impl fmt::Debug for ApiSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiSecret(<redacted>)")
    }
}

/// Status store that upserts through a remote API.
///
/// Each upsert is one multipart POST: text fields `key`, `status` (integer
/// code), `secret`, one `scraperTags` field per tag, optional entity
/// attributes, and the raw evidence as the file part `output`. Any non-2xx
/// response is a failure; the response body is not interpreted.
pub struct HttpStatusStore {
    client: Client,
    url: String,
    secret: ApiSecret,
    timeout: Duration,
}

impl HttpStatusStore {
    pub fn new(url: impl Into<String>, secret: ApiSecret) -> StoreResult<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            secret,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Text fields in send order. Empty attributes are omitted.
    fn fields(&self, record: &StatusRecord) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("key", record.key.clone()),
            ("status", record.status.code().to_string()),
            ("secret", self.secret.0.clone()),
        ];
        fields.extend(record.tags.iter().map(|tag| ("scraperTags", tag.clone())));
        if let Some(url) = &record.content_url {
            fields.push(("content_url", url.clone()));
        }
        for (name, value) in [
            ("name", &record.display_name),
            ("address", &record.address),
            ("county", &record.county),
            ("city", &record.city),
        ] {
            if !value.is_empty() {
                fields.push((name, value.clone()));
            }
        }
        fields
    }

    fn form(&self, record: &StatusRecord) -> Form {
        let form = self
            .fields(record)
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));
        form.part(
            "output",
            Part::bytes(record.evidence.clone()).file_name(EVIDENCE_FILE_NAME),
        )
    }
}

#[async_trait]
impl StatusStore for HttpStatusStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn upsert(&self, record: &StatusRecord) -> StoreResult<()> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .multipart(self.form(record))
            .send()
            .await?;

        let status = response.status();
        debug!(
            key = %record.key,
            status = status.as_u16(),
            evidence_bytes = record.evidence.len(),
            "status API responded"
        );
        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::publish::{PublishOutcome, Publisher};
    use crate::signal::Signal;
    use crate::status::StatusValue;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    /// Read one HTTP/1.1 request (headers plus a sized or chunked body)
    async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(end) = find(&buf, b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let body = &buf[end + 4..];
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok());
            match length {
                Some(length) if body.len() >= length => break,
                None if body.ends_with(b"0\r\n\r\n") => break,
                _ => {}
            }
        }
        buf
    }

    /// Local endpoint answering each request with the next scripted status.
    /// Returns its URL and a handle yielding the raw requests received.
    async fn scripted_endpoint(statuses: Vec<u16>) -> (String, JoinHandle<Vec<Vec<u8>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/v1/updater", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for status in statuses {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);
                let response = format!(
                    "HTTP/1.1 {status} Scripted\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
            requests
        });
        (url, handle)
    }

    #[test]
    fn fields_use_api_names() {
        let store = HttpStatusStore::new("http://localhost:9/upsert", ApiSecret::new("s3cret")).unwrap();
        let mut record = StatusRecord::new("k1", StatusValue::Limited);
        record.tags.insert("pfizer".into());
        record.tags.insert("moderna".into());
        record.city = "Yakima".into();

        let fields = store.fields(&record);
        assert_eq!(fields[0], ("key", "k1".to_string()));
        assert_eq!(fields[1], ("status", "9".to_string()));
        assert_eq!(fields[2], ("secret", "s3cret".to_string()));
        let tags: Vec<_> = fields
            .iter()
            .filter(|(name, _)| *name == "scraperTags")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(tags, vec!["moderna", "pfizer"]);
        assert!(fields.contains(&("city", "Yakima".to_string())));
        assert!(!fields.iter().any(|(name, _)| *name == "county" || *name == "content_url"));
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let secret = ApiSecret::new("hunter2");
        assert!(!format!("{secret:?}").contains("hunter2"));
    }

    #[test]
    fn missing_env_secret_is_an_error() {
        let err = ApiSecret::from_env("SLOTWATCH_TEST_SECRET_THAT_IS_NOT_SET").unwrap_err();
        assert!(matches!(err, StoreError::MissingSecret(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails() {
        let store = HttpStatusStore::new("http://127.0.0.1:9/upsert", ApiSecret::new("x"))
            .unwrap()
            .with_timeout(Duration::from_millis(500));
        let result = store.upsert(&StatusRecord::new("k", StatusValue::No)).await;
        assert!(matches!(result, Err(StoreError::Http(_))));
    }

    #[tokio::test]
    async fn non_success_response_is_rejected() {
        let (url, server) = scripted_endpoint(vec![503, 200]).await;
        let store = HttpStatusStore::new(url, ApiSecret::new("s3cret"))
            .unwrap()
            .with_timeout(Duration::from_secs(5));

        let mut record = StatusRecord::new("k1", StatusValue::Yes);
        record.evidence = b"<html>12 open slots</html>".to_vec();

        let rejected = store.upsert(&record).await;
        assert!(matches!(rejected, Err(StoreError::Rejected { status: 503 })));
        store.upsert(&record).await.unwrap();

        let requests = server.await.unwrap();
        let accepted = &requests[1];
        assert!(find(accepted, b"multipart/form-data").is_some());
        assert!(find(accepted, b"name=\"output\"; filename=\"report.csv\"").is_some());
        assert!(find(accepted, b"<html>12 open slots</html>").is_some());
        assert!(find(accepted, b"name=\"status\"\r\n\r\n1\r\n").is_some());
    }

    #[tokio::test]
    async fn publisher_reports_store_responses() {
        let (url, server) = scripted_endpoint(vec![503, 200]).await;
        let store = HttpStatusStore::new(url, ApiSecret::new("s3cret"))
            .unwrap()
            .with_timeout(Duration::from_secs(5));
        let publisher = Publisher::new(Arc::new(store));

        let signals = vec![Signal::counted(8, 5)
            .for_key("clinic-A")
            .with_evidence("<ul><li>slot</li></ul>")];
        let result = Aggregator::new(5).aggregate("clinic-A", &signals);

        let failed = publisher.publish(&result, None).await;
        assert!(matches!(failed, PublishOutcome::Failed(ref reason) if reason.contains("503")));
        assert_eq!(publisher.publish(&result, None).await, PublishOutcome::Ok);

        let requests = server.await.unwrap();
        assert!(find(&requests[1], b"<ul><li>slot</li></ul>").is_some());
    }
}
