use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::traits::{Storage, StorageInfo};
use crate::error::{Error, StorageError};

/// Supabase-style object store over HTTP.
///
/// Sources are read from the public object endpoint; results are uploaded
/// with the configured key and addressed by their public URL.
pub struct HttpStorage {
    client: Client,
    /// Project URL (e.g., "https://project.supabase.co")
    pub base_url: String,
    /// Sent as `apikey` and bearer token when set
    pub api_key: Option<String>,
    pub bucket: String,
    /// Number of attempts per call
    pub retry_count: u32,
    /// Delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

/// Outcome of one attempt.
enum Attempt<T> {
    Done(T),
    Retry(StorageError),
    Fail(StorageError),
}

impl HttpStorage {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        bucket: String,
        retry_count: u32,
        retry_delay_ms: u64,
        timeout_secs: u64,
    ) -> crate::error::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::StorageInit(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bucket,
            retry_count: retry_count.max(1),
            retry_delay_ms,
        })
    }

    /// Public URL of an object.
    pub fn public_url(&self, id: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(id)
        )
    }

    fn upload_url(&self, id: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(id)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_key {
            Some(ref key) => request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    /// Run `attempt` until it succeeds, fails permanently, or the retry
    /// budget is spent.
    async fn with_retry<T, F, Fut>(&self, what: &str, id: &str, mut attempt: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut last_error = None;

        for n in 0..self.retry_count {
            debug!("Storage {} attempt {}/{} for {}", what, n + 1, self.retry_count, id);

            match attempt().await {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fail(e) => return Err(e),
                Attempt::Retry(e) => {
                    warn!("Storage {} of {} failed: {}", what, id, e);
                    last_error = Some(e);
                }
            }

            if n + 1 < self.retry_count {
                tokio::time::sleep(Duration::from_millis(self.retry_delay_ms)).await;
            }
        }

        error!("Storage {} of {} failed after {} attempts", what, id, self.retry_count);
        Err(last_error.unwrap_or_else(|| StorageError::Transport("retries exhausted".into())))
    }
}

/// Classify a non-success status.
fn status_failure<T>(status: StatusCode, id: &str, body: &str) -> Attempt<T> {
    if status == StatusCode::NOT_FOUND {
        return Attempt::Fail(StorageError::NotFound(id.to_string()));
    }
    let error = StorageError::Transport(format!("HTTP {status}: {body}"));
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Attempt::Retry(error)
    } else {
        Attempt::Fail(error)
    }
}

/// Percent-encode each path segment, keeping the separators.
fn encode_path(id: &str) -> String {
    id.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl Storage for HttpStorage {
    fn info(&self) -> StorageInfo {
        StorageInfo {
            name: "http",
            location: format!("{}/{}", self.base_url, self.bucket),
        }
    }

    async fn fetch(&self, id: &str) -> Result<Bytes, StorageError> {
        let url = &self.public_url(id);
        self.with_retry("fetch", id, move || async move {
            let response = match self.authorize(self.client.get(url)).send().await {
                Ok(response) => response,
                Err(e) => return Attempt::Retry(StorageError::Transport(e.to_string())),
            };
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return status_failure(status, id, &body);
            }
            match response.bytes().await {
                Ok(bytes) => Attempt::Done(bytes),
                Err(e) => Attempt::Retry(StorageError::Transport(e.to_string())),
            }
        })
        .await
    }

    async fn store(&self, id: &str, data: Bytes) -> Result<String, StorageError> {
        let url = &self.upload_url(id);
        let content_type = &mime_guess::from_path(id).first_or_octet_stream();
        let data = &data;

        self.with_retry("store", id, move || async move {
            let request = self
                .client
                .post(url)
                .header("Content-Type", content_type.to_string())
                .header("x-upsert", "false")
                .body(data.clone());
            let response = match self.authorize(request).send().await {
                Ok(response) => response,
                Err(e) => return Attempt::Retry(StorageError::Transport(e.to_string())),
            };
            let status = response.status();
            if status.is_success() {
                Attempt::Done(self.public_url(id))
            } else {
                let body = response.text().await.unwrap_or_default();
                status_failure(status, id, &body)
            }
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn storage() -> HttpStorage {
        HttpStorage::new(
            "https://project.example.co/".into(),
            Some("key".into()),
            "pdfs".into(),
            3,
            0,
            5,
        )
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let storage = storage();
        assert_eq!(
            storage.public_url("results/merge_1.pdf"),
            "https://project.example.co/storage/v1/object/public/pdfs/results/merge_1.pdf"
        );
        assert_eq!(
            storage.upload_url("my file.pdf"),
            "https://project.example.co/storage/v1/object/pdfs/my%20file.pdf"
        );
    }

    #[test]
    fn test_status_classification() {
        let fail: Attempt<()> = status_failure(StatusCode::NOT_FOUND, "a.pdf", "");
        assert!(matches!(fail, Attempt::Fail(StorageError::NotFound(_))));
        let retry: Attempt<()> = status_failure(StatusCode::BAD_GATEWAY, "a.pdf", "");
        assert!(matches!(retry, Attempt::Retry(_)));
        let retry: Attempt<()> = status_failure(StatusCode::TOO_MANY_REQUESTS, "a.pdf", "");
        assert!(matches!(retry, Attempt::Retry(_)));
        let fail: Attempt<()> = status_failure(StatusCode::FORBIDDEN, "a.pdf", "denied");
        assert!(matches!(fail, Attempt::Fail(StorageError::Transport(_))));
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let storage = storage();
        let mut calls = 0;
        let result: Result<(), StorageError> = storage
            .with_retry("fetch", "a.pdf", || {
                calls += 1;
                async { Attempt::Retry(StorageError::Transport("down".into())) }
            })
            .await;
        assert!(matches!(result, Err(StorageError::Transport(_))));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_failure() {
        let storage = storage();
        let mut calls = 0;
        let result: Result<(), StorageError> = storage
            .with_retry("fetch", "a.pdf", || {
                calls += 1;
                async { Attempt::Fail(StorageError::NotFound("a.pdf".into())) }
            })
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert_eq!(calls, 1);
    }
}
