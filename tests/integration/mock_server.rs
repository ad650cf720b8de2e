//! Mock HTTP server setup for integration tests

use async_trait::async_trait;
use media_dispatch::providers::AdapterOptions;
use media_dispatch::resilience::Sleeper;
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every requested pause instead of waiting.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
    pub sleeper: Arc<RecordingSleeper>,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server,
            base_url,
            sleeper: Arc::new(RecordingSleeper::default()),
        }
    }

    /// Adapter options pointed at the mock server, with a recording clock
    pub fn options(&self, api_key: &str) -> AdapterOptions {
        AdapterOptions::new(api_key)
            .with_base_url(&self.base_url)
            .with_sleeper(self.sleeper.clone())
    }

    /// Absolute URL on the mock server
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a mock for a JSON response; any query string matches
    pub async fn mock_json(&mut self, method: &str, path: &str, status: usize, body: &str) -> Mock {
        self.server
            .mock(method, path)
            .match_query(Matcher::Any)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Create a mock serving raw bytes, like a CDN result asset
    pub async fn mock_asset(&mut self, path: &str, content_type: &str, bytes: &[u8]) -> Mock {
        self.server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", content_type)
            .with_body(bytes)
            .create_async()
            .await
    }

    /// Create a mock that answers with `pending` until the `ready_on`-th
    /// call, then with `done` for every later call. Returns the call counter.
    pub async fn mock_status_sequence(
        &mut self,
        path: &str,
        pending: &str,
        done: &str,
        ready_on: usize,
    ) -> (Mock, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let pending = pending.to_string();
        let done = done.to_string();
        let mock = self
            .server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= ready_on {
                    done.clone().into_bytes()
                } else {
                    pending.clone().into_bytes()
                }
            })
            .create_async()
            .await;
        (mock, calls)
    }
}
