use crate::error_code::ErrorKind;
use crate::{Error, ErrorContext, Result};
use base64::Engine as _;
use reqwest::{Method, Proxy, RequestBuilder};
use serde_json::Value;
use std::env;
use std::time::Duration;

/// How a vendor expects its credential.
#[derive(Clone)]
pub enum Auth {
    None,
    /// `Authorization: Bearer <key>`
    Bearer(String),
    /// `Authorization: Token <key>`
    Token(String),
    /// `Authorization: Key <key>`
    Key(String),
    /// `?<param>=<key>` on every URL.
    Query { param: &'static str, value: String },
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = match self {
            Auth::None => "none",
            Auth::Bearer(_) => "bearer",
            Auth::Token(_) => "token",
            Auth::Key(_) => "key",
            Auth::Query { .. } => "query",
        };
        write!(f, "Auth({})", scheme)
    }
}

impl Auth {
    fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        match self {
            Auth::None => req,
            Auth::Bearer(key) => req.bearer_auth(key),
            Auth::Token(key) => req.header("Authorization", format!("Token {}", key)),
            Auth::Key(key) => req.header("Authorization", format!("Key {}", key)),
            Auth::Query { param, value } => req.query(&[(*param, value.as_str())]),
        }
    }
}

/// Thin per-adapter wrapper around a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth: Auth,
}

/// Ordered places vendors put a human-readable error.
const ERROR_MESSAGE_POINTERS: [&str; 7] = [
    "/error/message",
    "/base_resp/status_msg",
    "/detail/0/msg",
    "/detail",
    "/message",
    "/error",
    "/msg",
];

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, auth: Auth) -> Result<Self> {
        // Minimal production-friendly defaults (env-overridable).
        let timeout_secs = env::var("MEDIA_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(120);

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(
                env::var("MEDIA_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(8),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("MEDIA_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        let base_url = base_url.into();
        url::Url::parse(&base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base URL '{}': {}", base_url, e),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_source("http_transport"),
            )
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins `path` onto the base URL; absolute URLs pass through untouched.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Request builder with the vendor credential applied.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.auth.apply(self.client.request(method, self.url(path)))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    /// Sends and decodes a JSON body.
    ///
    /// Non-2xx statuses become [`Error::Remote`] with the vendor's own message
    /// when one can be found. An empty 2xx body decodes to `Value::Null`.
    pub async fn send_json(&self, req: RequestBuilder) -> Result<Value> {
        let resp = req.send().await.map_err(TransportError::Http)?;
        let status = resp.status();
        let text = resp.text().await.map_err(TransportError::Http)?;

        if !status.is_success() {
            let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            let message = remote_message(&body).unwrap_or_else(|| {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                } else {
                    trimmed.chars().take(300).collect()
                }
            });
            let kind = match ErrorKind::from_http_status(status.as_u16()) {
                ErrorKind::Unknown => {
                    ErrorKind::from_vendor_message(&message).unwrap_or(ErrorKind::Unknown)
                }
                kind => kind,
            };
            tracing::debug!(status = status.as_u16(), kind = kind.name(), "vendor call failed");
            return Err(Error::Remote {
                status: status.as_u16(),
                kind,
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetches a result asset and base64-encodes it.
    ///
    /// Returns the encoded bytes and the served content type, if any. The
    /// vendor credential is only sent when `authenticated` is set.
    pub async fn download_base64(
        &self,
        url: &str,
        authenticated: bool,
    ) -> Result<(String, Option<String>)> {
        let req = if authenticated {
            self.get(url)
        } else {
            self.client.get(self.url(url))
        };
        let resp = req.send().await.map_err(TransportError::Http)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Remote {
                status: status.as_u16(),
                kind: ErrorKind::from_http_status(status.as_u16()),
                message: format!("asset download failed with HTTP {}", status.as_u16()),
            });
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty());
        let bytes = resp.bytes().await.map_err(TransportError::Http)?;
        if bytes.is_empty() {
            return Err(Error::no_result("downloaded asset is empty"));
        }
        let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Ok((data, content_type))
    }
}

/// First non-empty string at one of the known error locations.
pub fn remote_message(body: &Value) -> Option<String> {
    ERROR_MESSAGE_POINTERS.iter().find_map(|p| {
        body.pointer(p)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
