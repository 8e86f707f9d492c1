use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use serde::Deserialize;

use crate::error::Error;

/// Shortener provider credentials. Both fields are required together; an
/// incomplete config behaves as disabled, not as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ShortenerConfig {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub key: String,
}

impl ShortenerConfig {
    pub fn is_complete(&self) -> bool {
        !self.domain.trim().is_empty() && !self.key.trim().is_empty()
    }

    /// Parse an admin-submitted configuration line of the fixed shape
    /// `<domain> | <key>`: exactly one separator, both sides trimmed and
    /// non-empty.
    pub fn parse(line: &str) -> Option<Self> {
        if line.matches('|').count() != 1 {
            return None;
        }
        let (domain, key) = line.split_once('|')?;
        let (domain, key) = (domain.trim(), key.trim());
        if domain.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self {
            domain: domain.to_string(),
            key: key.to_string(),
        })
    }
}

/// Provider response. Providers disagree on shape: some return an explicit
/// status alongside the short URL, some only the URL field.
#[derive(Debug, Deserialize)]
struct ShortenResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "shortenedUrl")]
    shortened_url: Option<String>,
    #[serde(default)]
    short: Option<String>,
}

impl ShortenResponse {
    fn into_short_url(self) -> Option<String> {
        if let Some(status) = &self.status
            && status != "success"
        {
            return None;
        }
        self.shortened_url.or(self.short)
    }
}

/// Outbound call seam for the shortener provider.
pub trait ShortenBackend: Send + Sync {
    /// One GET-style provider call carrying the API key and target URL.
    fn request(
        &self,
        domain: &str,
        key: &str,
        url: &str,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, Error>> + Send + '_>>;
}

/// Real backend: `GET https://<domain>/api?api=<key>&url=<target>`.
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ShortenBackend for HttpBackend {
    fn request(
        &self,
        domain: &str,
        key: &str,
        url: &str,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, Error>> + Send + '_>> {
        let endpoint = if domain.starts_with("http://") || domain.starts_with("https://") {
            format!("{domain}/api")
        } else {
            format!("https://{domain}/api")
        };
        // `.query` percent-encodes the target URL.
        let request = self.client.get(endpoint).query(&[("api", key), ("url", url)]);
        Box::pin(async move {
            let response = request.send().await?;
            let body = response.json().await?;
            Ok(body)
        })
    }
}

/// Optional, runtime-reconfigurable pass-through to a link-shortening
/// provider. Never fails its caller: every problem degrades to `None`,
/// meaning "keep the original link".
pub struct Shortener {
    backend: Box<dyn ShortenBackend>,
    config: RwLock<ShortenerConfig>,
}

impl Shortener {
    pub fn new(seed: ShortenerConfig) -> Self {
        Self::with_backend(Box::new(HttpBackend::new()), seed)
    }

    pub fn with_backend(backend: Box<dyn ShortenBackend>, seed: ShortenerConfig) -> Self {
        Self {
            backend,
            config: RwLock::new(seed),
        }
    }

    /// Replace the configuration wholesale. Reverts to the seed on restart.
    pub fn reconfigure(&self, config: ShortenerConfig) {
        if let Ok(mut current) = self.config.write() {
            *current = config;
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.read().map(|c| c.is_complete()).unwrap_or(false)
    }

    /// Shorten one URL. Returns `None` without any network call when the
    /// configuration is incomplete, and on any transport failure, non-success
    /// status, or unrecognized body.
    pub async fn shorten(&self, url: &str) -> Option<String> {
        let config = self.config.read().ok()?.clone();
        if !config.is_complete() {
            return None;
        }
        match self.backend.request(&config.domain, &config.key, url).await {
            Ok(body) => match serde_json::from_value::<ShortenResponse>(body) {
                Ok(response) => response.into_short_url(),
                Err(e) => {
                    tracing::debug!(url, error = %e, "unrecognized shortener response");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(url, error = %e, "shortener request failed");
                None
            }
        }
    }

    /// Shorten every distinct URL in `urls` and substitute all occurrences in
    /// `text`. One request per distinct URL; requests run concurrently;
    /// substitution is exact, leaving surrounding text untouched. URLs that
    /// fail to shorten keep their original form.
    pub async fn shorten_text(&self, text: &str, urls: &[String]) -> String {
        if !self.is_configured() || urls.is_empty() {
            return text.to_string();
        }
        let mut distinct: Vec<&String> = Vec::new();
        for url in urls {
            if !distinct.contains(&url) {
                distinct.push(url);
            }
        }
        let shortened =
            futures::future::join_all(distinct.iter().map(|url| self.shorten(url))).await;
        let mut result = text.to_string();
        for (url, short) in distinct.iter().zip(shortened) {
            if let Some(short) = short {
                result = result.replace(url.as_str(), &short);
            }
        }
        result
    }
}
