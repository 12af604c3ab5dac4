//! HTTP plumbing shared by every HTTP-based destination.
//!
//! Endpoint validation, the origin-bound [`HttpClient`], and [`deliver`], which
//! sends through a cached client and maps whatever happened into a
//! [`DestinationResponse`].

use crate::config::HttpConfig;
use crate::core::{DestinationResponse, DestinationType};
use crate::dispatch::{ClientCache, DispatchError};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Method, RequestBuilder};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Connection settings applied to every [`HttpClient`] a factory builds.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl From<&HttpConfig> for HttpSettings {
    fn from(config: &HttpConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

/// A `reqwest` client cached per origin (`scheme://host:port`), see [`client_key`].
#[derive(Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn build(destination_type: DestinationType, settings: &HttpSettings) -> Result<Self, DispatchError> {
        let inner = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| DispatchError::client_construction(destination_type, e.to_string()))?;

        Ok(Self { inner })
    }

    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.inner.request(method, url)
    }
}

/// Parses and validates an endpoint URL. Only `http` and `https` with a host are accepted.
pub fn parse_endpoint(destination_type: DestinationType, raw: &str) -> Result<Url, DispatchError> {
    let url = Url::parse(raw).map_err(|e| {
        DispatchError::client_construction(destination_type, format!("invalid url '{}': {}", raw, e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(DispatchError::client_construction(
            destination_type,
            format!("unsupported scheme '{}' in '{}'", url.scheme(), raw),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(DispatchError::client_construction(
            destination_type,
            format!("url '{}' has no host", raw),
        ));
    }
    Ok(url)
}

/// Cache key for clients that may be shared by every URL on the same origin.
pub fn client_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Validates caller-supplied headers before any I/O.
pub fn header_map(
    destination_type: DestinationType,
    headers: &BTreeMap<String, String>,
) -> Result<HeaderMap, DispatchError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            DispatchError::client_construction(destination_type, format!("invalid header name '{}'", name))
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            DispatchError::client_construction(destination_type, format!("invalid value for header '{}'", name))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Applies a per-message timeout on top of the client's default.
pub fn with_timeout(request: RequestBuilder, timeout: Option<Duration>) -> RequestBuilder {
    match timeout {
        Some(timeout) => request.timeout(timeout),
        None => request,
    }
}

/// Sends through the client cached under `key` and normalizes the outcome.
///
/// A failure to connect is taken as a sign of a stale client: the entry is
/// evicted, rebuilt, and the request sent once more. Nothing reached the
/// remote on the first attempt, so the resend cannot duplicate a delivery.
/// Only the final outcome is reported.
pub async fn deliver<C, B, S, Fut>(
    cache: &ClientCache<C>,
    key: &str,
    build: B,
    send: S,
) -> Result<DestinationResponse, DispatchError>
where
    C: Send + Sync + 'static,
    B: Fn() -> Result<C, DispatchError> + Send + Sync,
    S: Fn(Arc<C>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>> + Send,
{
    let client = cache.get_or_build(key, &build).await?;
    let outcome = match send(client).await {
        Err(e) if is_stale_connection(&e) => {
            warn!(key, error = %e, "Transport client looks stale, rebuilding");
            cache.invalidate(key).await;
            let fresh = cache.get_or_build(key, &build).await?;
            send(fresh).await
        }
        other => other,
    };

    Ok(match outcome {
        Ok(response) => into_destination_response(response).await,
        Err(e) => from_transport_error(&e),
    })
}

fn is_stale_connection(e: &reqwest::Error) -> bool {
    !e.is_timeout() && e.is_connect()
}

/// Maps an HTTP response into a [`DestinationResponse`].
pub async fn into_destination_response(response: reqwest::Response) -> DestinationResponse {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()));
    let body = response.text().await.unwrap_or_else(|e| {
        debug!(error = %e, "Could not read response body");
        String::new()
    });

    if status.is_success() {
        DestinationResponse::delivered(status.as_u16(), body)
    } else {
        warn!(status = %status, body = %body, "Destination rejected the message");
        DestinationResponse::rejected(status.as_u16(), body, retry_after)
    }
}

/// Parses a `Retry-After` value relative to `now`.
///
/// Accepts delta-seconds (`120`) and the IMF-fixdate HTTP-date form
/// (`Wed, 21 Oct 2015 07:28:00 GMT`). A date in the past yields zero. The
/// obsolete RFC 850 and asctime date forms are not recognized.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

fn from_transport_error(e: &reqwest::Error) -> DestinationResponse {
    if e.is_timeout() {
        warn!(error = %e, "HTTP request timed out");
        DestinationResponse::timed_out(e.to_string())
    } else {
        warn!(error = %e, "HTTP request failed");
        DestinationResponse::unreachable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_accepts_http_and_https() {
        assert!(parse_endpoint(DestinationType::Webhook, "https://hooks.example.com/a").is_ok());
        assert!(parse_endpoint(DestinationType::Webhook, "http://127.0.0.1:8080/a").is_ok());
    }

    #[test]
    fn test_parse_endpoint_rejects_bad_addresses() {
        for raw in ["not a url", "ftp://files.example.com", "mailto:ops@example.com", ""] {
            let err = parse_endpoint(DestinationType::Chat, raw).unwrap_err();
            assert!(
                matches!(err, DispatchError::ClientConstruction { destination_type: DestinationType::Chat, .. }),
                "expected construction error for {:?}, got {:?}",
                raw,
                err
            );
        }
    }

    #[test]
    fn test_client_key_is_the_origin() {
        let a = Url::parse("https://hooks.example.com/services/a?x=1").unwrap();
        let b = Url::parse("https://hooks.example.com:443/services/b").unwrap();
        let c = Url::parse("http://hooks.example.com/services/a").unwrap();

        assert_eq!(client_key(&a), "https://hooks.example.com");
        assert_eq!(client_key(&a), client_key(&b));
        assert_ne!(client_key(&a), client_key(&c));
    }

    #[test]
    fn test_retry_after_accepts_seconds_and_http_date() {
        let now = DateTime::parse_from_rfc2822("Wed, 21 Oct 2015 07:28:00 GMT")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(parse_retry_after(" 30 ", now), Some(Duration::from_secs(30)));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:30:00 GMT", now),
            Some(Duration::from_secs(120))
        );
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("soon", now), None);
        assert_eq!(parse_retry_after("-5", now), None);
    }

    #[test]
    fn test_header_map_rejects_invalid_names() {
        let mut headers = BTreeMap::new();
        headers.insert("X-Token".to_string(), "abc".to_string());
        assert_eq!(header_map(DestinationType::Custom, &headers).unwrap().len(), 1);

        headers.insert("bad header".to_string(), "abc".to_string());
        assert!(matches!(
            header_map(DestinationType::Custom, &headers),
            Err(DispatchError::ClientConstruction { .. })
        ));
    }
}
