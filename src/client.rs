//! Digest-authenticated HTTP client for a single ISAPI device.
//!
//! `IsapiClient` wraps a `reqwest::Client` bound to one device base URL and
//! sends raw XML requests with the headers the device's own web UI uses.
//!
//! Authentication round trip:
//! - The first attempt goes out without credentials.
//! - A `401 Unauthorized` response is expected to carry a `WWW-Authenticate:
//!   Digest ...` challenge. The client answers it and resends the same
//!   request exactly once with an `Authorization` header.
//! - A second `401` is a hard authentication failure. There is no further
//!   retry and no backoff.
//! - A device that accepts the first attempt (authentication disabled) is
//!   served without a second request.

use bytes::Bytes;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Client, Method, Response, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::{Credentials, DigestChallenge, DigestRequest, digest_authorization, new_cnonce};
use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::timespan::ValidationError;

/// `Content-Type` sent with ISAPI XML posts, matching what the recorder's
/// web UI sends.
const ISAPI_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Builds the underlying `reqwest::Client` with the configured timeouts.
fn build_http_client(config: &FetchConfig) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .build()
}

/// HTTP client for one ISAPI device.
///
/// `base_url` is a parsed `Url` so host validation happens once, at
/// construction, before any password prompt or network traffic.
pub struct IsapiClient {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl IsapiClient {
    /// Creates a client for `host` (IP or hostname, optionally `:port`)
    /// using the scheme from `config`.
    ///
    /// IPv6 literals must be bracketed (`[fe80::1]` or `[fe80::1]:8080`).
    /// Userinfo, query and fragment parts are rejected: a `user@` prefix
    /// would make reqwest send its own Basic `Authorization`.
    pub fn new(host: &str, config: &FetchConfig) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() || host.contains(['/', '@', '?', '#']) {
            return Err(ValidationError::InvalidHost {
                host: host.to_string(),
                reason: "expected an IP address or hostname".to_string(),
            }
            .into());
        }
        let base_url = format!("{}://{}", config.scheme.as_str(), host);
        Self::with_base_url(&base_url, config).map_err(|e| match e {
            FetchError::Validation(ValidationError::InvalidHost { reason, .. }) => {
                ValidationError::InvalidHost {
                    host: host.to_string(),
                    reason,
                }
                .into()
            }
            other => other,
        })
    }

    /// Creates a client rooted at an explicit base URL, used by tests to
    /// point at a local mock server.
    pub fn with_base_url(base_url: &str, config: &FetchConfig) -> Result<Self> {
        let invalid = |reason: String| ValidationError::InvalidHost {
            host: base_url.to_string(),
            reason,
        };
        let base_url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if base_url.host_str().is_none() {
            return Err(invalid("missing host".to_string()).into());
        }

        let client = build_http_client(config).map_err(|source| FetchError::Connection {
            url: base_url.to_string(),
            source,
        })?;

        Ok(IsapiClient {
            client,
            base_url,
            request_timeout: config.request_timeout,
        })
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Posts an XML body to `path` and returns the raw success body.
    ///
    /// `path` is absolute (leading `/`) and replaces any path on the base
    /// URL.
    ///
    /// # Errors
    ///
    /// - `FetchError::Challenge` — `401` without an answerable digest
    ///   challenge.
    /// - `FetchError::Auth` — the authenticated retry was also rejected.
    /// - `FetchError::Http` — any other non-2xx status, with the body.
    /// - `FetchError::Connection` / `FetchError::Timeout` — transport
    ///   failures.
    pub async fn post_xml(
        &self,
        path: &str,
        body: &str,
        credentials: &Credentials,
    ) -> Result<Bytes> {
        self.send_with_digest(Method::POST, path, body, credentials)
            .await
    }

    async fn send_with_digest(
        &self,
        method: Method,
        path: &str,
        body: &str,
        credentials: &Credentials,
    ) -> Result<Bytes> {
        let url = self.base_url.join(path).map_err(|e| ValidationError::InvalidHost {
            host: self.base_url.to_string(),
            reason: e.to_string(),
        })?;

        debug!(%url, %method, bytes = body.len(), "sending request");
        let resp = self.send(method.clone(), &url, body, None).await?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            debug!(status = %resp.status(), "device did not ask for authentication");
            return self.read_success(&url, resp).await;
        }

        let challenge = DigestChallenge::from_headers(
            resp.headers()
                .get_all(WWW_AUTHENTICATE)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        )?;
        debug!(
            realm = %challenge.realm,
            algorithm = challenge.algorithm.as_str(),
            qop = challenge.preferred_qop().map(|q| q.as_str()),
            "received digest challenge"
        );

        let uri = request_target(&url);
        let cnonce = new_cnonce();
        let authorization = digest_authorization(
            &challenge,
            credentials,
            &DigestRequest {
                method: method.as_str(),
                uri: &uri,
                body: body.as_bytes(),
                cnonce: &cnonce,
                nonce_count: 1,
            },
        );

        let retry = self.send(method, &url, body, Some(&authorization)).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            let status = retry.status();
            let detail = retry.text().await.unwrap_or_default();
            warn!(user = credentials.username(), "device rejected digest credentials");
            let mut message = format!(
                "device rejected credentials for user '{}' ({status})",
                credentials.username()
            );
            if !detail.trim().is_empty() {
                message.push_str(": ");
                message.push_str(detail.trim());
            }
            return Err(FetchError::Auth { message });
        }

        self.read_success(&url, retry).await
    }

    /// Sends one attempt. The `Authorization` value is never logged.
    async fn send(
        &self,
        method: Method,
        url: &Url,
        body: &str,
        authorization: Option<&str>,
    ) -> Result<Response> {
        let mut req = self
            .client
            .request(method, url.clone())
            .header(CONTENT_TYPE, ISAPI_CONTENT_TYPE)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(ACCEPT, "*/*")
            .body(body.to_owned());
        if let Some(value) = authorization {
            req = req.header(AUTHORIZATION, value);
        }
        req.send()
            .await
            .map_err(|source| self.transport_error(url, source))
    }

    /// Returns the body of a 2xx response, or `FetchError::Http` carrying
    /// the status and body text.
    async fn read_success(&self, url: &Url, resp: Response) -> Result<Bytes> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Http { status, body });
        }

        let payload = resp
            .bytes()
            .await
            .map_err(|source| self.transport_error(url, source))?;
        debug!(%status, bytes = payload.len(), "received response body");
        Ok(payload)
    }

    fn transport_error(&self, url: &Url, source: reqwest::Error) -> FetchError {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.request_timeout,
                source,
            }
        } else {
            FetchError::Connection {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// The request target as it appears on the request line: path plus query.
fn request_target(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}
