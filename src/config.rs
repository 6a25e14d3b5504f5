//! Run-time tunables for a log dump.
//!
//! There is no configuration file. `FetchConfig::default()` holds the
//! defaults and the CLI overrides individual fields.

use std::fmt;
use std::time::Duration;

/// Default `maxResults` in the CMSearch request.
pub const DEFAULT_MAX_RESULTS: u32 = 100;

/// Default overall request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// URL scheme used to reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    /// `https://`
    #[default]
    Https,
    /// `http://`, for recorders that only serve plain HTTP on the LAN.
    Http,
}

impl Scheme {
    /// The scheme name without `://`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Http => "http",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for one log dump run.
///
/// ```ignore
/// let config = FetchConfig {
///     max_results: 512,
///     ..FetchConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// TCP + TLS handshake limit.
    pub connect_timeout: Duration,
    /// Limit for a whole request including the response body. Applies to
    /// each of the two digest round trips separately.
    pub request_timeout: Duration,
    /// Rows the device may return in the single result page.
    pub max_results: u32,
    /// `https` unless plain HTTP was requested.
    pub scheme: Scheme,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_results: DEFAULT_MAX_RESULTS,
            scheme: Scheme::Https,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_config_default_has_sane_values() {
        let config = FetchConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.max_results, 100);
        assert_eq!(config.scheme, Scheme::Https, "TLS is the default transport");
    }

    #[test]
    fn struct_update_overrides_single_fields() {
        let config = FetchConfig {
            scheme: Scheme::Http,
            ..FetchConfig::default()
        };
        assert_eq!(config.scheme.to_string(), "http");
        assert_eq!(config.max_results, DEFAULT_MAX_RESULTS);
    }
}
