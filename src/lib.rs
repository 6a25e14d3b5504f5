//! Raw log dumper for Hikvision NVR/DVR/IPC devices over ISAPI.
//!
//! Posts one CMSearch log query for a time window to the device's
//! `/ISAPI/ContentMgmt/logSearch` resource using HTTP Digest authentication
//! and writes the vendor's XML response verbatim to a file or stdout.
//!
//! # Modules
//!
//! - [`auth`] — Credentials, digest challenge parsing and response computation.
//! - [`client`] — Digest-authenticated HTTP client for one device.
//! - [`config`] — Run tunables (`FetchConfig`) and defaults.
//! - [`error`] — Typed error hierarchy (`FetchError`) and exit codes.
//! - [`logging`] — stderr tracing subscriber.
//! - [`output`] — Atomic file or stdout payload sink.
//! - [`search`] — CMSearch request body and the end-to-end dump.
//! - [`timespan`] — START/END parsing and normalization.
//!
//! # Quick Start
//!
//! ```ignore
//! use hik_logdump::auth::Credentials;
//! use hik_logdump::client::IsapiClient;
//! use hik_logdump::config::FetchConfig;
//! use hik_logdump::output::OutputTarget;
//! use hik_logdump::search::run_log_search;
//! use hik_logdump::timespan::TimeSpan;
//!
//! let config = FetchConfig::default();
//! let span = TimeSpan::parse("2025-05-01", "2025-05-08")?;
//! let client = IsapiClient::new("10.10.10.10", &config)?;
//! let credentials = Credentials::new("admin", password);
//! let output = OutputTarget::File("out.xml".into());
//! run_log_search(&client, &credentials, &span, &config, &output).await?;
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod search;
pub mod timespan;
